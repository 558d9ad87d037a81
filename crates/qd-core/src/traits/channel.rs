//! Channel traits

use async_trait::async_trait;

use crate::error::SessionError;
use qd_protocol::ExitCode;

/// Outbound half of one accepted session channel.
///
/// The transport implements this for each channel it hands to a session.
/// Inbound bytes travel separately, over a queue whose closure marks the
/// peer's end-of-stream.
#[async_trait]
pub trait ChannelSink: Send + Sync {
    /// Send bytes on the channel's data stream
    async fn data(&self, data: &[u8]) -> Result<(), SessionError>;

    /// Send an `exit-status` message
    async fn exit_status(&self, code: ExitCode) -> Result<(), SessionError>;

    /// Signal end of outbound data
    async fn eof(&self) -> Result<(), SessionError>;

    /// Close the channel
    async fn close(&self) -> Result<(), SessionError>;
}
