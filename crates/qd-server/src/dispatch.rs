//! Channel dispatcher
//!
//! Decides what happens to each channel-open request of a connection:
//! `session` channels get their own [`SessionChannel`]; every other
//! channel type is turned away with an "unknown channel type" reason.

use std::fmt;
use std::sync::Arc;

use qd_core::config::SessionConfig;
use qd_core::ChannelSink;

use crate::session::SessionChannel;

/// The only channel type the daemon serves
pub const SESSION_CHANNEL_TYPE: &str = "session";

/// Why a channel-open request was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The channel type is not served
    UnknownChannelType,
}

/// A refused channel-open request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelRejection {
    /// Rejection reason code
    pub reason: RejectReason,
    /// Human-readable description, naming the offending type
    pub message: String,
}

impl fmt::Display for ChannelRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Accepts `session` channels and starts one session task for each
#[derive(Debug, Clone)]
pub struct ChannelDispatcher {
    /// Settings handed to every session
    config: Arc<SessionConfig>,
}

impl ChannelDispatcher {
    /// Create a dispatcher whose sessions use `config`
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// Check a channel type without opening anything
    pub fn check(channel_type: &str) -> Result<(), ChannelRejection> {
        if channel_type == SESSION_CHANNEL_TYPE {
            Ok(())
        } else {
            Err(ChannelRejection {
                reason: RejectReason::UnknownChannelType,
                message: format!("unknown channel type: {}", channel_type),
            })
        }
    }

    /// Open a channel of the given type.
    ///
    /// For a `session` channel this spawns its session task, which owns
    /// `sink` from then on. Any other type is rejected and `sink` is
    /// dropped unused.
    pub fn open(
        &self,
        channel_type: &str,
        sink: Arc<dyn ChannelSink>,
    ) -> Result<SessionChannel, ChannelRejection> {
        Self::check(channel_type)?;
        Ok(SessionChannel::open(sink, Arc::clone(&self.config)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_is_accepted() {
        assert!(ChannelDispatcher::check("session").is_ok());
    }

    #[test]
    fn test_other_types_are_rejected_by_name() {
        for channel_type in ["direct-tcpip", "x11", "forwarded-tcpip", "Session"] {
            let rejection = ChannelDispatcher::check(channel_type).unwrap_err();
            assert_eq!(rejection.reason, RejectReason::UnknownChannelType);
            assert!(rejection.message.contains(channel_type));
        }
    }
}
