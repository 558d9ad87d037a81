//! Protocol error types

use thiserror::Error;

/// Errors that can occur while decoding a channel request payload
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Payload ended before a field could be read
    #[error("Truncated {request} payload: needed {needed} bytes, {remaining} remaining")]
    Truncated {
        request: &'static str,
        needed: usize,
        remaining: usize,
    },

    /// Command text was not valid UTF-8
    #[error("Command in {request} payload is not valid UTF-8")]
    InvalidUtf8 { request: &'static str },
}
