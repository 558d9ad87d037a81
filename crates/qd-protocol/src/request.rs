//! Channel request types
//!
//! A session channel carries an ordered stream of typed requests. Each
//! request has a binary payload whose layout depends on its type, and may
//! oblige the receiver to answer with exactly one success/failure reply.
//!
//! # Payload layouts (big-endian)
//!
//! - `exec`: string command
//! - `shell`: empty
//! - `pty-req`: string term, uint32 width, uint32 height, then pixel
//!   dimensions and terminal modes (not consumed)
//! - `window-change`: uint32 width, uint32 height, then pixel dimensions
//!   (not consumed)
//!
//! [`ChannelRequest::decode`] parses these raw payloads for byte-level
//! transports. Transports that hand over already-parsed requests build the
//! variants directly; both paths share the same [`ChannelRequest::reply`]
//! policy.

use bytes::Bytes;
use std::fmt;

use crate::error::ProtocolError;
use crate::payload::PayloadReader;
use crate::terminal::TerminalSize;

/// Request type identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RequestKind {
    /// Run a single command through `sh -c`
    Exec,
    /// Start an interactive shell
    Shell,
    /// Request a pseudo-terminal
    PtyReq,
    /// Terminal dimensions changed
    WindowChange,
    /// Any request type the daemon does not implement
    Other(String),
}

impl RequestKind {
    /// Parse a request type name
    pub fn from_name(name: &str) -> Self {
        match name {
            "exec" => RequestKind::Exec,
            "shell" => RequestKind::Shell,
            "pty-req" => RequestKind::PtyReq,
            "window-change" => RequestKind::WindowChange,
            other => RequestKind::Other(other.to_string()),
        }
    }

    /// Wire name of this request type
    pub fn name(&self) -> &str {
        match self {
            RequestKind::Exec => "exec",
            RequestKind::Shell => "shell",
            RequestKind::PtyReq => "pty-req",
            RequestKind::WindowChange => "window-change",
            RequestKind::Other(name) => name,
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Reply owed for a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    /// Answer with channel success
    Accept,
    /// Answer with channel failure
    Reject,
    /// Request type carries no reply obligation
    None,
}

/// A decoded channel request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelRequest {
    /// Run `command` as a one-shot process
    Exec { command: String },
    /// Start an interactive shell; only an empty payload is valid
    Shell { payload: Bytes },
    /// Allocate a terminal of the given type and size
    PtyReq { term: String, size: TerminalSize },
    /// Resize the active terminal
    WindowChange { size: TerminalSize },
    /// Unsupported request
    Other { kind: String },
}

impl ChannelRequest {
    /// Decode a request from its type name and raw payload
    pub fn decode(name: &str, payload: &[u8]) -> Result<Self, ProtocolError> {
        match RequestKind::from_name(name) {
            RequestKind::Exec => Self::decode_exec(payload),
            RequestKind::Shell => Ok(ChannelRequest::Shell {
                payload: Bytes::copy_from_slice(payload),
            }),
            RequestKind::PtyReq => Self::decode_pty_req(payload),
            RequestKind::WindowChange => Self::decode_window_change(payload),
            RequestKind::Other(kind) => Ok(ChannelRequest::Other { kind }),
        }
    }

    fn decode_exec(payload: &[u8]) -> Result<Self, ProtocolError> {
        let mut reader = PayloadReader::new("exec", payload);
        let command = reader.read_utf8()?;
        Ok(ChannelRequest::Exec {
            command: command.to_string(),
        })
    }

    fn decode_pty_req(payload: &[u8]) -> Result<Self, ProtocolError> {
        let mut reader = PayloadReader::new("pty-req", payload);
        let term = String::from_utf8_lossy(reader.read_string()?).into_owned();
        let width = reader.read_u32()?;
        let height = reader.read_u32()?;
        Ok(ChannelRequest::PtyReq {
            term,
            size: TerminalSize::from_dimensions(width, height),
        })
    }

    fn decode_window_change(payload: &[u8]) -> Result<Self, ProtocolError> {
        let mut reader = PayloadReader::new("window-change", payload);
        let width = reader.read_u32()?;
        let height = reader.read_u32()?;
        Ok(ChannelRequest::WindowChange {
            size: TerminalSize::from_dimensions(width, height),
        })
    }

    /// Build an `exec` request from already-unwrapped command bytes
    pub fn exec(command: &[u8]) -> Result<Self, ProtocolError> {
        let command =
            std::str::from_utf8(command).map_err(|_| ProtocolError::InvalidUtf8 { request: "exec" })?;
        Ok(ChannelRequest::Exec {
            command: command.to_string(),
        })
    }

    /// The request's type
    pub fn kind(&self) -> RequestKind {
        match self {
            ChannelRequest::Exec { .. } => RequestKind::Exec,
            ChannelRequest::Shell { .. } => RequestKind::Shell,
            ChannelRequest::PtyReq { .. } => RequestKind::PtyReq,
            ChannelRequest::WindowChange { .. } => RequestKind::WindowChange,
            ChannelRequest::Other { kind } => RequestKind::Other(kind.clone()),
        }
    }

    /// Whether this request starts the channel's process
    pub fn starts_process(&self) -> bool {
        matches!(
            self,
            ChannelRequest::Exec { .. } | ChannelRequest::Shell { .. }
        )
    }

    /// Reply owed for this request, independent of session state
    pub fn reply(&self) -> Reply {
        match self {
            ChannelRequest::Exec { .. } => Reply::Accept,
            ChannelRequest::Shell { payload } if payload.is_empty() => Reply::Accept,
            ChannelRequest::Shell { .. } => Reply::Reject,
            ChannelRequest::PtyReq { .. } => Reply::Accept,
            ChannelRequest::WindowChange { .. } => Reply::None,
            ChannelRequest::Other { .. } => Reply::Reject,
        }
    }
}
