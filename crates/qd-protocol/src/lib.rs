//! qd-protocol: Session channel request payloads for qdsshd
//!
//! This crate defines the in-band request stream of an SSH session channel
//! as seen by the daemon: the binary payload of every request type it
//! understands, the reply each request obliges, the terminal dimensions
//! carried by `pty-req`/`window-change`, and the `exit-status` payload the
//! daemon emits when a command finishes.

pub mod error;
pub mod exit;
pub mod payload;
pub mod request;
pub mod terminal;

pub use error::ProtocolError;
pub use exit::ExitCode;
pub use request::{ChannelRequest, Reply, RequestKind};
pub use terminal::TerminalSize;
