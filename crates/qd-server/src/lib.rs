//! qd-server: Passwordless SSH daemon serving shells and commands
//!
//! The daemon accepts SSH connections from anyone, opens `session`
//! channels, and binds each channel to exactly one local process: an
//! interactive shell on a pseudo-terminal, or a one-shot `sh -c` command
//! on plain pipes. Process I/O is bridged to the channel in real time and
//! the command's exit status is reported back when it finishes.

pub mod dispatch;
pub mod keys;
pub mod server;
pub mod session;

pub use dispatch::{ChannelDispatcher, ChannelRejection};
pub use session::{SessionChannel, SessionHandler};
