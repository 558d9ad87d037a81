//! Session channel handling
//!
//! One session per accepted `session` channel: the request handler, the
//! process supervisor, the terminal and its resize path, the I/O bridges,
//! and the teardown guard that closes the channel exactly once.

pub mod bridge;
mod channel;
mod handler;
pub mod process;
pub mod pty;
mod teardown;

pub use channel::{RequestGate, SessionChannel};
pub use handler::SessionHandler;
pub use process::CommandLine;
pub use pty::Terminal;
pub use teardown::TeardownGuard;
