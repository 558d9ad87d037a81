//! SSH server
//!
//! Binds the session machinery to the russh transport: the TCP listener,
//! the per-connection handler, and the channel sink that writes back
//! through a russh session handle.

mod handler;
mod listener;

pub use handler::{russh_config, ConnectionHandler, RusshChannel};
pub use listener::SshServer;
