//! qd-core: Core abstractions and configuration for qdsshd
//!
//! This crate provides the configuration structures, error types, and the
//! transport seam shared by the daemon's session machinery.

pub mod config;
pub mod error;
pub mod traits;

pub use error::{ConfigError, SessionError};
pub use traits::ChannelSink;
