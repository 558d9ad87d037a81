//! Daemon configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use qd_protocol::TerminalSize;

/// Address the daemon listens on unless configured otherwise
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:2200";

/// Configuration for the SSH daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind the SSH server to
    pub bind_address: String,

    /// OpenSSH private key to present as host identity.
    /// When unset a fresh key is generated on every start.
    pub host_key_path: Option<PathBuf>,

    /// How sessions spawn their processes
    pub session: SessionConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            host_key_path: None,
            session: SessionConfig::default(),
        }
    }
}

/// Process settings for session channels
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Interactive shell started by a `shell` request
    pub shell: String,

    /// Arguments passed to the interactive shell
    pub shell_args: Vec<String>,

    /// Shell that runs `exec` commands as `<exec_shell> -c <command>`
    pub exec_shell: String,

    /// `TERM` for interactive shells when `pty-req` did not name one
    pub default_term: String,

    /// Terminal size used when `shell` arrives without a `pty-req`
    pub default_size: TerminalSize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            shell: "bash".to_string(),
            shell_args: Vec::new(),
            exec_shell: "sh".to_string(),
            default_term: "xterm-256color".to_string(),
            default_size: TerminalSize::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_address, "0.0.0.0:2200");
        assert_eq!(config.session.shell, "bash");
        assert!(config.session.shell_args.is_empty());
        assert_eq!(config.session.default_size, TerminalSize::new(24, 80));
    }
}
