//! Configuration management for qdsshd

mod server;

pub use server::{ServerConfig, SessionConfig, DEFAULT_BIND_ADDRESS};

use crate::error::ConfigError;
use std::path::{Path, PathBuf};

/// Get the default configuration directory
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("qdsshd")
}

/// Get the default configuration file path
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.toml")
}

/// Load configuration from a file
pub fn load_config<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Invalid(format!("Failed to read config: {}", e)))?;

    let config: T = toml::from_str(&content)?;
    Ok(config)
}

/// Load the daemon configuration.
///
/// A file named explicitly must exist and parse. Otherwise the file at
/// `default_path` is used when present, and any problem with it falls
/// back to the built-in defaults.
pub fn load_server_config(
    explicit: Option<&Path>,
    default_path: &Path,
) -> Result<ServerConfig, ConfigError> {
    if let Some(path) = explicit {
        return load_config(path);
    }

    if !default_path.exists() {
        tracing::info!("Using default configuration");
        return Ok(ServerConfig::default());
    }

    Ok(load_config(default_path).unwrap_or_else(|e| {
        tracing::warn!("Failed to load config from {:?}: {}", default_path, e);
        ServerConfig::default()
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use qd_protocol::TerminalSize;

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let result: Result<ServerConfig, _> = load_config(&path);
        assert!(matches!(result, Err(ConfigError::NotFound(p)) if p == path));
    }

    #[test]
    fn test_load_partial_config_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
bind_address = "127.0.0.1:2201"

[session]
shell = "/bin/zsh"
default_size = { rows = 50, cols = 200 }
"#,
        )
        .unwrap();

        let config: ServerConfig = load_config(&path).unwrap();
        assert_eq!(config.bind_address, "127.0.0.1:2201");
        assert!(config.host_key_path.is_none());
        assert_eq!(config.session.shell, "/bin/zsh");
        assert_eq!(config.session.exec_shell, "sh");
        assert_eq!(config.session.default_size, TerminalSize::new(50, 200));
    }

    #[test]
    fn test_load_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "bind_address = [").unwrap();

        let result: Result<ServerConfig, _> = load_config(&path);
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let explicit = dir.path().join("absent.toml");
        let fallback = dir.path().join("default.toml");

        let result = load_server_config(Some(&explicit), &fallback);
        assert!(matches!(result, Err(ConfigError::NotFound(p)) if p == explicit));
    }

    #[test]
    fn test_explicit_invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let explicit = dir.path().join("config.toml");
        std::fs::write(&explicit, "bind_address = [").unwrap();

        let result = load_server_config(Some(&explicit), &dir.path().join("default.toml"));
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_default_path_problems_fall_back() {
        let dir = tempfile::tempdir().unwrap();
        let absent = dir.path().join("absent.toml");
        let config = load_server_config(None, &absent).unwrap();
        assert_eq!(config.bind_address, DEFAULT_BIND_ADDRESS);

        let broken = dir.path().join("broken.toml");
        std::fs::write(&broken, "bind_address = [").unwrap();
        let config = load_server_config(None, &broken).unwrap();
        assert_eq!(config.bind_address, DEFAULT_BIND_ADDRESS);
    }

    #[test]
    fn test_default_path_is_used_when_present() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "bind_address = \"127.0.0.1:2202\"\n").unwrap();

        let config = load_server_config(None, &path).unwrap();
        assert_eq!(config.bind_address, "127.0.0.1:2202");
    }
}
