//! Configuration loading and discovery for `resolve-mcp.toml`
//!
//! Provides functions to find, load, and merge configuration.

use super::schema::{BackendKind, ResolveMcpConfig};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name looked up during discovery
pub const CONFIG_FILE_NAME: &str = "resolve-mcp.toml";

/// Configuration loading error
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// File I/O error
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error
    #[error("Failed to parse resolve-mcp.toml: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error
    #[error("Config validation failed:\n{}", .0.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    Validation(Vec<String>),
}

/// CLI arguments that can override config values
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    /// Override the connection backend
    pub backend: Option<BackendKind>,
    /// Override the log level
    pub log_level: Option<String>,
}

/// Find resolve-mcp.toml by walking up from the current working directory.
///
/// Search order:
/// 1. Walk up from current directory looking for resolve-mcp.toml
/// 2. Check XDG_CONFIG_HOME/resolve-mcp/resolve-mcp.toml (or ~/.config/resolve-mcp/resolve-mcp.toml)
pub fn find_config() -> Option<PathBuf> {
    if let Ok(cwd) = env::current_dir() {
        if let Some(path) = find_config_from(cwd) {
            return Some(path);
        }
    }

    find_xdg_config()
}

/// Find resolve-mcp.toml in the XDG config directory.
pub fn find_xdg_config() -> Option<PathBuf> {
    let xdg_config = env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|_| env::var("HOME").map(|h| PathBuf::from(h).join(".config")))
        .ok()?;

    let config_path = xdg_config.join("resolve-mcp").join(CONFIG_FILE_NAME);
    if config_path.exists() {
        Some(config_path)
    } else {
        None
    }
}

/// Find resolve-mcp.toml by walking up from a specific directory.
pub fn find_config_from(start: PathBuf) -> Option<PathBuf> {
    let mut current = start;

    loop {
        let config_path = current.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            return None;
        }
    }
}

/// Load configuration from a resolve-mcp.toml file.
///
/// If a path is provided, loads from that file. Otherwise, uses `find_config()`
/// to locate the config file. If no config file is found, returns the defaults.
///
/// # Example
/// ```ignore
/// let config = load_config(Some(Path::new("studio/resolve-mcp.toml")))?;
/// ```
pub fn load_config(path: Option<&Path>) -> Result<ResolveMcpConfig, ConfigError> {
    let config_path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => find_config(),
    };

    match config_path {
        Some(p) => load_config_file(&p),
        None => Ok(ResolveMcpConfig::default()),
    }
}

fn load_config_file(path: &Path) -> Result<ResolveMcpConfig, ConfigError> {
    let contents = fs::read_to_string(path)?;
    let config: ResolveMcpConfig = toml::from_str(&contents)?;
    check(&config)?;
    Ok(config)
}

fn check(config: &ResolveMcpConfig) -> Result<(), ConfigError> {
    let errors = config.validate();
    if !errors.is_empty() {
        return Err(ConfigError::Validation(errors.into_iter().map(|e| e.to_string()).collect()));
    }
    Ok(())
}

/// Merge CLI overrides into a configuration.
///
/// CLI arguments take precedence over config file values. The merged
/// configuration is validated again.
pub fn merge_cli_overrides(
    config: &mut ResolveMcpConfig,
    overrides: &CliOverrides,
) -> Result<(), ConfigError> {
    if let Some(backend) = overrides.backend {
        config.connection.backend = backend;
    }

    if let Some(ref level) = overrides.log_level {
        config.logging.level = level.to_lowercase();
    }

    check(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_config(dir: &Path, contents: &[u8]) -> PathBuf {
        let config_path = dir.join(CONFIG_FILE_NAME);
        File::create(&config_path)
            .expect("should create config file")
            .write_all(contents)
            .expect("should write config content");
        config_path
    }

    #[test]
    fn test_find_config_in_current_dir() {
        let temp = TempDir::new().expect("should create temp dir");
        let config_path = write_config(temp.path(), b"[connection]\nbackend = \"memory\"");

        let found = find_config_from(temp.path().to_path_buf());
        assert_eq!(found, Some(config_path));
    }

    #[test]
    fn test_find_config_in_parent_dir() {
        let temp = TempDir::new().expect("should create temp dir");
        let config_path = write_config(temp.path(), b"");

        let subdir = temp.path().join("projects").join("feature");
        fs::create_dir_all(&subdir).expect("should create subdirectories");

        let found = find_config_from(subdir);
        assert_eq!(found, Some(config_path));
    }

    #[test]
    fn test_find_config_not_found() {
        let temp = TempDir::new().expect("should create temp dir");
        let found = find_config_from(temp.path().to_path_buf());
        assert_eq!(found, None);
    }

    #[test]
    #[serial]
    fn test_find_xdg_config() {
        let temp = TempDir::new().expect("should create temp dir");
        let dir = temp.path().join("resolve-mcp");
        fs::create_dir_all(&dir).expect("should create xdg dir");
        let config_path = write_config(&dir, b"");

        let previous = env::var_os("XDG_CONFIG_HOME");
        env::set_var("XDG_CONFIG_HOME", temp.path());
        let found = find_xdg_config();
        match previous {
            Some(value) => env::set_var("XDG_CONFIG_HOME", value),
            None => env::remove_var("XDG_CONFIG_HOME"),
        }

        assert_eq!(found, Some(config_path));
    }

    #[test]
    fn test_load_config_from_file() {
        let temp = TempDir::new().expect("should create temp dir");
        let config_path = write_config(
            temp.path(),
            br#"
[connection]
backend = "memory"

[logging]
level = "warn"
"#,
        );

        let config = load_config(Some(&config_path)).expect("should load valid config");
        assert_eq!(config.connection.backend, BackendKind::Memory);
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.server.name, "resolve-mcp");
    }

    #[test]
    fn test_load_config_missing_file_errors() {
        let temp = TempDir::new().expect("should create temp dir");
        let result = load_config(Some(&temp.path().join("nonexistent.toml")));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let temp = TempDir::new().expect("should create temp dir");
        let config_path = write_config(temp.path(), b"this is not valid toml {{{");

        let result = load_config(Some(&config_path));
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_config_validation_error() {
        let temp = TempDir::new().expect("should create temp dir");
        let config_path = write_config(temp.path(), b"[logging]\nlevel = \"loud\"\n");

        let result = load_config(Some(&config_path));
        match result {
            Err(ConfigError::Validation(errors)) => {
                assert_eq!(errors.len(), 1);
                assert!(errors[0].contains("logging.level"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_merge_cli_overrides() {
        let mut config = ResolveMcpConfig::default();
        let overrides = CliOverrides {
            backend: Some(BackendKind::Memory),
            log_level: Some("DEBUG".to_string()),
        };
        merge_cli_overrides(&mut config, &overrides).expect("overrides are valid");
        assert_eq!(config.connection.backend, BackendKind::Memory);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_merge_cli_overrides_empty_keeps_values() {
        let mut config = ResolveMcpConfig::default();
        config.logging.level = "trace".to_string();
        merge_cli_overrides(&mut config, &CliOverrides::default()).expect("defaults are valid");
        assert_eq!(config.logging.level, "trace");
        assert_eq!(config.connection.backend, BackendKind::Python);
    }

    #[test]
    fn test_merge_cli_overrides_rejects_bad_level() {
        let mut config = ResolveMcpConfig::default();
        let overrides = CliOverrides { log_level: Some("chatty".to_string()), ..Default::default() };
        assert!(matches!(
            merge_cli_overrides(&mut config, &overrides),
            Err(ConfigError::Validation(_))
        ));
    }
}
