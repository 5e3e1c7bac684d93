//! Configuration schema types for `resolve-mcp.toml`
//!
//! Defines the structure and validation rules for the server configuration.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Implementation of the scripting object model to connect through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// The DaVinci Resolve scripting API through embedded Python
    #[default]
    Python,
    /// In-process simulated application
    Memory,
}

/// Levels accepted by `[logging] level`
pub const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// How to reach the running application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    #[serde(default)]
    pub backend: BackendKind,
    /// Name passed to `scriptapp`
    #[serde(default = "default_app_name")]
    pub app_name: String,
    /// Overrides the platform default for `RESOLVE_SCRIPT_API`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_path: Option<PathBuf>,
    /// Overrides the platform default for `RESOLVE_SCRIPT_LIB`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lib_path: Option<PathBuf>,
    /// Directory holding `DaVinciResolveScript`; defaults to `<api_path>/Modules`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modules_path: Option<PathBuf>,
}

fn default_app_name() -> String {
    "Resolve".to_string()
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            app_name: default_app_name(),
            api_path: None,
            lib_path: None,
            modules_path: None,
        }
    }
}

/// Log output settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Used when `RUST_LOG` is unset
    #[serde(default = "default_level")]
    pub level: String,
    /// Colour the stderr output
    #[serde(default)]
    pub ansi: bool,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_level(), ansi: false }
    }
}

/// MCP server identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_name")]
    pub name: String,
    /// Replaces the built-in instructions sent to clients
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

fn default_server_name() -> String {
    "resolve-mcp".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { name: default_server_name(), instructions: None }
    }
}

/// Complete resolve-mcp.toml configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResolveMcpConfig {
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    /// Path to the invalid field (e.g., "logging.level")
    pub field: String,
    /// Error message
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "resolve-mcp.toml: '{}' {}", self.field, self.message)
    }
}

impl ResolveMcpConfig {
    /// Validate the configuration and return any errors
    pub fn validate(&self) -> Vec<ConfigValidationError> {
        let mut errors = Vec::new();

        if self.connection.app_name.trim().is_empty() {
            errors.push(ConfigValidationError {
                field: "connection.app_name".to_string(),
                message: "must be a non-empty string".to_string(),
            });
        }

        for (field, path) in [
            ("connection.api_path", &self.connection.api_path),
            ("connection.lib_path", &self.connection.lib_path),
            ("connection.modules_path", &self.connection.modules_path),
        ] {
            if path.as_ref().is_some_and(|p| p.as_os_str().is_empty()) {
                errors.push(ConfigValidationError {
                    field: field.to_string(),
                    message: "must not be empty when set".to_string(),
                });
            }
        }

        if !LOG_LEVELS.contains(&self.logging.level.to_lowercase().as_str()) {
            errors.push(ConfigValidationError {
                field: "logging.level".to_string(),
                message: format!("must be one of: {}", LOG_LEVELS.join(", ")),
            });
        }

        if self.server.name.trim().is_empty() {
            errors.push(ConfigValidationError {
                field: "server.name".to_string(),
                message: "must be a non-empty string".to_string(),
            });
        }

        errors
    }

    /// Check if validation passed
    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_parse() {
        let config: ResolveMcpConfig = toml::from_str("").unwrap();
        assert_eq!(config, ResolveMcpConfig::default());
        assert_eq!(config.connection.backend, BackendKind::Python);
        assert_eq!(config.connection.app_name, "Resolve");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.server.name, "resolve-mcp");
        assert!(config.is_valid());
    }

    #[test]
    fn test_full_config_parse() {
        let toml = r#"
[connection]
backend = "memory"
app_name = "Resolve"
api_path = "/opt/resolve/Developer/Scripting"
lib_path = "/opt/resolve/libs/Fusion/fusionscript.so"

[logging]
level = "debug"
ansi = true

[server]
name = "edit-bay"
instructions = "Edit bay 2"
"#;
        let config: ResolveMcpConfig = toml::from_str(toml).unwrap();

        assert_eq!(config.connection.backend, BackendKind::Memory);
        assert_eq!(
            config.connection.api_path,
            Some(PathBuf::from("/opt/resolve/Developer/Scripting"))
        );
        assert!(config.connection.modules_path.is_none());
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.ansi);
        assert_eq!(config.server.name, "edit-bay");
        assert_eq!(config.server.instructions.as_deref(), Some("Edit bay 2"));
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let toml = r#"
[connection]
backend = "lua"
"#;
        assert!(toml::from_str::<ResolveMcpConfig>(toml).is_err());
    }

    #[test]
    fn test_validation_bad_level() {
        let toml = r#"
[logging]
level = "verbose"
"#;
        let config: ResolveMcpConfig = toml::from_str(toml).unwrap();
        let errors = config.validate();
        assert!(errors.iter().any(|e| e.field == "logging.level"));
    }

    #[test]
    fn test_validation_empty_names() {
        let toml = r#"
[connection]
app_name = " "

[server]
name = ""
"#;
        let config: ResolveMcpConfig = toml::from_str(toml).unwrap();
        let fields: Vec<_> = config.validate().into_iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["connection.app_name", "server.name"]);
    }

    #[test]
    fn test_validation_empty_path() {
        let toml = r#"
[connection]
lib_path = ""
"#;
        let config: ResolveMcpConfig = toml::from_str(toml).unwrap();
        let errors = config.validate();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].to_string(), "resolve-mcp.toml: 'connection.lib_path' must not be empty when set");
    }

    #[test]
    fn test_backend_value_enum() {
        assert_eq!(BackendKind::from_str("Memory", true), Ok(BackendKind::Memory));
        assert_eq!(BackendKind::from_str("python", false), Ok(BackendKind::Python));
        assert!(BackendKind::from_str("lua", true).is_err());
    }
}
