//! Configuration module for resolve-mcp
//!
//! Provides types, discovery and parsing for `resolve-mcp.toml`.

pub mod loader;
pub mod schema;

pub use loader::{
    find_config, find_config_from, find_xdg_config, load_config, merge_cli_overrides,
    CliOverrides, ConfigError, CONFIG_FILE_NAME,
};
pub use schema::*;
