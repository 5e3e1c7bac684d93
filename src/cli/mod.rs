//! Command-line interface implementation
//!
//! Parses arguments, loads `resolve-mcp.toml`, installs logging and
//! dispatches to the command implementations in [`serve`].

mod serve;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use crate::config::{
    load_config, merge_cli_overrides, BackendKind, CliOverrides, ConfigError, ResolveMcpConfig,
};

/// Exit codes
pub(crate) const EXIT_SUCCESS: u8 = 0;
pub(crate) const EXIT_ERROR: u8 = 1;
pub(crate) const EXIT_INVALID_ARGS: u8 = 2;

/// resolve-mcp - DaVinci Resolve scripting API over the Model Context Protocol
#[derive(Parser)]
#[command(name = "resolve-mcp")]
#[command(about = "Expose a running DaVinci Resolve to AI models as MCP tools")]
#[command(version)]
pub struct Cli {
    /// Config file (default: discover resolve-mcp.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Backend to connect through
    #[arg(long, global = true, value_enum)]
    pub backend: Option<BackendKind>,

    /// Log level: error, warn, info, debug or trace
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Commands {
    /// Serve MCP tools on stdin/stdout (default)
    Serve,
    /// Connect once and print what DaVinci Resolve currently shows
    Status {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Load the configuration and apply command-line overrides.
pub fn resolve_config(cli: &Cli) -> Result<ResolveMcpConfig, ConfigError> {
    let mut config = load_config(cli.config.as_deref())?;
    let overrides = CliOverrides { backend: cli.backend, log_level: cli.log_level.clone() };
    merge_cli_overrides(&mut config, &overrides)?;
    Ok(config)
}

/// Run the CLI and return the process exit code
pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let config = match resolve_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            let code = match e {
                ConfigError::Validation(_) => EXIT_INVALID_ARGS,
                _ => EXIT_ERROR,
            };
            return ExitCode::from(code);
        }
    };

    crate::logging::init(&config.logging);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve::run_serve(&config),
        Commands::Status { json } => serve::run_status(&config, json),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::ValueEnum;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_parse_defaults_to_serve() {
        let cli = Cli::try_parse_from(["resolve-mcp"]).unwrap();
        assert!(cli.command.is_none());
        assert!(cli.backend.is_none());
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "resolve-mcp",
            "status",
            "--json",
            "--backend",
            "memory",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(cli.command, Some(Commands::Status { json: true }));
        assert_eq!(cli.backend, Some(BackendKind::Memory));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_parse_rejects_unknown_backend() {
        let err = Cli::try_parse_from(["resolve-mcp", "--backend", "lua"]).err().unwrap();
        assert_eq!(err.kind(), clap::error::ErrorKind::InvalidValue);
        let rendered = err.to_string();
        assert!(rendered.contains("python"), "{}", rendered);
        assert!(rendered.contains("memory"), "{}", rendered);
    }

    #[test]
    fn test_backend_values_match_config_spelling() {
        let names: Vec<_> = BackendKind::value_variants()
            .iter()
            .filter_map(|v| v.to_possible_value())
            .map(|v| v.get_name().to_string())
            .collect();
        assert_eq!(names, vec!["python", "memory"]);
        let cli = Cli::try_parse_from(["resolve-mcp", "--backend", "python"]).unwrap();
        assert_eq!(cli.backend, Some(BackendKind::Python));
    }

    #[test]
    fn test_resolve_config_merges_overrides() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("resolve-mcp.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "[connection]\nbackend = \"python\"\n\n[logging]\nlevel = \"warn\"").unwrap();

        let cli = Cli::try_parse_from([
            "resolve-mcp",
            "--config",
            path.to_str().unwrap(),
            "--backend",
            "memory",
        ])
        .unwrap();
        let config = resolve_config(&cli).unwrap();
        assert_eq!(config.connection.backend, BackendKind::Memory);
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_resolve_config_rejects_bad_level() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("resolve-mcp.toml");
        std::fs::write(&path, "").unwrap();
        let cli = Cli::try_parse_from([
            "resolve-mcp",
            "--config",
            path.to_str().unwrap(),
            "--log-level",
            "chatty",
        ])
        .unwrap();
        assert!(matches!(resolve_config(&cli), Err(ConfigError::Validation(_))));
    }
}
