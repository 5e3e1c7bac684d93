//! Log output for the server.
//!
//! stdout carries MCP JSON-RPC, so every log line goes to stderr.

use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LoggingConfig;

/// Level from `[logging] level`, `INFO` when it does not parse.
pub fn parse_level(config: &LoggingConfig) -> LevelFilter {
    config.level.parse().unwrap_or(LevelFilter::INFO)
}

/// Install the global subscriber. `RUST_LOG` takes precedence over the config.
///
/// Returns `false` when a subscriber was already installed.
pub fn init(config: &LoggingConfig) -> bool {
    let filter = EnvFilter::builder()
        .with_default_directive(parse_level(config).into())
        .from_env_lossy();

    let installed = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(config.ansi)
                .with_target(false),
        )
        .with(filter)
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!("Logging initialized at level: {}", config.level);
    }
    installed
}
