//! Serve and status command implementations

use std::process::ExitCode;

use serde_json::Value;
use tokio::runtime::Runtime;
use tracing::error;

use super::{EXIT_ERROR, EXIT_SUCCESS};
use crate::backend::connector_for;
use crate::config::ResolveMcpConfig;
use crate::connection::Connection;
use crate::mcp::{run_server, status_report};

/// Execute the serve command
pub fn run_serve(config: &ResolveMcpConfig) -> ExitCode {
    let rt = match Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: Failed to create async runtime: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    match rt.block_on(run_server(config)) {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(e) => {
            error!("MCP server stopped: {}", e);
            eprintln!("Error: {}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}

/// Execute the status command
pub fn run_status(config: &ResolveMcpConfig, json: bool) -> ExitCode {
    let conn = Connection::open(connector_for(&config.connection));
    let report = status_report(&conn);

    if json {
        match serde_json::to_string_pretty(&report) {
            Ok(s) => println!("{}", s),
            Err(e) => {
                eprintln!("Error: {}", e);
                return ExitCode::from(EXIT_ERROR);
            }
        }
    } else {
        print!("{}", format_report(&report));
    }

    if conn.is_connected() {
        ExitCode::from(EXIT_SUCCESS)
    } else {
        ExitCode::from(EXIT_ERROR)
    }
}

fn format_report(report: &Value) -> String {
    let show = |key: &str| match &report[key] {
        Value::String(s) if !s.is_empty() => s.clone(),
        Value::Bool(b) => b.to_string(),
        _ => "-".to_string(),
    };
    let mut out = String::new();
    for (label, key) in [
        ("Backend", "backend"),
        ("Connected", "connected"),
        ("Version", "version"),
        ("Page", "page"),
        ("Project", "project"),
        ("Timeline", "timeline"),
        ("Missing", "missing"),
    ] {
        out.push_str(&format!("{:<10} {}\n", format!("{}:", label), show(key)));
    }
    out
}
