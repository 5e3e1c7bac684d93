//! resolve-mcp - MCP server for DaVinci Resolve

use std::process::ExitCode;

use resolve_mcp::cli;

fn main() -> ExitCode {
    cli::run()
}
