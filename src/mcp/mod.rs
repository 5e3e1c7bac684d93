//! MCP (Model Context Protocol) server for DaVinci Resolve
//!
//! Exposes the Resolve scripting API as MCP tools so AI models can drive
//! projects, timelines, grading and the media pool.
//!
//! Start the server with `resolve-mcp serve` (the default command).

mod server;
pub mod tools;

pub use server::{run_server, status_report, ResolveMcpServer};
