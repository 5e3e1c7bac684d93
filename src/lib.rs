//! resolve-mcp - DaVinci Resolve scripting API as Model Context Protocol tools
//!
//! This library provides:
//! - A [`Connection`] facade that derives the Resolve object graph on demand
//! - Precondition scopes, parameter rules and an error boundary ([`guard`])
//! - MCP tool handlers grouped by area ([`mcp::tools`])
//! - Interchangeable backends: embedded Python or an in-memory simulation

pub mod api;
pub mod backend;
pub mod cli;
pub mod config;
pub mod connection;
pub mod error;
pub mod guard;
pub mod logging;
pub mod mcp;
pub mod platform;

pub use connection::Connection;
pub use error::{ResolveError, Result};
