//! Implementations of the scripting object model.
//!
//! - [`memory`]: an in-process simulated Resolve, used by tests and for dry runs
//! - `python` (feature `python`): the real scripting API through embedded CPython

use std::sync::Arc;

use crate::api::Connector;
use crate::config::{BackendKind, ConnectionConfig};

pub mod memory;
#[cfg(feature = "python")]
pub mod python;

/// Build the connector selected by the configuration.
///
/// Selecting `python` in a build without the `python` feature yields a
/// connector whose every attempt fails with an explanatory message, so the
/// server still starts and reports "not connected".
pub fn connector_for(config: &ConnectionConfig) -> Arc<dyn Connector> {
    match config.backend {
        BackendKind::Memory => Arc::new(memory::MemoryConnector::new(memory::MemoryResolve::demo())),
        BackendKind::Python => python_connector(config),
    }
}

#[cfg(feature = "python")]
fn python_connector(config: &ConnectionConfig) -> Arc<dyn Connector> {
    Arc::new(python::PythonConnector::new(crate::platform::ScriptPaths::resolve(config), &config.app_name))
}

#[cfg(not(feature = "python"))]
fn python_connector(_config: &ConnectionConfig) -> Arc<dyn Connector> {
    Arc::new(Unavailable)
}

#[cfg(not(feature = "python"))]
struct Unavailable;

#[cfg(not(feature = "python"))]
impl Connector for Unavailable {
    fn name(&self) -> &str {
        "python"
    }

    fn connect(&self) -> crate::api::ApiResult<Arc<dyn crate::api::Resolve>> {
        Err(crate::api::ApiError::new(
            "scriptapp",
            "resolve-mcp was built without the `python` feature; rebuild with \
             `--features python` or use `--backend memory`",
        ))
    }
}
