//! Precondition scopes, page scoping, parameter rules and the error boundary
//! shared by every tool handler.
//!
//! Handlers are written as plain functions returning [`Result`]. They pick
//! the narrowest scope they need:
//!
//! ```ignore
//! pub fn get_markers(conn: &Connection) -> Result<Value> {
//!     with_timeline(conn, |cx| Ok(cx.timeline.markers()?))
//! }
//! ```
//!
//! and the MCP layer turns the outcome into a string with [`run_tool`].

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::api::{MediaPool, Project, Timeline};
use crate::connection::Connection;
use crate::error::{ResolveError, Result};

/// Handler context with an open project.
pub struct ProjectCtx<'a> {
    pub conn: &'a Connection,
    pub project: Arc<dyn Project>,
}

/// Handler context with an open project and its current timeline.
pub struct TimelineCtx<'a> {
    pub conn: &'a Connection,
    pub project: Arc<dyn Project>,
    pub timeline: Arc<dyn Timeline>,
}

/// Handler context with an open project and its media pool.
pub struct MediaPoolCtx<'a> {
    pub conn: &'a Connection,
    pub project: Arc<dyn Project>,
    pub media_pool: Arc<dyn MediaPool>,
}

fn ensure_connected(conn: &Connection) -> Result<()> {
    if conn.is_connected() {
        Ok(())
    } else {
        Err(ResolveError::not_connected())
    }
}

/// Run `f` only when the connection holds an application handle.
pub fn with_connection<T>(
    conn: &Connection,
    f: impl FnOnce(&Connection) -> Result<T>,
) -> Result<T> {
    ensure_connected(conn)?;
    f(conn)
}

/// Run `f` with the current project.
pub fn with_project<T>(
    conn: &Connection,
    f: impl FnOnce(ProjectCtx<'_>) -> Result<T>,
) -> Result<T> {
    ensure_connected(conn)?;
    let project = conn.current_project()?;
    f(ProjectCtx { conn, project })
}

/// Run `f` with the current project and timeline.
pub fn with_timeline<T>(
    conn: &Connection,
    f: impl FnOnce(TimelineCtx<'_>) -> Result<T>,
) -> Result<T> {
    ensure_connected(conn)?;
    let project = conn.current_project()?;
    let timeline = conn.current_timeline()?;
    f(TimelineCtx { conn, project, timeline })
}

/// Run `f` with the current project and media pool.
pub fn with_media_pool<T>(
    conn: &Connection,
    f: impl FnOnce(MediaPoolCtx<'_>) -> Result<T>,
) -> Result<T> {
    ensure_connected(conn)?;
    let project = conn.current_project()?;
    let media_pool = conn.media_pool()?;
    f(MediaPoolCtx { conn, project, media_pool })
}

/// Switches back to the recorded page when dropped.
struct PageRestore<'a> {
    conn: &'a Connection,
    restore_to: Option<String>,
}

impl Drop for PageRestore<'_> {
    fn drop(&mut self) {
        if let Some(page) = self.restore_to.take() {
            if let Err(e) = self.conn.switch_page(&page) {
                warn!(page = %page, "Failed to restore page: {}", e);
            }
        }
    }
}

/// Run `f` on `page`, then return to whichever page was showing before.
///
/// The original page is restored on every exit path, including an error
/// from `f` or a panic, as long as it was non-empty and differed from `page`.
pub fn with_page<T>(
    conn: &Connection,
    page: &str,
    f: impl FnOnce(&Connection) -> Result<T>,
) -> Result<T> {
    let original = conn.current_page()?;
    let differs = original != page;
    let _restore = PageRestore {
        conn,
        restore_to: (differs && !original.is_empty()).then(|| original.clone()),
    };
    if differs {
        debug!(from = %original, to = %page, "Switching page");
        conn.switch_page(page)?;
    }
    f(conn)
}

/// Constraint on a single input field.
#[derive(Debug, Clone, Copy)]
pub enum Constraint {
    /// Exact string match against one of the listed values
    OneOf(&'static [&'static str]),
    /// ASCII case-insensitive string match
    OneOfIgnoreCase(&'static [&'static str]),
    /// Integer equal to one of the listed values
    OneOfInt(&'static [i64]),
    /// Integer greater than or equal to the bound
    AtLeast(i64),
    /// Integer within the inclusive range
    Range(i64, i64),
    /// Non-blank string, or non-empty list / map
    NonEmpty,
}

impl Constraint {
    pub fn accepts(&self, value: &Value) -> bool {
        match *self {
            Constraint::OneOf(values) => value.as_str().is_some_and(|s| values.contains(&s)),
            Constraint::OneOfIgnoreCase(values) => value
                .as_str()
                .is_some_and(|s| values.iter().any(|v| v.eq_ignore_ascii_case(s))),
            Constraint::OneOfInt(values) => value.as_i64().is_some_and(|n| values.contains(&n)),
            Constraint::AtLeast(min) => value.as_i64().is_some_and(|n| n >= min),
            Constraint::Range(min, max) => value.as_i64().is_some_and(|n| n >= min && n <= max),
            Constraint::NonEmpty => match value {
                Value::String(s) => !s.trim().is_empty(),
                Value::Array(items) => !items.is_empty(),
                Value::Object(map) => !map.is_empty(),
                _ => true,
            },
        }
    }
}

/// A named field and the constraint its value must satisfy.
#[derive(Debug, Clone, Copy)]
pub struct ParamRule {
    pub field: &'static str,
    pub constraint: Constraint,
}

pub const fn rule(field: &'static str, constraint: Constraint) -> ParamRule {
    ParamRule { field, constraint }
}

/// Check every rule against the serialized `input`.
///
/// Fields that are absent or `null` are skipped, so optional inputs are only
/// checked when supplied.
pub fn validate_params<T: Serialize>(input: &T, rules: &[ParamRule]) -> Result<()> {
    let value = serde_json::to_value(input).map_err(|e| ResolveError::InvalidValue {
        param: "input".to_string(),
        value: e.to_string(),
    })?;
    let Some(fields) = value.as_object() else {
        return Ok(());
    };
    for rule in rules {
        match fields.get(rule.field) {
            None | Some(Value::Null) => continue,
            Some(v) if rule.constraint.accepts(v) => continue,
            Some(v) => {
                return Err(ResolveError::InvalidValue {
                    param: rule.field.to_string(),
                    value: display_value(v),
                })
            }
        }
    }
    Ok(())
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Render a handler result for the transport: strings verbatim, everything
/// else as pretty JSON.
pub fn render<T: Serialize>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(Value::String(s)) => s,
        Ok(other) => serde_json::to_string_pretty(&other).unwrap_or_else(|_| other.to_string()),
        Err(e) => format!("Error: failed to serialize result: {}", e),
    }
}

/// Convert a handler outcome to the string sent back to the client.
pub fn respond<T: Serialize>(tool: &str, result: Result<T>) -> String {
    match result {
        Ok(value) => render(&value),
        Err(e) if e.is_missing_layer() => {
            warn!(tool, kind = e.kind(), "{} unavailable: {}", tool, e);
            format!("Error: {}", e)
        }
        Err(e) => {
            error!(tool, kind = e.kind(), "Resolve error in {}: {}", tool, e);
            format!("Error: {}", e)
        }
    }
}

/// Run a handler and convert its outcome, turning a panic into an error
/// string as well.
pub fn run_tool<T: Serialize>(tool: &str, handler: impl FnOnce() -> Result<T>) -> String {
    debug!(tool, "Running tool");
    match panic::catch_unwind(AssertUnwindSafe(handler)) {
        Ok(result) => respond(tool, result),
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "handler panicked".to_string());
            error!(tool, "Unexpected error in {}: {}", tool, message);
            format!("Error: {}", message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::{MemoryConnector, MemoryResolve, MemoryTimeline};
    use serde_json::json;

    fn connected(app: Arc<MemoryResolve>) -> Connection {
        Connection::open(Arc::new(MemoryConnector::new(app)))
    }

    fn disconnected() -> Connection {
        Connection::open(Arc::new(MemoryConnector::unavailable()))
    }

    #[test]
    fn test_scopes_check_connection_first() {
        let conn = disconnected();
        let not_connected = Some(ResolveError::not_connected());
        assert_eq!(with_connection(&conn, |_| Ok(())).err(), not_connected);
        assert_eq!(with_project(&conn, |_| Ok(())).err(), not_connected);
        assert_eq!(with_timeline(&conn, |_| Ok(())).err(), not_connected);
        assert_eq!(with_media_pool(&conn, |_| Ok(())).err(), not_connected);
    }

    #[test]
    fn test_timeline_scope_reports_shallowest_missing_layer() {
        let conn = connected(MemoryResolve::new());
        assert_eq!(with_timeline(&conn, |_| Ok(())).err(), Some(ResolveError::NoProject));

        let conn = connected(MemoryResolve::with_project("NoCut"));
        assert_eq!(with_timeline(&conn, |_| Ok(())).err(), Some(ResolveError::NoTimeline));
    }

    #[test]
    fn test_scopes_inject_objects() {
        let app = MemoryResolve::with_project("Inject");
        let project = app.current_memory_project().unwrap();
        let timeline = project.add_timeline(MemoryTimeline::new("Edit 1"));
        project.set_current(&timeline);
        let conn = connected(app);

        let name = with_project(&conn, |cx| Ok(cx.project.name()?)).unwrap();
        assert_eq!(name, "Inject");
        let name = with_timeline(&conn, |cx| Ok(cx.timeline.name()?)).unwrap();
        assert_eq!(name, "Edit 1");
        let root = with_media_pool(&conn, |cx| Ok(cx.media_pool.root_folder()?.is_some()));
        assert_eq!(root, Ok(true));
    }

    #[test]
    fn test_with_page_switches_and_restores() {
        let app = MemoryResolve::with_project("Pages");
        let conn = connected(app.clone());
        conn.switch_page("edit").unwrap();

        let seen = with_page(&conn, "color", |c| c.current_page()).unwrap();
        assert_eq!(seen, "color");
        assert_eq!(conn.current_page().unwrap(), "edit");
        assert_eq!(app.page_history(), vec!["edit", "color", "edit"]);
    }

    #[test]
    fn test_with_page_restores_after_error() {
        let app = MemoryResolve::with_project("Pages");
        let conn = connected(app.clone());
        conn.switch_page("media").unwrap();

        let result: Result<()> = with_page(&conn, "color", |_| Err(ResolveError::NoTimeline));
        assert_eq!(result.err(), Some(ResolveError::NoTimeline));
        assert_eq!(conn.current_page().unwrap(), "media");
        assert_eq!(app.page_history(), vec!["media", "color", "media"]);
    }

    #[test]
    fn test_with_page_restores_after_panic() {
        let app = MemoryResolve::with_project("Pages");
        let conn = connected(app.clone());
        conn.switch_page("cut").unwrap();

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let _: Result<()> = with_page(&conn, "color", |_| panic!("grade blew up"));
        }));
        assert!(outcome.is_err());
        assert_eq!(conn.current_page().unwrap(), "cut");
    }

    #[test]
    fn test_with_page_same_page_does_not_switch() {
        let app = MemoryResolve::with_project("Pages");
        let conn = connected(app.clone());
        conn.switch_page("color").unwrap();

        with_page(&conn, "color", |_| Ok(())).unwrap();
        assert_eq!(app.page_history(), vec!["color"]);
    }

    #[test]
    fn test_with_page_empty_original_is_not_restored() {
        let app = MemoryResolve::with_project("Pages");
        let conn = connected(app.clone());
        assert_eq!(conn.current_page().unwrap(), "");

        with_page(&conn, "deliver", |_| Ok(())).unwrap();
        assert_eq!(app.page_history(), vec!["deliver"]);
    }

    #[derive(Serialize)]
    struct MarkerInput {
        frame: i64,
        color: Option<String>,
        cache: Option<i64>,
    }

    const MARKER_RULES: &[ParamRule] = &[
        rule("frame", Constraint::AtLeast(0)),
        rule("color", Constraint::OneOf(&["Blue", "Red"])),
        rule("cache", Constraint::OneOfInt(&[-1, 0, 1])),
    ];

    #[test]
    fn test_validate_params_accepts_and_skips_null() {
        let input = MarkerInput { frame: 10, color: None, cache: Some(-1) };
        assert!(validate_params(&input, MARKER_RULES).is_ok());
    }

    #[test]
    fn test_validate_params_rejects() {
        let input = MarkerInput { frame: -5, color: Some("Blue".into()), cache: None };
        let err = validate_params(&input, MARKER_RULES).unwrap_err();
        assert_eq!(err.to_string(), "Invalid value for parameter 'frame': -5");

        let input = MarkerInput { frame: 0, color: Some("Teal".into()), cache: None };
        let err = validate_params(&input, MARKER_RULES).unwrap_err();
        assert_eq!(err.to_string(), "Invalid value for parameter 'color': Teal");

        let input = MarkerInput { frame: 0, color: None, cache: Some(2) };
        assert!(validate_params(&input, MARKER_RULES).is_err());
    }

    #[test]
    fn test_constraints() {
        assert!(Constraint::OneOfIgnoreCase(&["video"]).accepts(&json!("VIDEO")));
        assert!(Constraint::Range(0, 2).accepts(&json!(2)));
        assert!(!Constraint::Range(0, 2).accepts(&json!(3)));
        assert!(!Constraint::NonEmpty.accepts(&json!("  ")));
        assert!(!Constraint::NonEmpty.accepts(&json!([])));
        assert!(Constraint::NonEmpty.accepts(&json!({"a": 1})));
    }

    #[test]
    fn test_respond_formats_errors() {
        assert_eq!(respond("get_markers", Ok("done")), "done");
        assert_eq!(
            respond::<()>("get_markers", Err(ResolveError::NoTimeline)),
            "Error: No timeline currently active"
        );
        let rendered = respond("list", Ok(vec!["a", "b"]));
        assert_eq!(serde_json::from_str::<Value>(&rendered).unwrap(), json!(["a", "b"]));
    }

    #[test]
    fn test_run_tool_catches_panics() {
        let out = run_tool::<()>("explode", || panic!("boom"));
        assert_eq!(out, "Error: boom");
        assert_eq!(run_tool("ok", || Ok(3)), "3");
    }
}
