//! Handler workflows driven through the public API with the memory backend.

use std::sync::Arc;

use resolve_mcp::backend::memory::{MemoryConnector, MemoryResolve};
use resolve_mcp::guard::run_tool;
use resolve_mcp::mcp::tools::{graph, media, project, resolve, timeline, timeline_item};
use resolve_mcp::{Connection, ResolveError};
use serde_json::{json, Value};

fn demo() -> Connection {
    Connection::open(Arc::new(MemoryConnector::new(MemoryResolve::demo())))
}

#[test]
fn test_assemble_and_grade_session() {
    let conn = demo();

    let msg = media::import_media(
        &conn,
        serde_json::from_value(json!({ "file_paths": ["/Volumes/Media/Day2/B001_C001.mov"] }))
            .unwrap(),
    )
    .unwrap();
    assert_eq!(msg, "Successfully imported 1 item(s)");

    let msg = media::create_timeline_from_clips(
        &conn,
        serde_json::from_value(json!({
            "timeline_name": "Selects",
            "clip_names": ["A001_C002.mov", "B001_C001.mov"],
        }))
        .unwrap(),
    )
    .unwrap();
    assert_eq!(msg, "Successfully created timeline 'Selects'");

    let items = timeline::get_all_timeline_items(&conn).unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].name, "A001_C002.mov");
    assert_eq!(items[0].start_frame, 86400);
    assert_eq!(items[1].start_frame, 86400 + 180);

    let id = items[1].id.clone();
    let position = timeline_item::get_track_type_and_index(
        &conn,
        serde_json::from_value(json!({ "item_id": id })).unwrap(),
    )
    .unwrap();
    assert_eq!(position.track_type, "video");
    assert_eq!(position.track_index, 1);

    let nodes =
        graph::get_num_nodes(&conn, serde_json::from_value(json!({ "item_id": id })).unwrap())
            .unwrap();
    assert!(nodes >= 1);

    let page_before = resolve::get_current_page(&conn).unwrap();
    let msg = timeline::grab_still(&conn).unwrap();
    assert!(msg.starts_with("Successfully"), "unexpected: {}", msg);
    assert_eq!(resolve::get_current_page(&conn).unwrap(), page_before);
}

#[test]
fn test_precondition_errors_by_state() {
    let offline = Connection::open(Arc::new(MemoryConnector::unavailable()));
    assert!(matches!(project::list_projects(&offline), Err(ResolveError::NotConnected(_))));
    assert!(matches!(timeline::get_markers(&offline), Err(ResolveError::NotConnected(_))));

    let no_project = Connection::open(Arc::new(MemoryConnector::new(MemoryResolve::new())));
    assert_eq!(timeline::get_markers(&no_project).unwrap_err(), ResolveError::NoProject);
    assert_eq!(media::list_all_clips(&no_project).unwrap_err(), ResolveError::NoProject);

    let no_timeline =
        Connection::open(Arc::new(MemoryConnector::new(MemoryResolve::with_project("Fresh"))));
    assert_eq!(timeline::get_markers(&no_timeline).unwrap_err(), ResolveError::NoTimeline);
    assert_eq!(timeline::list_timelines(&no_timeline).unwrap(), Vec::<String>::new());

    let no_pool = Connection::open(Arc::new(MemoryConnector::new(
        MemoryResolve::with_project_without_media_pool("Broken"),
    )));
    assert_eq!(media::list_all_clips(&no_pool).unwrap_err(), ResolveError::NoMediaPool);
}

#[test]
fn test_reconnect_picks_up_started_application() {
    let connector = Arc::new(MemoryConnector::unavailable());
    let mut conn = Connection::open(connector.clone());
    assert_eq!(
        run_tool("get_version", || resolve::get_version(&conn)),
        "Error: Not connected to DaVinci Resolve"
    );

    assert_eq!(
        resolve::reconnect(&mut conn).unwrap(),
        "Failed to reconnect to DaVinci Resolve. Is it running?"
    );

    connector.set_app(Some(MemoryResolve::demo()));
    assert_eq!(resolve::reconnect(&mut conn).unwrap(), "Reconnected to DaVinci Resolve 19.1.0");
    assert_eq!(project::get_current_project_name(&conn).unwrap(), "Demo Project");
}

#[test]
fn test_run_tool_renders_structured_results() {
    let conn = demo();
    let text = run_tool("list_timelines", || timeline::list_timelines(&conn));
    let parsed: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(parsed, json!(["Assembly", "Edit 1"]));

    let text = run_tool("set_item_properties", || {
        timeline_item::set_item_properties(
            &conn,
            serde_json::from_value(json!({ "item_id": "missing", "properties": { "Pan": 1 } }))
                .unwrap(),
        )
    });
    assert_eq!(text, "Error: Timeline item with ID 'missing' not found");
}
