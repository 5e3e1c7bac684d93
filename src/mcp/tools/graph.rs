//! Color page node graph tools.
//!
//! Every tool works on the node graph of the current timeline, or on the
//! graph of one timeline item (and layer) when `item_id` is given.

use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::outcome;
use crate::api::NodeGraph;
use crate::connection::Connection;
use crate::error::{ResolveError, Result};
use crate::guard::{rule, validate_params, with_timeline, Constraint, ParamRule};

const CACHE_MODES: [(i64, &str); 3] = [(-1, "auto"), (0, "disabled"), (1, "enabled")];

/// Which graph to address.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct GraphTarget {
    /// Timeline item whose graph to use. The timeline graph when omitted.
    #[serde(default)]
    pub item_id: Option<String>,
    /// 1-based layer of the item graph.
    #[serde(default = "default_layer")]
    pub layer_idx: i64,
}

fn default_layer() -> i64 {
    1
}

impl Default for GraphTarget {
    fn default() -> Self {
        Self { item_id: None, layer_idx: default_layer() }
    }
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct NodeInput {
    #[serde(flatten)]
    pub target: GraphTarget,
    /// 1-based node index.
    pub node_index: i64,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SetNodeEnabledInput {
    #[serde(flatten)]
    pub target: GraphTarget,
    pub node_index: i64,
    pub enabled: bool,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SetNodeLutInput {
    #[serde(flatten)]
    pub target: GraphTarget,
    pub node_index: i64,
    /// Absolute path, or a path relative to the LUT folder.
    pub lut_path: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SetCacheModeInput {
    #[serde(flatten)]
    pub target: GraphTarget,
    pub node_index: i64,
    /// -1 = auto, 0 = disabled, 1 = enabled.
    pub cache_value: i64,
}

const TARGET_RULES: [ParamRule; 1] = [rule("layer_idx", Constraint::AtLeast(1))];
const NODE_RULES: [ParamRule; 2] =
    [rule("layer_idx", Constraint::AtLeast(1)), rule("node_index", Constraint::AtLeast(1))];
const LUT_RULES: [ParamRule; 3] = [
    rule("layer_idx", Constraint::AtLeast(1)),
    rule("node_index", Constraint::AtLeast(1)),
    rule("lut_path", Constraint::NonEmpty),
];
const CACHE_RULES: [ParamRule; 3] = [
    rule("layer_idx", Constraint::AtLeast(1)),
    rule("node_index", Constraint::AtLeast(1)),
    rule("cache_value", Constraint::OneOfInt(&[-1, 0, 1])),
];

fn with_graph<T>(
    conn: &Connection,
    target: &GraphTarget,
    f: impl FnOnce(Arc<dyn NodeGraph>) -> Result<T>,
) -> Result<T> {
    with_timeline(conn, |cx| {
        let graph = match &target.item_id {
            Some(item_id) => cx.conn.timeline_item(item_id)?.node_graph(target.layer_idx)?,
            None => cx.timeline.node_graph()?,
        };
        let graph = graph.ok_or_else(|| match &target.item_id {
            Some(item_id) => ResolveError::not_found(
                "Node graph",
                format!("{} layer {}", item_id, target.layer_idx),
            ),
            None => ResolveError::not_found("Node graph", "timeline"),
        })?;
        f(graph)
    })
}

/// Node count, or 0 when the graph cannot be reached.
pub fn get_num_nodes(conn: &Connection, input: GraphTarget) -> Result<i64> {
    validate_params(&input, &TARGET_RULES)?;
    match with_graph(conn, &input, |graph| Ok(graph.num_nodes()?)) {
        Err(ResolveError::NotFound { .. }) => Ok(0),
        other => other,
    }
}

pub fn get_node_label(conn: &Connection, input: NodeInput) -> Result<String> {
    validate_params(&input, &NODE_RULES)?;
    with_graph(conn, &input.target, |graph| Ok(graph.node_label(input.node_index)?))
}

pub fn set_node_enabled(conn: &Connection, input: SetNodeEnabledInput) -> Result<String> {
    validate_params(&input, &NODE_RULES)?;
    with_graph(conn, &input.target, |graph| {
        let changed = graph.set_node_enabled(input.node_index, input.enabled)?;
        let state = if input.enabled { "enabled" } else { "disabled" };
        Ok(outcome(
            changed,
            format!("Successfully {} node {}", state, input.node_index),
            "Failed to change node state",
        ))
    })
}

pub fn set_node_lut(conn: &Connection, input: SetNodeLutInput) -> Result<String> {
    validate_params(&input, &LUT_RULES)?;
    with_graph(conn, &input.target, |graph| {
        let set = graph.set_lut(input.node_index, &input.lut_path)?;
        Ok(outcome(
            set,
            format!("Successfully set LUT on node {}", input.node_index),
            "Failed to set LUT",
        ))
    })
}

pub fn get_node_lut(conn: &Connection, input: NodeInput) -> Result<String> {
    validate_params(&input, &NODE_RULES)?;
    with_graph(conn, &input.target, |graph| Ok(graph.lut(input.node_index)?))
}

/// Cache mode of a node, -1 (auto) when the graph cannot be reached.
pub fn get_node_cache_mode(conn: &Connection, input: NodeInput) -> Result<i64> {
    validate_params(&input, &NODE_RULES)?;
    match with_graph(conn, &input.target, |graph| Ok(graph.node_cache_mode(input.node_index)?)) {
        Err(ResolveError::NotFound { .. }) => Ok(-1),
        other => other,
    }
}

pub fn set_node_cache_mode(conn: &Connection, input: SetCacheModeInput) -> Result<String> {
    validate_params(&input, &CACHE_RULES)?;
    with_graph(conn, &input.target, |graph| {
        let set = graph.set_node_cache_mode(input.node_index, input.cache_value)?;
        let mode = CACHE_MODES
            .iter()
            .find(|(value, _)| *value == input.cache_value)
            .map(|(_, name)| *name)
            .unwrap_or("auto");
        Ok(outcome(
            set,
            format!("Successfully set cache mode to {}", mode),
            "Failed to set cache mode",
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::{
        MemoryConnector, MemoryResolve, MemoryTimeline, MemoryTimelineItem,
    };

    fn fixture() -> Connection {
        let app = MemoryResolve::with_project("Grade");
        let project = app.current_memory_project().unwrap();
        let timeline = project.add_timeline(MemoryTimeline::new("Online"));
        timeline.push_item("video", 1, MemoryTimelineItem::with_id("shot-1", "Wide"));
        project.set_current(&timeline);
        Connection::open(Arc::new(MemoryConnector::new(app)))
    }

    fn item_target(layer: i64) -> GraphTarget {
        GraphTarget { item_id: Some("shot-1".into()), layer_idx: layer }
    }

    fn node(target: GraphTarget, node_index: i64) -> NodeInput {
        NodeInput { target, node_index }
    }

    #[test]
    fn test_timeline_and_item_graphs() {
        let conn = fixture();
        assert_eq!(get_num_nodes(&conn, GraphTarget::default()).unwrap(), 1);
        assert_eq!(get_num_nodes(&conn, item_target(1)).unwrap(), 2);
        assert_eq!(get_num_nodes(&conn, item_target(2)).unwrap(), 0);
        assert_eq!(get_node_label(&conn, node(item_target(1), 2)).unwrap(), "Node 2");
    }

    #[test]
    fn test_missing_item_graph_is_an_error() {
        let conn = fixture();
        let err = get_node_label(&conn, node(item_target(3), 1)).unwrap_err();
        assert_eq!(err.to_string(), "Node graph 'shot-1 layer 3' not found");
        let err = get_node_label(
            &conn,
            node(GraphTarget { item_id: Some("ghost".into()), layer_idx: 1 }, 1),
        )
        .unwrap_err();
        assert_eq!(err, ResolveError::TimelineItemNotFound("ghost".into()));
    }

    #[test]
    fn test_enable_and_lut() {
        let conn = fixture();
        let msg = set_node_enabled(
            &conn,
            SetNodeEnabledInput { target: item_target(1), node_index: 1, enabled: false },
        )
        .unwrap();
        assert_eq!(msg, "Successfully disabled node 1");

        let msg = set_node_lut(
            &conn,
            SetNodeLutInput {
                target: item_target(1),
                node_index: 2,
                lut_path: "Rec709.cube".into(),
            },
        )
        .unwrap();
        assert_eq!(msg, "Successfully set LUT on node 2");
        assert_eq!(get_node_lut(&conn, node(item_target(1), 2)).unwrap(), "Rec709.cube");

        let msg = set_node_lut(
            &conn,
            SetNodeLutInput { target: item_target(1), node_index: 9, lut_path: "x.cube".into() },
        )
        .unwrap();
        assert_eq!(msg, "Failed to set LUT");
    }

    #[test]
    fn test_cache_mode() {
        let conn = fixture();
        assert_eq!(get_node_cache_mode(&conn, node(item_target(1), 1)).unwrap(), -1);
        let set = |value| SetCacheModeInput {
            target: item_target(1),
            node_index: 1,
            cache_value: value,
        };
        assert_eq!(
            set_node_cache_mode(&conn, set(1)).unwrap(),
            "Successfully set cache mode to enabled"
        );
        assert_eq!(get_node_cache_mode(&conn, node(item_target(1), 1)).unwrap(), 1);

        let err = set_node_cache_mode(&conn, set(2)).unwrap_err();
        assert_eq!(err.to_string(), "Invalid value for parameter 'cache_value': 2");
        assert_eq!(get_node_cache_mode(&conn, node(item_target(4), 1)).unwrap(), -1);
    }

    #[test]
    fn test_target_defaults_from_json() {
        let target: GraphTarget = serde_json::from_str("{}").unwrap();
        assert_eq!(target.layer_idx, 1);
        assert!(target.item_id.is_none());
        let input: NodeInput =
            serde_json::from_str(r#"{"item_id": "shot-1", "node_index": 2}"#).unwrap();
        assert_eq!(input.target.item_id.as_deref(), Some("shot-1"));
    }
}
