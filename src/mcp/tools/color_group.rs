//! Color group tools: group management, membership and the pre-clip and
//! post-clip node graphs shared by a group's clips.

use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::outcome;
use crate::api::{ColorGroup, NodeGraph, Project};
use crate::connection::Connection;
use crate::error::{ResolveError, Result};
use crate::guard::{rule, validate_params, with_project, with_timeline, Constraint, ParamRule};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct GroupInput {
    /// Color group name.
    pub group_name: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct RenameGroupInput {
    /// Current color group name.
    pub group_name: String,
    pub new_name: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct GroupClipsInput {
    pub group_name: String,
    /// Timeline to search. The current timeline when omitted.
    #[serde(default)]
    pub timeline_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct GroupLutInput {
    pub group_name: String,
    /// 1-based node index in the group graph.
    pub node_index: i64,
    /// Absolute path, or a path relative to the LUT folder.
    pub lut_path: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct AssignGroupInput {
    /// Unique id of the timeline item.
    pub item_id: String,
    pub group_name: String,
}

/// Which of a group's two graphs a tool addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphStage {
    PreClip,
    PostClip,
}

impl GraphStage {
    fn label(self) -> &'static str {
        match self {
            GraphStage::PreClip => "pre-clip",
            GraphStage::PostClip => "post-clip",
        }
    }
}

const GROUP_RULES: [ParamRule; 1] = [rule("group_name", Constraint::NonEmpty)];
const RENAME_RULES: [ParamRule; 2] =
    [rule("group_name", Constraint::NonEmpty), rule("new_name", Constraint::NonEmpty)];
const LUT_RULES: [ParamRule; 3] = [
    rule("group_name", Constraint::NonEmpty),
    rule("node_index", Constraint::AtLeast(1)),
    rule("lut_path", Constraint::NonEmpty),
];
const ASSIGN_RULES: [ParamRule; 2] =
    [rule("item_id", Constraint::NonEmpty), rule("group_name", Constraint::NonEmpty)];

/// A clip listed by get_clips_in_color_group.
#[derive(Debug, PartialEq, Serialize)]
pub struct GroupClip {
    pub id: String,
    pub name: String,
}

fn find_group(project: &dyn Project, name: &str) -> Result<Arc<dyn ColorGroup>> {
    for group in project.color_groups()? {
        if group.name()? == name {
            return Ok(group);
        }
    }
    Err(ResolveError::not_found("Color group", name))
}

fn stage_graph(group: &dyn ColorGroup, stage: GraphStage) -> Result<Option<Arc<dyn NodeGraph>>> {
    Ok(match stage {
        GraphStage::PreClip => group.pre_clip_node_graph()?,
        GraphStage::PostClip => group.post_clip_node_graph()?,
    })
}

pub fn get_color_groups(conn: &Connection) -> Result<Vec<String>> {
    with_project(conn, |cx| {
        cx.project.color_groups()?.iter().map(|group| Ok(group.name()?)).collect()
    })
}

pub fn create_color_group(conn: &Connection, input: GroupInput) -> Result<String> {
    validate_params(&input, &GROUP_RULES)?;
    with_project(conn, |cx| {
        let created = cx.project.add_color_group(&input.group_name)?.is_some();
        Ok(outcome(
            created,
            format!("Successfully created color group '{}'", input.group_name),
            "Failed to create color group",
        ))
    })
}

pub fn delete_color_group(conn: &Connection, input: GroupInput) -> Result<String> {
    validate_params(&input, &GROUP_RULES)?;
    with_project(conn, |cx| {
        let group = find_group(cx.project.as_ref(), &input.group_name)?;
        let deleted = cx.project.delete_color_group(group.as_ref())?;
        Ok(outcome(
            deleted,
            format!("Successfully deleted color group '{}'", input.group_name),
            "Failed to delete color group",
        ))
    })
}

pub fn set_color_group_name(conn: &Connection, input: RenameGroupInput) -> Result<String> {
    validate_params(&input, &RENAME_RULES)?;
    with_project(conn, |cx| {
        let group = find_group(cx.project.as_ref(), &input.group_name)?;
        let renamed = group.set_name(&input.new_name)?;
        Ok(outcome(
            renamed,
            format!("Successfully renamed to '{}'", input.new_name),
            "Failed to rename color group",
        ))
    })
}

pub fn get_clips_in_color_group(
    conn: &Connection,
    input: GroupClipsInput,
) -> Result<Vec<GroupClip>> {
    validate_params(&input, &GROUP_RULES)?;
    with_project(conn, |cx| {
        let group = find_group(cx.project.as_ref(), &input.group_name)?;
        let timeline = match &input.timeline_name {
            Some(name) => cx
                .conn
                .find_timeline_by_name(name)?
                .ok_or_else(|| ResolveError::not_found("Timeline", name))?,
            None => cx.conn.current_timeline()?,
        };
        group
            .clips_in_timeline(timeline.as_ref())?
            .iter()
            .map(|item| Ok(GroupClip { id: item.unique_id()?, name: item.name()? }))
            .collect()
    })
}

/// Node count of a group graph, or a notice when the group has none.
pub fn get_group_graph_info(
    conn: &Connection,
    input: GroupInput,
    stage: GraphStage,
) -> Result<Value> {
    validate_params(&input, &GROUP_RULES)?;
    with_project(conn, |cx| {
        let group = find_group(cx.project.as_ref(), &input.group_name)?;
        Ok(match stage_graph(group.as_ref(), stage)? {
            Some(graph) => json!({ "num_nodes": graph.num_nodes()? }),
            None => json!(format!("No {} node graph", stage.label())),
        })
    })
}

pub fn set_group_lut(
    conn: &Connection,
    input: GroupLutInput,
    stage: GraphStage,
) -> Result<String> {
    validate_params(&input, &LUT_RULES)?;
    with_project(conn, |cx| {
        let group = find_group(cx.project.as_ref(), &input.group_name)?;
        let Some(graph) = stage_graph(group.as_ref(), stage)? else {
            return Ok(format!("No {} node graph", stage.label()));
        };
        let set = graph.set_lut(input.node_index, &input.lut_path)?;
        Ok(outcome(
            set,
            format!("Successfully set LUT on {} node {}", stage.label(), input.node_index),
            "Failed to set LUT",
        ))
    })
}

pub fn reset_group_grades(
    conn: &Connection,
    input: GroupInput,
    stage: GraphStage,
) -> Result<String> {
    validate_params(&input, &GROUP_RULES)?;
    with_project(conn, |cx| {
        let group = find_group(cx.project.as_ref(), &input.group_name)?;
        let Some(graph) = stage_graph(group.as_ref(), stage)? else {
            return Ok(format!("No {} node graph", stage.label()));
        };
        let reset = graph.reset_all_grades()?;
        Ok(outcome(
            reset,
            format!("Successfully reset {} grades", stage.label()),
            "Failed to reset grades",
        ))
    })
}

pub fn assign_to_color_group(conn: &Connection, input: AssignGroupInput) -> Result<String> {
    validate_params(&input, &ASSIGN_RULES)?;
    with_timeline(conn, |cx| {
        let item = cx.conn.timeline_item(&input.item_id)?;
        let group = find_group(cx.project.as_ref(), &input.group_name)?;
        let assigned = item.assign_to_color_group(group.as_ref())?;
        Ok(outcome(
            assigned,
            format!("Successfully assigned item to color group '{}'", input.group_name),
            format!("Failed to assign item to color group '{}'", input.group_name),
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::{
        MemoryConnector, MemoryResolve, MemoryTimeline, MemoryTimelineItem,
    };

    fn fixture() -> (Arc<MemoryResolve>, Connection) {
        let app = MemoryResolve::with_project("Grade");
        let project = app.current_memory_project().unwrap();
        let timeline = project.add_timeline(MemoryTimeline::new("Online"));
        timeline.push_item("video", 1, MemoryTimelineItem::with_id("shot-1", "Wide"));
        timeline.push_item("video", 1, MemoryTimelineItem::with_id("shot-2", "Close"));
        project.add_timeline(MemoryTimeline::new("Offline"));
        project.set_current(&timeline);
        let conn = Connection::open(Arc::new(MemoryConnector::new(app.clone())));
        (app, conn)
    }

    fn group(name: &str) -> GroupInput {
        GroupInput { group_name: name.to_string() }
    }

    #[test]
    fn test_create_rename_delete() {
        let (_, conn) = fixture();
        assert_eq!(get_color_groups(&conn).unwrap(), Vec::<String>::new());
        assert_eq!(
            create_color_group(&conn, group("Exterior")).unwrap(),
            "Successfully created color group 'Exterior'"
        );
        assert_eq!(
            create_color_group(&conn, group("Exterior")).unwrap(),
            "Failed to create color group"
        );

        let rename =
            RenameGroupInput { group_name: "Exterior".into(), new_name: "Day Ext".into() };
        assert_eq!(
            set_color_group_name(&conn, rename).unwrap(),
            "Successfully renamed to 'Day Ext'"
        );
        assert_eq!(get_color_groups(&conn).unwrap(), vec!["Day Ext"]);

        let err = delete_color_group(&conn, group("Exterior")).unwrap_err();
        assert_eq!(err.to_string(), "Color group 'Exterior' not found");
        assert_eq!(
            delete_color_group(&conn, group("Day Ext")).unwrap(),
            "Successfully deleted color group 'Day Ext'"
        );
        assert!(create_color_group(&conn, group(" ")).is_err());
    }

    #[test]
    fn test_assigned_clips_are_listed() {
        let (_, conn) = fixture();
        create_color_group(&conn, group("Interior")).unwrap();
        let assign = AssignGroupInput { item_id: "shot-2".into(), group_name: "Interior".into() };
        assert_eq!(
            assign_to_color_group(&conn, assign).unwrap(),
            "Successfully assigned item to color group 'Interior'"
        );

        let clips = get_clips_in_color_group(
            &conn,
            GroupClipsInput { group_name: "Interior".into(), timeline_name: None },
        )
        .unwrap();
        assert_eq!(clips, vec![GroupClip { id: "shot-2".into(), name: "Close".into() }]);

        let offline = GroupClipsInput {
            group_name: "Interior".into(),
            timeline_name: Some("Offline".into()),
        };
        let other = get_clips_in_color_group(&conn, offline).unwrap();
        assert!(other.is_empty());

        let err = get_clips_in_color_group(
            &conn,
            GroupClipsInput { group_name: "Interior".into(), timeline_name: Some("Nope".into()) },
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "Timeline 'Nope' not found");

        let missing = AssignGroupInput { item_id: "shot-9".into(), group_name: "Interior".into() };
        assert!(matches!(
            assign_to_color_group(&conn, missing),
            Err(ResolveError::TimelineItemNotFound(_))
        ));
    }

    #[test]
    fn test_group_graphs() {
        let (app, conn) = fixture();
        create_color_group(&conn, group("Night")).unwrap();
        let info = get_group_graph_info(&conn, group("Night"), GraphStage::PostClip).unwrap();
        assert_eq!(info, json!({ "num_nodes": 1 }));

        let lut = GroupLutInput {
            group_name: "Night".into(),
            node_index: 1,
            lut_path: "Film/Kodak.cube".into(),
        };
        assert_eq!(
            set_group_lut(&conn, lut, GraphStage::PreClip).unwrap(),
            "Successfully set LUT on pre-clip node 1"
        );
        let graph = app.current_memory_project().unwrap().color_group("Night").unwrap();
        assert_eq!(graph.pre_clip_graph().lut(1).unwrap(), "Film/Kodak.cube");

        assert_eq!(
            reset_group_grades(&conn, group("Night"), GraphStage::PreClip).unwrap(),
            "Successfully reset pre-clip grades"
        );
        assert_eq!(graph.pre_clip_graph().lut(1).unwrap(), "");

        let lut = GroupLutInput { group_name: "Night".into(), node_index: 4, lut_path: "x".into() };
        assert_eq!(set_group_lut(&conn, lut, GraphStage::PostClip).unwrap(), "Failed to set LUT");
        let err = get_group_graph_info(&conn, group("Day"), GraphStage::PreClip).unwrap_err();
        assert_eq!(err.to_string(), "Color group 'Day' not found");
    }
}
