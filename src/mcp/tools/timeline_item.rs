//! Tools acting on a single item of the current timeline, addressed by its
//! unique id.

use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{outcome, CLIP_COLORS, MARKER_RULES};
use crate::api::{Marker, TimelineItem};
use crate::connection::Connection;
use crate::error::{ResolveError, Result};
use crate::guard::{rule, validate_params, with_timeline, Constraint, ParamRule};

/// Flag colors plus `All`, accepted by clear_item_flags.
const FLAG_FILTERS: [&str; 17] = [
    "All", "Orange", "Apricot", "Yellow", "Lime", "Olive", "Green", "Teal", "Navy", "Blue",
    "Purple", "Violet", "Pink", "Tan", "Beige", "Brown", "Chocolate",
];

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ItemInput {
    /// Unique id of the timeline item.
    pub item_id: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ItemPropertyInput {
    pub item_id: String,
    /// Property key, e.g. `ZoomX` or `Opacity`.
    pub property_key: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SetItemPropertyInput {
    pub item_id: String,
    /// Property key, e.g. `ZoomX` or `Opacity`.
    pub property_key: String,
    pub property_value: Value,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SetItemPropertiesInput {
    pub item_id: String,
    /// Map of property key to new value.
    pub properties: Map<String, Value>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SetItemNameInput {
    pub item_id: String,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SetItemEnabledInput {
    pub item_id: String,
    pub enabled: bool,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ItemColorInput {
    pub item_id: String,
    /// Orange, Apricot, Yellow, Lime, Olive, Green, Teal, Navy, Blue, Purple,
    /// Violet, Pink, Tan, Beige, Brown or Chocolate.
    pub color: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ClearFlagsInput {
    pub item_id: String,
    /// Flag color to clear, or `All` (the default).
    #[serde(default = "default_flag_filter")]
    pub color: String,
}

fn default_flag_filter() -> String {
    "All".to_string()
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ItemMarkerInput {
    pub item_id: String,
    #[serde(flatten)]
    pub marker: Marker,
}

const ITEM_RULES: [ParamRule; 1] = [rule("item_id", Constraint::NonEmpty)];
const PROPERTY_RULES: [ParamRule; 2] =
    [rule("item_id", Constraint::NonEmpty), rule("property_key", Constraint::NonEmpty)];
const PROPERTIES_RULES: [ParamRule; 2] =
    [rule("item_id", Constraint::NonEmpty), rule("properties", Constraint::NonEmpty)];
const NAME_RULES: [ParamRule; 2] =
    [rule("item_id", Constraint::NonEmpty), rule("name", Constraint::NonEmpty)];
const COLOR_RULES: [ParamRule; 2] =
    [rule("item_id", Constraint::NonEmpty), rule("color", Constraint::OneOf(&CLIP_COLORS))];
const CLEAR_FLAG_RULES: [ParamRule; 2] =
    [rule("item_id", Constraint::NonEmpty), rule("color", Constraint::OneOf(&FLAG_FILTERS))];

/// Where an item sits in the current timeline.
#[derive(Debug, PartialEq, Serialize)]
pub struct TrackPosition {
    pub track_type: &'static str,
    pub track_index: usize,
}

/// Run `f` on the item with `item_id` in the current timeline.
fn with_item<T>(
    conn: &Connection,
    item_id: &str,
    f: impl FnOnce(Arc<dyn TimelineItem>) -> Result<T>,
) -> Result<T> {
    with_timeline(conn, |cx| f(cx.conn.timeline_item(item_id)?))
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn get_item_properties(conn: &Connection, input: ItemInput) -> Result<Value> {
    validate_params(&input, &ITEM_RULES)?;
    with_item(conn, &input.item_id, |item| Ok(item.property(None)?))
}

pub fn get_item_property(conn: &Connection, input: ItemPropertyInput) -> Result<Value> {
    validate_params(&input, &PROPERTY_RULES)?;
    with_item(conn, &input.item_id, |item| Ok(item.property(Some(&input.property_key))?))
}

pub fn set_item_property(conn: &Connection, input: SetItemPropertyInput) -> Result<String> {
    validate_params(&input, &PROPERTY_RULES)?;
    with_item(conn, &input.item_id, |item| {
        let set = item.set_property(&input.property_key, &input.property_value)?;
        Ok(outcome(
            set,
            format!(
                "Successfully set '{}' to '{}'",
                input.property_key,
                display(&input.property_value)
            ),
            format!("Failed to set property '{}'", input.property_key),
        ))
    })
}

/// Set several properties, reporting how many Resolve accepted.
pub fn set_item_properties(conn: &Connection, input: SetItemPropertiesInput) -> Result<String> {
    validate_params(&input, &PROPERTIES_RULES)?;
    with_item(conn, &input.item_id, |item| {
        let mut succeeded = 0;
        for (key, value) in &input.properties {
            if item.set_property(key, value)? {
                succeeded += 1;
            }
        }
        Ok(format!("Successfully set {}/{} properties", succeeded, input.properties.len()))
    })
}

pub fn get_item_name(conn: &Connection, input: ItemInput) -> Result<String> {
    validate_params(&input, &ITEM_RULES)?;
    with_item(conn, &input.item_id, |item| Ok(item.name()?))
}

pub fn set_item_name(conn: &Connection, input: SetItemNameInput) -> Result<String> {
    validate_params(&input, &NAME_RULES)?;
    with_item(conn, &input.item_id, |item| {
        let renamed = item.set_name(&input.name)?;
        Ok(outcome(
            renamed,
            format!("Successfully renamed item to '{}'", input.name),
            "Failed to rename item",
        ))
    })
}

pub fn set_item_enabled(conn: &Connection, input: SetItemEnabledInput) -> Result<String> {
    validate_params(&input, &ITEM_RULES)?;
    with_item(conn, &input.item_id, |item| {
        let changed = item.set_clip_enabled(input.enabled)?;
        let state = if input.enabled { "enabled" } else { "disabled" };
        Ok(outcome(
            changed,
            format!("Successfully {} item", state),
            "Failed to change item state",
        ))
    })
}

pub fn set_item_clip_color(conn: &Connection, input: ItemColorInput) -> Result<String> {
    validate_params(&input, &COLOR_RULES)?;
    with_item(conn, &input.item_id, |item| {
        let set = item.set_clip_color(&input.color)?;
        Ok(outcome(
            set,
            format!("Successfully set clip color to '{}'", input.color),
            "Failed to set clip color",
        ))
    })
}

pub fn add_item_flag(conn: &Connection, input: ItemColorInput) -> Result<String> {
    validate_params(&input, &COLOR_RULES)?;
    with_item(conn, &input.item_id, |item| {
        let added = item.add_flag(&input.color)?;
        Ok(outcome(added, format!("Successfully added {} flag", input.color), "Failed to add flag"))
    })
}

pub fn get_item_flags(conn: &Connection, input: ItemInput) -> Result<Vec<String>> {
    validate_params(&input, &ITEM_RULES)?;
    with_item(conn, &input.item_id, |item| Ok(item.flags()?))
}

pub fn clear_item_flags(conn: &Connection, input: ClearFlagsInput) -> Result<String> {
    validate_params(&input, &CLEAR_FLAG_RULES)?;
    with_item(conn, &input.item_id, |item| {
        let cleared = item.clear_flags(&input.color)?;
        Ok(outcome(
            cleared,
            format!("Successfully cleared {} flags", input.color),
            "Failed to clear flags",
        ))
    })
}

pub fn add_item_marker(conn: &Connection, input: ItemMarkerInput) -> Result<String> {
    validate_params(&input, &ITEM_RULES)?;
    validate_params(&input.marker, &MARKER_RULES)?;
    with_item(conn, &input.item_id, |item| {
        let added = item.add_marker(&input.marker)?;
        Ok(outcome(
            added,
            format!("Successfully added marker at frame {}", input.marker.frame),
            "Failed to add marker",
        ))
    })
}

pub fn get_item_markers(conn: &Connection, input: ItemInput) -> Result<Value> {
    validate_params(&input, &ITEM_RULES)?;
    with_item(conn, &input.item_id, |item| Ok(item.markers()?))
}

pub fn get_track_type_and_index(conn: &Connection, input: ItemInput) -> Result<TrackPosition> {
    validate_params(&input, &ITEM_RULES)?;
    with_timeline(conn, |cx| {
        let found = cx
            .conn
            .find_timeline_item_by_id(&input.item_id)?
            .ok_or_else(|| ResolveError::TimelineItemNotFound(input.item_id.clone()))?;
        Ok(TrackPosition { track_type: found.track_type, track_index: found.track_index })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::{
        MemoryConnector, MemoryResolve, MemoryTimeline, MemoryTimelineItem,
    };
    use serde_json::json;

    /// "Cut" with a 24-frame item `clip-1` on video 1 and `music` on audio 2.
    fn fixture() -> Connection {
        let app = MemoryResolve::with_project("Items");
        let project = app.current_memory_project().unwrap();
        let timeline = project.add_timeline(MemoryTimeline::new("Cut"));
        timeline.push_item("video", 1, MemoryTimelineItem::with_id("clip-1", "Interview"));
        timeline.push_item("audio", 2, MemoryTimelineItem::with_id("music", "Score"));
        project.set_current(&timeline);
        Connection::open(Arc::new(MemoryConnector::new(app)))
    }

    fn item(id: &str) -> ItemInput {
        ItemInput { item_id: id.to_string() }
    }

    #[test]
    fn test_unknown_item_is_reported() {
        let conn = fixture();
        let err = get_item_name(&conn, item("ghost")).unwrap_err();
        assert_eq!(err.to_string(), "Timeline item with ID 'ghost' not found");
    }

    #[test]
    fn test_properties() {
        let conn = fixture();
        let all = get_item_properties(&conn, item("clip-1")).unwrap();
        assert_eq!(all["ZoomX"], json!(1.0));

        let msg = set_item_property(
            &conn,
            SetItemPropertyInput {
                item_id: "clip-1".into(),
                property_key: "ZoomX".into(),
                property_value: json!(1.5),
            },
        )
        .unwrap();
        assert_eq!(msg, "Successfully set 'ZoomX' to '1.5'");
        let zoom = get_item_property(
            &conn,
            ItemPropertyInput { item_id: "clip-1".into(), property_key: "ZoomX".into() },
        )
        .unwrap();
        assert_eq!(zoom, json!(1.5));
    }

    #[test]
    fn test_batch_properties_count_successes() {
        let conn = fixture();
        let mut properties = Map::new();
        properties.insert("Pan".into(), json!(10));
        properties.insert("Tilt".into(), json!(-4));
        properties.insert("Sharpness".into(), json!(2));
        properties.insert("Opacity".into(), json!("half"));
        let msg = set_item_properties(
            &conn,
            SetItemPropertiesInput { item_id: "clip-1".into(), properties },
        )
        .unwrap();
        assert_eq!(msg, "Successfully set 2/4 properties");

        let empty = SetItemPropertiesInput { item_id: "clip-1".into(), properties: Map::new() };
        assert!(set_item_properties(&conn, empty).is_err());
    }

    #[test]
    fn test_name_and_enabled() {
        let conn = fixture();
        let msg = set_item_name(
            &conn,
            SetItemNameInput { item_id: "clip-1".into(), name: "Interview B".into() },
        )
        .unwrap();
        assert_eq!(msg, "Successfully renamed item to 'Interview B'");
        assert_eq!(get_item_name(&conn, item("clip-1")).unwrap(), "Interview B");

        let msg = set_item_enabled(
            &conn,
            SetItemEnabledInput { item_id: "clip-1".into(), enabled: false },
        )
        .unwrap();
        assert_eq!(msg, "Successfully disabled item");
    }

    #[test]
    fn test_colors_and_flags() {
        let conn = fixture();
        let color = |c: &str| ItemColorInput { item_id: "clip-1".into(), color: c.into() };
        assert_eq!(
            set_item_clip_color(&conn, color("Teal")).unwrap(),
            "Successfully set clip color to 'Teal'"
        );
        assert!(set_item_clip_color(&conn, color("Cyan")).is_err());

        add_item_flag(&conn, color("Orange")).unwrap();
        add_item_flag(&conn, color("Navy")).unwrap();
        assert_eq!(get_item_flags(&conn, item("clip-1")).unwrap(), vec!["Orange", "Navy"]);

        let clear = ClearFlagsInput { item_id: "clip-1".into(), color: "Orange".into() };
        assert_eq!(clear_item_flags(&conn, clear).unwrap(), "Successfully cleared Orange flags");
        assert_eq!(get_item_flags(&conn, item("clip-1")).unwrap(), vec!["Navy"]);

        let clear: ClearFlagsInput =
            serde_json::from_value(json!({ "item_id": "clip-1" })).unwrap();
        assert_eq!(clear.color, "All");
        clear_item_flags(&conn, clear).unwrap();
        assert!(get_item_flags(&conn, item("clip-1")).unwrap().is_empty());
    }

    #[test]
    fn test_item_markers() {
        let conn = fixture();
        let input: ItemMarkerInput = serde_json::from_value(json!({
            "item_id": "clip-1",
            "frame": 12,
            "color": "Green",
            "name": "Laugh",
        }))
        .unwrap();
        assert_eq!(input.marker.duration, 1);
        assert_eq!(add_item_marker(&conn, input).unwrap(), "Successfully added marker at frame 12");

        let beyond: ItemMarkerInput = serde_json::from_value(json!({
            "item_id": "clip-1",
            "frame": 24,
            "color": "Green",
        }))
        .unwrap();
        assert_eq!(add_item_marker(&conn, beyond).unwrap(), "Failed to add marker");

        let markers = get_item_markers(&conn, item("clip-1")).unwrap();
        assert_eq!(markers["12"]["name"], "Laugh");
    }

    #[test]
    fn test_track_position() {
        let conn = fixture();
        assert_eq!(
            get_track_type_and_index(&conn, item("music")).unwrap(),
            TrackPosition { track_type: "audio", track_index: 2 }
        );
        assert_eq!(
            get_track_type_and_index(&conn, item("clip-1")).unwrap(),
            TrackPosition { track_type: "video", track_index: 1 }
        );
    }
}
