//! Timeline tools: timeline selection, tracks, markers, playhead and stills.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{outcome, MARKER_RULES};
use crate::api::{Marker, Timeline, TimelineItem, TRACK_TYPES};
use crate::connection::Connection;
use crate::error::{ResolveError, Result};
use crate::guard::{
    rule, validate_params, with_media_pool, with_page, with_project, with_timeline, Constraint,
    ParamRule,
};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct TimelineNameInput {
    /// Timeline name.
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct RenameTimelineInput {
    /// New name for the current timeline.
    pub new_name: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct TrackTypeInput {
    /// One of: video, audio, subtitle.
    pub track_type: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct TrackInput {
    /// One of: video, audio, subtitle.
    pub track_type: String,
    /// 1-based track index.
    pub track_index: i64,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct AddTrackInput {
    /// One of: video, audio, subtitle.
    pub track_type: String,
    /// Audio channel layout such as mono, stereo or 5.1.
    #[serde(default)]
    pub sub_type: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct TrackStateInput {
    /// One of: video, audio, subtitle.
    pub track_type: String,
    /// 1-based track index.
    pub track_index: i64,
    /// New state.
    pub value: bool,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct FrameInput {
    /// Frame of the marker to delete.
    pub frame: i64,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct TimecodeInput {
    /// Timecode in HH:MM:SS:FF form.
    pub timecode: String,
}

const NAME_RULES: [ParamRule; 1] = [rule("name", Constraint::NonEmpty)];
const RENAME_RULES: [ParamRule; 1] = [rule("new_name", Constraint::NonEmpty)];
const TRACK_RULES: [ParamRule; 2] = [
    rule("track_type", Constraint::OneOfIgnoreCase(&TRACK_TYPES)),
    rule("track_index", Constraint::AtLeast(1)),
];
const TRACK_TYPE_RULES: [ParamRule; 1] =
    [rule("track_type", Constraint::OneOfIgnoreCase(&TRACK_TYPES))];
const TIMECODE_RULES: [ParamRule; 1] = [rule("timecode", Constraint::NonEmpty)];

/// Summary of the current timeline.
#[derive(Debug, Serialize)]
pub struct TimelineInfo {
    pub name: String,
    pub fps: Value,
    pub resolution: Resolution,
    pub start_frame: i64,
    pub end_frame: i64,
    pub duration: i64,
    pub start_timecode: String,
    pub unique_id: String,
}

#[derive(Debug, Serialize)]
pub struct Resolution {
    pub width: Value,
    pub height: Value,
}

/// A timeline item as listed by the track tools.
#[derive(Debug, Serialize)]
pub struct ItemSummary {
    pub id: String,
    pub name: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub track_type: Option<&'static str>,
    #[serde(rename = "track", skip_serializing_if = "Option::is_none")]
    pub track_index: Option<usize>,
    pub start_frame: i64,
    pub end_frame: i64,
    pub duration: i64,
}

impl ItemSummary {
    fn of(item: &dyn TimelineItem) -> Result<Self> {
        Ok(Self {
            id: item.unique_id()?,
            name: item.name()?,
            track_type: None,
            track_index: None,
            start_frame: item.start()?,
            end_frame: item.end()?,
            duration: item.duration()?,
        })
    }
}

fn track_type_of(name: &str) -> Result<&'static str> {
    TRACK_TYPES
        .into_iter()
        .find(|t| t.eq_ignore_ascii_case(name))
        .ok_or_else(|| ResolveError::invalid_parameter("track_type", &TRACK_TYPES))
}

fn track_index(index: i64) -> Result<usize> {
    usize::try_from(index).ok().filter(|i| *i >= 1).ok_or_else(|| ResolveError::InvalidValue {
        param: "track_index".to_string(),
        value: index.to_string(),
    })
}

pub fn list_timelines(conn: &Connection) -> Result<Vec<String>> {
    with_project(conn, |cx| {
        let mut names = Vec::new();
        for index in 1..=cx.project.timeline_count()? {
            if let Some(timeline) = cx.project.timeline_by_index(index)? {
                names.push(timeline.name()?);
            }
        }
        Ok(names)
    })
}

pub fn get_current_timeline_info(conn: &Connection) -> Result<TimelineInfo> {
    with_timeline(conn, |cx| timeline_info(cx.timeline.as_ref()))
}

fn timeline_info(timeline: &dyn Timeline) -> Result<TimelineInfo> {
    let start_frame = timeline.start_frame()?;
    let end_frame = timeline.end_frame()?;
    Ok(TimelineInfo {
        name: timeline.name()?,
        fps: timeline.setting(Some("timelineFrameRate"))?,
        resolution: Resolution {
            width: timeline.setting(Some("timelineResolutionWidth"))?,
            height: timeline.setting(Some("timelineResolutionHeight"))?,
        },
        start_frame,
        end_frame,
        duration: end_frame - start_frame + 1,
        start_timecode: timeline.start_timecode()?,
        unique_id: timeline.unique_id()?,
    })
}

pub fn set_current_timeline(conn: &Connection, input: TimelineNameInput) -> Result<String> {
    validate_params(&input, &NAME_RULES)?;
    with_project(conn, |cx| {
        let timeline = cx
            .conn
            .find_timeline_by_name(&input.name)?
            .ok_or_else(|| ResolveError::not_found("Timeline", &input.name))?;
        let switched = cx.project.set_current_timeline(timeline.as_ref())?;
        Ok(outcome(
            switched,
            format!("Successfully switched to timeline '{}'", input.name),
            format!("Failed to switch to timeline '{}'", input.name),
        ))
    })
}

pub fn create_timeline(conn: &Connection, input: TimelineNameInput) -> Result<String> {
    validate_params(&input, &NAME_RULES)?;
    with_media_pool(conn, |cx| {
        let created = cx.media_pool.create_empty_timeline(&input.name)?.is_some();
        Ok(outcome(
            created,
            format!("Successfully created timeline '{}'", input.name),
            format!("Failed to create timeline '{}'", input.name),
        ))
    })
}

pub fn set_timeline_name(conn: &Connection, input: RenameTimelineInput) -> Result<String> {
    validate_params(&input, &RENAME_RULES)?;
    with_timeline(conn, |cx| {
        let old_name = cx.timeline.name()?;
        let renamed = cx.timeline.set_name(&input.new_name)?;
        Ok(outcome(
            renamed,
            format!("Successfully renamed timeline from '{}' to '{}'", old_name, input.new_name),
            "Failed to rename timeline",
        ))
    })
}

pub fn get_track_count(conn: &Connection, input: TrackTypeInput) -> Result<usize> {
    let track_type = track_type_of(&input.track_type)?;
    with_timeline(conn, |cx| Ok(cx.timeline.track_count(track_type)?))
}

pub fn get_items_in_track(conn: &Connection, input: TrackInput) -> Result<Vec<ItemSummary>> {
    validate_params(&input, &TRACK_RULES)?;
    let track_type = track_type_of(&input.track_type)?;
    let index = track_index(input.track_index)?;
    with_timeline(conn, |cx| {
        let items = cx.timeline.items_in_track(track_type, index)?.unwrap_or_default();
        items.iter().map(|item| ItemSummary::of(item.as_ref())).collect()
    })
}

pub fn add_track(conn: &Connection, input: AddTrackInput) -> Result<String> {
    validate_params(&input, &TRACK_TYPE_RULES)?;
    let track_type = track_type_of(&input.track_type)?;
    with_timeline(conn, |cx| {
        let added = cx.timeline.add_track(track_type, input.sub_type.as_deref())?;
        Ok(outcome(
            added,
            format!("Successfully added {} track", track_type),
            format!("Failed to add {} track", track_type),
        ))
    })
}

pub fn delete_track(conn: &Connection, input: TrackInput) -> Result<String> {
    validate_params(&input, &TRACK_RULES)?;
    let track_type = track_type_of(&input.track_type)?;
    let index = track_index(input.track_index)?;
    with_timeline(conn, |cx| {
        let deleted = cx.timeline.delete_track(track_type, index)?;
        Ok(outcome(
            deleted,
            format!("Successfully deleted {} track {}", track_type, index),
            "Failed to delete track",
        ))
    })
}

pub fn is_track_enabled(conn: &Connection, input: TrackInput) -> Result<bool> {
    validate_params(&input, &TRACK_RULES)?;
    let track_type = track_type_of(&input.track_type)?;
    let index = track_index(input.track_index)?;
    with_timeline(conn, |cx| Ok(cx.timeline.track_enabled(track_type, index)?))
}

pub fn set_track_enabled(conn: &Connection, input: TrackStateInput) -> Result<String> {
    validate_params(&input, &TRACK_RULES)?;
    let track_type = track_type_of(&input.track_type)?;
    let index = track_index(input.track_index)?;
    with_timeline(conn, |cx| {
        let changed = cx.timeline.set_track_enabled(track_type, index, input.value)?;
        let state = if input.value { "enabled" } else { "disabled" };
        Ok(outcome(
            changed,
            format!("Successfully {} {} track {}", state, track_type, index),
            "Failed to change track state",
        ))
    })
}

pub fn is_track_locked(conn: &Connection, input: TrackInput) -> Result<bool> {
    validate_params(&input, &TRACK_RULES)?;
    let track_type = track_type_of(&input.track_type)?;
    let index = track_index(input.track_index)?;
    with_timeline(conn, |cx| Ok(cx.timeline.track_locked(track_type, index)?))
}

pub fn set_track_locked(conn: &Connection, input: TrackStateInput) -> Result<String> {
    validate_params(&input, &TRACK_RULES)?;
    let track_type = track_type_of(&input.track_type)?;
    let index = track_index(input.track_index)?;
    with_timeline(conn, |cx| {
        let changed = cx.timeline.set_track_locked(track_type, index, input.value)?;
        let state = if input.value { "locked" } else { "unlocked" };
        Ok(outcome(
            changed,
            format!("Successfully {} {} track {}", state, track_type, index),
            "Failed to change track lock state",
        ))
    })
}

/// Items of every track, video then audio then subtitle.
pub fn get_all_timeline_items(conn: &Connection) -> Result<Vec<ItemSummary>> {
    with_timeline(conn, |cx| {
        let mut summaries = Vec::new();
        for track_type in TRACK_TYPES {
            for index in 1..=cx.timeline.track_count(track_type)? {
                for item in cx.timeline.items_in_track(track_type, index)?.unwrap_or_default() {
                    let mut summary = ItemSummary::of(item.as_ref())?;
                    summary.track_type = Some(track_type);
                    summary.track_index = Some(index);
                    summaries.push(summary);
                }
            }
        }
        Ok(summaries)
    })
}

pub fn add_marker(conn: &Connection, input: Marker) -> Result<String> {
    validate_params(&input, &MARKER_RULES)?;
    with_timeline(conn, |cx| {
        let added = cx.timeline.add_marker(&input)?;
        Ok(outcome(
            added,
            format!("Successfully added {} marker at frame {}", input.color, input.frame),
            "Failed to add marker",
        ))
    })
}

pub fn get_markers(conn: &Connection) -> Result<Value> {
    with_timeline(conn, |cx| Ok(cx.timeline.markers()?))
}

pub fn delete_marker_at_frame(conn: &Connection, input: FrameInput) -> Result<String> {
    with_timeline(conn, |cx| {
        let deleted = cx.timeline.delete_marker_at_frame(input.frame)?;
        Ok(outcome(
            deleted,
            format!("Successfully deleted marker at frame {}", input.frame),
            format!("No marker found at frame {}", input.frame),
        ))
    })
}

pub fn get_current_timecode(conn: &Connection) -> Result<String> {
    with_timeline(conn, |cx| Ok(cx.timeline.current_timecode()?))
}

pub fn set_current_timecode(conn: &Connection, input: TimecodeInput) -> Result<String> {
    validate_params(&input, &TIMECODE_RULES)?;
    with_timeline(conn, |cx| {
        let moved = cx.timeline.set_current_timecode(&input.timecode)?;
        Ok(outcome(
            moved,
            format!("Successfully set playhead to {}", input.timecode),
            format!("Failed to set playhead to {}", input.timecode),
        ))
    })
}

/// Grab a still of the current frame. Stills can only be grabbed on the
/// Color page, so the page is switched for the call and restored afterwards.
pub fn grab_still(conn: &Connection) -> Result<String> {
    with_timeline(conn, |cx| {
        with_page(cx.conn, "color", |_| {
            let grabbed = cx.timeline.grab_still()?;
            Ok(outcome(grabbed, "Successfully grabbed still", "Failed to grab still"))
        })
    })
}
