//! Media pool tools: folders, clips, clip properties and metadata, import and
//! timeline assembly.

use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{outcome, CLIP_COLORS, MARKER_RULES};
use crate::api::{Clip, Folder, Marker};
use crate::connection::Connection;
use crate::error::{ResolveError, Result};
use crate::guard::{rule, validate_params, with_media_pool, Constraint, ParamRule};

#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct FolderFilterInput {
    /// Folder to list. The root folder when omitted.
    #[serde(default)]
    pub folder_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct CreateFolderInput {
    pub folder_name: String,
    /// Parent folder. The root folder when omitted.
    #[serde(default)]
    pub parent_folder_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct FolderNameInput {
    /// Folder name; `root` and `master` select the root folder.
    pub folder_name: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ClipInput {
    /// Clip name as shown in the media pool.
    pub clip_name: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ClipPropertyInput {
    pub clip_name: String,
    /// Clip property, e.g. `FPS` or `Resolution`.
    pub property_name: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SetClipPropertyInput {
    pub clip_name: String,
    pub property_name: String,
    pub property_value: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ClipMetadataInput {
    pub clip_name: String,
    /// Metadata key. Every key when omitted.
    #[serde(default)]
    pub metadata_type: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SetClipMetadataInput {
    pub clip_name: String,
    pub metadata_type: String,
    pub metadata_value: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ClipColorInput {
    pub clip_name: String,
    /// Orange, Apricot, Yellow, Lime, Olive, Green, Teal, Navy, Blue, Purple,
    /// Violet, Pink, Tan, Beige, Brown or Chocolate.
    pub color: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ClipMarkerInput {
    pub clip_name: String,
    #[serde(flatten)]
    pub marker: Marker,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ImportMediaInput {
    /// Absolute paths of the files to import into the current folder.
    pub file_paths: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ClipNamesInput {
    /// Media pool clip names. Names that do not match a clip are skipped.
    pub clip_names: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct TimelineFromClipsInput {
    pub timeline_name: String,
    pub clip_names: Vec<String>,
}

const CREATE_FOLDER_RULES: [ParamRule; 2] = [
    rule("folder_name", Constraint::NonEmpty),
    rule("parent_folder_name", Constraint::NonEmpty),
];
const FOLDER_RULES: [ParamRule; 1] = [rule("folder_name", Constraint::NonEmpty)];
const CLIP_RULES: [ParamRule; 1] = [rule("clip_name", Constraint::NonEmpty)];
const PROPERTY_RULES: [ParamRule; 2] =
    [rule("clip_name", Constraint::NonEmpty), rule("property_name", Constraint::NonEmpty)];
const METADATA_RULES: [ParamRule; 2] =
    [rule("clip_name", Constraint::NonEmpty), rule("metadata_type", Constraint::NonEmpty)];
const COLOR_RULES: [ParamRule; 2] =
    [rule("clip_name", Constraint::NonEmpty), rule("color", Constraint::OneOf(&CLIP_COLORS))];
const IMPORT_RULES: [ParamRule; 1] = [rule("file_paths", Constraint::NonEmpty)];
const CLIP_NAMES_RULES: [ParamRule; 1] = [rule("clip_names", Constraint::NonEmpty)];
const TIMELINE_RULES: [ParamRule; 2] =
    [rule("timeline_name", Constraint::NonEmpty), rule("clip_names", Constraint::NonEmpty)];

/// A media pool clip as listed by the clip tools.
#[derive(Debug, Serialize)]
pub struct ClipSummary {
    pub name: String,
    pub id: String,
    pub duration: Value,
    pub fps: Value,
    pub resolution: Value,
}

impl ClipSummary {
    fn of(clip: &dyn Clip) -> Result<Self> {
        Ok(Self {
            name: clip.name()?,
            id: clip.unique_id()?,
            duration: clip.property(Some("Duration"))?,
            fps: clip.property(Some("FPS"))?,
            resolution: clip.property(Some("Resolution"))?,
        })
    }
}

fn folder(conn: &Connection, name: &str) -> Result<Arc<dyn Folder>> {
    conn.find_folder_by_name(name)?.ok_or_else(|| ResolveError::not_found("Folder", name))
}

/// The named folder, or the media pool root.
fn folder_or_root(conn: &Connection, name: Option<&str>) -> Result<Arc<dyn Folder>> {
    folder(conn, name.unwrap_or("root"))
}

/// Clips matching `names`, in order, skipping names with no match.
fn clips_named(conn: &Connection, names: &[String]) -> Result<Vec<Arc<dyn Clip>>> {
    let mut clips = Vec::new();
    for name in names {
        if let Some(clip) = conn.find_clip_by_name(name)? {
            clips.push(clip);
        }
    }
    if clips.is_empty() {
        return Err(ResolveError::not_found("Clips", names.join(", ")));
    }
    Ok(clips)
}

pub fn list_clips(conn: &Connection, input: FolderFilterInput) -> Result<Vec<ClipSummary>> {
    with_media_pool(conn, |cx| {
        let folder = folder_or_root(cx.conn, input.folder_name.as_deref())?;
        let clips = folder.clips()?.unwrap_or_default();
        clips.iter().map(|clip| ClipSummary::of(clip.as_ref())).collect()
    })
}

/// Every clip in the media pool, parents before sub-folders.
pub fn list_all_clips(conn: &Connection) -> Result<Vec<ClipSummary>> {
    with_media_pool(conn, |cx| {
        let clips = cx.conn.all_clips(None)?;
        clips.iter().map(|clip| ClipSummary::of(clip.as_ref())).collect()
    })
}

/// Names of the direct sub-folders of a folder.
pub fn list_folders(conn: &Connection, input: FolderFilterInput) -> Result<Vec<String>> {
    with_media_pool(conn, |cx| {
        let parent = folder_or_root(cx.conn, input.folder_name.as_deref())?;
        let subfolders = parent.subfolders()?.unwrap_or_default();
        subfolders.iter().map(|f| Ok(f.name()?)).collect()
    })
}

pub fn create_folder(conn: &Connection, input: CreateFolderInput) -> Result<String> {
    validate_params(&input, &CREATE_FOLDER_RULES)?;
    with_media_pool(conn, |cx| {
        let parent = folder_or_root(cx.conn, input.parent_folder_name.as_deref())?;
        let created = cx.media_pool.add_sub_folder(parent.as_ref(), &input.folder_name)?;
        Ok(outcome(
            created.is_some(),
            format!("Successfully created folder '{}'", input.folder_name),
            "Failed to create folder",
        ))
    })
}

pub fn get_current_folder(conn: &Connection) -> Result<String> {
    with_media_pool(conn, |cx| match cx.media_pool.current_folder()? {
        Some(folder) => Ok(folder.name()?),
        None => Ok("Root".to_string()),
    })
}

pub fn set_current_folder(conn: &Connection, input: FolderNameInput) -> Result<String> {
    validate_params(&input, &FOLDER_RULES)?;
    with_media_pool(conn, |cx| {
        let target = folder(cx.conn, &input.folder_name)?;
        let switched = cx.media_pool.set_current_folder(target.as_ref())?;
        Ok(outcome(
            switched,
            format!("Successfully switched to folder '{}'", input.folder_name),
            "Failed to switch folder",
        ))
    })
}

pub fn get_clip_properties(conn: &Connection, input: ClipInput) -> Result<Value> {
    validate_params(&input, &CLIP_RULES)?;
    with_media_pool(conn, |cx| Ok(cx.conn.clip(&input.clip_name)?.property(None)?))
}

pub fn get_clip_property(conn: &Connection, input: ClipPropertyInput) -> Result<Value> {
    validate_params(&input, &PROPERTY_RULES)?;
    with_media_pool(conn, |cx| {
        Ok(cx.conn.clip(&input.clip_name)?.property(Some(&input.property_name))?)
    })
}

pub fn set_clip_property(conn: &Connection, input: SetClipPropertyInput) -> Result<String> {
    validate_params(&input, &PROPERTY_RULES)?;
    with_media_pool(conn, |cx| {
        let clip = cx.conn.clip(&input.clip_name)?;
        let set = clip.set_property(&input.property_name, &input.property_value)?;
        Ok(outcome(
            set,
            format!("Successfully set '{}' to '{}'", input.property_name, input.property_value),
            "Failed to set property",
        ))
    })
}

pub fn get_clip_metadata(conn: &Connection, input: ClipMetadataInput) -> Result<Value> {
    validate_params(&input, &METADATA_RULES)?;
    with_media_pool(conn, |cx| {
        Ok(cx.conn.clip(&input.clip_name)?.metadata(input.metadata_type.as_deref())?)
    })
}

pub fn set_clip_metadata(conn: &Connection, input: SetClipMetadataInput) -> Result<String> {
    validate_params(&input, &METADATA_RULES)?;
    with_media_pool(conn, |cx| {
        let clip = cx.conn.clip(&input.clip_name)?;
        let set = clip.set_metadata(&input.metadata_type, &input.metadata_value)?;
        Ok(outcome(set, "Successfully set metadata", "Failed to set metadata"))
    })
}

pub fn set_clip_color(conn: &Connection, input: ClipColorInput) -> Result<String> {
    validate_params(&input, &COLOR_RULES)?;
    with_media_pool(conn, |cx| {
        let set = cx.conn.clip(&input.clip_name)?.set_clip_color(&input.color)?;
        Ok(outcome(
            set,
            format!("Successfully set clip color to '{}'", input.color),
            "Failed to set clip color",
        ))
    })
}

pub fn add_clip_marker(conn: &Connection, input: ClipMarkerInput) -> Result<String> {
    validate_params(&input, &CLIP_RULES)?;
    validate_params(&input.marker, &MARKER_RULES)?;
    with_media_pool(conn, |cx| {
        let added = cx.conn.clip(&input.clip_name)?.add_marker(&input.marker)?;
        Ok(outcome(
            added,
            format!("Successfully added marker at frame {}", input.marker.frame),
            "Failed to add marker",
        ))
    })
}

pub fn import_media(conn: &Connection, input: ImportMediaInput) -> Result<String> {
    validate_params(&input, &IMPORT_RULES)?;
    with_media_pool(conn, |cx| {
        let imported = cx.media_pool.import_media(&input.file_paths)?;
        Ok(outcome(
            !imported.is_empty(),
            format!("Successfully imported {} item(s)", imported.len()),
            "Failed to import media",
        ))
    })
}

pub fn append_to_timeline(conn: &Connection, input: ClipNamesInput) -> Result<String> {
    validate_params(&input, &CLIP_NAMES_RULES)?;
    with_media_pool(conn, |cx| {
        let clips = clips_named(cx.conn, &input.clip_names)?;
        let appended = cx.media_pool.append_to_timeline(&clips)?;
        Ok(outcome(
            appended > 0,
            format!("Successfully appended {} clip(s) to timeline", appended),
            "Failed to append clips",
        ))
    })
}

pub fn create_timeline_from_clips(conn: &Connection, input: TimelineFromClipsInput) -> Result<String> {
    validate_params(&input, &TIMELINE_RULES)?;
    with_media_pool(conn, |cx| {
        let clips = clips_named(cx.conn, &input.clip_names)?;
        let created = cx.media_pool.create_timeline_from_clips(&input.timeline_name, &clips)?;
        Ok(outcome(
            created.is_some(),
            format!("Successfully created timeline '{}'", input.timeline_name),
            "Failed to create timeline",
        ))
    })
}
