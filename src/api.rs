//! Object model of the DaVinci Resolve scripting API.
//!
//! Each trait mirrors one object type handed out by the scripting API
//! (`Resolve`, `ProjectManager`, `Project`, `MediaPool`, ...). Only the calls
//! the tool handlers need are modelled. Every call can fail on the far side of
//! the bridge, so every method returns [`ApiResult`].
//!
//! Dynamic payloads (settings, properties, metadata, markers) travel as
//! [`serde_json::Value`] so they can be handed straight back to MCP clients.

use std::any::Any;
use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Failure reported by the external application (or by the bridge to it).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{call} failed: {message}")]
pub struct ApiError {
    /// Scripting call that failed, e.g. `GetProjectManager`
    pub call: String,
    /// Message reported by the application or bridge
    pub message: String,
}

impl ApiError {
    pub fn new(call: impl Into<String>, message: impl Into<String>) -> Self {
        Self { call: call.into(), message: message.into() }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Base of every scripting object.
///
/// Lets a backend recover its own concrete type when an object is passed back
/// into the API (e.g. `SetCurrentTimeline(timeline)`). Implemented per object
/// type through [`script_object!`] rather than for every `T`, so smart
/// pointers such as `Arc<dyn Folder>` do not implement it and `.as_any()` on
/// them resolves to the pointee.
pub trait ScriptObject: Any + Send + Sync {
    fn as_any(&self) -> &dyn Any;
}

/// Implement [`ScriptObject`] for backend object types.
macro_rules! script_object {
    ($($ty:ty),* $(,)?) => {
        $(
            impl $crate::api::ScriptObject for $ty {
                fn as_any(&self) -> &dyn ::std::any::Any {
                    self
                }
            }
        )*
    };
}
pub(crate) use script_object;

/// Track types in the order timeline scans visit them.
pub const TRACK_TYPES: [&str; 3] = ["video", "audio", "subtitle"];

/// A marker as accepted by `AddMarker` on timelines, timeline items and clips.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Marker {
    /// Frame offset of the marker (0 or greater).
    pub frame: i64,
    /// Marker color: Blue, Cyan, Green, Yellow, Red, Pink, Purple, Fuchsia, Rose,
    /// Lavender, Sky, Mint, Lemon, Sand, Cocoa or Cream.
    pub color: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub note: String,
    /// Duration in frames (default 1).
    #[serde(default = "default_marker_duration")]
    pub duration: i64,
    /// Arbitrary data stored with the marker.
    #[serde(default)]
    pub custom_data: String,
}

fn default_marker_duration() -> i64 {
    1
}

/// Root application object returned by `scriptapp("Resolve")`.
pub trait Resolve: ScriptObject {
    fn product_name(&self) -> ApiResult<String>;
    fn version_string(&self) -> ApiResult<String>;
    /// `[major, minor, patch, build, suffix]`
    fn version(&self) -> ApiResult<Value>;
    fn project_manager(&self) -> ApiResult<Option<Arc<dyn ProjectManager>>>;
    fn media_storage(&self) -> ApiResult<Option<Arc<dyn MediaStorage>>>;
    fn current_page(&self) -> ApiResult<Option<String>>;
    fn open_page(&self, page: &str) -> ApiResult<bool>;
    fn load_layout_preset(&self, name: &str) -> ApiResult<bool>;
    fn save_layout_preset(&self, name: &str) -> ApiResult<bool>;
    fn keyframe_mode(&self) -> ApiResult<i64>;
    fn set_keyframe_mode(&self, mode: i64) -> ApiResult<bool>;
}

pub trait ProjectManager: ScriptObject {
    /// Project names in the current database folder.
    fn project_names(&self) -> ApiResult<Vec<String>>;
    fn current_project(&self) -> ApiResult<Option<Arc<dyn Project>>>;
    fn load_project(&self, name: &str) -> ApiResult<Option<Arc<dyn Project>>>;
    fn create_project(&self, name: &str) -> ApiResult<Option<Arc<dyn Project>>>;
    fn save_project(&self) -> ApiResult<bool>;
    fn close_project(&self, project: &dyn Project) -> ApiResult<bool>;
}

pub trait Project: ScriptObject {
    fn name(&self) -> ApiResult<String>;
    fn unique_id(&self) -> ApiResult<String>;
    fn media_pool(&self) -> ApiResult<Option<Arc<dyn MediaPool>>>;
    fn gallery(&self) -> ApiResult<Option<Arc<dyn Gallery>>>;
    fn timeline_count(&self) -> ApiResult<usize>;
    /// 1-based, like the scripting API.
    fn timeline_by_index(&self, index: usize) -> ApiResult<Option<Arc<dyn Timeline>>>;
    fn current_timeline(&self) -> ApiResult<Option<Arc<dyn Timeline>>>;
    fn set_current_timeline(&self, timeline: &dyn Timeline) -> ApiResult<bool>;
    /// All settings when `name` is `None`.
    fn setting(&self, name: Option<&str>) -> ApiResult<Value>;
    fn set_setting(&self, name: &str, value: &str) -> ApiResult<bool>;
    fn render_formats(&self) -> ApiResult<Value>;
    fn render_jobs(&self) -> ApiResult<Value>;
    /// Queues a job with the current render settings, returning its id.
    fn add_render_job(&self) -> ApiResult<Option<String>>;
    fn delete_render_job(&self, job_id: &str) -> ApiResult<bool>;
    fn render_job_status(&self, job_id: &str) -> ApiResult<Value>;
    /// Renders the given jobs, or the whole queue when empty.
    fn start_rendering(&self, job_ids: &[String]) -> ApiResult<bool>;
    fn stop_rendering(&self) -> ApiResult<()>;
    fn is_rendering_in_progress(&self) -> ApiResult<bool>;
    fn delete_all_render_jobs(&self) -> ApiResult<bool>;
    /// Codec description to codec name for one render format.
    fn render_codecs(&self, format: &str) -> ApiResult<Value>;
    /// `{"format": ..., "codec": ...}`
    fn current_render_format_and_codec(&self) -> ApiResult<Value>;
    fn set_render_format_and_codec(&self, format: &str, codec: &str) -> ApiResult<bool>;
    /// Applies a map of render settings (`TargetDir`, `CustomName`, ...).
    fn set_render_settings(&self, settings: &Value) -> ApiResult<bool>;
    fn render_presets(&self) -> ApiResult<Vec<String>>;
    fn load_render_preset(&self, name: &str) -> ApiResult<bool>;
    /// Saves the current render settings under a new preset name.
    fn save_render_preset(&self, name: &str) -> ApiResult<bool>;
    fn delete_render_preset(&self, name: &str) -> ApiResult<bool>;
    fn color_groups(&self) -> ApiResult<Vec<Arc<dyn ColorGroup>>>;
    fn add_color_group(&self, name: &str) -> ApiResult<Option<Arc<dyn ColorGroup>>>;
    fn delete_color_group(&self, group: &dyn ColorGroup) -> ApiResult<bool>;
}

/// A project color group with its pre-clip and post-clip grades.
pub trait ColorGroup: ScriptObject {
    fn name(&self) -> ApiResult<String>;
    fn set_name(&self, name: &str) -> ApiResult<bool>;
    /// Items of `timeline` assigned to this group.
    fn clips_in_timeline(&self, timeline: &dyn Timeline)
        -> ApiResult<Vec<Arc<dyn TimelineItem>>>;
    fn pre_clip_node_graph(&self) -> ApiResult<Option<Arc<dyn NodeGraph>>>;
    fn post_clip_node_graph(&self) -> ApiResult<Option<Arc<dyn NodeGraph>>>;
}

pub trait MediaPool: ScriptObject {
    fn root_folder(&self) -> ApiResult<Option<Arc<dyn Folder>>>;
    fn current_folder(&self) -> ApiResult<Option<Arc<dyn Folder>>>;
    fn set_current_folder(&self, folder: &dyn Folder) -> ApiResult<bool>;
    fn add_sub_folder(&self, parent: &dyn Folder, name: &str)
        -> ApiResult<Option<Arc<dyn Folder>>>;
    fn create_empty_timeline(&self, name: &str) -> ApiResult<Option<Arc<dyn Timeline>>>;
    fn create_timeline_from_clips(
        &self,
        name: &str,
        clips: &[Arc<dyn Clip>],
    ) -> ApiResult<Option<Arc<dyn Timeline>>>;
    /// Appends to the current timeline, returning the number of items created.
    fn append_to_timeline(&self, clips: &[Arc<dyn Clip>]) -> ApiResult<usize>;
    /// Imports into the current folder, returning the new clips.
    fn import_media(&self, paths: &[String]) -> ApiResult<Vec<Arc<dyn Clip>>>;
}

pub trait Folder: ScriptObject {
    fn name(&self) -> ApiResult<String>;
    fn unique_id(&self) -> ApiResult<String>;
    /// `None` when the application returns no list at all.
    fn clips(&self) -> ApiResult<Option<Vec<Arc<dyn Clip>>>>;
    fn subfolders(&self) -> ApiResult<Option<Vec<Arc<dyn Folder>>>>;
}

/// A media pool item.
pub trait Clip: ScriptObject {
    fn name(&self) -> ApiResult<String>;
    fn unique_id(&self) -> ApiResult<String>;
    /// All clip properties when `key` is `None`.
    fn property(&self, key: Option<&str>) -> ApiResult<Value>;
    fn set_property(&self, key: &str, value: &str) -> ApiResult<bool>;
    fn metadata(&self, key: Option<&str>) -> ApiResult<Value>;
    fn set_metadata(&self, key: &str, value: &str) -> ApiResult<bool>;
    fn clip_color(&self) -> ApiResult<String>;
    fn set_clip_color(&self, color: &str) -> ApiResult<bool>;
    fn add_marker(&self, marker: &Marker) -> ApiResult<bool>;
    fn markers(&self) -> ApiResult<Value>;
}

pub trait Timeline: ScriptObject {
    fn name(&self) -> ApiResult<String>;
    fn set_name(&self, name: &str) -> ApiResult<bool>;
    fn unique_id(&self) -> ApiResult<String>;
    fn start_frame(&self) -> ApiResult<i64>;
    fn end_frame(&self) -> ApiResult<i64>;
    fn start_timecode(&self) -> ApiResult<String>;
    fn setting(&self, name: Option<&str>) -> ApiResult<Value>;
    fn track_count(&self, track_type: &str) -> ApiResult<usize>;
    /// Appends a track; `sub_type` is the audio channel layout (mono, stereo, 5.1, ...).
    fn add_track(&self, track_type: &str, sub_type: Option<&str>) -> ApiResult<bool>;
    fn delete_track(&self, track_type: &str, index: usize) -> ApiResult<bool>;
    fn track_enabled(&self, track_type: &str, index: usize) -> ApiResult<bool>;
    fn set_track_enabled(&self, track_type: &str, index: usize, enabled: bool)
        -> ApiResult<bool>;
    fn track_locked(&self, track_type: &str, index: usize) -> ApiResult<bool>;
    fn set_track_locked(&self, track_type: &str, index: usize, locked: bool) -> ApiResult<bool>;
    /// Items of the 1-based track, `None` when the application returns no list.
    fn items_in_track(
        &self,
        track_type: &str,
        index: usize,
    ) -> ApiResult<Option<Vec<Arc<dyn TimelineItem>>>>;
    fn add_marker(&self, marker: &Marker) -> ApiResult<bool>;
    fn markers(&self) -> ApiResult<Value>;
    fn delete_marker_at_frame(&self, frame: i64) -> ApiResult<bool>;
    fn current_timecode(&self) -> ApiResult<String>;
    fn set_current_timecode(&self, timecode: &str) -> ApiResult<bool>;
    fn node_graph(&self) -> ApiResult<Option<Arc<dyn NodeGraph>>>;
    /// Grabs a still of the current frame into the current gallery album.
    fn grab_still(&self) -> ApiResult<bool>;
}

pub trait TimelineItem: ScriptObject {
    fn name(&self) -> ApiResult<String>;
    fn set_name(&self, name: &str) -> ApiResult<bool>;
    fn unique_id(&self) -> ApiResult<String>;
    fn duration(&self) -> ApiResult<i64>;
    fn start(&self) -> ApiResult<i64>;
    fn end(&self) -> ApiResult<i64>;
    fn property(&self, key: Option<&str>) -> ApiResult<Value>;
    fn set_property(&self, key: &str, value: &Value) -> ApiResult<bool>;
    fn clip_enabled(&self) -> ApiResult<bool>;
    fn set_clip_enabled(&self, enabled: bool) -> ApiResult<bool>;
    fn clip_color(&self) -> ApiResult<String>;
    fn set_clip_color(&self, color: &str) -> ApiResult<bool>;
    fn add_flag(&self, color: &str) -> ApiResult<bool>;
    fn flags(&self) -> ApiResult<Vec<String>>;
    fn clear_flags(&self, color: &str) -> ApiResult<bool>;
    fn add_marker(&self, marker: &Marker) -> ApiResult<bool>;
    fn markers(&self) -> ApiResult<Value>;
    fn node_graph(&self, layer: i64) -> ApiResult<Option<Arc<dyn NodeGraph>>>;
    fn assign_to_color_group(&self, group: &dyn ColorGroup) -> ApiResult<bool>;
}

/// Color page node graph of a timeline or timeline item. Node indices are 1-based.
pub trait NodeGraph: ScriptObject {
    fn num_nodes(&self) -> ApiResult<i64>;
    fn node_label(&self, node: i64) -> ApiResult<String>;
    fn set_node_enabled(&self, node: i64, enabled: bool) -> ApiResult<bool>;
    fn set_lut(&self, node: i64, lut_path: &str) -> ApiResult<bool>;
    fn lut(&self, node: i64) -> ApiResult<String>;
    fn node_cache_mode(&self, node: i64) -> ApiResult<i64>;
    fn set_node_cache_mode(&self, node: i64, mode: i64) -> ApiResult<bool>;
    fn reset_all_grades(&self) -> ApiResult<bool>;
}

pub trait Gallery: ScriptObject {
    fn still_albums(&self) -> ApiResult<Vec<Arc<dyn StillAlbum>>>;
    fn power_grade_albums(&self) -> ApiResult<Vec<Arc<dyn StillAlbum>>>;
    fn album_name(&self, album: &dyn StillAlbum) -> ApiResult<String>;
    fn current_still_album(&self) -> ApiResult<Option<Arc<dyn StillAlbum>>>;
    fn set_current_still_album(&self, album: &dyn StillAlbum) -> ApiResult<bool>;
}

pub trait StillAlbum: ScriptObject {
    fn still_count(&self) -> ApiResult<usize>;
}

pub trait MediaStorage: ScriptObject {
    fn mounted_volumes(&self) -> ApiResult<Vec<String>>;
    fn subfolders(&self, path: &str) -> ApiResult<Vec<String>>;
    fn files(&self, path: &str) -> ApiResult<Vec<String>>;
    /// Adds files or folders to the current media pool folder, returning the clip count.
    fn add_items_to_media_pool(&self, paths: &[String]) -> ApiResult<usize>;
}

/// Acquires the root application handle.
///
/// Called once when the [`crate::Connection`] is opened and again on every
/// explicit reconnect.
pub trait Connector: Send + Sync {
    /// Short backend name used in logs.
    fn name(&self) -> &str;
    fn connect(&self) -> ApiResult<Arc<dyn Resolve>>;
}
