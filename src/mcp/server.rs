//! Core MCP server implementation.

use std::sync::Arc;

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::*;
use rmcp::{tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler, ServiceExt};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::info;

use super::tools::color_group::{self, GraphStage};
use super::tools::{gallery, graph, media, project, resolve, timeline, timeline_item};
use crate::api::Marker;
use crate::backend::connector_for;
use crate::config::ResolveMcpConfig;
use crate::connection::Connection;
use crate::error::Result as ToolResult;
use crate::guard::run_tool;

/// The DaVinci Resolve MCP Server
///
/// Owns the single [`Connection`]; each tool call holds the lock for its
/// whole duration, so calls into Resolve never overlap.
#[derive(Clone)]
pub struct ResolveMcpServer {
    conn: Arc<Mutex<Connection>>,
    name: String,
    instructions: String,
    tool_router: ToolRouter<Self>,
}

fn text(s: String) -> Result<CallToolResult, McpError> {
    Ok(CallToolResult::success(vec![Content::text(s)]))
}

fn default_instructions() -> String {
    format!(
        "Control a running DaVinci Resolve instance: projects, timelines, timeline \
         items, color page node graphs, the media pool, gallery albums and media \
         storage. Most tools need an open project; timeline tools also need a \
         current timeline. Pages: {}. Every failure is returned as text starting \
         with \"Error:\".",
        resolve::page_list()
    )
}

impl ResolveMcpServer {
    pub fn new(conn: Connection, config: &ResolveMcpConfig) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            name: config.server.name.clone(),
            instructions: config.server.instructions.clone().unwrap_or_else(default_instructions),
            tool_router: Self::tool_router(),
        }
    }

    /// Lock the connection and run one handler through the error boundary.
    async fn call<T: Serialize>(
        &self,
        tool: &str,
        handler: impl FnOnce(&Connection) -> ToolResult<T>,
    ) -> Result<CallToolResult, McpError> {
        let conn = self.conn.lock().await;
        text(run_tool(tool, || handler(&*conn)))
    }
}

#[tool_router]
impl ResolveMcpServer {
    // ------------------------------------------------------------------
    // Application
    // ------------------------------------------------------------------

    #[tool(description = "Get the DaVinci Resolve product name and version")]
    async fn get_version(&self) -> Result<CallToolResult, McpError> {
        self.call("get_version", resolve::get_version).await
    }

    #[tool(description = "Get structured version details: product, version string and components")]
    async fn get_version_info(&self) -> Result<CallToolResult, McpError> {
        self.call("get_version_info", resolve::get_version_info).await
    }

    #[tool(description = "Get the page currently shown in DaVinci Resolve")]
    async fn get_current_page(&self) -> Result<CallToolResult, McpError> {
        self.call("get_current_page", resolve::get_current_page).await
    }

    #[tool(
        description = "Switch to a page: media, cut, edit, fusion, color, fairlight or deliver"
    )]
    async fn switch_page(
        &self,
        Parameters(input): Parameters<resolve::SwitchPageInput>,
    ) -> Result<CallToolResult, McpError> {
        self.call("switch_page", |conn| resolve::switch_page(conn, input)).await
    }

    #[tool(description = "Re-establish the connection to DaVinci Resolve")]
    async fn reconnect(&self) -> Result<CallToolResult, McpError> {
        let mut conn = self.conn.lock().await;
        text(run_tool("reconnect", || resolve::reconnect(&mut *conn)))
    }

    #[tool(description = "Load a saved UI layout preset by name")]
    async fn load_layout_preset(
        &self,
        Parameters(input): Parameters<resolve::LayoutPresetInput>,
    ) -> Result<CallToolResult, McpError> {
        self.call("load_layout_preset", |conn| resolve::load_layout_preset(conn, input)).await
    }

    #[tool(description = "Save the current UI layout as a preset")]
    async fn save_layout_preset(
        &self,
        Parameters(input): Parameters<resolve::LayoutPresetInput>,
    ) -> Result<CallToolResult, McpError> {
        self.call("save_layout_preset", |conn| resolve::save_layout_preset(conn, input)).await
    }

    #[tool(description = "Get the keyframe mode (0 = All, 1 = Color, 2 = Sizing)")]
    async fn get_keyframe_mode(&self) -> Result<CallToolResult, McpError> {
        self.call("get_keyframe_mode", resolve::get_keyframe_mode).await
    }

    #[tool(description = "Set the keyframe mode (0 = All, 1 = Color, 2 = Sizing)")]
    async fn set_keyframe_mode(
        &self,
        Parameters(input): Parameters<resolve::KeyframeModeInput>,
    ) -> Result<CallToolResult, McpError> {
        self.call("set_keyframe_mode", |conn| resolve::set_keyframe_mode(conn, input)).await
    }

    #[tool(description = "List the volumes mounted in media storage")]
    async fn get_mounted_volumes(&self) -> Result<CallToolResult, McpError> {
        self.call("get_mounted_volumes", resolve::get_mounted_volumes).await
    }

    #[tool(description = "List the sub-folders of a media storage folder")]
    async fn get_storage_subfolders(
        &self,
        Parameters(input): Parameters<resolve::StoragePathInput>,
    ) -> Result<CallToolResult, McpError> {
        self.call("get_storage_subfolders", |conn| resolve::get_storage_subfolders(conn, input))
            .await
    }

    #[tool(description = "List the files in a media storage folder")]
    async fn get_storage_files(
        &self,
        Parameters(input): Parameters<resolve::StoragePathInput>,
    ) -> Result<CallToolResult, McpError> {
        self.call("get_storage_files", |conn| resolve::get_storage_files(conn, input)).await
    }

    #[tool(description = "Add files or folders from media storage to the current media pool folder")]
    async fn add_items_to_media_pool(
        &self,
        Parameters(input): Parameters<resolve::StorageItemsInput>,
    ) -> Result<CallToolResult, McpError> {
        self.call("add_items_to_media_pool", |conn| resolve::add_items_to_media_pool(conn, input))
            .await
    }

    // ------------------------------------------------------------------
    // Projects and rendering
    // ------------------------------------------------------------------

    #[tool(description = "List the projects in the current database folder")]
    async fn list_projects(&self) -> Result<CallToolResult, McpError> {
        self.call("list_projects", project::list_projects).await
    }

    #[tool(description = "Get the name of the open project")]
    async fn get_current_project_name(&self) -> Result<CallToolResult, McpError> {
        self.call("get_current_project_name", project::get_current_project_name).await
    }

    #[tool(description = "Open a project by name")]
    async fn open_project(
        &self,
        Parameters(input): Parameters<project::ProjectNameInput>,
    ) -> Result<CallToolResult, McpError> {
        self.call("open_project", |conn| project::open_project(conn, input)).await
    }

    #[tool(description = "Create a new project and open it")]
    async fn create_project(
        &self,
        Parameters(input): Parameters<project::ProjectNameInput>,
    ) -> Result<CallToolResult, McpError> {
        self.call("create_project", |conn| project::create_project(conn, input)).await
    }

    #[tool(description = "Save the open project")]
    async fn save_project(&self) -> Result<CallToolResult, McpError> {
        self.call("save_project", project::save_project).await
    }

    #[tool(description = "Close the open project")]
    async fn close_project(&self) -> Result<CallToolResult, McpError> {
        self.call("close_project", project::close_project).await
    }

    #[tool(description = "Get every setting of the open project")]
    async fn get_project_settings(&self) -> Result<CallToolResult, McpError> {
        self.call("get_project_settings", project::get_project_settings).await
    }

    #[tool(description = "Get one project setting")]
    async fn get_project_setting(
        &self,
        Parameters(input): Parameters<project::SettingNameInput>,
    ) -> Result<CallToolResult, McpError> {
        self.call("get_project_setting", |conn| project::get_project_setting(conn, input)).await
    }

    #[tool(description = "Set one project setting")]
    async fn set_project_setting(
        &self,
        Parameters(input): Parameters<project::SetSettingInput>,
    ) -> Result<CallToolResult, McpError> {
        self.call("set_project_setting", |conn| project::set_project_setting(conn, input)).await
    }

    #[tool(description = "List the available render formats")]
    async fn get_render_formats(&self) -> Result<CallToolResult, McpError> {
        self.call("get_render_formats", project::get_render_formats).await
    }

    #[tool(description = "List the jobs in the render queue")]
    async fn get_render_jobs(&self) -> Result<CallToolResult, McpError> {
        self.call("get_render_jobs", project::get_render_jobs).await
    }

    #[tool(description = "Add the current timeline to the render queue with the current settings")]
    async fn add_to_render_queue(&self) -> Result<CallToolResult, McpError> {
        self.call("add_to_render_queue", project::add_to_render_queue).await
    }

    #[tool(description = "Start rendering the given jobs, or the whole queue")]
    async fn start_rendering(
        &self,
        Parameters(input): Parameters<project::StartRenderingInput>,
    ) -> Result<CallToolResult, McpError> {
        self.call("start_rendering", |conn| project::start_rendering(conn, input)).await
    }

    #[tool(description = "Stop any render in progress")]
    async fn stop_rendering(&self) -> Result<CallToolResult, McpError> {
        self.call("stop_rendering", project::stop_rendering).await
    }

    #[tool(description = "Check whether a render is in progress")]
    async fn is_rendering_in_progress(&self) -> Result<CallToolResult, McpError> {
        self.call("is_rendering_in_progress", project::is_rendering_in_progress).await
    }

    #[tool(description = "Get the status of a render job")]
    async fn get_render_job_status(
        &self,
        Parameters(input): Parameters<project::RenderJobInput>,
    ) -> Result<CallToolResult, McpError> {
        self.call("get_render_job_status", |conn| project::get_render_job_status(conn, input)).await
    }

    #[tool(description = "Remove a job from the render queue")]
    async fn delete_render_job(
        &self,
        Parameters(input): Parameters<project::RenderJobInput>,
    ) -> Result<CallToolResult, McpError> {
        self.call("delete_render_job", |conn| project::delete_render_job(conn, input)).await
    }

    #[tool(description = "Remove every job from the render queue")]
    async fn delete_all_render_jobs(&self) -> Result<CallToolResult, McpError> {
        self.call("delete_all_render_jobs", project::delete_all_render_jobs).await
    }

    #[tool(description = "List the codecs available for a render format")]
    async fn get_render_codecs(
        &self,
        Parameters(input): Parameters<project::RenderFormatInput>,
    ) -> Result<CallToolResult, McpError> {
        self.call("get_render_codecs", |conn| project::get_render_codecs(conn, input)).await
    }

    #[tool(description = "Get the current render format and codec")]
    async fn get_current_render_format_and_codec(&self) -> Result<CallToolResult, McpError> {
        self.call(
            "get_current_render_format_and_codec",
            project::get_current_render_format_and_codec,
        )
        .await
    }

    #[tool(description = "Set the render format and codec")]
    async fn set_render_format_and_codec(
        &self,
        Parameters(input): Parameters<project::FormatAndCodecInput>,
    ) -> Result<CallToolResult, McpError> {
        self.call("set_render_format_and_codec", |conn| {
            project::set_render_format_and_codec(conn, input)
        })
        .await
    }

    #[tool(description = "Update render settings such as TargetDir, CustomName, MarkIn and MarkOut")]
    async fn set_render_settings(
        &self,
        Parameters(input): Parameters<project::RenderSettingsInput>,
    ) -> Result<CallToolResult, McpError> {
        self.call("set_render_settings", |conn| project::set_render_settings(conn, input)).await
    }

    #[tool(description = "List the render presets")]
    async fn get_render_presets(&self) -> Result<CallToolResult, McpError> {
        self.call("get_render_presets", project::get_render_presets).await
    }

    #[tool(description = "Load a render preset")]
    async fn load_render_preset(
        &self,
        Parameters(input): Parameters<project::RenderPresetInput>,
    ) -> Result<CallToolResult, McpError> {
        self.call("load_render_preset", |conn| project::load_render_preset(conn, input)).await
    }

    #[tool(description = "Save the current render settings as a new preset")]
    async fn save_render_preset(
        &self,
        Parameters(input): Parameters<project::RenderPresetInput>,
    ) -> Result<CallToolResult, McpError> {
        self.call("save_render_preset", |conn| project::save_render_preset(conn, input)).await
    }

    #[tool(description = "Delete a render preset")]
    async fn delete_render_preset(
        &self,
        Parameters(input): Parameters<project::RenderPresetInput>,
    ) -> Result<CallToolResult, McpError> {
        self.call("delete_render_preset", |conn| project::delete_render_preset(conn, input)).await
    }

    // ------------------------------------------------------------------
    // Timelines
    // ------------------------------------------------------------------

    #[tool(description = "List the timelines of the open project")]
    async fn list_timelines(&self) -> Result<CallToolResult, McpError> {
        self.call("list_timelines", timeline::list_timelines).await
    }

    #[tool(description = "Get name, frame rate, resolution and range of the current timeline")]
    async fn get_current_timeline_info(&self) -> Result<CallToolResult, McpError> {
        self.call("get_current_timeline_info", timeline::get_current_timeline_info).await
    }

    #[tool(description = "Make a timeline current by name")]
    async fn set_current_timeline(
        &self,
        Parameters(input): Parameters<timeline::TimelineNameInput>,
    ) -> Result<CallToolResult, McpError> {
        self.call("set_current_timeline", |conn| timeline::set_current_timeline(conn, input)).await
    }

    #[tool(description = "Create an empty timeline")]
    async fn create_timeline(
        &self,
        Parameters(input): Parameters<timeline::TimelineNameInput>,
    ) -> Result<CallToolResult, McpError> {
        self.call("create_timeline", |conn| timeline::create_timeline(conn, input)).await
    }

    #[tool(description = "Rename the current timeline")]
    async fn set_timeline_name(
        &self,
        Parameters(input): Parameters<timeline::RenameTimelineInput>,
    ) -> Result<CallToolResult, McpError> {
        self.call("set_timeline_name", |conn| timeline::set_timeline_name(conn, input)).await
    }

    #[tool(description = "Count the video, audio or subtitle tracks of the current timeline")]
    async fn get_track_count(
        &self,
        Parameters(input): Parameters<timeline::TrackTypeInput>,
    ) -> Result<CallToolResult, McpError> {
        self.call("get_track_count", |conn| timeline::get_track_count(conn, input)).await
    }

    #[tool(description = "List the items on one track of the current timeline")]
    async fn get_items_in_track(
        &self,
        Parameters(input): Parameters<timeline::TrackInput>,
    ) -> Result<CallToolResult, McpError> {
        self.call("get_items_in_track", |conn| timeline::get_items_in_track(conn, input)).await
    }

    #[tool(description = "Add a video, audio or subtitle track to the current timeline")]
    async fn add_track(
        &self,
        Parameters(input): Parameters<timeline::AddTrackInput>,
    ) -> Result<CallToolResult, McpError> {
        self.call("add_track", |conn| timeline::add_track(conn, input)).await
    }

    #[tool(description = "Delete a track of the current timeline")]
    async fn delete_track(
        &self,
        Parameters(input): Parameters<timeline::TrackInput>,
    ) -> Result<CallToolResult, McpError> {
        self.call("delete_track", |conn| timeline::delete_track(conn, input)).await
    }

    #[tool(description = "Check whether a track of the current timeline is enabled")]
    async fn is_track_enabled(
        &self,
        Parameters(input): Parameters<timeline::TrackInput>,
    ) -> Result<CallToolResult, McpError> {
        self.call("is_track_enabled", |conn| timeline::is_track_enabled(conn, input)).await
    }

    #[tool(description = "Enable or disable a track of the current timeline")]
    async fn set_track_enabled(
        &self,
        Parameters(input): Parameters<timeline::TrackStateInput>,
    ) -> Result<CallToolResult, McpError> {
        self.call("set_track_enabled", |conn| timeline::set_track_enabled(conn, input)).await
    }

    #[tool(description = "Check whether a track of the current timeline is locked")]
    async fn is_track_locked(
        &self,
        Parameters(input): Parameters<timeline::TrackInput>,
    ) -> Result<CallToolResult, McpError> {
        self.call("is_track_locked", |conn| timeline::is_track_locked(conn, input)).await
    }

    #[tool(description = "Lock or unlock a track of the current timeline")]
    async fn set_track_locked(
        &self,
        Parameters(input): Parameters<timeline::TrackStateInput>,
    ) -> Result<CallToolResult, McpError> {
        self.call("set_track_locked", |conn| timeline::set_track_locked(conn, input)).await
    }

    #[tool(description = "List every item on every track of the current timeline")]
    async fn get_all_timeline_items(&self) -> Result<CallToolResult, McpError> {
        self.call("get_all_timeline_items", timeline::get_all_timeline_items).await
    }

    #[tool(description = "Add a marker to the current timeline")]
    async fn add_marker(
        &self,
        Parameters(input): Parameters<Marker>,
    ) -> Result<CallToolResult, McpError> {
        self.call("add_marker", |conn| timeline::add_marker(conn, input)).await
    }

    #[tool(description = "List the markers of the current timeline")]
    async fn get_markers(&self) -> Result<CallToolResult, McpError> {
        self.call("get_markers", timeline::get_markers).await
    }

    #[tool(description = "Delete the timeline marker at a frame")]
    async fn delete_marker_at_frame(
        &self,
        Parameters(input): Parameters<timeline::FrameInput>,
    ) -> Result<CallToolResult, McpError> {
        self.call("delete_marker_at_frame", |conn| timeline::delete_marker_at_frame(conn, input))
            .await
    }

    #[tool(description = "Get the playhead timecode of the current timeline")]
    async fn get_current_timecode(&self) -> Result<CallToolResult, McpError> {
        self.call("get_current_timecode", timeline::get_current_timecode).await
    }

    #[tool(description = "Move the playhead of the current timeline to a timecode")]
    async fn set_current_timecode(
        &self,
        Parameters(input): Parameters<timeline::TimecodeInput>,
    ) -> Result<CallToolResult, McpError> {
        self.call("set_current_timecode", |conn| timeline::set_current_timecode(conn, input)).await
    }

    #[tool(description = "Grab a still of the current frame into the gallery (uses the color page)")]
    async fn grab_still(&self) -> Result<CallToolResult, McpError> {
        self.call("grab_still", timeline::grab_still).await
    }

    // ------------------------------------------------------------------
    // Timeline items
    // ------------------------------------------------------------------

    #[tool(description = "Get every property of a timeline item")]
    async fn get_item_properties(
        &self,
        Parameters(input): Parameters<timeline_item::ItemInput>,
    ) -> Result<CallToolResult, McpError> {
        self.call("get_item_properties", |conn| timeline_item::get_item_properties(conn, input))
            .await
    }

    #[tool(description = "Get one property of a timeline item")]
    async fn get_item_property(
        &self,
        Parameters(input): Parameters<timeline_item::ItemPropertyInput>,
    ) -> Result<CallToolResult, McpError> {
        self.call("get_item_property", |conn| timeline_item::get_item_property(conn, input)).await
    }

    #[tool(description = "Set one property of a timeline item")]
    async fn set_item_property(
        &self,
        Parameters(input): Parameters<timeline_item::SetItemPropertyInput>,
    ) -> Result<CallToolResult, McpError> {
        self.call("set_item_property", |conn| timeline_item::set_item_property(conn, input)).await
    }

    #[tool(description = "Set several properties of a timeline item, reporting how many succeeded")]
    async fn set_item_properties(
        &self,
        Parameters(input): Parameters<timeline_item::SetItemPropertiesInput>,
    ) -> Result<CallToolResult, McpError> {
        self.call("set_item_properties", |conn| timeline_item::set_item_properties(conn, input))
            .await
    }

    #[tool(description = "Get the name of a timeline item")]
    async fn get_item_name(
        &self,
        Parameters(input): Parameters<timeline_item::ItemInput>,
    ) -> Result<CallToolResult, McpError> {
        self.call("get_item_name", |conn| timeline_item::get_item_name(conn, input)).await
    }

    #[tool(description = "Rename a timeline item")]
    async fn set_item_name(
        &self,
        Parameters(input): Parameters<timeline_item::SetItemNameInput>,
    ) -> Result<CallToolResult, McpError> {
        self.call("set_item_name", |conn| timeline_item::set_item_name(conn, input)).await
    }

    #[tool(description = "Enable or disable a timeline item")]
    async fn set_item_enabled(
        &self,
        Parameters(input): Parameters<timeline_item::SetItemEnabledInput>,
    ) -> Result<CallToolResult, McpError> {
        self.call("set_item_enabled", |conn| timeline_item::set_item_enabled(conn, input)).await
    }

    #[tool(description = "Set the clip color of a timeline item")]
    async fn set_item_clip_color(
        &self,
        Parameters(input): Parameters<timeline_item::ItemColorInput>,
    ) -> Result<CallToolResult, McpError> {
        self.call("set_item_clip_color", |conn| timeline_item::set_item_clip_color(conn, input))
            .await
    }

    #[tool(description = "Add a colored flag to a timeline item")]
    async fn add_item_flag(
        &self,
        Parameters(input): Parameters<timeline_item::ItemColorInput>,
    ) -> Result<CallToolResult, McpError> {
        self.call("add_item_flag", |conn| timeline_item::add_item_flag(conn, input)).await
    }

    #[tool(description = "List the flag colors of a timeline item")]
    async fn get_item_flags(
        &self,
        Parameters(input): Parameters<timeline_item::ItemInput>,
    ) -> Result<CallToolResult, McpError> {
        self.call("get_item_flags", |conn| timeline_item::get_item_flags(conn, input)).await
    }

    #[tool(description = "Clear flags of one color, or all flags, from a timeline item")]
    async fn clear_item_flags(
        &self,
        Parameters(input): Parameters<timeline_item::ClearFlagsInput>,
    ) -> Result<CallToolResult, McpError> {
        self.call("clear_item_flags", |conn| timeline_item::clear_item_flags(conn, input)).await
    }

    #[tool(description = "Add a marker to a timeline item")]
    async fn add_item_marker(
        &self,
        Parameters(input): Parameters<timeline_item::ItemMarkerInput>,
    ) -> Result<CallToolResult, McpError> {
        self.call("add_item_marker", |conn| timeline_item::add_item_marker(conn, input)).await
    }

    #[tool(description = "List the markers of a timeline item")]
    async fn get_item_markers(
        &self,
        Parameters(input): Parameters<timeline_item::ItemInput>,
    ) -> Result<CallToolResult, McpError> {
        self.call("get_item_markers", |conn| timeline_item::get_item_markers(conn, input)).await
    }

    #[tool(description = "Get the track type and 1-based track index holding a timeline item")]
    async fn get_track_type_and_index(
        &self,
        Parameters(input): Parameters<timeline_item::ItemInput>,
    ) -> Result<CallToolResult, McpError> {
        self.call("get_track_type_and_index", |conn| {
            timeline_item::get_track_type_and_index(conn, input)
        })
        .await
    }

    // ------------------------------------------------------------------
    // Node graphs
    // ------------------------------------------------------------------

    #[tool(description = "Count the nodes of the timeline graph, or of a timeline item's graph")]
    async fn get_num_nodes(
        &self,
        Parameters(input): Parameters<graph::GraphTarget>,
    ) -> Result<CallToolResult, McpError> {
        self.call("get_num_nodes", |conn| graph::get_num_nodes(conn, input)).await
    }

    #[tool(description = "Get the label of a node")]
    async fn get_node_label(
        &self,
        Parameters(input): Parameters<graph::NodeInput>,
    ) -> Result<CallToolResult, McpError> {
        self.call("get_node_label", |conn| graph::get_node_label(conn, input)).await
    }

    #[tool(description = "Enable or disable a node")]
    async fn set_node_enabled(
        &self,
        Parameters(input): Parameters<graph::SetNodeEnabledInput>,
    ) -> Result<CallToolResult, McpError> {
        self.call("set_node_enabled", |conn| graph::set_node_enabled(conn, input)).await
    }

    #[tool(description = "Apply a LUT to a node")]
    async fn set_node_lut(
        &self,
        Parameters(input): Parameters<graph::SetNodeLutInput>,
    ) -> Result<CallToolResult, McpError> {
        self.call("set_node_lut", |conn| graph::set_node_lut(conn, input)).await
    }

    #[tool(description = "Get the LUT applied to a node")]
    async fn get_node_lut(
        &self,
        Parameters(input): Parameters<graph::NodeInput>,
    ) -> Result<CallToolResult, McpError> {
        self.call("get_node_lut", |conn| graph::get_node_lut(conn, input)).await
    }

    #[tool(description = "Get the cache mode of a node (-1 = auto, 0 = disabled, 1 = enabled)")]
    async fn get_node_cache_mode(
        &self,
        Parameters(input): Parameters<graph::NodeInput>,
    ) -> Result<CallToolResult, McpError> {
        self.call("get_node_cache_mode", |conn| graph::get_node_cache_mode(conn, input)).await
    }

    #[tool(description = "Set the cache mode of a node (-1 = auto, 0 = disabled, 1 = enabled)")]
    async fn set_node_cache_mode(
        &self,
        Parameters(input): Parameters<graph::SetCacheModeInput>,
    ) -> Result<CallToolResult, McpError> {
        self.call("set_node_cache_mode", |conn| graph::set_node_cache_mode(conn, input)).await
    }

    // ------------------------------------------------------------------
    // Color groups
    // ------------------------------------------------------------------

    #[tool(description = "List the color groups of the open project")]
    async fn get_color_groups(&self) -> Result<CallToolResult, McpError> {
        self.call("get_color_groups", color_group::get_color_groups).await
    }

    #[tool(description = "Create a color group")]
    async fn create_color_group(
        &self,
        Parameters(input): Parameters<color_group::GroupInput>,
    ) -> Result<CallToolResult, McpError> {
        self.call("create_color_group", |conn| color_group::create_color_group(conn, input)).await
    }

    #[tool(description = "Delete a color group")]
    async fn delete_color_group(
        &self,
        Parameters(input): Parameters<color_group::GroupInput>,
    ) -> Result<CallToolResult, McpError> {
        self.call("delete_color_group", |conn| color_group::delete_color_group(conn, input)).await
    }

    #[tool(description = "Rename a color group")]
    async fn set_color_group_name(
        &self,
        Parameters(input): Parameters<color_group::RenameGroupInput>,
    ) -> Result<CallToolResult, McpError> {
        self.call("set_color_group_name", |conn| color_group::set_color_group_name(conn, input))
            .await
    }

    #[tool(description = "List the clips of a color group in a timeline (the current one by default)")]
    async fn get_clips_in_color_group(
        &self,
        Parameters(input): Parameters<color_group::GroupClipsInput>,
    ) -> Result<CallToolResult, McpError> {
        self.call("get_clips_in_color_group", |conn| {
            color_group::get_clips_in_color_group(conn, input)
        })
        .await
    }

    #[tool(description = "Assign a timeline item to a color group")]
    async fn assign_to_color_group(
        &self,
        Parameters(input): Parameters<color_group::AssignGroupInput>,
    ) -> Result<CallToolResult, McpError> {
        self.call("assign_to_color_group", |conn| color_group::assign_to_color_group(conn, input))
            .await
    }

    #[tool(description = "Get the node count of a color group's pre-clip graph")]
    async fn get_pre_clip_node_graph_info(
        &self,
        Parameters(input): Parameters<color_group::GroupInput>,
    ) -> Result<CallToolResult, McpError> {
        self.call("get_pre_clip_node_graph_info", |conn| {
            color_group::get_group_graph_info(conn, input, GraphStage::PreClip)
        })
        .await
    }

    #[tool(description = "Get the node count of a color group's post-clip graph")]
    async fn get_post_clip_node_graph_info(
        &self,
        Parameters(input): Parameters<color_group::GroupInput>,
    ) -> Result<CallToolResult, McpError> {
        self.call("get_post_clip_node_graph_info", |conn| {
            color_group::get_group_graph_info(conn, input, GraphStage::PostClip)
        })
        .await
    }

    #[tool(description = "Apply a LUT to a node of a color group's pre-clip graph")]
    async fn set_pre_clip_lut(
        &self,
        Parameters(input): Parameters<color_group::GroupLutInput>,
    ) -> Result<CallToolResult, McpError> {
        self.call("set_pre_clip_lut", |conn| {
            color_group::set_group_lut(conn, input, GraphStage::PreClip)
        })
        .await
    }

    #[tool(description = "Apply a LUT to a node of a color group's post-clip graph")]
    async fn set_post_clip_lut(
        &self,
        Parameters(input): Parameters<color_group::GroupLutInput>,
    ) -> Result<CallToolResult, McpError> {
        self.call("set_post_clip_lut", |conn| {
            color_group::set_group_lut(conn, input, GraphStage::PostClip)
        })
        .await
    }

    #[tool(description = "Reset every grade of a color group's pre-clip graph")]
    async fn reset_pre_clip_grades(
        &self,
        Parameters(input): Parameters<color_group::GroupInput>,
    ) -> Result<CallToolResult, McpError> {
        self.call("reset_pre_clip_grades", |conn| {
            color_group::reset_group_grades(conn, input, GraphStage::PreClip)
        })
        .await
    }

    #[tool(description = "Reset every grade of a color group's post-clip graph")]
    async fn reset_post_clip_grades(
        &self,
        Parameters(input): Parameters<color_group::GroupInput>,
    ) -> Result<CallToolResult, McpError> {
        self.call("reset_post_clip_grades", |conn| {
            color_group::reset_group_grades(conn, input, GraphStage::PostClip)
        })
        .await
    }

    // ------------------------------------------------------------------
    // Media pool
    // ------------------------------------------------------------------

    #[tool(description = "List the clips of a media pool folder (the root folder by default)")]
    async fn list_clips(
        &self,
        Parameters(input): Parameters<media::FolderFilterInput>,
    ) -> Result<CallToolResult, McpError> {
        self.call("list_clips", |conn| media::list_clips(conn, input)).await
    }

    #[tool(description = "List the sub-folders of a media pool folder (the root folder by default)")]
    async fn list_folders(
        &self,
        Parameters(input): Parameters<media::FolderFilterInput>,
    ) -> Result<CallToolResult, McpError> {
        self.call("list_folders", |conn| media::list_folders(conn, input)).await
    }

    #[tool(description = "List every clip in the media pool, including sub-folders")]
    async fn list_all_clips(&self) -> Result<CallToolResult, McpError> {
        self.call("list_all_clips", media::list_all_clips).await
    }

    #[tool(description = "Create a media pool folder")]
    async fn create_folder(
        &self,
        Parameters(input): Parameters<media::CreateFolderInput>,
    ) -> Result<CallToolResult, McpError> {
        self.call("create_folder", |conn| media::create_folder(conn, input)).await
    }

    #[tool(description = "Get the name of the current media pool folder")]
    async fn get_current_folder(&self) -> Result<CallToolResult, McpError> {
        self.call("get_current_folder", media::get_current_folder).await
    }

    #[tool(description = "Make a media pool folder current")]
    async fn set_current_folder(
        &self,
        Parameters(input): Parameters<media::FolderNameInput>,
    ) -> Result<CallToolResult, McpError> {
        self.call("set_current_folder", |conn| media::set_current_folder(conn, input)).await
    }

    #[tool(description = "Get every property of a media pool clip")]
    async fn get_clip_properties(
        &self,
        Parameters(input): Parameters<media::ClipInput>,
    ) -> Result<CallToolResult, McpError> {
        self.call("get_clip_properties", |conn| media::get_clip_properties(conn, input)).await
    }

    #[tool(description = "Get one property of a media pool clip")]
    async fn get_clip_property(
        &self,
        Parameters(input): Parameters<media::ClipPropertyInput>,
    ) -> Result<CallToolResult, McpError> {
        self.call("get_clip_property", |conn| media::get_clip_property(conn, input)).await
    }

    #[tool(description = "Set one property of a media pool clip")]
    async fn set_clip_property(
        &self,
        Parameters(input): Parameters<media::SetClipPropertyInput>,
    ) -> Result<CallToolResult, McpError> {
        self.call("set_clip_property", |conn| media::set_clip_property(conn, input)).await
    }

    #[tool(description = "Get the metadata of a media pool clip, or one metadata field")]
    async fn get_clip_metadata(
        &self,
        Parameters(input): Parameters<media::ClipMetadataInput>,
    ) -> Result<CallToolResult, McpError> {
        self.call("get_clip_metadata", |conn| media::get_clip_metadata(conn, input)).await
    }

    #[tool(description = "Set one metadata field of a media pool clip")]
    async fn set_clip_metadata(
        &self,
        Parameters(input): Parameters<media::SetClipMetadataInput>,
    ) -> Result<CallToolResult, McpError> {
        self.call("set_clip_metadata", |conn| media::set_clip_metadata(conn, input)).await
    }

    #[tool(description = "Set the color of a media pool clip")]
    async fn set_clip_color(
        &self,
        Parameters(input): Parameters<media::ClipColorInput>,
    ) -> Result<CallToolResult, McpError> {
        self.call("set_clip_color", |conn| media::set_clip_color(conn, input)).await
    }

    #[tool(description = "Add a marker to a media pool clip")]
    async fn add_clip_marker(
        &self,
        Parameters(input): Parameters<media::ClipMarkerInput>,
    ) -> Result<CallToolResult, McpError> {
        self.call("add_clip_marker", |conn| media::add_clip_marker(conn, input)).await
    }

    #[tool(description = "Import files into the current media pool folder")]
    async fn import_media(
        &self,
        Parameters(input): Parameters<media::ImportMediaInput>,
    ) -> Result<CallToolResult, McpError> {
        self.call("import_media", |conn| media::import_media(conn, input)).await
    }

    #[tool(description = "Append media pool clips to the end of the current timeline")]
    async fn append_to_timeline(
        &self,
        Parameters(input): Parameters<media::ClipNamesInput>,
    ) -> Result<CallToolResult, McpError> {
        self.call("append_to_timeline", |conn| media::append_to_timeline(conn, input)).await
    }

    #[tool(description = "Create a timeline from media pool clips")]
    async fn create_timeline_from_clips(
        &self,
        Parameters(input): Parameters<media::TimelineFromClipsInput>,
    ) -> Result<CallToolResult, McpError> {
        self.call("create_timeline_from_clips", |conn| {
            media::create_timeline_from_clips(conn, input)
        })
        .await
    }

    // ------------------------------------------------------------------
    // Gallery
    // ------------------------------------------------------------------

    #[tool(description = "List the gallery still albums")]
    async fn get_gallery_still_albums(&self) -> Result<CallToolResult, McpError> {
        self.call("get_gallery_still_albums", gallery::get_gallery_still_albums).await
    }

    #[tool(description = "List the gallery PowerGrade albums")]
    async fn get_power_grade_albums(&self) -> Result<CallToolResult, McpError> {
        self.call("get_power_grade_albums", gallery::get_power_grade_albums).await
    }

    #[tool(description = "Get the current gallery still album")]
    async fn get_current_still_album(&self) -> Result<CallToolResult, McpError> {
        self.call("get_current_still_album", gallery::get_current_still_album).await
    }

    #[tool(description = "Make a gallery still album current by name")]
    async fn set_current_still_album(
        &self,
        Parameters(input): Parameters<gallery::AlbumNameInput>,
    ) -> Result<CallToolResult, McpError> {
        self.call("set_current_still_album", |conn| gallery::set_current_still_album(conn, input))
            .await
    }
}

#[tool_handler]
impl ServerHandler for ResolveMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: self.name.clone(),
                version: env!("CARGO_PKG_VERSION").into(),
                title: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(self.instructions.clone()),
        }
    }
}

/// Summary printed by `resolve-mcp status`.
pub fn status_report(conn: &Connection) -> Value {
    let field = |r: ToolResult<String>| r.map(Value::String).unwrap_or(Value::Null);
    let missing = match conn.current_timeline() {
        Err(e) if e.is_missing_layer() => Value::from(e.kind()),
        _ => Value::Null,
    };
    serde_json::json!({
        "backend": conn.backend(),
        "connected": conn.is_connected(),
        "version": field(resolve::get_version(conn)),
        "page": field(resolve::get_current_page(conn)),
        "project": field(conn.current_project().and_then(|p| Ok(p.name()?))),
        "timeline": field(conn.current_timeline().and_then(|t| Ok(t.name()?))),
        "missing": missing,
    })
}

/// Connect with the configured backend and serve MCP on stdin/stdout.
pub async fn run_server(config: &ResolveMcpConfig) -> Result<(), Box<dyn std::error::Error>> {
    let conn = Connection::open(connector_for(&config.connection));
    info!(
        backend = conn.backend(),
        connected = conn.is_connected(),
        "Starting {} MCP server on stdio",
        config.server.name
    );
    let server = ResolveMcpServer::new(conn, config);
    let service = server.serve(rmcp::transport::stdio()).await?;
    service.waiting().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::{MemoryConnector, MemoryResolve};

    fn demo_server() -> ResolveMcpServer {
        let conn = Connection::open(Arc::new(MemoryConnector::new(MemoryResolve::demo())));
        ResolveMcpServer::new(conn, &ResolveMcpConfig::default())
    }

    #[test]
    fn test_server_info_uses_config() {
        let mut config = ResolveMcpConfig::default();
        config.server.name = "edit-bay".to_string();
        config.server.instructions = Some("Be careful.".to_string());
        let conn = Connection::open(Arc::new(MemoryConnector::unavailable()));
        let info = ResolveMcpServer::new(conn, &config).get_info();
        assert_eq!(info.server_info.name, "edit-bay");
        assert_eq!(info.instructions.as_deref(), Some("Be careful."));
    }

    #[test]
    fn test_default_instructions_list_pages() {
        let info = demo_server().get_info();
        assert_eq!(info.server_info.name, "resolve-mcp");
        assert!(info.instructions.unwrap_or_default().contains("fairlight"));
    }

    #[test]
    fn test_router_registers_every_area() {
        let tools = demo_server().tool_router.list_all();
        let names: Vec<String> = tools.iter().map(|t| t.name.to_string()).collect();
        for name in [
            "get_version",
            "reconnect",
            "open_project",
            "add_marker",
            "set_item_properties",
            "set_node_cache_mode",
            "create_timeline_from_clips",
            "set_current_still_album",
            "set_render_settings",
            "delete_track",
            "assign_to_color_group",
            "reset_post_clip_grades",
        ] {
            assert!(names.iter().any(|n| n == name), "missing tool {}", name);
        }
    }

    fn first_text(result: &CallToolResult) -> String {
        let value = serde_json::to_value(result).unwrap();
        value["content"][0]["text"].as_str().unwrap_or_default().to_string()
    }

    #[tokio::test]
    async fn test_call_renders_results_and_errors() {
        let server = demo_server();
        let result = server.call("get_current_page", resolve::get_current_page).await.unwrap();
        assert_eq!(first_text(&result), "edit");

        let offline = ResolveMcpServer::new(
            Connection::open(Arc::new(MemoryConnector::unavailable())),
            &ResolveMcpConfig::default(),
        );
        let result = offline.call("get_version", resolve::get_version).await.unwrap();
        assert_eq!(first_text(&result), "Error: Not connected to DaVinci Resolve");
    }

    #[test]
    fn test_status_report() {
        let conn = Connection::open(Arc::new(MemoryConnector::new(MemoryResolve::demo())));
        let report = status_report(&conn);
        assert_eq!(report["backend"], "memory");
        assert_eq!(report["project"], "Demo Project");
        assert_eq!(report["timeline"], "Edit 1");
        assert!(report["missing"].is_null());

        let conn = Connection::open(Arc::new(MemoryConnector::unavailable()));
        let report = status_report(&conn);
        assert_eq!(report["connected"], false);
        assert!(report["project"].is_null());
        assert_eq!(report["missing"], "not_connected");

        let conn =
            Connection::open(Arc::new(MemoryConnector::new(MemoryResolve::with_project("Cut"))));
        assert_eq!(status_report(&conn)["missing"], "no_timeline");
    }
}
