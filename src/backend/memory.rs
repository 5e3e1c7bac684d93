//! In-process stand-in for DaVinci Resolve.
//!
//! Models just enough of the application to exercise every handler: a
//! project manager with projects, media pool folders and clips, timelines
//! with tracks and items, node graphs, color groups, render presets, gallery
//! albums and media storage.
//! Objects are built with `Arc`-returning constructors and mutated through
//! `&self`, the same way scripting objects behave.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use serde_json::{json, Map, Value};

use crate::api::{
    ApiError, ApiResult, Clip, ColorGroup, Connector, Folder, Gallery, Marker, MediaPool,
    MediaStorage, NodeGraph, Project, ProjectManager, Resolve, StillAlbum, Timeline, TimelineItem,
};
use crate::api::script_object;

script_object!(
    MemoryResolve,
    MemoryProjectManager,
    MemoryProject,
    MemoryMediaPool,
    MemoryFolder,
    MemoryClip,
    MemoryTimeline,
    MemoryTimelineItem,
    MemoryNodeGraph,
    MemoryAlbum,
    MemoryGallery,
    MemoryStorage,
    MemoryColorGroup,
);

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn next_id(prefix: &str) -> String {
    format!("{}-{}", prefix, NEXT_ID.fetch_add(1, Ordering::Relaxed))
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn markers_json(markers: &BTreeMap<i64, Marker>) -> Value {
    let map: Map<String, Value> = markers
        .iter()
        .map(|(frame, m)| {
            let entry = json!({
                "color": m.color,
                "duration": m.duration,
                "note": m.note,
                "name": m.name,
                "customData": m.custom_data,
            });
            (frame.to_string(), entry)
        })
        .collect();
    Value::Object(map)
}

fn string_map_json(map: &BTreeMap<String, String>, key: Option<&str>) -> Value {
    match key {
        None => Value::Object(
            map.iter().map(|(k, v)| (k.clone(), Value::String(v.clone()))).collect(),
        ),
        Some(key) => map.get(key).map(|v| Value::String(v.clone())).unwrap_or(Value::Null),
    }
}

// ============================================================================
// Connector
// ============================================================================

/// Hands out a fixed [`MemoryResolve`], or fails when none is set.
pub struct MemoryConnector {
    app: Mutex<Option<Arc<MemoryResolve>>>,
}

impl MemoryConnector {
    pub fn new(app: Arc<MemoryResolve>) -> Self {
        Self { app: Mutex::new(Some(app)) }
    }

    /// A connector that behaves like Resolve is not running.
    pub fn unavailable() -> Self {
        Self { app: Mutex::new(None) }
    }

    /// Swap the application returned by the next connect.
    pub fn set_app(&self, app: Option<Arc<MemoryResolve>>) {
        *lock(&self.app) = app;
    }
}

impl Connector for MemoryConnector {
    fn name(&self) -> &str {
        "memory"
    }

    fn connect(&self) -> ApiResult<Arc<dyn Resolve>> {
        lock(&self.app)
            .clone()
            .map(|app| app as Arc<dyn Resolve>)
            .ok_or_else(|| ApiError::new("scriptapp", "DaVinci Resolve is not running"))
    }
}

// ============================================================================
// Application
// ============================================================================

#[derive(Default)]
struct AppState {
    page: Option<String>,
    page_history: Vec<String>,
    keyframe_mode: i64,
    layout_presets: Vec<String>,
}

pub struct MemoryResolve {
    project_manager: Option<Arc<MemoryProjectManager>>,
    storage: Arc<MemoryStorage>,
    state: Mutex<AppState>,
}

impl MemoryResolve {
    fn build(with_project_manager: bool) -> Arc<Self> {
        Arc::new_cyclic(|app| Self {
            project_manager: with_project_manager.then(|| Arc::new(MemoryProjectManager::new())),
            storage: Arc::new(MemoryStorage::new(app.clone())),
            state: Mutex::new(AppState::default()),
        })
    }

    /// A running application with no project open.
    pub fn new() -> Arc<Self> {
        Self::build(true)
    }

    /// An application whose project manager cannot be reached.
    pub fn without_project_manager() -> Arc<Self> {
        Self::build(false)
    }

    /// A running application with `name` open and no timelines.
    pub fn with_project(name: &str) -> Arc<Self> {
        let app = Self::new();
        if let Some(pm) = &app.project_manager {
            let project = pm.add_project(MemoryProject::new(name));
            pm.open(&project);
        }
        app
    }

    /// A running application whose open project has no media pool.
    pub fn with_project_without_media_pool(name: &str) -> Arc<Self> {
        let app = Self::new();
        if let Some(pm) = &app.project_manager {
            let project = pm.add_project(MemoryProject::without_media_pool(name));
            pm.open(&project);
        }
        app
    }

    /// A small populated project for `--backend memory`.
    pub fn demo() -> Arc<Self> {
        let app = Self::with_project("Demo Project");
        let Some(project) = app.current_memory_project() else {
            return app;
        };
        if let Some(root) = app.root_folder() {
            root.add_clip(MemoryClip::new("Slate.mov"));
            let footage = root.add_subfolder(MemoryFolder::new("Footage"));
            footage.add_clip(MemoryClip::with_frames("A001_C001.mov", 240));
            footage.add_clip(MemoryClip::with_frames("A001_C002.mov", 180));
            let audio = root.add_subfolder(MemoryFolder::new("Audio"));
            audio.add_clip(MemoryClip::with_frames("Music.wav", 1440));
        }
        project.add_timeline(MemoryTimeline::new("Assembly"));
        let edit = project.add_timeline(MemoryTimeline::new("Edit 1"));
        edit.push_item("video", 1, MemoryTimelineItem::with_duration("A001_C001.mov", 240));
        edit.push_item("video", 1, MemoryTimelineItem::with_duration("A001_C002.mov", 180));
        edit.push_item("audio", 1, MemoryTimelineItem::with_duration("Music.wav", 420));
        project.set_current(&edit);

        app.storage.add_volume("/Volumes/Media");
        app.storage.add_file("/Volumes/Media/Day1/A002_C001.mov");
        app.storage.add_file("/Volumes/Media/Day1/A002_C002.mov");
        app.storage.add_file("/Volumes/Media/Day2/B001_C001.mov");
        lock(&app.state).page = Some("edit".to_string());
        app
    }

    pub fn memory_project_manager(&self) -> Option<Arc<MemoryProjectManager>> {
        self.project_manager.clone()
    }

    pub fn current_memory_project(&self) -> Option<Arc<MemoryProject>> {
        self.project_manager.as_ref().and_then(|pm| lock(&pm.current).clone())
    }

    /// Root media pool folder of the open project.
    pub fn root_folder(&self) -> Option<Arc<MemoryFolder>> {
        self.current_memory_project()
            .and_then(|project| project.media_pool.as_ref().map(|pool| pool.root.clone()))
    }

    pub fn storage(&self) -> Arc<MemoryStorage> {
        self.storage.clone()
    }

    /// Every page opened so far, oldest first.
    pub fn page_history(&self) -> Vec<String> {
        lock(&self.state).page_history.clone()
    }
}

impl Resolve for MemoryResolve {
    fn product_name(&self) -> ApiResult<String> {
        Ok("DaVinci Resolve".to_string())
    }

    fn version_string(&self) -> ApiResult<String> {
        Ok("19.1.0".to_string())
    }

    fn version(&self) -> ApiResult<Value> {
        Ok(json!([19, 1, 0, 0, ""]))
    }

    fn project_manager(&self) -> ApiResult<Option<Arc<dyn ProjectManager>>> {
        Ok(self.project_manager.clone().map(|pm| pm as Arc<dyn ProjectManager>))
    }

    fn media_storage(&self) -> ApiResult<Option<Arc<dyn MediaStorage>>> {
        Ok(Some(self.storage.clone() as Arc<dyn MediaStorage>))
    }

    fn current_page(&self) -> ApiResult<Option<String>> {
        Ok(lock(&self.state).page.clone())
    }

    fn open_page(&self, page: &str) -> ApiResult<bool> {
        let mut state = lock(&self.state);
        state.page = Some(page.to_string());
        state.page_history.push(page.to_string());
        Ok(true)
    }

    fn load_layout_preset(&self, name: &str) -> ApiResult<bool> {
        Ok(lock(&self.state).layout_presets.iter().any(|p| p == name))
    }

    fn save_layout_preset(&self, name: &str) -> ApiResult<bool> {
        let mut state = lock(&self.state);
        if !state.layout_presets.iter().any(|p| p == name) {
            state.layout_presets.push(name.to_string());
        }
        Ok(true)
    }

    fn keyframe_mode(&self) -> ApiResult<i64> {
        Ok(lock(&self.state).keyframe_mode)
    }

    fn set_keyframe_mode(&self, mode: i64) -> ApiResult<bool> {
        lock(&self.state).keyframe_mode = mode;
        Ok(true)
    }
}

// ============================================================================
// Projects
// ============================================================================

pub struct MemoryProjectManager {
    projects: Mutex<Vec<Arc<MemoryProject>>>,
    current: Mutex<Option<Arc<MemoryProject>>>,
}

impl MemoryProjectManager {
    fn new() -> Self {
        Self { projects: Mutex::new(Vec::new()), current: Mutex::new(None) }
    }

    pub fn add_project(&self, project: Arc<MemoryProject>) -> Arc<MemoryProject> {
        lock(&self.projects).push(project.clone());
        project
    }

    pub fn open(&self, project: &Arc<MemoryProject>) {
        *lock(&self.current) = Some(project.clone());
    }

    fn find(&self, name: &str) -> Option<Arc<MemoryProject>> {
        lock(&self.projects).iter().find(|p| p.name == name).cloned()
    }
}

impl ProjectManager for MemoryProjectManager {
    fn project_names(&self) -> ApiResult<Vec<String>> {
        Ok(lock(&self.projects).iter().map(|p| p.name.clone()).collect())
    }

    fn current_project(&self) -> ApiResult<Option<Arc<dyn Project>>> {
        Ok(lock(&self.current).clone().map(|p| p as Arc<dyn Project>))
    }

    fn load_project(&self, name: &str) -> ApiResult<Option<Arc<dyn Project>>> {
        let Some(project) = self.find(name) else {
            return Ok(None);
        };
        self.open(&project);
        Ok(Some(project as Arc<dyn Project>))
    }

    fn create_project(&self, name: &str) -> ApiResult<Option<Arc<dyn Project>>> {
        if self.find(name).is_some() {
            return Ok(None);
        }
        let project = self.add_project(MemoryProject::new(name));
        self.open(&project);
        Ok(Some(project as Arc<dyn Project>))
    }

    fn save_project(&self) -> ApiResult<bool> {
        Ok(lock(&self.current).is_some())
    }

    fn close_project(&self, project: &dyn Project) -> ApiResult<bool> {
        let id = project.unique_id()?;
        let mut current = lock(&self.current);
        if current.as_ref().is_some_and(|p| p.unique_id == id) {
            *current = None;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

/// Timelines of a project, shared with its media pool.
#[derive(Default)]
struct TimelineSet {
    list: Mutex<Vec<Arc<MemoryTimeline>>>,
    current: Mutex<Option<Arc<MemoryTimeline>>>,
}

impl TimelineSet {
    /// `Err` carries the timeline already registered under the same name.
    fn add(
        &self,
        timeline: Arc<MemoryTimeline>,
    ) -> Result<Arc<MemoryTimeline>, Arc<MemoryTimeline>> {
        let mut list = lock(&self.list);
        let name = timeline.current_name();
        if let Some(existing) = list.iter().find(|t| t.current_name() == name) {
            return Err(existing.clone());
        }
        list.push(timeline.clone());
        Ok(timeline)
    }
}

#[derive(Debug, Clone)]
struct RenderJob {
    id: String,
    timeline: String,
    target_dir: String,
    output: String,
    status: &'static str,
    percent: i64,
}

/// `(format name, extension, [(codec description, codec name)])`
const RENDER_FORMATS: [(&str, &str, &[(&str, &str)]); 4] = [
    ("QuickTime", "mov", &[("H.264", "H264"), ("Apple ProRes 422 HQ", "ProRes422HQ")]),
    ("MP4", "mp4", &[("H.264", "H264"), ("H.265", "H265")]),
    ("MXF OP1A", "mxf", &[("DNxHR HQ", "DNxHRHQ")]),
    ("TIFF", "tif", &[("RGB 16 bits", "RGB16")]),
];

/// Keys accepted by `SetRenderSettings`.
const RENDER_SETTING_KEYS: [&str; 12] = [
    "SelectAllFrames",
    "MarkIn",
    "MarkOut",
    "TargetDir",
    "CustomName",
    "ExportVideo",
    "ExportAudio",
    "FormatWidth",
    "FormatHeight",
    "FrameRate",
    "VideoQuality",
    "AudioCodec",
];

fn render_codecs_of(format: &str) -> Option<&'static [(&'static str, &'static str)]> {
    RENDER_FORMATS.iter().find(|(_, ext, _)| *ext == format).map(|(_, _, codecs)| *codecs)
}

/// Format, codec and settings; what a render preset captures.
#[derive(Debug, Clone, PartialEq)]
struct RenderState {
    format: String,
    codec: String,
    settings: Map<String, Value>,
}

impl Default for RenderState {
    fn default() -> Self {
        Self { format: "mov".to_string(), codec: "H264".to_string(), settings: Map::new() }
    }
}

pub struct MemoryProject {
    name: String,
    unique_id: String,
    media_pool: Option<Arc<MemoryMediaPool>>,
    gallery: Arc<MemoryGallery>,
    timelines: Arc<TimelineSet>,
    settings: Mutex<BTreeMap<String, String>>,
    render_jobs: Mutex<Vec<RenderJob>>,
    render: Mutex<RenderState>,
    render_presets: Mutex<BTreeMap<String, RenderState>>,
    color_groups: Mutex<Vec<Arc<MemoryColorGroup>>>,
}

impl MemoryProject {
    fn build(name: &str, with_media_pool: bool) -> Arc<Self> {
        let timelines = Arc::new(TimelineSet::default());
        let settings = [
            ("timelineFrameRate", "24"),
            ("timelineResolutionWidth", "1920"),
            ("timelineResolutionHeight", "1080"),
            ("colorScienceMode", "davinciYRGB"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        Arc::new(Self {
            name: name.to_string(),
            unique_id: next_id("project"),
            media_pool: with_media_pool.then(|| Arc::new(MemoryMediaPool::new(timelines.clone()))),
            gallery: Arc::new(MemoryGallery::new()),
            timelines,
            settings: Mutex::new(settings),
            render_jobs: Mutex::new(Vec::new()),
            render: Mutex::new(RenderState::default()),
            render_presets: Mutex::new(BTreeMap::from([(
                "H.264 Master".to_string(),
                RenderState { format: "mp4".to_string(), ..RenderState::default() },
            )])),
            color_groups: Mutex::new(Vec::new()),
        })
    }

    pub fn new(name: &str) -> Arc<Self> {
        Self::build(name, true)
    }

    pub fn without_media_pool(name: &str) -> Arc<Self> {
        Self::build(name, false)
    }

    /// Add a timeline; on a duplicate name the already registered one is returned.
    pub fn add_timeline(&self, timeline: Arc<MemoryTimeline>) -> Arc<MemoryTimeline> {
        self.timelines.add(timeline).unwrap_or_else(|existing| existing)
    }

    pub fn set_current(&self, timeline: &Arc<MemoryTimeline>) {
        *lock(&self.timelines.current) = Some(timeline.clone());
    }

    pub fn memory_gallery(&self) -> Arc<MemoryGallery> {
        self.gallery.clone()
    }

    pub fn current_memory_timeline(&self) -> Option<Arc<MemoryTimeline>> {
        lock(&self.timelines.current).clone()
    }

    pub fn color_group(&self, name: &str) -> Option<Arc<MemoryColorGroup>> {
        lock(&self.color_groups).iter().find(|g| g.current_name() == name).cloned()
    }

    /// Render settings currently applied, as `SetRenderSettings` left them.
    pub fn render_settings(&self) -> Map<String, Value> {
        lock(&self.render).settings.clone()
    }
}

impl Project for MemoryProject {
    fn name(&self) -> ApiResult<String> {
        Ok(self.name.clone())
    }

    fn unique_id(&self) -> ApiResult<String> {
        Ok(self.unique_id.clone())
    }

    fn media_pool(&self) -> ApiResult<Option<Arc<dyn MediaPool>>> {
        Ok(self.media_pool.clone().map(|pool| pool as Arc<dyn MediaPool>))
    }

    fn gallery(&self) -> ApiResult<Option<Arc<dyn Gallery>>> {
        Ok(Some(self.gallery.clone() as Arc<dyn Gallery>))
    }

    fn timeline_count(&self) -> ApiResult<usize> {
        Ok(lock(&self.timelines.list).len())
    }

    fn timeline_by_index(&self, index: usize) -> ApiResult<Option<Arc<dyn Timeline>>> {
        let list = lock(&self.timelines.list);
        Ok(index.checked_sub(1).and_then(|i| list.get(i)).map(|t| t.clone() as Arc<dyn Timeline>))
    }

    fn current_timeline(&self) -> ApiResult<Option<Arc<dyn Timeline>>> {
        Ok(lock(&self.timelines.current).clone().map(|t| t as Arc<dyn Timeline>))
    }

    fn set_current_timeline(&self, timeline: &dyn Timeline) -> ApiResult<bool> {
        let id = timeline.unique_id()?;
        let found = lock(&self.timelines.list).iter().find(|t| t.unique_id == id).cloned();
        match found {
            Some(t) => {
                *lock(&self.timelines.current) = Some(t);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn setting(&self, name: Option<&str>) -> ApiResult<Value> {
        Ok(string_map_json(&lock(&self.settings), name))
    }

    fn set_setting(&self, name: &str, value: &str) -> ApiResult<bool> {
        lock(&self.settings).insert(name.to_string(), value.to_string());
        Ok(true)
    }

    fn render_formats(&self) -> ApiResult<Value> {
        Ok(json!({ "QuickTime": "mov", "MP4": "mp4", "MXF OP1A": "mxf", "TIFF": "tif" }))
    }

    fn render_jobs(&self) -> ApiResult<Value> {
        let jobs = lock(&self.render_jobs);
        Ok(Value::Array(
            jobs.iter()
                .map(|job| {
                    json!({
                        "JobId": job.id,
                        "TimelineName": job.timeline,
                        "TargetDir": job.target_dir,
                        "OutputFilename": job.output,
                    })
                })
                .collect(),
        ))
    }

    fn add_render_job(&self) -> ApiResult<Option<String>> {
        let Some(timeline) = lock(&self.timelines.current).clone() else {
            return Ok(None);
        };
        let render = lock(&self.render).clone();
        let setting =
            |key: &str| render.settings.get(key).and_then(Value::as_str).map(str::to_string);
        let timeline_name = timeline.current_name();
        let job = RenderJob {
            id: next_id("job"),
            output: format!(
                "{}.{}",
                setting("CustomName").unwrap_or_else(|| timeline_name.clone()),
                render.format
            ),
            target_dir: setting("TargetDir").unwrap_or_default(),
            timeline: timeline_name,
            status: "Ready",
            percent: 0,
        };
        let id = job.id.clone();
        lock(&self.render_jobs).push(job);
        Ok(Some(id))
    }

    fn delete_render_job(&self, job_id: &str) -> ApiResult<bool> {
        let mut jobs = lock(&self.render_jobs);
        let before = jobs.len();
        jobs.retain(|job| job.id != job_id);
        Ok(jobs.len() != before)
    }

    fn render_job_status(&self, job_id: &str) -> ApiResult<Value> {
        let jobs = lock(&self.render_jobs);
        Ok(jobs
            .iter()
            .find(|job| job.id == job_id)
            .map(|job| json!({ "JobStatus": job.status, "CompletionPercentage": job.percent }))
            .unwrap_or_else(|| json!({})))
    }

    fn start_rendering(&self, job_ids: &[String]) -> ApiResult<bool> {
        let mut jobs = lock(&self.render_jobs);
        let mut started = false;
        for job in jobs.iter_mut() {
            if job_ids.is_empty() || job_ids.contains(&job.id) {
                job.status = "Rendering";
                started = true;
            }
        }
        Ok(started)
    }

    fn stop_rendering(&self) -> ApiResult<()> {
        for job in lock(&self.render_jobs).iter_mut().filter(|job| job.status == "Rendering") {
            job.status = "Cancelled";
        }
        Ok(())
    }

    fn is_rendering_in_progress(&self) -> ApiResult<bool> {
        Ok(lock(&self.render_jobs).iter().any(|job| job.status == "Rendering"))
    }

    fn delete_all_render_jobs(&self) -> ApiResult<bool> {
        lock(&self.render_jobs).clear();
        Ok(true)
    }

    fn render_codecs(&self, format: &str) -> ApiResult<Value> {
        let codecs = render_codecs_of(format).unwrap_or_default();
        Ok(Value::Object(
            codecs.iter().map(|(desc, name)| (desc.to_string(), Value::from(*name))).collect(),
        ))
    }

    fn current_render_format_and_codec(&self) -> ApiResult<Value> {
        let render = lock(&self.render);
        Ok(json!({ "format": render.format, "codec": render.codec }))
    }

    fn set_render_format_and_codec(&self, format: &str, codec: &str) -> ApiResult<bool> {
        let known = render_codecs_of(format).is_some_and(|c| c.iter().any(|(_, n)| *n == codec));
        if known {
            let mut render = lock(&self.render);
            render.format = format.to_string();
            render.codec = codec.to_string();
        }
        Ok(known)
    }

    fn set_render_settings(&self, settings: &Value) -> ApiResult<bool> {
        let Some(settings) = settings.as_object() else {
            return Ok(false);
        };
        if settings.keys().any(|k| !RENDER_SETTING_KEYS.contains(&k.as_str())) {
            return Ok(false);
        }
        let mut render = lock(&self.render);
        for (key, value) in settings {
            render.settings.insert(key.clone(), value.clone());
        }
        Ok(true)
    }

    fn render_presets(&self) -> ApiResult<Vec<String>> {
        Ok(lock(&self.render_presets).keys().cloned().collect())
    }

    fn load_render_preset(&self, name: &str) -> ApiResult<bool> {
        let Some(preset) = lock(&self.render_presets).get(name).cloned() else {
            return Ok(false);
        };
        *lock(&self.render) = preset;
        Ok(true)
    }

    fn save_render_preset(&self, name: &str) -> ApiResult<bool> {
        let mut presets = lock(&self.render_presets);
        if presets.contains_key(name) {
            return Ok(false);
        }
        presets.insert(name.to_string(), lock(&self.render).clone());
        Ok(true)
    }

    fn delete_render_preset(&self, name: &str) -> ApiResult<bool> {
        Ok(lock(&self.render_presets).remove(name).is_some())
    }

    fn color_groups(&self) -> ApiResult<Vec<Arc<dyn ColorGroup>>> {
        Ok(lock(&self.color_groups).iter().map(|g| g.clone() as Arc<dyn ColorGroup>).collect())
    }

    fn add_color_group(&self, name: &str) -> ApiResult<Option<Arc<dyn ColorGroup>>> {
        let mut groups = lock(&self.color_groups);
        if groups.iter().any(|g| g.current_name() == name) {
            return Ok(None);
        }
        let group = MemoryColorGroup::new(name);
        groups.push(group.clone());
        Ok(Some(group as Arc<dyn ColorGroup>))
    }

    fn delete_color_group(&self, group: &dyn ColorGroup) -> ApiResult<bool> {
        let Some(group) = group.as_any().downcast_ref::<MemoryColorGroup>() else {
            return Ok(false);
        };
        let mut groups = lock(&self.color_groups);
        let before = groups.len();
        groups.retain(|g| g.unique_id != group.unique_id);
        Ok(groups.len() != before)
    }
}

// ============================================================================
// Color groups
// ============================================================================

pub struct MemoryColorGroup {
    unique_id: String,
    name: Mutex<String>,
    pre_clip: Arc<MemoryNodeGraph>,
    post_clip: Arc<MemoryNodeGraph>,
}

impl MemoryColorGroup {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            unique_id: next_id("group"),
            name: Mutex::new(name.to_string()),
            pre_clip: MemoryNodeGraph::new(1),
            post_clip: MemoryNodeGraph::new(1),
        })
    }

    fn current_name(&self) -> String {
        lock(&self.name).clone()
    }

    pub fn pre_clip_graph(&self) -> Arc<MemoryNodeGraph> {
        self.pre_clip.clone()
    }
}

impl ColorGroup for MemoryColorGroup {
    fn name(&self) -> ApiResult<String> {
        Ok(self.current_name())
    }

    fn set_name(&self, name: &str) -> ApiResult<bool> {
        *lock(&self.name) = name.to_string();
        Ok(true)
    }

    fn clips_in_timeline(
        &self,
        timeline: &dyn Timeline,
    ) -> ApiResult<Vec<Arc<dyn TimelineItem>>> {
        let Some(timeline) = timeline.as_any().downcast_ref::<MemoryTimeline>() else {
            return Ok(Vec::new());
        };
        let tracks = lock(&timeline.tracks);
        Ok(tracks
            .values()
            .flatten()
            .flat_map(|track| track.items.iter())
            .filter(|item| lock(&item.color_group).as_deref() == Some(self.unique_id.as_str()))
            .map(|item| item.clone() as Arc<dyn TimelineItem>)
            .collect())
    }

    fn pre_clip_node_graph(&self) -> ApiResult<Option<Arc<dyn NodeGraph>>> {
        Ok(Some(self.pre_clip.clone() as Arc<dyn NodeGraph>))
    }

    fn post_clip_node_graph(&self) -> ApiResult<Option<Arc<dyn NodeGraph>>> {
        Ok(Some(self.post_clip.clone() as Arc<dyn NodeGraph>))
    }
}

// ============================================================================
// Media pool
// ============================================================================

pub struct MemoryMediaPool {
    root: Arc<MemoryFolder>,
    current_folder: Mutex<Arc<MemoryFolder>>,
    timelines: Arc<TimelineSet>,
}

impl MemoryMediaPool {
    fn new(timelines: Arc<TimelineSet>) -> Self {
        let root = MemoryFolder::new("Master");
        Self { current_folder: Mutex::new(root.clone()), root, timelines }
    }

    fn new_timeline(&self, name: &str) -> Option<Arc<MemoryTimeline>> {
        let timeline = self.timelines.add(MemoryTimeline::new(name)).ok()?;
        *lock(&self.timelines.current) = Some(timeline.clone());
        Some(timeline)
    }
}

fn append_clips(timeline: &MemoryTimeline, clips: &[Arc<dyn Clip>]) -> ApiResult<usize> {
    for clip in clips {
        let frames = clip
            .property(Some("Frames"))?
            .as_str()
            .and_then(|f| f.parse().ok())
            .unwrap_or(24);
        timeline.push_item("video", 1, MemoryTimelineItem::with_duration(&clip.name()?, frames));
    }
    Ok(clips.len())
}

fn as_memory_folder(folder: &dyn Folder) -> Option<Arc<MemoryFolder>> {
    folder.as_any().downcast_ref::<MemoryFolder>().and_then(|f| f.this.upgrade())
}

impl MediaPool for MemoryMediaPool {
    fn root_folder(&self) -> ApiResult<Option<Arc<dyn Folder>>> {
        Ok(Some(self.root.clone() as Arc<dyn Folder>))
    }

    fn current_folder(&self) -> ApiResult<Option<Arc<dyn Folder>>> {
        Ok(Some(lock(&self.current_folder).clone() as Arc<dyn Folder>))
    }

    fn set_current_folder(&self, folder: &dyn Folder) -> ApiResult<bool> {
        match as_memory_folder(folder) {
            Some(folder) => {
                *lock(&self.current_folder) = folder;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn add_sub_folder(
        &self,
        parent: &dyn Folder,
        name: &str,
    ) -> ApiResult<Option<Arc<dyn Folder>>> {
        let Some(parent) = as_memory_folder(parent) else {
            return Ok(None);
        };
        let folder = parent.add_subfolder(MemoryFolder::new(name));
        Ok(Some(folder as Arc<dyn Folder>))
    }

    fn create_empty_timeline(&self, name: &str) -> ApiResult<Option<Arc<dyn Timeline>>> {
        Ok(self.new_timeline(name).map(|t| t as Arc<dyn Timeline>))
    }

    fn create_timeline_from_clips(
        &self,
        name: &str,
        clips: &[Arc<dyn Clip>],
    ) -> ApiResult<Option<Arc<dyn Timeline>>> {
        let Some(timeline) = self.new_timeline(name) else {
            return Ok(None);
        };
        append_clips(&timeline, clips)?;
        Ok(Some(timeline as Arc<dyn Timeline>))
    }

    fn append_to_timeline(&self, clips: &[Arc<dyn Clip>]) -> ApiResult<usize> {
        let Some(timeline) = lock(&self.timelines.current).clone() else {
            return Ok(0);
        };
        append_clips(&timeline, clips)
    }

    fn import_media(&self, paths: &[String]) -> ApiResult<Vec<Arc<dyn Clip>>> {
        let folder = lock(&self.current_folder).clone();
        Ok(paths
            .iter()
            .map(|path| {
                let name = Path::new(path)
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.clone());
                folder.add_clip(MemoryClip::new(&name)) as Arc<dyn Clip>
            })
            .collect())
    }
}

pub struct MemoryFolder {
    name: String,
    unique_id: String,
    this: Weak<MemoryFolder>,
    clips: Mutex<Option<Vec<Arc<MemoryClip>>>>,
    subfolders: Mutex<Option<Vec<Arc<MemoryFolder>>>>,
}

impl MemoryFolder {
    fn build(name: &str, unique_id: String, lists: bool) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            name: name.to_string(),
            unique_id,
            this: this.clone(),
            clips: Mutex::new(lists.then(Vec::new)),
            subfolders: Mutex::new(lists.then(Vec::new)),
        })
    }

    pub fn new(name: &str) -> Arc<Self> {
        Self::build(name, next_id("folder"), true)
    }

    /// A folder reporting a fixed unique id, which may be empty or shared.
    pub fn with_id(name: &str, unique_id: &str) -> Arc<Self> {
        Self::build(name, unique_id.to_string(), true)
    }

    /// A folder that reports no clip or sub-folder list at all.
    pub fn without_lists(name: &str) -> Arc<Self> {
        Self::build(name, next_id("folder"), false)
    }

    pub fn add_clip(&self, clip: Arc<MemoryClip>) -> Arc<MemoryClip> {
        lock(&self.clips).get_or_insert_with(Vec::new).push(clip.clone());
        clip
    }

    pub fn add_subfolder(&self, folder: Arc<MemoryFolder>) -> Arc<MemoryFolder> {
        lock(&self.subfolders).get_or_insert_with(Vec::new).push(folder.clone());
        folder
    }

    /// Direct child folder by name.
    pub fn subfolder(&self, name: &str) -> Option<Arc<MemoryFolder>> {
        lock(&self.subfolders).as_ref()?.iter().find(|f| f.name == name).cloned()
    }
}

impl Folder for MemoryFolder {
    fn name(&self) -> ApiResult<String> {
        Ok(self.name.clone())
    }

    fn unique_id(&self) -> ApiResult<String> {
        Ok(self.unique_id.clone())
    }

    fn clips(&self) -> ApiResult<Option<Vec<Arc<dyn Clip>>>> {
        Ok(lock(&self.clips)
            .as_ref()
            .map(|clips| clips.iter().map(|c| c.clone() as Arc<dyn Clip>).collect()))
    }

    fn subfolders(&self) -> ApiResult<Option<Vec<Arc<dyn Folder>>>> {
        Ok(lock(&self.subfolders)
            .as_ref()
            .map(|folders| folders.iter().map(|f| f.clone() as Arc<dyn Folder>).collect()))
    }
}

pub struct MemoryClip {
    unique_id: String,
    properties: Mutex<BTreeMap<String, String>>,
    metadata: Mutex<BTreeMap<String, String>>,
    color: Mutex<String>,
    markers: Mutex<BTreeMap<i64, Marker>>,
}

impl MemoryClip {
    pub fn new(name: &str) -> Arc<Self> {
        Self::with_frames(name, 24)
    }

    pub fn with_frames(name: &str, frames: i64) -> Arc<Self> {
        let properties = [
            ("Clip Name", name.to_string()),
            ("File Path", format!("/media/{}", name)),
            ("Frames", frames.to_string()),
            ("FPS", "24".to_string()),
            ("Resolution", "1920x1080".to_string()),
            ("Duration", frames_to_timecode(frames, 24)),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
        Arc::new(Self {
            unique_id: next_id("clip"),
            properties: Mutex::new(properties),
            metadata: Mutex::new(BTreeMap::new()),
            color: Mutex::new(String::new()),
            markers: Mutex::new(BTreeMap::new()),
        })
    }
}

fn frames_to_timecode(frames: i64, fps: i64) -> String {
    let (seconds, ff) = (frames / fps, frames % fps);
    format!("{:02}:{:02}:{:02}:{:02}", seconds / 3600, (seconds / 60) % 60, seconds % 60, ff)
}

impl Clip for MemoryClip {
    fn name(&self) -> ApiResult<String> {
        Ok(lock(&self.properties).get("Clip Name").cloned().unwrap_or_default())
    }

    fn unique_id(&self) -> ApiResult<String> {
        Ok(self.unique_id.clone())
    }

    fn property(&self, key: Option<&str>) -> ApiResult<Value> {
        Ok(string_map_json(&lock(&self.properties), key))
    }

    fn set_property(&self, key: &str, value: &str) -> ApiResult<bool> {
        let mut properties = lock(&self.properties);
        match properties.get_mut(key) {
            Some(slot) => {
                *slot = value.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn metadata(&self, key: Option<&str>) -> ApiResult<Value> {
        Ok(string_map_json(&lock(&self.metadata), key))
    }

    fn set_metadata(&self, key: &str, value: &str) -> ApiResult<bool> {
        lock(&self.metadata).insert(key.to_string(), value.to_string());
        Ok(true)
    }

    fn clip_color(&self) -> ApiResult<String> {
        Ok(lock(&self.color).clone())
    }

    fn set_clip_color(&self, color: &str) -> ApiResult<bool> {
        *lock(&self.color) = color.to_string();
        Ok(true)
    }

    fn add_marker(&self, marker: &Marker) -> ApiResult<bool> {
        let mut markers = lock(&self.markers);
        if markers.contains_key(&marker.frame) {
            return Ok(false);
        }
        markers.insert(marker.frame, marker.clone());
        Ok(true)
    }

    fn markers(&self) -> ApiResult<Value> {
        Ok(markers_json(&lock(&self.markers)))
    }
}

// ============================================================================
// Timelines
// ============================================================================

/// 01:00:00:00 at 24 fps
const TIMELINE_START_FRAME: i64 = 86_400;

/// Audio channel layouts accepted by `AddTrack`.
const AUDIO_SUB_TYPES: [&str; 6] = ["mono", "stereo", "5.1", "5.1film", "7.1", "7.1film"];

struct MemoryTrack {
    items: Vec<Arc<MemoryTimelineItem>>,
    sub_type: String,
    enabled: bool,
    locked: bool,
}

impl MemoryTrack {
    fn new(track_type: &str) -> Self {
        let sub_type = if track_type == "audio" { "stereo" } else { "" };
        Self { items: Vec::new(), sub_type: sub_type.to_string(), enabled: true, locked: false }
    }
}

pub struct MemoryTimeline {
    unique_id: String,
    name: Mutex<String>,
    tracks: Mutex<BTreeMap<&'static str, Vec<MemoryTrack>>>,
    markers: Mutex<BTreeMap<i64, Marker>>,
    playhead: Mutex<String>,
    graph: Arc<MemoryNodeGraph>,
    stills: AtomicU64,
}

fn track_key(track_type: &str) -> Option<&'static str> {
    crate::api::TRACK_TYPES.into_iter().find(|t| *t == track_type)
}

impl MemoryTimeline {
    /// One empty video and one empty audio track.
    pub fn new(name: &str) -> Arc<Self> {
        let tracks = BTreeMap::from([
            ("video", vec![MemoryTrack::new("video")]),
            ("audio", vec![MemoryTrack::new("audio")]),
        ]);
        Arc::new(Self {
            unique_id: next_id("timeline"),
            name: Mutex::new(name.to_string()),
            tracks: Mutex::new(tracks),
            markers: Mutex::new(BTreeMap::new()),
            playhead: Mutex::new("01:00:00:00".to_string()),
            graph: MemoryNodeGraph::new(1),
            stills: AtomicU64::new(0),
        })
    }

    fn current_name(&self) -> String {
        lock(&self.name).clone()
    }

    /// Place `item` at the end of the 1-based track, creating tracks as needed.
    pub fn push_item(
        &self,
        track_type: &str,
        index: usize,
        item: Arc<MemoryTimelineItem>,
    ) -> Arc<MemoryTimelineItem> {
        let Some(key) = track_key(track_type) else {
            return item;
        };
        let mut tracks = lock(&self.tracks);
        let list = tracks.entry(key).or_default();
        while list.len() < index.max(1) {
            list.push(MemoryTrack::new(key));
        }
        let track = &mut list[index.max(1) - 1].items;
        let start = track.last().map(|last| last.end_frame()).unwrap_or(TIMELINE_START_FRAME);
        *lock(&item.start) = start;
        track.push(item.clone());
        item
    }

    /// Number of stills grabbed from this timeline.
    pub fn stills_grabbed(&self) -> u64 {
        self.stills.load(Ordering::Relaxed)
    }

    pub fn graph(&self) -> Arc<MemoryNodeGraph> {
        self.graph.clone()
    }

    /// Sub type of a 1-based track, e.g. `"stereo"` for audio tracks.
    pub fn track_sub_type(&self, track_type: &str, index: usize) -> Option<String> {
        self.with_track(track_type, index, |track| track.sub_type.clone())
    }

    fn with_track<T>(
        &self,
        track_type: &str,
        index: usize,
        f: impl FnOnce(&mut MemoryTrack) -> T,
    ) -> Option<T> {
        let mut tracks = lock(&self.tracks);
        let list = tracks.get_mut(track_key(track_type)?)?;
        list.get_mut(index.checked_sub(1)?).map(f)
    }
}

fn valid_timecode(timecode: &str) -> bool {
    let parts: Vec<_> = timecode.split([':', ';']).collect();
    parts.len() == 4 && parts.iter().all(|p| p.len() == 2 && p.chars().all(|c| c.is_ascii_digit()))
}

impl Timeline for MemoryTimeline {
    fn name(&self) -> ApiResult<String> {
        Ok(self.current_name())
    }

    fn set_name(&self, name: &str) -> ApiResult<bool> {
        *lock(&self.name) = name.to_string();
        Ok(true)
    }

    fn unique_id(&self) -> ApiResult<String> {
        Ok(self.unique_id.clone())
    }

    fn start_frame(&self) -> ApiResult<i64> {
        Ok(TIMELINE_START_FRAME)
    }

    fn end_frame(&self) -> ApiResult<i64> {
        let tracks = lock(&self.tracks);
        Ok(tracks
            .values()
            .flatten()
            .flat_map(|track| track.items.iter())
            .map(|item| item.end_frame())
            .max()
            .unwrap_or(TIMELINE_START_FRAME))
    }

    fn start_timecode(&self) -> ApiResult<String> {
        Ok("01:00:00:00".to_string())
    }

    fn setting(&self, name: Option<&str>) -> ApiResult<Value> {
        let settings = BTreeMap::from([
            ("timelineFrameRate".to_string(), "24".to_string()),
            ("timelineResolutionWidth".to_string(), "1920".to_string()),
            ("timelineResolutionHeight".to_string(), "1080".to_string()),
        ]);
        Ok(string_map_json(&settings, name))
    }

    fn track_count(&self, track_type: &str) -> ApiResult<usize> {
        let tracks = lock(&self.tracks);
        Ok(track_key(track_type).and_then(|key| tracks.get(key)).map(Vec::len).unwrap_or(0))
    }

    fn add_track(&self, track_type: &str, sub_type: Option<&str>) -> ApiResult<bool> {
        let Some(key) = track_key(track_type) else {
            return Ok(false);
        };
        let mut track = MemoryTrack::new(key);
        if let (Some(sub_type), "audio") = (sub_type, key) {
            if !AUDIO_SUB_TYPES.contains(&sub_type) {
                return Ok(false);
            }
            track.sub_type = sub_type.to_string();
        }
        lock(&self.tracks).entry(key).or_default().push(track);
        Ok(true)
    }

    fn delete_track(&self, track_type: &str, index: usize) -> ApiResult<bool> {
        let mut tracks = lock(&self.tracks);
        let Some(list) = track_key(track_type).and_then(|key| tracks.get_mut(key)) else {
            return Ok(false);
        };
        match index.checked_sub(1).filter(|i| *i < list.len()) {
            Some(i) => {
                list.remove(i);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn track_enabled(&self, track_type: &str, index: usize) -> ApiResult<bool> {
        Ok(self.with_track(track_type, index, |track| track.enabled).unwrap_or(false))
    }

    fn set_track_enabled(&self, track_type: &str, index: usize, enabled: bool) -> ApiResult<bool> {
        Ok(self.with_track(track_type, index, |track| track.enabled = enabled).is_some())
    }

    fn track_locked(&self, track_type: &str, index: usize) -> ApiResult<bool> {
        Ok(self.with_track(track_type, index, |track| track.locked).unwrap_or(false))
    }

    fn set_track_locked(&self, track_type: &str, index: usize, locked: bool) -> ApiResult<bool> {
        Ok(self.with_track(track_type, index, |track| track.locked = locked).is_some())
    }

    fn items_in_track(
        &self,
        track_type: &str,
        index: usize,
    ) -> ApiResult<Option<Vec<Arc<dyn TimelineItem>>>> {
        let tracks = lock(&self.tracks);
        let track = track_key(track_type)
            .and_then(|key| tracks.get(key))
            .and_then(|list| index.checked_sub(1).and_then(|i| list.get(i)));
        Ok(track.map(|track| {
            track.items.iter().map(|i| i.clone() as Arc<dyn TimelineItem>).collect()
        }))
    }

    fn add_marker(&self, marker: &Marker) -> ApiResult<bool> {
        let mut markers = lock(&self.markers);
        if markers.contains_key(&marker.frame) {
            return Ok(false);
        }
        markers.insert(marker.frame, marker.clone());
        Ok(true)
    }

    fn markers(&self) -> ApiResult<Value> {
        Ok(markers_json(&lock(&self.markers)))
    }

    fn delete_marker_at_frame(&self, frame: i64) -> ApiResult<bool> {
        Ok(lock(&self.markers).remove(&frame).is_some())
    }

    fn current_timecode(&self) -> ApiResult<String> {
        Ok(lock(&self.playhead).clone())
    }

    fn set_current_timecode(&self, timecode: &str) -> ApiResult<bool> {
        if !valid_timecode(timecode) {
            return Ok(false);
        }
        *lock(&self.playhead) = timecode.to_string();
        Ok(true)
    }

    fn node_graph(&self) -> ApiResult<Option<Arc<dyn NodeGraph>>> {
        Ok(Some(self.graph.clone() as Arc<dyn NodeGraph>))
    }

    fn grab_still(&self) -> ApiResult<bool> {
        self.stills.fetch_add(1, Ordering::Relaxed);
        Ok(true)
    }
}

const ITEM_PROPERTIES: [(&str, f64); 8] = [
    ("Pan", 0.0),
    ("Tilt", 0.0),
    ("ZoomX", 1.0),
    ("ZoomY", 1.0),
    ("RotationAngle", 0.0),
    ("Opacity", 100.0),
    ("CropLeft", 0.0),
    ("CropRight", 0.0),
];

pub struct MemoryTimelineItem {
    unique_id: String,
    name: Mutex<String>,
    duration: i64,
    start: Mutex<i64>,
    properties: Mutex<BTreeMap<String, Value>>,
    enabled: Mutex<bool>,
    color: Mutex<String>,
    flags: Mutex<Vec<String>>,
    markers: Mutex<BTreeMap<i64, Marker>>,
    graph: Arc<MemoryNodeGraph>,
    /// Unique id of the assigned color group
    color_group: Mutex<Option<String>>,
}

impl MemoryTimelineItem {
    fn build(id: String, name: &str, duration: i64) -> Arc<Self> {
        let properties = ITEM_PROPERTIES.iter().map(|(k, v)| (k.to_string(), json!(v))).collect();
        Arc::new(Self {
            unique_id: id,
            name: Mutex::new(name.to_string()),
            duration,
            start: Mutex::new(TIMELINE_START_FRAME),
            properties: Mutex::new(properties),
            enabled: Mutex::new(true),
            color: Mutex::new(String::new()),
            flags: Mutex::new(Vec::new()),
            markers: Mutex::new(BTreeMap::new()),
            graph: MemoryNodeGraph::new(2),
            color_group: Mutex::new(None),
        })
    }

    pub fn new(name: &str) -> Arc<Self> {
        Self::build(next_id("item"), name, 24)
    }

    pub fn with_id(id: &str, name: &str) -> Arc<Self> {
        Self::build(id.to_string(), name, 24)
    }

    pub fn with_duration(name: &str, duration: i64) -> Arc<Self> {
        Self::build(next_id("item"), name, duration)
    }

    fn end_frame(&self) -> i64 {
        *lock(&self.start) + self.duration
    }

    pub fn graph(&self) -> Arc<MemoryNodeGraph> {
        self.graph.clone()
    }
}

impl TimelineItem for MemoryTimelineItem {
    fn name(&self) -> ApiResult<String> {
        Ok(lock(&self.name).clone())
    }

    fn set_name(&self, name: &str) -> ApiResult<bool> {
        *lock(&self.name) = name.to_string();
        Ok(true)
    }

    fn unique_id(&self) -> ApiResult<String> {
        Ok(self.unique_id.clone())
    }

    fn duration(&self) -> ApiResult<i64> {
        Ok(self.duration)
    }

    fn start(&self) -> ApiResult<i64> {
        Ok(*lock(&self.start))
    }

    fn end(&self) -> ApiResult<i64> {
        Ok(self.end_frame())
    }

    fn property(&self, key: Option<&str>) -> ApiResult<Value> {
        let properties = lock(&self.properties);
        Ok(match key {
            None => Value::Object(properties.iter().map(|(k, v)| (k.clone(), v.clone())).collect()),
            Some(key) => properties.get(key).cloned().unwrap_or(Value::Null),
        })
    }

    fn set_property(&self, key: &str, value: &Value) -> ApiResult<bool> {
        let mut properties = lock(&self.properties);
        match properties.get_mut(key) {
            Some(slot) if value.is_number() => {
                *slot = value.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn clip_enabled(&self) -> ApiResult<bool> {
        Ok(*lock(&self.enabled))
    }

    fn set_clip_enabled(&self, enabled: bool) -> ApiResult<bool> {
        *lock(&self.enabled) = enabled;
        Ok(true)
    }

    fn clip_color(&self) -> ApiResult<String> {
        Ok(lock(&self.color).clone())
    }

    fn set_clip_color(&self, color: &str) -> ApiResult<bool> {
        *lock(&self.color) = color.to_string();
        Ok(true)
    }

    fn add_flag(&self, color: &str) -> ApiResult<bool> {
        let mut flags = lock(&self.flags);
        if !flags.iter().any(|f| f == color) {
            flags.push(color.to_string());
        }
        Ok(true)
    }

    fn flags(&self) -> ApiResult<Vec<String>> {
        Ok(lock(&self.flags).clone())
    }

    fn clear_flags(&self, color: &str) -> ApiResult<bool> {
        let mut flags = lock(&self.flags);
        if color == "All" {
            flags.clear();
        } else {
            flags.retain(|f| f != color);
        }
        Ok(true)
    }

    fn add_marker(&self, marker: &Marker) -> ApiResult<bool> {
        let mut markers = lock(&self.markers);
        if marker.frame >= self.duration || markers.contains_key(&marker.frame) {
            return Ok(false);
        }
        markers.insert(marker.frame, marker.clone());
        Ok(true)
    }

    fn markers(&self) -> ApiResult<Value> {
        Ok(markers_json(&lock(&self.markers)))
    }

    fn node_graph(&self, layer: i64) -> ApiResult<Option<Arc<dyn NodeGraph>>> {
        Ok((layer == 1).then(|| self.graph.clone() as Arc<dyn NodeGraph>))
    }

    fn assign_to_color_group(&self, group: &dyn ColorGroup) -> ApiResult<bool> {
        let Some(group) = group.as_any().downcast_ref::<MemoryColorGroup>() else {
            return Ok(false);
        };
        *lock(&self.color_group) = Some(group.unique_id.clone());
        Ok(true)
    }
}

// ============================================================================
// Node graph
// ============================================================================

#[derive(Debug, Clone, Default)]
struct MemoryNode {
    label: String,
    enabled: bool,
    lut: String,
    cache_mode: i64,
}

pub struct MemoryNodeGraph {
    nodes: Mutex<Vec<MemoryNode>>,
}

impl MemoryNodeGraph {
    pub fn new(count: usize) -> Arc<Self> {
        let nodes = (1..=count)
            .map(|i| MemoryNode {
                label: format!("Node {}", i),
                enabled: true,
                cache_mode: -1,
                ..Default::default()
            })
            .collect();
        Arc::new(Self { nodes: Mutex::new(nodes) })
    }

    fn with_node<T>(&self, node: i64, f: impl FnOnce(&mut MemoryNode) -> T) -> Option<T> {
        let mut nodes = lock(&self.nodes);
        let index = usize::try_from(node).ok()?.checked_sub(1)?;
        nodes.get_mut(index).map(f)
    }
}

impl NodeGraph for MemoryNodeGraph {
    fn num_nodes(&self) -> ApiResult<i64> {
        Ok(lock(&self.nodes).len() as i64)
    }

    fn node_label(&self, node: i64) -> ApiResult<String> {
        Ok(self.with_node(node, |n| n.label.clone()).unwrap_or_default())
    }

    fn set_node_enabled(&self, node: i64, enabled: bool) -> ApiResult<bool> {
        Ok(self.with_node(node, |n| n.enabled = enabled).is_some())
    }

    fn set_lut(&self, node: i64, lut_path: &str) -> ApiResult<bool> {
        Ok(self.with_node(node, |n| n.lut = lut_path.to_string()).is_some())
    }

    fn lut(&self, node: i64) -> ApiResult<String> {
        Ok(self.with_node(node, |n| n.lut.clone()).unwrap_or_default())
    }

    fn node_cache_mode(&self, node: i64) -> ApiResult<i64> {
        Ok(self.with_node(node, |n| n.cache_mode).unwrap_or(-1))
    }

    fn set_node_cache_mode(&self, node: i64, mode: i64) -> ApiResult<bool> {
        Ok(self.with_node(node, |n| n.cache_mode = mode).is_some())
    }

    fn reset_all_grades(&self) -> ApiResult<bool> {
        for node in lock(&self.nodes).iter_mut() {
            node.lut.clear();
            node.enabled = true;
        }
        Ok(true)
    }
}

// ============================================================================
// Gallery
// ============================================================================

pub struct MemoryAlbum {
    unique_id: String,
    name: String,
    stills: AtomicU64,
}

impl MemoryAlbum {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            unique_id: next_id("album"),
            name: name.to_string(),
            stills: AtomicU64::new(0),
        })
    }

    pub fn add_still(&self) {
        self.stills.fetch_add(1, Ordering::Relaxed);
    }
}

impl StillAlbum for MemoryAlbum {
    fn still_count(&self) -> ApiResult<usize> {
        Ok(self.stills.load(Ordering::Relaxed) as usize)
    }
}

fn as_memory_album(album: &dyn StillAlbum) -> ApiResult<&MemoryAlbum> {
    album
        .as_any()
        .downcast_ref::<MemoryAlbum>()
        .ok_or_else(|| ApiError::new("GetAlbumName", "album does not belong to this gallery"))
}

pub struct MemoryGallery {
    still_albums: Mutex<Vec<Arc<MemoryAlbum>>>,
    power_grade_albums: Mutex<Vec<Arc<MemoryAlbum>>>,
    current: Mutex<Option<Arc<MemoryAlbum>>>,
}

impl MemoryGallery {
    fn new() -> Self {
        let stills = MemoryAlbum::new("Stills 1");
        Self {
            current: Mutex::new(Some(stills.clone())),
            still_albums: Mutex::new(vec![stills]),
            power_grade_albums: Mutex::new(vec![MemoryAlbum::new("PowerGrade 1")]),
        }
    }

    pub fn add_still_album(&self, name: &str) -> Arc<MemoryAlbum> {
        let album = MemoryAlbum::new(name);
        lock(&self.still_albums).push(album.clone());
        album
    }
}

impl Gallery for MemoryGallery {
    fn still_albums(&self) -> ApiResult<Vec<Arc<dyn StillAlbum>>> {
        Ok(lock(&self.still_albums).iter().map(|a| a.clone() as Arc<dyn StillAlbum>).collect())
    }

    fn power_grade_albums(&self) -> ApiResult<Vec<Arc<dyn StillAlbum>>> {
        Ok(lock(&self.power_grade_albums)
            .iter()
            .map(|a| a.clone() as Arc<dyn StillAlbum>)
            .collect())
    }

    fn album_name(&self, album: &dyn StillAlbum) -> ApiResult<String> {
        Ok(as_memory_album(album)?.name.clone())
    }

    fn current_still_album(&self) -> ApiResult<Option<Arc<dyn StillAlbum>>> {
        Ok(lock(&self.current).clone().map(|a| a as Arc<dyn StillAlbum>))
    }

    fn set_current_still_album(&self, album: &dyn StillAlbum) -> ApiResult<bool> {
        let id = &as_memory_album(album)?.unique_id;
        let found = lock(&self.still_albums).iter().find(|a| &a.unique_id == id).cloned();
        let matched = found.is_some();
        if matched {
            *lock(&self.current) = found;
        }
        Ok(matched)
    }
}

// ============================================================================
// Media storage
// ============================================================================

pub struct MemoryStorage {
    app: Weak<MemoryResolve>,
    volumes: Mutex<Vec<String>>,
    files: Mutex<Vec<String>>,
}

impl MemoryStorage {
    fn new(app: Weak<MemoryResolve>) -> Self {
        Self { app, volumes: Mutex::new(Vec::new()), files: Mutex::new(Vec::new()) }
    }

    pub fn add_volume(&self, path: &str) {
        lock(&self.volumes).push(path.to_string());
    }

    pub fn add_file(&self, path: &str) {
        lock(&self.files).push(path.to_string());
    }
}

fn parent_of(path: &str) -> Option<&str> {
    path.rsplit_once('/').map(|(parent, _)| parent)
}

impl MediaStorage for MemoryStorage {
    fn mounted_volumes(&self) -> ApiResult<Vec<String>> {
        Ok(lock(&self.volumes).clone())
    }

    fn subfolders(&self, path: &str) -> ApiResult<Vec<String>> {
        let path = path.trim_end_matches('/');
        let mut folders: Vec<String> = Vec::new();
        for file in lock(&self.files).iter() {
            let mut dir = parent_of(file);
            while let Some(d) = dir {
                if parent_of(d) == Some(path) && !folders.iter().any(|f| f == d) {
                    folders.push(d.to_string());
                }
                dir = parent_of(d);
            }
        }
        Ok(folders)
    }

    fn files(&self, path: &str) -> ApiResult<Vec<String>> {
        let path = path.trim_end_matches('/');
        Ok(lock(&self.files).iter().filter(|f| parent_of(f) == Some(path)).cloned().collect())
    }

    fn add_items_to_media_pool(&self, paths: &[String]) -> ApiResult<usize> {
        let Some(app) = self.app.upgrade() else {
            return Err(ApiError::new("AddItemListToMediaPool", "application has shut down"));
        };
        let Some(pool) = app.current_memory_project().and_then(|p| p.media_pool.clone()) else {
            return Ok(0);
        };
        let mut known = Vec::new();
        for path in paths {
            let prefix = format!("{}/", path.trim_end_matches('/'));
            for file in lock(&self.files).iter() {
                if file == path || file.starts_with(&prefix) {
                    known.push(file.clone());
                }
            }
        }
        Ok(pool.import_media(&known)?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_is_populated() {
        let app = MemoryResolve::demo();
        let project = app.current_memory_project().unwrap();
        assert_eq!(project.timeline_count().unwrap(), 2);
        let timeline = project.current_timeline().unwrap().unwrap();
        assert_eq!(timeline.name().unwrap(), "Edit 1");
        assert_eq!(timeline.track_count("video").unwrap(), 1);
        assert_eq!(timeline.end_frame().unwrap(), TIMELINE_START_FRAME + 420);
    }

    #[test]
    fn test_push_item_positions_sequentially() {
        let timeline = MemoryTimeline::new("Seq");
        let a = timeline.push_item("video", 1, MemoryTimelineItem::with_duration("a", 10));
        let b = timeline.push_item("video", 1, MemoryTimelineItem::with_duration("b", 5));
        assert_eq!(a.start().unwrap(), TIMELINE_START_FRAME);
        assert_eq!(b.start().unwrap(), TIMELINE_START_FRAME + 10);
        assert_eq!(b.end().unwrap(), TIMELINE_START_FRAME + 15);
    }

    #[test]
    fn test_push_item_creates_tracks() {
        let timeline = MemoryTimeline::new("Tracks");
        timeline.push_item("audio", 3, MemoryTimelineItem::new("dialog"));
        assert_eq!(timeline.track_count("audio").unwrap(), 3);
        assert_eq!(timeline.items_in_track("audio", 2).unwrap().unwrap().len(), 0);
        assert!(timeline.items_in_track("audio", 4).unwrap().is_none());
        assert_eq!(timeline.track_count("bogus").unwrap(), 0);
    }

    #[test]
    fn test_storage_listing() {
        let app = MemoryResolve::demo();
        let storage = app.storage();
        assert_eq!(
            storage.subfolders("/Volumes/Media").unwrap(),
            vec!["/Volumes/Media/Day1", "/Volumes/Media/Day2"]
        );
        assert_eq!(
            storage.files("/Volumes/Media/Day2").unwrap(),
            vec!["/Volumes/Media/Day2/B001_C001.mov"]
        );
    }

    #[test]
    fn test_storage_adds_to_current_folder() {
        let app = MemoryResolve::demo();
        let added = app.storage().add_items_to_media_pool(&["/Volumes/Media/Day1".to_string()]);
        assert_eq!(added, Ok(2));
        let root = app.root_folder().unwrap();
        let names: Vec<_> =
            root.clips().unwrap().unwrap().iter().map(|c| c.name().unwrap()).collect();
        assert!(names.contains(&"A002_C001.mov".to_string()));
    }

    #[test]
    fn test_set_current_folder_by_handle() {
        let app = MemoryResolve::demo();
        let project = app.current_memory_project().unwrap();
        let pool = project.media_pool().unwrap().unwrap();
        let footage = app.root_folder().unwrap().subfolder("Footage").unwrap();
        assert!(pool.set_current_folder(footage.as_ref()).unwrap());
        assert_eq!(pool.current_folder().unwrap().unwrap().name().unwrap(), "Footage");
    }

    #[test]
    fn test_shared_handle_downcasts_to_pointee() {
        let folder: Arc<dyn Folder> = MemoryFolder::new("Selects");
        assert!(folder.as_any().downcast_ref::<MemoryFolder>().is_some());
        assert!(folder.as_any().downcast_ref::<Arc<dyn Folder>>().is_none());

        let app = MemoryResolve::demo();
        let pool = app.current_memory_project().unwrap().media_pool().unwrap().unwrap();
        let created = pool.add_sub_folder(folder.as_ref(), "Inner").unwrap().unwrap();
        assert!(pool.set_current_folder(created.as_ref()).unwrap());
        assert_eq!(pool.current_folder().unwrap().unwrap().name().unwrap(), "Inner");
    }

    #[test]
    fn test_render_queue_lifecycle() {
        let app = MemoryResolve::demo();
        let project = app.current_memory_project().unwrap();
        let id = project.add_render_job().unwrap().unwrap();
        assert!(project.start_rendering(&[]).unwrap());
        assert!(project.is_rendering_in_progress().unwrap());
        project.stop_rendering().unwrap();
        assert_eq!(project.render_job_status(&id).unwrap()["JobStatus"], "Cancelled");
        assert!(project.delete_render_job(&id).unwrap());
        assert_eq!(project.render_job_status(&id).unwrap(), json!({}));
    }

    #[test]
    fn test_deleted_track_takes_its_items() {
        let timeline = MemoryTimeline::new("Tracks");
        timeline.push_item("video", 2, MemoryTimelineItem::with_duration("b-roll", 48));
        assert_eq!(timeline.track_count("video").unwrap(), 2);
        assert!(timeline.set_track_locked("video", 2, true).unwrap());
        assert!(timeline.delete_track("video", 2).unwrap());
        assert_eq!(timeline.end_frame().unwrap(), TIMELINE_START_FRAME);
        assert!(!timeline.delete_track("video", 0).unwrap());
        assert!(!timeline.track_locked("video", 2).unwrap());
        assert!(timeline.add_track("subtitle", Some("5.1")).unwrap());
        assert_eq!(timeline.track_sub_type("subtitle", 1).as_deref(), Some(""));
    }

    #[test]
    fn test_color_group_membership_follows_deletion() {
        let project = MemoryProject::new("Groups");
        let timeline = project.add_timeline(MemoryTimeline::new("Cut"));
        let item = timeline.push_item("video", 1, MemoryTimelineItem::new("shot"));
        let group = project.add_color_group("Night").unwrap().unwrap();
        assert!(project.add_color_group("Night").unwrap().is_none());
        assert!(item.assign_to_color_group(group.as_ref()).unwrap());
        assert_eq!(group.clips_in_timeline(timeline.as_ref()).unwrap().len(), 1);

        assert!(project.delete_color_group(group.as_ref()).unwrap());
        assert!(!project.delete_color_group(group.as_ref()).unwrap());
        assert!(project.color_groups().unwrap().is_empty());
    }

    #[test]
    fn test_frames_to_timecode() {
        assert_eq!(frames_to_timecode(24, 24), "00:00:01:00");
        assert_eq!(frames_to_timecode(86_400 + 5, 24), "01:00:00:05");
    }
}
