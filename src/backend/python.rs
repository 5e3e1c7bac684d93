//! The real scripting API, driven through embedded CPython.
//!
//! `DaVinciResolveScript` is a Python module shipped with Resolve. The
//! connector exports the `RESOLVE_SCRIPT_*` variables, puts the module
//! directory on `sys.path`, imports it and calls `scriptapp`. Every object it
//! hands out is wrapped in a typed newtype around `Py<PyAny>`; each trait
//! method is a single method call on that object.

use std::sync::Arc;

use pyo3::prelude::*;
use pyo3::types::{PyBool, PyDict, PyFloat, PyInt, PyList, PyString, PyTuple};
use serde_json::{Map, Number, Value};

use crate::api::{
    ApiError, ApiResult, Clip, ColorGroup, Connector, Folder, Gallery, Marker, MediaPool,
    MediaStorage, NodeGraph, Project, ProjectManager, Resolve, StillAlbum, Timeline, TimelineItem,
};
use crate::api::script_object;
use crate::platform::ScriptPaths;

const SCRIPT_MODULE: &str = "DaVinciResolveScript";

/// Connects by importing `DaVinciResolveScript` into an embedded interpreter.
pub struct PythonConnector {
    paths: ScriptPaths,
    app_name: String,
}

impl PythonConnector {
    pub fn new(paths: ScriptPaths, app_name: &str) -> Self {
        Self { paths, app_name: app_name.to_string() }
    }
}

impl Connector for PythonConnector {
    fn name(&self) -> &str {
        "python"
    }

    fn connect(&self) -> ApiResult<Arc<dyn Resolve>> {
        self.paths.export();
        let modules = self.paths.modules_path.to_string_lossy().into_owned();
        let app = Python::with_gil(|py| -> PyResult<Option<Py<PyAny>>> {
            let sys_path = py.import("sys")?.getattr("path")?;
            if !sys_path.contains(&modules)? {
                sys_path.call_method1("insert", (0, &modules))?;
            }
            let app = py.import(SCRIPT_MODULE)?.call_method1("scriptapp", (&self.app_name,))?;
            Ok((!app.is_none()).then(|| app.unbind()))
        })
        .map_err(|e| ApiError::new("scriptapp", e.to_string()))?;

        match app {
            Some(app) => Ok(Arc::new(PyResolve(Handle(app)))),
            None => Err(ApiError::new(
                "scriptapp",
                "Failed to get Resolve object. Is DaVinci Resolve running?",
            )),
        }
    }
}

// ============================================================================
// Object handles
// ============================================================================

struct Handle(Py<PyAny>);

enum Arg<'a> {
    Json(Value),
    Obj(&'a Handle),
    Objs(Vec<&'a Handle>),
}

impl Arg<'_> {
    fn str(s: &str) -> Self {
        Arg::Json(Value::String(s.to_string()))
    }

    fn int(i: i64) -> Self {
        Arg::Json(Value::from(i))
    }

    fn to_py<'py>(&self, py: Python<'py>) -> PyResult<Bound<'py, PyAny>> {
        match self {
            Arg::Json(value) => json_to_py(py, value),
            Arg::Obj(handle) => Ok(handle.0.bind(py).clone()),
            Arg::Objs(handles) => {
                let list = PyList::empty(py);
                for handle in handles {
                    list.append(handle.0.bind(py))?;
                }
                Ok(list.into_any())
            }
        }
    }
}

fn invoke<'py>(
    obj: &Bound<'py, PyAny>,
    method: &str,
    args: &[Arg<'_>],
) -> PyResult<Bound<'py, PyAny>> {
    let py = obj.py();
    let args = args.iter().map(|arg| arg.to_py(py)).collect::<PyResult<Vec<_>>>()?;
    obj.call_method1(method, PyTuple::new(py, args)?)
}

fn items<'py>(value: &Bound<'py, PyAny>) -> PyResult<Vec<Bound<'py, PyAny>>> {
    if let Ok(dict) = value.downcast::<PyDict>() {
        // index-keyed dicts such as {1: clip, 2: clip}
        let mut entries: Vec<_> = dict.iter().collect();
        entries.sort_by_key(|(key, _)| key.extract::<i64>().unwrap_or(i64::MAX));
        return Ok(entries.into_iter().map(|(_, v)| v).collect());
    }
    value.try_iter()?.collect()
}

impl Handle {
    fn call<T>(
        &self,
        method: &str,
        args: &[Arg<'_>],
        convert: impl for<'py> FnOnce(Bound<'py, PyAny>) -> PyResult<T>,
    ) -> ApiResult<T> {
        Python::with_gil(|py| invoke(self.0.bind(py), method, args).and_then(convert))
            .map_err(|e| ApiError::new(method, e.to_string()))
    }

    fn value(&self, method: &str, args: &[Arg<'_>]) -> ApiResult<Value> {
        self.call(method, args, |r| py_to_json(&r))
    }

    fn string(&self, method: &str, args: &[Arg<'_>]) -> ApiResult<String> {
        self.call(method, args, |r| {
            if r.is_none() {
                Ok(String::new())
            } else {
                Ok(r.str()?.to_string())
            }
        })
    }

    fn boolean(&self, method: &str, args: &[Arg<'_>]) -> ApiResult<bool> {
        self.call(method, args, |r| r.is_truthy())
    }

    fn int(&self, method: &str, args: &[Arg<'_>]) -> ApiResult<i64> {
        self.call(method, args, |r| if r.is_none() { Ok(0) } else { r.extract::<i64>() })
    }

    fn count(&self, method: &str, args: &[Arg<'_>]) -> ApiResult<usize> {
        self.call(method, args, |r| if r.is_none() { Ok(0) } else { Ok(items(&r)?.len()) })
    }

    fn strings(&self, method: &str, args: &[Arg<'_>]) -> ApiResult<Vec<String>> {
        self.call(method, args, |r| {
            if r.is_none() {
                return Ok(Vec::new());
            }
            items(&r)?.iter().map(|item| Ok(item.str()?.to_string())).collect()
        })
    }

    fn object(&self, method: &str, args: &[Arg<'_>]) -> ApiResult<Option<Handle>> {
        self.call(method, args, |r| Ok((!r.is_none()).then(|| Handle(r.unbind()))))
    }

    fn objects(&self, method: &str, args: &[Arg<'_>]) -> ApiResult<Option<Vec<Handle>>> {
        self.call(method, args, |r| {
            if r.is_none() {
                return Ok(None);
            }
            Ok(Some(items(&r)?.into_iter().map(|item| Handle(item.unbind())).collect()))
        })
    }

    fn add_marker(&self, marker: &Marker) -> ApiResult<bool> {
        self.boolean(
            "AddMarker",
            &[
                Arg::int(marker.frame),
                Arg::str(&marker.color),
                Arg::str(&marker.name),
                Arg::str(&marker.note),
                Arg::int(marker.duration),
                Arg::str(&marker.custom_data),
            ],
        )
    }
}

/// Optional lookup key: no argument returns the whole table.
fn key_args(key: Option<&str>) -> Vec<Arg<'static>> {
    key.map(|k| vec![Arg::str(k)]).unwrap_or_default()
}

macro_rules! py_objects {
    ($($name:ident),* $(,)?) => {
        $(
            pub struct $name(Handle);

            script_object!($name);

            impl $name {
                fn wrap(handle: Handle) -> Arc<Self> {
                    Arc::new(Self(handle))
                }
            }
        )*
    };
}

py_objects!(
    PyResolve,
    PyProjectManager,
    PyProject,
    PyMediaPool,
    PyFolder,
    PyClip,
    PyTimeline,
    PyTimelineItem,
    PyNodeGraph,
    PyGallery,
    PyStillAlbum,
    PyMediaStorage,
    PyColorGroup,
);

/// Recover the Python handle of an object passed back into the API.
fn handle_of<'a, T: 'static>(obj: &'a dyn std::any::Any, call: &str) -> ApiResult<&'a T> {
    obj.downcast_ref::<T>()
        .ok_or_else(|| ApiError::new(call, "object was not created by the python backend"))
}

/// `(track_type, index)` arguments of the per-track timeline calls.
fn track_args(track_type: &str, index: usize, call: &str) -> ApiResult<Vec<Arg<'static>>> {
    let index = i64::try_from(index).map_err(|e| ApiError::new(call, e.to_string()))?;
    Ok(vec![Arg::str(track_type), Arg::int(index)])
}

fn clip_handles<'a>(clips: &'a [Arc<dyn Clip>], call: &str) -> ApiResult<Vec<&'a Handle>> {
    clips
        .iter()
        .map(|clip| handle_of::<PyClip>(clip.as_ref().as_any(), call).map(|c| &c.0))
        .collect()
}

// ============================================================================
// Trait implementations
// ============================================================================

impl Resolve for PyResolve {
    fn product_name(&self) -> ApiResult<String> {
        self.0.string("GetProductName", &[])
    }

    fn version_string(&self) -> ApiResult<String> {
        self.0.string("GetVersionString", &[])
    }

    fn version(&self) -> ApiResult<Value> {
        self.0.value("GetVersion", &[])
    }

    fn project_manager(&self) -> ApiResult<Option<Arc<dyn ProjectManager>>> {
        let pm = self.0.object("GetProjectManager", &[])?;
        Ok(pm.map(|h| PyProjectManager::wrap(h) as Arc<dyn ProjectManager>))
    }

    fn media_storage(&self) -> ApiResult<Option<Arc<dyn MediaStorage>>> {
        let storage = self.0.object("GetMediaStorage", &[])?;
        Ok(storage.map(|h| PyMediaStorage::wrap(h) as Arc<dyn MediaStorage>))
    }

    fn current_page(&self) -> ApiResult<Option<String>> {
        let page = self.0.string("GetCurrentPage", &[])?;
        Ok((!page.is_empty()).then_some(page))
    }

    fn open_page(&self, page: &str) -> ApiResult<bool> {
        self.0.boolean("OpenPage", &[Arg::str(page)])
    }

    fn load_layout_preset(&self, name: &str) -> ApiResult<bool> {
        self.0.boolean("LoadLayoutPreset", &[Arg::str(name)])
    }

    fn save_layout_preset(&self, name: &str) -> ApiResult<bool> {
        self.0.boolean("SaveLayoutPreset", &[Arg::str(name)])
    }

    fn keyframe_mode(&self) -> ApiResult<i64> {
        self.0.int("GetKeyframeMode", &[])
    }

    fn set_keyframe_mode(&self, mode: i64) -> ApiResult<bool> {
        self.0.boolean("SetKeyframeMode", &[Arg::int(mode)])
    }
}

impl ProjectManager for PyProjectManager {
    fn project_names(&self) -> ApiResult<Vec<String>> {
        self.0.strings("GetProjectListInCurrentFolder", &[])
    }

    fn current_project(&self) -> ApiResult<Option<Arc<dyn Project>>> {
        let project = self.0.object("GetCurrentProject", &[])?;
        Ok(project.map(|h| PyProject::wrap(h) as Arc<dyn Project>))
    }

    fn load_project(&self, name: &str) -> ApiResult<Option<Arc<dyn Project>>> {
        let project = self.0.object("LoadProject", &[Arg::str(name)])?;
        Ok(project.map(|h| PyProject::wrap(h) as Arc<dyn Project>))
    }

    fn create_project(&self, name: &str) -> ApiResult<Option<Arc<dyn Project>>> {
        let project = self.0.object("CreateProject", &[Arg::str(name)])?;
        Ok(project.map(|h| PyProject::wrap(h) as Arc<dyn Project>))
    }

    fn save_project(&self) -> ApiResult<bool> {
        self.0.boolean("SaveProject", &[])
    }

    fn close_project(&self, project: &dyn Project) -> ApiResult<bool> {
        let project = handle_of::<PyProject>(project.as_any(), "CloseProject")?;
        self.0.boolean("CloseProject", &[Arg::Obj(&project.0)])
    }
}

impl Project for PyProject {
    fn name(&self) -> ApiResult<String> {
        self.0.string("GetName", &[])
    }

    fn unique_id(&self) -> ApiResult<String> {
        self.0.string("GetUniqueId", &[])
    }

    fn media_pool(&self) -> ApiResult<Option<Arc<dyn MediaPool>>> {
        let pool = self.0.object("GetMediaPool", &[])?;
        Ok(pool.map(|h| PyMediaPool::wrap(h) as Arc<dyn MediaPool>))
    }

    fn gallery(&self) -> ApiResult<Option<Arc<dyn Gallery>>> {
        let gallery = self.0.object("GetGallery", &[])?;
        Ok(gallery.map(|h| PyGallery::wrap(h) as Arc<dyn Gallery>))
    }

    fn timeline_count(&self) -> ApiResult<usize> {
        Ok(usize::try_from(self.0.int("GetTimelineCount", &[])?).unwrap_or(0))
    }

    fn timeline_by_index(&self, index: usize) -> ApiResult<Option<Arc<dyn Timeline>>> {
        let index =
            i64::try_from(index).map_err(|e| ApiError::new("GetTimelineByIndex", e.to_string()))?;
        let timeline = self.0.object("GetTimelineByIndex", &[Arg::int(index)])?;
        Ok(timeline.map(|h| PyTimeline::wrap(h) as Arc<dyn Timeline>))
    }

    fn current_timeline(&self) -> ApiResult<Option<Arc<dyn Timeline>>> {
        let timeline = self.0.object("GetCurrentTimeline", &[])?;
        Ok(timeline.map(|h| PyTimeline::wrap(h) as Arc<dyn Timeline>))
    }

    fn set_current_timeline(&self, timeline: &dyn Timeline) -> ApiResult<bool> {
        let timeline = handle_of::<PyTimeline>(timeline.as_any(), "SetCurrentTimeline")?;
        self.0.boolean("SetCurrentTimeline", &[Arg::Obj(&timeline.0)])
    }

    fn setting(&self, name: Option<&str>) -> ApiResult<Value> {
        self.0.value("GetSetting", &key_args(name))
    }

    fn set_setting(&self, name: &str, value: &str) -> ApiResult<bool> {
        self.0.boolean("SetSetting", &[Arg::str(name), Arg::str(value)])
    }

    fn render_formats(&self) -> ApiResult<Value> {
        self.0.value("GetRenderFormats", &[])
    }

    fn render_jobs(&self) -> ApiResult<Value> {
        self.0.value("GetRenderJobList", &[])
    }

    fn add_render_job(&self) -> ApiResult<Option<String>> {
        let id = self.0.string("AddRenderJob", &[])?;
        Ok((!id.is_empty()).then_some(id))
    }

    fn delete_render_job(&self, job_id: &str) -> ApiResult<bool> {
        self.0.boolean("DeleteRenderJob", &[Arg::str(job_id)])
    }

    fn render_job_status(&self, job_id: &str) -> ApiResult<Value> {
        self.0.value("GetRenderJobStatus", &[Arg::str(job_id)])
    }

    fn start_rendering(&self, job_ids: &[String]) -> ApiResult<bool> {
        if job_ids.is_empty() {
            return self.0.boolean("StartRendering", &[]);
        }
        let ids = Value::Array(job_ids.iter().cloned().map(Value::String).collect());
        self.0.boolean("StartRendering", &[Arg::Json(ids)])
    }

    fn stop_rendering(&self) -> ApiResult<()> {
        self.0.call("StopRendering", &[], |_| Ok(()))
    }

    fn is_rendering_in_progress(&self) -> ApiResult<bool> {
        self.0.boolean("IsRenderingInProgress", &[])
    }

    fn delete_all_render_jobs(&self) -> ApiResult<bool> {
        self.0.boolean("DeleteAllRenderJobs", &[])
    }

    fn render_codecs(&self, format: &str) -> ApiResult<Value> {
        self.0.value("GetRenderCodecs", &[Arg::str(format)])
    }

    fn current_render_format_and_codec(&self) -> ApiResult<Value> {
        self.0.value("GetCurrentRenderFormatAndCodec", &[])
    }

    fn set_render_format_and_codec(&self, format: &str, codec: &str) -> ApiResult<bool> {
        self.0.boolean("SetCurrentRenderFormatAndCodec", &[Arg::str(format), Arg::str(codec)])
    }

    fn set_render_settings(&self, settings: &Value) -> ApiResult<bool> {
        self.0.boolean("SetRenderSettings", &[Arg::Json(settings.clone())])
    }

    fn render_presets(&self) -> ApiResult<Vec<String>> {
        self.0.strings("GetRenderPresetList", &[])
    }

    fn load_render_preset(&self, name: &str) -> ApiResult<bool> {
        self.0.boolean("LoadRenderPreset", &[Arg::str(name)])
    }

    fn save_render_preset(&self, name: &str) -> ApiResult<bool> {
        self.0.boolean("SaveAsNewRenderPreset", &[Arg::str(name)])
    }

    fn delete_render_preset(&self, name: &str) -> ApiResult<bool> {
        self.0.boolean("DeleteRenderPreset", &[Arg::str(name)])
    }

    fn color_groups(&self) -> ApiResult<Vec<Arc<dyn ColorGroup>>> {
        let groups = self.0.objects("GetColorGroupsList", &[])?.unwrap_or_default();
        Ok(groups.into_iter().map(|h| PyColorGroup::wrap(h) as Arc<dyn ColorGroup>).collect())
    }

    fn add_color_group(&self, name: &str) -> ApiResult<Option<Arc<dyn ColorGroup>>> {
        let group = self.0.object("AddColorGroup", &[Arg::str(name)])?;
        Ok(group.map(|h| PyColorGroup::wrap(h) as Arc<dyn ColorGroup>))
    }

    fn delete_color_group(&self, group: &dyn ColorGroup) -> ApiResult<bool> {
        let group = handle_of::<PyColorGroup>(group.as_any(), "DeleteColorGroup")?;
        self.0.boolean("DeleteColorGroup", &[Arg::Obj(&group.0)])
    }
}

impl ColorGroup for PyColorGroup {
    fn name(&self) -> ApiResult<String> {
        self.0.string("GetName", &[])
    }

    fn set_name(&self, name: &str) -> ApiResult<bool> {
        self.0.boolean("SetName", &[Arg::str(name)])
    }

    fn clips_in_timeline(
        &self,
        timeline: &dyn Timeline,
    ) -> ApiResult<Vec<Arc<dyn TimelineItem>>> {
        let timeline = handle_of::<PyTimeline>(timeline.as_any(), "GetClipsInTimeline")?;
        let items =
            self.0.objects("GetClipsInTimeline", &[Arg::Obj(&timeline.0)])?.unwrap_or_default();
        Ok(items.into_iter().map(|h| PyTimelineItem::wrap(h) as Arc<dyn TimelineItem>).collect())
    }

    fn pre_clip_node_graph(&self) -> ApiResult<Option<Arc<dyn NodeGraph>>> {
        let graph = self.0.object("GetPreClipNodeGraph", &[])?;
        Ok(graph.map(|h| PyNodeGraph::wrap(h) as Arc<dyn NodeGraph>))
    }

    fn post_clip_node_graph(&self) -> ApiResult<Option<Arc<dyn NodeGraph>>> {
        let graph = self.0.object("GetPostClipNodeGraph", &[])?;
        Ok(graph.map(|h| PyNodeGraph::wrap(h) as Arc<dyn NodeGraph>))
    }
}

impl MediaPool for PyMediaPool {
    fn root_folder(&self) -> ApiResult<Option<Arc<dyn Folder>>> {
        let folder = self.0.object("GetRootFolder", &[])?;
        Ok(folder.map(|h| PyFolder::wrap(h) as Arc<dyn Folder>))
    }

    fn current_folder(&self) -> ApiResult<Option<Arc<dyn Folder>>> {
        let folder = self.0.object("GetCurrentFolder", &[])?;
        Ok(folder.map(|h| PyFolder::wrap(h) as Arc<dyn Folder>))
    }

    fn set_current_folder(&self, folder: &dyn Folder) -> ApiResult<bool> {
        let folder = handle_of::<PyFolder>(folder.as_any(), "SetCurrentFolder")?;
        self.0.boolean("SetCurrentFolder", &[Arg::Obj(&folder.0)])
    }

    fn add_sub_folder(
        &self,
        parent: &dyn Folder,
        name: &str,
    ) -> ApiResult<Option<Arc<dyn Folder>>> {
        let parent = handle_of::<PyFolder>(parent.as_any(), "AddSubFolder")?;
        let folder = self.0.object("AddSubFolder", &[Arg::Obj(&parent.0), Arg::str(name)])?;
        Ok(folder.map(|h| PyFolder::wrap(h) as Arc<dyn Folder>))
    }

    fn create_empty_timeline(&self, name: &str) -> ApiResult<Option<Arc<dyn Timeline>>> {
        let timeline = self.0.object("CreateEmptyTimeline", &[Arg::str(name)])?;
        Ok(timeline.map(|h| PyTimeline::wrap(h) as Arc<dyn Timeline>))
    }

    fn create_timeline_from_clips(
        &self,
        name: &str,
        clips: &[Arc<dyn Clip>],
    ) -> ApiResult<Option<Arc<dyn Timeline>>> {
        let clips = clip_handles(clips, "CreateTimelineFromClips")?;
        let timeline =
            self.0.object("CreateTimelineFromClips", &[Arg::str(name), Arg::Objs(clips)])?;
        Ok(timeline.map(|h| PyTimeline::wrap(h) as Arc<dyn Timeline>))
    }

    fn append_to_timeline(&self, clips: &[Arc<dyn Clip>]) -> ApiResult<usize> {
        let clips = clip_handles(clips, "AppendToTimeline")?;
        self.0.count("AppendToTimeline", &[Arg::Objs(clips)])
    }

    fn import_media(&self, paths: &[String]) -> ApiResult<Vec<Arc<dyn Clip>>> {
        let paths = Value::Array(paths.iter().cloned().map(Value::String).collect());
        let clips = self.0.objects("ImportMedia", &[Arg::Json(paths)])?.unwrap_or_default();
        Ok(clips.into_iter().map(|h| PyClip::wrap(h) as Arc<dyn Clip>).collect())
    }
}

impl Folder for PyFolder {
    fn name(&self) -> ApiResult<String> {
        self.0.string("GetName", &[])
    }

    fn unique_id(&self) -> ApiResult<String> {
        self.0.string("GetUniqueId", &[])
    }

    fn clips(&self) -> ApiResult<Option<Vec<Arc<dyn Clip>>>> {
        let clips = self.0.objects("GetClipList", &[])?;
        Ok(clips.map(|list| list.into_iter().map(|h| PyClip::wrap(h) as Arc<dyn Clip>).collect()))
    }

    fn subfolders(&self) -> ApiResult<Option<Vec<Arc<dyn Folder>>>> {
        let folders = self.0.objects("GetSubFolderList", &[])?;
        Ok(folders
            .map(|list| list.into_iter().map(|h| PyFolder::wrap(h) as Arc<dyn Folder>).collect()))
    }
}

impl Clip for PyClip {
    fn name(&self) -> ApiResult<String> {
        self.0.string("GetName", &[])
    }

    fn unique_id(&self) -> ApiResult<String> {
        self.0.string("GetUniqueId", &[])
    }

    fn property(&self, key: Option<&str>) -> ApiResult<Value> {
        self.0.value("GetClipProperty", &key_args(key))
    }

    fn set_property(&self, key: &str, value: &str) -> ApiResult<bool> {
        self.0.boolean("SetClipProperty", &[Arg::str(key), Arg::str(value)])
    }

    fn metadata(&self, key: Option<&str>) -> ApiResult<Value> {
        self.0.value("GetMetadata", &key_args(key))
    }

    fn set_metadata(&self, key: &str, value: &str) -> ApiResult<bool> {
        self.0.boolean("SetMetadata", &[Arg::str(key), Arg::str(value)])
    }

    fn clip_color(&self) -> ApiResult<String> {
        self.0.string("GetClipColor", &[])
    }

    fn set_clip_color(&self, color: &str) -> ApiResult<bool> {
        self.0.boolean("SetClipColor", &[Arg::str(color)])
    }

    fn add_marker(&self, marker: &Marker) -> ApiResult<bool> {
        self.0.add_marker(marker)
    }

    fn markers(&self) -> ApiResult<Value> {
        self.0.value("GetMarkers", &[])
    }
}

impl Timeline for PyTimeline {
    fn name(&self) -> ApiResult<String> {
        self.0.string("GetName", &[])
    }

    fn set_name(&self, name: &str) -> ApiResult<bool> {
        self.0.boolean("SetName", &[Arg::str(name)])
    }

    fn unique_id(&self) -> ApiResult<String> {
        self.0.string("GetUniqueId", &[])
    }

    fn start_frame(&self) -> ApiResult<i64> {
        self.0.int("GetStartFrame", &[])
    }

    fn end_frame(&self) -> ApiResult<i64> {
        self.0.int("GetEndFrame", &[])
    }

    fn start_timecode(&self) -> ApiResult<String> {
        self.0.string("GetStartTimecode", &[])
    }

    fn setting(&self, name: Option<&str>) -> ApiResult<Value> {
        self.0.value("GetSetting", &key_args(name))
    }

    fn track_count(&self, track_type: &str) -> ApiResult<usize> {
        Ok(usize::try_from(self.0.int("GetTrackCount", &[Arg::str(track_type)])?).unwrap_or(0))
    }

    fn add_track(&self, track_type: &str, sub_type: Option<&str>) -> ApiResult<bool> {
        let mut args = vec![Arg::str(track_type)];
        args.extend(sub_type.map(Arg::str));
        self.0.boolean("AddTrack", &args)
    }

    fn delete_track(&self, track_type: &str, index: usize) -> ApiResult<bool> {
        self.0.boolean("DeleteTrack", &track_args(track_type, index, "DeleteTrack")?)
    }

    fn track_enabled(&self, track_type: &str, index: usize) -> ApiResult<bool> {
        self.0.boolean("GetIsTrackEnabled", &track_args(track_type, index, "GetIsTrackEnabled")?)
    }

    fn set_track_enabled(&self, track_type: &str, index: usize, enabled: bool) -> ApiResult<bool> {
        let mut args = track_args(track_type, index, "SetTrackEnable")?;
        args.push(Arg::Json(Value::Bool(enabled)));
        self.0.boolean("SetTrackEnable", &args)
    }

    fn track_locked(&self, track_type: &str, index: usize) -> ApiResult<bool> {
        self.0.boolean("GetIsTrackLocked", &track_args(track_type, index, "GetIsTrackLocked")?)
    }

    fn set_track_locked(&self, track_type: &str, index: usize, locked: bool) -> ApiResult<bool> {
        let mut args = track_args(track_type, index, "SetTrackLock")?;
        args.push(Arg::Json(Value::Bool(locked)));
        self.0.boolean("SetTrackLock", &args)
    }

    fn items_in_track(
        &self,
        track_type: &str,
        index: usize,
    ) -> ApiResult<Option<Vec<Arc<dyn TimelineItem>>>> {
        let items = self
            .0
            .objects("GetItemListInTrack", &track_args(track_type, index, "GetItemListInTrack")?)?;
        Ok(items.map(|list| {
            list.into_iter().map(|h| PyTimelineItem::wrap(h) as Arc<dyn TimelineItem>).collect()
        }))
    }

    fn add_marker(&self, marker: &Marker) -> ApiResult<bool> {
        self.0.add_marker(marker)
    }

    fn markers(&self) -> ApiResult<Value> {
        self.0.value("GetMarkers", &[])
    }

    fn delete_marker_at_frame(&self, frame: i64) -> ApiResult<bool> {
        self.0.boolean("DeleteMarkerAtFrame", &[Arg::int(frame)])
    }

    fn current_timecode(&self) -> ApiResult<String> {
        self.0.string("GetCurrentTimecode", &[])
    }

    fn set_current_timecode(&self, timecode: &str) -> ApiResult<bool> {
        self.0.boolean("SetCurrentTimecode", &[Arg::str(timecode)])
    }

    fn node_graph(&self) -> ApiResult<Option<Arc<dyn NodeGraph>>> {
        let graph = self.0.object("GetNodeGraph", &[])?;
        Ok(graph.map(|h| PyNodeGraph::wrap(h) as Arc<dyn NodeGraph>))
    }

    fn grab_still(&self) -> ApiResult<bool> {
        self.0.boolean("GrabStill", &[])
    }
}

impl TimelineItem for PyTimelineItem {
    fn name(&self) -> ApiResult<String> {
        self.0.string("GetName", &[])
    }

    fn set_name(&self, name: &str) -> ApiResult<bool> {
        self.0.boolean("SetName", &[Arg::str(name)])
    }

    fn unique_id(&self) -> ApiResult<String> {
        self.0.string("GetUniqueId", &[])
    }

    fn duration(&self) -> ApiResult<i64> {
        self.0.int("GetDuration", &[])
    }

    fn start(&self) -> ApiResult<i64> {
        self.0.int("GetStart", &[])
    }

    fn end(&self) -> ApiResult<i64> {
        self.0.int("GetEnd", &[])
    }

    fn property(&self, key: Option<&str>) -> ApiResult<Value> {
        self.0.value("GetProperty", &key_args(key))
    }

    fn set_property(&self, key: &str, value: &Value) -> ApiResult<bool> {
        self.0.boolean("SetProperty", &[Arg::str(key), Arg::Json(value.clone())])
    }

    fn clip_enabled(&self) -> ApiResult<bool> {
        self.0.boolean("GetClipEnabled", &[])
    }

    fn set_clip_enabled(&self, enabled: bool) -> ApiResult<bool> {
        self.0.boolean("SetClipEnabled", &[Arg::Json(Value::Bool(enabled))])
    }

    fn clip_color(&self) -> ApiResult<String> {
        self.0.string("GetClipColor", &[])
    }

    fn set_clip_color(&self, color: &str) -> ApiResult<bool> {
        self.0.boolean("SetClipColor", &[Arg::str(color)])
    }

    fn add_flag(&self, color: &str) -> ApiResult<bool> {
        self.0.boolean("AddFlag", &[Arg::str(color)])
    }

    fn flags(&self) -> ApiResult<Vec<String>> {
        self.0.strings("GetFlagList", &[])
    }

    fn clear_flags(&self, color: &str) -> ApiResult<bool> {
        self.0.boolean("ClearFlags", &[Arg::str(color)])
    }

    fn add_marker(&self, marker: &Marker) -> ApiResult<bool> {
        self.0.add_marker(marker)
    }

    fn markers(&self) -> ApiResult<Value> {
        self.0.value("GetMarkers", &[])
    }

    fn node_graph(&self, layer: i64) -> ApiResult<Option<Arc<dyn NodeGraph>>> {
        let graph = self.0.object("GetNodeGraph", &[Arg::int(layer)])?;
        Ok(graph.map(|h| PyNodeGraph::wrap(h) as Arc<dyn NodeGraph>))
    }

    fn assign_to_color_group(&self, group: &dyn ColorGroup) -> ApiResult<bool> {
        let group = handle_of::<PyColorGroup>(group.as_any(), "AssignToColorGroup")?;
        self.0.boolean("AssignToColorGroup", &[Arg::Obj(&group.0)])
    }
}

impl NodeGraph for PyNodeGraph {
    fn num_nodes(&self) -> ApiResult<i64> {
        self.0.int("GetNumNodes", &[])
    }

    fn node_label(&self, node: i64) -> ApiResult<String> {
        self.0.string("GetNodeLabel", &[Arg::int(node)])
    }

    fn set_node_enabled(&self, node: i64, enabled: bool) -> ApiResult<bool> {
        self.0.boolean("SetNodeEnabled", &[Arg::int(node), Arg::Json(Value::Bool(enabled))])
    }

    fn set_lut(&self, node: i64, lut_path: &str) -> ApiResult<bool> {
        self.0.boolean("SetLUT", &[Arg::int(node), Arg::str(lut_path)])
    }

    fn lut(&self, node: i64) -> ApiResult<String> {
        self.0.string("GetLUT", &[Arg::int(node)])
    }

    fn node_cache_mode(&self, node: i64) -> ApiResult<i64> {
        self.0.int("GetNodeCacheMode", &[Arg::int(node)])
    }

    fn set_node_cache_mode(&self, node: i64, mode: i64) -> ApiResult<bool> {
        self.0.boolean("SetNodeCacheMode", &[Arg::int(node), Arg::int(mode)])
    }

    fn reset_all_grades(&self) -> ApiResult<bool> {
        self.0.boolean("ResetAllGrades", &[])
    }
}

impl Gallery for PyGallery {
    fn still_albums(&self) -> ApiResult<Vec<Arc<dyn StillAlbum>>> {
        let albums = self.0.objects("GetGalleryStillAlbums", &[])?.unwrap_or_default();
        Ok(albums.into_iter().map(|h| PyStillAlbum::wrap(h) as Arc<dyn StillAlbum>).collect())
    }

    fn power_grade_albums(&self) -> ApiResult<Vec<Arc<dyn StillAlbum>>> {
        let albums = self.0.objects("GetGalleryPowerGradeAlbums", &[])?.unwrap_or_default();
        Ok(albums.into_iter().map(|h| PyStillAlbum::wrap(h) as Arc<dyn StillAlbum>).collect())
    }

    fn album_name(&self, album: &dyn StillAlbum) -> ApiResult<String> {
        let album = handle_of::<PyStillAlbum>(album.as_any(), "GetAlbumName")?;
        self.0.string("GetAlbumName", &[Arg::Obj(&album.0)])
    }

    fn current_still_album(&self) -> ApiResult<Option<Arc<dyn StillAlbum>>> {
        let album = self.0.object("GetCurrentStillAlbum", &[])?;
        Ok(album.map(|h| PyStillAlbum::wrap(h) as Arc<dyn StillAlbum>))
    }

    fn set_current_still_album(&self, album: &dyn StillAlbum) -> ApiResult<bool> {
        let album = handle_of::<PyStillAlbum>(album.as_any(), "SetCurrentStillAlbum")?;
        self.0.boolean("SetCurrentStillAlbum", &[Arg::Obj(&album.0)])
    }
}

impl StillAlbum for PyStillAlbum {
    fn still_count(&self) -> ApiResult<usize> {
        self.0.count("GetStills", &[])
    }
}

impl MediaStorage for PyMediaStorage {
    fn mounted_volumes(&self) -> ApiResult<Vec<String>> {
        self.0.strings("GetMountedVolumeList", &[])
    }

    fn subfolders(&self, path: &str) -> ApiResult<Vec<String>> {
        self.0.strings("GetSubFolderList", &[Arg::str(path)])
    }

    fn files(&self, path: &str) -> ApiResult<Vec<String>> {
        self.0.strings("GetFileList", &[Arg::str(path)])
    }

    fn add_items_to_media_pool(&self, paths: &[String]) -> ApiResult<usize> {
        let paths = Value::Array(paths.iter().cloned().map(Value::String).collect());
        self.0.count("AddItemListToMediaPool", &[Arg::Json(paths)])
    }
}

// ============================================================================
// Value conversion
// ============================================================================

/// Convert a `serde_json::Value` into a Python object.
fn json_to_py<'py>(py: Python<'py>, value: &Value) -> PyResult<Bound<'py, PyAny>> {
    match value {
        Value::Null => Ok(py.None().into_bound(py)),
        Value::Bool(b) => Ok(PyBool::new(py, *b).to_owned().into_any()),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(i.into_pyobject(py)?.into_any())
            } else if let Some(f) = n.as_f64() {
                Ok(f.into_pyobject(py)?.into_any())
            } else {
                Ok(py.None().into_bound(py))
            }
        }
        Value::String(s) => Ok(s.into_pyobject(py)?.into_any()),
        Value::Array(arr) => {
            let list = PyList::empty(py);
            for item in arr {
                list.append(json_to_py(py, item)?)?;
            }
            Ok(list.into_any())
        }
        Value::Object(map) => {
            let dict = PyDict::new(py);
            for (k, v) in map {
                dict.set_item(k, json_to_py(py, v)?)?;
            }
            Ok(dict.into_any())
        }
    }
}

/// Convert a Python result into JSON. Objects without a JSON shape become their `str()`.
fn py_to_json(value: &Bound<'_, PyAny>) -> PyResult<Value> {
    if value.is_none() {
        return Ok(Value::Null);
    }
    // bool before int: Python bools are ints
    if value.is_instance_of::<PyBool>() {
        return Ok(Value::Bool(value.extract()?));
    }
    if value.is_instance_of::<PyInt>() {
        return Ok(Value::from(value.extract::<i64>()?));
    }
    if value.is_instance_of::<PyFloat>() {
        return Ok(Number::from_f64(value.extract()?).map(Value::Number).unwrap_or(Value::Null));
    }
    if value.is_instance_of::<PyString>() {
        return Ok(Value::String(value.extract()?));
    }
    if let Ok(dict) = value.downcast::<PyDict>() {
        let mut map = Map::new();
        for (k, v) in dict.iter() {
            map.insert(k.str()?.to_string(), py_to_json(&v)?);
        }
        return Ok(Value::Object(map));
    }
    if value.is_instance_of::<PyList>() || value.is_instance_of::<PyTuple>() {
        let items = value.try_iter()?.map(|item| py_to_json(&item?));
        return items.collect::<PyResult<Vec<_>>>().map(Value::Array);
    }
    Ok(Value::String(value.str()?.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_round_trips_through_python() {
        let value = json!({
            "name": "Timeline 1",
            "frames": 240,
            "fps": 23.976,
            "enabled": true,
            "tracks": ["video", "audio"],
            "missing": null,
        });
        let back = Python::with_gil(|py| py_to_json(&json_to_py(py, &value)?)).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn test_index_keyed_dict_items_are_ordered() {
        let names = Python::with_gil(|py| -> PyResult<Vec<String>> {
            let dict = PyDict::new(py);
            dict.set_item(2, "second")?;
            dict.set_item(1, "first")?;
            dict.set_item(10, "tenth")?;
            items(dict.as_any())?.iter().map(|v| v.extract::<String>()).collect()
        })
        .unwrap();
        assert_eq!(names, vec!["first", "second", "tenth"]);
    }

    #[test]
    fn test_foreign_object_is_rejected() {
        let clip: Arc<dyn Clip> = crate::backend::memory::MemoryClip::new("a");
        let err = handle_of::<PyClip>(clip.as_any(), "AppendToTimeline").err().unwrap();
        assert_eq!(err.call, "AppendToTimeline");
    }
}
