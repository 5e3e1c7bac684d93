//! Connection facade over the DaVinci Resolve object graph.
//!
//! A [`Connection`] is constructed once at startup and shared by reference.
//! It holds the root application handle and derives every other object
//! (project manager, project, media pool, timeline, ...) on demand, so a
//! project opened or closed inside Resolve is always seen by the next call.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::api::{
    ApiError, Clip, Connector, Folder, Gallery, MediaPool, MediaStorage, Project, ProjectManager,
    Resolve, Timeline, TimelineItem, TRACK_TYPES,
};
use crate::error::{ResolveError, Result};

/// Pages accepted by `OpenPage`.
pub const PAGES: [&str; 7] = ["media", "cut", "edit", "fusion", "color", "fairlight", "deliver"];

/// Folder names that always refer to the media pool root.
const ROOT_FOLDER_ALIASES: [&str; 2] = ["root", "master"];

/// A timeline item located by [`Connection::find_timeline_item_by_id`].
#[derive(Clone)]
pub struct TimelineItemMatch {
    pub item: Arc<dyn TimelineItem>,
    pub track_type: &'static str,
    /// 1-based track index
    pub track_index: usize,
}

/// Lazily-derived access to a running DaVinci Resolve instance.
pub struct Connection {
    connector: Arc<dyn Connector>,
    app: Option<Arc<dyn Resolve>>,
}

impl Connection {
    /// Open a connection, attempting the initial connect.
    ///
    /// Never fails: when Resolve cannot be reached the connection is returned
    /// unconnected and every accessor reports [`ResolveError::NotConnected`]
    /// until [`Connection::reconnect`] succeeds.
    pub fn open(connector: Arc<dyn Connector>) -> Self {
        let app = acquire(connector.as_ref());
        Self { connector, app }
    }

    pub fn is_connected(&self) -> bool {
        self.app.is_some()
    }

    /// Re-acquire the application handle, replacing the cached one.
    pub fn reconnect(&mut self) -> bool {
        self.app = acquire(self.connector.as_ref());
        self.is_connected()
    }

    /// Name of the backend this connection was opened with.
    pub fn backend(&self) -> &str {
        self.connector.name()
    }

    pub fn resolve(&self) -> Result<Arc<dyn Resolve>> {
        self.app.clone().ok_or_else(ResolveError::not_connected)
    }

    pub fn project_manager(&self) -> Result<Arc<dyn ProjectManager>> {
        self.resolve()?
            .project_manager()?
            .ok_or_else(|| ResolveError::NotConnected("Failed to get Project Manager".to_string()))
    }

    pub fn current_project(&self) -> Result<Arc<dyn Project>> {
        self.project_manager()?.current_project()?.ok_or(ResolveError::NoProject)
    }

    pub fn media_pool(&self) -> Result<Arc<dyn MediaPool>> {
        self.current_project()?.media_pool()?.ok_or(ResolveError::NoMediaPool)
    }

    pub fn current_timeline(&self) -> Result<Arc<dyn Timeline>> {
        self.current_project()?.current_timeline()?.ok_or(ResolveError::NoTimeline)
    }

    pub fn media_storage(&self) -> Result<Arc<dyn MediaStorage>> {
        self.resolve()?.media_storage()?.ok_or_else(|| {
            ResolveError::Api(ApiError::new("GetMediaStorage", "no media storage"))
        })
    }

    pub fn gallery(&self) -> Result<Arc<dyn Gallery>> {
        self.current_project()?
            .gallery()?
            .ok_or_else(|| ResolveError::Api(ApiError::new("GetGallery", "no gallery")))
    }

    /// `"<product> <version>"`, e.g. `"DaVinci Resolve Studio 19.0.1"`.
    pub fn version(&self) -> Result<String> {
        let app = self.resolve()?;
        Ok(format!("{} {}", app.product_name()?, app.version_string()?))
    }

    /// The page currently shown, or an empty string when Resolve reports none.
    pub fn current_page(&self) -> Result<String> {
        Ok(self.resolve()?.current_page()?.unwrap_or_default())
    }

    /// Switch to one of [`PAGES`] (case-insensitive).
    pub fn switch_page(&self, page: &str) -> Result<bool> {
        let page = page.to_lowercase();
        if !PAGES.contains(&page.as_str()) {
            return Err(ResolveError::invalid_parameter("page", &PAGES));
        }
        Ok(self.resolve()?.open_page(&page)?)
    }

    fn root_folder(&self) -> Result<Arc<dyn Folder>> {
        self.media_pool()?.root_folder()?.ok_or_else(|| {
            ResolveError::Api(ApiError::new("GetRootFolder", "no root folder"))
        })
    }

    /// Every clip below `folder` (or the media pool root), parents first.
    pub fn all_clips(&self, folder: Option<Arc<dyn Folder>>) -> Result<Vec<Arc<dyn Clip>>> {
        let mut clips = Vec::new();
        for folder in self.all_folders(folder)? {
            clips.extend(folder.clips()?.unwrap_or_default());
        }
        Ok(clips)
    }

    /// `folder` (or the media pool root) and every folder below it, pre-order.
    pub fn all_folders(&self, folder: Option<Arc<dyn Folder>>) -> Result<Vec<Arc<dyn Folder>>> {
        let start = match folder {
            Some(folder) => folder,
            None => self.root_folder()?,
        };
        let mut folders = Vec::new();
        collect_folders(start, &mut Vec::new(), &mut folders)?;
        Ok(folders)
    }

    pub fn find_clip_by_name(&self, name: &str) -> Result<Option<Arc<dyn Clip>>> {
        for clip in self.all_clips(None)? {
            if clip.name()? == name {
                return Ok(Some(clip));
            }
        }
        Ok(None)
    }

    /// `"root"` and `"master"` (any case) always resolve to the root folder.
    pub fn find_folder_by_name(&self, name: &str) -> Result<Option<Arc<dyn Folder>>> {
        if ROOT_FOLDER_ALIASES.contains(&name.to_lowercase().as_str()) {
            return self.root_folder().map(Some);
        }
        for folder in self.all_folders(None)? {
            if folder.name()? == name {
                return Ok(Some(folder));
            }
        }
        Ok(None)
    }

    pub fn find_timeline_by_name(&self, name: &str) -> Result<Option<Arc<dyn Timeline>>> {
        let project = self.current_project()?;
        for index in 1..=project.timeline_count()? {
            if let Some(timeline) = project.timeline_by_index(index)? {
                if timeline.name()? == name {
                    return Ok(Some(timeline));
                }
            }
        }
        Ok(None)
    }

    /// Scan video, audio then subtitle tracks of the current timeline.
    pub fn find_timeline_item_by_id(&self, item_id: &str) -> Result<Option<TimelineItemMatch>> {
        let timeline = self.current_timeline()?;
        for track_type in TRACK_TYPES {
            for track_index in 1..=timeline.track_count(track_type)? {
                let items = timeline.items_in_track(track_type, track_index)?.unwrap_or_default();
                for item in items {
                    if item.unique_id()? == item_id {
                        return Ok(Some(TimelineItemMatch { item, track_type, track_index }));
                    }
                }
            }
        }
        Ok(None)
    }

    /// Like [`Connection::find_timeline_item_by_id`] but a miss is an error.
    pub fn timeline_item(&self, item_id: &str) -> Result<Arc<dyn TimelineItem>> {
        self.find_timeline_item_by_id(item_id)?
            .map(|found| found.item)
            .ok_or_else(|| ResolveError::TimelineItemNotFound(item_id.to_string()))
    }

    /// Like [`Connection::find_clip_by_name`] but a miss is an error.
    pub fn clip(&self, name: &str) -> Result<Arc<dyn Clip>> {
        self.find_clip_by_name(name)?.ok_or_else(|| ResolveError::ClipNotFound(name.to_string()))
    }
}

fn acquire(connector: &dyn Connector) -> Option<Arc<dyn Resolve>> {
    let app = match connector.connect() {
        Ok(app) => app,
        Err(e) => {
            error!(backend = connector.name(), "Failed to connect to DaVinci Resolve: {}", e);
            return None;
        }
    };
    match (app.product_name(), app.version_string()) {
        (Ok(product), Ok(version)) => {
            info!(backend = connector.name(), "Connected to DaVinci Resolve: {} {}", product, version)
        }
        _ => info!(backend = connector.name(), "Connected to DaVinci Resolve"),
    }
    Some(app)
}

/// Folders nested deeper than this are not descended into.
const MAX_FOLDER_DEPTH: usize = 256;

/// Pre-order walk. `ancestors` holds the ids of the folders on the current
/// path; a child whose id is already on it closes a cycle and is skipped.
/// Folders without an id (empty, or `GetUniqueId` failing) are never treated
/// as repeats.
fn collect_folders(
    folder: Arc<dyn Folder>,
    ancestors: &mut Vec<String>,
    out: &mut Vec<Arc<dyn Folder>>,
) -> Result<()> {
    let id = folder.unique_id().ok().filter(|id| !id.is_empty());
    if let Some(id) = &id {
        if ancestors.contains(id) {
            warn!(folder_id = %id, "Folder is its own ancestor, skipping cyclic reference");
            return Ok(());
        }
    }
    if ancestors.len() >= MAX_FOLDER_DEPTH {
        warn!(depth = ancestors.len(), "Media pool nesting too deep, not descending further");
        out.push(folder);
        return Ok(());
    }
    let children = folder.subfolders()?.unwrap_or_default();
    debug!(folder_id = ?id, children = children.len(), "Visiting media pool folder");
    out.push(folder);
    ancestors.push(id.unwrap_or_default());
    for child in children {
        collect_folders(child, ancestors, out)?;
    }
    ancestors.pop();
    Ok(())
}
