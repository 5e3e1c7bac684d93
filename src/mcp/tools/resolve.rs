//! Application-level tools: version, pages, layout presets, keyframe mode and
//! media storage.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::outcome;
use crate::connection::{Connection, PAGES};
use crate::error::Result;
use crate::guard::{rule, validate_params, with_connection, Constraint, ParamRule};

const KEYFRAME_MODES: [(i64, &str); 3] = [(0, "All"), (1, "Color"), (2, "Sizing")];

/// Input for the switch_page tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SwitchPageInput {
    /// Page to open: media, cut, edit, fusion, color, fairlight or deliver.
    pub page: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct LayoutPresetInput {
    /// Name of the UI layout preset.
    pub preset_name: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct KeyframeModeInput {
    /// 0 = All, 1 = Color, 2 = Sizing.
    pub mode: i64,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct StoragePathInput {
    /// Absolute path inside a mounted volume.
    pub folder_path: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct StorageItemsInput {
    /// Files or folders to add to the current media pool folder.
    pub paths: Vec<String>,
}

const LAYOUT_RULES: [ParamRule; 1] = [rule("preset_name", Constraint::NonEmpty)];
const KEYFRAME_RULES: [ParamRule; 1] = [rule("mode", Constraint::Range(0, 2))];
const STORAGE_ITEMS_RULES: [ParamRule; 1] = [rule("paths", Constraint::NonEmpty)];

/// Version details reported by the application.
#[derive(Debug, PartialEq, Serialize)]
pub struct VersionInfo {
    pub product: String,
    pub version_string: String,
    pub major: Option<Value>,
    pub minor: Option<Value>,
    pub patch: Option<Value>,
    pub build: Option<Value>,
    pub suffix: Option<Value>,
}

#[derive(Debug, PartialEq, Serialize)]
pub struct KeyframeMode {
    pub mode: i64,
    pub name: &'static str,
}

fn keyframe_mode_name(mode: i64) -> &'static str {
    KEYFRAME_MODES.iter().find(|(m, _)| *m == mode).map(|(_, name)| *name).unwrap_or("Unknown")
}

pub fn get_version(conn: &Connection) -> Result<String> {
    with_connection(conn, Connection::version)
}

pub fn get_version_info(conn: &Connection) -> Result<VersionInfo> {
    with_connection(conn, |conn| {
        let app = conn.resolve()?;
        let version = app.version()?;
        let part = |i: usize| version.get(i).cloned();
        Ok(VersionInfo {
            product: app.product_name()?,
            version_string: app.version_string()?,
            major: part(0),
            minor: part(1),
            patch: part(2),
            build: part(3),
            suffix: part(4),
        })
    })
}

pub fn get_current_page(conn: &Connection) -> Result<String> {
    with_connection(conn, Connection::current_page)
}

pub fn switch_page(conn: &Connection, input: SwitchPageInput) -> Result<String> {
    with_connection(conn, |conn| {
        let page = input.page.to_lowercase();
        let switched = conn.switch_page(&page)?;
        Ok(outcome(
            switched,
            format!("Successfully switched to {} page", page),
            format!("Failed to switch to {} page", page),
        ))
    })
}

/// Drop the cached application handle and acquire a new one.
pub fn reconnect(conn: &mut Connection) -> Result<String> {
    if conn.reconnect() {
        Ok(format!("Reconnected to {}", conn.version()?))
    } else {
        Ok("Failed to reconnect to DaVinci Resolve. Is it running?".to_string())
    }
}

pub fn load_layout_preset(conn: &Connection, input: LayoutPresetInput) -> Result<String> {
    validate_params(&input, &LAYOUT_RULES)?;
    with_connection(conn, |conn| {
        let loaded = conn.resolve()?.load_layout_preset(&input.preset_name)?;
        Ok(outcome(
            loaded,
            format!("Successfully loaded layout preset '{}'", input.preset_name),
            format!("Failed to load layout preset '{}'", input.preset_name),
        ))
    })
}

pub fn save_layout_preset(conn: &Connection, input: LayoutPresetInput) -> Result<String> {
    validate_params(&input, &LAYOUT_RULES)?;
    with_connection(conn, |conn| {
        let saved = conn.resolve()?.save_layout_preset(&input.preset_name)?;
        Ok(outcome(
            saved,
            format!("Successfully saved layout preset '{}'", input.preset_name),
            "Failed to save layout preset",
        ))
    })
}

pub fn get_keyframe_mode(conn: &Connection) -> Result<KeyframeMode> {
    with_connection(conn, |conn| {
        let mode = conn.resolve()?.keyframe_mode()?;
        Ok(KeyframeMode { mode, name: keyframe_mode_name(mode) })
    })
}

pub fn set_keyframe_mode(conn: &Connection, input: KeyframeModeInput) -> Result<String> {
    validate_params(&input, &KEYFRAME_RULES)?;
    with_connection(conn, |conn| {
        let set = conn.resolve()?.set_keyframe_mode(input.mode)?;
        Ok(outcome(
            set,
            format!("Successfully set keyframe mode to '{}'", keyframe_mode_name(input.mode)),
            "Failed to set keyframe mode",
        ))
    })
}

pub fn get_mounted_volumes(conn: &Connection) -> Result<Vec<String>> {
    with_connection(conn, |conn| Ok(conn.media_storage()?.mounted_volumes()?))
}

pub fn get_storage_subfolders(conn: &Connection, input: StoragePathInput) -> Result<Vec<String>> {
    with_connection(conn, |conn| Ok(conn.media_storage()?.subfolders(&input.folder_path)?))
}

pub fn get_storage_files(conn: &Connection, input: StoragePathInput) -> Result<Vec<String>> {
    with_connection(conn, |conn| Ok(conn.media_storage()?.files(&input.folder_path)?))
}

pub fn add_items_to_media_pool(conn: &Connection, input: StorageItemsInput) -> Result<String> {
    validate_params(&input, &STORAGE_ITEMS_RULES)?;
    with_connection(conn, |conn| {
        let added = conn.media_storage()?.add_items_to_media_pool(&input.paths)?;
        Ok(outcome(
            added > 0,
            format!("Successfully added {} item(s) to Media Pool", added),
            "Failed to add items",
        ))
    })
}

/// Pages accepted by [`switch_page`], for tool descriptions.
pub fn page_list() -> String {
    PAGES.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::{MemoryConnector, MemoryResolve};
    use crate::error::ResolveError;
    use std::sync::Arc;

    fn connected(app: Arc<MemoryResolve>) -> Connection {
        Connection::open(Arc::new(MemoryConnector::new(app)))
    }

    #[test]
    fn test_version_tools() {
        let conn = connected(MemoryResolve::new());
        assert_eq!(get_version(&conn).unwrap(), "DaVinci Resolve 19.1.0");
        let info = get_version_info(&conn).unwrap();
        assert_eq!(info.major, Some(Value::from(19)));
        assert_eq!(info.patch, Some(Value::from(0)));
        assert_eq!(info.product, "DaVinci Resolve");
    }

    #[test]
    fn test_disconnected_tools_fail_first() {
        let conn = Connection::open(Arc::new(MemoryConnector::unavailable()));
        assert_eq!(get_version(&conn).err(), Some(ResolveError::not_connected()));
        assert_eq!(get_mounted_volumes(&conn).err(), Some(ResolveError::not_connected()));
    }

    #[test]
    fn test_switch_page_messages() {
        let app = MemoryResolve::new();
        let conn = connected(app.clone());
        let msg = switch_page(&conn, SwitchPageInput { page: "Color".into() }).unwrap();
        assert_eq!(msg, "Successfully switched to color page");
        assert_eq!(get_current_page(&conn).unwrap(), "color");

        let err = switch_page(&conn, SwitchPageInput { page: "timeline".into() }).err().unwrap();
        assert!(err.to_string().contains("Must be one of: media, cut, edit"));
        assert_eq!(app.page_history(), vec!["color"]);
    }

    #[test]
    fn test_keyframe_mode() {
        let conn = connected(MemoryResolve::new());
        let msg = set_keyframe_mode(&conn, KeyframeModeInput { mode: 2 }).unwrap();
        assert_eq!(msg, "Successfully set keyframe mode to 'Sizing'");
        assert_eq!(get_keyframe_mode(&conn).unwrap(), KeyframeMode { mode: 2, name: "Sizing" });

        let err = set_keyframe_mode(&conn, KeyframeModeInput { mode: 3 }).err().unwrap();
        assert_eq!(err.to_string(), "Invalid value for parameter 'mode': 3");
        let err = set_keyframe_mode(&conn, KeyframeModeInput { mode: -1 }).err().unwrap();
        assert_eq!(err.to_string(), "Invalid value for parameter 'mode': -1");
    }

    #[test]
    fn test_layout_presets() {
        let conn = connected(MemoryResolve::new());
        let input = || LayoutPresetInput { preset_name: "Grading".into() };
        assert_eq!(load_layout_preset(&conn, input()).unwrap(), "Failed to load layout preset 'Grading'");
        assert_eq!(
            save_layout_preset(&conn, input()).unwrap(),
            "Successfully saved layout preset 'Grading'"
        );
        assert_eq!(
            load_layout_preset(&conn, input()).unwrap(),
            "Successfully loaded layout preset 'Grading'"
        );
        assert!(save_layout_preset(&conn, LayoutPresetInput { preset_name: " ".into() }).is_err());
    }

    #[test]
    fn test_reconnect_reports_state() {
        let connector = Arc::new(MemoryConnector::unavailable());
        let mut conn = Connection::open(connector.clone());
        assert_eq!(
            reconnect(&mut conn).unwrap(),
            "Failed to reconnect to DaVinci Resolve. Is it running?"
        );
        connector.set_app(Some(MemoryResolve::new()));
        assert_eq!(reconnect(&mut conn).unwrap(), "Reconnected to DaVinci Resolve 19.1.0");
    }

    #[test]
    fn test_media_storage_tools() {
        let conn = connected(MemoryResolve::demo());
        assert_eq!(get_mounted_volumes(&conn).unwrap(), vec!["/Volumes/Media"]);
        let files = get_storage_files(
            &conn,
            StoragePathInput { folder_path: "/Volumes/Media/Day1".into() },
        )
        .unwrap();
        assert_eq!(files.len(), 2);

        let msg = add_items_to_media_pool(
            &conn,
            StorageItemsInput { paths: vec!["/Volumes/Media/Day2".into()] },
        )
        .unwrap();
        assert_eq!(msg, "Successfully added 1 item(s) to Media Pool");

        let missing =
            add_items_to_media_pool(&conn, StorageItemsInput { paths: vec!["/nope".into()] })
                .unwrap();
        assert_eq!(missing, "Failed to add items");
        assert!(add_items_to_media_pool(&conn, StorageItemsInput { paths: vec![] }).is_err());
    }
}
