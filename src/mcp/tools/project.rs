//! Project management and render queue tools.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::debug;

use super::outcome;
use crate::connection::Connection;
use crate::error::{ResolveError, Result};
use crate::guard::{rule, validate_params, with_connection, with_project, Constraint, ParamRule};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ProjectNameInput {
    /// Project name in the current database folder.
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SettingNameInput {
    /// Project setting key, e.g. `timelineFrameRate`.
    pub setting_name: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SetSettingInput {
    /// Project setting key, e.g. `timelineFrameRate`.
    pub setting_name: String,
    /// New value. Numbers and booleans are sent as their string form.
    pub setting_value: Value,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct StartRenderingInput {
    /// Jobs to render. The whole queue is rendered when omitted or empty.
    #[serde(default)]
    pub job_ids: Option<Vec<String>>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct RenderJobInput {
    /// Id returned by add_to_render_queue.
    pub job_id: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct RenderFormatInput {
    /// Format extension as listed by get_render_formats, e.g. `mov`.
    pub format: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct FormatAndCodecInput {
    /// Format extension, e.g. `mov`.
    pub format: String,
    /// Codec name as listed by get_render_codecs, e.g. `H264`.
    pub codec: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct RenderSettingsInput {
    /// Render settings such as `TargetDir`, `CustomName`, `MarkIn` or `MarkOut`.
    pub settings: Map<String, Value>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct RenderPresetInput {
    /// Render preset name.
    pub preset_name: String,
}

const NAME_RULES: [ParamRule; 1] = [rule("name", Constraint::NonEmpty)];
const FORMAT_RULES: [ParamRule; 1] = [rule("format", Constraint::NonEmpty)];
const FORMAT_CODEC_RULES: [ParamRule; 2] =
    [rule("format", Constraint::NonEmpty), rule("codec", Constraint::NonEmpty)];
const PRESET_RULES: [ParamRule; 1] = [rule("preset_name", Constraint::NonEmpty)];
const SETTING_RULES: [ParamRule; 1] = [rule("setting_name", Constraint::NonEmpty)];
const JOB_RULES: [ParamRule; 1] = [rule("job_id", Constraint::NonEmpty)];

/// Setting values travel to Resolve as strings.
fn setting_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn list_projects(conn: &Connection) -> Result<Vec<String>> {
    with_connection(conn, |conn| {
        let names = conn.project_manager()?.project_names()?;
        Ok(names.into_iter().filter(|name| !name.is_empty()).collect())
    })
}

/// Name of the open project, or a notice when none is open.
pub fn get_current_project_name(conn: &Connection) -> Result<String> {
    with_connection(conn, |conn| match conn.current_project() {
        Ok(project) => Ok(project.name()?),
        Err(ResolveError::NoProject) => Ok(ResolveError::NoProject.to_string()),
        Err(e) => Err(e),
    })
}

pub fn open_project(conn: &Connection, input: ProjectNameInput) -> Result<String> {
    validate_params(&input, &NAME_RULES)?;
    with_connection(conn, |conn| {
        let pm = conn.project_manager()?;
        let available = pm.project_names()?;
        if !available.contains(&input.name) {
            debug!(available = ?available, "Project lookup missed");
            return Err(ResolveError::not_found("Project", &input.name));
        }
        let opened = pm.load_project(&input.name)?.is_some();
        Ok(outcome(
            opened,
            format!("Successfully opened project '{}'", input.name),
            format!("Failed to open project '{}'", input.name),
        ))
    })
}

pub fn create_project(conn: &Connection, input: ProjectNameInput) -> Result<String> {
    validate_params(&input, &NAME_RULES)?;
    with_connection(conn, |conn| {
        let pm = conn.project_manager()?;
        if pm.project_names()?.contains(&input.name) {
            return Err(ResolveError::InvalidValue {
                param: "name".to_string(),
                value: format!("project '{}' already exists", input.name),
            });
        }
        let created = pm.create_project(&input.name)?.is_some();
        Ok(outcome(
            created,
            format!("Successfully created project '{}'", input.name),
            format!("Failed to create project '{}'", input.name),
        ))
    })
}

pub fn save_project(conn: &Connection) -> Result<String> {
    with_project(conn, |cx| {
        let name = cx.project.name()?;
        let saved = cx.conn.project_manager()?.save_project()?;
        Ok(outcome(
            saved,
            format!("Successfully saved project '{}'", name),
            format!("Project '{}' auto-save is likely active", name),
        ))
    })
}

pub fn close_project(conn: &Connection) -> Result<String> {
    with_project(conn, |cx| {
        let name = cx.project.name()?;
        let closed = cx.conn.project_manager()?.close_project(cx.project.as_ref())?;
        Ok(outcome(
            closed,
            format!("Successfully closed project '{}'", name),
            format!("Failed to close project '{}'", name),
        ))
    })
}

pub fn get_project_settings(conn: &Connection) -> Result<Value> {
    with_project(conn, |cx| Ok(cx.project.setting(None)?))
}

pub fn get_project_setting(conn: &Connection, input: SettingNameInput) -> Result<Value> {
    validate_params(&input, &SETTING_RULES)?;
    with_project(conn, |cx| {
        let value = cx.project.setting(Some(&input.setting_name))?;
        Ok(json!({ (input.setting_name.clone()): value }))
    })
}

pub fn set_project_setting(conn: &Connection, input: SetSettingInput) -> Result<String> {
    validate_params(&input, &SETTING_RULES)?;
    with_project(conn, |cx| {
        let value = setting_string(&input.setting_value);
        let set = cx.project.set_setting(&input.setting_name, &value)?;
        Ok(outcome(
            set,
            format!("Successfully set '{}' to '{}'", input.setting_name, value),
            format!("Failed to set '{}'", input.setting_name),
        ))
    })
}

pub fn get_render_formats(conn: &Connection) -> Result<Value> {
    with_project(conn, |cx| Ok(cx.project.render_formats()?))
}

pub fn get_render_jobs(conn: &Connection) -> Result<Value> {
    with_project(conn, |cx| Ok(cx.project.render_jobs()?))
}

pub fn add_to_render_queue(conn: &Connection) -> Result<String> {
    with_project(conn, |cx| {
        Ok(match cx.project.add_render_job()? {
            Some(id) => format!("Added render job with ID: {}", id),
            None => "Failed to add render job".to_string(),
        })
    })
}

pub fn start_rendering(conn: &Connection, input: StartRenderingInput) -> Result<String> {
    with_project(conn, |cx| {
        let job_ids = input.job_ids.unwrap_or_default();
        let started = cx.project.start_rendering(&job_ids)?;
        Ok(outcome(started, "Rendering started", "Failed to start rendering"))
    })
}

pub fn stop_rendering(conn: &Connection) -> Result<String> {
    with_project(conn, |cx| {
        cx.project.stop_rendering()?;
        Ok("Rendering stopped".to_string())
    })
}

pub fn is_rendering_in_progress(conn: &Connection) -> Result<bool> {
    with_project(conn, |cx| Ok(cx.project.is_rendering_in_progress()?))
}

pub fn get_render_job_status(conn: &Connection, input: RenderJobInput) -> Result<Value> {
    validate_params(&input, &JOB_RULES)?;
    with_project(conn, |cx| Ok(cx.project.render_job_status(&input.job_id)?))
}

pub fn delete_render_job(conn: &Connection, input: RenderJobInput) -> Result<String> {
    validate_params(&input, &JOB_RULES)?;
    with_project(conn, |cx| {
        let deleted = cx.project.delete_render_job(&input.job_id)?;
        Ok(outcome(
            deleted,
            format!("Successfully deleted render job '{}'", input.job_id),
            format!("Failed to delete render job '{}'", input.job_id),
        ))
    })
}

pub fn delete_all_render_jobs(conn: &Connection) -> Result<String> {
    with_project(conn, |cx| {
        let deleted = cx.project.delete_all_render_jobs()?;
        Ok(outcome(deleted, "Successfully deleted all render jobs", "Failed to delete render jobs"))
    })
}

pub fn get_render_codecs(conn: &Connection, input: RenderFormatInput) -> Result<Value> {
    validate_params(&input, &FORMAT_RULES)?;
    with_project(conn, |cx| Ok(cx.project.render_codecs(&input.format)?))
}

pub fn get_current_render_format_and_codec(conn: &Connection) -> Result<Value> {
    with_project(conn, |cx| Ok(cx.project.current_render_format_and_codec()?))
}

pub fn set_render_format_and_codec(
    conn: &Connection,
    input: FormatAndCodecInput,
) -> Result<String> {
    validate_params(&input, &FORMAT_CODEC_RULES)?;
    with_project(conn, |cx| {
        let set = cx.project.set_render_format_and_codec(&input.format, &input.codec)?;
        Ok(outcome(
            set,
            format!("Successfully set format to '{}' with codec '{}'", input.format, input.codec),
            "Failed to set render format and codec",
        ))
    })
}

pub fn set_render_settings(conn: &Connection, input: RenderSettingsInput) -> Result<String> {
    if input.settings.is_empty() {
        return Err(ResolveError::InvalidValue {
            param: "settings".to_string(),
            value: "{}".to_string(),
        });
    }
    with_project(conn, |cx| {
        let set = cx.project.set_render_settings(&Value::Object(input.settings))?;
        Ok(outcome(set, "Successfully updated render settings", "Failed to update render settings"))
    })
}

pub fn get_render_presets(conn: &Connection) -> Result<Vec<String>> {
    with_project(conn, |cx| Ok(cx.project.render_presets()?))
}

pub fn load_render_preset(conn: &Connection, input: RenderPresetInput) -> Result<String> {
    validate_params(&input, &PRESET_RULES)?;
    with_project(conn, |cx| {
        let loaded = cx.project.load_render_preset(&input.preset_name)?;
        Ok(outcome(
            loaded,
            format!("Successfully loaded render preset '{}'", input.preset_name),
            format!("Failed to load render preset '{}'", input.preset_name),
        ))
    })
}

pub fn save_render_preset(conn: &Connection, input: RenderPresetInput) -> Result<String> {
    validate_params(&input, &PRESET_RULES)?;
    with_project(conn, |cx| {
        let saved = cx.project.save_render_preset(&input.preset_name)?;
        Ok(outcome(
            saved,
            format!("Successfully saved render preset '{}'", input.preset_name),
            format!("Failed to save render preset '{}'", input.preset_name),
        ))
    })
}

pub fn delete_render_preset(conn: &Connection, input: RenderPresetInput) -> Result<String> {
    validate_params(&input, &PRESET_RULES)?;
    with_project(conn, |cx| {
        let deleted = cx.project.delete_render_preset(&input.preset_name)?;
        Ok(outcome(
            deleted,
            format!("Successfully deleted render preset '{}'", input.preset_name),
            format!("Failed to delete render preset '{}'", input.preset_name),
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::{MemoryConnector, MemoryProject, MemoryResolve};
    use std::sync::Arc;

    fn connected(app: Arc<MemoryResolve>) -> Connection {
        Connection::open(Arc::new(MemoryConnector::new(app)))
    }

    fn named(name: &str) -> ProjectNameInput {
        ProjectNameInput { name: name.to_string() }
    }

    #[test]
    fn test_list_projects_skips_empty_names() {
        let app = MemoryResolve::with_project("Feature");
        let pm = app.memory_project_manager().unwrap();
        pm.add_project(MemoryProject::new(""));
        pm.add_project(MemoryProject::new("Trailer"));
        let conn = connected(app);
        assert_eq!(list_projects(&conn).unwrap(), vec!["Feature", "Trailer"]);
    }

    #[test]
    fn test_current_project_name_without_project() {
        let conn = connected(MemoryResolve::new());
        assert_eq!(get_current_project_name(&conn).unwrap(), "No project currently open");

        let conn = connected(MemoryResolve::with_project("Doc"));
        assert_eq!(get_current_project_name(&conn).unwrap(), "Doc");
    }

    #[test]
    fn test_open_project() {
        let app = MemoryResolve::with_project("Feature");
        app.memory_project_manager().unwrap().add_project(MemoryProject::new("Trailer"));
        let conn = connected(app);

        assert_eq!(
            open_project(&conn, named("Trailer")).unwrap(),
            "Successfully opened project 'Trailer'"
        );
        assert_eq!(get_current_project_name(&conn).unwrap(), "Trailer");

        let err = open_project(&conn, named("Promo")).unwrap_err();
        assert_eq!(err.to_string(), "Project 'Promo' not found");
        assert!(open_project(&conn, named("")).is_err());
    }

    #[test]
    fn test_create_project_rejects_duplicates() {
        let conn = connected(MemoryResolve::with_project("Feature"));
        assert_eq!(
            create_project(&conn, named("Sequel")).unwrap(),
            "Successfully created project 'Sequel'"
        );
        let err = create_project(&conn, named("Feature")).unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn test_save_and_close() {
        let conn = connected(MemoryResolve::with_project("Feature"));
        assert_eq!(save_project(&conn).unwrap(), "Successfully saved project 'Feature'");
        assert_eq!(close_project(&conn).unwrap(), "Successfully closed project 'Feature'");
        assert_eq!(save_project(&conn).err(), Some(ResolveError::NoProject));
    }

    #[test]
    fn test_project_settings() {
        let conn = connected(MemoryResolve::with_project("Feature"));
        let all = get_project_settings(&conn).unwrap();
        assert_eq!(all["timelineFrameRate"], "24");

        let input =
            SetSettingInput { setting_name: "timelineFrameRate".into(), setting_value: json!(25) };
        assert_eq!(
            set_project_setting(&conn, input).unwrap(),
            "Successfully set 'timelineFrameRate' to '25'"
        );
        let one = get_project_setting(
            &conn,
            SettingNameInput { setting_name: "timelineFrameRate".into() },
        )
        .unwrap();
        assert_eq!(one, json!({ "timelineFrameRate": "25" }));
    }

    #[test]
    fn test_render_queue_flow() {
        let conn = connected(MemoryResolve::demo());
        let added = add_to_render_queue(&conn).unwrap();
        let job_id = added.strip_prefix("Added render job with ID: ").unwrap().to_string();
        assert_eq!(get_render_jobs(&conn).unwrap().as_array().unwrap().len(), 1);

        let started = start_rendering(&conn, StartRenderingInput { job_ids: None }).unwrap();
        assert_eq!(started, "Rendering started");
        assert!(is_rendering_in_progress(&conn).unwrap());
        let status = get_render_job_status(&conn, RenderJobInput { job_id: job_id.clone() }).unwrap();
        assert_eq!(status["JobStatus"], "Rendering");

        assert_eq!(stop_rendering(&conn).unwrap(), "Rendering stopped");
        assert!(!is_rendering_in_progress(&conn).unwrap());

        let msg = delete_render_job(&conn, RenderJobInput { job_id: job_id.clone() }).unwrap();
        assert_eq!(msg, format!("Successfully deleted render job '{}'", job_id));
        let msg = delete_render_job(&conn, RenderJobInput { job_id }).unwrap();
        assert!(msg.starts_with("Failed to delete render job"));
    }

    #[test]
    fn test_render_queue_needs_timeline() {
        let conn = connected(MemoryResolve::with_project("Empty"));
        assert_eq!(add_to_render_queue(&conn).unwrap(), "Failed to add render job");
        assert_eq!(
            start_rendering(&conn, StartRenderingInput { job_ids: Some(vec![]) }).unwrap(),
            "Failed to start rendering"
        );
    }

    fn preset(name: &str) -> RenderPresetInput {
        RenderPresetInput { preset_name: name.to_string() }
    }

    #[test]
    fn test_render_format_and_codec() {
        let conn = connected(MemoryResolve::demo());
        let codecs = get_render_codecs(&conn, RenderFormatInput { format: "mp4".into() }).unwrap();
        assert_eq!(codecs["H.265"], "H265");
        assert_eq!(
            get_current_render_format_and_codec(&conn).unwrap(),
            json!({ "format": "mov", "codec": "H264" })
        );

        let input = FormatAndCodecInput { format: "mp4".into(), codec: "H265".into() };
        assert_eq!(
            set_render_format_and_codec(&conn, input).unwrap(),
            "Successfully set format to 'mp4' with codec 'H265'"
        );
        assert_eq!(get_current_render_format_and_codec(&conn).unwrap()["codec"], "H265");

        let input = FormatAndCodecInput { format: "tif".into(), codec: "H265".into() };
        assert_eq!(
            set_render_format_and_codec(&conn, input).unwrap(),
            "Failed to set render format and codec"
        );
        let input = FormatAndCodecInput { format: "mov".into(), codec: " ".into() };
        assert!(set_render_format_and_codec(&conn, input).is_err());
    }

    #[test]
    fn test_render_settings_shape_queued_jobs() {
        let app = MemoryResolve::demo();
        let conn = connected(app.clone());
        let settings = json!({ "TargetDir": "/renders", "CustomName": "cut_v2" });
        let input = RenderSettingsInput { settings: settings.as_object().unwrap().clone() };
        let msg = set_render_settings(&conn, input).unwrap();
        assert_eq!(msg, "Successfully updated render settings");
        let project = app.current_memory_project().unwrap();
        assert_eq!(project.render_settings()["TargetDir"], "/renders");

        add_to_render_queue(&conn).unwrap();
        let jobs = get_render_jobs(&conn).unwrap();
        assert_eq!(jobs[0]["TargetDir"], "/renders");
        assert_eq!(jobs[0]["OutputFilename"], "cut_v2.mov");

        let bogus = json!({ "Colour": "red" }).as_object().unwrap().clone();
        let msg = set_render_settings(&conn, RenderSettingsInput { settings: bogus }).unwrap();
        assert_eq!(msg, "Failed to update render settings");
        let empty = RenderSettingsInput { settings: Map::new() };
        let err = set_render_settings(&conn, empty).unwrap_err();
        assert!(matches!(err, ResolveError::InvalidValue { .. }));

        assert_eq!(delete_all_render_jobs(&conn).unwrap(), "Successfully deleted all render jobs");
        assert_eq!(get_render_jobs(&conn).unwrap(), json!([]));
    }

    #[test]
    fn test_render_presets() {
        let conn = connected(MemoryResolve::demo());
        assert_eq!(get_render_presets(&conn).unwrap(), vec!["H.264 Master"]);

        let input = FormatAndCodecInput { format: "mxf".into(), codec: "DNxHRHQ".into() };
        set_render_format_and_codec(&conn, input).unwrap();
        assert_eq!(
            save_render_preset(&conn, preset("Broadcast")).unwrap(),
            "Successfully saved render preset 'Broadcast'"
        );
        assert_eq!(
            save_render_preset(&conn, preset("Broadcast")).unwrap(),
            "Failed to save render preset 'Broadcast'"
        );

        load_render_preset(&conn, preset("H.264 Master")).unwrap();
        assert_eq!(get_current_render_format_and_codec(&conn).unwrap()["format"], "mp4");
        assert_eq!(
            load_render_preset(&conn, preset("Broadcast")).unwrap(),
            "Successfully loaded render preset 'Broadcast'"
        );
        assert_eq!(get_current_render_format_and_codec(&conn).unwrap()["format"], "mxf");

        assert_eq!(
            delete_render_preset(&conn, preset("Broadcast")).unwrap(),
            "Successfully deleted render preset 'Broadcast'"
        );
        assert_eq!(
            load_render_preset(&conn, preset("Broadcast")).unwrap(),
            "Failed to load render preset 'Broadcast'"
        );
    }
}
