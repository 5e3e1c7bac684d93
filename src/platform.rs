//! Locations of the DaVinci Resolve scripting API on each platform.
//!
//! Precedence, highest first: `[connection]` config values, the
//! `RESOLVE_SCRIPT_API` / `RESOLVE_SCRIPT_LIB` environment variables, then the
//! platform default install location.

use std::env;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::ConnectionConfig;

pub const API_ENV: &str = "RESOLVE_SCRIPT_API";
pub const LIB_ENV: &str = "RESOLVE_SCRIPT_LIB";

/// Operating system families with a known Resolve install layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    MacOs,
    Windows,
    Linux,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            Self::MacOs
        } else if cfg!(target_os = "windows") {
            Self::Windows
        } else {
            Self::Linux
        }
    }

    /// Default `(api_path, lib_path)`. `program_data` is `%PROGRAMDATA%` on Windows.
    pub fn default_paths(self, program_data: Option<&str>) -> (PathBuf, PathBuf) {
        match self {
            Self::MacOs => (
                PathBuf::from(
                    "/Library/Application Support/Blackmagic Design/DaVinci Resolve/Developer/Scripting",
                ),
                PathBuf::from(
                    "/Applications/DaVinci Resolve/DaVinci Resolve.app/Contents/Libraries/Fusion/fusionscript.so",
                ),
            ),
            Self::Windows => {
                let program_data = program_data.unwrap_or(r"C:\ProgramData");
                (
                    PathBuf::from(program_data)
                        .join(r"Blackmagic Design\DaVinci Resolve\Support\Developer\Scripting"),
                    PathBuf::from(r"C:\Program Files\Blackmagic Design\DaVinci Resolve\fusionscript.dll"),
                )
            }
            Self::Linux => (
                PathBuf::from("/opt/resolve/Developer/Scripting"),
                PathBuf::from("/opt/resolve/libs/Fusion/fusionscript.so"),
            ),
        }
    }
}

/// Paths needed to import `DaVinciResolveScript`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptPaths {
    pub api_path: PathBuf,
    pub lib_path: PathBuf,
    /// Directory added to the Python module search path
    pub modules_path: PathBuf,
}

impl ScriptPaths {
    /// Resolve paths for the running platform from config and process environment.
    pub fn resolve(config: &ConnectionConfig) -> Self {
        let paths = Self::resolve_with(config, Platform::current(), |key| env::var(key).ok());
        debug!(
            api = %paths.api_path.display(),
            lib = %paths.lib_path.display(),
            modules = %paths.modules_path.display(),
            "Resolved scripting paths"
        );
        paths
    }

    /// Resolution with the platform and environment lookup supplied by the caller.
    pub fn resolve_with(
        config: &ConnectionConfig,
        platform: Platform,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let from_env = |key: &str| lookup(key).filter(|v| !v.is_empty()).map(PathBuf::from);
        let (default_api, default_lib) = platform.default_paths(lookup("PROGRAMDATA").as_deref());

        let api_path = config.api_path.clone().or_else(|| from_env(API_ENV)).unwrap_or(default_api);
        let lib_path = config.lib_path.clone().or_else(|| from_env(LIB_ENV)).unwrap_or(default_lib);
        let modules_path =
            config.modules_path.clone().unwrap_or_else(|| modules_dir(&api_path));

        Self { api_path, lib_path, modules_path }
    }

    /// Publish the paths to the environment read by `DaVinciResolveScript`.
    pub fn export(&self) {
        env::set_var(API_ENV, &self.api_path);
        env::set_var(LIB_ENV, &self.lib_path);
    }
}

fn modules_dir(api_path: &Path) -> PathBuf {
    api_path.join("Modules")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_linux_defaults() {
        let paths = ScriptPaths::resolve_with(&ConnectionConfig::default(), Platform::Linux, lookup(&[]));
        assert_eq!(paths.api_path, PathBuf::from("/opt/resolve/Developer/Scripting"));
        assert_eq!(paths.lib_path, PathBuf::from("/opt/resolve/libs/Fusion/fusionscript.so"));
        assert_eq!(paths.modules_path, PathBuf::from("/opt/resolve/Developer/Scripting/Modules"));
    }

    #[test]
    fn test_macos_defaults() {
        let (api, lib) = Platform::MacOs.default_paths(None);
        assert!(api.starts_with("/Library/Application Support/Blackmagic Design"));
        assert!(lib.ends_with("Libraries/Fusion/fusionscript.so"));
    }

    #[test]
    fn test_windows_uses_program_data() {
        let paths = ScriptPaths::resolve_with(
            &ConnectionConfig::default(),
            Platform::Windows,
            lookup(&[("PROGRAMDATA", r"D:\Data")]),
        );
        assert!(paths.api_path.starts_with(r"D:\Data"));
        assert!(paths.lib_path.to_string_lossy().ends_with("fusionscript.dll"));
    }

    #[test]
    fn test_environment_overrides_defaults() {
        let paths = ScriptPaths::resolve_with(
            &ConnectionConfig::default(),
            Platform::Linux,
            lookup(&[(API_ENV, "/srv/api"), (LIB_ENV, "/srv/lib.so")]),
        );
        assert_eq!(paths.api_path, PathBuf::from("/srv/api"));
        assert_eq!(paths.lib_path, PathBuf::from("/srv/lib.so"));
        assert_eq!(paths.modules_path, PathBuf::from("/srv/api/Modules"));
    }

    #[test]
    fn test_empty_environment_value_ignored() {
        let paths = ScriptPaths::resolve_with(
            &ConnectionConfig::default(),
            Platform::Linux,
            lookup(&[(API_ENV, "")]),
        );
        assert_eq!(paths.api_path, PathBuf::from("/opt/resolve/Developer/Scripting"));
    }

    #[test]
    fn test_config_overrides_environment() {
        let config = ConnectionConfig {
            api_path: Some(PathBuf::from("/cfg/api")),
            modules_path: Some(PathBuf::from("/cfg/modules")),
            ..Default::default()
        };
        let paths =
            ScriptPaths::resolve_with(&config, Platform::Linux, lookup(&[(API_ENV, "/srv/api")]));
        assert_eq!(paths.api_path, PathBuf::from("/cfg/api"));
        assert_eq!(paths.modules_path, PathBuf::from("/cfg/modules"));
        assert_eq!(paths.lib_path, PathBuf::from("/opt/resolve/libs/Fusion/fusionscript.so"));
    }

    #[test]
    #[serial]
    fn test_export_sets_environment() {
        let previous: Vec<_> = [API_ENV, LIB_ENV].iter().map(|k| (*k, env::var_os(k))).collect();
        let paths = ScriptPaths {
            api_path: PathBuf::from("/x/api"),
            lib_path: PathBuf::from("/x/lib.so"),
            modules_path: PathBuf::from("/x/api/Modules"),
        };
        paths.export();
        assert_eq!(env::var(API_ENV).as_deref(), Ok("/x/api"));
        assert_eq!(env::var(LIB_ENV).as_deref(), Ok("/x/lib.so"));
        for (key, value) in previous {
            match value {
                Some(value) => env::set_var(key, value),
                None => env::remove_var(key),
            }
        }
    }
}
