use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use config::{Config, File, FileFormat};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::motion::Priority;

const CONFIG_FILE: &str = "mascot.toml";

/// Key under which the default motion and expression live
pub const DEFAULT_KEY: &str = "default";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),

    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Configuration I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No configuration directory available on this platform")]
    NoConfigDir,
}

// =============================================================================
// View
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewSettings {
    pub scale: f32,
    pub max_scale: f32,
    pub min_scale: f32,
    pub logical_left: f32,
    pub logical_right: f32,
    pub logical_bottom: f32,
    pub logical_top: f32,
    pub logical_max_left: f32,
    pub logical_max_right: f32,
    pub logical_max_bottom: f32,
    pub logical_max_top: f32,
}

impl Default for ViewSettings {
    fn default() -> Self {
        Self {
            scale: 1.0,
            max_scale: 2.0,
            min_scale: 0.5,
            logical_left: -1.0,
            logical_right: 1.0,
            logical_bottom: -1.0,
            logical_top: 1.0,
            logical_max_left: -2.0,
            logical_max_right: 2.0,
            logical_max_bottom: -2.0,
            logical_max_top: 2.0,
        }
    }
}

// =============================================================================
// Named motions
// =============================================================================

/// A motion addressed by group and index. `no < 0` or an empty group means "none".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionName {
    pub group: String,
    pub no: i32,
    pub priority: Priority,
}

impl Default for MotionName {
    fn default() -> Self {
        Self {
            group: String::new(),
            no: -1,
            priority: Priority::None,
        }
    }
}

impl MotionName {
    pub fn new(group: impl Into<String>, no: i32, priority: Priority) -> Self {
        Self {
            group: group.into(),
            no,
            priority,
        }
    }

    /// Group and index when this name points at a motion
    pub fn target(&self) -> Option<(&str, usize)> {
        if self.group.is_empty() || self.no < 0 {
            None
        } else {
            Some((self.group.as_str(), self.no as usize))
        }
    }
}

// =============================================================================
// Mascot configuration
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MascotConfig {
    /// Base path or URL prefix the model directory lives under
    pub resources_path: String,
    /// Model directory; the settings document is `{model_dir}.model3.json` inside it
    pub model_dir: String,

    pub motion_group_idle: String,
    pub motion_group_tap_body: String,
    pub hit_area_name_head: String,
    pub hit_area_name_body: String,

    pub moc_consistency_validation: bool,
    pub motion_consistency_validation: bool,

    pub debug_log: bool,
    pub debug_touch_log: bool,

    pub lip_sync_enabled: bool,
    pub lip_sync_weight: f32,

    pub target_fps: u32,
    /// Seed for blink timing and random motion/expression picks; random when unset
    pub random_seed: Option<u64>,

    pub view: ViewSettings,

    pub expression_names: BTreeMap<String, String>,
    pub motion_names: BTreeMap<String, MotionName>,
}

impl Default for MascotConfig {
    fn default() -> Self {
        Self {
            resources_path: "./".to_string(),
            model_dir: String::new(),
            motion_group_idle: "Idle".to_string(),
            motion_group_tap_body: "TapBody".to_string(),
            hit_area_name_head: "Head".to_string(),
            hit_area_name_body: "Body".to_string(),
            moc_consistency_validation: true,
            motion_consistency_validation: true,
            debug_log: false,
            debug_touch_log: false,
            lip_sync_enabled: true,
            lip_sync_weight: 0.8,
            target_fps: 60,
            random_seed: None,
            view: ViewSettings::default(),
            expression_names: BTreeMap::from([(DEFAULT_KEY.to_string(), String::new())]),
            motion_names: BTreeMap::from([(DEFAULT_KEY.to_string(), MotionName::default())]),
        }
    }
}

impl MascotConfig {
    /// Directory every model resource is fetched relative to, with a trailing `/`
    pub fn home_dir(&self) -> String {
        let mut home = self.resources_path.clone();
        if !home.is_empty() && !home.ends_with('/') {
            home.push('/');
        }
        home.push_str(self.model_dir.trim_matches('/'));
        if !home.ends_with('/') {
            home.push('/');
        }
        home
    }

    pub fn settings_file_name(&self) -> String {
        format!("{}.model3.json", self.model_dir.trim_matches('/'))
    }

    /// The idle fallback motion, if one is configured
    pub fn default_motion(&self) -> Option<(&str, usize)> {
        self.motion_names.get(DEFAULT_KEY).and_then(MotionName::target)
    }

    pub fn default_expression(&self) -> Option<&str> {
        self.expression_names
            .get(DEFAULT_KEY)
            .map(String::as_str)
            .filter(|name| !name.is_empty())
    }

    /// Look up a named motion. Exact match first, then case-insensitive.
    pub fn motion_name(&self, name: &str) -> Option<&MotionName> {
        self.motion_names.get(name).or_else(|| {
            self.motion_names
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, motion)| motion)
        })
    }
}

fn format_for(path: &Path) -> FileFormat {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => FileFormat::Json,
        _ => FileFormat::Toml,
    }
}

/// Layer a configuration file over the defaults
pub fn load_config_from_file(path: &Path) -> Result<MascotConfig, ConfigError> {
    let merged = Config::builder()
        .add_source(Config::try_from(&MascotConfig::default())?)
        .add_source(File::from(path).format(format_for(path)))
        .build()?;
    Ok(merged.try_deserialize()?)
}

/// Layer configuration text over the defaults
pub fn load_config_from_str(content: &str, format: FileFormat) -> Result<MascotConfig, ConfigError> {
    let merged = Config::builder()
        .add_source(Config::try_from(&MascotConfig::default())?)
        .add_source(File::from_str(content, format))
        .build()?;
    Ok(merged.try_deserialize()?)
}

/// Load the configuration, falling back to defaults when the file is missing or broken.
/// Without an explicit path the platform config directory is used.
pub fn load_config(path: Option<&Path>) -> MascotConfig {
    let path = match path.map(Path::to_path_buf).or_else(default_config_path) {
        Some(path) => path,
        None => return MascotConfig::default(),
    };

    if !path.exists() {
        info!("No configuration at {}, using defaults", path.display());
        return MascotConfig::default();
    }

    match load_config_from_file(&path) {
        Ok(config) => {
            info!("Loaded configuration from {}", path.display());
            config
        }
        Err(e) => {
            warn!("⚠️ Ignoring configuration {}: {}", path.display(), e);
            MascotConfig::default()
        }
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("com", "live2d", "live2d-mascot")
        .map(|proj| proj.config_dir().join(CONFIG_FILE))
}

pub fn save_config_to(config: &MascotConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let toml = toml::to_string_pretty(config)?;
    fs::write(path, toml)?;
    Ok(())
}

/// Save into the platform config directory
pub fn save_config(config: &MascotConfig) -> Result<PathBuf, ConfigError> {
    let path = default_config_path().ok_or(ConfigError::NoConfigDir)?;
    save_config_to(config, &path)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MascotConfig::default();
        assert_eq!(config.motion_group_idle, "Idle");
        assert_eq!(config.hit_area_name_body, "Body");
        assert_eq!(config.lip_sync_weight, 0.8);
        assert_eq!(config.default_motion(), None);
        assert_eq!(config.default_expression(), None);
        assert_eq!(config.view.max_scale, 2.0);
    }

    #[test]
    fn test_home_dir_joins_cleanly() {
        let config = MascotConfig {
            resources_path: "https://cdn.example.com/live2d".to_string(),
            model_dir: "haru/".to_string(),
            ..Default::default()
        };
        assert_eq!(config.home_dir(), "https://cdn.example.com/live2d/haru/");
        assert_eq!(config.settings_file_name(), "haru.model3.json");
    }

    #[test]
    fn test_motion_name_target() {
        assert_eq!(MotionName::new("Idle", 0, Priority::Idle).target(), Some(("Idle", 0)));
        assert_eq!(MotionName::new("Idle", -1, Priority::Idle).target(), None);
        assert_eq!(MotionName::new("", 2, Priority::Idle).target(), None);
    }

    #[test]
    fn test_json_text_overrides_only_given_keys() {
        let config = load_config_from_str(
            r#"{ "model_dir": "haru", "lip_sync_weight": 0.5, "view": { "scale": 1.5 } }"#,
            FileFormat::Json,
        )
        .unwrap();
        assert_eq!(config.model_dir, "haru");
        assert_eq!(config.lip_sync_weight, 0.5);
        assert_eq!(config.view.scale, 1.5);
        assert_eq!(config.view.max_scale, 2.0);
        assert_eq!(config.motion_group_tap_body, "TapBody");
    }
}
