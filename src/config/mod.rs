use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::geometry::Color;
use crate::session::{SessionSettings, DEFAULT_MAX_DETECTION_DIMENSION};
use crate::tags::{TagConfig, TagVocabulary};
use crate::viewport::ViewportLimits;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub(crate) enum ConfigPathError {
    #[error("neither XDG_CONFIG_HOME nor HOME is set")]
    MissingHomeDirectory,
}

const APP_DIR: &str = "uilabel";
const APP_CONFIG_FILE: &str = "config.json";
const DEFAULT_DETECTION_ENDPOINT: &str = "http://localhost:3000/api/v1/detect";
const DEFAULT_DETECTION_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub(crate) struct DetectionConfig {
    pub(crate) endpoint: String,
    pub(crate) timeout_secs: u64,
    pub(crate) max_dimension: u32,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_DETECTION_ENDPOINT.to_string(),
            timeout_secs: DEFAULT_DETECTION_TIMEOUT_SECS,
            max_dimension: DEFAULT_MAX_DETECTION_DIMENSION,
        }
    }
}

impl DetectionConfig {
    pub(crate) fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub(crate) struct ViewportConfig {
    pub(crate) min_scale: f64,
    pub(crate) max_scale: f64,
    pub(crate) zoom_step: f64,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        let limits = ViewportLimits::default();
        Self {
            min_scale: limits.min_scale,
            max_scale: limits.max_scale,
            zoom_step: limits.zoom_step,
        }
    }
}

impl From<ViewportConfig> for ViewportLimits {
    fn from(config: ViewportConfig) -> Self {
        ViewportLimits {
            min_scale: config.min_scale,
            max_scale: config.max_scale,
            zoom_step: config.zoom_step,
        }
        .sanitized()
    }
}

/// Application-level settings from `config.json`. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct AppConfig {
    pub(crate) detection: DetectionConfig,
    pub(crate) viewport: ViewportConfig,
    pub(crate) tags: Option<Vec<TagConfig>>,
    pub(crate) highlight_color: Option<String>,
    pub(crate) export_dir: Option<PathBuf>,
}

impl AppConfig {
    /// Configured tags, or the built-in vocabulary when unset or invalid.
    pub(crate) fn tag_vocabulary(&self) -> TagVocabulary {
        let Some(entries) = self.tags.as_deref() else {
            return TagVocabulary::default();
        };
        TagVocabulary::from_config(entries).unwrap_or_else(|err| {
            tracing::warn!(%err, "invalid tag configuration; using default tags");
            TagVocabulary::default()
        })
    }

    pub(crate) fn highlight(&self) -> Color {
        match self.highlight_color.as_deref() {
            None => Color::RED,
            Some(value) => Color::from_hex(value).unwrap_or_else(|| {
                tracing::warn!(value, "invalid highlight_color; using red");
                Color::RED
            }),
        }
    }

    pub(crate) fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            limits: self.viewport.into(),
            highlight: self.highlight(),
            max_detection_dimension: self.detection.max_dimension.max(1),
        }
    }

    pub(crate) fn export_dir(&self) -> PathBuf {
        self.export_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

pub(crate) fn load_app_config() -> AppConfig {
    let (xdg_config_home, home) = config_env_dirs();
    load_app_config_with(xdg_config_home.as_deref(), home.as_deref())
}

fn load_app_config_with(xdg_config_home: Option<&Path>, home: Option<&Path>) -> AppConfig {
    let path = match app_config_path(APP_DIR, APP_CONFIG_FILE, xdg_config_home, home) {
        Ok(p) => p,
        Err(err) => {
            tracing::debug!(%err, "no config directory; using defaults");
            return AppConfig::default();
        }
    };
    if !path.exists() {
        return AppConfig::default();
    }
    match std::fs::read_to_string(&path) {
        Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|err| {
            tracing::warn!(?err, ?path, "failed to parse config.json; using defaults");
            AppConfig::default()
        }),
        Err(err) => {
            tracing::warn!(?err, ?path, "failed to read config.json; using defaults");
            AppConfig::default()
        }
    }
}

pub(crate) fn config_env_dirs() -> (Option<PathBuf>, Option<PathBuf>) {
    (
        std::env::var_os("XDG_CONFIG_HOME").map(PathBuf::from),
        std::env::var_os("HOME").map(PathBuf::from),
    )
}

pub(crate) fn app_config_path(
    app_dir: &str,
    file_name: &str,
    xdg_config_home: Option<&Path>,
    home: Option<&Path>,
) -> Result<PathBuf, ConfigPathError> {
    let mut path = config_root(xdg_config_home, home)?;
    path.push(app_dir);
    path.push(file_name);
    Ok(path)
}

fn config_root(
    xdg_config_home: Option<&Path>,
    home: Option<&Path>,
) -> Result<PathBuf, ConfigPathError> {
    if let Some(xdg) = xdg_config_home.filter(|path| !path.as_os_str().is_empty()) {
        return Ok(xdg.to_path_buf());
    }

    let home = home.ok_or(ConfigPathError::MissingHomeDirectory)?;
    Ok(home.join(".config"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_config_root(name: &str, contents: &str) -> PathBuf {
        let root = std::env::temp_dir().join(format!(
            "uilabel-config-{name}-{}",
            std::process::id()
        ));
        let dir = root.join(APP_DIR);
        std::fs::create_dir_all(&dir).expect("create scratch config dir");
        std::fs::write(dir.join(APP_CONFIG_FILE), contents).expect("write scratch config");
        root
    }

    #[test]
    fn app_config_path_prefers_xdg_config_home() {
        let path = app_config_path(
            "uilabel",
            "config.json",
            Some(Path::new("/tmp/config-root")),
            Some(Path::new("/tmp/home")),
        )
        .expect("path should resolve");

        assert_eq!(path, PathBuf::from("/tmp/config-root/uilabel/config.json"));
    }

    #[test]
    fn app_config_path_falls_back_to_home_dot_config() {
        let path = app_config_path("uilabel", "config.json", Some(Path::new("")), Some(Path::new("/tmp/home")))
            .expect("path should resolve");

        assert_eq!(path, PathBuf::from("/tmp/home/.config/uilabel/config.json"));
    }

    #[test]
    fn app_config_path_errors_when_home_missing_and_xdg_unset() {
        let error = app_config_path("uilabel", "config.json", None, None).unwrap_err();
        assert_eq!(error, ConfigPathError::MissingHomeDirectory);
    }

    #[test]
    fn missing_config_uses_defaults() {
        let config = load_app_config_with(Some(Path::new("/definitely/not/a/config/root")), None);
        assert_eq!(config.detection, DetectionConfig::default());
        assert_eq!(config.detection.endpoint, DEFAULT_DETECTION_ENDPOINT);
        assert_eq!(config.session_settings(), SessionSettings::default());
        assert_eq!(config.export_dir(), PathBuf::from("."));
        assert_eq!(config.tag_vocabulary().len(), 4);
    }

    #[test]
    fn partial_config_overrides_only_given_fields() {
        let root = scratch_config_root(
            "partial",
            r##"{
                "detection": {"endpoint": "http://10.0.0.2:8080/detect", "timeout_secs": 5},
                "viewport": {"max_scale": 4.0},
                "highlight_color": "#00FF00",
                "tags": [
                    {"value": "link", "label": "Link", "color": "#112233"},
                    {"value": "icon", "label": "Icon", "color": "#445566"}
                ]
            }"##,
        );
        let config = load_app_config_with(Some(&root), None);
        assert_eq!(config.detection.endpoint, "http://10.0.0.2:8080/detect");
        assert_eq!(config.detection.timeout(), Duration::from_secs(5));
        assert_eq!(config.detection.max_dimension, 512);

        let settings = config.session_settings();
        assert_eq!(settings.limits.max_scale, 4.0);
        assert_eq!(settings.limits.min_scale, 0.1);
        assert_eq!(settings.highlight, Color::new(0, 255, 0));

        let tags = config.tag_vocabulary();
        assert_eq!(tags.len(), 2);
        assert_eq!(tags.first().value, "link");
        std::fs::remove_dir_all(root).ok();
    }

    #[test]
    fn invalid_json_falls_back_to_defaults() {
        let root = scratch_config_root("invalid", "{ not json");
        let config = load_app_config_with(Some(&root), None);
        assert_eq!(config.detection, DetectionConfig::default());
        std::fs::remove_dir_all(root).ok();
    }

    #[test]
    fn invalid_tags_and_colour_fall_back_with_warning() {
        let root = scratch_config_root(
            "bad-tags",
            r##"{"tags": [], "highlight_color": "red"}"##,
        );
        let config = load_app_config_with(Some(&root), None);
        assert_eq!(config.tag_vocabulary().first().value, "button");
        assert_eq!(config.highlight(), Color::RED);
        std::fs::remove_dir_all(root).ok();
    }
}
