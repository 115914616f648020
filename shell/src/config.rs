//! User-facing configuration, persisted as `config.toml` in the data directory.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Error};

/// Application configuration shared by host and surface.
///
/// Travels inside `openSettings`/`saveSettings` messages unchanged, so field
/// names stay snake_case on the wire as they are in the TOML file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub general: GeneralConfig,
    pub shortcuts: ShortcutsConfig,
    pub lifecycle: LifecycleConfig,
    pub editor: EditorConfig,
    pub window: WindowConfig,
}

impl AppConfig {
    /// Returns the config file path within the given data directory.
    pub fn path(data_dir: &Path) -> PathBuf {
        data_dir.join("config.toml")
    }

    /// Loads config from a TOML file. Returns default config if file doesn't exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Saves config to a TOML file.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the list of validation errors, empty if the config is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.lifecycle.trash_ttl_days == 0 {
            errors.push("trash_ttl_days must be at least 1".to_string());
        }
        if self.lifecycle.purge_ttl_days == 0 {
            errors.push("purge_ttl_days must be at least 1".to_string());
        }
        if self.editor.save_delay_ms == 0 {
            errors.push("save_delay_ms must be at least 1".to_string());
        }
        if self.window.resize_border <= 0 {
            errors.push("resize_border must be positive".to_string());
        }

        errors
    }

    /// Returns a config where every invalid value is replaced by its default.
    pub fn with_defaults_for_invalid(&self) -> Self {
        let defaults = Self::default();
        let mut fixed = self.clone();

        if fixed.lifecycle.trash_ttl_days == 0 {
            fixed.lifecycle.trash_ttl_days = defaults.lifecycle.trash_ttl_days;
        }
        if fixed.lifecycle.purge_ttl_days == 0 {
            fixed.lifecycle.purge_ttl_days = defaults.lifecycle.purge_ttl_days;
        }
        if fixed.editor.save_delay_ms == 0 {
            fixed.editor.save_delay_ms = defaults.editor.save_delay_ms;
        }
        if fixed.window.resize_border <= 0 {
            fixed.window.resize_border = defaults.window.resize_border;
        }

        fixed
    }
}

/// General application settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub theme: Theme,
    pub show_tray_icon: bool,
    pub welcome_shown: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            theme: Theme::default(),
            show_tray_icon: true,
            welcome_shown: false,
        }
    }
}

/// Theme preference.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Dark,
    Light,
    #[default]
    System,
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Theme::Dark => write!(f, "dark"),
            Theme::Light => write!(f, "light"),
            Theme::System => write!(f, "system"),
        }
    }
}

/// Keyboard shortcut settings.
///
/// Format: `[Ctrl+][Alt+][Shift+][Win+]<e.code>`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShortcutsConfig {
    pub global_shortcut: String,
    pub copy_markdown: String,
    pub copy_files: String,
}

impl Default for ShortcutsConfig {
    fn default() -> Self {
        Self {
            global_shortcut: "Ctrl+Alt+KeyK".to_string(),
            copy_markdown: "Ctrl+KeyT".to_string(),
            copy_files: "Ctrl+KeyF".to_string(),
        }
    }
}

/// Lifecycle/TTL settings, forwarded to the storage engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    pub trash_ttl_days: u32,
    pub purge_ttl_days: u32,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            trash_ttl_days: 30,
            purge_ttl_days: 7,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Debounce delay between the last edit and the persisted write.
    pub save_delay_ms: u64,
}

impl EditorConfig {
    pub fn save_delay(&self) -> Duration {
        Duration::from_millis(self.save_delay_ms)
    }
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self { save_delay_ms: 500 }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Resize border width in logical pixels when the window is not maximized.
    pub resize_border: i32,
    pub min_width: i32,
    pub min_height: i32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            resize_border: 8,
            min_width: 400,
            min_height: 300,
        }
    }
}

/// Returns the data directory: `KEVA_DATA_DIR`, else `%LOCALAPPDATA%\keva`.
pub fn data_dir() -> Result<PathBuf, Error> {
    if let Ok(dir) = std::env::var("KEVA_DATA_DIR") {
        return Ok(PathBuf::from(dir));
    }
    std::env::var("LOCALAPPDATA")
        .map(|dir| PathBuf::from(dir).join("keva"))
        .map_err(|_| Error::DataDirUnavailable)
}
