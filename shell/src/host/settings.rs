use std::path::Path;

use tracing::warn;

use crate::config::AppConfig;
use crate::error::Result;

/// Loads the config, falling back to defaults for anything unusable.
pub fn load_config(data_dir: &Path) -> AppConfig {
    let config = match AppConfig::load(&AppConfig::path(data_dir)) {
        Ok(config) => config,
        Err(e) => {
            warn!(error = %e, "config unreadable, using defaults");
            return AppConfig::default();
        }
    };
    for error in config.validate() {
        warn!(%error, "invalid config value replaced by default");
    }
    config.with_defaults_for_invalid()
}

/// Validates and persists settings from the panel. Returns what was saved.
pub fn save_settings(data_dir: &Path, config: &AppConfig) -> Result<AppConfig> {
    for error in config.validate() {
        warn!(%error, "rejected settings value");
    }
    let fixed = config.with_defaults_for_invalid();
    std::fs::create_dir_all(data_dir)?;
    fixed.save(&AppConfig::path(data_dir))?;
    Ok(fixed)
}

/// Records that the welcome screen was answered.
pub fn mark_welcome_shown(data_dir: &Path) -> Result<AppConfig> {
    let mut config = load_config(data_dir);
    config.general.welcome_shown = true;
    std::fs::create_dir_all(data_dir)?;
    config.save(&AppConfig::path(data_dir))?;
    Ok(config)
}
