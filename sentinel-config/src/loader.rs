// sentinel-config/src/loader.rs
// ============================================================================
// Module: Config Loader
// Description: Resolves the inline pointer, loads or bootstraps config.json.
// Purpose: One load path shared by every plugin so bootstrapping never drifts.
// Dependencies: dirs, serde_json, sentinel_core::atomic
// ============================================================================

//! ## Overview
//! `spec.md` §6: a minimal inline pointer (`{enabled, configPath}`) living
//! in the host-wide plugin config is resolved first; the JSON file it names
//! (default `~/.openclaw/plugins/<plugin>/config.json`) is then loaded,
//! with `enabled` in the inline pointer overriding whatever the file says.
//! A missing file is bootstrapped with [`PluginSettings::default`].

use std::fs;
use std::path::Path;
use std::path::PathBuf;

use serde_json::Value;

use crate::settings::PluginSettings;

/// Failure modes for [`load`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Reading or writing the config file failed.
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The config file's contents did not parse as [`PluginSettings`].
    #[error("config file is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// The inline pointer extracted from the host's plugin config.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct InlinePointer {
    enabled: Option<bool>,
    config_path: Option<PathBuf>,
}

fn parse_inline_pointer(plugin_config: &Value) -> InlinePointer {
    InlinePointer {
        enabled: plugin_config.get("enabled").and_then(Value::as_bool),
        config_path: plugin_config.get("configPath").and_then(Value::as_str).map(PathBuf::from),
    }
}

/// Returns the default workspace directory for `plugin_name`:
/// `$HOME/.openclaw/plugins/<plugin_name>`.
#[must_use]
pub fn default_workspace_dir(plugin_name: &str) -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".openclaw/plugins").join(plugin_name)
}

/// Loads `plugin_name`'s settings, resolving the inline pointer found in
/// `plugin_config` first. A missing config file is bootstrapped with
/// defaults and written back atomically.
///
/// # Errors
///
/// Returns [`ConfigError`] if the config file exists but cannot be read or
/// parsed, or if bootstrapping a missing file fails to write.
pub fn load(plugin_name: &str, plugin_config: &Value) -> Result<PluginSettings, ConfigError> {
    let inline = parse_inline_pointer(plugin_config);
    let config_path =
        inline.config_path.clone().unwrap_or_else(|| default_workspace_dir(plugin_name).join("config.json"));
    let mut settings = load_or_bootstrap(&config_path)?;
    if let Some(enabled) = inline.enabled {
        settings.enabled = enabled;
    }
    Ok(settings)
}

fn load_or_bootstrap(config_path: &Path) -> Result<PluginSettings, ConfigError> {
    if config_path.exists() {
        let text = fs::read_to_string(config_path)?;
        let settings = serde_json::from_str(&text)?;
        return Ok(settings);
    }
    let defaults = PluginSettings::default();
    let bytes = serde_json::to_vec_pretty(&defaults)?;
    sentinel_core::atomic::write_atomic(config_path, &bytes)?;
    Ok(defaults)
}
