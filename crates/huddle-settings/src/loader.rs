//! Layered settings loading.
//!
//! Compiled defaults, then the JSON file deep-merged on top, then `HUDDLE_*`
//! environment variables.

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::errors::{Result, SettingsError};
use crate::types::HuddleSettings;

/// Default settings file: `~/.huddle/settings.json`.
pub fn settings_path() -> PathBuf {
    expand_home("~/.huddle/settings.json")
}

/// Expand a leading `~` using `HOME` (or `USERPROFILE` on Windows).
pub fn expand_home(path: &str) -> PathBuf {
    let Some(rest) = path.strip_prefix('~') else {
        return PathBuf::from(path);
    };
    let home = std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map_or_else(|| PathBuf::from("."), PathBuf::from);
    home.join(rest.trim_start_matches(['/', '\\']))
}

/// Recursively merge `overlay` into `base`.
///
/// Objects merge key by key; any other overlay value replaces the base value.
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_val) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(base_val) => deep_merge(base_val, overlay_val),
                    None => overlay_val,
                };
                let _ = base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }
        (_, overlay) => overlay,
    }
}

/// Load settings from the default path with environment overrides.
pub fn load_settings() -> Result<HuddleSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from `path` with environment overrides.
///
/// A missing file is not an error: defaults (plus env) are returned.
pub fn load_settings_from_path(path: &Path) -> Result<HuddleSettings> {
    let mut settings = read_file_layer(path)?;
    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    settings.validate();
    Ok(settings)
}

fn read_file_layer(path: &Path) -> Result<HuddleSettings> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(?path, "no settings file, using defaults");
            return Ok(HuddleSettings::default());
        }
        Err(source) => {
            return Err(SettingsError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let json_err = |source| SettingsError::Json {
        path: path.to_path_buf(),
        source,
    };
    let overlay: Value = serde_json::from_str(&raw).map_err(json_err)?;
    let defaults = serde_json::to_value(HuddleSettings::default()).map_err(json_err)?;
    let settings = serde_json::from_value(deep_merge(defaults, overlay)).map_err(json_err)?;
    tracing::info!(?path, "settings loaded");
    Ok(settings)
}

/// Apply `HUDDLE_*` overrides read through `lookup`.
///
/// Unparseable numeric or boolean values are ignored with a warning.
pub fn apply_env_overrides(settings: &mut HuddleSettings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(host) = lookup("HUDDLE_HOST") {
        settings.server.host = host;
    }
    if let Some(port) = lookup("HUDDLE_PORT") {
        match port.parse() {
            Ok(port) => settings.server.port = port,
            Err(_) => tracing::warn!(value = %port, "ignoring invalid HUDDLE_PORT"),
        }
    }
    if let Some(secret) = lookup("HUDDLE_JWT_SECRET") {
        settings.auth.jwt_secret = secret;
    }
    if let Some(path) = lookup("HUDDLE_DB_PATH") {
        settings.database.path = path;
    }
    if let Some(level) = lookup("HUDDLE_LOG_LEVEL") {
        settings.logging.level = level;
    }
    if let Some(json) = lookup("HUDDLE_LOG_JSON") {
        match json.as_str() {
            "1" | "true" => settings.logging.json = true,
            "0" | "false" => settings.logging.json = false,
            _ => tracing::warn!(value = %json, "ignoring invalid HUDDLE_LOG_JSON"),
        }
    }
}
