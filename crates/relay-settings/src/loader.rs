//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`RelaySettings::default()`]
//! 2. If the settings file exists, deep-merge its values over the defaults
//! 3. Apply `RELAY_*` environment overrides (highest priority)
//! 4. Validate
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use relay_core::logging::LogFormat;
use serde_json::Value;
use tracing::debug;

use crate::errors::{Result, SettingsError};
use crate::types::RelaySettings;

/// Resolve the default settings file path (`~/.relay/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".relay").join("settings.json")
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults; invalid JSON or invalid values are errors.
pub fn load_settings_from_path(path: &Path) -> Result<RelaySettings> {
    let mut settings = merge_file_over_defaults(path)?;
    apply_env_overrides(&mut settings);
    settings.validate()?;
    Ok(settings)
}

fn merge_file_over_defaults(path: &Path) -> Result<RelaySettings> {
    if !path.exists() {
        debug!(?path, "settings file not found, using defaults");
        return Ok(RelaySettings::default());
    }

    debug!(?path, "loading settings from file");
    let content = std::fs::read_to_string(path).map_err(|e| SettingsError::read(path, e))?;
    let user: Value =
        serde_json::from_str(&content).map_err(|e| SettingsError::malformed(path, e))?;
    let defaults =
        serde_json::to_value(RelaySettings::default()).map_err(|e| SettingsError::malformed(path, e))?;
    serde_json::from_value(deep_merge(defaults, user)).map_err(|e| SettingsError::malformed(path, e))
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `RELAY_*` environment variable overrides.
///
/// Invalid values are logged and ignored (file/default value stays).
pub fn apply_env_overrides(settings: &mut RelaySettings) {
    apply_overrides_from(settings, |name| std::env::var(name).ok());
}

/// Apply overrides from an arbitrary lookup (testable without touching the
/// process environment).
pub fn apply_overrides_from(
    settings: &mut RelaySettings,
    lookup: impl Fn(&str) -> Option<String>,
) {
    let read = |name: &str| lookup(name).filter(|v| !v.is_empty());

    if let Some(v) = read("RELAY_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = read("RELAY_PORT") {
        match parse_u16_range(&v, 0, u16::MAX) {
            Some(port) => settings.server.port = port,
            None => warn_invalid("RELAY_PORT", &v),
        }
    }
    if let Some(v) = read("RELAY_CHAT_PATH") {
        settings.server.chat_path = v;
    }
    if let Some(v) = read("RELAY_STATIC_DIR") {
        settings.server.static_dir = v;
    }
    if let Some(v) = read("RELAY_QUEUE_CAPACITY") {
        match parse_usize_range(&v, 1, 1 << 24) {
            Some(n) => settings.relay.queue_capacity = n,
            None => warn_invalid("RELAY_QUEUE_CAPACITY", &v),
        }
    }
    if let Some(v) = read("RELAY_WRITE_TIMEOUT_MS") {
        match parse_u64_range(&v, 1, 3_600_000) {
            Some(n) => settings.relay.write_timeout_ms = n,
            None => warn_invalid("RELAY_WRITE_TIMEOUT_MS", &v),
        }
    }
    if let Some(v) = read("RELAY_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = read("RELAY_LOG_FORMAT") {
        match LogFormat::parse(&v) {
            Some(f) => settings.logging.format = f,
            None => warn_invalid("RELAY_LOG_FORMAT", &v),
        }
    }
}

fn warn_invalid(key: &str, value: &str) {
    tracing::warn!(key, value, "invalid env var, ignoring");
}

/// Parse a string as a `u16` within an inclusive range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `u64` within an inclusive range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `usize` within an inclusive range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}
