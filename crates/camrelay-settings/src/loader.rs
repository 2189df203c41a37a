//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`RelaySettings::default()`]
//! 2. If a config file is given and exists, deep-merge its values over defaults
//! 3. Apply environment variable overrides (highest priority)
//! 4. [`RelaySettings::validate`]

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::{Result, SettingsError};
use crate::types::{RelaySettings, TakeoverPolicy};

/// Env var naming the config file when no path is passed explicitly.
pub const CONFIG_PATH_ENV: &str = "CAMRELAY_CONFIG";

/// Resolve the config file path: explicit argument first, then `CAMRELAY_CONFIG`.
pub fn settings_path(explicit: Option<&Path>) -> Option<PathBuf> {
    explicit
        .map(Path::to_path_buf)
        .or_else(|| read_env_string(CONFIG_PATH_ENV).map(PathBuf::from))
}

/// Load settings from the resolved path with process env overrides.
pub fn load_settings(explicit: Option<&Path>) -> Result<RelaySettings> {
    load_settings_with(settings_path(explicit).as_deref(), |name| {
        std::env::var(name).ok()
    })
}

/// Load settings from an optional file, reading overrides through `env`.
///
/// A missing file yields defaults. An unreadable file or invalid JSON is an
/// error.
pub fn load_settings_with(
    path: Option<&Path>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<RelaySettings> {
    let defaults = serde_json::to_value(RelaySettings::default())
        .map_err(|e| SettingsError::parse(None, e))?;

    let merged = match path {
        Some(file) if file.exists() => {
            debug!(path = ?file, "loading settings from file");
            let content =
                std::fs::read_to_string(file).map_err(|e| SettingsError::read(file, e))?;
            let user: Value =
                serde_json::from_str(&content).map_err(|e| SettingsError::parse(Some(file), e))?;
            if !user.is_object() {
                return Err(SettingsError::InvalidValue(
                    "settings root must be a JSON object".into(),
                ));
            }
            deep_merge(defaults, user)
        }
        Some(file) => {
            debug!(path = ?file, "settings file not found, using defaults");
            defaults
        }
        None => defaults,
    };

    let mut settings: RelaySettings =
        serde_json::from_value(merged).map_err(|e| SettingsError::parse(path, e))?;
    apply_overrides(&mut settings, env);
    settings.validate();
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
///
/// - Objects are merged recursively (source overrides target per-key)
/// - Arrays and primitives are replaced entirely by source
/// - Null values in source are skipped (preserving target)
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

/// Apply environment overrides read through `env`.
///
/// Invalid values are ignored with a warning (file/default value wins).
pub fn apply_overrides(settings: &mut RelaySettings, env: impl Fn(&str) -> Option<String>) {
    let string = |name: &str| env(name).filter(|v| !v.is_empty());

    // ── Server ──────────────────────────────────────────────────────
    if let Some(v) = string("PORT") {
        match parse_u16_range(&v, 1, 65535) {
            Some(port) => settings.server.port = port,
            None => warn_invalid("PORT", &v),
        }
    }
    if let Some(v) = string("CAMRELAY_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = string("CAMRELAY_OUTBOUND_QUEUE") {
        match parse_usize_range(&v, 1, 1_000_000) {
            Some(n) => settings.server.outbound_queue = n,
            None => warn_invalid("CAMRELAY_OUTBOUND_QUEUE", &v),
        }
    }
    if let Some(v) = string("CAMRELAY_MAX_MESSAGE_SIZE") {
        match parse_usize_range(&v, 1024, 1 << 30) {
            Some(n) => settings.server.max_message_size = n,
            None => warn_invalid("CAMRELAY_MAX_MESSAGE_SIZE", &v),
        }
    }

    // ── Producer ────────────────────────────────────────────────────
    if let Some(v) = string("CAMRELAY_TAKEOVER") {
        match parse_takeover(&v) {
            Some(policy) => settings.producer.takeover = policy,
            None => warn_invalid("CAMRELAY_TAKEOVER", &v),
        }
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = string("CAMRELAY_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = string("CAMRELAY_LOG_JSON") {
        match parse_bool(&v) {
            Some(b) => settings.logging.json = b,
            None => warn_invalid("CAMRELAY_LOG_JSON", &v),
        }
    }
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a takeover policy name (`orphan` or `close-previous`).
pub fn parse_takeover(val: &str) -> Option<TakeoverPolicy> {
    match val.trim().to_lowercase().replace('_', "-").as_str() {
        "orphan" => Some(TakeoverPolicy::Orphan),
        "close-previous" => Some(TakeoverPolicy::ClosePrevious),
        _ => None,
    }
}

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn warn_invalid(key: &str, value: &str) {
    tracing::warn!(key, value, "invalid env var, ignoring");
}
