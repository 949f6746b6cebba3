//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`UcodeSettings::default()`]
//! 2. If `~/.ucode/settings.json` exists, deep-merge user values over defaults
//! 3. Apply environment variable overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;
use ucode_core::logging::LogFormat;

use crate::errors::Result;
use crate::types::UcodeSettings;

/// Resolve the path to the settings file (`~/.ucode/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".ucode").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<UcodeSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults. If the file contains
/// invalid JSON, returns an error.
pub fn load_settings_from_path(path: &Path) -> Result<UcodeSettings> {
    let mut settings = load_file_layer(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Defaults merged with the file at `path`, without env overrides.
fn load_file_layer(path: &Path) -> Result<UcodeSettings> {
    let defaults = serde_json::to_value(UcodeSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
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

/// Apply `UCODE_*` environment variable overrides to loaded settings.
///
/// Integers must parse and fall within the documented range; invalid
/// values are ignored with a warning (fall back to file/default).
pub fn apply_env_overrides(settings: &mut UcodeSettings) {
    apply_overrides(settings, |name| std::env::var(name).ok());
}

/// Apply overrides from an arbitrary variable source.
pub fn apply_overrides(settings: &mut UcodeSettings, lookup: impl Fn(&str) -> Option<String>) {
    let env = EnvReader { lookup };

    // ── Endpoint ────────────────────────────────────────────────────
    if let Some(v) = env.string("UCODE_WS_URL") {
        settings.endpoint.ws_url = v;
    }
    if let Some(v) = env.string("UCODE_API_URL") {
        settings.endpoint.api_base_url = v;
    }

    // ── Session lifecycle ───────────────────────────────────────────
    if let Some(v) = env.u64("UCODE_HEARTBEAT_INTERVAL", 1000, 600_000) {
        settings.session.heartbeat_interval_ms = v;
    }
    if let Some(v) = env.u32("UCODE_MAX_RECONNECTS", 0, 100) {
        settings.session.max_reconnects = v;
    }
    if let Some(v) = env.u64("UCODE_RECONNECT_DELAY", 0, 600_000) {
        settings.session.reconnect_delay_ms = v;
    }

    // ── Handshake ───────────────────────────────────────────────────
    if let Some(v) = env.string("UCODE_PROJECT_ID") {
        settings.agent.project_id = v;
    }
    if let Some(v) = env.string("UCODE_MODEL_PROVIDER") {
        settings.agent.model_provider = v;
    }
    if let Some(v) = env.string("UCODE_REPO_URL") {
        settings.agent.repo_url = v;
    }
    if let Some(v) = env.string("UCODE_BRANCH") {
        settings.agent.branch = Some(v);
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = env.string("UCODE_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = env.string("UCODE_LOG_FORMAT") {
        match LogFormat::parse(&v) {
            Some(format) => settings.logging.format = format,
            None => tracing::warn!(key = "UCODE_LOG_FORMAT", value = %v, "invalid log format, ignoring"),
        }
    }
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a `u32` within a range.
pub fn parse_u32_range(val: &str, min: u32, max: u32) -> Option<u32> {
    let n: u32 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ── Variable readers (thin wrappers) ────────────────────────────────────────

struct EnvReader<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> EnvReader<F> {
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.is_empty())
    }

    fn u32(&self, name: &str, min: u32, max: u32) -> Option<u32> {
        let val = (self.lookup)(name)?;
        let result = parse_u32_range(&val, min, max);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, "invalid u32 env var, ignoring");
        }
        result
    }

    fn u64(&self, name: &str, min: u64, max: u64) -> Option<u64> {
        let val = (self.lookup)(name)?;
        let result = parse_u64_range(&val, min, max);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, "invalid u64 env var, ignoring");
        }
        result
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
