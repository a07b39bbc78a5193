//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`DocchatSettings::default()`]
//! 2. If `~/.docchat/settings.json` exists, deep-merge user values over defaults
//! 3. Apply environment variable overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use docchat_core::logging::LogFormat;
use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::DocchatSettings;

/// `$HOME`, falling back to `/tmp`.
pub fn home_dir() -> PathBuf {
    PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string()))
}

/// Resolve the path to the settings file (`~/.docchat/settings.json`).
pub fn settings_path() -> PathBuf {
    home_dir().join(".docchat").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<DocchatSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults. If the file contains
/// invalid JSON, returns an error.
pub fn load_settings_from_path(path: &Path) -> Result<DocchatSettings> {
    let mut settings = load_file_layers(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Defaults merged with the file at `path`, without env overrides.
pub fn load_file_layers(path: &Path) -> Result<DocchatSettings> {
    let defaults = serde_json::to_value(DocchatSettings::default())?;

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

/// Apply process environment overrides to loaded settings.
pub fn apply_env_overrides(settings: &mut DocchatSettings) {
    apply_overrides_from(settings, |name| std::env::var(name).ok());
}

/// Apply overrides read through `lookup`.
///
/// Integers must parse and fall within range; invalid values are ignored
/// with a warning and the file/default value is kept.
pub fn apply_overrides_from<F>(settings: &mut DocchatSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let env = EnvReader { lookup };

    // ── Server ──────────────────────────────────────────────────────
    if let Some(v) = env.read_string("DOCCHAT_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = env
        .read_u16("DOCCHAT_PORT", 1, 65535)
        .or_else(|| env.read_u16("PORT", 1, 65535))
    {
        settings.server.port = v;
    }
    if let Some(v) = env.read_string("FRONTEND_URL") {
        if !settings.server.allowed_origins.contains(&v) {
            settings.server.allowed_origins.insert(0, v);
        }
    }
    if let Some(v) = env.read_string("DOCCHAT_UPLOADS_DIR") {
        settings.server.uploads_dir = v;
    }

    // ── Session ─────────────────────────────────────────────────────
    if let Some(v) = env.read_usize("DOCCHAT_QUEUE_CAPACITY", 1, 65_536) {
        settings.session.outbound_queue_capacity = v;
    }
    if let Some(v) = env.read_u64("DOCCHAT_READ_TIMEOUT_MS", 1000, 3_600_000) {
        settings.session.read_timeout_ms = v;
    }
    if let Some(v) = env.read_u64("DOCCHAT_WRITE_TIMEOUT_MS", 100, 600_000) {
        settings.session.write_timeout_ms = v;
    }
    if let Some(v) = env.read_u64("DOCCHAT_PING_INTERVAL_MS", 100, 3_600_000) {
        settings.session.ping_interval_ms = v;
    }
    if let Some(v) = env.read_usize("DOCCHAT_MAX_INFLIGHT_QUERIES", 1, 1024) {
        settings.session.max_inflight_queries = v;
    }

    // ── Pipeline / answer model ─────────────────────────────────────
    if let Some(v) = env.read_usize("DOCCHAT_CONTEXT_CAP", 1, 10_000_000) {
        settings.pipeline.context_char_cap = v;
    }
    if let Some(v) = env.read_u64("DOCCHAT_ANSWER_TIMEOUT_MS", 100, 3_600_000) {
        settings.pipeline.answer_timeout_ms = v;
    }
    if let Some(v) = env.read_string("DOCCHAT_ANSWER_BASE_URL") {
        settings.answer.base_url = v;
    }
    if let Some(v) = env.read_string("DOCCHAT_MODEL") {
        settings.answer.model = v;
    }
    if let Some(v) = env.read_string("GEMINI_API_KEY").or_else(|| env.read_string("API_KEY")) {
        settings.answer.api_key = Some(v);
    }

    // ── Storage / logging ───────────────────────────────────────────
    if let Some(v) = env.read_string("DOCCHAT_DB_PATH") {
        settings.storage.db_path = v;
    }
    if let Some(v) = env.read_string("DOCCHAT_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = env.read_string("DOCCHAT_LOG_FORMAT") {
        match v.parse::<LogFormat>() {
            Ok(format) => settings.logging.format = format,
            Err(e) => warn!(key = "DOCCHAT_LOG_FORMAT", value = %v, error = %e, "invalid env var, ignoring"),
        }
    }
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ── Env var readers (thin wrappers) ─────────────────────────────────────────

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn read_string(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.is_empty())
    }

    fn read_u16(&self, name: &str, min: u16, max: u16) -> Option<u16> {
        let val = (self.lookup)(name)?;
        let result = parse_u16_range(&val, min, max);
        if result.is_none() {
            warn!(key = name, value = %val, "invalid u16 env var, ignoring");
        }
        result
    }

    fn read_u64(&self, name: &str, min: u64, max: u64) -> Option<u64> {
        let val = (self.lookup)(name)?;
        let result = parse_u64_range(&val, min, max);
        if result.is_none() {
            warn!(key = name, value = %val, "invalid u64 env var, ignoring");
        }
        result
    }

    fn read_usize(&self, name: &str, min: usize, max: usize) -> Option<usize> {
        let val = (self.lookup)(name)?;
        let result = parse_usize_range(&val, min, max);
        if result.is_none() {
            warn!(key = name, value = %val, "invalid usize env var, ignoring");
        }
        result
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
