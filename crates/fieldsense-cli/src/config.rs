//! Configuration loading – reads the pipeline configuration from TOML.
//!
//! The file is looked up at, in order: the `--config` argument,
//! `$FIELDSENSE_CONFIG`, `~/.fieldsense/config.toml`. A missing file means
//! built-in defaults.

use std::fs;
use std::path::{Path, PathBuf};

use fieldsense_runtime::VisionFilterConfig;
use fieldsense_types::VisionError;
use tracing::warn;

pub const CONFIG_ENV: &str = "FIELDSENSE_CONFIG";

/// Resolve the config path from an explicit argument, the environment or the
/// home directory.
pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        return PathBuf::from(path);
    }
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".fieldsense").join("config.toml")
}

/// Load, apply environment overrides and validate.
pub fn load(path: &Path) -> Result<VisionFilterConfig, VisionError> {
    let mut config = load_from(path)?.unwrap_or_default();
    apply_env_overrides(&mut config);
    config.validate()?;
    Ok(config)
}

/// Parse the file at `path`; `None` when it does not exist.
pub(crate) fn load_from(path: &Path) -> Result<Option<VisionFilterConfig>, VisionError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| VisionError::Config(format!("failed to read {}: {e}", path.display())))?;
    let config = toml::from_str(&raw)
        .map_err(|e| VisionError::Config(format!("failed to parse {}: {e}", path.display())))?;
    Ok(Some(config))
}

/// Apply `FIELDSENSE_*` environment overrides. Unparsable values are
/// ignored.
///
/// | Variable | Field |
/// |---|---|
/// | `FIELDSENSE_PUBLISH_INTERVAL_MS` | `publish_interval_ms` |
/// | `FIELDSENSE_USE_THREADS` | `use_threads` |
/// | `FIELDSENSE_MODEL_IDENTIFICATION` | `model_identification` |
pub fn apply_env_overrides(config: &mut VisionFilterConfig) {
    if let Ok(v) = std::env::var("FIELDSENSE_PUBLISH_INTERVAL_MS") {
        match v.parse::<f64>() {
            Ok(ms) if ms.is_finite() && ms > 0.0 => config.publish_interval_ms = ms,
            _ => warn!(value = %v, "ignoring invalid FIELDSENSE_PUBLISH_INTERVAL_MS"),
        }
    }
    if let Ok(v) = std::env::var("FIELDSENSE_USE_THREADS")
        && let Some(flag) = parse_flag(&v)
    {
        config.use_threads = flag;
    }
    if let Ok(v) = std::env::var("FIELDSENSE_MODEL_IDENTIFICATION")
        && let Some(flag) = parse_flag(&v)
    {
        config.model_identification = flag;
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Write `config` as TOML, creating the parent directory if necessary.
pub fn save_to(config: &VisionFilterConfig, path: &Path) -> Result<(), VisionError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| VisionError::Config(format!("failed to create {}: {e}", parent.display())))?;
    }
    let raw = to_toml(config)?;
    fs::write(path, raw).map_err(|e| VisionError::Config(format!("failed to write {}: {e}", path.display())))
}

pub fn to_toml(config: &VisionFilterConfig) -> Result<String, VisionError> {
    toml::to_string_pretty(config).map_err(|e| VisionError::Config(format!("failed to serialize config: {e}")))
}
