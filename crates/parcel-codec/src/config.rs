//! Loading [`CodecConfig`] from `~/.parcel/config.toml`.
//!
//! A config file may list other TOML files under `include`; they are merged
//! first, in order, and the including file overrides them. Include paths must
//! be relative and stay inside the including file's directory.

use parcel_types::config::CodecConfig;
use parcel_types::error::{ParcelError, ParcelResult};
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use tracing::{info, warn};

/// Maximum include nesting depth.
const MAX_INCLUDE_DEPTH: u32 = 8;

/// Load codec configuration, falling back to defaults on any problem.
///
/// `None` reads [`default_config_path`]. A missing file is not an error.
pub fn load_config(path: Option<&Path>) -> CodecConfig {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        info!(path = %path.display(), "No config file, using defaults");
        return CodecConfig::default();
    }
    match read_config(&path) {
        Ok(config) => {
            info!(path = %path.display(), "Loaded configuration");
            config
        }
        Err(e) => {
            warn!(error = %e, path = %path.display(), "Invalid config, using defaults");
            CodecConfig::default()
        }
    }
}

/// Read and deserialize a config file, resolving includes.
pub fn read_config(path: &Path) -> ParcelResult<CodecConfig> {
    let mut visited = HashSet::new();
    let merged = read_with_includes(path, &mut visited, 0).map_err(ParcelError::Config)?;
    merged.try_into::<CodecConfig>().map_err(|e| {
        ParcelError::Config(format!("config does not match the expected layout: {e}"))
    })
}

fn read_with_includes(
    path: &Path,
    visited: &mut HashSet<PathBuf>,
    depth: u32,
) -> Result<toml::Value, String> {
    if depth > MAX_INCLUDE_DEPTH {
        return Err(format!("includes nest deeper than {MAX_INCLUDE_DEPTH} levels"));
    }
    let canonical =
        std::fs::canonicalize(path).map_err(|e| format!("cannot resolve {}: {e}", path.display()))?;
    if !visited.insert(canonical.clone()) {
        return Err(format!("circular include of {}", path.display()));
    }

    let text = std::fs::read_to_string(&canonical)
        .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
    let mut value: toml::Value =
        toml::from_str(&text).map_err(|e| format!("cannot parse {}: {e}", path.display()))?;

    let includes = take_includes(&mut value)?;
    if includes.is_empty() {
        return Ok(value);
    }

    let dir = canonical.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();
    let mut merged = toml::Value::Table(toml::map::Map::new());
    for include in &includes {
        let target = checked_include_path(&dir, include)?;
        info!(include = %include, "Loading config include");
        let included = read_with_includes(&target, visited, depth + 1)?;
        deep_merge_toml(&mut merged, &included);
    }
    deep_merge_toml(&mut merged, &value);
    Ok(merged)
}

/// Remove and return the `include` list of a config table.
fn take_includes(value: &mut toml::Value) -> Result<Vec<String>, String> {
    let toml::Value::Table(table) = value else {
        return Ok(Vec::new());
    };
    match table.remove("include") {
        None => Ok(Vec::new()),
        Some(toml::Value::Array(items)) => items
            .into_iter()
            .map(|item| match item {
                toml::Value::String(s) => Ok(s),
                other => Err(format!("include entries must be strings, found {other}")),
            })
            .collect(),
        Some(other) => Err(format!("'include' must be an array, found {other}")),
    }
}

/// Validate an include path and resolve it inside `dir`.
fn checked_include_path(dir: &Path, include: &str) -> Result<PathBuf, String> {
    let relative = Path::new(include);
    if relative.is_absolute() {
        return Err(format!("include '{include}' must be a relative path"));
    }
    if relative.components().any(|c| matches!(c, Component::ParentDir)) {
        return Err(format!("include '{include}' may not contain '..'"));
    }
    let target = std::fs::canonicalize(dir.join(relative))
        .map_err(|e| format!("include '{include}' cannot be resolved: {e}"))?;
    if !target.starts_with(dir) {
        return Err(format!("include '{include}' escapes {}", dir.display()));
    }
    Ok(target)
}

/// Deep-merge `overlay` into `base`. Tables merge key by key; any other value
/// in `overlay` replaces the one in `base`.
pub fn deep_merge_toml(base: &mut toml::Value, overlay: &toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base), toml::Value::Table(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(key) {
                    Some(existing) => deep_merge_toml(existing, value),
                    None => {
                        base.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, overlay) => *base = overlay.clone(),
    }
}

/// Directory holding Parcel's configuration.
pub fn parcel_home() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".parcel")
}

/// Default config file path.
pub fn default_config_path() -> PathBuf {
    parcel_home().join("config.toml")
}
