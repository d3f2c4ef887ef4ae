// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::Result;

/// Load a configuration file from a given path and return the raw `RawConfigFile`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation (state graph, budgets, regexes). Use [`load_and_validate`] for
/// that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file from path and validate it.
///
/// - Reads TOML.
/// - Applies defaults (handled by `serde` + `Default` impls).
/// - Checks the state graph, budgets, durations and process patterns.
/// - Resolves a relative `[registry].path` against the config file's
///   directory.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let path = path.as_ref();
    let raw_config = load_from_path(path)?;
    let mut config = ConfigFile::try_from(raw_config)?;
    if config.registry_path.is_relative() {
        config.registry_path = config_root_dir(path).join(&config.registry_path);
    }
    Ok(config)
}

/// Helper to resolve a default config path: `Daqctl.toml` in the current
/// working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Daqctl.toml")
}

/// Directory relative paths in the config are resolved against.
///
/// A bare file name (parent = "") means the current directory.
pub fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
