//! Configuration loading for meshbridge services
//!
//! Provides utilities for locating and loading configuration files from the
//! shared meshbridge config directory (~/.config/meshbridge/), plus small
//! helpers for reading settings from the process environment.
//!
//! Call [`init`] at service startup to bootstrap the config directory.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Name of the config directory under the platform config root
const APP_DIR: &str = "meshbridge";

/// Initialize the meshbridge config directory.
///
/// Creates ~/.config/meshbridge/ if it doesn't exist.
pub fn init() -> Result<PathBuf> {
    ensure_config_dir()
}

/// Get the meshbridge config directory (~/.config/meshbridge/)
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join(APP_DIR))
}

/// Get the path to a config file within the meshbridge config directory
pub fn config_path(filename: &str) -> Option<PathBuf> {
    config_dir().map(|p| p.join(filename))
}

/// Load and parse a JSON config file from the meshbridge config directory
pub fn load_json<T: DeserializeOwned>(filename: &str) -> Result<T> {
    let path = config_path(filename).context("Could not determine config directory")?;
    load_json_file(&path)
}

/// Load and parse a JSON file from an arbitrary path
pub fn load_json_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Check if a config file exists in the meshbridge config directory
pub fn config_exists(filename: &str) -> bool {
    config_path(filename).is_some_and(|p| p.exists())
}

/// Ensure the meshbridge config directory exists
pub fn ensure_config_dir() -> Result<PathBuf> {
    let dir = config_dir().context("Could not determine config directory")?;
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;
    Ok(dir)
}

/// Save a value as pretty-printed JSON to an arbitrary path
pub fn save_json_file<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(value)?;
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write config file: {}", path.display()))
}

/// Save a value as JSON to a config file in the meshbridge config directory
pub fn save_json<T: serde::Serialize>(filename: &str, value: &T) -> Result<()> {
    let dir = ensure_config_dir()?;
    save_json_file(&dir.join(filename), value)
}

/// Read a required environment variable, treating empty values as unset
pub fn require_env(name: &str) -> Result<String> {
    optional_env(name).with_context(|| format!("{} environment variable not set", name))
}

/// Read an optional environment variable, treating empty values as unset
pub fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Read and parse an optional environment variable
pub fn parse_env<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional_env(name) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("Invalid value for {}: {}", name, e)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        mailbox: String,
        interval: u64,
    }

    #[test]
    fn test_config_dir() {
        let dir = config_dir();
        assert!(dir.is_some());
        assert!(dir.unwrap().ends_with("meshbridge"));
    }

    #[test]
    fn test_config_path() {
        let path = config_path("retriever.json");
        assert!(path.is_some());
        assert!(path.unwrap().ends_with("meshbridge/retriever.json"));
    }

    #[test]
    fn test_save_and_load_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.json");
        let value = Sample {
            mailbox: "X26ABC1".to_string(),
            interval: 300,
        };

        save_json_file(&path, &value).unwrap();
        let loaded: Sample = load_json_file(&path).unwrap();

        assert_eq!(loaded, value);
    }

    #[test]
    fn test_load_json_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_json_file::<Sample>(&dir.path().join("missing.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_parse_env_invalid() {
        // SAFETY: the variable name is unique to this test
        unsafe { std::env::set_var("MESHBRIDGE_TEST_PARSE_ENV", "not-a-number") };
        assert!(parse_env::<u64>("MESHBRIDGE_TEST_PARSE_ENV").is_err());
        unsafe { std::env::remove_var("MESHBRIDGE_TEST_PARSE_ENV") };
    }

    #[test]
    fn test_optional_env_empty_is_unset() {
        unsafe { std::env::set_var("MESHBRIDGE_TEST_EMPTY_ENV", "  ") };
        assert!(optional_env("MESHBRIDGE_TEST_EMPTY_ENV").is_none());
        unsafe { std::env::remove_var("MESHBRIDGE_TEST_EMPTY_ENV") };
    }
}
