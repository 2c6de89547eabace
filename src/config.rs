//! Settings file, environment overrides and on-disk locations.
//!
//! | Variable                  | Default                | Description                      |
//! |---------------------------|------------------------|----------------------------------|
//! | `SLIVI_DATA_DIR`          | platform data dir      | store + settings directory       |
//! | `SLIVI_LOG`               | `info`                 | tracing filter                   |
//! | `SLIVI_PUSH_ENABLED`      | `true`                 | deliver push via Expo            |
//! | `SLIVI_PUSH_ENDPOINT`     | Expo push URL          |                                  |
//! | `SLIVI_WEATHER_ENABLED`   | `true`                 | live weather lookups             |
//! | `SLIVI_WEATHER_ENDPOINT`  | Open-Meteo forecast URL|                                  |
//! | `SLIVI_HTTP_TIMEOUT_SECS` | `10`                   | outbound HTTP timeout            |
//! | `SLIVI_FEED_LIMIT`        | `20`                   | max notifications per feed page  |

use crate::push::EXPO_PUSH_URL;
use crate::storage::write_json_atomic;
use crate::weather::OPEN_METEO_URL;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub log_level: String,
    pub push_enabled: bool,
    pub push_endpoint: String,
    pub weather_enabled: bool,
    pub weather_endpoint: String,
    pub http_timeout_secs: u64,
    pub feed_limit: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            push_enabled: true,
            push_endpoint: EXPO_PUSH_URL.to_string(),
            weather_enabled: true,
            weather_endpoint: OPEN_METEO_URL.to_string(),
            http_timeout_secs: 10,
            feed_limit: 20,
        }
    }
}

impl Settings {
    /// Environment wins over the settings file.
    pub fn with_env(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(v) = var("SLIVI_LOG") {
            self.log_level = v;
        }
        if let Some(v) = var("SLIVI_PUSH_ENABLED").and_then(|v| parse_bool(&v)) {
            self.push_enabled = v;
        }
        if let Some(v) = var("SLIVI_PUSH_ENDPOINT") {
            self.push_endpoint = v;
        }
        if let Some(v) = var("SLIVI_WEATHER_ENABLED").and_then(|v| parse_bool(&v)) {
            self.weather_enabled = v;
        }
        if let Some(v) = var("SLIVI_WEATHER_ENDPOINT") {
            self.weather_endpoint = v;
        }
        if let Some(v) = var("SLIVI_HTTP_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.http_timeout_secs = v;
        }
        if let Some(v) = var("SLIVI_FEED_LIMIT").and_then(|v| v.parse().ok()) {
            self.feed_limit = v;
        }
        self
    }
}

fn parse_bool(v: &str) -> Option<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

pub struct Paths {
    pub data_dir: PathBuf,
    pub store_path: PathBuf,
    pub settings_path: PathBuf,
}

/// `explicit` (the `--data-dir` flag) beats `SLIVI_DATA_DIR`, which beats
/// the platform default.
pub fn project_paths(explicit: Option<PathBuf>) -> Result<Paths> {
    let dir = match explicit.or_else(|| std::env::var_os("SLIVI_DATA_DIR").map(PathBuf::from)) {
        Some(dir) => dir,
        None => ProjectDirs::from("com", "slivi", "Slivi")
            .context("could not resolve project directories")?
            .data_local_dir()
            .to_path_buf(),
    };
    fs::create_dir_all(&dir).with_context(|| format!("could not create {}", dir.display()))?;
    Ok(Paths {
        store_path: dir.join("slivi.json"),
        settings_path: dir.join("settings.json"),
        data_dir: dir,
    })
}

/// Missing or unparseable settings fall back to defaults.
pub fn load_settings(path: &Path) -> Settings {
    fs::read_to_string(path)
        .ok()
        .and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or_default()
}

pub fn save_settings_atomic(path: &Path, s: &Settings) -> Result<()> {
    write_json_atomic(path, s).with_context(|| format!("could not write {}", path.display()))
}
