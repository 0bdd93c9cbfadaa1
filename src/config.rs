// ABOUTME: Optional TOML settings file for merge jobs
// ABOUTME: Supplies defaults for the sqlite3 binary, output directory, and intermediate retention

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

/// Environment variable naming the sqlite3 binary when neither CLI nor file set it.
pub const SQLITE3_ENV: &str = "MERGE_SQLITE3";

/// Settings read from a `merge.toml`-style file. Every key is optional.
///
/// ```toml
/// sqlite3 = "/usr/local/bin/sqlite3"
/// output_dir = "/var/lib/merges"
/// keep_intermediate = true
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub sqlite3: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub keep_intermediate: Option<bool>,
}

impl Settings {
    /// Binary to run: explicit value, then this file, then `MERGE_SQLITE3`, then `sqlite3`.
    pub fn sqlite3_or(&self, explicit: Option<String>) -> String {
        explicit
            .or_else(|| self.sqlite3.clone())
            .or_else(|| std::env::var(SQLITE3_ENV).ok())
            .unwrap_or_else(|| "sqlite3".to_string())
    }

    pub fn output_dir_or(&self, explicit: Option<PathBuf>) -> PathBuf {
        explicit
            .or_else(|| self.output_dir.clone())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// The CLI flag can only turn retention on; the file decides otherwise.
    pub fn keep_intermediate_or(&self, flag: bool) -> bool {
        flag || self.keep_intermediate.unwrap_or(false)
    }
}

pub fn parse_settings(contents: &str) -> Result<Settings> {
    toml::from_str(contents).context("Failed to parse merge settings")
}

pub fn load_settings_from_file(path: &str) -> Result<Settings> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read settings file {}", path))?;
    parse_settings(&contents).with_context(|| format!("Invalid settings file {}", path))
}
