//! Configuration management module.
//!
//! Handles loading and saving the converter configuration from a JSON file.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::detector::DEFAULT_SAMPLE_SIZE;

const CONFIG_FILE_NAME: &str = "gbk2utf8_config.json";

/// Text and code extensions scanned when no override is given.
pub static DEFAULT_EXTENSIONS: Lazy<Vec<String>> = Lazy::new(|| {
    [
        ".txt", ".log", ".csv", ".json", ".xml", ".html", ".htm", ".css", ".js", ".py", ".java",
        ".c", ".cpp", ".h", ".hpp", ".cs", ".php", ".rb", ".go", ".rs", ".swift", ".kt", ".kts",
        ".sql", ".md", ".rst", ".yaml", ".yml", ".ini", ".cfg", ".toml", ".sh", ".bat", ".ps1",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
});

/// Errors raised before any file is touched.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write config '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("not a directory: {0}")]
    InvalidRoot(PathBuf),
}

/// Converter configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    /// Detected labels that get converted. Other labels are skipped.
    #[serde(default = "default_supported_encodings")]
    pub supported_encodings: Vec<String>,
    #[serde(default = "default_sample_size")]
    pub sample_size: usize,
    #[serde(default = "default_jobs")]
    pub jobs: usize,
}

fn default_extensions() -> Vec<String> {
    DEFAULT_EXTENSIONS.to_vec()
}

fn default_supported_encodings() -> Vec<String> {
    vec!["gb2312".to_string(), "gbk".to_string()]
}

fn default_sample_size() -> usize {
    DEFAULT_SAMPLE_SIZE
}

fn default_jobs() -> usize {
    1
}

impl Default for Config {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            supported_encodings: default_supported_encodings(),
            sample_size: default_sample_size(),
            jobs: default_jobs(),
        }
    }
}

impl Config {
    /// Replace the allow-list. Entries may be comma-separated and may omit
    /// the leading dot.
    pub fn set_extensions<I, S>(&mut self, raw: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions = raw
            .into_iter()
            .flat_map(|item| {
                item.as_ref()
                    .split(',')
                    .filter_map(normalize_extension)
                    .collect::<Vec<_>>()
            })
            .collect();
    }

    pub fn extension_set(&self) -> HashSet<String> {
        self.extensions.iter().filter_map(|e| normalize_extension(e)).collect()
    }

    /// Fill empty or zero fields with defaults.
    fn apply_defaults(&mut self) {
        if self.extensions.is_empty() {
            self.extensions = default_extensions();
        }
        if self.supported_encodings.is_empty() {
            self.supported_encodings = default_supported_encodings();
        }
        if self.sample_size == 0 {
            self.sample_size = default_sample_size();
        }
        if self.jobs == 0 {
            self.jobs = default_jobs();
        }
    }
}

/// `TXT` and `.txt` both become `.txt`; blanks are dropped.
fn normalize_extension(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_start_matches('.');
    if trimmed.is_empty() {
        None
    } else {
        Some(format!(".{}", trimmed.to_lowercase()))
    }
}

/// Configuration manager for loading/saving config.
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Config file next to the executable.
    pub fn new() -> Self {
        let config_path = Self::get_exe_directory().join(CONFIG_FILE_NAME);
        Self { config_path }
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: path.into(),
        }
    }

    /// Get the directory containing the executable.
    fn get_exe_directory() -> PathBuf {
        std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Get the config file path.
    pub fn get_config_file_path(&self) -> &Path {
        &self.config_path
    }

    /// Load configuration; a missing file yields defaults.
    pub fn load(&self) -> Result<Config, ConfigError> {
        if !self.config_path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(&self.config_path).map_err(|source| ConfigError::Read {
            path: self.config_path.clone(),
            source,
        })?;
        let mut config: Config =
            serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
                path: self.config_path.clone(),
                source,
            })?;

        config.apply_defaults();
        Ok(config)
    }

    /// Save configuration to file.
    pub fn save(&self, config: &Config) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(config).map_err(|source| ConfigError::Parse {
            path: self.config_path.clone(),
            source,
        })?;
        fs::write(&self.config_path, json).map_err(|source| ConfigError::Write {
            path: self.config_path.clone(),
            source,
        })
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.extensions.len(), 34);
        assert_eq!(config.supported_encodings, vec!["gb2312", "gbk"]);
        assert_eq!(config.sample_size, 4096);
        assert_eq!(config.jobs, 1);
    }

    #[test]
    fn test_set_extensions_normalizes() {
        let mut config = Config::default();
        config.set_extensions(["TXT, .Md", "rs", " , "]);
        assert_eq!(config.extensions, vec![".txt", ".md", ".rs"]);
        assert!(config.extension_set().contains(".md"));
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ConfigManager::with_path(dir.path().join("none.json"));
        assert_eq!(manager.load().unwrap(), Config::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.json");
        fs::write(&path, r#"{"extensions": [], "jobs": 4}"#).unwrap();

        let config = ConfigManager::with_path(&path).load().unwrap();
        assert_eq!(config.extensions, *DEFAULT_EXTENSIONS);
        assert_eq!(config.jobs, 4);
        assert_eq!(config.sample_size, 4096);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "{ not json").unwrap();

        let err = ConfigManager::with_path(&path).load().unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_config_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ConfigManager::with_path(dir.path().join("cfg.json"));
        let mut config = Config::default();
        config.set_extensions(["txt"]);
        config.jobs = 2;

        manager.save(&config).unwrap();
        assert_eq!(manager.load().unwrap(), config);
        assert!(manager.get_config_file_path().ends_with("cfg.json"));
    }
}
