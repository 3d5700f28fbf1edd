//! Dropcraft Settings
//!
//! JSON config file for the `dropcraft` binary, created with defaults on
//! first use, plus the platform paths it lives under.

mod paths;

pub use paths::{default_config_dir, default_data_dir, expand_path};

use std::fs;
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use dropcraft_prover::DuplicatePolicy;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to read settings: {0}")]
    ReadError(String),
    #[error("Failed to write settings: {0}")]
    WriteError(String),
    #[error("Failed to parse settings: {0}")]
    ParseError(String),
    #[error("Failed to create directory: {0}")]
    CreateDirError(String),
}

pub type Result<T> = std::result::Result<T, SettingsError>;

/// A config value persisted as JSON at a fixed path.
pub struct Settings<T> {
    pub config: T,
    path: PathBuf,
}

impl<T: Serialize + DeserializeOwned + Default> Settings<T> {
    /// Load from `custom_path` (or the default settings file), writing
    /// defaults there first if the file does not exist.
    pub fn load_or_default(custom_path: Option<&Path>) -> Result<Self> {
        let path = match custom_path {
            Some(p) => expand_path(p),
            None => default_settings_path(),
        };

        if path.exists() {
            debug!("Loading settings from {}", path.display());
            let content =
                fs::read_to_string(&path).map_err(|e| SettingsError::ReadError(e.to_string()))?;
            let config: T = serde_json::from_str(&content)
                .map_err(|e| SettingsError::ParseError(e.to_string()))?;
            Ok(Self { config, path })
        } else {
            debug!("Creating default settings at {}", path.display());
            let settings = Self {
                config: T::default(),
                path,
            };
            settings.save()?;
            Ok(settings)
        }
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| SettingsError::CreateDirError(e.to_string()))?;
        }
        let content = serde_json::to_string_pretty(&self.config)
            .map_err(|e| SettingsError::WriteError(e.to_string()))?;
        fs::write(&self.path, content).map_err(|e| SettingsError::WriteError(e.to_string()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// `<config dir>/settings.json`
pub fn default_settings_path() -> PathBuf {
    default_config_dir().join("settings.json")
}

/// Batch job configuration. Command-line flags take precedence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DropcraftConfig {
    /// Where `build` writes artifacts; `~` is expanded
    pub output_dir: PathBuf,
    pub duplicate_policy: DuplicatePolicy,
    /// Per-identity proof directory, relative to `output_dir`
    pub proofs_dir: String,
    pub tree_file: String,
    pub root_file: String,
}

impl Default for DropcraftConfig {
    fn default() -> Self {
        Self {
            output_dir: default_data_dir().join("distributions"),
            duplicate_policy: DuplicatePolicy::Reject,
            proofs_dir: "proofs".to_string(),
            tree_file: "tree.json".to_string(),
            root_file: "root.txt".to_string(),
        }
    }
}

impl DropcraftConfig {
    /// `output_dir` with `~` expanded
    pub fn resolved_output_dir(&self) -> PathBuf {
        expand_path(&self.output_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_settings_created_with_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/settings.json");

        let settings: Settings<DropcraftConfig> = Settings::load_or_default(Some(&path)).unwrap();
        assert_eq!(settings.config, DropcraftConfig::default());
        assert!(path.exists());
        assert_eq!(settings.path(), path.as_path());
    }

    #[test]
    fn test_settings_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");

        let mut settings: Settings<DropcraftConfig> =
            Settings::load_or_default(Some(&path)).unwrap();
        settings.config.duplicate_policy = DuplicatePolicy::LastWins;
        settings.config.output_dir = PathBuf::from("/srv/drops");
        settings.save().unwrap();

        let loaded: Settings<DropcraftConfig> = Settings::load_or_default(Some(&path)).unwrap();
        assert_eq!(loaded.config.duplicate_policy, DuplicatePolicy::LastWins);
        assert_eq!(loaded.config.output_dir, PathBuf::from("/srv/drops"));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"duplicatePolicy":"last_wins"}"#).unwrap();

        let settings: Settings<DropcraftConfig> = Settings::load_or_default(Some(&path)).unwrap();
        assert_eq!(settings.config.duplicate_policy, DuplicatePolicy::LastWins);
        assert_eq!(settings.config.tree_file, "tree.json");
    }

    #[test]
    fn test_malformed_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();

        let result: Result<Settings<DropcraftConfig>> = Settings::load_or_default(Some(&path));
        assert!(matches!(result, Err(SettingsError::ParseError(_))));
    }

    #[test]
    fn test_output_dir_expansion() {
        let config = DropcraftConfig {
            output_dir: PathBuf::from("~/drops"),
            ..Default::default()
        };
        assert!(!config.resolved_output_dir().starts_with("~"));
    }
}
