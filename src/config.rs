use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::TrainSyncError;
use crate::logging::LogConfig;
use crate::reconcile::{ReconcileConfig, MAX_ACTIVITY_WINDOW_DAYS};

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Input and output locations
    #[serde(default)]
    pub paths: PathSettings,

    /// Reconciliation tuning
    #[serde(default)]
    pub reconcile: ReconcileConfig,

    /// Logging setup
    #[serde(default)]
    pub logging: LogConfig,
}

/// File locations used by a sync run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathSettings {
    /// Parsed plan entries (JSON array)
    pub plan: PathBuf,

    /// One activity cache per provider (JSON arrays)
    pub activities: Vec<PathBuf>,

    /// The persisted training log
    pub log: PathBuf,
}

impl Default for PathSettings {
    fn default() -> Self {
        PathSettings {
            plan: PathBuf::from("./data/planned.json"),
            activities: vec![PathBuf::from("./data/activities.json")],
            log: PathBuf::from("./data/training_log.json"),
        }
    }
}

impl SyncConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: SyncConfig =
            toml::from_str(&content).with_context(|| "Failed to parse TOML configuration")?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml_content = toml::to_string_pretty(self)
            .with_context(|| "Failed to serialize configuration to TOML")?;

        fs::write(&path, toml_content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }

    /// Get default configuration file path
    pub fn default_config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".trainsync")
            .join("config.toml")
    }

    /// Load configuration with fallback to defaults
    pub fn load_or_default() -> Self {
        let config_path = Self::default_config_path();

        if config_path.exists() {
            match Self::load_from_file(&config_path) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!(
                        "Failed to load config from {}: {}. Using defaults.",
                        config_path.display(),
                        e
                    );
                }
            }
        }

        Self::default()
    }

    /// Check settings that serde alone cannot
    pub fn validate(&self) -> std::result::Result<(), TrainSyncError> {
        let days = self.reconcile.activity_window_days;
        if !(0..=MAX_ACTIVITY_WINDOW_DAYS).contains(&days) {
            return Err(TrainSyncError::Configuration(format!(
                "activity_window_days must be between 0 and {}, got {}",
                MAX_ACTIVITY_WINDOW_DAYS, days
            )));
        }

        if self.paths.activities.is_empty() {
            return Err(TrainSyncError::Configuration(
                "at least one activity source path is required".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{LogFormat, LogLevel};
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = SyncConfig::default();
        assert_eq!(config.reconcile.activity_window_days, 14);
        assert_eq!(config.paths.activities.len(), 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: SyncConfig = toml::from_str(
            r#"
            [paths]
            plan = "plan.json"
            activities = ["garmin.json", "strava.json"]
            log = "log.json"

            [logging]
            level = "debug"
            format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.paths.activities.len(), 2);
        assert_eq!(config.reconcile.activity_window_days, 14);
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = SyncConfig::default();
        config.reconcile.activity_window_days = -1;
        assert!(config.validate().is_err());

        let mut config = SyncConfig::default();
        config.reconcile.activity_window_days = i64::MAX;
        assert!(config.validate().is_err());

        config.reconcile.activity_window_days = MAX_ACTIVITY_WINDOW_DAYS;
        assert!(config.validate().is_ok());

        let mut config = SyncConfig::default();
        config.paths.activities.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = SyncConfig::default();
        config.reconcile.activity_window_days = 7;
        config.save_to_file(&path).unwrap();

        let loaded = SyncConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }
}
