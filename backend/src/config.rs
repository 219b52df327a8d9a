//! # Application Configuration
//!
//! YAML file, by default `config.yaml` in the data directory:
//!
//! ```yaml
//! data_directory: "/home/maestro/Documents/Attendance Tracker"
//! bind_address: "127.0.0.1:3000"
//! cors_origin: "http://localhost:8080"
//! remote:
//!   enabled: true
//!   directory: "/mnt/iglesia/asistencia"
//!   timeout_secs: 10
//!   poll_interval_secs: 5
//! attendance:
//!   sunday_only: true
//!   retention_years: 2
//! ```
//!
//! A missing file is written with defaults. Environment variables override
//! the file: `ATTENDANCE_DATA_DIR`, `ATTENDANCE_BIND`, `ATTENDANCE_SUNDAY_ONLY`
//! and `ATTENDANCE_REMOTE_DIR` (which also enables the remote store).
//! `ATTENDANCE_CONFIG` points at a different config file.

use anyhow::{anyhow, Context, Result};
use log::info;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE_NAME: &str = "config.yaml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub enabled: bool,
    /// Root of the shared-directory document store
    pub directory: Option<PathBuf>,
    pub timeout_secs: u64,
    pub poll_interval_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            directory: None,
            timeout_secs: 10,
            poll_interval_secs: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttendanceConfig {
    /// Only accept attendance on Sundays (Bogota calendar)
    pub sunday_only: bool,
    /// Years kept by the retention trim, current year included
    pub retention_years: u32,
}

impl Default for AttendanceConfig {
    fn default() -> Self {
        Self {
            sunday_only: true,
            retention_years: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub data_directory: PathBuf,
    pub bind_address: String,
    pub cors_origin: String,
    pub remote: RemoteConfig,
    pub attendance: AttendanceConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_directory: default_data_directory(),
            bind_address: "127.0.0.1:3000".to_string(),
            cors_origin: "http://localhost:8080".to_string(),
            remote: RemoteConfig::default(),
            attendance: AttendanceConfig::default(),
        }
    }
}

/// `~/Documents/Attendance Tracker`, falling back to the home directory
pub fn default_data_directory() -> PathBuf {
    dirs::document_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Attendance Tracker")
}

impl AppConfig {
    /// Where the config file is looked up
    pub fn config_path() -> PathBuf {
        if let Ok(path) = env::var("ATTENDANCE_CONFIG") {
            return PathBuf::from(path);
        }
        let data_directory = env::var("ATTENDANCE_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_data_directory());
        data_directory.join(CONFIG_FILE_NAME)
    }

    /// Load from the default location, with environment overrides applied
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path())?;
        config.apply_env_vars();
        config.validate()?;
        Ok(config)
    }

    /// Read `path`, writing a default file first if it does not exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            let config = Self::default();
            config.save_to(path)?;
            info!("Created default configuration at {}", path.display());
            return Ok(config);
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: AppConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_yaml::to_string(self)?;

        // Atomic write: temp file, then rename
        let temp_path = path.with_extension("yaml.tmp");
        fs::write(&temp_path, content)?;
        fs::rename(&temp_path, path)?;
        Ok(())
    }

    pub fn apply_env_vars(&mut self) {
        self.apply_overrides(|name| env::var(name).ok());
    }

    /// Apply overrides from any variable source
    pub fn apply_overrides<F: Fn(&str) -> Option<String>>(&mut self, lookup: F) {
        if let Some(dir) = lookup("ATTENDANCE_DATA_DIR") {
            self.data_directory = PathBuf::from(dir);
        }

        if let Some(bind) = lookup("ATTENDANCE_BIND") {
            self.bind_address = bind;
        }

        if let Some(sunday_only) = lookup("ATTENDANCE_SUNDAY_ONLY") {
            if let Ok(value) = sunday_only.trim().parse() {
                self.attendance.sunday_only = value;
            }
        }

        if let Some(dir) = lookup("ATTENDANCE_REMOTE_DIR") {
            self.remote.directory = Some(PathBuf::from(dir));
            self.remote.enabled = true;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.attendance.retention_years == 0 {
            return Err(anyhow!("attendance.retention_years must be at least 1"));
        }
        if self.remote.timeout_secs == 0 {
            return Err(anyhow!("remote.timeout_secs must be greater than zero"));
        }
        if self.remote.enabled && self.remote.directory.is_none() {
            return Err(anyhow!("remote.enabled requires remote.directory"));
        }
        Ok(())
    }

    pub fn remote_timeout(&self) -> Duration {
        Duration::from_secs(self.remote.timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.remote.poll_interval_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_created_with_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join(CONFIG_FILE_NAME);

        let config = AppConfig::load_from(&path).unwrap();
        assert!(path.exists());
        assert!(config.attendance.sunday_only);
        assert_eq!(config.attendance.retention_years, 2);
        assert!(!config.remote.enabled);

        let reloaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(reloaded, config);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "attendance:\n  sunday_only: false\nremote:\n  timeout_secs: 3\n").unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert!(!config.attendance.sunday_only);
        assert_eq!(config.attendance.retention_years, 2);
        assert_eq!(config.remote_timeout(), Duration::from_secs(3));
        assert_eq!(config.remote.poll_interval_secs, 5);
        assert_eq!(config.bind_address, "127.0.0.1:3000");
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("ATTENDANCE_BIND", "0.0.0.0:8000"),
            ("ATTENDANCE_SUNDAY_ONLY", "false"),
            ("ATTENDANCE_REMOTE_DIR", "/mnt/shared"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config.apply_overrides(|name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(config.bind_address, "0.0.0.0:8000");
        assert!(!config.attendance.sunday_only);
        assert!(config.remote.enabled);
        assert_eq!(config.remote.directory, Some(PathBuf::from("/mnt/shared")));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        let mut config = AppConfig::default();
        config.attendance.retention_years = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.remote.timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.remote.enabled = true;
        assert!(config.validate().is_err());
    }
}
