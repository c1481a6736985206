use crate::cpu_freq::CPUFREQ_BASE_PATH;
use crate::hwmon_devices::HWMON_BASE_PATH;
use crate::registry::{builtin_platforms, PlatformProfile};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct PathsConfig {
    pub hwmon_root: PathBuf,
    pub proc_root: PathBuf,
    pub cpufreq_root: PathBuf,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct StatsConfig {
    /// Utilization sample window.
    pub interval_ms: u64,
    /// Upper bound on a single hwmon channel read.
    pub read_timeout_ms: u64,
    pub paths: PathsConfig,
    pub platforms: Vec<PlatformProfile>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            hwmon_root: PathBuf::from(HWMON_BASE_PATH),
            proc_root: PathBuf::from("/proc"),
            cpufreq_root: PathBuf::from(CPUFREQ_BASE_PATH),
        }
    }
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            read_timeout_ms: 500,
            paths: PathsConfig::default(),
            platforms: builtin_platforms(),
        }
    }
}

impl StatsConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(&path)
            .map_err(|e| ConfigError::FileRead(path.as_ref().to_path_buf(), e))?;

        let config: StatsConfig = toml::from_str(&content)?;
        config.validate()?;

        Ok(config)
    }

    pub fn load_with_fallback() -> Self {
        let config_paths = [
            "/etc/platformstats/config.toml",
            "/etc/platformstats.toml",
            "./platformstats.toml",
        ];

        for path in &config_paths {
            if Path::new(path).exists() {
                match Self::load_from_file(path) {
                    Ok(config) => {
                        info!("Loaded configuration from: {}", path);
                        return config;
                    }
                    Err(e) => {
                        warn!("Failed to load config from {}: {}", path, e);
                    }
                }
            }
        }

        info!("No configuration file found, using defaults");
        Self::default()
    }

    pub fn save_example<P: AsRef<Path>>(path: P) -> Result<(), ConfigError> {
        let default_config = Self::default();
        let toml_content = toml::to_string_pretty(&default_config)?;

        fs::write(&path, toml_content)
            .map_err(|e| ConfigError::FileWrite(path.as_ref().to_path_buf(), e))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_ms == 0 {
            return Err(ConfigError::Invalid("interval_ms must be greater than 0".to_string()));
        }
        for platform in &self.platforms {
            for sensor in &platform.sensors {
                if sensor.scale <= 0 {
                    return Err(ConfigError::Invalid(format!(
                        "{}: {} has scale {}, must be positive",
                        platform.name,
                        sensor.identity(),
                        sensor.scale
                    )));
                }
                if sensor.lookup().is_none() {
                    return Err(ConfigError::Invalid(format!(
                        "{}: {}@{} needs a channel or a label",
                        platform.name, sensor.device, sensor.address
                    )));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {}", .0.display(), .1)]
    FileRead(PathBuf, #[source] std::io::Error),
    #[error("Failed to write config file {}: {}", .0.display(), .1)]
    FileWrite(PathBuf, #[source] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}
