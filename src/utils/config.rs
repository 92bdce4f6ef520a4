use config::{Config as ConfigLib, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::utils::error::{LockerError, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub system: SystemConfig,
    pub recognition: RecognitionConfig,
    pub lockers: LockerConfig,
    pub actuator: ActuatorConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SystemConfig {
    pub admin_name: String,
    pub data_dir: PathBuf,
    pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecognitionConfig {
    /// Maximum embedding distance for a candidate to count as a match.
    pub threshold: f32,
    pub scan_interval_ms: u64,
    pub reopen_cooldown_secs: u64,
    /// Downscale factor applied to frames handed to the matcher.
    pub downscale: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LockerConfig {
    pub total: u32,
    /// Actuator channel pool, scanned in this order during allocation.
    pub channels: Vec<u8>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActuatorConfig {
    pub auto_close_secs: u64,
    /// "logging" or "sysfs".
    pub driver: DriverKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    Logging,
    Sysfs,
}

impl Config {
    pub fn new() -> Result<Self> {
        let config = ConfigLib::builder()
            // Start with default values
            .set_default("system.admin_name", "admin")?
            .set_default("system.data_dir", "data")?
            .set_default("system.log_level", "info")?
            .set_default("recognition.threshold", 0.45)?
            .set_default("recognition.scan_interval_ms", 300)?
            .set_default("recognition.reopen_cooldown_secs", 20)?
            .set_default("recognition.downscale", 0.5)?
            .set_default("lockers.total", 100)?
            .set_default("lockers.channels", vec![3i64, 4])?
            .set_default("actuator.auto_close_secs", 5)?
            .set_default("actuator.driver", "logging")?
            // Load from config file
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // Override with environment variables (e.g., FACELOCK_SYSTEM_ADMIN_NAME)
            .add_source(Environment::with_prefix("FACELOCK").separator("_"))
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.system.admin_name.trim().is_empty() {
            return Err(LockerError::Config("admin_name must be set".into()));
        }
        if !(self.recognition.threshold > 0.0) {
            return Err(LockerError::Config("threshold must be positive".into()));
        }
        if self.recognition.scan_interval_ms == 0 {
            return Err(LockerError::Config(
                "scan_interval_ms must be greater than 0".into(),
            ));
        }
        if !(self.recognition.downscale > 0.0 && self.recognition.downscale <= 1.0) {
            return Err(LockerError::Config("downscale must be in (0, 1]".into()));
        }
        if self.lockers.total == 0 {
            return Err(LockerError::Config("lockers.total must be greater than 0".into()));
        }
        if self.lockers.channels.is_empty() {
            return Err(LockerError::Config("at least one actuator channel is required".into()));
        }
        if self.actuator.auto_close_secs == 0 {
            return Err(LockerError::Config(
                "auto_close_secs must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// Administrator name in its canonical (trimmed, lowercased) form.
    pub fn admin_name(&self) -> String {
        self.system.admin_name.trim().to_lowercase()
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.recognition.scan_interval_ms)
    }

    pub fn reopen_cooldown(&self) -> Duration {
        Duration::from_secs(self.recognition.reopen_cooldown_secs)
    }

    pub fn auto_close(&self) -> Duration {
        Duration::from_secs(self.actuator.auto_close_secs)
    }

    /// Baseline configuration used by tests and benches; callers override
    /// individual fields as needed.
    pub fn for_tests(data_dir: PathBuf) -> Self {
        Self {
            system: SystemConfig {
                admin_name: "tim".into(),
                data_dir,
                log_level: "debug".into(),
            },
            recognition: RecognitionConfig {
                threshold: 0.45,
                scan_interval_ms: 300,
                reopen_cooldown_secs: 20,
                downscale: 0.5,
            },
            lockers: LockerConfig {
                total: 100,
                channels: vec![3, 4],
            },
            actuator: ActuatorConfig {
                auto_close_secs: 5,
                driver: DriverKind::Logging,
            },
        }
    }
}

impl From<ConfigError> for LockerError {
    fn from(error: ConfigError) -> Self {
        LockerError::Config(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_rejects_empty_channel_pool() {
        let mut config = Config::for_tests(PathBuf::from("/tmp"));
        config.lockers.channels.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn admin_name_is_normalized() {
        let mut config = Config::for_tests(PathBuf::from("/tmp"));
        config.system.admin_name = "  Tim ".into();
        assert_eq!(config.admin_name(), "tim");
    }
}
