// src/hardware/logging.rs
use tracing::info;

use super::ActuatorDriver;
use crate::utils::error::Result;

/// No-op driver for environments without lock hardware. Level changes are
/// logged so the rest of the system can be exercised end to end.
pub struct LoggingDriver;

impl LoggingDriver {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LoggingDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl ActuatorDriver for LoggingDriver {
    fn set_level(&self, channel: u8, high: bool) -> Result<()> {
        info!(channel, level = if high { "HIGH" } else { "LOW" }, "actuator");
        Ok(())
    }
}
