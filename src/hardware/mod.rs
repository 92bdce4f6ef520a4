// src/hardware/mod.rs
mod logging;
mod sysfs;

pub use logging::LoggingDriver;
pub use sysfs::SysfsGpio;

use std::sync::Arc;

use crate::utils::config::{ActuatorConfig, DriverKind};
use crate::utils::error::Result;

/// Capability interface over the lock hardware: drive one addressable output
/// high (open) or low (closed). Implementations are synchronous and fast;
/// anything slower belongs behind its own queue, not here.
pub trait ActuatorDriver: Send + Sync {
    fn set_level(&self, channel: u8, high: bool) -> Result<()>;
}

/// Driver selection is a configuration decision, never an import-time
/// fallback.
pub fn driver_from_config(config: &ActuatorConfig) -> Result<Arc<dyn ActuatorDriver>> {
    Ok(match config.driver {
        DriverKind::Logging => Arc::new(LoggingDriver::new()),
        DriverKind::Sysfs => Arc::new(SysfsGpio::new()?),
    })
}
