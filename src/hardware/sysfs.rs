// src/hardware/sysfs.rs
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use std::collections::HashSet;
use tracing::debug;

use super::ActuatorDriver;
use crate::utils::error::{LockerError, Result};

const SYSFS_GPIO_ROOT: &str = "/sys/class/gpio";

/// Drives lock channels through the Linux sysfs GPIO interface. Channels are
/// exported and set to output direction on first use.
#[derive(Debug)]
pub struct SysfsGpio {
    root: PathBuf,
    exported: Mutex<HashSet<u8>>,
}

impl SysfsGpio {
    pub fn new() -> Result<Self> {
        Self::with_root(SYSFS_GPIO_ROOT)
    }

    pub fn with_root(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.exists() {
            return Err(LockerError::Hardware(format!(
                "sysfs gpio root {} not present",
                root.display()
            )));
        }
        Ok(Self {
            root,
            exported: Mutex::new(HashSet::new()),
        })
    }

    fn ensure_exported(&self, channel: u8) -> Result<()> {
        let mut exported = self.exported.lock();
        if exported.contains(&channel) {
            return Ok(());
        }

        let pin_dir = self.root.join(format!("gpio{channel}"));
        if !pin_dir.exists() {
            write_sysfs(&self.root.join("export"), &channel.to_string())?;
        }
        write_sysfs(&pin_dir.join("direction"), "out")?;
        debug!(channel, "exported gpio channel");
        exported.insert(channel);
        Ok(())
    }
}

impl ActuatorDriver for SysfsGpio {
    fn set_level(&self, channel: u8, high: bool) -> Result<()> {
        self.ensure_exported(channel)?;
        let value_path = self.root.join(format!("gpio{channel}/value"));
        write_sysfs(&value_path, if high { "1" } else { "0" })
    }
}

fn write_sysfs(path: &Path, value: &str) -> Result<()> {
    let mut file = fs::OpenOptions::new()
        .write(true)
        .open(path)
        .map_err(|e| LockerError::Hardware(format!("open {}: {e}", path.display())))?;
    file.write_all(value.as_bytes())
        .map_err(|e| LockerError::Hardware(format!("write {}: {e}", path.display())))
}
