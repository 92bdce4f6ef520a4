// src/core/lockers/registry.rs
use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::core::identity::types::normalize_name;
use crate::utils::error::{LockerError, Result};

/// Binding of an identity to a physical locker number and actuator channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockerAssignment {
    pub name: String,
    pub locker: u32,
    pub channel: u8,
}

/// Allocation registry over a fixed pool of locker numbers and actuator
/// channels. Holds no locks of its own; the owner synchronizes access.
#[derive(Debug)]
pub struct LockerRegistry {
    assignments: Vec<LockerAssignment>,
    total_lockers: u32,
    channel_pool: Vec<u8>,
}

impl LockerRegistry {
    pub fn new(total_lockers: u32, channel_pool: Vec<u8>) -> Self {
        Self {
            assignments: Vec::new(),
            total_lockers,
            channel_pool,
        }
    }

    pub fn with_assignments(
        total_lockers: u32,
        channel_pool: Vec<u8>,
        assignments: Vec<LockerAssignment>,
    ) -> Self {
        Self {
            assignments,
            total_lockers,
            channel_pool,
        }
    }

    /// Assigns the first free (locker, channel) pair: locker numbers are
    /// scanned ascending from 1, and for each number the channel pool is
    /// scanned in its configured order. Deterministic for a given state.
    pub fn allocate(&mut self, name: &str) -> Result<LockerAssignment> {
        let name = normalize_name(name);
        if name.is_empty() {
            return Err(LockerError::InvalidName);
        }
        if self.assignments.iter().any(|a| a.name == name) {
            return Err(LockerError::AlreadyAssigned(name));
        }

        let used_lockers: HashSet<u32> = self.assignments.iter().map(|a| a.locker).collect();
        let used_channels: HashSet<u8> = self.assignments.iter().map(|a| a.channel).collect();

        for locker in 1..=self.total_lockers {
            if used_lockers.contains(&locker) {
                continue;
            }
            for &channel in &self.channel_pool {
                if used_channels.contains(&channel) {
                    continue;
                }
                let assignment = LockerAssignment {
                    name: name.clone(),
                    locker,
                    channel,
                };
                self.assignments.push(assignment.clone());
                info!(%name, locker, channel, "allocated locker");
                return Ok(assignment);
            }
            // No channel left for this locker number means the pool is
            // exhausted outright; later numbers cannot do better.
            return Err(LockerError::ResourceExhausted);
        }
        Err(LockerError::ResourceExhausted)
    }

    pub fn release(&mut self, name: &str) -> Result<()> {
        let name = normalize_name(name);
        let index = self
            .assignments
            .iter()
            .position(|a| a.name == name)
            .ok_or_else(|| LockerError::NotFound(name.clone()))?;
        let assignment = self.assignments.remove(index);
        info!(%name, locker = assignment.locker, "released locker");
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&LockerAssignment> {
        let name = normalize_name(name);
        self.assignments.iter().find(|a| a.name == name)
    }

    pub fn assignments(&self) -> &[LockerAssignment] {
        &self.assignments
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }
}
