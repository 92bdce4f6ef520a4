// src/storage/persist.rs
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{error, info, warn};

use super::types::{IdentityFile, LegacyIdentityFile, LockerFile, STORE_FORMAT_VERSION};
use crate::core::identity::types::{normalize_name, FaceTemplate};
use crate::core::lockers::LockerAssignment;
use crate::utils::error::{LockerError, Result};

const FACES_FILE: &str = "faces.json";
const LOCKERS_FILE: &str = "lockers.json";

/// Durable storage for the identity store and locker registry. Saves are
/// atomic (write temp, back up, rename); loads never fail startup, since a
/// missing or corrupt file yields an empty store.
pub struct PersistenceLayer {
    faces_path: PathBuf,
    lockers_path: PathBuf,
    /// Channel pool, needed to upgrade the legacy locker layout which
    /// predates per-assignment channels.
    channel_pool: Vec<u8>,
}

impl PersistenceLayer {
    pub fn new(data_dir: impl AsRef<Path>, channel_pool: Vec<u8>) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        if !data_dir.exists() {
            fs::create_dir_all(data_dir).map_err(|e| {
                LockerError::Persistence(format!(
                    "Failed to create data directory {}: {e}",
                    data_dir.display()
                ))
            })?;
        }
        Ok(Self {
            faces_path: data_dir.join(FACES_FILE),
            lockers_path: data_dir.join(LOCKERS_FILE),
            channel_pool,
        })
    }

    pub fn load_identities(&self) -> Vec<FaceTemplate> {
        let Some(raw) = read_if_present(&self.faces_path) else {
            return Vec::new();
        };

        match serde_json::from_slice::<IdentityFile>(&raw) {
            Ok(file) => file
                .identities
                .into_iter()
                .map(|mut t| {
                    t.name = normalize_name(&t.name);
                    t
                })
                .collect(),
            Err(_) => self.upgrade_legacy_identities(&raw),
        }
    }

    fn upgrade_legacy_identities(&self, raw: &[u8]) -> Vec<FaceTemplate> {
        match serde_json::from_slice::<LegacyIdentityFile>(raw) {
            Ok(LegacyIdentityFile(embeddings, names)) => {
                info!(path = %self.faces_path.display(), "upgrading legacy identity file");
                names
                    .into_iter()
                    .zip(embeddings)
                    .map(|(name, embedding)| FaceTemplate::new(normalize_name(&name), embedding))
                    .collect()
            }
            Err(e) => {
                error!(path = %self.faces_path.display(), error = %e, "corrupt identity file, starting empty");
                Vec::new()
            }
        }
    }

    pub fn save_identities(&self, templates: &[FaceTemplate]) -> Result<()> {
        let file = IdentityFile {
            version: STORE_FORMAT_VERSION,
            identities: templates.to_vec(),
        };
        save_atomic(&self.faces_path, &file)
    }

    pub fn load_assignments(&self) -> Vec<LockerAssignment> {
        let Some(raw) = read_if_present(&self.lockers_path) else {
            return Vec::new();
        };

        match serde_json::from_slice::<LockerFile>(&raw) {
            Ok(file) => file
                .assignments
                .into_iter()
                .map(|mut a| {
                    a.name = normalize_name(&a.name);
                    a
                })
                .collect(),
            Err(_) => self.upgrade_legacy_assignments(&raw),
        }
    }

    /// The legacy locker layout maps name to a bare locker number. Channels
    /// are dealt from the configured pool in ascending locker order, the same
    /// order the registry scans; assignments beyond the pool are dropped.
    fn upgrade_legacy_assignments(&self, raw: &[u8]) -> Vec<LockerAssignment> {
        let legacy: HashMap<String, u32> = match serde_json::from_slice(raw) {
            Ok(map) => map,
            Err(e) => {
                error!(path = %self.lockers_path.display(), error = %e, "corrupt locker file, starting empty");
                return Vec::new();
            }
        };

        info!(path = %self.lockers_path.display(), "upgrading legacy locker file");
        let mut entries: Vec<(String, u32)> = legacy
            .into_iter()
            .map(|(name, locker)| (normalize_name(&name), locker))
            .collect();
        entries.sort_by_key(|(_, locker)| *locker);

        let mut assignments = Vec::new();
        for ((name, locker), &channel) in entries.iter().zip(self.channel_pool.iter()) {
            assignments.push(LockerAssignment {
                name: name.clone(),
                locker: *locker,
                channel,
            });
        }
        if assignments.len() < entries.len() {
            warn!(
                dropped = entries.len() - assignments.len(),
                "legacy locker entries exceed the channel pool, dropping the rest"
            );
        }
        assignments
    }

    pub fn save_assignments(&self, assignments: &[LockerAssignment]) -> Result<()> {
        let file = LockerFile {
            version: STORE_FORMAT_VERSION,
            assignments: assignments.to_vec(),
        };
        save_atomic(&self.lockers_path, &file)
    }
}

fn read_if_present(path: &Path) -> Option<Vec<u8>> {
    if !path.exists() {
        return None;
    }
    match fs::read(path) {
        Ok(raw) => Some(raw),
        Err(e) => {
            error!(path = %path.display(), error = %e, "failed to read store file");
            None
        }
    }
}

/// Write to a temporary sibling, back the current file up, then rename over
/// the target. The backup is best-effort; only the final rename decides
/// success.
fn save_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let serialized = serde_json::to_vec_pretty(value)
        .map_err(|e| LockerError::Persistence(format!("Serialization failed: {e}")))?;

    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, &serialized)
        .map_err(|e| LockerError::Persistence(format!("Failed to write {}: {e}", tmp_path.display())))?;

    if path.exists() {
        let bak_path = path.with_extension("bak");
        if let Err(e) = fs::copy(path, &bak_path) {
            warn!(path = %path.display(), error = %e, "backup copy failed");
        }
    }

    fs::rename(&tmp_path, path)
        .map_err(|e| LockerError::Persistence(format!("Failed to replace {}: {e}", path.display())))
}
