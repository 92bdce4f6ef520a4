// src/storage/types.rs
use serde::{Deserialize, Serialize};

use crate::core::identity::types::FaceTemplate;
use crate::core::lockers::LockerAssignment;

pub const STORE_FORMAT_VERSION: u32 = 1;

/// On-disk layout of the identity store.
#[derive(Debug, Serialize, Deserialize)]
pub struct IdentityFile {
    pub version: u32,
    pub identities: Vec<FaceTemplate>,
}

/// Pre-versioning identity layout: a plain pair of parallel lists,
/// embeddings first, names second. Upgraded transparently on load.
#[derive(Debug, Deserialize)]
pub struct LegacyIdentityFile(pub Vec<Vec<f32>>, pub Vec<String>);

/// On-disk layout of the locker registry.
#[derive(Debug, Serialize, Deserialize)]
pub struct LockerFile {
    pub version: u32,
    pub assignments: Vec<LockerAssignment>,
}
