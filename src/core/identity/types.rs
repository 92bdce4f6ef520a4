// src/core/identity/types.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A face embedding bound to an enrolled name. The embedding is an opaque
/// fixed-length vector produced by the matching collaborator; the core only
/// ever measures distances between them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceTemplate {
    pub name: String,
    pub embedding: Vec<f32>,
}

impl FaceTemplate {
    pub fn new(name: impl Into<String>, embedding: Vec<f32>) -> Self {
        Self {
            name: name.into(),
            embedding,
        }
    }

    /// Euclidean distance to a candidate embedding. Length mismatches are a
    /// collaborator bug; they compare as infinitely far rather than panic.
    pub fn distance(&self, candidate: &[f32]) -> f32 {
        if self.embedding.len() != candidate.len() {
            return f32::INFINITY;
        }
        self.embedding
            .iter()
            .zip(candidate.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }
}

/// Detection rectangle in frame coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
    pub left: u32,
}

impl BoundingBox {
    pub fn area(&self) -> u64 {
        let width = self.right.saturating_sub(self.left) as u64;
        let height = self.bottom.saturating_sub(self.top) as u64;
        width * height
    }
}

/// One face seen during a recognition cycle. `name` is `None` for faces that
/// did not resolve to an enrolled identity. Events are ephemeral; only the
/// most recent batch is retained.
#[derive(Debug, Clone)]
pub struct RecognitionEvent {
    pub name: Option<String>,
    pub bounding_box: BoundingBox,
    pub seen_at: DateTime<Utc>,
}

/// Canonical form for identity names: trimmed and lowercased. Every lookup
/// and mutation goes through this so case never leaks into the stores.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_is_euclidean() {
        let template = FaceTemplate::new("a", vec![0.0, 3.0]);
        assert_eq!(template.distance(&[4.0, 0.0]), 5.0);
    }

    #[test]
    fn mismatched_lengths_never_match() {
        let template = FaceTemplate::new("a", vec![0.0, 0.0]);
        assert_eq!(template.distance(&[0.0]), f32::INFINITY);
    }

    #[test]
    fn area_handles_degenerate_boxes() {
        let degenerate = BoundingBox {
            top: 10,
            right: 5,
            bottom: 5,
            left: 10,
        };
        assert_eq!(degenerate.area(), 0);
    }

    #[test]
    fn names_are_trimmed_and_lowercased() {
        assert_eq!(normalize_name("  Alice "), "alice");
    }
}
