// src/core/identity/store.rs
use tracing::{debug, info};

use super::types::{normalize_name, FaceTemplate};
use crate::utils::error::{LockerError, Result};

/// In-memory set of enrolled face templates, one per identity. Insertion
/// order is preserved: it is the tie-break for equally distant matches and it
/// survives save/load, so match results are stable across restarts.
///
/// The store holds no locks of its own; the owner wraps it in whatever
/// synchronization the call sites need.
#[derive(Debug)]
pub struct IdentityStore {
    templates: Vec<FaceTemplate>,
    threshold: f32,
}

impl IdentityStore {
    pub fn new(threshold: f32) -> Self {
        Self {
            templates: Vec::new(),
            threshold,
        }
    }

    pub fn with_templates(threshold: f32, templates: Vec<FaceTemplate>) -> Self {
        Self {
            templates,
            threshold,
        }
    }

    /// Resolves a candidate embedding to the enrolled identity with the
    /// minimum distance, provided that minimum is under the threshold.
    /// Among equally distant templates the earliest enrolled one wins.
    pub fn lookup(&self, embedding: &[f32]) -> Option<&str> {
        let (template, distance) = self.nearest(embedding)?;
        if distance < self.threshold {
            Some(template.name.as_str())
        } else {
            None
        }
    }

    /// Nearest enrolled identity and its distance, threshold ignored.
    pub fn nearest_distance(&self, embedding: &[f32]) -> Option<(&str, f32)> {
        self.nearest(embedding)
            .map(|(template, distance)| (template.name.as_str(), distance))
    }

    fn nearest(&self, embedding: &[f32]) -> Option<(&FaceTemplate, f32)> {
        let mut best: Option<(&FaceTemplate, f32)> = None;
        for template in &self.templates {
            let distance = template.distance(embedding);
            match best {
                // Strict less-than keeps the earliest template on ties.
                Some((_, best_distance)) if distance >= best_distance => {}
                _ => best = Some((template, distance)),
            }
        }
        best
    }

    /// Enrolls a template under `name`. Fails with `DuplicateTemplate` when
    /// the embedding is within threshold of any other identity's template.
    /// Re-enrolling an existing name replaces its template in place, keeping
    /// the original insertion index.
    pub fn enroll(&mut self, name: &str, embedding: Vec<f32>) -> Result<()> {
        let name = normalize_name(name);
        if name.is_empty() {
            return Err(LockerError::InvalidName);
        }

        for template in &self.templates {
            if template.name != name && template.distance(&embedding) < self.threshold {
                debug!(
                    existing = %template.name,
                    "enrollment rejected, embedding too close to an enrolled face"
                );
                return Err(LockerError::DuplicateTemplate);
            }
        }

        match self.templates.iter_mut().find(|t| t.name == name) {
            Some(existing) => {
                existing.embedding = embedding;
                info!(%name, "replaced face template");
            }
            None => {
                self.templates.push(FaceTemplate::new(name.clone(), embedding));
                info!(%name, "enrolled new face template");
            }
        }
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Result<()> {
        let name = normalize_name(name);
        let index = self
            .templates
            .iter()
            .position(|t| t.name == name)
            .ok_or_else(|| LockerError::NotFound(name.clone()))?;
        self.templates.remove(index);
        info!(%name, "removed face template");
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        let name = normalize_name(name);
        self.templates.iter().any(|t| t.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.templates.iter().map(|t| t.name.as_str())
    }

    pub fn templates(&self) -> &[FaceTemplate] {
        &self.templates
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(entries: &[(&str, Vec<f32>)]) -> IdentityStore {
        let mut store = IdentityStore::new(0.45);
        for (name, embedding) in entries {
            store.enroll(name, embedding.clone()).unwrap();
        }
        store
    }

    #[test]
    fn lookup_returns_nearest_under_threshold() {
        let store = store_with(&[
            ("alice", vec![0.0, 0.0]),
            ("bob", vec![1.0, 0.0]),
        ]);

        assert_eq!(store.lookup(&[0.9, 0.0]), Some("bob"));
        assert_eq!(store.lookup(&[0.5, 0.5]), None);
    }

    #[test]
    fn equal_distances_resolve_to_earliest_enrollment() {
        let mut store = IdentityStore::new(10.0);
        store.enroll("first", vec![1.0, 0.0]).unwrap();
        store.enroll("second", vec![-1.0, 0.0]).unwrap();

        // The probe is equidistant from both templates.
        assert_eq!(store.lookup(&[0.0, 0.0]), Some("first"));
    }

    #[test]
    fn enroll_rejects_near_duplicate_of_other_identity() {
        let mut store = store_with(&[("alice", vec![0.0, 0.0])]);
        let err = store.enroll("bob", vec![0.1, 0.0]).unwrap_err();
        assert!(matches!(err, LockerError::DuplicateTemplate));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn reenrollment_replaces_template_in_place() {
        let mut store = store_with(&[
            ("alice", vec![0.0, 0.0]),
            ("bob", vec![5.0, 0.0]),
        ]);

        // Same name, near its own old template: allowed.
        store.enroll("Alice", vec![0.1, 0.0]).unwrap();
        assert_eq!(store.len(), 2);
        // Insertion order unchanged.
        assert_eq!(store.names().collect::<Vec<_>>(), vec!["alice", "bob"]);
        assert_eq!(store.templates()[0].embedding, vec![0.1, 0.0]);
    }

    #[test]
    fn remove_unknown_name_is_not_found() {
        let mut store = store_with(&[("alice", vec![0.0, 0.0])]);
        assert!(matches!(
            store.remove("ghost"),
            Err(LockerError::NotFound(_))
        ));
        store.remove("ALICE ").unwrap();
        assert!(store.is_empty());
    }
}
