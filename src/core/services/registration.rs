// src/core/services/registration.rs
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{oneshot, RwLock};
use tracing::{info, warn};

use crate::capture::{FaceMatcher, FrameSource};
use crate::core::actuator::ActuatorController;
use crate::core::identity::types::{normalize_name, BoundingBox, FaceTemplate};
use crate::core::identity::IdentityStore;
use crate::core::lockers::{LockerAssignment, LockerRegistry};
use crate::core::services::recognition::PipelineHandle;
use crate::storage::PersistenceLayer;
use crate::utils::error::{LockerError, Result};

/// Result of a completed enrollment. `durable` is false when the in-memory
/// mutation succeeded but writing it to disk did not; the caller decides how
/// loudly to surface that.
#[derive(Debug, Clone)]
pub struct EnrollOutcome {
    pub assignment: LockerAssignment,
    pub durable: bool,
}

#[derive(Debug, Clone)]
pub struct RemoveOutcome {
    pub durable: bool,
}

/// Owns the enroll/remove workflows. At most one workflow runs at a time,
/// serialized by a busy flag; each workflow runs on its own worker task and
/// reports completion through a oneshot channel so the calling thread never
/// blocks. Workflows pause the recognition pipeline for their duration so
/// the image source has a single owner at any moment.
pub struct RegistrationCoordinator {
    busy: Arc<AtomicBool>,
    identities: Arc<RwLock<IdentityStore>>,
    lockers: Arc<RwLock<LockerRegistry>>,
    persistence: Arc<PersistenceLayer>,
    pipeline: Arc<PipelineHandle>,
    source: Arc<dyn FrameSource>,
    matcher: Arc<dyn FaceMatcher>,
    actuator: Arc<ActuatorController>,
    admin_name: String,
}

impl RegistrationCoordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        identities: Arc<RwLock<IdentityStore>>,
        lockers: Arc<RwLock<LockerRegistry>>,
        persistence: Arc<PersistenceLayer>,
        pipeline: Arc<PipelineHandle>,
        source: Arc<dyn FrameSource>,
        matcher: Arc<dyn FaceMatcher>,
        actuator: Arc<ActuatorController>,
        admin_name: &str,
    ) -> Self {
        Self {
            busy: Arc::new(AtomicBool::new(false)),
            identities,
            lockers,
            persistence,
            pipeline,
            source,
            matcher,
            actuator,
            admin_name: normalize_name(admin_name),
        }
    }

    /// Starts the enrollment workflow for `name`. Fails fast with `Busy` if
    /// another workflow is running; otherwise the returned receiver resolves
    /// once the workflow completes.
    pub fn begin_enroll(&self, name: &str) -> Result<oneshot::Receiver<Result<EnrollOutcome>>> {
        let name = normalize_name(name);
        if name.is_empty() {
            return Err(LockerError::InvalidName);
        }
        let guard = self.acquire()?;

        let (tx, rx) = oneshot::channel();
        let worker = self.worker();
        tokio::spawn(async move {
            let _guard = guard;
            let result = worker.enroll(&name).await;
            let _ = tx.send(result);
        });
        Ok(rx)
    }

    /// Starts the removal workflow: `requester` must be the administrator and
    /// `target` must not be. Permission failures are reported before any
    /// state is touched.
    pub fn begin_remove(
        &self,
        requester: &str,
        target: &str,
    ) -> Result<oneshot::Receiver<Result<RemoveOutcome>>> {
        let requester = normalize_name(requester);
        let target = normalize_name(target);
        if requester != self.admin_name {
            return Err(LockerError::PermissionDenied);
        }
        if target == self.admin_name {
            return Err(LockerError::ProtectedIdentity);
        }
        let guard = self.acquire()?;

        let (tx, rx) = oneshot::channel();
        let worker = self.worker();
        tokio::spawn(async move {
            let _guard = guard;
            let result = worker.remove(&target).await;
            let _ = tx.send(result);
        });
        Ok(rx)
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    fn acquire(&self) -> Result<BusyGuard> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(LockerError::Busy);
        }
        Ok(BusyGuard(Arc::clone(&self.busy)))
    }

    fn worker(&self) -> Worker {
        Worker {
            identities: Arc::clone(&self.identities),
            lockers: Arc::clone(&self.lockers),
            persistence: Arc::clone(&self.persistence),
            pipeline: Arc::clone(&self.pipeline),
            source: Arc::clone(&self.source),
            matcher: Arc::clone(&self.matcher),
            actuator: Arc::clone(&self.actuator),
        }
    }
}

/// Clears the coordinator's busy flag when the workflow task finishes,
/// whichever way it exits.
struct BusyGuard(Arc<AtomicBool>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

struct Worker {
    identities: Arc<RwLock<IdentityStore>>,
    lockers: Arc<RwLock<LockerRegistry>>,
    persistence: Arc<PersistenceLayer>,
    pipeline: Arc<PipelineHandle>,
    source: Arc<dyn FrameSource>,
    matcher: Arc<dyn FaceMatcher>,
    actuator: Arc<ActuatorController>,
}

impl Worker {
    async fn enroll(&self, name: &str) -> Result<EnrollOutcome> {
        self.pipeline.pause();
        let result = self.enroll_inner(name).await;
        self.pipeline.resume();
        result
    }

    async fn enroll_inner(&self, name: &str) -> Result<EnrollOutcome> {
        // Full resolution for enrollment; the pipeline is paused, so the
        // image source has exactly one user.
        let frame = self
            .source
            .capture_frame(1.0)
            .await
            .ok_or(LockerError::CaptureFailed)?;

        let boxes = self.matcher.detect_faces(&frame).await;
        if boxes.is_empty() {
            return Err(LockerError::NoFaceDetected);
        }
        let subject = closest_subject(&boxes);

        let embedding = self
            .matcher
            .encode(&frame, std::slice::from_ref(&subject))
            .await
            .into_iter()
            .next()
            .ok_or(LockerError::EncodingFailed)?;

        // Identity mutation happens-before registry mutation happens-before
        // persistence.
        let previous = {
            let mut identities = self.identities.write().await;
            let previous = identities
                .templates()
                .iter()
                .find(|t| t.name == name)
                .cloned();
            identities.enroll(name, embedding)?;
            previous
        };

        let assignment = {
            let mut lockers = self.lockers.write().await;
            let existing = lockers.get(name).cloned();
            match existing {
                // Re-enrollment keeps the existing assignment.
                Some(assignment) => assignment,
                None => match lockers.allocate(name) {
                    Ok(assignment) => assignment,
                    Err(e) => {
                        drop(lockers);
                        self.rollback_enrollment(name, previous).await;
                        return Err(e);
                    }
                },
            }
        };

        // Fresh hardware starts closed.
        self.actuator.reset([assignment.channel]);

        let durable = self.persist_both().await;
        info!(%name, locker = assignment.locker, channel = assignment.channel, durable, "enrollment complete");
        Ok(EnrollOutcome {
            assignment,
            durable,
        })
    }

    /// Undo a just-applied identity mutation so enrollment stays
    /// all-or-nothing when allocation fails.
    async fn rollback_enrollment(&self, name: &str, previous: Option<FaceTemplate>) {
        let mut identities = self.identities.write().await;
        match previous {
            None => {
                if let Err(e) = identities.remove(name) {
                    warn!(%name, error = %e, "rollback failed");
                }
            }
            Some(template) => {
                // Restore the pre-existing template. Cannot collide: it was
                // enrolled before and nothing else changed under the busy flag.
                let _ = identities.enroll(name, template.embedding);
            }
        }
    }

    async fn remove(&self, target: &str) -> Result<RemoveOutcome> {
        self.pipeline.pause();
        let result = self.remove_inner(target).await;
        self.pipeline.resume();
        result
    }

    async fn remove_inner(&self, target: &str) -> Result<RemoveOutcome> {
        self.identities.write().await.remove(target)?;

        match self.lockers.write().await.release(target) {
            Ok(()) => {}
            // An identity without an assignment can only come from a partial
            // legacy upgrade; removal still succeeds.
            Err(LockerError::NotFound(_)) => {
                warn!(%target, "removed identity had no locker assignment")
            }
            Err(e) => return Err(e),
        }

        let durable = self.persist_both().await;
        info!(%target, durable, "removal complete");
        Ok(RemoveOutcome { durable })
    }

    /// Saves both stores; a failure degrades the result instead of rolling
    /// back the in-memory mutation.
    async fn persist_both(&self) -> bool {
        let identities = self.identities.read().await;
        let lockers = self.lockers.read().await;

        let mut durable = true;
        if let Err(e) = self.persistence.save_identities(identities.templates()) {
            warn!(error = %e, "identity store not persisted");
            durable = false;
        }
        if let Err(e) = self.persistence.save_assignments(lockers.assignments()) {
            warn!(error = %e, "locker registry not persisted");
            durable = false;
        }
        durable
    }
}

/// Largest bounding box wins; detection order breaks ties.
fn closest_subject(boxes: &[BoundingBox]) -> BoundingBox {
    let mut best = boxes[0];
    for candidate in &boxes[1..] {
        if candidate.area() > best.area() {
            best = *candidate;
        }
    }
    best
}
