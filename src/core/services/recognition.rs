// src/core/services/recognition.rs
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::capture::{FaceMatcher, FrameSource};
use crate::core::actuator::ActuatorController;
use crate::core::identity::types::RecognitionEvent;
use crate::core::identity::IdentityStore;
use crate::core::lockers::LockerRegistry;
use crate::utils::config::Config;
use crate::utils::metrics::PipelineMetrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Running,
    Paused,
    Stopped,
}

/// Read handle over the most recent recognition batch. Cloneable; the display
/// collaborator polls `latest()` at its own cadence. Single writer (the
/// pipeline), last write wins, no queueing of stale batches.
#[derive(Clone, Default)]
pub struct RecognitionView {
    latest: Arc<Mutex<Vec<RecognitionEvent>>>,
}

impl RecognitionView {
    pub fn latest(&self) -> Vec<RecognitionEvent> {
        self.latest.lock().clone()
    }

    fn replace(&self, events: Vec<RecognitionEvent>) {
        *self.latest.lock() = events;
    }

    fn clear(&self) {
        self.latest.lock().clear();
    }
}

/// Control handle for a spawned pipeline. Pause/resume are cooperative and
/// take effect at the next cycle boundary; stop is terminal and waits for the
/// current cycle to finish.
pub struct PipelineHandle {
    state: Arc<watch::Sender<PipelineState>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl PipelineHandle {
    pub fn pause(&self) {
        self.transition(PipelineState::Paused);
    }

    pub fn resume(&self) {
        self.transition(PipelineState::Running);
    }

    fn transition(&self, next: PipelineState) {
        self.state.send_if_modified(|state| {
            if *state == PipelineState::Stopped || *state == next {
                return false;
            }
            *state = next;
            true
        });
    }

    /// Requests termination and waits for the loop to finish its current
    /// cycle. Bounded by one cycle's duration.
    pub async fn stop(&self) {
        self.state.send_replace(PipelineState::Stopped);
        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(error = %e, "pipeline task ended abnormally");
            }
        }
    }

    pub fn state(&self) -> PipelineState {
        *self.state.borrow()
    }
}

/// Background loop: capture a downscaled frame, match faces against the
/// identity store, publish the batch for the display, and trigger locker
/// openings subject to the per-identity cooldown.
pub struct RecognitionPipeline {
    source: Arc<dyn FrameSource>,
    matcher: Arc<dyn FaceMatcher>,
    identities: Arc<RwLock<IdentityStore>>,
    lockers: Arc<RwLock<LockerRegistry>>,
    actuator: Arc<ActuatorController>,
    view: RecognitionView,
    cooldowns: Arc<Mutex<HashMap<String, Instant>>>,
    metrics: Arc<PipelineMetrics>,
    scan_interval: Duration,
    reopen_cooldown: Duration,
    downscale: f32,
}

impl RecognitionPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: &Config,
        source: Arc<dyn FrameSource>,
        matcher: Arc<dyn FaceMatcher>,
        identities: Arc<RwLock<IdentityStore>>,
        lockers: Arc<RwLock<LockerRegistry>>,
        actuator: Arc<ActuatorController>,
    ) -> Self {
        Self {
            source,
            matcher,
            identities,
            lockers,
            actuator,
            view: RecognitionView::default(),
            cooldowns: Arc::new(Mutex::new(HashMap::new())),
            metrics: Arc::new(PipelineMetrics::new()),
            scan_interval: config.scan_interval(),
            reopen_cooldown: config.reopen_cooldown(),
            downscale: config.recognition.downscale,
        }
    }

    pub fn view(&self) -> RecognitionView {
        self.view.clone()
    }

    pub fn metrics(&self) -> Arc<PipelineMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Moves the pipeline onto a background task, initially Running.
    pub fn spawn(self) -> PipelineHandle {
        self.spawn_with(PipelineState::Running)
    }

    /// Like [`spawn`](Self::spawn), but the loop waits for an explicit
    /// `resume()` before its first cycle.
    pub fn spawn_paused(self) -> PipelineHandle {
        self.spawn_with(PipelineState::Paused)
    }

    fn spawn_with(self, initial: PipelineState) -> PipelineHandle {
        let (state_tx, state_rx) = watch::channel(initial);
        let state = Arc::new(state_tx);
        let task = tokio::spawn(self.run(state_rx));
        PipelineHandle {
            state,
            task: Mutex::new(Some(task)),
        }
    }

    async fn run(self, mut state: watch::Receiver<PipelineState>) {
        info!("recognition pipeline started");
        loop {
            // Single cooperative checkpoint, at the top of every cycle.
            let current = *state.borrow();
            match current {
                PipelineState::Stopped => break,
                PipelineState::Paused => {
                    if state.changed().await.is_err() {
                        break;
                    }
                    continue;
                }
                PipelineState::Running => {}
            }

            let cycle_started = Instant::now();
            self.cycle().await;
            self.metrics.record_cycle();

            // Throttle: the next cycle starts no sooner than scan_interval
            // after this one started. A state change wakes the loop early so
            // stop stays bounded by one cycle.
            if let Some(remaining) = self.scan_interval.checked_sub(cycle_started.elapsed()) {
                let _ = tokio::time::timeout(remaining, state.changed()).await;
            }
        }
        info!("recognition pipeline stopped");
    }

    async fn cycle(&self) {
        let Some(frame) = self.source.capture_frame(self.downscale).await else {
            // Transient capture failure: nobody currently visible.
            self.metrics.record_capture_failure();
            self.view.clear();
            return;
        };

        let boxes = self.matcher.detect_faces(&frame).await;
        let embeddings = self.matcher.encode(&frame, &boxes).await;

        let seen_at = Utc::now();
        let mut events = Vec::with_capacity(boxes.len());
        let mut recognized = Vec::new();
        {
            let identities = self.identities.read().await;
            for (bounding_box, embedding) in boxes.iter().zip(embeddings.iter()) {
                let name = identities.lookup(embedding).map(str::to_owned);
                if let Some(name) = &name {
                    self.metrics.record_match();
                    recognized.push(name.clone());
                }
                events.push(RecognitionEvent {
                    name,
                    bounding_box: *bounding_box,
                    seen_at,
                });
            }
        }
        self.view.replace(events);

        for name in recognized {
            self.maybe_open(&name).await;
        }
    }

    /// Debounced trigger: open the identity's locker unless it was triggered
    /// within the cooldown window.
    async fn maybe_open(&self, name: &str) {
        let assignment = self.lockers.read().await.get(name).cloned();
        let Some(assignment) = assignment else {
            return;
        };

        let now = Instant::now();
        {
            let mut cooldowns = self.cooldowns.lock();
            if let Some(last) = cooldowns.get(name) {
                if now.duration_since(*last) < self.reopen_cooldown {
                    return;
                }
            }
            cooldowns.insert(name.to_owned(), now);
        }

        match self.actuator.open(assignment.channel) {
            Ok(()) => {
                self.metrics.record_open();
                info!(%name, locker = assignment.locker, "unlocked for recognized identity");
            }
            Err(e) => {
                // Hardware trouble must not take the pipeline down.
                self.metrics.record_hardware_failure();
                error!(%name, channel = assignment.channel, error = %e, "failed to open locker");
            }
        }
    }
}
