pub mod capture;
pub mod core;
pub mod hardware;
pub mod storage;
pub mod utils;

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;

use crate::{
    capture::{FaceMatcher, FrameSource},
    core::{
        actuator::ActuatorController,
        identity::IdentityStore,
        lockers::{LockerAssignment, LockerRegistry},
        services::{
            recognition::{PipelineHandle, RecognitionPipeline, RecognitionView},
            registration::RegistrationCoordinator,
        },
    },
    storage::PersistenceLayer,
    utils::{config::Config, error::Result, metrics::PipelineMetrics},
};

/// One row of the enrolled-user listing shown by the display collaborator.
#[derive(Debug, Clone)]
pub struct UserEntry {
    pub name: String,
    pub assignment: Option<LockerAssignment>,
}

/// Wires the stores, actuator, pipeline and registration coordinator
/// together. Construction loads persisted state and brings all hardware into
/// the closed position; the pipeline starts paused until `start()`.
pub struct Application {
    config: Arc<Config>,
    identities: Arc<RwLock<IdentityStore>>,
    lockers: Arc<RwLock<LockerRegistry>>,
    actuator: Arc<ActuatorController>,
    pipeline: Arc<PipelineHandle>,
    coordinator: Arc<RegistrationCoordinator>,
    view: RecognitionView,
    metrics: Arc<PipelineMetrics>,
}

impl Application {
    pub async fn new(
        config: Config,
        source: Arc<dyn FrameSource>,
        matcher: Arc<dyn FaceMatcher>,
    ) -> Result<Self> {
        config.validate()?;
        let config = Arc::new(config);

        info!("Initializing storage...");
        let persistence = Arc::new(PersistenceLayer::new(
            &config.system.data_dir,
            config.lockers.channels.clone(),
        )?);
        let identities = Arc::new(RwLock::new(IdentityStore::with_templates(
            config.recognition.threshold,
            persistence.load_identities(),
        )));
        let lockers = Arc::new(RwLock::new(LockerRegistry::with_assignments(
            config.lockers.total,
            config.lockers.channels.clone(),
            persistence.load_assignments(),
        )));

        info!("Initializing actuator...");
        let driver = hardware::driver_from_config(&config.actuator)?;
        let actuator = Arc::new(ActuatorController::new(driver, config.auto_close()));
        {
            // Every persisted assignment's hardware starts closed.
            let lockers = lockers.read().await;
            actuator.reset(lockers.assignments().iter().map(|a| a.channel));
        }

        info!("Initializing recognition pipeline...");
        let pipeline = RecognitionPipeline::new(
            &config,
            Arc::clone(&source),
            Arc::clone(&matcher),
            Arc::clone(&identities),
            Arc::clone(&lockers),
            Arc::clone(&actuator),
        );
        let view = pipeline.view();
        let metrics = pipeline.metrics();
        let handle = Arc::new(pipeline.spawn_paused());

        let coordinator = Arc::new(RegistrationCoordinator::new(
            Arc::clone(&identities),
            Arc::clone(&lockers),
            persistence,
            Arc::clone(&handle),
            source,
            matcher,
            Arc::clone(&actuator),
            &config.admin_name(),
        ));

        Ok(Self {
            config,
            identities,
            lockers,
            actuator,
            pipeline: handle,
            coordinator,
            view,
            metrics,
        })
    }

    /// Begins recognizing. Idempotent.
    pub fn start(&self) {
        info!("Starting recognition pipeline...");
        self.pipeline.resume();
    }

    pub async fn shutdown(&self) {
        info!("Shutting down application...");
        self.pipeline.stop().await;
        self.actuator.shutdown_all();
        info!("Application shutdown complete");
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Read handle the display collaborator polls for the latest batch.
    pub fn recognition(&self) -> RecognitionView {
        self.view.clone()
    }

    pub fn registration(&self) -> Arc<RegistrationCoordinator> {
        Arc::clone(&self.coordinator)
    }

    pub fn metrics(&self) -> Arc<PipelineMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Enrolled users with their assignments, sorted by name, for the
    /// user-management listing.
    pub async fn enrolled_users(&self) -> Vec<UserEntry> {
        let identities = self.identities.read().await;
        let lockers = self.lockers.read().await;

        let mut entries: Vec<UserEntry> = identities
            .names()
            .map(|name| UserEntry {
                name: name.to_owned(),
                assignment: lockers.get(name).cloned(),
            })
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries
    }
}
