// tests/common/mod.rs
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tempfile::TempDir;
use tokio::sync::RwLock;

use facelock::{
    capture::{FaceMatcher, Frame, FrameSource},
    core::{
        actuator::ActuatorController,
        identity::types::BoundingBox,
        identity::IdentityStore,
        lockers::LockerRegistry,
        services::recognition::{PipelineHandle, RecognitionPipeline},
        services::registration::RegistrationCoordinator,
    },
    hardware::ActuatorDriver,
    storage::PersistenceLayer,
    utils::config::Config,
};

/// Scripted camera: returns the configured frame, or `None` to simulate a
/// transient capture failure. An optional delay makes workflows observable
/// while still in flight.
pub struct StubSource {
    frame: Mutex<Option<Frame>>,
    delay: Mutex<Duration>,
}

impl StubSource {
    pub fn with_frame() -> Self {
        Self {
            frame: Mutex::new(Some(test_frame())),
            delay: Mutex::new(Duration::ZERO),
        }
    }

    pub fn failing() -> Self {
        Self {
            frame: Mutex::new(None),
            delay: Mutex::new(Duration::ZERO),
        }
    }

    pub fn set_frame(&self, frame: Option<Frame>) {
        *self.frame.lock() = frame;
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }
}

#[async_trait]
impl FrameSource for StubSource {
    async fn capture_frame(&self, _downscale: f32) -> Option<Frame> {
        let delay = *self.delay.lock();
        if delay > Duration::ZERO {
            tokio::time::sleep(delay).await;
        }
        self.frame.lock().clone()
    }
}

/// Scripted matcher: a fixed list of (box, embedding) faces per frame.
/// `fail_encoding` makes `encode` drop every box, the way a real matcher
/// omits boxes it cannot encode.
pub struct StubMatcher {
    faces: Mutex<Vec<(BoundingBox, Vec<f32>)>>,
    fail_encoding: std::sync::atomic::AtomicBool,
}

impl StubMatcher {
    pub fn empty() -> Self {
        Self::seeing(Vec::new())
    }

    pub fn seeing(faces: Vec<(BoundingBox, Vec<f32>)>) -> Self {
        Self {
            faces: Mutex::new(faces),
            fail_encoding: std::sync::atomic::AtomicBool::new(false),
        }
    }

    pub fn set_faces(&self, faces: Vec<(BoundingBox, Vec<f32>)>) {
        *self.faces.lock() = faces;
    }

    pub fn fail_encoding(&self) {
        self.fail_encoding
            .store(true, std::sync::atomic::Ordering::SeqCst);
    }
}

#[async_trait]
impl FaceMatcher for StubMatcher {
    async fn detect_faces(&self, _frame: &Frame) -> Vec<BoundingBox> {
        self.faces.lock().iter().map(|(b, _)| *b).collect()
    }

    async fn encode(&self, _frame: &Frame, boxes: &[BoundingBox]) -> Vec<Vec<f32>> {
        if self.fail_encoding.load(std::sync::atomic::Ordering::SeqCst) {
            return Vec::new();
        }
        let faces = self.faces.lock();
        boxes
            .iter()
            .filter_map(|requested| {
                faces
                    .iter()
                    .find(|(b, _)| b == requested)
                    .map(|(_, e)| e.clone())
            })
            .collect()
    }
}

/// Records every level transition instead of driving hardware.
#[derive(Default)]
pub struct RecordingDriver {
    pub transitions: Mutex<Vec<(u8, bool)>>,
}

impl RecordingDriver {
    pub fn opens(&self) -> usize {
        self.transitions.lock().iter().filter(|(_, h)| *h).count()
    }

    pub fn closes(&self) -> usize {
        self.transitions.lock().iter().filter(|(_, h)| !*h).count()
    }
}

impl ActuatorDriver for RecordingDriver {
    fn set_level(&self, channel: u8, high: bool) -> facelock::utils::error::Result<()> {
        self.transitions.lock().push((channel, high));
        Ok(())
    }
}

pub struct TestContext {
    pub config: Config,
    pub identities: Arc<RwLock<IdentityStore>>,
    pub lockers: Arc<RwLock<LockerRegistry>>,
    pub persistence: Arc<PersistenceLayer>,
    pub driver: Arc<RecordingDriver>,
    pub actuator: Arc<ActuatorController>,
    pub source: Arc<StubSource>,
    pub matcher: Arc<StubMatcher>,
    // Held so the data directory outlives the context.
    _dir: TempDir,
}

impl TestContext {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::for_tests(dir.path().to_path_buf());

        let persistence = Arc::new(
            PersistenceLayer::new(&config.system.data_dir, config.lockers.channels.clone())
                .unwrap(),
        );
        let identities = Arc::new(RwLock::new(IdentityStore::with_templates(
            config.recognition.threshold,
            persistence.load_identities(),
        )));
        let lockers = Arc::new(RwLock::new(LockerRegistry::with_assignments(
            config.lockers.total,
            config.lockers.channels.clone(),
            persistence.load_assignments(),
        )));

        let driver = Arc::new(RecordingDriver::default());
        let actuator = Arc::new(ActuatorController::new(
            driver.clone(),
            config.auto_close(),
        ));

        Self {
            config,
            identities,
            lockers,
            persistence,
            driver,
            actuator,
            source: Arc::new(StubSource::with_frame()),
            matcher: Arc::new(StubMatcher::empty()),
            _dir: dir,
        }
    }

    pub fn pipeline(&self) -> RecognitionPipeline {
        RecognitionPipeline::new(
            &self.config,
            self.source.clone(),
            self.matcher.clone(),
            self.identities.clone(),
            self.lockers.clone(),
            self.actuator.clone(),
        )
    }

    pub fn coordinator(&self, pipeline: Arc<PipelineHandle>) -> RegistrationCoordinator {
        RegistrationCoordinator::new(
            self.identities.clone(),
            self.lockers.clone(),
            self.persistence.clone(),
            pipeline,
            self.source.clone(),
            self.matcher.clone(),
            self.actuator.clone(),
            &self.config.admin_name(),
        )
    }
}

pub fn test_frame() -> Frame {
    Frame {
        width: 8,
        height: 8,
        data: vec![0; 8 * 8 * 3],
    }
}

pub fn bbox(left: u32, top: u32, right: u32, bottom: u32) -> BoundingBox {
    BoundingBox {
        top,
        right,
        bottom,
        left,
    }
}

/// A face the matcher will report, with a distinct embedding per seed.
pub fn face(seed: f32) -> (BoundingBox, Vec<f32>) {
    (bbox(0, 0, 10, 10), vec![seed, seed, seed])
}
