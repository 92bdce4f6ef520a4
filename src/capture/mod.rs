// src/capture/mod.rs
//
// Seams to the image-source and face-matching collaborators. The core never
// interprets pixel data; frames are carried opaquely from the source to the
// matcher.
use async_trait::async_trait;

use crate::core::identity::types::BoundingBox;

/// A captured image. `data` is raw RGB bytes, row-major.
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

/// Supplies frames on demand. Implementations must return within a bounded
/// time; `None` signals a transient failure, never an abort.
#[async_trait]
pub trait FrameSource: Send + Sync {
    async fn capture_frame(&self, downscale: f32) -> Option<Frame>;
}

/// Face detection and embedding, positionally aligned: `encode` returns one
/// embedding per box it could encode, dropping boxes that fail.
#[async_trait]
pub trait FaceMatcher: Send + Sync {
    async fn detect_faces(&self, frame: &Frame) -> Vec<BoundingBox>;

    async fn encode(&self, frame: &Frame, boxes: &[BoundingBox]) -> Vec<Vec<f32>>;
}

/// Source for headless deployments with no camera attached. Every capture
/// reports a transient failure, which the pipeline treats as "nobody visible".
pub struct NullSource;

#[async_trait]
impl FrameSource for NullSource {
    async fn capture_frame(&self, _downscale: f32) -> Option<Frame> {
        None
    }
}

/// Matcher counterpart to [`NullSource`].
pub struct NullMatcher;

#[async_trait]
impl FaceMatcher for NullMatcher {
    async fn detect_faces(&self, _frame: &Frame) -> Vec<BoundingBox> {
        Vec::new()
    }

    async fn encode(&self, _frame: &Frame, _boxes: &[BoundingBox]) -> Vec<Vec<f32>> {
        Vec::new()
    }
}
