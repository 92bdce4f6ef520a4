pub mod recognition;
pub mod registration;

pub use recognition::{PipelineHandle, PipelineState, RecognitionPipeline, RecognitionView};
pub use registration::{EnrollOutcome, RegistrationCoordinator, RemoveOutcome};
