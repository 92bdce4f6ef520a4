// src/utils/error.rs
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LockerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid name")]
    InvalidName,

    #[error("Identity '{0}' not found")]
    NotFound(String),

    #[error("Face matches an already enrolled identity")]
    DuplicateTemplate,

    #[error("Identity '{0}' already holds a locker")]
    AlreadyAssigned(String),

    #[error("No free locker/channel pair left")]
    ResourceExhausted,

    #[error("Only the administrator may remove identities")]
    PermissionDenied,

    #[error("The administrator identity cannot be removed")]
    ProtectedIdentity,

    #[error("Another registration workflow is already running")]
    Busy,

    #[error("Image capture failed")]
    CaptureFailed,

    #[error("No face detected")]
    NoFaceDetected,

    #[error("Face encoding failed")]
    EncodingFailed,

    #[error("Hardware error: {0}")]
    Hardware(String),

    #[error("Persistence error: {0}")]
    Persistence(String),
}

/// Coarse classification used by logging and by callers that only care
/// whether an operation is safe to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transient,
    Conflict,
    Permission,
    Persistence,
    Hardware,
    Config,
}

impl LockerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::CaptureFailed | Self::NoFaceDetected | Self::EncodingFailed | Self::Busy => {
                ErrorKind::Transient
            }
            Self::DuplicateTemplate
            | Self::AlreadyAssigned(_)
            | Self::ResourceExhausted
            | Self::NotFound(_)
            | Self::InvalidName => ErrorKind::Conflict,
            Self::PermissionDenied | Self::ProtectedIdentity => ErrorKind::Permission,
            Self::Persistence(_) => ErrorKind::Persistence,
            Self::Hardware(_) => ErrorKind::Hardware,
            Self::Config(_) => ErrorKind::Config,
        }
    }
}

pub type Result<T> = std::result::Result<T, LockerError>;
