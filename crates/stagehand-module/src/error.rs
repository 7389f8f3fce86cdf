use thiserror::Error;

use stagehand_sidecar::SidecarError;

#[derive(Debug, Error)]
pub enum ModuleError {
    #[error("required configuration missing: {0}")]
    MissingConfig(&'static str),

    #[error("invalid configuration {name}: {reason}")]
    InvalidConfig {
        name: &'static str,
        reason: String,
    },

    #[error("event is missing the required {0} key")]
    InvalidEvent(&'static str),

    #[error("invalid blob name: {0}")]
    InvalidBlobName(String),

    #[error("lifecycle violation: {0}")]
    LifecycleViolation(String),

    #[error("processing deadline exceeded before commit")]
    DeadlineExceeded,

    #[error("processing failed: {0}")]
    Process(String),

    #[error(transparent)]
    Sidecar(#[from] SidecarError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
