use thiserror::Error;

#[derive(Debug, Error)]
pub enum SidecarError {
    #[error("sidecar unreachable: {0}")]
    Unreachable(String),

    #[error("sidecar rejected request with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("malformed sidecar response: {0}")]
    Malformed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl SidecarError {
    /// Connection-level failures are the only errors worth retrying: the
    /// sidecar may simply not be listening yet. An HTTP rejection means the
    /// sidecar saw the request and said no, and retrying won't change that.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, SidecarError::Unreachable(_))
    }
}
