// Per-tick collection failures. Contained inside the collector that hit them.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollectError {
    /// Runtime, host or store unreachable (includes sample timeouts).
    #[error("transport error: {0}")]
    Transport(String),
    /// Workload vanished between listing and stat fetch.
    #[error("not found: {0}")]
    NotFound(String),
    /// Raw reading is missing fields we need, or has the wrong shape.
    #[error("malformed sample: {0}")]
    MalformedSample(String),
}

impl CollectError {
    /// Short label for structured log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            CollectError::Transport(_) => "transport",
            CollectError::NotFound(_) => "not_found",
            CollectError::MalformedSample(_) => "malformed_sample",
        }
    }
}

impl From<bollard::errors::Error> for CollectError {
    fn from(e: bollard::errors::Error) -> Self {
        match e {
            bollard::errors::Error::DockerResponseServerError {
                status_code: 404,
                message,
            } => CollectError::NotFound(message),
            other => CollectError::Transport(other.to_string()),
        }
    }
}
