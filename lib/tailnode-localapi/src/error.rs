use std::path::PathBuf;
use std::time::Duration;
use tailnode_core::DaemonError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LocalApiError>;

#[derive(Error, Debug)]
pub enum LocalApiError {
    #[error("failed to connect to {}: {source}", .path.display())]
    Connect {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] hyper::Error),

    #[error("invalid request: {0}")]
    Request(#[from] hyper::http::Error),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("{status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl From<LocalApiError> for DaemonError {
    fn from(err: LocalApiError) -> Self {
        match err {
            LocalApiError::Status { .. } => DaemonError::Rejected(err.to_string()),
            LocalApiError::Decode(e) => DaemonError::InvalidResponse(e.to_string()),
            other => DaemonError::Transport(Box::new(other)),
        }
    }
}
