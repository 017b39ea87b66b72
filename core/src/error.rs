use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while building, loading or querying an index.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("missing index artifact: {0}")]
    MissingArtifact(PathBuf),

    #[error("index corruption at byte {offset}: {reason}")]
    Corruption { offset: u64, reason: String },

    #[error("invalid index: {0}")]
    InvalidIndex(String),
}

pub type Result<T> = std::result::Result<T, IndexError>;

impl IndexError {
    pub fn is_corruption(&self) -> bool {
        matches!(self, IndexError::Corruption { .. })
    }
}
