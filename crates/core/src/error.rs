use crate::tree::TreeError;
use crate::visibility::VisibilityError;
use host_engine::{ArchiveError, HostError};

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("export cancelled")]
    Cancelled,
    #[error("layer name {0:?} is empty after sanitizing")]
    LayerNameInvalid(String),
    #[error("host operation failed: {0}")]
    Host(#[from] HostError),
    #[error("archiving failed: {0}")]
    Archiver(#[from] ArchiveError),
    #[error("malformed layer list: {0}")]
    Tree(#[from] TreeError),
    #[error(transparent)]
    Visibility(#[from] VisibilityError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type RunResult<T> = Result<T, RunError>;
