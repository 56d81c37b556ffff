use tagscope_store::StoreError;
use thiserror::Error;

/// The on-disk format cannot be used by this build.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("tag database format version {found} is too new (newest supported: {newest}), please upgrade")]
    TooNew { found: u32, newest: u32 },
    #[error("tag database format version {found} is too old (oldest supported: {oldest}), please rebuild the database")]
    TooOld { found: u32, oldest: u32 },
    #[error("malformed tag database: {0}")]
    Malformed(String),
}

#[derive(Error, Debug)]
pub enum TagscopeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error("{0}; please rebuild the tag database")]
    Consistency(String),
    #[error("file id {id} is outside the id set (capacity {capacity})")]
    IdOutOfRange { id: u32, capacity: u32 },
    #[error("JSON serialization/deserialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{} is outside the source tree", .0.display())]
    OutsideRoot(std::path::PathBuf),
    #[error("Parsing error: {0}")]
    Parsing(String),
    #[error("indexing cancelled")]
    Cancelled,
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, TagscopeError>;
