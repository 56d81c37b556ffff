use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("database not found: {0}")]
    NotFound(PathBuf),
    #[error("database is open read-only")]
    ReadOnly,
    #[error("operation not available while bulk sorted-write is active")]
    BulkActive,
    #[error("bulk sorted-write requires create mode")]
    BulkRequiresCreate,
    #[error("database corrupted: {0}")]
    Corrupt(String),
    #[error("invalid record: {0}")]
    InvalidRecord(String),
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("encode error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),
    #[error("decode error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
    #[error("sort helper failed: {0}")]
    SortHelper(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;
