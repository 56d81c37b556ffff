//! Physical storage backends.
//!
//! Every backend keeps entries ordered by `(key, seq)`, where `seq` is a
//! store-wide insertion counter. Duplicate keys are therefore returned
//! together and in insertion order.

mod btree_file;
mod sqlite;

pub(crate) use btree_file::BTreeFileBackend;
pub(crate) use sqlite::SqliteBackend;

use crate::error::{Result, StoreError};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::ops::Bound;
use std::path::Path;

/// One stored record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    pub seq: u64,
}

impl Entry {
    pub fn key_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.key)
    }

    pub fn value_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Sorted map persisted as a single compressed, checksummed file.
    #[default]
    BTreeFile,
    /// Embedded SQLite database.
    Sqlite,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::BTreeFile => "btree",
            BackendKind::Sqlite => "sqlite",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "btree" | "btree-file" | "file" => Some(BackendKind::BTreeFile),
            "sqlite" | "sqlite3" | "sql" => Some(BackendKind::Sqlite),
            _ => None,
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub(crate) const SQLITE_MAGIC: &[u8; 16] = b"SQLite format 3\0";

/// Detect the backend of an existing database file from its leading bytes.
pub fn sniff(path: &Path) -> Result<BackendKind> {
    let mut header = [0u8; 16];
    let mut file = File::open(path)?;
    let mut read = 0;
    while read < header.len() {
        let n = file.read(&mut header[read..])?;
        if n == 0 {
            break;
        }
        read += n;
    }
    let header = &header[..read];

    if header.starts_with(SQLITE_MAGIC) {
        Ok(BackendKind::Sqlite)
    } else if header.starts_with(btree_file::MAGIC) {
        Ok(BackendKind::BTreeFile)
    } else {
        Err(StoreError::Corrupt(format!(
            "{}: unrecognized database signature",
            path.display()
        )))
    }
}

pub(crate) type EntryIter<'a> = Box<dyn Iterator<Item = Result<Entry>> + 'a>;

pub(crate) trait Backend {
    fn kind(&self) -> BackendKind;

    /// First entry stored under `key`.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Append a new entry, keeping any existing entries for `key`.
    fn insert(&mut self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Replace every entry for `key` with a single one.
    fn replace(&mut self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Remove every entry for `key`, returning how many were removed.
    fn remove_key(&mut self, key: &[u8]) -> Result<usize>;

    /// Remove the single entry identified by `(key, seq)`.
    fn remove_entry(&mut self, key: &[u8], seq: u64) -> Result<bool>;

    /// Entries in `(key, seq)` order starting at `from`.
    fn range<'a>(&'a self, from: Bound<&[u8]>) -> EntryIter<'a>;

    /// Total number of entries, meta records included.
    fn len(&self) -> Result<usize>;

    /// Make all writes durable and release the file.
    fn commit(self: Box<Self>) -> Result<()>;
}
