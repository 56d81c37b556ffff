//! Ordered key-value storage for the tag database.
//!
//! A [`KvStore`] is one physical file holding sorted `(key, value)` pairs,
//! optionally with duplicate keys, plus a small set of reserved "meta"
//! records that describe the file itself. Two on-disk backends exist; the
//! backend of an existing file is detected from its signature.

pub mod backend;
pub mod bulk;
pub mod error;
pub mod meta;
pub mod scan;
pub mod store;

pub use backend::{BackendKind, Entry};
pub use bulk::SortHelper;
pub use error::{Result, StoreError};
pub use meta::{is_meta_key, meta_key};
pub use scan::{Scan, ScanAction, ScanSpec, ScanStart};
pub use store::{KvStore, OpenMode, OpenOptions, StoreStats};
