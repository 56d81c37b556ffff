//! Bidirectional path <-> file id table.
//!
//! Every registered file has two records: `./path -> "<fid>[ o]"` and
//! `"<fid>" -> "./path[\0o]"`. The `o` marks an "other" (non-source) file.
//! Ids come from a counter persisted in the ` __.NEXTKEY` meta record and
//! are never handed out twice, even after the file is deleted.

use crate::error::{FormatError, Result, TagscopeError};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path};
use tagscope_store::{BackendKind, KvStore, OpenMode, OpenOptions, ScanSpec};

pub const NEXTKEY: &str = "__.NEXTKEY";
const PATH_PREFIX: &str = "./";
const OTHER_FLAG: &str = " o";
const OTHER_SUFFIX: &str = "\0o";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Source,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: String,
    pub file_id: u32,
    pub kind: FileKind,
}

/// Canonical tree-relative form of `path`: `./dir/file`, `/` separated.
///
/// Returns `None` for paths outside `root` or names the key format cannot
/// carry.
pub fn normalize_path(root: &Path, path: &Path) -> Option<String> {
    let relative = if path.is_absolute() {
        path.strip_prefix(root).ok()?
    } else {
        path
    };

    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(name) => parts.push(name.to_str()?),
            Component::CurDir => {}
            Component::ParentDir => {
                parts.pop()?;
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if parts.is_empty() {
        return None;
    }

    let normalized = format!("{}{}", PATH_PREFIX, parts.join("/"));
    if normalized.contains(['\n', '\0']) {
        return None;
    }
    Some(normalized)
}

pub struct PathTable {
    kv: KvStore,
    next_id: u32,
}

impl PathTable {
    pub fn open(db_path: &Path, mode: OpenMode, backend: BackendKind) -> Result<Self> {
        let options = match mode {
            OpenMode::ReadOnly => OpenOptions::read_only(),
            OpenMode::Modify => OpenOptions::modify(),
            OpenMode::Create => OpenOptions::create(backend),
        };
        let kv = KvStore::open(db_path, options)?;

        let next_id = match kv.get_meta(NEXTKEY)? {
            Some(v) => v.trim().parse::<u32>().map_err(|_| {
                FormatError::Malformed(format!("{}: bad next id {:?}", db_path.display(), v))
            })?,
            None if mode == OpenMode::Create => 1,
            None => {
                return Err(TagscopeError::Consistency(format!(
                    "{} has no file id counter",
                    db_path.display()
                )));
            }
        };

        Ok(Self { kv, next_id })
    }

    /// The id the next new path will receive; every live id is below it.
    pub fn next_id(&self) -> u32 {
        self.next_id
    }

    /// Register `path`, returning its file id. An already registered path
    /// keeps its id; only its kind may change.
    pub fn put(&mut self, path: &str, kind: FileKind) -> Result<u32> {
        if !path.starts_with(PATH_PREFIX) {
            return Err(TagscopeError::Internal(format!(
                "path {:?} is not in canonical form",
                path
            )));
        }

        if let Some(existing) = self.lookup(path)? {
            if existing.kind != kind {
                self.write_pair(path, existing.file_id, kind)?;
            }
            return Ok(existing.file_id);
        }

        let file_id = self.next_id;
        self.next_id = file_id
            .checked_add(1)
            .ok_or_else(|| TagscopeError::Internal("file id space exhausted".to_string()))?;
        self.write_pair(path, file_id, kind)?;
        tracing::trace!("Registered {} as {}", path, file_id);
        Ok(file_id)
    }

    fn write_pair(&mut self, path: &str, file_id: u32, kind: FileKind) -> Result<()> {
        let fid = file_id.to_string();
        let (id_value, path_value) = match kind {
            FileKind::Source => (fid.clone(), path.to_string()),
            FileKind::Other => (format!("{}{}", fid, OTHER_FLAG), format!("{}{}", path, OTHER_SUFFIX)),
        };
        self.kv.put(path.as_bytes(), id_value.as_bytes())?;
        self.kv.put(fid.as_bytes(), path_value.as_bytes())?;
        Ok(())
    }

    /// Full record for a registered path.
    pub fn lookup(&self, path: &str) -> Result<Option<FileRecord>> {
        let Some(value) = self.kv.get(path.as_bytes())? else {
            return Ok(None);
        };
        let value = String::from_utf8_lossy(&value);
        let (id, kind) = match value.strip_suffix(OTHER_FLAG) {
            Some(id) => (id, FileKind::Other),
            None => (value.as_ref(), FileKind::Source),
        };
        let file_id = id.parse::<u32>().map_err(|_| {
            FormatError::Malformed(format!("path {:?} maps to bad file id {:?}", path, id))
        })?;
        Ok(Some(FileRecord {
            path: path.to_string(),
            file_id,
            kind,
        }))
    }

    pub fn path2fid(&self, path: &str) -> Result<Option<u32>> {
        Ok(self.lookup(path)?.map(|r| r.file_id))
    }

    pub fn fid2path(&self, file_id: u32) -> Result<Option<String>> {
        Ok(self.fid2record(file_id)?.map(|r| r.path))
    }

    pub fn fid2record(&self, file_id: u32) -> Result<Option<FileRecord>> {
        let Some(value) = self.kv.get(file_id.to_string().as_bytes())? else {
            return Ok(None);
        };
        let value = String::from_utf8_lossy(&value);
        let (path, kind) = match value.strip_suffix(OTHER_SUFFIX) {
            Some(path) => (path.to_string(), FileKind::Other),
            None => (value.into_owned(), FileKind::Source),
        };
        Ok(Some(FileRecord {
            path,
            file_id,
            kind,
        }))
    }

    /// Remove both directions of `path`. The id is not recycled.
    pub fn delete(&mut self, path: &str) -> Result<Option<u32>> {
        if self.kv.mode() != OpenMode::Modify {
            return Err(TagscopeError::Internal(
                "path deletion requires modify mode".to_string(),
            ));
        }
        let Some(record) = self.lookup(path)? else {
            return Ok(None);
        };
        self.kv.delete(path.as_bytes())?;
        self.kv.delete(record.file_id.to_string().as_bytes())?;
        tracing::trace!("Unregistered {} ({})", path, record.file_id);
        Ok(Some(record.file_id))
    }

    /// Every live record, in path order.
    pub fn entries(&self) -> Result<Vec<FileRecord>> {
        let mut records = Vec::new();
        for entry in self.kv.scan(ScanSpec::prefix(PATH_PREFIX))? {
            let entry = entry?;
            let path = entry.key_str().into_owned();
            if let Some(record) = self.lookup(&path)? {
                records.push(record);
            }
        }
        Ok(records)
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.kv.scan(ScanSpec::prefix(PATH_PREFIX))?.count())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.kv.backend_kind()
    }

    /// Persist the id counter and release the file.
    pub fn close(mut self) -> Result<()> {
        if self.kv.mode() != OpenMode::ReadOnly {
            self.kv.put_meta(NEXTKEY, &self.next_id.to_string())?;
        }
        self.kv.close()?;
        Ok(())
    }
}
