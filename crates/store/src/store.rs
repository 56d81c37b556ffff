use crate::backend::{self, Backend, BackendKind, BTreeFileBackend, SqliteBackend};
use crate::bulk::{self, BulkSorter, SortHelper};
use crate::error::{Result, StoreError};
use crate::meta::{META_PREFIX, is_meta_key, meta_key};
use crate::scan::{Scan, ScanAction, ScanSpec};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    ReadOnly,
    /// Start a new, empty file, replacing any existing one.
    Create,
    /// Update an existing file in place.
    Modify,
}

#[derive(Debug, Clone)]
pub struct OpenOptions {
    pub mode: OpenMode,
    pub allow_duplicates: bool,
    /// Buffer writes through a sort helper until [`KvStore::end_bulk`].
    pub bulk: Option<SortHelper>,
    /// Backend used when creating a file; existing files are sniffed.
    pub backend: BackendKind,
}

impl OpenOptions {
    pub fn new(mode: OpenMode) -> Self {
        Self {
            mode,
            allow_duplicates: false,
            bulk: None,
            backend: BackendKind::default(),
        }
    }

    pub fn read_only() -> Self {
        Self::new(OpenMode::ReadOnly)
    }

    pub fn create(backend: BackendKind) -> Self {
        Self {
            backend,
            ..Self::new(OpenMode::Create)
        }
    }

    pub fn modify() -> Self {
        Self::new(OpenMode::Modify)
    }

    pub fn duplicates(mut self, allow: bool) -> Self {
        self.allow_duplicates = allow;
        self
    }

    pub fn bulk(mut self, helper: SortHelper) -> Self {
        self.bulk = Some(helper);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    pub backend: BackendKind,
    pub entries: usize,
    pub meta_entries: usize,
}

/// An open key-value file.
///
/// Writes become durable only through [`KvStore::close`]. A handle dropped
/// without closing leaves the previously committed file untouched.
pub struct KvStore {
    path: PathBuf,
    mode: OpenMode,
    allow_duplicates: bool,
    backend: Box<dyn Backend>,
    bulk: Option<BulkSorter>,
}

impl KvStore {
    pub fn open(path: impl AsRef<Path>, options: OpenOptions) -> Result<Self> {
        let path = path.as_ref();

        if options.bulk.is_some() && options.mode != OpenMode::Create {
            return Err(StoreError::BulkRequiresCreate);
        }

        let backend: Box<dyn Backend> = match options.mode {
            OpenMode::Create => match options.backend {
                BackendKind::BTreeFile => Box::new(BTreeFileBackend::open(path, options.mode)?),
                BackendKind::Sqlite => Box::new(SqliteBackend::open(path, options.mode)?),
            },
            OpenMode::ReadOnly | OpenMode::Modify => {
                if !path.exists() {
                    return Err(StoreError::NotFound(path.to_path_buf()));
                }
                match backend::sniff(path)? {
                    BackendKind::BTreeFile => {
                        Box::new(BTreeFileBackend::open(path, options.mode)?)
                    }
                    BackendKind::Sqlite => Box::new(SqliteBackend::open(path, options.mode)?),
                }
            }
        };

        tracing::debug!(
            "Opened {} ({}, {:?}{})",
            path.display(),
            backend.kind(),
            options.mode,
            if options.bulk.is_some() { ", bulk" } else { "" }
        );

        Ok(Self {
            path: path.to_path_buf(),
            mode: options.mode,
            allow_duplicates: options.allow_duplicates,
            backend,
            bulk: options.bulk.as_ref().map(BulkSorter::start),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn allows_duplicates(&self) -> bool {
        self.allow_duplicates
    }

    pub fn is_bulk(&self) -> bool {
        self.bulk.is_some()
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.mode == OpenMode::ReadOnly {
            return Err(StoreError::ReadOnly);
        }
        Ok(())
    }

    fn ensure_readable(&self) -> Result<()> {
        if self.bulk.is_some() {
            return Err(StoreError::BulkActive);
        }
        Ok(())
    }

    fn check_data_key(key: &[u8]) -> Result<()> {
        if key.is_empty() {
            return Err(StoreError::InvalidRecord("empty key".to_string()));
        }
        if is_meta_key(key) {
            return Err(StoreError::InvalidRecord(format!(
                "key {:?} collides with the meta key space",
                String::from_utf8_lossy(key)
            )));
        }
        Ok(())
    }

    /// First value stored under `key`.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.ensure_readable()?;
        self.backend.get(key)
    }

    /// Every value stored under `key`, in insertion order.
    pub fn get_all(&self, key: &[u8]) -> Result<Vec<Vec<u8>>> {
        self.scan(ScanSpec::exact(key))?
            .map(|entry| entry.map(|e| e.value))
            .collect()
    }

    pub fn contains_key(&self, key: &[u8]) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    pub fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.ensure_writable()?;
        Self::check_data_key(key)?;

        if let Some(sorter) = self.bulk.as_mut() {
            return sorter.push(key, value);
        }

        if self.allow_duplicates {
            self.backend.insert(key, value)
        } else {
            // Rewriting an identical value would still dirty the file.
            if self.backend.get(key)?.as_deref() == Some(value) {
                return Ok(());
            }
            self.backend.replace(key, value)
        }
    }

    /// Remove every entry stored under `key`.
    pub fn delete(&mut self, key: &[u8]) -> Result<usize> {
        self.ensure_writable()?;
        self.ensure_readable()?;
        self.backend.remove_key(key)
    }

    pub fn scan(&self, spec: ScanSpec) -> Result<Scan<'_>> {
        self.ensure_readable()?;
        let inner = self.backend.range(spec.lower_bound());
        Ok(Scan::new(inner, spec))
    }

    /// Walk the entries selected by `spec`, deleting the ones for which
    /// `visit` answers [`ScanAction::Delete`]. Returns the number deleted.
    pub fn retain<F, E>(&mut self, spec: ScanSpec, mut visit: F) -> std::result::Result<usize, E>
    where
        F: FnMut(&crate::Entry) -> std::result::Result<ScanAction, E>,
        E: From<StoreError>,
    {
        self.ensure_writable()?;
        self.ensure_readable()?;

        let mut doomed = Vec::new();
        for entry in self.scan(spec)? {
            let entry = entry?;
            match visit(&entry)? {
                ScanAction::Keep => {}
                ScanAction::Delete => doomed.push((entry.key, entry.seq)),
                ScanAction::Stop => break,
            }
        }

        let mut removed = 0;
        for (key, seq) in doomed {
            if self.backend.remove_entry(&key, seq)? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    pub fn get_meta(&self, name: &str) -> Result<Option<String>> {
        Ok(self
            .backend
            .get(&meta_key(name))?
            .map(|v| String::from_utf8_lossy(&v).into_owned()))
    }

    /// Meta records bypass the bulk sorter and always replace.
    pub fn put_meta(&mut self, name: &str, value: &str) -> Result<()> {
        self.ensure_writable()?;
        bulk::validate(name.as_bytes(), value.as_bytes())?;
        let key = meta_key(name);
        if self.backend.get(&key)?.as_deref() == Some(value.as_bytes()) {
            return Ok(());
        }
        self.backend.replace(&key, value.as_bytes())
    }

    pub fn delete_meta(&mut self, name: &str) -> Result<bool> {
        self.ensure_writable()?;
        Ok(self.backend.remove_key(&meta_key(name))? > 0)
    }

    /// Replay the bulk-sorted records into the backend and leave bulk mode.
    pub fn end_bulk(&mut self) -> Result<usize> {
        let Some(sorter) = self.bulk.take() else {
            return Ok(0);
        };
        let backend = &mut self.backend;
        let allow_duplicates = self.allow_duplicates;
        let count = sorter.drain(|key, value| {
            if allow_duplicates {
                backend.insert(key, value)
            } else {
                backend.replace(key, value)
            }
        })?;
        tracing::debug!(
            "Replayed {} sorted records into {}",
            count,
            self.path.display()
        );
        Ok(count)
    }

    /// Number of data records (meta records excluded).
    pub fn len(&self) -> Result<usize> {
        Ok(self.stats()?.entries)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn stats(&self) -> Result<StoreStats> {
        self.ensure_readable()?;
        let total = self.backend.len()?;
        let mut meta_entries = 0;
        for entry in self.scan(ScanSpec::prefix(vec![META_PREFIX]).raw())? {
            entry?;
            meta_entries += 1;
        }
        Ok(StoreStats {
            backend: self.backend.kind(),
            entries: total - meta_entries,
            meta_entries,
        })
    }

    /// Finish any bulk write and make everything durable.
    pub fn close(mut self) -> Result<()> {
        self.end_bulk()?;
        let path = self.path;
        self.backend.commit()?;
        tracing::trace!("Closed {}", path.display());
        Ok(())
    }
}
