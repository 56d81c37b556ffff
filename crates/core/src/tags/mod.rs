//! Tag tables.
//!
//! Definitions live in their own file. References and Symbols share a
//! second file: a stored use of a name is a Reference when the name also
//! has a definition, and a Symbol otherwise. The split is decided at read
//! time against the Definitions table, so a name gaining or losing its
//! definition moves between the two views without rewriting any record.

pub mod format;
pub mod image;
pub mod linelist;
pub mod pool;
pub mod query;

pub use format::{
    FORMAT_VERSION, OLDEST_SUPPORTED_VERSION, RecordFormat, TagOptions, TagRecord, check_version,
};
pub use pool::TagPool;
pub use query::{DefinitionProbe, ScanMode, TagEntry, TagPattern, TagQuery};

use crate::cancel::CancelFlag;
use crate::db::DbLayout;
use crate::error::{FormatError, Result, TagscopeError};
use crate::idset::IdSet;
use crate::paths::PathTable;
use format::{OPTIONS_KEY, StandardRecord, VERSION_KEY};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tagscope_store::{BackendKind, KvStore, OpenMode, OpenOptions, ScanAction, ScanSpec, SortHelper};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagTable {
    Definitions,
    References,
    Symbols,
}

impl TagTable {
    pub fn as_str(&self) -> &'static str {
        match self {
            TagTable::Definitions => "definitions",
            TagTable::References => "references",
            TagTable::Symbols => "symbols",
        }
    }
}

/// How a table is created or reopened.
#[derive(Debug, Clone, Default)]
pub struct TagSettings {
    /// Requested options; an existing table keeps the ones it was built with.
    pub options: TagOptions,
    /// Backend for newly created files.
    pub backend: BackendKind,
    /// Route writes of a newly created table through a bulk sort.
    pub bulk: Option<SortHelper>,
}

/// Number of stored uses falling into each view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub references: usize,
    pub symbols: usize,
}

pub struct TagStore {
    table: TagTable,
    kv: KvStore,
    options: TagOptions,
    format: RecordFormat,
    pool: TagPool,
    staged: Vec<(String, String)>,
    /// Read-only Definitions table backing the References/Symbols views.
    definitions: Option<KvStore>,
    puts: usize,
}

impl TagStore {
    pub fn open(
        layout: &DbLayout,
        table: TagTable,
        mode: OpenMode,
        settings: &TagSettings,
    ) -> Result<Self> {
        let path = layout.table_path(table);
        let options = match mode {
            OpenMode::Create => {
                let mut kv_options = OpenOptions::create(settings.backend).duplicates(true);
                if let Some(helper) = &settings.bulk {
                    kv_options = kv_options.bulk(helper.clone());
                }
                let kv = KvStore::open(&path, kv_options)?;
                let mut options = settings.options;
                if table != TagTable::Definitions {
                    options.compact = true;
                }
                return Ok(Self::with_kv(table, kv, options, None));
            }
            OpenMode::Modify => OpenOptions::modify().duplicates(true),
            OpenMode::ReadOnly => OpenOptions::read_only().duplicates(true),
        };

        let kv = KvStore::open(&path, options)?;
        let version = kv
            .get_meta(VERSION_KEY)?
            .ok_or_else(|| {
                FormatError::Malformed(format!("{}: no format version", path.display()))
            })?;
        let version = version.trim().parse::<u32>().map_err(|_| {
            FormatError::Malformed(format!("{}: bad format version {:?}", path.display(), version))
        })?;
        check_version(version)?;

        let stored = TagOptions::from_meta(&kv.get_meta(OPTIONS_KEY)?.unwrap_or_default())?;
        if table != TagTable::Definitions && !stored.compact {
            return Err(FormatError::Malformed(format!(
                "{}: reference table is not compact",
                path.display()
            ))
            .into());
        }
        if stored != settings.options && table == TagTable::Definitions {
            tracing::debug!(
                "{} keeps its stored options {:?} (requested {:?})",
                path.display(),
                stored.to_meta(),
                settings.options.to_meta()
            );
        }

        let definitions = if mode == OpenMode::ReadOnly && table != TagTable::Definitions {
            Some(KvStore::open(layout.defs_path(), OpenOptions::read_only())?)
        } else {
            None
        };

        Ok(Self::with_kv(table, kv, stored, definitions))
    }

    fn with_kv(
        table: TagTable,
        kv: KvStore,
        options: TagOptions,
        definitions: Option<KvStore>,
    ) -> Self {
        let format = if options.compact {
            RecordFormat::Compact
        } else {
            RecordFormat::Standard
        };
        Self {
            table,
            kv,
            options,
            format,
            pool: TagPool::new(),
            staged: Vec::new(),
            definitions,
            puts: 0,
        }
    }

    pub fn table(&self) -> TagTable {
        self.table
    }

    pub fn options(&self) -> TagOptions {
        self.options
    }

    pub fn format(&self) -> RecordFormat {
        self.format
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.kv.backend_kind()
    }

    /// Occurrences accepted by [`TagStore::put`] since open.
    pub fn put_count(&self) -> usize {
        self.puts
    }

    /// Record one occurrence of `tag` in the file being extracted.
    ///
    /// Returns `false` when the name cannot be stored as a key (empty,
    /// containing whitespace) or the line number is zero or past
    /// [`linelist::MAX_LINE`].
    pub fn put(&mut self, tag: &str, line: u32, file_id: u32, image: Option<&str>) -> Result<bool> {
        if tag.is_empty()
            || tag.contains(char::is_whitespace)
            || line == 0
            || line > linelist::MAX_LINE
        {
            tracing::trace!("Skipping unstorable tag {:?} at line {}", tag, line);
            return Ok(false);
        }

        match self.format {
            RecordFormat::Compact => self.pool.put(file_id, tag, line)?,
            RecordFormat::Standard => {
                let record = StandardRecord {
                    file_id,
                    tag: tag.to_string(),
                    line,
                    image: image
                        .unwrap_or_default()
                        .trim_end_matches(['\r', '\n'])
                        .replace('\n', " "),
                };
                let value = format::encode_standard(&record, &self.options);
                self.stage(tag.to_string(), value)?;
            }
        }
        self.puts += 1;
        Ok(true)
    }

    /// Turn the pooled tags of `file_id` into records. Must run once the
    /// file is fully extracted and before the next file starts.
    pub fn flush(&mut self, file_id: u32) -> Result<usize> {
        if let Some(pooled) = self.pool.file_id() {
            if pooled != file_id {
                return Err(TagscopeError::Internal(format!(
                    "flush of file {} while file {} is pooled",
                    file_id, pooled
                )));
            }
        }
        let drained = self.pool.drain();
        let count = drained.len();
        for (tag, lines) in drained {
            let value = format::encode_compact(file_id, &tag, &lines, &self.options);
            self.stage(tag, value)?;
        }
        Ok(count)
    }

    fn stage(&mut self, key: String, value: String) -> Result<()> {
        if self.kv.is_bulk() {
            // A bulk-written table is new; nothing can be deleted before the
            // records land, so they go straight to the sorter.
            self.kv.put(key.as_bytes(), value.as_bytes())?;
        } else {
            self.staged.push((key, value));
        }
        Ok(())
    }

    /// Write every staged record.
    pub fn commit(&mut self) -> Result<usize> {
        let staged = std::mem::take(&mut self.staged);
        let count = staged.len();
        for (key, value) in staged {
            self.kv.put(key.as_bytes(), value.as_bytes())?;
        }
        if self.kv.is_bulk() {
            self.kv.end_bulk()?;
        }
        Ok(count)
    }

    /// Remove every record whose file id is in `stale`.
    pub fn delete(&mut self, stale: &IdSet, cancel: &CancelFlag) -> Result<usize> {
        if stale.is_empty() {
            return Ok(0);
        }
        let removed = self.kv.retain(ScanSpec::all(), |entry| {
            cancel.check()?;
            let file_id = format::leading_file_id(&entry.value)?;
            Ok::<_, TagscopeError>(if stale.contains(file_id) {
                ScanAction::Delete
            } else {
                ScanAction::Keep
            })
        })?;
        tracing::debug!(
            "Deleted {} {} records of {} files",
            removed,
            self.table.as_str(),
            stale.count()
        );
        Ok(removed)
    }

    /// Does `tag` have at least one definition? Only meaningful on the
    /// Definitions table.
    pub fn has_definition(&self, tag: &str) -> Result<bool> {
        Ok(self.kv.contains_key(tag.as_bytes())?)
    }

    /// Split the stored uses by current membership in `defs`.
    pub fn classify(&self, defs: &TagStore) -> Result<Classification> {
        let mut probe = DefinitionProbe::new(&defs.kv);
        let mut result = Classification::default();
        for entry in self.kv.scan(ScanSpec::all())? {
            let entry = entry?;
            let record = format::decode(
                self.format,
                &entry.key_str(),
                &entry.value_str(),
                &self.options,
            )?;
            if probe.is_defined(&entry.key)? {
                result.references += record.occurrences();
            } else {
                result.symbols += record.occurrences();
            }
        }
        Ok(result)
    }

    /// Decode the records selected by `query`, resolving file ids through
    /// `paths`. On the References/Symbols views only the matching half of
    /// the shared table is returned.
    pub fn scan(&self, query: &TagQuery, paths: &PathTable) -> Result<Vec<TagEntry>> {
        self.scan_with(query, paths, None)
    }

    /// Like [`TagStore::scan`], classifying against an explicit Definitions
    /// table instead of the one opened alongside this store.
    pub fn scan_with(
        &self,
        query: &TagQuery,
        paths: &PathTable,
        defs: Option<&TagStore>,
    ) -> Result<Vec<TagEntry>> {
        let mut probe = match self.table {
            TagTable::Definitions => None,
            TagTable::References | TagTable::Symbols => {
                let defs = defs
                    .map(|d| &d.kv)
                    .or(self.definitions.as_ref())
                    .ok_or_else(|| {
                        TagscopeError::Internal(format!(
                            "{} view needs the definitions table",
                            self.table.as_str()
                        ))
                    })?;
                Some(DefinitionProbe::new(defs))
            }
        };

        let mut path_cache: HashMap<u32, Option<String>> = HashMap::new();
        let mut entries = Vec::new();

        for entry in self.kv.scan(query.pattern.scan_spec())? {
            let entry = entry?;
            if let Some(probe) = probe.as_mut() {
                let defined = probe.is_defined(&entry.key)?;
                let wanted = match self.table {
                    TagTable::References => defined,
                    _ => !defined,
                };
                if !wanted {
                    continue;
                }
            }

            if let Some(file) = query.file {
                if format::leading_file_id(&entry.value)? != file {
                    continue;
                }
            }

            let record = format::decode(
                self.format,
                &entry.key_str(),
                &entry.value_str(),
                &self.options,
            )?;
            let file_id = record.file_id();
            let path = match path_cache.get(&file_id) {
                Some(p) => p.clone(),
                None => {
                    let p = paths.fid2path(file_id)?;
                    path_cache.insert(file_id, p.clone());
                    p
                }
            };
            let Some(path) = path else {
                tracing::debug!("Record for unknown file id {} skipped", file_id);
                continue;
            };

            match record {
                TagRecord::Standard(r) => entries.push(TagEntry {
                    tag: r.tag,
                    file_id,
                    path,
                    line: r.line,
                    image: Some(r.image),
                }),
                TagRecord::Compact(r) => {
                    for line in r.lines {
                        entries.push(TagEntry {
                            tag: r.tag.clone(),
                            file_id,
                            path: path.clone(),
                            line,
                            image: None,
                        });
                    }
                }
            }
        }

        match query.mode {
            ScanMode::ByTag => entries.sort_by(|a, b| {
                (&a.tag, &a.path, a.line).cmp(&(&b.tag, &b.path, b.line))
            }),
            ScanMode::ByPath => entries.sort_by(|a, b| {
                (&a.path, a.line, &a.tag).cmp(&(&b.path, b.line, &b.tag))
            }),
            ScanMode::All => {}
        }
        Ok(entries)
    }

    /// Number of physical records.
    pub fn record_count(&self) -> Result<usize> {
        Ok(self.kv.len()?)
    }

    /// Persist format metadata and release the file. Everything put must
    /// have been flushed.
    pub fn close(mut self) -> Result<()> {
        if !self.pool.is_empty() {
            return Err(TagscopeError::Internal(format!(
                "{} table closed with unflushed tags",
                self.table.as_str()
            )));
        }
        if self.kv.mode() != OpenMode::ReadOnly {
            self.commit()?;
            self.kv.put_meta(VERSION_KEY, &FORMAT_VERSION.to_string())?;
            self.kv.put_meta(OPTIONS_KEY, &self.options.to_meta())?;
        }
        self.kv.close()?;
        if let Some(defs) = self.definitions {
            defs.close()?;
        }
        Ok(())
    }
}
