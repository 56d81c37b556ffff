//! Incremental indexing.
//!
//! A run walks `Scanning -> Diffing -> Extracting -> Writing ->
//! Reclassifying -> Committing -> Done`. New records are staged per file
//! and only written after the stale records of the same run have been
//! deleted, so a re-extracted file never loses its fresh tags. Nothing is
//! persisted unless the run reaches Committing.

pub mod diff;
pub mod report;

pub use diff::{ChangeSet, diff_single, diff_tree};
pub use report::{BuildMode, IndexReport, Phase};

use crate::cancel::CancelFlag;
use crate::config::{BuildRequest, IndexerConfig};
use crate::db::{DEFS_FILE, DbLayout, PATHS_FILE, REFS_FILE};
use crate::error::{Result, TagscopeError};
use crate::extract::{Extractor, ParseWarning, TagEvent, TagKind, TagSink};
use crate::idset::IdSet;
use crate::paths::{FileKind, PathTable, normalize_path};
use crate::scanner::{FileEnumerator, ScannedFile};
use crate::tags::{TagStore, TagTable};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime};
use tagscope_store::OpenMode;

pub struct Indexer<'a> {
    config: IndexerConfig,
    enumerator: &'a dyn FileEnumerator,
    extractor: &'a dyn Extractor,
    cancel: CancelFlag,
}

/// The three open tables of one run.
struct Tables {
    paths: PathTable,
    defs: TagStore,
    refs: TagStore,
}

impl Tables {
    fn open(layout: &DbLayout, mode: OpenMode, config: &IndexerConfig) -> Result<Self> {
        let settings = config.tag_settings(mode == OpenMode::Create);
        Ok(Self {
            paths: PathTable::open(&layout.paths_path(), mode, config.backend)?,
            defs: TagStore::open(layout, TagTable::Definitions, mode, &settings)?,
            refs: TagStore::open(layout, TagTable::References, mode, &settings)?,
        })
    }

    fn close(self) -> Result<()> {
        self.defs.close()?;
        self.refs.close()?;
        self.paths.close()
    }
}

impl<'a> Indexer<'a> {
    /// A relative root is resolved against the working directory here, so
    /// every stored path is relative to the tree itself.
    pub fn new(
        mut config: IndexerConfig,
        enumerator: &'a dyn FileEnumerator,
        extractor: &'a dyn Extractor,
    ) -> Self {
        if let Ok(root) = fs::canonicalize(&config.root) {
            config.root = root;
        }
        Self {
            config,
            enumerator,
            extractor,
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &IndexerConfig {
        &self.config
    }

    pub fn run(&self) -> Result<IndexReport> {
        let layout = self.config.layout();
        let mode = self.resolve_mode(&layout)?;
        let started = SystemTime::now();
        let clock = Instant::now();
        tracing::info!(
            "Indexing {} into {} ({:?})",
            self.config.root.display(),
            layout.dir().display(),
            mode
        );

        let result = match mode {
            BuildMode::Full => self.run_full(&layout, started),
            BuildMode::Incremental | BuildMode::SingleFile => {
                self.run_update(&layout, mode, started)
            }
        };

        match &result {
            Ok(report) => tracing::info!(
                "Indexed {} files ({} definitions, {} references, {} stale ids) in {:?}",
                report.files_extracted,
                report.definitions,
                report.references,
                report.deleted.len(),
                clock.elapsed()
            ),
            Err(e) => {
                tracing::error!("Indexing failed: {}", e);
                // A failed full build must not leave half-written tables behind.
                if mode == BuildMode::Full {
                    if let Err(cleanup) = layout.remove_all() {
                        tracing::warn!("Failed to remove partial tables: {}", cleanup);
                    }
                }
            }
        }
        result
    }

    fn resolve_mode(&self, layout: &DbLayout) -> Result<BuildMode> {
        if self.config.request == BuildRequest::Full {
            return Ok(BuildMode::Full);
        }
        let present = layout.present();
        if present.none() {
            tracing::info!(
                "No tag database in {}, building from scratch",
                layout.dir().display()
            );
            return Ok(BuildMode::Full);
        }
        if !present.all() {
            return Err(TagscopeError::Consistency(format!(
                "incomplete tag database in {} ({}: {}, {}: {}, {}: {})",
                layout.dir().display(),
                DEFS_FILE,
                present.defs,
                REFS_FILE,
                present.refs,
                PATHS_FILE,
                present.paths
            )));
        }
        Ok(match self.config.request {
            BuildRequest::SingleFile(_) => BuildMode::SingleFile,
            _ => BuildMode::Incremental,
        })
    }

    fn run_full(&self, layout: &DbLayout, started: SystemTime) -> Result<IndexReport> {
        let mut report = IndexReport::new(BuildMode::Full);
        layout.remove_all()?;
        fs::create_dir_all(layout.dir())?;

        report.enter(Phase::Scanning);
        let scanned = self.scan()?;

        report.enter(Phase::Diffing);
        let changes = ChangeSet {
            add: scanned,
            delete: IdSet::with_capacity(0),
            removed: Vec::new(),
        };

        let tables = Tables::open(layout, OpenMode::Create, &self.config)?;
        self.apply(layout, tables, changes, report, started)
    }

    fn run_update(
        &self,
        layout: &DbLayout,
        mode: BuildMode,
        started: SystemTime,
    ) -> Result<IndexReport> {
        let snapshot = layout.snapshot_time()?;
        let tables = Tables::open(layout, OpenMode::Modify, &self.config)?;
        let mut report = IndexReport::new(mode);

        let single = match &self.config.request {
            BuildRequest::SingleFile(path) => self.single_changes(path, &tables.paths)?,
            _ => None,
        };
        let changes = match single {
            Some(changes) => {
                report.enter(Phase::Diffing);
                changes
            }
            None => {
                if mode == BuildMode::SingleFile {
                    tracing::info!("File is not registered, updating the whole tree");
                    report.mode = BuildMode::Incremental;
                }
                report.enter(Phase::Scanning);
                let scanned = self.scan()?;
                report.enter(Phase::Diffing);
                diff_tree(scanned, &tables.paths, snapshot)?
            }
        };

        self.apply(layout, tables, changes, report, started)
    }

    fn scan(&self) -> Result<Vec<ScannedFile>> {
        let mut files = self.enumerator.enumerate(&self.config.root)?;
        files.retain(|f| !is_database_file(&f.path));
        Ok(files)
    }

    fn single_changes(&self, path: &Path, paths: &PathTable) -> Result<Option<ChangeSet>> {
        let root = &self.config.root;
        let canonical = normalize_path(root, path)
            .ok_or_else(|| TagscopeError::OutsideRoot(path.to_path_buf()))?;
        let absolute = self.absolute(&canonical);

        let current = match fs::metadata(&absolute) {
            Ok(meta) if meta.is_file() => {
                let kind = if self.extractor.accepts(&absolute) {
                    Some(FileKind::Source)
                } else if self.config.include_other_files {
                    Some(FileKind::Other)
                } else {
                    None
                };
                kind.map(|kind| ScannedFile {
                    path: canonical.clone(),
                    kind,
                    mtime: meta.modified().ok(),
                })
            }
            _ => None,
        };
        diff_single(&canonical, current, paths)
    }

    fn absolute(&self, canonical: &str) -> PathBuf {
        self.config
            .root
            .join(canonical.strip_prefix("./").unwrap_or(canonical))
    }

    fn apply(
        &self,
        layout: &DbLayout,
        mut tables: Tables,
        changes: ChangeSet,
        mut report: IndexReport,
        started: SystemTime,
    ) -> Result<IndexReport> {
        report.deleted = changes.delete.iter().collect();
        report.removed = changes.removed.clone();
        if !changes.is_empty() {
            tracing::info!(
                "{} files to add, {} stale ids, {} removed paths",
                changes.add.len(),
                changes.delete.count(),
                changes.removed.len()
            );
        }

        report.enter(Phase::Extracting);
        for file in &changes.add {
            self.cancel.check()?;
            self.extract_file(file, &mut tables, &mut report)?;
            report.added.push(file.path.clone());
        }

        report.enter(Phase::Writing);
        report.records_deleted += tables.defs.delete(&changes.delete, &self.cancel)?;
        tables.defs.commit()?;
        for path in &changes.removed {
            tables.paths.delete(path)?;
        }

        report.enter(Phase::Reclassifying);
        report.records_deleted += tables.refs.delete(&changes.delete, &self.cancel)?;
        tables.refs.commit()?;
        report.classification = tables.refs.classify(&tables.defs)?;

        report.enter(Phase::Committing);
        self.cancel.check()?;
        tables.close()?;
        layout.touch_all(started)?;

        report.enter(Phase::Done);
        Ok(report)
    }

    fn extract_file(
        &self,
        file: &ScannedFile,
        tables: &mut Tables,
        report: &mut IndexReport,
    ) -> Result<()> {
        let file_id = tables.paths.put(&file.path, file.kind)?;
        if file.kind == FileKind::Other {
            return Ok(());
        }

        let absolute = self.absolute(&file.path);
        let source = match fs::read(&absolute) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) if self.config.skip_unreadable => {
                tracing::warn!("Skipping unreadable {}: {}", file.path, e);
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let mut sink = RoutingSink::new(&file.path, file_id, &mut tables.defs, &mut tables.refs);
        let outcome = self.extractor.extract(&absolute, &source, &mut sink);
        let RoutingSink {
            error,
            definitions,
            references,
            mut warnings,
            ..
        } = sink;
        if let Some(e) = error {
            return Err(e);
        }
        match outcome {
            Ok(()) => {}
            Err(TagscopeError::Parsing(message)) => warnings.push(ParseWarning {
                path: file.path.clone(),
                line: 0,
                message,
            }),
            Err(e) => return Err(e),
        }

        for warning in &warnings {
            tracing::warn!("{}:{}: {}", warning.path, warning.line, warning.message);
        }
        report.warnings.extend(warnings);

        tables.defs.flush(file_id)?;
        tables.refs.flush(file_id)?;
        report.files_extracted += 1;
        report.definitions += definitions;
        report.references += references;
        Ok(())
    }
}

fn is_database_file(path: &str) -> bool {
    let name = path.rsplit('/').next().unwrap_or(path);
    let name = name.strip_suffix(".tmp").unwrap_or(name);
    [DEFS_FILE, REFS_FILE, PATHS_FILE].contains(&name)
}

/// Sends definitions to one table and every other use to the shared
/// References/Symbols table. The first storage error stops routing.
struct RoutingSink<'s> {
    path: &'s str,
    file_id: u32,
    defs: &'s mut TagStore,
    refs: &'s mut TagStore,
    definitions: usize,
    references: usize,
    warnings: Vec<ParseWarning>,
    error: Option<TagscopeError>,
}

impl<'s> RoutingSink<'s> {
    fn new(path: &'s str, file_id: u32, defs: &'s mut TagStore, refs: &'s mut TagStore) -> Self {
        Self {
            path,
            file_id,
            defs,
            refs,
            definitions: 0,
            references: 0,
            warnings: Vec::new(),
            error: None,
        }
    }
}

impl TagSink for RoutingSink<'_> {
    fn tag(&mut self, event: TagEvent) {
        if self.error.is_some() {
            return;
        }
        let (table, counter) = match event.kind {
            TagKind::Definition => (&mut *self.defs, &mut self.definitions),
            TagKind::Reference | TagKind::Symbol => (&mut *self.refs, &mut self.references),
        };
        match table.put(&event.tag, event.line, self.file_id, Some(&event.image)) {
            Ok(true) => *counter += 1,
            Ok(false) => {}
            Err(e) => self.error = Some(e),
        }
    }

    fn warn(&mut self, line: u32, message: String) {
        self.warnings.push(ParseWarning {
            path: self.path.to_string(),
            line,
            message,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_files_are_never_indexed() {
        assert!(is_database_file("./tags.defs"));
        assert!(is_database_file("./db/tags.paths"));
        assert!(is_database_file("./tags.refs.tmp"));
        assert!(!is_database_file("./src/tags.rs"));
    }
}
