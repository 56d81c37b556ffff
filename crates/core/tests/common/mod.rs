#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tagscope_core::extract::{Extractor, TagEvent, TagKind, TagSink};
use tagscope_core::{
    BackendKind, BuildRequest, DbLayout, IndexReport, Indexer, IndexerConfig, PathTable,
    SortHelper, SourceEnumerator, TagEntry, TagQuery, TagSettings, TagStore, TagTable,
};
use tagscope_core::{OpenMode, Result, TagscopeError};
use tempfile::TempDir;

/// A toy language: `def NAME` defines, `call NAME` uses, `!` lines are
/// malformed, `fail` aborts the parse.
pub struct ToyExtractor;

impl Extractor for ToyExtractor {
    fn name(&self) -> &str {
        "toy"
    }

    fn accepts(&self, path: &Path) -> bool {
        path.extension().is_some_and(|e| e == "toy")
    }

    fn extract(&self, _path: &Path, source: &str, sink: &mut dyn TagSink) -> Result<()> {
        for (idx, line) in source.lines().enumerate() {
            let lno = idx as u32 + 1;
            let mut words = line.split_whitespace();
            match (words.next(), words.next()) {
                (Some("def"), Some(name)) => sink.tag(TagEvent {
                    kind: TagKind::Definition,
                    tag: name.to_string(),
                    line: lno,
                    image: line.to_string(),
                }),
                (Some("call"), Some(name)) => sink.tag(TagEvent {
                    kind: TagKind::Symbol,
                    tag: name.to_string(),
                    line: lno,
                    image: line.to_string(),
                }),
                (Some(w), _) if w.starts_with('!') => {
                    sink.warn(lno, format!("unexpected {:?}", w));
                }
                (Some("fail"), _) => {
                    return Err(TagscopeError::Parsing("toy parser gave up".to_string()));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

pub struct Workspace {
    pub dir: TempDir,
    pub backend: BackendKind,
}

impl Workspace {
    pub fn new(backend: BackendKind) -> Self {
        Self {
            dir: TempDir::new().unwrap(),
            backend,
        }
    }

    /// A tree under the working directory, addressed by a relative path.
    pub fn relative(backend: BackendKind) -> Self {
        let dir = tempfile::Builder::new()
            .prefix("tree")
            .tempdir_in(".")
            .unwrap();
        assert!(dir.path().is_relative());
        Self { dir, backend }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn layout(&self) -> DbLayout {
        DbLayout::new(self.root())
    }

    pub fn write(&self, rel: &str, content: &str) -> PathBuf {
        let path = self.root().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    /// Rewrite a file and push its mtime clearly past any snapshot.
    pub fn edit(&self, rel: &str, content: &str) {
        let path = self.write(rel, content);
        let later = SystemTime::now() + Duration::from_secs(60);
        fs::File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(later)
            .unwrap();
    }

    pub fn remove(&self, rel: &str) {
        fs::remove_file(self.root().join(rel)).unwrap();
    }

    pub fn config(&self, request: BuildRequest) -> IndexerConfig {
        IndexerConfig::new(self.root())
            .request(request)
            .backend(self.backend)
            .sort(SortHelper::InProcess)
    }

    pub fn run(&self, request: BuildRequest) -> IndexReport {
        self.try_run(self.config(request)).unwrap()
    }

    pub fn try_run(&self, config: IndexerConfig) -> Result<IndexReport> {
        let extractor = ToyExtractor;
        let enumerator = SourceEnumerator::new(&extractor).include_other(config.include_other_files);
        Indexer::new(config, &enumerator, &extractor).run()
    }

    pub fn paths(&self) -> PathTable {
        PathTable::open(&self.layout().paths_path(), OpenMode::ReadOnly, self.backend).unwrap()
    }

    pub fn query(&self, table: TagTable, query: &TagQuery) -> Vec<TagEntry> {
        let store = TagStore::open(
            &self.layout(),
            table,
            OpenMode::ReadOnly,
            &TagSettings::default(),
        )
        .unwrap();
        let paths = self.paths();
        let entries = store.scan(query, &paths).unwrap();
        store.close().unwrap();
        paths.close().unwrap();
        entries
    }

    pub fn locations(&self, table: TagTable, tag: &str) -> Vec<(String, u32)> {
        self.query(table, &TagQuery::exact(tag))
            .into_iter()
            .map(|e| (e.path, e.line))
            .collect()
    }

    pub fn table_bytes(&self) -> Vec<Vec<u8>> {
        let layout = self.layout();
        [layout.defs_path(), layout.refs_path(), layout.paths_path()]
            .iter()
            .map(|p| fs::read(p).unwrap())
            .collect()
    }
}

pub fn backends() -> [BackendKind; 2] {
    [BackendKind::BTreeFile, BackendKind::Sqlite]
}
