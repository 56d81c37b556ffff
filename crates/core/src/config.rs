use crate::db::DbLayout;
use crate::tags::{TagOptions, TagSettings};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tagscope_store::{BackendKind, SortHelper};

pub const ENV_DBPATH: &str = "TAGSCOPE_DBPATH";
pub const ENV_BACKEND: &str = "TAGSCOPE_BACKEND";
pub const ENV_SORT: &str = "TAGSCOPE_SORT";

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildRequest {
    /// Throw the tables away and rebuild from scratch.
    Full,
    /// Bring existing tables up to date with the source tree.
    #[default]
    Incremental,
    /// Re-extract one file only.
    SingleFile(PathBuf),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexerConfig {
    pub root: PathBuf,
    pub db_dir: PathBuf,
    pub request: BuildRequest,
    pub options: TagOptions,
    /// Backend of newly created tables.
    pub backend: BackendKind,
    pub sort: SortHelper,
    /// Register files no extractor understands, without tags.
    pub include_other_files: bool,
    /// Log and skip source files that cannot be read instead of failing.
    pub skip_unreadable: bool,
}

impl IndexerConfig {
    /// Defaults: tables stored in the source root itself.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            db_dir: root.clone(),
            root,
            request: BuildRequest::default(),
            options: TagOptions::default(),
            backend: BackendKind::default(),
            sort: SortHelper::default(),
            include_other_files: false,
            skip_unreadable: true,
        }
    }

    pub fn db_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.db_dir = dir.into();
        self
    }

    pub fn request(mut self, request: BuildRequest) -> Self {
        self.request = request;
        self
    }

    pub fn options(mut self, options: TagOptions) -> Self {
        self.options = options;
        self
    }

    pub fn backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    pub fn sort(mut self, sort: SortHelper) -> Self {
        self.sort = sort;
        self
    }

    pub fn include_other_files(mut self, include: bool) -> Self {
        self.include_other_files = include;
        self
    }

    pub fn skip_unreadable(mut self, skip: bool) -> Self {
        self.skip_unreadable = skip;
        self
    }

    /// Let `TAGSCOPE_DBPATH`, `TAGSCOPE_BACKEND` and `TAGSCOPE_SORT`
    /// override the corresponding settings.
    pub fn apply_env(mut self) -> Self {
        if let Ok(dir) = std::env::var(ENV_DBPATH) {
            if !dir.is_empty() {
                self.db_dir = PathBuf::from(dir);
            }
        }
        if let Ok(name) = std::env::var(ENV_BACKEND) {
            match BackendKind::parse(&name) {
                Some(kind) => self.backend = kind,
                None => tracing::warn!("Ignoring unknown {}={:?}", ENV_BACKEND, name),
            }
        }
        if let Ok(sort) = std::env::var(ENV_SORT) {
            if !sort.is_empty() {
                self.sort = SortHelper::parse(&sort);
            }
        }
        self
    }

    pub fn root_path(&self) -> &Path {
        &self.root
    }

    pub fn layout(&self) -> DbLayout {
        DbLayout::new(&self.db_dir)
    }

    pub(crate) fn tag_settings(&self, bulk: bool) -> TagSettings {
        TagSettings {
            options: self.options,
            backend: self.backend,
            bulk: bulk.then(|| self.sort.clone()),
        }
    }
}
