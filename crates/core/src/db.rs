//! On-disk layout of a tag database directory.

use crate::error::Result;
use crate::tags::TagTable;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

pub const DEFS_FILE: &str = "tags.defs";
pub const REFS_FILE: &str = "tags.refs";
pub const PATHS_FILE: &str = "tags.paths";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresentFiles {
    pub defs: bool,
    pub refs: bool,
    pub paths: bool,
}

impl PresentFiles {
    pub fn all(&self) -> bool {
        self.defs && self.refs && self.paths
    }

    pub fn none(&self) -> bool {
        !self.defs && !self.refs && !self.paths
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbLayout {
    dir: PathBuf,
}

impl DbLayout {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn defs_path(&self) -> PathBuf {
        self.dir.join(DEFS_FILE)
    }

    pub fn refs_path(&self) -> PathBuf {
        self.dir.join(REFS_FILE)
    }

    pub fn paths_path(&self) -> PathBuf {
        self.dir.join(PATHS_FILE)
    }

    /// References and Symbols share one physical file.
    pub fn table_path(&self, table: TagTable) -> PathBuf {
        match table {
            TagTable::Definitions => self.defs_path(),
            TagTable::References | TagTable::Symbols => self.refs_path(),
        }
    }

    pub fn present(&self) -> PresentFiles {
        PresentFiles {
            defs: self.defs_path().is_file(),
            refs: self.refs_path().is_file(),
            paths: self.paths_path().is_file(),
        }
    }

    /// Delete every table file, returning how many existed.
    pub fn remove_all(&self) -> Result<usize> {
        let mut removed = 0;
        for path in [self.defs_path(), self.refs_path(), self.paths_path()] {
            if path.exists() {
                fs::remove_file(&path)?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Baseline for change detection: when the Definitions table was last
    /// committed.
    pub fn snapshot_time(&self) -> Result<Option<SystemTime>> {
        let path = self.defs_path();
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::metadata(path)?.modified()?))
    }

    /// Stamp every table file with `time`, even if its content did not
    /// change during the run.
    pub fn touch_all(&self, time: SystemTime) -> Result<()> {
        for path in [self.defs_path(), self.refs_path(), self.paths_path()] {
            if path.exists() {
                File::options().write(true).open(&path)?.set_modified(time)?;
            }
        }
        Ok(())
    }
}
