//! Source tree enumeration.

use crate::error::Result;
use crate::extract::Extractor;
use crate::paths::{FileKind, normalize_path};
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedFile {
    /// Canonical `./`-relative path.
    pub path: String,
    pub kind: FileKind,
    /// `None` when the modification time cannot be read.
    pub mtime: Option<SystemTime>,
}

/// Lists the candidate files of a source tree.
pub trait FileEnumerator {
    /// Every candidate file under `root`, sorted by canonical path.
    fn enumerate(&self, root: &Path) -> Result<Vec<ScannedFile>>;
}

pub fn is_relevant_path(path: &Path) -> bool {
    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
        if name.starts_with('.') {
            return false;
        }
        if name == "target" || name == "node_modules" {
            return false;
        }
    }
    true
}

/// Walks the tree with gitignore rules, classifying files through an
/// extractor.
pub struct SourceEnumerator<'a> {
    extractor: &'a dyn Extractor,
    include_other: bool,
    exclude: Vec<PathBuf>,
}

impl<'a> SourceEnumerator<'a> {
    pub fn new(extractor: &'a dyn Extractor) -> Self {
        Self {
            extractor,
            include_other: false,
            exclude: Vec::new(),
        }
    }

    /// Also list files no extractor understands, as [`FileKind::Other`].
    pub fn include_other(mut self, include: bool) -> Self {
        self.include_other = include;
        self
    }

    /// Never descend into `dir` (typically the database directory).
    pub fn exclude(mut self, dir: impl Into<PathBuf>) -> Self {
        self.exclude.push(dir.into());
        self
    }
}

impl FileEnumerator for SourceEnumerator<'_> {
    fn enumerate(&self, root: &Path) -> Result<Vec<ScannedFile>> {
        let canonical_root = std::fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());
        let exclude: Vec<PathBuf> = self
            .exclude
            .iter()
            .map(|p| std::fs::canonicalize(p).unwrap_or_else(|_| p.clone()))
            .filter(|p| *p != canonical_root)
            .collect();

        let mut files: Vec<ScannedFile> = WalkBuilder::new(root)
            .filter_entry(move |entry| {
                if entry.depth() == 0 {
                    return true;
                }
                let path = entry.path();
                if !is_relevant_path(path) {
                    return false;
                }
                let canonical = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
                !exclude.iter().any(|dir| canonical.starts_with(dir))
            })
            .build()
            .filter_map(|entry| {
                let entry = entry.ok()?;
                let path = entry.path();
                if !path.is_file() {
                    return None;
                }
                let kind = if self.extractor.accepts(path) {
                    FileKind::Source
                } else if self.include_other {
                    FileKind::Other
                } else {
                    return None;
                };
                // Walked entries carry the root as given, relative or not.
                let relative = path.strip_prefix(root).unwrap_or(path);
                let Some(canonical) = normalize_path(root, relative) else {
                    tracing::warn!("Skipping unrepresentable path {}", path.display());
                    return None;
                };
                let mtime = entry.metadata().ok().and_then(|m| m.modified().ok());
                Some(ScannedFile {
                    path: canonical,
                    kind,
                    mtime,
                })
            })
            .collect();

        files.sort_by(|a, b| a.path.cmp(&b.path));
        files.dedup_by(|a, b| a.path == b.path);
        tracing::debug!("Enumerated {} files under {}", files.len(), root.display());
        Ok(files)
    }
}
