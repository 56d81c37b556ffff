use crate::error::Result;
use regex::bytes::Regex;
use serde::Serialize;
use tagscope_store::{KvStore, ScanSpec};

/// Which tag names a query selects.
#[derive(Debug, Clone, Default)]
pub enum TagPattern {
    #[default]
    Any,
    Exact(String),
    Prefix(String),
    Regex(Regex),
}

impl TagPattern {
    pub(crate) fn scan_spec(&self) -> ScanSpec {
        match self {
            TagPattern::Any => ScanSpec::all(),
            TagPattern::Exact(name) => ScanSpec::exact(name.as_bytes()),
            TagPattern::Prefix(prefix) => ScanSpec::prefix(prefix.as_bytes()),
            TagPattern::Regex(re) => ScanSpec::all().with_filter(re.clone()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScanMode {
    /// Grouped by tag; within a tag ordered by path, then line.
    #[default]
    ByTag,
    /// Ordered by path, then line, then tag.
    ByPath,
    /// Physical storage order.
    All,
}

#[derive(Debug, Clone, Default)]
pub struct TagQuery {
    pub pattern: TagPattern,
    /// Only records of this file id.
    pub file: Option<u32>,
    pub mode: ScanMode,
}

impl TagQuery {
    pub fn exact(name: impl Into<String>) -> Self {
        Self {
            pattern: TagPattern::Exact(name.into()),
            ..Self::default()
        }
    }

    pub fn all() -> Self {
        Self::default()
    }

    pub fn in_file(file_id: u32) -> Self {
        Self {
            file: Some(file_id),
            mode: ScanMode::ByPath,
            ..Self::default()
        }
    }

    pub fn with_mode(mut self, mode: ScanMode) -> Self {
        self.mode = mode;
        self
    }
}

/// One decoded tag occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagEntry {
    pub tag: String,
    pub file_id: u32,
    pub path: String,
    pub line: u32,
    /// Source text of the line; compact records carry none.
    pub image: Option<String>,
}

/// Membership test against the Definitions table.
///
/// Scans visit records grouped by tag, so remembering the last answer
/// saves almost every lookup.
pub struct DefinitionProbe<'a> {
    defs: &'a KvStore,
    last: Option<(Vec<u8>, bool)>,
}

impl<'a> DefinitionProbe<'a> {
    pub fn new(defs: &'a KvStore) -> Self {
        Self { defs, last: None }
    }

    pub fn is_defined(&mut self, tag: &[u8]) -> Result<bool> {
        if let Some((last_tag, defined)) = &self.last {
            if last_tag.as_slice() == tag {
                return Ok(*defined);
            }
        }
        let defined = self.defs.contains_key(tag)?;
        self.last = Some((tag.to_vec(), defined));
        Ok(defined)
    }
}
