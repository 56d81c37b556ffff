//! Interface to the per-language tag extractors.
//!
//! An extractor reads one source file and reports every tag occurrence it
//! finds through a [`TagSink`]. Files are processed strictly one at a time.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagKind {
    Definition,
    /// A use of a name that the extractor knows to be defined somewhere.
    Reference,
    /// A use of a name whose definition status is unknown.
    Symbol,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagEvent {
    pub kind: TagKind,
    pub tag: String,
    /// 1-based.
    pub line: u32,
    /// The source line the tag occurs on, without its terminator.
    pub image: String,
}

/// A recoverable problem in a source file. Extraction of the file goes on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseWarning {
    pub path: String,
    pub line: u32,
    pub message: String,
}

pub trait TagSink {
    fn tag(&mut self, event: TagEvent);
    fn warn(&mut self, line: u32, message: String);
}

pub trait Extractor: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Whether `path` is a source file this extractor understands.
    fn accepts(&self, path: &Path) -> bool;

    fn extract(&self, path: &Path, source: &str, sink: &mut dyn TagSink) -> Result<()>;
}

/// Dispatches each file to the first extractor that accepts it.
#[derive(Default)]
pub struct ExtractorSet {
    extractors: Vec<Box<dyn Extractor>>,
}

impl ExtractorSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, extractor: impl Extractor + 'static) -> Self {
        self.extractors.push(Box::new(extractor));
        self
    }

    pub fn push(&mut self, extractor: Box<dyn Extractor>) {
        self.extractors.push(extractor);
    }

    pub fn len(&self) -> usize {
        self.extractors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extractors.is_empty()
    }

    fn find(&self, path: &Path) -> Option<&dyn Extractor> {
        self.extractors
            .iter()
            .find(|e| e.accepts(path))
            .map(|e| e.as_ref())
    }
}

impl Extractor for ExtractorSet {
    fn name(&self) -> &str {
        "set"
    }

    fn accepts(&self, path: &Path) -> bool {
        self.find(path).is_some()
    }

    fn extract(&self, path: &Path, source: &str, sink: &mut dyn TagSink) -> Result<()> {
        match self.find(path) {
            Some(extractor) => extractor.extract(path, source, sink),
            None => Ok(()),
        }
    }
}

/// Collects events in memory; handy for tests and one-off parsing.
#[derive(Debug, Default)]
pub struct CollectingSink {
    pub events: Vec<TagEvent>,
    pub warnings: Vec<(u32, String)>,
}

impl TagSink for CollectingSink {
    fn tag(&mut self, event: TagEvent) {
        self.events.push(event);
    }

    fn warn(&mut self, line: u32, message: String) {
        self.warnings.push((line, message));
    }
}
