use crate::extract::ParseWarning;
use crate::tags::Classification;
use serde::Serialize;

/// States of one indexing run, in the order they are entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Scanning,
    Diffing,
    Extracting,
    Writing,
    Reclassifying,
    Committing,
    Done,
}

/// How a run ended up treating the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildMode {
    Full,
    Incremental,
    SingleFile,
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexReport {
    pub mode: BuildMode,
    /// Paths (re)extracted or (re)registered this run.
    pub added: Vec<String>,
    /// File ids whose records were dropped this run.
    pub deleted: Vec<u32>,
    /// Paths no longer present in the tree.
    pub removed: Vec<String>,
    pub files_extracted: usize,
    pub definitions: usize,
    pub references: usize,
    pub records_deleted: usize,
    pub warnings: Vec<ParseWarning>,
    pub classification: Classification,
    pub phases: Vec<Phase>,
}

impl IndexReport {
    pub(crate) fn new(mode: BuildMode) -> Self {
        Self {
            mode,
            added: Vec::new(),
            deleted: Vec::new(),
            removed: Vec::new(),
            files_extracted: 0,
            definitions: 0,
            references: 0,
            records_deleted: 0,
            warnings: Vec::new(),
            classification: Classification::default(),
            phases: Vec::new(),
        }
    }

    pub(crate) fn enter(&mut self, phase: Phase) {
        tracing::debug!("Entering {:?}", phase);
        self.phases.push(phase);
    }

    /// True when the run found nothing to do.
    pub fn is_noop(&self) -> bool {
        self.added.is_empty() && self.deleted.is_empty() && self.removed.is_empty()
    }
}
