//! Change detection between the source tree and the path table.

use crate::error::Result;
use crate::idset::IdSet;
use crate::paths::PathTable;
use crate::scanner::ScannedFile;
use std::collections::HashSet;
use std::time::SystemTime;

/// What a run has to do.
#[derive(Debug)]
pub struct ChangeSet {
    /// Files to register and (for sources) extract.
    pub add: Vec<ScannedFile>,
    /// Ids whose stored records are stale.
    pub delete: IdSet,
    /// Registered paths no longer in the tree.
    pub removed: Vec<String>,
}

impl ChangeSet {
    pub fn empty(capacity: u32) -> Self {
        Self {
            add: Vec::new(),
            delete: IdSet::with_capacity(capacity),
            removed: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.delete.is_empty() && self.removed.is_empty()
    }
}

fn is_modified(file: &ScannedFile, snapshot: Option<SystemTime>) -> bool {
    match (file.mtime, snapshot) {
        (Some(mtime), Some(snapshot)) => mtime > snapshot,
        _ => true,
    }
}

/// Compare the scanned tree against every registered path.
pub fn diff_tree(
    scanned: Vec<ScannedFile>,
    paths: &PathTable,
    snapshot: Option<SystemTime>,
) -> Result<ChangeSet> {
    let mut changes = ChangeSet::empty(paths.next_id());
    let mut seen = HashSet::with_capacity(scanned.len());

    for file in scanned {
        seen.insert(file.path.clone());
        match paths.lookup(&file.path)? {
            None => changes.add.push(file),
            Some(record) => {
                if record.kind != file.kind || is_modified(&file, snapshot) {
                    changes.delete.add(record.file_id)?;
                    changes.add.push(file);
                }
            }
        }
    }

    for record in paths.entries()? {
        if !seen.contains(&record.path) {
            changes.delete.add(record.file_id)?;
            changes.removed.push(record.path);
        }
    }

    Ok(changes)
}

/// Changes for a single registered file. `current` is the file as it is
/// on disk now, `None` when it is gone.
pub fn diff_single(
    path: &str,
    current: Option<ScannedFile>,
    paths: &PathTable,
) -> Result<Option<ChangeSet>> {
    let Some(record) = paths.lookup(path)? else {
        return Ok(None);
    };
    let mut changes = ChangeSet::empty(paths.next_id());
    changes.delete.add(record.file_id)?;
    match current {
        Some(file) => changes.add.push(file),
        None => changes.removed.push(record.path),
    }
    Ok(Some(changes))
}
