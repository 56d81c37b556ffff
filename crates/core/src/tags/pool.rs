//! Per-file aggregation arena for compact records.
//!
//! A compact record carries every line of one tag in one file, so lines
//! are gathered here while a file is being extracted and turned into
//! records when the file is flushed. The arena only ever holds one file.

use super::linelist;
use crate::error::{Result, TagscopeError};
use std::collections::BTreeMap;

#[derive(Debug, Default)]
pub struct TagPool {
    file_id: Option<u32>,
    tags: BTreeMap<String, Vec<u32>>,
}

impl TagPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, file_id: u32, tag: &str, line: u32) -> Result<()> {
        match self.file_id {
            Some(current) if current != file_id => {
                return Err(TagscopeError::Internal(format!(
                    "tags of file {} pooled before file {} was flushed",
                    file_id, current
                )));
            }
            _ => self.file_id = Some(file_id),
        }
        match self.tags.get_mut(tag) {
            Some(lines) => lines.push(line),
            None => {
                self.tags.insert(tag.to_string(), vec![line]);
            }
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn file_id(&self) -> Option<u32> {
        self.file_id
    }

    /// Empty the arena, yielding each tag with its sorted, deduplicated
    /// lines in tag order.
    pub fn drain(&mut self) -> Vec<(String, Vec<u32>)> {
        self.file_id = None;
        std::mem::take(&mut self.tags)
            .into_iter()
            .map(|(tag, mut lines)| {
                linelist::normalize(&mut lines);
                (tag, lines)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregates_lines_per_tag() {
        let mut pool = TagPool::new();
        pool.put(4, "foo", 12).unwrap();
        pool.put(4, "bar", 3).unwrap();
        pool.put(4, "foo", 10).unwrap();
        pool.put(4, "foo", 12).unwrap();
        pool.put(4, "foo", 11).unwrap();
        assert_eq!(pool.file_id(), Some(4));

        let drained = pool.drain();
        assert_eq!(
            drained,
            vec![
                ("bar".to_string(), vec![3]),
                ("foo".to_string(), vec![10, 11, 12]),
            ]
        );
        assert!(pool.is_empty());
        assert_eq!(pool.file_id(), None);
    }

    #[test]
    fn mixing_files_without_flush_is_an_error() {
        let mut pool = TagPool::new();
        pool.put(1, "a", 1).unwrap();
        assert!(pool.put(2, "a", 1).is_err());
        pool.drain();
        assert!(pool.put(2, "a", 1).is_ok());
    }
}
