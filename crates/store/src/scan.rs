use crate::backend::{Entry, EntryIter};
use crate::error::Result;
use crate::meta::is_meta_key;
use regex::bytes::Regex;
use std::ops::Bound;

/// Where a scan starts and when it stops.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ScanStart {
    /// Every entry.
    #[default]
    All,
    /// Every entry whose key is `>=` the given key.
    From(Vec<u8>),
    /// Entries whose key starts with the given bytes.
    Prefix(Vec<u8>),
    /// Entries stored under exactly this key.
    Exact(Vec<u8>),
}

#[derive(Debug, Clone, Default)]
pub struct ScanSpec {
    pub start: ScanStart,
    pub filter: Option<Regex>,
    pub raw: bool,
}

impl ScanSpec {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn from_key(key: impl Into<Vec<u8>>) -> Self {
        Self {
            start: ScanStart::From(key.into()),
            ..Self::default()
        }
    }

    pub fn prefix(prefix: impl Into<Vec<u8>>) -> Self {
        Self {
            start: ScanStart::Prefix(prefix.into()),
            ..Self::default()
        }
    }

    pub fn exact(key: impl Into<Vec<u8>>) -> Self {
        Self {
            start: ScanStart::Exact(key.into()),
            ..Self::default()
        }
    }

    /// Keep only keys matched by `filter`.
    pub fn with_filter(mut self, filter: Regex) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Include meta records.
    pub fn raw(mut self) -> Self {
        self.raw = true;
        self
    }

    pub(crate) fn lower_bound(&self) -> Bound<&[u8]> {
        match &self.start {
            ScanStart::All => Bound::Unbounded,
            ScanStart::From(k) | ScanStart::Prefix(k) | ScanStart::Exact(k) => {
                Bound::Included(k.as_slice())
            }
        }
    }

    /// `true` once `key` is past the end of the scanned range.
    fn is_past_end(&self, key: &[u8]) -> bool {
        match &self.start {
            ScanStart::All | ScanStart::From(_) => false,
            ScanStart::Prefix(p) => !key.starts_with(p),
            ScanStart::Exact(k) => key != k.as_slice(),
        }
    }

    fn accepts(&self, key: &[u8]) -> bool {
        if !self.raw && is_meta_key(key) {
            return false;
        }
        self.filter.as_ref().is_none_or(|re| re.is_match(key))
    }
}

/// What [`crate::KvStore::retain`] does with the entry under the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanAction {
    Keep,
    Delete,
    Stop,
}

/// Cursor over a sorted range of entries.
pub struct Scan<'a> {
    inner: EntryIter<'a>,
    spec: ScanSpec,
    done: bool,
}

impl<'a> Scan<'a> {
    pub(crate) fn new(inner: EntryIter<'a>, spec: ScanSpec) -> Self {
        Self {
            inner,
            spec,
            done: false,
        }
    }
}

impl Iterator for Scan<'_> {
    type Item = Result<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            match self.inner.next()? {
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
                Ok(entry) => {
                    if self.spec.is_past_end(&entry.key) {
                        self.done = true;
                        return None;
                    }
                    if self.spec.accepts(&entry.key) {
                        return Some(Ok(entry));
                    }
                }
            }
        }
        None
    }
}
