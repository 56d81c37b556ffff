//! Single-file backend.
//!
//! The whole map is loaded at open time and rewritten on commit. Layout:
//!
//! ```text
//! MAGIC (12) | container version (u32 LE) | xxh3 of body (u64 LE) | body
//! ```
//!
//! `body` is the zstd-compressed MessagePack encoding of [`Snapshot`].

use super::{Backend, BackendKind, Entry, EntryIter};
use crate::error::{Result, StoreError};
use crate::store::OpenMode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::ops::Bound;
use std::path::{Path, PathBuf};
use xxhash_rust::xxh3::xxh3_64;

pub(crate) const MAGIC: &[u8; 12] = b"TAGSCOPE-KV\0";
const CONTAINER_VERSION: u32 = 1;
const HEADER_LEN: usize = 12 + 4 + 8;
const ZSTD_LEVEL: i32 = 3;

#[derive(Serialize, Deserialize)]
struct Snapshot {
    next_seq: u64,
    keys: Vec<SnapshotKey>,
}

#[derive(Serialize, Deserialize)]
struct SnapshotKey {
    #[serde(with = "serde_bytes")]
    key: Vec<u8>,
    values: Vec<SnapshotValue>,
}

#[derive(Serialize, Deserialize)]
struct SnapshotValue {
    seq: u64,
    #[serde(with = "serde_bytes")]
    value: Vec<u8>,
}

pub(crate) struct BTreeFileBackend {
    path: PathBuf,
    writable: bool,
    dirty: bool,
    next_seq: u64,
    map: BTreeMap<Vec<u8>, Vec<(u64, Vec<u8>)>>,
}

impl BTreeFileBackend {
    pub(crate) fn open(path: &Path, mode: OpenMode) -> Result<Self> {
        match mode {
            OpenMode::Create => Ok(Self {
                path: path.to_path_buf(),
                writable: true,
                // A freshly created table must exist on disk after commit even if empty.
                dirty: true,
                next_seq: 1,
                map: BTreeMap::new(),
            }),
            OpenMode::ReadOnly | OpenMode::Modify => {
                let bytes = fs::read(path)?;
                let snapshot = decode(path, &bytes)?;
                let mut map = BTreeMap::new();
                for k in snapshot.keys {
                    let values = k.values.into_iter().map(|v| (v.seq, v.value)).collect();
                    map.insert(k.key, values);
                }
                Ok(Self {
                    path: path.to_path_buf(),
                    writable: mode == OpenMode::Modify,
                    dirty: false,
                    next_seq: snapshot.next_seq,
                    map,
                })
            }
        }
    }

    fn take_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    fn encode(&self) -> Result<Vec<u8>> {
        let snapshot = Snapshot {
            next_seq: self.next_seq,
            keys: self
                .map
                .iter()
                .map(|(key, values)| SnapshotKey {
                    key: key.clone(),
                    values: values
                        .iter()
                        .map(|(seq, value)| SnapshotValue {
                            seq: *seq,
                            value: value.clone(),
                        })
                        .collect(),
                })
                .collect(),
        };
        let packed = rmp_serde::to_vec(&snapshot)?;
        let body = zstd::encode_all(packed.as_slice(), ZSTD_LEVEL)?;

        let mut out = Vec::with_capacity(HEADER_LEN + body.len());
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&CONTAINER_VERSION.to_le_bytes());
        out.extend_from_slice(&xxh3_64(&body).to_le_bytes());
        out.extend_from_slice(&body);
        Ok(out)
    }
}

fn decode(path: &Path, bytes: &[u8]) -> Result<Snapshot> {
    let corrupt = |msg: &str| StoreError::Corrupt(format!("{}: {}", path.display(), msg));

    if bytes.len() < HEADER_LEN || !bytes.starts_with(MAGIC) {
        return Err(corrupt("bad header"));
    }
    let mut version = [0u8; 4];
    version.copy_from_slice(&bytes[12..16]);
    if u32::from_le_bytes(version) != CONTAINER_VERSION {
        return Err(corrupt("unsupported container version"));
    }
    let mut checksum = [0u8; 8];
    checksum.copy_from_slice(&bytes[16..24]);
    let body = &bytes[HEADER_LEN..];
    if xxh3_64(body) != u64::from_le_bytes(checksum) {
        return Err(corrupt("checksum mismatch"));
    }

    let packed = zstd::decode_all(body).map_err(|e| corrupt(&e.to_string()))?;
    rmp_serde::from_slice(&packed).map_err(|e| corrupt(&e.to_string()))
}

impl Backend for BTreeFileBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::BTreeFile
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self
            .map
            .get(key)
            .and_then(|values| values.first())
            .map(|(_, v)| v.clone()))
    }

    fn insert(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        let seq = self.take_seq();
        self.map
            .entry(key.to_vec())
            .or_default()
            .push((seq, value.to_vec()));
        self.dirty = true;
        Ok(())
    }

    fn replace(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        let seq = self.take_seq();
        self.map.insert(key.to_vec(), vec![(seq, value.to_vec())]);
        self.dirty = true;
        Ok(())
    }

    fn remove_key(&mut self, key: &[u8]) -> Result<usize> {
        let removed = self.map.remove(key).map(|v| v.len()).unwrap_or(0);
        if removed > 0 {
            self.dirty = true;
        }
        Ok(removed)
    }

    fn remove_entry(&mut self, key: &[u8], seq: u64) -> Result<bool> {
        let Some(values) = self.map.get_mut(key) else {
            return Ok(false);
        };
        let before = values.len();
        values.retain(|(s, _)| *s != seq);
        let removed = values.len() != before;
        if values.is_empty() {
            self.map.remove(key);
        }
        if removed {
            self.dirty = true;
        }
        Ok(removed)
    }

    fn range<'a>(&'a self, from: Bound<&[u8]>) -> EntryIter<'a> {
        let iter = self
            .map
            .range::<[u8], _>((from, Bound::Unbounded))
            .flat_map(|(key, values)| {
                values.iter().map(move |(seq, value)| {
                    Ok(Entry {
                        key: key.clone(),
                        value: value.clone(),
                        seq: *seq,
                    })
                })
            });
        Box::new(iter)
    }

    fn len(&self) -> Result<usize> {
        Ok(self.map.values().map(Vec::len).sum())
    }

    fn commit(self: Box<Self>) -> Result<()> {
        if !self.writable || !self.dirty {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let bytes = self.encode()?;

        // Write to a sibling temp file, then rename over the target.
        let mut tmp_name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        tmp_name.push(".tmp");
        let tmp_path = self.path.with_file_name(tmp_name);
        fs::write(&tmp_path, bytes)?;
        fs::rename(&tmp_path, &self.path)?;

        tracing::debug!("Saved {} entries to {}", self.len()?, self.path.display());
        Ok(())
    }
}
