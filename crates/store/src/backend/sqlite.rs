//! SQLite backend.
//!
//! One table holds every record; the integer primary key doubles as the
//! insertion sequence. A writable handle runs inside a single transaction
//! that is committed by [`Backend::commit`]; dropping the handle without
//! committing rolls every write back.

use super::{Backend, BackendKind, Entry, EntryIter};
use crate::error::Result;
use crate::store::OpenMode;
use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use std::collections::VecDeque;
use std::fs;
use std::ops::Bound;
use std::path::{Path, PathBuf};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS kv (
        seq   INTEGER PRIMARY KEY,
        key   BLOB NOT NULL,
        value BLOB NOT NULL
    );
    CREATE INDEX IF NOT EXISTS kv_key ON kv (key, seq);
";

const PAGE_SIZE: i64 = 512;

pub(crate) struct SqliteBackend {
    path: PathBuf,
    conn: Connection,
    in_transaction: bool,
}

impl SqliteBackend {
    pub(crate) fn open(path: &Path, mode: OpenMode) -> Result<Self> {
        let conn = match mode {
            OpenMode::ReadOnly => Connection::open_with_flags(
                path,
                OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?,
            OpenMode::Modify => Connection::open_with_flags(
                path,
                OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?,
            OpenMode::Create => {
                if path.exists() {
                    fs::remove_file(path)?;
                }
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent)?;
                }
                let conn = Connection::open(path)?;
                conn.execute_batch(SCHEMA)?;
                conn
            }
        };

        let in_transaction = mode != OpenMode::ReadOnly;
        if in_transaction {
            conn.execute_batch("BEGIN IMMEDIATE")?;
        }

        Ok(Self {
            path: path.to_path_buf(),
            conn,
            in_transaction,
        })
    }
}

impl Backend for SqliteBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Sqlite
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT value FROM kv WHERE key = ?1 ORDER BY seq LIMIT 1")?;
        Ok(stmt.query_row(params![key], |row| row.get(0)).optional()?)
    }

    fn insert(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        let mut stmt = self
            .conn
            .prepare_cached("INSERT INTO kv (key, value) VALUES (?1, ?2)")?;
        stmt.execute(params![key, value])?;
        Ok(())
    }

    fn replace(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.remove_key(key)?;
        self.insert(key, value)
    }

    fn remove_key(&mut self, key: &[u8]) -> Result<usize> {
        let mut stmt = self.conn.prepare_cached("DELETE FROM kv WHERE key = ?1")?;
        Ok(stmt.execute(params![key])?)
    }

    fn remove_entry(&mut self, key: &[u8], seq: u64) -> Result<bool> {
        let mut stmt = self
            .conn
            .prepare_cached("DELETE FROM kv WHERE seq = ?1 AND key = ?2")?;
        Ok(stmt.execute(params![seq as i64, key])? > 0)
    }

    fn range<'a>(&'a self, from: Bound<&[u8]>) -> EntryIter<'a> {
        Box::new(PagedRange {
            conn: &self.conn,
            position: match from {
                Bound::Included(k) => Position::AtOrAfter(k.to_vec()),
                Bound::Excluded(k) => Position::After(k.to_vec()),
                Bound::Unbounded => Position::Start,
            },
            buffer: VecDeque::new(),
            exhausted: false,
        })
    }

    fn len(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM kv", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn commit(mut self: Box<Self>) -> Result<()> {
        if self.in_transaction {
            self.conn.execute_batch("COMMIT")?;
            self.in_transaction = false;
            tracing::debug!("Committed {}", self.path.display());
        }
        Ok(())
    }
}

enum Position {
    Start,
    AtOrAfter(Vec<u8>),
    After(Vec<u8>),
    /// Just past the entry `(key, seq)`.
    Cursor(Vec<u8>, i64),
}

/// Ordered scan that fetches fixed-size pages, resuming after the last
/// `(key, seq)` seen. No statement stays open between pages.
struct PagedRange<'a> {
    conn: &'a Connection,
    position: Position,
    buffer: VecDeque<Entry>,
    exhausted: bool,
}

impl PagedRange<'_> {
    fn fetch_page(&mut self) -> Result<()> {
        let map_row = |row: &rusqlite::Row<'_>| -> rusqlite::Result<Entry> {
            Ok(Entry {
                seq: row.get::<_, i64>(0)? as u64,
                key: row.get(1)?,
                value: row.get(2)?,
            })
        };

        let rows: Vec<Entry> = match &self.position {
            Position::Start => {
                let mut stmt = self.conn.prepare_cached(
                    "SELECT seq, key, value FROM kv ORDER BY key, seq LIMIT ?1",
                )?;
                stmt.query_map(params![PAGE_SIZE], map_row)?
                    .collect::<rusqlite::Result<_>>()?
            }
            Position::AtOrAfter(k) => {
                let mut stmt = self.conn.prepare_cached(
                    "SELECT seq, key, value FROM kv WHERE key >= ?1 ORDER BY key, seq LIMIT ?2",
                )?;
                stmt.query_map(params![k, PAGE_SIZE], map_row)?
                    .collect::<rusqlite::Result<_>>()?
            }
            Position::After(k) => {
                let mut stmt = self.conn.prepare_cached(
                    "SELECT seq, key, value FROM kv WHERE key > ?1 ORDER BY key, seq LIMIT ?2",
                )?;
                stmt.query_map(params![k, PAGE_SIZE], map_row)?
                    .collect::<rusqlite::Result<_>>()?
            }
            Position::Cursor(k, seq) => {
                let mut stmt = self.conn.prepare_cached(
                    "SELECT seq, key, value FROM kv
                     WHERE key > ?1 OR (key = ?1 AND seq > ?2)
                     ORDER BY key, seq LIMIT ?3",
                )?;
                stmt.query_map(params![k, seq, PAGE_SIZE], map_row)?
                    .collect::<rusqlite::Result<_>>()?
            }
        };

        if (rows.len() as i64) < PAGE_SIZE {
            self.exhausted = true;
        }
        if let Some(last) = rows.last() {
            self.position = Position::Cursor(last.key.clone(), last.seq as i64);
        }
        self.buffer.extend(rows);
        Ok(())
    }
}

impl Iterator for PagedRange<'_> {
    type Item = Result<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() && !self.exhausted {
            if let Err(e) = self.fetch_page() {
                self.exhausted = true;
                return Some(Err(e));
            }
        }
        self.buffer.pop_front().map(Ok)
    }
}
