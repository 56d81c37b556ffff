//! Bulk sorted-write.
//!
//! During a large build the store does not insert records one by one.
//! Records are written as `key SP value LF` lines to a sort helper, and
//! the sorted stream is replayed into the backend in one pass at the end.
//! The protocol is strictly two-phase: every line is written and the
//! helper's input closed before a single sorted line is read back.

use crate::error::{Result, StoreError};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};

const SEP: u8 = b' ';

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortHelper {
    /// An external `sort(1)`-compatible program.
    External(PathBuf),
    /// Stable in-memory sort, no subprocess.
    InProcess,
}

impl Default for SortHelper {
    fn default() -> Self {
        SortHelper::External(PathBuf::from("sort"))
    }
}

impl SortHelper {
    /// `internal` selects the in-process sort, anything else names a program.
    pub fn parse(s: &str) -> Self {
        match s {
            "internal" | "in-process" => SortHelper::InProcess,
            program => SortHelper::External(PathBuf::from(program)),
        }
    }
}

pub(crate) fn validate(key: &[u8], value: &[u8]) -> Result<()> {
    if key.is_empty() {
        return Err(StoreError::InvalidRecord("empty key".to_string()));
    }
    if key.contains(&SEP) || key.contains(&b'\n') {
        return Err(StoreError::InvalidRecord(format!(
            "key {:?} contains a separator",
            String::from_utf8_lossy(key)
        )));
    }
    if value.contains(&b'\n') {
        return Err(StoreError::InvalidRecord(format!(
            "value for {:?} contains a newline",
            String::from_utf8_lossy(key)
        )));
    }
    Ok(())
}

enum Sorter {
    Process {
        program: PathBuf,
        child: Child,
        stdin: BufWriter<ChildStdin>,
    },
    Memory(Vec<Vec<u8>>),
}

pub(crate) struct BulkSorter {
    sorter: Sorter,
    records: usize,
}

impl BulkSorter {
    /// Start a sorter. If the external program cannot be spawned the
    /// in-process sort is used instead.
    pub(crate) fn start(helper: &SortHelper) -> Self {
        let sorter = match helper {
            SortHelper::InProcess => Sorter::Memory(Vec::new()),
            SortHelper::External(program) => match spawn(program) {
                Ok((child, stdin)) => Sorter::Process {
                    program: program.clone(),
                    child,
                    stdin,
                },
                Err(e) => {
                    tracing::warn!(
                        "Cannot start sort helper {}: {}. Falling back to in-process sort.",
                        program.display(),
                        e
                    );
                    Sorter::Memory(Vec::new())
                }
            },
        };
        Self { sorter, records: 0 }
    }

    pub(crate) fn push(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        validate(key, value)?;
        match &mut self.sorter {
            Sorter::Process { stdin, .. } => {
                stdin.write_all(key)?;
                stdin.write_all(&[SEP])?;
                stdin.write_all(value)?;
                stdin.write_all(b"\n")?;
            }
            Sorter::Memory(lines) => {
                let mut line = Vec::with_capacity(key.len() + value.len() + 1);
                line.extend_from_slice(key);
                line.push(SEP);
                line.extend_from_slice(value);
                lines.push(line);
            }
        }
        self.records += 1;
        Ok(())
    }

    pub(crate) fn len(&self) -> usize {
        self.records
    }

    /// Close the input side, then feed every sorted record to `sink`.
    pub(crate) fn drain<F>(self, mut sink: F) -> Result<usize>
    where
        F: FnMut(&[u8], &[u8]) -> Result<()>,
    {
        match self.sorter {
            Sorter::Memory(mut lines) => {
                lines.sort_by(|a, b| key_of(a).cmp(key_of(b)));
                for line in &lines {
                    let (key, value) = split(line);
                    sink(key, value)?;
                }
                Ok(lines.len())
            }
            Sorter::Process {
                program,
                mut child,
                mut stdin,
            } => {
                stdin.flush()?;
                drop(stdin);

                let stdout = child.stdout.take().ok_or_else(|| {
                    StoreError::SortHelper(format!("{}: no output pipe", program.display()))
                })?;
                let mut reader = BufReader::new(stdout);
                let mut line = Vec::new();
                let mut count = 0;
                loop {
                    line.clear();
                    if reader.read_until(b'\n', &mut line)? == 0 {
                        break;
                    }
                    if line.last() == Some(&b'\n') {
                        line.pop();
                    }
                    let (key, value) = split(&line);
                    sink(key, value)?;
                    count += 1;
                }

                let status = child.wait()?;
                if !status.success() {
                    return Err(StoreError::SortHelper(format!(
                        "{} exited with {}",
                        program.display(),
                        status
                    )));
                }
                if count != self.records {
                    return Err(StoreError::SortHelper(format!(
                        "{} returned {} records, expected {}",
                        program.display(),
                        count,
                        self.records
                    )));
                }
                Ok(count)
            }
        }
    }
}

fn spawn(program: &Path) -> std::io::Result<(Child, BufWriter<ChildStdin>)> {
    let mut child = Command::new(program)
        // Stable sort on the first space-separated field, byte order.
        .args(["-s", "-t", " ", "-k", "1,1"])
        .env("LC_ALL", "C")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()?;
    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| std::io::Error::other("sort helper has no input pipe"))?;
    Ok((child, BufWriter::new(stdin)))
}

fn key_of(line: &[u8]) -> &[u8] {
    split(line).0
}

fn split(line: &[u8]) -> (&[u8], &[u8]) {
    match line.iter().position(|b| *b == SEP) {
        Some(i) => (&line[..i], &line[i + 1..]),
        None => (line, &[]),
    }
}
