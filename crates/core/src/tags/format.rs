//! Tag record formats and table-level format metadata.
//!
//! Standard record: `<fid> <tag> <lno> <image>`.
//! Compact record:  `<fid> <tag> <line-list>`.
//!
//! The record key is always the tag name. With `compname` the tag field is
//! written as `@` and restored from the key on read.

use super::{image, linelist};
use crate::error::FormatError;
use serde::{Deserialize, Serialize};

pub const VERSION_KEY: &str = "__.VERSION";
pub const OPTIONS_KEY: &str = "__.OPTIONS";

pub const FORMAT_VERSION: u32 = 2;
pub const OLDEST_SUPPORTED_VERSION: u32 = 2;

const NAME_PLACEHOLDER: &str = "@";

/// Accept a stored version only inside the supported window.
pub fn check_version(found: u32) -> Result<(), FormatError> {
    if found > FORMAT_VERSION {
        return Err(FormatError::TooNew {
            found,
            newest: FORMAT_VERSION,
        });
    }
    if found < OLDEST_SUPPORTED_VERSION {
        return Err(FormatError::TooOld {
            found,
            oldest: OLDEST_SUPPORTED_VERSION,
        });
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagOptions {
    /// One record per (file, tag) with a compressed line list, no source text.
    pub compact: bool,
    /// Compress line images of standard records.
    pub compress: bool,
    /// Store the tag field as `@`, since the key already holds it.
    pub compname: bool,
}

impl TagOptions {
    pub fn to_meta(&self) -> String {
        let mut flags = Vec::new();
        if self.compact {
            flags.push("compact");
        }
        if self.compress {
            flags.push("compress");
        }
        if self.compname {
            flags.push("compname");
        }
        flags.join(",")
    }

    pub fn from_meta(text: &str) -> Result<Self, FormatError> {
        let mut options = TagOptions::default();
        for flag in text.split(',').map(str::trim).filter(|f| !f.is_empty()) {
            match flag {
                "compact" => options.compact = true,
                "compress" => options.compress = true,
                "compname" => options.compname = true,
                other => {
                    return Err(FormatError::Malformed(format!("unknown option {:?}", other)));
                }
            }
        }
        Ok(options)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFormat {
    Standard,
    Compact,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StandardRecord {
    pub file_id: u32,
    pub tag: String,
    pub line: u32,
    pub image: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactRecord {
    pub file_id: u32,
    pub tag: String,
    pub lines: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagRecord {
    Standard(StandardRecord),
    Compact(CompactRecord),
}

impl TagRecord {
    pub fn file_id(&self) -> u32 {
        match self {
            TagRecord::Standard(r) => r.file_id,
            TagRecord::Compact(r) => r.file_id,
        }
    }

    pub fn tag(&self) -> &str {
        match self {
            TagRecord::Standard(r) => &r.tag,
            TagRecord::Compact(r) => &r.tag,
        }
    }

    /// Number of occurrences this record stands for.
    pub fn occurrences(&self) -> usize {
        match self {
            TagRecord::Standard(_) => 1,
            TagRecord::Compact(r) => r.lines.len(),
        }
    }
}

fn tag_field<'a>(tag: &'a str, options: &TagOptions) -> &'a str {
    if options.compname { NAME_PLACEHOLDER } else { tag }
}

fn restore_tag(field: &str, key: &str) -> String {
    if field == NAME_PLACEHOLDER {
        key.to_string()
    } else {
        field.to_string()
    }
}

fn parse_number(field: Option<&str>, what: &str, value: &str) -> Result<u32, FormatError> {
    field
        .and_then(|f| f.parse::<u32>().ok())
        .ok_or_else(|| FormatError::Malformed(format!("bad {} in record {:?}", what, value)))
}

/// The leading file id of any record.
pub fn leading_file_id(value: &[u8]) -> Result<u32, FormatError> {
    let end = value.iter().position(|b| *b == b' ').unwrap_or(value.len());
    std::str::from_utf8(&value[..end])
        .ok()
        .and_then(|s| s.parse::<u32>().ok())
        .ok_or_else(|| {
            FormatError::Malformed(format!(
                "record {:?} has no file id",
                String::from_utf8_lossy(value)
            ))
        })
}

pub fn encode_standard(record: &StandardRecord, options: &TagOptions) -> String {
    let image = if options.compress {
        image::compress(&record.image, &record.tag)
    } else {
        record.image.clone()
    };
    format!(
        "{} {} {} {}",
        record.file_id,
        tag_field(&record.tag, options),
        record.line,
        image
    )
}

pub fn decode_standard(
    key: &str,
    value: &str,
    options: &TagOptions,
) -> Result<StandardRecord, FormatError> {
    let mut fields = value.splitn(4, ' ');
    let file_id = parse_number(fields.next(), "file id", value)?;
    let tag = restore_tag(
        fields
            .next()
            .ok_or_else(|| FormatError::Malformed(format!("record {:?} has no tag", value)))?,
        key,
    );
    let line = parse_number(fields.next(), "line number", value)?;
    let raw_image = fields.next().unwrap_or("");
    let image = if options.compress {
        image::decompress(raw_image, &tag)?
    } else {
        raw_image.to_string()
    };
    Ok(StandardRecord {
        file_id,
        tag,
        line,
        image,
    })
}

/// `lines` must already be sorted and deduplicated.
pub fn encode_compact(file_id: u32, tag: &str, lines: &[u32], options: &TagOptions) -> String {
    format!(
        "{} {} {}",
        file_id,
        tag_field(tag, options),
        linelist::encode(lines)
    )
}

pub fn decode_compact(key: &str, value: &str) -> Result<CompactRecord, FormatError> {
    let mut fields = value.splitn(3, ' ');
    let file_id = parse_number(fields.next(), "file id", value)?;
    let tag = restore_tag(
        fields
            .next()
            .ok_or_else(|| FormatError::Malformed(format!("record {:?} has no tag", value)))?,
        key,
    );
    let lines = linelist::decode(
        fields
            .next()
            .ok_or_else(|| FormatError::Malformed(format!("record {:?} has no lines", value)))?,
    )?;
    Ok(CompactRecord {
        file_id,
        tag,
        lines,
    })
}

pub fn decode(
    format: RecordFormat,
    key: &str,
    value: &str,
    options: &TagOptions,
) -> Result<TagRecord, FormatError> {
    match format {
        RecordFormat::Standard => decode_standard(key, value, options).map(TagRecord::Standard),
        RecordFormat::Compact => decode_compact(key, value).map(TagRecord::Compact),
    }
}
