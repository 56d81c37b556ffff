//! Compact line-number lists.
//!
//! A list is a comma-separated run of tokens over an ascending, duplicate
//! free sequence. The first token is absolute; each later one is the
//! distance from the last line already produced. A token `d-c` stands for
//! the line at distance `d` followed by `c` consecutive lines, so
//! `10,11,12,13,20` is written `10-3,7`. A lone line is never written as a
//! range.

use crate::error::FormatError;
use std::fmt::Write;

/// Highest line number a list may carry. Decoded lists are therefore
/// bounded no matter what a damaged record claims.
pub const MAX_LINE: u32 = 1 << 24;

/// Encode `lines`, which must be sorted and deduplicated.
pub fn encode(lines: &[u32]) -> String {
    let mut out = String::new();
    let mut last = 0u32;
    let mut i = 0;
    while i < lines.len() {
        let start = lines[i];
        let mut end = i;
        while end + 1 < lines.len() && lines[end + 1] == lines[end] + 1 {
            end += 1;
        }
        if !out.is_empty() {
            out.push(',');
        }
        let _ = write!(out, "{}", start - last);
        if end > i {
            let _ = write!(out, "-{}", end - i);
        }
        last = lines[end];
        i = end + 1;
    }
    out
}

pub fn decode(text: &str) -> Result<Vec<u32>, FormatError> {
    let malformed = || FormatError::Malformed(format!("bad line list {:?}", text));

    let mut lines = Vec::new();
    let mut last = 0u32;
    for token in text.split(',') {
        let (delta, count) = match token.split_once('-') {
            Some((d, c)) => (d, Some(c)),
            None => (token, None),
        };
        let delta: u32 = delta.parse().map_err(|_| malformed())?;
        if delta == 0 {
            return Err(malformed());
        }
        let start = last.checked_add(delta).ok_or_else(malformed)?;
        let count: u32 = match count {
            Some(c) => {
                let c: u32 = c.parse().map_err(|_| malformed())?;
                if c == 0 {
                    return Err(malformed());
                }
                c
            }
            None => 0,
        };
        let end = start.checked_add(count).ok_or_else(malformed)?;
        if end > MAX_LINE {
            return Err(malformed());
        }
        lines.extend(start..=end);
        last = end;
    }
    Ok(lines)
}

/// Sort and deduplicate in place, ready for [`encode`].
pub fn normalize(lines: &mut Vec<u32>) {
    lines.sort_unstable();
    lines.dedup();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges_collapse_consecutive_lines() {
        assert_eq!(encode(&[10, 11, 12, 13, 20]), "10-3,7");
        assert_eq!(decode("10-3,7").unwrap(), vec![10, 11, 12, 13, 20]);
    }

    #[test]
    fn single_values_never_use_range_syntax() {
        assert_eq!(encode(&[42]), "42");
        assert_eq!(encode(&[1, 3, 5]), "1,2,2");
        assert_eq!(encode(&[7, 8]), "7-1");
        assert!(!encode(&[5, 9, 30]).contains('-'));
    }

    #[test]
    fn decode_restores_ascending_sequence() {
        let lines = vec![1, 2, 4, 100, 101, 102, 250];
        let text = encode(&lines);
        assert_eq!(text, "1-1,2,96-2,148");
        assert_eq!(decode(&text).unwrap(), lines);
    }

    #[test]
    fn normalize_sorts_and_dedups() {
        let mut lines = vec![13, 10, 12, 11, 13, 20, 10];
        normalize(&mut lines);
        assert_eq!(lines, vec![10, 11, 12, 13, 20]);
    }

    #[test]
    fn malformed_lists_are_rejected() {
        for bad in ["", "0", "3,0", "5-0", "a", "1,-2", "4-", "1,,2", "4294967295,1"] {
            assert!(decode(bad).is_err(), "{:?} should be rejected", bad);
        }
    }

    #[test]
    fn lines_past_the_limit_are_rejected() {
        assert!(decode("1-4000000000").is_err());
        assert!(decode(&format!("{}", MAX_LINE + 1)).is_err());
        assert!(decode(&format!("{},1", MAX_LINE)).is_err());
        assert_eq!(decode(&format!("{}", MAX_LINE)).unwrap(), vec![MAX_LINE]);
        assert_eq!(decode(&format!("{}-1", MAX_LINE - 1)).unwrap().len(), 2);
    }
}
