//! Line-image compression for standard records.
//!
//! Escapes: `@@` is a literal `@`, `@n` is the tag name, `@2`..`@9` is a
//! run of that many spaces. Source lines are dominated by indentation and
//! by the tag itself, so this shrinks them without leaving plain text.

use crate::error::FormatError;

pub fn compress(image: &str, tag: &str) -> String {
    let mut out = String::with_capacity(image.len());
    let mut rest = image;
    while let Some(c) = rest.chars().next() {
        if !tag.is_empty() && rest.starts_with(tag) {
            out.push_str("@n");
            rest = &rest[tag.len()..];
            continue;
        }
        match c {
            '@' => {
                out.push_str("@@");
                rest = &rest[1..];
            }
            ' ' => {
                let mut run = rest.bytes().take_while(|b| *b == b' ').count();
                rest = &rest[run..];
                while run >= 2 {
                    let chunk = run.min(9);
                    out.push('@');
                    out.push(char::from(b'0' + chunk as u8));
                    run -= chunk;
                }
                if run == 1 {
                    out.push(' ');
                }
            }
            _ => {
                out.push(c);
                rest = &rest[c.len_utf8()..];
            }
        }
    }
    out
}

pub fn decompress(text: &str, tag: &str) -> Result<String, FormatError> {
    let mut out = String::with_capacity(text.len() * 2);
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '@' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('@') => out.push('@'),
            Some('n') => out.push_str(tag),
            Some(d @ '2'..='9') => {
                let n = d as usize - '0' as usize;
                out.extend(std::iter::repeat_n(' ', n));
            }
            other => {
                return Err(FormatError::Malformed(format!(
                    "bad escape {:?} in compressed line image",
                    other
                )));
            }
        }
    }
    Ok(out)
}
