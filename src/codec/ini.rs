//! INI codec.
//!
//! Line-oriented: blank lines and comment lines (`;`, `#`, `/`) pass through
//! untouched, `[Header]` lines set the key prefix, and every other line is a
//! `key=value` pair split at the first `=`.

use super::{Codec, KeySet};
use crate::document::{ConfigError, FlatMap, Location};

#[derive(Debug, Clone, Copy, Default)]
pub struct IniCodec;

enum Line<'a> {
    Blank,
    Comment,
    Header(&'a str),
    Pair,
}

fn classify(body: &str) -> Line<'_> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Line::Blank;
    }
    if matches!(trimmed.as_bytes()[0], b';' | b'#' | b'/') {
        return Line::Comment;
    }
    if trimmed.len() >= 2 && trimmed.starts_with('[') && trimmed.ends_with(']') {
        return Line::Header(&trimmed[1..trimmed.len() - 1]);
    }
    Line::Pair
}

/// Splits a raw line into its body and line terminator.
fn split_terminator(raw: &str) -> (&str, &str) {
    if let Some(body) = raw.strip_suffix("\r\n") {
        (body, "\r\n")
    } else if let Some(body) = raw.strip_suffix('\n') {
        (body, "\n")
    } else {
        (raw, "")
    }
}

/// Strips one matching pair of double quotes wrapping the whole value.
fn unquote(value: &str) -> &str {
    if value.len() > 1 && value.starts_with('"') && value.ends_with('"') {
        &value[1..value.len() - 1]
    } else {
        value
    }
}

/// Trimmed key and extracted value of a pair line, split at the first `=`.
fn split_pair(body: &str) -> Result<(usize, &str, &str), ConfigError> {
    let eq = body
        .find('=')
        .ok_or_else(|| ConfigError::UnrecognizedLine(body.to_string()))?;
    let key = body[..eq].trim();
    let value = unquote(body[eq + 1..].trim());
    Ok((eq, key, value))
}

impl Codec for IniCodec {
    fn parse(&self, input: &str) -> Result<FlatMap, ConfigError> {
        let mut map = FlatMap::new();
        let mut prefix = String::new();
        for (idx, raw) in input.split_inclusive('\n').enumerate() {
            let (body, _) = split_terminator(raw);
            match classify(body) {
                Line::Blank | Line::Comment => {}
                Line::Header(name) => {
                    prefix = format!("{name}:");
                }
                Line::Pair => {
                    let (_, key, value) = split_pair(body)?;
                    let full = format!("{prefix}{key}");
                    if !map.insert(full.clone(), value) {
                        return Err(ConfigError::DuplicateKey {
                            key: full,
                            location: Location::new(idx as u32 + 1, 1),
                        });
                    }
                }
            }
        }
        Ok(map)
    }

    fn rewrite(
        &self,
        template: &str,
        out: &mut String,
        map: &FlatMap,
    ) -> Result<KeySet, ConfigError> {
        let mut prefix = String::new();
        let mut seen = KeySet::new();
        for raw in template.split_inclusive('\n') {
            let (body, eol) = split_terminator(raw);
            match classify(body) {
                Line::Blank | Line::Comment => out.push_str(raw),
                Line::Header(name) => {
                    prefix = format!("{name}:");
                    out.push_str(raw);
                }
                Line::Pair => {
                    let (eq, key, old) = split_pair(body)?;
                    let full = format!("{prefix}{key}");
                    let new = map
                        .get(&full)
                        .ok_or_else(|| ConfigError::NewKeyFound(full.clone()))?;
                    seen.record(&full);
                    if old.is_empty() {
                        // Nothing to substitute; splice the value in after
                        // the separator, or between the quotes when the old
                        // value was a quoted empty string.
                        let after = &body[eq + 1..];
                        let lead = after.len() - after.trim_start().len();
                        let at = if after.trim_start().starts_with('"') {
                            eq + 1 + lead + 1
                        } else {
                            eq + 1
                        };
                        out.push_str(&body[..at]);
                        out.push_str(new);
                        out.push_str(&body[at..]);
                    } else {
                        // Literal replacement across the whole raw line. If
                        // the old value text recurs elsewhere on the line,
                        // those spans change too; the original behaves the
                        // same way.
                        out.push_str(&body.replace(old, new));
                    }
                    out.push_str(eol);
                }
            }
        }
        Ok(seen)
    }

    fn generate(&self, map: &FlatMap) -> String {
        let mut out = String::new();
        for (i, (key, value)) in map.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            out.push_str(key);
            out.push('=');
            out.push_str(value);
        }
        out
    }
}
