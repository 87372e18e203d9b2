//! Grammar-specific codecs: INI, JSON, XML.

mod ini;
mod json;
mod xml;

pub use ini::IniCodec;
pub use json::JsonCodec;
pub use xml::XmlCodec;

use std::collections::HashSet;

use crate::document::{ConfigError, FlatMap, Location};

/// Case-folded record of the keys a rewrite pass substituted.
#[derive(Debug, Default)]
pub struct KeySet(HashSet<String>);

impl KeySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, key: &str) {
        self.0.insert(key.to_lowercase());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains(&key.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One textual grammar: how to flatten a document into a [`FlatMap`], how to
/// rewrite values onto an existing template, and how to generate a minimal
/// fresh document.
pub trait Codec {
    /// Flattens `input` into a map. Deterministic: identical input always
    /// yields an identical map.
    fn parse(&self, input: &str) -> Result<FlatMap, ConfigError>;

    /// Copies `template` into `out`, substituting only value payloads with
    /// the entries of `map`. Every substituted key is recorded in the
    /// returned set; a template key absent from `map` fails with
    /// [`ConfigError::NewKeyFound`].
    fn rewrite(
        &self,
        template: &str,
        out: &mut String,
        map: &FlatMap,
    ) -> Result<KeySet, ConfigError>;

    /// Emits a minimal flattened document containing every entry of `map`,
    /// in map order. The output re-parses under the same codec.
    fn generate(&self, map: &FlatMap) -> String;
}

/// Character cursor with 1-based line/column tracking, shared by the JSON
/// and XML scanners.
pub(crate) struct Cursor<'a> {
    src: &'a str,
    pos: usize,
    line: u32,
    col: u32,
}

impl<'a> Cursor<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            line: 1,
            col: 1,
        }
    }

    pub fn location(&self) -> Location {
        Location::new(self.line, self.col)
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    pub fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    pub fn slice(&self, start: usize) -> &'a str {
        &self.src[start..self.pos]
    }

    pub fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    pub fn starts_with(&self, pat: &str) -> bool {
        self.rest().starts_with(pat)
    }

    /// Consumes input through the end of `delim`. Fails when the delimiter
    /// never appears.
    pub fn consume_through(&mut self, delim: &str, what: &str) -> Result<(), ConfigError> {
        let location = self.location();
        loop {
            if self.starts_with(delim) {
                for _ in 0..delim.chars().count() {
                    self.bump();
                }
                return Ok(());
            }
            if self.bump().is_none() {
                return Err(ConfigError::Malformed {
                    reason: format!("unterminated {what}"),
                    location,
                });
            }
        }
    }
}
