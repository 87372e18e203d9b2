//! XML codec.
//!
//! A hand scanner yields markup events with their raw spans so the rewrite
//! pass can copy structure byte-for-byte, substituting only text, CDATA and
//! attribute value payloads.
//!
//! The root element is a container and contributes no path segment. Any
//! other element contributes its tag name, or `tag:NameValue` when it
//! carries a `Name` attribute, which disambiguates repeated sibling tags.
//! Namespaces and DTDs are rejected.

use super::{Codec, Cursor, KeySet};
use crate::document::{ConfigError, FlatMap, Location};

#[derive(Debug, Clone, Copy, Default)]
pub struct XmlCodec;

struct Attr<'a> {
    name: &'a str,
    raw_value: &'a str,
    /// Byte offset of `raw_value` within the owning tag's raw span.
    value_offset: usize,
    location: Location,
}

struct Tag<'a> {
    raw: &'a str,
    name: &'a str,
    attrs: Vec<Attr<'a>>,
    self_closing: bool,
    location: Location,
}

enum Event<'a> {
    /// Declaration, processing instruction or comment; passes through.
    Markup(&'a str),
    Text(&'a str),
    Cdata { raw: &'a str, inner: &'a str },
    Open(Tag<'a>),
    Close { raw: &'a str, name: &'a str },
}

struct Scanner<'a> {
    cursor: Cursor<'a>,
}

impl<'a> Scanner<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            cursor: Cursor::new(src),
        }
    }

    fn location(&self) -> Location {
        self.cursor.location()
    }

    fn next_event(&mut self) -> Result<Option<(Event<'a>, Location)>, ConfigError> {
        let location = self.cursor.location();
        let start = self.cursor.pos();
        if self.cursor.peek().is_none() {
            return Ok(None);
        }
        if self.cursor.peek() != Some('<') {
            while !matches!(self.cursor.peek(), Some('<') | None) {
                self.cursor.bump();
            }
            return Ok(Some((Event::Text(self.cursor.slice(start)), location)));
        }
        if self.cursor.starts_with("<!--") {
            self.cursor.consume_through("-->", "comment")?;
            return Ok(Some((Event::Markup(self.cursor.slice(start)), location)));
        }
        if self.cursor.starts_with("<![CDATA[") {
            self.cursor.consume_through("]]>", "CDATA section")?;
            let raw = self.cursor.slice(start);
            let inner = &raw["<![CDATA[".len()..raw.len() - "]]>".len()];
            return Ok(Some((Event::Cdata { raw, inner }, location)));
        }
        if self.cursor.starts_with("<!DOCTYPE") {
            return Err(ConfigError::DtdProhibited(location));
        }
        if self.cursor.starts_with("<?") {
            self.cursor.consume_through("?>", "processing instruction")?;
            return Ok(Some((Event::Markup(self.cursor.slice(start)), location)));
        }
        if self.cursor.starts_with("</") {
            self.cursor.bump();
            self.cursor.bump();
            let name = self.name()?;
            while matches!(self.cursor.peek(), Some(c) if c.is_whitespace()) {
                self.cursor.bump();
            }
            if self.cursor.bump() != Some('>') {
                return Err(ConfigError::Malformed {
                    reason: format!("malformed closing tag '</{name}'"),
                    location,
                });
            }
            return Ok(Some((
                Event::Close {
                    raw: self.cursor.slice(start),
                    name,
                },
                location,
            )));
        }
        if self.cursor.starts_with("<!") {
            return Err(ConfigError::Malformed {
                reason: "unsupported markup declaration".to_string(),
                location,
            });
        }
        let tag = self.open_tag(start, location)?;
        Ok(Some((Event::Open(tag), location)))
    }

    fn open_tag(&mut self, start: usize, location: Location) -> Result<Tag<'a>, ConfigError> {
        self.cursor.bump(); // '<'
        let name = self.name()?;
        let mut attrs = Vec::new();
        let self_closing = loop {
            while matches!(self.cursor.peek(), Some(c) if c.is_whitespace()) {
                self.cursor.bump();
            }
            match self.cursor.peek() {
                Some('>') => {
                    self.cursor.bump();
                    break false;
                }
                Some('/') => {
                    self.cursor.bump();
                    if self.cursor.bump() != Some('>') {
                        return Err(ConfigError::Malformed {
                            reason: format!("malformed tag '<{name}'"),
                            location,
                        });
                    }
                    break true;
                }
                Some(_) => attrs.push(self.attribute(start)?),
                None => {
                    return Err(ConfigError::Malformed {
                        reason: format!("unterminated tag '<{name}'"),
                        location,
                    });
                }
            }
        };
        Ok(Tag {
            raw: self.cursor.slice(start),
            name,
            attrs,
            self_closing,
            location,
        })
    }

    fn attribute(&mut self, tag_start: usize) -> Result<Attr<'a>, ConfigError> {
        let location = self.cursor.location();
        let name = self.name()?;
        while matches!(self.cursor.peek(), Some(c) if c.is_whitespace()) {
            self.cursor.bump();
        }
        if self.cursor.bump() != Some('=') {
            return Err(ConfigError::Malformed {
                reason: format!("attribute '{name}' has no value"),
                location,
            });
        }
        while matches!(self.cursor.peek(), Some(c) if c.is_whitespace()) {
            self.cursor.bump();
        }
        let quote = match self.cursor.peek() {
            Some(q @ ('"' | '\'')) => q,
            _ => {
                return Err(ConfigError::Malformed {
                    reason: format!("attribute '{name}' value is not quoted"),
                    location,
                });
            }
        };
        self.cursor.bump();
        let value_start = self.cursor.pos();
        loop {
            match self.cursor.peek() {
                Some(c) if c == quote => break,
                Some(_) => {
                    self.cursor.bump();
                }
                None => {
                    return Err(ConfigError::Malformed {
                        reason: format!("unterminated value for attribute '{name}'"),
                        location,
                    });
                }
            }
        }
        let raw_value = self.cursor.slice(value_start);
        self.cursor.bump(); // closing quote
        Ok(Attr {
            name,
            raw_value,
            value_offset: value_start - tag_start,
            location,
        })
    }

    fn name(&mut self) -> Result<&'a str, ConfigError> {
        let location = self.cursor.location();
        let start = self.cursor.pos();
        while matches!(
            self.cursor.peek(),
            Some(c) if c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':')
        ) {
            self.cursor.bump();
        }
        let name = self.cursor.slice(start);
        if name.is_empty() {
            return Err(ConfigError::Malformed {
                reason: "expected a name".to_string(),
                location,
            });
        }
        Ok(name)
    }
}

enum Payload<'a> {
    Text { raw: &'a str },
    Cdata { raw: &'a str },
    Attribute { raw: &'a str },
}

trait XmlSink {
    fn raw(&mut self, text: &str);
    fn value(
        &mut self,
        key: &str,
        payload: Payload<'_>,
        decoded: &str,
        location: Location,
    ) -> Result<(), ConfigError>;
}

struct ParseSink {
    map: FlatMap,
}

impl XmlSink for ParseSink {
    fn raw(&mut self, _text: &str) {}

    fn value(
        &mut self,
        key: &str,
        _payload: Payload<'_>,
        decoded: &str,
        location: Location,
    ) -> Result<(), ConfigError> {
        if !self.map.insert(key, decoded) {
            return Err(ConfigError::DuplicateKey {
                key: key.to_string(),
                location,
            });
        }
        Ok(())
    }
}

struct RewriteSink<'a> {
    out: &'a mut String,
    map: &'a FlatMap,
    seen: KeySet,
}

impl XmlSink for RewriteSink<'_> {
    fn raw(&mut self, text: &str) {
        self.out.push_str(text);
    }

    fn value(
        &mut self,
        key: &str,
        payload: Payload<'_>,
        decoded: &str,
        _location: Location,
    ) -> Result<(), ConfigError> {
        let Some(new) = self.map.get(key) else {
            return Err(ConfigError::NewKeyFound(key.to_string()));
        };
        self.seen.record(key);
        match payload {
            // Unchanged payloads keep the template's exact character
            // references.
            Payload::Text { raw } => {
                if new == decoded {
                    self.out.push_str(raw);
                } else {
                    encode_text(new, self.out);
                }
            }
            Payload::Cdata { raw } => {
                if new == decoded {
                    self.out.push_str(raw);
                } else {
                    self.out.push_str("<![CDATA[");
                    self.out.push_str(new);
                    self.out.push_str("]]>");
                }
            }
            Payload::Attribute { raw } => {
                if new == decoded {
                    self.out.push_str(raw);
                } else {
                    encode_attr(new, self.out);
                }
            }
        }
        Ok(())
    }
}

fn decode_entities(raw: &str, location: Location) -> Result<String, ConfigError> {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(i) = rest.find('&') {
        out.push_str(&rest[..i]);
        rest = &rest[i..];
        let end = rest.find(';').ok_or_else(|| ConfigError::Malformed {
            reason: "unterminated entity reference".to_string(),
            location,
        })?;
        let entity = &rest[1..end];
        match entity {
            "amp" => out.push('&'),
            "lt" => out.push('<'),
            "gt" => out.push('>'),
            "quot" => out.push('"'),
            "apos" => out.push('\''),
            _ => {
                let code = if let Some(hex) = entity.strip_prefix("#x").or(entity.strip_prefix("#X")) {
                    u32::from_str_radix(hex, 16).ok()
                } else if let Some(dec) = entity.strip_prefix('#') {
                    dec.parse::<u32>().ok()
                } else {
                    None
                };
                let c = code.and_then(char::from_u32).ok_or_else(|| {
                    ConfigError::Malformed {
                        reason: format!("unknown entity '&{entity};'"),
                        location,
                    }
                })?;
                out.push(c);
            }
        }
        rest = &rest[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

fn encode_text(s: &str, out: &mut String) {
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
}

fn encode_attr(s: &str, out: &mut String) {
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
}

fn check_namespaces(tag: &Tag<'_>) -> Result<(), ConfigError> {
    if tag.name.contains(':') {
        return Err(ConfigError::NamespaceNotSupported(tag.location));
    }
    for attr in &tag.attrs {
        if attr.name.contains(':') || attr.name == "xmlns" {
            return Err(ConfigError::NamespaceNotSupported(attr.location));
        }
    }
    Ok(())
}

fn walk<S: XmlSink>(template: &str, sink: &mut S) -> Result<(), ConfigError> {
    let mut scanner = Scanner::new(template);
    // Path segments, root element excluded. The open-element stack records
    // each element's name and whether it pushed a segment.
    let mut path: Vec<String> = Vec::new();
    let mut stack: Vec<(&str, bool)> = Vec::new();
    let mut root_seen = false;
    let mut root_closed = false;

    while let Some((event, location)) = scanner.next_event()? {
        match event {
            Event::Markup(raw) => sink.raw(raw),
            Event::Text(raw) => {
                if raw.trim().is_empty() {
                    sink.raw(raw);
                } else if stack.is_empty() {
                    return Err(ConfigError::Malformed {
                        reason: "text outside the root element".to_string(),
                        location,
                    });
                } else {
                    let decoded = decode_entities(raw, location)?;
                    sink.value(&path.join(":"), Payload::Text { raw }, &decoded, location)?;
                }
            }
            Event::Cdata { raw, inner } => {
                if stack.is_empty() {
                    return Err(ConfigError::Malformed {
                        reason: "CDATA outside the root element".to_string(),
                        location,
                    });
                }
                sink.value(&path.join(":"), Payload::Cdata { raw }, inner, location)?;
            }
            Event::Open(tag) => {
                if root_closed {
                    return Err(ConfigError::Malformed {
                        reason: "multiple root elements".to_string(),
                        location,
                    });
                }
                check_namespaces(&tag)?;
                let is_root = !root_seen;
                root_seen = true;
                let pushed = if is_root {
                    false
                } else {
                    let mut segment = tag.name.to_string();
                    if let Some(name_attr) = tag.attrs.iter().find(|a| a.name == "Name") {
                        segment.push(':');
                        segment
                            .push_str(&decode_entities(name_attr.raw_value, name_attr.location)?);
                    }
                    path.push(segment);
                    true
                };

                // Emit the tag, substituting attribute value payloads in
                // place. The Name attribute is structural and skipped.
                let mut emitted = 0usize;
                for attr in &tag.attrs {
                    if attr.name == "Name" {
                        continue;
                    }
                    let key = if path.is_empty() {
                        attr.name.to_string()
                    } else {
                        format!("{}:{}", path.join(":"), attr.name)
                    };
                    sink.raw(&tag.raw[emitted..attr.value_offset]);
                    let decoded = decode_entities(attr.raw_value, attr.location)?;
                    sink.value(
                        &key,
                        Payload::Attribute {
                            raw: attr.raw_value,
                        },
                        &decoded,
                        attr.location,
                    )?;
                    emitted = attr.value_offset + attr.raw_value.len();
                }
                sink.raw(&tag.raw[emitted..]);

                if tag.self_closing {
                    if pushed {
                        path.pop();
                    }
                    if is_root {
                        root_closed = true;
                    }
                } else {
                    stack.push((tag.name, pushed));
                }
            }
            Event::Close { raw, name } => {
                let Some((open_name, pushed)) = stack.pop() else {
                    return Err(ConfigError::Malformed {
                        reason: format!("closing tag '</{name}>' without a matching open"),
                        location,
                    });
                };
                if open_name != name {
                    return Err(ConfigError::Malformed {
                        reason: format!("mismatched closing tag '</{name}>' for '<{open_name}>'"),
                        location,
                    });
                }
                if pushed {
                    path.pop();
                }
                sink.raw(raw);
                if stack.is_empty() {
                    root_closed = true;
                }
            }
        }
    }

    if !stack.is_empty() {
        return Err(ConfigError::UnexpectedEnd {
            path: path.join(":"),
            location: scanner.location(),
        });
    }
    if !root_seen {
        return Err(ConfigError::Malformed {
            reason: "document has no root element".to_string(),
            location: scanner.location(),
        });
    }
    Ok(())
}

impl Codec for XmlCodec {
    fn parse(&self, input: &str) -> Result<FlatMap, ConfigError> {
        let mut sink = ParseSink {
            map: FlatMap::new(),
        };
        walk(input, &mut sink)?;
        Ok(sink.map)
    }

    fn rewrite(
        &self,
        template: &str,
        out: &mut String,
        map: &FlatMap,
    ) -> Result<KeySet, ConfigError> {
        let mut sink = RewriteSink {
            out,
            map,
            seen: KeySet::new(),
        };
        walk(template, &mut sink)?;
        Ok(sink.seen)
    }

    fn generate(&self, map: &FlatMap) -> String {
        let mut out = String::from("<settings>");
        for (key, value) in map.iter() {
            let (tag, rest) = match key.find(':') {
                Some(i) => (&key[..i], Some(&key[i + 1..])),
                None => (key, None),
            };
            out.push_str("\n  <");
            out.push_str(tag);
            if let Some(rest) = rest {
                out.push_str(" Name=\"");
                encode_attr(rest, &mut out);
                out.push('"');
            }
            out.push('>');
            encode_text(value, &mut out);
            out.push_str("</");
            out.push_str(tag);
            out.push('>');
        }
        out.push_str("\n</settings>");
        out
    }
}
