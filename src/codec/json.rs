//! JSON codec.
//!
//! A hand lexer keeps every token's raw text so the rewrite pass can emit
//! the template byte-for-byte, substituting only scalar value payloads.
//! `//` and `/* */` comments are tokens in their own right and pass through
//! verbatim wherever they occur.

use std::fmt::Write as _;

use super::{Codec, Cursor, KeySet};
use crate::document::{ConfigError, FlatMap, Location};

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

enum Token<'a> {
    ObjectStart,
    ObjectEnd,
    ArrayStart,
    ArrayEnd,
    Colon,
    Comma,
    Str { raw: &'a str, value: String },
    Word { raw: &'a str },
    Comment { raw: &'a str },
    Blank { raw: &'a str },
}

fn kind(token: &Token<'_>) -> &'static str {
    match token {
        Token::ObjectStart => "object",
        Token::ObjectEnd => "object terminator",
        Token::ArrayStart | Token::ArrayEnd => "array",
        Token::Colon => "name separator",
        Token::Comma => "value separator",
        Token::Str { .. } => "string",
        Token::Word { .. } => "literal",
        Token::Comment { .. } | Token::Blank { .. } => "trivia",
    }
}

struct Lexer<'a> {
    cursor: Cursor<'a>,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            cursor: Cursor::new(src),
        }
    }

    fn location(&self) -> Location {
        self.cursor.location()
    }

    fn next_token(&mut self) -> Result<Option<(Token<'a>, Location)>, ConfigError> {
        let location = self.cursor.location();
        let start = self.cursor.pos();
        let Some(c) = self.cursor.peek() else {
            return Ok(None);
        };
        let token = match c {
            c if c.is_whitespace() => {
                while matches!(self.cursor.peek(), Some(c) if c.is_whitespace()) {
                    self.cursor.bump();
                }
                Token::Blank {
                    raw: self.cursor.slice(start),
                }
            }
            '{' => {
                self.cursor.bump();
                Token::ObjectStart
            }
            '}' => {
                self.cursor.bump();
                Token::ObjectEnd
            }
            '[' => {
                self.cursor.bump();
                Token::ArrayStart
            }
            ']' => {
                self.cursor.bump();
                Token::ArrayEnd
            }
            ':' => {
                self.cursor.bump();
                Token::Colon
            }
            ',' => {
                self.cursor.bump();
                Token::Comma
            }
            '"' => self.string(start)?,
            '/' => self.comment(start)?,
            c if c.is_ascii_digit() || c == '-' => {
                while matches!(
                    self.cursor.peek(),
                    Some(c) if c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E')
                ) {
                    self.cursor.bump();
                }
                Token::Word {
                    raw: self.cursor.slice(start),
                }
            }
            c if c.is_alphabetic() => {
                while matches!(self.cursor.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
                    self.cursor.bump();
                }
                Token::Word {
                    raw: self.cursor.slice(start),
                }
            }
            c => {
                return Err(ConfigError::Malformed {
                    reason: format!("unexpected character '{c}'"),
                    location,
                })
            }
        };
        Ok(Some((token, location)))
    }

    fn string(&mut self, start: usize) -> Result<Token<'a>, ConfigError> {
        let location = self.cursor.location();
        self.cursor.bump(); // opening quote
        let mut value = String::new();
        loop {
            let Some(c) = self.cursor.bump() else {
                return Err(ConfigError::Malformed {
                    reason: "unterminated string".to_string(),
                    location,
                });
            };
            match c {
                '"' => break,
                '\\' => value.push(self.escape()?),
                c => value.push(c),
            }
        }
        Ok(Token::Str {
            raw: self.cursor.slice(start),
            value,
        })
    }

    fn escape(&mut self) -> Result<char, ConfigError> {
        let location = self.cursor.location();
        match self.cursor.bump() {
            Some('"') => Ok('"'),
            Some('\\') => Ok('\\'),
            Some('/') => Ok('/'),
            Some('b') => Ok('\u{0008}'),
            Some('f') => Ok('\u{000C}'),
            Some('n') => Ok('\n'),
            Some('r') => Ok('\r'),
            Some('t') => Ok('\t'),
            Some('u') => self.unicode_escape(location),
            other => Err(ConfigError::Malformed {
                reason: match other {
                    Some(c) => format!("invalid escape '\\{c}'"),
                    None => "unterminated string".to_string(),
                },
                location,
            }),
        }
    }

    fn unicode_escape(&mut self, location: Location) -> Result<char, ConfigError> {
        let high = self.hex4(location)?;
        let code = if (0xD800..=0xDBFF).contains(&high) {
            // Surrogate pair: the low half must follow immediately.
            if self.cursor.bump() != Some('\\') || self.cursor.bump() != Some('u') {
                return Err(ConfigError::Malformed {
                    reason: "unpaired surrogate in unicode escape".to_string(),
                    location,
                });
            }
            let low = self.hex4(location)?;
            if !(0xDC00..=0xDFFF).contains(&low) {
                return Err(ConfigError::Malformed {
                    reason: "unpaired surrogate in unicode escape".to_string(),
                    location,
                });
            }
            0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00)
        } else {
            high
        };
        char::from_u32(code).ok_or_else(|| ConfigError::Malformed {
            reason: "invalid unicode escape".to_string(),
            location,
        })
    }

    fn hex4(&mut self, location: Location) -> Result<u32, ConfigError> {
        let mut code = 0u32;
        for _ in 0..4 {
            let digit = self
                .cursor
                .bump()
                .and_then(|c| c.to_digit(16))
                .ok_or_else(|| ConfigError::Malformed {
                    reason: "invalid unicode escape".to_string(),
                    location,
                })?;
            code = code * 16 + digit;
        }
        Ok(code)
    }

    fn comment(&mut self, start: usize) -> Result<Token<'a>, ConfigError> {
        let location = self.cursor.location();
        self.cursor.bump(); // '/'
        match self.cursor.peek() {
            Some('/') => {
                while !matches!(self.cursor.peek(), Some('\n') | None) {
                    self.cursor.bump();
                }
            }
            Some('*') => {
                self.cursor.bump();
                self.cursor.consume_through("*/", "comment")?;
            }
            _ => {
                return Err(ConfigError::Malformed {
                    reason: "unexpected character '/'".to_string(),
                    location,
                })
            }
        }
        Ok(Token::Comment {
            raw: self.cursor.slice(start),
        })
    }
}

/// What the walker reports back to its caller: raw structural text and the
/// value payloads it found.
trait JsonSink {
    fn raw(&mut self, text: &str);
    fn value(
        &mut self,
        key: &str,
        quoted: bool,
        raw: &str,
        decoded: &str,
        location: Location,
    ) -> Result<(), ConfigError>;
}

struct ParseSink {
    map: FlatMap,
}

impl JsonSink for ParseSink {
    fn raw(&mut self, _text: &str) {}

    fn value(
        &mut self,
        key: &str,
        _quoted: bool,
        _raw: &str,
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

impl JsonSink for RewriteSink<'_> {
    fn raw(&mut self, text: &str) {
        self.out.push_str(text);
    }

    fn value(
        &mut self,
        key: &str,
        quoted: bool,
        raw: &str,
        decoded: &str,
        _location: Location,
    ) -> Result<(), ConfigError> {
        let Some(new) = self.map.get(key) else {
            return Err(ConfigError::NewKeyFound(key.to_string()));
        };
        self.seen.record(key);
        if new == decoded {
            // Unchanged value: keep the template's exact escape spelling.
            self.out.push_str(raw);
        } else if quoted {
            self.out.push('"');
            escape_into(new, self.out);
            self.out.push('"');
        } else {
            self.out.push_str(new);
        }
        Ok(())
    }
}

#[derive(Clone, Copy)]
enum State {
    NameOrEnd,
    Name,
    Colon,
    Value,
    CommaOrEnd,
}

/// Property names fold literal `.` into the `:` hierarchy separator, so a
/// property named `a.b` collides with nested `a` → `b`. Deliberate.
fn flatten_segment(name: &str) -> String {
    name.replace('.', ":")
}

fn join(path: &[String]) -> String {
    path.join(":")
}

fn is_scalar_word(raw: &str) -> bool {
    raw == "true" || raw == "false" || raw == "null" || raw.parse::<f64>().is_ok()
}

fn walk<S: JsonSink>(template: &str, sink: &mut S) -> Result<(), ConfigError> {
    let mut lexer = Lexer::new(template);

    // Skip leading trivia; the first significant token must open an object.
    loop {
        match lexer.next_token()? {
            Some((Token::Blank { raw } | Token::Comment { raw }, _)) => sink.raw(raw),
            Some((Token::ObjectStart, _)) => {
                sink.raw("{");
                break;
            }
            Some((_, location)) => return Err(ConfigError::RootNotObject(location)),
            None => return Err(ConfigError::RootNotObject(lexer.location())),
        }
    }

    let mut path: Vec<String> = Vec::new();
    let mut depth = 1usize;
    let mut pending: Option<String> = None;
    let mut state = State::NameOrEnd;

    while depth > 0 {
        let Some((token, location)) = lexer.next_token()? else {
            return Err(ConfigError::UnexpectedEnd {
                path: join(&path),
                location: lexer.location(),
            });
        };
        if let Token::Blank { raw } | Token::Comment { raw } = token {
            sink.raw(raw);
            continue;
        }
        match state {
            State::NameOrEnd | State::Name => match token {
                Token::Str { raw, value } => {
                    sink.raw(raw);
                    pending = Some(flatten_segment(&value));
                    state = State::Colon;
                }
                Token::ObjectEnd if matches!(state, State::NameOrEnd) => {
                    sink.raw("}");
                    depth -= 1;
                    if depth > 0 {
                        path.pop();
                    }
                    state = State::CommaOrEnd;
                }
                other => {
                    return Err(ConfigError::UnsupportedToken {
                        kind: kind(&other),
                        path: join(&path),
                        location,
                    })
                }
            },
            State::Colon => match token {
                Token::Colon => {
                    sink.raw(":");
                    state = State::Value;
                }
                other => {
                    return Err(ConfigError::UnsupportedToken {
                        kind: kind(&other),
                        path: join(&path),
                        location,
                    })
                }
            },
            State::Value => {
                let name = pending.take().unwrap_or_default();
                match token {
                    Token::Str { raw, value } => {
                        let key = leaf_key(&path, &name);
                        sink.value(&key, true, raw, &value, location)?;
                        state = State::CommaOrEnd;
                    }
                    Token::Word { raw } if is_scalar_word(raw) => {
                        let key = leaf_key(&path, &name);
                        sink.value(&key, false, raw, raw, location)?;
                        state = State::CommaOrEnd;
                    }
                    Token::ObjectStart => {
                        sink.raw("{");
                        path.push(name);
                        depth += 1;
                        state = State::NameOrEnd;
                    }
                    other => {
                        return Err(ConfigError::UnsupportedToken {
                            kind: kind(&other),
                            path: join(&path),
                            location,
                        })
                    }
                }
            }
            State::CommaOrEnd => match token {
                Token::Comma => {
                    sink.raw(",");
                    state = State::Name;
                }
                Token::ObjectEnd => {
                    sink.raw("}");
                    depth -= 1;
                    if depth > 0 {
                        path.pop();
                    }
                }
                other => {
                    return Err(ConfigError::UnsupportedToken {
                        kind: kind(&other),
                        path: join(&path),
                        location,
                    })
                }
            },
        }
    }

    // Only trivia may follow the root object.
    while let Some((token, location)) = lexer.next_token()? {
        match token {
            Token::Blank { raw } | Token::Comment { raw } => sink.raw(raw),
            other => {
                return Err(ConfigError::UnsupportedToken {
                    kind: kind(&other),
                    path: join(&path),
                    location,
                })
            }
        }
    }
    Ok(())
}

fn leaf_key(path: &[String], name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{}:{}", join(path), name)
    }
}

fn escape_into(s: &str, out: &mut String) {
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{0008}' => out.push_str("\\b"),
            '\u{000C}' => out.push_str("\\f"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
}

impl Codec for JsonCodec {
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
        let mut out = String::from("{");
        for (i, (key, value)) in map.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            out.push_str("\n  \"");
            escape_into(key, &mut out);
            out.push_str("\": \"");
            escape_into(value, &mut out);
            out.push('"');
        }
        out.push_str("\n}");
        out
    }
}
