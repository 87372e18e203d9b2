use std::fmt;

use thiserror::Error;

/// Position within a source document, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub line: u32,
    pub column: u32,
}

impl Location {
    pub(crate) fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("document path must not be empty")]
    EmptyPath,

    #[error("failed to read '{path}': {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to write '{path}': {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },

    #[error("unrecognized line: '{0}'")]
    UnrecognizedLine(String),

    #[error("root of the document must be an object ({0})")]
    RootNotObject(Location),

    #[error("unsupported {kind} at '{path}' ({location})")]
    UnsupportedToken {
        kind: &'static str,
        path: String,
        location: Location,
    },

    #[error("unexpected end of input at '{path}' ({location})")]
    UnexpectedEnd { path: String, location: Location },

    #[error("XML namespaces are not supported ({0})")]
    NamespaceNotSupported(Location),

    #[error("DTD processing is prohibited ({0})")]
    DtdProhibited(Location),

    #[error("malformed document: {reason} ({location})")]
    Malformed { reason: String, location: Location },

    #[error("duplicate key '{key}' ({location})")]
    DuplicateKey { key: String, location: Location },

    #[error("key '{0}' exists in the document but not in the loaded map")]
    NewKeyFound(String),

    #[error("keys never presented by the document: {0}")]
    MissingKeys(String),
}
