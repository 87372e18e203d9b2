//! Stream capability: byte-level access to named documents.

mod memory;

pub use memory::MemoryStreams;

use std::fmt;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;

/// The five operations the engine needs from its storage. Works against any
/// conforming implementation, file-backed or in-memory.
pub trait StreamProvider: fmt::Debug {
    fn exists(&self, path: &str) -> io::Result<bool>;

    fn read(&self, path: &str) -> io::Result<String>;

    /// Creates a fresh document. Fails when the path already has one.
    fn create_new(&self, path: &str, contents: &[u8]) -> io::Result<()>;

    /// Replaces the document at `path` with `contents` in one call.
    fn replace(&self, path: &str, contents: &[u8]) -> io::Result<()>;

    fn delete(&self, path: &str) -> io::Result<()>;
}

/// Filesystem-backed provider.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileStreams;

impl FileStreams {
    pub fn new() -> Self {
        Self
    }
}

impl StreamProvider for FileStreams {
    fn exists(&self, path: &str) -> io::Result<bool> {
        Path::new(path).try_exists()
    }

    fn read(&self, path: &str) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn create_new(&self, path: &str, contents: &[u8]) -> io::Result<()> {
        let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
        file.write_all(contents)
    }

    fn replace(&self, path: &str, contents: &[u8]) -> io::Result<()> {
        std::fs::write(path, contents)
    }

    fn delete(&self, path: &str) -> io::Result<()> {
        std::fs::remove_file(path)
    }
}
