use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex};

use super::StreamProvider;

/// In-memory stream provider.
///
/// Clones share the same backing store, so a test can keep a handle while
/// the engine owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryStreams {
    files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryStreams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a document, overwriting any previous contents.
    pub fn seed(&self, path: &str, contents: &str) {
        let mut files = self.files.lock().unwrap();
        files.insert(path.to_string(), contents.as_bytes().to_vec());
    }
}

impl StreamProvider for MemoryStreams {
    fn exists(&self, path: &str) -> io::Result<bool> {
        let files = self.files.lock().unwrap();
        Ok(files.contains_key(path))
    }

    fn read(&self, path: &str) -> io::Result<String> {
        let files = self.files.lock().unwrap();
        let bytes = files
            .get(path)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.to_string()))?;
        String::from_utf8(bytes.clone())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    fn create_new(&self, path: &str, contents: &[u8]) -> io::Result<()> {
        let mut files = self.files.lock().unwrap();
        if files.contains_key(path) {
            return Err(io::Error::new(io::ErrorKind::AlreadyExists, path.to_string()));
        }
        files.insert(path.to_string(), contents.to_vec());
        Ok(())
    }

    fn replace(&self, path: &str, contents: &[u8]) -> io::Result<()> {
        let mut files = self.files.lock().unwrap();
        files.insert(path.to_string(), contents.to_vec());
        Ok(())
    }

    fn delete(&self, path: &str) -> io::Result<()> {
        let mut files = self.files.lock().unwrap();
        files
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.to_string()))
    }
}
