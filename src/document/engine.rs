use tracing::debug;

use super::{ConfigError, FlatMap};
use crate::codec::{Codec, IniCodec, JsonCodec, XmlCodec};
use crate::stream::{FileStreams, StreamProvider};

/// A configuration document bound to one path, one grammar, and one stream
/// provider.
///
/// Owns the atomic-commit protocol: a commit either rewrites the existing
/// document in place (comments, whitespace and layout preserved) or
/// generates a fresh minimal one, and it fails loudly when the in-memory
/// map and the on-disk key set have drifted apart.
///
/// Single-threaded by design; do not share one instance across concurrent
/// Load/Set/Commit calls.
///
/// ## Example
///
/// ```no_run
/// use stencil_conf::ConfigDocument;
///
/// let mut doc = ConfigDocument::ini("app.ini")?;
/// doc.load()?;
/// doc.set("Database:Host", "localhost");
/// doc.commit()?;
/// # Ok::<(), stencil_conf::ConfigError>(())
/// ```
#[derive(Debug)]
pub struct ConfigDocument<C, S> {
    path: String,
    codec: C,
    streams: S,
    map: FlatMap,
}

impl ConfigDocument<IniCodec, FileStreams> {
    /// File-backed INI document.
    pub fn ini(path: impl Into<String>) -> Result<Self, ConfigError> {
        Self::new(path, IniCodec, FileStreams::new())
    }
}

impl ConfigDocument<JsonCodec, FileStreams> {
    /// File-backed JSON document.
    pub fn json(path: impl Into<String>) -> Result<Self, ConfigError> {
        Self::new(path, JsonCodec, FileStreams::new())
    }
}

impl ConfigDocument<XmlCodec, FileStreams> {
    /// File-backed XML document.
    pub fn xml(path: impl Into<String>) -> Result<Self, ConfigError> {
        Self::new(path, XmlCodec, FileStreams::new())
    }
}

impl<C: Codec, S: StreamProvider> ConfigDocument<C, S> {
    /// Binds a document to `path` with an injected codec and provider.
    ///
    /// Fails with [`ConfigError::EmptyPath`] before any I/O when the path
    /// is empty or blank.
    pub fn new(path: impl Into<String>, codec: C, streams: S) -> Result<Self, ConfigError> {
        let path = path.into();
        if path.trim().is_empty() {
            return Err(ConfigError::EmptyPath);
        }
        Ok(Self {
            path,
            codec,
            streams,
            map: FlatMap::new(),
        })
    }

    /// Reads and flattens the document at the bound path. A missing
    /// document is a from-scratch source and yields an empty map.
    ///
    /// On parse failure no partial map is kept.
    pub fn load(&mut self) -> Result<(), ConfigError> {
        self.map = FlatMap::new();
        if !self.exists()? {
            debug!(path = %self.path, "no document; starting from an empty map");
            return Ok(());
        }
        let contents = self.read()?;
        self.map = self.codec.parse(&contents)?;
        debug!(path = %self.path, keys = self.map.len(), "document loaded");
        Ok(())
    }

    /// Case-insensitive lookup by full flattened key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.map.set(key, value);
    }

    /// All entries, in map order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.map.iter()
    }

    /// Writes the map back. With an existing document the template is
    /// rewritten into an in-memory buffer first and the path is replaced in
    /// one call, so the visible document is always either the old one or
    /// the whole new one. Without one, a fresh minimal document is
    /// generated; a partially written artifact is deleted before the error
    /// propagates.
    pub fn commit(&self) -> Result<(), ConfigError> {
        if self.exists()? {
            self.commit_over_template()
        } else {
            self.commit_fresh()
        }
    }

    fn commit_fresh(&self) -> Result<(), ConfigError> {
        debug!(path = %self.path, "no template; generating a fresh document");
        let doc = self.codec.generate(&self.map);
        if let Err(source) = self.streams.create_new(&self.path, doc.as_bytes()) {
            // Only our own partial artifact may be removed. A refused
            // create means a document appeared at the path in the
            // meantime; that one is not ours to delete.
            if source.kind() != std::io::ErrorKind::AlreadyExists {
                if let Ok(true) = self.streams.exists(&self.path) {
                    let _ = self.streams.delete(&self.path);
                }
            }
            return Err(ConfigError::Write {
                path: self.path.clone(),
                source,
            });
        }
        Ok(())
    }

    fn commit_over_template(&self) -> Result<(), ConfigError> {
        let template = self.read()?;
        let mut staged = String::with_capacity(template.len());
        let seen = self.codec.rewrite(&template, &mut staged, &self.map)?;
        if seen.len() != self.map.len() {
            let missing: Vec<&str> = self.map.keys().filter(|k| !seen.contains(k)).collect();
            return Err(ConfigError::MissingKeys(missing.join(", ")));
        }
        self.streams
            .replace(&self.path, staged.as_bytes())
            .map_err(|source| ConfigError::Write {
                path: self.path.clone(),
                source,
            })?;
        debug!(path = %self.path, keys = seen.len(), "document committed");
        Ok(())
    }

    fn exists(&self) -> Result<bool, ConfigError> {
        self.streams.exists(&self.path).map_err(|source| ConfigError::Read {
            path: self.path.clone(),
            source,
        })
    }

    fn read(&self) -> Result<String, ConfigError> {
        self.streams.read(&self.path).map_err(|source| ConfigError::Read {
            path: self.path.clone(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;
    use crate::stream::MemoryStreams;

    fn ini_doc(streams: &MemoryStreams) -> ConfigDocument<IniCodec, MemoryStreams> {
        ConfigDocument::new("app.ini", IniCodec, streams.clone()).unwrap()
    }

    #[test]
    fn test_empty_path_is_rejected_before_io() {
        let err = ConfigDocument::new("  ", IniCodec, MemoryStreams::new()).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyPath));
    }

    #[test]
    fn test_load_missing_document_yields_empty_map() {
        let streams = MemoryStreams::new();
        let mut doc = ini_doc(&streams);
        doc.load().unwrap();
        assert_eq!(doc.entries().count(), 0);
    }

    #[test]
    fn test_load_get_set_commit_over_template() {
        let streams = MemoryStreams::new();
        streams.seed("app.ini", "; db settings\n[DefaultConnection]\nConnectionString=Old\n");
        let mut doc = ini_doc(&streams);
        doc.load().unwrap();
        assert_eq!(doc.get("defaultconnection:connectionstring"), Some("Old"));
        doc.set("DefaultConnection:ConnectionString", "New");
        doc.commit().unwrap();
        assert_eq!(
            streams.read("app.ini").unwrap(),
            "; db settings\n[DefaultConnection]\nConnectionString=New\n"
        );
    }

    #[test]
    fn test_untouched_commit_reproduces_the_template() {
        let streams = MemoryStreams::new();
        let template = "# note\n[S]\nkey = \"v\"\n\n";
        streams.seed("app.ini", template);
        let mut doc = ini_doc(&streams);
        doc.load().unwrap();
        doc.commit().unwrap();
        assert_eq!(streams.read("app.ini").unwrap(), template);
    }

    #[test]
    fn test_commit_fresh_generates_flat_document() {
        let streams = MemoryStreams::new();
        let mut doc = ini_doc(&streams);
        doc.load().unwrap();
        doc.set("a:b", "1");
        doc.set("c", "2");
        doc.commit().unwrap();
        assert_eq!(streams.read("app.ini").unwrap(), "a:b=1\nc=2");
    }

    #[test]
    fn test_commit_reports_missing_keys_in_map_order() {
        let streams = MemoryStreams::new();
        streams.seed("app.ini", "known=1\n");
        let mut doc = ini_doc(&streams);
        doc.load().unwrap();
        doc.set("ghost:one", "x");
        doc.set("ghost:two", "y");
        let err = doc.commit().unwrap_err();
        assert!(
            matches!(err, ConfigError::MissingKeys(keys) if keys == "ghost:one, ghost:two")
        );
        // Nothing was written.
        assert_eq!(streams.read("app.ini").unwrap(), "known=1\n");
    }

    #[test]
    fn test_commit_rejects_keys_added_behind_our_back() {
        let streams = MemoryStreams::new();
        streams.seed("app.ini", "a=1\n");
        let mut doc = ini_doc(&streams);
        doc.load().unwrap();
        streams.seed("app.ini", "a=1\nsurprise=2\n");
        let err = doc.commit().unwrap_err();
        assert!(matches!(err, ConfigError::NewKeyFound(key) if key == "surprise"));
        assert_eq!(streams.read("app.ini").unwrap(), "a=1\nsurprise=2\n");
    }

    /// Writes half the document, then fails.
    #[derive(Debug, Clone)]
    struct TornStreams {
        inner: MemoryStreams,
    }

    impl StreamProvider for TornStreams {
        fn exists(&self, path: &str) -> io::Result<bool> {
            self.inner.exists(path)
        }
        fn read(&self, path: &str) -> io::Result<String> {
            self.inner.read(path)
        }
        fn create_new(&self, path: &str, contents: &[u8]) -> io::Result<()> {
            self.inner.create_new(path, &contents[..contents.len() / 2])?;
            Err(io::Error::new(io::ErrorKind::Other, "disk full"))
        }
        fn replace(&self, path: &str, contents: &[u8]) -> io::Result<()> {
            self.inner.replace(path, contents)
        }
        fn delete(&self, path: &str) -> io::Result<()> {
            self.inner.delete(path)
        }
    }

    /// Reports the path as absent once, then tells the truth. Models a
    /// document appearing between the existence check and `create_new`.
    #[derive(Debug)]
    struct RacingStreams {
        inner: MemoryStreams,
        lied: std::sync::atomic::AtomicBool,
    }

    impl StreamProvider for RacingStreams {
        fn exists(&self, path: &str) -> io::Result<bool> {
            if !self.lied.swap(true, std::sync::atomic::Ordering::SeqCst) {
                return Ok(false);
            }
            self.inner.exists(path)
        }
        fn read(&self, path: &str) -> io::Result<String> {
            self.inner.read(path)
        }
        fn create_new(&self, path: &str, contents: &[u8]) -> io::Result<()> {
            self.inner.create_new(path, contents)
        }
        fn replace(&self, path: &str, contents: &[u8]) -> io::Result<()> {
            self.inner.replace(path, contents)
        }
        fn delete(&self, path: &str) -> io::Result<()> {
            self.inner.delete(path)
        }
    }

    #[test]
    fn test_refused_create_leaves_the_other_document_alone() {
        let inner = MemoryStreams::new();
        inner.seed("app.ini", "foreign=1");
        let racing = RacingStreams {
            inner: inner.clone(),
            lied: std::sync::atomic::AtomicBool::new(false),
        };
        let mut doc = ConfigDocument::new("app.ini", IniCodec, racing).unwrap();
        doc.set("a", "1");
        let err = doc.commit().unwrap_err();
        assert!(matches!(err, ConfigError::Write { .. }));
        // The document that won the race is untouched.
        assert_eq!(inner.read("app.ini").unwrap(), "foreign=1");
    }

    #[test]
    fn test_failed_fresh_commit_deletes_the_partial_artifact() {
        let inner = MemoryStreams::new();
        let torn = TornStreams { inner: inner.clone() };
        let mut doc = ConfigDocument::new("app.ini", IniCodec, torn).unwrap();
        doc.set("a", "1");
        let err = doc.commit().unwrap_err();
        assert!(matches!(err, ConfigError::Write { .. }));
        assert!(!inner.exists("app.ini").unwrap());
    }

    #[test]
    fn test_works_against_every_codec() {
        let streams = MemoryStreams::new();
        streams.seed("app.json", "{\"a\": {\"b\": \"1\"}}");
        let mut doc = ConfigDocument::new("app.json", JsonCodec, streams.clone()).unwrap();
        doc.load().unwrap();
        doc.set("a:b", "2");
        doc.commit().unwrap();
        assert_eq!(streams.read("app.json").unwrap(), "{\"a\": {\"b\": \"2\"}}");

        streams.seed("app.xml", "<settings><a>1</a></settings>");
        let mut doc = ConfigDocument::new("app.xml", XmlCodec, streams.clone()).unwrap();
        doc.load().unwrap();
        doc.set("a", "2");
        doc.commit().unwrap();
        assert_eq!(
            streams.read("app.xml").unwrap(),
            "<settings><a>2</a></settings>"
        );
    }
}
