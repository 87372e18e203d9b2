//! Format-preserving configuration engine.
//!
//! Loads hierarchical key/value documents (INI, JSON, XML) into a flat,
//! case-insensitive map, and writes modifications back onto the original
//! document while keeping comments, whitespace and structural layout intact.

pub mod codec;
pub mod document;
pub mod stream;

pub use codec::{Codec, IniCodec, JsonCodec, KeySet, XmlCodec};
pub use document::{ConfigDocument, ConfigError, FlatMap, Location};
pub use stream::{FileStreams, MemoryStreams, StreamProvider};
