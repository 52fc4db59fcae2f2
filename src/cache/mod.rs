//! Binary cache of a parsed range index.
//!
//! Parsing a multi-million-row source table takes seconds; restoring the
//! cache does not. The cache is a header + payload container:
//!
//! ```text
//! +----------------------+
//! |  HEADER (64 bytes)   |  magic, format version, flags, timestamp,
//! |                      |  payload checksum, row count, payload size
//! +----------------------+
//! |  VERSION TAG         |  u16 length + UTF-8
//! +----------------------+
//! |  COLUMNS             |  5 x u32
//! +----------------------+
//! |  ROWS                |  u32 count, then per row: start, end (wide),
//! |                      |  ASN, country, name (u32 length + UTF-8)
//! +----------------------+
//! |  KEYS                |  u32 count, then wide start addresses
//! +----------------------+
//! ```
//!
//! Everything after the header may be LZ4 compressed as a unit.

mod format;
mod reader;
mod writer;


pub use format::*;
pub use reader::{CacheContents, CacheReader};
pub use writer::CacheWriter;

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::index::RangeIndex;
use crate::Result;

/// Saves and restores range indexes, tagged with the running version.
#[derive(Debug, Clone)]
pub struct CacheStore {
    version_tag: String,
    compress: bool,
}

impl CacheStore {
    /// Create a store for the given running version.
    pub fn new(version_tag: impl Into<String>) -> Self {
        Self {
            version_tag: version_tag.into(),
            compress: false,
        }
    }

    /// Compress payloads written by this store.
    pub fn with_compression(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    /// Running version tag.
    pub fn version_tag(&self) -> &str {
        &self.version_tag
    }

    /// Default cache location for a source table: `<source>.<extension>`.
    pub fn cache_path_for(source: &Path, extension: &str) -> PathBuf {
        let mut name = source.as_os_str().to_owned();
        name.push(".");
        name.push(extension);
        PathBuf::from(name)
    }

    /// Serialize an index to bytes.
    pub fn to_bytes(&self, index: &RangeIndex) -> Result<Vec<u8>> {
        CacheWriter::new(&self.version_tag)
            .with_compression(self.compress)
            .write(index)
    }

    /// Restore an index from bytes.
    ///
    /// A version tag other than the running one is logged and accepted.
    pub fn from_bytes(&self, data: &[u8]) -> Result<RangeIndex> {
        let contents = CacheReader::decode(data)?;
        self.check_version(&contents.version_tag);
        Ok(contents.index)
    }

    /// Write an index to `destination`, replacing it atomically.
    pub fn save(&self, index: &RangeIndex, destination: &Path) -> Result<()> {
        let data = self.to_bytes(index)?;

        let dir = match destination.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let mut temp_file = tempfile::NamedTempFile::new_in(dir)?;
        temp_file.write_all(&data)?;
        temp_file.as_file().sync_all()?;
        temp_file.persist(destination).map_err(|e| e.error)?;

        log::debug!(
            "Saved cache {:?}: {} rows, {} bytes",
            destination,
            index.len(),
            data.len()
        );
        Ok(())
    }

    /// Restore an index from `source`.
    ///
    /// Returns `Ok(None)` when no cache file exists.
    pub fn load(&self, source: &Path) -> Result<Option<RangeIndex>> {
        if !source.exists() {
            log::debug!("No cache file at {:?}", source);
            return Ok(None);
        }

        let contents = CacheReader::open(source)?;
        self.check_version(&contents.version_tag);

        log::debug!(
            "Loaded cache {:?}: {} rows (written by {})",
            source,
            contents.index.len(),
            contents.version_tag
        );
        Ok(Some(contents.index))
    }

    fn check_version(&self, stored: &str) {
        if stored != self.version_tag {
            log::warn!(
                "Cache was written by version {} but this is version {}; using it anyway",
                stored,
                self.version_tag
            );
        }
    }
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new(crate::VERSION)
    }
}
