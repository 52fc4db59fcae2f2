//! Database configuration.

use std::path::{Path, PathBuf};

use crate::address::{AddressCodec, IpVersion};
use crate::cache::{CacheStore, DEFAULT_EXTENSION};

/// Configuration for opening a [`Database`](crate::Database).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// Fixed address family for queries; inferred per address when `None`.
    pub ip_version: Option<IpVersion>,
    /// Restore from the cache file when one exists.
    pub use_cache: bool,
    /// Write the cache file after parsing the source table.
    pub cache_contents: bool,
    /// Extension appended to the source path to name the cache file.
    pub cache_extension: String,
    /// Explicit cache file location, overriding the extension rule.
    pub cache_path: Option<PathBuf>,
    /// Version stamped into written caches and expected in read ones.
    pub version_tag: String,
    /// Compress written caches (requires the `compression` feature).
    pub compress_cache: bool,
    /// Capacity of the containment query cache; 0 disables it.
    pub query_cache_capacity: usize,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            ip_version: None,
            use_cache: true,
            cache_contents: false,
            cache_extension: DEFAULT_EXTENSION.to_string(),
            cache_path: None,
            version_tag: crate::VERSION.to_string(),
            compress_cache: false,
            query_cache_capacity: 0,
        }
    }
}

impl DatabaseConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fix the address family of queries.
    pub fn with_ip_version(mut self, version: IpVersion) -> Self {
        self.ip_version = Some(version);
        self
    }

    /// Enable or disable reading the cache.
    pub fn with_use_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    /// Enable or disable writing the cache after a source parse.
    pub fn with_cache_contents(mut self, cache_contents: bool) -> Self {
        self.cache_contents = cache_contents;
        self
    }

    /// Set the cache file extension.
    pub fn with_cache_extension(mut self, extension: &str) -> Self {
        self.cache_extension = extension.trim_start_matches('.').to_string();
        self
    }

    /// Set an explicit cache file location.
    pub fn with_cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_path = Some(path.into());
        self
    }

    /// Set the running version tag.
    pub fn with_version_tag(mut self, tag: &str) -> Self {
        self.version_tag = tag.to_string();
        self
    }

    /// Enable or disable cache compression.
    pub fn with_compression(mut self, compress: bool) -> Self {
        self.compress_cache = compress;
        self
    }

    /// Set the query cache capacity.
    pub fn with_query_cache(mut self, capacity: usize) -> Self {
        self.query_cache_capacity = capacity;
        self
    }

    /// Cache file location for a source table.
    pub fn cache_path_for(&self, source: &Path) -> PathBuf {
        match &self.cache_path {
            Some(path) => path.clone(),
            None => CacheStore::cache_path_for(source, &self.cache_extension),
        }
    }

    /// Cache store for this configuration.
    pub fn cache_store(&self) -> CacheStore {
        CacheStore::new(self.version_tag.clone()).with_compression(self.compress_cache)
    }

    /// Address codec for this configuration.
    pub fn codec(&self) -> AddressCodec {
        match self.ip_version {
            Some(version) => AddressCodec::with_version(version),
            None => AddressCodec::new(),
        }
    }
}
