//! Database facade: load, cache and query an ip2asn table.

use std::fmt::Display;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::address::AddressCodec;
use crate::config::DatabaseConfig;
use crate::index::{AsnRecord, Interval, LookupResult, RangeIndex};
use crate::shared::{CacheStats, SharedIndex};
use crate::source::SourceTable;
use crate::{Error, Result};

/// An ip2asn table ready for lookups.
///
/// # Example
///
/// ```ignore
/// use ip2asn::{Database, DatabaseConfig};
///
/// let db = Database::open(
///     "ip2asn-combined.tsv",
///     DatabaseConfig::default().with_cache_contents(true),
/// )?;
///
/// if let Some(result) = db.lookup_address("93.184.216.34")? {
///     println!("{} {} {}", result.asn, result.country, result.owner);
/// }
/// ```
pub struct Database {
    /// Source table path (None for in-memory sources)
    source: Option<PathBuf>,
    config: DatabaseConfig,
    codec: AddressCodec,
    index: SharedIndex,
}

impl Database {
    /// Open a source table, restoring from its cache when possible.
    ///
    /// A cache that cannot be decoded is logged and ignored.
    pub fn open(path: impl AsRef<Path>, config: DatabaseConfig) -> Result<Self> {
        let path = path.as_ref();
        let index = Self::load_index(path, &config)?;
        Ok(Self::assemble(Some(path.to_path_buf()), index, config))
    }

    /// Parse a table from a reader. No cache is read or written.
    pub fn from_reader<R: Read + 'static>(reader: R, config: DatabaseConfig) -> Result<Self> {
        let (index, report) = RangeIndex::from_source(SourceTable::from_reader(reader)?, &config.codec())?;
        log::debug!("Loaded {} ranges ({} skipped)", report.accepted, report.skipped);
        Ok(Self::assemble(None, index, config))
    }

    /// Serve an already built index.
    pub fn from_index(index: RangeIndex, config: DatabaseConfig) -> Self {
        Self::assemble(None, index, config)
    }

    fn assemble(source: Option<PathBuf>, index: RangeIndex, config: DatabaseConfig) -> Self {
        Self {
            source,
            codec: config.codec(),
            index: SharedIndex::with_capacity(index, config.query_cache_capacity),
            config,
        }
    }

    fn load_index(path: &Path, config: &DatabaseConfig) -> Result<RangeIndex> {
        if config.use_cache {
            let cache_path = config.cache_path_for(path);
            match config.cache_store().load(&cache_path) {
                Ok(Some(index)) => return Ok(index),
                Ok(None) => {}
                Err(e) => log::warn!("Ignoring unusable cache {:?}: {}", cache_path, e),
            }
        }

        Self::parse_source(path, config)
    }

    fn parse_source(path: &Path, config: &DatabaseConfig) -> Result<RangeIndex> {
        let (index, report) = RangeIndex::from_source(SourceTable::open(path)?, &config.codec())?;
        log::info!(
            "Loaded {} ranges from {:?} ({} rows skipped)",
            report.accepted,
            path,
            report.skipped
        );

        if config.cache_contents {
            config
                .cache_store()
                .save(&index, &config.cache_path_for(path))?;
        }

        Ok(index)
    }

    /// Source table path, if opened from a file.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Active configuration.
    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Address codec used for queries.
    pub fn codec(&self) -> &AddressCodec {
        &self.codec
    }

    /// Cache file location for the source table.
    pub fn cache_path(&self) -> Option<PathBuf> {
        self.source
            .as_deref()
            .map(|source| self.config.cache_path_for(source))
    }

    /// Number of ranges.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether the table has no ranges.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Find the table row containing an address.
    pub fn lookup_address_row(&self, address: &str) -> Result<Option<Interval>> {
        let numeric = self.codec.parse(address)?;
        Ok(self.index.lookup_containing(numeric))
    }

    /// Look up an address and describe the range containing it.
    ///
    /// Returns `Err(InvalidAddress)` for unparsable text and `Ok(None)` when
    /// no range covers the address.
    pub fn lookup_address(&self, address: &str) -> Result<Option<LookupResult>> {
        let numeric = self.codec.parse(address)?;
        Ok(self
            .index
            .lookup_containing(numeric)
            .map(|interval| LookupResult::new(address, numeric, &interval)))
    }

    /// All ranges announced by `asn`, in table order.
    pub fn lookup_asn<A: Display>(&self, asn: A, limit: Option<usize>) -> Vec<AsnRecord> {
        self.index
            .lookup_by_asn(asn, limit)
            .iter()
            .map(AsnRecord::from)
            .collect()
    }

    /// Write the current index to `path`, or to the default cache location.
    pub fn save_cache(&self, path: Option<&Path>) -> Result<PathBuf> {
        let destination = match path {
            Some(path) => path.to_path_buf(),
            None => self.cache_path().ok_or_else(|| {
                Error::Config("no cache path for a database without a source file".to_string())
            })?,
        };

        let store = self.config.cache_store();
        self.index
            .with_index(|index| store.save(index, &destination))?;
        Ok(destination)
    }

    /// Re-parse the source table and swap the new index in.
    ///
    /// Lookups keep being served from the old index until the new one is
    /// complete.
    pub fn reload(&self) -> Result<()> {
        let source = self
            .source
            .as_deref()
            .ok_or_else(|| Error::Config("database has no source file to reload".to_string()))?;
        let index = Self::parse_source(source, &self.config)?;
        self.index.replace(index);
        Ok(())
    }

    /// Query cache statistics.
    pub fn cache_stats(&self) -> CacheStats {
        self.index.cache_stats()
    }

    /// Shared index backing this database.
    pub fn shared_index(&self) -> &SharedIndex {
        &self.index
    }
}
