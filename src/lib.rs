//! ip2asn - Map IP addresses to the autonomous system that announces them.
//!
//! This crate loads the tab-separated range tables published by
//! iptoasn.com and answers two questions:
//!
//! - Which range (ASN, country, owner) contains a given address?
//! - Which ranges does a given ASN announce?
//!
//! # Features
//!
//! - **IPv4 and IPv6**: Both families share a single 128-bit key space
//! - **Flexible sources**: Numeric or textual bounds, FSDB column headers, gzip
//! - **Binary cache**: Checksummed, optionally LZ4 compressed, memory-mapped on load
//! - **Thread-safe**: Lock-free lookups with atomic index replacement
//!
//! # Quick Start
//!
//! ```ignore
//! use ip2asn::{Database, DatabaseConfig};
//!
//! let db = Database::open(
//!     "/data/ip2asn-combined.tsv.gz",
//!     DatabaseConfig::default().with_cache_contents(true),
//! )?;
//!
//! let result = db.lookup_address("1.1.1.1")?;
//! // Some(LookupResult { asn: "13335", country: "US", owner: "CLOUDFLARENET ...", .. })
//!
//! for record in db.lookup_asn(13335, Some(10)) {
//!     println!("{:?} {}", record.ip_range, record.owner);
//! }
//! ```
//!
//! # Lower-level pieces
//!
//! - [`address`]: Address text to and from integers
//! - [`wide`]: Fixed-width word encoding of 128-bit integers
//! - [`index`]: The sorted range index and its lookups
//! - [`source`]: Source table reader
//! - [`cache`]: Binary cache container

mod config;
mod database;
mod error;
mod shared;

pub mod address;
pub mod cache;
pub mod index;
pub mod source;
pub mod wide;

/// Crate version, stamped into written caches.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Re-export core types
pub use error::{Error, Result, RowError};

pub use address::{AddressCodec, IpVersion};
pub use cache::CacheStore;
pub use config::DatabaseConfig;
pub use database::Database;
pub use index::{AsnIndex, AsnRecord, ColumnMap, Interval, LookupResult, RangeIndex};
pub use shared::{CacheStats, SharedIndex};
pub use source::SourceTable;
