//! Error types for ip2asn.

use thiserror::Error;

/// Error type for ip2asn operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Text is neither a valid IPv4 nor IPv6 address
    #[error("invalid IP address: {0}")]
    InvalidAddress(String),

    /// Invalid cache file magic bytes
    #[error("invalid magic bytes: expected IP2ASN cache header")]
    InvalidMagic,

    /// Unsupported cache format version
    #[error("unsupported cache format version: {0}")]
    UnsupportedVersion(u32),

    /// Checksum mismatch
    #[error("checksum mismatch")]
    ChecksumMismatch,

    /// Invalid header size
    #[error("invalid header size: expected {expected}, got {actual}")]
    InvalidHeaderSize { expected: usize, actual: usize },

    /// Cache payload ended before a field could be read
    #[error("truncated cache data while reading {0}")]
    Truncated(&'static str),

    /// Cache payload decoded but is internally inconsistent
    #[error("corrupt cache: {0}")]
    CorruptCache(String),

    /// A required column is not present in the source table
    #[error("missing column: {0}")]
    MissingColumn(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for ip2asn operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for a single source row that cannot be indexed.
///
/// Row errors never abort a load; the builder logs them and moves on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RowError {
    /// Row has fewer fields than the column map requires
    #[error("row has {found} fields, need at least {needed}")]
    MissingFields { needed: usize, found: usize },

    /// Start or end is neither a decimal integer nor an address
    #[error("unparsable {field} value: {value:?}")]
    UnparsableRow { field: &'static str, value: String },

    /// Start is greater than end
    #[error("inverted range: start {start} > end {end}")]
    InvertedRange { start: u128, end: u128 },
}
