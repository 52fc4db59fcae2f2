//! Cache file constants and header.

use bitflags::bitflags;
use sha2::{Digest, Sha256};

use crate::{Error, Result};

/// Magic bytes for identifying ip2asn cache files.
pub const MAGIC: [u8; 8] = *b"IP2ASN\x00\x01";

/// Current format version.
///
/// Bump whenever the payload encoding changes.
pub const FORMAT_VERSION: u32 = 1;

/// Header size in bytes.
pub const HEADER_SIZE: usize = 64;

/// Number of checksum bytes kept in the header.
pub const CHECKSUM_SIZE: usize = 16;

/// Default cache file extension, appended to the source file name.
pub const DEFAULT_EXTENSION: &str = "cache";

bitflags! {
    /// Format flags for cache files.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FormatFlags: u32 {
        /// Payload is LZ4 compressed.
        const PAYLOAD_COMPRESSED = 0b00000001;
        /// Index contains IPv6 ranges.
        const HAS_V6 = 0b00000010;
    }
}

/// Cache file header (64 bytes, little-endian).
///
/// ```text
/// 0x00  magic         [u8; 8]
/// 0x08  version       u32
/// 0x0C  flags         u32
/// 0x10  timestamp     i64
/// 0x18  checksum      [u8; 16]
/// 0x28  row_count     u32
/// 0x2C  payload_size  u64
/// 0x34  reserved      [u8; 12]
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheHeader {
    /// Magic bytes: "IP2ASN\x00\x01"
    pub magic: [u8; 8],
    /// Format version
    pub version: u32,
    /// Format flags
    pub flags: u32,
    /// Unix timestamp when the cache was written
    pub timestamp: i64,
    /// First 16 bytes of the SHA-256 of the stored payload
    pub checksum: [u8; CHECKSUM_SIZE],
    /// Number of ranges
    pub row_count: u32,
    /// Size of the stored (possibly compressed) payload
    pub payload_size: u64,
}

impl CacheHeader {
    /// Create a header with default values.
    pub fn new() -> Self {
        Self {
            magic: MAGIC,
            version: FORMAT_VERSION,
            flags: 0,
            timestamp: 0,
            checksum: [0; CHECKSUM_SIZE],
            row_count: 0,
            payload_size: 0,
        }
    }

    /// Serialize to the fixed 64-byte layout.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[0x00..0x08].copy_from_slice(&self.magic);
        out[0x08..0x0C].copy_from_slice(&self.version.to_le_bytes());
        out[0x0C..0x10].copy_from_slice(&self.flags.to_le_bytes());
        out[0x10..0x18].copy_from_slice(&self.timestamp.to_le_bytes());
        out[0x18..0x28].copy_from_slice(&self.checksum);
        out[0x28..0x2C].copy_from_slice(&self.row_count.to_le_bytes());
        out[0x2C..0x34].copy_from_slice(&self.payload_size.to_le_bytes());
        out
    }

    /// Parse the fixed 64-byte layout.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            return Err(Error::InvalidHeaderSize {
                expected: HEADER_SIZE,
                actual: data.len(),
            });
        }

        let mut magic = [0u8; 8];
        magic.copy_from_slice(&data[0x00..0x08]);
        let mut checksum = [0u8; CHECKSUM_SIZE];
        checksum.copy_from_slice(&data[0x18..0x28]);

        Ok(Self {
            magic,
            version: u32::from_le_bytes(le_array(&data[0x08..0x0C])),
            flags: u32::from_le_bytes(le_array(&data[0x0C..0x10])),
            timestamp: i64::from_le_bytes(le_array(&data[0x10..0x18])),
            checksum,
            row_count: u32::from_le_bytes(le_array(&data[0x28..0x2C])),
            payload_size: u64::from_le_bytes(le_array(&data[0x2C..0x34])),
        })
    }

    /// Validate the header magic and version.
    pub fn validate(&self) -> Result<()> {
        if self.magic != MAGIC {
            return Err(Error::InvalidMagic);
        }
        if self.version > FORMAT_VERSION {
            return Err(Error::UnsupportedVersion(self.version));
        }
        Ok(())
    }

    /// Get format flags.
    pub fn format_flags(&self) -> FormatFlags {
        FormatFlags::from_bits_truncate(self.flags)
    }
}

impl Default for CacheHeader {
    fn default() -> Self {
        Self::new()
    }
}

/// Truncated SHA-256 of a payload.
pub fn payload_checksum(payload: &[u8]) -> [u8; CHECKSUM_SIZE] {
    let digest = Sha256::digest(payload);
    let mut out = [0u8; CHECKSUM_SIZE];
    out.copy_from_slice(&digest[..CHECKSUM_SIZE]);
    out
}

/// Copy a slice of known length into an array.
pub(crate) fn le_array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[..N]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_bytes() {
        let mut header = CacheHeader::new();
        header.flags = FormatFlags::HAS_V6.bits();
        header.timestamp = 1_700_000_000;
        header.checksum = [7; CHECKSUM_SIZE];
        header.row_count = 42;
        header.payload_size = 1234;

        let bytes = header.to_bytes();
        assert_eq!(&bytes[0..8], &MAGIC);
        assert_eq!(u32::from_le_bytes(le_array(&bytes[8..12])), FORMAT_VERSION);
        assert_eq!(CacheHeader::from_bytes(&bytes).unwrap(), header);
        assert!(bytes[0x34..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_header_validation() {
        let header = CacheHeader::new();
        assert!(header.validate().is_ok());

        let mut bad_header = header;
        bad_header.magic = [0; 8];
        assert!(matches!(bad_header.validate(), Err(Error::InvalidMagic)));

        let mut newer = header;
        newer.version = FORMAT_VERSION + 1;
        assert!(matches!(newer.validate(), Err(Error::UnsupportedVersion(v)) if v == FORMAT_VERSION + 1));
    }

    #[test]
    fn test_short_header() {
        assert!(matches!(
            CacheHeader::from_bytes(&[0u8; 10]),
            Err(Error::InvalidHeaderSize { expected: HEADER_SIZE, actual: 10 })
        ));
    }

    #[test]
    fn test_payload_checksum() {
        assert_eq!(payload_checksum(b"abc"), payload_checksum(b"abc"));
        assert_ne!(payload_checksum(b"abc"), payload_checksum(b"abd"));
    }

    #[test]
    fn test_format_flags() {
        let mut header = CacheHeader::new();
        header.flags = (FormatFlags::PAYLOAD_COMPRESSED | FormatFlags::HAS_V6).bits() | 0x8000;
        let flags = header.format_flags();
        assert!(flags.contains(FormatFlags::PAYLOAD_COMPRESSED));
        assert!(flags.contains(FormatFlags::HAS_V6));
    }
}
