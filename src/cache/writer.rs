//! Cache file writer.

use super::format::*;
use crate::address::IpVersion;
use crate::index::RangeIndex;
use crate::wide::WideInt64;
use crate::{Error, Result};

/// Serializes a [`RangeIndex`] into the cache container.
pub struct CacheWriter {
    buffer: Vec<u8>,
    version_tag: String,
    compress: bool,
}

impl CacheWriter {
    /// Create a writer stamping `version_tag` into the payload.
    pub fn new(version_tag: &str) -> Self {
        Self {
            buffer: Vec::with_capacity(1024 * 1024), // 1MB initial
            version_tag: version_tag.to_string(),
            compress: false,
        }
    }

    /// Compress the payload with LZ4 (requires the `compression` feature).
    pub fn with_compression(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    /// Write an index to the binary container.
    pub fn write(&mut self, index: &RangeIndex) -> Result<Vec<u8>> {
        self.buffer.clear();

        let row_count = u32::try_from(index.len())
            .map_err(|_| Error::Config(format!("too many rows for cache: {}", index.len())))?;

        self.write_version_tag()?;
        self.write_columns(index)?;
        self.write_rows(index)?;
        self.write_keys(index)?;

        let mut flags = FormatFlags::empty();
        if index.intervals().iter().any(|i| i.version() == IpVersion::V6) {
            flags |= FormatFlags::HAS_V6;
        }

        let payload = if self.compress {
            self.compressed_payload(&mut flags)
        } else {
            std::mem::take(&mut self.buffer)
        };

        let header = CacheHeader {
            magic: MAGIC,
            version: FORMAT_VERSION,
            flags: flags.bits(),
            timestamp: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs() as i64,
            checksum: payload_checksum(&payload),
            row_count,
            payload_size: payload.len() as u64,
        };

        let mut output = Vec::with_capacity(HEADER_SIZE + payload.len());
        output.extend_from_slice(&header.to_bytes());
        output.extend_from_slice(&payload);
        Ok(output)
    }

    #[cfg(feature = "compression")]
    fn compressed_payload(&mut self, flags: &mut FormatFlags) -> Vec<u8> {
        *flags |= FormatFlags::PAYLOAD_COMPRESSED;
        lz4_flex::compress_prepend_size(&std::mem::take(&mut self.buffer))
    }

    #[cfg(not(feature = "compression"))]
    fn compressed_payload(&mut self, _flags: &mut FormatFlags) -> Vec<u8> {
        log::warn!("Cache compression requested but the `compression` feature is disabled");
        std::mem::take(&mut self.buffer)
    }

    fn write_version_tag(&mut self) -> Result<()> {
        let bytes = self.version_tag.as_bytes();
        let len = u16::try_from(bytes.len())
            .map_err(|_| Error::Config("version tag too long".to_string()))?;
        self.buffer.extend_from_slice(&len.to_le_bytes());
        self.buffer.extend_from_slice(bytes);
        Ok(())
    }

    fn write_columns(&mut self, index: &RangeIndex) -> Result<()> {
        for position in index.columns().positions() {
            let position = u32::try_from(position)
                .map_err(|_| Error::Config(format!("column position {} too large", position)))?;
            self.buffer.extend_from_slice(&position.to_le_bytes());
        }
        Ok(())
    }

    fn write_rows(&mut self, index: &RangeIndex) -> Result<()> {
        self.buffer
            .extend_from_slice(&(index.len() as u32).to_le_bytes());
        for interval in index.intervals() {
            WideInt64::encode(interval.start).write_to(&mut self.buffer);
            WideInt64::encode(interval.end).write_to(&mut self.buffer);
            self.write_str(&interval.asn)?;
            self.write_str(&interval.country)?;
            self.write_str(&interval.owner)?;
        }
        Ok(())
    }

    fn write_keys(&mut self, index: &RangeIndex) -> Result<()> {
        self.buffer
            .extend_from_slice(&(index.keys().len() as u32).to_le_bytes());
        for key in index.keys() {
            WideInt64::encode(*key).write_to(&mut self.buffer);
        }
        Ok(())
    }

    fn write_str(&mut self, value: &str) -> Result<()> {
        let len = u32::try_from(value.len())
            .map_err(|_| Error::Config("string field too long".to_string()))?;
        self.buffer.extend_from_slice(&len.to_le_bytes());
        self.buffer.extend_from_slice(value.as_bytes());
        Ok(())
    }
}
