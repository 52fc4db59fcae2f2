//! Cache file reader with memory-mapping support.

use memmap2::Mmap;
use std::fs::File;
use std::path::Path;

use super::format::*;
use crate::index::{ColumnMap, Interval, RangeIndex};
use crate::wide::WideInt64;
use crate::{Error, Result};

/// Decoded contents of a cache file.
#[derive(Debug)]
pub struct CacheContents {
    /// File header
    pub header: CacheHeader,
    /// Version tag of the writer
    pub version_tag: String,
    /// Restored index
    pub index: RangeIndex,
}

/// Decoder for the cache container.
pub struct CacheReader;

impl CacheReader {
    /// Memory-map and decode a cache file.
    pub fn open(path: &Path) -> Result<CacheContents> {
        let file = File::open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };
        Self::decode(&mmap)
    }

    /// Decode a cache container from bytes.
    pub fn decode(data: &[u8]) -> Result<CacheContents> {
        let header = CacheHeader::from_bytes(data)?;
        header.validate()?;

        let stored = &data[HEADER_SIZE..];
        if (stored.len() as u64) < header.payload_size {
            return Err(Error::Truncated("payload"));
        }
        let stored = &stored[..header.payload_size as usize];

        if payload_checksum(stored) != header.checksum {
            return Err(Error::ChecksumMismatch);
        }

        let flags = header.format_flags();
        let decompressed;
        let payload = if flags.contains(FormatFlags::PAYLOAD_COMPRESSED) {
            decompressed = decompress(stored)?;
            decompressed.as_slice()
        } else {
            stored
        };

        let mut cursor = PayloadCursor::new(payload);
        let version_tag = cursor.read_version_tag()?;
        let columns = cursor.read_columns()?;
        let intervals = cursor.read_rows()?;
        let keys = cursor.read_keys()?;

        if intervals.len() != header.row_count as usize {
            return Err(Error::CorruptCache(format!(
                "header lists {} rows, payload has {}",
                header.row_count,
                intervals.len()
            )));
        }
        if keys.len() != intervals.len()
            || keys.iter().zip(&intervals).any(|(key, row)| *key != row.start)
        {
            return Err(Error::CorruptCache(
                "key array does not match row starts".to_string(),
            ));
        }

        Ok(CacheContents {
            header,
            version_tag,
            index: RangeIndex::from_parts(intervals, columns),
        })
    }
}

#[cfg(feature = "compression")]
fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    lz4_flex::decompress_size_prepended(data)
        .map_err(|e| Error::CorruptCache(format!("LZ4 decompression failed: {}", e)))
}

#[cfg(not(feature = "compression"))]
fn decompress(_data: &[u8]) -> Result<Vec<u8>> {
    Err(Error::Config(
        "cache payload is compressed but the `compression` feature is disabled".to_string(),
    ))
}

/// Sequential reader over the payload bytes.
struct PayloadCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> PayloadCursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, len: usize, what: &'static str) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or(Error::Truncated(what))?;
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn read_u16(&mut self, what: &'static str) -> Result<u16> {
        Ok(u16::from_le_bytes(le_array(self.take(2, what)?)))
    }

    fn read_u32(&mut self, what: &'static str) -> Result<u32> {
        Ok(u32::from_le_bytes(le_array(self.take(4, what)?)))
    }

    fn read_string(&mut self, len: usize, what: &'static str) -> Result<String> {
        let bytes = self.take(len, what)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| Error::CorruptCache(format!("{} is not valid UTF-8", what)))
    }

    fn read_str(&mut self, what: &'static str) -> Result<String> {
        let len = self.read_u32(what)? as usize;
        self.read_string(len, what)
    }

    fn read_wide(&mut self, what: &'static str) -> Result<u128> {
        let (value, used) = WideInt64::read_from(&self.data[self.pos..]).map_err(|e| match e {
            Error::Truncated(_) => Error::Truncated(what),
            other => other,
        })?;
        self.pos += used;
        Ok(value.decode())
    }

    fn read_version_tag(&mut self) -> Result<String> {
        let len = self.read_u16("version tag")? as usize;
        self.read_string(len, "version tag")
    }

    fn read_columns(&mut self) -> Result<ColumnMap> {
        let mut positions = [0usize; 5];
        for position in positions.iter_mut() {
            *position = self.read_u32("column positions")? as usize;
        }
        Ok(ColumnMap::from_positions(positions))
    }

    fn read_rows(&mut self) -> Result<Vec<Interval>> {
        let count = self.read_u32("row count")? as usize;
        // each row takes at least 2 * 9 + 3 * 4 bytes
        let mut intervals = Vec::with_capacity(count.min(self.data.len() / 30));
        for _ in 0..count {
            let start = self.read_wide("row start")?;
            let end = self.read_wide("row end")?;
            let asn = self.read_str("row ASN")?;
            let country = self.read_str("row country")?;
            let owner = self.read_str("row name")?;
            intervals.push(Interval {
                start,
                end,
                asn,
                country,
                owner,
            });
        }
        Ok(intervals)
    }

    fn read_keys(&mut self) -> Result<Vec<u128>> {
        let count = self.read_u32("key count")? as usize;
        let mut keys = Vec::with_capacity(count.min(self.data.len() / 9));
        for _ in 0..count {
            keys.push(self.read_wide("key")?);
        }
        Ok(keys)
    }
}
