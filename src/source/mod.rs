//! Reading iptoasn source tables.
//!
//! A table is tab-separated text with five logical columns:
//!
//! ```text
//! start   end     ASN     country name
//! ```
//!
//! `start` and `end` are decimal integers or address text. A leading FSDB
//! header (`#fsdb -F t start end ASN country name`) may name the columns in
//! another order. Files ending in `.gz`, or starting with the gzip magic,
//! are decompressed on the fly.
//!
//! Lines that are not valid UTF-8 are decoded lossily and kept. A read
//! error ends the row stream and is reported by [`SourceRows::take_error`].

use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

use crate::index::ColumnMap;
use crate::{Error, Result};

/// FSDB header prefix.
const FSDB_HEADER: &str = "#fsdb";

/// Gzip magic bytes.
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// An opened source table, positioned at its first data row.
pub struct SourceTable {
    reader: Box<dyn BufRead>,
    header: Option<Vec<String>>,
    /// First data line, read while looking for a header
    pending: Option<String>,
}

impl SourceTable {
    /// Open a table file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = BufReader::new(File::open(path)?);

        let gzipped = path.extension().map_or(false, |ext| ext == "gz")
            || reader.fill_buf()?.starts_with(&GZIP_MAGIC);

        log::debug!("Opening source table {:?} (gzip: {})", path, gzipped);

        if gzipped {
            Self::from_buf_reader(Box::new(BufReader::new(GzDecoder::new(reader))))
        } else {
            Self::from_buf_reader(Box::new(reader))
        }
    }

    /// Read a table from any reader (uncompressed).
    pub fn from_reader<R: Read + 'static>(reader: R) -> Result<Self> {
        Self::from_buf_reader(Box::new(BufReader::new(reader)))
    }

    fn from_buf_reader(mut reader: Box<dyn BufRead>) -> Result<Self> {
        let mut header = None;
        let mut pending = None;

        let mut buf = Vec::new();
        while let Some(line) = read_text_line(&mut *reader, &mut buf)? {
            if let Some(rest) = line.strip_prefix(FSDB_HEADER) {
                header = Some(parse_fsdb_header(rest));
            } else if !is_skippable(&line) {
                pending = Some(line);
                break;
            }
        }

        Ok(Self {
            reader,
            header,
            pending,
        })
    }

    /// Column names from the FSDB header, if the table had one.
    pub fn column_names(&self) -> Option<&[String]> {
        self.header.as_deref()
    }

    /// Resolve column names to positions.
    ///
    /// Without a header the names resolve to their position in
    /// [`ColumnMap::NAMES`].
    pub fn column_numbers(&self, names: &[&str]) -> Result<Vec<usize>> {
        names
            .iter()
            .map(|name| match &self.header {
                Some(header) => header
                    .iter()
                    .position(|column| column == name)
                    .ok_or_else(|| Error::MissingColumn(name.to_string())),
                None => ColumnMap::NAMES
                    .iter()
                    .position(|column| column == name)
                    .ok_or_else(|| Error::MissingColumn(name.to_string())),
            })
            .collect()
    }

    /// Positions of the five logical columns.
    pub fn column_map(&self) -> Result<ColumnMap> {
        let numbers = self.column_numbers(&ColumnMap::NAMES)?;
        let mut positions = [0usize; 5];
        positions.copy_from_slice(&numbers);
        Ok(ColumnMap::from_positions(positions))
    }

    /// Iterate over the data rows as tab-split fields.
    pub fn rows(self) -> SourceRows {
        SourceRows {
            reader: self.reader,
            pending: self.pending,
            buf: Vec::new(),
            error: None,
        }
    }
}

/// Iterator over the data rows of a [`SourceTable`].
///
/// Iteration stops at the first read error; check [`SourceRows::take_error`]
/// afterwards to tell it apart from the end of the table.
pub struct SourceRows {
    reader: Box<dyn BufRead>,
    pending: Option<String>,
    buf: Vec<u8>,
    error: Option<io::Error>,
}

impl SourceRows {
    /// The read error that ended iteration, if any.
    pub fn take_error(&mut self) -> Option<io::Error> {
        self.error.take()
    }
}

impl Iterator for SourceRows {
    type Item = Vec<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(line) = self.pending.take() {
            return Some(split_row(&line));
        }

        if self.error.is_some() {
            return None;
        }

        loop {
            match read_text_line(&mut *self.reader, &mut self.buf) {
                Ok(None) => return None,
                Ok(Some(line)) => {
                    if !is_skippable(&line) {
                        return Some(split_row(&line));
                    }
                }
                Err(e) => {
                    log::error!("Stopped reading source table: {}", e);
                    self.error = Some(e);
                    return None;
                }
            }
        }
    }
}

/// Read one line without its terminator, or `None` at end of input.
fn read_text_line(reader: &mut dyn BufRead, buf: &mut Vec<u8>) -> io::Result<Option<String>> {
    buf.clear();
    if reader.read_until(b'\n', buf)? == 0 {
        return Ok(None);
    }
    while matches!(buf.last(), Some(b'\n' | b'\r')) {
        buf.pop();
    }

    let line = match String::from_utf8_lossy(buf) {
        std::borrow::Cow::Borrowed(text) => text.to_string(),
        std::borrow::Cow::Owned(text) => {
            log::warn!("Replaced invalid UTF-8 in source line: {:?}", text);
            text
        }
    };
    Ok(Some(line))
}

fn is_skippable(line: &str) -> bool {
    line.trim().is_empty() || line.starts_with('#')
}

fn split_row(line: &str) -> Vec<String> {
    line.split('\t').map(str::to_string).collect()
}

/// Parse the column names out of `#fsdb [-F t] [-R x] name name ...`.
fn parse_fsdb_header(rest: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut tokens = rest.split_whitespace();
    while let Some(token) = tokens.next() {
        if token.starts_with('-') && token.len() == 2 {
            // option with a value, e.g. `-F t`
            tokens.next();
            continue;
        }
        // typed columns look like `start:a`
        let name = token.split(':').next().unwrap_or(token);
        names.push(name.to_string());
    }
    names
}
