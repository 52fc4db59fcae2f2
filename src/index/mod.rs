//! In-memory range index.
//!
//! The index keeps every table row in file order next to a parallel array
//! of start addresses. Containment lookups binary-search the key array;
//! ASN lookups scan the rows.
//!
//! The source tables published by iptoasn.com are sorted by start address
//! and contain no overlapping ranges. The index relies on that and does not
//! sort or validate rows itself.

mod asn;
mod interval;

pub use asn::AsnIndex;
pub use interval::{parse_bound, AsnRecord, Interval, LookupResult};

use std::fmt::Display;

use crate::address::AddressCodec;
use crate::source::SourceTable;
use crate::Result;

/// Positions of the five logical columns in a source row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnMap {
    pub start: usize,
    pub end: usize,
    pub asn: usize,
    pub country: usize,
    pub name: usize,
}

impl ColumnMap {
    /// Logical column names, in default order.
    pub const NAMES: [&'static str; 5] = ["start", "end", "ASN", "country", "name"];

    /// Build from positions listed in [`ColumnMap::NAMES`] order.
    pub fn from_positions(positions: [usize; 5]) -> Self {
        Self {
            start: positions[0],
            end: positions[1],
            asn: positions[2],
            country: positions[3],
            name: positions[4],
        }
    }

    /// Positions in [`ColumnMap::NAMES`] order.
    pub fn positions(&self) -> [usize; 5] {
        [self.start, self.end, self.asn, self.country, self.name]
    }

    /// Highest column position referenced.
    pub fn max_position(&self) -> usize {
        self.positions().into_iter().max().unwrap_or(0)
    }
}

impl Default for ColumnMap {
    fn default() -> Self {
        Self::from_positions([0, 1, 2, 3, 4])
    }
}

/// Row counts from building an index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// Rows stored in the index
    pub accepted: usize,
    /// Rows skipped because they could not be parsed
    pub skipped: usize,
}

/// Sorted, read-only table of address ranges.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RangeIndex {
    intervals: Vec<Interval>,
    /// `intervals[i].start`, kept in lock-step for binary search
    keys: Vec<u128>,
    columns: ColumnMap,
}

impl RangeIndex {
    /// Build an index from raw source rows in file order.
    ///
    /// Rows whose bounds cannot be parsed are logged and skipped.
    pub fn build<I, R, S>(rows: I, columns: ColumnMap, codec: &AddressCodec) -> (Self, BuildReport)
    where
        I: IntoIterator<Item = R>,
        R: AsRef<[S]>,
        S: AsRef<str>,
    {
        let mut intervals = Vec::new();
        let mut keys = Vec::new();
        let mut report = BuildReport::default();

        for (line, row) in rows.into_iter().enumerate() {
            let fields = row.as_ref();
            match Interval::from_row(fields, &columns, codec) {
                Ok(interval) => {
                    keys.push(interval.start);
                    intervals.push(interval);
                    report.accepted += 1;
                }
                Err(e) => {
                    let text: Vec<&str> = fields.iter().map(|f| f.as_ref()).collect();
                    log::error!("failed to parse row {} {:?}: {}", line + 1, text, e);
                    report.skipped += 1;
                }
            }
        }

        log::debug!(
            "Built range index: {} rows, {} skipped",
            report.accepted,
            report.skipped
        );

        (
            Self {
                intervals,
                keys,
                columns,
            },
            report,
        )
    }

    /// Build an index from a source table.
    ///
    /// A read error part way through the table fails the whole build.
    pub fn from_source(table: SourceTable, codec: &AddressCodec) -> Result<(Self, BuildReport)> {
        let columns = table.column_map()?;
        let mut rows = table.rows();
        let built = Self::build(rows.by_ref(), columns, codec);
        match rows.take_error() {
            Some(e) => Err(e.into()),
            None => Ok(built),
        }
    }

    /// Assemble an index from already-parsed intervals.
    pub fn from_parts(intervals: Vec<Interval>, columns: ColumnMap) -> Self {
        let keys = intervals.iter().map(|i| i.start).collect();
        Self {
            intervals,
            keys,
            columns,
        }
    }

    /// Number of ranges.
    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    /// Whether the index has no ranges.
    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// All ranges in stored order.
    pub fn intervals(&self) -> &[Interval] {
        &self.intervals
    }

    /// Start addresses in stored order.
    pub fn keys(&self) -> &[u128] {
        &self.keys
    }

    /// Column positions of the source the index was built from.
    pub fn columns(&self) -> ColumnMap {
        self.columns
    }

    /// Find the range containing `address`.
    ///
    /// Only the range with the greatest start `<= address` is considered;
    /// if `address` falls past its end the lookup reports `None`.
    pub fn lookup_containing(&self, address: u128) -> Option<&Interval> {
        let point = self.keys.partition_point(|key| *key <= address);
        if point == 0 {
            return None;
        }

        let candidate = &self.intervals[point - 1];
        if candidate.contains(address) {
            Some(candidate)
        } else {
            None
        }
    }

    /// Find all ranges announced by `asn`, in stored order.
    ///
    /// `limit` of `None` or `Some(0)` returns every match.
    pub fn lookup_by_asn<A: Display>(&self, asn: A, limit: Option<usize>) -> Vec<&Interval> {
        let asn = asn.to_string();
        let limit = limit.filter(|l| *l > 0).unwrap_or(usize::MAX);

        self.intervals
            .iter()
            .filter(|interval| interval.asn == asn)
            .take(limit)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_rows() -> Vec<Vec<&'static str>> {
        vec![
            vec!["16777216", "16777471", "13335", "US", "CLOUDFLARENET - Cloudflare, Inc."],
            vec!["16777472", "16778239", "0", "None", "Not routed"],
            vec!["16778240", "16779263", "56203", "AU", "GTELECOM-AUSTRALIA Gtelecom-AUSTRALIA"],
            // gap: 16779264 - 16781311 missing
            vec!["16781312", "16781567", "2519", "JP", "VECTANT ARTERIA Networks Corporation"],
            vec!["16843008", "16843263", "13335", "US", "CLOUDFLARENET - Cloudflare, Inc."],
        ]
    }

    fn sample_index() -> RangeIndex {
        let (index, report) =
            RangeIndex::build(sample_rows(), ColumnMap::default(), &AddressCodec::new());
        assert_eq!(report, BuildReport { accepted: 5, skipped: 0 });
        index
    }

    #[test]
    fn test_keys_parallel_to_intervals() {
        let index = sample_index();
        assert_eq!(index.len(), index.keys().len());
        for (key, interval) in index.keys().iter().zip(index.intervals()) {
            assert_eq!(*key, interval.start);
        }
    }

    #[test]
    fn test_lookup_inside_ranges() {
        let index = sample_index();
        for interval in index.intervals() {
            for query in [interval.start, interval.end, (interval.start + interval.end) / 2] {
                assert_eq!(index.lookup_containing(query), Some(interval));
            }
        }
    }

    #[test]
    fn test_lookup_cloudflare() {
        let index = sample_index();
        let hit = index.lookup_containing(16843009).unwrap();
        assert_eq!(hit.asn, "13335");
        assert_eq!(hit.country, "US");
        assert_eq!((hit.start, hit.end), (16843008, 16843263));
    }

    #[test]
    fn test_lookup_gap() {
        let index = sample_index();
        assert_eq!(index.lookup_containing(16779264), None);
        assert_eq!(index.lookup_containing(16781311), None);
    }

    #[test]
    fn test_lookup_before_first_and_after_last() {
        let index = sample_index();
        assert_eq!(index.lookup_containing(0), None);
        assert_eq!(index.lookup_containing(16777215), None);
        assert_eq!(index.lookup_containing(16843264), None);
        assert_eq!(index.lookup_containing(u128::MAX), None);
    }

    #[test]
    fn test_lookup_empty_index() {
        let index = RangeIndex::default();
        assert!(index.is_empty());
        assert_eq!(index.lookup_containing(16843009), None);
    }

    #[test]
    fn test_lookup_by_asn() {
        let index = sample_index();

        let all = index.lookup_by_asn("13335", None);
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].start, 16777216);
        assert_eq!(all[1].start, 16843008);

        let first = index.lookup_by_asn(13335, Some(1));
        assert_eq!(first, vec![all[0]]);

        assert_eq!(index.lookup_by_asn(13335u32, Some(0)).len(), 2);
        assert!(index.lookup_by_asn("64512", None).is_empty());
    }

    #[test]
    fn test_build_skips_bad_rows() {
        let mut rows = sample_rows();
        rows.insert(2, vec!["not-an-ip", "also-not", "1", "US", "BROKEN"]);
        rows.push(vec!["1.1.2.0"]);

        let (index, report) = RangeIndex::build(rows, ColumnMap::default(), &AddressCodec::new());
        assert_eq!(report, BuildReport { accepted: 5, skipped: 2 });
        assert_eq!(index.len(), 5);
        assert!(index.lookup_containing(16843009).is_some());
    }

    #[test]
    fn test_build_keeps_input_order() {
        let rows = vec![
            vec!["200", "299", "2", "US", "B"],
            vec!["100", "199", "1", "US", "A"],
        ];
        let (index, _) = RangeIndex::build(rows, ColumnMap::default(), &AddressCodec::new());
        assert_eq!(index.keys(), &[200, 100]);
    }

    #[test]
    fn test_build_with_reordered_columns() {
        let rows = vec![vec!["Example Org", "US", "64500", "10.0.0.255", "10.0.0.0"]];
        let columns = ColumnMap::from_positions([4, 3, 2, 1, 0]);
        let (index, report) = RangeIndex::build(rows, columns, &AddressCodec::new());
        assert_eq!(report.accepted, 1);

        let hit = index.lookup_containing(0x0A00_0001).unwrap();
        assert_eq!(hit.owner, "Example Org");
        assert_eq!(index.columns(), columns);
    }

    #[test]
    fn test_from_parts() {
        let index = sample_index();
        let rebuilt = RangeIndex::from_parts(index.intervals().to_vec(), index.columns());
        assert_eq!(rebuilt, index);
    }

    #[test]
    fn test_column_map() {
        let columns = ColumnMap::default();
        assert_eq!(columns.positions(), [0, 1, 2, 3, 4]);
        assert_eq!(columns.max_position(), 4);
    }
}
