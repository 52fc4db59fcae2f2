//! Secondary index from ASN to ranges.

use ahash::AHashMap;
use std::fmt::Display;

use super::{Interval, RangeIndex};

/// Maps each ASN to the positions of its ranges in a [`RangeIndex`].
///
/// Built in one pass for callers that look up many ASNs; results match
/// [`RangeIndex::lookup_by_asn`] exactly, including order and limit.
#[derive(Debug, Clone, Default)]
pub struct AsnIndex {
    positions: AHashMap<String, Vec<usize>>,
}

impl AsnIndex {
    /// Build from a range index.
    pub fn build(index: &RangeIndex) -> Self {
        let mut positions: AHashMap<String, Vec<usize>> = AHashMap::new();
        for (pos, interval) in index.intervals().iter().enumerate() {
            positions.entry(interval.asn.clone()).or_default().push(pos);
        }
        Self { positions }
    }

    /// Number of distinct ASNs.
    pub fn asn_count(&self) -> usize {
        self.positions.len()
    }

    /// Ranges of `asn` in `index`, in stored order.
    ///
    /// `index` must be the one this was built from.
    pub fn lookup<'a, A: Display>(
        &self,
        index: &'a RangeIndex,
        asn: A,
        limit: Option<usize>,
    ) -> Vec<&'a Interval> {
        let limit = limit.filter(|l| *l > 0).unwrap_or(usize::MAX);
        self.positions
            .get(&asn.to_string())
            .map(|positions| {
                positions
                    .iter()
                    .take(limit)
                    .filter_map(|pos| index.intervals().get(*pos))
                    .collect()
            })
            .unwrap_or_default()
    }
}
