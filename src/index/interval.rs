//! Table rows and lookup result records.

use ipnet::{IpNet, Ipv4Subnets, Ipv6Subnets};
use serde::Serialize;
use std::net::{Ipv4Addr, Ipv6Addr};

use super::ColumnMap;
use crate::address::{format_address, AddressCodec, IpVersion};
use crate::error::RowError;

/// One `[start, end]` range with its owner data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Interval {
    /// First address of the range
    pub start: u128,
    /// Last address of the range (inclusive)
    pub end: u128,
    /// ASN as text, `"0"` when not routed
    pub asn: String,
    /// ISO country code or `"None"`
    pub country: String,
    /// Organization name
    pub owner: String,
}

impl Interval {
    /// Create an interval.
    pub fn new(
        start: u128,
        end: u128,
        asn: impl Into<String>,
        country: impl Into<String>,
        owner: impl Into<String>,
    ) -> Self {
        Self {
            start,
            end,
            asn: asn.into(),
            country: country.into(),
            owner: owner.into(),
        }
    }

    /// Parse one source row.
    ///
    /// Each bound is read as a decimal integer first and as address text
    /// second; a row that fails both is rejected.
    pub fn from_row<S: AsRef<str>>(
        fields: &[S],
        columns: &ColumnMap,
        codec: &AddressCodec,
    ) -> Result<Self, RowError> {
        let needed = columns.max_position() + 1;
        if fields.len() < needed {
            return Err(RowError::MissingFields {
                needed,
                found: fields.len(),
            });
        }

        let field = |pos: usize| fields[pos].as_ref().trim();
        let start = parse_bound(field(columns.start), "start", codec)?;
        let end = parse_bound(field(columns.end), "end", codec)?;
        if start > end {
            return Err(RowError::InvertedRange { start, end });
        }

        Ok(Self::new(
            start,
            end,
            field(columns.asn),
            field(columns.country),
            field(columns.name),
        ))
    }

    /// Whether `address` lies inside this range.
    pub fn contains(&self, address: u128) -> bool {
        self.start <= address && address <= self.end
    }

    /// Address family of the range, inferred from its end.
    ///
    /// Both families share one key space, so an IPv6 range lying entirely
    /// inside `::/96` (for example `::` to `::ffff`) is reported as IPv4 and
    /// formatted as dotted quads.
    pub fn version(&self) -> IpVersion {
        IpVersion::of_value(self.end)
    }

    /// Whether the ASN marks an unrouted range.
    pub fn is_routed(&self) -> bool {
        self.asn != "0"
    }

    /// Start address as text.
    pub fn start_text(&self) -> String {
        // end fits the family, and start <= end
        format_address(self.start, self.version()).unwrap_or_default()
    }

    /// End address as text.
    pub fn end_text(&self) -> String {
        format_address(self.end, self.version()).unwrap_or_default()
    }

    /// Smallest set of CIDR prefixes covering the range exactly.
    pub fn prefixes(&self) -> Vec<IpNet> {
        match self.version() {
            IpVersion::V4 => Ipv4Subnets::new(
                Ipv4Addr::from(self.start as u32),
                Ipv4Addr::from(self.end as u32),
                0,
            )
            .map(IpNet::V4)
            .collect(),
            IpVersion::V6 => Ipv6Subnets::new(Ipv6Addr::from(self.start), Ipv6Addr::from(self.end), 0)
                .map(IpNet::V6)
                .collect(),
        }
    }
}

/// Parse a range bound as a decimal integer, else as address text.
pub fn parse_bound(text: &str, field: &'static str, codec: &AddressCodec) -> Result<u128, RowError> {
    if let Ok(value) = text.parse::<u128>() {
        return Ok(value);
    }
    codec.parse(text).map_err(|_| RowError::UnparsableRow {
        field,
        value: text.to_string(),
    })
}

/// Result of an address lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LookupResult {
    /// Query text as given
    pub ip_text: String,
    /// Query in integer form
    pub ip_numeric: u128,
    /// Bounds of the containing range
    pub ip_range: [u128; 2],
    /// Owning ASN
    #[serde(rename = "ASN")]
    pub asn: String,
    /// Country code
    pub country: String,
    /// Organization name
    pub owner: String,
}

impl LookupResult {
    /// Project an interval for a query.
    pub fn new(ip_text: &str, ip_numeric: u128, interval: &Interval) -> Self {
        Self {
            ip_text: ip_text.to_string(),
            ip_numeric,
            ip_range: [interval.start, interval.end],
            asn: interval.asn.clone(),
            country: interval.country.clone(),
            owner: interval.owner.clone(),
        }
    }
}

/// Result of an ASN lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AsnRecord {
    pub ip_range: [u128; 2],
    #[serde(rename = "ASN")]
    pub asn: String,
    pub country: String,
    pub owner: String,
}

impl From<&Interval> for AsnRecord {
    fn from(interval: &Interval) -> Self {
        Self {
            ip_range: [interval.start, interval.end],
            asn: interval.asn.clone(),
            country: interval.country.clone(),
            owner: interval.owner.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(fields: &[&str]) -> Result<Interval, RowError> {
        Interval::from_row(fields, &ColumnMap::default(), &AddressCodec::new())
    }

    #[test]
    fn test_numeric_row() {
        let interval = row(&["16843008", "16843263", "13335", "US", "CLOUDFLARENET - Cloudflare, Inc."]).unwrap();
        assert_eq!(interval.start, 16843008);
        assert_eq!(interval.end, 16843263);
        assert_eq!(interval.asn, "13335");
        assert_eq!(interval.owner, "CLOUDFLARENET - Cloudflare, Inc.");
    }

    #[test]
    fn test_address_row_matches_numeric_row() {
        let text = row(&["1.1.1.0", "1.1.1.255", "13335", "US", "CLOUDFLARENET"]).unwrap();
        let numeric = row(&["16843008", "16843263", "13335", "US", "CLOUDFLARENET"]).unwrap();
        assert_eq!(text, numeric);
    }

    #[test]
    fn test_unparsable_row() {
        let err = row(&["bogus", "1.1.1.255", "13335", "US", "X"]).unwrap_err();
        assert_eq!(
            err,
            RowError::UnparsableRow {
                field: "start",
                value: "bogus".to_string()
            }
        );
    }

    #[test]
    fn test_short_row() {
        let err = row(&["1", "2", "3"]).unwrap_err();
        assert_eq!(err, RowError::MissingFields { needed: 5, found: 3 });
    }

    #[test]
    fn test_inverted_row() {
        assert!(matches!(
            row(&["10", "5", "1", "US", "X"]),
            Err(RowError::InvertedRange { start: 10, end: 5 })
        ));
    }

    #[test]
    fn test_contains_and_text() {
        let interval = Interval::new(16843008, 16843263, "13335", "US", "CF");
        assert!(interval.contains(16843008));
        assert!(interval.contains(16843263));
        assert!(!interval.contains(16843264));
        assert_eq!(interval.start_text(), "1.1.1.0");
        assert_eq!(interval.end_text(), "1.1.1.255");
        assert!(interval.is_routed());
    }

    #[test]
    fn test_prefixes() {
        let interval = Interval::new(16843008, 16843263, "13335", "US", "CF");
        let prefixes: Vec<String> = interval.prefixes().iter().map(|p| p.to_string()).collect();
        assert_eq!(prefixes, vec!["1.1.1.0/24"]);

        // 1.0.1.0 - 1.0.3.255
        let interval = Interval::new(16777472, 16778239, "0", "None", "Not routed");
        let prefixes: Vec<String> = interval.prefixes().iter().map(|p| p.to_string()).collect();
        assert_eq!(prefixes, vec!["1.0.1.0/24", "1.0.2.0/23"]);
        assert!(!interval.is_routed());
    }

    #[test]
    fn test_v6_prefixes() {
        let codec = AddressCodec::new();
        let interval = Interval::new(
            codec.parse("2001:200::").unwrap(),
            codec.parse("2001:200:5ff:ffff:ffff:ffff:ffff:ffff").unwrap(),
            "2500",
            "JP",
            "WIDE-BB WIDE Project",
        );
        assert_eq!(interval.version(), IpVersion::V6);
        let prefixes: Vec<String> = interval.prefixes().iter().map(|p| p.to_string()).collect();
        assert_eq!(prefixes, vec!["2001:200::/38", "2001:200:400::/39"]);
    }

    #[test]
    fn test_low_v6_range_reads_as_v4() {
        // ::0 - ::ffff shares keys with 0.0.0.0 - 0.0.255.255
        let interval = Interval::new(0, 0xffff, "0", "None", "Not routed");
        assert_eq!(interval.version(), IpVersion::V4);
        assert_eq!(interval.end_text(), "0.0.255.255");

        let interval = Interval::new(0, 1u128 << 32, "0", "None", "Not routed");
        assert_eq!(interval.version(), IpVersion::V6);
        assert_eq!(interval.end_text(), "::1:0:0");
    }

    #[test]
    fn test_lookup_result_json() {
        let interval = Interval::new(16843008, 16843263, "13335", "US", "CF");
        let result = LookupResult::new("1.1.1.1", 16843009, &interval);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["ASN"], "13335");
        assert_eq!(json["ip_numeric"], 16843009);
        assert_eq!(json["ip_range"][0], 16843008);
    }
}
