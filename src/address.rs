//! Conversion between textual IP addresses and their integer form.
//!
//! Both families share one integer space: IPv4 addresses occupy
//! `0..=u32::MAX` and IPv6 addresses use the full `u128` range. This
//! matches the iptoasn tables, where IPv4 bounds are often written as
//! plain decimal integers.

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

use crate::{Error, Result};

/// IP address family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IpVersion {
    /// 32-bit dotted-quad addresses
    V4,
    /// 128-bit colon-hex addresses
    V6,
}

impl IpVersion {
    /// Parse a version from `4`/`6` or `v4`/`v6` (case-insensitive).
    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "4" | "v4" | "ipv4" => Some(IpVersion::V4),
            "6" | "v6" | "ipv6" => Some(IpVersion::V6),
            _ => None,
        }
    }

    /// Infer the family from address text.
    ///
    /// A `:` selects IPv6, otherwise a `.` selects IPv4.
    pub fn infer(text: &str) -> Option<Self> {
        if text.contains(':') {
            Some(IpVersion::V6)
        } else if text.contains('.') {
            Some(IpVersion::V4)
        } else {
            None
        }
    }

    /// Family implied by an integer value.
    pub fn of_value(value: u128) -> Self {
        if value <= u32::MAX as u128 {
            IpVersion::V4
        } else {
            IpVersion::V6
        }
    }

    /// Number of bits in an address of this family.
    pub fn bits(self) -> u32 {
        match self {
            IpVersion::V4 => 32,
            IpVersion::V6 => 128,
        }
    }
}

impl fmt::Display for IpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IpVersion::V4 => write!(f, "IPv4"),
            IpVersion::V6 => write!(f, "IPv6"),
        }
    }
}

/// Parse address text into its integer form.
///
/// With `hint` set the text must be of that family. Without it the family
/// is inferred from the separators present.
pub fn parse_address(text: &str, hint: Option<IpVersion>) -> Result<u128> {
    let text = text.trim();
    let version = hint
        .or_else(|| IpVersion::infer(text))
        .ok_or_else(|| Error::InvalidAddress(text.to_string()))?;

    match version {
        IpVersion::V4 => text
            .parse::<Ipv4Addr>()
            .map(|addr| u32::from(addr) as u128)
            .map_err(|_| Error::InvalidAddress(text.to_string())),
        IpVersion::V6 => text
            .parse::<Ipv6Addr>()
            .map(u128::from)
            .map_err(|_| Error::InvalidAddress(text.to_string())),
    }
}

/// Format an integer as canonical address text of the given family.
pub fn format_address(value: u128, version: IpVersion) -> Result<String> {
    match version {
        IpVersion::V4 => {
            let v4 = u32::try_from(value)
                .map_err(|_| Error::InvalidAddress(format!("{} exceeds IPv4 range", value)))?;
            Ok(Ipv4Addr::from(v4).to_string())
        }
        IpVersion::V6 => Ok(Ipv6Addr::from(value).to_string()),
    }
}

/// Address parser carrying an optional fixed family.
///
/// A codec built with [`AddressCodec::with_version`] rejects text of the
/// other family instead of guessing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AddressCodec {
    version: Option<IpVersion>,
}

impl AddressCodec {
    /// Create a codec that infers the family per address.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a codec fixed to one family.
    pub fn with_version(version: IpVersion) -> Self {
        Self {
            version: Some(version),
        }
    }

    /// Configured family, if any.
    pub fn version(&self) -> Option<IpVersion> {
        self.version
    }

    /// Parse address text.
    pub fn parse(&self, text: &str) -> Result<u128> {
        parse_address(text, self.version)
    }

    /// Format a value, using the configured family or the one implied by
    /// the value.
    pub fn format(&self, value: u128) -> Result<String> {
        format_address(value, self.version.unwrap_or(IpVersion::of_value(value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ipv4() {
        assert_eq!(parse_address("1.1.1.1", None).unwrap(), 16843009);
        assert_eq!(parse_address("0.0.0.0", None).unwrap(), 0);
        assert_eq!(parse_address("255.255.255.255", None).unwrap(), u32::MAX as u128);
        assert_eq!(parse_address(" 8.8.8.8\n", None).unwrap(), 0x08080808);
    }

    #[test]
    fn test_parse_ipv6() {
        assert_eq!(
            parse_address("2001:200::", None).unwrap(),
            0x2001_0200_0000_0000_0000_0000_0000_0000
        );
        assert_eq!(parse_address("::1", None).unwrap(), 1);
        assert_eq!(parse_address("ffff:ffff:ffff:ffff:ffff:ffff:ffff:ffff", None).unwrap(), u128::MAX);
    }

    #[test]
    fn test_parse_invalid() {
        assert!(matches!(parse_address("example.com", None), Err(Error::InvalidAddress(_))));
        assert!(matches!(parse_address("256.1.1.1", None), Err(Error::InvalidAddress(_))));
        assert!(matches!(parse_address("1.1.1", None), Err(Error::InvalidAddress(_))));
        assert!(matches!(parse_address("2001:zz::1", None), Err(Error::InvalidAddress(_))));
        assert!(matches!(parse_address("16843009", None), Err(Error::InvalidAddress(_))));
        assert!(matches!(parse_address("", None), Err(Error::InvalidAddress(_))));
    }

    #[test]
    fn test_hint_overrides_inference() {
        assert!(parse_address("1.1.1.1", Some(IpVersion::V6)).is_err());
        assert!(parse_address("::1", Some(IpVersion::V4)).is_err());
        // IPv4-embedded IPv6 is still IPv6
        assert_eq!(
            parse_address("::ffff:1.1.1.1", Some(IpVersion::V6)).unwrap(),
            0xffff_0101_0101
        );
    }

    #[test]
    fn test_text_roundtrip() {
        for text in [
            "1.1.1.1",
            "93.184.216.34",
            "0.0.0.0",
            "2001:200::42",
            "2606:2800:220:1:248:1893:25c8:1946",
            "::",
        ] {
            let codec = AddressCodec::with_version(IpVersion::infer(text).unwrap());
            let value = codec.parse(text).unwrap();
            assert_eq!(codec.format(value).unwrap(), text);
        }
    }

    #[test]
    fn test_format_v4_out_of_range() {
        assert!(format_address(1u128 << 32, IpVersion::V4).is_err());
    }

    #[test]
    fn test_codec_infers_format_family() {
        let codec = AddressCodec::new();
        assert_eq!(codec.format(16843009).unwrap(), "1.1.1.1");
        assert_eq!(
            codec.format(0x2001_0200_0000_0000_0000_0000_0000_0042).unwrap(),
            "2001:200::42"
        );
    }

    #[test]
    fn test_version_parsing() {
        assert_eq!(IpVersion::from_str_opt("4"), Some(IpVersion::V4));
        assert_eq!(IpVersion::from_str_opt("IPv6"), Some(IpVersion::V6));
        assert_eq!(IpVersion::from_str_opt("5"), None);
        assert_eq!(IpVersion::of_value(u32::MAX as u128), IpVersion::V4);
        assert_eq!(IpVersion::of_value(u32::MAX as u128 + 1), IpVersion::V6);
    }
}
