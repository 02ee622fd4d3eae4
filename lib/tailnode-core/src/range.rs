//! Address ranges (network prefixes) advertised by the daemon

use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use thiserror::Error;

/// Errors produced while parsing an address range
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressRangeError {
    #[error("missing prefix length in {0:?}")]
    MissingPrefixLength(String),

    #[error("invalid address {address:?}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("invalid prefix length {0:?}")]
    InvalidPrefixLength(String),

    #[error("prefix length {length} out of range for {address}")]
    PrefixOutOfRange { address: IpAddr, length: u8 },
}

/// A network prefix such as `10.1.2.0/24`.
///
/// Host bits are cleared on construction, so two ranges compare equal iff
/// their network address and prefix length are identical.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AddressRange(IpNetwork);

impl AddressRange {
    /// Build a range from an address and prefix length, clearing host bits
    pub fn new(address: IpAddr, length: u8) -> Result<Self, AddressRangeError> {
        let network = IpNetwork::new(address, length)
            .map_err(|_| AddressRangeError::PrefixOutOfRange { address, length })?;
        Ok(Self::from(network))
    }

    /// Network address of the range
    pub fn network(&self) -> IpAddr {
        self.0.network()
    }

    /// Prefix (mask) length
    pub fn prefix_len(&self) -> u8 {
        self.0.prefix()
    }

    pub fn is_ipv4(&self) -> bool {
        self.0.is_ipv4()
    }
}

impl FromStr for AddressRange {
    type Err = AddressRangeError;

    /// Parse `<address>/<length>`.
    ///
    /// Only complete literals are accepted: `10.1.2/24` is rejected, as are
    /// IPv6 zones, signed lengths and lengths with leading zeros.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (address, length) = s
            .rsplit_once('/')
            .ok_or_else(|| AddressRangeError::MissingPrefixLength(s.to_string()))?;

        let address = IpAddr::from_str(address).map_err(|e| AddressRangeError::InvalidAddress {
            address: address.to_string(),
            reason: e.to_string(),
        })?;

        let well_formed = !length.is_empty()
            && length.bytes().all(|b| b.is_ascii_digit())
            && !(length.len() > 1 && length.starts_with('0'));
        if !well_formed {
            return Err(AddressRangeError::InvalidPrefixLength(length.to_string()));
        }
        let length: u8 = length
            .parse()
            .map_err(|_| AddressRangeError::InvalidPrefixLength(length.to_string()))?;

        Self::new(address, length)
    }
}

impl TryFrom<String> for AddressRange {
    type Error = AddressRangeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AddressRange> for String {
    fn from(range: AddressRange) -> Self {
        range.to_string()
    }
}

/// Canonical range of a network, with host bits cleared
impl From<IpNetwork> for AddressRange {
    fn from(network: IpNetwork) -> Self {
        // The prefix is already valid for this family, so this never falls back.
        Self(IpNetwork::new(network.network(), network.prefix()).unwrap_or(network))
    }
}

impl From<AddressRange> for IpNetwork {
    fn from(range: AddressRange) -> Self {
        range.0
    }
}

impl fmt::Display for AddressRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.0.network(), self.0.prefix())
    }
}

/// Format a list of ranges as `[a, b, c]` for logs and event messages
pub fn display_ranges(ranges: &[AddressRange]) -> String {
    let joined = ranges
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    format!("[{}]", joined)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ipv4() {
        let range: AddressRange = "10.1.2.0/24".parse().unwrap();
        assert_eq!(range.network(), "10.1.2.0".parse::<IpAddr>().unwrap());
        assert_eq!(range.prefix_len(), 24);
        assert!(range.is_ipv4());
        assert_eq!(range.to_string(), "10.1.2.0/24");
    }

    #[test]
    fn test_parse_ipv6() {
        let range: AddressRange = "fd00:10:244::/64".parse().unwrap();
        assert!(!range.is_ipv4());
        assert_eq!(range.to_string(), "fd00:10:244::/64");
    }

    #[test]
    fn test_host_bits_are_cleared() {
        let a: AddressRange = "10.1.2.7/24".parse().unwrap();
        let b: AddressRange = "10.1.2.0/24".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "10.1.2.0/24");
    }

    #[test]
    fn test_from_ipnetwork_clears_host_bits() {
        let raw: IpNetwork = "10.1.2.5/24".parse().unwrap();
        let range = AddressRange::from(raw);
        assert_eq!(range, "10.1.2.0/24".parse().unwrap());
        assert_eq!(raw.to_string(), "10.1.2.5/24");
        assert_eq!(IpNetwork::from(range).to_string(), "10.1.2.0/24");
    }

    #[test]
    fn test_same_network_different_length_is_distinct() {
        let a: AddressRange = "10.1.0.0/16".parse().unwrap();
        let b: AddressRange = "10.1.0.0/24".parse().unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_rejects_shorthand_address() {
        let err = "10.1.2/24".parse::<AddressRange>().unwrap_err();
        assert!(matches!(err, AddressRangeError::InvalidAddress { .. }));
    }

    #[test]
    fn test_rejects_missing_length() {
        let err = "10.1.2.0".parse::<AddressRange>().unwrap_err();
        assert_eq!(err, AddressRangeError::MissingPrefixLength("10.1.2.0".to_string()));
    }

    #[test]
    fn test_rejects_malformed_length() {
        for raw in ["10.0.0.0/", "10.0.0.0/+8", "10.0.0.0/08", "10.0.0.0/x", "10.0.0.0/999"] {
            let err = raw.parse::<AddressRange>().unwrap_err();
            assert!(
                matches!(err, AddressRangeError::InvalidPrefixLength(_)),
                "{} gave {:?}",
                raw,
                err
            );
        }
    }

    #[test]
    fn test_rejects_length_beyond_family() {
        let err = "10.0.0.0/33".parse::<AddressRange>().unwrap_err();
        assert!(matches!(err, AddressRangeError::PrefixOutOfRange { length: 33, .. }));
        assert!("::/128".parse::<AddressRange>().is_ok());
        assert!("::/129".parse::<AddressRange>().is_err());
    }

    #[test]
    fn test_rejects_ipv6_zone() {
        assert!("fe80::1%eth0/64".parse::<AddressRange>().is_err());
    }

    #[test]
    fn test_serde_as_string() {
        let range: AddressRange = "192.168.0.0/16".parse().unwrap();
        let json = serde_json::to_string(&range).unwrap();
        assert_eq!(json, "\"192.168.0.0/16\"");

        let back: AddressRange = serde_json::from_str(&json).unwrap();
        assert_eq!(back, range);
        assert!(serde_json::from_str::<AddressRange>("\"bogus\"").is_err());
    }

    #[test]
    fn test_display_ranges() {
        let ranges: Vec<AddressRange> = vec!["10.1.2.0/24".parse().unwrap(), "10.1.3.0/24".parse().unwrap()];
        assert_eq!(display_ranges(&ranges), "[10.1.2.0/24, 10.1.3.0/24]");
        assert_eq!(display_ranges(&[]), "[]");
    }
}
