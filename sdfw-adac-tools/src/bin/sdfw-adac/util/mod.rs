pub mod common_options;
pub mod config;
pub mod logging;
pub mod probe_link;

use std::{num::ParseIntError, str::FromStr};

pub fn parse_u8(input: &str) -> Result<u8, ParseIntError> {
    parse_int::parse(input)
}

pub fn parse_u16(input: &str) -> Result<u16, ParseIntError> {
    parse_int::parse(input)
}

pub fn parse_u64(input: &str) -> Result<u64, ParseIntError> {
    parse_int::parse(input)
}

/// Parse a hex string, optionally prefixed with `0x`. Whitespace is ignored.
pub fn parse_hex(input: &str) -> Result<Vec<u8>, hex::FromHexError> {
    let input = input.trim();
    let input = input.strip_prefix("0x").unwrap_or(input);
    let digits: String = input.split_whitespace().collect();
    hex::decode(digits)
}

/// Bytes given on the command line as a hex string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HexBytes(pub Vec<u8>);

impl FromStr for HexBytes {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_hex(s).map(HexBytes)
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    use super::*;

    #[test_case("", &[]; "empty")]
    #[test_case("a5", &[0xa5]; "single byte")]
    #[test_case("0x8301", &[0x83, 0x01]; "prefixed")]
    #[test_case("83 18 a5", &[0x83, 0x18, 0xa5]; "spaced")]
    #[test_case(" DEADbeef ", &[0xde, 0xad, 0xbe, 0xef]; "mixed case")]
    fn hex_payloads(input: &str, expected: &[u8]) {
        assert_eq!(parse_hex(input).unwrap(), expected);
    }

    #[test_case("abc"; "odd length")]
    #[test_case("zz"; "not hex")]
    fn invalid_hex(input: &str) {
        assert!(input.parse::<HexBytes>().is_err());
    }

    #[test]
    fn integers_in_any_base() {
        assert_eq!(parse_u64("0xA300").unwrap(), 0xA300);
        assert_eq!(parse_u16("0b101").unwrap(), 5);
        assert_eq!(parse_u8("17").unwrap(), 17);
        assert!(parse_u8("0x100").is_err());
    }
}
