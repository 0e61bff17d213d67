//! `#RRGGBB` color codec.

use crate::state::Rgb;

/// Parse a `#RRGGBB` string. Anything that is not exactly a `#` followed by
/// six hex digits is rejected as a whole.
pub fn parse_hex_color(s: &str) -> Option<Rgb> {
    let hex = s.strip_prefix('#')?;
    if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some(Rgb::new(byte(0)?, byte(2)?, byte(4)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_either_case() {
        assert_eq!(parse_hex_color("#112233"), Some(Rgb::new(0x11, 0x22, 0x33)));
        assert_eq!(parse_hex_color("#aBcDeF"), Some(Rgb::new(0xAB, 0xCD, 0xEF)));
    }

    #[test]
    fn rejects_anything_else_wholesale() {
        for bad in ["#GGHHII", "#11223", "#1122334", "112233", "#11 233", "", "#", "#1122G3", "#１１２２３"] {
            assert_eq!(parse_hex_color(bad), None, "{bad:?}");
        }
    }

    #[test]
    fn display_round_trips_upper_case() {
        let c = parse_hex_color("#0a0b0c").unwrap();
        assert_eq!(c.to_string(), "#0A0B0C");
    }
}
