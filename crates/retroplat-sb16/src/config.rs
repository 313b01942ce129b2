//! The `BLASTER` environment variable.
//!
//! Space-separated tokens of a letter followed by a hex number, e.g. `A220 I5 D1 H5 P330 T6`.
//! Only the base port (`A`), IRQ (`I`), 8-bit DMA (`D`) and 16-bit DMA (`H`) matter here.
//!
//! Tokens that do not read as a letter and a hex number are skipped. A value that parses but
//! is out of range fails the whole variable instead: a port above 0xFFFF, an IRQ above 15, a
//! `D` channel outside 1-3 or an `H` channel outside 5-7. Nothing probes the card until the
//! variable has parsed.

use std::fmt;
use std::str::FromStr;

use crate::{Result, SbError};

pub const ENV_VAR: &str = "BLASTER";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlasterConfig {
    pub port: u16,
    pub irq: u8,
    pub dma8: Option<u8>,
    pub dma16: Option<u8>,
}

impl BlasterConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_env_value(std::env::var(ENV_VAR).ok().as_deref())
    }

    pub fn from_env_value(value: Option<&str>) -> Result<Self> {
        value.ok_or(SbError::MissingConfig)?.parse()
    }
}

impl fmt::Display for BlasterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "A{:X} I{:X}", self.port, self.irq)?;
        if let Some(d) = self.dma8 {
            write!(f, " D{d:X}")?;
        }
        if let Some(h) = self.dma16 {
            write!(f, " H{h:X}")?;
        }
        Ok(())
    }
}

/// Number part of a token, read the way `strtol(s, &end, 16)` would with the whole rest of the
/// token required to be consumed. `None` for empty, malformed or negative numbers.
fn parse_hex(s: &str) -> Option<u32> {
    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    let digits = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
        .unwrap_or(digits);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let value = u32::from_str_radix(digits, 16).ok()?;
    if negative && value != 0 {
        return None;
    }
    Some(value)
}

impl FromStr for BlasterConfig {
    type Err = SbError;

    fn from_str(s: &str) -> Result<Self> {
        let (mut port, mut irq, mut dma8, mut dma16) = (0u32, 0u32, 0u32, 0u32);

        for token in s.split(' ').filter(|t| !t.is_empty()) {
            let mut chars = token.chars();
            let Some(key) = chars.next() else {
                continue;
            };
            let Some(num) = parse_hex(chars.as_str()) else {
                continue;
            };
            match key.to_ascii_uppercase() {
                'A' => port = num,
                'I' => irq = num,
                'D' => dma8 = num,
                'H' => dma16 = num,
                _ => {}
            }
        }

        // Zero means "not given" for every field.
        if port == 0 || irq == 0 || (dma8 == 0 && dma16 == 0) {
            return Err(SbError::IncompleteConfig);
        }

        let port = u16::try_from(port).map_err(|_| SbError::InvalidConfig {
            key: 'A',
            value: port,
        })?;
        if irq > 15 {
            return Err(SbError::InvalidConfig {
                key: 'I',
                value: irq,
            });
        }
        let dma8 = match dma8 {
            0 => None,
            1..=3 => Some(dma8 as u8),
            _ => {
                return Err(SbError::InvalidConfig {
                    key: 'D',
                    value: dma8,
                })
            }
        };
        let dma16 = match dma16 {
            0 => None,
            5..=7 => Some(dma16 as u8),
            _ => {
                return Err(SbError::InvalidConfig {
                    key: 'H',
                    value: dma16,
                })
            }
        };

        Ok(Self {
            port,
            irq: irq as u8,
            dma8,
            dma16,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_typical_sb16_setting() {
        let cfg: BlasterConfig = "A220 I5 D1 H5 P330 T6".parse().unwrap();
        assert_eq!(
            cfg,
            BlasterConfig {
                port: 0x220,
                irq: 5,
                dma8: Some(1),
                dma16: Some(5),
            }
        );
    }

    #[test]
    fn letters_are_case_insensitive_and_unknown_keys_ignored() {
        let cfg: BlasterConfig = "a240 i7 h6 e620 m240".parse().unwrap();
        assert_eq!(cfg.port, 0x240);
        assert_eq!(cfg.irq, 7);
        assert_eq!(cfg.dma8, None);
        assert_eq!(cfg.dma16, Some(6));
    }

    #[test]
    fn malformed_tokens_are_skipped() {
        // "A" has no number, "Izz" is not hex, "D-1" is negative; later tokens still count.
        let cfg: BlasterConfig = "A Izz D-1 A220  I5   D1".parse().unwrap();
        assert_eq!(cfg.port, 0x220);
        assert_eq!(cfg.irq, 5);
        assert_eq!(cfg.dma8, Some(1));
    }

    #[test]
    fn hex_numbers_accept_prefix_and_sign() {
        assert_eq!(parse_hex("0x220"), Some(0x220));
        assert_eq!(parse_hex("+A"), Some(10));
        assert_eq!(parse_hex("-0"), Some(0));
        assert_eq!(parse_hex("-5"), None);
        assert_eq!(parse_hex(""), None);
        assert_eq!(parse_hex("12g"), None);
    }

    #[test]
    fn later_tokens_override_earlier_ones() {
        let cfg: BlasterConfig = "A220 I5 H5 I7".parse().unwrap();
        assert_eq!(cfg.irq, 7);
    }

    #[test]
    fn missing_fields_are_incomplete() {
        for s in ["I5 D1 H5", "A220 D1 H5", "A220 I5", "A0 I5 H5", "", "T6 P330"] {
            assert!(
                matches!(s.parse::<BlasterConfig>(), Err(SbError::IncompleteConfig)),
                "{s:?} should be incomplete"
            );
        }
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        assert!(matches!(
            "A220 IA H4".parse::<BlasterConfig>(),
            Err(SbError::InvalidConfig { key: 'H', value: 4 })
        ));
        assert!(matches!(
            "A220 I5 D4 H5".parse::<BlasterConfig>(),
            Err(SbError::InvalidConfig { key: 'D', value: 4 })
        ));
        assert!(matches!(
            "A220 I1F H5".parse::<BlasterConfig>(),
            Err(SbError::InvalidConfig { key: 'I', value: 0x1F })
        ));
        assert!(matches!(
            "A12345 I5 H5".parse::<BlasterConfig>(),
            Err(SbError::InvalidConfig { key: 'A', .. })
        ));
    }

    #[test]
    fn missing_variable_is_its_own_error() {
        assert!(matches!(
            BlasterConfig::from_env_value(None),
            Err(SbError::MissingConfig)
        ));
        assert!(BlasterConfig::from_env_value(Some("A220 I5 D1 H5")).is_ok());
    }

    #[test]
    fn display_round_trips_through_parse() {
        let cfg: BlasterConfig = "A220 I5 D1 H5".parse().unwrap();
        assert_eq!(cfg.to_string(), "A220 I5 D1 H5");
    }
}
