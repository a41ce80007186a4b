//! CSS color values used in paint expressions

use crate::core::constants::DEFAULT_PALETTE;
use crate::{Error, Result};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    /// Alpha in `[0, 1]`
    pub a: f32,
}

impl Color {
    pub const fn rgba(r: u8, g: u8, b: u8, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub const fn transparent() -> Self {
        Self::rgba(0, 0, 0, 0.0)
    }

    /// Entry `index` of the default palette, wrapping around
    pub fn palette(index: usize) -> Self {
        let raw = DEFAULT_PALETTE[index % DEFAULT_PALETTE.len()];
        // The palette is a set of literals known to parse
        Self::parse(raw).unwrap_or_else(|_| Self::transparent())
    }

    /// Parses `rgba(...)`, `rgb(...)`, `#rrggbb`, `#rgb` and `transparent`
    pub fn parse(raw: &str) -> Result<Self> {
        let value = raw.trim().to_ascii_lowercase();
        let malformed = || Error::MalformedFilter(format!("unrecognised color {:?}", raw));

        if value == "transparent" {
            return Ok(Self::transparent());
        }

        if let Some(hex) = value.strip_prefix('#') {
            return parse_hex(hex).ok_or_else(malformed);
        }

        let (args, has_alpha) = if let Some(rest) = value.strip_prefix("rgba(") {
            (rest, true)
        } else if let Some(rest) = value.strip_prefix("rgb(") {
            (rest, false)
        } else {
            return Err(malformed());
        };
        let args = args.strip_suffix(')').ok_or_else(malformed)?;
        let parts: Vec<&str> = args.split(',').map(str::trim).collect();
        let expected = if has_alpha { 4 } else { 3 };
        if parts.len() != expected {
            return Err(malformed());
        }

        let channel = |s: &str| s.parse::<u8>().ok();
        let (r, g, b) = match (channel(parts[0]), channel(parts[1]), channel(parts[2])) {
            (Some(r), Some(g), Some(b)) => (r, g, b),
            _ => return Err(malformed()),
        };
        let a = if has_alpha {
            match parts[3].parse::<f32>() {
                Ok(a) if (0.0..=1.0).contains(&a) => a,
                _ => return Err(malformed()),
            }
        } else {
            1.0
        };
        Ok(Self::rgba(r, g, b, a))
    }

    /// Parses `raw`, substituting palette entry `fallback` when it is missing or
    /// malformed
    pub fn resolve(raw: Option<&str>, fallback: usize) -> Self {
        match raw.map(Self::parse) {
            Some(Ok(color)) => color,
            Some(Err(e)) => {
                log::warn!("{}; using palette entry {}", e, fallback);
                Self::palette(fallback)
            }
            None => {
                log::warn!("missing color; using palette entry {}", fallback);
                Self::palette(fallback)
            }
        }
    }

    pub fn to_css(&self) -> String {
        self.to_string()
    }
}

fn parse_hex(hex: &str) -> Option<Color> {
    let digit = |i: usize| u8::from_str_radix(hex.get(i..i + 1)?, 16).ok();
    let pair = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
    match hex.len() {
        3 => Some(Color::rgba(
            digit(0)? * 17,
            digit(1)? * 17,
            digit(2)? * 17,
            1.0,
        )),
        6 => Some(Color::rgba(pair(0)?, pair(2)?, pair(4)?, 1.0)),
        _ => None,
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rgba({}, {}, {}, {})", self.r, self.g, self.b, self.a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_forms() {
        assert_eq!(
            Color::parse("rgba(255, 59, 59, 0.4)").unwrap(),
            Color::rgba(255, 59, 59, 0.4)
        );
        assert_eq!(Color::parse("rgb(1,2,3)").unwrap(), Color::rgba(1, 2, 3, 1.0));
        assert_eq!(Color::parse("#ff8000").unwrap(), Color::rgba(255, 128, 0, 1.0));
        assert_eq!(Color::parse("#F80").unwrap(), Color::rgba(255, 136, 0, 1.0));
        assert_eq!(Color::parse("transparent").unwrap(), Color::transparent());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for raw in ["", "red", "rgba(1, 2, 3)", "rgb(300, 0, 0)", "#12345", "rgba(1, 2, 3, 2)"] {
            assert!(
                matches!(Color::parse(raw), Err(Error::MalformedFilter(_))),
                "{:?}",
                raw
            );
        }
    }

    #[test]
    fn test_css_round_trip_format() {
        assert_eq!(Color::transparent().to_css(), "rgba(0, 0, 0, 0)");
        assert_eq!(Color::palette(0).to_css(), "rgba(255, 59, 59, 0.4)");
    }

    #[test]
    fn test_resolve_falls_back_to_palette() {
        assert_eq!(Color::resolve(Some("not a color"), 1), Color::palette(1));
        assert_eq!(Color::resolve(None, 7), Color::palette(1));
        assert_eq!(
            Color::resolve(Some("#000000"), 0),
            Color::rgba(0, 0, 0, 1.0)
        );
    }
}
