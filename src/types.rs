//! Shared value types for ion script arguments

use crate::error::{CompileError, CompileErrorKind, Result};
use std::fmt;

/// An RGBA color with normalized components.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub const fn opaque(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// Build from 8-bit channels, e.g. a hex literal.
    pub fn from_bytes(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self {
            r: r as f32 / 255.0,
            g: g as f32 / 255.0,
            b: b as f32 / 255.0,
            a: a as f32 / 255.0,
        }
    }

    /// HSL color space, all components normalized to [0, 1]
    /// (hue included, i.e. degrees already divided by 360).
    pub fn from_hsl(h: f32, s: f32, l: f32, a: f32) -> Self {
        let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
        let hp = (h.rem_euclid(1.0)) * 6.0;
        let x = c * (1.0 - (hp % 2.0 - 1.0).abs());
        let (r1, g1, b1) = match hp as u32 {
            0 => (c, x, 0.0),
            1 => (x, c, 0.0),
            2 => (0.0, c, x),
            3 => (0.0, x, c),
            4 => (x, 0.0, c),
            _ => (c, 0.0, x),
        };
        let m = l - c / 2.0;
        Self::new(r1 + m, g1 + m, b1 + m, a)
    }

    /// Hue-whiteness-blackness, components normalized to [0, 1].
    pub fn from_hwb(h: f32, w: f32, b: f32, a: f32) -> Self {
        let (w, b) = if w + b > 1.0 {
            // Over-saturated inputs scale down to the gray they describe
            (w / (w + b), b / (w + b))
        } else {
            (w, b)
        };
        let pure = Self::from_hsl(h, 1.0, 0.5, a);
        let scale = 1.0 - w - b;
        Self::new(
            pure.r * scale + w,
            pure.g * scale + w,
            pure.b * scale + w,
            a,
        )
    }

    /// Subtractive CMYK, components normalized to [0, 1].
    pub fn from_cmyk(c: f32, m: f32, y: f32, k: f32, a: f32) -> Self {
        Self::new(
            (1.0 - c) * (1.0 - k),
            (1.0 - m) * (1.0 - k),
            (1.0 - y) * (1.0 - k),
            a,
        )
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let to_byte = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        write!(
            f,
            "#{:02x}{:02x}{:02x}{:02x}",
            to_byte(self.r),
            to_byte(self.g),
            to_byte(self.b),
            to_byte(self.a)
        )
    }
}

/// A 2D vector argument (`vec2(x, y)`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vector2 {
    pub x: f32,
    pub y: f32,
}

impl Vector2 {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Vector2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "vec2({}, {})", self.x, self.y)
    }
}

/// Parse a `#RGB`, `#RGBA`, `#RRGGBB` or `#RRGGBBAA` literal.
///
/// Total lexeme length including the `#` must be 4, 5, 7, or 9; anything
/// else is a syntax violation attributed to the caller's location.
pub fn parse_hex_color(lexeme: &str, file: &str, line: usize) -> Result<Color> {
    let invalid = || CompileError::new(CompileErrorKind::UnexpectedLiteral, file, line);

    let hex = lexeme.strip_prefix('#').ok_or_else(invalid)?;
    let channel_short = |i: usize| {
        u8::from_str_radix(&hex[i..i + 1].repeat(2), 16).map_err(|_| invalid())
    };
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());

    match hex.len() {
        3 => Ok(Color::from_bytes(
            channel_short(0)?,
            channel_short(1)?,
            channel_short(2)?,
            255,
        )),
        4 => Ok(Color::from_bytes(
            channel_short(0)?,
            channel_short(1)?,
            channel_short(2)?,
            channel_short(3)?,
        )),
        6 => Ok(Color::from_bytes(channel(0)?, channel(2)?, channel(4)?, 255)),
        8 => Ok(Color::from_bytes(
            channel(0)?,
            channel(2)?,
            channel(4)?,
            channel(6)?,
        )),
        _ => Err(invalid()),
    }
}

/// Recognized bare color identifiers (the CSS basic palette plus the
/// extended names scripts actually use).
pub fn named_color(name: &str) -> Option<Color> {
    let bytes = |r, g, b| Some(Color::from_bytes(r, g, b, 255));
    match name {
        "black" => bytes(0, 0, 0),
        "silver" => bytes(192, 192, 192),
        "gray" | "grey" => bytes(128, 128, 128),
        "white" => bytes(255, 255, 255),
        "maroon" => bytes(128, 0, 0),
        "red" => bytes(255, 0, 0),
        "purple" => bytes(128, 0, 128),
        "fuchsia" | "magenta" => bytes(255, 0, 255),
        "green" => bytes(0, 128, 0),
        "lime" => bytes(0, 255, 0),
        "olive" => bytes(128, 128, 0),
        "yellow" => bytes(255, 255, 0),
        "navy" => bytes(0, 0, 128),
        "blue" => bytes(0, 0, 255),
        "teal" => bytes(0, 128, 128),
        "aqua" | "cyan" => bytes(0, 255, 255),
        "orange" => bytes(255, 165, 0),
        "brown" => bytes(165, 42, 42),
        "pink" => bytes(255, 192, 203),
        "gold" => bytes(255, 215, 0),
        "indigo" => bytes(75, 0, 130),
        "violet" => bytes(238, 130, 238),
        "beige" => bytes(245, 245, 220),
        "ivory" => bytes(255, 255, 240),
        "khaki" => bytes(240, 230, 140),
        "salmon" => bytes(250, 128, 114),
        "crimson" => bytes(220, 20, 60),
        "coral" => bytes(255, 127, 80),
        "turquoise" => bytes(64, 224, 208),
        "transparent" => Some(Color::new(0.0, 0.0, 0.0, 0.0)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_six_digits() {
        let color = parse_hex_color("#ff0000", "test.ion", 1).unwrap();
        assert_eq!(color, Color::opaque(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_hex_short_form_expands() {
        let short = parse_hex_color("#f0a", "test.ion", 1).unwrap();
        let long = parse_hex_color("#ff00aa", "test.ion", 1).unwrap();
        assert_eq!(short, long);
    }

    #[test]
    fn test_hex_with_alpha() {
        let color = parse_hex_color("#00000080", "test.ion", 1).unwrap();
        assert!((color.a - 128.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn test_hex_bad_length_rejected() {
        assert!(parse_hex_color("#12345", "test.ion", 1).is_err());
        assert!(parse_hex_color("#1234567", "test.ion", 1).is_err());
    }

    #[test]
    fn test_named_colors() {
        assert_eq!(named_color("red"), Some(Color::opaque(1.0, 0.0, 0.0)));
        assert_eq!(named_color("grey"), named_color("gray"));
        assert_eq!(named_color("not_a_color"), None);
    }

    #[test]
    fn test_hsl_primary_points() {
        let red = Color::from_hsl(0.0, 1.0, 0.5, 1.0);
        assert!((red.r - 1.0).abs() < 1e-5 && red.g.abs() < 1e-5 && red.b.abs() < 1e-5);

        let green = Color::from_hsl(1.0 / 3.0, 1.0, 0.5, 1.0);
        assert!(green.r.abs() < 1e-5 && (green.g - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_hwb_extremes() {
        let white = Color::from_hwb(0.0, 1.0, 0.0, 1.0);
        assert!((white.r - 1.0).abs() < 1e-5 && (white.g - 1.0).abs() < 1e-5);

        let black = Color::from_hwb(0.5, 0.0, 1.0, 1.0);
        assert!(black.r.abs() < 1e-5 && black.g.abs() < 1e-5 && black.b.abs() < 1e-5);
    }

    #[test]
    fn test_cmyk_black_key() {
        let black = Color::from_cmyk(0.0, 0.0, 0.0, 1.0, 1.0);
        assert_eq!(black, Color::opaque(0.0, 0.0, 0.0));

        let red = Color::from_cmyk(0.0, 1.0, 1.0, 0.0, 1.0);
        assert_eq!(red, Color::opaque(1.0, 0.0, 0.0));
    }
}
