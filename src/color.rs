//! Color values for resolved style channels.
//!
//! Fixed colours arrive as names or hex strings (`"blue"`, `"#1f77b4"`);
//! mapped colours come from the default discrete hue palette or the
//! continuous two-stop gradient used by the colour scale.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// RGBA color with 8-bit components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rgba {
    /// Red component (0-255).
    pub r: u8,
    /// Green component (0-255).
    pub g: u8,
    /// Blue component (0-255).
    pub b: u8,
    /// Alpha component (0-255, 255 = fully opaque).
    pub a: u8,
}

impl Rgba {
    /// Fully transparent black.
    pub const TRANSPARENT: Self = Self::new(0, 0, 0, 0);
    /// Opaque black.
    pub const BLACK: Self = Self::new(0, 0, 0, 255);
    /// Opaque white.
    pub const WHITE: Self = Self::new(255, 255, 255, 255);
    /// Opaque red.
    pub const RED: Self = Self::new(255, 0, 0, 255);
    /// Opaque green.
    pub const GREEN: Self = Self::new(0, 255, 0, 255);
    /// Opaque blue.
    pub const BLUE: Self = Self::new(0, 0, 255, 255);
    /// Mid grey.
    pub const GREY: Self = Self::new(190, 190, 190, 255);
    /// Default ink for unmapped marks.
    pub const INK: Self = Self::new(51, 51, 51, 255);
    /// Default fill for unmapped areas.
    pub const AREA: Self = Self::new(89, 89, 89, 255);
    /// Default smoothing line colour.
    pub const SMOOTH: Self = Self::new(51, 102, 255, 255);

    /// Low end of the continuous colour gradient.
    pub const GRADIENT_LOW: Self = Self::rgb(19, 43, 67);
    /// High end of the continuous colour gradient.
    pub const GRADIENT_HIGH: Self = Self::rgb(86, 177, 247);

    /// Create a new RGBA color.
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Create an opaque RGB color (alpha = 255).
    #[must_use]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    /// Linear interpolation between two colors.
    #[must_use]
    pub fn lerp(self, other: Self, t: f32) -> Self {
        let t = t.clamp(0.0, 1.0);
        let inv_t = 1.0 - t;

        Self::new(
            (f32::from(self.r) * inv_t + f32::from(other.r) * t) as u8,
            (f32::from(self.g) * inv_t + f32::from(other.g) * t) as u8,
            (f32::from(self.b) * inv_t + f32::from(other.b) * t) as u8,
            (f32::from(self.a) * inv_t + f32::from(other.a) * t) as u8,
        )
    }

    /// Parse a colour name or `#rrggbb` / `#rrggbbaa` hex string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] for unrecognized names or malformed hex.
    pub fn parse(text: &str) -> Result<Self> {
        let trimmed = text.trim();
        if let Some(hex) = trimmed.strip_prefix('#') {
            return parse_hex(hex).ok_or_else(|| invalid_colour(text));
        }

        let named = match trimmed.to_ascii_lowercase().as_str() {
            "black" => Self::BLACK,
            "white" => Self::WHITE,
            "red" => Self::RED,
            "green" => Self::rgb(0, 128, 0),
            "blue" => Self::BLUE,
            "grey" | "gray" => Self::GREY,
            "darkgrey" | "darkgray" => Self::rgb(169, 169, 169),
            "orange" => Self::rgb(255, 165, 0),
            "purple" => Self::rgb(128, 0, 128),
            "yellow" => Self::rgb(255, 255, 0),
            "steelblue" => Self::rgb(70, 130, 180),
            "transparent" => Self::TRANSPARENT,
            _ => return Err(invalid_colour(text)),
        };
        Ok(named)
    }
}

fn parse_hex(hex: &str) -> Option<Rgba> {
    let byte = |i: usize| hex.get(i..i + 2).and_then(|s| u8::from_str_radix(s, 16).ok());
    match hex.len() {
        6 => Some(Rgba::rgb(byte(0)?, byte(2)?, byte(4)?)),
        8 => Some(Rgba::new(byte(0)?, byte(2)?, byte(4)?, byte(6)?)),
        _ => None,
    }
}

fn invalid_colour(text: &str) -> Error {
    Error::InvalidParameter {
        name: "colour".to_string(),
        reason: format!("unrecognized colour '{text}'"),
    }
}

/// HSLA color with floating-point components.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Hsla {
    /// Hue (0.0-360.0 degrees).
    pub h: f32,
    /// Saturation (0.0-1.0).
    pub s: f32,
    /// Lightness (0.0-1.0).
    pub l: f32,
    /// Alpha (0.0-1.0).
    pub a: f32,
}

impl Hsla {
    /// Create a new HSLA color.
    #[must_use]
    pub const fn new(h: f32, s: f32, l: f32, a: f32) -> Self {
        Self { h, s, l, a }
    }

    /// Create an opaque HSL color (alpha = 1.0).
    #[must_use]
    pub const fn hsl(h: f32, s: f32, l: f32) -> Self {
        Self::new(h, s, l, 1.0)
    }

    /// Convert to RGBA.
    #[must_use]
    pub fn to_rgba(self) -> Rgba {
        let h = self.h.rem_euclid(360.0) / 360.0;
        let s = self.s;
        let l = self.l;

        let (r, g, b) = if s == 0.0 {
            (l, l, l)
        } else {
            let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
            let p = 2.0 * l - q;

            (hue_to_rgb(p, q, h + 1.0 / 3.0), hue_to_rgb(p, q, h), hue_to_rgb(p, q, h - 1.0 / 3.0))
        };

        Rgba::new((r * 255.0) as u8, (g * 255.0) as u8, (b * 255.0) as u8, (self.a * 255.0) as u8)
    }
}

fn hue_to_rgb(p: f32, q: f32, mut t: f32) -> f32 {
    if t < 0.0 {
        t += 1.0;
    }
    if t > 1.0 {
        t -= 1.0;
    }

    if t < 1.0 / 6.0 {
        p + (q - p) * 6.0 * t
    } else if t < 1.0 / 2.0 {
        q
    } else if t < 2.0 / 3.0 {
        p + (q - p) * (2.0 / 3.0 - t) * 6.0
    } else {
        p
    }
}

impl From<Hsla> for Rgba {
    fn from(hsla: Hsla) -> Self {
        hsla.to_rgba()
    }
}

/// Palette slot `index` of an `n`-level hue palette.
///
/// Hues are evenly spaced starting at 15 degrees, so neighbouring levels
/// are maximally distinct for small `n`.
#[must_use]
pub fn hue_palette(index: usize, n: usize) -> Rgba {
    let n = n.max(1);
    let hue = 15.0 + 360.0 * (index % n) as f32 / n as f32;
    Hsla::hsl(hue, 0.65, 0.6).to_rgba()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgba_lerp() {
        let mid = Rgba::BLACK.lerp(Rgba::WHITE, 0.5);
        assert_eq!(mid.r, 127);
        assert_eq!(mid.g, 127);
        assert_eq!(mid.b, 127);
    }

    #[test]
    fn test_lerp_boundaries() {
        assert_eq!(Rgba::BLACK.lerp(Rgba::WHITE, 0.0), Rgba::BLACK);
        assert_eq!(Rgba::BLACK.lerp(Rgba::WHITE, 1.0), Rgba::WHITE);
        assert_eq!(Rgba::BLACK.lerp(Rgba::WHITE, -0.5), Rgba::BLACK);
        assert_eq!(Rgba::BLACK.lerp(Rgba::WHITE, 1.5), Rgba::WHITE);
    }

    #[test]
    fn test_parse_named_and_hex() {
        assert_eq!(Rgba::parse("blue").unwrap(), Rgba::BLUE);
        assert_eq!(Rgba::parse("Grey").unwrap(), Rgba::GREY);
        assert_eq!(Rgba::parse("#ff8000").unwrap(), Rgba::rgb(255, 128, 0));
        assert_eq!(Rgba::parse("#ff800080").unwrap(), Rgba::new(255, 128, 0, 128));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Rgba::parse("blurple").is_err());
        assert!(Rgba::parse("#12345").is_err());
        assert!(Rgba::parse("#gg0000").is_err());
    }

    #[test]
    fn test_hsla_to_rgba() {
        let red = Hsla::hsl(0.0, 1.0, 0.5).to_rgba();
        assert_eq!((red.r, red.g, red.b), (255, 0, 0));

        let gray = Hsla::hsl(0.0, 0.0, 0.5).to_rgba();
        assert_eq!((gray.r, gray.g, gray.b), (127, 127, 127));
    }

    #[test]
    fn test_hsla_wraps_hue() {
        let a = Hsla::hsl(375.0, 0.65, 0.6).to_rgba();
        let b = Hsla::hsl(15.0, 0.65, 0.6).to_rgba();
        assert_eq!(a, b);
    }

    #[test]
    fn test_hue_palette_distinct() {
        let colours: Vec<Rgba> = (0..4).map(|i| hue_palette(i, 4)).collect();
        for i in 0..colours.len() {
            for j in (i + 1)..colours.len() {
                assert_ne!(colours[i], colours[j]);
            }
        }
        assert_eq!(hue_palette(4, 4), hue_palette(0, 4));
    }
}
