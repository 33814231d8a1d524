//! Low-level continuous scale functions.
//!
//! These map a finished domain onto a visual range. Domain discovery,
//! sharing across panels and guide generation live in
//! [`crate::grammar::scales`]; this module only holds the arithmetic.
//! Based on the Grammar of Graphics [Wilkinson 2005].

use serde::{Deserialize, Serialize};

use crate::color::Rgba;
use crate::error::{Error, Result};

/// Trait for scale functions that map domain values to range values.
pub trait Scale<D, R> {
    /// Transform a domain value to a range value.
    fn scale(&self, value: D) -> R;

    /// Get the domain extent.
    fn domain(&self) -> (D, D);

    /// Get the range extent.
    fn range(&self) -> (R, R);
}

/// Continuous transformation applied before linear interpolation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transform {
    /// No transformation.
    #[default]
    Identity,
    /// Base-10 logarithm; domain must be strictly positive.
    Log10,
    /// Square root; domain must be non-negative.
    Sqrt,
}

impl Transform {
    /// Apply the transform.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ScaleDomain`] for values outside the transform's domain.
    pub fn apply(self, value: f32) -> Result<f32> {
        match self {
            Transform::Identity => Ok(value),
            Transform::Log10 if value > 0.0 => Ok(value.log10()),
            Transform::Log10 => {
                Err(Error::ScaleDomain(format!("log10 scale received non-positive value {value}")))
            }
            Transform::Sqrt if value >= 0.0 => Ok(value.sqrt()),
            Transform::Sqrt => {
                Err(Error::ScaleDomain(format!("sqrt scale received negative value {value}")))
            }
        }
    }

    /// Invert the transform.
    #[must_use]
    pub fn invert(self, value: f32) -> f32 {
        match self {
            Transform::Identity => value,
            Transform::Log10 => 10f32.powf(value),
            Transform::Sqrt => value * value,
        }
    }
}

/// Linear scale for continuous-to-continuous mapping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearScale {
    domain_min: f32,
    domain_max: f32,
    range_min: f32,
    range_max: f32,
}

impl LinearScale {
    /// Create a new linear scale.
    ///
    /// # Errors
    ///
    /// Returns an error if domain_min equals domain_max.
    pub fn new(domain: (f32, f32), range: (f32, f32)) -> Result<Self> {
        if (domain.0 - domain.1).abs() < f32::EPSILON {
            return Err(Error::ScaleDomain("Domain min and max cannot be equal".to_string()));
        }

        Ok(Self { domain_min: domain.0, domain_max: domain.1, range_min: range.0, range_max: range.1 })
    }
}

impl Scale<f32, f32> for LinearScale {
    fn scale(&self, value: f32) -> f32 {
        let t = (value - self.domain_min) / (self.domain_max - self.domain_min);
        self.range_min + t * (self.range_max - self.range_min)
    }

    fn domain(&self) -> (f32, f32) {
        (self.domain_min, self.domain_max)
    }

    fn range(&self) -> (f32, f32) {
        (self.range_min, self.range_max)
    }
}

/// Color scale for mapping continuous values to a gradient.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorScale {
    colors: Vec<Rgba>,
    domain_min: f32,
    domain_max: f32,
}

impl ColorScale {
    /// Create a new color scale.
    ///
    /// # Errors
    ///
    /// Returns an error if colors is empty or domain is invalid.
    pub fn new(colors: Vec<Rgba>, domain: (f32, f32)) -> Result<Self> {
        if colors.is_empty() {
            return Err(Error::ScaleDomain("Color scale requires at least one color".to_string()));
        }

        if (domain.0 - domain.1).abs() < f32::EPSILON {
            return Err(Error::ScaleDomain("Domain min and max cannot be equal".to_string()));
        }

        Ok(Self { colors, domain_min: domain.0, domain_max: domain.1 })
    }

    /// The default dark-to-light blue gradient used for continuous colour.
    ///
    /// # Errors
    ///
    /// Returns an error if the domain is degenerate.
    pub fn gradient(domain: (f32, f32)) -> Result<Self> {
        Self::new(vec![Rgba::GRADIENT_LOW, Rgba::GRADIENT_HIGH], domain)
    }
}

impl Scale<f32, Rgba> for ColorScale {
    fn scale(&self, value: f32) -> Rgba {
        let t = ((value - self.domain_min) / (self.domain_max - self.domain_min)).clamp(0.0, 1.0);

        if self.colors.len() == 1 {
            return self.colors[0];
        }

        let segment_count = self.colors.len() - 1;
        let segment = (t * segment_count as f32).floor() as usize;
        let segment = segment.min(segment_count - 1);

        let local_t = t * segment_count as f32 - segment as f32;

        self.colors[segment].lerp(self.colors[segment + 1], local_t)
    }

    fn domain(&self) -> (f32, f32) {
        (self.domain_min, self.domain_max)
    }

    fn range(&self) -> (Rgba, Rgba) {
        (*self.colors.first().unwrap_or(&Rgba::BLACK), *self.colors.last().unwrap_or(&Rgba::WHITE))
    }
}
