//! Render configuration.
//!
//! Every field has a serde default, so a YAML file only needs to name the
//! settings it changes. Precedence: explicit builder calls > file > defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Panel geometry in visual units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Width of a single panel.
    #[serde(default = "default_panel_width")]
    pub panel_width: f32,

    /// Height of a single panel.
    #[serde(default = "default_panel_height")]
    pub panel_height: f32,

    /// Gap between neighbouring panels.
    #[serde(default = "default_panel_spacing")]
    pub panel_spacing: f32,
}

fn default_panel_width() -> f32 {
    400.0
}
fn default_panel_height() -> f32 {
    300.0
}
fn default_panel_spacing() -> f32 {
    10.0
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            panel_width: default_panel_width(),
            panel_height: default_panel_height(),
            panel_spacing: default_panel_spacing(),
        }
    }
}

/// Scale training settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaleConfig {
    /// Multiplicative expansion applied to each end of a continuous domain.
    #[serde(default = "default_expand_mult")]
    pub expand_mult: f32,

    /// Additive expansion (in level units) applied to each end of a discrete domain.
    #[serde(default = "default_discrete_expand")]
    pub discrete_expand: f32,

    /// Target number of axis breaks for continuous scales.
    #[serde(default = "default_axis_breaks")]
    pub axis_breaks: usize,
}

fn default_expand_mult() -> f32 {
    0.05
}
fn default_discrete_expand() -> f32 {
    0.6
}
fn default_axis_breaks() -> usize {
    5
}

impl Default for ScaleConfig {
    fn default() -> Self {
        Self {
            expand_mult: default_expand_mult(),
            discrete_expand: default_discrete_expand(),
            axis_breaks: default_axis_breaks(),
        }
    }
}

/// Defaults for statistical transforms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatConfig {
    /// Bin count when neither `binwidth` nor `breaks` is given.
    #[serde(default = "default_bins")]
    pub bins: usize,

    /// Grid resolution of kernel density estimates.
    #[serde(default = "default_density_points")]
    pub density_points: usize,

    /// Number of points on a fitted smoothing curve.
    #[serde(default = "default_smooth_points")]
    pub smooth_points: usize,

    /// Confidence level of smoothing ribbons.
    #[serde(default = "default_confidence_level")]
    pub confidence_level: f32,

    /// Group size above which local regression is replaced by the
    /// large-sample method.
    #[serde(default = "default_large_sample_threshold")]
    pub large_sample_threshold: usize,

    /// Default span of local regression.
    #[serde(default = "default_span")]
    pub span: f32,

    /// Largest bin count `bins` or `binwidth` may produce.
    #[serde(default = "default_max_bins")]
    pub max_bins: usize,
}

fn default_bins() -> usize {
    30
}
fn default_density_points() -> usize {
    512
}
fn default_smooth_points() -> usize {
    80
}
fn default_confidence_level() -> f32 {
    0.95
}
fn default_large_sample_threshold() -> usize {
    1000
}
fn default_span() -> f32 {
    0.75
}
fn default_max_bins() -> usize {
    10_000
}

impl Default for StatConfig {
    fn default() -> Self {
        Self {
            bins: default_bins(),
            density_points: default_density_points(),
            smooth_points: default_smooth_points(),
            confidence_level: default_confidence_level(),
            large_sample_threshold: default_large_sample_threshold(),
            span: default_span(),
            max_bins: default_max_bins(),
        }
    }
}

/// Default mark sizes, as fractions of data resolution or visual units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeomConfig {
    /// Marker diameter for unmapped point size.
    #[serde(default = "default_point_size")]
    pub point_size: f32,

    /// Stroke width of lines and outlines.
    #[serde(default = "default_line_width")]
    pub line_width: f32,

    /// Bar width as a fraction of the x resolution.
    #[serde(default = "default_bar_width")]
    pub bar_width: f32,

    /// Box width as a fraction of the x resolution.
    #[serde(default = "default_box_width")]
    pub box_width: f32,

    /// Violin width as a fraction of the x resolution.
    #[serde(default = "default_violin_width")]
    pub violin_width: f32,

    /// Jitter amplitude as a fraction of the data resolution.
    #[serde(default = "default_jitter")]
    pub jitter: f32,
}

fn default_point_size() -> f32 {
    4.0
}
fn default_line_width() -> f32 {
    1.0
}
fn default_bar_width() -> f32 {
    0.9
}
fn default_box_width() -> f32 {
    0.75
}
fn default_violin_width() -> f32 {
    0.9
}
fn default_jitter() -> f32 {
    0.4
}

impl Default for GeomConfig {
    fn default() -> Self {
        Self {
            point_size: default_point_size(),
            line_width: default_line_width(),
            bar_width: default_bar_width(),
            box_width: default_box_width(),
            violin_width: default_violin_width(),
            jitter: default_jitter(),
        }
    }
}

/// Complete render configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Panel layout.
    #[serde(default)]
    pub layout: LayoutConfig,

    /// Scale training.
    #[serde(default)]
    pub scales: ScaleConfig,

    /// Stat defaults.
    #[serde(default)]
    pub stats: StatConfig,

    /// Geom defaults.
    #[serde(default)]
    pub geoms: GeomConfig,
}

impl RenderConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or fails validation.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&content)
    }

    /// Parses configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error with line number if parsing fails, or if validation fails.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml).map_err(|e| {
            let line = e.location().map(|l| l.line()).unwrap_or(0);
            Error::Config(format!("line {line}: {e}"))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that every setting is usable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the first invalid setting.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("layout.panel_width", self.layout.panel_width),
            ("layout.panel_height", self.layout.panel_height),
            ("stats.span", self.stats.span),
            ("geoms.point_size", self.geoms.point_size),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(Error::Config(format!("{name} must be positive, got {value}")));
            }
        }
        if self.layout.panel_spacing < 0.0 || self.scales.expand_mult < 0.0 {
            return Err(Error::Config("spacing and expansion must be non-negative".into()));
        }
        if !(self.stats.confidence_level > 0.0 && self.stats.confidence_level < 1.0) {
            return Err(Error::Config(format!(
                "stats.confidence_level must be in (0, 1), got {}",
                self.stats.confidence_level
            )));
        }
        if self.stats.bins == 0 || self.stats.density_points < 2 || self.stats.smooth_points < 2 {
            return Err(Error::Config("bin and grid counts must be at least 1 and 2".into()));
        }
        if self.stats.bins > self.stats.max_bins {
            return Err(Error::Config(format!(
                "stats.bins ({}) exceeds stats.max_bins ({})",
                self.stats.bins, self.stats.max_bins
            )));
        }
        Ok(())
    }
}
