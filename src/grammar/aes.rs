//! Aesthetic mappings for Grammar of Graphics.
//!
//! Maps data columns (or expressions over them) to visual channels, and
//! resolves those mappings against a layer's data.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::color::Rgba;
use crate::error::{Error, Result};

use super::data::DataFrame;
use super::expr::Expr;
use super::geom::PointShape;
use super::series::Series;

/// A visual channel a variable can be mapped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Horizontal position.
    X,
    /// Vertical position.
    Y,
    /// Stroke colour.
    Colour,
    /// Fill colour.
    Fill,
    /// Marker shape.
    Shape,
    /// Marker size.
    Size,
    /// Opacity.
    Alpha,
    /// Grouping without a visual encoding.
    Group,
}

impl Channel {
    /// All channels in canonical order.
    pub const ALL: [Channel; 8] = [
        Channel::X,
        Channel::Y,
        Channel::Colour,
        Channel::Fill,
        Channel::Shape,
        Channel::Size,
        Channel::Alpha,
        Channel::Group,
    ];

    /// Channel name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Channel::X => "x",
            Channel::Y => "y",
            Channel::Colour => "colour",
            Channel::Fill => "fill",
            Channel::Shape => "shape",
            Channel::Size => "size",
            Channel::Alpha => "alpha",
            Channel::Group => "group",
        }
    }

    /// `true` for x and y.
    #[must_use]
    pub fn is_positional(self) -> bool {
        matches!(self, Channel::X | Channel::Y)
    }

    /// `true` for channels that get a scale and possibly a legend.
    #[must_use]
    pub fn is_scaled(self) -> bool {
        self != Channel::Group
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Channel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "x" => Ok(Channel::X),
            "y" => Ok(Channel::Y),
            "colour" | "color" => Ok(Channel::Colour),
            "fill" => Ok(Channel::Fill),
            "shape" => Ok(Channel::Shape),
            "size" => Ok(Channel::Size),
            "alpha" => Ok(Channel::Alpha),
            "group" => Ok(Channel::Group),
            other => Err(Error::UnknownName { kind: "aesthetic", name: other.to_string() }),
        }
    }
}

/// Aesthetic mapping specification.
///
/// Each field holds a column name or an expression such as `"unemploy / pop"`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aes {
    /// X position mapping.
    pub x: Option<String>,
    /// Y position mapping.
    pub y: Option<String>,
    /// Colour mapping.
    pub colour: Option<String>,
    /// Fill colour mapping.
    pub fill: Option<String>,
    /// Shape mapping.
    pub shape: Option<String>,
    /// Size mapping.
    pub size: Option<String>,
    /// Alpha/opacity mapping.
    pub alpha: Option<String>,
    /// Group mapping.
    pub group: Option<String>,
}

impl Aes {
    /// Create a new aesthetic mapping.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Map x and y in one call.
    #[must_use]
    pub fn xy(x: &str, y: &str) -> Self {
        Self::new().x(x).y(y)
    }

    /// Positional shorthand: the first value maps x, the second y.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] when more than two values are given.
    pub fn positional(values: &[&str]) -> Result<Self> {
        match values {
            [] => Ok(Self::new()),
            [x] => Ok(Self::new().x(x)),
            [x, y] => Ok(Self::xy(x, y)),
            _ => Err(Error::InvalidParameter {
                name: "aes".into(),
                reason: format!("at most x and y may be given positionally, got {}", values.len()),
            }),
        }
    }

    /// Map x position.
    #[must_use]
    pub fn x(mut self, expr: &str) -> Self {
        self.x = Some(expr.to_string());
        self
    }

    /// Map y position.
    #[must_use]
    pub fn y(mut self, expr: &str) -> Self {
        self.y = Some(expr.to_string());
        self
    }

    /// Map colour.
    #[must_use]
    pub fn colour(mut self, expr: &str) -> Self {
        self.colour = Some(expr.to_string());
        self
    }

    /// Alias for [`Aes::colour`].
    #[must_use]
    pub fn color(self, expr: &str) -> Self {
        self.colour(expr)
    }

    /// Map fill colour.
    #[must_use]
    pub fn fill(mut self, expr: &str) -> Self {
        self.fill = Some(expr.to_string());
        self
    }

    /// Map shape.
    #[must_use]
    pub fn shape(mut self, expr: &str) -> Self {
        self.shape = Some(expr.to_string());
        self
    }

    /// Map size.
    #[must_use]
    pub fn size(mut self, expr: &str) -> Self {
        self.size = Some(expr.to_string());
        self
    }

    /// Map alpha.
    #[must_use]
    pub fn alpha(mut self, expr: &str) -> Self {
        self.alpha = Some(expr.to_string());
        self
    }

    /// Map group.
    #[must_use]
    pub fn group(mut self, expr: &str) -> Self {
        self.group = Some(expr.to_string());
        self
    }

    /// Map any channel.
    #[must_use]
    pub fn map(mut self, channel: Channel, expr: &str) -> Self {
        *self.slot_mut(channel) = Some(expr.to_string());
        self
    }

    /// Mapping for a channel.
    #[must_use]
    pub fn get(&self, channel: Channel) -> Option<&str> {
        match channel {
            Channel::X => self.x.as_deref(),
            Channel::Y => self.y.as_deref(),
            Channel::Colour => self.colour.as_deref(),
            Channel::Fill => self.fill.as_deref(),
            Channel::Shape => self.shape.as_deref(),
            Channel::Size => self.size.as_deref(),
            Channel::Alpha => self.alpha.as_deref(),
            Channel::Group => self.group.as_deref(),
        }
    }

    fn slot_mut(&mut self, channel: Channel) -> &mut Option<String> {
        match channel {
            Channel::X => &mut self.x,
            Channel::Y => &mut self.y,
            Channel::Colour => &mut self.colour,
            Channel::Fill => &mut self.fill,
            Channel::Shape => &mut self.shape,
            Channel::Size => &mut self.size,
            Channel::Alpha => &mut self.alpha,
            Channel::Group => &mut self.group,
        }
    }

    /// Mapped channels in canonical order.
    pub fn mappings(&self) -> impl Iterator<Item = (Channel, &str)> {
        Channel::ALL.into_iter().filter_map(move |c| self.get(c).map(|e| (c, e)))
    }

    /// Check for an empty mapping.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mappings().next().is_none()
    }

    /// Layer mapping on top of `self`; channels set in `other` win.
    #[must_use]
    pub fn merge(&self, other: &Aes) -> Aes {
        let mut merged = self.clone();
        for (channel, expr) in other.mappings() {
            *merged.slot_mut(channel) = Some(expr.to_string());
        }
        merged
    }
}

/// Constant aesthetics set outside the mapping.
///
/// Fixed values never create scales or legends.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FixedAes {
    /// Fixed stroke colour.
    pub colour: Option<Rgba>,
    /// Fixed fill colour.
    pub fill: Option<Rgba>,
    /// Fixed marker size.
    pub size: Option<f32>,
    /// Fixed opacity in [0, 1].
    pub alpha: Option<f32>,
    /// Fixed marker shape.
    pub shape: Option<PointShape>,
}

impl FixedAes {
    /// Create an empty set of fixed aesthetics.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set fixed colour.
    #[must_use]
    pub fn colour(mut self, colour: Rgba) -> Self {
        self.colour = Some(colour);
        self
    }

    /// Set fixed fill.
    #[must_use]
    pub fn fill(mut self, fill: Rgba) -> Self {
        self.fill = Some(fill);
        self
    }

    /// Set fixed size.
    #[must_use]
    pub fn size(mut self, size: f32) -> Self {
        self.size = Some(size);
        self
    }

    /// Set fixed alpha.
    #[must_use]
    pub fn alpha(mut self, alpha: f32) -> Self {
        self.alpha = Some(alpha.clamp(0.0, 1.0));
        self
    }

    /// Set fixed shape.
    #[must_use]
    pub fn shape(mut self, shape: PointShape) -> Self {
        self.shape = Some(shape);
        self
    }

    /// Set a channel from its textual form, e.g. `("colour", "blue")`.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown channels or unparseable values.
    pub fn set(mut self, channel: &str, value: &str) -> Result<Self> {
        let number = || {
            value.parse::<f32>().map_err(|_| Error::InvalidParameter {
                name: channel.to_string(),
                reason: format!("expected a number, got '{value}'"),
            })
        };
        match channel.parse::<Channel>()? {
            Channel::Colour => self.colour = Some(Rgba::parse(value)?),
            Channel::Fill => self.fill = Some(Rgba::parse(value)?),
            Channel::Size => self.size = Some(number()?),
            Channel::Alpha => self.alpha = Some(number()?.clamp(0.0, 1.0)),
            Channel::Shape => self.shape = Some(value.parse()?),
            other => {
                return Err(Error::InvalidParameter {
                    name: other.name().to_string(),
                    reason: "position and group cannot be fixed".into(),
                })
            }
        }
        Ok(self)
    }

    /// `true` when `channel` has a fixed value.
    #[must_use]
    pub fn has(&self, channel: Channel) -> bool {
        match channel {
            Channel::Colour => self.colour.is_some(),
            Channel::Fill => self.fill.is_some(),
            Channel::Size => self.size.is_some(),
            Channel::Alpha => self.alpha.is_some(),
            Channel::Shape => self.shape.is_some(),
            Channel::X | Channel::Y | Channel::Group => false,
        }
    }
}

/// A mapping evaluated against data.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedChannel {
    /// Mapping source text, used as the default axis or legend title.
    pub source: String,
    /// Evaluated per-row values.
    pub series: Series,
}

/// Every mapping of a layer evaluated against the layer's data.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedAes {
    channels: BTreeMap<Channel, ResolvedChannel>,
    nrow: usize,
}

impl ResolvedAes {
    /// Evaluate `mapping` against `data`.
    ///
    /// Channels set in `fixed` are skipped. All channel errors are
    /// collected; more than one is reported as [`Error::Discovery`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownColumn`], [`Error::InvalidExpression`] or
    /// [`Error::IncompatibleScale`] (continuous shape).
    pub fn resolve(mapping: &Aes, fixed: &FixedAes, data: &DataFrame) -> Result<Self> {
        let mut channels = BTreeMap::new();
        let mut errors = Vec::new();

        for (channel, source) in mapping.mappings() {
            if fixed.has(channel) {
                continue;
            }
            match resolve_channel(channel, source, data) {
                Ok(series) => {
                    channels.insert(channel, ResolvedChannel { source: source.to_string(), series });
                }
                Err(err) => errors.push(err),
            }
        }

        match errors.len() {
            0 => Ok(Self { channels, nrow: data.nrow() }),
            1 => Err(errors.remove(0)),
            _ => Err(Error::Discovery(errors)),
        }
    }

    /// Resolved channel.
    #[must_use]
    pub fn get(&self, channel: Channel) -> Option<&ResolvedChannel> {
        self.channels.get(&channel)
    }

    /// Resolved series of a channel.
    #[must_use]
    pub fn series(&self, channel: Channel) -> Option<&Series> {
        self.channels.get(&channel).map(|c| &c.series)
    }

    /// `true` when `channel` is mapped.
    #[must_use]
    pub fn has(&self, channel: Channel) -> bool {
        self.channels.contains_key(&channel)
    }

    /// `true` when `channel` is mapped to discrete data.
    #[must_use]
    pub fn is_discrete(&self, channel: Channel) -> bool {
        self.series(channel).is_some_and(Series::is_discrete)
    }

    /// Mapped channels in canonical order.
    pub fn channels(&self) -> impl Iterator<Item = (Channel, &ResolvedChannel)> {
        self.channels.iter().map(|(c, r)| (*c, r))
    }

    /// Number of data rows.
    #[must_use]
    pub fn nrow(&self) -> usize {
        self.nrow
    }
}

fn resolve_channel(channel: Channel, source: &str, data: &DataFrame) -> Result<Series> {
    let series = match data.column(source) {
        Ok(column) => Series::from_column(column),
        Err(_) => Expr::parse(source)?.evaluate(data)?,
    };

    match channel {
        Channel::Group => Ok(series.into_discrete()),
        Channel::Shape if !series.is_discrete() => Err(Error::IncompatibleScale {
            channel: channel.name().to_string(),
            detail: format!("continuous variable '{source}' cannot be mapped to shape"),
        }),
        _ => Ok(series),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mpg() -> DataFrame {
        let mut df = DataFrame::new();
        df.add_column_f32("displ", &[1.8, 2.0, 5.7]).unwrap();
        df.add_column_f32("hwy", &[29.0, 31.0, 17.0]).unwrap();
        df.add_column_str("class", &["compact", "compact", "suv"]).unwrap();
        df
    }

    #[test]
    fn test_aes_builder() {
        let aes = Aes::new().x("displ").y("hwy").color("class");
        assert_eq!(aes.get(Channel::X), Some("displ"));
        assert_eq!(aes.get(Channel::Colour), Some("class"));
        assert_eq!(aes.mappings().count(), 3);
    }

    #[test]
    fn test_positional_shorthand() {
        assert_eq!(Aes::positional(&["displ", "hwy"]).unwrap(), Aes::xy("displ", "hwy"));
        assert!(Aes::positional(&["a", "b", "c"]).is_err());
    }

    #[test]
    fn test_merge_layer_wins() {
        let plot = Aes::xy("displ", "hwy").colour("class");
        let layer = Aes::new().colour("drv");
        let merged = plot.merge(&layer);
        assert_eq!(merged.get(Channel::Colour), Some("drv"));
        assert_eq!(merged.get(Channel::X), Some("displ"));
    }

    #[test]
    fn test_channel_from_str() {
        assert_eq!("color".parse::<Channel>().unwrap(), Channel::Colour);
        assert!(matches!("glow".parse::<Channel>(), Err(Error::UnknownName { kind: "aesthetic", .. })));
    }

    #[test]
    fn test_fixed_set_from_text() {
        let fixed = FixedAes::new().set("colour", "blue").unwrap().set("size", "3").unwrap();
        assert_eq!(fixed.colour, Some(Rgba::BLUE));
        assert_eq!(fixed.size, Some(3.0));
        assert!(fixed.has(Channel::Colour));
        assert!(FixedAes::new().set("x", "1").is_err());
        assert!(FixedAes::new().set("size", "big").is_err());
    }

    #[test]
    fn test_resolve_columns_and_expressions() {
        let aes = Aes::xy("displ", "hwy / 2").colour("class");
        let resolved = ResolvedAes::resolve(&aes, &FixedAes::new(), &mpg()).unwrap();
        assert_eq!(resolved.series(Channel::Y).unwrap().values().unwrap(), &[14.5, 15.5, 8.5]);
        assert!(resolved.is_discrete(Channel::Colour));
        assert_eq!(resolved.get(Channel::Y).unwrap().source, "hwy / 2");
    }

    #[test]
    fn test_fixed_channel_not_resolved() {
        let aes = Aes::xy("displ", "hwy").colour("nonexistent");
        let fixed = FixedAes::new().colour(Rgba::BLUE);
        let resolved = ResolvedAes::resolve(&aes, &fixed, &mpg()).unwrap();
        assert!(!resolved.has(Channel::Colour));
    }

    #[test]
    fn test_resolve_collects_errors() {
        let aes = Aes::xy("cty", "hwy").colour("manufacturer");
        let err = ResolvedAes::resolve(&aes, &FixedAes::new(), &mpg()).unwrap_err();
        assert_eq!(err.into_leaves().len(), 2);
    }

    #[test]
    fn test_unknown_column_names_column() {
        let aes = Aes::xy("displ", "hwyy");
        let err = ResolvedAes::resolve(&aes, &FixedAes::new(), &mpg()).unwrap_err();
        assert!(matches!(err, Error::UnknownColumn { ref column, .. } if column == "hwyy"));
    }

    #[test]
    fn test_group_is_discrete_and_shape_must_be() {
        let aes = Aes::xy("displ", "hwy").group("hwy");
        let resolved = ResolvedAes::resolve(&aes, &FixedAes::new(), &mpg()).unwrap();
        assert!(resolved.is_discrete(Channel::Group));

        let aes = Aes::xy("displ", "hwy").shape("displ");
        let err = ResolvedAes::resolve(&aes, &FixedAes::new(), &mpg()).unwrap_err();
        assert!(matches!(err, Error::IncompatibleScale { .. }));
    }
}
