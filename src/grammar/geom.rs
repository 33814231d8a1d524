//! Geometry types for Grammar of Graphics.
//!
//! A geom turns computed stat rows into primitive marks. Each geom has a
//! setup step that runs before scale discovery (so bar extents and jitter
//! widen the domains) and a draw step that runs against finalized scales.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::color::Rgba;
use crate::config::GeomConfig;
use crate::error::{Error, Result};
use crate::geometry::{Point, Rect, Segment};
use crate::numeric;

use super::aes::{Channel, FixedAes, ResolvedAes};
use super::layer::Params;
use super::scales::{PositionScale, ScaleInput, TrainedScales};
use super::scene::{BoxWhisker, Primitive, Style};
use super::series::Series;
use super::stat::{
    BinParams, BoxplotParams, ComputedGroup, ComputedRow, DensityParams, GroupKey, Pos, SmoothParams, Stat,
    StatOutput, Summary,
};

/// Shape types for point geometries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointShape {
    /// Filled circle.
    #[default]
    Circle,
    /// Filled square.
    Square,
    /// Filled triangle.
    Triangle,
    /// Diamond shape.
    Diamond,
    /// Cross (+).
    Cross,
    /// X shape.
    X,
}

impl PointShape {
    /// Shapes in palette order.
    pub const ALL: [PointShape; 6] =
        [PointShape::Circle, PointShape::Triangle, PointShape::Square, PointShape::Cross, PointShape::X, PointShape::Diamond];

    /// Shape name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            PointShape::Circle => "circle",
            PointShape::Square => "square",
            PointShape::Triangle => "triangle",
            PointShape::Diamond => "diamond",
            PointShape::Cross => "cross",
            PointShape::X => "x",
        }
    }
}

impl fmt::Display for PointShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PointShape {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "circle" => Ok(PointShape::Circle),
            "square" => Ok(PointShape::Square),
            "triangle" => Ok(PointShape::Triangle),
            "diamond" => Ok(PointShape::Diamond),
            "cross" | "plus" => Ok(PointShape::Cross),
            "x" => Ok(PointShape::X),
            other => Err(Error::UnknownName { kind: "shape", name: other.to_string() }),
        }
    }
}

/// Which halves of a violin are drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolinStyle {
    /// Mirrored on both sides.
    #[default]
    Full,
    /// Left half only.
    Left,
    /// Right half only.
    Right,
}

impl FromStr for ViolinStyle {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "full" => Ok(ViolinStyle::Full),
            "left" => Ok(ViolinStyle::Left),
            "right" => Ok(ViolinStyle::Right),
            other => Err(Error::UnknownName { kind: "violin style", name: other.to_string() }),
        }
    }
}

/// Geometry type specification.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Geom {
    /// One marker per row.
    #[default]
    Point,
    /// Points with deterministic pseudo-random offsets.
    Jitter {
        /// Horizontal jitter amount in data units.
        width: Option<f32>,
        /// Vertical jitter amount in data units.
        height: Option<f32>,
    },
    /// Polyline per group, sorted by x.
    Line,
    /// Polyline per group, in row order.
    Path,
    /// Bars from zero.
    Bar {
        /// Bar width as a fraction of the x resolution.
        width: Option<f32>,
    },
    /// Bars over bins.
    Histogram,
    /// Polyline through bin midpoints.
    Freqpoly,
    /// Box and whiskers per group.
    Boxplot {
        /// Box width as a fraction of the x resolution.
        width: Option<f32>,
        /// Draw outlier markers.
        outliers: bool,
    },
    /// Mirrored density per group.
    Violin {
        /// Maximum width as a fraction of the x resolution.
        width: Option<f32>,
        /// Halves drawn.
        style: ViolinStyle,
    },
    /// Fitted curve with optional ribbon.
    Smooth,
}

impl Geom {
    /// Create a point geometry.
    #[must_use]
    pub fn point() -> Self {
        Geom::Point
    }

    /// Create a jittered point geometry.
    #[must_use]
    pub fn jitter() -> Self {
        Geom::Jitter { width: None, height: None }
    }

    /// Create a line geometry.
    #[must_use]
    pub fn line() -> Self {
        Geom::Line
    }

    /// Create a path geometry.
    #[must_use]
    pub fn path() -> Self {
        Geom::Path
    }

    /// Create a bar geometry.
    #[must_use]
    pub fn bar() -> Self {
        Geom::Bar { width: None }
    }

    /// Create a histogram geometry.
    #[must_use]
    pub fn histogram() -> Self {
        Geom::Histogram
    }

    /// Create a frequency polygon geometry.
    #[must_use]
    pub fn freqpoly() -> Self {
        Geom::Freqpoly
    }

    /// Create a box plot geometry.
    #[must_use]
    pub fn boxplot() -> Self {
        Geom::Boxplot { width: None, outliers: true }
    }

    /// Create a violin plot geometry.
    #[must_use]
    pub fn violin() -> Self {
        Geom::Violin { width: None, style: ViolinStyle::Full }
    }

    /// Create a smooth line.
    #[must_use]
    pub fn smooth() -> Self {
        Geom::Smooth
    }

    /// Set the bar, box, violin or horizontal jitter width.
    #[must_use]
    pub fn width(mut self, w: f32) -> Self {
        match &mut self {
            Geom::Bar { width } | Geom::Boxplot { width, .. } | Geom::Violin { width, .. } | Geom::Jitter { width, .. } => {
                *width = Some(w);
            }
            _ => {}
        }
        self
    }

    /// Set the vertical jitter height.
    #[must_use]
    pub fn height(mut self, h: f32) -> Self {
        if let Geom::Jitter { height, .. } = &mut self {
            *height = Some(h);
        }
        self
    }

    /// Show or hide boxplot outliers.
    #[must_use]
    pub fn outliers(mut self, show: bool) -> Self {
        if let Geom::Boxplot { outliers, .. } = &mut self {
            *outliers = show;
        }
        self
    }

    /// Set the violin style.
    #[must_use]
    pub fn style(mut self, violin: ViolinStyle) -> Self {
        if let Geom::Violin { style, .. } = &mut self {
            *style = violin;
        }
        self
    }

    /// Geom name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Geom::Point => "point",
            Geom::Jitter { .. } => "jitter",
            Geom::Line => "line",
            Geom::Path => "path",
            Geom::Bar { .. } => "bar",
            Geom::Histogram => "histogram",
            Geom::Freqpoly => "freqpoly",
            Geom::Boxplot { .. } => "boxplot",
            Geom::Violin { .. } => "violin",
            Geom::Smooth => "smooth",
        }
    }

    /// Parameter names the geom understands.
    #[must_use]
    pub fn param_names(&self) -> &'static [&'static str] {
        match self {
            Geom::Jitter { .. } => &["width", "height"],
            Geom::Bar { .. } => &["width"],
            Geom::Boxplot { .. } => &["width", "outliers"],
            Geom::Violin { .. } => &["width", "style"],
            _ => &[],
        }
    }

    /// Build a geom from its name and parameters. `"col"` is a bar whose
    /// default stat is identity.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownName`] for unknown geoms and
    /// [`Error::InvalidParameter`] for bad parameter values.
    pub fn from_name(name: &str, params: &Params) -> Result<Self> {
        let width = params.number("width")?;
        if width.is_some_and(|w| !(w.is_finite() && w >= 0.0)) {
            return Err(Error::InvalidParameter { name: "width".into(), reason: "must be non-negative".into() });
        }
        let geom = match name {
            "point" => Geom::Point,
            "jitter" => Geom::Jitter { width, height: params.number("height")? },
            "line" => Geom::Line,
            "path" => Geom::Path,
            "bar" | "col" => Geom::Bar { width },
            "histogram" => Geom::Histogram,
            "freqpoly" => Geom::Freqpoly,
            "boxplot" => Geom::Boxplot { width, outliers: params.flag("outliers")?.unwrap_or(true) },
            "violin" => Geom::Violin {
                width,
                style: params.text("style")?.map(str::parse).transpose()?.unwrap_or_default(),
            },
            "smooth" => Geom::Smooth,
            other => return Err(Error::UnknownName { kind: "geom", name: other.to_string() }),
        };
        Ok(geom)
    }

    /// Stat used when the layer names none.
    #[must_use]
    pub fn default_stat(&self) -> Stat {
        match self {
            Geom::Point | Geom::Jitter { .. } | Geom::Line | Geom::Path => Stat::Identity,
            Geom::Bar { .. } => Stat::Count,
            Geom::Histogram | Geom::Freqpoly => Stat::Bin(BinParams::default()),
            Geom::Boxplot { .. } => Stat::Boxplot(BoxplotParams::default()),
            Geom::Violin { .. } => Stat::Density(DensityParams::default()),
            Geom::Smooth => Stat::Smooth(SmoothParams::default()),
        }
    }

    /// Add extents and offsets that must be known before scale discovery.
    pub(crate) fn setup(&self, output: &mut StatOutput, config: &GeomConfig) {
        let xs: Vec<f32> =
            output.groups.iter().flat_map(|g| g.rows.iter()).filter_map(|r| r.x.continuous()).collect();
        let x_res = numeric::resolution(&xs);

        match self {
            Geom::Bar { .. } | Geom::Histogram => {
                let fraction = match self {
                    Geom::Bar { width: Some(w) } => *w,
                    _ => config.bar_width,
                };
                for row in output.groups.iter_mut().flat_map(|g| g.rows.iter_mut()) {
                    if row.ymin.is_none() {
                        row.ymin = Some(0.0);
                        row.ymax = Some(row.y);
                    }
                    widen(row, fraction * x_res / 2.0);
                }
            }
            Geom::Boxplot { width, .. } => {
                let half = width.unwrap_or(config.box_width) * x_res / 2.0;
                output.groups.iter_mut().flat_map(|g| g.rows.iter_mut()).for_each(|row| widen(row, half));
            }
            Geom::Violin { width, .. } => {
                let half = width.unwrap_or(config.violin_width) * x_res / 2.0;
                output.groups.iter_mut().flat_map(|g| g.rows.iter_mut()).for_each(|row| widen(row, half));
            }
            Geom::Jitter { width, height } => {
                let ys: Vec<f32> = output.groups.iter().flat_map(|g| g.rows.iter()).map(|r| r.y).collect();
                let x_amount = width.unwrap_or(config.jitter * if xs.is_empty() { 1.0 } else { x_res });
                let y_amount = height.unwrap_or(config.jitter * numeric::resolution(&ys));
                for (i, row) in output.groups.iter_mut().flat_map(|g| g.rows.iter_mut()).enumerate() {
                    let seed = row.source.unwrap_or(i) as u32;
                    row.dx = (2.0 * unit_noise(seed) - 1.0) * x_amount;
                    row.dy = (2.0 * unit_noise(seed ^ 0x9e37_79b9) - 1.0) * y_amount;
                }
            }
            _ => {}
        }
    }

    /// Emit primitives for one layer in one panel.
    pub(crate) fn draw(&self, ctx: &DrawContext<'_>, output: &StatOutput) -> Vec<Primitive> {
        let mut out = Vec::new();
        for group in &output.groups {
            match self {
                Geom::Point | Geom::Jitter { .. } => draw_points(ctx, group, &mut out),
                Geom::Line => draw_line(ctx, group, true, &mut out),
                Geom::Path => draw_line(ctx, group, false, &mut out),
                Geom::Freqpoly => draw_line(ctx, group, false, &mut out),
                Geom::Bar { width } => draw_bars(ctx, group, width.unwrap_or(ctx.config.bar_width), &mut out),
                Geom::Histogram => draw_bars(ctx, group, ctx.config.bar_width, &mut out),
                Geom::Boxplot { width, outliers } => {
                    draw_box(ctx, group, width.unwrap_or(ctx.config.box_width), *outliers, &mut out);
                }
                Geom::Violin { width, style } => {
                    draw_violin(ctx, group, width.unwrap_or(ctx.config.violin_width), *style, &mut out);
                }
                Geom::Smooth => draw_smooth(ctx, group, &mut out),
            }
        }
        out
    }
}

/// Give a continuous-x row without extents a width of `2 * half` data units.
fn widen(row: &mut ComputedRow, half: f32) {
    if let (Pos::Continuous(x), None) = (row.x, row.xmin) {
        row.xmin = Some(x - half);
        row.xmax = Some(x + half);
    }
}

/// Deterministic value in `[0, 1]` from a linear congruential step.
fn unit_noise(seed: u32) -> f32 {
    let next = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
    ((next >> 16) & 0x7fff) as f32 / 32767.0
}

/// Everything a geom needs to turn computed rows into visual marks.
pub(crate) struct DrawContext<'a> {
    pub x: &'a PositionScale,
    pub y: &'a PositionScale,
    pub width: f32,
    pub height: f32,
    /// Level labels of the layer's discrete x.
    pub x_levels: Option<&'a [String]>,
    /// Level labels of the layer's discrete y, for identity rows.
    pub y_levels: Option<&'a [String]>,
    pub aes: &'a ResolvedAes,
    pub fixed: &'a FixedAes,
    pub scales: &'a TrainedScales,
    pub config: &'a GeomConfig,
}

/// Default colours of a mark before mapped and fixed aesthetics apply.
#[derive(Clone, Copy)]
struct Defaults {
    stroke: Option<Rgba>,
    fill: Option<Rgba>,
    alpha: f32,
}

impl<'a> DrawContext<'a> {
    fn x_at(&self, x: Pos, dx: f32) -> Option<f32> {
        let p = match x {
            Pos::Continuous(v) => self.x.map_value(ScaleInput::Value(v + dx))?,
            Pos::Discrete(_) => self.x.position_of(x, self.x_levels)? + dx,
        };
        Some(self.x.to_visual(p, self.width))
    }

    fn y_at(&self, y: f32, dy: f32) -> Option<f32> {
        let p = match self.y_levels {
            Some(levels) => self.y.map_value(ScaleInput::Level(levels.get(y as usize)?))? + dy,
            None => self.y.map_value(ScaleInput::Value(y + dy))?,
        };
        Some(self.y.to_visual(p, self.height))
    }

    /// Visual left and right edges of a row: its data extents for continuous
    /// x, or `fraction / 2` level units either side for discrete x.
    fn x_span(&self, row: &ComputedRow, fraction: f32) -> Option<(f32, f32)> {
        match (row.x, row.xmin, row.xmax) {
            (Pos::Continuous(_), Some(lo), Some(hi)) => {
                Some((self.x_at(Pos::Continuous(lo), 0.0)?, self.x_at(Pos::Continuous(hi), 0.0)?))
            }
            (Pos::Discrete(_), _, _) => {
                let centre = self.x.position_of(row.x, self.x_levels)?;
                let half = fraction / 2.0;
                Some((self.x.to_visual(centre - half, self.width), self.x.to_visual(centre + half, self.width)))
            }
            (Pos::Continuous(x), _, _) => {
                let at = self.x_at(Pos::Continuous(x), 0.0)?;
                Some((at, at))
            }
        }
    }

    fn point(&self, x: Pos, y: f32) -> Option<Point> {
        Some(Point::new(self.x_at(x, 0.0)?, self.y_at(y, 0.0)?))
    }

    fn input(&self, channel: Channel, row: &ComputedRow, key: &GroupKey) -> Option<ScaleInput<'a>> {
        match self.aes.series(channel)? {
            Series::Discrete { codes, levels, .. } => {
                let code = row.source.and_then(|r| codes.get(r).copied()).or_else(|| key.code(channel))?;
                levels.get(code as usize).map(|l| ScaleInput::Level(l.as_str()))
            }
            Series::Continuous { values, .. } => row.source.and_then(|r| values.get(r)).map(|&v| ScaleInput::Value(v)),
        }
    }

    fn mapped_colour(&self, channel: Channel, row: &ComputedRow, key: &GroupKey) -> Option<Rgba> {
        let input = self.input(channel, row, key)?;
        self.scales.aesthetic(channel)?.colour(input)
    }

    fn mapped_number(&self, channel: Channel, row: &ComputedRow, key: &GroupKey) -> Option<f32> {
        let input = self.input(channel, row, key)?;
        self.scales.aesthetic(channel)?.number(input)
    }

    fn style(&self, defaults: Defaults, row: &ComputedRow, key: &GroupKey) -> Style {
        let stroke = self.fixed.colour.or_else(|| self.mapped_colour(Channel::Colour, row, key)).or(defaults.stroke);
        let fill = self.fixed.fill.or_else(|| self.mapped_colour(Channel::Fill, row, key)).or(defaults.fill);
        let alpha =
            self.fixed.alpha.or_else(|| self.mapped_number(Channel::Alpha, row, key)).unwrap_or(defaults.alpha);
        Style { stroke, fill, stroke_width: self.config.line_width, alpha }
    }

    fn marker(&self, center: Point, row: &ComputedRow, key: &GroupKey) -> Primitive {
        let mut style = self.style(Defaults { stroke: Some(Rgba::INK), fill: None, alpha: 1.0 }, row, key);
        style.fill = style.fill.or(style.stroke);
        let size =
            self.fixed.size.or_else(|| self.mapped_number(Channel::Size, row, key)).unwrap_or(self.config.point_size);
        let shape = self
            .fixed
            .shape
            .or_else(|| {
                let input = self.input(Channel::Shape, row, key)?;
                self.scales.aesthetic(Channel::Shape)?.shape(input)
            })
            .unwrap_or_default();
        Primitive::Marker { center, shape, size, style }
    }
}

fn first_row(group: &ComputedGroup) -> ComputedRow {
    group.rows.first().copied().unwrap_or_else(|| ComputedRow::at(Pos::Continuous(f32::NAN), f32::NAN))
}

fn draw_points(ctx: &DrawContext<'_>, group: &ComputedGroup, out: &mut Vec<Primitive>) {
    for row in &group.rows {
        if let (Some(x), Some(y)) = (ctx.x_at(row.x, row.dx), ctx.y_at(row.y, row.dy)) {
            out.push(ctx.marker(Point::new(x, y), row, &group.key));
        }
    }
}

fn draw_line(ctx: &DrawContext<'_>, group: &ComputedGroup, sort_by_x: bool, out: &mut Vec<Primitive>) {
    let mut points: Vec<Point> = group.rows.iter().filter_map(|r| ctx.point(r.x, r.y)).collect();
    if sort_by_x {
        points.sort_by(|a, b| a.x.total_cmp(&b.x));
    }
    if points.len() < 2 {
        return;
    }
    let style = ctx.style(Defaults { stroke: Some(Rgba::INK), fill: None, alpha: 1.0 }, &first_row(group), &group.key);
    out.push(Primitive::Polyline { points, style });
}

fn draw_bars(ctx: &DrawContext<'_>, group: &ComputedGroup, fraction: f32, out: &mut Vec<Primitive>) {
    for row in &group.rows {
        let Some((x0, x1)) = ctx.x_span(row, fraction) else { continue };
        let (Some(y0), Some(y1)) = (ctx.y_at(row.ymin.unwrap_or(0.0), 0.0), ctx.y_at(row.ymax.unwrap_or(row.y), 0.0))
        else {
            continue;
        };
        let style = ctx.style(Defaults { stroke: None, fill: Some(Rgba::AREA), alpha: 1.0 }, row, &group.key);
        out.push(Primitive::Rect { rect: Rect::from_corners(Point::new(x0, y0), Point::new(x1, y1)), style });
    }
}

fn draw_box(ctx: &DrawContext<'_>, group: &ComputedGroup, fraction: f32, outliers: bool, out: &mut Vec<Primitive>) {
    let (Some(Summary::Box(stats)), Some(row)) = (&group.summary, group.rows.first()) else {
        return;
    };
    let Some((x0, x1)) = ctx.x_span(row, fraction) else { return };
    let xc = (x0 + x1) / 2.0;
    let y = |v: f32| ctx.y_at(v, 0.0);
    let (Some(lower), Some(q1), Some(median), Some(q3), Some(upper)) =
        (y(stats.lower), y(stats.q1), y(stats.median), y(stats.q3), y(stats.upper))
    else {
        return;
    };

    let style = ctx.style(Defaults { stroke: Some(Rgba::INK), fill: Some(Rgba::WHITE), alpha: 1.0 }, row, &group.key);
    let parts = BoxWhisker {
        body: Rect::from_corners(Point::new(x0, q1), Point::new(x1, q3)),
        median: Segment::from_coords(x0, median, x1, median),
        lower_whisker: Segment::from_coords(xc, q1, xc, lower),
        upper_whisker: Segment::from_coords(xc, q3, xc, upper),
    };
    out.push(Primitive::BoxWhisker { parts, style });

    if outliers {
        for &value in &stats.outliers {
            if let Some(oy) = y(value) {
                out.push(ctx.marker(Point::new(xc, oy), row, &group.key));
            }
        }
    }
}

fn draw_violin(ctx: &DrawContext<'_>, group: &ComputedGroup, fraction: f32, style: ViolinStyle, out: &mut Vec<Primitive>) {
    let Some(first) = group.rows.first() else { return };
    let Some((x0, x1)) = ctx.x_span(first, fraction) else { return };
    let (xc, half) = ((x0 + x1) / 2.0, (x1 - x0).abs() / 2.0);

    let profile: Vec<(f32, f32)> = group
        .rows
        .iter()
        .filter_map(|r| Some((ctx.y_at(r.y, 0.0)?, r.scaled.unwrap_or(0.0) * half)))
        .collect();
    if profile.len() < 2 {
        return;
    }

    let (left, right) = match style {
        ViolinStyle::Full => (true, true),
        ViolinStyle::Left => (true, false),
        ViolinStyle::Right => (false, true),
    };
    let mut points: Vec<Point> =
        profile.iter().map(|&(y, w)| Point::new(if right { xc + w } else { xc }, y)).collect();
    points.extend(profile.iter().rev().map(|&(y, w)| Point::new(if left { xc - w } else { xc }, y)));

    let style = ctx.style(Defaults { stroke: Some(Rgba::INK), fill: Some(Rgba::WHITE), alpha: 1.0 }, first, &group.key);
    out.push(Primitive::Polygon { points, style });
}

fn draw_smooth(ctx: &DrawContext<'_>, group: &ComputedGroup, out: &mut Vec<Primitive>) {
    let row = first_row(group);
    let band: Vec<(Point, Point)> = group
        .rows
        .iter()
        .filter_map(|r| {
            let x = ctx.x_at(r.x, 0.0)?;
            Some((Point::new(x, ctx.y_at(r.ymax?, 0.0)?), Point::new(x, ctx.y_at(r.ymin?, 0.0)?)))
        })
        .collect();
    if band.len() >= 2 {
        let style = ctx.style(Defaults { stroke: None, fill: Some(Rgba::GREY), alpha: 0.4 }, &row, &group.key);
        let (upper, lower) = band.into_iter().unzip();
        out.push(Primitive::Ribbon { upper, lower, style: Style { stroke: None, ..style } });
    }

    let points: Vec<Point> = group.rows.iter().filter_map(|r| ctx.point(r.x, r.y)).collect();
    if points.len() >= 2 {
        let mut style = ctx.style(Defaults { stroke: Some(Rgba::SMOOTH), fill: None, alpha: 1.0 }, &row, &group.key);
        style.fill = None;
        out.push(Primitive::Polyline { points, style });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScaleConfig;
    use crate::grammar::aes::Aes;
    use crate::grammar::data::DataFrame;
    use crate::grammar::facet::ScalesPolicy;
    use crate::grammar::scales::{DomainSet, LevelKey, ScaleManager};
    use crate::grammar::stat::BoxStats;
    use approx::assert_relative_eq;

    fn continuous_scales() -> TrainedScales {
        let mut set = DomainSet::new();
        set.register_domain(Channel::X, &[0.0, 10.0], false).unwrap();
        set.register_domain(Channel::Y, &[0.0, 10.0], false).unwrap();
        ScaleManager::default().finalize(&[set], ScalesPolicy::Fixed, &ScaleConfig::default()).unwrap()
    }

    fn discrete_x_scales() -> TrainedScales {
        let mut set = DomainSet::new();
        set.register_level(Channel::X, "a", LevelKey::observed(0, 0)).unwrap();
        set.register_level(Channel::X, "b", LevelKey::observed(0, 1)).unwrap();
        set.register_domain(Channel::Y, &[0.0, 10.0], false).unwrap();
        ScaleManager::default().finalize(&[set], ScalesPolicy::Fixed, &ScaleConfig::default()).unwrap()
    }

    fn context<'a>(
        scales: &'a TrainedScales,
        aes: &'a ResolvedAes,
        fixed: &'a FixedAes,
        config: &'a GeomConfig,
        x_levels: Option<&'a [String]>,
    ) -> DrawContext<'a> {
        DrawContext {
            x: &scales.panels[0].x,
            y: &scales.panels[0].y,
            width: 110.0,
            height: 110.0,
            x_levels,
            y_levels: None,
            aes,
            fixed,
            scales,
            config,
        }
    }

    fn empty_aes() -> ResolvedAes {
        ResolvedAes::resolve(&Aes::new(), &FixedAes::new(), &DataFrame::new()).unwrap()
    }

    fn group(rows: Vec<ComputedRow>) -> StatOutput {
        StatOutput { groups: vec![ComputedGroup { key: GroupKey::default(), rows, summary: None }], ..StatOutput::default() }
    }

    #[test]
    fn test_from_name() {
        assert_eq!(Geom::from_name("col", &Params::new()).unwrap(), Geom::bar());
        let violin = Geom::from_name("violin", &Params::new().with("style", "left")).unwrap();
        assert_eq!(violin, Geom::violin().style(ViolinStyle::Left));
        assert!(matches!(Geom::from_name("area", &Params::new()), Err(Error::UnknownName { kind: "geom", .. })));
        assert!(Geom::from_name("bar", &Params::new().with("width", -1.0)).is_err());
    }

    #[test]
    fn test_shape_parse() {
        assert_eq!("Triangle".parse::<PointShape>().unwrap(), PointShape::Triangle);
        assert!("star".parse::<PointShape>().is_err());
    }

    #[test]
    fn test_bar_setup_from_zero() {
        let mut out = group(vec![ComputedRow::at(Pos::Continuous(1.0), 3.0), ComputedRow::at(Pos::Continuous(2.0), 5.0)]);
        Geom::bar().setup(&mut out, &GeomConfig::default());
        let row = out.groups[0].rows[1];
        assert_eq!((row.ymin, row.ymax), (Some(0.0), Some(5.0)));
        assert_relative_eq!(row.xmin.unwrap(), 1.55);
        assert_relative_eq!(row.xmax.unwrap(), 2.45);
    }

    #[test]
    fn test_jitter_is_deterministic_and_bounded() {
        let rows: Vec<ComputedRow> =
            (0..50).map(|i| ComputedRow { source: Some(i), ..ComputedRow::at(Pos::Discrete(0), i as f32) }).collect();
        let mut a = group(rows.clone());
        let mut b = group(rows);
        Geom::jitter().setup(&mut a, &GeomConfig::default());
        Geom::jitter().setup(&mut b, &GeomConfig::default());
        assert_eq!(a, b);
        assert!(a.groups[0].rows.iter().all(|r| r.dx.abs() <= 0.4 && r.dy.abs() <= 0.4));
        assert!(a.groups[0].rows.iter().any(|r| r.dx != 0.0));
    }

    #[test]
    fn test_line_sorts_path_keeps_order() {
        let scales = continuous_scales();
        let (aes, fixed, config) = (empty_aes(), FixedAes::new(), GeomConfig::default());
        let ctx = context(&scales, &aes, &fixed, &config, None);
        let out = group(vec![
            ComputedRow::at(Pos::Continuous(5.0), 1.0),
            ComputedRow::at(Pos::Continuous(0.0), 2.0),
            ComputedRow::at(Pos::Continuous(10.0), 3.0),
        ]);
        let xs = |prims: Vec<Primitive>| match &prims[0] {
            Primitive::Polyline { points, .. } => points.iter().map(|p| p.x.round()).collect::<Vec<_>>(),
            _ => Vec::new(),
        };
        assert_eq!(xs(Geom::line().draw(&ctx, &out)), vec![5.0, 55.0, 105.0]);
        assert_eq!(xs(Geom::path().draw(&ctx, &out)), vec![55.0, 5.0, 105.0]);
    }

    #[test]
    fn test_discrete_bar_width() {
        let scales = discrete_x_scales();
        let (aes, fixed, config) = (empty_aes(), FixedAes::new(), GeomConfig::default());
        let levels = vec!["a".to_string(), "b".to_string()];
        let ctx = context(&scales, &aes, &fixed, &config, Some(&levels));
        let mut out = group(vec![ComputedRow::at(Pos::Discrete(1), 4.0)]);
        Geom::bar().setup(&mut out, &config);
        let prims = Geom::bar().draw(&ctx, &out);
        let Primitive::Rect { rect, style } = &prims[0] else { panic!("expected rect") };
        // Range 0.4..2.6 over 110 units: 50 units per level.
        assert_relative_eq!(rect.width, 45.0, epsilon = 1e-3);
        assert_relative_eq!(rect.x + rect.width / 2.0, 80.0, epsilon = 1e-3);
        assert_eq!(style.fill, Some(Rgba::AREA));
    }

    #[test]
    fn test_box_and_outliers() {
        let scales = discrete_x_scales();
        let (aes, fixed, config) = (empty_aes(), FixedAes::new(), GeomConfig::default());
        let levels = vec!["a".to_string(), "b".to_string()];
        let ctx = context(&scales, &aes, &fixed, &config, Some(&levels));
        let stats = BoxStats::from_data(&[1.0, 2.0, 3.0, 4.0, 5.0, 9.5], 1.5).unwrap();
        let out = StatOutput {
            groups: vec![ComputedGroup {
                key: GroupKey::default(),
                rows: vec![ComputedRow::at(Pos::Discrete(0), stats.median)],
                summary: Some(Summary::Box(stats)),
            }],
            ..StatOutput::default()
        };
        let prims = Geom::boxplot().draw(&ctx, &out);
        assert_eq!(prims.len(), 2);
        assert_eq!(prims[0].kind(), "box_whisker");
        assert_eq!(prims[1].kind(), "marker");
        assert_eq!(Geom::boxplot().outliers(false).draw(&ctx, &out).len(), 1);
    }

    #[test]
    fn test_half_violin_closes_on_centre() {
        let scales = discrete_x_scales();
        let (aes, fixed, config) = (empty_aes(), FixedAes::new(), GeomConfig::default());
        let levels = vec!["a".to_string(), "b".to_string()];
        let ctx = context(&scales, &aes, &fixed, &config, Some(&levels));
        let rows = (0..5)
            .map(|i| ComputedRow { scaled: Some(if i == 2 { 1.0 } else { 0.5 }), ..ComputedRow::at(Pos::Discrete(0), i as f32 * 2.0) })
            .collect();
        let out = group(rows);

        let Primitive::Polygon { points, .. } = &Geom::violin().draw(&ctx, &out)[0] else { panic!("expected polygon") };
        assert_eq!(points.len(), 10);
        let centre = 30.0;
        assert_relative_eq!(points[2].x - centre, centre - points[7].x, epsilon = 1e-3);

        let left = Geom::violin().style(ViolinStyle::Left).draw(&ctx, &out);
        let Primitive::Polygon { points, .. } = &left[0] else { panic!("expected polygon") };
        assert!(points.iter().all(|p| p.x <= centre + 1e-3));
    }

    #[test]
    fn test_smooth_emits_ribbon_then_line() {
        let scales = continuous_scales();
        let (aes, fixed, config) = (empty_aes(), FixedAes::new(), GeomConfig::default());
        let ctx = context(&scales, &aes, &fixed, &config, None);
        let rows = (0..5)
            .map(|i| {
                let x = i as f32 * 2.0;
                ComputedRow { ymin: Some(x - 1.0), ymax: Some(x + 1.0), ..ComputedRow::at(Pos::Continuous(x), x) }
            })
            .collect();
        let prims = Geom::smooth().draw(&ctx, &group(rows));
        let kinds: Vec<&str> = prims.iter().map(Primitive::kind).collect();
        assert_eq!(kinds, vec!["ribbon", "polyline"]);
        assert_eq!(prims[1].style().stroke, Some(Rgba::SMOOTH));
    }
}
