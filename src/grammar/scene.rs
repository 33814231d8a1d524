//! Renderer-agnostic scene graph.
//!
//! A [`Scene`] is the only output of rendering: panels holding primitive
//! marks in panel-local visual coordinates, axes, legends and diagnostics.
//! Everything is plain data and serializable, so a backend can live in
//! another process.

use serde::{Deserialize, Serialize};

use crate::color::Rgba;
use crate::geometry::{Point, Rect, Segment};

use super::geom::PointShape;
use super::guide::{Axis, Legend};

/// Resolved drawing style of a primitive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Style {
    /// Outline or line colour.
    pub stroke: Option<Rgba>,
    /// Fill colour.
    pub fill: Option<Rgba>,
    /// Outline or line width.
    pub stroke_width: f32,
    /// Opacity in `[0, 1]`.
    pub alpha: f32,
}

impl Default for Style {
    fn default() -> Self {
        Self { stroke: Some(Rgba::INK), fill: None, stroke_width: 1.0, alpha: 1.0 }
    }
}

/// Box, median and whiskers of one boxplot group.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoxWhisker {
    /// Interquartile box.
    pub body: Rect,
    /// Median line across the box.
    pub median: Segment,
    /// Whisker from the lower hinge down.
    pub lower_whisker: Segment,
    /// Whisker from the upper hinge up.
    pub upper_whisker: Segment,
}

/// A terminal mark in panel-local visual coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Primitive {
    /// A point marker.
    Marker {
        /// Marker centre.
        center: Point,
        /// Marker shape.
        shape: PointShape,
        /// Marker diameter.
        size: f32,
        /// Style.
        style: Style,
    },
    /// Connected line through points.
    Polyline {
        /// Vertices in drawing order.
        points: Vec<Point>,
        /// Style.
        style: Style,
    },
    /// Straight segment.
    Segment {
        /// The segment.
        segment: Segment,
        /// Style.
        style: Style,
    },
    /// Axis-aligned rectangle.
    Rect {
        /// The rectangle.
        rect: Rect,
        /// Style.
        style: Style,
    },
    /// Closed polygon.
    Polygon {
        /// Vertices; the last connects back to the first.
        points: Vec<Point>,
        /// Style.
        style: Style,
    },
    /// Band between an upper and lower line sharing x positions.
    Ribbon {
        /// Upper boundary, left to right.
        upper: Vec<Point>,
        /// Lower boundary, left to right.
        lower: Vec<Point>,
        /// Style.
        style: Style,
    },
    /// Composite box and whiskers.
    BoxWhisker {
        /// Geometry.
        parts: BoxWhisker,
        /// Style.
        style: Style,
    },
}

impl Primitive {
    /// Style of any primitive.
    #[must_use]
    pub fn style(&self) -> &Style {
        match self {
            Primitive::Marker { style, .. }
            | Primitive::Polyline { style, .. }
            | Primitive::Segment { style, .. }
            | Primitive::Rect { style, .. }
            | Primitive::Polygon { style, .. }
            | Primitive::Ribbon { style, .. }
            | Primitive::BoxWhisker { style, .. } => style,
        }
    }

    /// Short kind name.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Primitive::Marker { .. } => "marker",
            Primitive::Polyline { .. } => "polyline",
            Primitive::Segment { .. } => "segment",
            Primitive::Rect { .. } => "rect",
            Primitive::Polygon { .. } => "polygon",
            Primitive::Ribbon { .. } => "ribbon",
            Primitive::BoxWhisker { .. } => "box_whisker",
        }
    }
}

/// Primitives emitted by one layer in one panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerScene {
    /// Layer index in declaration order.
    pub layer: usize,
    /// Geom name.
    pub geom: String,
    /// Marks in drawing order.
    pub primitives: Vec<Primitive>,
}

/// What a panel holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PanelContent {
    /// Rendered marks and axes.
    Rendered {
        /// Layers in drawing order.
        layers: Vec<LayerScene>,
        /// Horizontal axis.
        x_axis: Axis,
        /// Vertical axis.
        y_axis: Axis,
    },
    /// The panel could not be rendered.
    Failed {
        /// Why.
        message: String,
    },
}

/// One facet cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelScene {
    /// Panel order.
    pub index: usize,
    /// Grid row.
    pub row: usize,
    /// Grid column.
    pub col: usize,
    /// Strip labels (facet levels).
    pub strip: Vec<String>,
    /// Panel area in plot coordinates.
    pub bounds: Rect,
    /// Content.
    pub content: PanelContent,
}

impl PanelScene {
    /// Layers of a rendered panel; empty when failed.
    #[must_use]
    pub fn layers(&self) -> &[LayerScene] {
        match &self.content {
            PanelContent::Rendered { layers, .. } => layers,
            PanelContent::Failed { .. } => &[],
        }
    }

    /// Every primitive of the panel in drawing order.
    pub fn primitives(&self) -> impl Iterator<Item = &Primitive> {
        self.layers().iter().flat_map(|l| l.primitives.iter())
    }

    /// `true` when the panel failed to render.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self.content, PanelContent::Failed { .. })
    }
}

/// Panel grid geometry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SceneLayout {
    /// Grid rows.
    pub nrow: usize,
    /// Grid columns.
    pub ncol: usize,
    /// Width of each panel.
    pub panel_width: f32,
    /// Height of each panel.
    pub panel_height: f32,
    /// Gap between panels.
    pub spacing: f32,
}

impl SceneLayout {
    /// Bounds of the panel at `(row, col)`.
    #[must_use]
    pub fn bounds(&self, row: usize, col: usize) -> Rect {
        Rect::new(
            col as f32 * (self.panel_width + self.spacing),
            row as f32 * (self.panel_height + self.spacing),
            self.panel_width,
            self.panel_height,
        )
    }
}

/// Plot-level labels.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Labels {
    /// Plot title.
    pub title: Option<String>,
    /// X axis title.
    pub x: Option<String>,
    /// Y axis title.
    pub y: Option<String>,
}

/// Severity of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Informational (removed rows, dropped values).
    Info,
    /// Something was not drawn.
    Warning,
}

/// A non-fatal event recorded while rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Severity.
    pub severity: Severity,
    /// Layer index, if layer-specific.
    pub layer: Option<usize>,
    /// Panel index, if panel-specific.
    pub panel: Option<usize>,
    /// Message.
    pub message: String,
}

/// The complete rendered plot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    /// Labels.
    pub labels: Labels,
    /// Grid geometry.
    pub layout: SceneLayout,
    /// Panels in order.
    pub panels: Vec<PanelScene>,
    /// Legends, one per mapped non-positional channel.
    pub legends: Vec<Legend>,
    /// Non-fatal events.
    pub diagnostics: Vec<Diagnostic>,
}

impl Scene {
    /// Total number of primitives across all panels.
    #[must_use]
    pub fn primitive_count(&self) -> usize {
        self.panels.iter().map(|p| p.primitives().count()).sum()
    }

    /// Warnings only.
    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.severity == Severity::Warning)
    }

    /// Serialize to YAML.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Config`] if serialization fails.
    pub fn to_yaml(&self) -> crate::Result<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_bounds() {
        let layout = SceneLayout { nrow: 2, ncol: 3, panel_width: 100.0, panel_height: 50.0, spacing: 10.0 };
        assert_eq!(layout.bounds(0, 0), Rect::new(0.0, 0.0, 100.0, 50.0));
        assert_eq!(layout.bounds(1, 2), Rect::new(220.0, 60.0, 100.0, 50.0));
    }

    #[test]
    fn test_primitive_yaml() {
        let marker = Primitive::Marker {
            center: Point::new(1.0, 2.0),
            shape: PointShape::Circle,
            size: 4.0,
            style: Style::default(),
        };
        let yaml = serde_yaml_ng::to_string(&marker).unwrap();
        assert!(yaml.contains("kind: marker"));
        let back: Primitive = serde_yaml_ng::from_str(&yaml).unwrap();
        assert_eq!(back, marker);
        assert_eq!(back.kind(), "marker");
    }

    #[test]
    fn test_failed_panel_has_no_primitives() {
        let panel = PanelScene {
            index: 0,
            row: 0,
            col: 0,
            strip: Vec::new(),
            bounds: Rect::default(),
            content: PanelContent::Failed { message: "boom".into() },
        };
        assert!(panel.is_failed());
        assert_eq!(panel.primitives().count(), 0);
    }
}
