//! Grammar of Graphics implementation.
//!
//! Provides declarative, layered plot specification based on Wilkinson's
//! Grammar of Graphics [Wilkinson 2005] and its layered form [Wickham 2010].
//! A plot renders to a renderer-agnostic [`Scene`].
//!
//! # Components
//!
//! - **Data**: Immutable, column-shared tables and computed expressions
//! - **Aesthetics**: Mappings from data to visual channels (x, y, colour, fill, shape, size, alpha, group)
//! - **Statistics**: Data transformations (identity, count, bin, boxplot, density, smooth)
//! - **Geometries**: Marks (point, jitter, line, path, bar, histogram, freqpoly, boxplot, violin, smooth)
//! - **Scales**: Two-pass domain discovery and finalization, with axes and legends
//! - **Facets**: Small multiples by wrap or grid
//!
//! # Example
//!
//! ```rust
//! use trueno_gg::grammar::*;
//!
//! let mut data = DataFrame::new();
//! data.add_column_f32("displ", &[1.8, 2.8, 4.2]).unwrap();
//! data.add_column_f32("hwy", &[29.0, 26.0, 20.0]).unwrap();
//!
//! let scene = GGPlot::new(data, Aes::xy("displ", "hwy"))
//!     .geom(Geom::point())
//!     .render()
//!     .unwrap();
//! assert_eq!(scene.primitive_count(), 3);
//! ```
//!
//! # References
//!
//! - Wilkinson, L. (2005). *The Grammar of Graphics*. Springer.
//! - Wickham, H. (2010). "A Layered Grammar of Graphics." Journal of Computational
//!   and Graphical Statistics.

mod aes;
mod compositor;
mod data;
mod expr;
mod facet;
mod geom;
mod ggplot;
mod guide;
mod layer;
mod scales;
mod scene;
mod series;
mod stat;

pub use aes::{Aes, Channel, FixedAes, ResolvedAes, ResolvedChannel};
pub use data::{
    datetime_to_days, days_to_datetime, format_number, Column, ColumnKind, ColumnSource, DataFrame, DataValue,
};
pub use expr::Expr;
pub use facet::{grid_shape, partition, partition_all, wrap_dims, FacetSpec, Panel, ScalesPolicy};
pub use geom::{Geom, PointShape, ViolinStyle};
pub use ggplot::GGPlot;
pub use guide::{axis, breaks, legend, nice_breaks, nice_step, Axis, Legend, LegendEntry, LegendKind, Tick};
pub use layer::{Layer, LayerConfig, ParamValue, Params};
pub use scales::{
    AestheticScale, Domain, DomainSet, LevelKey, PanelScales, PositionScale, ScaleInput, ScaleKind, ScaleManager,
    ScaleSpec, TrainedScales, ALPHA_RANGE, SIZE_RANGE,
};
pub use scene::{
    BoxWhisker, Diagnostic, Labels, LayerScene, PanelContent, PanelScene, Primitive, Scene, SceneLayout, Severity,
    Style,
};
pub use series::Series;
pub use stat::{
    bin_edges, bin_index, nrd0_bandwidth, BinParams, BoxStats, BoxplotParams, ComputedGroup, ComputedRow, DensityParams,
    GroupKey, Pos, SmoothParams, Stat, StatContext, StatOutput, Summary,
};
