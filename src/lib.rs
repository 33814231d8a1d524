//! # Trueno-GG
//!
//! Layered grammar-of-graphics engine producing a renderer-agnostic scene graph.
//!
//! Built on the [trueno](https://crates.io/crates/trueno) core library for column
//! reductions, trueno-gg resolves data, aesthetic mappings, statistical
//! transformations, scales and facets into a serializable [`grammar::Scene`]
//! of primitive marks. Rasterization and file export are left to backends.
//!
//! ## Features
//!
//! - **Layered Grammar**: Data, aesthetics, stats, geoms, scales and facets compose freely
//! - **Two-Pass Scales**: Domains are discovered across every layer and panel before drawing
//! - **Deterministic**: Level order and jitter never depend on processing order
//! - **Serializable Output**: Scenes are plain `serde` data
//!
//! ## Quick Start
//!
//! ```rust
//! use trueno_gg::prelude::*;
//!
//! let mut data = DataFrame::new();
//! data.add_column_f32("displ", &[1.8, 2.8, 4.2, 5.7]).unwrap();
//! data.add_column_f32("hwy", &[29.0, 26.0, 20.0, 17.0]).unwrap();
//! data.add_column_str("drv", &["f", "f", "4", "r"]).unwrap();
//!
//! let scene = GGPlot::new(data, Aes::xy("displ", "hwy").colour("drv"))
//!     .geom(Geom::point())
//!     .facet(FacetSpec::wrap("drv"))
//!     .render()
//!     .unwrap();
//!
//! assert_eq!(scene.panels.len(), 3);
//! assert_eq!(scene.legends[0].labels(), vec!["f", "4", "r"]);
//! ```
//!
//! ## Feature Flags
//!
//! - `parallel`: Run the discovery and render passes with rayon
//! - `telemetry`: Default `tracing` subscriber via [`telemetry::init_default_tracing`]
//!
//! ## Academic References
//!
//! - Wilkinson, L. (2005). *The Grammar of Graphics*. Springer.
//! - Wickham, H. (2010). "A Layered Grammar of Graphics." JCGS 19(1).
//! - Cleveland, W. S. (1979). "Robust Locally Weighted Regression and Smoothing Scatterplots." JASA.
//! - Silverman, B. W. (1986). *Density Estimation for Statistics and Data Analysis*.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
// Allow unwrap() in tests only - banned in production code (Cloudflare incident 2025-11-18)
#![cfg_attr(test, allow(clippy::unwrap_used))]
// Allow common patterns in numeric plotting code
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::many_single_char_names)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::similar_names)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Core Modules
// ============================================================================

/// Color types and palettes.
pub mod color;

/// Geometric primitives (points, segments, rectangles).
pub mod geometry;

/// Scale functions for data-to-visual mappings.
pub mod scale;

/// Column reductions shared by stats and scales.
pub mod numeric;

// ============================================================================
// Grammar Modules
// ============================================================================

/// Grammar of Graphics implementation.
pub mod grammar;

/// Curve fitting used by the smoothing stat.
pub mod fit;

// ============================================================================
// Configuration and Diagnostics
// ============================================================================

/// Render configuration.
pub mod config;

/// Tracing subscriber setup.
pub mod telemetry;

// ============================================================================
// Error Types
// ============================================================================

/// Error types for trueno-gg operations.
pub mod error;

pub use error::{Error, Result};

// ============================================================================
// Prelude
// ============================================================================

/// Commonly used types and traits for convenient imports.
///
/// ```rust
/// use trueno_gg::prelude::*;
/// ```
pub mod prelude {
    pub use crate::color::{Hsla, Rgba};
    pub use crate::config::RenderConfig;
    pub use crate::error::{Error, Result};
    pub use crate::fit::{CurveFitter, DefaultFitter, FitMethod, FittedCurve, Prediction};
    pub use crate::geometry::{Point, Rect, Segment};
    pub use crate::grammar::{
        Aes, Channel, DataFrame, FacetSpec, FixedAes, GGPlot, Geom, Layer, LayerConfig, Params, PointShape, Primitive,
        ScaleSpec, ScalesPolicy, Scene, Stat,
    };
    pub use crate::scale::{Scale, Transform};
}

// ============================================================================
// Re-exports
// ============================================================================

/// Re-export trueno for direct access to SIMD operations.
pub use trueno;
