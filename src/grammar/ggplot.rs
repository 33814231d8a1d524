//! Main GGPlot builder.
//!
//! Combines data, mappings, layers, facets and scale overrides into a plot
//! that renders to a [`Scene`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::config::RenderConfig;
use crate::error::Result;
use crate::fit::{CurveFitter, DefaultFitter};

use super::aes::{Aes, Channel};
use super::compositor::{self, PlotParts};
use super::data::DataFrame;
use super::facet::FacetSpec;
use super::geom::Geom;
use super::layer::{Layer, LayerConfig};
use super::scales::ScaleSpec;
use super::scene::{Labels, Scene};

/// Grammar of Graphics plot builder.
///
/// A plot is a plain value: building it does no work, and [`GGPlot::render`]
/// can be called any number of times.
#[derive(Clone)]
pub struct GGPlot {
    /// Plot data.
    data: DataFrame,
    /// Plot-level aesthetic mappings.
    aes: Aes,
    /// Layers in drawing order.
    layers: Vec<Layer>,
    /// Faceting.
    facet: Option<FacetSpec>,
    /// Per-channel scale overrides.
    scales: HashMap<Channel, ScaleSpec>,
    /// Title and axis labels.
    labels: Labels,
    /// Render settings.
    config: RenderConfig,
    /// Curve fitter used by smoothing stats.
    fitter: Arc<dyn CurveFitter>,
}

impl fmt::Debug for GGPlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GGPlot")
            .field("data", &self.data)
            .field("aes", &self.aes)
            .field("layers", &self.layers)
            .field("facet", &self.facet)
            .field("scales", &self.scales)
            .field("labels", &self.labels)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl GGPlot {
    /// Create a new plot from data and plot-level mappings.
    #[must_use]
    pub fn new(data: DataFrame, aes: Aes) -> Self {
        Self {
            data,
            aes,
            layers: Vec::new(),
            facet: None,
            scales: HashMap::new(),
            labels: Labels::default(),
            config: RenderConfig::default(),
            fitter: Arc::new(DefaultFitter),
        }
    }

    /// Add a geometry layer with its default stat.
    #[must_use]
    pub fn geom(mut self, geom: Geom) -> Self {
        self.layers.push(Layer::new(geom));
        self
    }

    /// Add a layer.
    #[must_use]
    pub fn layer(mut self, layer: Layer) -> Self {
        self.add_layer(layer);
        self
    }

    /// Add a layer built from names.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown names or bad parameters.
    pub fn layer_config(mut self, config: LayerConfig) -> Result<Self> {
        self.add_layer(Layer::from_config(config)?);
        Ok(self)
    }

    /// Set faceting.
    #[must_use]
    pub fn facet(mut self, facet: FacetSpec) -> Self {
        self.add_facet(facet);
        self
    }

    /// Wrap panels by the variables of a formula such as `"~class"`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidExpression`] for malformed formulas.
    pub fn facet_formula(self, formula: &str) -> Result<Self> {
        Ok(self.facet(FacetSpec::parse(formula)?))
    }

    /// Override the scale of a channel.
    #[must_use]
    pub fn scale(mut self, channel: Channel, spec: ScaleSpec) -> Self {
        self.scales.insert(channel, spec);
        self
    }

    /// Set the title.
    #[must_use]
    pub fn title(mut self, title: &str) -> Self {
        self.labels.title = Some(title.to_string());
        self
    }

    /// Set the x-axis label.
    #[must_use]
    pub fn xlab(mut self, label: &str) -> Self {
        self.labels.x = Some(label.to_string());
        self
    }

    /// Set the y-axis label.
    #[must_use]
    pub fn ylab(mut self, label: &str) -> Self {
        self.labels.y = Some(label.to_string());
        self
    }

    /// Set render settings.
    #[must_use]
    pub fn config(mut self, config: RenderConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the curve fitter.
    #[must_use]
    pub fn fitter(mut self, fitter: Arc<dyn CurveFitter>) -> Self {
        self.fitter = fitter;
        self
    }

    /// Append a layer in place.
    pub fn add_layer(&mut self, layer: Layer) {
        self.layers.push(layer);
    }

    /// Set faceting in place, replacing any previous facet.
    pub fn add_facet(&mut self, facet: FacetSpec) {
        self.facet = Some(facet);
    }

    /// Layers in drawing order.
    #[must_use]
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Render the plot to a scene graph.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::EmptyData`] when the plot has no layers, and
    /// every mapping, stat and scale error found during discovery
    /// (as [`crate::Error::Discovery`] when there are several).
    pub fn render(&self) -> Result<Scene> {
        compositor::render(&PlotParts {
            data: &self.data,
            mapping: &self.aes,
            layers: &self.layers,
            facet: self.facet.as_ref(),
            scales: &self.scales,
            labels: &self.labels,
            config: &self.config,
            fitter: self.fitter.as_ref(),
        })
    }
}
