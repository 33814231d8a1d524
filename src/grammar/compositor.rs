//! Two-pass layer composition.
//!
//! The discovery pass runs every (panel, layer) pair through its stat and
//! geom setup and records what it saw in a [`DomainSet`]. Per-panel sets are
//! merged and finalized into read-only scales. The render pass then draws
//! each panel against those scales. With the `parallel` feature both passes
//! run on rayon; results are collected in work-item order either way.

use std::collections::{BTreeMap, BTreeSet, HashMap};

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use tracing::{debug, trace, warn};

use crate::config::RenderConfig;
use crate::error::{Error, Result};
use crate::fit::{CurveFitter, FitMethod};

use super::aes::{Aes, Channel, ResolvedAes};
use super::data::DataFrame;
use super::facet::{grid_shape, partition_all, FacetSpec, Panel, ScalesPolicy};
use super::geom::DrawContext;
use super::guide;
use super::layer::Layer;
use super::scales::{DomainSet, LevelKey, ScaleManager, ScaleSpec, TrainedScales};
use super::scene::{
    Diagnostic, Labels, LayerScene, PanelContent, PanelScene, Primitive, Scene, SceneLayout, Severity,
};
use super::series::Series;
use super::stat::{Pos, Stat, StatContext, StatOutput, Summary};

/// Everything the compositor needs from a plot.
pub(crate) struct PlotParts<'a> {
    pub data: &'a DataFrame,
    pub mapping: &'a Aes,
    pub layers: &'a [Layer],
    pub facet: Option<&'a FacetSpec>,
    pub scales: &'a HashMap<Channel, ScaleSpec>,
    pub labels: &'a Labels,
    pub config: &'a RenderConfig,
    pub fitter: &'a dyn CurveFitter,
}

/// A layer with its data chosen and mapping resolved.
struct PreparedLayer<'a> {
    index: usize,
    layer: &'a Layer,
    data: &'a DataFrame,
    aes: ResolvedAes,
    /// First data row of every level, per discrete channel.
    first_rows: BTreeMap<Channel, Vec<usize>>,
}

impl PreparedLayer<'_> {
    fn register_level(&self, set: &mut DomainSet, channel: Channel, code: u32) -> Result<()> {
        let Some(Series::Discrete { levels, declared, .. }) = self.aes.series(channel) else {
            return Ok(());
        };
        let Some(label) = levels.get(code as usize) else {
            return Ok(());
        };
        let key = if *declared {
            LevelKey::declared(self.index, code as usize)
        } else {
            let row = self.first_rows.get(&channel).and_then(|rows| rows.get(code as usize)).copied();
            LevelKey::observed(self.index, row.unwrap_or(usize::MAX))
        };
        set.register_level(channel, label, key)
    }

    /// Discrete y rows carry level codes only under the identity stat.
    fn y_is_code(&self) -> bool {
        self.layer.stat == Stat::Identity && self.aes.is_discrete(Channel::Y)
    }

    fn y_levels(&self) -> Option<&[String]> {
        if self.y_is_code() {
            self.aes.series(Channel::Y).and_then(Series::levels)
        } else {
            None
        }
    }
}

/// Result of one discovery work item.
struct Discovered {
    panel: usize,
    layer: usize,
    /// Position of the layer in the prepared list.
    slot: usize,
    output: StatOutput,
    domains: DomainSet,
}

#[cfg(feature = "parallel")]
fn map_items<T: Sync, R: Send>(items: &[T], f: impl Fn(&T) -> R + Sync + Send) -> Vec<R> {
    items.par_iter().map(f).collect()
}

#[cfg(not(feature = "parallel"))]
fn map_items<T, R>(items: &[T], f: impl Fn(&T) -> R) -> Vec<R> {
    items.iter().map(f).collect()
}

/// Flatten, deduplicate and combine errors; `None` when there are none.
fn combine_errors(errors: Vec<Error>) -> Option<Error> {
    let mut unique: Vec<Error> = Vec::new();
    for err in errors.into_iter().flat_map(Error::into_leaves) {
        if !unique.contains(&err) {
            unique.push(err);
        }
    }
    match unique.len() {
        0 => None,
        1 => unique.pop(),
        _ => Some(Error::Discovery(unique)),
    }
}

fn first_rows(aes: &ResolvedAes) -> BTreeMap<Channel, Vec<usize>> {
    aes.channels()
        .filter_map(|(channel, resolved)| match &resolved.series {
            Series::Discrete { codes, levels, .. } => {
                let mut first = vec![usize::MAX; levels.len()];
                for (row, &code) in codes.iter().enumerate() {
                    if let Some(slot) = first.get_mut(code as usize) {
                        *slot = (*slot).min(row);
                    }
                }
                Some((channel, first))
            }
            Series::Continuous { .. } => None,
        })
        .collect()
}

/// Render a plot into a scene.
///
/// # Errors
///
/// Returns every mapping, stat and scale error found during discovery,
/// as [`Error::Discovery`] when there is more than one. A layer whose
/// mapping fails to resolve sits out discovery; the other layers still run
/// so their errors are reported alongside.
pub(crate) fn render(plot: &PlotParts<'_>) -> Result<Scene> {
    if plot.layers.is_empty() {
        return Err(Error::EmptyData);
    }
    let mut errors = Vec::new();
    let layers = prepare(plot, &mut errors);

    let mut datasets = vec![plot.data];
    datasets.extend(plot.layers.iter().filter_map(|l| l.data.as_ref()));
    let panels = match partition_all(&datasets, plot.facet) {
        Ok(panels) => panels,
        Err(err) => {
            errors.push(err);
            return Err(combine_errors(errors).unwrap_or(Error::EmptyData));
        }
    };
    let policy = plot.facet.map_or(ScalesPolicy::Fixed, FacetSpec::policy);
    debug!(panels = panels.len(), layers = layers.len(), "starting discovery pass");

    let items: Vec<(usize, usize)> =
        (0..panels.len()).flat_map(|p| (0..layers.len()).map(move |l| (p, l))).collect();
    let results = map_items(&items, |&(p, l)| discover(plot, &panels[p], &layers[l], l));

    let mut discovered = Vec::with_capacity(results.len());
    for result in results {
        match result {
            Ok(found) => discovered.push(found),
            Err(err) => errors.push(err),
        }
    }

    let mut panel_domains = vec![DomainSet::new(); panels.len()];
    for found in &discovered {
        let slot = &mut panel_domains[found.panel];
        match std::mem::take(slot).merge(found.domains.clone()) {
            Ok(merged) => *slot = merged,
            Err(err) => errors.push(err),
        }
    }

    let manager = ScaleManager::new(plot.scales.clone(), titles(plot.labels, &layers));
    let finalized = manager.finalize(&panel_domains, policy, &plot.config.scales);
    let scales = match finalized {
        Ok(scales) if errors.is_empty() => scales,
        Ok(_) => return Err(combine_errors(errors).unwrap_or(Error::EmptyData)),
        Err(err) => {
            errors.push(err);
            return Err(combine_errors(errors).unwrap_or(Error::EmptyData));
        }
    };

    let diagnostics = diagnostics(&layers, &discovered);
    debug!(aesthetics = scales.aesthetics.len(), "scales finalized, starting render pass");

    let panel_scenes = map_items(&panels, |panel| {
        let content = render_panel(plot, panel, &layers, &discovered, &scales).unwrap_or_else(|err| {
            warn!(panel = panel.index, error = %err, "panel failed to render");
            PanelContent::Failed { message: err.to_string() }
        });
        (panel.index, content)
    });

    let (nrow, ncol) = grid_shape(&panels);
    let layout = SceneLayout {
        nrow,
        ncol,
        panel_width: plot.config.layout.panel_width,
        panel_height: plot.config.layout.panel_height,
        spacing: plot.config.layout.panel_spacing,
    };
    let panels = panel_scenes
        .into_iter()
        .map(|(index, content)| {
            let panel = &panels[index];
            PanelScene {
                index,
                row: panel.row,
                col: panel.col,
                strip: panel.strip(),
                bounds: layout.bounds(panel.row, panel.col),
                content,
            }
        })
        .collect();

    let legends =
        scales.aesthetics.values().map(|scale| guide::legend(scale, plot.config.scales.axis_breaks)).collect();
    let labels = Labels {
        title: plot.labels.title.clone(),
        x: scales.panels.first().map(|p| p.x.title.clone()),
        y: scales.panels.first().map(|p| p.y.title.clone()),
    };
    Ok(Scene { labels, layout, panels, legends, diagnostics })
}

fn prepare<'a>(plot: &PlotParts<'a>, errors: &mut Vec<Error>) -> Vec<PreparedLayer<'a>> {
    let mut prepared = Vec::with_capacity(plot.layers.len());
    for (index, layer) in plot.layers.iter().enumerate() {
        let data = layer.data.as_ref().unwrap_or(plot.data);
        let mapping = layer.mapping.as_ref().map_or_else(|| plot.mapping.clone(), |m| plot.mapping.merge(m));
        match ResolvedAes::resolve(&mapping, &layer.fixed, data) {
            Ok(aes) => {
                trace!(layer = index, geom = layer.geom.name(), stat = layer.stat.name(), rows = aes.nrow(), "layer resolved");
                let first_rows = first_rows(&aes);
                prepared.push(PreparedLayer { index, layer, data, aes, first_rows });
            }
            Err(err) => errors.push(err),
        }
    }
    prepared
}

/// Axis and legend titles from explicit labels, else the first mapping source.
fn titles(labels: &Labels, layers: &[PreparedLayer<'_>]) -> HashMap<Channel, String> {
    let mut titles = HashMap::new();
    for layer in layers {
        for (channel, resolved) in layer.aes.channels() {
            titles.entry(channel).or_insert_with(|| resolved.source.clone());
        }
    }
    if let Some(x) = &labels.x {
        titles.insert(Channel::X, x.clone());
    }
    if let Some(y) = &labels.y {
        titles.insert(Channel::Y, y.clone());
    }
    titles
}

fn discover(plot: &PlotParts<'_>, panel: &Panel, layer: &PreparedLayer<'_>, slot: usize) -> Result<Discovered> {
    let rows = panel.select(layer.data);
    let ctx = StatContext { config: &plot.config.stats, fitter: plot.fitter };
    let mut output = layer.layer.stat.compute(&layer.aes, &rows, &ctx)?;
    layer.layer.geom.setup(&mut output, &plot.config.geoms);
    trace!(panel = panel.index, layer = layer.index, rows = rows.len(), groups = output.groups.len(), "stat computed");
    let domains = register_domains(layer, &output, &rows)?;
    Ok(Discovered { panel: panel.index, layer: layer.index, slot, output, domains })
}

fn register_domains(layer: &PreparedLayer<'_>, output: &StatOutput, rows: &[usize]) -> Result<DomainSet> {
    let aes = &layer.aes;
    let mut set = DomainSet::new();
    let mut xs = Vec::new();
    let mut ys = Vec::new();
    let y_is_code = layer.y_is_code();

    for group in &output.groups {
        for row in &group.rows {
            match row.x {
                Pos::Continuous(x) => {
                    xs.push(x + row.dx);
                    xs.extend(row.xmin);
                    xs.extend(row.xmax);
                }
                Pos::Discrete(code) => layer.register_level(&mut set, Channel::X, code)?,
            }
            if y_is_code {
                layer.register_level(&mut set, Channel::Y, row.y as u32)?;
            } else {
                ys.push(row.y + row.dy);
                ys.extend(row.ymin);
                ys.extend(row.ymax);
            }
        }
        if let Some(Summary::Box(stats)) = &group.summary {
            ys.extend([stats.lower, stats.upper]);
            ys.extend(&stats.outliers);
        }
    }

    let temporal = |channel| aes.series(channel).is_some_and(Series::is_temporal);
    let y_in_data_units = !matches!(layer.layer.stat, Stat::Count | Stat::Bin(_));
    set.register_domain(Channel::X, &xs, temporal(Channel::X))?;
    set.register_domain(Channel::Y, &ys, y_in_data_units && temporal(Channel::Y))?;

    for (channel, resolved) in aes.channels().filter(|(c, _)| !c.is_positional() && c.is_scaled()) {
        match &resolved.series {
            Series::Discrete { codes, .. } => {
                let seen: BTreeSet<u32> = rows.iter().filter_map(|&r| codes.get(r).copied()).collect();
                for code in seen {
                    layer.register_level(&mut set, channel, code)?;
                }
            }
            Series::Continuous { values, temporal } => {
                let values: Vec<f32> = rows.iter().filter_map(|&r| values.get(r).copied()).collect();
                set.register_domain(channel, &values, *temporal)?;
            }
        }
    }
    Ok(set)
}

fn diagnostics(layers: &[PreparedLayer<'_>], discovered: &[Discovered]) -> Vec<Diagnostic> {
    let mut out = Vec::new();
    for found in discovered {
        let layer = &layers[found.slot];
        let at = |severity, message: String| Diagnostic {
            severity,
            layer: Some(found.layer),
            panel: Some(found.panel),
            message,
        };
        for skipped in &found.output.skipped {
            warn!(panel = found.panel, layer = found.layer, error = %skipped, "group skipped");
            out.push(at(Severity::Warning, skipped.to_string()));
        }
        for note in &found.output.notes {
            warn!(panel = found.panel, layer = found.layer, "{note}");
            out.push(at(Severity::Info, note.clone()));
        }
        if let Stat::Smooth(params) = &layer.layer.stat {
            for group in &found.output.groups {
                if let Some(Summary::Fit(method)) = group.summary {
                    if method == FitMethod::GeneralizedAdditive && params.method != Some(method) {
                        let message =
                            format!("group '{}' smoothed with {method} instead of loess", group.key.describe(&layer.aes));
                        out.push(at(Severity::Info, message));
                    }
                }
            }
        }
    }
    out
}

fn render_panel(
    plot: &PlotParts<'_>,
    panel: &Panel,
    layers: &[PreparedLayer<'_>],
    discovered: &[Discovered],
    scales: &TrainedScales,
) -> Result<PanelContent> {
    let panel_scales = scales
        .panels
        .get(panel.index)
        .ok_or_else(|| Error::ScaleDomain(format!("no scales for panel {}", panel.index)))?;
    let (width, height) = (plot.config.layout.panel_width, plot.config.layout.panel_height);
    let target = plot.config.scales.axis_breaks;

    let mut scenes = Vec::with_capacity(layers.len());
    for found in discovered.iter().filter(|d| d.panel == panel.index) {
        let layer = &layers[found.slot];
        let ctx = DrawContext {
            x: &panel_scales.x,
            y: &panel_scales.y,
            width,
            height,
            x_levels: layer.aes.series(Channel::X).and_then(Series::levels),
            y_levels: layer.y_levels(),
            aes: &layer.aes,
            fixed: &layer.layer.fixed,
            scales,
            config: &plot.config.geoms,
        };
        let primitives = layer.layer.geom.draw(&ctx, &found.output);
        if !primitives.iter().all(is_finite) {
            return Err(Error::ScaleDomain(format!(
                "layer {} ({}) produced a non-finite coordinate",
                layer.index,
                layer.layer.geom.name()
            )));
        }
        trace!(panel = panel.index, layer = layer.index, primitives = primitives.len(), "layer drawn");
        scenes.push(LayerScene { layer: layer.index, geom: layer.layer.geom.name().to_string(), primitives });
    }

    Ok(PanelContent::Rendered {
        layers: scenes,
        x_axis: guide::axis(&panel_scales.x, width, target),
        y_axis: guide::axis(&panel_scales.y, height, target),
    })
}

fn is_finite(primitive: &Primitive) -> bool {
    let ok = |p: &crate::geometry::Point| p.x.is_finite() && p.y.is_finite();
    match primitive {
        Primitive::Marker { center, size, .. } => ok(center) && size.is_finite(),
        Primitive::Polyline { points, .. } | Primitive::Polygon { points, .. } => points.iter().all(ok),
        Primitive::Segment { segment, .. } => ok(&segment.start) && ok(&segment.end),
        Primitive::Rect { rect, .. } => [rect.x, rect.y, rect.width, rect.height].iter().all(|v| v.is_finite()),
        Primitive::Ribbon { upper, lower, .. } => upper.iter().chain(lower).all(ok),
        Primitive::BoxWhisker { parts, .. } => {
            [parts.body.x, parts.body.y, parts.body.width, parts.body.height].iter().all(|v| v.is_finite())
                && [parts.median, parts.lower_whisker, parts.upper_whisker].iter().all(|s| ok(&s.start) && ok(&s.end))
        }
    }
}
