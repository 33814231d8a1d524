//! Histogram binning.
//!
//! Bins are left-closed `[a, b)` except the last, which is closed `[a, b]`.
//! Edges are computed once over the whole layer so every panel and group
//! shares the same bins. Discrete x is counted per level instead.

use crate::config::StatConfig;
use crate::error::{Error, Result};
use crate::grammar::aes::{Channel, ResolvedAes};
use crate::grammar::layer::Params;
use crate::numeric;

use super::{continuous_values, group_rows, ComputedGroup, ComputedRow, Pos, StatContext, StatOutput};

/// Binning parameters. At most one of `bins`, `binwidth` and `breaks` is used,
/// in the order `breaks`, `binwidth`, `bins`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BinParams {
    /// Number of bins; defaults to the configured bin count.
    pub bins: Option<usize>,
    /// Width of each bin, starting at the data minimum.
    pub binwidth: Option<f32>,
    /// Explicit bin edges.
    pub breaks: Option<Vec<f32>>,
}

impl BinParams {
    /// Read `bins`, `binwidth` and `breaks`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] for non-positive counts or widths,
    /// or fewer than two distinct breaks.
    pub fn from_params(params: &Params) -> Result<Self> {
        let out = Self { bins: params.count("bins")?, binwidth: params.number("binwidth")?, breaks: params.numbers("breaks")? };
        out.validate()?;
        Ok(out)
    }

    /// Check parameter ranges.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] naming the offending parameter.
    pub fn validate(&self) -> Result<()> {
        if self.bins == Some(0) {
            return Err(Error::InvalidParameter { name: "bins".into(), reason: "must be at least 1".into() });
        }
        if let Some(w) = self.binwidth {
            if !(w.is_finite() && w > 0.0) {
                return Err(Error::InvalidParameter { name: "binwidth".into(), reason: format!("must be positive, got {w}") });
            }
        }
        if let Some(breaks) = &self.breaks {
            let mut sorted = numeric::sorted_finite(breaks);
            sorted.dedup();
            if sorted.len() < 2 || sorted.len() != breaks.len() {
                return Err(Error::InvalidParameter {
                    name: "breaks".into(),
                    reason: "need at least two distinct finite values".into(),
                });
            }
        }
        Ok(())
    }
}

/// Bin edges for data spanning `extent`.
///
/// # Errors
///
/// Returns [`Error::InvalidParameter`] when `bins` or `binwidth` would give
/// more than `config.max_bins` bins.
pub fn bin_edges(extent: (f32, f32), params: &BinParams, config: &StatConfig) -> Result<Vec<f32>> {
    if let Some(breaks) = &params.breaks {
        let mut sorted = numeric::sorted_finite(breaks);
        sorted.dedup();
        return Ok(sorted);
    }

    let (lo, hi) = extent;
    if let Some(width) = params.binwidth {
        let span = (f64::from(hi) - f64::from(lo)) / f64::from(width);
        if !(span.ceil() <= config.max_bins as f64) {
            return Err(too_many_bins("binwidth", format!("width {width} over [{lo}, {hi}]"), config.max_bins));
        }
        let n = (span.ceil() as usize).max(1);
        let mut edges: Vec<f32> = (0..=n).map(|k| lo + k as f32 * width).collect();
        while edges.last().is_some_and(|&e| e < hi) {
            let next = lo + edges.len() as f32 * width;
            edges.push(next);
        }
        return Ok(edges);
    }

    let n = params.bins.unwrap_or(config.bins).max(1);
    if n > config.max_bins {
        return Err(too_many_bins("bins", format!("{n} bins"), config.max_bins));
    }
    let (lo, hi) = if hi > lo { (lo, hi) } else { (lo - 0.5, hi + 0.5) };
    let width = (hi - lo) / n as f32;
    let mut edges: Vec<f32> = (0..=n).map(|k| lo + k as f32 * width).collect();
    edges[n] = hi;
    Ok(edges)
}

fn too_many_bins(name: &str, what: String, max: usize) -> Error {
    Error::InvalidParameter { name: name.into(), reason: format!("{what} exceeds the limit of {max} bins") }
}

/// Index of the bin holding `value`, if inside the edges.
#[must_use]
pub fn bin_index(edges: &[f32], value: f32) -> Option<usize> {
    let last = edges.len().checked_sub(1)?;
    if last == 0 || !(value >= edges[0] && value <= edges[last]) {
        return None;
    }
    let below = edges.partition_point(|&e| e <= value);
    Some((below - 1).min(last - 1))
}

pub(super) fn compute(
    params: &BinParams,
    aes: &ResolvedAes,
    rows: &[usize],
    ctx: &StatContext<'_>,
) -> Result<StatOutput> {
    if aes.is_discrete(Channel::X) {
        return Ok(super::count(aes, rows));
    }
    let all_rows: Vec<usize> = (0..aes.nrow()).collect();
    let layer_x = continuous_values(aes, Channel::X, &all_rows)?;
    let mut output = StatOutput::default();
    let Some(extent) = numeric::extent(&layer_x) else {
        return Ok(output);
    };
    let edges = bin_edges(extent, params, ctx.config)?;
    let n_bins = edges.len() - 1;

    let mut dropped = 0;
    for (key, members) in group_rows(aes, rows, false) {
        let xs = continuous_values(aes, Channel::X, &members)?;
        let mut counts = vec![0usize; n_bins];
        for &x in &xs {
            match bin_index(&edges, x) {
                Some(k) => counts[k] += 1,
                None => dropped += 1,
            }
        }
        let total: usize = counts.iter().sum();

        let rows = counts
            .iter()
            .enumerate()
            .map(|(k, &count)| {
                let (xmin, xmax) = (edges[k], edges[k + 1]);
                let width = xmax - xmin;
                let count = count as f32;
                let density = if total > 0 { count / (total as f32 * width) } else { 0.0 };
                ComputedRow {
                    xmin: Some(xmin),
                    xmax: Some(xmax),
                    ymin: Some(0.0),
                    ymax: Some(count),
                    density: Some(density),
                    ..ComputedRow::at(Pos::Continuous((xmin + xmax) / 2.0), count)
                }
            })
            .collect();
        output.groups.push(ComputedGroup { key, rows, summary: None });
    }

    if dropped > 0 {
        output.notes.push(format!("dropped {dropped} values outside the bin breaks"));
    }
    Ok(output)
}
