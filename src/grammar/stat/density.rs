//! Gaussian kernel density estimation.
//!
//! With y mapped the density runs along y for every x group (violins);
//! otherwise it runs along x.

use std::f32::consts::PI;

use crate::error::{Error, Result};
use crate::grammar::aes::{Channel, ResolvedAes};
use crate::grammar::layer::Params;
use crate::numeric;

use super::{continuous_values, group_rows, group_x, ComputedGroup, ComputedRow, Pos, StatContext, StatOutput};

const MIN_OBSERVATIONS: usize = 2;

/// Density parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct DensityParams {
    /// Multiplier on the bandwidth.
    pub adjust: f32,
    /// Explicit bandwidth; Silverman's rule when unset.
    pub bw: Option<f32>,
    /// Grid size; defaults to the configured density resolution.
    pub n: Option<usize>,
}

impl Default for DensityParams {
    fn default() -> Self {
        Self { adjust: 1.0, bw: None, n: None }
    }
}

impl DensityParams {
    /// Read `adjust`, `bw` and `n`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] for a non-positive adjust or
    /// bandwidth, or a grid below 2.
    pub fn from_params(params: &Params) -> Result<Self> {
        let adjust = params.number("adjust")?.unwrap_or(1.0);
        if !(adjust.is_finite() && adjust > 0.0) {
            return Err(Error::InvalidParameter { name: "adjust".into(), reason: format!("must be positive, got {adjust}") });
        }
        let bw = params.number("bw")?;
        if bw.is_some_and(|bw| !(bw.is_finite() && bw > 0.0)) {
            return Err(Error::InvalidParameter { name: "bw".into(), reason: "must be positive".into() });
        }
        let n = params.count("n")?;
        if n.is_some_and(|n| n < 2) {
            return Err(Error::InvalidParameter { name: "n".into(), reason: "grid needs at least 2 points".into() });
        }
        Ok(Self { adjust, bw, n })
    }
}

/// Silverman's rule-of-thumb bandwidth (`bw.nrd0`).
#[must_use]
pub fn nrd0_bandwidth(values: &[f32]) -> f32 {
    let sorted = numeric::sorted_finite(values);
    if sorted.len() < 2 {
        return sorted.first().map_or(1.0, |v| if *v != 0.0 { v.abs() * 0.9 } else { 0.9 });
    }
    let sd = numeric::std_dev(&sorted).unwrap_or(0.0);
    let iqr = numeric::quantile(&sorted, 0.75) - numeric::quantile(&sorted, 0.25);
    let mut lo = sd.min(iqr / 1.34);
    if lo <= 0.0 {
        lo = if sd > 0.0 {
            sd
        } else if sorted[0] != 0.0 {
            sorted[0].abs()
        } else {
            1.0
        };
    }
    0.9 * lo * (sorted.len() as f32).powf(-0.2)
}

/// Density of `values` at `n` evenly spaced points over their range.
fn kde(values: &[f32], bandwidth: f32, n: usize) -> Vec<(f32, f32)> {
    let Some((lo, hi)) = numeric::extent(values) else {
        return Vec::new();
    };
    let (lo, hi) = if hi > lo { (lo, hi) } else { (lo - 3.0 * bandwidth, hi + 3.0 * bandwidth) };
    let step = (hi - lo) / (n - 1) as f32;
    let norm = 1.0 / (values.len() as f32 * bandwidth * (2.0 * PI).sqrt());

    (0..n)
        .map(|i| {
            let at = if i == n - 1 { hi } else { lo + i as f32 * step };
            let sum: f32 = values
                .iter()
                .map(|&v| {
                    let u = (at - v) / bandwidth;
                    (-0.5 * u * u).exp()
                })
                .sum();
            (at, sum * norm)
        })
        .collect()
}

pub(super) fn compute(
    params: &DensityParams,
    aes: &ResolvedAes,
    rows: &[usize],
    ctx: &StatContext<'_>,
) -> Result<StatOutput> {
    let along_y = aes.has(Channel::Y);
    let channel = if along_y { Channel::Y } else { Channel::X };
    let grid = params.n.unwrap_or(ctx.config.density_points).max(2);
    let mut output = StatOutput::default();

    for (key, members) in group_rows(aes, rows, along_y) {
        let values = numeric::finite(&continuous_values(aes, channel, &members)?);
        if values.len() < MIN_OBSERVATIONS {
            output.skipped.push(Error::InsufficientData {
                stat: "density".into(),
                group: key.describe(aes),
                required: MIN_OBSERVATIONS,
                found: values.len(),
            });
            continue;
        }

        let bandwidth = params.bw.unwrap_or_else(|| nrd0_bandwidth(&values)) * params.adjust;
        let curve = kde(&values, bandwidth, grid);
        let peak = curve.iter().map(|&(_, d)| d).fold(0.0f32, f32::max);
        let scaled = |d: f32| if peak > 0.0 { d / peak } else { 0.0 };

        let rows = if along_y {
            let x = group_x(aes, &key, &members);
            curve
                .iter()
                .map(|&(at, d)| ComputedRow { density: Some(d), scaled: Some(scaled(d)), ..ComputedRow::at(x, at) })
                .collect()
        } else {
            curve
                .iter()
                .map(|&(at, d)| ComputedRow {
                    ymin: Some(0.0),
                    ymax: Some(d),
                    density: Some(d),
                    scaled: Some(scaled(d)),
                    ..ComputedRow::at(Pos::Continuous(at), d)
                })
                .collect()
        };
        output.groups.push(ComputedGroup { key, rows, summary: None });
    }
    Ok(output)
}
