//! Box-and-whisker summaries.

use crate::error::{Error, Result};
use crate::grammar::aes::{Channel, ResolvedAes};
use crate::grammar::layer::Params;
use crate::numeric;

use super::{group_rows, group_x, ComputedGroup, ComputedRow, StatOutput, Summary};

/// Boxplot parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxplotParams {
    /// Whisker reach as a multiple of the interquartile range.
    pub coef: f32,
}

impl Default for BoxplotParams {
    fn default() -> Self {
        Self { coef: 1.5 }
    }
}

impl BoxplotParams {
    /// Read `coef`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] for a negative coefficient.
    pub fn from_params(params: &Params) -> Result<Self> {
        let coef = params.number("coef")?.unwrap_or(1.5);
        if !(coef.is_finite() && coef >= 0.0) {
            return Err(Error::InvalidParameter { name: "coef".into(), reason: format!("must be non-negative, got {coef}") });
        }
        Ok(Self { coef })
    }
}

/// Statistics computed for a box plot.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxStats {
    /// Lowest observation within the lower fence.
    pub lower: f32,
    /// First quartile (25th percentile).
    pub q1: f32,
    /// Median (50th percentile).
    pub median: f32,
    /// Third quartile (75th percentile).
    pub q3: f32,
    /// Highest observation within the upper fence.
    pub upper: f32,
    /// Observations beyond the fences.
    pub outliers: Vec<f32>,
    /// Number of observations.
    pub n: usize,
}

impl BoxStats {
    /// Compute box plot statistics, with fences at `coef * IQR` beyond the
    /// quartiles.
    #[must_use]
    pub fn from_data(data: &[f32], coef: f32) -> Option<Self> {
        let sorted = numeric::sorted_finite(data);
        let (&first, &last) = (sorted.first()?, sorted.last()?);

        let q1 = numeric::quantile(&sorted, 0.25);
        let median = numeric::quantile(&sorted, 0.5);
        let q3 = numeric::quantile(&sorted, 0.75);
        let iqr = q3 - q1;

        let lower_fence = q1 - coef * iqr;
        let upper_fence = q3 + coef * iqr;

        let lower = sorted.iter().copied().find(|&x| x >= lower_fence).unwrap_or(first);
        let upper = sorted.iter().rev().copied().find(|&x| x <= upper_fence).unwrap_or(last);
        let outliers = sorted.iter().copied().filter(|&x| x < lower_fence || x > upper_fence).collect();

        Some(Self { lower, q1, median, q3, upper, outliers, n: sorted.len() })
    }

    /// Interquartile range.
    #[must_use]
    pub fn iqr(&self) -> f32 {
        self.q3 - self.q1
    }
}

pub(super) fn compute(params: &BoxplotParams, aes: &ResolvedAes, rows: &[usize]) -> StatOutput {
    let Some(ys) = aes.series(Channel::Y).and_then(|s| s.values()) else {
        return StatOutput::default();
    };

    let groups = group_rows(aes, rows, true)
        .into_iter()
        .filter_map(|(key, members)| {
            let values: Vec<f32> = members.iter().filter_map(|&r| ys.get(r).copied()).collect();
            let stats = BoxStats::from_data(&values, params.coef)?;
            let x = group_x(aes, &key, &members);
            let lowest = stats.outliers.iter().copied().fold(stats.lower, f32::min);
            let highest = stats.outliers.iter().copied().fold(stats.upper, f32::max);
            let row = ComputedRow { ymin: Some(lowest), ymax: Some(highest), ..ComputedRow::at(x, stats.median) };
            Some(ComputedGroup { key, rows: vec![row], summary: Some(Summary::Box(stats)) })
        })
        .collect();
    StatOutput { groups, ..StatOutput::default() }
}
