//! Fitted curves with pointwise confidence ribbons.

use tracing::warn;

use crate::error::{Error, Result};
use crate::fit::{z_score, FitMethod, FitParams};
use crate::grammar::aes::{Channel, ResolvedAes};
use crate::grammar::layer::Params;
use crate::numeric;

use super::{continuous_values, group_rows, ComputedGroup, ComputedRow, Pos, StatContext, StatOutput, Summary};

/// Smoothing parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SmoothParams {
    /// Requested method; local regression when unset.
    pub method: Option<FitMethod>,
    /// Local regression span; defaults to the configured span.
    pub span: Option<f32>,
    /// Emit the confidence ribbon.
    pub se: bool,
    /// Confidence level; defaults to the configured level.
    pub level: Option<f32>,
    /// Number of points along the curve.
    pub n: Option<usize>,
}

impl Default for SmoothParams {
    fn default() -> Self {
        Self { method: None, span: None, se: true, level: None, n: None }
    }
}

impl SmoothParams {
    /// Read `method`, `span`, `se`, `level` and `n`.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown methods or out-of-range values.
    pub fn from_params(params: &Params) -> Result<Self> {
        let method = params.text("method")?.map(str::parse).transpose()?;
        let span = params.number("span")?;
        if span.is_some_and(|s| !(s.is_finite() && s > 0.0)) {
            return Err(Error::InvalidParameter { name: "span".into(), reason: "must be positive".into() });
        }
        let level = params.number("level")?;
        if level.is_some_and(|l| !(l > 0.0 && l < 1.0)) {
            return Err(Error::InvalidParameter { name: "level".into(), reason: "must be in (0, 1)".into() });
        }
        let n = params.count("n")?;
        if n.is_some_and(|n| n < 2) {
            return Err(Error::InvalidParameter { name: "n".into(), reason: "curve needs at least 2 points".into() });
        }
        Ok(Self { method, span, se: params.flag("se")?.unwrap_or(true), level, n })
    }

    /// Method used for a group of `n` observations. Local regression above
    /// `threshold` observations is replaced by the regression spline.
    #[must_use]
    pub fn effective_method(&self, n: usize, threshold: usize) -> FitMethod {
        match self.method.unwrap_or(FitMethod::LocalRegression) {
            FitMethod::LocalRegression if n > threshold => FitMethod::GeneralizedAdditive,
            method => method,
        }
    }
}

pub(super) fn compute(
    params: &SmoothParams,
    aes: &ResolvedAes,
    rows: &[usize],
    ctx: &StatContext<'_>,
) -> Result<StatOutput> {
    let config = ctx.config;
    let fit_params = FitParams { span: params.span.unwrap_or(config.span) };
    let z = z_score(params.level.unwrap_or(config.confidence_level));
    let points = params.n.unwrap_or(config.smooth_points).max(2);
    let mut output = StatOutput::default();

    for (key, members) in group_rows(aes, rows, false) {
        let xs = continuous_values(aes, Channel::X, &members)?;
        let ys = continuous_values(aes, Channel::Y, &members)?;
        let method = params.effective_method(members.len(), config.large_sample_threshold);
        if Some(method) != params.method && method == FitMethod::GeneralizedAdditive {
            warn!(group = %key.describe(aes), n = members.len(), "large group, smoothing with gam instead of loess");
        }

        if members.len() < method.min_observations() {
            output.skipped.push(Error::InsufficientData {
                stat: format!("smooth ({method})"),
                group: key.describe(aes),
                required: method.min_observations(),
                found: members.len(),
            });
            continue;
        }

        let curve = match ctx.fitter.fit(&xs, &ys, method, &fit_params) {
            Ok(curve) => curve,
            Err(Error::InsufficientData { required, found, .. }) => {
                output.skipped.push(Error::InsufficientData {
                    stat: format!("smooth ({method})"),
                    group: key.describe(aes),
                    required,
                    found,
                });
                continue;
            }
            Err(err) => return Err(err),
        };

        let Some((lo, hi)) = numeric::extent(&xs) else { continue };
        let count = if hi > lo { points } else { 1 };
        let step = if count > 1 { (hi - lo) / (count - 1) as f32 } else { 0.0 };

        let rows = (0..count)
            .map(|i| {
                let x = if i + 1 == count { hi } else { lo + i as f32 * step };
                let p = curve.predict(x);
                let (ymin, ymax) = if params.se { (Some(p.y - z * p.se), Some(p.y + z * p.se)) } else { (None, None) };
                ComputedRow { ymin, ymax, ..ComputedRow::at(Pos::Continuous(x), p.y) }
            })
            .collect();
        output.groups.push(ComputedGroup { key, rows, summary: Some(Summary::Fit(method)) });
    }
    Ok(output)
}
