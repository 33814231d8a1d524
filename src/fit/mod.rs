//! Curve fitting for smoothing layers.
//!
//! The smoothing stat talks to a [`CurveFitter`]; [`DefaultFitter`] provides
//! ordinary least squares, Huber-robust linear regression, loess through the
//! `lowess` crate and a penalized cubic regression spline. Fitting is done
//! in `f64` and reported in `f32`.

mod gam;
mod linear;
mod loess;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub use gam::SplineFit;
pub use linear::LineFit;
pub use loess::LocalFit;

/// Smoothing method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitMethod {
    /// Local polynomial regression (loess).
    LocalRegression,
    /// Penalized regression spline (gam).
    GeneralizedAdditive,
    /// Ordinary least squares line (lm).
    Linear,
    /// Huber M-estimated line (rlm).
    RobustLinear,
}

impl FitMethod {
    /// Short name as used in layer parameters.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            FitMethod::LocalRegression => "loess",
            FitMethod::GeneralizedAdditive => "gam",
            FitMethod::Linear => "lm",
            FitMethod::RobustLinear => "rlm",
        }
    }

    /// Fewest observations the method can fit.
    #[must_use]
    pub fn min_observations(self) -> usize {
        match self {
            FitMethod::Linear => 2,
            FitMethod::RobustLinear | FitMethod::LocalRegression => 3,
            FitMethod::GeneralizedAdditive => 4,
        }
    }
}

impl fmt::Display for FitMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FitMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "loess" | "lowess" => Ok(FitMethod::LocalRegression),
            "gam" => Ok(FitMethod::GeneralizedAdditive),
            "lm" | "linear" => Ok(FitMethod::Linear),
            "rlm" | "robust" => Ok(FitMethod::RobustLinear),
            other => Err(Error::UnknownName { kind: "method", name: other.to_string() }),
        }
    }
}

/// Tuning parameters passed to a fitter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitParams {
    /// Fraction of points in each local regression window.
    pub span: f32,
}

impl Default for FitParams {
    fn default() -> Self {
        Self { span: 0.75 }
    }
}

/// Fitted value and its standard error at one point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    /// Fitted value.
    pub y: f32,
    /// Standard error of the fitted value.
    pub se: f32,
}

/// A fitted curve that can be evaluated anywhere in the data range.
pub trait FittedCurve: Send + Sync {
    /// Predict at `x`.
    fn predict(&self, x: f32) -> Prediction;
}

/// Fits a curve through `(xs, ys)`.
///
/// Implementations must be shareable across threads; the render pipeline
/// fits groups in parallel when the `parallel` feature is enabled.
pub trait CurveFitter: Send + Sync {
    /// Fit `method` to the data.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InsufficientData`] when there are too few points.
    fn fit(&self, xs: &[f32], ys: &[f32], method: FitMethod, params: &FitParams) -> Result<Box<dyn FittedCurve>>;
}

/// Built-in fitter covering every [`FitMethod`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultFitter;

impl CurveFitter for DefaultFitter {
    fn fit(&self, xs: &[f32], ys: &[f32], method: FitMethod, params: &FitParams) -> Result<Box<dyn FittedCurve>> {
        let (x, y): (Vec<f64>, Vec<f64>) = xs
            .iter()
            .zip(ys)
            .filter(|(a, b)| a.is_finite() && b.is_finite())
            .map(|(&a, &b)| (f64::from(a), f64::from(b)))
            .unzip();

        if x.len() < method.min_observations() {
            return Err(Error::InsufficientData {
                stat: method.name().to_string(),
                group: String::new(),
                required: method.min_observations(),
                found: x.len(),
            });
        }

        let fitted: Box<dyn FittedCurve> = match method {
            FitMethod::Linear => Box::new(LineFit::ordinary(&x, &y)),
            FitMethod::RobustLinear => Box::new(LineFit::huber(&x, &y)),
            FitMethod::LocalRegression => {
                if !(params.span > 0.0) {
                    return Err(Error::InvalidParameter {
                        name: "span".into(),
                        reason: format!("must be positive, got {}", params.span),
                    });
                }
                Box::new(LocalFit::new(&x, &y, f64::from(params.span))?)
            }
            FitMethod::GeneralizedAdditive => Box::new(SplineFit::new(&x, &y)?),
        };
        Ok(fitted)
    }
}

/// Critical value of the standard normal for a two-sided confidence level.
#[must_use]
pub fn z_score(level: f32) -> f32 {
    let level = f64::from(level);
    if (level - 0.99).abs() < 1e-6 {
        2.576
    } else if (level - 0.95).abs() < 1e-6 {
        1.960
    } else if (level - 0.90).abs() < 1e-6 {
        1.645
    } else {
        inverse_normal_cdf((1.0 + level) / 2.0) as f32
    }
}

/// Acklam's rational approximation of the inverse standard normal CDF.
fn inverse_normal_cdf(p: f64) -> f64 {
    if p <= 0.0 || p >= 1.0 {
        return 0.0;
    }

    const A: [f64; 6] = [
        -3.969_683_028_665_376e1,
        2.209_460_984_245_205e2,
        -2.759_285_104_469_687e2,
        1.383_577_518_672_69e2,
        -3.066_479_806_614_716e1,
        2.506_628_277_459_239e0,
    ];
    const B: [f64; 5] = [
        -5.447_609_879_822_406e1,
        1.615_858_368_580_409e2,
        -1.556_989_798_598_866e2,
        6.680_131_188_771_972e1,
        -1.328_068_155_288_572e1,
    ];
    const C: [f64; 6] = [
        -7.784_894_002_430_293e-3,
        -3.223_964_580_411_365e-1,
        -2.400_758_277_161_838e0,
        -2.549_732_539_343_734e0,
        4.374_664_141_464_968e0,
        2.938_163_982_698_783e0,
    ];
    const D: [f64; 4] =
        [7.784_695_709_041_462e-3, 3.224_671_290_700_398e-1, 2.445_134_137_142_996e0, 3.754_408_661_907_416e0];
    const P_LOW: f64 = 0.02425;

    let tail = |q: f64| {
        let num = ((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5];
        let den = (((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0;
        num / den
    };

    if p < P_LOW {
        tail((-2.0 * p.ln()).sqrt())
    } else if p > 1.0 - P_LOW {
        -tail((-2.0 * (1.0 - p).ln()).sqrt())
    } else {
        let q = p - 0.5;
        let r = q * q;
        let num = (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q;
        let den = ((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0;
        num / den
    }
}

// ============================================================================
// Weighted least squares
// ============================================================================

/// Weighted sums for a straight-line fit.
#[derive(Debug, Clone, Copy, Default)]
struct WlsSums {
    w: f64,
    wx: f64,
    wy: f64,
    wxx: f64,
    wxy: f64,
}

impl WlsSums {
    fn accumulate(x: &[f64], y: &[f64], weights: impl Iterator<Item = f64>) -> Self {
        let mut s = Self::default();
        for ((&xi, &yi), w) in x.iter().zip(y).zip(weights) {
            let wx = w * xi;
            s.w += w;
            s.wx += wx;
            s.wy += w * yi;
            s.wxx += wx * xi;
            s.wxy += wx * yi;
        }
        s
    }

    /// `(slope, intercept, x_mean, sxx)`; a flat line when x has no spread.
    fn solve(&self) -> Option<(f64, f64, f64, f64)> {
        if self.w <= 0.0 {
            return None;
        }
        let x_mean = self.wx / self.w;
        let y_mean = self.wy / self.w;
        let sxx = self.wxx - self.wx * self.wx / self.w;
        if sxx <= 1e-12 * self.w.max(1.0) {
            return Some((0.0, y_mean, x_mean, 0.0));
        }
        let slope = (self.wxy - self.wx * self.wy / self.w) / sxx;
        Some((slope, y_mean - slope * x_mean, x_mean, sxx))
    }
}

/// Median of a slice (sorted copy).
fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}
