//! Loess smoothing backed by the `lowess` crate.

use lowess::prelude::*;

use crate::error::{Error, Result};

use super::{FittedCurve, Prediction};

/// Fitted values and standard errors at each distinct x, ascending.
///
/// Predictions between observations interpolate linearly; outside the data
/// range they hold the nearest end value.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalFit {
    x: Vec<f64>,
    y: Vec<f64>,
    se: Vec<f64>,
}

impl LocalFit {
    /// Fit with `span` as the fraction of points in each local window.
    /// Spans above 1 use the whole data set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Fit`] when the smoother rejects the data or the span.
    pub fn new(x: &[f64], y: &[f64], span: f64) -> Result<Self> {
        let model = Lowess::new()
            .fraction(span.min(1.0))
            .iterations(0)
            .delta(0.0)
            .return_se()
            .adapter(Batch)
            .build()?;
        let result = model.fit(x, y)?;

        let se = result.standard_errors.unwrap_or_else(|| vec![0.0; result.y.len()]);
        let mut points: Vec<(f64, f64, f64)> =
            result.x.iter().zip(&result.y).zip(&se).map(|((&xi, &yi), &si)| (xi, yi, si)).collect();
        points.sort_by(|a, b| a.0.total_cmp(&b.0));
        points.dedup_by(|next, kept| next.0 == kept.0);

        if points.iter().any(|p| !p.1.is_finite()) {
            return Err(Error::Fit("loess produced non-finite fitted values".into()));
        }

        let mut fit = Self { x: Vec::with_capacity(points.len()), y: Vec::new(), se: Vec::new() };
        for (xi, yi, si) in points {
            fit.x.push(xi);
            fit.y.push(yi);
            fit.se.push(if si.is_finite() { si.max(0.0) } else { 0.0 });
        }
        Ok(fit)
    }

    fn interpolate(&self, x0: f64) -> (f64, f64) {
        let last = self.x.len() - 1;
        if x0 <= self.x[0] {
            return (self.y[0], self.se[0]);
        }
        if x0 >= self.x[last] {
            return (self.y[last], self.se[last]);
        }
        let hi = self.x.partition_point(|&xi| xi < x0);
        let lo = hi - 1;
        let t = (x0 - self.x[lo]) / (self.x[hi] - self.x[lo]);
        (self.y[lo] + t * (self.y[hi] - self.y[lo]), self.se[lo] + t * (self.se[hi] - self.se[lo]))
    }
}

impl FittedCurve for LocalFit {
    fn predict(&self, x: f32) -> Prediction {
        let (y, se) = self.interpolate(f64::from(x));
        Prediction { y: y as f32, se: se as f32 }
    }
}

impl From<LowessError> for Error {
    fn from(err: LowessError) -> Self {
        Error::Fit(err.to_string())
    }
}
