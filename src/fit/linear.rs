//! Straight-line fits: ordinary least squares and Huber M-estimation.

use super::{median, FittedCurve, Prediction, WlsSums};

/// Huber tuning constant (95% efficiency under normal errors).
const HUBER_K: f64 = 1.345;

/// MAD to standard deviation for normal data.
const MAD_TO_STD: f64 = 1.4826;

const MAX_ITERATIONS: usize = 50;

/// A fitted straight line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineFit {
    slope: f64,
    intercept: f64,
    x_mean: f64,
    sxx: f64,
    sum_w: f64,
    sigma: f64,
}

impl LineFit {
    /// Ordinary least squares.
    #[must_use]
    pub fn ordinary(x: &[f64], y: &[f64]) -> Self {
        Self::weighted(x, y, &vec![1.0; x.len()])
    }

    /// Weighted least squares; `sigma` is the weighted residual standard error.
    #[must_use]
    pub fn weighted(x: &[f64], y: &[f64], weights: &[f64]) -> Self {
        let sums = WlsSums::accumulate(x, y, weights.iter().copied());
        let (slope, intercept, x_mean, sxx) = sums.solve().unwrap_or((0.0, 0.0, 0.0, 0.0));

        let rss: f64 = x
            .iter()
            .zip(y)
            .zip(weights)
            .map(|((&xi, &yi), &w)| w * (yi - intercept - slope * xi).powi(2))
            .sum();
        let df = x.len() as f64 - 2.0;
        let sigma = if df > 0.0 { (rss / df).sqrt() } else { 0.0 };

        Self { slope, intercept, x_mean, sxx, sum_w: sums.w, sigma }
    }

    /// Huber M-estimate by iteratively reweighted least squares.
    #[must_use]
    pub fn huber(x: &[f64], y: &[f64]) -> Self {
        let mut fit = Self::ordinary(x, y);
        let mut weights = vec![1.0; x.len()];

        for _ in 0..MAX_ITERATIONS {
            let residuals: Vec<f64> =
                x.iter().zip(y).map(|(&xi, &yi)| yi - fit.intercept - fit.slope * xi).collect();
            let abs: Vec<f64> = residuals.iter().map(|r| r.abs()).collect();
            let scale = MAD_TO_STD * median(&abs);
            if scale <= f64::EPSILON {
                break;
            }

            for (w, r) in weights.iter_mut().zip(&residuals) {
                let u = (r / scale).abs();
                *w = if u <= HUBER_K { 1.0 } else { HUBER_K / u };
            }

            let next = Self::weighted(x, y, &weights);
            let converged = (next.slope - fit.slope).abs() < 1e-9 * (1.0 + fit.slope.abs())
                && (next.intercept - fit.intercept).abs() < 1e-9 * (1.0 + fit.intercept.abs());
            fit = next;
            if converged {
                break;
            }
        }
        fit
    }

    /// Slope of the line.
    #[must_use]
    pub fn slope(&self) -> f64 {
        self.slope
    }

    /// Intercept of the line.
    #[must_use]
    pub fn intercept(&self) -> f64 {
        self.intercept
    }
}

impl FittedCurve for LineFit {
    fn predict(&self, x: f32) -> Prediction {
        let x = f64::from(x);
        let y = self.intercept + self.slope * x;
        let leverage = if self.sum_w > 0.0 { 1.0 / self.sum_w } else { 0.0 }
            + if self.sxx > 0.0 { (x - self.x_mean).powi(2) / self.sxx } else { 0.0 };
        Prediction { y: y as f32, se: (self.sigma * leverage.sqrt()) as f32 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_ordinary_exact_line() {
        let fit = LineFit::ordinary(&[0.0, 1.0, 2.0, 3.0], &[1.0, 3.0, 5.0, 7.0]);
        assert_relative_eq!(fit.slope(), 2.0, epsilon = 1e-12);
        assert_relative_eq!(fit.intercept(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(fit.predict(1.5).se, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_ordinary_se_grows_away_from_mean() {
        let fit = LineFit::ordinary(&[0.0, 1.0, 2.0, 3.0, 4.0], &[0.1, 0.9, 2.2, 2.8, 4.1]);
        assert!(fit.predict(6.0).se > fit.predict(2.0).se);
    }

    #[test]
    fn test_two_points_have_zero_se() {
        let fit = LineFit::ordinary(&[0.0, 1.0], &[0.0, 1.0]);
        assert_relative_eq!(fit.predict(0.5).y, 0.5);
        assert_relative_eq!(fit.predict(0.5).se, 0.0);
    }

    #[test]
    fn test_huber_resists_outlier() {
        let x: Vec<f64> = (0..10).map(f64::from).collect();
        let mut y: Vec<f64> = x.iter().map(|v| v + 0.01 * (v * 7.0).sin()).collect();
        y[9] = 60.0;
        let ols = LineFit::ordinary(&x, &y);
        let robust = LineFit::huber(&x, &y);
        assert!((robust.slope() - 1.0).abs() < (ols.slope() - 1.0).abs());
        assert!((robust.slope() - 1.0).abs() < 0.2);
    }

    #[test]
    fn test_constant_x_is_flat() {
        let fit = LineFit::ordinary(&[2.0, 2.0, 2.0], &[1.0, 2.0, 3.0]);
        assert_relative_eq!(fit.predict(5.0).y, 2.0);
    }
}
