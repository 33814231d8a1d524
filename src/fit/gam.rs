//! Penalized cubic regression spline.
//!
//! Truncated-power cubic basis with up to ten interior knots at quantiles of
//! the distinct x values. Knot coefficients carry a ridge penalty whose
//! strength is picked by generalized cross-validation.

use crate::error::{Error, Result};

use super::{FittedCurve, Prediction};

const MAX_KNOTS: usize = 10;

/// log10 of the candidate penalty strengths.
const LOG_LAMBDA: (i32, i32) = (-16, 4);

/// A fitted regression spline.
#[derive(Debug, Clone, PartialEq)]
pub struct SplineFit {
    x_min: f64,
    x_range: f64,
    degree: usize,
    knots: Vec<f64>,
    beta: Vec<f64>,
    /// Covariance of `beta`, row-major.
    covariance: Vec<f64>,
}

impl SplineFit {
    /// Fit the spline.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] if no penalty gives a solvable system.
    pub fn new(x: &[f64], y: &[f64]) -> Result<Self> {
        let n = x.len();
        let (x_min, x_max) = x.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        let x_range = if x_max > x_min { x_max - x_min } else { 1.0 };
        let t: Vec<f64> = x.iter().map(|v| (v - x_min) / x_range).collect();

        let mut distinct = t.clone();
        distinct.sort_by(f64::total_cmp);
        distinct.dedup_by(|a, b| (*a - *b).abs() < 1e-12);

        let degree = (distinct.len().saturating_sub(1)).min(3);
        let n_knots = if degree == 3 { distinct.len().saturating_sub(4).min(MAX_KNOTS) } else { 0 };
        let knots: Vec<f64> = (1..=n_knots)
            .map(|k| {
                let pos = k as f64 / (n_knots + 1) as f64 * (distinct.len() - 1) as f64;
                let lo = pos.floor() as usize;
                let hi = (lo + 1).min(distinct.len() - 1);
                distinct[lo] + (pos - lo as f64) * (distinct[hi] - distinct[lo])
            })
            .collect();

        let mut spline = Self { x_min, x_range, degree, knots, beta: Vec::new(), covariance: Vec::new() };
        let p = spline.n_coefficients();
        let rows: Vec<Vec<f64>> = t.iter().map(|&ti| spline.basis(ti)).collect();

        let mut xtx = vec![0.0; p * p];
        let mut xty = vec![0.0; p];
        for (row, &yi) in rows.iter().zip(y) {
            for i in 0..p {
                xty[i] += row[i] * yi;
                for j in 0..p {
                    xtx[i * p + j] += row[i] * row[j];
                }
            }
        }
        let trace: f64 = (0..p).map(|i| xtx[i * p + i]).sum::<f64>().max(1.0);

        let mut best: Option<(f64, Vec<f64>, Vec<f64>, f64)> = None;
        for step in LOG_LAMBDA.0..=LOG_LAMBDA.1 {
            let lambda = trace * 10f64.powf(f64::from(step) * 0.5);
            let mut a = xtx.clone();
            for i in 0..p {
                a[i * p + i] += if i > degree { lambda } else { 1e-10 * trace };
            }
            let Some(a_inv) = invert(&a, p) else {
                continue;
            };
            let beta = mat_vec(&a_inv, &xty, p);
            let rss: f64 = rows.iter().zip(y).map(|(row, &yi)| (yi - dot(row, &beta)).powi(2)).sum();
            let hat = mat_mul(&a_inv, &xtx, p);
            let edf: f64 = (0..p).map(|i| hat[i * p + i]).sum();
            let resid_df = n as f64 - edf;
            if resid_df <= 1e-6 {
                continue;
            }
            let gcv = n as f64 * rss / (resid_df * resid_df);
            if best.as_ref().map_or(true, |(score, ..)| gcv < *score) {
                let sigma2 = rss / resid_df;
                let cov: Vec<f64> = mat_mul(&hat, &a_inv, p).into_iter().map(|v| v * sigma2).collect();
                best = Some((gcv, beta, cov, sigma2));
            }
        }

        let (_, beta, covariance, _) = best.ok_or_else(|| Error::InvalidParameter {
            name: "method".into(),
            reason: "regression spline system is singular".into(),
        })?;
        spline.beta = beta;
        spline.covariance = covariance;
        Ok(spline)
    }

    fn n_coefficients(&self) -> usize {
        self.degree + 1 + self.knots.len()
    }

    fn basis(&self, t: f64) -> Vec<f64> {
        let mut row = Vec::with_capacity(self.n_coefficients());
        let mut power = 1.0;
        for _ in 0..=self.degree {
            row.push(power);
            power *= t;
        }
        row.extend(self.knots.iter().map(|k| (t - k).max(0.0).powi(3)));
        row
    }
}

impl FittedCurve for SplineFit {
    fn predict(&self, x: f32) -> Prediction {
        let t = (f64::from(x) - self.x_min) / self.x_range;
        let row = self.basis(t);
        let p = row.len();
        let y = dot(&row, &self.beta);
        let cov_row = mat_vec(&self.covariance, &row, p);
        let variance = dot(&row, &cov_row).max(0.0);
        Prediction { y: y as f32, se: variance.sqrt() as f32 }
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn mat_vec(m: &[f64], v: &[f64], p: usize) -> Vec<f64> {
    (0..p).map(|i| dot(&m[i * p..(i + 1) * p], v)).collect()
}

fn mat_mul(a: &[f64], b: &[f64], p: usize) -> Vec<f64> {
    let mut out = vec![0.0; p * p];
    for i in 0..p {
        for k in 0..p {
            let aik = a[i * p + k];
            if aik == 0.0 {
                continue;
            }
            for j in 0..p {
                out[i * p + j] += aik * b[k * p + j];
            }
        }
    }
    out
}

/// Gauss-Jordan inverse with partial pivoting.
fn invert(matrix: &[f64], p: usize) -> Option<Vec<f64>> {
    let mut a = matrix.to_vec();
    let mut inv = vec![0.0; p * p];
    for i in 0..p {
        inv[i * p + i] = 1.0;
    }
    let scale = matrix.iter().fold(0.0f64, |m, v| m.max(v.abs())).max(f64::MIN_POSITIVE);

    for col in 0..p {
        let pivot = (col..p).max_by(|&r, &s| a[r * p + col].abs().total_cmp(&a[s * p + col].abs()))?;
        if a[pivot * p + col].abs() < 1e-13 * scale {
            return None;
        }
        if pivot != col {
            for j in 0..p {
                a.swap(pivot * p + j, col * p + j);
                inv.swap(pivot * p + j, col * p + j);
            }
        }
        let d = a[col * p + col];
        for j in 0..p {
            a[col * p + j] /= d;
            inv[col * p + j] /= d;
        }
        for row in 0..p {
            if row == col {
                continue;
            }
            let factor = a[row * p + col];
            if factor == 0.0 {
                continue;
            }
            for j in 0..p {
                a[row * p + j] -= factor * a[col * p + j];
                inv[row * p + j] -= factor * inv[col * p + j];
            }
        }
    }
    Some(inv)
}
