//! Column reductions shared by stats and scales.
//!
//! Extent and mean use trueno's SIMD vectors; non-finite values are
//! filtered out first so a single `NaN` never poisons a domain.

use trueno::Vector;

/// Finite values of `values`, in input order.
#[must_use]
pub fn finite(values: &[f32]) -> Vec<f32> {
    values.iter().copied().filter(|v| v.is_finite()).collect()
}

/// Finite values of `values`, sorted ascending.
#[must_use]
pub fn sorted_finite(values: &[f32]) -> Vec<f32> {
    let mut sorted = finite(values);
    sorted.sort_by(f32::total_cmp);
    sorted
}

/// `(min, max)` over the finite values, or `None` if there are none.
#[must_use]
pub fn extent(values: &[f32]) -> Option<(f32, f32)> {
    let values = finite(values);
    if values.is_empty() {
        return None;
    }
    let vec = Vector::from_vec(values);
    let min = vec.min().unwrap_or(f32::NAN);
    let max = vec.max().unwrap_or(f32::NAN);
    if min.is_finite() && max.is_finite() {
        Some((min, max))
    } else {
        None
    }
}

/// Arithmetic mean of the finite values.
#[must_use]
pub fn mean(values: &[f32]) -> Option<f32> {
    let values = finite(values);
    if values.is_empty() {
        return None;
    }
    let mean = Vector::from_vec(values).mean().unwrap_or(f32::NAN);
    mean.is_finite().then_some(mean)
}

/// Sample standard deviation (n - 1 denominator).
#[must_use]
pub fn std_dev(values: &[f32]) -> Option<f32> {
    let values = finite(values);
    if values.len() < 2 {
        return None;
    }
    let mean = mean(&values)?;
    let variance =
        values.iter().map(|x| (x - mean).powi(2)).sum::<f32>() / (values.len() - 1) as f32;
    Some(variance.sqrt())
}

/// Quantile `p` (in `[0, 1]`) of already-sorted data using linear
/// interpolation between closest ranks.
#[must_use]
pub fn quantile(sorted: &[f32], p: f32) -> f32 {
    if sorted.is_empty() {
        return f32::NAN;
    }
    if sorted.len() == 1 {
        return sorted[0];
    }

    let k = p.clamp(0.0, 1.0) * (sorted.len() - 1) as f32;
    let f = k.floor() as usize;
    let c = k.ceil() as usize;

    if f == c || c >= sorted.len() {
        sorted[f.min(sorted.len() - 1)]
    } else {
        let d = k - f as f32;
        sorted[f] * (1.0 - d) + sorted[c] * d
    }
}

/// Smallest positive gap between distinct sorted values, used as the data
/// resolution for bar widths and jitter.
#[must_use]
pub fn resolution(values: &[f32]) -> f32 {
    let sorted = sorted_finite(values);
    let gap = sorted
        .windows(2)
        .map(|w| w[1] - w[0])
        .filter(|d| *d > f32::EPSILON)
        .fold(f32::INFINITY, f32::min);
    if gap.is_finite() {
        gap
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_extent_skips_nan() {
        assert_eq!(extent(&[3.0, f32::NAN, -1.0, 7.5]), Some((-1.0, 7.5)));
        assert_eq!(extent(&[f32::NAN]), None);
        assert_eq!(extent(&[]), None);
    }

    #[test]
    fn test_mean_and_sd() {
        assert_relative_eq!(mean(&[1.0, 2.0, 3.0, 4.0]).unwrap(), 2.5);
        assert_relative_eq!(std_dev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap(), 2.138_09, epsilon = 1e-4);
        assert!(std_dev(&[1.0]).is_none());
    }

    #[test]
    fn test_quantile_linear_interpolation() {
        let sorted = [1.0, 2.0, 3.0, 4.0, 5.0, 100.0];
        assert_relative_eq!(quantile(&sorted, 0.25), 2.25);
        assert_relative_eq!(quantile(&sorted, 0.5), 3.5);
        assert_relative_eq!(quantile(&sorted, 0.75), 4.75);
        assert_relative_eq!(quantile(&sorted, 0.0), 1.0);
        assert_relative_eq!(quantile(&sorted, 1.0), 100.0);
    }

    #[test]
    fn test_resolution() {
        assert_relative_eq!(resolution(&[1.0, 3.0, 3.0, 4.0, 10.0]), 1.0);
        assert_relative_eq!(resolution(&[5.0, 5.0]), 1.0);
    }
}
