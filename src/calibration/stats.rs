//! Order statistics used by the estimator and the dwell calibrator.
//!
//! Inputs are expected to be finite; callers filter before sorting.

use std::cmp::Ordering;

/// Sort ascending with a total order on the finite values we feed in.
pub fn sorted(values: &[f64]) -> Vec<f64> {
    let mut s = values.to_vec();
    s.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    s
}

/// Linear interpolation between `a` and `b`, evaluated from the nearer end.
///
/// Landing exactly on `b` when `t == 1.0` keeps integral ranks on the order
/// statistic itself instead of `a + (b - a)`.
fn lerp(a: f64, b: f64, t: f64) -> f64 {
    let diff = b - a;
    if t >= 0.5 {
        b - diff * (1.0 - t)
    } else {
        a + diff * t
    }
}

/// `q`-quantile (`q` in [0, 1]) of an ascending-sorted slice.
///
/// Fractional rank `q·(m−1)`, interpolated between the two bracketing order
/// statistics. Returns `None` for an empty slice.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    let m = sorted.len();
    if m == 0 {
        return None;
    }
    if m == 1 {
        return Some(sorted[0]);
    }

    let rank = (q * (m - 1) as f64).clamp(0.0, (m - 1) as f64);
    let lo = rank.floor();
    let lo_idx = lo as usize;
    let hi_idx = (lo_idx + 1).min(m - 1);
    let t = rank - lo;

    let a = sorted[lo_idx];
    let b = sorted[hi_idx];
    if a == b {
        return Some(a);
    }
    Some(lerp(a, b, t))
}

/// `p`-th percentile (`p` in [0, 100]) of an ascending-sorted slice.
pub fn percentile_sorted(sorted: &[f64], p: f64) -> Option<f64> {
    quantile_sorted(sorted, p / 100.0)
}

/// Median of an ascending-sorted slice (mean of the middle pair for even lengths).
pub fn median_sorted(sorted: &[f64]) -> Option<f64> {
    let n = sorted.len();
    if n == 0 {
        return None;
    }
    let mid = n / 2;
    if n % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Median and median absolute deviation `median(|x − median(x)|)`.
pub fn median_mad(values: &[f64]) -> Option<(f64, f64)> {
    let med = median_sorted(&sorted(values))?;
    let deviations: Vec<f64> = values.iter().map(|v| (v - med).abs()).collect();
    let mad = median_sorted(&sorted(&deviations))?;
    Some((med, mad))
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-12;

    #[test]
    fn test_quantile_interpolates_between_order_statistics() {
        let s = [1.0, 2.0, 3.0, 4.0];
        // rank = 0.5 * 3 = 1.5 -> halfway between 2 and 3
        assert!((quantile_sorted(&s, 0.5).unwrap() - 2.5).abs() < EPS);
        // rank = 0.9 * 3 = 2.7 -> 3 + 0.7
        assert!((quantile_sorted(&s, 0.9).unwrap() - 3.7).abs() < EPS);
        assert_eq!(quantile_sorted(&s, 0.0), Some(1.0));
        assert_eq!(quantile_sorted(&s, 1.0), Some(4.0));
    }

    #[test]
    fn test_quantile_edge_lengths() {
        assert_eq!(quantile_sorted(&[], 0.5), None);
        assert_eq!(quantile_sorted(&[7.5], 0.99), Some(7.5));
    }

    #[test]
    fn test_percentile_matches_quantile() {
        let s = sorted(&[5.0, 1.0, 9.0, 3.0, 7.0]);
        assert_eq!(percentile_sorted(&s, 50.0), Some(5.0));
        // rank = 0.95 * 4 = 3.8 -> 7 + 0.8 * 2
        assert!((percentile_sorted(&s, 95.0).unwrap() - 8.6).abs() < EPS);
    }

    #[test]
    fn test_percentile_on_plateau_is_exact() {
        let mut values = vec![2.0; 20];
        values.push(10.0);
        let s = sorted(&values);
        assert_eq!(percentile_sorted(&s, 95.0), Some(2.0));
        assert!((percentile_sorted(&s, 99.0).unwrap() - 8.4).abs() < 1e-9);
    }

    #[test]
    fn test_median_odd_and_even() {
        assert_eq!(median_sorted(&[1.0, 3.0, 8.0]), Some(3.0));
        assert_eq!(median_sorted(&[1.0, 3.0, 5.0, 8.0]), Some(4.0));
        assert_eq!(median_sorted(&[]), None);
    }

    #[test]
    fn test_median_mad() {
        // median 3, |x - 3| = [2, 1, 0, 1, 6] -> MAD 1
        let (med, mad) = median_mad(&[1.0, 2.0, 3.0, 4.0, 9.0]).unwrap();
        assert_eq!(med, 3.0);
        assert_eq!(mad, 1.0);
        assert_eq!(median_mad(&[]), None);
    }
}
