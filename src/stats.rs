//! Scalar statistics helpers used by the distribution container and the
//! nested-sampling evidence accumulator.

use std::cmp::Ordering;

/// Comparison function for sorting f64 slices, treating NAN as greater than
/// all real values.
pub(crate) fn cmp_f64(a: &f64, b: &f64) -> Ordering {
    if a.is_nan() {
        return Ordering::Greater;
    }
    if b.is_nan() {
        return Ordering::Less;
    }
    a.partial_cmp(b).unwrap_or(Ordering::Equal)
}

/// Computes the `q`-th percentile (0..=100) of an ascending-sorted slice with
/// linear interpolation between closest ranks, matching NumPy's default
/// `percentile` behavior.
///
/// The slice must be non-empty and sorted; callers that hold an unsorted
/// sample set should use [`percentile`] instead.
pub fn percentile_of_sorted(sorted: &[f64], q: f64) -> f64 {
    debug_assert!(!sorted.is_empty());
    let rank = q / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        sorted[lo] + (rank - lo as f64) * (sorted[hi] - sorted[lo])
    }
}

/// Sorts a copy of `samples` and computes the `q`-th percentile.
pub fn percentile(samples: &[f64], q: f64) -> f64 {
    let mut sorted = samples.to_vec();
    sorted.sort_unstable_by(cmp_f64);
    percentile_of_sorted(&sorted, q)
}

pub fn mean(x: &[f64]) -> f64 {
    x.iter().sum::<f64>() / x.len() as f64
}

/// Population standard deviation (ddof = 0).
pub fn std(x: &[f64]) -> f64 {
    let m = mean(x);
    (x.iter().map(|&v| (v - m).powi(2)).sum::<f64>() / x.len() as f64).sqrt()
}

/// Computes `ln(exp(a) + exp(b))` without overflow; the identity element is
/// negative infinity.
pub fn logaddexp(a: f64, b: f64) -> f64 {
    if a == f64::NEG_INFINITY {
        return b;
    }
    if b == f64::NEG_INFINITY {
        return a;
    }
    let m = a.max(b);
    m + ((a - m).exp() + (b - m).exp()).ln()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_percentile_single() {
        assert_eq!(percentile(&[1.0], 50.0), 1.0);
        assert_eq!(percentile(&[1.0], 0.0), 1.0);
        assert_eq!(percentile(&[1.0], 100.0), 1.0);
    }

    #[test]
    fn test_percentile_interpolation() {
        assert_abs_diff_eq!(percentile(&[1.0, 2.0, 3.0, 4.0], 50.0), 2.5);
        assert_abs_diff_eq!(percentile(&[1.0, 2.0, 3.0], 50.0), 2.0);
        assert_abs_diff_eq!(percentile(&[4.0, 1.0, 3.0, 2.0], 25.0), 1.75);
    }

    #[test]
    fn test_percentile_ci_points() {
        let x: Vec<f64> = (0..=100).map(|i| i as f64).collect();
        assert_abs_diff_eq!(percentile(&x, 2.5), 2.5, epsilon = 1e-12);
        assert_abs_diff_eq!(percentile(&x, 97.5), 97.5, epsilon = 1e-12);
    }

    #[test]
    fn test_mean_and_std() {
        let x = [1.0, 2.0, 3.0, 4.0];
        assert_abs_diff_eq!(mean(&x), 2.5);
        assert_abs_diff_eq!(std(&x), 1.25_f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_logaddexp_identity() {
        assert_eq!(logaddexp(f64::NEG_INFINITY, 1.5), 1.5);
        assert_eq!(logaddexp(1.5, f64::NEG_INFINITY), 1.5);
        assert_eq!(
            logaddexp(f64::NEG_INFINITY, f64::NEG_INFINITY),
            f64::NEG_INFINITY
        );
    }

    #[test]
    fn test_logaddexp_equal_terms() {
        assert_abs_diff_eq!(logaddexp(0.0, 0.0), 2.0_f64.ln(), epsilon = 1e-12);
        // Large magnitudes must not overflow.
        assert_abs_diff_eq!(
            logaddexp(1000.0, 1000.0),
            1000.0 + 2.0_f64.ln(),
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_cmp_f64_nan_last() {
        let mut s = [1.0, f64::NAN, 0.5];
        s.sort_by(cmp_f64);
        assert_eq!(s[0], 0.5);
        assert_eq!(s[1], 1.0);
        assert!(s[2].is_nan());
    }
}
