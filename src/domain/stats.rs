//! Shared numeric helpers over `f64` slices.
//!
//! Degenerate inputs (empty slices, zero variance) resolve to 0 rather than
//! NaN.

pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn sum_sq_dev(values: &[f64]) -> f64 {
    let m = mean(values);
    values.iter().map(|v| (v - m) * (v - m)).sum()
}

/// Standard deviation with an n-1 denominator. Fewer than two values ⇒ 0.
pub fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    (sum_sq_dev(values) / (values.len() - 1) as f64).sqrt()
}

/// Standard deviation with an n denominator. Empty ⇒ 0.
pub fn population_std(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    (sum_sq_dev(values) / values.len() as f64).sqrt()
}

/// Percentile `q` in [0, 100] using linear interpolation between closest ranks.
pub fn percentile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = (q.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Central moments m2, m3, m4 (population).
fn central_moments(values: &[f64]) -> (f64, f64, f64) {
    let n = values.len() as f64;
    let m = mean(values);
    let (mut m2, mut m3, mut m4) = (0.0, 0.0, 0.0);
    for v in values {
        let d = v - m;
        let d2 = d * d;
        m2 += d2;
        m3 += d2 * d;
        m4 += d2 * d2;
    }
    (m2 / n, m3 / n, m4 / n)
}

/// Bias-corrected sample skewness (G1). Needs at least 3 values.
pub fn skewness(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 3 {
        return 0.0;
    }
    let (m2, m3, _) = central_moments(values);
    if m2 <= f64::EPSILON * f64::EPSILON {
        return 0.0;
    }
    let n = n as f64;
    let g1 = m3 / m2.powf(1.5);
    (n * (n - 1.0)).sqrt() / (n - 2.0) * g1
}

/// Bias-corrected excess kurtosis (G2). Needs at least 4 values.
pub fn excess_kurtosis(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 4 {
        return 0.0;
    }
    let (m2, _, m4) = central_moments(values);
    if m2 <= f64::EPSILON * f64::EPSILON {
        return 0.0;
    }
    let n = n as f64;
    let g2 = m4 / (m2 * m2) - 3.0;
    ((n + 1.0) * g2 + 6.0) * (n - 1.0) / ((n - 2.0) * (n - 3.0))
}

/// Sample covariance of two equal-length slices. Fewer than two pairs ⇒ 0.
pub fn sample_covariance(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    if n < 2 {
        return 0.0;
    }
    let (a, b) = (&a[..n], &b[..n]);
    let (ma, mb) = (mean(a), mean(b));
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - ma) * (y - mb))
        .sum::<f64>()
        / (n - 1) as f64
}

/// Pearson correlation. Degenerate input (short or constant) ⇒ 0.
pub fn correlation(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    if n < 2 {
        return 0.0;
    }
    let (a, b) = (&a[..n], &b[..n]);
    let denom = sample_std(a) * sample_std(b);
    if denom == 0.0 {
        return 0.0;
    }
    let r = sample_covariance(a, b) / denom;
    if r.is_finite() { r.clamp(-1.0, 1.0) } else { 0.0 }
}

/// Close-to-close fractional changes. Steps from a zero price are skipped.
pub fn pct_change(values: &[f64]) -> Vec<f64> {
    values
        .windows(2)
        .filter(|w| w[0] != 0.0)
        .map(|w| w[1] / w[0] - 1.0)
        .collect()
}

/// The trailing `min(len(a), len(b))` elements of each slice.
pub fn aligned_tails<'a>(a: &'a [f64], b: &'a [f64]) -> (&'a [f64], &'a [f64]) {
    let n = a.len().min(b.len());
    (&a[a.len() - n..], &b[b.len() - n..])
}

/// Maximum peak-to-trough decline of `values` as a positive fraction.
/// The first value is the first peak.
pub fn max_drawdown(values: &[f64]) -> f64 {
    let Some(&first) = values.first() else {
        return 0.0;
    };
    let mut peak = first;
    let mut max_dd = 0.0_f64;
    for &v in values {
        if v > peak {
            peak = v;
        } else if peak > 0.0 {
            max_dd = max_dd.max((peak - v) / peak);
        }
    }
    max_dd
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn mean_and_std() {
        let v = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_relative_eq!(mean(&v), 5.0);
        assert_relative_eq!(population_std(&v), 2.0);
        assert_relative_eq!(sample_std(&v), (32.0_f64 / 7.0).sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn degenerate_inputs_are_zero() {
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(sample_std(&[1.0]), 0.0);
        assert_eq!(population_std(&[]), 0.0);
        assert_eq!(percentile(&[], 5.0), 0.0);
        assert_eq!(skewness(&[1.0, 2.0]), 0.0);
        assert_eq!(excess_kurtosis(&[1.0, 2.0, 3.0]), 0.0);
        assert_eq!(correlation(&[1.0], &[1.0]), 0.0);
        assert_eq!(max_drawdown(&[]), 0.0);
    }

    #[test]
    fn percentile_interpolates_linearly() {
        let v = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_relative_eq!(percentile(&v, 0.0), 1.0);
        assert_relative_eq!(percentile(&v, 50.0), 3.0);
        assert_relative_eq!(percentile(&v, 100.0), 5.0);
        // rank = 0.05 * 4 = 0.2
        assert_relative_eq!(percentile(&v, 5.0), 1.2, epsilon = 1e-12);
        // order of input does not matter
        assert_relative_eq!(percentile(&[5.0, 1.0, 3.0, 2.0, 4.0], 25.0), 2.0);
    }

    #[test]
    fn skew_of_symmetric_data_is_zero() {
        assert_relative_eq!(skewness(&[1.0, 2.0, 3.0, 4.0, 5.0]), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn skew_matches_bias_corrected_formula() {
        let v = [0.0, 0.0, 0.0, 6.0];
        let m2: f64 = (3.0 * 2.25 + 20.25) / 4.0;
        let m3: f64 = (3.0 * -3.375 + 91.125) / 4.0;
        let expected = (12.0_f64).sqrt() / 2.0 * m3 / m2.powf(1.5);
        assert_relative_eq!(skewness(&v), expected, epsilon = 1e-12);
        assert_relative_eq!(skewness(&v), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn kurtosis_of_point_mass_outlier() {
        // Four zeros and one 5: G2 = 5.0 for this shape
        let v = [0.0, 0.0, 0.0, 0.0, 5.0];
        assert_relative_eq!(excess_kurtosis(&v), 5.0, epsilon = 1e-12);
    }

    #[test]
    fn constant_series_has_zero_moments() {
        let v = [3.0; 10];
        assert_eq!(skewness(&v), 0.0);
        assert_eq!(excess_kurtosis(&v), 0.0);
        assert_eq!(sample_std(&v), 0.0);
    }

    #[test]
    fn covariance_and_correlation() {
        let a = [1.0, 2.0, 3.0, 4.0];
        let b = [2.0, 4.0, 6.0, 8.0];
        assert_relative_eq!(sample_covariance(&a, &b), 10.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(correlation(&a, &b), 1.0, epsilon = 1e-12);

        let c = [8.0, 6.0, 4.0, 2.0];
        assert_relative_eq!(correlation(&a, &c), -1.0, epsilon = 1e-12);
        assert_eq!(correlation(&a, &[1.0; 4]), 0.0);
    }

    #[test]
    fn pct_change_skips_zero_base() {
        let r = pct_change(&[100.0, 110.0]);
        assert_eq!(r.len(), 1);
        assert_relative_eq!(r[0], 0.1, epsilon = 1e-12);
        assert_eq!(pct_change(&[0.0, 5.0, 10.0]), vec![1.0]);
        assert!(pct_change(&[1.0]).is_empty());
    }

    #[test]
    fn aligned_tails_keeps_most_recent() {
        let (a, b) = aligned_tails(&[1.0, 2.0, 3.0], &[9.0, 8.0]);
        assert_eq!(a, &[2.0, 3.0]);
        assert_eq!(b, &[9.0, 8.0]);
    }

    #[test]
    fn drawdown_from_running_peak() {
        assert_relative_eq!(max_drawdown(&[100.0, 120.0, 90.0, 130.0, 117.0]), 0.25);
        assert_eq!(max_drawdown(&[1.0, 2.0, 3.0]), 0.0);
    }
}
