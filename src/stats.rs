//! Standard numeric helpers shared by analytics and strategy metrics.

/// Arithmetic mean; 0.0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n − 1); 0.0 with fewer than two samples.
pub fn stddev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance =
        values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

/// Population standard deviation (n); 0.0 for an empty slice.
pub fn stddev_population(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Empirical quantile by sorted index: the element at
/// `floor(q * n)` (clamped), matching the analytics VaR convention.
pub fn quantile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let index = ((q * sorted.len() as f64) as usize).min(sorted.len() - 1);
    sorted[index]
}

/// Third standardized central moment; 0.0 with fewer than three samples.
pub fn skewness(values: &[f64]) -> f64 {
    if values.len() < 3 {
        return 0.0;
    }
    let m = mean(values);
    let n = values.len() as f64;
    let (mut m2, mut m3) = (0.0, 0.0);
    for v in values {
        let d = v - m;
        m2 += d * d;
        m3 += d * d * d;
    }
    m2 /= n;
    m3 /= n;
    let sd = m2.sqrt();
    if sd > 0.0 {
        m3 / (sd * sd * sd)
    } else {
        0.0
    }
}

/// Excess kurtosis (fourth standardized moment − 3); 0.0 with fewer than
/// four samples.
pub fn kurtosis(values: &[f64]) -> f64 {
    if values.len() < 4 {
        return 0.0;
    }
    let m = mean(values);
    let n = values.len() as f64;
    let (mut m2, mut m4) = (0.0, 0.0);
    for v in values {
        let d = v - m;
        m2 += d * d;
        m4 += d * d * d * d;
    }
    m2 /= n;
    m4 /= n;
    let sd = m2.sqrt();
    if sd > 0.0 {
        m4 / (sd * sd * sd * sd) - 3.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_basics() {
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(mean(&[2.0]), 2.0);
        assert_eq!(mean(&[1.0, 2.0, 3.0]), 2.0);
    }

    #[test]
    fn stddev_known_value() {
        // Sample stddev of [2, 4, 4, 4, 5, 5, 7, 9] is ~2.138.
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((stddev(&values) - 2.13809).abs() < 1e-4);
        assert!((stddev_population(&values) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn stddev_degenerate() {
        assert_eq!(stddev(&[]), 0.0);
        assert_eq!(stddev(&[1.0]), 0.0);
        assert_eq!(stddev(&[3.0, 3.0, 3.0]), 0.0);
    }

    #[test]
    fn quantile_picks_sorted_index() {
        let values = [5.0, 1.0, 3.0, 2.0, 4.0];
        assert_eq!(quantile(&values, 0.0), 1.0);
        assert_eq!(quantile(&values, 0.5), 3.0);
        // floor(0.99 * 5) = 4 → the largest element.
        assert_eq!(quantile(&values, 0.99), 5.0);
        assert_eq!(quantile(&[], 0.5), 0.0);
    }

    #[test]
    fn skewness_signs() {
        assert!(skewness(&[1.0, 2.0, 3.0]) == 0.0);
        assert!(skewness(&[1.0, 1.0, 1.0, 10.0]) > 0.0);
        assert!(skewness(&[-10.0, 1.0, 1.0, 1.0]) < 0.0);
        assert_eq!(skewness(&[1.0, 2.0]), 0.0);
    }

    #[test]
    fn kurtosis_flat_distribution_is_negative() {
        // Uniform-ish data has negative excess kurtosis.
        let values: Vec<f64> = (0..20).map(|i| i as f64).collect();
        assert!(kurtosis(&values) < 0.0);
        assert_eq!(kurtosis(&[1.0, 2.0, 3.0]), 0.0);
    }

    #[test]
    fn constant_series_has_no_moments() {
        let values = [4.0; 10];
        assert_eq!(skewness(&values), 0.0);
        assert_eq!(kurtosis(&values), 0.0);
    }
}
