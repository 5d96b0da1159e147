//! Pearson correlation and lag search over physical value series

/// Fewest samples a correlation is computed from
pub const MIN_SAMPLES: usize = 10;

/// Largest lag searched, in samples
pub const MAX_LAG: usize = 10;

/// Pearson correlation coefficient of two equally long series
///
/// Returns 0 for series shorter than two samples, series of different lengths, and
/// series with zero variance. The result is clamped into `[-1, 1]`.
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    if x.len() != y.len() || x.len() < 2 {
        return 0.0;
    }

    let n = x.len() as f64;
    let mean_x = x.iter().sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;

    let mut numerator = 0.0;
    let mut denominator_x = 0.0;
    let mut denominator_y = 0.0;
    for (a, b) in x.iter().zip(y) {
        let diff_x = a - mean_x;
        let diff_y = b - mean_y;
        numerator += diff_x * diff_y;
        denominator_x += diff_x * diff_x;
        denominator_y += diff_y * diff_y;
    }

    if denominator_x == 0.0 || denominator_y == 0.0 {
        return 0.0;
    }

    let r = numerator / (denominator_x * denominator_y).sqrt();
    if r.is_finite() {
        r.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

/// Correlation of `a` shifted by `lag` samples against `b`
///
/// A positive lag pairs `a[i + lag]` with `b[i]`; a negative lag pairs `a[i]` with
/// `b[i - lag]`. Fewer than [`MIN_SAMPLES`] overlapping samples give 0.
pub fn cross_correlation(a: &[f64], b: &[f64], lag: i32) -> f64 {
    let n = a.len().min(b.len());
    let shift = lag.unsigned_abs() as usize;
    if shift >= n {
        return 0.0;
    }

    let overlap = n - shift;
    if overlap < MIN_SAMPLES {
        return 0.0;
    }

    if lag >= 0 {
        pearson(&a[shift..shift + overlap], &b[..overlap])
    } else {
        pearson(&a[..overlap], &b[shift..shift + overlap])
    }
}

/// Lag in `[-L, L]`, `L = min(10, len / 10)`, with the largest absolute cross-correlation
///
/// Ties keep the earliest lag searched, starting from `-L`.
pub fn best_lag(a: &[f64], b: &[f64]) -> i32 {
    let max_lag = MAX_LAG.min(a.len().min(b.len()) / 10) as i32;
    let mut best = 0.0f64;
    let mut best_lag = 0;

    for lag in -max_lag..=max_lag {
        let correlation = cross_correlation(a, b, lag);
        if correlation.abs() > best.abs() {
            best = correlation;
            best_lag = lag;
        }
    }

    best_lag
}
