//! Approximate significance test for a Pearson coefficient
//!
//! The coefficient is turned into a Student's t statistic and pushed through an
//! approximate t-distribution CDF. The incomplete beta function is approximated by
//! its leading term, with the log-gamma function from the Lanczos series. Values are
//! only good enough to decide which side of a significance threshold a result falls
//! on.

use crate::types::{InferenceError, Result};

const LANCZOS_COEFFICIENTS: [f64; 6] = [
    76.180_091_729_471_46,
    -86.505_320_329_416_77,
    24.014_098_240_830_91,
    -1.231_739_572_450_155,
    0.120_865_097_386_617_9e-2,
    -0.539_523_938_495_3e-5,
];

/// Two-sided p-value for correlation `r` observed over `n` samples
///
/// `r` is clamped into `[-1, 1]`; at `|r| = 1` the p-value is 0 and at `r = 0` it
/// is 1. Returns `NumericalDomain` if the approximation produces a non-finite value.
pub fn p_value(r: f64, n: usize) -> Result<f64> {
    if n <= 2 {
        return Ok(1.0);
    }
    if r.is_nan() {
        return Err(InferenceError::NumericalDomain(
            "correlation coefficient is NaN".to_string(),
        ));
    }

    let r = r.clamp(-1.0, 1.0);
    let df = (n - 2) as f64;
    let t = r * (df / (1.0 - r * r)).sqrt();
    let p = 2.0 * (1.0 - t_distribution_cdf(t.abs(), df));

    if !p.is_finite() {
        return Err(InferenceError::NumericalDomain(format!(
            "p-value for r={} n={} is not finite",
            r, n
        )));
    }
    Ok(p.clamp(0.0, 1.0))
}

/// Approximate CDF of Student's t distribution for `t >= 0`
pub fn t_distribution_cdf(t: f64, df: f64) -> f64 {
    let x = df / (df + t * t);
    1.0 - 0.5 * incomplete_beta(0.5 * df, 0.5, x)
}

/// Leading-term approximation of the regularized incomplete beta function
pub fn incomplete_beta(a: f64, b: f64, x: f64) -> f64 {
    if !(0.0..=1.0).contains(&x) || x == 0.0 {
        return 0.0;
    }
    if x == 1.0 {
        return 1.0;
    }
    x.powf(a) * (1.0 - x).powf(b) / (a * beta(a, b))
}

/// Beta function via log-gamma
pub fn beta(a: f64, b: f64) -> f64 {
    (ln_gamma(a) + ln_gamma(b) - ln_gamma(a + b)).exp()
}

/// Natural log of the gamma function for `x > 0`
pub fn ln_gamma(x: f64) -> f64 {
    let mut y = x;
    let tmp = x + 5.5;
    let tmp = tmp - (x + 0.5) * tmp.ln();

    let mut series = 1.000_000_000_190_015;
    for coefficient in LANCZOS_COEFFICIENTS {
        y += 1.0;
        series += coefficient / y;
    }

    -tmp + (2.506_628_274_631_000_5 * series / x).ln()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ln_gamma_known_values() {
        // Gamma(1) = Gamma(2) = 1, Gamma(5) = 24, Gamma(0.5) = sqrt(pi)
        assert!(ln_gamma(1.0).abs() < 1e-9);
        assert!(ln_gamma(2.0).abs() < 1e-9);
        assert!((ln_gamma(5.0) - 24f64.ln()).abs() < 1e-9);
        assert!((ln_gamma(0.5) - std::f64::consts::PI.sqrt().ln()).abs() < 1e-9);
    }

    #[test]
    fn test_beta() {
        // B(1, 1) = 1, B(2, 3) = 1/12
        assert!((beta(1.0, 1.0) - 1.0).abs() < 1e-9);
        assert!((beta(2.0, 3.0) - 1.0 / 12.0).abs() < 1e-9);
    }

    #[test]
    fn test_incomplete_beta_bounds() {
        assert_eq!(incomplete_beta(2.0, 0.5, 0.0), 0.0);
        assert_eq!(incomplete_beta(2.0, 0.5, 1.0), 1.0);
        assert_eq!(incomplete_beta(2.0, 0.5, -0.1), 0.0);
        assert_eq!(incomplete_beta(2.0, 0.5, 1.5), 0.0);
    }

    #[test]
    fn test_p_value_extremes() {
        assert_eq!(p_value(1.0, 50).unwrap(), 0.0);
        assert_eq!(p_value(-1.0, 50).unwrap(), 0.0);
        assert_eq!(p_value(0.0, 50).unwrap(), 1.0);
        assert_eq!(p_value(0.5, 2).unwrap(), 1.0);
        // Out-of-range input is clamped
        assert_eq!(p_value(1.5, 50).unwrap(), 0.0);
    }

    #[test]
    fn test_p_value_orders_by_strength() {
        let strong = p_value(0.95, 100).unwrap();
        let weak = p_value(0.1, 100).unwrap();
        assert!(strong < 0.05);
        assert!(strong < weak);
        for r in [-0.99, -0.5, -0.01, 0.2, 0.75, 0.999] {
            let p = p_value(r, 30).unwrap();
            assert!((0.0..=1.0).contains(&p), "r={} p={}", r, p);
        }
    }

    #[test]
    fn test_p_value_rejects_nan() {
        assert!(matches!(
            p_value(f64::NAN, 20),
            Err(InferenceError::NumericalDomain(_))
        ));
    }
}
