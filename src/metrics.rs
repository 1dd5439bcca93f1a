//! Forecast accuracy metrics

use crate::error::{ForecastError, Result};

/// Root mean squared error.
pub fn rmse(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.is_empty() || actual.len() != predicted.len() {
        return f64::NAN;
    }
    let mse = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .sum::<f64>()
        / actual.len() as f64;
    mse.sqrt()
}

/// Mean absolute error.
pub fn mae(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.is_empty() || actual.len() != predicted.len() {
        return f64::NAN;
    }
    actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).abs())
        .sum::<f64>()
        / actual.len() as f64
}

/// RMSE normalized by the mean absolute actual, in percent.
///
/// Defined as 0 when the denominator is numerically zero.
pub fn nrmse_pct(actual: &[f64], rmse_value: f64) -> f64 {
    if actual.is_empty() {
        return 0.0;
    }
    let denom = actual.iter().map(|v| v.abs()).sum::<f64>() / actual.len() as f64;
    if denom <= 1e-12 {
        0.0
    } else {
        rmse_value / denom * 100.0
    }
}

/// Holdout size: an absolute row count or a fraction of rows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TestSize {
    Rows(usize),
    Fraction(f64),
}

impl TestSize {
    /// Parse a user-supplied string: a value in (0, 1) is a fraction,
    /// anything else is an absolute period count.
    pub fn parse(value: &str) -> Result<Self> {
        let trimmed = value.trim();
        if let Ok(frac) = trimmed.parse::<f64>() {
            if frac > 0.0 && frac < 1.0 {
                return Ok(TestSize::Fraction(frac));
            }
            if frac.fract() == 0.0 && frac >= 1.0 {
                return Ok(TestSize::Rows(frac as usize));
            }
        }
        Err(ForecastError::InvalidParameter(format!(
            "test size must be a fraction in (0,1) or a whole number of periods, got '{}'",
            value
        )))
    }

    /// Concrete holdout length for a frame of `n_rows`, clamped so both
    /// the train and test sides are non-empty.
    pub fn resolve(&self, n_rows: usize) -> usize {
        let raw = match self {
            TestSize::Fraction(f) => (n_rows as f64 * f).round() as usize,
            TestSize::Rows(r) => *r,
        };
        raw.max(1).min(n_rows.saturating_sub(1).max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn rmse_of_exact_predictions_is_zero() {
        assert_approx_eq!(rmse(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]), 0.0);
    }

    #[test]
    fn nrmse_is_zero_on_zero_actuals() {
        assert_approx_eq!(nrmse_pct(&[0.0, 0.0], 5.0), 0.0);
    }

    #[test]
    fn test_size_parsing_and_clamping() {
        assert_eq!(TestSize::parse("0.25").unwrap(), TestSize::Fraction(0.25));
        assert_eq!(TestSize::parse("12").unwrap(), TestSize::Rows(12));
        assert!(TestSize::parse("abc").is_err());

        assert_eq!(TestSize::Rows(100).resolve(30), 29);
        assert_eq!(TestSize::Rows(0).resolve(30), 1);
        assert_eq!(TestSize::Fraction(0.2).resolve(30), 6);
    }
}
