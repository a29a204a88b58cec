use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::FitError;

/// Coefficient of determination; undefined when the observations are constant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RSquared {
    Defined(f64),
    Undefined,
}

impl RSquared {
    pub fn from_sums(ss_res: f64, ss_tot: f64) -> Self {
        if ss_tot > 0.0 && ss_tot.is_finite() {
            RSquared::Defined(1.0 - ss_res / ss_tot)
        } else {
            RSquared::Undefined
        }
    }

    pub fn value(self) -> Option<f64> {
        match self {
            RSquared::Defined(value) => Some(value),
            RSquared::Undefined => None,
        }
    }

    pub fn is_defined(self) -> bool {
        matches!(self, RSquared::Defined(_))
    }
}

impl fmt::Display for RSquared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RSquared::Defined(value) => write!(f, "{value:.4}"),
            RSquared::Undefined => f.write_str("undefined"),
        }
    }
}

fn check_lengths(actual: &[f64], predicted: &[f64]) -> Result<(), FitError> {
    if actual.is_empty() {
        return Err(FitError::EmptyObservations);
    }
    if actual.len() != predicted.len() {
        return Err(FitError::LengthMismatch {
            expected: actual.len(),
            found: predicted.len(),
        });
    }
    Ok(())
}

pub fn residual_sum_of_squares(actual: &[f64], predicted: &[f64]) -> f64 {
    actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .sum()
}

/// Total sum of squares about the mean of `actual`. Exactly zero for constant data.
pub fn total_sum_of_squares(actual: &[f64]) -> f64 {
    let Some(first) = actual.first() else {
        return 0.0;
    };
    if actual.iter().all(|v| v == first) {
        return 0.0;
    }
    let mean = actual.iter().sum::<f64>() / actual.len() as f64;
    actual.iter().map(|v| (v - mean).powi(2)).sum()
}

pub fn r_squared(actual: &[f64], predicted: &[f64]) -> Result<RSquared, FitError> {
    check_lengths(actual, predicted)?;
    Ok(RSquared::from_sums(
        residual_sum_of_squares(actual, predicted),
        total_sum_of_squares(actual),
    ))
}

pub fn mean_squared_error(actual: &[f64], predicted: &[f64]) -> Result<f64, FitError> {
    check_lengths(actual, predicted)?;
    Ok(residual_sum_of_squares(actual, predicted) / actual.len() as f64)
}

/// `n * ln(mse) + 2k`. A perfect fit (`mse == 0`) yields negative infinity.
pub fn aic(n: usize, mse: f64, num_params: usize) -> f64 {
    n as f64 * mse.ln() + 2.0 * num_params as f64
}

/// `n * ln(mse) + k * ln(n)`.
pub fn bic(n: usize, mse: f64, num_params: usize) -> f64 {
    n as f64 * mse.ln() + num_params as f64 * (n as f64).ln()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitMetrics {
    pub ss_res: f64,
    pub ss_tot: f64,
    pub r_squared: RSquared,
    pub mse: f64,
    pub aic: f64,
    pub bic: f64,
    pub n: usize,
    pub k: usize,
}

impl FitMetrics {
    pub fn compute(actual: &[f64], predicted: &[f64], num_params: usize) -> Result<Self, FitError> {
        check_lengths(actual, predicted)?;
        let n = actual.len();
        let ss_res = residual_sum_of_squares(actual, predicted);
        let ss_tot = total_sum_of_squares(actual);
        let mse = ss_res / n as f64;
        Ok(Self {
            ss_res,
            ss_tot,
            r_squared: RSquared::from_sums(ss_res, ss_tot),
            mse,
            aic: aic(n, mse, num_params),
            bic: bic(n, mse, num_params),
            n,
            k: num_params,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_prediction_has_unit_r_squared() {
        for actual in [vec![1.0, 2.0, 3.0], vec![0.1, -4.0, 0.7, 9.5], vec![0.0, 1.0]] {
            assert_eq!(r_squared(&actual, &actual).unwrap(), RSquared::Defined(1.0));
        }
    }

    #[test]
    fn total_sum_uses_observed_mean() {
        let actual = [1.0, 2.0, 3.0];
        let predicted = [2.0, 2.0, 2.0];
        assert!((total_sum_of_squares(&actual) - 2.0).abs() < 1e-12);
        let r2 = r_squared(&actual, &predicted).unwrap().value().unwrap();
        assert!(r2.abs() < 1e-12);
    }

    #[test]
    fn constant_observations_are_undefined() {
        let r2 = r_squared(&[1.0, 1.0, 1.0], &[0.0, 1.0, 2.0]).unwrap();
        assert_eq!(r2, RSquared::Undefined);
        assert_eq!(r2.to_string(), "undefined");
        assert_eq!(r_squared(&[0.1; 7], &[0.1; 7]).unwrap(), RSquared::Undefined);
    }

    #[test]
    fn information_criteria_grow_with_parameters() {
        for n in [5usize, 40, 200] {
            for mse in [0.01, 0.5, 3.0] {
                for k in 0..6 {
                    assert!(aic(n, mse, k + 1) > aic(n, mse, k));
                    assert!(bic(n, mse, k + 1) > bic(n, mse, k));
                }
            }
        }
    }

    #[test]
    fn information_criteria_match_closed_form() {
        let value = aic(10, 0.25, 2);
        assert!((value - (10.0 * 0.25f64.ln() + 4.0)).abs() < 1e-12);
        let value = bic(10, 0.25, 2);
        assert!((value - (10.0 * 0.25f64.ln() + 2.0 * 10f64.ln())).abs() < 1e-12);
    }

    #[test]
    fn metrics_bundle_is_consistent() {
        let actual = [0.0, 0.5, 1.0, 0.5];
        let predicted = [0.1, 0.4, 0.9, 0.6];
        let metrics = FitMetrics::compute(&actual, &predicted, 2).unwrap();
        assert!((metrics.ss_res - 0.04).abs() < 1e-12);
        assert!((metrics.mse - 0.01).abs() < 1e-12);
        assert!((metrics.ss_tot - 0.5).abs() < 1e-12);
        assert!((metrics.r_squared.value().unwrap() - 0.92).abs() < 1e-12);
        assert_eq!(metrics.n, 4);
    }

    #[test]
    fn rejects_mismatched_lengths() {
        assert_eq!(
            mean_squared_error(&[1.0, 2.0], &[1.0]),
            Err(FitError::LengthMismatch {
                expected: 2,
                found: 1
            })
        );
        assert_eq!(r_squared(&[], &[]), Err(FitError::EmptyObservations));
    }
}
