//! Lag-1 Granger causality via an F-test on nested OLS regressions.

use ndarray::{Array1, Array2};
use statrs::distribution::{ContinuousCDF, FisherSnedecor};
use thiserror::Error;

const PIVOT_TOLERANCE: f64 = 1e-12;

#[derive(Debug, Error, PartialEq)]
pub enum GrangerError {
    #[error("series too short: {0} observations")]
    TooShort(usize),
    #[error("series lengths differ: {0} and {1}")]
    LengthMismatch(usize, usize),
    #[error("regression is singular")]
    Singular,
    #[error("unrestricted regression fits exactly")]
    ZeroResidual,
    #[error("F statistic is not finite")]
    NonFinite,
    #[error("F distribution: {0}")]
    Distribution(String),
}

/// p-value for "`x` does not Granger-cause `y`" at lag 1.
///
/// Restricted model `y[t] ~ 1 + y[t-1]`, unrestricted adds `x[t-1]`; the
/// statistic is the SSR-based F with (1, n_obs - 3) degrees of freedom.
pub fn granger_p_value(y: &[f64], x: &[f64]) -> Result<f64, GrangerError> {
    if y.len() != x.len() {
        return Err(GrangerError::LengthMismatch(y.len(), x.len()));
    }
    let n_obs = y.len().saturating_sub(1);
    if n_obs < 5 {
        return Err(GrangerError::TooShort(y.len()));
    }

    let target = Array1::from_iter(y[1..].iter().copied());
    let mut restricted = Array2::<f64>::ones((n_obs, 2));
    let mut unrestricted = Array2::<f64>::ones((n_obs, 3));
    for t in 0..n_obs {
        restricted[[t, 1]] = y[t];
        unrestricted[[t, 1]] = y[t];
        unrestricted[[t, 2]] = x[t];
    }

    let ssr_r = residual_sum_of_squares(&restricted, &target)?;
    let ssr_u = residual_sum_of_squares(&unrestricted, &target)?;
    if ssr_u <= f64::EPSILON * ssr_r.max(1.0) {
        return Err(GrangerError::ZeroResidual);
    }

    let df_denom = (n_obs - 3) as f64;
    let f = (ssr_r - ssr_u).max(0.0) / (ssr_u / df_denom);
    if !f.is_finite() {
        return Err(GrangerError::NonFinite);
    }

    let dist = FisherSnedecor::new(1.0, df_denom)
        .map_err(|e| GrangerError::Distribution(e.to_string()))?;
    Ok(dist.sf(f).clamp(0.0, 1.0))
}

fn residual_sum_of_squares(design: &Array2<f64>, y: &Array1<f64>) -> Result<f64, GrangerError> {
    let xtx = design.t().dot(design);
    let xty = design.t().dot(y);
    let beta = solve(xtx, xty)?;
    let residual = y - &design.dot(&beta);
    Ok(residual.dot(&residual))
}

/// Gaussian elimination with partial pivoting.
fn solve(mut a: Array2<f64>, mut b: Array1<f64>) -> Result<Array1<f64>, GrangerError> {
    let n = b.len();
    let scale = a.iter().fold(0.0f64, |m, v| m.max(v.abs()));
    if scale == 0.0 {
        return Err(GrangerError::Singular);
    }

    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| a[[i, col]].abs().total_cmp(&a[[j, col]].abs()))
            .unwrap_or(col);
        if a[[pivot, col]].abs() <= PIVOT_TOLERANCE * scale {
            return Err(GrangerError::Singular);
        }
        if pivot != col {
            for k in 0..n {
                a.swap([col, k], [pivot, k]);
            }
            b.swap(col, pivot);
        }
        for row in (col + 1)..n {
            let factor = a[[row, col]] / a[[col, col]];
            for k in col..n {
                a[[row, k]] -= factor * a[[col, k]];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = Array1::<f64>::zeros(n);
    for row in (0..n).rev() {
        let tail: f64 = ((row + 1)..n).map(|k| a[[row, k]] * x[k]).sum();
        x[row] = (b[row] - tail) / a[[row, row]];
    }
    Ok(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn noise(seed: u64, n: usize) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n).map(|_| rng.random::<f64>() - 0.5).collect()
    }

    #[test]
    fn test_solve_small_system() {
        let a = ndarray::arr2(&[[2.0, 1.0], [1.0, 3.0]]);
        let b = ndarray::arr1(&[3.0, 5.0]);
        let x = solve(a, b).unwrap();
        assert!((x[0] - 0.8).abs() < 1e-12);
        assert!((x[1] - 1.4).abs() < 1e-12);
    }

    #[test]
    fn test_detects_lagged_driver() {
        let x = noise(7, 40);
        let e = noise(11, 40);
        let mut y = vec![0.0; 40];
        for t in 1..40 {
            y[t] = 0.9 * x[t - 1] + 0.05 * e[t];
        }
        let p = granger_p_value(&y, &x).unwrap();
        assert!(p < 0.001, "p = {}", p);
    }

    #[test]
    fn test_constant_target_is_singular() {
        let x = noise(3, 20);
        let y = vec![0.25; 20];
        assert_eq!(granger_p_value(&y, &x), Err(GrangerError::Singular));
    }

    #[test]
    fn test_short_series_fail() {
        assert_eq!(
            granger_p_value(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]),
            Err(GrangerError::TooShort(3))
        );
    }
}
