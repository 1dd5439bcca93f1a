//! L2-regularized linear regression on centered normal equations

use crate::error::{ForecastError, Result};
use crate::models::Regressor;
use ndarray::{Array1, Array2, Axis};

/// Ridge regression with an intercept.
///
/// Solves `(XᵀX + αI) β = Xᵀy` on mean-centered data via Cholesky, with
/// a Gauss-Jordan inverse as the fallback for near-singular systems.
#[derive(Debug, Clone)]
pub struct Ridge {
    pub alpha: f64,
    coefficients: Option<Array1<f64>>,
    intercept: f64,
}

impl Ridge {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            coefficients: None,
            intercept: 0.0,
        }
    }

    pub fn coefficients(&self) -> Option<&Array1<f64>> {
        self.coefficients.as_ref()
    }
}

impl Regressor for Ridge {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let n = x.nrows();
        if n == 0 || n != y.len() {
            return Err(ForecastError::MathError(format!(
                "Cannot fit ridge on {} rows with {} targets",
                n,
                y.len()
            )));
        }

        let x_mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| ForecastError::MathError("Empty feature matrix".to_string()))?;
        let y_mean = y.mean().unwrap_or(0.0);
        let x_c = x - &x_mean.view().insert_axis(Axis(0));
        let y_c = y - y_mean;

        let mut gram = x_c.t().dot(&x_c);
        for i in 0..gram.nrows() {
            gram[[i, i]] += self.alpha;
        }
        let moment = x_c.t().dot(&y_c);

        let coef = cholesky_solve(&gram, &moment)
            .or_else(|| gauss_jordan_inverse(&gram).map(|inv| inv.dot(&moment)))
            .ok_or_else(|| {
                ForecastError::MathError("Ridge normal equations are singular".to_string())
            })?;

        self.intercept = y_mean - coef.dot(&x_mean);
        self.coefficients = Some(coef);
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let coef = self
            .coefficients
            .as_ref()
            .ok_or_else(|| ForecastError::MathError("Ridge has not been fitted".to_string()))?;
        Ok(x.dot(coef) + self.intercept)
    }
}

/// Solve a symmetric positive-definite system. A non-PD pivot triggers
/// one retry with a diagonal jitter proportional to the matrix scale.
fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    cholesky_solve_with(a, b).or_else(|| {
        let n = a.nrows();
        let jitter = 1e-8 * a.diag().iter().map(|v| v.abs()).sum::<f64>() / n.max(1) as f64;
        let mut jittered = a.clone();
        for i in 0..n {
            jittered[[i, i]] += jitter;
        }
        cholesky_solve_with(&jittered, b)
    })
}

fn cholesky_solve_with(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    if n != a.ncols() || n != b.len() {
        return None;
    }

    let mut l = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in 0..=i {
            let dot: f64 = (0..j).map(|k| l[[i, k]] * l[[j, k]]).sum();
            if i == j {
                let diag = a[[i, i]] - dot;
                if diag <= 0.0 {
                    return None;
                }
                l[[i, j]] = diag.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - dot) / l[[j, j]];
            }
        }
    }

    // forward then backward substitution
    let mut z = Array1::<f64>::zeros(n);
    for i in 0..n {
        let dot: f64 = (0..i).map(|j| l[[i, j]] * z[j]).sum();
        z[i] = (b[i] - dot) / l[[i, i]];
    }
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let dot: f64 = (i + 1..n).map(|j| l[[j, i]] * x[j]).sum();
        x[i] = (z[i] - dot) / l[[i, i]];
    }
    Some(x)
}

fn gauss_jordan_inverse(m: &Array2<f64>) -> Option<Array2<f64>> {
    let n = m.nrows();
    if n != m.ncols() {
        return None;
    }
    let mut aug = Array2::<f64>::zeros((n, 2 * n));
    for i in 0..n {
        for j in 0..n {
            aug[[i, j]] = m[[i, j]];
        }
        aug[[i, n + i]] = 1.0;
    }

    for col in 0..n {
        let pivot_row = (col..n).max_by(|&a, &b| {
            aug[[a, col]].abs().total_cmp(&aug[[b, col]].abs())
        })?;
        if aug[[pivot_row, col]].abs() < 1e-12 {
            return None;
        }
        if pivot_row != col {
            for j in 0..2 * n {
                aug.swap([col, j], [pivot_row, j]);
            }
        }
        let pivot = aug[[col, col]];
        for j in 0..2 * n {
            aug[[col, j]] /= pivot;
        }
        for row in 0..n {
            if row == col {
                continue;
            }
            let factor = aug[[row, col]];
            if factor != 0.0 {
                for j in 0..2 * n {
                    aug[[row, j]] -= factor * aug[[col, j]];
                }
            }
        }
    }

    let mut inv = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in 0..n {
            inv[[i, j]] = aug[[i, n + j]];
        }
    }
    Some(inv)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use ndarray::array;

    #[test]
    fn recovers_a_linear_relation() {
        // y = 3x + 1, tiny alpha so the fit is nearly exact
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0]];
        let y = array![4.0, 7.0, 10.0, 13.0, 16.0];
        let mut model = Ridge::new(1e-6);
        model.fit(&x, &y).unwrap();
        let preds = model.predict(&array![[6.0]]).unwrap();
        assert_approx_eq!(preds[0], 19.0, 1e-3);
    }

    #[test]
    fn constant_feature_does_not_blow_up() {
        let x = array![[1.0, 5.0], [1.0, 6.0], [1.0, 7.0], [1.0, 8.0]];
        let y = array![10.0, 12.0, 14.0, 16.0];
        let mut model = Ridge::new(1.0);
        model.fit(&x, &y).unwrap();
        let preds = model.predict(&x).unwrap();
        assert!(preds.iter().all(|p| p.is_finite()));
    }
}
