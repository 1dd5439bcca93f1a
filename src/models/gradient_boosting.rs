//! Gradient-boosted regression trees
//!
//! Squared-error boosting: each round fits a shallow [`RegressionTree`]
//! to the current residuals on a random row/column subsample and adds
//! its shrunken predictions to the ensemble.

use crate::error::{ForecastError, Result};
use crate::models::{BoostingParams, RegressionTree, Regressor};
use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

#[derive(Debug, Clone)]
pub struct GradientBoosting {
    params: BoostingParams,
    trees: Vec<(RegressionTree, Vec<usize>)>,
    base_prediction: f64,
    importances: Vec<f64>,
}

impl GradientBoosting {
    pub fn new(params: BoostingParams) -> Self {
        Self {
            params,
            trees: Vec::new(),
            base_prediction: 0.0,
            importances: Vec::new(),
        }
    }

    /// Importance of each training feature, summed over all rounds and
    /// normalized to one.
    pub fn feature_importances(&self) -> &[f64] {
        &self.importances
    }

    fn sample(&self, len: usize, ratio: f64, rng: &mut Xoshiro256PlusPlus) -> Vec<usize> {
        let take = ((len as f64 * ratio).ceil() as usize).clamp(1, len);
        let mut indices: Vec<usize> = (0..len).collect();
        if take < len {
            indices.shuffle(rng);
            indices.truncate(take);
            indices.sort_unstable();
        }
        indices
    }
}

impl Regressor for GradientBoosting {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let n = x.nrows();
        if n == 0 || n != y.len() {
            return Err(ForecastError::MathError(format!(
                "Cannot fit boosting ensemble on {} rows with {} targets",
                n,
                y.len()
            )));
        }

        self.base_prediction = y.mean().unwrap_or(0.0);
        self.trees.clear();
        self.importances = vec![0.0; x.ncols()];

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.params.seed);
        let mut predictions = Array1::from_elem(n, self.base_prediction);

        for _ in 0..self.params.n_estimators {
            let residuals: Array1<f64> = y - &predictions;

            let rows = self.sample(n, self.params.subsample, &mut rng);
            let cols = self.sample(x.ncols(), self.params.colsample_bytree, &mut rng);

            let x_fit = x.select(Axis(0), &rows).select(Axis(1), &cols);
            let r_fit = Array1::from_iter(rows.iter().map(|&i| residuals[i]));

            let mut tree = RegressionTree::new(
                self.params.max_depth,
                self.params.min_samples_leaf,
                self.params.reg_lambda,
            );
            tree.fit(&x_fit, &r_fit)?;

            // update running predictions on every row, not just the sample
            let step = tree.predict(&x.select(Axis(1), &cols))?;
            predictions = predictions + step * self.params.learning_rate;

            for (local, &global) in cols.iter().enumerate() {
                self.importances[global] += tree.feature_importances()[local];
            }
            self.trees.push((tree, cols));
        }

        let total: f64 = self.importances.iter().sum();
        if total > 0.0 {
            for imp in &mut self.importances {
                *imp /= total;
            }
        }
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(ForecastError::MathError(
                "Boosting ensemble has not been fitted".to_string(),
            ));
        }
        let mut predictions = Array1::from_elem(x.nrows(), self.base_prediction);
        for (tree, cols) in &self.trees {
            let step = tree.predict(&x.select(Axis(1), cols))?;
            predictions = predictions + step * self.params.learning_rate;
        }
        Ok(predictions)
    }
}
