//! Regression models for baseline and multivariate forecasting
//!
//! The baseline side is a ridge regression over target lags or a
//! seasonal-naive lookup; the multivariate side is gradient-boosted
//! regression trees with two presets mirroring the conservative and
//! aggressive configurations users pick between.

pub mod decision_tree;
pub mod gradient_boosting;
pub mod ridge;
pub mod seasonal_naive;

pub use decision_tree::RegressionTree;
pub use gradient_boosting::GradientBoosting;
pub use ridge::Ridge;
pub use seasonal_naive::seasonal_naive_predictions;

use crate::config::MultivariateModel;
use crate::error::Result;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Common interface for trainable regressors.
pub trait Regressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;
}

/// Hyperparameters for [`GradientBoosting`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoostingParams {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    /// Row subsample ratio per boosting round.
    pub subsample: f64,
    /// Column subsample ratio per boosting round.
    pub colsample_bytree: f64,
    /// L2 regularization on leaf values.
    pub reg_lambda: f64,
    pub seed: u64,
}

impl BoostingParams {
    /// Conservative preset: many very shallow trees.
    pub fn gbm() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 2,
            min_samples_leaf: 5,
            subsample: 0.8,
            colsample_bytree: 1.0,
            reg_lambda: 0.0,
            seed: 42,
        }
    }

    /// Aggressive preset: more, deeper trees with column subsampling and
    /// leaf regularization.
    pub fn xgb() -> Self {
        Self {
            n_estimators: 300,
            learning_rate: 0.05,
            max_depth: 3,
            min_samples_leaf: 1,
            subsample: 0.8,
            colsample_bytree: 0.8,
            reg_lambda: 1.0,
            seed: 42,
        }
    }

    /// Preset for a model choice, unless the caller supplied overrides.
    pub fn for_model(model: MultivariateModel, overrides: Option<&BoostingParams>) -> Self {
        match overrides {
            Some(params) => params.clone(),
            None => match model {
                MultivariateModel::Gbm => Self::gbm(),
                MultivariateModel::Xgb => Self::xgb(),
            },
        }
    }
}
