//! Backtesting: single-split holdout and expanding walk-forward
//!
//! Both models share one feature frame. The baseline sees only the
//! target lag columns (or a seasonal lookup); the multivariate model
//! sees everything. Rows where the seasonal baseline is undefined are
//! excluded from both models' scoring so the comparison stays honest.

use crate::config::{BaselineModel, MultivariateModel};
use crate::error::{ForecastError, Result};
use crate::features::FeatureFrame;
use crate::metrics::{mae, nrmse_pct, rmse, TestSize};
use crate::models::{
    seasonal_naive_predictions, BoostingParams, GradientBoosting, Regressor, Ridge,
};
use chrono::NaiveDate;
use ndarray::Array2;
use rayon::prelude::*;
use serde::Serialize;
use tracing::debug;

/// Model choices and hyperparameters shared by every evaluation call.
#[derive(Debug, Clone)]
pub struct EvalConfig {
    pub baseline_model: BaselineModel,
    pub multivariate_model: MultivariateModel,
    pub ridge_alpha: f64,
    pub seasonal_period: usize,
    pub boosting_params: Option<BoostingParams>,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            baseline_model: BaselineModel::LaggedRidge,
            multivariate_model: MultivariateModel::Gbm,
            ridge_alpha: 1.0,
            seasonal_period: 52,
            boosting_params: None,
        }
    }
}

impl EvalConfig {
    fn boosting(&self) -> BoostingParams {
        BoostingParams::for_model(self.multivariate_model, self.boosting_params.as_ref())
    }
}

/// Holdout metrics, backtest errors, and ranked importances for one
/// frame under one configuration.
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationResult {
    pub test_len: usize,
    pub rmse_base: f64,
    pub rmse_multi: f64,
    pub nrmse_base_pct: f64,
    pub nrmse_multi_pct: f64,
    pub mae_base: f64,
    pub mae_multi: f64,
    pub improvement_pct: f64,
    pub wf_rmse_base: f64,
    pub wf_rmse_multi: f64,
    /// Number of walk-forward folds that were scored.
    pub wf_folds: usize,
    /// `(feature, importance)` sorted descending by importance.
    pub importances: Vec<(String, f64)>,
    pub test_index: Vec<NaiveDate>,
    pub y_test: Vec<f64>,
    pub y_pred_base: Vec<f64>,
    pub y_pred_multi: Vec<f64>,
}

/// Minimum expanding-window size for the walk-forward backtest.
pub fn min_train_size(lags: &[usize]) -> usize {
    let max_lag = lags.iter().copied().max().unwrap_or(0);
    20.max(max_lag + 2).max(8)
}

/// Walk-forward backtest errors plus the number of folds scored.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct WalkForwardReport {
    pub rmse_base: f64,
    pub rmse_multi: f64,
    /// One fold per row past the initial window, minus any rows the
    /// seasonal baseline cannot reach.
    pub folds: usize,
}

/// Walk-forward backtest: train on `frame[..i]`, predict row `i`,
/// advance one row. Folds are independent and run in parallel; results
/// are merged in index order.
pub fn walk_forward_rmse(
    frame: &FeatureFrame,
    min_train: usize,
    config: &EvalConfig,
) -> Result<WalkForwardReport> {
    let n = frame.len();
    if n <= min_train {
        return Err(ForecastError::ValidationError(format!(
            "Walk-forward backtest needs more than {} rows, frame has {}",
            min_train, n
        )));
    }

    let base_cols = frame.baseline_feature_indices();
    let all_cols: Vec<usize> = (0..frame.columns.len()).collect();
    let params = config.boosting();

    let folds: Vec<Option<(f64, f64, f64)>> = (min_train..n)
        .into_par_iter()
        .map(|i| -> Result<Option<(f64, f64, f64)>> {
            let base_pred = match config.baseline_model {
                BaselineModel::SeasonalNaive => {
                    match i.checked_sub(config.seasonal_period) {
                        Some(j) => frame.y[j],
                        // not enough seasonal history: skip the fold for
                        // both models
                        None => return Ok(None),
                    }
                }
                BaselineModel::LaggedRidge => {
                    let mut model = Ridge::new(config.ridge_alpha);
                    model.fit(
                        &frame.select(0..i, &base_cols),
                        &frame.y.slice(ndarray::s![..i]).to_owned(),
                    )?;
                    let row = frame.row(i, &base_cols);
                    model.predict(&row.insert_axis(ndarray::Axis(0)))?[0]
                }
            };

            let mut model = GradientBoosting::new(params.clone());
            model.fit(
                &frame.select(0..i, &all_cols),
                &frame.y.slice(ndarray::s![..i]).to_owned(),
            )?;
            let row = frame.row(i, &all_cols);
            let multi_pred = model.predict(&row.insert_axis(ndarray::Axis(0)))?[0];

            Ok(Some((frame.y[i], base_pred, multi_pred)))
        })
        .collect::<Result<Vec<_>>>()?;

    let kept: Vec<(f64, f64, f64)> = folds.into_iter().flatten().collect();
    if kept.is_empty() {
        return Err(ForecastError::ValidationError(
            "Walk-forward backtest produced no evaluable folds".to_string(),
        ));
    }
    let actuals: Vec<f64> = kept.iter().map(|f| f.0).collect();
    let base: Vec<f64> = kept.iter().map(|f| f.1).collect();
    let multi: Vec<f64> = kept.iter().map(|f| f.2).collect();
    debug!(folds = kept.len(), "walk-forward backtest done");
    Ok(WalkForwardReport {
        rmse_base: rmse(&actuals, &base),
        rmse_multi: rmse(&actuals, &multi),
        folds: kept.len(),
    })
}

/// Full evaluation: fit on the prefix, score on the last `test_size`
/// rows, then run the walk-forward backtest over the whole frame.
pub fn evaluate_split(
    frame: &FeatureFrame,
    lags: &[usize],
    test_size: &TestSize,
    config: &EvalConfig,
) -> Result<EvaluationResult> {
    let n = frame.len();
    if n < 2 {
        return Err(ForecastError::ValidationError(format!(
            "Need at least 2 feature rows to evaluate, got {}",
            n
        )));
    }

    let test_len = test_size.resolve(n);
    let split = n - test_len;

    let base_cols = frame.baseline_feature_indices();
    let all_cols: Vec<usize> = (0..frame.columns.len()).collect();

    let x_train = frame.select(0..split, &all_cols);
    let y_train = frame.y.slice(ndarray::s![..split]).to_owned();

    // test rows, possibly masked down when the seasonal baseline lacks
    // history for the earliest ones
    let mut test_rows: Vec<usize> = (split..n).collect();
    let y_pred_base: Vec<f64> = match config.baseline_model {
        BaselineModel::SeasonalNaive => {
            let y_vec = frame.y.to_vec();
            let seasonal = seasonal_naive_predictions(&y_vec, config.seasonal_period);
            test_rows.retain(|&i| seasonal[i].is_some());
            if test_rows.is_empty() {
                return Err(ForecastError::ValidationError(
                    "Seasonal-naive baseline has no defined test rows; reduce the period"
                        .to_string(),
                ));
            }
            test_rows.iter().filter_map(|&i| seasonal[i]).collect()
        }
        BaselineModel::LaggedRidge => {
            let mut model = Ridge::new(config.ridge_alpha);
            model.fit(&frame.select(0..split, &base_cols), &y_train)?;
            let x_test_base = select_rows(frame, &test_rows, &base_cols);
            model.predict(&x_test_base)?.to_vec()
        }
    };

    let mut multi = GradientBoosting::new(config.boosting());
    multi.fit(&x_train, &y_train)?;
    let x_test = select_rows(frame, &test_rows, &all_cols);
    let y_pred_multi = multi.predict(&x_test)?.to_vec();

    let y_test: Vec<f64> = test_rows.iter().map(|&i| frame.y[i]).collect();

    let rmse_base = rmse(&y_test, &y_pred_base);
    let rmse_multi = rmse(&y_test, &y_pred_multi);
    let improvement_pct = if rmse_base > 0.0 {
        (rmse_base - rmse_multi) / rmse_base * 100.0
    } else {
        0.0
    };

    let walk_forward = walk_forward_rmse(frame, min_train_size(lags), config)?;

    let mut importances: Vec<(String, f64)> = frame
        .columns
        .iter()
        .cloned()
        .zip(multi.feature_importances().iter().copied())
        .collect();
    importances.sort_by(|a, b| b.1.total_cmp(&a.1));

    Ok(EvaluationResult {
        test_len,
        rmse_base,
        rmse_multi,
        nrmse_base_pct: nrmse_pct(&y_test, rmse_base),
        nrmse_multi_pct: nrmse_pct(&y_test, rmse_multi),
        mae_base: mae(&y_test, &y_pred_base),
        mae_multi: mae(&y_test, &y_pred_multi),
        improvement_pct,
        wf_rmse_base: walk_forward.rmse_base,
        wf_rmse_multi: walk_forward.rmse_multi,
        wf_folds: walk_forward.folds,
        importances,
        test_index: test_rows.iter().map(|&i| frame.index[i]).collect(),
        y_test,
        y_pred_base,
        y_pred_multi,
    })
}

fn select_rows(frame: &FeatureFrame, rows: &[usize], cols: &[usize]) -> Array2<f64> {
    let mut out = Array2::zeros((rows.len(), cols.len()));
    for (oi, &ri) in rows.iter().enumerate() {
        for (oj, &cj) in cols.iter().enumerate() {
            out[[oi, oj]] = frame.x[[ri, cj]];
        }
    }
    out
}
