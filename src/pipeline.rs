//! End-to-end orchestration: clean, select lags, evaluate, forecast
//!
//! [`train_and_forecast`] is the single entry point callers use. It owns
//! no state; every call receives a table and a config and returns a
//! fully computed, serializable [`AnalysisResult`].

use crate::cleaning::{clean_for_training, CleaningOptions, CleaningReport};
use crate::config::{parse_lag_config, TrainConfig, ValidationMode};
use crate::data::RawTable;
use crate::error::{ForecastError, Result};
use crate::evaluation::{evaluate_split, EvalConfig};
use crate::features::{build_feature_frame, FeatureSpec};
use crate::forecasting::forecast_future;
use crate::metrics::TestSize;
use crate::search::{default_lag_candidates, grid_search_lags, LagSearchEntry};
use chrono::Utc;
use serde::Serialize;
use tracing::info;

/// Minimum cleaned observations required to train.
pub const MIN_OBSERVATIONS: usize = 20;

/// A date-indexed series of values, dates in `YYYY-MM-DD` form.
#[derive(Debug, Clone, Serialize)]
pub struct SeriesOut {
    pub index: Vec<String>,
    pub values: Vec<f64>,
}

/// Headline error metrics for both models.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSummary {
    pub baseline_rmse: f64,
    pub baseline_mae: f64,
    pub baseline_walk_forward_rmse: f64,
    pub multivariate_rmse: f64,
    pub multivariate_mae: f64,
    pub multivariate_walk_forward_rmse: f64,
    pub improvement_pct: f64,
}

/// Holdout actuals next to both models' predictions.
#[derive(Debug, Clone, Serialize)]
pub struct TestPredictions {
    pub index: Vec<String>,
    pub actual: Vec<f64>,
    pub baseline: Vec<f64>,
    pub multivariate: Vec<f64>,
}

/// The configuration a run actually used, echoed back for display.
#[derive(Debug, Clone, Serialize)]
pub struct RunSettings {
    pub baseline_model: String,
    pub multivariate_model: String,
    pub lags: Vec<usize>,
    pub test_window: String,
    pub validation_mode: ValidationMode,
    pub forecast_horizon: usize,
    pub calendar_features: bool,
    pub holiday_features: bool,
    pub auto_select_lags: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lag_search: Option<Vec<LagSearchEntry>>,
}

/// Everything one training-and-forecast run produced.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    pub generated_at: String,
    pub settings: RunSettings,
    pub metrics: MetricsSummary,
    pub baseline_forecast: SeriesOut,
    pub multivariate_forecast: SeriesOut,
    pub historical: SeriesOut,
    pub horizon: usize,
    pub drivers_used: Vec<String>,
    pub feature_importance: Vec<(String, f64)>,
    pub test_predictions: TestPredictions,
    pub cleaning: CleaningReport,
}

/// Run the whole pipeline on one table.
pub fn train_and_forecast(table: &RawTable, config: &TrainConfig) -> Result<AnalysisResult> {
    config.validate()?;

    let cleaning_options = CleaningOptions {
        outlier_action: config.outlier_action,
        driver_outlier_action: config.driver_outlier_action,
        average_daily_drivers_to_weekly: true,
        min_rows: MIN_OBSERVATIONS,
    };
    let (cleaned, report) = clean_for_training(
        table,
        &config.date_col,
        &config.target_col,
        &config.drivers,
        &cleaning_options,
    )?;
    info!(
        rows = cleaned.len(),
        drivers = cleaned.drivers.len(),
        "cleaning finished"
    );

    if !report.ready.ready {
        return Err(ForecastError::ValidationError(format!(
            "Dataset is not ready for training: {}",
            report.ready.errors.join("; ")
        )));
    }
    if cleaned.len() < MIN_OBSERVATIONS {
        return Err(ForecastError::ValidationError(format!(
            "Need at least {} data points to train a model, got {}",
            MIN_OBSERVATIONS,
            cleaned.len()
        )));
    }

    let test_size = TestSize::parse(&config.test_window)?;
    let eval_config = EvalConfig {
        baseline_model: config.baseline_model,
        multivariate_model: config.multivariate_model,
        ridge_alpha: config.ridge_alpha,
        seasonal_period: config.seasonal_period,
        boosting_params: config.boosting_params.clone(),
    };
    let base_spec = FeatureSpec {
        lags: parse_lag_config(&config.lag_config)?,
        driver_lags: config.driver_lags.clone(),
        calendar_features: config.calendar_features,
        holiday_features: config.holiday_features,
    };

    let (lags, lag_search) = if config.auto_select_lags {
        let entries = grid_search_lags(
            &cleaned,
            &base_spec,
            &default_lag_candidates(),
            &test_size,
            &eval_config,
            config.validation_mode,
        )?;
        match entries.first() {
            Some(best) => (best.lags.clone(), Some(entries)),
            None => (base_spec.lags.clone(), None),
        }
    } else {
        (base_spec.lags.clone(), None)
    };
    info!(lags = ?lags, auto = config.auto_select_lags, "lag set selected");

    let spec = FeatureSpec {
        lags: lags.clone(),
        ..base_spec
    };
    let frame = build_feature_frame(&cleaned, &spec)?;

    let evaluation = evaluate_split(&frame, &lags, &test_size, &eval_config)?;
    let forecast = forecast_future(
        &frame,
        &cleaned.dates,
        &cleaned.target,
        config.horizon,
        &eval_config,
        config.resample_frequency,
    )?;

    let date_strings = |dates: &[chrono::NaiveDate]| -> Vec<String> {
        dates.iter().map(|d| d.to_string()).collect()
    };

    Ok(AnalysisResult {
        generated_at: Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        settings: RunSettings {
            baseline_model: config.baseline_model.to_string(),
            multivariate_model: config.multivariate_model.to_string(),
            lags,
            test_window: config.test_window.clone(),
            validation_mode: config.validation_mode,
            forecast_horizon: config.horizon,
            calendar_features: config.calendar_features,
            holiday_features: config.holiday_features,
            auto_select_lags: config.auto_select_lags,
            lag_search,
        },
        metrics: MetricsSummary {
            baseline_rmse: evaluation.rmse_base,
            baseline_mae: evaluation.mae_base,
            baseline_walk_forward_rmse: evaluation.wf_rmse_base,
            multivariate_rmse: evaluation.rmse_multi,
            multivariate_mae: evaluation.mae_multi,
            multivariate_walk_forward_rmse: evaluation.wf_rmse_multi,
            improvement_pct: evaluation.improvement_pct,
        },
        baseline_forecast: SeriesOut {
            index: forecast.index_strings(),
            values: forecast.baseline.clone(),
        },
        multivariate_forecast: SeriesOut {
            index: forecast.index_strings(),
            values: forecast.multivariate,
        },
        historical: SeriesOut {
            index: date_strings(&cleaned.dates),
            values: cleaned.target.clone(),
        },
        horizon: config.horizon,
        drivers_used: report.driver_cols.clone(),
        feature_importance: evaluation.importances.clone(),
        test_predictions: TestPredictions {
            index: date_strings(&evaluation.test_index),
            actual: evaluation.y_test,
            baseline: evaluation.y_pred_base,
            multivariate: evaluation.y_pred_multi,
        },
        cleaning: report,
    })
}
