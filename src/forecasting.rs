//! Recursive multi-step forecasting
//!
//! Refits both models on the full feature frame and rolls them forward
//! one period at a time. A single history buffer, extended with the
//! multivariate model's own predictions, supplies the lag features for
//! both models; driver values are frozen at their last observation while
//! calendar and holiday features are recomputed for each future date.

use crate::calendar::{self, holiday_counts, infer_cadence, Cadence};
use crate::config::{BaselineModel, ResampleFrequency};
use crate::error::{ForecastError, Result};
use crate::evaluation::EvalConfig;
use crate::features::{FeatureFrame, HOLIDAY_COLUMN, HOLIDAY_WINDOW_DAYS, TARGET_LAG_PREFIX};
use crate::models::{GradientBoosting, Regressor, Ridge};
use chrono::{Datelike, NaiveDate};
use ndarray::Array2;
use serde::Serialize;
use tracing::info;

/// Future dates with parallel baseline and multivariate predictions.
#[derive(Debug, Clone, Serialize)]
pub struct ForecastOutput {
    pub index: Vec<NaiveDate>,
    pub baseline: Vec<f64>,
    pub multivariate: Vec<f64>,
}

impl ForecastOutput {
    /// Future dates as `YYYY-MM-DD` strings.
    pub fn index_strings(&self) -> Vec<String> {
        self.index.iter().map(|d| d.to_string()).collect()
    }
}

/// Generate `horizon` future timestamps after `last`, either at the
/// requested frequency or at the cadence inferred from the history.
pub fn future_index(
    history: &[NaiveDate],
    frequency: Option<ResampleFrequency>,
    horizon: usize,
) -> Result<Vec<NaiveDate>> {
    let last = *history
        .last()
        .ok_or_else(|| ForecastError::ForecastingError("No observed dates".to_string()))?;

    let dates = match frequency {
        None => calendar::future_dates(last, infer_cadence(history), horizon),
        Some(ResampleFrequency::Daily) => calendar::future_dates(last, Cadence::Daily, horizon),
        Some(ResampleFrequency::Weekly) => calendar::future_dates(last, Cadence::Weekly, horizon),
        Some(ResampleFrequency::MonthStart) => month_starts(last, 1, horizon)?,
        Some(ResampleFrequency::QuarterStart) => month_starts(last, 3, horizon)?,
        Some(ResampleFrequency::YearStart) => month_starts(last, 12, horizon)?,
    };
    Ok(dates)
}

/// First-of-month steps after `last`, `months_per_step` apart.
fn month_starts(last: NaiveDate, months_per_step: u32, horizon: usize) -> Result<Vec<NaiveDate>> {
    (1..=horizon as u32)
        .map(|i| {
            let total = last.year() * 12 + last.month0() as i32 + (i * months_per_step) as i32;
            NaiveDate::from_ymd_opt(total.div_euclid(12), total.rem_euclid(12) as u32 + 1, 1)
                .ok_or_else(|| {
                    ForecastError::ForecastingError("Future date out of range".to_string())
                })
        })
        .collect()
}

/// Refit on the full frame and forecast `horizon` steps ahead.
///
/// `target_history` is the full cleaned target series, which seeds the
/// shared lag buffer. Each step's multivariate prediction is appended to
/// that buffer before the next step, so both models follow one synthetic
/// future trajectory.
pub fn forecast_future(
    frame: &FeatureFrame,
    target_dates: &[NaiveDate],
    target_history: &[f64],
    horizon: usize,
    config: &EvalConfig,
    frequency: Option<ResampleFrequency>,
) -> Result<ForecastOutput> {
    if horizon == 0 {
        return Err(ForecastError::InvalidParameter(
            "Forecast horizon must be positive".to_string(),
        ));
    }
    if frame.is_empty() {
        return Err(ForecastError::ForecastingError(
            "Cannot forecast from an empty feature frame".to_string(),
        ));
    }

    let future = future_index(target_dates, frequency, horizon)?;

    let base_cols = frame.baseline_feature_indices();
    let all_cols: Vec<usize> = (0..frame.columns.len()).collect();

    // lag offsets in frame column order, so feature vectors line up
    let base_lags: Vec<usize> = base_cols
        .iter()
        .map(|&i| lag_of(&frame.columns[i]))
        .collect::<Option<Vec<usize>>>()
        .ok_or_else(|| {
            ForecastError::ForecastingError("Malformed target lag column name".to_string())
        })?;
    let max_lag = base_lags.iter().copied().max().unwrap_or(1);
    if target_history.len() < max_lag {
        return Err(ForecastError::ForecastingError(format!(
            "Need at least {} observations to roll the forecast forward",
            max_lag
        )));
    }

    let full_x = frame.select(0..frame.len(), &all_cols);
    let y_full = frame.y.clone();

    let mut ridge = None;
    if config.baseline_model == BaselineModel::LaggedRidge {
        let mut model = Ridge::new(config.ridge_alpha);
        model.fit(&frame.select(0..frame.len(), &base_cols), &y_full)?;
        ridge = Some(model);
    }

    let mut multi = GradientBoosting::new(
        crate::models::BoostingParams::for_model(
            config.multivariate_model,
            config.boosting_params.as_ref(),
        ),
    );
    multi.fit(&full_x, &y_full)?;

    // driver values are not known for the future: freeze the last row
    let last_row: Vec<f64> = frame.row(frame.len() - 1, &all_cols).to_vec();

    let mut history: Vec<f64> = target_history.to_vec();
    let mut baseline = Vec::with_capacity(horizon);
    let mut multivariate = Vec::with_capacity(horizon);

    for date in &future {
        let base_pred = match config.baseline_model {
            BaselineModel::SeasonalNaive => {
                if history.len() >= config.seasonal_period {
                    history[history.len() - config.seasonal_period]
                } else {
                    history[history.len() - 1]
                }
            }
            BaselineModel::LaggedRidge => {
                let row: Vec<f64> = base_lags
                    .iter()
                    .map(|&lag| history[history.len() - lag])
                    .collect();
                let x = Array2::from_shape_vec((1, row.len()), row)
                    .map_err(|e| ForecastError::MathError(e.to_string()))?;
                ridge
                    .as_ref()
                    .ok_or_else(|| {
                        ForecastError::ForecastingError("Baseline model missing".to_string())
                    })?
                    .predict(&x)?[0]
            }
        };

        let row: Vec<f64> = frame
            .columns
            .iter()
            .enumerate()
            .map(|(j, name)| future_feature(name, *date, &history, &last_row, j))
            .collect();
        let x = Array2::from_shape_vec((1, row.len()), row)
            .map_err(|e| ForecastError::MathError(e.to_string()))?;
        let multi_pred = multi.predict(&x)?[0];

        baseline.push(base_pred);
        multivariate.push(multi_pred);
        // the multivariate path defines the shared future trajectory
        history.push(multi_pred);
    }

    info!(horizon, last = %future[future.len() - 1], "forecast generated");
    Ok(ForecastOutput {
        index: future,
        baseline,
        multivariate,
    })
}

/// Value of one feature column at a future date.
fn future_feature(
    column: &str,
    date: NaiveDate,
    history: &[f64],
    last_row: &[f64],
    col_idx: usize,
) -> f64 {
    if let Some(lag) = lag_of(column) {
        return history[history.len() - lag];
    }
    if let Some(v) = crate::features::calendar_value(column, date) {
        return v;
    }
    if column == HOLIDAY_COLUMN {
        return holiday_counts(&[date], HOLIDAY_WINDOW_DAYS)[0];
    }
    last_row[col_idx]
}

fn lag_of(column: &str) -> Option<usize> {
    column
        .strip_prefix(TARGET_LAG_PREFIX)
        .and_then(|n| n.parse::<usize>().ok())
}
