//! Feature frame construction
//!
//! Turns a cleaned target series plus optional driver, calendar, and
//! holiday signals into a fully populated supervised-learning table.
//! Rows lacking complete lag history are dropped rather than imputed, so
//! a frame shrinks by the maximum lag from the start of the series.

use crate::calendar::holiday_counts;
use crate::cleaning::CleanedFrame;
use crate::error::{ForecastError, Result};
use chrono::{Datelike, NaiveDate};
use ndarray::{Array1, Array2};

/// Window (in days) around a date within which holidays are counted.
pub const HOLIDAY_WINDOW_DAYS: i64 = 3;

/// Prefix shared by all target lag columns.
pub const TARGET_LAG_PREFIX: &str = "target_lag_";

/// Name of the holiday feature column.
pub const HOLIDAY_COLUMN: &str = "holiday_count";

/// A named feature column, with `None` marking cells that lack history.
pub type FeatureColumn = (String, Vec<Option<f64>>);

/// Which optional feature blocks to attach to the target lags.
#[derive(Debug, Clone)]
pub struct FeatureSpec {
    /// Target lag offsets. Must be non-empty and positive.
    pub lags: Vec<usize>,
    /// Lag offsets applied to every numeric driver. Empty disables.
    pub driver_lags: Vec<usize>,
    pub calendar_features: bool,
    pub holiday_features: bool,
}

impl Default for FeatureSpec {
    fn default() -> Self {
        Self {
            lags: vec![1, 2, 4],
            driver_lags: vec![1, 2],
            calendar_features: true,
            holiday_features: false,
        }
    }
}

impl FeatureSpec {
    pub fn max_lag(&self) -> usize {
        self.lags.iter().copied().max().unwrap_or(0)
    }

    fn validate(&self) -> Result<()> {
        if self.lags.is_empty() {
            return Err(ForecastError::InvalidParameter(
                "At least one lag is required".to_string(),
            ));
        }
        if self.lags.iter().chain(&self.driver_lags).any(|l| *l == 0) {
            return Err(ForecastError::InvalidParameter(
                "Lags must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Supervised table: one fully populated row per usable date.
#[derive(Debug, Clone)]
pub struct FeatureFrame {
    pub index: Vec<NaiveDate>,
    /// Feature names, in `x` column order. Does not include `y`.
    pub columns: Vec<String>,
    pub x: Array2<f64>,
    pub y: Array1<f64>,
}

impl FeatureFrame {
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Column indices of the target-lag-only feature subset used by the
    /// baseline model.
    pub fn baseline_feature_indices(&self) -> Vec<usize> {
        self.columns
            .iter()
            .enumerate()
            .filter_map(|(i, name)| name.starts_with(TARGET_LAG_PREFIX).then_some(i))
            .collect()
    }

    /// Copy out a sub-matrix of `x` restricted to `rows` and `cols`.
    pub fn select(&self, rows: std::ops::Range<usize>, cols: &[usize]) -> Array2<f64> {
        let mut out = Array2::zeros((rows.len(), cols.len()));
        for (oi, ri) in rows.enumerate() {
            for (oj, &cj) in cols.iter().enumerate() {
                out[[oi, oj]] = self.x[[ri, cj]];
            }
        }
        out
    }

    /// One row of `x` restricted to `cols`.
    pub fn row(&self, row: usize, cols: &[usize]) -> Array1<f64> {
        Array1::from_iter(cols.iter().map(|&c| self.x[[row, c]]))
    }
}

/// Shift a series forward by each lag, producing `{prefix}_lag_{n}`
/// columns with `None` where history runs out.
pub fn lagged_columns(values: &[f64], lags: &[usize], prefix: &str) -> Vec<FeatureColumn> {
    lags.iter()
        .map(|&lag| {
            let shifted: Vec<Option<f64>> = (0..values.len())
                .map(|i| i.checked_sub(lag).map(|j| values[j]))
                .collect();
            (format!("{}_lag_{}", prefix, lag), shifted)
        })
        .collect()
}

/// Calendar features: month, quarter, ISO week, day-of-week (Monday=0).
pub fn calendar_columns(dates: &[NaiveDate]) -> Vec<FeatureColumn> {
    let make = |name: &str, f: fn(NaiveDate) -> f64| -> FeatureColumn {
        (
            name.to_string(),
            dates.iter().map(|d| Some(f(*d))).collect(),
        )
    };
    vec![
        make("cal_month", |d| d.month() as f64),
        make("cal_quarter", |d| ((d.month() - 1) / 3 + 1) as f64),
        make("cal_weekofyear", |d| d.iso_week().week() as f64),
        make("cal_dayofweek", |d| {
            d.weekday().num_days_from_monday() as f64
        }),
    ]
}

/// Calendar feature value for one date, by column name.
pub fn calendar_value(column: &str, date: NaiveDate) -> Option<f64> {
    match column {
        "cal_month" => Some(date.month() as f64),
        "cal_quarter" => Some(((date.month() - 1) / 3 + 1) as f64),
        "cal_weekofyear" => Some(date.iso_week().week() as f64),
        "cal_dayofweek" => Some(date.weekday().num_days_from_monday() as f64),
        _ => None,
    }
}

/// Count of UK holidays within the fixed window of each date.
pub fn holiday_column(dates: &[NaiveDate]) -> FeatureColumn {
    (
        HOLIDAY_COLUMN.to_string(),
        holiday_counts(dates, HOLIDAY_WINDOW_DAYS)
            .into_iter()
            .map(Some)
            .collect(),
    )
}

/// Build the full supervised frame from a cleaned dataset.
///
/// Column order: target lags, then per-driver raw and lag columns, then
/// the holiday count, then calendar features. Any row with a missing
/// cell is dropped.
pub fn build_feature_frame(frame: &CleanedFrame, spec: &FeatureSpec) -> Result<FeatureFrame> {
    spec.validate()?;

    let mut blocks: Vec<FeatureColumn> = lagged_columns(&frame.target, &spec.lags, "target");

    for (name, values) in frame.numeric_drivers() {
        // a driver canonically named "target" (or shadowing a lag name)
        // would collide with the target lag columns, so it is prefixed
        let name = if name == "target" || name.starts_with(TARGET_LAG_PREFIX) {
            format!("driver_{}", name)
        } else {
            name.to_string()
        };
        blocks.push((
            name.clone(),
            values.iter().map(|v| Some(*v)).collect(),
        ));
        blocks.extend(lagged_columns(values, &spec.driver_lags, &name));
    }

    if spec.holiday_features {
        blocks.push(holiday_column(&frame.dates));
    }
    if spec.calendar_features {
        blocks.extend(calendar_columns(&frame.dates));
    }

    assemble(&frame.dates, &frame.target, blocks)
}

/// Join feature columns on the date index and drop incomplete rows.
pub fn assemble(
    dates: &[NaiveDate],
    target: &[f64],
    blocks: Vec<FeatureColumn>,
) -> Result<FeatureFrame> {
    let n = dates.len();
    for (name, col) in &blocks {
        if col.len() != n {
            return Err(ForecastError::ValidationError(format!(
                "Feature column '{}' has {} rows, expected {}",
                name,
                col.len(),
                n
            )));
        }
    }

    let keep: Vec<usize> = (0..n)
        .filter(|&i| blocks.iter().all(|(_, col)| col[i].is_some()))
        .collect();
    if keep.is_empty() {
        return Err(ForecastError::ValidationError(
            "No rows with complete feature history; reduce the lag set".to_string(),
        ));
    }

    let columns: Vec<String> = blocks.iter().map(|(name, _)| name.clone()).collect();
    let mut x = Array2::zeros((keep.len(), blocks.len()));
    for (oi, &ri) in keep.iter().enumerate() {
        for (oj, (_, col)) in blocks.iter().enumerate() {
            x[[oi, oj]] = col[ri].unwrap_or(f64::NAN);
        }
    }
    let index: Vec<NaiveDate> = keep.iter().map(|&i| dates[i]).collect();
    let y = Array1::from_iter(keep.iter().map(|&i| target[i]));

    Ok(FeatureFrame {
        index,
        columns,
        x,
        y,
    })
}
