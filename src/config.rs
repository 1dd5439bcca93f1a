//! Run configuration: closed enums for every string-valued knob plus the
//! top-level training request.
//!
//! User-facing strings are normalized at the boundary (`clip` means
//! `cap`, `none` means `keep`) and everything downstream dispatches on
//! enums.

use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What to do with detected outliers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutlierAction {
    Keep,
    Cap,
    Remove,
}

impl FromStr for OutlierAction {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "keep" | "none" => Ok(OutlierAction::Keep),
            "cap" | "clip" => Ok(OutlierAction::Cap),
            "remove" => Ok(OutlierAction::Remove),
            other => Err(ForecastError::InvalidParameter(format!(
                "Unknown outlier action '{}'. Use 'keep', 'cap', or 'remove'",
                other
            ))),
        }
    }
}

impl fmt::Display for OutlierAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OutlierAction::Keep => "keep",
            OutlierAction::Cap => "cap",
            OutlierAction::Remove => "remove",
        };
        write!(f, "{}", s)
    }
}

/// Which error estimate drives lag selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationMode {
    WalkForward,
    SingleSplit,
}

impl FromStr for ValidationMode {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "walk_forward" | "walkforward" => Ok(ValidationMode::WalkForward),
            "single_split" | "holdout" => Ok(ValidationMode::SingleSplit),
            other => Err(ForecastError::InvalidParameter(format!(
                "Unknown validation mode '{}'. Use 'walk_forward' or 'single_split'",
                other
            ))),
        }
    }
}

/// Baseline forecaster fitted on target lags only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaselineModel {
    LaggedRidge,
    SeasonalNaive,
}

impl FromStr for BaselineModel {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "lagged_ridge" | "ridge" => Ok(BaselineModel::LaggedRidge),
            "seasonal_naive" => Ok(BaselineModel::SeasonalNaive),
            other => Err(ForecastError::InvalidParameter(format!(
                "Unknown baseline model '{}'. Use 'lagged_ridge' or 'seasonal_naive'",
                other
            ))),
        }
    }
}

impl fmt::Display for BaselineModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BaselineModel::LaggedRidge => "lagged_ridge",
            BaselineModel::SeasonalNaive => "seasonal_naive",
        };
        write!(f, "{}", s)
    }
}

/// Multivariate boosted-tree variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MultivariateModel {
    /// Conservative preset: 100 shallow trees, learning rate 0.1.
    Gbm,
    /// Aggressive preset: 300 deeper trees, learning rate 0.05, column
    /// subsampling and L2 leaf regularization.
    Xgb,
}

impl FromStr for MultivariateModel {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "gbm" => Ok(MultivariateModel::Gbm),
            "xgb" => Ok(MultivariateModel::Xgb),
            other => Err(ForecastError::InvalidParameter(format!(
                "Unknown multivariate model '{}'. Use 'gbm' or 'xgb'",
                other
            ))),
        }
    }
}

impl fmt::Display for MultivariateModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MultivariateModel::Gbm => "gbm",
            MultivariateModel::Xgb => "xgb",
        };
        write!(f, "{}", s)
    }
}

/// Requested output cadence for forecasting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResampleFrequency {
    Daily,
    Weekly,
    MonthStart,
    QuarterStart,
    YearStart,
}

impl FromStr for ResampleFrequency {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "daily" | "d" => Ok(ResampleFrequency::Daily),
            "weekly" | "w" => Ok(ResampleFrequency::Weekly),
            "month_start" | "ms" => Ok(ResampleFrequency::MonthStart),
            "quarter_start" | "qs" => Ok(ResampleFrequency::QuarterStart),
            "year_start" | "ys" => Ok(ResampleFrequency::YearStart),
            other => Err(ForecastError::InvalidParameter(format!(
                "Unknown resample frequency '{}'",
                other
            ))),
        }
    }
}

/// Parse a comma-separated lag list, e.g. `"1,2,4"`.
pub fn parse_lag_config(value: &str) -> Result<Vec<usize>> {
    let lags: Vec<usize> = value
        .split(',')
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(|v| {
            v.parse::<usize>().map_err(|_| {
                ForecastError::InvalidParameter(format!("Invalid lag value '{}'", v))
            })
        })
        .collect::<Result<Vec<usize>>>()?;
    if lags.is_empty() {
        return Err(ForecastError::InvalidParameter(
            "At least one lag is required".to_string(),
        ));
    }
    if lags.contains(&0) {
        return Err(ForecastError::InvalidParameter(
            "Lags must be positive".to_string(),
        ));
    }
    Ok(lags)
}

/// Everything a training-and-forecast run needs beyond the table itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub date_col: String,
    pub target_col: String,
    #[serde(default)]
    pub drivers: Vec<String>,
    pub horizon: usize,
    pub baseline_model: BaselineModel,
    pub multivariate_model: MultivariateModel,
    /// Comma-separated lag list used when `auto_select_lags` is off, and
    /// as the fallback when the search yields nothing.
    pub lag_config: String,
    pub auto_select_lags: bool,
    /// Holdout size: absolute periods or a fraction in (0,1).
    pub test_window: String,
    pub validation_mode: ValidationMode,
    pub calendar_features: bool,
    pub holiday_features: bool,
    pub outlier_action: OutlierAction,
    pub driver_outlier_action: Option<OutlierAction>,
    pub resample_frequency: Option<ResampleFrequency>,
    pub ridge_alpha: f64,
    pub seasonal_period: usize,
    pub driver_lags: Vec<usize>,
    /// Overrides for the boosted-tree presets.
    pub boosting_params: Option<crate::models::BoostingParams>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            date_col: "date".to_string(),
            target_col: "value".to_string(),
            drivers: Vec::new(),
            horizon: 4,
            baseline_model: BaselineModel::LaggedRidge,
            multivariate_model: MultivariateModel::Gbm,
            lag_config: "1,2,4".to_string(),
            auto_select_lags: false,
            test_window: "8".to_string(),
            validation_mode: ValidationMode::WalkForward,
            calendar_features: true,
            holiday_features: false,
            outlier_action: OutlierAction::Cap,
            driver_outlier_action: None,
            resample_frequency: None,
            ridge_alpha: 1.0,
            seasonal_period: 52,
            driver_lags: vec![1, 2],
            boosting_params: None,
        }
    }
}

impl TrainConfig {
    pub fn validate(&self) -> Result<()> {
        if self.horizon == 0 {
            return Err(ForecastError::InvalidParameter(
                "Forecast horizon must be positive".to_string(),
            ));
        }
        if self.ridge_alpha < 0.0 {
            return Err(ForecastError::InvalidParameter(
                "Ridge alpha must be non-negative".to_string(),
            ));
        }
        if self.seasonal_period == 0 {
            return Err(ForecastError::InvalidParameter(
                "Seasonal period must be positive".to_string(),
            ));
        }
        parse_lag_config(&self.lag_config)?;
        crate::metrics::TestSize::parse(&self.test_window)?;
        Ok(())
    }
}
