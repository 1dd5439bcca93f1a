//! # Forecast Drivers
//!
//! A Rust library for driver-based time series forecasting on tabular data.
//!
//! ## Features
//!
//! - Tolerant tabular ingestion with column name normalization
//! - Data cleaning (date parsing, numeric coercion, outlier handling)
//! - Lag, calendar, and holiday feature engineering
//! - Baseline models (lagged ridge, seasonal naive) and gradient boosting
//! - Holdout and walk-forward backtesting with RMSE/MAE metrics
//! - Lag-set grid search and recursive multi-step forecasting
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use forecast_drivers::data::DataLoader;
//! use forecast_drivers::config::TrainConfig;
//! use forecast_drivers::pipeline::train_and_forecast;
//!
//! # fn main() -> forecast_drivers::error::Result<()> {
//! // Load data
//! let table = DataLoader::from_csv("sales.csv")?;
//!
//! // Configure the run
//! let config = TrainConfig {
//!     date_col: "Date".to_string(),
//!     target_col: "Sales".to_string(),
//!     drivers: vec!["Promo Spend".to_string()],
//!     horizon: 12,
//!     ..TrainConfig::default()
//! };
//!
//! // Clean, backtest, and forecast in one pass
//! let result = train_and_forecast(&table, &config)?;
//! println!("{}", serde_json::to_string_pretty(&result)?);
//! # Ok(())
//! # }
//! ```

pub mod calendar;
pub mod cleaning;
pub mod columns;
pub mod config;
pub mod data;
pub mod error;
pub mod evaluation;
pub mod features;
pub mod forecasting;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod search;

// Re-export commonly used types
pub use crate::cleaning::{CleanedFrame, CleaningOptions, CleaningReport};
pub use crate::config::TrainConfig;
pub use crate::data::{DataLoader, RawTable};
pub use crate::error::{ForecastError, Result};
pub use crate::features::{FeatureFrame, FeatureSpec};
pub use crate::models::Regressor;
pub use crate::pipeline::{train_and_forecast, AnalysisResult};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
