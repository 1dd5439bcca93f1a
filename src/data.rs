//! Tabular data boundary for the pipeline
//!
//! The ingestion layer hands the pipeline a well-formed table with string
//! column names and heterogeneous cells. [`RawTable`] wraps a polars
//! `DataFrame` at that boundary and exposes the narrow extraction helpers
//! the cleaning pipeline needs; everything downstream works on native
//! vectors.

use crate::error::{ForecastError, Result};
use chrono::{Duration, NaiveDate};
use polars::prelude::*;
use serde::Serialize;
use std::fs::File;
use std::path::Path;

/// Immutable input table with named columns and mixed cell types.
#[derive(Debug, Clone)]
pub struct RawTable {
    df: DataFrame,
}

/// Data loader for tabular datasets
#[derive(Debug)]
pub struct DataLoader;

impl DataLoader {
    /// Load a table from a CSV file.
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<RawTable> {
        let file = File::open(path)?;
        let df = CsvReader::new(file)
            .infer_schema(None)
            .has_header(true)
            .finish()?;
        Ok(RawTable::new(df))
    }
}

impl RawTable {
    /// Wrap an existing DataFrame.
    pub fn new(df: DataFrame) -> Self {
        Self { df }
    }

    /// Build a table from named string columns (handy for tests).
    pub fn from_string_columns(columns: Vec<(&str, Vec<Option<&str>>)>) -> Result<Self> {
        let series: Vec<Series> = columns
            .into_iter()
            .map(|(name, values)| Series::new(name, values))
            .collect();
        let df = DataFrame::new(series)?;
        Ok(Self { df })
    }

    /// Access the underlying DataFrame.
    pub fn dataframe(&self) -> &DataFrame {
        &self.df
    }

    /// Number of rows.
    pub fn height(&self) -> usize {
        self.df.height()
    }

    /// Number of columns.
    pub fn width(&self) -> usize {
        self.df.width()
    }

    /// True when the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.df.height() == 0
    }

    /// Column names as owned strings.
    pub fn column_names(&self) -> Vec<String> {
        self.df
            .get_column_names()
            .into_iter()
            .map(|s| s.to_string())
            .collect()
    }

    /// Extract a column as optional strings, regardless of its dtype.
    ///
    /// Numeric, boolean, and temporal cells are rendered to canonical text
    /// so the cleaning pipeline can apply one coercion path to every
    /// column. Nulls come back as `None`.
    pub fn column_as_strings(&self, name: &str) -> Result<Vec<Option<String>>> {
        let col = self.df.column(name).map_err(|_| {
            ForecastError::ColumnNotFound(name.to_string())
        })?;

        let values = match col.dtype() {
            DataType::Utf8 => col
                .utf8()?
                .into_iter()
                .map(|v| v.map(|s| s.to_string()))
                .collect(),
            DataType::Float64 => col
                .f64()?
                .into_iter()
                .map(|v| v.map(format_float))
                .collect(),
            DataType::Float32 => col
                .f32()?
                .into_iter()
                .map(|v| v.map(|x| format_float(x as f64)))
                .collect(),
            DataType::Int64 => col
                .i64()?
                .into_iter()
                .map(|v| v.map(|x| x.to_string()))
                .collect(),
            DataType::Int32 => col
                .i32()?
                .into_iter()
                .map(|v| v.map(|x| x.to_string()))
                .collect(),
            DataType::UInt64 => col
                .u64()?
                .into_iter()
                .map(|v| v.map(|x| x.to_string()))
                .collect(),
            DataType::UInt32 => col
                .u32()?
                .into_iter()
                .map(|v| v.map(|x| x.to_string()))
                .collect(),
            DataType::Boolean => col
                .bool()?
                .into_iter()
                .map(|v| v.map(|x| x.to_string()))
                .collect(),
            DataType::Date => col
                .date()?
                .into_iter()
                .map(|v| v.map(|days| date_from_epoch_days(days as i64).format("%Y-%m-%d").to_string()))
                .collect(),
            DataType::Datetime(unit, _) => {
                let divisor = match unit {
                    TimeUnit::Nanoseconds => 86_400_000_000_000i64,
                    TimeUnit::Microseconds => 86_400_000_000i64,
                    TimeUnit::Milliseconds => 86_400_000i64,
                };
                col.datetime()?
                    .into_iter()
                    .map(|v| {
                        v.map(|ts| {
                            date_from_epoch_days(ts.div_euclid(divisor))
                                .format("%Y-%m-%d")
                                .to_string()
                        })
                    })
                    .collect()
            }
            DataType::Null => vec![None; col.len()],
            other => {
                return Err(ForecastError::DataError(format!(
                    "Column '{}' has unsupported dtype {:?}",
                    name, other
                )))
            }
        };

        Ok(values)
    }
}

/// Convert days since 1970-01-01 to a calendar date.
pub(crate) fn date_from_epoch_days(days: i64) -> NaiveDate {
    // NaiveDate::default() is the Unix epoch
    NaiveDate::default() + Duration::days(days)
}

fn format_float(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{}", v)
    }
}

/// Per-column quality summary for a raw table.
#[derive(Debug, Clone, Serialize)]
pub struct ColumnHealth {
    pub name: String,
    pub dtype: String,
    pub missing_count: usize,
    pub missing_pct: f64,
}

/// Summary of data-quality issues across a raw table.
#[derive(Debug, Clone, Serialize)]
pub struct DataHealth {
    pub total_rows: usize,
    pub total_columns: usize,
    pub columns: Vec<ColumnHealth>,
}

/// Summarize missingness per column, before any cleaning runs.
pub fn data_health(table: &RawTable) -> DataHealth {
    let n = table.height();
    let columns = table
        .dataframe()
        .get_columns()
        .iter()
        .map(|col| {
            let missing = col.null_count();
            ColumnHealth {
                name: col.name().to_string(),
                dtype: format!("{:?}", col.dtype()),
                missing_count: missing,
                missing_pct: if n == 0 {
                    0.0
                } else {
                    (missing as f64 / n as f64 * 1000.0).round() / 10.0
                },
            }
        })
        .collect();

    DataHealth {
        total_rows: n,
        total_columns: table.width(),
        columns,
    }
}
