//! Cleaning pipeline for time-series training data
//!
//! Takes a raw table plus requested date/target/driver labels and produces
//! a [`CleanedFrame`] whose date axis is strictly increasing and whose
//! target is complete and finite, together with a [`CleaningReport`]
//! describing every transformation that was applied.
//!
//! The stages run in a fixed order: empty row/column removal, label
//! resolution, date parsing with a single per-column interpretation,
//! numeric coercion, driver typing, sort and dedup, weekly driver
//! averaging, target fill, driver fill, outlier handling, readiness
//! validation.

use crate::columns::ColumnMapping;
use crate::config::OutlierAction;
use crate::data::RawTable;
use crate::error::{ForecastError, Result};
use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use crate::calendar::{median_gap_days, week_ending_sunday};

/// A driver column after cleaning: numeric (median-filled) or
/// categorical (sentinel-filled).
#[derive(Debug, Clone, PartialEq)]
pub enum DriverColumn {
    Numeric(Vec<f64>),
    Categorical(Vec<String>),
}

impl DriverColumn {
    pub fn len(&self) -> usize {
        match self {
            DriverColumn::Numeric(v) => v.len(),
            DriverColumn::Categorical(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_numeric(&self) -> Option<&[f64]> {
        match self {
            DriverColumn::Numeric(v) => Some(v),
            DriverColumn::Categorical(_) => None,
        }
    }
}

/// Cleaned dataset: strictly increasing unique dates, complete finite
/// target, typed driver columns keyed by canonical name.
#[derive(Debug, Clone)]
pub struct CleanedFrame {
    pub dates: Vec<NaiveDate>,
    pub target: Vec<f64>,
    pub drivers: Vec<(String, DriverColumn)>,
}

impl CleanedFrame {
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Numeric driver columns in declaration order.
    pub fn numeric_drivers(&self) -> Vec<(&str, &[f64])> {
        self.drivers
            .iter()
            .filter_map(|(name, col)| col.as_numeric().map(|v| (name.as_str(), v)))
            .collect()
    }

    pub fn driver(&self, name: &str) -> Option<&DriverColumn> {
        self.drivers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, col)| col)
    }
}

/// Knobs for [`clean_for_training`].
#[derive(Debug, Clone)]
pub struct CleaningOptions {
    pub outlier_action: OutlierAction,
    /// Defaults to `outlier_action` when unset.
    pub driver_outlier_action: Option<OutlierAction>,
    pub average_daily_drivers_to_weekly: bool,
    pub min_rows: usize,
}

impl Default for CleaningOptions {
    fn default() -> Self {
        Self {
            outlier_action: OutlierAction::Cap,
            driver_outlier_action: None,
            average_daily_drivers_to_weekly: true,
            min_rows: 20,
        }
    }
}

/// Pass/fail judgment on whether a cleaned dataset can be trained on.
#[derive(Debug, Clone, Serialize)]
pub struct Readiness {
    pub ready: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub row_count: usize,
    pub column_count: usize,
}

/// What the cleaning pipeline did, and whether the result is usable.
#[derive(Debug, Clone, Serialize)]
pub struct CleaningReport {
    pub column_mapping: Vec<(String, String)>,
    pub date_col: String,
    pub target_col: String,
    pub driver_cols: Vec<String>,
    pub driver_outlier_action: OutlierAction,
    pub driver_weekly_averaging_applied: bool,
    pub rows_removed: usize,
    pub cols_removed: usize,
    pub invalid_dates_removed: usize,
    pub target_nan_before: usize,
    pub target_nan_after: usize,
    pub date_order: DateOrder,
    pub ready: Readiness,
}

// ---------------------------------------------------------------------------
// Date parsing

/// Field order used to interpret ambiguous numeric dates, applied
/// uniformly to a whole column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DateOrder {
    MonthFirst,
    DayFirst,
    YearFirst,
}

const DATE_ORDERS: [DateOrder; 3] = [
    DateOrder::MonthFirst,
    DateOrder::DayFirst,
    DateOrder::YearFirst,
];

/// Pull the date-like substring out of a cell: strips bracket/quote
/// wrappers and keeps the longest run of digits and date separators.
fn extract_date_token(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_matches(|c| "\"'()[]".contains(c)).trim();
    if trimmed.is_empty() {
        return None;
    }

    let mut best = String::new();
    let mut current = String::new();
    for c in trimmed.chars() {
        if c.is_ascii_digit() || matches!(c, '/' | '-' | '.') {
            current.push(c);
        } else {
            if current.len() > best.len() {
                best = std::mem::take(&mut current);
            }
            current.clear();
        }
    }
    if current.len() > best.len() {
        best = current;
    }
    let token = best.trim_matches(|c| "/-.".contains(c));
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

fn month_from_name(token: &str) -> Option<u32> {
    const MONTHS: [(&str, &str); 12] = [
        ("jan", "january"),
        ("feb", "february"),
        ("mar", "march"),
        ("apr", "april"),
        ("may", "may"),
        ("jun", "june"),
        ("jul", "july"),
        ("aug", "august"),
        ("sep", "september"),
        ("oct", "october"),
        ("nov", "november"),
        ("dec", "december"),
    ];
    let t = token.to_lowercase();
    MONTHS
        .iter()
        .position(|(abbr, full)| t == *abbr || t == *full || (*abbr == "sep" && t == "sept"))
        .map(|i| i as u32 + 1)
}

/// Parse a cell whose month is spelled out, such as `8 Jan 2023`,
/// `Jan 8, 2023`, or `08-Mar-23`. The named month removes the field-order
/// ambiguity, so the result holds under every interpretation.
fn parse_month_name_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim().trim_matches(|c| "\"'()[]".contains(c));
    let mut month: Option<u32> = None;
    let mut nums: Vec<&str> = Vec::new();
    for token in trimmed
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
    {
        if token.chars().all(|c| c.is_ascii_digit()) {
            nums.push(token);
        } else if let Some(m) = month_from_name(token) {
            if month.replace(m).is_some() {
                return None;
            }
        } else {
            return None;
        }
    }
    let month = month?;
    if nums.len() != 2 {
        return None;
    }
    let (year_tok, day_tok) = if nums[0].len() == 4 {
        (nums[0], nums[1])
    } else {
        (nums[1], nums[0])
    };
    let year = expand_two_digit_year(year_tok.parse().ok()?);
    let day: u32 = day_tok.parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

fn expand_two_digit_year(y: i32) -> i32 {
    if y < 100 {
        if y < 70 {
            2000 + y
        } else {
            1900 + y
        }
    } else {
        y
    }
}

/// Parse one extracted token under a fixed field order.
fn parse_token(token: &str, order: DateOrder) -> Option<NaiveDate> {
    let parts: Vec<&str> = token
        .split(|c| matches!(c, '/' | '-' | '.'))
        .filter(|p| !p.is_empty())
        .collect();
    if parts.len() != 3 {
        return None;
    }
    let nums: Vec<i32> = parts
        .iter()
        .map(|p| p.parse::<i32>().ok())
        .collect::<Option<Vec<i32>>>()?;

    let (y, m, d) = match order {
        DateOrder::YearFirst => (nums[0], nums[1], nums[2]),
        DateOrder::MonthFirst => (expand_two_digit_year(nums[2]), nums[0], nums[1]),
        DateOrder::DayFirst => (expand_two_digit_year(nums[2]), nums[1], nums[0]),
    };
    if order == DateOrder::YearFirst && parts[0].len() < 4 {
        return None;
    }
    NaiveDate::from_ymd_opt(y, m as u32, d as u32)
}

/// Parse a whole date column with one consistent interpretation.
///
/// Every cell is tried under month-first, day-first, and year-first
/// orders; the order with the most successful parses wins and is applied
/// to all rows. Ties prefer month-first, then day-first. Cells that fail
/// under the winning order come back as `None`.
pub fn parse_date_column(values: &[Option<String>]) -> (Vec<Option<NaiveDate>>, DateOrder) {
    enum DateCell {
        Resolved(NaiveDate),
        Token(String),
    }

    let cells: Vec<Option<DateCell>> = values
        .iter()
        .map(|v| {
            v.as_deref().and_then(|raw| {
                if let Some(date) = parse_month_name_date(raw) {
                    Some(DateCell::Resolved(date))
                } else {
                    extract_date_token(raw).map(DateCell::Token)
                }
            })
        })
        .collect();

    let parse_cell = |cell: &Option<DateCell>, order: DateOrder| -> Option<NaiveDate> {
        match cell {
            Some(DateCell::Resolved(d)) => Some(*d),
            Some(DateCell::Token(t)) => parse_token(t, order),
            None => None,
        }
    };

    // strictly-greater comparison keeps the earlier order on ties, so
    // ambiguous columns resolve month-first
    let mut best_order = DATE_ORDERS[0];
    let mut best_count = 0usize;
    for (i, order) in DATE_ORDERS.into_iter().enumerate() {
        let count = cells
            .iter()
            .filter(|c| parse_cell(c, order).is_some())
            .count();
        if i == 0 || count > best_count {
            best_order = order;
            best_count = count;
        }
    }

    let parsed = cells.iter().map(|c| parse_cell(c, best_order)).collect();
    (parsed, best_order)
}

// ---------------------------------------------------------------------------
// Numeric coercion

/// Coerce one cell to a number the way messy business exports need:
/// currency symbols, thousands separators, percent signs, and whitespace
/// are stripped; `(123)` becomes `-123`; empty and null-ish strings
/// become missing.
pub fn coerce_numeric(raw: Option<&str>) -> Option<f64> {
    let s = raw?;
    let mut cleaned: String = s
        .chars()
        .filter(|c| !matches!(c, '£' | '$' | '€' | ',' | '%') && !c.is_whitespace())
        .collect();

    if cleaned.len() >= 2 && cleaned.starts_with('(') && cleaned.ends_with(')') {
        cleaned = format!("-{}", &cleaned[1..cleaned.len() - 1]);
    }

    let lowered = cleaned.to_lowercase();
    if matches!(lowered.as_str(), "" | "nan" | "none" | "null") {
        return None;
    }

    cleaned.parse::<f64>().ok()
}

/// Fraction of cells in a column that coerce to numbers.
pub fn numeric_ratio(values: &[Option<String>]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let ok = values
        .iter()
        .filter(|v| coerce_numeric(v.as_deref()).is_some())
        .count();
    ok as f64 / values.len() as f64
}

// ---------------------------------------------------------------------------
// Missing-value handling

/// Strategy for filling missing values in a numeric column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FillStrategy {
    Mean,
    Median,
    Ffill,
    Bfill,
    Interpolate,
    Value(f64),
}

/// Fill missing values in place according to `strategy`.
///
/// `Interpolate` fills interior gaps linearly by position; leading gaps
/// are left for `Bfill` and trailing gaps are carried forward from the
/// last known value.
pub fn fill_missing(values: &mut [Option<f64>], strategy: FillStrategy) {
    match strategy {
        FillStrategy::Mean => {
            let known: Vec<f64> = values.iter().filter_map(|v| *v).collect();
            if !known.is_empty() {
                let m = known.iter().sum::<f64>() / known.len() as f64;
                for v in values.iter_mut() {
                    v.get_or_insert(m);
                }
            }
        }
        FillStrategy::Median => {
            let mut known: Vec<f64> = values.iter().filter_map(|v| *v).collect();
            if !known.is_empty() {
                known.sort_by(|a, b| a.total_cmp(b));
                let m = quantile_sorted(&known, 0.5);
                for v in values.iter_mut() {
                    v.get_or_insert(m);
                }
            }
        }
        FillStrategy::Ffill => {
            let mut last = None;
            for v in values.iter_mut() {
                match v {
                    Some(x) => last = Some(*x),
                    None => *v = last,
                }
            }
        }
        FillStrategy::Bfill => {
            let mut next = None;
            for v in values.iter_mut().rev() {
                match v {
                    Some(x) => next = Some(*x),
                    None => *v = next,
                }
            }
        }
        FillStrategy::Interpolate => interpolate_linear(values),
        FillStrategy::Value(fill) => {
            for v in values.iter_mut() {
                v.get_or_insert(fill);
            }
        }
    }
}

fn interpolate_linear(values: &mut [Option<f64>]) {
    let known: Vec<(usize, f64)> = values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.map(|x| (i, x)))
        .collect();
    if known.is_empty() {
        return;
    }
    for pair in known.windows(2) {
        let (i0, v0) = pair[0];
        let (i1, v1) = pair[1];
        for i in i0 + 1..i1 {
            let t = (i - i0) as f64 / (i1 - i0) as f64;
            values[i] = Some(v0 + t * (v1 - v0));
        }
    }
    // positions past the last known value carry it forward
    let (last_idx, last_val) = known[known.len() - 1];
    for v in values.iter_mut().skip(last_idx + 1) {
        *v = Some(last_val);
    }
}

// ---------------------------------------------------------------------------
// Outliers

/// Outlier detection method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutlierMethod {
    Iqr,
    ZScore,
}

impl OutlierMethod {
    fn default_threshold(&self) -> f64 {
        match self {
            OutlierMethod::Iqr => 1.5,
            OutlierMethod::ZScore => 3.0,
        }
    }
}

/// Distribution stats backing an outlier decision.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum OutlierStats {
    Iqr {
        q1: f64,
        q3: f64,
        iqr: f64,
        lower_bound: f64,
        upper_bound: f64,
        outlier_count: usize,
        outlier_pct: f64,
    },
    Zscore {
        mean: f64,
        std: f64,
        threshold: f64,
        outlier_count: usize,
        outlier_pct: f64,
    },
}

impl OutlierStats {
    /// Clip bounds implied by the stats.
    pub fn bounds(&self) -> (f64, f64) {
        match self {
            OutlierStats::Iqr {
                lower_bound,
                upper_bound,
                ..
            } => (*lower_bound, *upper_bound),
            OutlierStats::Zscore {
                mean,
                std,
                threshold,
                ..
            } => (mean - threshold * std, mean + threshold * std),
        }
    }
}

/// Quantile of a sorted slice with linear interpolation between ranks.
fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let h = (sorted.len() - 1) as f64 * q;
    let lo = h.floor() as usize;
    let hi = h.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo])
    }
}

fn mean_of(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Flag outliers in a column, returning a mask (true = outlier) plus the
/// distribution stats used. `threshold` falls back to the method default
/// (1.5 for IQR, 3.0 for z-score).
pub fn detect_outliers(
    values: &[f64],
    method: OutlierMethod,
    threshold: Option<f64>,
) -> (Vec<bool>, OutlierStats) {
    let threshold = threshold.unwrap_or_else(|| method.default_threshold());

    match method {
        OutlierMethod::Iqr => {
            let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
            sorted.sort_by(|a, b| a.total_cmp(b));
            let q1 = quantile_sorted(&sorted, 0.25);
            let q3 = quantile_sorted(&sorted, 0.75);
            let iqr = q3 - q1;
            let lower = q1 - threshold * iqr;
            let upper = q3 + threshold * iqr;
            let mask: Vec<bool> = values.iter().map(|v| *v < lower || *v > upper).collect();
            let count = mask.iter().filter(|m| **m).count();
            let stats = OutlierStats::Iqr {
                q1,
                q3,
                iqr,
                lower_bound: lower,
                upper_bound: upper,
                outlier_count: count,
                outlier_pct: pct(count, values.len()),
            };
            (mask, stats)
        }
        OutlierMethod::ZScore => {
            let mean = mean_of(values);
            let n = values.len();
            let std = if n > 1 {
                (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64).sqrt()
            } else {
                0.0
            };
            let mask: Vec<bool> = if std == 0.0 || !std.is_finite() {
                vec![false; n]
            } else {
                values
                    .iter()
                    .map(|v| ((v - mean) / std).abs() > threshold)
                    .collect()
            };
            let count = mask.iter().filter(|m| **m).count();
            let stats = OutlierStats::Zscore {
                mean,
                std,
                threshold,
                outlier_count: count,
                outlier_pct: pct(count, n),
            };
            (mask, stats)
        }
    }
}

fn pct(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        (count as f64 / total as f64 * 10_000.0).round() / 100.0
    }
}

/// Apply an outlier policy to a standalone column.
///
/// `Cap` clips to the detection bounds and preserves length; `Remove`
/// drops flagged values; `Keep` is a no-op.
pub fn handle_outliers(
    values: &[f64],
    action: OutlierAction,
    method: OutlierMethod,
    threshold: Option<f64>,
) -> Vec<f64> {
    if action == OutlierAction::Keep {
        return values.to_vec();
    }
    let (mask, stats) = detect_outliers(values, method, threshold);
    match action {
        OutlierAction::Keep => unreachable!(),
        OutlierAction::Remove => values
            .iter()
            .zip(&mask)
            .filter(|(_, m)| !**m)
            .map(|(v, _)| *v)
            .collect(),
        OutlierAction::Cap => {
            let (lower, upper) = stats.bounds();
            values.iter().map(|v| v.clamp(lower, upper)).collect()
        }
    }
}

// ---------------------------------------------------------------------------
// Frequency validation

/// Cadence diagnosis for a date axis.
#[derive(Debug, Clone, Serialize)]
pub struct FrequencyReport {
    pub detected_frequency: String,
    pub median_gap_days: f64,
    pub total_rows: usize,
    pub missing_ranges: Vec<(String, String)>,
    pub has_gaps: bool,
}

/// Classify a sorted date axis as daily/weekly/monthly/irregular and
/// flag gaps larger than 1.5x the median spacing.
pub fn validate_frequency(dates: &[NaiveDate]) -> FrequencyReport {
    let median = median_gap_days(dates).unwrap_or(0.0);
    let label = if (5.0..=9.0).contains(&median) {
        "weekly"
    } else if (25.0..=35.0).contains(&median) {
        "monthly"
    } else if (0.0..=2.0).contains(&median) {
        "daily"
    } else {
        "irregular"
    };

    let threshold = median * 1.5;
    let mut missing_ranges = Vec::new();
    for w in dates.windows(2) {
        let gap = (w[1] - w[0]).num_days() as f64;
        if median > 0.0 && gap > threshold {
            missing_ranges.push((w[0].to_string(), w[1].to_string()));
        }
    }

    FrequencyReport {
        detected_frequency: label.to_string(),
        median_gap_days: median,
        total_rows: dates.len(),
        has_gaps: !missing_ranges.is_empty(),
        missing_ranges,
    }
}

// ---------------------------------------------------------------------------
// Readiness

/// Validate that a cleaned frame meets the minimum bar for training.
///
/// Errors block training; warnings are advisory. A row count under
/// `min_rows` only warns.
pub fn validate_ready(frame: &CleanedFrame, min_rows: usize) -> Readiness {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if frame.target.is_empty() {
        errors.push("Target column has no usable values".to_string());
    }

    let target_nonfinite = frame.target.iter().filter(|v| !v.is_finite()).count();
    if target_nonfinite > 0 {
        errors.push(format!(
            "Target has {} missing or infinite values",
            target_nonfinite
        ));
    }

    if frame.len() < min_rows {
        warnings.push(format!(
            "Low data: only {} rows (recommend {}+)",
            frame.len(),
            min_rows
        ));
    }

    for (name, col) in &frame.drivers {
        match col {
            DriverColumn::Numeric(values) => {
                if values.iter().any(|v| !v.is_finite()) {
                    errors.push(format!("Column '{}' contains non-finite values", name));
                }
                if values.is_empty() && !frame.dates.is_empty() {
                    errors.push(format!("Column '{}' is entirely empty", name));
                }
            }
            DriverColumn::Categorical(values) => {
                if values.iter().all(|v| v == "unknown") && !values.is_empty() {
                    warnings.push(format!("Column '{}' has no known values", name));
                }
            }
        }
    }

    Readiness {
        ready: errors.is_empty(),
        errors,
        warnings,
        row_count: frame.len(),
        column_count: 2 + frame.drivers.len(),
    }
}

// ---------------------------------------------------------------------------
// The pipeline

struct WorkingColumn {
    name: String,
    cells: Vec<Option<String>>,
}

/// End-to-end cleaning pipeline for model training.
pub fn clean_for_training(
    table: &RawTable,
    date_col: &str,
    target_col: &str,
    driver_cols: &[String],
    options: &CleaningOptions,
) -> Result<(CleanedFrame, CleaningReport)> {
    if table.is_empty() || table.width() == 0 {
        return Err(ForecastError::DataError("Input table is empty".to_string()));
    }

    let initial_rows = table.height();
    let initial_cols = table.width();

    let mut columns: Vec<WorkingColumn> = table
        .column_names()
        .into_iter()
        .map(|name| {
            Ok(WorkingColumn {
                cells: table.column_as_strings(&name)?,
                name,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    // drop rows and columns that are entirely empty
    let keep_rows: Vec<usize> = (0..initial_rows)
        .filter(|&i| columns.iter().any(|c| c.cells[i].is_some()))
        .collect();
    for col in &mut columns {
        col.cells = keep_rows.iter().map(|&i| col.cells[i].take()).collect();
    }
    columns.retain(|c| c.cells.iter().any(|v| v.is_some()));

    if columns.is_empty() || columns[0].cells.is_empty() {
        return Err(ForecastError::DataError(
            "Input table has no non-empty rows".to_string(),
        ));
    }

    let labels: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();
    let mapping = ColumnMapping::build(&labels);
    for col in &mut columns {
        col.name = mapping
            .resolve(&col.name)
            .unwrap_or_else(|_| col.name.clone());
    }

    let date_key = mapping.resolve(date_col)?;
    let target_key = mapping.resolve(target_col)?;

    // unknown drivers are skipped so optional signals degrade gracefully
    let mut driver_keys: Vec<String> = Vec::new();
    for requested in driver_cols {
        if let Ok(resolved) = mapping.resolve(requested) {
            if resolved != date_key && resolved != target_key && !driver_keys.contains(&resolved) {
                driver_keys.push(resolved);
            }
        }
    }

    let find = |columns: &[WorkingColumn], key: &str| -> Vec<Option<String>> {
        columns
            .iter()
            .find(|c| c.name == key)
            .map(|c| c.cells.clone())
            .unwrap_or_default()
    };

    let target_raw = find(&columns, &target_key);
    let target_nan_before = target_raw.iter().filter(|v| v.is_none()).count();

    let (parsed_dates, date_order) = parse_date_column(&find(&columns, &date_key));
    let invalid_dates = parsed_dates.iter().filter(|d| d.is_none()).count();
    debug!(order = ?date_order, invalid = invalid_dates, "parsed date column");

    // drop rows without a parseable date
    let valid_rows: Vec<usize> = parsed_dates
        .iter()
        .enumerate()
        .filter_map(|(i, d)| d.map(|_| i))
        .collect();
    if valid_rows.is_empty() {
        return Err(ForecastError::DataError(format!(
            "No rows with a parseable date in column '{}'",
            date_col
        )));
    }

    let mut dates: Vec<NaiveDate> = valid_rows
        .iter()
        .filter_map(|&i| parsed_dates[i])
        .collect();
    let mut target: Vec<Option<f64>> = valid_rows
        .iter()
        .map(|&i| coerce_numeric(target_raw[i].as_deref()))
        .collect();

    // type each driver by its numeric coercibility
    enum RawDriver {
        Numeric(Vec<Option<f64>>),
        Categorical(Vec<Option<String>>),
    }
    let mut raw_drivers: Vec<(String, RawDriver)> = Vec::new();
    for key in &driver_keys {
        let cells = find(&columns, key);
        let subset: Vec<Option<String>> = valid_rows.iter().map(|&i| cells[i].clone()).collect();
        if numeric_ratio(&subset) >= 0.6 {
            let values = subset
                .iter()
                .map(|v| coerce_numeric(v.as_deref()))
                .collect();
            raw_drivers.push((key.clone(), RawDriver::Numeric(values)));
        } else {
            raw_drivers.push((key.clone(), RawDriver::Categorical(subset)));
        }
    }

    // sort ascending, dedup keeping the last occurrence per date
    let mut order: Vec<usize> = (0..dates.len()).collect();
    order.sort_by_key(|&i| (dates[i], i));
    let mut keep: Vec<usize> = Vec::with_capacity(order.len());
    for &i in &order {
        if let Some(&prev) = keep.last() {
            if dates[prev] == dates[i] {
                keep.pop();
            }
        }
        keep.push(i);
    }
    dates = keep.iter().map(|&i| dates[i]).collect();
    target = keep.iter().map(|&i| target[i]).collect();
    for (_, driver) in &mut raw_drivers {
        match driver {
            RawDriver::Numeric(v) => *v = keep.iter().map(|&i| v[i]).collect(),
            RawDriver::Categorical(v) => *v = keep.iter().map(|&i| v[i].clone()).collect(),
        }
    }

    // daily drivers on a (presumably) weekly target: replace each value
    // with its Sunday-ending weekly mean, preserving row count
    let has_numeric_driver = raw_drivers
        .iter()
        .any(|(_, d)| matches!(d, RawDriver::Numeric(_)));
    let median_gap = median_gap_days(&dates);
    let mut weekly_averaging_applied = false;
    if options.average_daily_drivers_to_weekly
        && has_numeric_driver
        && matches!(median_gap, Some(g) if g <= 2.0)
    {
        let week_keys: Vec<NaiveDate> = dates.iter().map(|d| week_ending_sunday(*d)).collect();
        for (_, driver) in &mut raw_drivers {
            if let RawDriver::Numeric(values) = driver {
                *values = weekly_mean_broadcast(&week_keys, values);
            }
        }
        weekly_averaging_applied = true;
        debug!("applied weekly driver averaging");
    }

    let driver_action = options
        .driver_outlier_action
        .unwrap_or(options.outlier_action);

    // target fill: interpolate interior gaps, pad the edges, drop the rest
    fill_missing(&mut target, FillStrategy::Interpolate);
    fill_missing(&mut target, FillStrategy::Ffill);
    fill_missing(&mut target, FillStrategy::Bfill);
    let filled_rows: Vec<usize> = (0..target.len()).filter(|&i| target[i].is_some()).collect();
    if filled_rows.len() < target.len() {
        dates = filled_rows.iter().map(|&i| dates[i]).collect();
        target = filled_rows.iter().map(|&i| target[i]).collect();
        for (_, driver) in &mut raw_drivers {
            match driver {
                RawDriver::Numeric(v) => *v = filled_rows.iter().map(|&i| v[i]).collect(),
                RawDriver::Categorical(v) => {
                    *v = filled_rows.iter().map(|&i| v[i].clone()).collect()
                }
            }
        }
    }
    let mut target: Vec<f64> = target.into_iter().flatten().collect();

    // finalize drivers: median-fill numerics then apply the driver outlier
    // policy; sentinel-fill categoricals
    let mut drivers: Vec<(String, DriverColumn)> = Vec::new();
    for (name, driver) in raw_drivers {
        match driver {
            RawDriver::Numeric(mut values) => {
                fill_missing(&mut values, FillStrategy::Median);
                let filled: Vec<f64> = values
                    .into_iter()
                    .map(|v| v.unwrap_or(f64::NAN))
                    .collect();
                drivers.push((name, DriverColumn::Numeric(filled)));
            }
            RawDriver::Categorical(values) => {
                let filled = values
                    .into_iter()
                    .map(|v| {
                        let v = v.unwrap_or_default();
                        if v.trim().is_empty() {
                            "unknown".to_string()
                        } else {
                            v
                        }
                    })
                    .collect();
                drivers.push((name, DriverColumn::Categorical(filled)));
            }
        }
    }

    // driver outliers: bounds recomputed per column on the current frame
    if driver_action != OutlierAction::Keep {
        for idx in 0..drivers.len() {
            let detected = {
                let (_, col) = &drivers[idx];
                match col.as_numeric() {
                    Some(values) => detect_outliers(values, OutlierMethod::Iqr, None),
                    None => continue,
                }
            };
            let (mask, stats) = detected;
            match driver_action {
                OutlierAction::Cap => {
                    let (lower, upper) = stats.bounds();
                    if let (_, DriverColumn::Numeric(values)) = &mut drivers[idx] {
                        for v in values.iter_mut() {
                            *v = v.clamp(lower, upper);
                        }
                    }
                }
                OutlierAction::Remove => {
                    retain_rows(&mask, &mut dates, &mut target, &mut drivers)
                }
                OutlierAction::Keep => {}
            }
        }
    }

    // target outliers, with the target's own action
    if options.outlier_action != OutlierAction::Keep {
        let (mask, stats) = detect_outliers(&target, OutlierMethod::Iqr, None);
        match options.outlier_action {
            OutlierAction::Cap => {
                let (lower, upper) = stats.bounds();
                for v in &mut target {
                    *v = v.clamp(lower, upper);
                }
            }
            OutlierAction::Remove => {
                retain_rows(&mask, &mut dates, &mut target, &mut drivers);
            }
            OutlierAction::Keep => {}
        }
    }

    let frame = CleanedFrame {
        dates,
        target,
        drivers,
    };
    let readiness = validate_ready(&frame, options.min_rows);

    let report = CleaningReport {
        column_mapping: mapping
            .iter()
            .map(|(orig, key)| (orig.to_string(), key.to_string()))
            .collect(),
        date_col: date_key,
        target_col: target_key,
        driver_cols: driver_keys,
        driver_outlier_action: driver_action,
        driver_weekly_averaging_applied: weekly_averaging_applied,
        rows_removed: initial_rows.saturating_sub(frame.len()),
        cols_removed: initial_cols.saturating_sub(labels.len()),
        invalid_dates_removed: invalid_dates,
        target_nan_before,
        target_nan_after: 0,
        date_order,
        ready: readiness,
    };

    Ok((frame, report))
}

fn weekly_mean_broadcast(week_keys: &[NaiveDate], values: &[Option<f64>]) -> Vec<Option<f64>> {
    use std::collections::HashMap;
    let mut sums: HashMap<NaiveDate, (f64, usize)> = HashMap::new();
    for (week, value) in week_keys.iter().zip(values) {
        if let Some(v) = value {
            let entry = sums.entry(*week).or_insert((0.0, 0));
            entry.0 += v;
            entry.1 += 1;
        }
    }
    week_keys
        .iter()
        .map(|week| {
            sums.get(week)
                .filter(|(_, n)| *n > 0)
                .map(|(sum, n)| sum / *n as f64)
        })
        .collect()
}

/// Drop every row flagged in `mask` from the date axis, target, and all
/// driver columns.
fn retain_rows(
    mask: &[bool],
    dates: &mut Vec<NaiveDate>,
    target: &mut Vec<f64>,
    drivers: &mut Vec<(String, DriverColumn)>,
) {
    let keep: Vec<usize> = mask
        .iter()
        .enumerate()
        .filter_map(|(i, m)| (!m).then_some(i))
        .collect();
    *dates = keep.iter().map(|&i| dates[i]).collect();
    *target = keep.iter().map(|&i| target[i]).collect();
    for (_, col) in drivers.iter_mut() {
        match col {
            DriverColumn::Numeric(v) => *v = keep.iter().map(|&i| v[i]).collect(),
            DriverColumn::Categorical(v) => *v = keep.iter().map(|&i| v[i].clone()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coercion_strips_currency_and_separators() {
        assert_eq!(coerce_numeric(Some("£1,234.50")), Some(1234.5));
        assert_eq!(coerce_numeric(Some("$ 99")), Some(99.0));
        assert_eq!(coerce_numeric(Some("12%")), Some(12.0));
        assert_eq!(coerce_numeric(Some("(123)")), Some(-123.0));
        assert_eq!(coerce_numeric(Some("nan")), None);
        assert_eq!(coerce_numeric(Some("  ")), None);
        assert_eq!(coerce_numeric(None), None);
    }

    #[test]
    fn date_column_uses_one_interpretation() {
        let values: Vec<Option<String>> = vec![
            Some("13/01/2024".into()),
            Some("14/01/2024".into()),
            Some("05/01/2024".into()),
        ];
        let (parsed, order) = parse_date_column(&values);
        assert_eq!(order, DateOrder::DayFirst);
        // day-first applies to the unambiguous row too
        assert_eq!(
            parsed[2],
            NaiveDate::from_ymd_opt(2024, 1, 5)
        );
    }

    #[test]
    fn ambiguous_dates_prefer_month_first() {
        let values: Vec<Option<String>> =
            vec![Some("01/02/2024".into()), Some("03/04/2024".into())];
        let (parsed, order) = parse_date_column(&values);
        assert_eq!(order, DateOrder::MonthFirst);
        assert_eq!(parsed[0], NaiveDate::from_ymd_opt(2024, 1, 2));
    }

    #[test]
    fn month_name_dates_parse_unambiguously() {
        let values: Vec<Option<String>> = vec![
            Some("8 Jan 2023".into()),
            Some("Jan 15, 2023".into()),
            Some("22-jan-23".into()),
            Some("January 29 2023".into()),
            Some("5 Sept 2023".into()),
        ];
        let (parsed, _) = parse_date_column(&values);
        assert_eq!(parsed[0], NaiveDate::from_ymd_opt(2023, 1, 8));
        assert_eq!(parsed[1], NaiveDate::from_ymd_opt(2023, 1, 15));
        assert_eq!(parsed[2], NaiveDate::from_ymd_opt(2023, 1, 22));
        assert_eq!(parsed[3], NaiveDate::from_ymd_opt(2023, 1, 29));
        assert_eq!(parsed[4], NaiveDate::from_ymd_opt(2023, 9, 5));
    }

    #[test]
    fn month_name_rows_survive_in_numeric_columns() {
        // a stray named-month row keeps its date even when the rest of
        // the column votes day-first
        let values: Vec<Option<String>> = vec![
            Some("13/01/2024".into()),
            Some("20 Jan 2024".into()),
            Some("27/01/2024".into()),
        ];
        let (parsed, order) = parse_date_column(&values);
        assert_eq!(order, DateOrder::DayFirst);
        assert_eq!(parsed[1], NaiveDate::from_ymd_opt(2024, 1, 20));
    }

    #[test]
    fn interpolation_fills_interior_gaps() {
        let mut values = vec![Some(1.0), None, Some(3.0), None];
        fill_missing(&mut values, FillStrategy::Interpolate);
        assert_eq!(values, vec![Some(1.0), Some(2.0), Some(3.0), Some(3.0)]);
    }
}
