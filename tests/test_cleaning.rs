use assert_approx_eq::assert_approx_eq;
use forecast_drivers::cleaning::coerce_numeric;
use forecast_drivers::cleaning::{
    clean_for_training, handle_outliers, validate_frequency, CleaningOptions, DriverColumn,
    OutlierMethod,
};
use forecast_drivers::config::OutlierAction;
use forecast_drivers::data::RawTable;

// Helper: n weekly rows starting 2023-01-08 with target 100, 101, ...
fn weekly_rows(n: usize) -> (Vec<String>, Vec<String>) {
    let start = chrono::NaiveDate::from_ymd_opt(2023, 1, 8).unwrap();
    let dates = (0..n)
        .map(|i| (start + chrono::Duration::weeks(i as i64)).to_string())
        .collect();
    let values = (0..n).map(|i| format!("{}", 100 + i)).collect();
    (dates, values)
}

fn as_opt(values: &[String]) -> Vec<Option<&str>> {
    values.iter().map(|v| Some(v.as_str())).collect()
}

#[test]
fn test_clean_weekly_sales() {
    let (dates, values) = weekly_rows(30);
    let table = RawTable::from_string_columns(vec![
        ("Week Ending", as_opt(&dates)),
        (" Sales £ ", as_opt(&values)),
    ])
    .unwrap();

    let (frame, report) = clean_for_training(
        &table,
        "week ending",
        "sales",
        &[],
        &CleaningOptions::default(),
    )
    .unwrap();

    assert!(report.ready.ready);
    assert_eq!(frame.len(), 30);
    assert_eq!(report.target_col, "sales");
    assert_approx_eq!(frame.target[0], 100.0);
    assert_approx_eq!(frame.target[29], 129.0);

    // dates come out strictly increasing with no duplicates
    assert!(frame.dates.windows(2).all(|w| w[0] < w[1]));
    // target is complete and finite
    assert!(frame.target.iter().all(|v| v.is_finite()));
}

#[test]
fn test_currency_and_grouping_coerced() {
    let dates = vec![
        "2023-01-08",
        "2023-01-15",
        "2023-01-22",
        "2023-01-29",
        "2023-02-05",
    ];
    let table = RawTable::from_string_columns(vec![
        ("date", dates.into_iter().map(Some).collect()),
        (
            "sales",
            vec![
                Some("£1,200.50"),
                Some("$900"),
                Some("(150)"),
                Some("45%"),
                Some("  770  "),
            ],
        ),
    ])
    .unwrap();

    let options = CleaningOptions {
        outlier_action: OutlierAction::Keep,
        ..CleaningOptions::default()
    };
    let (frame, _) = clean_for_training(&table, "date", "sales", &[], &options).unwrap();

    assert_approx_eq!(frame.target[0], 1200.5);
    assert_approx_eq!(frame.target[1], 900.0);
    assert_approx_eq!(frame.target[2], -150.0);
    assert_approx_eq!(frame.target[3], 45.0);
    assert_approx_eq!(frame.target[4], 770.0);
}

#[rstest::rstest]
#[case("£1,234.50", Some(1234.5))]
#[case("$900", Some(900.0))]
#[case("(42)", Some(-42.0))]
#[case("7.5%", Some(7.5))]
#[case("NULL", None)]
#[case("n/a-ish text", None)]
fn test_coercion_cases(#[case] raw: &str, #[case] expected: Option<f64>) {
    assert_eq!(coerce_numeric(Some(raw)), expected);
}

#[test]
fn test_missing_target_interpolated() {
    let (dates, mut values) = weekly_rows(24);
    values[10] = String::new();
    let mut cells = as_opt(&values);
    cells[10] = None;
    let table =
        RawTable::from_string_columns(vec![("date", as_opt(&dates)), ("sales", cells)]).unwrap();

    let (frame, report) =
        clean_for_training(&table, "date", "sales", &[], &CleaningOptions::default()).unwrap();

    assert_eq!(report.target_nan_before, 1);
    assert_eq!(report.target_nan_after, 0);
    assert_eq!(frame.len(), 24);
    // midpoint of 109 and 111
    assert_approx_eq!(frame.target[10], 110.0);
}

#[test]
fn test_invalid_date_rows_dropped() {
    let (mut dates, values) = weekly_rows(22);
    dates[5] = "not a date".to_string();
    let table =
        RawTable::from_string_columns(vec![("date", as_opt(&dates)), ("sales", as_opt(&values))])
            .unwrap();

    let (frame, report) =
        clean_for_training(&table, "date", "sales", &[], &CleaningOptions::default()).unwrap();

    assert_eq!(report.invalid_dates_removed, 1);
    assert_eq!(frame.len(), 21);
}

#[test]
fn test_month_name_dates_survive_cleaning() {
    let start = chrono::NaiveDate::from_ymd_opt(2023, 1, 8).unwrap();
    let dates: Vec<String> = (0..25)
        .map(|i| {
            (start + chrono::Duration::weeks(i))
                .format("%-d %b %Y")
                .to_string()
        })
        .collect();
    let values: Vec<String> = (0..25).map(|i| format!("{}", 100 + i)).collect();
    let table =
        RawTable::from_string_columns(vec![("week", as_opt(&dates)), ("sales", as_opt(&values))])
            .unwrap();

    let (frame, report) =
        clean_for_training(&table, "week", "sales", &[], &CleaningOptions::default()).unwrap();

    // "8 Jan 2023" style cells parse rather than being dropped
    assert_eq!(report.invalid_dates_removed, 0);
    assert_eq!(frame.len(), 25);
    assert_eq!(frame.dates[0], start);
    assert_eq!(frame.dates[24], start + chrono::Duration::weeks(24));
}

#[test]
fn test_duplicate_dates_keep_last() {
    let dates = vec![
        "2023-01-08",
        "2023-01-15",
        "2023-01-15",
        "2023-01-22",
        "2023-01-29",
    ];
    let values = vec!["10", "20", "25", "30", "40"];
    let table = RawTable::from_string_columns(vec![
        ("date", dates.into_iter().map(Some).collect()),
        ("sales", values.into_iter().map(Some).collect()),
    ])
    .unwrap();

    let options = CleaningOptions {
        outlier_action: OutlierAction::Keep,
        ..CleaningOptions::default()
    };
    let (frame, _) = clean_for_training(&table, "date", "sales", &[], &options).unwrap();

    assert_eq!(frame.len(), 4);
    // the later duplicate wins
    assert_approx_eq!(frame.target[1], 25.0);
}

#[test]
fn test_unknown_driver_skipped() {
    let (dates, values) = weekly_rows(25);
    let table =
        RawTable::from_string_columns(vec![("date", as_opt(&dates)), ("sales", as_opt(&values))])
            .unwrap();

    let (frame, report) = clean_for_training(
        &table,
        "date",
        "sales",
        &["no_such_column".to_string()],
        &CleaningOptions::default(),
    )
    .unwrap();

    assert!(report.ready.ready);
    assert!(report.driver_cols.is_empty());
    assert!(frame.drivers.is_empty());
}

#[test]
fn test_daily_drivers_averaged_to_weekly() {
    // Mon 2023-01-02 through Mon 2023-01-09: the first seven days share
    // the Sunday-2023-01-08 week, the last day starts the next week
    let start = chrono::NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
    let dates: Vec<String> = (0..8)
        .map(|i| (start + chrono::Duration::days(i)).to_string())
        .collect();
    let target: Vec<String> = (10..18).map(|v| v.to_string()).collect();
    let driver: Vec<String> = (1..9).map(|v| v.to_string()).collect();

    let table = RawTable::from_string_columns(vec![
        ("date", as_opt(&dates)),
        ("sales", as_opt(&target)),
        ("spend", as_opt(&driver)),
    ])
    .unwrap();

    let options = CleaningOptions {
        outlier_action: OutlierAction::Keep,
        ..CleaningOptions::default()
    };
    let (frame, report) =
        clean_for_training(&table, "date", "sales", &["spend".to_string()], &options).unwrap();

    assert!(report.driver_weekly_averaging_applied);
    let spend = frame.driver("spend").unwrap().as_numeric().unwrap();
    for v in &spend[..7] {
        assert_approx_eq!(*v, 4.0);
    }
    assert_approx_eq!(spend[7], 8.0);
}

#[test]
fn test_categorical_driver_sentinel_fill() {
    let (dates, values) = weekly_rows(6);
    let promo = vec![Some("on"), Some("off"), None, Some("on"), Some(""), Some("off")];
    let table = RawTable::from_string_columns(vec![
        ("date", as_opt(&dates)),
        ("sales", as_opt(&values)),
        ("promo", promo),
    ])
    .unwrap();

    let options = CleaningOptions {
        outlier_action: OutlierAction::Keep,
        ..CleaningOptions::default()
    };
    let (frame, _) =
        clean_for_training(&table, "date", "sales", &["promo".to_string()], &options).unwrap();

    match frame.driver("promo").unwrap() {
        DriverColumn::Categorical(values) => {
            assert_eq!(values[2], "unknown");
            assert_eq!(values[4], "unknown");
            assert_eq!(values[0], "on");
        }
        DriverColumn::Numeric(_) => panic!("promo should be categorical"),
    }
}

#[test]
fn test_cap_clips_and_remove_drops() {
    let mut values: Vec<f64> = (0..30).map(|i| 50.0 + i as f64).collect();
    values.push(10_000.0);

    let capped = handle_outliers(&values, OutlierAction::Cap, OutlierMethod::Iqr, None);
    assert_eq!(capped.len(), values.len());
    assert!(capped[30] < 10_000.0);
    // inliers untouched
    assert_approx_eq!(capped[0], 50.0);

    let removed = handle_outliers(&values, OutlierAction::Remove, OutlierMethod::Iqr, None);
    assert_eq!(removed.len(), 30);
    assert!(removed.iter().all(|v| *v < 100.0));

    let kept = handle_outliers(&values, OutlierAction::Keep, OutlierMethod::Iqr, None);
    assert_eq!(kept, values);
}

#[test]
fn test_zscore_spike_detected() {
    let mut values: Vec<f64> = vec![10.0; 40];
    values[20] = 10.5;
    values.push(500.0);

    let capped = handle_outliers(&values, OutlierAction::Cap, OutlierMethod::ZScore, None);
    assert!(capped[40] < 500.0);
}

#[test]
fn test_frequency_detection() {
    let start = chrono::NaiveDate::from_ymd_opt(2023, 1, 8).unwrap();
    let mut weekly: Vec<chrono::NaiveDate> =
        (0..12).map(|i| start + chrono::Duration::weeks(i)).collect();
    let report = validate_frequency(&weekly);
    assert_eq!(report.detected_frequency, "weekly");
    assert!(!report.has_gaps);

    // knock out two consecutive weeks to open a gap
    weekly.remove(6);
    weekly.remove(5);
    let report = validate_frequency(&weekly);
    assert_eq!(report.detected_frequency, "weekly");
    assert!(report.has_gaps);
    assert_eq!(report.missing_ranges.len(), 1);

    let daily: Vec<chrono::NaiveDate> = (0..10).map(|i| start + chrono::Duration::days(i)).collect();
    assert_eq!(validate_frequency(&daily).detected_frequency, "daily");

    let monthly: Vec<chrono::NaiveDate> = (0..6)
        .map(|i| chrono::NaiveDate::from_ymd_opt(2023, 1 + i, 1).unwrap())
        .collect();
    assert_eq!(validate_frequency(&monthly).detected_frequency, "monthly");
}

#[test]
fn test_label_round_trip_resolution() {
    use forecast_drivers::columns::ColumnMapping;

    let mapping = ColumnMapping::build(&[" Sales £ ".to_string(), "Date".to_string()]);
    assert_eq!(mapping.resolve("Sales £").unwrap(), "sales");
    assert_eq!(mapping.resolve("sales").unwrap(), "sales");
    assert_eq!(mapping.resolve("SALES").unwrap(), "sales");
    // resolving a canonical key is idempotent
    assert_eq!(mapping.resolve(&mapping.resolve("SALES").unwrap()).unwrap(), "sales");
    assert!(mapping.resolve("profit").is_err());
}

#[test]
fn test_data_health_reports_missingness() {
    use forecast_drivers::data::data_health;

    let table = RawTable::from_string_columns(vec![
        ("date", vec![Some("2023-01-08"), Some("2023-01-15"), None]),
        ("sales", vec![Some("1"), None, None]),
    ])
    .unwrap();
    let health = data_health(&table);

    assert_eq!(health.total_rows, 3);
    assert_eq!(health.total_columns, 2);
    assert_eq!(health.columns[0].missing_count, 1);
    assert_eq!(health.columns[1].missing_count, 2);
    assert!((health.columns[1].missing_pct - 66.7).abs() < 0.05);
}

#[test]
fn test_empty_table_rejected() {
    let table = RawTable::from_string_columns(vec![("date", vec![]), ("sales", vec![])]).unwrap();
    let result = clean_for_training(&table, "date", "sales", &[], &CleaningOptions::default());
    assert!(result.is_err());
}

#[test]
fn test_missing_target_column_rejected() {
    let (dates, values) = weekly_rows(5);
    let table =
        RawTable::from_string_columns(vec![("date", as_opt(&dates)), ("sales", as_opt(&values))])
            .unwrap();
    let result = clean_for_training(&table, "date", "revenue", &[], &CleaningOptions::default());
    assert!(result.is_err());
}
