use assert_approx_eq::assert_approx_eq;
use chrono::{Duration, NaiveDate};
use forecast_drivers::cleaning::{CleanedFrame, DriverColumn};
use forecast_drivers::features::{
    build_feature_frame, FeatureSpec, HOLIDAY_COLUMN, TARGET_LAG_PREFIX,
};
use pretty_assertions::assert_eq;

fn weekly_frame(n: usize) -> CleanedFrame {
    let start = NaiveDate::from_ymd_opt(2023, 1, 8).unwrap();
    let dates: Vec<NaiveDate> = (0..n).map(|i| start + Duration::weeks(i as i64)).collect();
    let target: Vec<f64> = (0..n).map(|i| 100.0 + i as f64).collect();
    let spend: Vec<f64> = (0..n).map(|i| 2.0 * i as f64).collect();
    CleanedFrame {
        dates,
        target,
        drivers: vec![("spend".to_string(), DriverColumn::Numeric(spend))],
    }
}

#[test]
fn test_frame_shrinks_by_max_lag() {
    let cleaned = weekly_frame(30);
    let spec = FeatureSpec {
        lags: vec![1, 2, 4],
        driver_lags: vec![1, 2],
        calendar_features: true,
        holiday_features: false,
    };
    let frame = build_feature_frame(&cleaned, &spec).unwrap();

    assert_eq!(frame.len(), 26);
    assert_eq!(frame.index[0], cleaned.dates[4]);
    assert_eq!(frame.y[0], cleaned.target[4]);
}

#[test]
fn test_column_order_and_names() {
    let cleaned = weekly_frame(20);
    let spec = FeatureSpec {
        lags: vec![1, 2],
        driver_lags: vec![1],
        calendar_features: true,
        holiday_features: true,
    };
    let frame = build_feature_frame(&cleaned, &spec).unwrap();

    assert_eq!(
        frame.columns,
        vec![
            "target_lag_1",
            "target_lag_2",
            "spend",
            "spend_lag_1",
            "holiday_count",
            "cal_month",
            "cal_quarter",
            "cal_weekofyear",
            "cal_dayofweek",
        ]
    );
    assert!(frame.columns.contains(&HOLIDAY_COLUMN.to_string()));
}

#[test]
fn test_lag_values_line_up() {
    let cleaned = weekly_frame(12);
    let spec = FeatureSpec {
        lags: vec![1, 3],
        driver_lags: vec![],
        calendar_features: false,
        holiday_features: false,
    };
    let frame = build_feature_frame(&cleaned, &spec).unwrap();

    // first surviving row is index 3 of the cleaned data
    assert_eq!(frame.len(), 9);
    assert_approx_eq!(frame.x[[0, 0]], 102.0); // lag 1 of target 103
    assert_approx_eq!(frame.x[[0, 1]], 100.0); // lag 3
    assert_approx_eq!(frame.y[0], 103.0);
}

#[test]
fn test_baseline_indices_are_target_lags_only() {
    let cleaned = weekly_frame(20);
    let frame = build_feature_frame(&cleaned, &FeatureSpec::default()).unwrap();

    let base = frame.baseline_feature_indices();
    assert_eq!(base.len(), 3);
    for &i in &base {
        assert!(frame.columns[i].starts_with(TARGET_LAG_PREFIX));
    }
}

#[test]
fn test_driver_named_target_does_not_shadow_lags() {
    let start = NaiveDate::from_ymd_opt(2023, 1, 8).unwrap();
    let cleaned = CleanedFrame {
        dates: (0..12).map(|i| start + Duration::weeks(i)).collect(),
        target: (0..12).map(|i| 100.0 + i as f64).collect(),
        drivers: vec![(
            "target".to_string(),
            DriverColumn::Numeric((0..12).map(|i| 5.0 * i as f64).collect()),
        )],
    };
    let spec = FeatureSpec {
        lags: vec![1, 2],
        driver_lags: vec![1],
        calendar_features: false,
        holiday_features: false,
    };
    let frame = build_feature_frame(&cleaned, &spec).unwrap();

    assert_eq!(
        frame.columns,
        vec![
            "target_lag_1",
            "target_lag_2",
            "driver_target",
            "driver_target_lag_1",
        ]
    );
    // the baseline still sees only the real target lags
    assert_eq!(frame.baseline_feature_indices(), vec![0, 1]);
    // driver values stay the driver's, not the target's
    assert_approx_eq!(frame.x[[0, 2]], 10.0); // row for cleaned index 2
}

#[test]
fn test_calendar_values() {
    let cleaned = CleanedFrame {
        dates: vec![
            NaiveDate::from_ymd_opt(2023, 4, 3).unwrap(), // a Monday in Q2
            NaiveDate::from_ymd_opt(2023, 4, 10).unwrap(),
        ],
        target: vec![1.0, 2.0],
        drivers: vec![],
    };
    let spec = FeatureSpec {
        lags: vec![1],
        driver_lags: vec![],
        calendar_features: true,
        holiday_features: false,
    };
    let frame = build_feature_frame(&cleaned, &spec).unwrap();

    assert_eq!(frame.len(), 1);
    let month = frame.columns.iter().position(|c| c == "cal_month").unwrap();
    let quarter = frame.columns.iter().position(|c| c == "cal_quarter").unwrap();
    let dow = frame.columns.iter().position(|c| c == "cal_dayofweek").unwrap();
    assert_approx_eq!(frame.x[[0, month]], 4.0);
    assert_approx_eq!(frame.x[[0, quarter]], 2.0);
    assert_approx_eq!(frame.x[[0, dow]], 0.0);
}

#[test]
fn test_holiday_count_around_christmas() {
    let dates: Vec<NaiveDate> = vec![
        NaiveDate::from_ymd_opt(2023, 12, 10).unwrap(),
        NaiveDate::from_ymd_opt(2023, 12, 17).unwrap(),
        NaiveDate::from_ymd_opt(2023, 12, 24).unwrap(),
        NaiveDate::from_ymd_opt(2023, 12, 31).unwrap(),
    ];
    let cleaned = CleanedFrame {
        target: vec![1.0, 2.0, 3.0, 4.0],
        drivers: vec![],
        dates,
    };
    let spec = FeatureSpec {
        lags: vec![1],
        driver_lags: vec![],
        calendar_features: false,
        holiday_features: true,
    };
    let frame = build_feature_frame(&cleaned, &spec).unwrap();
    let hol = frame.columns.iter().position(|c| c == HOLIDAY_COLUMN).unwrap();

    // Dec 24 sees Christmas and Boxing Day; Dec 31 sees New Year's Day
    assert_approx_eq!(frame.x[[1, hol]], 2.0); // row for Dec 24
    assert_approx_eq!(frame.x[[2, hol]], 1.0); // row for Dec 31
    assert_approx_eq!(frame.x[[0, hol]], 0.0); // row for Dec 17
}

#[test]
fn test_excessive_lags_rejected() {
    let cleaned = weekly_frame(5);
    let spec = FeatureSpec {
        lags: vec![10],
        driver_lags: vec![],
        calendar_features: false,
        holiday_features: false,
    };
    assert!(build_feature_frame(&cleaned, &spec).is_err());
}

#[test]
fn test_zero_lag_rejected() {
    let cleaned = weekly_frame(10);
    let spec = FeatureSpec {
        lags: vec![0, 1],
        driver_lags: vec![],
        calendar_features: false,
        holiday_features: false,
    };
    assert!(build_feature_frame(&cleaned, &spec).is_err());
}
