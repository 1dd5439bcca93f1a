//! Seasonal-naive baseline: predict the value from one season ago

/// Shift a series forward by `period`, with `None` where a full season
/// of history does not exist yet.
pub fn seasonal_naive_predictions(values: &[f64], period: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| i.checked_sub(period).map(|j| values[j]))
        .collect()
}
