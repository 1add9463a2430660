//! Shared helpers for building small synthetic series in unit tests.

use time::macros::datetime;
use time::{Duration, PrimitiveDateTime};

use crate::time_series::{Column, TimeSeries};

pub(crate) fn base_time() -> PrimitiveDateTime {
    datetime!(2024-06-07 10:00:00)
}

/// Uniformly sampled timestamps starting at `base_time`.
pub(crate) fn stamps(n: usize, step_secs: i64) -> Vec<PrimitiveDateTime> {
    (0..n)
        .map(|i| base_time() + Duration::seconds(step_secs * i as i64))
        .collect()
}

/// Timestamps at explicit second offsets from `base_time`, for gap scenarios.
pub(crate) fn stamps_at(offsets: &[i64]) -> Vec<PrimitiveDateTime> {
    offsets
        .iter()
        .map(|&s| base_time() + Duration::seconds(s))
        .collect()
}

pub(crate) fn series_from_stamps(
    timestamps: Vec<PrimitiveDateTime>,
    numeric: &[(&str, &[f64])],
) -> TimeSeries {
    let columns = numeric
        .iter()
        .map(|(name, values)| (name.to_string(), Column::Numeric(values.to_vec())))
        .collect();
    TimeSeries::new(timestamps, columns).expect("test series must be valid")
}

/// A uniformly sampled series with the given numeric channels.
pub(crate) fn series_with(n: usize, step_secs: i64, numeric: &[(&str, &[f64])]) -> TimeSeries {
    series_from_stamps(stamps(n, step_secs), numeric)
}

/// Like `series_with`, with additional text channels.
pub(crate) fn series_with_text(
    n: usize,
    step_secs: i64,
    numeric: &[(&str, &[f64])],
    text: &[(&str, &[&str])],
) -> TimeSeries {
    let mut columns: Vec<(String, Column)> = numeric
        .iter()
        .map(|(name, values)| (name.to_string(), Column::Numeric(values.to_vec())))
        .collect();
    for (name, values) in text {
        columns.push((
            name.to_string(),
            Column::Text(values.iter().map(|s| s.to_string()).collect()),
        ));
    }
    TimeSeries::new(stamps(n, step_secs), columns).expect("test series must be valid")
}
