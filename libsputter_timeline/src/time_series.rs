use fxhash::FxHashMap;
use time::{Duration, PrimitiveDateTime};

use super::error::TimeSeriesError;

/// One logged channel. Numeric covers everything the instruments write as
/// numbers, including 0/1 switch indicators; Text covers the few columns
/// that hold labels (target ids, QCM active material).
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Numeric(Vec<f64>),
    Text(Vec<String>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Numeric(v) => v.len(),
            Column::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The whole log as a single time-indexed table.
///
/// Timestamps are tz-naive and non-decreasing; the channel set is fixed for
/// the whole series. A channel the log format does not include is simply
/// absent, and every consumer treats "absent" the same as "below threshold".
/// Missing numeric cells are NaN, which compares false against any
/// threshold, so the same rule falls out for single samples.
#[derive(Debug, Clone)]
pub struct TimeSeries {
    timestamps: Vec<PrimitiveDateTime>,
    columns: FxHashMap<String, Column>,
}

impl TimeSeries {
    /// Build a series from parsed timestamps and named channels.
    ///
    /// Validates that every channel has one value per timestamp and that the
    /// timestamps never step backwards.
    pub fn new(
        timestamps: Vec<PrimitiveDateTime>,
        columns: Vec<(String, Column)>,
    ) -> Result<Self, TimeSeriesError> {
        for pair in timestamps.windows(2) {
            if pair[1] < pair[0] {
                let row = timestamps.iter().position(|t| *t == pair[1]).unwrap_or(0);
                return Err(TimeSeriesError::UnsortedTimestamps(row));
            }
        }
        let mut map = FxHashMap::default();
        for (name, column) in columns {
            if column.len() != timestamps.len() {
                return Err(TimeSeriesError::ColumnLengthMismatch {
                    name,
                    expected: timestamps.len(),
                    found: column.len(),
                });
            }
            map.insert(name, column);
        }
        Ok(TimeSeries {
            timestamps,
            columns: map,
        })
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamps(&self) -> &[PrimitiveDateTime] {
        &self.timestamps
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// Channel names in sorted order, so that every iteration over the
    /// namespace is deterministic.
    pub fn column_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.columns.keys().map(|k| k.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn numeric(&self, name: &str) -> Option<&[f64]> {
        match self.columns.get(name) {
            Some(Column::Numeric(v)) => Some(v),
            _ => None,
        }
    }

    pub fn text(&self, name: &str) -> Option<&[String]> {
        match self.columns.get(name) {
            Some(Column::Text(v)) => Some(v),
            _ => None,
        }
    }

    /// Insert or overwrite a channel. Panics if the length does not match;
    /// callers only ever copy columns that already live in this series.
    pub fn insert_column(&mut self, name: &str, column: Column) {
        assert_eq!(column.len(), self.len(), "column length mismatch");
        self.columns.insert(name.to_string(), column);
    }

    pub fn clone_column(&self, name: &str) -> Option<Column> {
        self.columns.get(name).cloned()
    }

    /// Rename a channel. Returns false when the source name is absent.
    pub fn rename_column(&mut self, from: &str, to: &str) -> bool {
        match self.columns.remove(from) {
            Some(column) => {
                self.columns.insert(to.to_string(), column);
                true
            }
            None => false,
        }
    }

    /// Mean sample-to-sample interval over the whole log. None when the
    /// series is too short to have an interval at all.
    pub fn avg_timestep(&self) -> Option<Duration> {
        if self.len() < 2 {
            return None;
        }
        let total: Duration = self
            .timestamps
            .windows(2)
            .map(|pair| pair[1] - pair[0])
            .sum();
        Some(total / (self.len() - 1) as i32)
    }

    /// Index of the sample at exactly the given timestamp, if any.
    pub fn row_at(&self, t: PrimitiveDateTime) -> Option<usize> {
        let idx = self.timestamps.partition_point(|ts| *ts < t);
        (idx < self.len() && self.timestamps[idx] == t).then_some(idx)
    }

    /// Statistics over a subset of rows.
    pub fn frame<'a>(&'a self, rows: &'a [usize]) -> EventFrame<'a> {
        EventFrame { series: self, rows }
    }
}

/// A read-only view of a row subset, with the summary statistics the
/// parameter extractors need. NaN cells are skipped by the aggregations,
/// matching the loader's missing-cell encoding.
#[derive(Debug, Clone, Copy)]
pub struct EventFrame<'a> {
    series: &'a TimeSeries,
    rows: &'a [usize],
}

impl<'a> EventFrame<'a> {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn first_timestamp(&self) -> Option<PrimitiveDateTime> {
        self.rows.first().map(|&i| self.series.timestamps()[i])
    }

    pub fn last_timestamp(&self) -> Option<PrimitiveDateTime> {
        self.rows.last().map(|&i| self.series.timestamps()[i])
    }

    fn values(&self, column: &str) -> Option<impl Iterator<Item = f64> + 'a> {
        let data = self.series.numeric(column)?;
        let rows = self.rows;
        Some(rows.iter().map(move |&i| data[i]))
    }

    fn finite_values(&self, column: &str) -> Option<Vec<f64>> {
        let values: Vec<f64> = self.values(column)?.filter(|v| v.is_finite()).collect();
        (!values.is_empty()).then_some(values)
    }

    pub fn mean(&self, column: &str) -> Option<f64> {
        let values = self.finite_values(column)?;
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }

    /// Mean over only the values above a floor. Used for gas flows, where
    /// below-threshold readings are MFC noise rather than a real flow.
    pub fn mean_above(&self, column: &str, floor: f64) -> Option<f64> {
        let values: Vec<f64> = self
            .values(column)?
            .filter(|v| v.is_finite() && *v > floor)
            .collect();
        (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
    }

    pub fn min(&self, column: &str) -> Option<f64> {
        self.finite_values(column)?
            .into_iter()
            .reduce(f64::min)
    }

    pub fn max(&self, column: &str) -> Option<f64> {
        self.finite_values(column)?
            .into_iter()
            .reduce(f64::max)
    }

    /// Sample standard deviation (n - 1 in the denominator).
    pub fn std(&self, column: &str) -> Option<f64> {
        let values = self.finite_values(column)?;
        if values.len() < 2 {
            return None;
        }
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>()
            / (values.len() - 1) as f64;
        Some(var.sqrt())
    }

    pub fn first(&self, column: &str) -> Option<f64> {
        let data = self.series.numeric(column)?;
        self.rows.first().map(|&i| data[i])
    }

    pub fn last(&self, column: &str) -> Option<f64> {
        let data = self.series.numeric(column)?;
        self.rows.last().map(|&i| data[i])
    }

    pub fn first_text(&self, column: &str) -> Option<&'a str> {
        let data = self.series.text(column)?;
        self.rows.first().map(|&i| data[i].as_str())
    }

    /// Mean over the leading `pct` percent of rows (at least one row).
    pub fn mean_head(&self, column: &str, pct: f64) -> Option<f64> {
        let n = self.edge_window(pct)?;
        let data = self.series.numeric(column)?;
        let values: Vec<f64> = self.rows[..n]
            .iter()
            .map(|&i| data[i])
            .filter(|v| v.is_finite())
            .collect();
        (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
    }

    /// Mean over the trailing `pct` percent of rows (at least one row).
    pub fn mean_tail(&self, column: &str, pct: f64) -> Option<f64> {
        let n = self.edge_window(pct)?;
        let data = self.series.numeric(column)?;
        let start = self.rows.len() - n;
        let values: Vec<f64> = self.rows[start..]
            .iter()
            .map(|&i| data[i])
            .filter(|v| v.is_finite())
            .collect();
        (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
    }

    fn edge_window(&self, pct: f64) -> Option<usize> {
        if self.rows.is_empty() {
            return None;
        }
        Some(((pct * 0.01 * self.rows.len() as f64) as usize).clamp(1, self.rows.len()))
    }

    /// Fraction of rows where the value exceeds the threshold. Absent
    /// channels and NaN cells count as not-above.
    pub fn frac_above(&self, column: &str, threshold: f64) -> f64 {
        if self.rows.is_empty() {
            return 0.0;
        }
        match self.values(column) {
            Some(values) => {
                values.filter(|v| *v > threshold).count() as f64 / self.rows.len() as f64
            }
            None => 0.0,
        }
    }

    pub fn all_above(&self, column: &str, threshold: f64) -> bool {
        match self.values(column) {
            Some(mut values) => !self.rows.is_empty() && values.all(|v| v > threshold),
            None => false,
        }
    }

    pub fn all_below(&self, column: &str, threshold: f64) -> bool {
        match self.values(column) {
            Some(mut values) => !self.rows.is_empty() && values.all(|v| v < threshold),
            None => false,
        }
    }

    pub fn all_eq(&self, column: &str, value: f64) -> bool {
        match self.values(column) {
            Some(mut values) => !self.rows.is_empty() && values.all(|v| v == value),
            None => false,
        }
    }

    pub fn any_nonzero(&self, column: &str) -> bool {
        match self.values(column) {
            Some(mut values) => values.any(|v| v != 0.0 && v.is_finite()),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::series_with;

    #[test]
    fn test_avg_timestep_uniform() {
        let series = series_with(4, 2, &[]);
        assert_eq!(series.avg_timestep(), Some(Duration::seconds(2)));
    }

    #[test]
    fn test_rejects_unsorted_timestamps() {
        let mut stamps = series_with(3, 1, &[]).timestamps().to_vec();
        stamps.swap(0, 2);
        let result = TimeSeries::new(stamps, Vec::new());
        assert!(matches!(
            result,
            Err(TimeSeriesError::UnsortedTimestamps(_))
        ));
    }

    #[test]
    fn test_rejects_short_column() {
        let stamps = series_with(3, 1, &[]).timestamps().to_vec();
        let result = TimeSeries::new(
            stamps,
            vec![("Flow".to_string(), Column::Numeric(vec![1.0, 2.0]))],
        );
        assert!(matches!(
            result,
            Err(TimeSeriesError::ColumnLengthMismatch { .. })
        ));
    }

    #[test]
    fn test_frame_statistics_skip_nan() {
        let series = series_with(4, 1, &[("P", &[1.0, f64::NAN, 3.0, 5.0])]);
        let rows = [0usize, 1, 2, 3];
        let frame = series.frame(&rows);
        assert_eq!(frame.mean("P"), Some(3.0));
        assert_eq!(frame.min("P"), Some(1.0));
        assert_eq!(frame.max("P"), Some(5.0));
        assert_eq!(frame.mean("missing"), None);
    }

    #[test]
    fn test_frac_above_counts_all_rows() {
        let series = series_with(4, 1, &[("I", &[0.0, 0.5, 0.5, f64::NAN])]);
        let rows = [0usize, 1, 2, 3];
        let frame = series.frame(&rows);
        assert_eq!(frame.frac_above("I", 0.1), 0.5);
        assert_eq!(frame.frac_above("missing", 0.1), 0.0);
    }

    #[test]
    fn test_mean_head_and_tail_window_at_least_one_row() {
        let series = series_with(5, 1, &[("V", &[10.0, 20.0, 30.0, 40.0, 50.0])]);
        let rows = [0usize, 1, 2, 3, 4];
        let frame = series.frame(&rows);
        // 5% of 5 rows truncates to 0 and clamps to a single row
        assert_eq!(frame.mean_head("V", 5.0), Some(10.0));
        assert_eq!(frame.mean_tail("V", 5.0), Some(50.0));
        // 40% covers two rows
        assert_eq!(frame.mean_head("V", 40.0), Some(15.0));
        assert_eq!(frame.mean_tail("V", 40.0), Some(45.0));
    }

    #[test]
    fn test_row_at_exact_timestamp() {
        let series = series_with(3, 10, &[]);
        let second = series.timestamps()[1];
        assert_eq!(series.row_at(second), Some(1));
        assert_eq!(series.row_at(second + Duration::seconds(1)), None);
    }
}
