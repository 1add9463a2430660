use bitvec::prelude::*;
use std::ops::{BitAnd, BitOr, Not};
use time::PrimitiveDateTime;

use super::time_series::TimeSeries;

/// A per-timestamp boolean predicate over a series, aligned to the series
/// index.
///
/// Conditions are pure with respect to the series: every builder reads raw
/// channels (or an already-computed reference scalar) and nothing else.
/// Every builder that references a channel absent from the series yields the
/// all-false condition instead of erroring; schema drift across log format
/// versions is the norm, not the exception.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    bits: BitVec,
}

impl Condition {
    pub fn all_false(len: usize) -> Self {
        Condition {
            bits: bitvec![0; len],
        }
    }

    pub fn all_true(len: usize) -> Self {
        Condition {
            bits: bitvec![1; len],
        }
    }

    pub fn from_fn(len: usize, mut f: impl FnMut(usize) -> bool) -> Self {
        let mut bits = bitvec![0; len];
        for i in 0..len {
            bits.set(i, f(i));
        }
        Condition { bits }
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    pub fn get(&self, index: usize) -> bool {
        self.bits[index]
    }

    pub fn count_true(&self) -> usize {
        self.bits.count_ones()
    }

    pub fn any(&self) -> bool {
        self.bits.any()
    }

    /// Indices of the samples satisfying the condition, ascending.
    pub fn rows(&self) -> Vec<usize> {
        self.bits.iter_ones().collect()
    }

    /// value > threshold, per sample.
    pub fn above(series: &TimeSeries, column: &str, threshold: f64) -> Self {
        match series.numeric(column) {
            Some(data) => Self::from_fn(series.len(), |i| data[i] > threshold),
            None => Self::all_false(series.len()),
        }
    }

    /// value == reference, per sample. Used for the 0/1 switch channels.
    pub fn equals(series: &TimeSeries, column: &str, reference: f64) -> Self {
        match series.numeric(column) {
            Some(data) => Self::from_fn(series.len(), |i| data[i] == reference),
            None => Self::all_false(series.len()),
        }
    }

    pub fn nonzero(series: &TimeSeries, column: &str) -> Self {
        match series.numeric(column) {
            Some(data) => Self::from_fn(series.len(), |i| data[i] != 0.0 && data[i].is_finite()),
            None => Self::all_false(series.len()),
        }
    }

    pub fn text_equals(series: &TimeSeries, column: &str, reference: &str) -> Self {
        match series.text(column) {
            Some(data) => Self::from_fn(series.len(), |i| data[i] == reference),
            None => Self::all_false(series.len()),
        }
    }

    pub fn text_differs(series: &TimeSeries, column: &str, reference: &str) -> Self {
        match series.text(column) {
            Some(data) => Self::from_fn(series.len(), |i| data[i] != reference),
            None => Self::all_false(series.len()),
        }
    }

    /// Sample-to-sample increase above a threshold. The first sample has no
    /// predecessor and is false.
    pub fn rising_diff_above(series: &TimeSeries, column: &str, threshold: f64) -> Self {
        match series.numeric(column) {
            Some(data) => Self::from_fn(series.len(), |i| {
                i > 0 && (data[i] - data[i - 1]) > threshold
            }),
            None => Self::all_false(series.len()),
        }
    }

    /// Sample-to-sample decrease below a (negative) threshold.
    pub fn falling_diff_below(series: &TimeSeries, column: &str, threshold: f64) -> Self {
        match series.numeric(column) {
            Some(data) => Self::from_fn(series.len(), |i| {
                i > 0 && (data[i] - data[i - 1]) < threshold
            }),
            None => Self::all_false(series.len()),
        }
    }

    /// a != b per sample, the inferred form of "temperature control active"
    /// on logs without an explicit control-enabled channel.
    pub fn columns_differ(series: &TimeSeries, a: &str, b: &str) -> Self {
        match (series.numeric(a), series.numeric(b)) {
            (Some(a), Some(b)) => Self::from_fn(series.len(), |i| a[i] != b[i]),
            _ => Self::all_false(series.len()),
        }
    }

    /// (a - b) > threshold per sample; the forward-minus-reflected power
    /// indicator.
    pub fn diff_of_columns_above(
        series: &TimeSeries,
        minuend: &str,
        subtrahend: &str,
        threshold: f64,
    ) -> Self {
        match (series.numeric(minuend), series.numeric(subtrahend)) {
            (Some(a), Some(b)) => Self::from_fn(series.len(), |i| (a[i] - b[i]) > threshold),
            _ => Self::all_false(series.len()),
        }
    }

    /// timestamp < t, per sample.
    pub fn before(series: &TimeSeries, t: PrimitiveDateTime) -> Self {
        let times = series.timestamps();
        Self::from_fn(series.len(), |i| times[i] < t)
    }

    /// timestamp > t, per sample.
    pub fn after(series: &TimeSeries, t: PrimitiveDateTime) -> Self {
        let times = series.timestamps();
        Self::from_fn(series.len(), |i| times[i] > t)
    }

    /// Symmetric percentage band around a reference mean: (1 - p)·c < x <
    /// (1 + p)·c. A reference mean of exactly zero would collapse the band
    /// to nothing, so that case uses the absolute interval ±`zero_band`
    /// instead (an unused gas channel must still match "unused").
    pub fn within_band(
        series: &TimeSeries,
        column: &str,
        center: f64,
        band_pct: f64,
        zero_band: f64,
    ) -> Self {
        if center.is_nan() {
            return Self::all_false(series.len());
        }
        let (lo, hi) = if center == 0.0 {
            (-zero_band, zero_band)
        } else {
            let a = (1.0 - 0.01 * band_pct) * center;
            let b = (1.0 + 0.01 * band_pct) * center;
            (a.min(b), a.max(b))
        };
        match series.numeric(column) {
            Some(data) => Self::from_fn(series.len(), |i| data[i] > lo && data[i] < hi),
            None => Self::all_false(series.len()),
        }
    }

    /// Extends the mask one sample backwards: a sample is kept if it or its
    /// successor satisfies the condition. The ramp-up builder uses this to
    /// pull the sample immediately before each setpoint rise into the mask,
    /// which the diff alone excludes.
    pub fn or_preceding(self) -> Self {
        let len = self.len();
        let bits = &self.bits;
        Self::from_fn(len, |i| bits[i] || (i + 1 < len && bits[i + 1]))
    }
}

impl BitAnd for Condition {
    type Output = Condition;

    fn bitand(mut self, rhs: Condition) -> Condition {
        debug_assert_eq!(self.len(), rhs.len());
        self.bits &= rhs.bits.as_bitslice();
        self
    }
}

impl BitOr for Condition {
    type Output = Condition;

    fn bitor(mut self, rhs: Condition) -> Condition {
        debug_assert_eq!(self.len(), rhs.len());
        self.bits |= rhs.bits.as_bitslice();
        self
    }
}

impl Not for Condition {
    type Output = Condition;

    fn not(self) -> Condition {
        Condition { bits: !self.bits }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{base_time, series_with};
    use time::Duration;

    #[test]
    fn test_absent_channel_is_all_false() {
        let series = series_with(5, 1, &[("Present", &[1.0; 5])]);
        assert!(!Condition::above(&series, "Absent", 0.0).any());
        assert!(!Condition::equals(&series, "Absent", 1.0).any());
        assert!(!Condition::nonzero(&series, "Absent").any());
        assert!(!Condition::rising_diff_above(&series, "Absent", 0.0).any());
        assert!(!Condition::diff_of_columns_above(&series, "Present", "Absent", 0.0).any());
        assert!(!Condition::within_band(&series, "Absent", 1.0, 10.0, 1.0).any());
        assert!(!Condition::text_differs(&series, "Absent", "Sulfur").any());
    }

    #[test]
    fn test_nan_compares_false() {
        let series = series_with(3, 1, &[("I", &[f64::NAN, 0.5, f64::NAN])]);
        let cond = Condition::above(&series, "I", 0.0);
        assert_eq!(cond.rows(), vec![1]);
    }

    #[test]
    fn test_operators() {
        let a = Condition::from_fn(4, |i| i < 2);
        let b = Condition::from_fn(4, |i| i % 2 == 0);
        assert_eq!((a.clone() & b.clone()).rows(), vec![0]);
        assert_eq!((a.clone() | b.clone()).rows(), vec![0, 1, 2]);
        assert_eq!((!a).rows(), vec![2, 3]);
    }

    #[test]
    fn test_or_preceding_marks_rise_onset() {
        let series = series_with(5, 1, &[("SP", &[0.0, 0.0, 50.0, 50.0, 75.0])]);
        let ramping = Condition::rising_diff_above(&series, "SP", 0.01).or_preceding();
        // diff marks rows 2 and 4; or_preceding pulls in rows 1 and 3
        assert_eq!(ramping.rows(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_within_band_around_nonzero_mean() {
        let series = series_with(4, 1, &[("T", &[89.0, 95.0, 105.0, 111.0])]);
        let cond = Condition::within_band(&series, "T", 100.0, 10.0, 1.0);
        assert_eq!(cond.rows(), vec![1, 2]);
    }

    #[test]
    fn test_within_band_zero_mean_uses_absolute_band() {
        let series = series_with(4, 1, &[("F", &[0.0, 0.5, -0.5, 2.0])]);
        let cond = Condition::within_band(&series, "F", 0.0, 10.0, 1.0);
        assert_eq!(cond.rows(), vec![0, 1, 2]);
    }

    #[test]
    fn test_before_and_after_are_strict() {
        let series = series_with(3, 10, &[]);
        let pivot = base_time() + Duration::seconds(10);
        assert_eq!(Condition::before(&series, pivot).rows(), vec![0]);
        assert_eq!(Condition::after(&series, pivot).rows(), vec![2]);
    }
}
