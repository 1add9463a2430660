use time::{Duration, PrimitiveDateTime};

use super::channels;
use super::condition::Condition;
use super::domain::{extract_domains, Domain, DomainLimits};
use super::time_series::{EventFrame, TimeSeries};

/// The known process-phase kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EventCategory {
    SourceOn,
    SourceRampUp,
    SourcePresput,
    CrackerOnOpen,
    TempCtrl,
    ArFlow,
    Ph3Flow,
    H2sFlow,
    AnySourceOn,
    AnySourceOnOpen,
    Deposition,
    CrackerBasePressure,
    RateMeas,
    FilmRateMeas,
    SulfurRateMeas,
    SubRampUp,
    SubRampDown,
    SubRampDownHigh,
    SubRampDownLow,
}

impl EventCategory {
    /// The stable key used in step ids and report mappings.
    pub fn key(&self) -> &'static str {
        match self {
            EventCategory::SourceOn => "source_on",
            EventCategory::SourceRampUp => "source_ramp_up",
            EventCategory::SourcePresput => "source_presput",
            EventCategory::CrackerOnOpen => "cracker_on_open",
            EventCategory::TempCtrl => "temp_ctrl",
            EventCategory::ArFlow => "ar_flow",
            EventCategory::Ph3Flow => "ph3_flow",
            EventCategory::H2sFlow => "h2s_flow",
            EventCategory::AnySourceOn => "any_source_on",
            EventCategory::AnySourceOnOpen => "any_source_on_open",
            EventCategory::Deposition => "deposition",
            EventCategory::CrackerBasePressure => "cracker_base_pressure",
            EventCategory::RateMeas => "rate_meas",
            EventCategory::FilmRateMeas => "film_rate_meas",
            EventCategory::SulfurRateMeas => "sulfur_rate_meas",
            EventCategory::SubRampUp => "sub_ramp_up",
            EventCategory::SubRampDown => "sub_ramp_down",
            EventCategory::SubRampDownHigh => "sub_ramp_down_high",
            EventCategory::SubRampDownLow => "sub_ramp_down_low",
        }
    }

    /// Only a deposition leaves a new film on the substrate.
    pub fn creates_new_thin_film(&self) -> bool {
        matches!(self, EventCategory::Deposition)
    }

    /// Whether events of this category appear in the step report. The
    /// low-level indicator events (gas on, shutter open, plasma on) describe
    /// machine state rather than a process step and are excluded.
    pub fn is_process_step(&self) -> bool {
        matches!(
            self,
            EventCategory::Deposition
                | EventCategory::SourceRampUp
                | EventCategory::SourcePresput
                | EventCategory::CrackerBasePressure
                | EventCategory::FilmRateMeas
                | EventCategory::SulfurRateMeas
                | EventCategory::SubRampUp
                | EventCategory::SubRampDownHigh
                | EventCategory::SubRampDownLow
        )
    }
}

/// One per-domain slice of an event, for per-occurrence analysis and for the
/// visualization consumer.
#[derive(Debug, Clone)]
pub struct Occurrence {
    pub name: String,
    pub step_id: String,
    pub category: EventCategory,
    pub source: Option<u8>,
    pub bounds: Domain,
    pub mean_temperature: Option<f64>,
    pub mean_pressure: Option<f64>,
}

/// A named process phase: a condition, the rows it selects, and the disjoint
/// time domains over which it holds.
///
/// Lifecycle: construction binds the condition and extracts domains in one
/// pass; refinement methods (stitching, size filtering, last-before
/// selection, re-extraction) may then reshape the domain list. Every
/// refinement method recomputes the dependent row set before returning, so
/// the rows always equal the condition's rows restricted to the current
/// domains. After parameter extraction events are read-only by convention.
#[derive(Debug, Clone)]
pub struct Event {
    name: String,
    category: EventCategory,
    source: Option<u8>,
    condition: Condition,
    rows: Vec<usize>,
    domains: Vec<Domain>,
}

impl Event {
    /// Bind a condition and extract domains in one pass.
    pub fn from_condition(
        name: impl Into<String>,
        category: EventCategory,
        source: Option<u8>,
        series: &TimeSeries,
        condition: Condition,
        limits: &DomainLimits,
    ) -> Self {
        debug_assert_eq!(condition.len(), series.len());
        let mut event = Event {
            name: name.into(),
            category,
            source,
            condition,
            rows: Vec::new(),
            domains: Vec::new(),
        };
        event.extract(series, limits);
        event
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> EventCategory {
        self.category
    }

    pub fn source(&self) -> Option<u8> {
        self.source
    }

    pub fn condition(&self) -> &Condition {
        &self.condition
    }

    pub fn rows(&self) -> &[usize] {
        &self.rows
    }

    pub fn domains(&self) -> &[Domain] {
        &self.domains
    }

    pub fn num_occurrences(&self) -> usize {
        self.domains.len()
    }

    /// An event with no domains was not observed in this log. Parameter
    /// extraction treats that as "not observed", never as an error.
    pub fn is_observed(&self) -> bool {
        !self.domains.is_empty()
    }

    pub fn first_start(&self) -> Option<PrimitiveDateTime> {
        self.domains.first().map(|d| d.start)
    }

    pub fn last_end(&self) -> Option<PrimitiveDateTime> {
        self.domains.last().map(|d| d.end)
    }

    /// Summed duration over all domains.
    pub fn total_duration(&self) -> Duration {
        self.domains.iter().map(Domain::duration).sum()
    }

    /// The unique report key: `<category>[_s<source>]`.
    pub fn step_id(&self) -> String {
        match self.source {
            Some(n) => format!("{}_s{n}", self.category.key()),
            None => self.category.key().to_string(),
        }
    }

    /// Statistics over the event's sub-table.
    pub fn frame<'a>(&'a self, series: &'a TimeSeries) -> EventFrame<'a> {
        series.frame(&self.rows)
    }

    /// Rows belonging to one domain.
    pub fn occurrence_rows(&self, series: &TimeSeries, index: usize) -> Vec<usize> {
        let domain = &self.domains[index];
        let times = series.timestamps();
        self.rows
            .iter()
            .copied()
            .filter(|&r| domain.contains(times[r]))
            .collect()
    }

    /// The separated per-domain view, with the plotting means attached.
    pub fn occurrences(&self, series: &TimeSeries) -> Vec<Occurrence> {
        let multiple = self.domains.len() > 1;
        self.domains
            .iter()
            .enumerate()
            .map(|(i, domain)| {
                let rows = self.occurrence_rows(series, i);
                let frame = series.frame(&rows);
                let step_id = if multiple {
                    format!("{}_n{i}", self.step_id())
                } else {
                    self.step_id()
                };
                Occurrence {
                    name: format!("{}({i})", self.name),
                    step_id,
                    category: self.category,
                    source: self.source,
                    bounds: *domain,
                    mean_temperature: frame.mean(channels::SUBSTRATE_HEATER_TEMP),
                    mean_pressure: frame.mean(channels::CAPMAN_PRESSURE),
                }
            })
            .collect()
    }

    /// Re-run domain extraction from the condition's full row set. Used by
    /// deposition disambiguation with the escalated continuity limit.
    pub fn reextract(&mut self, series: &TimeSeries, limits: &DomainLimits) {
        self.extract(series, limits);
    }

    /// Drop every domain at or below the given duration, then refresh rows.
    pub fn drop_domains_shorter_than(&mut self, series: &TimeSeries, min_duration: Duration) {
        self.domains.retain(|d| d.duration() > min_duration);
        self.recompute_rows(series);
    }

    /// Keep only the domain with the latest start that still lies strictly
    /// before `t`. Leaves the event unobserved when none qualifies.
    pub fn keep_last_before(&mut self, series: &TimeSeries, t: PrimitiveDateTime) {
        let kept = self
            .domains
            .iter()
            .rev()
            .find(|d| d.start < t)
            .copied();
        self.domains = kept.into_iter().collect();
        self.recompute_rows(series);
    }

    /// Merge adjacent ramp-up domains whose boundary samples share the same
    /// output-setpoint value, capturing staged ramp-ups (0 -> 50 W held,
    /// then 50 -> 75 W) as one event. Repeats until no adjacent pair
    /// qualifies; running it again is a no-op.
    pub fn stitch_ramp_domains(&mut self, series: &TimeSeries, setpoint_column: &str) {
        let mut i = 0;
        while i + 1 < self.domains.len() {
            let end_value = self.value_at(series, setpoint_column, self.domains[i].end);
            let next_start_value =
                self.value_at(series, setpoint_column, self.domains[i + 1].start);
            match (end_value, next_start_value) {
                (Some(a), Some(b)) if a == b => {
                    self.domains[i].end = self.domains[i + 1].end;
                    self.domains.remove(i + 1);
                }
                _ => i += 1,
            }
        }
        self.recompute_rows(series);
    }

    /// Forget every domain and row; the event becomes unobserved.
    pub fn clear(&mut self) {
        self.domains.clear();
        self.rows.clear();
    }

    fn value_at(&self, series: &TimeSeries, column: &str, t: PrimitiveDateTime) -> Option<f64> {
        let row = series.row_at(t)?;
        series.numeric(column).map(|data| data[row])
    }

    fn extract(&mut self, series: &TimeSeries, limits: &DomainLimits) {
        let all = series.timestamps();
        let times: Vec<PrimitiveDateTime> = self
            .condition
            .rows()
            .into_iter()
            .map(|r| all[r])
            .collect();
        self.domains = match series.avg_timestep() {
            Some(avg) => extract_domains(&times, avg, limits),
            None => Vec::new(),
        };
        self.recompute_rows(series);
    }

    /// Restrict the row set to the condition rows inside the current
    /// domains. Called by every method that reshapes the domain list.
    fn recompute_rows(&mut self, series: &TimeSeries) {
        let times = series.timestamps();
        let domains = &self.domains;
        let condition = &self.condition;
        let mut domain_idx = 0;
        self.rows = condition
            .rows()
            .into_iter()
            .filter(|&r| {
                let t = times[r];
                while domain_idx < domains.len() && domains[domain_idx].end < t {
                    domain_idx += 1;
                }
                domain_idx < domains.len() && domains[domain_idx].contains(t)
            })
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::test_util::{base_time, series_with, stamps_at};
    use time::Duration;

    fn standard_limits() -> DomainLimits {
        DomainLimits::standard(&Settings::default())
    }

    fn ramp_event(series: &TimeSeries, condition: Condition) -> Event {
        Event::from_condition(
            "Source 3 Ramp Up",
            EventCategory::SourceRampUp,
            Some(3),
            series,
            condition,
            &DomainLimits {
                continuity_limit: 3,
                min_domain_size: 1,
            },
        )
    }

    #[test]
    fn test_identity_condition_yields_single_spanning_domain() {
        let series = series_with(30, 1, &[]);
        let event = Event::from_condition(
            "All",
            EventCategory::TempCtrl,
            None,
            &series,
            Condition::all_true(series.len()),
            &standard_limits(),
        );
        assert_eq!(event.num_occurrences(), 1);
        assert_eq!(event.first_start(), Some(series.timestamps()[0]));
        assert_eq!(event.last_end(), Some(series.timestamps()[29]));
        assert_eq!(event.rows().len(), 30);
    }

    #[test]
    fn test_step_id_formats() {
        let series = series_with(30, 1, &[]);
        let deposition = Event::from_condition(
            "Deposition",
            EventCategory::Deposition,
            None,
            &series,
            Condition::all_true(series.len()),
            &standard_limits(),
        );
        assert_eq!(deposition.step_id(), "deposition");

        let ramp = Event::from_condition(
            "Source 3 Ramp Up",
            EventCategory::SourceRampUp,
            Some(3),
            &series,
            Condition::all_true(series.len()),
            &standard_limits(),
        );
        assert_eq!(ramp.step_id(), "source_ramp_up_s3");
    }

    #[test]
    fn test_occurrence_step_ids_get_indices_only_when_multiple() {
        let series = series_with(40, 1, &[]);
        let cond = Condition::from_fn(series.len(), |i| !(15..25).contains(&i));
        let event = Event::from_condition(
            "Source 3 Ramp Up",
            EventCategory::SourceRampUp,
            Some(3),
            &series,
            cond,
            &DomainLimits {
                continuity_limit: 3,
                min_domain_size: 3,
            },
        );
        assert_eq!(event.num_occurrences(), 2);
        let occurrences = event.occurrences(&series);
        assert_eq!(occurrences[0].step_id, "source_ramp_up_s3_n0");
        assert_eq!(occurrences[1].step_id, "source_ramp_up_s3_n1");
        assert_eq!(occurrences[0].name, "Source 3 Ramp Up(0)");
    }

    #[test]
    fn test_stitch_merges_equal_boundary_setpoints() {
        // two ramp segments: 0->50 then hold, 50->75; the hold breaks
        // continuity, the shared 50 W boundary stitches them back
        let times = stamps_at(&[0, 1, 2, 3, 4, 20, 21, 22, 23, 24]);
        let setpoint = [10.0, 25.0, 40.0, 50.0, 50.0, 50.0, 60.0, 70.0, 75.0, 75.0];
        let series = crate::test_util::series_from_stamps(
            times,
            &[("Source 3 Output Setpoint", &setpoint)],
        );
        let mut event = ramp_event(&series, Condition::all_true(series.len()));
        assert_eq!(event.num_occurrences(), 2);

        event.stitch_ramp_domains(&series, "Source 3 Output Setpoint");
        assert_eq!(event.num_occurrences(), 1);
        assert_eq!(event.rows().len(), 10);

        // idempotent: a second pass changes nothing
        let domains = event.domains().to_vec();
        event.stitch_ramp_domains(&series, "Source 3 Output Setpoint");
        assert_eq!(event.domains(), &domains[..]);
    }

    #[test]
    fn test_stitch_leaves_distinct_setpoints_alone() {
        let times = stamps_at(&[0, 1, 2, 3, 4, 20, 21, 22, 23, 24]);
        let setpoint = [10.0, 25.0, 40.0, 50.0, 50.0, 60.0, 65.0, 70.0, 75.0, 75.0];
        let series = crate::test_util::series_from_stamps(
            times,
            &[("Source 3 Output Setpoint", &setpoint)],
        );
        let mut event = ramp_event(&series, Condition::all_true(series.len()));
        event.stitch_ramp_domains(&series, "Source 3 Output Setpoint");
        assert_eq!(event.num_occurrences(), 2);
    }

    #[test]
    fn test_keep_last_before_selects_latest_qualifying_domain() {
        let series = series_with(50, 1, &[]);
        let cond = Condition::from_fn(series.len(), |i| i < 10 || (20..30).contains(&i) || i >= 40);
        let mut event = Event::from_condition(
            "Source 1 Ramp Up",
            EventCategory::SourceRampUp,
            Some(1),
            &series,
            cond,
            &DomainLimits {
                continuity_limit: 3,
                min_domain_size: 3,
            },
        );
        assert_eq!(event.num_occurrences(), 3);

        let pivot = base_time() + Duration::seconds(35);
        event.keep_last_before(&series, pivot);
        assert_eq!(event.num_occurrences(), 1);
        assert_eq!(event.first_start(), Some(base_time() + Duration::seconds(20)));
        assert_eq!(event.rows().len(), 10);
    }

    #[test]
    fn test_keep_last_before_with_no_candidate_leaves_unobserved() {
        let series = series_with(20, 1, &[]);
        let cond = Condition::from_fn(series.len(), |i| i >= 10);
        let mut event = Event::from_condition(
            "Source 1 Ramp Up",
            EventCategory::SourceRampUp,
            Some(1),
            &series,
            cond,
            &standard_limits(),
        );
        assert!(event.is_observed());
        event.keep_last_before(&series, base_time());
        assert!(!event.is_observed());
        assert!(event.rows().is_empty());
    }
}
