use time::{Duration, PrimitiveDateTime};

use super::config::Settings;

/// A closed time interval over which a condition holds with good-enough
/// continuity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Domain {
    pub start: PrimitiveDateTime,
    pub end: PrimitiveDateTime,
}

impl Domain {
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn contains(&self, t: PrimitiveDateTime) -> bool {
        self.start <= t && t <= self.end
    }
}

/// The two knobs of domain extraction, in units of the series' average
/// timestep. Deposition gets its own, larger pair because deposition logs
/// legitimately contain longer within-event sensor gaps than other phases.
#[derive(Debug, Clone, Copy)]
pub struct DomainLimits {
    pub continuity_limit: u32,
    pub min_domain_size: u32,
}

impl DomainLimits {
    pub fn standard(settings: &Settings) -> Self {
        DomainLimits {
            continuity_limit: settings.continuity_limit,
            min_domain_size: settings.min_domain_size,
        }
    }

    pub fn deposition(settings: &Settings) -> Self {
        DomainLimits {
            continuity_limit: settings.deposition_continuity_limit,
            min_domain_size: settings.deposition_min_domain_size,
        }
    }
}

/// Partition the timestamps of a filtered row set into maximal
/// contiguous-enough intervals.
///
/// A sample-to-sample gap above `continuity_limit` average timesteps starts
/// a new domain; domains no longer than `min_domain_size` average timesteps
/// are noise and discarded entirely, not reported as valid-but-short events.
pub fn extract_domains(
    times: &[PrimitiveDateTime],
    avg_timestep: Duration,
    limits: &DomainLimits,
) -> Vec<Domain> {
    if times.is_empty() {
        return Vec::new();
    }
    let continuity = avg_timestep * limits.continuity_limit as i32;
    let min_duration = avg_timestep * limits.min_domain_size as i32;

    let mut domains = Vec::new();
    let mut start = times[0];
    let mut prev = times[0];
    for &t in &times[1..] {
        if t - prev > continuity {
            domains.push(Domain { start, end: prev });
            start = t;
        }
        prev = t;
    }
    domains.push(Domain { start, end: prev });

    domains.retain(|d| d.duration() > min_duration);
    domains
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{stamps, stamps_at};

    fn limits(continuity: u32, min_size: u32) -> DomainLimits {
        DomainLimits {
            continuity_limit: continuity,
            min_domain_size: min_size,
        }
    }

    #[test]
    fn test_empty_input_yields_no_domains() {
        let domains = extract_domains(&[], Duration::seconds(1), &limits(10, 3));
        assert!(domains.is_empty());
    }

    #[test]
    fn test_gapless_uniform_series_is_one_domain() {
        let times = stamps(20, 1);
        let domains = extract_domains(&times, Duration::seconds(1), &limits(10, 3));
        assert_eq!(domains.len(), 1);
        assert_eq!(domains[0].start, times[0]);
        assert_eq!(domains[0].end, times[19]);
    }

    #[test]
    fn test_gap_above_continuity_limit_splits() {
        // two 10-sample blocks separated by a 60 s hole, 1 s sampling
        let mut offsets: Vec<i64> = (0..10).collect();
        offsets.extend((0..10).map(|i| 70 + i));
        let times = stamps_at(&offsets);
        let domains = extract_domains(&times, Duration::seconds(1), &limits(10, 3));
        assert_eq!(domains.len(), 2);
        assert_eq!(domains[0].end, times[9]);
        assert_eq!(domains[1].start, times[10]);
    }

    #[test]
    fn test_gap_within_continuity_limit_does_not_split() {
        let times = stamps_at(&[0, 1, 2, 3, 10, 11, 12, 13]);
        let domains = extract_domains(&times, Duration::seconds(1), &limits(10, 3));
        assert_eq!(domains.len(), 1);
    }

    #[test]
    fn test_short_domains_are_discarded() {
        // an isolated pair of samples between two real blocks
        let mut offsets: Vec<i64> = (0..10).collect();
        offsets.extend([100, 101]);
        offsets.extend((0..10).map(|i| 200 + i));
        let times = stamps_at(&offsets);
        let domains = extract_domains(&times, Duration::seconds(1), &limits(10, 3));
        assert_eq!(domains.len(), 2);
        assert!(domains.iter().all(|d| d.duration() > Duration::seconds(3)));
    }

    #[test]
    fn test_domains_are_disjoint_ordered_and_sized() {
        let times = stamps_at(&[0, 1, 2, 3, 4, 50, 51, 52, 53, 120, 121, 122, 123, 124, 125]);
        let min = limits(10, 3);
        let domains = extract_domains(&times, Duration::seconds(1), &min);
        for pair in domains.windows(2) {
            assert!(pair[0].end < pair[1].start);
        }
        for d in &domains {
            assert!(d.duration() > Duration::seconds(1) * min.min_domain_size as i32);
        }
    }
}
