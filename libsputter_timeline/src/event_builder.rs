//! One builder per physical phenomenon. Each takes the series (plus the
//! already-built sibling events it depends on) and returns a finalized,
//! domain-extracted [`Event`].
//!
//! Build order matters: deposition must be finalized before every condition
//! that compares a channel against its deposition-time mean (presputter
//! window, cracker base pressure, rate-measurement gating).

use time::Duration;

use super::channels::{self, signal};
use super::condition::Condition;
use super::config::Settings;
use super::domain::DomainLimits;
use super::error::EventError;
use super::event::{Event, EventCategory};
use super::time_series::TimeSeries;

/// The per-source event family.
#[derive(Debug, Clone)]
pub struct SourceEvents {
    pub number: u8,
    pub on: Event,
    pub ramp_up: Event,
    /// Plasma on with this source's shutter open; kept as a bare condition
    /// because only the OR across sources is ever domain-extracted.
    pub on_open: Condition,
}

/// Plasma on: enabled and at least one ignition indicator above threshold.
/// Some hardware configurations expose no usable current/bias signal, hence
/// the forward-minus-reflected power fallback.
fn plasma_on_condition(series: &TimeSeries, source: u8, settings: &Settings) -> Condition {
    let enabled = Condition::nonzero(series, &channels::source(source, signal::ENABLED));
    let current = Condition::above(
        series,
        &channels::source(source, signal::CURRENT),
        settings.current_threshold,
    );
    let bias = Condition::above(
        series,
        &channels::source(source, signal::DC_BIAS),
        settings.bias_threshold,
    );
    let net_power = Condition::diff_of_columns_above(
        series,
        &channels::source(source, signal::FWD_POWER),
        &channels::source(source, signal::RFL_POWER),
        settings.power_fwd_refl_threshold,
    );
    enabled & (current | bias | net_power)
}

/// Ramping: enabled and the output setpoint rising, extended one sample
/// backwards so the setpoint-transition sample itself is part of the ramp.
fn ramping_condition(series: &TimeSeries, source: u8, settings: &Settings) -> Condition {
    let enabled = Condition::nonzero(series, &channels::source(source, signal::ENABLED));
    let rising = Condition::rising_diff_above(
        series,
        &channels::source(source, signal::OUTPUT_SETPOINT),
        settings.power_setpoint_diff_threshold,
    );
    (enabled & rising).or_preceding()
}

/// Build the on/ramp-up family for every discovered source. Ramp-up domains
/// are stitched on shared boundary setpoints (staged ramps).
pub fn build_source_events(
    series: &TimeSeries,
    sources: &[u8],
    settings: &Settings,
) -> Vec<SourceEvents> {
    let limits = DomainLimits::standard(settings);
    sources
        .iter()
        .map(|&n| {
            let on_cond = plasma_on_condition(series, n, settings);
            let shutter_open =
                Condition::equals(series, &channels::pc_source(n, "Shutter Open"), 1.0);
            let on_open = on_cond.clone() & shutter_open;
            let on = Event::from_condition(
                format!("Source {n} On"),
                EventCategory::SourceOn,
                Some(n),
                series,
                on_cond,
                &limits,
            );
            let mut ramp_up = Event::from_condition(
                format!("Source {n} Ramp Up"),
                EventCategory::SourceRampUp,
                Some(n),
                series,
                ramping_condition(series, n, settings),
                &limits,
            );
            ramp_up.stitch_ramp_domains(
                series,
                &channels::source(n, signal::OUTPUT_SETPOINT),
            );
            SourceEvents {
                number: n,
                on,
                ramp_up,
                on_open,
            }
        })
        .collect()
}

/// Cracker on and open: all three zone temperatures above their minimums and
/// the control enabled. All-false on logs without a cracker.
pub fn build_cracker_on_open(series: &TimeSeries, settings: &Settings) -> Event {
    let cond = Condition::above(
        series,
        channels::CRACKER_ZONE1_TEMP,
        settings.cracker_zone1_min_temp,
    ) & Condition::above(
        series,
        channels::CRACKER_ZONE2_TEMP,
        settings.cracker_zone2_min_temp,
    ) & Condition::above(
        series,
        channels::CRACKER_ZONE3_TEMP,
        settings.cracker_zone3_min_temp,
    ) & Condition::equals(series, channels::CRACKER_CONTROL_ENABLED, 1.0);
    Event::from_condition(
        "Cracker On Open",
        EventCategory::CrackerOnOpen,
        None,
        series,
        cond,
        &DomainLimits::standard(settings),
    )
}

/// Temperature control active: the explicit control-enabled channel when the
/// log has one, otherwise inferred as setpoint != measured. The heater
/// occasionally disagrees with its setpoint for a handful of samples while
/// control is off; such glitch data is cleared.
pub fn build_temp_ctrl(series: &TimeSeries, settings: &Settings) -> Event {
    let cond = if series.has_column(channels::TEMP_CTRL_ENABLED) {
        Condition::equals(series, channels::TEMP_CTRL_ENABLED, 1.0)
    } else {
        Condition::columns_differ(
            series,
            channels::SUBSTRATE_HEATER_SETPOINT,
            channels::SUBSTRATE_HEATER_TEMP,
        )
    };
    let mut event = Event::from_condition(
        "Temperature Ctrl",
        EventCategory::TempCtrl,
        None,
        series,
        cond,
        &DomainLimits::standard(settings),
    );
    if event.condition().count_true() < settings.min_temp_ctrl_size || !event.is_observed() {
        event.clear();
    }
    event
}

/// The three process-gas events.
#[derive(Debug, Clone)]
pub struct GasEvents {
    pub ar: Event,
    pub ph3: Event,
    pub h2s: Event,
}

/// A gas is flowing when both the MFC setpoint and the measured flow exceed
/// the flow threshold; each gas is evaluated independently.
pub fn build_gas_events(series: &TimeSeries, settings: &Settings) -> GasEvents {
    let limits = DomainLimits::standard(settings);
    let build = |name: &str, category: EventCategory, setpoint: &str, flow: &str| {
        let cond = Condition::above(series, setpoint, settings.mfc_flow_threshold)
            & Condition::above(series, flow, settings.mfc_flow_threshold);
        Event::from_condition(name, category, None, series, cond, &limits)
    };
    GasEvents {
        ar: build(
            "Ar On",
            EventCategory::ArFlow,
            channels::MFC_AR_SETPOINT,
            channels::MFC_AR_FLOW,
        ),
        ph3: build(
            "PH3 On",
            EventCategory::Ph3Flow,
            channels::MFC_PH3_SETPOINT,
            channels::MFC_PH3_FLOW,
        ),
        h2s: build(
            "H2S On",
            EventCategory::H2sFlow,
            channels::MFC_H2S_SETPOINT,
            channels::MFC_H2S_FLOW,
        ),
    }
}

/// The anchor event and its composites.
#[derive(Debug, Clone)]
pub struct DepositionEvents {
    pub any_source_on: Event,
    pub any_source_on_open: Event,
    pub deposition: Event,
    /// Sources whose enabled channel ever fires inside the deposition.
    pub used_sources: Vec<u8>,
}

/// Deposition: substrate shutter open while any source is on with its
/// shutter open. Exactly one deposition domain is expected; anything else is
/// resolved by [`disambiguate_deposition`] or is fatal.
pub fn build_deposition(
    series: &TimeSeries,
    source_events: &[SourceEvents],
    settings: &Settings,
) -> Result<DepositionEvents, EventError> {
    let mut any_on = Condition::all_false(series.len());
    let mut any_on_open = Condition::all_false(series.len());
    for src in source_events {
        any_on = any_on | src.on.condition().clone();
        any_on_open = any_on_open | src.on_open.clone();
    }
    let any_source_on = Event::from_condition(
        "Any Source On",
        EventCategory::AnySourceOn,
        None,
        series,
        any_on,
        &DomainLimits::standard(settings),
    );
    let any_source_on_open = Event::from_condition(
        "Any Source On and Open",
        EventCategory::AnySourceOnOpen,
        None,
        series,
        any_on_open.clone(),
        &DomainLimits::standard(settings),
    );

    let dep_cond = Condition::equals(series, channels::SUBSTRATE_SHUTTER_OPEN, 1.0) & any_on_open;
    let mut deposition = Event::from_condition(
        "Deposition",
        EventCategory::Deposition,
        None,
        series,
        dep_cond,
        &DomainLimits::standard(settings),
    );
    disambiguate_deposition(&mut deposition, series, settings)?;

    let frame = deposition.frame(series);
    let used_sources = source_events
        .iter()
        .map(|src| src.number)
        .filter(|&n| frame.any_nonzero(&channels::source(n, signal::ENABLED)))
        .collect();

    Ok(DepositionEvents {
        any_source_on,
        any_source_on_open,
        deposition,
        used_sources,
    })
}

/// Reduce the deposition to exactly one domain.
///
/// More than one domain usually means shutter flicker (sub-minimum domains)
/// or an instrumentation gap inside the one real deposition (bridged by the
/// escalated continuity limit). If neither resolves it the log is
/// ambiguous, and picking a domain heuristically would corrupt every
/// downstream quantity, so the pipeline aborts instead.
fn disambiguate_deposition(
    deposition: &mut Event,
    series: &TimeSeries,
    settings: &Settings,
) -> Result<(), EventError> {
    match deposition.num_occurrences() {
        0 => return Err(EventError::DepositionNotFound),
        1 => return Ok(()),
        n => spdlog::warn!("Found {n} deposition domains; trying to disambiguate"),
    }

    let avg = series.avg_timestep().ok_or(EventError::SeriesTooShort)?;
    deposition
        .drop_domains_shorter_than(series, avg * settings.deposition_min_domain_size as i32);
    if deposition.num_occurrences() == 1 {
        return Ok(());
    }

    spdlog::warn!(
        "Re-extracting deposition domains with the escalated continuity limit of {} timesteps",
        settings.deposition_continuity_limit
    );
    deposition.reextract(series, &DomainLimits::deposition(settings));
    match deposition.num_occurrences() {
        1 => Ok(()),
        0 => Err(EventError::DepositionNotFound),
        n => Err(EventError::DepositionUnicity(n)),
    }
}

/// Presputtering: the source on, before the deposition, after the source's
/// last pre-deposition ramp-up, not ramping, and with no reactive species
/// present (plain-Ar target cleaning).
pub fn build_presput(
    series: &TimeSeries,
    src: &SourceEvents,
    deposition: &Event,
    gases: &GasEvents,
    cracker_on_open: &Event,
    settings: &Settings,
) -> Event {
    let name = format!("Source {} Presput", src.number);
    let mut cond = Condition::all_false(series.len());
    if let Some(dep_start) = deposition.first_start() {
        let after_ramps = match src
            .ramp_up
            .domains()
            .iter()
            .rev()
            .find(|d| d.end < dep_start)
        {
            Some(last_ramp) => Condition::after(series, last_ramp.end),
            None => Condition::all_true(series.len()),
        };
        let reactive = gases.ph3.condition().clone()
            | gases.h2s.condition().clone()
            | cracker_on_open.condition().clone();
        cond = src.on.condition().clone()
            & Condition::before(series, dep_start)
            & after_ramps
            & !src.ramp_up.condition().clone()
            & !reactive;
    }
    Event::from_condition(
        name,
        EventCategory::SourcePresput,
        Some(src.number),
        series,
        cond,
        &DomainLimits::standard(settings),
    )
}

/// Cracker-induced base pressure window: cracker on and open, no gas
/// flowing, before the deposition, with the cracker running at (within
/// tolerance of) its deposition-time operating point.
///
/// This condition deliberately reads the finalized deposition event's
/// sub-table; it cannot be built from raw channels alone.
pub fn build_cracker_base_pressure(
    series: &TimeSeries,
    cracker_on_open: &Event,
    gases: &GasEvents,
    deposition: &Event,
    settings: &Settings,
) -> Event {
    let mut cond = Condition::all_false(series.len());
    if let (true, Some(dep_start)) = (cracker_on_open.is_observed(), deposition.first_start()) {
        let frame = deposition.frame(series);
        let band = |column: &str| {
            Condition::within_band(
                series,
                column,
                frame.mean(column).unwrap_or(f64::NAN),
                settings.tolerance_band_pct,
                settings.mfc_flow_threshold,
            )
        };
        cond = cracker_on_open.condition().clone()
            & Condition::before(series, dep_start)
            & !gases.h2s.condition().clone()
            & !gases.ph3.condition().clone()
            & !gases.ar.condition().clone()
            & band(channels::CRACKER_ZONE1_TEMP)
            & band(channels::CRACKER_ZONE2_TEMP)
            & band(channels::CRACKER_ZONE3_TEMP)
            & band(channels::CRACKER_PULSE_WIDTH)
            & band(channels::CRACKER_VALVE_SETPOINT)
            & Condition::equals(series, channels::CRACKER_CONTROL_ENABLED, 1.0);
    }
    Event::from_condition(
        "Cracker Pressure Meas",
        EventCategory::CrackerBasePressure,
        None,
        series,
        cond,
        &DomainLimits::standard(settings),
    )
}

/// The deposition-rate measurement family.
#[derive(Debug, Clone)]
pub struct RateMeasEvents {
    pub rate_meas: Event,
    /// One film-rate event per used source.
    pub film: Vec<Event>,
    pub sulfur: Event,
}

/// The QCM condition: Xtal 2 shutter open, minus a settle window after each
/// shutter-opening transition. The exclusion window is (open, open + stab]:
/// strictly after the rising-edge sample, through the stabilization time.
fn rate_meas_condition(series: &TimeSeries, settings: &Settings) -> Condition {
    let data = match series.numeric(channels::XTAL2_SHUTTER_OPEN) {
        Some(data) => data,
        None => return Condition::all_false(series.len()),
    };
    let times = series.timestamps();
    let stab = Duration::seconds(settings.qcm_stab_time_secs as i64);
    let mut settled = vec![true; series.len()];
    for i in 1..series.len() {
        if data[i] - data[i - 1] == 1.0 {
            let open_time = times[i];
            for (j, flag) in settled.iter_mut().enumerate() {
                if times[j] > open_time && times[j] <= open_time + stab {
                    *flag = false;
                }
            }
        }
    }
    Condition::equals(series, channels::XTAL2_SHUTTER_OPEN, 1.0)
        & Condition::from_fn(series.len(), |i| settled[i])
}

/// Build the rate-measurement events: the raw settled-QCM event, one
/// film-rate event per used source (reactive species present, QCM watching
/// a non-sulfur material, source power and chamber pressure at their
/// deposition operating points), and the sulfur-only event (no plasma, QCM
/// watching sulfur, cracker at its deposition operating point).
pub fn build_rate_meas(
    series: &TimeSeries,
    deposition: &Event,
    any_source_on_open: &Event,
    cracker_on_open: &Event,
    gases: &GasEvents,
    used_sources: &[u8],
    settings: &Settings,
) -> RateMeasEvents {
    let limits = DomainLimits::standard(settings);
    let rate_cond = rate_meas_condition(series, settings);
    let rate_meas = Event::from_condition(
        "Deposition Rate Meas",
        EventCategory::RateMeas,
        None,
        series,
        rate_cond.clone(),
        &limits,
    );

    let frame = deposition.frame(series);
    let band = |column: &str| {
        Condition::within_band(
            series,
            column,
            frame.mean(column).unwrap_or(f64::NAN),
            settings.tolerance_band_pct,
            settings.mfc_flow_threshold,
        )
    };
    let pressure_band = band(channels::CAPMAN_PRESSURE);

    let film = used_sources
        .iter()
        .map(|&n| {
            let cond = rate_cond.clone()
                & any_source_on_open.condition().clone()
                & (cracker_on_open.condition().clone() | gases.h2s.condition().clone())
                & gases.ph3.condition().clone()
                & Condition::text_differs(series, channels::THICKNESS_ACTIVE_MATERIAL, "Sulfur")
                & !deposition.condition().clone()
                & band(&channels::source(n, signal::OUTPUT_SETPOINT))
                & pressure_band.clone();
            Event::from_condition(
                format!("Source {n} Film Dep Rate Meas"),
                EventCategory::FilmRateMeas,
                Some(n),
                series,
                cond,
                &limits,
            )
        })
        .collect();

    let sulfur_cond = rate_cond
        & !any_source_on_open.condition().clone()
        & cracker_on_open.condition().clone()
        & !(gases.ph3.condition().clone() | gases.h2s.condition().clone())
        & Condition::text_equals(series, channels::THICKNESS_ACTIVE_MATERIAL, "Sulfur")
        & !deposition.condition().clone()
        & band(channels::CRACKER_ZONE1_TEMP)
        & band(channels::CRACKER_ZONE2_TEMP)
        & band(channels::CRACKER_ZONE3_TEMP)
        & band(channels::CRACKER_PULSE_WIDTH)
        & band(channels::CRACKER_VALVE_SETPOINT)
        & pressure_band;
    let sulfur = Event::from_condition(
        "S Dep Rate Meas",
        EventCategory::SulfurRateMeas,
        None,
        series,
        sulfur_cond,
        &limits,
    );

    RateMeasEvents {
        rate_meas,
        film,
        sulfur,
    }
}

/// The substrate-temperature ramp events.
#[derive(Debug, Clone)]
pub struct SubstrateRampEvents {
    pub ramp_up: Event,
    pub ramp_down: Event,
    pub down_high: Event,
    pub down_low: Event,
}

/// Substrate ramps: temperature-controlled, outside the deposition, with the
/// setpoint moving faster than the threshold. The ramp-down splits into a
/// high-temperature phase (reactive species kept flowing so the film does
/// not lose P or S) and the low-temperature remainder.
pub fn build_substrate_ramps(
    series: &TimeSeries,
    temp_ctrl: &Event,
    deposition: &Event,
    gases: &GasEvents,
    cracker_on_open: &Event,
    settings: &Settings,
) -> SubstrateRampEvents {
    let limits = DomainLimits::standard(settings);
    let heated = temp_ctrl.is_observed()
        || deposition.frame(series).all_above(
            channels::SUBSTRATE_HEATER_SETPOINT,
            settings.rt_temp_threshold,
        );

    let all_false = || Condition::all_false(series.len());
    let (up_cond, down_cond) = if heated {
        let base = temp_ctrl.condition().clone() & !deposition.condition().clone();
        let up = base.clone()
            & Condition::rising_diff_above(
                series,
                channels::SUBSTRATE_HEATER_SETPOINT,
                settings.temp_setpoint_diff_threshold,
            );
        let down = base
            & Condition::falling_diff_below(
                series,
                channels::SUBSTRATE_HEATER_SETPOINT,
                -settings.temp_setpoint_diff_threshold,
            )
            & Condition::above(series, channels::SUBSTRATE_HEATER_SETPOINT, 1.0);
        (up, down)
    } else {
        (all_false(), all_false())
    };

    let ramp_up = Event::from_condition(
        "Sub Temp Ramp Up",
        EventCategory::SubRampUp,
        None,
        series,
        up_cond,
        &limits,
    );
    let ramp_down = Event::from_condition(
        "Sub Temp Ramp Down",
        EventCategory::SubRampDown,
        None,
        series,
        down_cond,
        &limits,
    );

    let (high_cond, low_cond) = match ramp_down.first_start() {
        Some(down_start) => {
            let after = Condition::after(series, down_start);
            let anion_present = (gases.h2s.condition().clone()
                | cracker_on_open.condition().clone())
                & gases.ph3.condition().clone();
            let none_present = !(gases.h2s.condition().clone()
                | cracker_on_open.condition().clone()
                | gases.ph3.condition().clone());
            (after.clone() & anion_present, after & none_present)
        }
        None => (all_false(), all_false()),
    };
    let down_high = Event::from_condition(
        "Sub High Temp Ramp Down",
        EventCategory::SubRampDownHigh,
        None,
        series,
        high_cond,
        &limits,
    );
    let down_low = Event::from_condition(
        "Sub Low Temp Ramp Down",
        EventCategory::SubRampDownLow,
        None,
        series,
        low_cond,
        &limits,
    );

    SubstrateRampEvents {
        ramp_up,
        ramp_down,
        down_high,
        down_low,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{series_from_stamps, series_with, stamps_at};

    fn settings() -> Settings {
        Settings::default()
    }

    /// A bound single-source series: enabled + current + shutters.
    fn one_source_series(
        n: usize,
        enabled: &[f64],
        current: &[f64],
        src_shutter: &[f64],
        sub_shutter: &[f64],
    ) -> crate::time_series::TimeSeries {
        series_with(
            n,
            1,
            &[
                ("Source 1 Enabled", enabled),
                ("Source 1 Current", current),
                ("PC Source 1 Shutter Open", src_shutter),
                ("PC Substrate Shutter Open", sub_shutter),
            ],
        )
    }

    #[test]
    fn test_plasma_on_requires_enabled() {
        let series = series_with(
            4,
            1,
            &[
                ("Source 1 Enabled", &[0.0, 0.0, 1.0, 1.0]),
                ("Source 1 Current", &[0.5, 0.5, 0.5, 0.0]),
            ],
        );
        let cond = plasma_on_condition(&series, 1, &settings());
        assert_eq!(cond.rows(), vec![2]);
    }

    #[test]
    fn test_plasma_on_power_fallback() {
        // no current/bias channels at all; fwd - rfl carries the signal
        let series = series_with(
            4,
            1,
            &[
                ("Source 1 Enabled", &[1.0; 4]),
                ("Source 1 Fwd Power", &[0.0, 50.0, 50.0, 0.0]),
                ("Source 1 Rfl Power", &[0.0, 2.0, 45.0, 0.0]),
            ],
        );
        let cond = plasma_on_condition(&series, 1, &settings());
        assert_eq!(cond.rows(), vec![1]);
    }

    #[test]
    fn test_deposition_single_domain() {
        let n = 120;
        let enabled = vec![1.0; n];
        let current: Vec<f64> = (0..n).map(|i| if i >= 10 { 0.5 } else { 0.0 }).collect();
        let shutter: Vec<f64> = (0..n)
            .map(|i| if (30..90).contains(&i) { 1.0 } else { 0.0 })
            .collect();
        let series = one_source_series(n, &enabled, &current, &shutter, &shutter);
        let sources = build_source_events(&series, &[1], &settings());
        let built = build_deposition(&series, &sources, &settings()).unwrap();
        assert_eq!(built.deposition.num_occurrences(), 1);
        assert_eq!(built.used_sources, vec![1]);
    }

    #[test]
    fn test_deposition_bridges_gap_with_escalated_limit() {
        // two 60 s deposition stretches split by a 30 s instrumentation gap:
        // above the default 10-step limit, below the escalated 200-step one
        let n = 200;
        let enabled = vec![1.0; n];
        let current = vec![0.5; n];
        let shutter: Vec<f64> = (0..n)
            .map(|i| {
                if (20..80).contains(&i) || (110..170).contains(&i) {
                    1.0
                } else {
                    0.0
                }
            })
            .collect();
        let series = one_source_series(n, &enabled, &current, &shutter, &shutter);
        let sources = build_source_events(&series, &[1], &settings());
        let built = build_deposition(&series, &sources, &settings()).unwrap();
        assert_eq!(built.deposition.num_occurrences(), 1);
        let dep = &built.deposition;
        assert_eq!(dep.first_start(), Some(series.timestamps()[20]));
        assert_eq!(dep.last_end(), Some(series.timestamps()[169]));
    }

    #[test]
    fn test_deposition_unicity_failure_is_fatal() {
        // two real deposition-like windows 400 s apart: beyond even the
        // escalated limit, so the pipeline must refuse to guess
        let n = 600;
        let enabled = vec![1.0; n];
        let current = vec![0.5; n];
        let shutter: Vec<f64> = (0..n)
            .map(|i| {
                if (20..80).contains(&i) || (480..540).contains(&i) {
                    1.0
                } else {
                    0.0
                }
            })
            .collect();
        let series = one_source_series(n, &enabled, &current, &shutter, &shutter);
        let sources = build_source_events(&series, &[1], &settings());
        let result = build_deposition(&series, &sources, &settings());
        assert!(matches!(result, Err(EventError::DepositionUnicity(2))));
    }

    #[test]
    fn test_deposition_drops_shutter_flicker() {
        // a 5 s flicker before the real 60 s deposition resolves by the
        // sub-minimum size drop alone
        let n = 200;
        let enabled = vec![1.0; n];
        let current = vec![0.5; n];
        let shutter: Vec<f64> = (0..n)
            .map(|i| {
                if (10..15).contains(&i) || (100..160).contains(&i) {
                    1.0
                } else {
                    0.0
                }
            })
            .collect();
        let series = one_source_series(n, &enabled, &current, &shutter, &shutter);
        let sources = build_source_events(&series, &[1], &settings());
        let built = build_deposition(&series, &sources, &settings()).unwrap();
        assert_eq!(built.deposition.num_occurrences(), 1);
        assert_eq!(
            built.deposition.first_start(),
            Some(series.timestamps()[100])
        );
    }

    #[test]
    fn test_missing_deposition_is_fatal() {
        let n = 60;
        let series = one_source_series(
            n,
            &vec![0.0; n],
            &vec![0.0; n],
            &vec![0.0; n],
            &vec![0.0; n],
        );
        let sources = build_source_events(&series, &[1], &settings());
        assert!(matches!(
            build_deposition(&series, &sources, &settings()),
            Err(EventError::DepositionNotFound)
        ));
    }

    #[test]
    fn test_rate_meas_settle_window() {
        // shutter opens at sample 5; samples 6..=35 (30 s) are excluded
        let n = 60;
        let xtal: Vec<f64> = (0..n).map(|i| if i >= 5 { 1.0 } else { 0.0 }).collect();
        let series = series_with(n, 1, &[("Xtal 2 Shutter Open", &xtal)]);
        let cond = rate_meas_condition(&series, &settings());
        let rows = cond.rows();
        assert!(rows.contains(&5));
        assert!(!rows.contains(&6));
        assert!(!rows.contains(&35));
        assert!(rows.contains(&36));
    }

    #[test]
    fn test_rate_meas_without_qcm_channel_is_all_false() {
        let series = series_with(10, 1, &[]);
        assert!(!rate_meas_condition(&series, &settings()).any());
    }

    #[test]
    fn test_temp_ctrl_glitch_guard() {
        // only 4 disagreeing samples and no explicit control channel: glitch
        let setpoint: Vec<f64> = (0..20).map(|i| if i < 4 { 100.0 } else { 25.0 }).collect();
        let measured = vec![25.0; 20];
        let series = series_with(
            20,
            1,
            &[
                ("Substrate Heater Temperature Setpoint", &setpoint),
                ("Substrate Heater Temperature", &measured),
            ],
        );
        let event = build_temp_ctrl(&series, &settings());
        assert!(!event.is_observed());
    }

    #[test]
    fn test_presput_window() {
        // ramp up (0..10), presputter plateau (10..40), deposition (50..110)
        let n = 120;
        let enabled = vec![1.0; n];
        let current: Vec<f64> = (0..n).map(|i| if i >= 5 { 0.5 } else { 0.0 }).collect();
        let setpoint: Vec<f64> = (0..n).map(|i| (i.min(10) * 5) as f64).collect();
        let src_shutter: Vec<f64> = (0..n).map(|i| if i >= 45 { 1.0 } else { 0.0 }).collect();
        let sub_shutter: Vec<f64> = (0..n)
            .map(|i| if (50..110).contains(&i) { 1.0 } else { 0.0 })
            .collect();
        let series = series_with(
            n,
            1,
            &[
                ("Source 1 Enabled", &enabled),
                ("Source 1 Current", &current),
                ("Source 1 Output Setpoint", &setpoint),
                ("PC Source 1 Shutter Open", &src_shutter),
                ("PC Substrate Shutter Open", &sub_shutter),
            ],
        );
        let stg = settings();
        let sources = build_source_events(&series, &[1], &stg);
        let built = build_deposition(&series, &sources, &stg).unwrap();
        let gases = build_gas_events(&series, &stg);
        let cracker = build_cracker_on_open(&series, &stg);
        let presput = build_presput(
            &series,
            &sources[0],
            &built.deposition,
            &gases,
            &cracker,
            &stg,
        );
        assert!(presput.is_observed());
        // strictly after the ramp end and strictly before the deposition
        let ramp_end = sources[0].ramp_up.last_end().unwrap();
        assert!(presput.first_start().unwrap() > ramp_end);
        assert!(presput.last_end().unwrap() < built.deposition.first_start().unwrap());
    }

    #[test]
    fn test_substrate_ramps_split_high_low() {
        let n = 300;
        // setpoint: ramp 25 -> 125 over 0..100, hold to 200, fall to 25
        let setpoint: Vec<f64> = (0..n)
            .map(|i| {
                if i < 100 {
                    25.0 + i as f64
                } else if i < 200 {
                    125.0
                } else {
                    (125.0 - (i - 200) as f64).max(25.0)
                }
            })
            .collect();
        let measured = vec![20.0; n];
        let ctrl = vec![1.0; n];
        // reactive species until sample 250, none afterwards
        let flow: Vec<f64> = (0..n).map(|i| if i < 250 { 5.0 } else { 0.0 }).collect();
        let series = series_from_stamps(
            stamps_at(&(0..n as i64).collect::<Vec<_>>()),
            &[
                ("Substrate Heater Temperature Setpoint", &setpoint),
                ("Substrate Heater Temperature", &measured),
                ("Temperature Control Enabled", &ctrl),
                ("PC MFC 4 Setpoint", &flow),
                ("PC MFC 4 Flow", &flow),
                ("PC MFC 6 Setpoint", &flow),
                ("PC MFC 6 Flow", &flow),
            ],
        );
        let stg = settings();
        let temp_ctrl = build_temp_ctrl(&series, &stg);
        let gases = build_gas_events(&series, &stg);
        let cracker = build_cracker_on_open(&series, &stg);
        // a deposition that never overlaps the ramps
        let deposition = Event::from_condition(
            "Deposition",
            EventCategory::Deposition,
            None,
            &series,
            Condition::from_fn(series.len(), |i| (120..180).contains(&i)),
            &DomainLimits::standard(&stg),
        );
        let ramps =
            build_substrate_ramps(&series, &temp_ctrl, &deposition, &gases, &cracker, &stg);
        assert!(ramps.ramp_up.is_observed());
        assert!(ramps.ramp_down.is_observed());
        assert!(ramps.down_high.is_observed());
        assert!(ramps.down_low.is_observed());
        let high_end = ramps.down_high.last_end().unwrap();
        let low_start = ramps.down_low.first_start().unwrap();
        assert!(high_end < low_start);
    }
}
