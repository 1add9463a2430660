//! Per-category numeric summarizers.
//!
//! Each extractor is a pure function from finalized events to a typed
//! parameter record; the records are assembled into the report mappings at
//! the end. Extractors that compare against deposition-time reference
//! values take the already-computed [`DepositionParams`] by reference, so
//! the prerequisite order is a property of the function signatures.

use std::collections::BTreeMap;

use time::{Duration, PrimitiveDateTime};

use super::channels::{self, signal};
use super::config::Settings;
use super::event::Event;
use super::event_builder::{SourceEvents, SubstrateRampEvents};
use super::time_series::{EventFrame, TimeSeries};

/// Room-temperature classification of the deposition.
///
/// The setpoint can straddle the threshold within one deposition (a
/// deliberate mid-deposition ramp); that case is reported as an explicit
/// third state rather than forced into a boolean.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubstrateTemp {
    Room,
    Heated,
    Mixed,
}

impl SubstrateTemp {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubstrateTemp::Room => "room",
            SubstrateTemp::Heated => "heated",
            SubstrateTemp::Mixed => "mixed",
        }
    }

    pub fn is_room(&self) -> bool {
        matches!(self, SubstrateTemp::Room)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlasmaType {
    Dc,
    PulsedDc,
    Rf,
}

impl PlasmaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlasmaType::Dc => "dc",
            PlasmaType::PulsedDc => "pulsed_dc",
            PlasmaType::Rf => "rf",
        }
    }
}

/// Empirical correction from the two heater thermocouples to the substrate
/// surface temperature.
pub fn true_temperature(temp_1: f64, temp_2: f64) -> f64 {
    0.905 * (0.5 * (temp_1 + temp_2)) + 12.0
}

#[derive(Debug, Clone, Default)]
pub struct VoltageStats {
    /// Mean over the leading edge window rather than a single endpoint
    /// sample, to suppress the start transient.
    pub start: Option<f64>,
    pub end: Option<f64>,
    pub mean: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub std: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct CrackerParams {
    pub enabled: bool,
    pub zone1_temp: Option<f64>,
    pub zone2_temp: Option<f64>,
    pub zone3_temp: Option<f64>,
    pub pulse_width: Option<f64>,
    pub pulse_freq: Option<f64>,
}

/// Cracker usage over an arbitrary row window: control enabled throughout
/// and every zone above its minimum throughout.
fn cracker_usage(frame: EventFrame, settings: &Settings) -> CrackerParams {
    let enabled = frame.all_eq(channels::CRACKER_CONTROL_ENABLED, 1.0)
        && frame.all_above(channels::CRACKER_ZONE1_TEMP, settings.cracker_zone1_min_temp)
        && frame.all_above(channels::CRACKER_ZONE2_TEMP, settings.cracker_zone2_min_temp)
        && frame.all_above(channels::CRACKER_ZONE3_TEMP, settings.cracker_zone3_min_temp);
    if !enabled {
        return CrackerParams::default();
    }
    CrackerParams {
        enabled: true,
        zone1_temp: frame.mean(channels::CRACKER_ZONE1_TEMP),
        zone2_temp: frame.mean(channels::CRACKER_ZONE2_TEMP),
        zone3_temp: frame.mean(channels::CRACKER_ZONE3_TEMP),
        pulse_width: frame.mean(channels::CRACKER_PULSE_WIDTH),
        pulse_freq: frame.mean(channels::CRACKER_VALVE_SETPOINT),
    }
}

#[derive(Debug, Clone, Default)]
pub struct SourceDepositionParams {
    pub enabled: bool,
    pub avg_output_power: Option<f64>,
    pub plasma_type: Option<PlasmaType>,
    pub pulse_frequency: Option<f64>,
    pub dead_time: Option<f64>,
    pub voltage: Option<VoltageStats>,
    pub material: Option<String>,
    pub target_id: Option<String>,
    pub deposition_rate: Option<f64>,
    pub deposition_rate_material: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PartialPressures {
    pub ar: f64,
    pub ph3: f64,
    pub h2s: f64,
}

#[derive(Debug, Clone)]
pub struct DepositionParams {
    pub substrate_temp: SubstrateTemp,
    pub num_events: usize,
    pub start_time: PrimitiveDateTime,
    pub end_time: PrimitiveDateTime,
    pub duration: Duration,
    pub avg_temp_1: Option<f64>,
    pub avg_temp_2: Option<f64>,
    pub avg_temp_setpoint: Option<f64>,
    pub avg_true_temp: Option<f64>,
    pub avg_capman_pressure: Option<f64>,
    pub avg_ar_flow: f64,
    pub avg_ph3_flow: f64,
    pub avg_h2s_flow: f64,
    pub platen_position: Option<f64>,
    /// Sulfur-only rate from the QCM, measured with every source shuttered.
    pub s_deposition_rate: Option<f64>,
    pub cracker: CrackerParams,
    pub sources: BTreeMap<u8, SourceDepositionParams>,
    pub material_space: String,
    pub partial_pressures: Option<PartialPressures>,
}

#[derive(Debug, Clone)]
pub struct OverviewParams {
    pub sample_name: String,
    pub log_start_time: PrimitiveDateTime,
    pub log_end_time: PrimitiveDateTime,
}

#[derive(Debug, Clone, Default)]
pub struct PressureParams {
    pub lower_pressure_before_deposition: Option<f64>,
    pub true_base_pressure_meas: bool,
    pub cracker_pressure_meas: bool,
    pub cracker_pressure: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct PresputParams {
    pub enabled: bool,
    pub duration: Duration,
    pub avg_output_power: Option<f64>,
    pub avg_capman_pressure: Option<f64>,
    pub avg_ar_flow: Option<f64>,
}

impl Default for PresputParams {
    fn default() -> Self {
        Self {
            enabled: false,
            duration: Duration::ZERO,
            avg_output_power: None,
            avg_capman_pressure: None,
            avg_ar_flow: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IgnitionParams {
    pub time: PrimitiveDateTime,
    pub power: Option<f64>,
    pub pressure: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct RampUpParams {
    pub enabled: bool,
    pub num_events: usize,
    pub ignition: Option<IgnitionParams>,
}

#[derive(Debug, Clone)]
pub struct SubRampUpParams {
    pub num_events: usize,
    pub start_time: PrimitiveDateTime,
    pub end_time: PrimitiveDateTime,
    pub duration: Duration,
    /// degC per minute, assuming a linear ramp
    pub temp_slope: Option<f64>,
    /// Hold time at temperature before the deposition starts
    pub time_plateau: Duration,
    pub avg_capman_pressure: Option<f64>,
    pub avg_ar_flow: f64,
    pub avg_ph3_flow: f64,
    pub avg_h2s_flow: f64,
    pub cracker: CrackerParams,
}

#[derive(Debug, Clone)]
pub struct SubRampDownParams {
    pub num_events: usize,
    pub num_events_high_temp: usize,
    pub num_events_low_temp: usize,
    pub start_time: PrimitiveDateTime,
    pub end_time: PrimitiveDateTime,
    pub duration: Duration,
    /// degC per minute, positive for a fall
    pub temp_slope: Option<f64>,
    /// Hold time between deposition end and ramp-down start
    pub time_plateau: Duration,
    pub avg_ar_flow: f64,
    pub avg_ph3_flow: f64,
    pub avg_h2s_flow: f64,
    pub cracker: CrackerParams,
    /// Setpoint and time at which the reactive species supply was cut
    pub anion_input_cutoff_temp: Option<f64>,
    pub anion_input_cutoff_time: Option<PrimitiveDateTime>,
}

#[derive(Debug, Clone)]
pub struct EndOfProcessParams {
    pub end_of_process_temp: Option<f64>,
    pub time_in_chamber_after_deposition: Duration,
}

/// Everything the main report carries.
#[derive(Debug, Clone)]
pub struct MainParams {
    pub overview: OverviewParams,
    pub deposition: DepositionParams,
    pub pressure: PressureParams,
    pub source_presput: BTreeMap<u8, PresputParams>,
    pub source_ramp_up: BTreeMap<u8, RampUpParams>,
    pub sub_ramp_up: Option<SubRampUpParams>,
    pub sub_ramp_down: Option<SubRampDownParams>,
    pub end_of_process: EndOfProcessParams,
}

pub fn extract_overview(series: &TimeSeries, sample_name: &str) -> OverviewParams {
    let times = series.timestamps();
    OverviewParams {
        sample_name: sample_name.to_string(),
        log_start_time: times[0],
        log_end_time: times[times.len() - 1],
    }
}

/// Room temperature if temperature control never ran or the setpoint stayed
/// below the threshold for the entire deposition; heated if it stayed above
/// throughout; mixed otherwise.
fn classify_substrate_temp(
    series: &TimeSeries,
    settings: &Settings,
    temp_ctrl: &Event,
    deposition: &Event,
) -> SubstrateTemp {
    let frame = deposition.frame(series);
    if !temp_ctrl.is_observed()
        || frame.all_below(channels::SUBSTRATE_HEATER_SETPOINT, settings.rt_temp_threshold)
    {
        SubstrateTemp::Room
    } else if frame.all_above(channels::SUBSTRATE_HEATER_SETPOINT, settings.rt_temp_threshold) {
        SubstrateTemp::Heated
    } else {
        SubstrateTemp::Mixed
    }
}

/// Fraction of rows where (fwd - rfl) power exceeds the threshold.
fn net_power_frac(series: &TimeSeries, rows: &[usize], source: u8, settings: &Settings) -> f64 {
    let fwd = series.numeric(&channels::source(source, signal::FWD_POWER));
    let rfl = series.numeric(&channels::source(source, signal::RFL_POWER));
    match (fwd, rfl) {
        (Some(fwd), Some(rfl)) if !rows.is_empty() => {
            let hits = rows
                .iter()
                .filter(|&&i| (fwd[i] - rfl[i]) > settings.power_fwd_refl_threshold)
                .count();
            hits as f64 / rows.len() as f64
        }
        _ => 0.0,
    }
}

/// DC vs RF vs pulsed DC, by whichever indicator holds for at least the
/// tolerated fraction of deposition samples. The power fallback covers
/// hardware that exposes no usable current/bias signal; there the DC Bias
/// channel's very existence marks an RF supply.
fn classify_plasma_type(
    series: &TimeSeries,
    settings: &Settings,
    deposition: &Event,
    source: u8,
) -> Option<PlasmaType> {
    let frame = deposition.frame(series);
    let tol = settings.plasma_frac_tolerance;
    let current_col = channels::source(source, signal::CURRENT);
    let bias_col = channels::source(source, signal::DC_BIAS);

    let dc = frame.frac_above(&current_col, settings.current_threshold) >= tol;
    let rf = frame.frac_above(&bias_col, settings.bias_threshold) >= tol;
    let by_power =
        net_power_frac(series, deposition.rows(), source, settings) >= tol;

    if dc {
        let pulse_col = channels::source(source, signal::PULSE_ENABLED);
        if frame.all_eq(&pulse_col, 1.0) {
            Some(PlasmaType::PulsedDc)
        } else {
            Some(PlasmaType::Dc)
        }
    } else if rf {
        Some(PlasmaType::Rf)
    } else if by_power {
        if series.has_column(&bias_col) {
            Some(PlasmaType::Rf)
        } else {
            Some(PlasmaType::Dc)
        }
    } else {
        None
    }
}

/// Start/end/mean/min/max/std of the supply voltage. DC supplies report
/// `Voltage`, RF supplies report the self-bias on `DC Bias`.
fn extract_voltage_stats(
    series: &TimeSeries,
    settings: &Settings,
    deposition: &Event,
    source: u8,
    plasma: PlasmaType,
) -> Option<VoltageStats> {
    let column = match plasma {
        PlasmaType::Dc | PlasmaType::PulsedDc => channels::source(source, signal::VOLTAGE),
        PlasmaType::Rf => channels::source(source, signal::DC_BIAS),
    };
    let frame = deposition.frame(series);
    let mean = frame.mean(&column)?;
    Some(VoltageStats {
        start: frame.mean_head(&column, settings.fraq_rows_avg_voltage),
        end: frame.mean_tail(&column, settings.fraq_rows_avg_voltage),
        mean: Some(mean),
        min: frame.min(&column),
        max: frame.max(&column),
        std: frame.std(&column),
    })
}

/// First cell of a column as display text, whichever type the loader
/// inferred for it.
fn first_cell_string(frame: EventFrame, column: &str) -> Option<String> {
    if let Some(text) = frame.first_text(column) {
        return Some(text.to_string());
    }
    let value = frame.first(column)?;
    if !value.is_finite() {
        return None;
    }
    if value.fract() == 0.0 {
        Some(format!("{}", value as i64))
    } else {
        Some(format!("{value}"))
    }
}

fn extract_source_deposition(
    series: &TimeSeries,
    settings: &Settings,
    deposition: &Event,
    source: u8,
    film_rate: Option<&Event>,
) -> SourceDepositionParams {
    let frame = deposition.frame(series);
    let plasma_type = classify_plasma_type(series, settings, deposition, source);

    let (pulse_frequency, dead_time) = if plasma_type == Some(PlasmaType::PulsedDc) {
        (
            frame.mean(&channels::source(source, signal::PULSE_FREQUENCY)),
            frame.mean(&channels::source(source, signal::REVERSE_TIME)),
        )
    } else {
        (None, None)
    };

    let voltage = plasma_type
        .and_then(|p| extract_voltage_stats(series, settings, deposition, source, p));

    let material = first_cell_string(frame, &channels::pc_source(source, "Material"))
        .map(|name| match element_symbol(&name) {
            Some(symbol) => symbol.to_string(),
            None => name,
        });
    let target_id = first_cell_string(frame, &channels::pc_source(source, "Loaded Target"));

    let (deposition_rate, deposition_rate_material) = match film_rate {
        Some(event) if event.is_observed() => {
            let film_frame = event.frame(series);
            (
                film_frame.mean(channels::THICKNESS_RATE),
                film_frame
                    .first_text(channels::THICKNESS_ACTIVE_MATERIAL)
                    .map(str::to_string),
            )
        }
        _ => (None, None),
    };

    SourceDepositionParams {
        enabled: true,
        avg_output_power: frame.mean(&channels::source(source, signal::OUTPUT_SETPOINT)),
        plasma_type,
        pulse_frequency,
        dead_time,
        voltage,
        material,
        target_id,
        deposition_rate,
        deposition_rate_material,
    }
}

/// The hyphen-joined element set of the film: each enabled source's target
/// element in source order, then P if phosphine flowed, then S if H2S
/// flowed or the cracker ran.
fn material_space(
    source_symbols: &[String],
    avg_ph3_flow: f64,
    avg_h2s_flow: f64,
    cracker_enabled: bool,
    settings: &Settings,
) -> String {
    let mut elements: Vec<&str> = source_symbols.iter().map(String::as_str).collect();
    if avg_ph3_flow > settings.mfc_flow_threshold {
        elements.push("P");
    }
    if avg_h2s_flow > settings.mfc_flow_threshold || cracker_enabled {
        elements.push("S");
    }
    elements.join("-")
}

/// Partial pressures from the Ar-diluted reactive-gas supplies: each
/// diluted gas contributes its nominal fraction of its flow share; Ar
/// absorbs the carrier remainder plus its own direct flow.
fn partial_pressures(
    settings: &Settings,
    avg_ar_flow: f64,
    avg_ph3_flow: f64,
    avg_h2s_flow: f64,
    avg_capman_pressure: Option<f64>,
) -> Option<PartialPressures> {
    let total = avg_ar_flow + avg_ph3_flow + avg_h2s_flow;
    let pressure = avg_capman_pressure?;
    if total <= 0.0 {
        return None;
    }
    let dilute = settings.diluted_gas_fraction;
    let carrier = 1.0 - dilute;
    Some(PartialPressures {
        ar: (avg_ar_flow + carrier * avg_ph3_flow + carrier * avg_h2s_flow) / total * pressure,
        ph3: dilute * avg_ph3_flow / total * pressure,
        h2s: dilute * avg_h2s_flow / total * pressure,
    })
}

/// The deposition parameter block. Must run before every extractor that
/// compares against deposition-time values.
pub fn extract_deposition_params(
    series: &TimeSeries,
    settings: &Settings,
    deposition: &Event,
    temp_ctrl: &Event,
    source_events: &[SourceEvents],
    used_sources: &[u8],
    film_rate_events: &[Event],
    sulfur_rate_meas: &Event,
) -> DepositionParams {
    let frame = deposition.frame(series);
    let start_time = deposition
        .first_start()
        .expect("deposition is finalized with exactly one domain");
    let end_time = deposition
        .last_end()
        .expect("deposition is finalized with exactly one domain");

    let avg_temp_1 = frame.mean(channels::SUBSTRATE_HEATER_TEMP);
    let avg_temp_2 = frame.mean(channels::SUBSTRATE_HEATER_TEMP_2);
    let avg_true_temp = match (avg_temp_1, avg_temp_2) {
        (Some(t1), Some(t2)) => Some(true_temperature(t1, t2)),
        _ => None,
    };

    let avg_ar_flow = frame
        .mean_above(channels::MFC_AR_FLOW, settings.mfc_flow_threshold)
        .unwrap_or(0.0);
    let avg_ph3_flow = frame
        .mean_above(channels::MFC_PH3_FLOW, settings.mfc_flow_threshold)
        .unwrap_or(0.0);
    let avg_h2s_flow = frame
        .mean_above(channels::MFC_H2S_FLOW, settings.mfc_flow_threshold)
        .unwrap_or(0.0);

    let cracker = cracker_usage(frame, settings);
    let avg_capman_pressure = frame.mean(channels::CAPMAN_PRESSURE);

    let mut sources = BTreeMap::new();
    let mut source_symbols = Vec::new();
    for src in source_events {
        if used_sources.contains(&src.number) {
            let film_rate = film_rate_events
                .iter()
                .find(|e| e.source() == Some(src.number));
            let params =
                extract_source_deposition(series, settings, deposition, src.number, film_rate);
            if let Some(symbol) = &params.material {
                source_symbols.push(symbol.clone());
            }
            sources.insert(src.number, params);
        } else {
            sources.insert(src.number, SourceDepositionParams::default());
        }
    }

    let material_space = material_space(
        &source_symbols,
        avg_ph3_flow,
        avg_h2s_flow,
        cracker.enabled,
        settings,
    );
    let partial_pressures = partial_pressures(
        settings,
        avg_ar_flow,
        avg_ph3_flow,
        avg_h2s_flow,
        avg_capman_pressure,
    );

    DepositionParams {
        substrate_temp: classify_substrate_temp(series, settings, temp_ctrl, deposition),
        num_events: deposition.num_occurrences(),
        start_time,
        end_time,
        duration: end_time - start_time,
        avg_temp_1,
        avg_temp_2,
        avg_temp_setpoint: frame.mean(channels::SUBSTRATE_HEATER_SETPOINT),
        avg_true_temp,
        avg_capman_pressure,
        avg_ar_flow,
        avg_ph3_flow,
        avg_h2s_flow,
        platen_position: frame.mean(channels::SUBSTRATE_ROTATION_POSITION),
        s_deposition_rate: sulfur_rate_meas
            .is_observed()
            .then(|| sulfur_rate_meas.frame(series).mean(channels::THICKNESS_RATE))
            .flatten(),
        cracker,
        sources,
        material_space,
        partial_pressures,
    }
}

/// Base-pressure credibility and the cracker-induced base pressure.
pub fn extract_pressure_params(
    series: &TimeSeries,
    settings: &Settings,
    deposition_params: &DepositionParams,
    cracker_base_pressure: &Event,
) -> PressureParams {
    let times = series.timestamps();
    let lower = series.numeric(channels::WIDE_RANGE_GAUGE).and_then(|data| {
        let values: Vec<f64> = times
            .iter()
            .zip(data)
            .take_while(|(t, _)| **t <= deposition_params.start_time)
            .map(|(_, v)| *v)
            .filter(|v| v.is_finite())
            .collect();
        values.into_iter().reduce(f64::min)
    });

    let true_base_pressure_meas = match lower {
        Some(p) => p < settings.max_base_pressure && !deposition_params.cracker.enabled,
        None => false,
    };

    let (cracker_pressure_meas, cracker_pressure) = if cracker_base_pressure.is_observed() {
        (
            true,
            cracker_base_pressure
                .frame(series)
                .mean(channels::WIDE_RANGE_GAUGE),
        )
    } else {
        (false, None)
    };

    PressureParams {
        lower_pressure_before_deposition: lower,
        true_base_pressure_meas,
        cracker_pressure_meas,
        cracker_pressure,
    }
}

/// Presputter summary for one source. An unobserved event reports
/// `enabled: false` and nothing else; absence of presputtering is data, not
/// an error.
pub fn extract_presput_params(series: &TimeSeries, presput: &Event) -> PresputParams {
    if !presput.is_observed() {
        return PresputParams::default();
    }
    let frame = presput.frame(series);
    PresputParams {
        enabled: true,
        duration: presput.total_duration(),
        avg_output_power: frame.mean(&channels::source(
            presput.source().unwrap_or_default(),
            signal::OUTPUT_SETPOINT,
        )),
        avg_capman_pressure: frame.mean(channels::CAPMAN_PRESSURE),
        avg_ar_flow: frame.mean(channels::MFC_AR_FLOW),
    }
}

/// Ramp-up summary for one source: the occurrence count before refinement
/// and the ignition point, searched from the start of the last
/// pre-deposition ramp through the deposition start.
pub fn extract_ramp_up_params(
    series: &TimeSeries,
    settings: &Settings,
    ramp_up: &Event,
    num_events_before_refinement: usize,
    deposition_params: &DepositionParams,
) -> RampUpParams {
    let source = ramp_up.source().unwrap_or_default();
    let mut params = RampUpParams {
        enabled: true,
        num_events: num_events_before_refinement,
        ignition: None,
    };
    let window_start = match ramp_up.first_start() {
        Some(t) => t,
        None => return params,
    };
    let window_end = deposition_params.start_time;

    let times = series.timestamps();
    let current = series.numeric(&channels::source(source, signal::CURRENT));
    let bias = series.numeric(&channels::source(source, signal::DC_BIAS));
    let lit = |i: usize| {
        current.map(|c| c[i] > settings.current_threshold).unwrap_or(false)
            || bias.map(|b| b[i] > settings.bias_threshold).unwrap_or(false)
    };
    let ignition_row = (0..series.len())
        .find(|&i| times[i] >= window_start && times[i] <= window_end && lit(i));

    if let Some(row) = ignition_row {
        let setpoint = series.numeric(&channels::source(source, signal::OUTPUT_SETPOINT));
        let pressure = series.numeric(channels::CAPMAN_PRESSURE);
        params.ignition = Some(IgnitionParams {
            time: times[row],
            power: setpoint.map(|s| s[row]).filter(|v| v.is_finite()),
            pressure: pressure.map(|p| p[row]).filter(|v| v.is_finite()),
        });
    }
    params
}

fn ramp_slope(frame: EventFrame, duration: Duration, sign: f64) -> Option<f64> {
    let first = frame.first(channels::SUBSTRATE_HEATER_SETPOINT)?;
    let last = frame.last(channels::SUBSTRATE_HEATER_SETPOINT)?;
    let minutes = duration.as_seconds_f64() / 60.0;
    (minutes > 0.0).then(|| sign * (last - first) / minutes)
}

fn gas_flow_or_zero(frame: EventFrame, column: &str, settings: &Settings) -> f64 {
    frame
        .mean_above(column, settings.mfc_flow_threshold)
        .unwrap_or(0.0)
}

/// Substrate ramp-up summary. Only meaningful for a heated (or mixed)
/// deposition.
pub fn extract_sub_ramp_up_params(
    series: &TimeSeries,
    settings: &Settings,
    ramp_up: &Event,
    num_events_before_refinement: usize,
    deposition_params: &DepositionParams,
) -> Option<SubRampUpParams> {
    if deposition_params.substrate_temp.is_room() || !ramp_up.is_observed() {
        return None;
    }
    let frame = ramp_up.frame(series);
    let start_time = frame.first_timestamp()?;
    let end_time = frame.last_timestamp()?;
    let duration = end_time - start_time;

    Some(SubRampUpParams {
        num_events: num_events_before_refinement,
        start_time,
        end_time,
        duration,
        temp_slope: ramp_slope(frame, duration, 1.0),
        time_plateau: deposition_params.start_time - end_time,
        avg_capman_pressure: frame.mean(channels::CAPMAN_PRESSURE),
        avg_ar_flow: gas_flow_or_zero(frame, channels::MFC_AR_FLOW, settings),
        avg_ph3_flow: gas_flow_or_zero(frame, channels::MFC_PH3_FLOW, settings),
        avg_h2s_flow: gas_flow_or_zero(frame, channels::MFC_H2S_FLOW, settings),
        cracker: cracker_usage(frame, settings),
    })
}

/// Substrate ramp-down summary: the overall slope from the full ramp-down,
/// the bounds from the high/low phases, the gas and cracker usage from the
/// high phase, and the anion-input cutoff at the end of the high phase.
pub fn extract_sub_ramp_down_params(
    series: &TimeSeries,
    settings: &Settings,
    ramps: &SubstrateRampEvents,
    deposition_params: &DepositionParams,
) -> Option<SubRampDownParams> {
    if deposition_params.substrate_temp.is_room() || !ramps.ramp_down.is_observed() {
        return None;
    }
    let down_frame = ramps.ramp_down.frame(series);
    let down_duration =
        down_frame.last_timestamp()? - down_frame.first_timestamp()?;

    let high = &ramps.down_high;
    let low = &ramps.down_low;
    let high_frame = high.frame(series);

    let start_time = high.first_start().or(ramps.ramp_down.first_start())?;
    let end_time = low
        .last_end()
        .or(high.last_end())
        .or(ramps.ramp_down.last_end())?;

    Some(SubRampDownParams {
        num_events: ramps.ramp_down.num_occurrences(),
        num_events_high_temp: high.num_occurrences(),
        num_events_low_temp: low.num_occurrences(),
        start_time,
        end_time,
        duration: end_time - start_time,
        temp_slope: ramp_slope(down_frame, down_duration, -1.0),
        time_plateau: start_time - deposition_params.end_time,
        avg_ar_flow: gas_flow_or_zero(high_frame, channels::MFC_AR_FLOW, settings),
        avg_ph3_flow: gas_flow_or_zero(high_frame, channels::MFC_PH3_FLOW, settings),
        avg_h2s_flow: gas_flow_or_zero(high_frame, channels::MFC_H2S_FLOW, settings),
        cracker: cracker_usage(high_frame, settings),
        anion_input_cutoff_temp: high_frame.last(channels::SUBSTRATE_HEATER_SETPOINT),
        anion_input_cutoff_time: high_frame.last_timestamp(),
    })
}

pub fn extract_end_of_process(
    series: &TimeSeries,
    deposition_params: &DepositionParams,
) -> EndOfProcessParams {
    let times = series.timestamps();
    let last_temp = series
        .numeric(channels::SUBSTRATE_HEATER_TEMP)
        .and_then(|data| data.last().copied())
        .filter(|v| v.is_finite());
    EndOfProcessParams {
        end_of_process_temp: last_temp,
        time_in_chamber_after_deposition: times[times.len() - 1]
            - deposition_params.end_time,
    }
}

/// Element name -> symbol for the targets the chamber takes. Inputs that
/// already look like a symbol pass through unchanged.
pub fn element_symbol(name: &str) -> Option<&'static str> {
    let lowered = name.trim().to_ascii_lowercase();
    let symbol = match lowered.as_str() {
        "silver" | "ag" => "Ag",
        "aluminium" | "aluminum" | "al" => "Al",
        "antimony" | "sb" => "Sb",
        "bismuth" | "bi" => "Bi",
        "boron" | "b" => "B",
        "cadmium" | "cd" => "Cd",
        "carbon" | "c" => "C",
        "chromium" | "cr" => "Cr",
        "cobalt" | "co" => "Co",
        "copper" | "cu" => "Cu",
        "gallium" | "ga" => "Ga",
        "germanium" | "ge" => "Ge",
        "gold" | "au" => "Au",
        "hafnium" | "hf" => "Hf",
        "indium" | "in" => "In",
        "iron" | "fe" => "Fe",
        "lanthanum" | "la" => "La",
        "magnesium" | "mg" => "Mg",
        "manganese" | "mn" => "Mn",
        "molybdenum" | "mo" => "Mo",
        "nickel" | "ni" => "Ni",
        "niobium" | "nb" => "Nb",
        "phosphorus" | "p" => "P",
        "platinum" | "pt" => "Pt",
        "scandium" | "sc" => "Sc",
        "selenium" | "se" => "Se",
        "silicon" | "si" => "Si",
        "sulfur" | "sulphur" | "s" => "S",
        "tantalum" | "ta" => "Ta",
        "tellurium" | "te" => "Te",
        "tin" | "sn" => "Sn",
        "titanium" | "ti" => "Ti",
        "tungsten" | "w" => "W",
        "vanadium" | "v" => "V",
        "yttrium" | "y" => "Y",
        "zinc" | "zn" => "Zn",
        "zirconium" | "zr" => "Zr",
        _ => return None,
    };
    Some(symbol)
}
