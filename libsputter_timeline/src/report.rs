//! Report assembly.
//!
//! The engine's outputs are two nested mappings of plain values (numbers,
//! strings, booleans, timestamps, time spans) keyed by stable strings. They
//! are manipulated internally as typed parameter records (see `params`) and
//! converted to this [`Value`] tree only at the very end, for the external
//! interface. The tree is BTreeMap-backed, so rendering the same run twice
//! yields byte-identical output.

use std::collections::BTreeMap;

use serde::{Serialize, Serializer};
use time::format_description::FormatItem;
use time::macros::format_description;
use time::{Duration, PrimitiveDateTime};

use super::channels::{self, signal};
use super::event::Event;
use super::params::{
    CrackerParams, MainParams, PresputParams, RampUpParams, SourceDepositionParams,
    SubRampDownParams, SubRampUpParams,
};
use super::time_series::TimeSeries;

const TIMESTAMP_FORMAT: &[FormatItem<'_>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

/// One report value. No host-framework types leak through this interface.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(PrimitiveDateTime),
    Span(Duration),
    Map(BTreeMap<String, Value>),
}

impl Value {
    pub fn map() -> Self {
        Value::Map(BTreeMap::new())
    }

    /// Insert into a map value. Calling this on a non-map is a programming
    /// error, not a data condition.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        match self {
            Value::Map(entries) => {
                entries.insert(key.into(), value);
            }
            _ => panic!("insert on a non-map report value"),
        }
    }

    pub fn insert_float(&mut self, key: impl Into<String>, value: Option<f64>) {
        if let Some(v) = value {
            self.insert(key, Value::Float(v));
        }
    }

    pub fn insert_text(&mut self, key: impl Into<String>, value: Option<String>) {
        if let Some(v) = value {
            self.insert(key, Value::Text(v));
        }
    }

    pub fn insert_timestamp(&mut self, key: impl Into<String>, value: Option<PrimitiveDateTime>) {
        if let Some(v) = value {
            self.insert(key, Value::Timestamp(v));
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Map(entries) => entries.get(key),
            _ => None,
        }
    }

    /// The nested `key: value` text report, two-space indent per level.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        self.render_into(&mut out, 0);
        out
    }

    fn render_into(&self, out: &mut String, depth: usize) {
        if let Value::Map(entries) = self {
            for (key, value) in entries {
                for _ in 0..depth {
                    out.push_str("  ");
                }
                match value {
                    Value::Map(_) => {
                        out.push_str(key);
                        out.push_str(":\n");
                        value.render_into(out, depth + 1);
                    }
                    scalar => {
                        out.push_str(key);
                        out.push_str(": ");
                        out.push_str(&scalar.render_scalar());
                        out.push('\n');
                    }
                }
            }
        }
    }

    fn render_scalar(&self) -> String {
        match self {
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => format!("{f}"),
            Value::Text(t) => t.clone(),
            Value::Timestamp(t) => format_timestamp(*t),
            Value::Span(d) => format_span(*d),
            Value::Map(_) => String::new(),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::Text(t) => serializer.serialize_str(t),
            Value::Timestamp(t) => serializer.serialize_str(&format_timestamp(*t)),
            Value::Span(d) => serializer.serialize_str(&format_span(*d)),
            Value::Map(entries) => entries.serialize(serializer),
        }
    }
}

fn format_timestamp(t: PrimitiveDateTime) -> String {
    t.format(TIMESTAMP_FORMAT)
        .unwrap_or_else(|_| format!("{t}"))
}

/// `HH:MM:SS`, hours unbounded, sign-prefixed when negative.
fn format_span(d: Duration) -> String {
    let total = d.whole_seconds();
    let sign = if total < 0 { "-" } else { "" };
    let total = total.abs();
    format!(
        "{sign}{:02}:{:02}:{:02}",
        total / 3600,
        (total % 3600) / 60,
        total % 60
    )
}

fn cracker_value(cracker: &CrackerParams) -> Value {
    let mut map = Value::map();
    map.insert("enabled", Value::Bool(cracker.enabled));
    map.insert_float("zone1_temp", cracker.zone1_temp);
    map.insert_float("zone2_temp", cracker.zone2_temp);
    map.insert_float("zone3_temp", cracker.zone3_temp);
    map.insert_float("pulse_width", cracker.pulse_width);
    map.insert_float("pulse_freq", cracker.pulse_freq);
    map
}

fn source_deposition_value(params: &SourceDepositionParams) -> Value {
    let mut map = Value::map();
    map.insert("enabled", Value::Bool(params.enabled));
    if !params.enabled {
        return map;
    }
    map.insert_float("avg_output_power", params.avg_output_power);
    map.insert_text(
        "plasma_type",
        params.plasma_type.map(|p| p.as_str().to_string()),
    );
    map.insert_float("pulse_frequency", params.pulse_frequency);
    map.insert_float("dead_time", params.dead_time);
    if let Some(voltage) = &params.voltage {
        map.insert_float("start_voltage", voltage.start);
        map.insert_float("end_voltage", voltage.end);
        map.insert_float("avg_voltage", voltage.mean);
        map.insert_float("min_voltage", voltage.min);
        map.insert_float("max_voltage", voltage.max);
        map.insert_float("std_voltage", voltage.std);
    }
    map.insert_text("material", params.material.clone());
    map.insert_text("target_id", params.target_id.clone());
    map.insert_float("deposition_rate", params.deposition_rate);
    map.insert_text(
        "deposition_rate_mat",
        params.deposition_rate_material.clone(),
    );
    map
}

fn presput_value(params: &PresputParams) -> Value {
    let mut map = Value::map();
    map.insert("enabled", Value::Bool(params.enabled));
    if !params.enabled {
        return map;
    }
    map.insert("duration", Value::Span(params.duration));
    map.insert_float("avg_output_power", params.avg_output_power);
    map.insert_float("avg_capman_pressure", params.avg_capman_pressure);
    map.insert_float("avg_ar_flow", params.avg_ar_flow);
    map
}

fn ramp_up_value(params: &RampUpParams) -> Value {
    let mut map = Value::map();
    map.insert("enabled", Value::Bool(params.enabled));
    if !params.enabled {
        return map;
    }
    map.insert("num_events", Value::Int(params.num_events as i64));
    map.insert(
        "source_ignition",
        Value::Bool(params.ignition.is_some()),
    );
    if let Some(ignition) = &params.ignition {
        map.insert("source_ignition_time", Value::Timestamp(ignition.time));
        map.insert_float("source_ignition_power", ignition.power);
        map.insert_float("source_ignition_pressure", ignition.pressure);
    }
    map
}

fn sub_ramp_up_value(params: &SubRampUpParams) -> Value {
    let mut map = Value::map();
    map.insert("num_events", Value::Int(params.num_events as i64));
    map.insert("start_time", Value::Timestamp(params.start_time));
    map.insert("end_time", Value::Timestamp(params.end_time));
    map.insert("duration", Value::Span(params.duration));
    map.insert_float("temp_slope", params.temp_slope);
    map.insert("time_plateau", Value::Span(params.time_plateau));
    map.insert_float("avg_capman_pressure", params.avg_capman_pressure);
    map.insert("avg_ar_flow", Value::Float(params.avg_ar_flow));
    map.insert("avg_ph3_flow", Value::Float(params.avg_ph3_flow));
    map.insert("avg_h2s_flow", Value::Float(params.avg_h2s_flow));
    map.insert("cracker", cracker_value(&params.cracker));
    map
}

fn sub_ramp_down_value(params: &SubRampDownParams) -> Value {
    let mut map = Value::map();
    map.insert("num_events", Value::Int(params.num_events as i64));
    map.insert(
        "num_events_high_temp",
        Value::Int(params.num_events_high_temp as i64),
    );
    map.insert(
        "num_events_low_temp",
        Value::Int(params.num_events_low_temp as i64),
    );
    map.insert("start_time", Value::Timestamp(params.start_time));
    map.insert("end_time", Value::Timestamp(params.end_time));
    map.insert("duration", Value::Span(params.duration));
    map.insert_float("temp_slope", params.temp_slope);
    map.insert("time_plateau", Value::Span(params.time_plateau));
    map.insert("avg_ar_flow", Value::Float(params.avg_ar_flow));
    map.insert("avg_ph3_flow", Value::Float(params.avg_ph3_flow));
    map.insert("avg_h2s_flow", Value::Float(params.avg_h2s_flow));
    map.insert("cracker", cracker_value(&params.cracker));
    map.insert_float("anion_input_cutoff_temp", params.anion_input_cutoff_temp);
    map.insert_timestamp("anion_input_cutoff_time", params.anion_input_cutoff_time);
    map
}

/// The "main params" mapping: category -> scalar/derived values, with
/// source-conditional sub-keys.
pub fn main_params_value(params: &MainParams) -> Value {
    let mut root = Value::map();
    root.insert(
        "sample_name",
        Value::Text(params.overview.sample_name.clone()),
    );
    root.insert(
        "log_start_time",
        Value::Timestamp(params.overview.log_start_time),
    );
    root.insert(
        "log_end_time",
        Value::Timestamp(params.overview.log_end_time),
    );

    let dep = &params.deposition;
    let mut dep_map = Value::map();
    dep_map.insert(
        "substrate_temp",
        Value::Text(dep.substrate_temp.as_str().to_string()),
    );
    dep_map.insert("num_events", Value::Int(dep.num_events as i64));
    dep_map.insert("start_time", Value::Timestamp(dep.start_time));
    dep_map.insert("end_time", Value::Timestamp(dep.end_time));
    dep_map.insert("duration", Value::Span(dep.duration));
    dep_map.insert_float("avg_temp_1", dep.avg_temp_1);
    dep_map.insert_float("avg_temp_2", dep.avg_temp_2);
    dep_map.insert_float("avg_temp_setpoint", dep.avg_temp_setpoint);
    dep_map.insert_float("avg_true_temp", dep.avg_true_temp);
    dep_map.insert_float("avg_capman_pressure", dep.avg_capman_pressure);
    dep_map.insert("avg_ar_flow", Value::Float(dep.avg_ar_flow));
    dep_map.insert("avg_ph3_flow", Value::Float(dep.avg_ph3_flow));
    dep_map.insert("avg_h2s_flow", Value::Float(dep.avg_h2s_flow));
    dep_map.insert_float("platen_position", dep.platen_position);
    dep_map.insert_float("s_deposition_rate", dep.s_deposition_rate);
    if let Some(pp) = &dep.partial_pressures {
        dep_map.insert("ar_partial_pressure", Value::Float(pp.ar));
        dep_map.insert("ph3_partial_pressure", Value::Float(pp.ph3));
        dep_map.insert("h2s_partial_pressure", Value::Float(pp.h2s));
    }
    dep_map.insert("cracker", cracker_value(&dep.cracker));
    for (number, source_params) in &dep.sources {
        dep_map.insert(
            format!("source{number}"),
            source_deposition_value(source_params),
        );
    }
    root.insert("deposition", dep_map);
    root.insert("material_space", Value::Text(dep.material_space.clone()));

    root.insert_float(
        "lower_pressure_before_deposition",
        params.pressure.lower_pressure_before_deposition,
    );
    root.insert(
        "true_base_pressure_meas",
        Value::Bool(params.pressure.true_base_pressure_meas),
    );
    root.insert(
        "cracker_pressure_meas",
        Value::Bool(params.pressure.cracker_pressure_meas),
    );
    root.insert_float("cracker_pressure", params.pressure.cracker_pressure);

    let mut presput_map = Value::map();
    for (number, presput) in &params.source_presput {
        presput_map.insert(format!("source{number}"), presput_value(presput));
    }
    root.insert("source_presput", presput_map);

    let mut ramp_up_map = Value::map();
    for (number, ramp_up) in &params.source_ramp_up {
        ramp_up_map.insert(format!("source{number}"), ramp_up_value(ramp_up));
    }
    root.insert("source_ramp_up", ramp_up_map);

    if let Some(sub_ramp_up) = &params.sub_ramp_up {
        root.insert("sub_ramp_up", sub_ramp_up_value(sub_ramp_up));
    }
    if let Some(sub_ramp_down) = &params.sub_ramp_down {
        root.insert("sub_ramp_down", sub_ramp_down_value(sub_ramp_down));
    }

    root.insert_float(
        "end_of_process_temp",
        params.end_of_process.end_of_process_temp,
    );
    root.insert(
        "time_in_chamber_after_deposition",
        Value::Span(params.end_of_process.time_in_chamber_after_deposition),
    );
    root
}

/// The "step params" mapping: step_id -> step record, one per occurrence of
/// each process-step event.
pub fn step_params_value(events: &[Event], series: &TimeSeries) -> Value {
    let mut root = Value::map();
    for event in events {
        if !event.category().is_process_step() || !event.is_observed() {
            continue;
        }
        for (index, occurrence) in event.occurrences(series).iter().enumerate() {
            let mut step = Value::map();
            step.insert("name", Value::Text(occurrence.name.clone()));
            step.insert(
                "category",
                Value::Text(occurrence.category.key().to_string()),
            );
            step.insert("start_time", Value::Timestamp(occurrence.bounds.start));
            step.insert("end_time", Value::Timestamp(occurrence.bounds.end));
            step.insert("duration", Value::Span(occurrence.bounds.duration()));
            step.insert(
                "creates_new_thin_film",
                Value::Bool(occurrence.category.creates_new_thin_film()),
            );
            step.insert_float("mean_substrate_temp", occurrence.mean_temperature);
            step.insert_float("mean_pressure", occurrence.mean_pressure);
            if let Some(number) = occurrence.source {
                let rows = event.occurrence_rows(series, index);
                let frame = series.frame(&rows);
                let mut source_map = Value::map();
                source_map.insert("number", Value::Int(number as i64));
                source_map.insert_float(
                    "avg_output_power",
                    frame.mean(&channels::source(number, signal::OUTPUT_SETPOINT)),
                );
                step.insert(format!("source{number}"), source_map);
            }
            root.insert(occurrence.step_id.clone(), step);
        }
    }
    root
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::Condition;
    use crate::config::Settings;
    use crate::domain::DomainLimits;
    use crate::event::EventCategory;
    use crate::test_util::{base_time, series_with};

    #[test]
    fn test_span_formatting() {
        assert_eq!(format_span(Duration::seconds(3661)), "01:01:01");
        assert_eq!(format_span(Duration::seconds(-61)), "-00:01:01");
        assert_eq!(format_span(Duration::seconds(90000)), "25:00:00");
    }

    #[test]
    fn test_timestamp_formatting() {
        assert_eq!(format_timestamp(base_time()), "2024-06-07 10:00:00");
    }

    #[test]
    fn test_render_text_nesting() {
        let mut inner = Value::map();
        inner.insert("enabled", Value::Bool(true));
        let mut root = Value::map();
        root.insert("cracker", inner);
        root.insert("sample_name", Value::Text("mittma_0015_Cu".into()));
        assert_eq!(
            root.render_text(),
            "cracker:\n  enabled: true\nsample_name: mittma_0015_Cu\n"
        );
    }

    #[test]
    fn test_yaml_serialization_of_scalars() {
        let mut root = Value::map();
        root.insert("duration", Value::Span(Duration::seconds(90)));
        root.insert("start_time", Value::Timestamp(base_time()));
        root.insert("rate", Value::Float(1.5));
        let yaml = serde_yaml::to_string(&root).unwrap();
        assert!(yaml.contains("00:01:30"));
        assert!(yaml.contains("2024-06-07 10:00:00"));
        assert!(yaml.contains("rate: 1.5"));
    }

    #[test]
    fn test_step_params_for_deposition_event() {
        let n = 60;
        let series = series_with(
            n,
            1,
            &[
                ("Substrate Heater Temperature", &vec![200.0; n]),
                ("PC Capman Pressure", &vec![5.0; n]),
            ],
        );
        let deposition = Event::from_condition(
            "Deposition",
            EventCategory::Deposition,
            None,
            &series,
            Condition::from_fn(n, |i| (10..50).contains(&i)),
            &DomainLimits::standard(&Settings::default()),
        );
        let steps = step_params_value(&[deposition], &series);
        let step = steps.get("deposition").expect("one deposition step");
        assert_eq!(step.get("creates_new_thin_film"), Some(&Value::Bool(true)));
        assert_eq!(
            step.get("mean_substrate_temp"),
            Some(&Value::Float(200.0))
        );
        assert_eq!(step.get("category"), Some(&Value::Text("deposition".into())));
    }

    #[test]
    fn test_step_params_skip_indicator_events() {
        let n = 30;
        let series = series_with(n, 1, &[]);
        let gas = Event::from_condition(
            "Ar On",
            EventCategory::ArFlow,
            None,
            &series,
            Condition::all_true(n),
            &DomainLimits::standard(&Settings::default()),
        );
        let steps = step_params_value(&[gas], &series);
        assert_eq!(steps, Value::map());
    }
}
