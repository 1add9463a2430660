//! # sputter_timeline
//!
//! sputter_timeline reconstructs a structured process timeline from the raw
//! CSV log of a physical-vapor-deposition run. The chamber logger records a
//! few hundred instrument channels (power supplies, mass flow controllers,
//! heater temperatures, cracker zone temperatures, QCM readings, shutter
//! states) once a second; nothing in the log says "the deposition started
//! here". This library recovers that structure purely from threshold and
//! continuity heuristics on the channels: plasma ramp-ups, presputtering,
//! the deposition itself, substrate temperature ramps, gas flows, cracker
//! operation and deposition-rate measurements, each with derived numeric
//! summaries.
//!
//! ## Pipeline
//!
//! A log is processed in a fixed stage sequence:
//!
//! 1. `log_file` parses the CSV into a [`time_series::TimeSeries`] and
//!    renames the legacy cracker columns.
//! 2. `source_map` discovers which sputtering guns appear in this log and
//!    copies each driving power supply's channels into the gun's logical
//!    namespace.
//! 3. `event_builder` turns boolean conditions over the channels into
//!    [`event::Event`]s: the filtered sub-table plus the disjoint time
//!    domains over which the condition holds with bounded internal gaps
//!    (`domain::extract_domains`).
//! 4. The deposition event is disambiguated to exactly one domain; failure
//!    to do so aborts the log (guessing would corrupt every downstream
//!    quantity).
//! 5. `params` extracts per-category numeric summaries, deposition first
//!    since most other extractors compare against deposition-time values.
//! 6. `report` assembles the "main params" and "step params" mappings and
//!    renders them as text and YAML.
//!
//! The whole pipeline is single-threaded and deterministic: re-running it on
//! the same log yields byte-identical reports.
//!
//! ## Input
//!
//! A single CSV file: a header row of channel names, a units-only row
//! (skipped), then data rows. The mandatory `"Time Stamp"` column uses the
//! fixed `Mon-DD-YYYY HH:MM:SS.ffffff AM/PM` format. The channel set drifts
//! across log format versions; a condition whose channel is absent from a
//! given log evaluates to all-false rather than erroring.
//!
//! ## Configuration
//!
//! The CLI reads a YAML config; every threshold of the engine can be
//! overridden under `settings`:
//!
//! ```yml
//! log_path: /data/deposition logs/mittma_0015_Cu.CSV
//! report_dir: null
//! write_text_report: true
//! write_yaml_report: true
//! settings:
//!   continuity_limit: 10
//!   deposition_continuity_limit: 200
//! ```
//!
//! `log_path` may also name a directory, in which case every `*.CSV` in it
//! is processed in sorted order.
//!
//! ## Output
//!
//! Per log, two report files next to the log (or under `report_dir`):
//! `<log>_derived_quantities.txt` and `<log>_derived_quantities.yaml`. The
//! YAML file carries both mappings: `main_params` (category -> derived
//! values) and `step_params` (step id -> step record, where the step id is
//! `<category>[_s<source>][_n<index>]`).

pub mod channels;
pub mod condition;
pub mod config;
pub mod domain;
pub mod error;
pub mod event;
pub mod event_builder;
pub mod log_file;
pub mod params;
pub mod process;
pub mod report;
pub mod source_map;
pub mod time_series;

#[cfg(test)]
pub(crate) mod test_util;
