//! The orchestrator: wires loader, source registry, condition builders,
//! refinement and parameter extraction together in a fixed stage sequence,
//! and handles per-file report output.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::config::{Config, Settings};
use super::error::{EventError, ProcessorError};
use super::event::Event;
use super::event_builder;
use super::log_file;
use super::params::{self, MainParams, PresputParams, RampUpParams};
use super::report::{self, Value};
use super::source_map;
use super::time_series::TimeSeries;

/// Everything one log yields: the flat time-ordered event list (the
/// visualization surface) and the two report mappings (the structured
/// downstream contract).
#[derive(Debug, Clone)]
pub struct RunReport {
    pub events: Vec<Event>,
    pub main_params: Value,
    pub step_params: Value,
}

/// Run the full segmentation pipeline over one series.
///
/// Stage order is significant: sources are bound before any condition is
/// built, the deposition is finalized before every condition that references
/// deposition-time values, and refinement precedes parameter extraction.
pub fn read_events(
    series: &mut TimeSeries,
    sample_name: &str,
    settings: &Settings,
) -> Result<RunReport, EventError> {
    if series.len() < 2 {
        return Err(EventError::SeriesTooShort);
    }

    let sources = source_map::discover_sources(series);
    source_map::bind_sources_to_supplies(series, &sources);
    let series: &TimeSeries = series;

    // conditions and raw events
    let mut source_events = event_builder::build_source_events(series, &sources, settings);
    let cracker_on_open = event_builder::build_cracker_on_open(series, settings);
    let temp_ctrl = event_builder::build_temp_ctrl(series, settings);
    let gases = event_builder::build_gas_events(series, settings);

    let built = event_builder::build_deposition(series, &source_events, settings)?;
    let deposition = built.deposition;
    let used_sources = built.used_sources;
    let dep_start = deposition
        .first_start()
        .expect("deposition is finalized with exactly one domain");

    let presputs: Vec<Event> = source_events
        .iter()
        .map(|src| {
            event_builder::build_presput(series, src, &deposition, &gases, &cracker_on_open, settings)
        })
        .collect();
    let cracker_base_pressure = event_builder::build_cracker_base_pressure(
        series,
        &cracker_on_open,
        &gases,
        &deposition,
        settings,
    );
    let rate_meas = event_builder::build_rate_meas(
        series,
        &deposition,
        &built.any_source_on_open,
        &cracker_on_open,
        &gases,
        &used_sources,
        settings,
    );
    let mut substrate_ramps = event_builder::build_substrate_ramps(
        series,
        &temp_ctrl,
        &deposition,
        &gases,
        &cracker_on_open,
        settings,
    );

    // refinement: the categories that matter only in their most recent
    // occurrence before the deposition are reduced to it, after their
    // pre-refinement occurrence counts are recorded
    let ramp_up_counts: BTreeMap<u8, usize> = source_events
        .iter()
        .map(|src| (src.number, src.ramp_up.num_occurrences()))
        .collect();
    for src in &mut source_events {
        src.ramp_up.keep_last_before(series, dep_start);
    }
    let mut film_events = rate_meas.film;
    for event in &mut film_events {
        event.keep_last_before(series, dep_start);
    }
    let sub_ramp_up_count = substrate_ramps.ramp_up.num_occurrences();
    substrate_ramps.ramp_up.keep_last_before(series, dep_start);

    // parameter extraction, deposition first
    let overview = params::extract_overview(series, sample_name);
    let deposition_params = params::extract_deposition_params(
        series,
        settings,
        &deposition,
        &temp_ctrl,
        &source_events,
        &used_sources,
        &film_events,
        &rate_meas.sulfur,
    );
    let pressure = params::extract_pressure_params(
        series,
        settings,
        &deposition_params,
        &cracker_base_pressure,
    );

    let mut source_presput = BTreeMap::new();
    let mut source_ramp_up = BTreeMap::new();
    for (src, presput) in source_events.iter().zip(&presputs) {
        if used_sources.contains(&src.number) {
            source_presput.insert(src.number, params::extract_presput_params(series, presput));
            source_ramp_up.insert(
                src.number,
                params::extract_ramp_up_params(
                    series,
                    settings,
                    &src.ramp_up,
                    ramp_up_counts.get(&src.number).copied().unwrap_or(0),
                    &deposition_params,
                ),
            );
        } else {
            source_presput.insert(src.number, PresputParams::default());
            source_ramp_up.insert(src.number, RampUpParams::default());
        }
    }

    let sub_ramp_up = params::extract_sub_ramp_up_params(
        series,
        settings,
        &substrate_ramps.ramp_up,
        sub_ramp_up_count,
        &deposition_params,
    );
    let sub_ramp_down = params::extract_sub_ramp_down_params(
        series,
        settings,
        &substrate_ramps,
        &deposition_params,
    );
    let end_of_process = params::extract_end_of_process(series, &deposition_params);

    let main = MainParams {
        overview,
        deposition: deposition_params,
        pressure,
        source_presput,
        source_ramp_up,
        sub_ramp_up,
        sub_ramp_down,
        end_of_process,
    };
    let main_params = report::main_params_value(&main);

    // the flat event list: every observed event, time-ordered
    let mut events: Vec<Event> = Vec::new();
    for src in source_events {
        events.push(src.on);
        events.push(src.ramp_up);
    }
    events.push(cracker_on_open);
    events.push(temp_ctrl);
    events.push(gases.ar);
    events.push(gases.ph3);
    events.push(gases.h2s);
    events.push(built.any_source_on);
    events.push(built.any_source_on_open);
    events.push(deposition);
    events.extend(presputs);
    events.push(cracker_base_pressure);
    events.push(rate_meas.rate_meas);
    events.extend(film_events);
    events.push(rate_meas.sulfur);
    events.push(substrate_ramps.ramp_up);
    events.push(substrate_ramps.ramp_down);
    events.push(substrate_ramps.down_high);
    events.push(substrate_ramps.down_low);
    events.retain(Event::is_observed);
    events.sort_by_key(|e| e.first_start());

    let step_params = report::step_params_value(&events, series);

    Ok(RunReport {
        events,
        main_params,
        step_params,
    })
}

/// Process a single log file: load, segment, extract, write reports.
pub fn process_log(config: &Config, path: &Path) -> Result<RunReport, ProcessorError> {
    if let Ok(meta) = std::fs::metadata(path) {
        spdlog::info!(
            "Processing log {:?} ({})",
            path.file_name().unwrap_or_default(),
            human_bytes::human_bytes(meta.len() as f64)
        );
    }
    let mut series = log_file::load(path).map_err(|source| ProcessorError::Load {
        path: path.to_path_buf(),
        source,
    })?;
    let sample_name = log_file::sample_name(path);
    let run_report = read_events(&mut series, &sample_name, &config.settings).map_err(|source| {
        ProcessorError::Segmentation {
            path: path.to_path_buf(),
            source,
        }
    })?;
    write_reports(config, path, &run_report)?;
    spdlog::info!(
        "Finished {:?}: {} events on the timeline",
        path.file_name().unwrap_or_default(),
        run_report.events.len()
    );
    Ok(run_report)
}

fn write_reports(config: &Config, path: &Path, run: &RunReport) -> Result<(), ProcessorError> {
    if !config.write_text_report && !config.write_yaml_report {
        return Ok(());
    }
    let dir = config.get_report_directory(path);
    std::fs::create_dir_all(&dir)?;
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "log".to_string());

    if config.write_text_report {
        let text_path = dir.join(format!("{stem}_derived_quantities.txt"));
        let contents = format!(
            "Derived quantities report for logfile\n{stem}:\n\n{}",
            run.main_params.render_text()
        );
        std::fs::write(&text_path, contents).map_err(|source| ProcessorError::Report {
            path: text_path.clone(),
            source,
        })?;
        spdlog::info!("Wrote {:?}", text_path);
    }

    if config.write_yaml_report {
        let yaml_path = dir.join(format!("{stem}_derived_quantities.yaml"));
        let mut combined = Value::map();
        combined.insert("main_params", run.main_params.clone());
        combined.insert("step_params", run.step_params.clone());
        let yaml = serde_yaml::to_string(&combined)?;
        std::fs::write(&yaml_path, yaml).map_err(|source| ProcessorError::Report {
            path: yaml_path.clone(),
            source,
        })?;
        spdlog::info!("Wrote {:?}", yaml_path);
    }
    Ok(())
}

/// All CSV log files under a directory, sorted for deterministic batch
/// order.
pub fn collect_log_files(dir: &Path) -> Result<Vec<PathBuf>, ProcessorError> {
    let mut files = Vec::new();
    for item in dir.read_dir()? {
        let item_path = item?.path();
        let is_csv = item_path
            .extension()
            .map(|e| e.eq_ignore_ascii_case("csv"))
            .unwrap_or(false);
        if is_csv {
            files.push(item_path);
        }
    }
    files.sort();
    Ok(files)
}

/// Outcome of a batch run.
#[derive(Debug, Clone, Default)]
pub struct ProcessSummary {
    pub processed: usize,
    pub failed: usize,
}

/// Process the configured path: one file, or every CSV log in a directory.
/// A log that fails is reported and skipped; it does not abort the batch.
pub fn process(config: &Config) -> Result<ProcessSummary, ProcessorError> {
    let mut summary = ProcessSummary::default();
    let files = if config.is_directory_run() {
        collect_log_files(&config.log_path)?
    } else {
        vec![config.log_path.clone()]
    };
    if files.is_empty() {
        spdlog::warn!("No log files found under {:?}", config.log_path);
        return Ok(summary);
    }
    for file in files {
        match process_log(config, &file) {
            Ok(_) => summary.processed += 1,
            Err(e) => {
                spdlog::error!("{e}");
                summary.failed += 1;
            }
        }
    }
    Ok(summary)
}
