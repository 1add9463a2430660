//! Discovery of the sputtering guns present in a log and the remapping of
//! power-supply-indexed channels onto source-indexed ones.
//!
//! Which supply drives which gun is patched per run (and can be rewired
//! mid-run), so the log stores the electrical signals under the supply's
//! name. Downstream code wants them under the gun's name. A supply is bound
//! to a source when its switch indicator (or, on logs without switch
//! columns, its enabled indicator) ever fires while that source's shutter is
//! open; the shutter gate keeps a supply that was switched over by mistake
//! from being attributed to the source.

use super::channels;
use super::condition::Condition;
use super::time_series::TimeSeries;

/// The chamber has three power supplies.
pub const SUPPLY_NUMBERS: [u8; 3] = [1, 2, 3];

const LOADED_TARGET_PREFIX: &str = "PC Source ";
const LOADED_TARGET_SUFFIX: &str = " Loaded Target";

/// Sources are discovered from the column namespace, not configured:
/// every `"PC Source <N> Loaded Target"` column names one gun.
pub fn discover_sources(series: &TimeSeries) -> Vec<u8> {
    let mut sources: Vec<u8> = series
        .column_names()
        .into_iter()
        .filter_map(|name| {
            let middle = name
                .strip_prefix(LOADED_TARGET_PREFIX)?
                .strip_suffix(LOADED_TARGET_SUFFIX)?;
            middle.parse::<u8>().ok()
        })
        .collect();
    sources.sort_unstable();
    sources.dedup();
    sources
}

/// The per-supply switch indicator columns of the switch-style log format.
fn switch_column(source: u8, supply: u8) -> String {
    let tag = match supply {
        1 => "Switch-PDC-PWS1",
        2 => "Switch-RF1-PWS2",
        _ => "Switch-RF2-PWS3",
    };
    channels::pc_source(source, tag)
}

/// For each source, copy every channel of each supply that drove it into the
/// source's logical namespace (`"Power Supply 2 DC Bias"` ->
/// `"Source 4 DC Bias"`).
///
/// A source driven by more than one supply across the run keeps the
/// last-copied supply's values per channel; that is a known accuracy risk
/// and is surfaced as a warning.
pub fn bind_sources_to_supplies(series: &mut TimeSeries, sources: &[u8]) {
    for &source in sources {
        let shutter_open = Condition::equals(
            series,
            &channels::pc_source(source, "Shutter Open"),
            1.0,
        );
        let has_switch_columns = series.has_column(&switch_column(source, 1));

        let mut bound: Vec<u8> = Vec::new();
        for supply in SUPPLY_NUMBERS {
            let indicator = if has_switch_columns {
                Condition::equals(series, &switch_column(source, supply), 1.0)
            } else {
                Condition::equals(
                    series,
                    &channels::power_supply(supply, channels::signal::ENABLED),
                    1.0,
                )
            };
            if (indicator & shutter_open.clone()).any() {
                copy_supply_channels(series, supply, source);
                bound.push(supply);
            }
        }

        match bound.as_slice() {
            [] => spdlog::info!("Source {source} was never driven by a power supply"),
            [supply] => spdlog::info!("Source {source} is driven by power supply {supply}"),
            several => spdlog::warn!(
                "Source {source} was driven by power supplies {several:?} over the run; \
                 its channels keep the last supply's values"
            ),
        }
    }
}

fn copy_supply_channels(series: &mut TimeSeries, supply: u8, source: u8) {
    let prefix = channels::power_supply_prefix(supply);
    let to_copy: Vec<String> = series
        .column_names()
        .into_iter()
        .filter(|name| name.starts_with(&prefix))
        .map(str::to_string)
        .collect();
    for name in to_copy {
        let signal = &name[prefix.len()..];
        let new_name = channels::source(source, signal);
        if let Some(column) = series.clone_column(&name) {
            series.insert_column(&new_name, column);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::series_with;

    #[test]
    fn test_discover_sources_from_loaded_target_columns() {
        let series = series_with(
            3,
            1,
            &[
                ("PC Source 1 Loaded Target", &[7.0; 3]),
                ("PC Source 3 Loaded Target", &[8.0; 3]),
                ("PC Source 4 Loaded Target", &[9.0; 3]),
                ("PC Source 4 Shutter Open", &[0.0; 3]),
            ],
        );
        assert_eq!(discover_sources(&series), vec![1, 3, 4]);
    }

    #[test]
    fn test_binding_requires_shutter_gate() {
        // switch fires but the shutter never opens: no binding
        let mut series = series_with(
            4,
            1,
            &[
                ("PC Source 4 Loaded Target", &[9.0; 4]),
                ("PC Source 4 Shutter Open", &[0.0; 4]),
                ("PC Source 4 Switch-PDC-PWS1", &[1.0; 4]),
                ("PC Source 4 Switch-RF1-PWS2", &[0.0; 4]),
                ("PC Source 4 Switch-RF2-PWS3", &[0.0; 4]),
                ("Power Supply 1 Current", &[0.4; 4]),
            ],
        );
        bind_sources_to_supplies(&mut series, &[4]);
        assert!(!series.has_column("Source 4 Current"));
    }

    #[test]
    fn test_binding_copies_supply_channels() {
        let mut series = series_with(
            4,
            1,
            &[
                ("PC Source 4 Loaded Target", &[9.0; 4]),
                ("PC Source 4 Shutter Open", &[0.0, 1.0, 1.0, 0.0]),
                ("PC Source 4 Switch-PDC-PWS1", &[1.0; 4]),
                ("PC Source 4 Switch-RF1-PWS2", &[0.0; 4]),
                ("PC Source 4 Switch-RF2-PWS3", &[0.0; 4]),
                ("Power Supply 1 Current", &[0.4, 0.5, 0.6, 0.7]),
                ("Power Supply 1 Enabled", &[1.0; 4]),
            ],
        );
        bind_sources_to_supplies(&mut series, &[4]);
        assert_eq!(
            series.numeric("Source 4 Current").unwrap(),
            &[0.4, 0.5, 0.6, 0.7]
        );
        assert_eq!(series.numeric("Source 4 Enabled").unwrap(), &[1.0; 4]);
    }

    #[test]
    fn test_switchless_logs_fall_back_to_supply_enabled() {
        let mut series = series_with(
            4,
            1,
            &[
                ("PC Source 3 Loaded Target", &[5.0; 4]),
                ("PC Source 3 Shutter Open", &[0.0, 1.0, 1.0, 0.0]),
                ("Power Supply 2 Enabled", &[0.0, 1.0, 1.0, 0.0]),
                ("Power Supply 2 DC Bias", &[0.0, 120.0, 118.0, 0.0]),
            ],
        );
        bind_sources_to_supplies(&mut series, &[3]);
        assert_eq!(
            series.numeric("Source 3 DC Bias").unwrap(),
            &[0.0, 120.0, 118.0, 0.0]
        );
    }

    #[test]
    fn test_double_binding_keeps_last_supply() {
        // rewired mid-run: supply 1 early, supply 3 late, both while open
        let mut series = series_with(
            6,
            1,
            &[
                ("PC Source 4 Loaded Target", &[9.0; 6]),
                ("PC Source 4 Shutter Open", &[1.0, 1.0, 0.0, 0.0, 1.0, 1.0]),
                ("PC Source 4 Switch-PDC-PWS1", &[1.0, 1.0, 0.0, 0.0, 0.0, 0.0]),
                ("PC Source 4 Switch-RF1-PWS2", &[0.0; 6]),
                ("PC Source 4 Switch-RF2-PWS3", &[0.0, 0.0, 0.0, 0.0, 1.0, 1.0]),
                ("Power Supply 1 Current", &[0.4; 6]),
                ("Power Supply 3 Current", &[0.9; 6]),
            ],
        );
        bind_sources_to_supplies(&mut series, &[4]);
        // supply 3 is copied after supply 1, so its values win
        assert_eq!(series.numeric("Source 4 Current").unwrap(), &[0.9; 6]);
    }
}
