use std::path::Path;

use time::format_description::FormatItem;
use time::macros::format_description;
use time::PrimitiveDateTime;

use super::channels;
use super::error::LogFileError;
use super::time_series::{Column, TimeSeries};

/// The fixed timestamp format of the chamber logger,
/// e.g. `Jun-07-2024 10:46:17.123456 AM`.
const TIMESTAMP_FORMAT: &[FormatItem<'_>] = format_description!(
    "[month repr:short]-[day]-[year] [hour repr:12]:[minute]:[second].[subsecond] [period]"
);

/// Read a chamber log CSV into a time series.
///
/// The file layout is: a header row with channel names, a units-only row
/// (skipped), then data rows. The series comes back tz-naive with the legacy
/// cracker columns renamed to their canonical names.
pub fn load(path: &Path) -> Result<TimeSeries, LogFileError> {
    if !path.exists() {
        return Err(LogFileError::BadFilePath(path.to_path_buf()));
    }
    let contents = std::fs::read_to_string(path)?;
    let mut series = parse(&contents).map_err(|e| match e {
        // attach the path to the generic empty-input error
        LogFileError::EmptyFile(_) => LogFileError::EmptyFile(path.to_path_buf()),
        other => other,
    })?;
    rename_legacy_cracker_columns(&mut series);
    spdlog::info!(
        "Loaded {} samples across {} channels from {:?}",
        series.len(),
        series.column_names().len(),
        path.file_name().unwrap_or_default()
    );
    Ok(series)
}

/// Parse log text. Column types are inferred from the data: a column whose
/// non-empty cells all parse as numbers is numeric (empty cells become NaN),
/// anything else is text.
pub fn parse(contents: &str) -> Result<TimeSeries, LogFileError> {
    let mut lines = contents.lines();
    let header_line = lines.next().ok_or(LogFileError::EmptyFile(Default::default()))?;
    let header: Vec<&str> = header_line.split(',').map(str::trim).collect();
    let ts_col = header
        .iter()
        .position(|name| *name == channels::TIME_STAMP)
        .ok_or(LogFileError::MissingTimestampColumn)?;
    // units row
    lines.next();

    let mut cells: Vec<Vec<String>> = vec![Vec::new(); header.len()];
    let mut timestamps: Vec<PrimitiveDateTime> = Vec::new();
    for (row, line) in lines.enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        let stamp_text = fields.get(ts_col).copied().unwrap_or("");
        let stamp = PrimitiveDateTime::parse(stamp_text, TIMESTAMP_FORMAT).map_err(|e| {
            LogFileError::BadTimestamp {
                row,
                value: stamp_text.to_string(),
                source: e,
            }
        })?;
        timestamps.push(stamp);
        for (col, store) in cells.iter_mut().enumerate() {
            if col == ts_col {
                continue;
            }
            store.push(fields.get(col).copied().unwrap_or("").to_string());
        }
    }
    if timestamps.is_empty() {
        return Err(LogFileError::EmptyFile(Default::default()));
    }

    let mut columns: Vec<(String, Column)> = Vec::new();
    for (col, name) in header.iter().enumerate() {
        if col == ts_col || name.is_empty() {
            continue;
        }
        columns.push((name.to_string(), infer_column(&cells[col])));
    }

    Ok(TimeSeries::new(timestamps, columns)?)
}

fn infer_column(raw: &[String]) -> Column {
    let numeric = raw
        .iter()
        .all(|cell| cell.is_empty() || cell.parse::<f64>().is_ok());
    if numeric {
        Column::Numeric(
            raw.iter()
                .map(|cell| cell.parse::<f64>().unwrap_or(f64::NAN))
                .collect(),
        )
    } else {
        Column::Text(raw.to_vec())
    }
}

/// Logs written before 2024-08-12 misnamed the two cracker valve channels.
/// Rename legacy -> canonical if and only if the canonical name is absent;
/// a log carrying both is ambiguous legacy data and is left unrenamed.
pub fn rename_legacy_cracker_columns(series: &mut TimeSeries) {
    let pairs = [
        (
            channels::LEGACY_CRACKER_VALVE_SETPOINT,
            channels::CRACKER_VALVE_SETPOINT,
        ),
        (
            channels::LEGACY_CRACKER_PULSE_WIDTH,
            channels::CRACKER_PULSE_WIDTH,
        ),
    ];
    for (legacy, canonical) in pairs {
        if !series.has_column(legacy) {
            continue;
        }
        if series.has_column(canonical) {
            spdlog::warn!(
                "Log carries both {legacy:?} and {canonical:?}; leaving the legacy column alone"
            );
        } else {
            series.rename_column(legacy, canonical);
        }
    }
}

/// Sample name convention: the first three `_`-separated tokens of the log
/// file stem.
pub fn sample_name(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    stem.split('_').take(3).collect::<Vec<_>>().join("_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use time::macros::datetime;

    const SMALL_LOG: &str = "\
Time Stamp,PC Capman Pressure,Thickness Active Material
,mTorr,
Jun-07-2024 10:46:17.000000 AM,5.2,Sulfur
Jun-07-2024 10:46:18.000000 AM,5.3,Sulfur
Jun-07-2024 12:00:00.500000 PM,5.4,Copper
";

    #[test]
    fn test_parse_small_log() {
        let series = parse(SMALL_LOG).unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(
            series.timestamps()[0],
            datetime!(2024-06-07 10:46:17)
        );
        assert_eq!(
            series.timestamps()[2],
            datetime!(2024-06-07 12:00:00.5)
        );
        assert_eq!(series.numeric("PC Capman Pressure").unwrap()[1], 5.3);
        assert_eq!(
            series.text("Thickness Active Material").unwrap()[2],
            "Copper"
        );
    }

    #[test]
    fn test_bad_timestamp_is_reported_with_row() {
        let text = "\
Time Stamp,V
,V
2024-06-07 10:46:17,1.0
";
        match parse(text) {
            Err(LogFileError::BadTimestamp { row, .. }) => assert_eq!(row, 0),
            other => panic!("expected BadTimestamp, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_timestamp_column() {
        let text = "A,B\n,\n1,2\n";
        assert!(matches!(
            parse(text),
            Err(LogFileError::MissingTimestampColumn)
        ));
    }

    #[test]
    fn test_empty_cell_becomes_nan() {
        let text = "\
Time Stamp,Flow
,sccm
Jun-07-2024 10:00:00.000000 AM,
Jun-07-2024 10:00:01.000000 AM,2.5
";
        let series = parse(text).unwrap();
        let flow = series.numeric("Flow").unwrap();
        assert!(flow[0].is_nan());
        assert_eq!(flow[1], 2.5);
    }

    #[test]
    fn test_legacy_cracker_columns_renamed_when_canonical_absent() {
        let text = "\
Time Stamp,Sulfur Cracker Control Valve Setpoint,Sulfur Cracker Control Valve PulseWidth Setpoint
,,
Jun-07-2024 10:00:00.000000 AM,4.0,80.0
Jun-07-2024 10:00:01.000000 AM,4.0,80.0
";
        let mut series = parse(text).unwrap();
        rename_legacy_cracker_columns(&mut series);
        assert!(series.has_column(channels::CRACKER_VALVE_SETPOINT));
        assert!(series.has_column(channels::CRACKER_PULSE_WIDTH));
        assert!(!series.has_column(channels::LEGACY_CRACKER_VALVE_SETPOINT));
    }

    #[test]
    fn test_ambiguous_cracker_columns_left_alone() {
        let text = "\
Time Stamp,Sulfur Cracker Control Valve Setpoint,Sulfur Cracker Control Valve Setpoint Feedback
,,
Jun-07-2024 10:00:00.000000 AM,4.0,4.1
";
        let mut series = parse(text).unwrap();
        rename_legacy_cracker_columns(&mut series);
        assert!(series.has_column(channels::LEGACY_CRACKER_VALVE_SETPOINT));
        assert!(series.has_column(channels::CRACKER_VALVE_SETPOINT));
    }

    #[test]
    fn test_sample_name_takes_first_three_tokens() {
        let path = PathBuf::from(
            "/data/mittma_0015_Cu_Recording Set 2024.08.02-10.52.28.CSV",
        );
        assert_eq!(sample_name(&path), "mittma_0015_Cu");
    }
}
