use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TimeSeriesError {
    #[error("Column {name} has {found} values but the series has {expected} timestamps")]
    ColumnLengthMismatch {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("Timestamps are not sorted; sample {0} precedes its predecessor")]
    UnsortedTimestamps(usize),
}

#[derive(Debug, Error)]
pub enum LogFileError {
    #[error("Could not open log because file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Log file failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Log file {0:?} contains no data rows")]
    EmptyFile(PathBuf),
    #[error("Log file is missing the mandatory \"Time Stamp\" column")]
    MissingTimestampColumn,
    #[error("Could not parse timestamp {value:?} on data row {row}: {source}")]
    BadTimestamp {
        row: usize,
        value: String,
        source: time::error::Parse,
    },
    #[error("Log file produced an invalid series: {0}")]
    BadSeries(#[from] TimeSeriesError),
}

#[derive(Debug, Error)]
pub enum EventError {
    #[error("No deposition domain was found in the log")]
    DepositionNotFound,
    #[error(
        "Deposition could not be reduced to a single domain; {0} remain after size \
         filtering and continuity-limit escalation"
    )]
    DepositionUnicity(usize),
    #[error("The series has fewer than two samples; no events can be segmented")]
    SeriesTooShort,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Config failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Config failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
}

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("Loading log {path:?} failed: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: LogFileError,
    },
    #[error("Event segmentation failed for log {path:?}: {source}")]
    Segmentation {
        path: PathBuf,
        #[source]
        source: EventError,
    },
    #[error("Writing report for log {path:?} failed: {source}")]
    Report {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Processor failed to serialize the report to YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Processor failed due to configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Processor failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
}
