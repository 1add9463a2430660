use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::error::ConfigError;

/// All tunable thresholds of the segmentation engine in one place.
///
/// Every condition builder and parameter extractor reads its magic numbers
/// from here, so a test suite can perturb them without touching logic. The
/// defaults are the values the chamber has been operated with.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Current (A) above which a dc plasma is considered on
    pub current_threshold: f64,
    /// Bias (V) above which an rf plasma is considered on
    pub bias_threshold: f64,
    /// Forward minus reflected power (W) above which a plasma is considered
    /// on when neither current nor bias is usable
    pub power_fwd_refl_threshold: f64,
    /// Output setpoint rise (W) per sample above which a source is ramping
    pub power_setpoint_diff_threshold: f64,
    /// Setpoint rise (degC) per sample above which the substrate is ramping
    pub temp_setpoint_diff_threshold: f64,
    /// Zone temperatures (degC) above which the cracker is considered on
    pub cracker_zone1_min_temp: f64,
    pub cracker_zone2_min_temp: f64,
    pub cracker_zone3_min_temp: f64,
    /// Setpoint (degC) below which the deposition counts as room temperature
    pub rt_temp_threshold: f64,
    /// Settle window (s) after the Xtal 2 shutter opens before QCM readings count
    pub qcm_stab_time_secs: u32,
    /// Flow (sccm) above which an MFC is considered flowing; doubles as the
    /// absolute tolerance band around a zero reference mean
    pub mfc_flow_threshold: f64,
    /// Percent of deposition rows averaged for the start/end voltage
    pub fraq_rows_avg_voltage: f64,
    /// Max in-domain gap, in average timesteps
    pub continuity_limit: u32,
    /// Escalated gap limit used to bridge instrumentation gaps inside a
    /// single real deposition
    pub deposition_continuity_limit: u32,
    /// Domains shorter than this many average timesteps are noise
    pub min_domain_size: u32,
    /// Deposition-specific domain floor applied during disambiguation
    pub deposition_min_domain_size: u32,
    /// Row count below which temperature-control data is a sensor glitch
    pub min_temp_ctrl_size: usize,
    /// Pressure (Torr) ceiling for a credible base-pressure reading
    pub max_base_pressure: f64,
    /// Percent band for "same as during deposition" comparisons
    pub tolerance_band_pct: f64,
    /// Fraction of deposition samples an indicator must hold to classify
    /// the plasma type
    pub plasma_frac_tolerance: f64,
    /// Nominal concentration of PH3/H2S in their Ar-diluted supplies
    pub diluted_gas_fraction: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            current_threshold: 0.01,
            bias_threshold: 0.01,
            power_fwd_refl_threshold: 10.0,
            power_setpoint_diff_threshold: 0.01,
            temp_setpoint_diff_threshold: 0.11,
            cracker_zone1_min_temp: 70.0,
            cracker_zone2_min_temp: 150.0,
            cracker_zone3_min_temp: 200.0,
            rt_temp_threshold: 30.0,
            qcm_stab_time_secs: 30,
            mfc_flow_threshold: 1.0,
            fraq_rows_avg_voltage: 5.0,
            continuity_limit: 10,
            deposition_continuity_limit: 200,
            min_domain_size: 3,
            deposition_min_domain_size: 10,
            min_temp_ctrl_size: 10,
            max_base_pressure: 1e-6,
            tolerance_band_pct: 10.0,
            plasma_frac_tolerance: 0.85,
            diluted_gas_fraction: 0.1,
        }
    }
}

/// Structure representing the application configuration. Contains pathing and
/// threshold information.
/// Configs are serializable and deserializable to YAML using serde and serde_yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// A single log file or a directory of log files
    pub log_path: PathBuf,
    /// Where report files go; defaults to `<log dir>/derived_quantities`
    pub report_dir: Option<PathBuf>,
    pub write_text_report: bool,
    pub write_yaml_report: bool,
    #[serde(default)]
    pub settings: Settings,
}

impl Default for Config {
    /// Generate a new Config object. The path field will be empty/invalid
    fn default() -> Self {
        Self {
            log_path: PathBuf::from("None"),
            report_dir: None,
            write_text_report: true,
            write_yaml_report: true,
            settings: Settings::default(),
        }
    }
}

impl Config {
    /// Read the configuration in a YAML file
    /// Returns a Config if successful
    pub fn read_config_file(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::BadFilePath(config_path.to_path_buf()));
        }

        let yaml_str = std::fs::read_to_string(config_path)?;

        Ok(serde_yaml::from_str::<Self>(&yaml_str)?)
    }

    /// Directory the report files for a given log should be written to
    pub fn get_report_directory(&self, log_path: &Path) -> PathBuf {
        match &self.report_dir {
            Some(dir) => dir.clone(),
            None => log_path
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join("derived_quantities"),
        }
    }

    pub fn is_directory_run(&self) -> bool {
        self.log_path.is_dir()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_roundtrip() {
        let config = Config::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let back: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back.settings.continuity_limit, 10);
        assert_eq!(back.settings.deposition_continuity_limit, 200);
        assert!(back.write_text_report);
    }

    #[test]
    fn test_partial_settings_fall_back_to_defaults() {
        let yaml = "log_path: /tmp/run.CSV\nwrite_text_report: true\nwrite_yaml_report: false\nsettings:\n  continuity_limit: 25\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.settings.continuity_limit, 25);
        assert_eq!(config.settings.min_domain_size, 3);
        assert!(!config.write_yaml_report);
    }
}
