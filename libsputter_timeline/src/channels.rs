//! Canonical channel names of the chamber log format.
//!
//! The raw column namespace drifts across log format versions; everything
//! the engine reads goes through these constants so a format change is a
//! one-file fix.

pub const TIME_STAMP: &str = "Time Stamp";

pub const SUBSTRATE_SHUTTER_OPEN: &str = "PC Substrate Shutter Open";
pub const SUBSTRATE_HEATER_TEMP: &str = "Substrate Heater Temperature";
pub const SUBSTRATE_HEATER_TEMP_2: &str = "Substrate Heater Temperature 2";
pub const SUBSTRATE_HEATER_SETPOINT: &str = "Substrate Heater Temperature Setpoint";
pub const TEMP_CTRL_ENABLED: &str = "Temperature Control Enabled";
pub const SUBSTRATE_ROTATION_POSITION: &str = "Substrate Rotation_Position";

pub const CAPMAN_PRESSURE: &str = "PC Capman Pressure";
pub const WIDE_RANGE_GAUGE: &str = "PC Wide Range Gauge";

pub const CRACKER_ZONE1_TEMP: &str = "Sulfur Cracker Zone 1 Current Temperature";
pub const CRACKER_ZONE2_TEMP: &str = "Sulfur Cracker Zone 2 Current Temperature";
pub const CRACKER_ZONE3_TEMP: &str = "Sulfur Cracker Zone 3 Current Temperature";
pub const CRACKER_CONTROL_ENABLED: &str = "Sulfur Cracker Control Enabled";
pub const CRACKER_VALVE_SETPOINT: &str = "Sulfur Cracker Control Valve Setpoint Feedback";
pub const CRACKER_PULSE_WIDTH: &str =
    "Sulfur Cracker Control Valve PulseWidth Setpoint Feedback";
/// Pre-2024-08-12 logs wrote the valve channels without the Feedback suffix.
pub const LEGACY_CRACKER_VALVE_SETPOINT: &str = "Sulfur Cracker Control Valve Setpoint";
pub const LEGACY_CRACKER_PULSE_WIDTH: &str =
    "Sulfur Cracker Control Valve PulseWidth Setpoint";

pub const XTAL2_SHUTTER_OPEN: &str = "Xtal 2 Shutter Open";
pub const THICKNESS_RATE: &str = "Thickness Rate";
pub const THICKNESS_ACTIVE_MATERIAL: &str = "Thickness Active Material";

pub const MFC_AR_SETPOINT: &str = "PC MFC 1 Setpoint";
pub const MFC_AR_FLOW: &str = "PC MFC 1 Flow";
pub const MFC_PH3_SETPOINT: &str = "PC MFC 4 Setpoint";
pub const MFC_PH3_FLOW: &str = "PC MFC 4 Flow";
pub const MFC_H2S_SETPOINT: &str = "PC MFC 6 Setpoint";
pub const MFC_H2S_FLOW: &str = "PC MFC 6 Flow";

/// Power-supply signals that get copied into a source's namespace once the
/// supply is bound to the source.
pub mod signal {
    pub const ENABLED: &str = "Enabled";
    pub const CURRENT: &str = "Current";
    pub const VOLTAGE: &str = "Voltage";
    pub const DC_BIAS: &str = "DC Bias";
    pub const OUTPUT_SETPOINT: &str = "Output Setpoint";
    pub const FWD_POWER: &str = "Fwd Power";
    pub const RFL_POWER: &str = "Rfl Power";
    pub const PULSE_ENABLED: &str = "Pulse Enabled";
    pub const PULSE_FREQUENCY: &str = "Pulse Frequency";
    pub const REVERSE_TIME: &str = "Reverse Time";
}

/// Chamber-fixed per-source channels ("PC Source 3 Shutter Open").
pub fn pc_source(source: u8, suffix: &str) -> String {
    format!("PC Source {source} {suffix}")
}

/// Logical per-source channels created by supply binding ("Source 3 Current").
pub fn source(source: u8, signal: &str) -> String {
    format!("Source {source} {signal}")
}

/// Raw per-supply channels ("Power Supply 2 DC Bias").
pub fn power_supply(supply: u8, signal: &str) -> String {
    format!("Power Supply {supply} {signal}")
}

/// Prefix of every channel belonging to one power supply.
pub fn power_supply_prefix(supply: u8) -> String {
    format!("Power Supply {supply} ")
}

/// Prefix of a source's logical namespace.
pub fn source_prefix(source: u8) -> String {
    format!("Source {source} ")
}
