//! Core data types for the thermal control plane.
//!
//! Defines the primary data structures described in the data model:
//! sensors, drive monitors, fan curves, fan profiles, fan walls, and
//! powerboards.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::constants::SENSOR_HISTORY_CAPACITY;

/// Display buckets the UI groups sensors into. Purely presentational;
/// the core never reasons about groups except to render qualified names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SensorGroup {
    Cpu,
    Gpu,
    Storage,
    System,
    Other,
}

impl SensorGroup {
    /// Keyword classification against a display name. Advisory only; it
    /// never changes the reading.
    pub fn classify(display_name: &str) -> Self {
        let lower = display_name.to_lowercase();
        let has_any = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));
        if has_any(&["cpu", "core", "package"]) {
            SensorGroup::Cpu
        } else if has_any(&["gpu", "graphics", "radeon", "nvidia"]) {
            SensorGroup::Gpu
        } else if has_any(&["nvme", "ssd", "hdd", "drive"]) {
            SensorGroup::Storage
        } else if has_any(&["acpi", "thermal", "motherboard", "chipset", "vrm"]) {
            SensorGroup::System
        } else {
            SensorGroup::Other
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SensorGroup::Cpu => "CPU",
            SensorGroup::Gpu => "GPU",
            SensorGroup::Storage => "Storage",
            SensorGroup::System => "System",
            SensorGroup::Other => "Other",
        }
    }
}

/// A named, enabled/disabled temperature source with an opaque hardware
/// handle (a file path on Linux).
#[derive(Debug, Clone)]
pub struct Sensor {
    pub name: String,
    pub group: SensorGroup,
    pub handle: PathBuf,
    pub enabled: bool,
    pub last_reading: Option<f32>,
    pub last_updated: Option<u64>,
    history: VecDeque<f32>,
}

impl Sensor {
    pub fn new(name: impl Into<String>, handle: PathBuf) -> Self {
        let name = name.into();
        let group = SensorGroup::classify(&name);
        Self {
            name,
            group,
            handle,
            enabled: true,
            last_reading: None,
            last_updated: None,
            history: VecDeque::with_capacity(SENSOR_HISTORY_CAPACITY),
        }
    }

    /// External identifier used by curves: `"<Group>:<SensorName>"`.
    pub fn qualified_name(&self) -> String {
        format!("{}:{}", self.group.as_str(), self.name)
    }

    /// Records a successful read, pushing the bounded history ring.
    pub fn record_reading(&mut self, celsius: f32) {
        self.last_reading = Some(celsius);
        self.last_updated = Some(now_unix_secs());
        if self.history.len() == SENSOR_HISTORY_CAPACITY {
            self.history.pop_front();
        }
        self.history.push_back(celsius);
    }

    pub fn recent_readings(&self) -> impl Iterator<Item = &f32> {
        self.history.iter()
    }
}

fn now_unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Aggregation mode for a [`DriveMonitor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationMode {
    Average,
    Maximum,
}

/// A named aggregator over a subset of storage drives, publishing an
/// average or maximum of their reported temperatures as a sensor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriveMonitor {
    pub name: String,
    pub aggregation_mode: AggregationMode,
    pub curve_id: String,
    pub selected_drive_hashes: Vec<u64>,
    pub enabled: bool,
    #[serde(default)]
    pub min_temp: Option<f32>,
    #[serde(default)]
    pub max_temp: Option<f32>,
    #[serde(default)]
    pub last_updated: Option<u64>,
}

impl DriveMonitor {
    /// The qualified name this monitor publishes its aggregate under.
    pub fn qualified_name(&self) -> String {
        format!("Drives.{}", self.name)
    }

    /// Strips the `Drives.` prefix from a qualified drive-monitor name.
    pub fn display_name_from_qualified(qualified: &str) -> Option<&str> {
        qualified.strip_prefix("Drives.")
    }
}

/// One (temperature, fan-percent) control point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    pub temperature: f32,
    pub fan_percent: f32,
}

impl CurvePoint {
    pub fn new(temperature: f32, fan_percent: f32) -> Self {
        Self {
            temperature,
            fan_percent,
        }
    }
}

/// A stable id, display name, optional sensor reference, and an ordered
/// sequence of control points.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FanCurve {
    pub id: String,
    pub name: String,
    /// Qualified sensor name (`Group:Sensor`) or drive-monitor name
    /// (`Drives.Name`); `None` if unbound.
    pub sensor: Option<String>,
    pub points: Vec<CurvePoint>,
}

/// A stable id, display name, and a set of curves keyed by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FanProfile {
    pub id: String,
    pub name: String,
    pub curves: Vec<FanCurve>,
}

/// Operating mode of a [`FanWall`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WallMode {
    Manual,
    Profile,
}

/// A logical output wired to one PWM row on one powerboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FanWall {
    pub wall_id: u8,
    pub name: String,
    pub mode: WallMode,
    pub assigned_profile: Option<String>,
    /// Last PWM percent actually applied to the board.
    pub last_applied: u8,
    /// Target PWM percent for the next reconciliation.
    pub target: u8,
    /// Fields this version doesn't know about yet. Preserved verbatim
    /// across a load/save cycle instead of being silently dropped.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Hardware/firmware revision and location of a powerboard, plus the
/// last readings pulled from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Powerboard {
    pub location: u8,
    pub hardware_revision: String,
    pub firmware_version: String,
    /// Last PWM triple persisted to the board's non-volatile memory.
    pub saved_pwm: (u8, u8, u8),
    /// Currently-applied PWM triple.
    pub current_pwm: (u8, u8, u8),
    pub last_tach_rpm: (u32, u32, u32),
    pub last_wattage: [f32; 4],
}

impl Powerboard {
    pub fn adc_calibration(&self) -> Option<(f32, f32)> {
        fanwall_protocol::adc_calibration_for(&self.hardware_revision)
    }

    pub fn is_hw_2_2(&self) -> bool {
        self.hardware_revision.starts_with("2.2")
    }

    /// Calibrates four raw shunt ADC readings into watts for this
    /// board's hardware revision. Unknown revisions pass the raw
    /// readings through uncalibrated rather than guessing a curve.
    pub fn decode_wattage(&self, raw: [f32; 4]) -> [f32; 4] {
        if self.is_hw_2_2() {
            fanwall_protocol::decode_wattage_hw22(raw).map(|w| w as f32)
        } else if let Some((slope, intercept)) = self.adc_calibration() {
            fanwall_protocol::decode_wattage_linear(raw, slope, intercept)
        } else {
            raw
        }
    }
}
