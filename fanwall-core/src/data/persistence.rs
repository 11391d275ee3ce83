//! JSON persistence for the four logical configuration documents.
//!
//! Writes are whole-document replace, atomic via temp-file-then-rename.
//! Readers tolerate a missing file by producing (and writing back) a
//! default document. Bursts of edits are collapsed by [`ConfigStore`]
//! into at most one write per [`crate::constants::CONFIG_SAVE_DEBOUNCE`];
//! callers that need to bypass debouncing call `save_immediate` directly.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::constants::paths;
use crate::data::ids::{generate_id, is_valid_id};
use crate::data::types::{DriveMonitor, FanProfile, FanWall};
use crate::error::{FanwallError, Result};

/// Chassis/layout document: product metadata, display options, unit
/// preference, per-row default PWMs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChassisLayoutDoc {
    #[serde(default)]
    pub product: String,
    #[serde(default)]
    pub temperature_unit: TemperatureUnit,
    #[serde(default)]
    pub dialogs_seen: HashMap<String, bool>,
    #[serde(default)]
    pub default_pwm_percent: [u8; 3],
    /// Fields this version doesn't know about yet. Preserved verbatim
    /// across a load/save cycle instead of being silently dropped.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for ChassisLayoutDoc {
    fn default() -> Self {
        Self {
            product: String::new(),
            temperature_unit: TemperatureUnit::Celsius,
            dialogs_seen: HashMap::new(),
            default_pwm_percent: [50, 50, 50],
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    Celsius,
    Fahrenheit,
}

impl Default for TemperatureUnit {
    fn default() -> Self {
        TemperatureUnit::Celsius
    }
}

/// Fan profiles document: profiles keyed by id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FanProfilesDoc {
    #[serde(default)]
    pub profiles: HashMap<String, FanProfile>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Temperature sensors document: group enable flags and drive monitors
/// keyed by curve-id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemperatureSensorsDoc {
    #[serde(default)]
    pub sensor_groups: HashMap<String, bool>,
    #[serde(default)]
    pub drive_monitors: HashMap<String, DriveMonitor>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Fan control service state document: wall mode/profile bindings and
/// the automatic-control flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FanServiceStateDoc {
    #[serde(default)]
    pub automatic_control_enabled: bool,
    #[serde(default = "default_automatic_update_interval")]
    pub automatic_update_interval: f32,
    #[serde(default)]
    pub fan_wall_service_active: bool,
    #[serde(default)]
    pub fan_walls: HashMap<String, FanWall>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_automatic_update_interval() -> f32 {
    2.0
}

impl Default for FanServiceStateDoc {
    fn default() -> Self {
        Self {
            automatic_control_enabled: true,
            automatic_update_interval: default_automatic_update_interval(),
            fan_wall_service_active: true,
            fan_walls: HashMap::new(),
            extra: Map::new(),
        }
    }
}

fn document_path(file_name: &str) -> PathBuf {
    paths::config_dir().join(file_name)
}

/// Loads a document, tolerating a missing file by writing back (and
/// returning) the default.
fn load_document<T>(path: &Path) -> Result<T>
where
    T: Default + Serialize + DeserializeOwned,
{
    if !path.exists() {
        debug!("no document at {:?}, writing default", path);
        let doc = T::default();
        save_immediate(path, &doc)?;
        return Ok(doc);
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        FanwallError::config_load(path.display().to_string(), e.to_string())
    })?;

    match serde_json::from_str(&contents) {
        Ok(doc) => Ok(doc),
        Err(e) => {
            warn!("failed to parse {:?}: {}, recovering with default", path, e);
            let doc = T::default();
            save_immediate(path, &doc)?;
            Ok(doc)
        }
    }
}

/// Writes a document atomically: serialize, write to a sibling temp
/// path, fsync, rename over the target.
pub fn save_immediate<T: Serialize>(path: &Path, doc: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| FanwallError::ConfigWrite { path: path.display().to_string(), reason: e.to_string() })?;
    }

    let json = serde_json::to_string_pretty(doc).map_err(|e| FanwallError::JsonParse {
        path: path.display().to_string(),
        source: e,
    })?;

    let temp_path = path.with_extension("json.tmp");
    let mut file = fs::File::create(&temp_path)
        .map_err(|e| FanwallError::ConfigWrite { path: temp_path.display().to_string(), reason: e.to_string() })?;
    file.write_all(json.as_bytes())
        .map_err(|e| FanwallError::ConfigWrite { path: temp_path.display().to_string(), reason: e.to_string() })?;
    file.sync_all()
        .map_err(|e| FanwallError::ConfigWrite { path: temp_path.display().to_string(), reason: e.to_string() })?;
    drop(file);

    fs::rename(&temp_path, path)
        .map_err(|e| FanwallError::ConfigWrite { path: path.display().to_string(), reason: e.to_string() })?;

    debug!("saved document to {:?}", path);
    Ok(())
}

fn migrate_fan_profiles(doc: &mut FanProfilesDoc) -> bool {
    let mut changed = false;
    let ids: Vec<String> = doc.profiles.keys().cloned().collect();
    for key in ids {
        let needs_new_id = doc.profiles[&key].id.is_empty() || !is_valid_id(&doc.profiles[&key].id);
        if needs_new_id {
            let mut profile = doc.profiles.remove(&key).unwrap();
            profile.id = generate_id();
            for curve in profile.curves.iter_mut() {
                if curve.id.is_empty() || !is_valid_id(&curve.id) {
                    curve.id = generate_id();
                }
            }
            doc.profiles.insert(profile.id.clone(), profile);
            changed = true;
        }
    }
    changed
}

/// Rekeys drive-monitor maps whose keys look like legacy display names
/// rather than the curve-id carried in the record.
fn migrate_drive_monitors(doc: &mut TemperatureSensorsDoc) -> bool {
    let mut changed = false;
    let keys: Vec<String> = doc.drive_monitors.keys().cloned().collect();
    for key in keys {
        let monitor = &doc.drive_monitors[&key];
        if monitor.curve_id != key && !monitor.curve_id.is_empty() {
            let monitor = doc.drive_monitors.remove(&key).unwrap();
            let curve_id = monitor.curve_id.clone();
            doc.drive_monitors.insert(curve_id, monitor);
            changed = true;
        }
    }
    changed
}

pub fn load_chassis_layout() -> Result<ChassisLayoutDoc> {
    load_document(&document_path(paths::CHASSIS_LAYOUT_FILE))
}

pub fn save_chassis_layout(doc: &ChassisLayoutDoc) -> Result<()> {
    save_immediate(&document_path(paths::CHASSIS_LAYOUT_FILE), doc)
}

pub fn load_fan_profiles() -> Result<FanProfilesDoc> {
    let path = document_path(paths::FAN_PROFILES_FILE);
    let mut doc: FanProfilesDoc = load_document(&path)?;
    if migrate_fan_profiles(&mut doc) {
        info!("migrated fan profile ids at {:?}", path);
        save_immediate(&path, &doc)?;
    }
    Ok(doc)
}

pub fn save_fan_profiles(doc: &FanProfilesDoc) -> Result<()> {
    save_immediate(&document_path(paths::FAN_PROFILES_FILE), doc)
}

pub fn load_temperature_sensors() -> Result<TemperatureSensorsDoc> {
    let path = document_path(paths::TEMPERATURE_SENSORS_FILE);
    let mut doc: TemperatureSensorsDoc = load_document(&path)?;
    if migrate_drive_monitors(&mut doc) {
        info!("rekeyed legacy drive monitors at {:?}", path);
        save_immediate(&path, &doc)?;
    }
    Ok(doc)
}

pub fn save_temperature_sensors(doc: &TemperatureSensorsDoc) -> Result<()> {
    save_immediate(&document_path(paths::TEMPERATURE_SENSORS_FILE), doc)
}

pub fn load_fan_service_state() -> Result<FanServiceStateDoc> {
    load_document(&document_path(paths::FAN_SERVICE_STATE_FILE))
}

pub fn save_fan_service_state(doc: &FanServiceStateDoc) -> Result<()> {
    save_immediate(&document_path(paths::FAN_SERVICE_STATE_FILE), doc)
}

/// Tracks a debounce window for a single document so bursts of edits
/// collapse into at most one write per [`crate::constants::CONFIG_SAVE_DEBOUNCE`].
/// The scheduler calls [`DebounceGate::poll`] each tick; it returns true
/// at most once per window after [`DebounceGate::mark_dirty`] was called.
#[derive(Debug, Default)]
pub struct DebounceGate {
    dirty_since: Option<Instant>,
}

impl DebounceGate {
    pub fn mark_dirty(&mut self) {
        if self.dirty_since.is_none() {
            self.dirty_since = Some(Instant::now());
        }
    }

    /// Returns true (and clears the flag) if a debounced write is due.
    pub fn poll(&mut self) -> bool {
        match self.dirty_since {
            Some(since) if since.elapsed() >= crate::constants::CONFIG_SAVE_DEBOUNCE => {
                self.dirty_since = None;
                true
            }
            _ => false,
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty_since.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::types::{AggregationMode, CurvePoint};
    use tempfile::tempdir;

    fn sample_profile() -> FanProfile {
        FanProfile {
            id: generate_id(),
            name: "Test".to_string(),
            curves: vec![crate::data::types::FanCurve {
                id: generate_id(),
                name: "CPU".to_string(),
                sensor: Some("CPU:Package".to_string()),
                points: vec![CurvePoint::new(30.0, 20.0), CurvePoint::new(80.0, 100.0)],
            }],
        }
    }

    #[test]
    fn atomic_write_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("profiles.json");
        let mut doc = FanProfilesDoc::default();
        let profile = sample_profile();
        doc.profiles.insert(profile.id.clone(), profile);

        save_immediate(&path, &doc).unwrap();
        let loaded: FanProfilesDoc = load_document(&path).unwrap();
        assert_eq!(loaded.profiles.len(), 1);
    }

    #[test]
    fn unknown_fields_survive_a_save_load_cycle() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sensors.json");

        let raw = serde_json::json!({
            "sensor_groups": {},
            "drive_monitors": {},
            "version": 3,
            "last_saved": "2026-01-01T00:00:00Z",
        });
        fs::write(&path, serde_json::to_string(&raw).unwrap()).unwrap();

        let doc: TemperatureSensorsDoc = load_document(&path).unwrap();
        assert_eq!(doc.extra.get("version"), Some(&Value::from(3)));
        assert_eq!(doc.extra.get("last_saved"), Some(&Value::from("2026-01-01T00:00:00Z")));

        save_immediate(&path, &doc).unwrap();
        let reloaded: TemperatureSensorsDoc = load_document(&path).unwrap();
        assert_eq!(reloaded.extra.get("version"), Some(&Value::from(3)));
        assert_eq!(
            reloaded.extra.get("last_saved"),
            Some(&Value::from("2026-01-01T00:00:00Z"))
        );
    }

    #[test]
    fn unknown_fan_wall_fields_survive_a_save_load_cycle() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("service_state.json");

        let raw = serde_json::json!({
            "automatic_control_enabled": true,
            "automatic_update_interval": 2.0,
            "fan_wall_service_active": true,
            "fan_walls": {
                "1": {
                    "wall_id": 1,
                    "name": "Wall 1",
                    "mode": "manual",
                    "assigned_profile": null,
                    "last_applied": 40,
                    "target": 40,
                    "current_speed": 41,
                }
            },
        });
        fs::write(&path, serde_json::to_string(&raw).unwrap()).unwrap();

        let doc: FanServiceStateDoc = load_document(&path).unwrap();
        let wall = &doc.fan_walls["1"];
        assert_eq!(wall.extra.get("current_speed"), Some(&Value::from(41)));

        save_immediate(&path, &doc).unwrap();
        let reloaded: FanServiceStateDoc = load_document(&path).unwrap();
        assert_eq!(
            reloaded.fan_walls["1"].extra.get("current_speed"),
            Some(&Value::from(41))
        );
    }

    #[test]
    fn missing_file_yields_default_and_persists_it() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.json");
        let doc: FanProfilesDoc = load_document(&path).unwrap();
        assert!(doc.profiles.is_empty());
        assert!(path.exists());
    }

    #[test]
    fn migrates_legacy_drive_monitor_keys() {
        let mut doc = TemperatureSensorsDoc::default();
        doc.drive_monitors.insert(
            "Drive Temperature Monitor".to_string(),
            DriveMonitor {
                name: "Drive Temperature Monitor".to_string(),
                aggregation_mode: AggregationMode::Average,
                curve_id: "abcdef01-0000-4000-8000-000000000000".to_string(),
                selected_drive_hashes: vec![],
                enabled: true,
                min_temp: None,
                max_temp: None,
                last_updated: None,
            },
        );
        assert!(migrate_drive_monitors(&mut doc));
        assert!(doc
            .drive_monitors
            .contains_key("abcdef01-0000-4000-8000-000000000000"));
    }

    #[test]
    fn debounce_gate_fires_once_after_window() {
        let mut gate = DebounceGate::default();
        assert!(!gate.poll());
        gate.mark_dirty();
        assert!(!gate.poll());
        std::thread::sleep(crate::constants::CONFIG_SAVE_DEBOUNCE + std::time::Duration::from_millis(10));
        assert!(gate.poll());
        assert!(!gate.poll());
    }
}
