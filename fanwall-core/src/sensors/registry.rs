//! Host temperature sensor enumeration, reading, and classification.
//!
//! - **Temperature**: `/sys/class/hwmon/*/tempN_input` (millidegrees
//!   Celsius) and `/sys/class/thermal/thermal_zone*/temp`.
//!
//! Enumeration is cached for [`crate::constants::SENSOR_ENUMERATION_CACHE_TTL`];
//! a read attempt never fabricates a value — a missing or unparseable
//! handle yields "unavailable", never a crash.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{trace, warn};

use crate::constants::SENSOR_ENUMERATION_CACHE_TTL;
use crate::data::Sensor;

const HWMON_BASE: &str = "/sys/class/hwmon";
const THERMAL_ZONE_BASE: &str = "/sys/class/thermal";
const MILLIDEGREE_DIVISOR: f32 = 1000.0;

/// Enumerates and caches host temperature sources, and reads current
/// values on demand.
pub struct SensorRegistry {
    sensors: HashMap<String, Sensor>,
    last_enumerated: Option<Instant>,
}

impl Default for SensorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorRegistry {
    pub fn new() -> Self {
        Self {
            sensors: HashMap::new(),
            last_enumerated: None,
        }
    }

    /// Re-enumerates if the cache has expired, or if `force` is set.
    pub fn refresh(&mut self, force: bool) {
        let expired = self
            .last_enumerated
            .map(|t| t.elapsed() >= SENSOR_ENUMERATION_CACHE_TTL)
            .unwrap_or(true);
        if !force && !expired {
            return;
        }
        let discovered = enumerate();
        // Preserve existing sensor state (enabled flag, history) for
        // handles that are still present; only add/remove entries.
        let mut next = HashMap::with_capacity(discovered.len());
        for (name, handle) in discovered {
            if let Some(mut existing) = self.sensors.remove(&name) {
                existing.handle = handle;
                next.insert(name, existing);
            } else {
                next.insert(name.clone(), Sensor::new(name, handle));
            }
        }
        self.sensors = next;
        self.last_enumerated = Some(Instant::now());
    }

    /// Reads every enabled sensor's current value, recording the
    /// successful ones. Call once per tick for a consistent snapshot.
    pub fn read_all(&mut self) {
        for sensor in self.sensors.values_mut() {
            if !sensor.enabled {
                continue;
            }
            match read_handle(&sensor.handle) {
                Some(celsius) => sensor.record_reading(celsius),
                None => trace!(handle = ?sensor.handle, "sensor handle unavailable"),
            }
        }
    }

    /// Looks up a sensor by its qualified name (`Group:Sensor`).
    pub fn current(&self, qualified_name: &str) -> Option<f32> {
        self.sensors
            .values()
            .find(|s| s.qualified_name() == qualified_name)
            .and_then(|s| s.last_reading)
    }

    pub fn all(&self) -> impl Iterator<Item = &Sensor> {
        self.sensors.values()
    }

    pub fn set_enabled(&mut self, name: &str, enabled: bool) {
        if let Some(sensor) = self.sensors.get_mut(name) {
            sensor.enabled = enabled;
        }
    }
}

fn enumerate() -> Vec<(String, PathBuf)> {
    let mut found = Vec::new();
    found.extend(enumerate_hwmon());
    found.extend(enumerate_thermal_zones());
    found
}

fn enumerate_hwmon() -> Vec<(String, PathBuf)> {
    let base = Path::new(HWMON_BASE);
    let Ok(entries) = fs::read_dir(base) else {
        return Vec::new();
    };
    let mut found = Vec::new();
    for entry in entries.flatten() {
        let chip_path = entry.path();
        let chip_name = fs::read_to_string(chip_path.join("name"))
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|_| chip_path.file_name().unwrap().to_string_lossy().to_string());

        let Ok(files) = fs::read_dir(&chip_path) else {
            continue;
        };
        for file in files.flatten() {
            let file_name = file.file_name();
            let file_name = file_name.to_string_lossy();
            if file_name.starts_with("temp") && file_name.ends_with("_input") {
                let base_name = file_name.trim_end_matches("_input");
                let label_path = chip_path.join(format!("{base_name}_label"));
                let label = fs::read_to_string(&label_path)
                    .ok()
                    .map(|s| s.trim().to_string());
                let display_name = label.unwrap_or_else(|| format!("{chip_name} {base_name}"));
                found.push((display_name, chip_path.join(file_name.as_ref())));
            }
        }
    }
    found
}

fn enumerate_thermal_zones() -> Vec<(String, PathBuf)> {
    let base = Path::new(THERMAL_ZONE_BASE);
    let Ok(entries) = fs::read_dir(base) else {
        return Vec::new();
    };
    let mut found = Vec::new();
    for entry in entries.flatten() {
        let zone_path = entry.path();
        let label = fs::read_to_string(zone_path.join("type"))
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|_| zone_path.file_name().unwrap().to_string_lossy().to_string());
        let temp_path = zone_path.join("temp");
        if temp_path.exists() {
            found.push((label, temp_path));
        }
    }
    found
}

fn read_handle(path: &Path) -> Option<f32> {
    match fs::read_to_string(path) {
        Ok(contents) => contents
            .trim()
            .parse::<i32>()
            .map(|millidegrees| millidegrees as f32 / MILLIDEGREE_DIVISOR)
            .ok(),
        Err(e) => {
            warn!(path = ?path, error = %e, "sensor handle no longer resolvable");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SensorGroup;

    #[test]
    fn classifies_cpu_sensor() {
        assert_eq!(SensorGroup::classify("CPU Package"), SensorGroup::Cpu);
    }

    #[test]
    fn classifies_storage_sensor() {
        assert_eq!(SensorGroup::classify("nvme0"), SensorGroup::Storage);
    }

    #[test]
    fn unknown_sensor_is_other() {
        assert_eq!(SensorGroup::classify("mystery"), SensorGroup::Other);
    }

    #[test]
    fn missing_handle_reads_as_none() {
        assert_eq!(read_handle(Path::new("/nonexistent/path/for/test")), None);
    }
}
