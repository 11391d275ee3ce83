//! Drive temperature aggregation (C3).

use crate::data::{AggregationMode, DriveMonitor};
use crate::drives::registry::DriveRegistry;

/// Each tick, reads the current °C of every selected drive that still
/// exists in the registry and has °C > 0. Publishes the aggregate, or
/// `None` ("unavailable") if the resulting set is empty.
///
/// `set_drives` (replacing `selected_drive_hashes`) followed by a second
/// identical `set_drives` is idempotent: this function does not mutate
/// `monitor`, and callers that only change membership without a read in
/// between leave `last_updated` untouched.
pub fn compute(monitor: &DriveMonitor, registry: &DriveRegistry) -> Option<f32> {
    let temps: Vec<f32> = monitor
        .selected_drive_hashes
        .iter()
        .filter_map(|&hash| registry.get(hash))
        .filter_map(|drive| drive.temp_celsius)
        .filter(|&t| t > 0.0)
        .collect();

    if temps.is_empty() {
        return None;
    }

    let value = match monitor.aggregation_mode {
        AggregationMode::Average => {
            let sum: f32 = temps.iter().sum();
            round_to_tenth(sum / temps.len() as f32)
        }
        AggregationMode::Maximum => temps.into_iter().fold(f32::MIN, f32::max),
    };
    Some(value)
}

fn round_to_tenth(v: f32) -> f32 {
    (v * 10.0).round() / 10.0
}

/// Creating a monitor for a curve that already has one replaces the
/// prior monitor (removal then insert) since binding is 1:1 with a
/// curve.
pub fn bind_to_curve(
    monitors: &mut std::collections::HashMap<String, DriveMonitor>,
    monitor: DriveMonitor,
) {
    monitors.insert(monitor.curve_id.clone(), monitor);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drives::registry::DriveRecord;
    use std::collections::HashMap;

    fn registry_with(temps: &[(u64, Option<f32>)]) -> DriveRegistry {
        let mut registry = DriveRegistry::new();
        let mut drives = HashMap::new();
        for (hash, temp) in temps {
            drives.insert(
                *hash,
                DriveRecord {
                    model: "Model".to_string(),
                    serial: "S".to_string(),
                    firmware: "F".to_string(),
                    capacity_bytes: 0,
                    rotation_rpm: None,
                    power_on_hours: None,
                    power_cycle_count: None,
                    temp_celsius: *temp,
                },
            );
        }
        registry.replace_all(drives);
        registry
    }

    fn monitor(mode: AggregationMode, hashes: Vec<u64>) -> DriveMonitor {
        DriveMonitor {
            name: "M".to_string(),
            aggregation_mode: mode,
            curve_id: "curve-1".to_string(),
            selected_drive_hashes: hashes,
            enabled: true,
            min_temp: None,
            max_temp: None,
            last_updated: None,
        }
    }

    #[test]
    fn s3_average_skips_missing() {
        let registry = registry_with(&[(1, Some(40.0)), (2, Some(50.0)), (3, None)]);
        let m = monitor(AggregationMode::Average, vec![1, 2, 3]);
        assert_eq!(compute(&m, &registry), Some(45.0));
    }

    #[test]
    fn s3_maximum() {
        let registry = registry_with(&[(1, Some(40.0)), (2, Some(50.0)), (3, None)]);
        let m = monitor(AggregationMode::Maximum, vec![1, 2, 3]);
        assert_eq!(compute(&m, &registry), Some(50.0));
    }

    #[test]
    fn empty_selection_is_unavailable() {
        let registry = registry_with(&[]);
        let m = monitor(AggregationMode::Average, vec![99]);
        assert_eq!(compute(&m, &registry), None);
    }

    #[test]
    fn zero_temperature_drives_are_excluded() {
        let registry = registry_with(&[(1, Some(0.0)), (2, Some(30.0))]);
        let m = monitor(AggregationMode::Average, vec![1, 2]);
        assert_eq!(compute(&m, &registry), Some(30.0));
    }

    #[test]
    fn bind_replaces_prior_monitor_for_same_curve() {
        let mut monitors = HashMap::new();
        bind_to_curve(&mut monitors, monitor(AggregationMode::Average, vec![1]));
        bind_to_curve(&mut monitors, monitor(AggregationMode::Maximum, vec![2]));
        assert_eq!(monitors.len(), 1);
        assert_eq!(monitors["curve-1"].aggregation_mode, AggregationMode::Maximum);
    }
}
