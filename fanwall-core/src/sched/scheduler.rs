//! Periodic reconciliation (C6).
//!
//! `fanwall-core` stays free of an async runtime: the interruptible
//! sleep-or-reload loop lives in the daemon binary (`tokio::select!`
//! between a poll-interval sleep and a reload notify). This module
//! owns the synchronous, testable part — per-board overlap guards and
//! the ordering of a single reconciliation pass.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::data::{DriveMonitor, FanProfile, FanWall, WallMode};
use crate::drives::{self, DriveRegistry};
use crate::engine::{profile_mode_target, SensorLookup};
use crate::sensors::SensorRegistry;

/// Non-blocking per-board busy flag. A tick that finds a board still
/// busy skips it rather than queuing behind it, so one slow board never
/// backs up reconciliation for the others.
#[derive(Debug, Default)]
pub struct BoardGate {
    busy: AtomicBool,
}

impl BoardGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the gate if free. The returned guard releases it on drop.
    pub fn try_acquire(&self) -> Option<BoardGateGuard<'_>> {
        if self.busy.swap(true, Ordering::AcqRel) {
            None
        } else {
            Some(BoardGateGuard { gate: self })
        }
    }
}

pub struct BoardGateGuard<'a> {
    gate: &'a BoardGate,
}

impl Drop for BoardGateGuard<'_> {
    fn drop(&mut self) {
        self.gate.busy.store(false, Ordering::Release);
    }
}

/// Looks up a qualified sensor name against host sensors or, for
/// `Drives.<Name>` references, a snapshot of this tick's monitor
/// aggregates.
struct CompositeLookup<'a> {
    sensors: &'a SensorRegistry,
    drive_values: &'a HashMap<String, f32>,
}

impl SensorLookup for CompositeLookup<'_> {
    fn read_celsius(&self, qualified_name: &str) -> Option<f32> {
        if qualified_name.starts_with("Drives.") {
            self.drive_values.get(qualified_name).copied()
        } else {
            self.sensors.current(qualified_name)
        }
    }
}

/// Result of one reconciliation pass: wall id -> new target, containing
/// only walls whose computed target changed from what is already on the
/// `FanWall` record (push-only-diffs).
pub type WallTargetDiffs = HashMap<u8, u8>;

/// Runs the non-I/O steps of a tick in order: refresh host sensors,
/// recompute drive-monitor aggregates, then recompute every
/// profile-mode wall's target. Pulling tach/wattage from the boards
/// happens before this (daemon-side, over the link); pushing the
/// returned diffs happens after.
pub fn recompute(
    sensors: &mut SensorRegistry,
    drive_registry: &DriveRegistry,
    drive_monitors: &HashMap<String, DriveMonitor>,
    walls: &[FanWall],
    profiles: &HashMap<String, FanProfile>,
) -> WallTargetDiffs {
    sensors.refresh(false);
    sensors.read_all();

    let mut drive_values = HashMap::with_capacity(drive_monitors.len());
    for monitor in drive_monitors.values() {
        if let Some(value) = drives::compute(monitor, drive_registry) {
            drive_values.insert(format!("Drives.{}", monitor.name), value);
        }
    }

    let lookup = CompositeLookup {
        sensors,
        drive_values: &drive_values,
    };

    let mut diffs = WallTargetDiffs::new();
    for wall in walls {
        if wall.mode != WallMode::Profile {
            continue;
        }
        let profile = wall.assigned_profile.as_deref().and_then(|id| profiles.get(id));
        let target = profile_mode_target(profile, &lookup);
        if target != wall.target {
            diffs.insert(wall.wall_id, target);
        }
    }
    diffs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{AggregationMode, CurvePoint, FanCurve};

    #[test]
    fn board_gate_skips_when_already_held() {
        let gate = BoardGate::new();
        let first = gate.try_acquire();
        assert!(first.is_some());
        assert!(gate.try_acquire().is_none());
        drop(first);
        assert!(gate.try_acquire().is_some());
    }

    #[test]
    fn recompute_only_touches_profile_mode_walls() {
        let mut sensors = SensorRegistry::new();
        let drive_registry = DriveRegistry::new();
        let drive_monitors = HashMap::new();

        let mut profiles = HashMap::new();
        profiles.insert(
            "p1".to_string(),
            FanProfile {
                id: "p1".to_string(),
                name: "P1".to_string(),
                curves: vec![FanCurve {
                    id: "c1".to_string(),
                    name: "C1".to_string(),
                    sensor: None,
                    points: vec![CurvePoint::new(0.0, 10.0)],
                }],
            },
        );

        let walls = vec![
            FanWall {
                wall_id: 1,
                name: "Wall 1".to_string(),
                mode: WallMode::Profile,
                assigned_profile: Some("p1".to_string()),
                last_applied: 0,
                target: 0,
                extra: Default::default(),
            },
            FanWall {
                wall_id: 2,
                name: "Wall 2".to_string(),
                mode: WallMode::Manual,
                assigned_profile: None,
                last_applied: 75,
                target: 75,
                extra: Default::default(),
            },
        ];

        let diffs = recompute(&mut sensors, &drive_registry, &drive_monitors, &walls, &profiles);
        assert_eq!(diffs.get(&1), Some(&50));
        assert!(!diffs.contains_key(&2));
    }

    #[test]
    fn recompute_produces_no_diff_when_target_unchanged() {
        let mut sensors = SensorRegistry::new();
        let drive_registry = DriveRegistry::new();
        let drive_monitors = HashMap::new();
        let profiles = HashMap::new();

        let walls = vec![FanWall {
            wall_id: 1,
            name: "Wall 1".to_string(),
            mode: WallMode::Profile,
            assigned_profile: Some("missing".to_string()),
            last_applied: 50,
            target: 50,
            extra: Default::default(),
        }];

        let diffs = recompute(&mut sensors, &drive_registry, &drive_monitors, &walls, &profiles);
        assert!(diffs.is_empty());
    }

    #[test]
    fn recompute_folds_in_drive_monitor_aggregate() {
        use crate::drives::DriveRecord;

        let mut sensors = SensorRegistry::new();
        let mut drive_registry = DriveRegistry::new();
        let mut drives = HashMap::new();
        drives.insert(
            1u64,
            DriveRecord {
                model: "M".to_string(),
                serial: "S".to_string(),
                firmware: "F".to_string(),
                capacity_bytes: 0,
                rotation_rpm: None,
                power_on_hours: None,
                power_cycle_count: None,
                temp_celsius: Some(60.0),
            },
        );
        drive_registry.replace_all(drives);

        let mut drive_monitors = HashMap::new();
        drive_monitors.insert(
            "Pool".to_string(),
            DriveMonitor {
                name: "Pool".to_string(),
                aggregation_mode: AggregationMode::Average,
                curve_id: "c1".to_string(),
                selected_drive_hashes: vec![1],
                enabled: true,
                min_temp: None,
                max_temp: None,
                last_updated: None,
            },
        );

        let mut profiles = HashMap::new();
        profiles.insert(
            "p1".to_string(),
            FanProfile {
                id: "p1".to_string(),
                name: "P1".to_string(),
                curves: vec![FanCurve {
                    id: "c1".to_string(),
                    name: "C1".to_string(),
                    sensor: Some("Drives.Pool".to_string()),
                    points: vec![CurvePoint::new(40.0, 30.0), CurvePoint::new(60.0, 70.0)],
                }],
            },
        );

        let walls = vec![FanWall {
            wall_id: 4,
            name: "Wall 4".to_string(),
            mode: WallMode::Profile,
            assigned_profile: Some("p1".to_string()),
            last_applied: 0,
            target: 0,
            extra: Default::default(),
        }];

        let diffs = recompute(&mut sensors, &drive_registry, &drive_monitors, &walls, &profiles);
        assert_eq!(diffs.get(&4), Some(&70));
    }
}
