//! Fan profile demand: the per-instant max over a profile's curves.

use crate::constants::SAFE_DEFAULT_FAN_PERCENT;
use crate::data::FanProfile;
use crate::engine::curve;

/// Capability passed into curve evaluation instead of a pointer back to
/// a sensor-owning service: curves hold sensor *names*, and whoever
/// evaluates a profile supplies the lookup.
pub trait SensorLookup {
    /// Reads the current value for a qualified sensor name
    /// (`Group:Sensor` or `Drives.Name`). `None` means unavailable.
    fn read_celsius(&self, qualified_name: &str) -> Option<f32>;
}

/// `demand(profile) = max over curves with a readable sensor of
/// curve.eval(T_sensor(curve))`. Falls back to the safe default when no
/// curve has a readable sensor.
pub fn demand(profile: &FanProfile, lookup: &dyn SensorLookup) -> f32 {
    let mut best: Option<f32> = None;
    for curve in &profile.curves {
        let Some(sensor_name) = curve.sensor.as_deref() else {
            continue;
        };
        let Some(temp) = lookup.read_celsius(sensor_name) else {
            continue;
        };
        let value = curve::eval(&curve.points, temp);
        best = Some(best.map_or(value, |b: f32| b.max(value)));
    }
    best.unwrap_or(SAFE_DEFAULT_FAN_PERCENT)
}

/// Token-priority remap of a curve's sensor reference when the named
/// sensor has vanished from the registry: same-category candidates
/// score highest. `Drives.`-prefixed references are never remapped.
pub fn migrate_sensor_reference<'a>(
    missing_name: &str,
    candidates: impl Iterator<Item = &'a str>,
) -> Option<&'a str> {
    if missing_name.starts_with("Drives.") {
        return None;
    }
    let category = missing_name.split(':').next().unwrap_or("");
    candidates.into_iter().find(|c| c.starts_with(category))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{CurvePoint, FanCurve};
    use std::collections::HashMap;

    struct FakeLookup(HashMap<&'static str, f32>);

    impl SensorLookup for FakeLookup {
        fn read_celsius(&self, qualified_name: &str) -> Option<f32> {
            self.0.get(qualified_name).copied()
        }
    }

    fn curve(name: &str, sensor: &str, points: Vec<CurvePoint>) -> FanCurve {
        FanCurve {
            id: name.to_string(),
            name: name.to_string(),
            sensor: Some(sensor.to_string()),
            points,
        }
    }

    #[test]
    fn s2_max_over_curves() {
        let profile = FanProfile {
            id: "p".to_string(),
            name: "P".to_string(),
            curves: vec![
                curve(
                    "A",
                    "CPU:Package",
                    vec![CurvePoint::new(30.0, 20.0), CurvePoint::new(70.0, 80.0)],
                ),
                curve(
                    "B",
                    "GPU:Core",
                    vec![CurvePoint::new(40.0, 40.0), CurvePoint::new(80.0, 100.0)],
                ),
            ],
        };
        let lookup = FakeLookup(HashMap::from([("CPU:Package", 60.0), ("GPU:Core", 50.0)]));
        assert_eq!(demand(&profile, &lookup), 65.0);
    }

    #[test]
    fn falls_back_to_safe_default_with_no_readable_sensor() {
        let profile = FanProfile {
            id: "p".to_string(),
            name: "P".to_string(),
            curves: vec![curve(
                "A",
                "CPU:Package",
                vec![CurvePoint::new(30.0, 20.0), CurvePoint::new(70.0, 80.0)],
            )],
        };
        let lookup = FakeLookup(HashMap::new());
        assert_eq!(demand(&profile, &lookup), SAFE_DEFAULT_FAN_PERCENT);
    }

    #[test]
    fn drive_monitor_references_are_never_migrated() {
        let candidates = vec!["Drives.Other"];
        assert_eq!(
            migrate_sensor_reference("Drives.Pool", candidates.into_iter()),
            None
        );
    }

    #[test]
    fn migrates_to_same_category_sensor() {
        let candidates = vec!["GPU:Core", "CPU:Package2"];
        assert_eq!(
            migrate_sensor_reference("CPU:Package", candidates.into_iter()),
            Some("CPU:Package2")
        );
    }
}
