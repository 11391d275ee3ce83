//! Input validation for curves, profiles, and hardware paths.
//!
//! # Security considerations
//!
//! Sensor and fan paths are confined to the sysfs trees they are
//! expected to live under; user-provided names are filtered to safe
//! characters before being stored.

use std::path::{Path, PathBuf};

use crate::error::{FanwallError, Result};

const MAX_CURVE_POINTS: usize = 32;
const MAX_CURVE_TEMPERATURE: f32 = 150.0;
const MAX_SENSOR_NAME_LEN: usize = 128;

/// Validates a fan-percent value is within 0-100.
pub fn validate_percentage(value: f32) -> Result<f32> {
    if !(0.0..=100.0).contains(&value) {
        return Err(FanwallError::validation(
            "percentage",
            format!("{value} is out of range 0-100"),
        ));
    }
    Ok(value)
}

/// Validates a manual wall target, clamping into 20-100 rather than
/// rejecting — the controller's manual-mode invariant is a clamp, not a
/// hard error.
pub fn clamp_manual_target(value: u8) -> u8 {
    value.clamp(*crate::constants::MANUAL_TARGET_RANGE.start(), *crate::constants::MANUAL_TARGET_RANGE.end())
}

/// Validates curve points: at least two, strictly increasing x, y in
/// [0, 100].
pub fn validate_curve_points(points: &[crate::data::CurvePoint]) -> Result<()> {
    if points.len() < 2 {
        return Err(FanwallError::validation(
            "points",
            "curve must have at least two points",
        ));
    }
    if points.len() > MAX_CURVE_POINTS {
        return Err(FanwallError::validation(
            "points",
            format!("curve exceeds maximum of {MAX_CURVE_POINTS} points"),
        ));
    }
    for (i, point) in points.iter().enumerate() {
        if !(0.0..=MAX_CURVE_TEMPERATURE).contains(&point.temperature) {
            return Err(FanwallError::validation(
                "points",
                format!(
                    "point {i} has invalid temperature {:.1}°C (must be 0-{MAX_CURVE_TEMPERATURE}°C)",
                    point.temperature
                ),
            ));
        }
        validate_percentage(point.fan_percent)?;
    }
    for window in points.windows(2) {
        if window[0].temperature >= window[1].temperature {
            return Err(FanwallError::validation(
                "points",
                "curve points must be strictly increasing in temperature",
            ));
        }
    }
    Ok(())
}

/// Clamps curve point y-values into [0, 100] and re-sorts by x, for
/// editors that normalize rather than reject.
pub fn normalize_curve_points(points: &mut [crate::data::CurvePoint]) {
    points.sort_by(|a, b| a.temperature.partial_cmp(&b.temperature).unwrap());
    for p in points.iter_mut() {
        p.fan_percent = p.fan_percent.clamp(0.0, 100.0);
    }
}

/// Validates and sanitizes a user-provided display name (profile, curve,
/// drive monitor, sensor).
pub fn validate_display_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(FanwallError::validation("name", "name cannot be empty"));
    }
    if trimmed.len() > MAX_SENSOR_NAME_LEN {
        return Err(FanwallError::validation(
            "name",
            format!("name exceeds maximum length of {MAX_SENSOR_NAME_LEN} characters"),
        ));
    }
    let sanitized: String = trimmed
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == ' ' || *c == '-' || *c == '_' || *c == '.')
        .collect();
    if sanitized.is_empty() {
        return Err(FanwallError::validation(
            "name",
            "name contains no valid characters",
        ));
    }
    Ok(sanitized)
}

/// Confines a temperature sensor handle to the canonical Linux sysfs
/// trees the enumerator discovers from.
pub fn validate_sensor_handle(path: &Path) -> Result<PathBuf> {
    let canonical = path
        .canonicalize()
        .map_err(|e| FanwallError::validation("handle", format!("path resolution failed: {e}")))?;
    let path_str = canonical.to_string_lossy();
    if !path_str.starts_with("/sys/class/hwmon") && !path_str.starts_with("/sys/class/thermal") {
        return Err(FanwallError::validation(
            "handle",
            "path must be under /sys/class/hwmon or /sys/class/thermal",
        ));
    }
    Ok(canonical)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::CurvePoint;

    #[test]
    fn rejects_single_point_curve() {
        let points = [CurvePoint::new(30.0, 50.0)];
        assert!(validate_curve_points(&points).is_err());
    }

    #[test]
    fn rejects_non_increasing_x() {
        let points = [CurvePoint::new(30.0, 50.0), CurvePoint::new(30.0, 80.0)];
        assert!(validate_curve_points(&points).is_err());
    }

    #[test]
    fn accepts_well_formed_curve() {
        let points = [CurvePoint::new(30.0, 50.0), CurvePoint::new(80.0, 100.0)];
        assert!(validate_curve_points(&points).is_ok());
    }

    #[test]
    fn clamps_manual_target() {
        assert_eq!(clamp_manual_target(5), 20);
        assert_eq!(clamp_manual_target(150), 100);
        assert_eq!(clamp_manual_target(60), 60);
    }

    #[test]
    fn sanitizes_display_name() {
        assert_eq!(validate_display_name("  CPU Wall  ").unwrap(), "CPU Wall");
        assert!(validate_display_name("").is_err());
    }
}
