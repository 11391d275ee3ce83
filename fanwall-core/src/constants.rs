//! Constants and configuration defaults.
//!
//! Centralizes magic numbers and paths. Single source of truth; never
//! hardcode one of these values elsewhere.

use std::time::Duration;

pub const SERIAL_BAUD_RATE: u32 = fanwall_protocol::BAUD_RATE;
pub const SERIAL_READ_TIMEOUT: Duration = Duration::from_millis(fanwall_protocol::READ_TIMEOUT_MS);

/// Period for board state pull (tach/wattage) and sensor/drive refresh.
pub const BOARD_PULL_INTERVAL: Duration = Duration::from_secs(3);

/// Default period for automatic curve evaluation; user-configurable.
pub const DEFAULT_CURVE_EVAL_INTERVAL: Duration = Duration::from_secs(2);

/// Sensor enumeration cache lifetime.
pub const SENSOR_ENUMERATION_CACHE_TTL: Duration = Duration::from_secs(30);

/// Drive registry refresh cadence guaranteed by the external collaborator.
pub const DRIVE_REGISTRY_REFRESH_FLOOR: Duration = Duration::from_secs(60);

/// Config writes are coalesced into at most one per this window.
pub const CONFIG_SAVE_DEBOUNCE: Duration = Duration::from_millis(500);

/// Safe fallback demand when a profile has no curve with a readable sensor.
pub const SAFE_DEFAULT_FAN_PERCENT: f32 = 50.0;

/// Manual wall target is clamped to this range.
pub const MANUAL_TARGET_RANGE: std::ops::RangeInclusive<u8> = 20..=100;

/// Bounded ring size for recent sensor readings.
pub const SENSOR_HISTORY_CAPACITY: usize = 100;

pub mod paths {
    use std::path::PathBuf;

    /// Default config directory root on Linux, mirroring the XDG
    /// convention used for per-user config, with a system-wide fallback
    /// for root/service-account execution.
    pub const SYSTEM_CONFIG_DIR: &str = "/etc/fanwall";

    pub const CHASSIS_LAYOUT_FILE: &str = "chassis.json";
    pub const FAN_PROFILES_FILE: &str = "fan_profiles.json";
    pub const TEMPERATURE_SENSORS_FILE: &str = "temperature_sensors.json";
    pub const FAN_SERVICE_STATE_FILE: &str = "fan_service.json";

    /// Resolves the config root via env override, then XDG/home, then the
    /// system-wide default — same precedence used for the bootstrap CLI.
    pub fn config_dir() -> PathBuf {
        if let Ok(dir) = std::env::var("FANWALL_CONFIG_DIR") {
            return PathBuf::from(dir);
        }
        // SAFETY: geteuid only reads the effective UID of this process.
        if unsafe { libc::geteuid() } == 0 {
            return PathBuf::from(SYSTEM_CONFIG_DIR);
        }
        if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
            return PathBuf::from(xdg).join("fanwall");
        }
        dirs::config_dir()
            .map(|p| p.join("fanwall"))
            .unwrap_or_else(|| PathBuf::from(SYSTEM_CONFIG_DIR))
    }
}
