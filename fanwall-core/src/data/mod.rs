//! Data types, persistence, and validation.
//!
//! Contains the core data structures (sensors, curves, profiles, walls,
//! powerboards) and the configuration-store documents built from them.

pub mod ids;
pub mod persistence;
pub mod types;
pub mod validation;

pub use persistence::{
    ChassisLayoutDoc, DebounceGate, FanProfilesDoc, FanServiceStateDoc, TemperatureSensorsDoc,
    TemperatureUnit,
};
pub use types::{
    AggregationMode, CurvePoint, DriveMonitor, FanCurve, FanProfile, FanWall, Powerboard, Sensor,
    SensorGroup, WallMode,
};
pub use validation::{
    clamp_manual_target, normalize_curve_points, validate_curve_points, validate_display_name,
    validate_percentage, validate_sensor_handle,
};
