//! Fanwall core library
//!
//! Domain logic for a rack-chassis fan wall controller: the data model,
//! curve/profile evaluation engine, host sensor and drive registries,
//! the four-document configuration store, and the tick-ordering used by
//! the reconciliation scheduler. Serial wire I/O lives in
//! `fanwall-protocol`; opening the link and driving the async loop is
//! the daemon binary's job, so this crate carries no runtime dependency.
//!
//! # Module structure
//!
//! - `data` - data types, JSON persistence, validation
//! - `engine` - curve evaluation, profile demand, wall binding
//! - `sensors` - host temperature sensor enumeration and reading
//! - `drives` - drive registry contract and per-curve aggregation
//! - `sched` - reconciliation tick ordering and per-board overlap guards
//! - `services` - composed, loaded-at-boot service state
//! - `display` - temperature unit formatting
//! - `error` - the shared error taxonomy

pub mod constants;
pub mod data;
pub mod display;
pub mod drives;
pub mod engine;
pub mod error;
pub mod sched;
pub mod sensors;
pub mod services;

pub use data::{
    AggregationMode, ChassisLayoutDoc, CurvePoint, DebounceGate, DriveMonitor, FanCurve,
    FanProfile, FanProfilesDoc, FanServiceStateDoc, FanWall, Powerboard, Sensor, SensorGroup,
    TemperatureSensorsDoc, TemperatureUnit, WallMode,
};
pub use display::{
    celsius_to_fahrenheit, fahrenheit_to_celsius, format_temp_precise_with_unit,
    format_temp_with_unit,
};
pub use drives::{bind_to_curve, compute as compute_drive_aggregate, drive_hash, DriveRecord, DriveRegistry};
pub use engine::{
    apply_target_to_triple, binding_for_wall, demand, eval, migrate_sensor_reference,
    profile_mode_target, CurvePreset, SensorLookup, WallBinding, WallRows,
};
pub use error::{FanwallError, Result};
pub use sched::{recompute, BoardGate, BoardGateGuard, WallTargetDiffs};
pub use sensors::SensorRegistry;
pub use services::Services;
