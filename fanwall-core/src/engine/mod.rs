//! Fan control engine: curve evaluation, profile demand, wall binding.

pub mod curve;
pub mod profile;
pub mod wall;

pub use curve::{eval, CurvePreset};
pub use profile::{demand, migrate_sensor_reference, SensorLookup};
pub use wall::{apply_target_to_triple, binding_for_wall, profile_mode_target, WallBinding, WallRows};
