//! Per-drive temperature registry and curve-bound aggregation (C3).

pub mod monitor;
pub mod registry;

pub use monitor::{bind_to_curve, compute};
pub use registry::{drive_hash, DriveRecord, DriveRegistry};
