//! Host temperature sensor enumeration and reading (C2).

pub mod registry;

pub use registry::SensorRegistry;
