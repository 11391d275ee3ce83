//! Explicit service composition (replaces a globals module).
//!
//! Everything a running daemon needs — the persisted documents, the host
//! sensor registry, and the drive registry view — is owned by one
//! `Services` value built once at boot and threaded through the
//! reconciliation loop and any request handlers, rather than reached for
//! through module-level statics.

use std::collections::HashMap;

use crate::data::{
    ChassisLayoutDoc, DebounceGate, DriveMonitor, FanProfilesDoc, FanServiceStateDoc, FanWall,
    TemperatureSensorsDoc,
};
use crate::data::persistence;
use crate::drives::DriveRegistry;
use crate::error::Result;
use crate::sensors::SensorRegistry;

/// Everything loaded from disk at boot, held in memory and debounce-saved
/// back on change.
pub struct Services {
    pub chassis_layout: ChassisLayoutDoc,
    pub fan_profiles: FanProfilesDoc,
    pub temperature_sensors: TemperatureSensorsDoc,
    pub fan_service_state: FanServiceStateDoc,

    pub sensor_registry: SensorRegistry,
    pub drive_registry: DriveRegistry,

    chassis_dirty: DebounceGate,
    fan_profiles_dirty: DebounceGate,
    temperature_sensors_dirty: DebounceGate,
    fan_service_state_dirty: DebounceGate,
}

impl Services {
    /// Loads all four documents (applying any pending migration), and
    /// starts fresh sensor/drive registries. Call [`Services::bootstrap`]
    /// next to populate the sensor registry before the first tick.
    pub fn load() -> Result<Self> {
        Ok(Self {
            chassis_layout: persistence::load_chassis_layout()?,
            fan_profiles: persistence::load_fan_profiles()?,
            temperature_sensors: persistence::load_temperature_sensors()?,
            fan_service_state: persistence::load_fan_service_state()?,
            sensor_registry: SensorRegistry::new(),
            drive_registry: DriveRegistry::new(),
            chassis_dirty: DebounceGate::default(),
            fan_profiles_dirty: DebounceGate::default(),
            temperature_sensors_dirty: DebounceGate::default(),
            fan_service_state_dirty: DebounceGate::default(),
        })
    }

    /// Forces the first sensor enumeration so reads immediately after
    /// boot aren't empty.
    pub fn bootstrap(&mut self) {
        self.sensor_registry.refresh(true);
    }

    pub fn fan_walls(&self) -> impl Iterator<Item = &FanWall> {
        self.fan_service_state.fan_walls.values()
    }

    pub fn drive_monitors(&self) -> &HashMap<String, DriveMonitor> {
        &self.temperature_sensors.drive_monitors
    }

    pub fn mark_chassis_dirty(&mut self) {
        self.chassis_dirty.mark_dirty();
    }

    pub fn mark_fan_profiles_dirty(&mut self) {
        self.fan_profiles_dirty.mark_dirty();
    }

    pub fn mark_temperature_sensors_dirty(&mut self) {
        self.temperature_sensors_dirty.mark_dirty();
    }

    pub fn mark_fan_service_state_dirty(&mut self) {
        self.fan_service_state_dirty.mark_dirty();
    }

    /// Polls all four debounce gates, writing out any document whose
    /// window has elapsed. Call once per scheduler tick.
    pub fn flush_dirty(&mut self) -> Result<()> {
        if self.chassis_dirty.poll() {
            persistence::save_chassis_layout(&self.chassis_layout)?;
        }
        if self.fan_profiles_dirty.poll() {
            persistence::save_fan_profiles(&self.fan_profiles)?;
        }
        if self.temperature_sensors_dirty.poll() {
            persistence::save_temperature_sensors(&self.temperature_sensors)?;
        }
        if self.fan_service_state_dirty.poll() {
            persistence::save_fan_service_state(&self.fan_service_state)?;
        }
        Ok(())
    }
}
