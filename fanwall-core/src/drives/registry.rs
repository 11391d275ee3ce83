//! Drive registry contract.
//!
//! The drive registry itself is an external collaborator (shells out to
//! `smartctl` on a >=60s cadence); this module defines the shape the
//! core consumes and the stable content hash used to key it.

use std::collections::HashMap;

/// Stable identity for a drive: `xxhash3_64` of its reported serial
/// number.
pub fn drive_hash(serial_number: &str) -> u64 {
    xxhash_rust::xxh3::xxh3_64(serial_number.as_bytes())
}

/// One drive's record as published by the external collaborator. The
/// core reads only `temp_celsius` and key membership.
#[derive(Debug, Clone)]
pub struct DriveRecord {
    pub model: String,
    pub serial: String,
    pub firmware: String,
    pub capacity_bytes: u64,
    pub rotation_rpm: Option<u32>,
    pub power_on_hours: Option<u32>,
    pub power_cycle_count: Option<u32>,
    pub temp_celsius: Option<f32>,
}

/// In-memory view of the external drive registry, refreshed by
/// whichever collaborator owns the `smartctl` scrape.
#[derive(Debug, Default)]
pub struct DriveRegistry {
    drives: HashMap<u64, DriveRecord>,
}

impl DriveRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the entire registry snapshot, as the external
    /// collaborator's refresh would.
    pub fn replace_all(&mut self, drives: HashMap<u64, DriveRecord>) {
        self.drives = drives;
    }

    pub fn get(&self, hash: u64) -> Option<&DriveRecord> {
        self.drives.get(&hash)
    }

    pub fn contains(&self, hash: u64) -> bool {
        self.drives.contains_key(&hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_stable_for_same_serial() {
        assert_eq!(drive_hash("ABC123"), drive_hash("ABC123"));
    }

    #[test]
    fn hash_differs_for_different_serials() {
        assert_ne!(drive_hash("ABC123"), drive_hash("XYZ789"));
    }
}
