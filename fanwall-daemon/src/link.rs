//! Powerboard serial link (C1).
//!
//! Owns the open `serialport` handle for one board and the binary mutex
//! around it: any in-flight manual command holds the mutex for its
//! duration, and the scheduler tick tries to acquire it non-blocking
//! rather than queuing behind one. Actual reads/writes are blocking
//! I/O, so every call here is meant to run inside
//! `tokio::task::spawn_blocking`.

use std::io::{BufRead, BufReader, Write};
use std::time::Duration;

use fanwall_core::FanwallError;
use fanwall_protocol::{
    parse_jumper_reply, parse_metadata, parse_pwm_reply, parse_tach_reply, parse_wattage_reply,
    BoardMetadata, Command, BAUD_RATE, READ_TIMEOUT_MS,
};
use tracing::{debug, warn};

/// A single open connection to one powerboard. Not `Clone`/`Sync`; the
/// daemon holds one per board behind a `std::sync::Mutex` plus a
/// [`fanwall_core::BoardGate`] for the non-blocking overlap guard.
pub struct PowerboardLink {
    port: String,
    conn: Box<dyn serialport::SerialPort>,
    pub metadata: BoardMetadata,
    /// PWM triple read back during `open()`, before the re-apply. Used
    /// to seed a board's telemetry with real state instead of zeros.
    pub initial_pwm: (u8, u8, u8),
}

impl PowerboardLink {
    /// Opens the port and runs the initialization sequence: read
    /// metadata, then read back and re-apply the active PWM state, so a
    /// board that was reset externally doesn't start from stale config.
    pub fn open(port: &str) -> Result<Self, FanwallError> {
        let conn = serialport::new(port, BAUD_RATE)
            .timeout(Duration::from_millis(READ_TIMEOUT_MS))
            .open()
            .map_err(|e| FanwallError::link(port, e.to_string()))?;

        let mut link = Self {
            port: port.to_string(),
            conn,
            metadata: BoardMetadata {
                hardware_revision: String::new(),
                firmware_version: String::new(),
                location: 0,
            },
            initial_pwm: (0, 0, 0),
        };

        let reply = link.exchange(&Command::ReadMetadata)?;
        link.metadata = parse_metadata(&reply)?;
        let metadata = &link.metadata;
        debug!(port, ?metadata, "powerboard link established");

        // The board may have been power-cycled or reset externally since
        // its active PWM state was last persisted. Read back what it
        // currently thinks it's running, then re-apply the same triple
        // with U: so the active state is known-good rather than assumed.
        let triple = link.read_pwm()?;
        link.update_fan_speed(triple.0, triple.1, triple.2)?;
        link.initial_pwm = triple;

        Ok(link)
    }

    /// Reads the current PWM state as logical (row1, row2, row3)
    /// percentages, applying the firmware's byte inversion and pin
    /// reorder.
    pub fn read_pwm(&mut self) -> Result<(u8, u8, u8), FanwallError> {
        let reply = self.exchange(&Command::ReadPwm)?;
        Ok(parse_pwm_reply(&reply, &self.metadata.firmware_version)?)
    }

    pub fn read_tach(&mut self) -> Result<(u32, u32, u32), FanwallError> {
        let reply = self.exchange(&Command::ReadTach)?;
        Ok(parse_tach_reply(&reply)?)
    }

    pub fn read_wattage(&mut self) -> Result<[f32; 4], FanwallError> {
        let reply = self.exchange(&Command::ReadWattage)?;
        Ok(parse_wattage_reply(&reply)?)
    }

    pub fn read_jumper(&mut self) -> Result<bool, FanwallError> {
        let reply = self.exchange(&Command::ReadJumper)?;
        Ok(parse_jumper_reply(&reply)?)
    }

    /// Sets and persists fan speed to the board's non-volatile memory
    /// (`F:`). Reserved for explicit user "save as default" actions; the
    /// reconciliation tick never calls this.
    pub fn set_fan_speed(&mut self, row1: u8, row2: u8, row3: u8) -> Result<(), FanwallError> {
        self.exchange(&Command::SetFanSpeed { row1, row2, row3 })?;
        Ok(())
    }

    /// Sets fan speed without persisting (`U:`), applying the fw-2.2
    /// inversion rule internally. What the reconciliation tick and manual
    /// slider edits both use.
    pub fn update_fan_speed(&mut self, row1: u8, row2: u8, row3: u8) -> Result<(), FanwallError> {
        self.exchange(&Command::UpdateFanSpeed { row1, row2, row3 })?;
        Ok(())
    }

    fn exchange(&mut self, command: &Command) -> Result<String, FanwallError> {
        let line = command.encode(&self.metadata.firmware_version)?;
        self.conn
            .write_all(line.as_bytes())
            .map_err(|e| FanwallError::link(&self.port, e.to_string()))?;

        let mut reader = BufReader::new(&mut self.conn);
        let mut reply = String::new();
        let read = reader
            .read_line(&mut reply)
            .map_err(|e| FanwallError::link(&self.port, e.to_string()))?;
        if read == 0 {
            warn!(port = %self.port, "powerboard closed the connection");
            return Err(FanwallError::link(&self.port, "connection closed"));
        }
        Ok(reply)
    }
}
