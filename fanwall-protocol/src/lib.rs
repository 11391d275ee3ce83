//! Wire protocol for the powerboard serial link.
//!
//! Every request is a single ASCII line `CMD:ARGS\n`; every reply is a
//! single ASCII line. This module owns encoding/decoding only — it never
//! touches a serial port.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const BAUD_RATE: u32 = 9600;
pub const READ_TIMEOUT_MS: u64 = 2000;

const PWM_MAX_VALUE: f32 = 255.0;
const PERCENT_MAX_VALUE: f32 = 100.0;
const TARGET_VOLTAGE: f32 = 12.0;
const TACH_COUNT_TO_RPM: u32 = 30;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("empty reply from powerboard")]
    EmptyReply,
    #[error("malformed reply {reply:?}: expected {expected} fields, found {found}")]
    FieldCount {
        reply: String,
        expected: usize,
        found: usize,
    },
    #[error("malformed reply {reply:?}: field {field:?} is not a valid number")]
    NotANumber { reply: String, field: String },
    #[error("fan speed {value} out of range 0-100")]
    InvalidPercent { value: i32 },
}

type Result<T> = std::result::Result<T, ProtocolError>;

/// Board metadata as reported by `V:`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardMetadata {
    pub hardware_revision: String,
    pub firmware_version: String,
    pub location: u8,
}

/// One serial command line, pre-encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    ReadMetadata,
    ReadPwm,
    SetFanSpeed { row1: u8, row2: u8, row3: u8 },
    UpdateFanSpeed { row1: u8, row2: u8, row3: u8 },
    ReadTach,
    ReadWattage,
    ReadJumper,
}

impl Command {
    /// Renders this command as the wire line to write, including the
    /// trailing newline. `firmware_version` selects the fw-2.2 inversion
    /// rule for `U:`.
    pub fn encode(&self, firmware_version: &str) -> Result<String> {
        let line = match *self {
            Command::ReadMetadata => "V:".to_string(),
            Command::ReadPwm => "P:".to_string(),
            Command::SetFanSpeed { row1, row2, row3 } => {
                let (a, b, c) = reorder_for_wire(row1, row2, row3)?;
                format!("F:{a},{b},{c}")
            }
            Command::UpdateFanSpeed { row1, row2, row3 } => {
                let (row1, row2, row3) = if firmware_version == "2.2" {
                    (invert_percent(row1), invert_percent(row2), invert_percent(row3))
                } else {
                    (row1, row2, row3)
                };
                let (a, b, c) = reorder_for_wire(row1, row2, row3)?;
                format!("U:{a},{b},{c}")
            }
            Command::ReadTach => "T:".to_string(),
            Command::ReadWattage => "W:".to_string(),
            Command::ReadJumper => "J:".to_string(),
        };
        Ok(format!("{line}\n"))
    }
}

/// Logical row1/row2/row3 go out on the wire as row2/row3/row1.
fn reorder_for_wire(row1: u8, row2: u8, row3: u8) -> Result<(u8, u8, u8)> {
    for v in [row1, row2, row3] {
        if v as i32 > 100 {
            return Err(ProtocolError::InvalidPercent { value: v as i32 });
        }
    }
    Ok((row2, row3, row1))
}

fn invert_percent(v: u8) -> u8 {
    (PERCENT_MAX_VALUE as i32 - v as i32).clamp(0, 100) as u8
}

/// `round(v/255 * 100)`
pub fn byte_to_percent(v: u8) -> u8 {
    ((v as f32 / PWM_MAX_VALUE) * PERCENT_MAX_VALUE).round() as u8
}

/// Inverse of [`byte_to_percent`].
pub fn percent_to_byte(p: u8) -> u8 {
    ((p.min(100) as f32 / PERCENT_MAX_VALUE) * PWM_MAX_VALUE).round() as u8
}

fn split_fields(reply: &str, expected: usize) -> Result<Vec<&str>> {
    let reply = reply.trim();
    if reply.is_empty() {
        return Err(ProtocolError::EmptyReply);
    }
    let fields: Vec<&str> = reply.split(',').collect();
    if fields.len() != expected {
        return Err(ProtocolError::FieldCount {
            reply: reply.to_string(),
            expected,
            found: fields.len(),
        });
    }
    Ok(fields)
}

fn parse_field<T: std::str::FromStr>(reply: &str, field: &str) -> Result<T> {
    field.trim().parse::<T>().map_err(|_| ProtocolError::NotANumber {
        reply: reply.to_string(),
        field: field.to_string(),
    })
}

pub fn parse_metadata(reply: &str) -> Result<BoardMetadata> {
    let fields = split_fields(reply, 3)?;
    Ok(BoardMetadata {
        hardware_revision: fields[0].trim().to_string(),
        firmware_version: fields[1].trim().to_string(),
        location: parse_field(reply, fields[2])?,
    })
}

/// Parses a `P:` reply into the logical (row1, row2, row3) PWM percentages.
///
/// The wire order is (p1, p2, p3); the device reports pin3 as logical
/// row1, pin1 as row2, pin2 as row3. For fw 2.3 the raw bytes are
/// inverted (`255 - v`) before percent conversion.
pub fn parse_pwm_reply(reply: &str, firmware_version: &str) -> Result<(u8, u8, u8)> {
    let fields = split_fields(reply, 3)?;
    let mut raw: [u8; 3] = [0; 3];
    for (i, f) in fields.iter().enumerate() {
        let v: i32 = parse_field(reply, f)?;
        raw[i] = v.clamp(0, 255) as u8;
    }
    if firmware_version == "2.3" {
        for v in raw.iter_mut() {
            *v = 255 - *v;
        }
    }
    let (pin1, pin2, pin3) = (raw[0], raw[1], raw[2]);
    let (row1, row2, row3) = (pin3, pin1, pin2);
    Ok((byte_to_percent(row1), byte_to_percent(row2), byte_to_percent(row3)))
}

/// Parses a `T:` reply into RPM for the three rows.
pub fn parse_tach_reply(reply: &str) -> Result<(u32, u32, u32)> {
    let fields = split_fields(reply, 3)?;
    let mut counts = [0u32; 3];
    for (i, f) in fields.iter().enumerate() {
        counts[i] = parse_field::<u32>(reply, f)?;
    }
    Ok((
        counts[0] * TACH_COUNT_TO_RPM,
        counts[1] * TACH_COUNT_TO_RPM,
        counts[2] * TACH_COUNT_TO_RPM,
    ))
}

/// Parses a `W:` reply into the four raw ADC readings.
pub fn parse_wattage_reply(reply: &str) -> Result<[f32; 4]> {
    let fields = split_fields(reply, 4)?;
    let mut adc = [0.0f32; 4];
    for (i, f) in fields.iter().enumerate() {
        adc[i] = parse_field::<f32>(reply, f)?;
    }
    Ok(adc)
}

pub fn parse_jumper_reply(reply: &str) -> Result<bool> {
    let fields = split_fields(reply, 1)?;
    let v: i32 = parse_field(reply, fields[0])?;
    Ok(v != 0)
}

/// Linear ADC-to-wattage decode used by hardware revisions 2.0 and 2.1*.
pub fn decode_wattage_linear(adc: [f32; 4], slope: f32, intercept: f32) -> [f32; 4] {
    adc.map(|reading| {
        if reading == 0.0 {
            0.0
        } else {
            ((reading - intercept) / slope) * TARGET_VOLTAGE
        }
    })
}

pub fn adc_calibration_for(hardware_revision: &str) -> Option<(f32, f32)> {
    if hardware_revision == "2.0" {
        Some((3.574, -1.375))
    } else if hardware_revision.starts_with("2.1") {
        Some((3.284, -1.069))
    } else {
        None
    }
}

/// HW-2.2 correction matrix: 4 output channels x 11 feature terms
/// `[1, r1, r2, r3, r4, r1*r2, r1*r3, r1*r4, r2*r3, r2*r4, r3*r4]`.
///
/// No retrieved source carries the actual calibration coefficients for
/// this hardware revision; this is an identity-weighted placeholder
/// (pass the raw reading through, ignore cross terms) pending real
/// calibration data. See DESIGN.md.
const MATRIX_HW22: [[f32; 11]; 4] = [
    [0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
];

fn feature_vector(adc: [f32; 4]) -> [f32; 11] {
    let [r1, r2, r3, r4] = adc;
    [
        1.0,
        r1,
        r2,
        r3,
        r4,
        r1 * r2,
        r1 * r3,
        r1 * r4,
        r2 * r3,
        r2 * r4,
        r3 * r4,
    ]
}

/// HW-2.2 manual offset table, keyed by (dominant channel index, nearest
/// multiple of 12 of the dominant wattage). Reproduced verbatim; unlisted
/// keys contribute no offset.
const OFFSET_TABLE: &[((usize, i32), [i32; 4])] = &[
    ((1, 120), [0, 1, -2, 0]),
    ((2, 144), [0, -2, -11, 0]),
];

/// Applies the HW-2.2 manual offset table to already matrix-corrected,
/// rounded, and clamped channel wattages, then re-clamps negatives.
pub fn apply_hw22_offsets(watts: [i32; 4]) -> [i32; 4] {
    let (dominant_idx, &dominant_watt) = watts
        .iter()
        .enumerate()
        .max_by_key(|(_, w)| **w)
        .expect("fixed-size array is never empty");
    let nearest_key = ((dominant_watt as f32 / 12.0).round() as i32) * 12;
    let offset = OFFSET_TABLE
        .iter()
        .find(|((idx, key), _)| *idx == dominant_idx && *key == nearest_key)
        .map(|(_, offset)| *offset)
        .unwrap_or([0, 0, 0, 0]);
    let mut result = [0i32; 4];
    for i in 0..4 {
        result[i] = (watts[i] + offset[i]).max(0);
    }
    result
}

/// Full HW-2.2 wattage decode: matrix correction, x12V, round, clamp,
/// then the manual offset table.
pub fn decode_wattage_hw22(adc: [f32; 4]) -> [i32; 4] {
    let features = feature_vector(adc);
    let mut currents = [0.0f32; 4];
    for (ch, row) in MATRIX_HW22.iter().enumerate() {
        currents[ch] = row.iter().zip(features.iter()).map(|(a, b)| a * b).sum();
    }
    let mut watts = [0i32; 4];
    for i in 0..4 {
        watts[i] = (currents[i] * TARGET_VOLTAGE).round().max(0.0) as i32;
    }
    apply_hw22_offsets(watts)
}

/// Section display swap: the firmware does not perform this swap itself.
pub fn display_sections(watts: [f32; 4]) -> (f32, f32) {
    let section_1_2 = watts[2] + watts[3];
    let section_3_4 = watts[0] + watts[1];
    (section_1_2, section_3_4)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reorders_set_fan_speed() {
        let cmd = Command::SetFanSpeed {
            row1: 30,
            row2: 60,
            row3: 90,
        };
        assert_eq!(cmd.encode("2.1").unwrap(), "F:60,90,30\n");
    }

    #[test]
    fn inverts_update_fan_speed_on_fw_2_2() {
        let cmd = Command::UpdateFanSpeed {
            row1: 30,
            row2: 60,
            row3: 90,
        };
        assert_eq!(cmd.encode("2.2").unwrap(), "U:40,10,70\n");
    }

    #[test]
    fn update_fan_speed_unaffected_on_other_firmware() {
        let cmd = Command::UpdateFanSpeed {
            row1: 30,
            row2: 60,
            row3: 90,
        };
        assert_eq!(cmd.encode("2.1").unwrap(), "U:60,90,30\n");
    }

    #[test]
    fn percent_byte_round_trip() {
        for p in 0..=100u8 {
            let byte = percent_to_byte(p);
            let back = byte_to_percent(byte);
            assert!((back as i32 - p as i32).abs() <= 1);
        }
    }

    #[test]
    fn parses_metadata() {
        let m = parse_metadata("2.1,2.2,1").unwrap();
        assert_eq!(m.hardware_revision, "2.1");
        assert_eq!(m.firmware_version, "2.2");
        assert_eq!(m.location, 1);
    }

    #[test]
    fn parses_tach_reply() {
        assert_eq!(parse_tach_reply("10,20,30").unwrap(), (300, 600, 900));
    }

    #[test]
    fn empty_reply_is_an_error() {
        assert!(matches!(parse_metadata(""), Err(ProtocolError::EmptyReply)));
    }

    #[test]
    fn hw22_offset_table_matches_golden_scenario() {
        let watts = [0, 119, 1, 0];
        assert_eq!(apply_hw22_offsets(watts), [0, 120, 0, 0]);
    }

    #[test]
    fn hw22_offset_table_unlisted_key_is_noop() {
        let watts = [5, 5, 5, 5];
        assert_eq!(apply_hw22_offsets(watts), watts);
    }

    #[test]
    fn display_section_swap() {
        let watts = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(display_sections(watts), (7.0, 3.0));
    }
}
