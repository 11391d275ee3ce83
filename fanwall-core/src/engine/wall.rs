//! Fan wall controller: mode semantics and board binding.
//!
//! Walls 1-3 target powerboard-at-location-1 rows 1/2/3 respectively;
//! wall 4 targets all three channels of powerboard-at-location-2.

use crate::constants::SAFE_DEFAULT_FAN_PERCENT;
use crate::data::FanProfile;
use crate::engine::profile::{self, SensorLookup};

/// Which rows on which board a wall drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WallRows {
    Row(usize),
    AllThree,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WallBinding {
    pub board_location: u8,
    pub rows: WallRows,
}

/// Static wall-id to board/row binding. Walls are created during boot
/// from powerboard enumeration and never destroyed while a board is
/// present; this function only says where a wall *would* go, not
/// whether the board exists.
pub fn binding_for_wall(wall_id: u8) -> Option<WallBinding> {
    match wall_id {
        1 => Some(WallBinding { board_location: 1, rows: WallRows::Row(0) }),
        2 => Some(WallBinding { board_location: 1, rows: WallRows::Row(1) }),
        3 => Some(WallBinding { board_location: 1, rows: WallRows::Row(2) }),
        4 => Some(WallBinding { board_location: 2, rows: WallRows::AllThree }),
        _ => None,
    }
}

/// Applies a single wall's target onto a board's current PWM triple,
/// preserving the other rows.
pub fn apply_target_to_triple(current: (u8, u8, u8), rows: WallRows, target: u8) -> (u8, u8, u8) {
    match rows {
        WallRows::Row(0) => (target, current.1, current.2),
        WallRows::Row(1) => (current.0, target, current.2),
        WallRows::Row(2) => (current.0, current.1, target),
        WallRows::AllThree => (target, target, target),
        WallRows::Row(_) => current,
    }
}

/// Profile-mode target: `round(demand(profile))`, falling back to the
/// safe default when the profile is missing or vanished.
pub fn profile_mode_target(profile: Option<&FanProfile>, lookup: &dyn SensorLookup) -> u8 {
    match profile {
        Some(p) => profile::demand(p, lookup).round().clamp(0.0, 100.0) as u8,
        None => SAFE_DEFAULT_FAN_PERCENT as u8,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wall_1_3_bind_to_board_1_rows() {
        assert_eq!(
            binding_for_wall(1),
            Some(WallBinding { board_location: 1, rows: WallRows::Row(0) })
        );
        assert_eq!(
            binding_for_wall(3),
            Some(WallBinding { board_location: 1, rows: WallRows::Row(2) })
        );
    }

    #[test]
    fn wall_4_binds_to_board_2_all_rows() {
        assert_eq!(
            binding_for_wall(4),
            Some(WallBinding { board_location: 2, rows: WallRows::AllThree })
        );
    }

    #[test]
    fn applies_single_row_preserving_others() {
        assert_eq!(apply_target_to_triple((10, 20, 30), WallRows::Row(1), 99), (10, 99, 30));
    }

    #[test]
    fn applies_all_three_rows() {
        assert_eq!(apply_target_to_triple((10, 20, 30), WallRows::AllThree, 77), (77, 77, 77));
    }

    #[test]
    fn missing_profile_falls_back_to_safe_default() {
        struct NoopLookup;
        impl SensorLookup for NoopLookup {
            fn read_celsius(&self, _: &str) -> Option<f32> {
                None
            }
        }
        assert_eq!(profile_mode_target(None, &NoopLookup), SAFE_DEFAULT_FAN_PERCENT as u8);
    }
}
