//! Stable 128-bit-looking ids for profiles, curves, and drive monitors.
//!
//! Renames change `name` only; these ids are the join keys and survive
//! restarts.

use std::time::{SystemTime, UNIX_EPOCH};

/// Checks the `xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx` shape used by the
/// persisted documents, without depending on a UUID parsing crate.
pub fn is_valid_id(s: &str) -> bool {
    let parts: Vec<&str> = s.split('-').collect();
    if parts.len() != 5 {
        return false;
    }
    let expected_lens = [8, 4, 4, 4, 12];
    parts
        .iter()
        .zip(expected_lens.iter())
        .all(|(part, &len)| part.len() == len && part.chars().all(|c| c.is_ascii_hexdigit()))
}

/// Generates a UUID-v4-shaped id for a new profile, curve, or drive
/// monitor.
pub fn generate_id() -> String {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let rand_part = timestamp ^ (timestamp >> 32);
    let rand2 = timestamp.wrapping_mul(0x5851F42D4C957F2D);
    format!(
        "{:08x}-{:04x}-4{:03x}-{:04x}-{:012x}",
        (rand_part & 0xFFFF_FFFF) as u32,
        ((rand_part >> 32) & 0xFFFF) as u16,
        ((rand2 >> 48) & 0x0FFF) as u16,
        (0x8000 | ((rand2 >> 32) & 0x3FFF)) as u16,
        (rand2 & 0xFFFF_FFFF_FFFF) as u64
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_valid() {
        assert!(is_valid_id(&generate_id()));
    }

    #[test]
    fn rejects_legacy_display_name_keys() {
        assert!(!is_valid_id("Drive Temperature Monitor"));
    }
}
