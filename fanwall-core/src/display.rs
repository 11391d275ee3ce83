//! Temperature display formatting.
//!
//! GUI-agnostic formatting driven by the persisted [`TemperatureUnit`]
//! preference rather than any frontend's own state.

use crate::data::TemperatureUnit;

pub fn celsius_to_fahrenheit(celsius: f32) -> f32 {
    celsius * 9.0 / 5.0 + 32.0
}

pub fn fahrenheit_to_celsius(fahrenheit: f32) -> f32 {
    (fahrenheit - 32.0) * 5.0 / 9.0
}

pub fn format_temp_with_unit(temp_celsius: f32, unit: TemperatureUnit) -> String {
    match unit {
        TemperatureUnit::Fahrenheit => format!("{:.0}°F", celsius_to_fahrenheit(temp_celsius)),
        TemperatureUnit::Celsius => format!("{:.0}°C", temp_celsius),
    }
}

pub fn format_temp_precise_with_unit(temp_celsius: f32, unit: TemperatureUnit) -> String {
    match unit {
        TemperatureUnit::Fahrenheit => format!("{:.1}°F", celsius_to_fahrenheit(temp_celsius)),
        TemperatureUnit::Celsius => format!("{:.1}°C", temp_celsius),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_celsius_to_fahrenheit() {
        assert_eq!(celsius_to_fahrenheit(0.0), 32.0);
        assert_eq!(celsius_to_fahrenheit(100.0), 212.0);
    }

    #[test]
    fn round_trips_through_fahrenheit() {
        let original = 45.5;
        let back = fahrenheit_to_celsius(celsius_to_fahrenheit(original));
        assert!((back - original).abs() < 0.001);
    }

    #[test]
    fn formats_with_unit() {
        assert_eq!(format_temp_with_unit(45.0, TemperatureUnit::Celsius), "45°C");
        assert_eq!(format_temp_with_unit(0.0, TemperatureUnit::Fahrenheit), "32°F");
    }
}
