//! Fan curve evaluation.
//!
//! A curve is a pure piecewise-linear map from temperature to fan
//! percent: no hysteresis, smoothing, delay, or ramp limiting is carried
//! between calls. Anything stateful about how fast a wall approaches a
//! target lives in the scheduler's tick cadence, not here.

use crate::data::CurvePoint;

/// Evaluates a curve at temperature `t`.
///
/// - `t <= x0` returns `y0`; `t >= x_last` returns `y_last`.
/// - Otherwise linearly interpolates between the bracketing points,
///   rounded to 0.1.
///
/// Assumes `points` already satisfies the curve invariants (>=2 points,
/// strictly increasing x, y in [0,100]); call
/// [`crate::data::validate_curve_points`] before trusting caller input.
pub fn eval(points: &[CurvePoint], t: f32) -> f32 {
    debug_assert!(points.len() >= 2, "curve must have at least two points");

    let first = points.first().expect("validated curve is non-empty");
    if t <= first.temperature {
        return first.fan_percent;
    }
    let last = points.last().expect("validated curve is non-empty");
    if t >= last.temperature {
        return last.fan_percent;
    }

    for window in points.windows(2) {
        let (lo, hi) = (window[0], window[1]);
        if t >= lo.temperature && t <= hi.temperature {
            let span = hi.temperature - lo.temperature;
            let frac = (t - lo.temperature) / span;
            let raw = lo.fan_percent + (hi.fan_percent - lo.fan_percent) * frac;
            return round_to_tenth(raw);
        }
    }
    // Points are validated to be strictly increasing and t falls inside
    // [first, last), so the loop above always returns.
    last.fan_percent
}

fn round_to_tenth(v: f32) -> f32 {
    (v * 10.0).round() / 10.0
}

/// Named starting-point curves offered when creating a new curve. These
/// are convenience seeds for a points list; they carry no runtime
/// behavior beyond supplying initial points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurvePreset {
    Quiet,
    Balanced,
    Performance,
}

impl CurvePreset {
    pub fn points(&self) -> Vec<CurvePoint> {
        match self {
            CurvePreset::Quiet => vec![
                CurvePoint::new(30.0, 20.0),
                CurvePoint::new(50.0, 30.0),
                CurvePoint::new(70.0, 50.0),
                CurvePoint::new(85.0, 75.0),
            ],
            CurvePreset::Balanced => vec![
                CurvePoint::new(30.0, 30.0),
                CurvePoint::new(50.0, 50.0),
                CurvePoint::new(70.0, 80.0),
                CurvePoint::new(85.0, 100.0),
            ],
            CurvePreset::Performance => vec![
                CurvePoint::new(30.0, 50.0),
                CurvePoint::new(45.0, 70.0),
                CurvePoint::new(60.0, 90.0),
                CurvePoint::new(75.0, 100.0),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s1_curve() -> Vec<CurvePoint> {
        vec![CurvePoint::new(30.0, 50.0), CurvePoint::new(80.0, 100.0)]
    }

    #[test]
    fn s1_linear_eval() {
        let curve = s1_curve();
        assert_eq!(eval(&curve, 25.0), 50.0);
        assert_eq!(eval(&curve, 30.0), 50.0);
        assert_eq!(eval(&curve, 55.0), 75.0);
        assert_eq!(eval(&curve, 80.0), 100.0);
        assert_eq!(eval(&curve, 95.0), 100.0);
    }

    #[test]
    fn agrees_at_every_breakpoint() {
        let curve = vec![
            CurvePoint::new(20.0, 10.0),
            CurvePoint::new(40.0, 35.0),
            CurvePoint::new(60.0, 60.0),
            CurvePoint::new(90.0, 100.0),
        ];
        for p in &curve {
            assert_eq!(eval(&curve, p.temperature), p.fan_percent);
        }
    }

    #[test]
    fn monotonic_curve_is_monotonic_in_output() {
        let curve = vec![
            CurvePoint::new(20.0, 10.0),
            CurvePoint::new(40.0, 35.0),
            CurvePoint::new(60.0, 60.0),
            CurvePoint::new(90.0, 100.0),
        ];
        let mut prev = eval(&curve, 0.0);
        let mut t = 0.0;
        while t <= 100.0 {
            let v = eval(&curve, t);
            assert!(v >= prev);
            prev = v;
            t += 0.5;
        }
    }

    #[test]
    fn presets_are_well_formed() {
        for preset in [CurvePreset::Quiet, CurvePreset::Balanced, CurvePreset::Performance] {
            let points = preset.points();
            assert!(points.len() >= 2);
            assert!(crate::data::validate_curve_points(&points).is_ok());
        }
    }
}
