use serde::Serialize;

use crate::{Result, ScorpionError};

/// Linear map from `[in_min, in_max]` onto `[out_min, out_max]`.
///
/// Inputs are clamped to the input range before scaling, so the output never
/// extrapolates past the output range. Instances are immutable; changing the
/// bounds means building a new scaler.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Scaler {
    in_min: f64,
    in_max: f64,
    out_min: f64,
    out_max: f64,
}

impl Scaler {
    pub fn new(in_min: f64, in_max: f64, out_min: f64, out_max: f64) -> Result<Self> {
        if ![in_min, in_max, out_min, out_max]
            .iter()
            .all(|bound| bound.is_finite())
        {
            return Err(ScorpionError::config(format!(
                "scaler bounds must be finite, got [{in_min}, {in_max}] -> [{out_min}, {out_max}]"
            )));
        }

        if in_min >= in_max {
            return Err(ScorpionError::config(format!(
                "scaler input range is degenerate: {in_min} >= {in_max}"
            )));
        }

        Ok(Self {
            in_min,
            in_max,
            out_min,
            out_max,
        })
    }

    /// Scaler onto the unit interval.
    pub fn unit(in_min: f64, in_max: f64) -> Result<Self> {
        Self::new(in_min, in_max, 0.0, 1.0)
    }

    pub fn apply(&self, value: f64) -> f64 {
        let clamped = value.clamp(self.in_min, self.in_max);
        self.out_min
            + (clamped - self.in_min) / (self.in_max - self.in_min) * (self.out_max - self.out_min)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn maps_linearly_inside_range() {
        let scaler = Scaler::new(0.0, 10.0, 100.0, 200.0).unwrap();
        assert_eq!(scaler.apply(0.0), 100.0);
        assert_eq!(scaler.apply(5.0), 150.0);
        assert_eq!(scaler.apply(10.0), 200.0);
    }

    #[test]
    fn clamps_out_of_range_inputs() {
        let scaler = Scaler::unit(0.05, 0.2).unwrap();
        assert_eq!(scaler.apply(-3.0), 0.0);
        assert_eq!(scaler.apply(0.0), 0.0);
        assert_eq!(scaler.apply(42.0), 1.0);
    }

    #[test]
    fn rejects_degenerate_input_range() {
        let err = Scaler::unit(0.2, 0.2).unwrap_err();
        assert!(matches!(err, ScorpionError::Configuration(_)));
        assert!(Scaler::unit(0.3, 0.2).is_err());
        assert!(Scaler::new(0.0, f64::INFINITY, 0.0, 1.0).is_err());
        assert!(Scaler::new(0.0, 1.0, f64::NAN, 1.0).is_err());
    }

    #[test]
    fn supports_inverted_output_range() {
        let scaler = Scaler::new(0.0, 1.0, 1.0, 0.0).unwrap();
        assert_eq!(scaler.apply(0.25), 0.75);
        assert_eq!(scaler.apply(2.0), 0.0);
    }

    proptest! {
        #[test]
        fn output_stays_inside_output_range(
            in_min in -100.0f64..100.0,
            width in 0.001f64..50.0,
            out_min in -10.0f64..10.0,
            out_width in 0.0f64..10.0,
            value in -1.0e6f64..1.0e6,
        ) {
            let out_max = out_min + out_width;
            let scaler = Scaler::new(in_min, in_min + width, out_min, out_max).unwrap();
            let scaled = scaler.apply(value);
            prop_assert!(scaled >= out_min - 1e-9);
            prop_assert!(scaled <= out_max + 1e-9);
        }
    }
}
