use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};

use crate::{intensity::IntensityCell, Result, Scaler, ScorpionError};

/// One 3-axis acceleration reading.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MotionSample {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl MotionSample {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Builds a sample from the first three components of `values`.
    pub fn from_slice(values: &[f64]) -> Result<Self> {
        match values {
            [x, y, z, ..] => Ok(Self::new(*x, *y, *z)),
            _ => Err(ScorpionError::InvalidSample(format!(
                "expected 3 components, got {}",
                values.len()
            ))),
        }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// Euclidean norm.
    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

/// Magnitude range inside which motion counts as active, together with the
/// scaler that maps it onto `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GateWindow {
    min: f64,
    max: f64,
    scaler: Scaler,
}

impl GateWindow {
    pub fn new(min: f64, max: f64) -> Result<Self> {
        if !(min.is_finite() && max.is_finite()) || min < 0.0 {
            return Err(ScorpionError::config(format!(
                "gate window bounds must be finite and non-negative, got [{min}, {max}]"
            )));
        }
        if min >= max {
            return Err(ScorpionError::config(format!(
                "gate window is empty: min {min} >= max {max}"
            )));
        }

        Ok(Self {
            min,
            max,
            scaler: Scaler::unit(min, max)?,
        })
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn scaler(&self) -> &Scaler {
        &self.scaler
    }

    pub fn contains(&self, magnitude: f64) -> bool {
        magnitude >= self.min && magnitude <= self.max
    }

    /// Copy of this window with a new lower bound.
    pub fn with_min(&self, min: f64) -> Result<Self> {
        Self::new(min, self.max)
    }

    /// Copy of this window with a new upper bound.
    pub fn with_max(&self, max: f64) -> Result<Self> {
        Self::new(self.min, max)
    }
}

/// Gate window shared between the processor and parameter listeners. It is
/// replaced whole, never edited in place.
pub type SharedGate = Arc<ArcSwap<GateWindow>>;

pub fn shared_gate(window: GateWindow) -> SharedGate {
    Arc::new(ArcSwap::from_pointee(window))
}

/// Magnitude history and last output of the processor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MagnitudeState {
    pub current: f64,
    pub previous: f64,
    pub previous_previous: f64,
    pub normalized: f64,
}

/// Turns acceleration samples into a gated, peak-reset intensity.
///
/// Raw magnitude has no fixed baseline across devices and poses, so the
/// output reports shaking inside a narrow window rather than energy. The
/// falling edge right after a spike above the window is suppressed.
#[derive(Debug)]
pub struct MotionProcessor {
    state: MagnitudeState,
    gate: SharedGate,
    gain: IntensityCell,
    level: IntensityCell,
}

impl MotionProcessor {
    /// `gain` is the slot the grain voice consumes; `level` is the
    /// non-consuming copy for visual readers.
    pub fn new(gate: SharedGate, gain: IntensityCell, level: IntensityCell) -> Self {
        Self {
            state: MagnitudeState::default(),
            gate,
            gain,
            level,
        }
    }

    pub fn state(&self) -> &MagnitudeState {
        &self.state
    }

    pub fn gate(&self) -> Arc<GateWindow> {
        self.gate.load_full()
    }

    pub fn process(&mut self, sample: MotionSample) -> Result<f64> {
        if !sample.is_finite() {
            tracing::warn!(?sample, "dropping non-finite motion sample");
            return Err(ScorpionError::InvalidSample(format!(
                "non-finite component in ({}, {}, {})",
                sample.x, sample.y, sample.z
            )));
        }

        let state = &mut self.state;
        state.previous_previous = state.previous;
        state.previous = state.current;
        state.current = sample.magnitude();

        let gate = self.gate.load();
        state.normalized = if gate.contains(state.current) {
            let peak_descent = state.current < state.previous
                && state.previous > state.previous_previous
                && state.previous > gate.max();
            let value = if peak_descent { 0.0 } else { state.current };
            gate.scaler().apply(value)
        } else {
            0.0
        };

        tracing::trace!(
            magnitude = state.current,
            normalized = state.normalized,
            "processed motion sample"
        );

        self.gain.store(state.normalized);
        self.level.store(state.normalized);
        Ok(state.normalized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn processor(min: f64, max: f64) -> (MotionProcessor, SharedGate, IntensityCell) {
        let gate = shared_gate(GateWindow::new(min, max).unwrap());
        let gain = IntensityCell::new();
        let processor = MotionProcessor::new(gate.clone(), gain.clone(), IntensityCell::new());
        (processor, gate, gain)
    }

    fn along_x(magnitude: f64) -> MotionSample {
        MotionSample::new(magnitude, 0.0, 0.0)
    }

    fn run(processor: &mut MotionProcessor, magnitudes: &[f64]) -> Vec<f64> {
        magnitudes
            .iter()
            .map(|m| processor.process(along_x(*m)).unwrap())
            .collect()
    }

    #[test]
    fn computes_euclidean_magnitude() {
        assert!((MotionSample::new(3.0, 4.0, 12.0).magnitude() - 13.0).abs() < 1e-12);
        assert!((MotionSample::new(-0.1, 0.0, 0.0).magnitude() - 0.1).abs() < 1e-12);
    }

    #[test]
    fn rejects_short_slices() {
        assert!(MotionSample::from_slice(&[0.1, 0.2]).is_err());
        let sample = MotionSample::from_slice(&[0.1, 0.2, 0.3]).unwrap();
        assert_eq!(sample, MotionSample::new(0.1, 0.2, 0.3));
    }

    #[test]
    fn rejects_invalid_windows() {
        assert!(GateWindow::new(0.2, 0.2).is_err());
        assert!(GateWindow::new(0.3, 0.2).is_err());
        assert!(GateWindow::new(-0.1, 0.2).is_err());
        assert!(GateWindow::new(0.0, f64::NAN).is_err());
    }

    #[test]
    fn follows_reference_trace_exactly() {
        let (mut processor, _, _) = processor(0.05, 0.2);
        let out = run(&mut processor, &[0.05, 0.3, 0.28, 0.1]);

        assert_eq!(out[0], 0.0);
        assert_eq!(out[1], 0.0);
        assert_eq!(out[2], 0.0);
        assert!((out[3] - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn suppresses_peak_descent() {
        let (mut processor, _, _) = processor(0.1, 0.25);
        let out = run(&mut processor, &[0.15, 0.4, 0.2, 0.2]);

        assert!((out[0] - (0.05 / 0.15)).abs() < 1e-9);
        assert_eq!(out[1], 0.0);
        assert_eq!(out[2], 0.0, "first in-window sample after the peak");
        assert!((out[3] - (0.1 / 0.15)).abs() < 1e-9);
    }

    #[test]
    fn peak_inside_window_is_not_suppressed() {
        let (mut processor, _, _) = processor(0.1, 0.5);
        let out = run(&mut processor, &[0.2, 0.4, 0.3]);
        assert!(out[2] > 0.0);
    }

    #[test]
    fn invalid_sample_leaves_state_untouched() {
        let (mut processor, _, gain) = processor(0.1, 0.5);
        processor.process(along_x(0.3)).unwrap();
        let before = *processor.state();

        let err = processor
            .process(MotionSample::new(f64::NAN, 0.0, 0.0))
            .unwrap_err();
        assert!(matches!(err, ScorpionError::InvalidSample(_)));
        assert!(processor
            .process(MotionSample::new(0.0, f64::INFINITY, 0.0))
            .is_err());

        assert_eq!(*processor.state(), before);
        assert_eq!(gain.load(), before.normalized);
    }

    #[test]
    fn writes_gain_and_level() {
        let gate = shared_gate(GateWindow::new(0.0, 1.0).unwrap());
        let gain = IntensityCell::new();
        let level = IntensityCell::new();
        let mut processor = MotionProcessor::new(gate, gain.clone(), level.clone());

        processor.process(along_x(0.5)).unwrap();
        assert_eq!(gain.take(), 0.5);
        assert_eq!(level.load(), 0.5);

        processor.process(along_x(2.0)).unwrap();
        assert_eq!(gain.load(), 0.0);
        assert_eq!(level.load(), 0.0);
    }

    #[test]
    fn window_swap_keeps_history() {
        let (mut processor, gate, _) = processor(0.0, 1.0);
        processor.process(along_x(0.5)).unwrap();
        let history = *processor.state();

        gate.store(Arc::new(GateWindow::new(0.4, 0.6).unwrap()));
        assert_eq!(*processor.state(), history);

        let out = processor.process(along_x(0.5)).unwrap();
        assert!((out - 0.5).abs() < 1e-9);
        assert_eq!(processor.state().previous, 0.5);
    }

    proptest! {
        #[test]
        fn normalized_stays_in_unit_interval(
            samples in prop::collection::vec((-5.0f64..5.0, -5.0f64..5.0, -5.0f64..5.0), 1..64),
            min in 0.0f64..1.0,
            width in 0.001f64..2.0,
        ) {
            let (mut processor, _, _) = processor(min, min + width);
            for (x, y, z) in samples {
                let out = processor.process(MotionSample::new(x, y, z)).unwrap();
                prop_assert!((0.0..=1.0).contains(&out));
                prop_assert_eq!(out, processor.state().normalized);
            }
        }
    }
}
