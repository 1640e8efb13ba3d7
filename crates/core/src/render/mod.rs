use crate::intensity::IntensityCell;

/// Read-only handle for visual collaborators. It exposes the latest
/// normalized intensity written by the motion processor.
///
/// Reading never consumes the value, unlike the grain scheduler's gain slot.
#[derive(Debug, Clone)]
pub struct IntensityView {
    level: IntensityCell,
}

impl IntensityView {
    pub(crate) fn new(level: IntensityCell) -> Self {
        Self { level }
    }

    /// Latest normalized value in `[0, 1]`.
    pub fn level(&self) -> f64 {
        self.level.load()
    }
}
