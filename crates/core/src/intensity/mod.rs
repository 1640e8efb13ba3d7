use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

/// Lock-free single-slot cell holding an `f64` intensity.
///
/// One writer stores, readers load, and exactly one reader may `take` (swap
/// with zero). Clones share the same slot.
#[derive(Clone, Default)]
pub struct IntensityCell {
    bits: Arc<AtomicU64>,
}

impl IntensityCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self, value: f64) {
        self.bits.store(value.to_bits(), Ordering::Release);
    }

    pub fn load(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Acquire))
    }

    /// Returns the current value and resets the slot to zero.
    pub fn take(&self) -> f64 {
        f64::from_bits(self.bits.swap(0.0_f64.to_bits(), Ordering::AcqRel))
    }
}

impl std::fmt::Debug for IntensityCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("IntensityCell").field(&self.load()).finish()
    }
}
