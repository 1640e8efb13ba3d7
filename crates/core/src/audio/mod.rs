use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex, MutexGuard,
};

use crate::{AudioGrainDescriptor, Result, ScorpionError};

/// Real-time clock of the output device, in seconds.
pub trait AudioClock: Send + Sync {
    fn current_time(&self) -> f64;
}

/// Destination for triggered grains. Scheduling is fire-and-forget: the
/// engine never tracks or cancels a grain after handing it over.
pub trait AudioOutput: Send + Sync {
    fn schedule(&self, grain: AudioGrainDescriptor);
}

/// Clock that only moves when told to. Offline rendering and tests drive the
/// engine with it; clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    bits: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, seconds: f64) {
        self.bits.store(seconds.to_bits(), Ordering::Release);
    }

    pub fn advance(&self, delta: f64) {
        self.set((self.current_time() + delta).max(0.0));
    }
}

impl AudioClock for ManualClock {
    fn current_time(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Acquire))
    }
}

/// Output that records every scheduled grain. Clones share the log.
#[derive(Clone, Default)]
pub struct GrainLog {
    grains: Arc<Mutex<Vec<AudioGrainDescriptor>>>,
}

impl GrainLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.lock()?.is_empty())
    }

    /// Removes and returns everything recorded so far.
    pub fn drain(&self) -> Result<Vec<AudioGrainDescriptor>> {
        let mut grains = self.lock()?;
        Ok(std::mem::take(&mut *grains))
    }

    pub fn snapshot(&self) -> Result<Vec<AudioGrainDescriptor>> {
        Ok(self.lock()?.clone())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<AudioGrainDescriptor>>> {
        self.grains
            .lock()
            .map_err(|_| ScorpionError::Poisoned("grain log"))
    }
}

impl AudioOutput for GrainLog {
    fn schedule(&self, grain: AudioGrainDescriptor) {
        match self.lock() {
            Ok(mut grains) => grains.push(grain),
            Err(err) => tracing::warn!(%err, "dropping grain"),
        }
    }
}

impl std::fmt::Debug for GrainLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GrainLog").field("grains", &self.len().ok()).finish()
    }
}
