use std::sync::Arc;

use arc_swap::ArcSwap;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::{assets::SoundBuffer, intensity::IntensityCell, BufferStore, Result};

/// Audible window of every grain, measured from the trigger instant.
pub const GRAIN_DURATION: f64 = 0.2;
/// Linear attack at the start of each grain.
pub const GRAIN_ATTACK: f64 = 0.02;

const MIN_GAIN: f64 = 0.001;
const HEADROOM: f64 = 0.5;
const CENTS_PER_OCTAVE: f64 = 1200.0;

/// Synthesis parameters picked up at the next trigger.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VoiceParams {
    pub buffer_index: usize,
    pub pitch_shift_cents: f64,
    pub pitch_variance_cents: f64,
}

/// Cloneable handle for changing [`VoiceParams`] from another thread.
///
/// Every setter swaps in a new params value, so a trigger always sees a
/// consistent snapshot and grains already handed out are never touched.
#[derive(Debug, Clone, Default)]
pub struct VoiceControls {
    params: Arc<ArcSwap<VoiceParams>>,
}

impl VoiceControls {
    pub fn params(&self) -> VoiceParams {
        **self.params.load()
    }

    pub fn set_buffer(&self, index: usize) {
        self.params.rcu(|p| {
            Arc::new(VoiceParams {
                buffer_index: index,
                ..**p
            })
        });
        tracing::debug!(index, "voice buffer selected");
    }

    pub fn set_resampling(&self, cents: f64) {
        self.params.rcu(|p| {
            Arc::new(VoiceParams {
                pitch_shift_cents: cents,
                ..**p
            })
        });
        tracing::debug!(cents, "voice pitch shift updated");
    }

    /// Negative spreads are stored as their magnitude.
    pub fn set_resampling_var(&self, cents: f64) {
        let cents = cents.abs();
        self.params.rcu(|p| {
            Arc::new(VoiceParams {
                pitch_variance_cents: cents,
                ..**p
            })
        });
        tracing::debug!(cents, "voice pitch variance updated");
    }
}

/// Piecewise-linear grain envelope: 0 → peak over the attack, peak → 0 at the
/// end of the grain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Envelope {
    pub peak_gain: f64,
    pub attack: f64,
    pub duration: f64,
}

impl Envelope {
    pub fn gain_at(&self, t: f64) -> f64 {
        if !(0.0..self.duration).contains(&t) {
            0.0
        } else if t < self.attack {
            self.peak_gain * t / self.attack
        } else {
            self.peak_gain * (self.duration - t) / (self.duration - self.attack)
        }
    }
}

/// Everything an output device needs to play one grain. Fire-and-forget: the
/// engine does not track the grain once it is handed out.
#[derive(Debug, Clone)]
pub struct AudioGrainDescriptor {
    pub buffer_index: usize,
    pub buffer: SoundBuffer,
    /// Output-clock time the grain starts playing.
    pub start_time: f64,
    /// Output-clock time the grain is cut, independent of the buffer offset.
    pub stop_time: f64,
    /// Read position into the buffer, in seconds.
    pub buffer_offset: f64,
    pub playback_rate: f64,
    pub envelope: Envelope,
}

impl AudioGrainDescriptor {
    /// Renders the grain to mono samples at `sample_rate`, reading the
    /// buffer with linear interpolation. Reads past the buffer end are silent.
    pub fn render(&self, sample_rate: u32) -> Vec<f32> {
        let len = ((self.stop_time - self.start_time).max(0.0) * sample_rate as f64).round() as usize;
        let source = self.buffer.samples();
        let source_rate = self.buffer.sample_rate() as f64;
        let start = self.buffer_offset * source_rate;

        (0..len)
            .map(|i| {
                let t = i as f64 / sample_rate as f64;
                let position = start + t * self.playback_rate * source_rate;
                let index = position.floor();
                if index < 0.0 || index as usize + 1 >= source.len() {
                    return 0.0;
                }
                let index = index as usize;
                let frac = (position - index as f64) as f32;
                let sample = source[index] + (source[index + 1] - source[index]) * frac;
                sample * self.envelope.gain_at(t) as f32
            })
            .collect()
    }
}

/// Plays grains from a buffer store, driven by the gain slot the motion
/// processor writes into.
#[derive(Debug)]
pub struct GrainVoice {
    buffers: BufferStore,
    controls: VoiceControls,
    gain: IntensityCell,
    rng: StdRng,
}

impl GrainVoice {
    pub fn new(buffers: BufferStore, gain: IntensityCell) -> Self {
        Self::with_rng(buffers, gain, StdRng::from_entropy())
    }

    pub fn with_rng(buffers: BufferStore, gain: IntensityCell, rng: StdRng) -> Self {
        Self {
            buffers,
            controls: VoiceControls::default(),
            gain,
            rng,
        }
    }

    pub fn controls(&self) -> VoiceControls {
        self.controls.clone()
    }

    pub fn buffers(&self) -> &BufferStore {
        &self.buffers
    }

    /// Current value of the gain slot, without consuming it.
    pub fn gain(&self) -> f64 {
        self.gain.load()
    }

    pub fn set_buffer(&self, index: usize) {
        self.controls.set_buffer(index);
    }

    pub fn set_resampling(&self, cents: f64) {
        self.controls.set_resampling(cents);
    }

    pub fn set_resampling_var(&self, cents: f64) {
        self.controls.set_resampling_var(cents);
    }

    /// Consumes the gain slot and describes a grain starting at `clock_time`
    /// on the output clock. Returns `Ok(None)` when there is nothing to play.
    ///
    /// A missing buffer still consumes the gain; that tick stays silent.
    pub fn trigger(&mut self, clock_time: f64) -> Result<Option<AudioGrainDescriptor>> {
        let gain = self.gain.take();
        if gain.is_nan() || gain <= 0.0 {
            return Ok(None);
        }

        let params = self.controls.params();
        let buffer = self.buffers.get(params.buffer_index)?.clone();

        let peak_gain = gain.clamp(MIN_GAIN, 1.0) * HEADROOM;

        let latest_offset = (buffer.duration_seconds() - GRAIN_DURATION).max(0.0);
        let buffer_offset = (1.0 + self.rng.gen::<f64>()).clamp(0.0, latest_offset);

        // uniform in [-var, +var/2)
        let spread = params.pitch_variance_cents;
        let variance = -spread + self.rng.gen::<f64>() * 1.5 * spread;
        let playback_rate = 2f64.powf((params.pitch_shift_cents + variance) / CENTS_PER_OCTAVE);

        tracing::debug!(
            clock_time,
            buffer = params.buffer_index,
            peak_gain,
            buffer_offset,
            playback_rate,
            "grain triggered"
        );

        Ok(Some(AudioGrainDescriptor {
            buffer_index: params.buffer_index,
            buffer,
            start_time: clock_time,
            stop_time: clock_time + GRAIN_DURATION,
            buffer_offset,
            playback_rate,
            envelope: Envelope {
                peak_gain,
                attack: GRAIN_ATTACK,
                duration: GRAIN_DURATION,
            },
        }))
    }
}
