use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{AudioGrainDescriptor, Result, ScorpionError};

/// Output settings for an offline bounce.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingSettings {
    pub sample_rate: u32,
}

impl Default for RecordingSettings {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
        }
    }
}

/// Mono mixdown of rendered grains placed at their output-clock start times.
#[derive(Debug, Clone)]
pub struct Bounce {
    settings: RecordingSettings,
    samples: Vec<f32>,
    grains: usize,
}

impl Bounce {
    pub fn new(settings: RecordingSettings) -> Result<Self> {
        if settings.sample_rate == 0 {
            return Err(ScorpionError::config("bounce sample rate must be > 0"));
        }
        Ok(Self {
            settings,
            samples: Vec::new(),
            grains: 0,
        })
    }

    pub fn add(&mut self, grain: &AudioGrainDescriptor) {
        let rate = self.settings.sample_rate;
        let start = (grain.start_time.max(0.0) * rate as f64).round() as usize;
        let rendered = grain.render(rate);

        let end = start + rendered.len();
        if self.samples.len() < end {
            self.samples.resize(end, 0.0);
        }
        for (slot, sample) in self.samples[start..end].iter_mut().zip(rendered) {
            *slot += sample;
        }
        self.grains += 1;
    }

    pub fn extend<'a>(&mut self, grains: impl IntoIterator<Item = &'a AudioGrainDescriptor>) {
        for grain in grains {
            self.add(grain);
        }
    }

    /// Pads the mixdown with silence up to `seconds`.
    pub fn pad_to(&mut self, seconds: f64) {
        let len = (seconds.max(0.0) * self.settings.sample_rate as f64).round() as usize;
        if self.samples.len() < len {
            self.samples.resize(len, 0.0);
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn grain_count(&self) -> usize {
        self.grains
    }

    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0_f32, |peak, s| peak.max(s.abs()))
    }

    pub fn duration_seconds(&self) -> f64 {
        self.samples.len() as f64 / self.settings.sample_rate as f64
    }

    /// Writes the mixdown as 32-bit float mono WAV.
    pub fn write_wav(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.settings.sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };

        let mut writer = hound::WavWriter::create(path, spec)?;
        for sample in &self.samples {
            writer.write_sample(*sample)?;
        }
        writer.finalize()?;

        tracing::info!(
            ?path,
            grains = self.grains,
            seconds = self.duration_seconds(),
            "wrote bounce"
        );
        Ok(())
    }
}
