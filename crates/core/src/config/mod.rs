use std::{collections::BTreeMap, path::Path};

use serde::{Deserialize, Serialize};

use crate::{timeline::DEFAULT_PERIOD, GateWindow, Result, ScorpionError};

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub audio: AudioConfig,
    /// Buffer labels in store order; index 0 is the generated noise.
    pub sounds: Vec<String>,
    pub presets: BTreeMap<String, Preset>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            audio: AudioConfig::default(),
            sounds: ["white noise", "monks", "cornemuse", "tuba", "organ"]
                .into_iter()
                .map(String::from)
                .collect(),
            presets: default_presets(),
        }
    }
}

impl AppConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        tracing::info!(?path, "loading configuration");
        Self::from_json_str(&std::fs::read_to_string(path)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        self.engine.gate_window()?;
        if !(self.engine.period_seconds.is_finite() && self.engine.period_seconds > 0.0) {
            return Err(ScorpionError::config(format!(
                "engine.period_seconds must be positive, got {}",
                self.engine.period_seconds
            )));
        }
        if self.audio.sample_rate == 0 {
            return Err(ScorpionError::config("audio.sample_rate must be > 0"));
        }
        if !(self.audio.noise_seconds.is_finite() && self.audio.noise_seconds > 0.0) {
            return Err(ScorpionError::config("audio.noise_seconds must be positive"));
        }
        for (name, preset) in &self.presets {
            if !self.sounds.contains(&preset.synth.file) {
                return Err(ScorpionError::config(format!(
                    "preset `{name}` refers to unknown sound `{}`",
                    preset.synth.file
                )));
            }
        }
        Ok(())
    }

    pub fn preset(&self, name: &str) -> Result<&Preset> {
        self.presets
            .get(name)
            .ok_or_else(|| ScorpionError::config(format!("unknown preset `{name}`")))
    }
}

/// Signal-processing and scheduling settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub period_seconds: f64,
    pub min_magnitude: f64,
    pub max_magnitude: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            period_seconds: DEFAULT_PERIOD,
            min_magnitude: 0.05,
            max_magnitude: 0.1,
        }
    }
}

impl EngineConfig {
    pub fn gate_window(&self) -> Result<GateWindow> {
        GateWindow::new(self.min_magnitude, self.max_magnitude)
    }
}

/// Configuration specific to the audio subsystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    /// Length of the generated white-noise buffer.
    pub noise_seconds: f64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            noise_seconds: 2.0,
        }
    }
}

/// Per-placement look and sound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    pub colors: Vec<String>,
    pub synth: SynthPreset,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthPreset {
    pub file: String,
    /// Pitch shift in cents.
    pub resampling: f64,
    /// Pitch spread in cents.
    pub resampling_var: f64,
}

fn default_presets() -> BTreeMap<String, Preset> {
    [
        ("white noise", ["#ffffff", "#000000"], 0.0, 300.0),
        ("tuba", ["#ff537e", "#74ffff"], 1200.0, 100.0),
        ("monks", ["#ffff00", "#ff6100"], 400.0, 600.0),
        ("organ", ["#ffff00", "#bfff00"], 1000.0, 400.0),
        ("cornemuse", ["#bfff00", "#74ffff"], 300.0, 200.0),
    ]
    .into_iter()
    .map(|(name, colors, resampling, resampling_var)| {
        (
            name.to_string(),
            Preset {
                colors: colors.into_iter().map(String::from).collect(),
                synth: SynthPreset {
                    file: name.to_string(),
                    resampling,
                    resampling_var,
                },
            },
        )
    })
    .collect()
}
