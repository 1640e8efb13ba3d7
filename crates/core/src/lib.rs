//! Core library for the Scorpion motion-reactive granular synthesizer.
//!
//! Acceleration samples flow through the [`MotionProcessor`], which gates
//! their magnitude into a normalized intensity. A [`GrainScheduler`] polls
//! that intensity on a fixed period and asks the [`GrainVoice`] for a grain
//! whenever it is non-zero. Live parameter changes arrive through the
//! [`ParameterRegistry`]. [`SynthSession`] wires one device's worth of these
//! together.

pub mod assets;
pub mod audio;
pub mod config;
pub mod error;
pub mod intensity;
pub mod motion;
pub mod params;
pub mod record;
pub mod render;
pub mod scaler;
pub mod session;
pub mod timeline;
pub mod voice;

pub use assets::{BufferStore, SoundBuffer};
pub use audio::{AudioClock, AudioOutput, GrainLog, ManualClock};
pub use config::{AppConfig, AudioConfig, EngineConfig, Preset, SynthPreset};
pub use error::{Result, ScorpionError};
pub use intensity::IntensityCell;
pub use motion::{GateWindow, MagnitudeState, MotionProcessor, MotionSample};
pub use params::{ParamValue, ParameterRegistry};
pub use record::{Bounce, RecordingSettings};
pub use render::IntensityView;
pub use scaler::Scaler;
pub use session::{SessionBuilder, SessionParts, SynthSession};
pub use timeline::{GrainScheduler, GrainState, Scheduler, TimedTask};
pub use voice::{AudioGrainDescriptor, Envelope, GrainVoice, VoiceControls, VoiceParams};
