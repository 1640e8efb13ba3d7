use std::sync::Arc;

use rand::{rngs::StdRng, SeedableRng};

use crate::{
    intensity::IntensityCell,
    motion::{shared_gate, SharedGate},
    params::{names, Listener, ParamValue},
    voice::VoiceControls,
    AppConfig, AudioClock, AudioOutput, BufferStore, GateWindow, GrainScheduler, GrainState,
    GrainVoice, IntensityView, MotionProcessor, MotionSample, ParameterRegistry, Result,
    Scheduler, ScorpionError, VoiceParams,
};

/// Configures and starts a [`SynthSession`].
#[derive(Debug)]
pub struct SessionBuilder<'a> {
    config: &'a AppConfig,
    preset: Option<String>,
    seed: Option<u64>,
}

impl<'a> SessionBuilder<'a> {
    pub fn new(config: &'a AppConfig) -> Self {
        Self {
            config,
            preset: None,
            seed: None,
        }
    }

    /// Preset applied once the parameter listeners are bound.
    pub fn preset(mut self, name: impl Into<String>) -> Self {
        self.preset = Some(name.into());
        self
    }

    /// Seeds the voice's random source for reproducible grains.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Validates the configuration and starts the session. Configuration
    /// errors surface here, before any sample is processed.
    pub fn start(
        self,
        buffers: BufferStore,
        clock: Arc<dyn AudioClock>,
        output: Arc<dyn AudioOutput>,
    ) -> Result<SynthSession> {
        self.config.validate()?;
        let preset = self
            .preset
            .as_deref()
            .map(|name| self.config.preset(name))
            .transpose()?;

        let gate = shared_gate(self.config.engine.gate_window()?);
        let gain = IntensityCell::new();
        let level = IntensityCell::new();
        let processor = MotionProcessor::new(gate.clone(), gain.clone(), level.clone());

        check_store_order(&self.config.sounds, &buffers)?;
        let labels = self.config.sounds.clone();
        let rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let voice = GrainVoice::with_rng(buffers, gain.clone(), rng);
        let controls = voice.controls();

        let grain_scheduler = GrainScheduler::new(
            voice,
            clock.clone(),
            output,
            self.config.engine.period_seconds,
        )?;

        let mut registry = ParameterRegistry::new();
        bind_listeners(&mut registry, &gate, &controls, labels);

        if let Some(preset) = preset {
            tracing::info!(file = %preset.synth.file, "applying preset");
            registry.publish(names::AUDIO_FILE, preset.synth.file.as_str(), None);
            registry.publish(names::PITCH, preset.synth.resampling, None);
            registry.publish(names::PITCH_VAR, preset.synth.resampling_var, None);
        }

        let mut scheduler = Scheduler::new();
        let start_time = clock.current_time();
        scheduler.add(Box::new(grain_scheduler), start_time);
        tracing::info!(
            start_time,
            period = self.config.engine.period_seconds,
            "synthesis session started"
        );

        Ok(SynthSession {
            processor,
            scheduler,
            registry,
            view: IntensityView::new(level),
            gain,
            gate,
            controls,
        })
    }
}

/// A running synthesis session.
///
/// Every piece can be driven from one thread through the session itself, or
/// split with [`SynthSession::into_parts`] so the sensor, audio and control
/// threads each own theirs.
#[derive(Debug)]
pub struct SynthSession {
    processor: MotionProcessor,
    scheduler: Scheduler,
    registry: ParameterRegistry,
    view: IntensityView,
    gain: IntensityCell,
    gate: SharedGate,
    controls: VoiceControls,
}

/// Independently owned pieces of a session.
#[derive(Debug)]
pub struct SessionParts {
    pub processor: MotionProcessor,
    pub scheduler: Scheduler,
    pub registry: ParameterRegistry,
    pub view: IntensityView,
}

impl SynthSession {
    pub fn builder(config: &AppConfig) -> SessionBuilder<'_> {
        SessionBuilder::new(config)
    }

    pub fn process_sample(&mut self, sample: MotionSample) -> Result<f64> {
        self.processor.process(sample)
    }

    pub fn publish(&self, name: &str, value: impl Into<ParamValue>, aux_index: Option<usize>) -> usize {
        self.registry.publish(name, value, aux_index)
    }

    /// Runs every scheduler tick due at or before `now`.
    pub fn run_until(&mut self, now: f64) -> usize {
        self.scheduler.run_until(now)
    }

    pub fn next_tick(&self) -> Option<f64> {
        self.scheduler.next_time()
    }

    pub fn view(&self) -> IntensityView {
        self.view.clone()
    }

    pub fn state(&self) -> GrainState {
        if self.gain.load() > 0.0 {
            GrainState::Armed
        } else {
            GrainState::Idle
        }
    }

    pub fn processor(&self) -> &MotionProcessor {
        &self.processor
    }

    pub fn gate(&self) -> Arc<GateWindow> {
        self.gate.load_full()
    }

    pub fn voice_params(&self) -> VoiceParams {
        self.controls.params()
    }

    pub fn registry(&self) -> &ParameterRegistry {
        &self.registry
    }

    pub fn into_parts(self) -> SessionParts {
        SessionParts {
            processor: self.processor,
            scheduler: self.scheduler,
            registry: self.registry,
            view: self.view,
        }
    }
}

/// The store's slots must follow `sounds`, so a label always resolves to the
/// slot holding that sound. Trailing sounds may be absent from the store.
fn check_store_order(sounds: &[String], buffers: &BufferStore) -> Result<()> {
    for (index, name) in buffers.names().enumerate() {
        if sounds.get(index).map(String::as_str) != Some(name) {
            return Err(ScorpionError::config(format!(
                "sound buffer `{name}` at index {index} is not listed there in config sounds"
            )));
        }
    }
    Ok(())
}

fn bind_listeners(
    registry: &mut ParameterRegistry,
    gate: &SharedGate,
    controls: &VoiceControls,
    labels: Vec<String>,
) {
    registry.register(
        names::MIN_MAGNITUDE,
        window_listener(gate.clone(), names::MIN_MAGNITUDE, GateWindow::with_min),
    );
    registry.register(
        names::MAX_MAGNITUDE,
        window_listener(gate.clone(), names::MAX_MAGNITUDE, GateWindow::with_max),
    );

    let voice = controls.clone();
    let audio_file: Listener = Arc::new(move |value: &ParamValue, aux_index: Option<usize>| {
        let by_label = value
            .as_choice()
            .and_then(|label| labels.iter().position(|known| known == label));
        let by_number = value
            .as_number()
            .filter(|n| *n >= 0.0 && n.fract() == 0.0)
            .map(|n| n as usize);

        match by_label.or(by_number).or(aux_index) {
            Some(index) => voice.set_buffer(index),
            None => tracing::warn!(?value, "unknown audio file, keeping current buffer"),
        }
    });
    registry.register(names::AUDIO_FILE, audio_file);

    let voice = controls.clone();
    registry.register(
        names::PITCH,
        number_listener(names::PITCH, move |cents| voice.set_resampling(cents)),
    );

    let voice = controls.clone();
    registry.register(
        names::PITCH_VAR,
        number_listener(names::PITCH_VAR, move |cents| voice.set_resampling_var(cents)),
    );
}

fn number_listener(
    name: &'static str,
    apply: impl Fn(f64) + Send + Sync + 'static,
) -> Listener {
    Arc::new(move |value: &ParamValue, _: Option<usize>| match value.as_number() {
        Some(number) if number.is_finite() => apply(number),
        _ => tracing::warn!(name, ?value, "ignoring non-numeric parameter value"),
    })
}

/// Listener that swaps in a rebuilt gate window. Invalid windows are rejected
/// and the current one stays in place.
fn window_listener(
    gate: SharedGate,
    name: &'static str,
    rebuild: fn(&GateWindow, f64) -> Result<GateWindow>,
) -> Listener {
    number_listener(name, move |bound| {
        gate.rcu(|current| match rebuild(current, bound) {
            Ok(window) => Arc::new(window),
            Err(err) => {
                tracing::warn!(%err, name, bound, "rejecting gate window update");
                Arc::clone(current)
            }
        });
        let window = gate.load();
        tracing::debug!(min = window.min(), max = window.max(), "gate window updated");
    })
}
