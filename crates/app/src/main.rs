use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use clap::{Parser, Subcommand};
use rand::{rngs::StdRng, Rng, SeedableRng};
use scorpion_core::{
    AppConfig, Bounce, BufferStore, GrainLog, ManualClock, MotionSample, RecordingSettings,
    ScorpionError, SoundBuffer, SynthSession,
};
use tracing_subscriber::EnvFilter;

fn main() -> scorpion_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate(args) => run_simulate(args),
        Commands::Config => {
            println!("{}", AppConfig::default().to_json()?);
            Ok(())
        }
    }
}

fn run_simulate(args: SimulateArgs) -> scorpion_core::Result<()> {
    let config = match &args.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    if !(args.sensor_rate.is_finite() && args.sensor_rate > 0.0) {
        return Err(ScorpionError::config("--sensor-rate must be positive"));
    }

    let seed = args.seed.unwrap_or_else(|| rand::thread_rng().gen());
    tracing::info!(preset = %args.preset, seed, "starting simulation");
    let mut rng = StdRng::seed_from_u64(seed);

    let mut buffers = BufferStore::with_white_noise(
        &mut rng,
        config.audio.sample_rate,
        config.audio.noise_seconds,
    )?;
    for label in config.sounds.iter().skip(1) {
        buffers.declare(label.as_str());
    }
    for sound in &args.sounds {
        let (label, path) = parse_sound(sound)?;
        let index = buffers.load(&label, load_wav(&path)?)?;
        tracing::info!(%label, ?path, index, "loaded sound");
    }

    let samples = match &args.trace {
        Some(path) => load_trace(path)?,
        None => synthetic_shake(&mut rng, &config, args.duration, args.sensor_rate),
    };

    let clock = ManualClock::new();
    let log = GrainLog::new();
    let mut session = SynthSession::builder(&config)
        .preset(args.preset.as_str())
        .seed(rng.gen())
        .start(buffers, Arc::new(clock.clone()), Arc::new(log.clone()))?;

    let step = 1.0 / args.sensor_rate;
    let mut dropped = 0usize;
    let mut active = 0usize;
    for (i, sample) in samples.iter().enumerate() {
        let arrival = i as f64 * step;
        run_ticks_until(&mut session, &clock, arrival);
        match session.process_sample(*sample) {
            Ok(level) if level > 0.0 => active += 1,
            Ok(_) => {}
            Err(err) => {
                dropped += 1;
                tracing::warn!(%err, index = i, "skipping sample");
            }
        }
    }
    let end = samples.len() as f64 * step;
    run_ticks_until(&mut session, &clock, end);

    let grains = log.drain()?;
    tracing::info!(grains = grains.len(), samples = samples.len(), "simulation finished");

    let mut peak = None;
    if let Some(path) = &args.wav {
        let mut bounce = Bounce::new(RecordingSettings {
            sample_rate: config.audio.sample_rate,
        })?;
        bounce.extend(grains.iter());
        bounce.pad_to(end);
        bounce.write_wav(path)?;
        peak = Some(bounce.peak());
    }

    let summary = serde_json::json!({
        "seed": seed,
        "preset": args.preset,
        "seconds": end,
        "samples": samples.len(),
        "dropped_samples": dropped,
        "active_samples": active,
        "grains": grains.len(),
        "gate": { "min": session.gate().min(), "max": session.gate().max() },
        "voice": session.voice_params(),
        "wav": args.wav,
        "peak": peak,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

/// Fires every scheduler tick up to `until`, moving the output clock to each
/// tick's time first.
fn run_ticks_until(session: &mut SynthSession, clock: &ManualClock, until: f64) {
    while let Some(next) = session.next_tick() {
        if next > until {
            break;
        }
        clock.set(next);
        session.run_until(next);
    }
}

/// Rest punctuated by shaking bursts. Bursts wobble around the gate window
/// and now and then spike above it.
fn synthetic_shake(
    rng: &mut StdRng,
    config: &AppConfig,
    seconds: f64,
    sensor_rate: f64,
) -> Vec<MotionSample> {
    let min = config.engine.min_magnitude;
    let max = config.engine.max_magnitude;
    let center = (min + max) * 0.5;
    let width = max - min;
    let count = (seconds.max(0.0) * sensor_rate).round() as usize;

    (0..count)
        .map(|i| {
            let t = i as f64 / sensor_rate;
            let in_burst = t.rem_euclid(1.5) < 0.6;
            let magnitude = if !in_burst {
                rng.gen::<f64>() * min * 0.5
            } else if rng.gen_bool(0.05) {
                max + width * rng.gen_range(0.5_f64..3.0)
            } else {
                center + width * 0.6 * (t * 40.0).sin() + width * rng.gen_range(-0.2_f64..0.2)
            };
            random_direction(rng) * magnitude.max(0.0)
        })
        .map(|(x, y, z)| MotionSample::new(x, y, z))
        .collect()
}

fn random_direction(rng: &mut StdRng) -> Direction {
    loop {
        let (x, y, z) = (
            rng.gen_range(-1.0_f64..1.0),
            rng.gen_range(-1.0_f64..1.0),
            rng.gen_range(-1.0_f64..1.0),
        );
        let norm = (x * x + y * y + z * z).sqrt();
        if norm > 1e-3 && norm <= 1.0 {
            return Direction(x / norm, y / norm, z / norm);
        }
    }
}

struct Direction(f64, f64, f64);

impl std::ops::Mul<f64> for Direction {
    type Output = (f64, f64, f64);

    fn mul(self, magnitude: f64) -> Self::Output {
        (self.0 * magnitude, self.1 * magnitude, self.2 * magnitude)
    }
}

/// Reads a JSON array of `[x, y, z]` rows. Short rows are skipped.
fn load_trace(path: &Path) -> scorpion_core::Result<Vec<MotionSample>> {
    let rows: Vec<Vec<f64>> = serde_json::from_str(&std::fs::read_to_string(path)?)?;
    let samples: Vec<MotionSample> = rows
        .iter()
        .enumerate()
        .filter_map(|(i, row)| match MotionSample::from_slice(row) {
            Ok(sample) => Some(sample),
            Err(err) => {
                tracing::warn!(%err, row = i, "skipping trace row");
                None
            }
        })
        .collect();
    tracing::info!(?path, samples = samples.len(), "loaded motion trace");
    Ok(samples)
}

fn parse_sound(arg: &str) -> scorpion_core::Result<(String, PathBuf)> {
    arg.split_once('=')
        .map(|(label, path)| (label.trim().to_string(), PathBuf::from(path.trim())))
        .filter(|(label, _)| !label.is_empty())
        .ok_or_else(|| ScorpionError::config(format!("expected LABEL=PATH, got `{arg}`")))
}

/// Decodes a WAV file into a mono buffer, averaging channels.
fn load_wav(path: &Path) -> scorpion_core::Result<SoundBuffer> {
    let mut reader = hound::WavReader::open(path)?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
        hound::SampleFormat::Int => {
            let scale = 1.0 / (1_i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .samples::<i32>()
                .map(|sample| sample.map(|s| s as f32 * scale))
                .collect::<Result<_, _>>()?
        }
    };

    let mono: Vec<f32> = interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect();
    SoundBuffer::new(mono, spec.sample_rate)
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Motion-reactive granular synthesizer", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Drive a session offline from a motion trace or synthetic shaking.
    Simulate(SimulateArgs),
    /// Print the default configuration as JSON.
    Config,
}

#[derive(clap::Args, Debug)]
struct SimulateArgs {
    /// JSON configuration file; defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Preset to apply on startup.
    #[arg(short, long, default_value = "white noise")]
    preset: String,
    /// Length of the synthetic motion stream, in seconds.
    #[arg(short, long, default_value_t = 10.0)]
    duration: f64,
    /// Rate at which motion samples arrive, in Hz.
    #[arg(long, default_value_t = 50.0)]
    sensor_rate: f64,
    /// JSON array of `[x, y, z]` samples to replay instead of synthetic motion.
    #[arg(short, long)]
    trace: Option<PathBuf>,
    /// Sound buffers as `LABEL=PATH.wav`; labels must appear in the config's
    /// sound list. Sounds left unloaded play nothing.
    #[arg(long = "sound")]
    sounds: Vec<String>,
    /// Seed for reproducible runs.
    #[arg(long)]
    seed: Option<u64>,
    /// Write the rendered grains to this WAV file.
    #[arg(short, long)]
    wav: Option<PathBuf>,
}
