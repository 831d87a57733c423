//! Synthetic signal generator standing in for the audio capture driver.
//!
//! Feeds silence, then a steady tone, through a [`VoiceContext`] and logs
//! every session-state transition and stats snapshot it observes — useful
//! for exercising the pipeline end to end without real hardware.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::info;

use micarray_voice_core::{Config, RawFrame, ScoreBackend, ScoreResult, SessionState, VoiceContext};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Pattern {
    /// Constant zero samples; exercises noise-floor convergence only.
    Silence,
    /// Low-amplitude white noise around the configured noise floor.
    Noise,
    /// A loud fixed-amplitude tone, well above any plausible noise floor.
    Tone,
}

#[derive(Parser)]
#[command(name = "voice-demo")]
#[command(about = "Drives the voice pipeline with synthetic frames; no real audio hardware required")]
struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Signal pattern to feed for the demo's duration
    #[arg(long, value_enum, default_value = "tone")]
    pattern: Pattern,

    /// Number of channels to simulate (must match mic array geometry)
    #[arg(long, default_value = "4")]
    channels: u8,

    /// How long to run the demo, in seconds
    #[arg(long, default_value = "5")]
    duration_secs: u64,

    /// Register a fixed-confidence wake-word backend to demonstrate the
    /// full Listening -> WakeDetected -> Recording -> Processing path.
    /// Off by default: the pipeline's real behavior with no backend
    /// registered is to never detect a wake word, which is itself worth
    /// observing.
    #[arg(long)]
    simulate_wake_word: bool,
}

/// A fixed-confidence backend for demo purposes only, never used when the
/// crate is embedded elsewhere. Always reports the same model at the same
/// confidence once enabled, unlike the pipeline's own `NullBackend` default.
struct FixedConfidenceBackend {
    model_name: String,
    confidence: f32,
}

impl ScoreBackend for FixedConfidenceBackend {
    fn score(&self, _features: &[f32]) -> Option<ScoreResult> {
        Some(ScoreResult {
            model_name: self.model_name.clone(),
            confidence: self.confidence,
        })
    }
}

fn generate_samples(pattern: Pattern, channels: u8, frame_length: usize, t: u64) -> Vec<i16> {
    let mut samples = Vec::with_capacity(frame_length * channels as usize);
    for i in 0..frame_length {
        let value = match pattern {
            Pattern::Silence => 0,
            Pattern::Noise => {
                let n = (t as usize + i).wrapping_mul(2654435761) >> 16;
                ((n % 2000) as i16) - 1000
            }
            Pattern::Tone => {
                let phase = (t as usize + i) as f32 * 0.1;
                (phase.sin() * 20000.0) as i16
            }
        };
        for _ in 0..channels {
            samples.push(value);
        }
    }
    samples
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let mut config = Config {
        channels: args.channels,
        ..Config::default()
    };
    config.mic_positions = (0..args.channels)
        .map(|i| micarray_voice_core::MicPosition {
            x: 0.03 * (i as f32 - (args.channels as f32 - 1.0) / 2.0),
            y: 0.0,
            z: 0.0,
        })
        .collect();

    info!("starting synthetic feed: pattern={:?} channels={} duration={}s", args.pattern, args.channels, args.duration_secs);

    let context = VoiceContext::init(config.clone()).context("failed to initialize voice context")?;

    if args.simulate_wake_word {
        context
            .register_wake_word(micarray_voice_core::WakeWordModel {
                name: "demo".to_string(),
                threshold: 0.5,
                sensitivity: 0.5,
                model_ref: "demo://fixed".to_string(),
                format: micarray_voice_core::ModelFormat::RawNn,
                detections: 0,
                last_detection_ms: None,
            })
            .context("failed to register demo wake word")?;
        context
            .set_wake_word_backend(FixedConfidenceBackend {
                model_name: "demo".to_string(),
                confidence: 0.9,
            })
            .context("failed to install demo wake-word backend")?;
        info!("registered fixed-confidence demo backend (model=\"demo\")");
    }

    context.register_wake_word_callback(|name, confidence| {
        info!("wake word detected: model={name} confidence={confidence:.3}");
    });

    let frame_ms = (config.frame_length as u64 * 1000) / config.sample_rate as u64;
    let total_frames = (args.duration_secs * 1000) / frame_ms.max(1);

    let mut last_state = context.get_state();
    for frame_idx in 0..total_frames {
        let timestamp_ms = frame_idx * frame_ms;
        let samples = generate_samples(args.pattern, args.channels, config.frame_length, timestamp_ms);
        let raw = RawFrame { samples, timestamp_ms };
        if let Err(e) = context.submit_frame(raw) {
            log::warn!("submit_frame failed: {e}");
        }

        let state = context.get_state();
        if state != last_state {
            info!("state transition: {last_state} -> {state}");
            last_state = state;
        }
        if state == SessionState::Processing {
            let mut out = vec![0u8; 1 << 20];
            let written = context.get_recording(&mut out)?;
            info!("retrieved recording: {written} bytes");
        }

        std::thread::sleep(Duration::from_millis(frame_ms));
    }

    let stats = context.get_stats();
    info!(
        "final stats: frames={} overruns={} vad_activations={} wake_detections={} noise_floor_db={:.1}",
        stats.frames_processed,
        stats.buffer_overruns,
        stats.vad_activations,
        stats.wake_detections,
        stats.noise_floor_db
    );

    Ok(())
}
