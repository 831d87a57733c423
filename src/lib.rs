//! Real-time voice front end for a multi-microphone embedded terminal.
//!
//! This crate ingests interleaved PCM frames from a capture driver it does
//! not own, beamforms them down to mono, runs voice-activity detection with
//! hysteresis, scores a pluggable wake-word backend, and drives a bounded
//! recording session through an explicit state machine. The audio driver,
//! the wake-word neural inference backend, and anything downstream of a
//! finished recording are all out of scope — this crate only consumes a
//! `ScoreBackend` capability and produces PCM plus session events.

pub mod beamformer;
pub mod buffer;
pub mod config;
pub mod context;
pub mod energy;
pub mod error;
pub mod features;
pub mod frame;
pub mod noise_floor;
pub mod queue;
pub mod state;
pub mod stats;
pub mod timers;
pub mod vad;
pub mod wakeword;

pub use config::{Config, ConfigError, MicPosition, ModelFormat, WakeWordSeed};
pub use context::VoiceContext;
pub use error::{Result, VoiceError};
pub use frame::RawFrame;
pub use state::SessionState;
pub use stats::Stats;
pub use wakeword::{ScoreBackend, ScoreResult, WakeWordModel};
