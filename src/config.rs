//! Pipeline configuration.
//!
//! Scoped to the DSP parameters the core owns (sample rate, geometry,
//! thresholds) — not API keys or transport settings, which live outside
//! this crate's boundary.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while constructing or validating a [`Config`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("sample_rate must be one of 8000, 16000, 32000, 48000 (got {0})")]
    InvalidSampleRate(u32),

    #[error("channels must be in 1..=CHANNELS_MAX ({0} given, max {1})")]
    InvalidChannelCount(u8, u8),

    #[error("frame_length must be positive (got {0})")]
    InvalidFrameLength(usize),

    #[error("mic_positions length ({0}) does not match channels ({1})")]
    MicPositionsMismatch(usize, u8),

    #[error("wake_words length ({0}) exceeds MAX_WAKE_WORDS ({1})")]
    TooManyWakeWords(usize, usize),

    #[error("recording_capacity_seconds must be > 0 (got {0})")]
    InvalidRecordingCapacity(f32),
}

/// Maximum number of simultaneously registered wake-word models.
pub const MAX_WAKE_WORDS: usize = 4;

/// Upper bound on supported channel count.
pub const CHANNELS_MAX: u8 = 8;

/// A microphone's position relative to the array's reference origin, in meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MicPosition {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// Model data format for a registered wake-word backend, matching the
/// reference engine's `wake_model_format_t`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, Serialize, Deserialize)]
pub enum ModelFormat {
    Onnx,
    Tflite,
    HailoHef,
    RawNn,
}

/// Seed entry for the wake-word registry, supplied at config time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WakeWordSeed {
    pub name: String,
    pub threshold: f32,
    pub sensitivity: f32,
    pub model_ref: String,
    pub format: ModelFormat,
}

/// Full pipeline configuration. Constructed once; the context is immutable
/// over its shape (channel count, frame length) for its whole lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub sample_rate: u32,
    pub channels: u8,
    pub frame_length: usize,
    pub mic_positions: Vec<MicPosition>,
    pub beamform_adaptive_mode: bool,
    pub wake_words: Vec<WakeWordSeed>,
    pub vad_frame_threshold: u32,
    pub noise_floor_initial_db: f32,
    pub wake_timeout_ms: u64,
    pub recording_capacity_seconds: f32,
    pub frame_queue_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            sample_rate: 16_000,
            channels: 4,
            frame_length: 480,
            mic_positions: vec![
                MicPosition { x: 0.03, y: 0.0, z: 0.0 },
                MicPosition { x: -0.03, y: 0.0, z: 0.0 },
                MicPosition { x: 0.0, y: 0.03, z: 0.0 },
                MicPosition { x: 0.0, y: -0.03, z: 0.0 },
            ],
            beamform_adaptive_mode: false,
            wake_words: Vec::new(),
            vad_frame_threshold: 3,
            noise_floor_initial_db: -40.0,
            wake_timeout_ms: 7_000,
            recording_capacity_seconds: 10.0,
            frame_queue_capacity: 8,
        }
    }
}

impl Config {
    /// Validates internal consistency. Called by [`crate::context::VoiceContext::init`]
    /// before any buffer is allocated.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !matches!(self.sample_rate, 8000 | 16000 | 32000 | 48000) {
            return Err(ConfigError::InvalidSampleRate(self.sample_rate));
        }
        if self.channels == 0 || self.channels > CHANNELS_MAX {
            return Err(ConfigError::InvalidChannelCount(self.channels, CHANNELS_MAX));
        }
        if self.frame_length == 0 {
            return Err(ConfigError::InvalidFrameLength(self.frame_length));
        }
        if self.mic_positions.len() != self.channels as usize {
            return Err(ConfigError::MicPositionsMismatch(
                self.mic_positions.len(),
                self.channels,
            ));
        }
        if self.wake_words.len() > MAX_WAKE_WORDS {
            return Err(ConfigError::TooManyWakeWords(
                self.wake_words.len(),
                MAX_WAKE_WORDS,
            ));
        }
        if self.recording_capacity_seconds <= 0.0 {
            return Err(ConfigError::InvalidRecordingCapacity(
                self.recording_capacity_seconds,
            ));
        }
        Ok(())
    }

    pub fn recording_capacity_samples(&self) -> usize {
        (self.sample_rate as f32 * self.recording_capacity_seconds) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn rejects_bad_sample_rate() {
        let mut cfg = Config::default();
        cfg.sample_rate = 44_100;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidSampleRate(44_100))
        ));
    }

    #[test]
    fn rejects_mic_position_mismatch() {
        let mut cfg = Config::default();
        cfg.channels = 2;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::MicPositionsMismatch(4, 2))
        ));
    }

    #[test]
    fn rejects_zero_frame_length() {
        let mut cfg = Config::default();
        cfg.frame_length = 0;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidFrameLength(0))
        ));
    }

    #[test]
    fn recording_capacity_samples_matches_rate_and_duration() {
        let cfg = Config::default();
        assert_eq!(cfg.recording_capacity_samples(), 160_000);
    }
}
