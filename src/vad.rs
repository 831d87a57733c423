//! Frame-level voice activity detection with hysteresis.

use crate::energy::{channel_slice, energy_db};
use crate::frame::Frame;
use crate::noise_floor::NoiseFloorTracker;

/// dB the frame average must clear above the noise floor to count as speech.
const ENERGY_VAD_MARGIN_DB: f32 = 10.0;
/// dB an individual channel must clear above the noise floor to count as active.
const CHANNEL_VAD_MARGIN_DB: f32 = 6.0;

/// Two-feature VAD decision with frame-count hysteresis, mirroring the
/// reference `detect_voice_activity()` but writing into an owned, mutable
/// frame instead of mutating through a const-qualified pointer.
#[derive(Debug)]
pub struct Vad {
    channels: u8,
    frame_threshold: u32,
    vad_frame_count: u32,
    vad_active: bool,
}

/// Outcome of one VAD pass, returned alongside the mutated frame so the
/// processor can decide whether to feed the noise-floor tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VadOutcome {
    pub active: bool,
    /// The hysteresis state *before* this frame's update — the noise floor
    /// must gate on this, not `active`, so a rising-edge frame's own (loud)
    /// energy still gets folded in, matching `voice_core.c`'s ordering of
    /// reading `ctx->vad_active` before reassigning it.
    pub was_active: bool,
    pub rising_edge: bool,
}

impl Vad {
    pub fn new(channels: u8, frame_threshold: u32) -> Self {
        Vad {
            channels,
            frame_threshold,
            vad_frame_count: 0,
            vad_active: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.vad_active
    }

    /// Clears hysteresis state, used by [`crate::context::VoiceContext::reset`].
    pub fn reset(&mut self) {
        self.vad_frame_count = 0;
        self.vad_active = false;
    }

    /// Computes per-channel and average energy, decides VAD, and writes the
    /// result into `frame`. The noise-floor update (if any) is the caller's
    /// responsibility, gated on `VadOutcome::was_active` — the flag *before*
    /// this frame's hysteresis update, not `active`, which already reflects
    /// it.
    pub fn process(&mut self, frame: &mut Frame, noise_floor: &NoiseFloorTracker) -> VadOutcome {
        let was_active = self.vad_active;

        let mut active_channels = 0u32;
        let mut sum_db = 0.0f32;
        for ch in 0..self.channels {
            let samples = channel_slice(&frame.samples, ch, self.channels);
            let db = energy_db(&samples);
            frame.energy_db[ch as usize] = db;
            sum_db += db;
            if db > noise_floor.floor_db() + CHANNEL_VAD_MARGIN_DB {
                active_channels += 1;
            }
        }
        let avg_energy_db = sum_db / self.channels as f32;

        let energy_vad = avg_energy_db > noise_floor.floor_db() + ENERGY_VAD_MARGIN_DB;
        let channel_vad = active_channels as usize >= self.channels as usize / 2;

        if energy_vad && channel_vad {
            self.vad_frame_count += 1;
        } else {
            self.vad_frame_count = 0;
        }
        self.vad_active = self.vad_frame_count >= self.frame_threshold;
        frame.vad_active = self.vad_active;

        VadOutcome {
            active: self.vad_active,
            was_active,
            rising_edge: self.vad_active && !was_active,
        }
    }

    pub fn avg_energy_db(frame: &Frame) -> f32 {
        if frame.energy_db.is_empty() {
            return f32::NEG_INFINITY;
        }
        frame.energy_db.iter().sum::<f32>() / frame.energy_db.len() as f32
    }
}
