//! The pipeline's unit of work: a fixed-length block of interleaved PCM.

/// A frame as submitted by the producer, before any DSP has run.
#[derive(Debug, Clone)]
pub struct RawFrame {
    /// Interleaved 16-bit signed PCM, `frame_length * channels` samples.
    pub samples: Vec<i16>,
    /// Monotonic capture time of the first sample, in milliseconds.
    pub timestamp_ms: u64,
}

/// A frame after the VAD pass has annotated it. Owned exclusively by the
/// processor task for the duration of one pipeline iteration — there is no
/// aliased immutable view floating around elsewhere.
#[derive(Debug, Clone)]
pub struct Frame {
    pub samples: Vec<i16>,
    pub timestamp_ms: u64,
    pub energy_db: Vec<f32>,
    pub vad_active: bool,
}

impl Frame {
    pub fn from_raw(raw: RawFrame, channels: u8) -> Self {
        Frame {
            samples: raw.samples,
            timestamp_ms: raw.timestamp_ms,
            energy_db: vec![f32::NEG_INFINITY; channels as usize],
            vad_active: false,
        }
    }

    pub fn channel_samples(&self, channel: u8, channels: u8) -> impl Iterator<Item = i16> + '_ {
        let channels = channels as usize;
        let channel = channel as usize;
        self.samples[channel..]
            .iter()
            .step_by(channels)
            .copied()
    }
}
