//! Monotonic counters and running averages, single-writer (the processor).

/// Snapshot of the pipeline's health counters. Cheap to clone — callers get
/// a copy, never a live view.
#[derive(Debug, Clone, Default)]
pub struct Stats {
    pub frames_processed: u64,
    pub buffer_overruns: u64,
    pub vad_activations: u64,
    pub wake_detections: u64,
    pub avg_energy_db: f32,
    pub noise_floor_db: f32,
    pub cpu_usage_percent: f32,
    /// Per-channel diagnostics, supplementing the distilled counters with
    /// the reference driver's `dc_offset[]` / `clipping_count[]` fields.
    pub dc_offset: Vec<f32>,
    pub clipping_count: Vec<u32>,
}

impl Stats {
    pub fn new(channels: u8) -> Self {
        Stats {
            dc_offset: vec![0.0; channels as usize],
            clipping_count: vec![0; channels as usize],
            ..Default::default()
        }
    }

    /// Clears every counter except the noise-floor estimate, which survives
    /// a `reset()` — matching the reference `voice_reset()`'s explicit
    /// re-assignment of `stats.noise_floor_db` from the live tracker after
    /// zeroing the rest of the struct.
    pub fn reset_keep_noise_floor(&mut self) {
        let noise_floor_db = self.noise_floor_db;
        let channels = self.dc_offset.len() as u8;
        *self = Stats::new(channels);
        self.noise_floor_db = noise_floor_db;
    }
}
