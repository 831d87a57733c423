//! Wake-word scoring adapter: a thin, *total* bridge from features to an
//! optional detection. The neural decision itself is an external
//! capability — see `Non-goals` / `Open questions` in the specification
//! this crate implements; the absence of a real backend must never crash
//! or silently simulate a detection.

use std::collections::VecDeque;

use crate::config::{ModelFormat, WakeWordSeed, MAX_WAKE_WORDS};
use crate::error::{Result, VoiceError};

/// One scored result from a backend.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreResult {
    pub model_name: String,
    pub confidence: f32,
}

/// Capability a wake-word neural backend must provide. The core never
/// parses model blobs — `load`/`unload` only exchange opaque references.
pub trait ScoreBackend: Send {
    fn score(&self, features: &[f32]) -> Option<ScoreResult>;
}

/// Default backend: total by construction. Detections never fire until a
/// caller registers a real backend.
#[derive(Debug, Default)]
pub struct NullBackend;

impl ScoreBackend for NullBackend {
    fn score(&self, _features: &[f32]) -> Option<ScoreResult> {
        None
    }
}

/// Per-model registry entry, including the bookkeeping this crate
/// supplements beyond the distilled spec's `Stats`.
#[derive(Debug, Clone)]
pub struct WakeWordModel {
    pub name: String,
    pub threshold: f32,
    pub sensitivity: f32,
    pub model_ref: String,
    pub format: ModelFormat,
    pub detections: u64,
    pub last_detection_ms: Option<u64>,
}

impl From<WakeWordSeed> for WakeWordModel {
    fn from(seed: WakeWordSeed) -> Self {
        WakeWordModel {
            name: seed.name,
            threshold: seed.threshold,
            sensitivity: seed.sensitivity,
            model_ref: seed.model_ref,
            format: seed.format,
            detections: 0,
            last_detection_ms: None,
        }
    }
}

/// Margin applied when translating the global sensitivity knob into an
/// effective per-model threshold: `effective = threshold * (1 - s*margin)`.
const SENSITIVITY_MARGIN: f32 = 0.5;

/// Ordered wake-word registry plus a short pooling window smoothing the
/// backend's raw per-frame confidence, grounded in the reference engine's
/// `WAKE_WORD_POOLING_SIZE`.
pub struct WakeWordRegistry {
    models: Vec<WakeWordModel>,
    backend: Box<dyn ScoreBackend>,
    pool: VecDeque<f32>,
    pool_size: usize,
    global_sensitivity: f32,
}

impl WakeWordRegistry {
    pub fn new(pool_size: usize) -> Self {
        WakeWordRegistry {
            models: Vec::new(),
            backend: Box::new(NullBackend),
            pool: VecDeque::with_capacity(pool_size),
            pool_size,
            global_sensitivity: 0.5,
        }
    }

    pub fn set_backend(&mut self, backend: Box<dyn ScoreBackend>) {
        self.backend = backend;
    }

    pub fn models(&self) -> &[WakeWordModel] {
        &self.models
    }

    pub fn register(&mut self, model: WakeWordModel) -> Result<()> {
        if self.models.len() >= MAX_WAKE_WORDS {
            return Err(VoiceError::invalid_param(format!(
                "wake-word registry full (max {MAX_WAKE_WORDS})"
            )));
        }
        if !(0.0..=1.0).contains(&model.threshold) {
            return Err(VoiceError::invalid_param("threshold must be in [0, 1]"));
        }
        self.models.push(model);
        Ok(())
    }

    pub fn set_sensitivity(&mut self, s: f32) -> Result<()> {
        if !(0.0..=1.0).contains(&s) {
            return Err(VoiceError::invalid_param("sensitivity must be in [0, 1]"));
        }
        self.global_sensitivity = s;
        Ok(())
    }

    fn effective_threshold(&self, threshold: f32) -> f32 {
        threshold * (1.0 - self.global_sensitivity * SENSITIVITY_MARGIN)
    }

    /// Scores one analysis frame's features, pools the raw confidence over
    /// a short window, and checks it against the first registered model
    /// whose effective threshold is cleared (ties broken by registration
    /// order). Increments per-model bookkeeping on a hit but never touches
    /// global pipeline state — the caller (the processor) decides what a
    /// detection means for the session state machine.
    pub fn score_frame(&mut self, features: &[f32], timestamp_ms: u64) -> Option<ScoreResult> {
        let raw = self.backend.score(features)?;

        if self.pool.len() == self.pool_size {
            self.pool.pop_front();
        }
        self.pool.push_back(raw.confidence);
        let pooled: f32 = self.pool.iter().sum::<f32>() / self.pool.len() as f32;

        let model = self
            .models
            .iter_mut()
            .find(|m| m.name == raw.model_name)?;

        if pooled >= self.effective_threshold(model.threshold) {
            model.detections += 1;
            model.last_detection_ms = Some(timestamp_ms);
            Some(ScoreResult {
                model_name: model.name.clone(),
                confidence: pooled,
            })
        } else {
            None
        }
    }

    pub fn reset_pool(&mut self) {
        self.pool.clear();
    }
}
