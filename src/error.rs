use thiserror::Error;

/// Result alias used throughout this crate.
pub type Result<T> = std::result::Result<T, VoiceError>;

/// Errors the voice pipeline can report.
///
/// Per-frame DSP failures never surface here — they are recovered locally
/// and counted in [`crate::stats::Stats`]. These variants are the ones a
/// caller of the public contract can actually observe.
#[derive(Debug, Error)]
pub enum VoiceError {
    #[error("invalid parameter: {0}")]
    InvalidParam(String),

    #[error("operation not valid in current state ({0:?})")]
    InvalidState(crate::state::SessionState),

    #[error("buffer overflow: {0}")]
    BufferOverflow(String),

    #[error("out of memory during initialization: {0}")]
    OutOfMemory(String),

    #[error("wake-word backend failure: {0}")]
    BackendFailure(String),

    #[error("fatal internal error: {0}")]
    Fatal(String),

    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

impl VoiceError {
    pub fn invalid_param(msg: impl Into<String>) -> Self {
        VoiceError::InvalidParam(msg.into())
    }
}
