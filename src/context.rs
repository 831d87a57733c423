//! The opaque, owning pipeline handle: [`VoiceContext`]. Construction
//! allocates every buffer and spawns the one processor thread; `Drop` stops
//! it, joins it, then releases the buffers — there is no other lifecycle
//! entry point, matching the "opaque context with explicit lifecycle"
//! design note.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;

use crate::beamformer::Beamformer;
use crate::buffer::{CircularBuffer, RecordingBuffer};
use crate::config::{Config, MAX_WAKE_WORDS};
use crate::error::{Result, VoiceError};
use crate::features::{FeatureConfig, FeatureExtractor};
use crate::frame::{Frame, RawFrame};
use crate::noise_floor::NoiseFloorTracker;
use crate::queue::{Command, CommandQueue, FrameQueue};
use crate::stats::Stats;
use crate::state::{transition, Event, SessionAux, SessionState};
use crate::timers::TimeoutService;
use crate::vad::Vad;
use crate::wakeword::{ScoreBackend, WakeWordModel, WakeWordRegistry};

/// How often the processor wakes up even with no frame pending, to drain
/// control commands promptly (e.g. an explicit `reset()` should not wait
/// for the next frame to arrive).
const COMMAND_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Wake-word pooling window, grounded in the reference engine's
/// `WAKE_WORD_POOLING_SIZE`.
const WAKE_WORD_POOL_SIZE: usize = 8;

struct SessionShared {
    state: SessionState,
    aux: SessionAux,
    recording: RecordingBuffer,
}

type AudioCallback = Box<dyn Fn(&[i16], u8) + Send>;
type WakeWordCallback = Box<dyn Fn(&str, f32) + Send>;

/// The public pipeline handle. All fields besides the processor's own
/// private DSP state are shared via locks the processor and caller threads
/// both use — see the crate-level concurrency notes in `SPEC_FULL.md` §5.
pub struct VoiceContext {
    config: Config,
    frame_queue: Arc<FrameQueue>,
    command_queue_sender: crossbeam_channel::Sender<Command>,
    circular_buffer: Arc<CircularBuffer>,
    shared: Arc<Mutex<SessionShared>>,
    stats: Arc<Mutex<Stats>>,
    wake_word_count: Arc<AtomicUsize>,
    audio_callback: Arc<Mutex<Option<AudioCallback>>>,
    wake_word_callback: Arc<Mutex<Option<WakeWordCallback>>>,
    processor_handle: Option<JoinHandle<()>>,
}

impl VoiceContext {
    /// Allocates every buffer from `config` and spawns the processor
    /// thread. No further allocation happens in steady state.
    pub fn init(config: Config) -> Result<Self> {
        config.validate()?;

        let frame_queue = Arc::new(FrameQueue::new(config.frame_queue_capacity));
        let command_queue = CommandQueue::new(32);
        let command_queue_sender = command_queue.sender();
        let circular_buffer = Arc::new(CircularBuffer::new(
            config.recording_capacity_samples() * config.channels as usize,
            config.channels,
        ));
        let shared = Arc::new(Mutex::new(SessionShared {
            state: SessionState::initial(),
            aux: SessionAux {
                max_recording_duration_ms: (config.recording_capacity_seconds * 1000.0) as u64,
                ..Default::default()
            },
            recording: RecordingBuffer::new(config.recording_capacity_samples()),
        }));
        let mut stats = Stats::new(config.channels);
        stats.noise_floor_db = config.noise_floor_initial_db;
        let stats = Arc::new(Mutex::new(stats));
        let audio_callback: Arc<Mutex<Option<AudioCallback>>> = Arc::new(Mutex::new(None));
        let wake_word_callback: Arc<Mutex<Option<WakeWordCallback>>> = Arc::new(Mutex::new(None));
        let wake_word_count = Arc::new(AtomicUsize::new(config.wake_words.len()));

        let mut processor = Processor {
            config: config.clone(),
            frame_queue: Arc::clone(&frame_queue),
            command_queue,
            circular_buffer: Arc::clone(&circular_buffer),
            shared: Arc::clone(&shared),
            stats: Arc::clone(&stats),
            audio_callback: Arc::clone(&audio_callback),
            wake_word_callback: Arc::clone(&wake_word_callback),
            vad: Vad::new(config.channels, config.vad_frame_threshold),
            noise_floor: NoiseFloorTracker::new(config.noise_floor_initial_db),
            beamformer: Beamformer::new(config.mic_positions.clone(), config.sample_rate),
            feature_extractor: FeatureExtractor::new(FeatureConfig {
                sample_rate: config.sample_rate,
                ..Default::default()
            }),
            wake_words: WakeWordRegistry::new(WAKE_WORD_POOL_SIZE),
            timeout_service: TimeoutService::new(command_queue_sender.clone()),
            shutdown: false,
            last_frame_ms: 0,
        };
        for seed in config.wake_words.clone() {
            let _ = processor.wake_words.register(WakeWordModel::from(seed));
        }

        let processor_handle = thread::Builder::new()
            .name("voice-processor".into())
            .spawn(move || processor.run())
            .map_err(|e| VoiceError::Fatal(format!("failed to spawn processor thread: {e}")))?;

        Ok(VoiceContext {
            config,
            frame_queue,
            command_queue_sender,
            circular_buffer,
            shared,
            stats,
            wake_word_count,
            audio_callback,
            wake_word_callback,
            processor_handle: Some(processor_handle),
        })
    }

    /// Non-blocking enqueue of a captured frame. On overrun, increments
    /// `stats.buffer_overruns` from the calling thread — this is the one
    /// counter not owned exclusively by the processor, since an overrun is
    /// detected at the moment of a failed enqueue, before the processor
    /// ever sees the frame.
    pub fn submit_frame(&self, raw: RawFrame) -> Result<()> {
        if raw.samples.len() != self.config.frame_length as usize * self.config.channels as usize {
            return Err(VoiceError::invalid_param(
                "frame length does not match configured frame_length * channels",
            ));
        }
        if !self.frame_queue.enqueue(raw) {
            self.stats.lock().buffer_overruns += 1;
            return Err(VoiceError::BufferOverflow(
                "frame queue is full".to_string(),
            ));
        }
        Ok(())
    }

    pub fn get_state(&self) -> SessionState {
        self.shared.lock().state
    }

    pub fn start_recording(&self, max_duration_ms: u64) -> Result<()> {
        let state = self.shared.lock().state;
        if !matches!(state, SessionState::Idle | SessionState::WakeDetected) {
            return Err(VoiceError::InvalidState(state));
        }
        self.send_command(Command::StartRecording { max_duration_ms })
    }

    pub fn stop_recording(&self) -> Result<()> {
        self.send_command(Command::StopRecording)
    }

    /// Copies up to `out.len()` bytes of mono little-endian PCM, clears the
    /// recording, and transitions `PROCESSING -> IDLE`. This one read-path
    /// also mutates session state, but only ever while the processor is
    /// already quiescent with respect to the recording buffer (state is
    /// `PROCESSING`, the one state the processor itself never appends to),
    /// so taking the lock directly here — rather than a full command
    /// round-trip — cannot race with the processor's own writes.
    pub fn get_recording(&self, out: &mut [u8]) -> Result<usize> {
        let mut guard = self.shared.lock();
        let written = guard.recording.drain_into(out);
        guard.state = SessionState::Idle;
        Ok(written)
    }

    pub fn set_beam_direction(&self, degrees: f32) -> Result<()> {
        if !(0.0..360.0).contains(&degrees) {
            return Err(VoiceError::invalid_param(format!(
                "beam direction must be in [0, 360), got {degrees}"
            )));
        }
        self.send_command(Command::SetBeamDirection { degrees })
    }

    pub fn set_adaptive_beam(&self, enabled: bool) -> Result<()> {
        self.send_command(Command::SetAdaptiveBeam(enabled))
    }

    pub fn register_wake_word(&self, model: WakeWordModel) -> Result<()> {
        if !(0.0..=1.0).contains(&model.threshold) {
            return Err(VoiceError::invalid_param("threshold must be in [0, 1]"));
        }
        let previous = self.wake_word_count.fetch_add(1, Ordering::SeqCst);
        if previous >= MAX_WAKE_WORDS {
            self.wake_word_count.fetch_sub(1, Ordering::SeqCst);
            return Err(VoiceError::invalid_param(format!(
                "wake-word registry full (max {MAX_WAKE_WORDS})"
            )));
        }
        self.send_command(Command::RegisterWakeWord(model))
    }

    pub fn set_sensitivity(&self, s: f32) -> Result<()> {
        if !(0.0..=1.0).contains(&s) {
            return Err(VoiceError::invalid_param("sensitivity must be in [0, 1]"));
        }
        self.send_command(Command::SetSensitivity(s))
    }

    pub fn set_noise_suppression(&self, level: f32) -> Result<()> {
        if !(0.0..=1.0).contains(&level) {
            return Err(VoiceError::invalid_param("noise suppression must be in [0, 1]"));
        }
        self.send_command(Command::SetNoiseSuppression(level))
    }

    pub fn calibrate_noise(&self, duration_ms: u64) -> Result<()> {
        if duration_ms < 100 {
            return Err(VoiceError::invalid_param("calibration must run for >= 100ms"));
        }
        self.send_command(Command::CalibrateNoise { duration_ms })
    }

    pub fn get_stats(&self) -> Stats {
        self.stats.lock().clone()
    }

    pub fn reset(&self) -> Result<()> {
        self.send_command(Command::Reset)
    }

    pub fn register_audio_callback(&self, callback: impl Fn(&[i16], u8) + Send + 'static) {
        *self.audio_callback.lock() = Some(Box::new(callback));
    }

    /// Registers a callback invoked once per wake-word detection, with the
    /// matched model's name and the pooled confidence that cleared its
    /// effective threshold.
    pub fn register_wake_word_callback(&self, callback: impl Fn(&str, f32) + Send + 'static) {
        *self.wake_word_callback.lock() = Some(Box::new(callback));
    }

    /// Installs the scoring backend consulted for every `Listening`-state
    /// frame. Routed through the command queue like any other processor
    /// mutation, since the backend lives inside the processor's own
    /// `WakeWordRegistry`.
    pub fn set_wake_word_backend(&self, backend: impl ScoreBackend + 'static) -> Result<()> {
        self.send_command(Command::SetWakeWordBackend(Box::new(backend)))
    }

    fn send_command(&self, command: Command) -> Result<()> {
        self.command_queue_sender
            .send(command)
            .map_err(|_| VoiceError::Fatal("processor thread is not running".to_string()))
    }
}

impl Drop for VoiceContext {
    fn drop(&mut self) {
        let _ = self.command_queue_sender.send(Command::Shutdown);
        // Dropping the frame queue's sender side would require owning it;
        // the processor's shutdown path checks for a disconnected frame
        // queue too, so closing this handle here is sufficient to wake it.
        if let Some(handle) = self.processor_handle.take() {
            let _ = handle.join();
        }
        let _ = (&self.frame_queue, &self.circular_buffer);
    }
}

struct Processor {
    config: Config,
    frame_queue: Arc<FrameQueue>,
    command_queue: CommandQueue,
    circular_buffer: Arc<CircularBuffer>,
    shared: Arc<Mutex<SessionShared>>,
    stats: Arc<Mutex<Stats>>,
    audio_callback: Arc<Mutex<Option<AudioCallback>>>,
    wake_word_callback: Arc<Mutex<Option<WakeWordCallback>>>,
    vad: Vad,
    noise_floor: NoiseFloorTracker,
    beamformer: Beamformer,
    feature_extractor: FeatureExtractor,
    wake_words: WakeWordRegistry,
    timeout_service: TimeoutService,
    shutdown: bool,
    /// Timestamp of the most recently processed frame, used as "now" for
    /// commands handled between frames — commands carry no timestamp of
    /// their own, so they borrow the capture clock instead of inventing a
    /// separate wall-clock source.
    last_frame_ms: u64,
}

impl Processor {
    fn run(&mut self) {
        loop {
            self.drain_commands();
            if self.shutdown {
                break;
            }
            if matches!(self.shared.lock().state, SessionState::Error) {
                // Only reset()/deinit() are valid from ERROR; keep draining
                // commands without touching frames.
                thread::sleep(COMMAND_POLL_INTERVAL);
                continue;
            }

            match self.frame_queue.dequeue_timeout(COMMAND_POLL_INTERVAL) {
                Some(raw) => self.process_frame(raw),
                None => continue,
            }
        }
        log::info!("voice processor thread exiting");
    }

    fn drain_commands(&mut self) {
        while let Some(command) = self.command_queue.try_recv() {
            self.handle_command(command);
        }
    }

    fn handle_command(&mut self, command: Command) {
        let now_ms = self.last_frame_ms;
        match command {
            Command::Shutdown => {
                self.shutdown = true;
            }
            Command::StartRecording { max_duration_ms } => {
                let mut guard = self.shared.lock();
                if matches!(guard.state, SessionState::Idle | SessionState::WakeDetected) {
                    guard.aux.max_recording_duration_ms = max_duration_ms;
                    guard.recording.reset();
                    guard.state = SessionState::Recording;
                    guard.aux.recording_start_time_ms = Some(now_ms);
                }
            }
            Command::StopRecording => {
                let mut guard = self.shared.lock();
                if guard.state == SessionState::Recording {
                    guard.state = transition(
                        guard.state,
                        Event::StopRecordingRequested,
                        &mut guard.aux,
                        now_ms,
                    );
                }
            }
            Command::SetBeamDirection { degrees } => {
                if let Err(e) = self.beamformer.set_steering_angle(degrees) {
                    log::warn!("set_beam_direction rejected: {e}");
                }
            }
            Command::SetAdaptiveBeam(enabled) => self.beamformer.set_adaptive_mode(enabled),
            Command::SetSensitivity(s) => {
                if let Err(e) = self.wake_words.set_sensitivity(s) {
                    log::warn!("set_sensitivity rejected: {e}");
                }
            }
            Command::SetNoiseSuppression(_level) => {
                // Tuning knob only; no DSP stage currently branches on it,
                // matching the reference implementation's placeholder.
            }
            Command::CalibrateNoise { duration_ms } => self.calibrate_noise(duration_ms),
            Command::RegisterWakeWord(model) => {
                if let Err(e) = self.wake_words.register(model) {
                    log::warn!("register_wake_word rejected: {e}");
                }
            }
            Command::SetWakeWordBackend(backend) => self.wake_words.set_backend(backend),
            Command::Reset => self.do_reset(),
            Command::WakeTimeoutExpired { armed_at_ms } => {
                let mut guard = self.shared.lock();
                let still_pending = guard.state == SessionState::WakeDetected
                    && guard.aux.last_wake_time_ms == Some(armed_at_ms);
                if still_pending {
                    guard.state =
                        transition(guard.state, Event::WakeTimeoutFired, &mut guard.aux, armed_at_ms);
                }
            }
        }
    }

    fn calibrate_noise(&mut self, duration_ms: u64) {
        let deadline = Duration::from_millis(duration_ms);
        let start = std::time::Instant::now();
        let mut samples_sum = 0.0f64;
        let mut samples_count = 0u64;
        while start.elapsed() < deadline {
            if let Some(raw) = self.frame_queue.dequeue_timeout(Duration::from_millis(20)) {
                let frame = Frame::from_raw(raw, self.config.channels);
                let db = crate::energy::energy_db(&frame.samples) as f64;
                samples_sum += db;
                samples_count += 1;
            }
        }
        if samples_count > 0 {
            self.noise_floor.set((samples_sum / samples_count as f64) as f32);
        } else {
            self.noise_floor.set(self.config.noise_floor_initial_db);
        }
    }

    fn do_reset(&mut self) {
        self.vad.reset();
        self.wake_words.reset_pool();
        let mut guard = self.shared.lock();
        guard.state = SessionState::Idle;
        guard.aux.recording_start_time_ms = None;
        guard.recording.reset();
        drop(guard);
        self.stats.lock().reset_keep_noise_floor();
    }

    fn process_frame(&mut self, raw: RawFrame) {
        let started_at = std::time::Instant::now();
        self.last_frame_ms = raw.timestamp_ms;
        let mut frame = Frame::from_raw(raw, self.config.channels);

        let mono = self.beamformer.mixdown(&frame.samples);
        let vad_outcome = self.vad.process(&mut frame, &self.noise_floor);

        {
            let mut stats = self.stats.lock();
            stats.frames_processed += 1;
            stats.avg_energy_db = Vad::avg_energy_db(&frame);
            for ch in 0..self.config.channels {
                let channel_samples =
                    crate::energy::channel_slice(&frame.samples, ch, self.config.channels);
                stats.dc_offset[ch as usize] = crate::energy::dc_offset(&channel_samples);
                stats.clipping_count[ch as usize] += crate::energy::clipping_count(&channel_samples);
            }
            if vad_outcome.rising_edge {
                stats.vad_activations += 1;
            }
        }

        // Gate on the *previous* frame's VAD state, not this frame's: a
        // rising-edge frame's energy still folds into the floor, matching
        // the reference's read-before-reassign ordering on `vad_active`.
        if !vad_outcome.was_active {
            self.noise_floor.update(Vad::avg_energy_db(&frame));
        }
        self.stats.lock().noise_floor_db = self.noise_floor.floor_db();

        self.advance_state_machine(&frame, &mono);

        if !self.circular_buffer.write_frame(&frame.samples) {
            self.stats.lock().buffer_overruns += 1;
        }

        if let Some(cb) = self.audio_callback.lock().as_ref() {
            cb(&frame.samples, self.config.channels);
        }

        self.update_cpu_usage(started_at.elapsed());
    }

    /// EMA of wall-clock processing time against the frame's real-time
    /// budget (`frame_length / sample_rate`), as a rough load indicator —
    /// the reference only ever assigns a fixed placeholder here, but the
    /// timing to compute a real one is already on hand from this frame's
    /// own processing.
    fn update_cpu_usage(&mut self, elapsed: Duration) {
        const CPU_USAGE_EMA_ALPHA: f32 = 0.9;
        let frame_budget_ms =
            self.config.frame_length as f32 * 1000.0 / self.config.sample_rate as f32;
        let busy_percent = (elapsed.as_secs_f32() * 1000.0 / frame_budget_ms) * 100.0;
        let mut stats = self.stats.lock();
        stats.cpu_usage_percent =
            CPU_USAGE_EMA_ALPHA * stats.cpu_usage_percent + (1.0 - CPU_USAGE_EMA_ALPHA) * busy_percent;
    }

    fn advance_state_machine(&mut self, frame: &Frame, mono: &[i16]) {
        let mut guard = self.shared.lock();
        let now_ms = frame.timestamp_ms;

        match guard.state {
            SessionState::Idle => {
                guard.state = transition(guard.state, Event::FrameArrived, &mut guard.aux, now_ms);
            }
            SessionState::Listening => {
                drop(guard);
                if let Some(detection) = self.score_wake_word(frame, now_ms) {
                    let mut guard = self.shared.lock();
                    guard.state = transition(
                        guard.state,
                        Event::WakeScoreAboveThreshold,
                        &mut guard.aux,
                        now_ms,
                    );
                    let armed_at = guard.aux.last_wake_time_ms.unwrap_or(now_ms);
                    drop(guard);
                    self.timeout_service.arm_wake_timeout(
                        Duration::from_millis(self.config.wake_timeout_ms),
                        armed_at,
                    );
                    self.stats.lock().wake_detections += 1;
                    if let Some(cb) = self.wake_word_callback.lock().as_ref() {
                        cb(&detection.model_name, detection.confidence);
                    }
                }
            }
            SessionState::WakeDetected => {
                guard.state = transition(guard.state, Event::FrameArrived, &mut guard.aux, now_ms);
            }
            SessionState::Recording => {
                if frame.vad_active {
                    guard.recording.append(mono);
                }
                let start = guard.aux.recording_start_time_ms.unwrap_or(now_ms);
                let max_duration = guard.aux.max_recording_duration_ms;
                if now_ms.saturating_sub(start) >= max_duration {
                    guard.state = transition(
                        guard.state,
                        Event::RecordingDurationExceeded,
                        &mut guard.aux,
                        now_ms,
                    );
                }
            }
            SessionState::Processing | SessionState::Error => {}
        }
    }

    fn score_wake_word(&mut self, frame: &Frame, now_ms: u64) -> Option<crate::wakeword::ScoreResult> {
        let window_len = self.feature_extractor.config().sample_rate as usize
            * self.feature_extractor.config().frame_size_ms as usize
            / 1000;
        let mono = self.beamformer.mixdown(&frame.samples);
        let window: Vec<i16> = if mono.len() >= window_len {
            mono[..window_len].to_vec()
        } else {
            mono
        };
        let features = self.feature_extractor.extract(&window);
        self.wake_words.score_frame(&features, now_ms)
    }
}
