//! Bounded producer/consumer hand-off between the driver-owned producer and
//! the core-owned processor, plus the control-command channel used to
//! serialize public-API calls with the processor's per-frame loop.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use std::time::Duration;

use crate::frame::RawFrame;

/// Non-blocking-send / blocking-receive frame hand-off. Mirrors the
/// teacher's `agent` sub-crate's request/response channel idiom, built on
/// `crossbeam_channel` rather than a hand-rolled lock-and-condvar queue.
pub struct FrameQueue {
    sender: Sender<RawFrame>,
    receiver: Receiver<RawFrame>,
}

impl FrameQueue {
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        FrameQueue { sender, receiver }
    }

    /// Non-blocking enqueue. Returns `false` on a full queue — the caller
    /// must count this as a buffer overrun; the newest frame is the one
    /// lost, never an older one.
    pub fn enqueue(&self, frame: RawFrame) -> bool {
        match self.sender.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => false,
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Blocks until a frame is available or the queue is disconnected
    /// (shutdown).
    pub fn dequeue(&self) -> Option<RawFrame> {
        self.receiver.recv().ok()
    }

    /// Used by the processor to poll for a pending deadline (e.g. a
    /// recording-duration check) without blocking indefinitely.
    pub fn dequeue_timeout(&self, timeout: Duration) -> Option<RawFrame> {
        match self.receiver.recv_timeout(timeout) {
            Ok(frame) => Some(frame),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    pub fn sender(&self) -> Sender<RawFrame> {
        self.sender.clone()
    }
}

/// Control operations routed to the processor between frames, per the
/// concurrency model's "queued commands" option: every public-API mutation
/// other than `submit_frame` serializes through here instead of a lock.
pub enum Command {
    StartRecording { max_duration_ms: u64 },
    StopRecording,
    SetBeamDirection { degrees: f32 },
    SetAdaptiveBeam(bool),
    SetSensitivity(f32),
    SetNoiseSuppression(f32),
    CalibrateNoise { duration_ms: u64 },
    RegisterWakeWord(crate::wakeword::WakeWordModel),
    SetWakeWordBackend(Box<dyn crate::wakeword::ScoreBackend>),
    Reset,
    Shutdown,
    /// Delivered by the timeout service; see `crate::timers`.
    WakeTimeoutExpired { armed_at_ms: u64 },
}

impl std::fmt::Debug for Command {
    /// Hand-rolled: `SetWakeWordBackend` carries a trait object that cannot
    /// derive `Debug`, so every variant is logged by name only.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::StartRecording { max_duration_ms } => {
                f.debug_struct("StartRecording").field("max_duration_ms", max_duration_ms).finish()
            }
            Command::StopRecording => write!(f, "StopRecording"),
            Command::SetBeamDirection { degrees } => {
                f.debug_struct("SetBeamDirection").field("degrees", degrees).finish()
            }
            Command::SetAdaptiveBeam(v) => write!(f, "SetAdaptiveBeam({v})"),
            Command::SetSensitivity(v) => write!(f, "SetSensitivity({v})"),
            Command::SetNoiseSuppression(v) => write!(f, "SetNoiseSuppression({v})"),
            Command::CalibrateNoise { duration_ms } => {
                f.debug_struct("CalibrateNoise").field("duration_ms", duration_ms).finish()
            }
            Command::RegisterWakeWord(m) => write!(f, "RegisterWakeWord({})", m.name),
            Command::SetWakeWordBackend(_) => write!(f, "SetWakeWordBackend(..)"),
            Command::Reset => write!(f, "Reset"),
            Command::Shutdown => write!(f, "Shutdown"),
            Command::WakeTimeoutExpired { armed_at_ms } => {
                f.debug_struct("WakeTimeoutExpired").field("armed_at_ms", armed_at_ms).finish()
            }
        }
    }
}

pub struct CommandQueue {
    sender: Sender<Command>,
    receiver: Receiver<Command>,
}

impl CommandQueue {
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        CommandQueue { sender, receiver }
    }

    pub fn sender(&self) -> Sender<Command> {
        self.sender.clone()
    }

    pub fn try_recv(&self) -> Option<Command> {
        self.receiver.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(ts: u64) -> RawFrame {
        RawFrame { samples: vec![0; 4], timestamp_ms: ts }
    }

    #[test]
    fn enqueue_dequeue_preserves_order() {
        let q = FrameQueue::new(4);
        for i in 0..4 {
            assert!(q.enqueue(raw(i)));
        }
        for i in 0..4 {
            assert_eq!(q.dequeue().unwrap().timestamp_ms, i);
        }
    }

    #[test]
    fn enqueue_fails_when_full_without_dropping_existing() {
        let q = FrameQueue::new(2);
        assert!(q.enqueue(raw(1)));
        assert!(q.enqueue(raw(2)));
        assert!(!q.enqueue(raw(3)));
        assert_eq!(q.dequeue().unwrap().timestamp_ms, 1);
        assert_eq!(q.dequeue().unwrap().timestamp_ms, 2);
    }

    #[test]
    fn command_queue_is_fifo_and_non_blocking_on_empty() {
        let cq = CommandQueue::new(4);
        assert!(cq.try_recv().is_none());
        cq.sender().send(Command::StopRecording).unwrap();
        assert!(matches!(cq.try_recv(), Some(Command::StopRecording)));
    }
}
