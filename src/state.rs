//! Session state machine. Mutated exclusively by the processor task.

use strum::Display;

/// The session's current phase. `ERROR` is recoverable only via `reset()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum SessionState {
    Idle,
    Listening,
    WakeDetected,
    Recording,
    Processing,
    Error,
}

impl SessionState {
    pub fn initial() -> Self {
        SessionState::Idle
    }
}

/// Events the processor feeds into the transition table, one per frame or
/// control command. Kept separate from [`crate::queue::Command`] — that
/// enum is the wire-level API request, this one is the state machine's own
/// vocabulary after a frame's DSP results are known.
#[derive(Debug, Clone, Copy)]
pub enum Event {
    FrameArrived,
    WakeScoreAboveThreshold,
    WakeTimeoutFired,
    FrameWithVadActive,
    RecordingDurationExceeded,
    StopRecordingRequested,
    RecordingRetrieved,
    Reset,
    FatalError,
}

/// Auxiliary session bookkeeping the transition table reads/writes,
/// mirroring the reference implementation's `recording_start_time`,
/// `last_wake_time`, and `max_recording_duration` context fields.
#[derive(Debug, Clone, Default)]
pub struct SessionAux {
    pub recording_start_time_ms: Option<u64>,
    pub last_wake_time_ms: Option<u64>,
    pub max_recording_duration_ms: u64,
}

/// Pure transition function: one event in, new state out. Implements the
/// table in full, including the WAKE_DETECTED -> RECORDING transition that
/// the reference implementation falls through into on the very next frame.
pub fn transition(state: SessionState, event: Event, aux: &mut SessionAux, now_ms: u64) -> SessionState {
    use SessionState::*;
    match (state, event) {
        (Idle, Event::FrameArrived) => Listening,
        (Listening, Event::WakeScoreAboveThreshold) => {
            aux.last_wake_time_ms = Some(now_ms);
            WakeDetected
        }
        (WakeDetected, Event::WakeTimeoutFired) => Idle,
        (WakeDetected, Event::FrameArrived) => {
            aux.recording_start_time_ms = Some(now_ms);
            Recording
        }
        (Recording, Event::FrameWithVadActive) => Recording,
        (Recording, Event::RecordingDurationExceeded) => Processing,
        (Recording, Event::StopRecordingRequested) => Processing,
        (Processing, Event::RecordingRetrieved) => Idle,
        (_, Event::Reset) => {
            aux.recording_start_time_ms = None;
            Idle
        }
        (_, Event::FatalError) => Error,
        (other, _) => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_to_listening_on_first_frame() {
        let mut aux = SessionAux::default();
        let next = transition(SessionState::Idle, Event::FrameArrived, &mut aux, 0);
        assert_eq!(next, SessionState::Listening);
    }

    #[test]
    fn wake_detected_falls_into_recording_on_next_frame() {
        let mut aux = SessionAux::default();
        let next = transition(SessionState::WakeDetected, Event::FrameArrived, &mut aux, 1000);
        assert_eq!(next, SessionState::Recording);
        assert_eq!(aux.recording_start_time_ms, Some(1000));
    }

    #[test]
    fn reset_from_any_state_goes_to_idle() {
        for state in [
            SessionState::Listening,
            SessionState::WakeDetected,
            SessionState::Recording,
            SessionState::Processing,
            SessionState::Error,
        ] {
            let mut aux = SessionAux::default();
            assert_eq!(transition(state, Event::Reset, &mut aux, 0), SessionState::Idle);
        }
    }

    #[test]
    fn fatal_error_from_any_state_goes_to_error() {
        let mut aux = SessionAux::default();
        assert_eq!(
            transition(SessionState::Recording, Event::FatalError, &mut aux, 0),
            SessionState::Error
        );
    }

    #[test]
    fn unhandled_event_is_a_no_op() {
        let mut aux = SessionAux::default();
        assert_eq!(
            transition(SessionState::Idle, Event::StopRecordingRequested, &mut aux, 0),
            SessionState::Idle
        );
    }
}
