//! Interleaved PCM ring buffer for rolling context snapshots.

use std::time::Duration;

use parking_lot::Mutex;

/// Bounded wait applied when the processor takes the buffer lock to write a
/// frame. On timeout the write is skipped and counted as an overrun by the
/// caller — see `VoiceContext`'s per-frame step.
pub const WRITE_LOCK_TIMEOUT: Duration = Duration::from_millis(10);

struct Inner {
    data: Vec<i16>,
    write_idx: usize,
    channels: u8,
}

/// Single-writer (the processor task), multi-reader ring of interleaved
/// PCM. Readers acquire the same lock the writer does; there is no
/// lock-free fast path since reads are snapshot/diagnostic only, never the
/// hot path (see the concurrency model this crate implements).
pub struct CircularBuffer {
    inner: Mutex<Inner>,
    capacity_samples: usize,
}

impl CircularBuffer {
    /// `capacity_frames_samples` is the ring's capacity in interleaved
    /// samples (`BUFFER_SAMPLES * CHANNELS`).
    pub fn new(capacity_samples: usize, channels: u8) -> Self {
        CircularBuffer {
            inner: Mutex::new(Inner {
                data: vec![0i16; capacity_samples],
                write_idx: 0,
                channels,
            }),
            capacity_samples,
        }
    }

    /// Writes one interleaved frame under a bounded-wait lock. Returns
    /// `false` on timeout — the caller must count that as an overrun — and
    /// `true` once the frame is fully written.
    pub fn write_frame(&self, samples: &[i16]) -> bool {
        let Some(mut inner) = self.inner.try_lock_for(WRITE_LOCK_TIMEOUT) else {
            return false;
        };
        let capacity = self.capacity_samples;
        for &sample in samples {
            inner.data[inner.write_idx] = sample;
            inner.write_idx = (inner.write_idx + 1) % capacity;
        }
        true
    }

    /// Copies the whole ring out in chronological order (oldest sample
    /// first), for snapshot consumers. Not part of the hot path.
    pub fn snapshot(&self) -> Vec<i16> {
        let inner = self.inner.lock();
        let mut out = Vec::with_capacity(self.capacity_samples);
        out.extend_from_slice(&inner.data[inner.write_idx..]);
        out.extend_from_slice(&inner.data[..inner.write_idx]);
        out
    }

    pub fn capacity_samples(&self) -> usize {
        self.capacity_samples
    }

    pub fn channels(&self) -> u8 {
        self.inner.lock().channels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_wrap_around() {
        let buf = CircularBuffer::new(4, 1);
        assert!(buf.write_frame(&[1, 2, 3]));
        assert!(buf.write_frame(&[4, 5]));
        let snap = buf.snapshot();
        assert_eq!(snap, vec![2, 3, 4, 5]);
    }

    #[test]
    fn snapshot_is_chronological() {
        let buf = CircularBuffer::new(4, 1);
        assert!(buf.write_frame(&[1, 2, 3, 4]));
        assert!(buf.write_frame(&[5]));
        let snap = buf.snapshot();
        assert_eq!(snap, vec![2, 3, 4, 5]);
    }

    #[test]
    fn fresh_buffer_is_zeroed() {
        let buf = CircularBuffer::new(4, 1);
        assert_eq!(buf.snapshot(), vec![0, 0, 0, 0]);
    }
}
