//! Bounded mono append-only sink for a post-wake utterance.

/// Append-only mono PCM buffer. Grows while a recording session is active
/// and is silently capped at `capacity` — the session continues regardless
/// so the caller still gets a clean `stop`/timeout, just with a truncated
/// recording (discoverable via the returned size).
#[derive(Debug)]
pub struct RecordingBuffer {
    data: Vec<i16>,
    capacity_samples: usize,
}

impl RecordingBuffer {
    pub fn new(capacity_samples: usize) -> Self {
        RecordingBuffer {
            data: Vec::with_capacity(capacity_samples),
            capacity_samples,
        }
    }

    pub fn capacity_samples(&self) -> usize {
        self.capacity_samples
    }

    pub fn size_samples(&self) -> usize {
        self.data.len()
    }

    pub fn is_full(&self) -> bool {
        self.data.len() >= self.capacity_samples
    }

    /// Appends mono samples if they fit in full; otherwise drops this
    /// frame's audio entirely and the caller should treat it as a dropped
    /// frame (§4.8: frames past capacity are dropped, not truncated
    /// mid-frame) without failing the session.
    pub fn append(&mut self, mono: &[i16]) -> bool {
        if self.data.len() + mono.len() > self.capacity_samples {
            return false;
        }
        self.data.extend_from_slice(mono);
        true
    }

    /// Copies up to `cap` bytes of little-endian mono PCM into `out`,
    /// clears the buffer, and returns the number of bytes written.
    pub fn drain_into(&mut self, out: &mut [u8]) -> usize {
        let available_bytes = self.data.len() * 2;
        let to_write = available_bytes.min(out.len());
        let samples_to_write = to_write / 2;
        for (i, &sample) in self.data[..samples_to_write].iter().enumerate() {
            let bytes = sample.to_le_bytes();
            out[i * 2] = bytes[0];
            out[i * 2 + 1] = bytes[1];
        }
        self.data.clear();
        samples_to_write * 2
    }

    pub fn reset(&mut self) {
        self.data.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_and_drain_round_trips_bytes() {
        let mut buf = RecordingBuffer::new(10);
        assert!(buf.append(&[1, 2, 3]));
        assert_eq!(buf.size_samples(), 3);
        let mut out = vec![0u8; 64];
        let written = buf.drain_into(&mut out);
        assert_eq!(written, 6);
        assert_eq!(&out[..6], &[1, 0, 2, 0, 3, 0]);
        assert_eq!(buf.size_samples(), 0);
    }

    #[test]
    fn drops_frames_past_capacity_but_keeps_prior_data() {
        let mut buf = RecordingBuffer::new(4);
        assert!(buf.append(&[1, 2, 3]));
        assert!(!buf.append(&[4, 5])); // would overflow capacity
        assert_eq!(buf.size_samples(), 3);
    }

    #[test]
    fn size_never_exceeds_capacity() {
        let mut buf = RecordingBuffer::new(5);
        for _ in 0..10 {
            buf.append(&[1, 2, 3]);
        }
        assert!(buf.size_samples() <= buf.capacity_samples());
    }

    #[test]
    fn reset_clears_without_changing_capacity() {
        let mut buf = RecordingBuffer::new(5);
        buf.append(&[1, 2]);
        buf.reset();
        assert_eq!(buf.size_samples(), 0);
        assert_eq!(buf.capacity_samples(), 5);
    }
}
