use crate::{AudioVizError, Result};

/// Sliding analysis buffer.
///
/// Holds the most recent `frame_size` samples, newest last. Every `hop_size`
/// fresh samples the full buffer is handed to a callback and then slid left by
/// `hop_size`, so consecutive frames overlap by `frame_size - hop_size`.
/// The buffer starts zero-filled; early frames include that silence.
/// Non-finite samples are stored as zero.
#[derive(Debug, Clone)]
pub struct FrameAccumulator {
    buffer: Vec<f32>,
    hop_size: usize,
    pending: usize,
}

impl FrameAccumulator {
    pub fn new(frame_size: usize, hop_size: usize) -> Result<Self> {
        if frame_size == 0 {
            return Err(AudioVizError::InvalidInput("frame size must be non-zero"));
        }
        if hop_size == 0 || hop_size > frame_size {
            return Err(AudioVizError::InvalidInput(
                "hop size must be non-zero and no larger than the frame size",
            ));
        }

        Ok(Self {
            buffer: vec![0.0; frame_size],
            hop_size,
            pending: 0,
        })
    }

    /// Returns the number of samples in every emitted frame.
    pub fn frame_size(&self) -> usize {
        self.buffer.len()
    }

    /// Returns the number of fresh samples between emitted frames.
    pub fn hop_size(&self) -> usize {
        self.hop_size
    }

    /// Samples received since the last emitted frame.
    pub fn pending(&self) -> usize {
        self.pending
    }

    /// Raw buffer. Only the first `frame_size - hop_size + pending` samples
    /// are current; the rest still holds the tail of the previous frame.
    pub fn frame(&self) -> &[f32] {
        &self.buffer
    }

    /// Zero-fills the buffer and forgets pending samples.
    pub fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.pending = 0;
    }

    /// Appends `samples`, invoking `on_frame` once per completed hop.
    ///
    /// Returns how many frames were emitted. An error from the callback stops
    /// consumption; samples after the failing frame are dropped.
    pub fn push<F>(&mut self, mut samples: &[f32], mut on_frame: F) -> Result<usize>
    where
        F: FnMut(&[f32]) -> Result<()>,
    {
        let frame_size = self.buffer.len();
        let mut emitted = 0;

        while !samples.is_empty() {
            let room = self.hop_size - self.pending;
            let take = room.min(samples.len());
            let start = frame_size - self.hop_size + self.pending;
            for (slot, &sample) in self.buffer[start..start + take].iter_mut().zip(samples) {
                *slot = if sample.is_finite() { sample } else { 0.0 };
            }
            self.pending += take;
            samples = &samples[take..];

            if self.pending == self.hop_size {
                on_frame(&self.buffer)?;
                emitted += 1;
                self.buffer.copy_within(self.hop_size.., 0);
                self.pending = 0;
            }
        }

        Ok(emitted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(start: usize, len: usize) -> Vec<f32> {
        (start..start + len).map(|v| v as f32).collect()
    }

    #[test]
    fn emits_once_per_hop_with_overlap() {
        let mut acc = FrameAccumulator::new(8, 4).unwrap();
        assert_eq!((acc.frame_size(), acc.hop_size()), (8, 4));
        let mut frames = Vec::new();

        let emitted = acc
            .push(&ramp(1, 12), |frame| {
                frames.push(frame.to_vec());
                Ok(())
            })
            .unwrap();

        assert_eq!(emitted, 3);
        assert_eq!(frames[0], vec![0.0, 0.0, 0.0, 0.0, 1.0, 2.0, 3.0, 4.0]);
        assert_eq!(frames[1], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
        assert_eq!(frames[2], vec![5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 11.0, 12.0]);
        assert_eq!(acc.pending(), 0);
    }

    #[test]
    fn carries_partial_hops_across_pushes() {
        let mut acc = FrameAccumulator::new(4, 4).unwrap();
        let mut count = 0;

        assert_eq!(acc.push(&[1.0, 2.0, 3.0], |_| Ok(())).unwrap(), 0);
        assert_eq!(acc.pending(), 3);

        let emitted = acc
            .push(&[4.0, 5.0], |frame| {
                count += 1;
                assert_eq!(frame, &[1.0, 2.0, 3.0, 4.0]);
                Ok(())
            })
            .unwrap();

        assert_eq!(emitted, 1);
        assert_eq!(count, 1);
        assert_eq!(acc.pending(), 1);
    }

    #[test]
    fn non_finite_samples_are_stored_as_zero() {
        let mut acc = FrameAccumulator::new(4, 4).unwrap();
        let mut frames = Vec::new();

        acc.push(&[1.0, f32::NAN, f32::NEG_INFINITY, 4.0], |frame| {
            frames.push(frame.to_vec());
            Ok(())
        })
        .unwrap();

        assert_eq!(frames, vec![vec![1.0, 0.0, 0.0, 4.0]]);
    }

    #[test]
    fn empty_push_is_a_no_op() {
        let mut acc = FrameAccumulator::new(16, 8).unwrap();
        assert_eq!(acc.push(&[], |_| Ok(())).unwrap(), 0);
        assert!(acc.frame().iter().all(|&s| s == 0.0));
    }

    #[test]
    fn callback_errors_propagate() {
        let mut acc = FrameAccumulator::new(4, 2).unwrap();
        let result = acc.push(&[1.0; 8], |_| Err(AudioVizError::msg("boom")));
        assert!(result.is_err());
    }

    #[test]
    fn rejects_invalid_geometry() {
        assert!(FrameAccumulator::new(0, 1).is_err());
        assert!(FrameAccumulator::new(8, 0).is_err());
        assert!(FrameAccumulator::new(8, 9).is_err());
    }

    #[test]
    fn reset_zero_fills() {
        let mut acc = FrameAccumulator::new(4, 2).unwrap();
        acc.push(&[1.0; 3], |_| Ok(())).unwrap();
        acc.reset();
        assert_eq!(acc.pending(), 0);
        assert!(acc.frame().iter().all(|&s| s == 0.0));
    }
}
