use std::collections::VecDeque;

/// FIFO of PCM16 samples that hands out fixed-size blocks.
///
/// Arbitrary-length frames go in with [`add_frame`](Self::add_frame) and come
/// out `blocksize` samples at a time. The buffer has no upper bound; back
/// pressure is applied by the queues feeding it.
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    samples: VecDeque<i16>,
    blocksize: usize,
}

impl AudioBuffer {
    /// Create an empty buffer. `blocksize` must be non-zero.
    pub fn new(blocksize: usize) -> Self {
        assert!(blocksize > 0, "blocksize must be non-zero");
        Self { samples: VecDeque::with_capacity(blocksize * 4), blocksize }
    }

    /// Append samples to the tail.
    pub fn add_frame(&mut self, samples: &[i16]) {
        self.samples.extend(samples.iter().copied());
    }

    /// Remove and return exactly `blocksize` samples from the front, or
    /// `None` when fewer are buffered.
    pub fn get_chunk(&mut self) -> Option<Vec<i16>> {
        if self.samples.len() < self.blocksize {
            return None;
        }
        Some(self.samples.drain(..self.blocksize).collect())
    }

    /// Always return `blocksize` samples: whatever is buffered (up to a
    /// block) followed by zeros.
    pub fn get_padded_chunk(&mut self) -> Vec<i16> {
        let take = self.samples.len().min(self.blocksize);
        let mut chunk: Vec<i16> = self.samples.drain(..take).collect();
        chunk.resize(self.blocksize, 0);
        chunk
    }

    /// Fill `out` from the front of the buffer, zero-padding any shortfall.
    /// Returns how many buffered samples were copied.
    pub fn read_into(&mut self, out: &mut [i16]) -> usize {
        let take = self.samples.len().min(out.len());
        for (slot, sample) in out.iter_mut().zip(self.samples.drain(..take)) {
            *slot = sample;
        }
        out[take..].fill(0);
        take
    }

    /// Number of buffered samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn blocksize(&self) -> usize {
        self.blocksize
    }

    /// Discard everything buffered.
    pub fn clear(&mut self) {
        self.samples.clear();
    }
}
