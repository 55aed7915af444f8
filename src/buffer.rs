//! Accumulation buffer for encode streams.

use std::collections::VecDeque;

/// Growable sample buffer stored as a list of fragments.
///
/// Incoming chunks are kept as separate fragments and only merged when at
/// least one whole block is available, so a stream fed many small chunks
/// does not copy on every call.
#[derive(Debug, Default)]
pub struct SampleAccumulator {
    fragments: VecDeque<Vec<f32>>,
    total_samples: usize,
}

impl SampleAccumulator {
    /// Create an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk of interleaved samples, taking ownership of it.
    pub fn push(&mut self, chunk: Vec<f32>) {
        if chunk.is_empty() {
            return;
        }
        self.total_samples += chunk.len();
        self.fragments.push_back(chunk);
    }

    /// Total buffered samples across all fragments.
    pub const fn sample_count(&self) -> usize {
        self.total_samples
    }

    /// Number of fragments currently held.
    pub fn fragment_count(&self) -> usize {
        self.fragments.len()
    }

    /// Check if the buffer is empty.
    pub const fn is_empty(&self) -> bool {
        self.total_samples == 0
    }

    /// Zero samples needed to bring the buffer to a multiple of `block_len`.
    pub const fn padding_needed(&self, block_len: usize) -> usize {
        if block_len == 0 {
            return 0;
        }
        match self.total_samples % block_len {
            0 => 0,
            partial => block_len - partial,
        }
    }

    /// Pad with zeros up to the next multiple of `block_len`.
    ///
    /// Returns the number of zero samples appended.
    pub fn pad_to_multiple(&mut self, block_len: usize) -> usize {
        let padding = self.padding_needed(block_len);
        if padding > 0 {
            self.push(vec![0.0; padding]);
        }
        padding
    }

    /// Merge all fragments into one contiguous vector and leave the buffer
    /// empty. A single fragment is moved out without copying.
    fn take_contiguous(&mut self) -> Vec<f32> {
        let total = self.total_samples;
        self.total_samples = 0;

        if self.fragments.len() == 1 {
            return self.fragments.pop_front().unwrap_or_default();
        }

        let mut merged = Vec::with_capacity(total);
        for fragment in self.fragments.drain(..) {
            merged.extend_from_slice(&fragment);
        }
        merged
    }

    /// Removes every whole block from the front of the buffer.
    ///
    /// Returns `None` when less than one block is buffered. The sub-block
    /// remainder stays buffered for the next call.
    pub fn split_blocks(&mut self, block_len: usize) -> Option<BlockRun> {
        if block_len == 0 || self.total_samples < block_len {
            return None;
        }

        let mut data = self.take_contiguous();
        let whole = data.len() - data.len() % block_len;
        let remainder = data.split_off(whole);
        self.push(remainder);

        Some(BlockRun { data, block_len })
    }
}

/// A run of whole, equally sized blocks split off a [`SampleAccumulator`].
#[derive(Debug)]
pub struct BlockRun {
    data: Vec<f32>,
    block_len: usize,
}

impl BlockRun {
    /// Number of blocks in the run.
    pub fn len(&self) -> usize {
        self.data.len() / self.block_len
    }

    /// Check if the run holds no blocks.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Total samples across all blocks.
    pub fn sample_count(&self) -> usize {
        self.data.len()
    }

    /// Iterate over the blocks as borrowed slices.
    pub fn blocks(&self) -> std::slice::ChunksExact<'_, f32> {
        self.data.chunks_exact(self.block_len)
    }
}
