//! Multichannel SPSC ring buffer with pre-delay read.
//!
//! Producer and consumer may share a thread today; the cursors
//! are still atomics with acquire/release fences so a future host that
//! splits producer and consumer across threads needs no change here.

use std::sync::atomic::{AtomicUsize, Ordering};

use kmeter_core::{Block, EngineError, EngineResult, Sample};

/// Lock-free multichannel sample queue. One write cursor shared by all
/// channels; capacity is fixed at construction and never grows.
pub struct RingBuffer {
    channels: Vec<Box<[Sample]>>,
    capacity: usize,
    mask: usize,
    write_pos: AtomicUsize,
}

impl RingBuffer {
    /// `capacity` is rounded up to a power of two and must be at least
    /// `buffer_size + max_pre_delay`.
    pub fn new(num_channels: usize, capacity: usize) -> Self {
        let capacity = capacity.next_power_of_two();
        Self {
            channels: (0..num_channels)
                .map(|_| vec![0.0; capacity].into_boxed_slice())
                .collect(),
            capacity,
            mask: capacity - 1,
            write_pos: AtomicUsize::new(0),
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Total samples ever written (monotonic, wraps via `wrapping_add`).
    #[inline]
    fn write_cursor(&self) -> usize {
        self.write_pos.load(Ordering::Acquire)
    }

    /// Append a full block. Advances the write cursor by `block.frames()`
    /// on every channel in lockstep. Never blocks, never reallocates.
    pub fn write(&mut self, block: &Block) -> EngineResult<()> {
        let frames = block.frames();
        if frames > self.capacity {
            log::warn!(
                "ring buffer write of {frames} samples exceeds capacity {}",
                self.capacity
            );
            return Err(EngineError::CapacityExceeded {
                attempted: frames,
                capacity: self.capacity,
            });
        }

        let write = self.write_cursor();
        for (ch_idx, storage) in self.channels.iter_mut().enumerate() {
            let samples = block.channel(ch_idx);
            for (i, &sample) in samples.iter().enumerate() {
                let idx = (write.wrapping_add(i)) & self.mask;
                storage[idx] = sample;
            }
        }
        self.write_pos
            .store(write.wrapping_add(frames), Ordering::Release);
        Ok(())
    }

    /// Copy the most recent `dest.frames()` samples ending `pre_delay`
    /// samples before the current write cursor into `dest`. Region not yet
    /// written reads as silence.
    pub fn read_into(&self, dest: &mut Block, pre_delay: usize) {
        let frames = dest.frames();
        self.copy_to(dest, pre_delay, frames);
    }

    /// Copy `count` samples starting `pre_delay + count` samples before the
    /// write cursor into `dest` (from index 0).
    pub fn copy_to(&self, dest: &mut Block, pre_delay: usize, count: usize) {
        self.transfer_to(dest, pre_delay, count, false);
    }

    /// Add (mix) `count` samples the same way `copy_to` reads them, instead
    /// of overwriting `dest`.
    pub fn add_to(&self, dest: &mut Block, pre_delay: usize, count: usize) {
        self.transfer_to(dest, pre_delay, count, true);
    }

    fn transfer_to(&self, dest: &mut Block, pre_delay: usize, count: usize, accumulate: bool) {
        // Signed arithmetic so "before sample 0" is representable and
        // unambiguously reads as silence, rather than wrapping into a huge
        // unsigned index.
        let write = self.write_cursor() as i64;
        let start = write - (pre_delay + count) as i64;

        for ch_idx in 0..dest.channel_count().min(self.channels.len()) {
            let storage = &self.channels[ch_idx];
            let out = dest.channel_mut(ch_idx);
            for i in 0..count {
                let absolute = start + i as i64;
                let written = absolute >= 0 && absolute < write && write - absolute <= self.capacity as i64;
                let sample = if written {
                    storage[(absolute as usize) & self.mask]
                } else {
                    0.0
                };
                if accumulate {
                    out[i] += sample;
                } else {
                    out[i] = sample;
                }
            }
        }
    }
}
