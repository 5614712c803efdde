//! Sample and block types for the average-loudness engine.

/// Type alias for audio samples. Amplitude is normalized so that ±1.0 is
/// digital full scale.
pub type Sample = f32;

/// An owned, rectangular `[channel][sample]` matrix.
///
/// `channels` is fixed at construction (`1..=6`); `frames` is fixed for the
/// life of the block (it mirrors the host's `nBufferSize`). Resizing is
/// never done on the audio path — `clear()` just rewrites in place.
#[derive(Debug, Clone)]
pub struct Block {
    channels: Vec<Vec<Sample>>,
}

impl Block {
    /// Allocate a silent block of `channels` channels, `frames` samples each.
    pub fn new(channels: usize, frames: usize) -> Self {
        Self {
            channels: (0..channels).map(|_| vec![0.0; frames]).collect(),
        }
    }

    #[inline]
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    #[inline]
    pub fn frames(&self) -> usize {
        self.channels.first().map_or(0, |c| c.len())
    }

    #[inline]
    pub fn channel(&self, index: usize) -> &[Sample] {
        &self.channels[index]
    }

    #[inline]
    pub fn channel_mut(&mut self, index: usize) -> &mut [Sample] {
        &mut self.channels[index]
    }

    /// Write silence into every channel without deallocating.
    pub fn clear(&mut self) {
        for ch in &mut self.channels {
            ch.fill(0.0);
        }
    }
}
