//! `AverageLevelEngine`: algorithm selection, kernel/coefficient
//! rebuilds, and per-block level output.

use kmeter_core::{
    bs1770_weight_for_index, level2decibel, meter_minimum_decibel, AlgorithmId, Block,
    EngineError, EngineResult, Sample,
};

use crate::bs1770::Bs1770KWeighting;
use crate::convolver::OverlapAddConvolver;
use crate::fir_kernel::FirKernel;
use crate::ringbuffer::RingBuffer;

/// Empirical peak-to-average calibration offset for the band-limited RMS
/// path, from pink-noise validation at -20 dBFS RMS.
const RMS_PEAK_TO_AVERAGE_CORRECTION_DB: f64 = 2.9881;

/// BS.1770's reference loudness offset.
const BS1770_REFERENCE_OFFSET_DB: f64 = -0.691;

/// Memoized result of the single BS.1770 filtering pass for the current
/// block — only channel 0's `level()` call triggers a recompute; every
/// other call (other channels, `publish_to`) reads this memo instead of
/// re-filtering. Invalidated at the start of every `pull_from`.
struct Bs1770Memo {
    lkfs: f64,
    filtered: Block,
    valid: bool,
}

/// Orchestrates kernel/coefficient rebuilds and produces per-block level
/// readings for one of the two measurement algorithms.
pub struct AverageLevelEngine {
    channels: usize,
    buffer_size: usize,
    sample_rate: u32,
    algorithm: AlgorithmId,
    peak_to_average_correction_db: f64,

    kernel: FirKernel,
    convolver: OverlapAddConvolver,
    bs1770: Bs1770KWeighting,

    /// Scratch output owned by the engine: pulled fresh from the ring
    /// buffer each `pull_from`, then overwritten in place, per channel, by
    /// `rms_level`'s filter pass. Read-only views are exposed to
    /// collaborators via `publish_to`.
    sample_block: Block,
    /// Scratch for the BS.1770 f64 biquad path (reused to avoid allocating
    /// on the audio path).
    scratch_f64: Vec<f64>,
    scratch_f64_2: Vec<f64>,

    bs1770_memo: Bs1770Memo,
}

impl AverageLevelEngine {
    /// Allocate kernels, coefficient tables, overlap tails, and biquad
    /// state eagerly. Fails with `InvalidArgument` if `channels` is outside
    /// `1..=6` or `buffer_size < 1`.
    pub fn new(
        channels: usize,
        buffer_size: usize,
        sample_rate: u32,
        algorithm: AlgorithmId,
    ) -> EngineResult<Self> {
        if channels == 0 || channels > 6 {
            return Err(EngineError::InvalidArgument(format!(
                "channels must be in 1..=6, got {channels}"
            )));
        }
        if buffer_size == 0 {
            return Err(EngineError::InvalidArgument(
                "buffer_size must be >= 1".to_string(),
            ));
        }

        let mut engine = Self {
            channels,
            buffer_size,
            sample_rate,
            algorithm,
            peak_to_average_correction_db: 0.0,
            kernel: FirKernel::new(buffer_size, sample_rate),
            convolver: OverlapAddConvolver::new(channels, buffer_size),
            bs1770: Bs1770KWeighting::new(channels, sample_rate),
            sample_block: Block::new(channels, buffer_size),
            scratch_f64: vec![0.0; buffer_size],
            scratch_f64_2: vec![0.0; buffer_size],
            bs1770_memo: Bs1770Memo {
                lkfs: meter_minimum_decibel(),
                filtered: Block::new(channels, buffer_size),
                valid: false,
            },
        };
        engine.apply_peak_to_average_correction();
        Ok(engine)
    }

    pub fn algorithm(&self) -> AlgorithmId {
        self.algorithm
    }

    pub fn channel_count(&self) -> usize {
        self.channels
    }

    pub fn peak_to_average_correction(&self) -> f64 {
        self.peak_to_average_correction_db
    }

    fn apply_peak_to_average_correction(&mut self) {
        self.peak_to_average_correction_db = match self.algorithm {
            AlgorithmId::ItuBs1770 => 0.0,
            AlgorithmId::RmsBandLimited => RMS_PEAK_TO_AVERAGE_CORRECTION_DB,
        };
    }

    /// No-op if `id` matches the current algorithm. Otherwise rebuilds both
    /// the FIR kernel and the IIR coefficients and resets all state (tails,
    /// histories).
    pub fn set_algorithm(&mut self, id: AlgorithmId) {
        if id == self.algorithm {
            return;
        }
        log::debug!("AverageLevelEngine: switching algorithm to {id:?}");
        self.algorithm = id;
        self.apply_peak_to_average_correction();
        self.rebuild_all();
    }

    fn rebuild_all(&mut self) {
        self.kernel.rebuild(self.sample_rate);
        self.convolver.reset();
        self.bs1770.rebuild(self.sample_rate);
        self.bs1770_memo.valid = false;
    }

    /// If `sample_rate` differs from the engine's current rate, rebuild
    /// every coefficient table and kernel before consuming any samples.
    /// Returns whether a rebuild happened.
    fn maybe_rebuild(&mut self, sample_rate: u32) -> bool {
        if sample_rate == self.sample_rate {
            return false;
        }
        log::debug!(
            "AverageLevelEngine: sample rate changed {} -> {sample_rate}",
            self.sample_rate
        );
        self.sample_rate = sample_rate;
        self.rebuild_all();
        true
    }

    /// Rebuild on sample-rate change, then read one block from `ring` with
    /// the given pre-delay into the engine's internal sample block.
    pub fn pull_from(&mut self, ring: &RingBuffer, pre_delay: usize, sample_rate: u32) {
        self.maybe_rebuild(sample_rate);
        ring.read_into(&mut self.sample_block, pre_delay);
        self.bs1770_memo.valid = false;
    }

    /// Level for `channel`, in dBFS (RMS mode) or LKFS (BS.1770 mode).
    /// Clamped to `meter_minimum_decibel()`.
    ///
    /// `channel` out of range is a host bug (spec.md §7's `InvalidArgument`
    /// kind) and panics rather than silently indexing out of bounds.
    pub fn level(&mut self, channel: usize) -> f64 {
        assert!(
            channel < self.channels,
            "channel {channel} out of range ({} channels)",
            self.channels
        );
        match self.algorithm {
            AlgorithmId::ItuBs1770 => self.bs1770_level(channel),
            AlgorithmId::RmsBandLimited => self.rms_level(channel),
        }
    }

    /// Filters `channel` in place within `sample_block` (per the engine's
    /// documented scratch-output contract: `sample_block` is overwritten by
    /// each filter pass) and returns its RMS level. A channel the host never
    /// queries in a given block is left unfiltered until it is.
    fn rms_level(&mut self, channel: usize) -> f64 {
        self.convolver.filter_rms(
            channel,
            &self.kernel,
            self.sample_block.channel_mut(channel),
        );
        let rms = rms_of(self.sample_block.channel(channel));
        (level2decibel(rms as f64) + self.peak_to_average_correction_db)
            .max(meter_minimum_decibel())
    }

    /// Per spec, only `channel == 0` is meaningful: it triggers the
    /// once-per-block filter pass (memoized for every other call this
    /// block) and returns the integrated loudness. Calls for other
    /// channels return the same memoized value but carry no independent
    /// meaning — there is no per-channel LKFS.
    fn bs1770_level(&mut self, _channel: usize) -> f64 {
        if !self.bs1770_memo.valid {
            self.compute_bs1770_block();
        }
        self.bs1770_memo.lkfs
    }

    /// Filter every channel once, sum channel-weighted mean-square, and
    /// memoize both the integrated LKFS and the per-channel filtered
    /// samples for this block.
    fn compute_bs1770_block(&mut self) {
        let mut sum = 0.0f64;
        for c in 0..self.channels {
            let weight = bs1770_weight_for_index(c);
            let samples = self.sample_block.channel(c);
            self.scratch_f64
                .iter_mut()
                .zip(samples.iter())
                .for_each(|(dst, &src)| *dst = src as f64);

            self.bs1770
                .process(c, &mut self.scratch_f64, &mut self.scratch_f64_2);

            let filtered_f32 = self.bs1770_memo.filtered.channel_mut(c);
            for (dst, &src) in filtered_f32.iter_mut().zip(self.scratch_f64.iter()) {
                *dst = src as Sample;
            }

            self.convolver
                .filter_rms(c, &self.kernel, self.bs1770_memo.filtered.channel_mut(c));

            if weight > 0.0 {
                let filtered = self.bs1770_memo.filtered.channel(c);
                let msq = filtered.iter().map(|&s| (s as f64) * (s as f64)).sum::<f64>()
                    / filtered.len() as f64;
                sum += weight * msq;
            }
        }

        let lkfs = if sum > 0.0 {
            BS1770_REFERENCE_OFFSET_DB + 10.0 * sum.log10()
        } else {
            meter_minimum_decibel()
        };
        self.bs1770_memo.lkfs = lkfs.max(meter_minimum_decibel());
        self.bs1770_memo.valid = true;
    }

    /// Copy the filtered sample block out for visualization use. For
    /// BS.1770 this forces the per-block computation if it has not run yet
    /// this block.
    pub fn publish_to(&mut self, dest: &mut Block) {
        if self.algorithm == AlgorithmId::ItuBs1770 && !self.bs1770_memo.valid {
            self.compute_bs1770_block();
        }
        let source: &Block = if self.algorithm == AlgorithmId::ItuBs1770 {
            &self.bs1770_memo.filtered
        } else {
            &self.sample_block
        };
        for c in 0..dest.channel_count().min(source.channel_count()) {
            dest.channel_mut(c).copy_from_slice(source.channel(c));
        }
    }
}

fn rms_of(buffer: &[Sample]) -> f64 {
    if buffer.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = buffer.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum_sq / buffer.len() as f64).sqrt()
}
