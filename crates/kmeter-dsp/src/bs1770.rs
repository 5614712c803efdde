//! ITU-R BS.1770 K-weighting cascade: pre-filter (high-shelf-like)
//! followed by RLB (high-pass-like), applied per channel.

use std::f64::consts::PI;

use crate::biquad::{BiquadCoeffs, BiquadState};

/// Pre-filter constants.
const PRE_VH: f64 = 1.584_864_701_130_855;
const PRE_VL: f64 = 1.0;
const PRE_Q: f64 = 0.707_175_236_955_419_6;
const PRE_FC: f64 = 1_681.974_450_955_533;

/// RLB filter constants.
const RLB_VH: f64 = 1.0;
const RLB_VB: f64 = 0.0;
const RLB_VL: f64 = 0.0;
const RLB_Q: f64 = 0.500_327_037_323_877_3;
const RLB_FC: f64 = 38.135_470_876_024_44;

fn pre_filter_coeffs(sample_rate: u32) -> BiquadCoeffs {
    let omega = (PI * PRE_FC / sample_rate as f64).tan();
    let omega_sq = omega * omega;
    let omega_q = omega / PRE_Q;
    let d = omega_sq + omega_q + 1.0;
    let vb = PRE_VH.sqrt();

    BiquadCoeffs {
        b0: (PRE_VL * omega_sq + vb * omega_q + PRE_VH) / d,
        b1: 2.0 * (PRE_VL * omega_sq - PRE_VH) / d,
        b2: (PRE_VL * omega_sq - vb * omega_q + PRE_VH) / d,
        na1: -2.0 * (omega_sq - 1.0) / d,
        na2: -(omega_sq - omega_q + 1.0) / d,
    }
}

fn rlb_filter_coeffs(sample_rate: u32) -> BiquadCoeffs {
    let omega = (PI * RLB_FC / sample_rate as f64).tan();
    let omega_sq = omega * omega;
    let omega_q = omega / RLB_Q;
    let d = omega_sq + omega_q + 1.0;
    // Feed-forward row normalizes by its own sum rather than `d`; for RLB's
    // constants (Vl = Vb = 0, Vh = 1) this divisor is just 1.0.
    let feedforward_divisor = RLB_VL * omega_sq + RLB_VB * omega_q + RLB_VH;

    BiquadCoeffs {
        b0: (RLB_VL * omega_sq + RLB_VB * omega_q + RLB_VH) / feedforward_divisor,
        b1: 2.0 * (RLB_VL * omega_sq - RLB_VH) / feedforward_divisor,
        b2: (RLB_VL * omega_sq - RLB_VB * omega_q + RLB_VH) / feedforward_divisor,
        na1: -2.0 * (omega_sq - 1.0) / d,
        na2: -(omega_sq - omega_q + 1.0) / d,
    }
}

/// Per-channel two-biquad K-weighting cascade.
pub struct Bs1770KWeighting {
    pre_coeffs: BiquadCoeffs,
    rlb_coeffs: BiquadCoeffs,
    pre_state: Vec<BiquadState>,
    rlb_state: Vec<BiquadState>,
}

impl Bs1770KWeighting {
    pub fn new(num_channels: usize, sample_rate: u32) -> Self {
        let mut cascade = Self {
            pre_coeffs: BiquadCoeffs::default(),
            rlb_coeffs: BiquadCoeffs::default(),
            pre_state: vec![BiquadState::new(); num_channels],
            rlb_state: vec![BiquadState::new(); num_channels],
        };
        cascade.rebuild(sample_rate);
        cascade
    }

    /// Recompute both biquads' coefficients and clear every channel's
    /// history. Cannot fail for any `sample_rate > 0`.
    pub fn rebuild(&mut self, sample_rate: u32) {
        self.pre_coeffs = pre_filter_coeffs(sample_rate);
        self.rlb_coeffs = rlb_filter_coeffs(sample_rate);
        for state in self.pre_state.iter_mut().chain(self.rlb_state.iter_mut()) {
            state.reset();
        }
    }

    /// Apply pre-filter then RLB, in place, for one channel's block.
    /// `scratch` is reused across calls; caller passes the channel's
    /// samples already converted to `f64`.
    pub fn process(&mut self, channel: usize, buffer: &mut [f64], scratch: &mut [f64]) {
        debug_assert_eq!(buffer.len(), scratch.len());
        self.pre_state[channel].process(&self.pre_coeffs, buffer, scratch);
        buffer.copy_from_slice(scratch);
        self.rlb_state[channel].process(&self.rlb_coeffs, buffer, scratch);
        buffer.copy_from_slice(scratch);
    }
}
