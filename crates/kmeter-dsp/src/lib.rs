//! kmeter-dsp: realtime DSP building blocks and the `AverageLevelEngine`
//! orchestrator for the K-System average-loudness engine.

mod biquad;
mod bs1770;
mod convolver;
mod engine;
mod fir_kernel;
mod ringbuffer;

pub use biquad::{BiquadCoeffs, BiquadState};
pub use bs1770::Bs1770KWeighting;
pub use convolver::OverlapAddConvolver;
pub use engine::AverageLevelEngine;
pub use fir_kernel::FirKernel;
pub use ringbuffer::RingBuffer;
