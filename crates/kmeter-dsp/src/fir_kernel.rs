//! Windowed-sinc low-pass FIR kernel, precomputed in the frequency domain.

use std::sync::Arc;

use realfft::{RealFftPlanner, RealToComplex};
use rustfft::num_complex::Complex;

const CUTOFF_HZ: f64 = 21_000.0;

/// Blackman-Harris-like window coefficients.
const WINDOW_A0: f64 = 0.42;
const WINDOW_A1: f64 = -0.5;
const WINDOW_A2: f64 = 0.08;

/// DC-normalized windowed-sinc low-pass kernel, zero-padded and
/// real-FFT'd to its half-spectrum.
pub struct FirKernel {
    buffer_size: usize,
    fft_size: usize,
    half_fft_size: usize,
    /// Half-spectrum frequency-domain form, length `half_fft_size`.
    spectrum: Vec<Complex<f64>>,
    forward: Arc<dyn RealToComplex<f64>>,
}

impl FirKernel {
    /// Build a kernel for `buffer_size` samples at `sample_rate` Hz.
    pub fn new(buffer_size: usize, sample_rate: u32) -> Self {
        let fft_size = 2 * buffer_size;
        let half_fft_size = fft_size / 2 + 1;
        let mut planner = RealFftPlanner::<f64>::new();
        let forward = planner.plan_fft_forward(fft_size);

        let mut kernel = Self {
            buffer_size,
            fft_size,
            half_fft_size,
            spectrum: vec![Complex::new(0.0, 0.0); half_fft_size],
            forward,
        };
        kernel.rebuild(sample_rate);
        kernel
    }

    pub fn half_fft_size(&self) -> usize {
        self.half_fft_size
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn spectrum(&self) -> &[Complex<f64>] {
        &self.spectrum
    }

    /// Rebuild the kernel for a new sample rate, in place. Cannot fail for
    /// any `sample_rate > 0` — the cutoff is clamped to Nyquist.
    pub fn rebuild(&mut self, sample_rate: u32) {
        let taps = windowed_sinc_taps(self.buffer_size, sample_rate);

        let mut padded = vec![0.0f64; self.fft_size];
        padded[..taps.len()].copy_from_slice(&taps);

        let mut spectrum = vec![Complex::new(0.0, 0.0); self.half_fft_size];
        self.forward
            .process(&mut padded, &mut spectrum)
            .expect("fixed-size real FFT never fails");
        self.spectrum = spectrum;
    }
}

/// Build the DC-normalized, symmetric windowed-sinc taps of length
/// `buffer_size + 1`. Shared by `rebuild` and its
/// tests so the invariant checks exercise the exact same code path.
fn windowed_sinc_taps(buffer_size: usize, sample_rate: u32) -> Vec<f64> {
    let n = buffer_size + 1;
    let half_n = n / 2;
    let fc = (CUTOFF_HZ / sample_rate as f64).min(0.5);

    let mut taps = vec![0.0f64; n];
    for (i, tap) in taps.iter_mut().enumerate() {
        let window = WINDOW_A0
            + WINDOW_A1 * (2.0 * std::f64::consts::PI * i as f64 / n as f64).cos()
            + WINDOW_A2 * (4.0 * std::f64::consts::PI * i as f64 / n as f64).cos();
        *tap = if i == half_n {
            2.0 * std::f64::consts::PI * fc
        } else {
            let d = (i as f64) - (half_n as f64);
            (2.0 * std::f64::consts::PI * fc * d).sin() / d * window
        };
    }

    let sum: f64 = taps.iter().sum();
    debug_assert!(sum.abs() > 1e-12, "degenerate kernel sum");
    for tap in &mut taps {
        *tap /= sum;
    }
    taps
}
