//! FFT-based overlap-add block convolution against a [`FirKernel`].

use std::sync::Arc;

use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};
use rustfft::num_complex::Complex;

use kmeter_core::Sample;

use crate::fir_kernel::FirKernel;

/// Owns the scratch buffers and per-channel tails for overlap-add
/// convolution of an arbitrary number of channels against one shared
/// kernel.
pub struct OverlapAddConvolver {
    buffer_size: usize,
    fft_size: usize,
    forward: Arc<dyn RealToComplex<f64>>,
    inverse: Arc<dyn ComplexToReal<f64>>,
    time_td: Vec<f64>,
    spec_fd: Vec<Complex<f64>>,
    tail: Vec<Vec<f64>>,
}

impl OverlapAddConvolver {
    pub fn new(num_channels: usize, buffer_size: usize) -> Self {
        let fft_size = 2 * buffer_size;
        let mut planner = RealFftPlanner::<f64>::new();
        let forward = planner.plan_fft_forward(fft_size);
        let inverse = planner.plan_fft_inverse(fft_size);

        Self {
            buffer_size,
            fft_size,
            spec_fd: vec![Complex::new(0.0, 0.0); fft_size / 2 + 1],
            forward,
            inverse,
            time_td: vec![0.0; fft_size],
            tail: vec![vec![0.0; buffer_size]; num_channels],
        }
    }

    /// Zero all overlap tails. Called whenever the kernel is rebuilt, per
    /// the kernel changes.
    pub fn reset(&mut self) {
        for tail in &mut self.tail {
            tail.fill(0.0);
        }
    }

    /// Convolve `channel`'s samples (in place) against `kernel` via
    /// overlap-add, stitching in the carried-over tail from the previous
    /// call for this channel.
    pub fn filter_rms(&mut self, channel: usize, kernel: &FirKernel, buffer: &mut [Sample]) {
        debug_assert_eq!(buffer.len(), self.buffer_size);
        debug_assert_eq!(kernel.fft_size(), self.fft_size);

        self.time_td[..self.buffer_size]
            .iter_mut()
            .zip(buffer.iter())
            .for_each(|(dst, &src)| *dst = src as f64);
        self.time_td[self.buffer_size..].fill(0.0);

        self.forward
            .process(&mut self.time_td, &mut self.spec_fd)
            .expect("fixed-size real FFT never fails");

        for (bin, &kernel_bin) in self.spec_fd.iter_mut().zip(kernel.spectrum().iter()) {
            *bin *= kernel_bin;
        }

        self.inverse
            .process(&mut self.spec_fd, &mut self.time_td)
            .expect("fixed-size real FFT never fails");

        let norm = 1.0 / self.fft_size as f64;
        let tail = &mut self.tail[channel];
        for i in 0..self.buffer_size {
            buffer[i] = (self.time_td[i] * norm + tail[i]) as Sample;
        }
        for i in 0..self.buffer_size {
            tail[i] = self.time_td[self.buffer_size + i] * norm;
        }
    }
}
