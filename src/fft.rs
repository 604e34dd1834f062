//! In-place radix-2 Cooley–Tukey FFT on power-of-two buffers, Hann window generation, and the
//! sub-bin Gaussian peak estimator shared by the VIS detector and video demodulator.
//!
//! No FFT crate is pulled in: the contract here is specified exactly (power formula, bin-to-
//! frequency mapping, no implicit padding) and callers depend on that exact behaviour rather than
//! on whatever a general-purpose FFT crate happens to do.

use std::f64::consts::PI;

/// A single complex sample. Kept as a plain `f64` pair rather than wrapping `num-complex`: the
/// arithmetic needed here is three lines and this avoids pulling in a dependency that would add
/// nothing to a contract this exactly specified.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Complex {
    pub re: f64,
    pub im: f64,
}

impl Complex {
    pub const fn new(re: f64, im: f64) -> Self {
        Self { re, im }
    }

    /// `real² + imag²`, used throughout so amplitude scaling is consistent across every caller.
    pub fn power(self) -> f64 {
        self.re * self.re + self.im * self.im
    }

    fn add(self, rhs: Self) -> Self {
        Self::new(self.re + rhs.re, self.im + rhs.im)
    }

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.re - rhs.re, self.im - rhs.im)
    }

    fn mul(self, rhs: Self) -> Self {
        Self::new(
            self.re * rhs.re - self.im * rhs.im,
            self.re * rhs.im + self.im * rhs.re,
        )
    }
}

/// Forward FFT of a real-valued signal. `samples.len()` must be an exact power of two; no
/// implicit zero-padding is performed (callers must pad explicitly if they want that).
///
/// Bin `k` of the result corresponds to frequency `k * sample_rate / N`.
pub fn forward(samples: &[f64]) -> Vec<Complex> {
    assert!(
        samples.len().is_power_of_two(),
        "fft::forward requires a power-of-two length, got {}",
        samples.len()
    );
    let mut buf: Vec<Complex> = samples.iter().map(|&re| Complex::new(re, 0.0)).collect();
    fft_in_place(&mut buf, false);
    buf
}

/// Inverse FFT. Returns the real part of each output sample, normalized by `1/N`.
pub fn inverse(bins: &[Complex]) -> Vec<f64> {
    assert!(
        bins.len().is_power_of_two(),
        "fft::inverse requires a power-of-two length, got {}",
        bins.len()
    );
    let mut buf = bins.to_vec();
    fft_in_place(&mut buf, true);
    let n = buf.len() as f64;
    buf.into_iter().map(|c| c.re / n).collect()
}

fn fft_in_place(buf: &mut [Complex], invert: bool) {
    let n = buf.len();
    if n <= 1 {
        return;
    }

    // Bit-reversal permutation.
    let mut j = 0usize;
    for i in 1..n {
        let mut bit = n >> 1;
        while j & bit != 0 {
            j ^= bit;
            bit >>= 1;
        }
        j |= bit;
        if i < j {
            buf.swap(i, j);
        }
    }

    // Iterative decimation-in-time butterflies.
    let mut len = 2usize;
    while len <= n {
        let ang = 2.0 * PI / len as f64 * if invert { 1.0 } else { -1.0 };
        let wlen = Complex::new(ang.cos(), ang.sin());
        let mut i = 0;
        while i < n {
            let mut w = Complex::new(1.0, 0.0);
            for k in 0..len / 2 {
                let u = buf[i + k];
                let v = buf[i + k + len / 2].mul(w);
                buf[i + k] = u.add(v);
                buf[i + k + len / 2] = u.sub(v);
                w = w.mul(wlen);
            }
            i += len;
        }
        len <<= 1;
    }
}

/// Hann window of length `l`: `w[i] = 0.5 * (1 - cos(2*pi*i/(l-1)))`.
///
/// Degenerate lengths (0 or 1) have no well-defined taper; we return an all-ones window since
/// that's the only value consistent with "don't attenuate a single sample".
pub fn hann_window(l: usize) -> Vec<f64> {
    if l <= 1 {
        return vec![1.0; l];
    }
    (0..l)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f64 / (l - 1) as f64).cos()))
        .collect()
}

/// Sub-bin peak refinement via the Gaussian interpolation formula used by both the VIS detector
/// and the video demodulator:
///
/// `δ = ln(P[b+1]/P[b-1]) / (2 * ln(P[b]² / (P[b+1]*P[b-1])))`
///
/// Returns the fractional bin offset `δ` to add to `b`. Falls back to `0.0` (bin center) when any
/// of the three powers is zero or the denominator is too close to zero to trust.
pub fn gaussian_peak_refine(p_prev: f64, p_center: f64, p_next: f64) -> f64 {
    if p_prev <= 0.0 || p_center <= 0.0 || p_next <= 0.0 {
        return 0.0;
    }
    let denom = 2.0 * (p_center * p_center / (p_next * p_prev)).ln();
    if !denom.is_finite() || denom.abs() < 1e-9 {
        return 0.0;
    }
    let delta = (p_next / p_prev).ln() / denom;
    if delta.is_finite() { delta } else { 0.0 }
}
