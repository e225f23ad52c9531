//! Band-limited sample-rate conversion in the frequency domain.
//!
//! Each call converts one frame independently: the whole frame is
//! transformed, its spectrum truncated (downsampling) or zero-padded
//! (upsampling), and transformed back at the target length. There is no
//! state carried between frames, so frame boundaries may produce small
//! discontinuities. That trade-off keeps per-frame latency at zero.

use std::sync::Arc;

use parking_lot::Mutex;
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

/// Output length for `len` input samples converted `from_rate -> to_rate`,
/// rounded to the nearest sample.
pub fn resampled_len(len: usize, from_rate: u32, to_rate: u32) -> usize {
    if from_rate == to_rate || from_rate == 0 {
        return len;
    }
    let scaled = len as u64 * to_rate as u64;
    ((scaled + from_rate as u64 / 2) / from_rate as u64) as usize
}

/// One-shot conversion with a throwaway planner.
pub fn resample(samples: &[i16], from_rate: u32, to_rate: u32) -> Vec<i16> {
    Resampler::new(from_rate, to_rate).process(samples)
}

/// Converts PCM16 blocks between a fixed pair of rates.
///
/// FFT plans are cached per length, so repeated frames of the same size
/// only pay for planning once.
pub struct Resampler {
    from_rate: u32,
    to_rate: u32,
    planner: Mutex<FftPlanner<f64>>,
}

impl std::fmt::Debug for Resampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resampler")
            .field("from_rate", &self.from_rate)
            .field("to_rate", &self.to_rate)
            .finish()
    }
}

impl Resampler {
    pub fn new(from_rate: u32, to_rate: u32) -> Self {
        Self { from_rate, to_rate, planner: Mutex::new(FftPlanner::new()) }
    }

    pub fn from_rate(&self) -> u32 {
        self.from_rate
    }

    pub fn to_rate(&self) -> u32 {
        self.to_rate
    }

    /// Number of samples [`process`](Self::process) returns for `len` input samples.
    pub fn output_len(&self, len: usize) -> usize {
        resampled_len(len, self.from_rate, self.to_rate)
    }

    /// Convert one block. Output is rounded and clipped to the i16 range.
    pub fn process(&self, samples: &[i16]) -> Vec<i16> {
        let n = samples.len();
        if n == 0 {
            return Vec::new();
        }
        let out_len = self.output_len(n);
        if out_len == n {
            return samples.to_vec();
        }
        if out_len == 0 {
            return Vec::new();
        }

        let (forward, inverse) = self.plans(n, out_len);

        let mut spectrum: Vec<Complex<f64>> =
            samples.iter().map(|&s| Complex::new(s as f64, 0.0)).collect();
        forward.process(&mut spectrum);

        let mut output = fit_spectrum(&spectrum, out_len);
        inverse.process(&mut output);

        // rustfft leaves both directions unnormalized; 1/n covers the inverse
        // transform and the amplitude rescale to the new length.
        let scale = 1.0 / n as f64;
        output
            .iter()
            .map(|c| (c.re * scale).round().clamp(i16::MIN as f64, i16::MAX as f64) as i16)
            .collect()
    }

    fn plans(&self, n: usize, out_len: usize) -> (Arc<dyn Fft<f64>>, Arc<dyn Fft<f64>>) {
        let mut planner = self.planner.lock();
        (planner.plan_fft_forward(n), planner.plan_fft_inverse(out_len))
    }
}

/// Truncate or zero-pad a full spectrum of length `n` to `out_len` bins,
/// keeping it Hermitian so the inverse transform is real.
fn fit_spectrum(spectrum: &[Complex<f64>], out_len: usize) -> Vec<Complex<f64>> {
    let n = spectrum.len();
    let kept = n.min(out_len);
    let half = kept / 2;

    let mut fitted = vec![Complex::new(0.0, 0.0); out_len];
    fitted[..=half].copy_from_slice(&spectrum[..=half]);

    // With an even number of kept bins the bin at `half` is a Nyquist bin on
    // the shorter side. Fold the negative half into it when shrinking, split
    // it across both halves when growing.
    if kept % 2 == 0 {
        if out_len < n {
            fitted[half] = Complex::new(2.0 * spectrum[half].re, 0.0);
        } else {
            fitted[half] = spectrum[half] * 0.5;
        }
    }

    for k in 1..=half {
        let mirror = out_len - k;
        if mirror == k {
            fitted[k].im = 0.0;
        } else {
            fitted[mirror] = fitted[k].conj();
        }
    }
    fitted
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sine(freq: f64, rate: u32, len: usize, amplitude: f64) -> Vec<i16> {
        (0..len)
            .map(|i| {
                let t = i as f64 / rate as f64;
                (amplitude * (2.0 * std::f64::consts::PI * freq * t).sin()).round() as i16
            })
            .collect()
    }

    fn rms_error(a: &[i16], b: &[i16]) -> f64 {
        assert_eq!(a.len(), b.len());
        let sum: f64 = a
            .iter()
            .zip(b)
            .map(|(&x, &y)| {
                let d = x as f64 - y as f64;
                d * d
            })
            .sum();
        (sum / a.len() as f64).sqrt()
    }

    #[test]
    fn pipeline_lengths() {
        let down = Resampler::new(48000, 16000);
        let up = Resampler::new(24000, 48000);
        assert_eq!(down.process(&[0; 480]).len(), 160);
        assert_eq!(up.process(&[0; 240]).len(), 480);
        assert_eq!(resampled_len(481, 48000, 16000), 160);
        assert_eq!(resampled_len(482, 48000, 16000), 161);
    }

    #[test]
    fn empty_and_identity() {
        assert!(resample(&[], 48000, 16000).is_empty());
        assert_eq!(resample(&[1, 2, 3], 16000, 16000), vec![1, 2, 3]);
    }

    #[test]
    fn dc_level_survives() {
        let out = resample(&[1000; 480], 48000, 16000);
        assert!(out.iter().all(|&s| (s - 1000).abs() <= 1), "{out:?}");
        let out = resample(&[-2000; 240], 24000, 48000);
        assert!(out.iter().all(|&s| (s + 2000).abs() <= 1), "{out:?}");
    }

    #[test]
    fn round_trip_error_is_bounded() {
        // 1 kHz fits a whole number of periods in a 10 ms block.
        let input = sine(1000.0, 48000, 480, 8000.0);
        let down = resample(&input, 48000, 16000);
        assert_eq!(down.len(), 160);
        let back = resample(&down, 16000, 48000);
        assert_eq!(back.len(), 480);
        let err = rms_error(&input, &back);
        assert!(err < 4.0, "rms error {err}");
    }

    #[test]
    fn upsampled_sine_matches_reference() {
        let input = sine(1000.0, 24000, 240, 10000.0);
        let expected = sine(1000.0, 48000, 480, 10000.0);
        let out = resample(&input, 24000, 48000);
        assert!(rms_error(&out, &expected) < 4.0);
    }

    #[test]
    fn output_is_clipped() {
        let mut input = vec![i16::MAX; 64];
        input.extend(vec![i16::MIN; 64]);
        let out = resample(&input, 16000, 48000);
        assert_eq!(out.len(), 384);
        assert_eq!(out[96], i16::MAX);
        assert_eq!(out[288], i16::MIN);
        assert!(out[20..170].iter().all(|&s| s > 0));
        assert!(out[212..362].iter().all(|&s| s < 0));
    }

    proptest! {
        #[test]
        fn output_length_is_rounded_ratio(
            len in 1usize..2000,
            rates in prop::sample::select(vec![
                (48000u32, 16000u32), (24000, 48000), (16000, 48000), (44100, 48000), (48000, 44100),
            ]),
        ) {
            let (from, to) = rates;
            let samples = vec![0i16; len];
            let expected = ((len as f64) * to as f64 / from as f64).round() as usize;
            let got = Resampler::new(from, to).process(&samples).len();
            // Exact .5 ties round up in integer arithmetic.
            prop_assert!(got == expected || got == expected + 1 || got + 1 == expected);
            prop_assert_eq!(got, resampled_len(len, from, to));
        }
    }
}
