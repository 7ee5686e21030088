use std::{fmt, sync::Arc};

use realfft::{num_complex::Complex32, RealFftPlanner, RealToComplex};

use super::window::Window;
use crate::{AudioVizError, Result};

/// Smallest magnitude considered before converting to decibels.
pub const MAGNITUDE_EPSILON: f32 = 1e-6;
/// Lower clamp of the decibel view.
pub const DECIBEL_FLOOR: f32 = -100.0;

/// Linear magnitude spectrum of one transform, Nyquist inclusive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpectrumFrame {
    magnitudes: Vec<f32>,
}

impl SpectrumFrame {
    /// Zeroed frame sized for the given transform length.
    pub fn zeroed(transform_size: usize) -> Self {
        Self {
            magnitudes: vec![0.0; transform_size / 2 + 1],
        }
    }

    pub fn len(&self) -> usize {
        self.magnitudes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.magnitudes.is_empty()
    }

    pub fn magnitudes(&self) -> &[f32] {
        &self.magnitudes
    }

    /// The same bins expressed in dBFS-like units, floored at [`DECIBEL_FLOOR`].
    pub fn decibels(&self) -> impl Iterator<Item = f32> + '_ {
        self.magnitudes.iter().map(|&m| magnitude_to_db(m))
    }

    /// Index of the loudest bin, if the frame holds any bins.
    pub fn peak_bin(&self) -> Option<usize> {
        self.magnitudes
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(index, _)| index)
    }
}

pub fn magnitude_to_db(magnitude: f32) -> f32 {
    (20.0 * magnitude.max(MAGNITUDE_EPSILON).log10()).max(DECIBEL_FLOOR)
}

/// Real-input FFT with preallocated buffers.
///
/// Blocks must match the transform size exactly; mismatched lengths are
/// rejected rather than padded or truncated.
pub struct SpectralTransform {
    size: usize,
    plan: Arc<dyn RealToComplex<f32>>,
    input: Vec<f32>,
    spectrum: Vec<Complex32>,
    scratch: Vec<Complex32>,
    frame: SpectrumFrame,
}

impl SpectralTransform {
    pub fn new(size: usize) -> Result<Self> {
        if size < 2 {
            return Err(AudioVizError::InvalidInput(
                "transform requires at least two samples",
            ));
        }

        let mut planner = RealFftPlanner::<f32>::new();
        let plan = planner.plan_fft_forward(size);
        let input = plan.make_input_vec();
        let spectrum = plan.make_output_vec();
        let scratch = plan.make_scratch_vec();

        Ok(Self {
            size,
            plan,
            input,
            spectrum,
            scratch,
            frame: SpectrumFrame::zeroed(size),
        })
    }

    /// Returns the number of samples each block must hold.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Most recent output, zeroed until the first transform.
    pub fn frame(&self) -> &SpectrumFrame {
        &self.frame
    }

    /// Windows `block`, runs the FFT and stores `|X[k]| / N` for bins
    /// `0..=N/2`.
    pub fn transform(&mut self, block: &[f32], window: &Window) -> Result<&SpectrumFrame> {
        if block.len() != self.size {
            return Err(AudioVizError::InvalidInput(
                "block length does not match the transform size",
            ));
        }
        if window.len() != self.size {
            return Err(AudioVizError::InvalidInput(
                "window length does not match the transform size",
            ));
        }

        for ((slot, sample), weight) in self.input.iter_mut().zip(block).zip(window.iter()) {
            *slot = sample * weight;
        }

        self.plan
            .process_with_scratch(&mut self.input, &mut self.spectrum, &mut self.scratch)?;

        let norm = 1.0 / self.size as f32;
        for (magnitude, bin) in self.frame.magnitudes.iter_mut().zip(&self.spectrum) {
            let value = bin.norm() * norm;
            *magnitude = if value.is_finite() { value } else { 0.0 };
        }

        Ok(&self.frame)
    }
}

impl fmt::Debug for SpectralTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpectralTransform")
            .field("size", &self.size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::PI;

    use super::*;

    fn sine(frequency: f32, sample_rate: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * PI * frequency * i as f32 / sample_rate).sin())
            .collect()
    }

    #[test]
    fn sine_peaks_at_expected_bin() {
        let n = 1024;
        let sample_rate = 44_100.0;
        let window = Window::hann(n).unwrap();
        let mut fft = SpectralTransform::new(n).unwrap();

        for frequency in [440.0, 1000.0, 5000.0, 12_000.0] {
            let frame = fft.transform(&sine(frequency, sample_rate, n), &window).unwrap();
            assert_eq!(frame.len(), n / 2 + 1);

            let expected = (frequency * n as f32 / sample_rate).round() as i64;
            let peak = frame.peak_bin().unwrap() as i64;
            assert!((peak - expected).abs() <= 1, "{frequency} Hz: {peak} vs {expected}");
        }
    }

    #[test]
    fn sine_burst_surrounded_by_silence_still_peaks() {
        let n = 2048;
        let sample_rate = 48_000.0;
        let mut block = vec![0.0; n];
        let burst = sine(3000.0, sample_rate, n / 2);
        block[n / 4..n / 4 + n / 2].copy_from_slice(&burst);

        let window = Window::hann(n).unwrap();
        let mut fft = SpectralTransform::new(n).unwrap();
        let frame = fft.transform(&block, &window).unwrap();

        let expected = (3000.0 * n as f32 / sample_rate).round() as i64;
        assert!((frame.peak_bin().unwrap() as i64 - expected).abs() <= 1);
    }

    #[test]
    fn dc_input_is_normalised_by_length() {
        let n = 256;
        let window = Window::hann(n).unwrap();
        let mut fft = SpectralTransform::new(n).unwrap();
        let frame = fft.transform(&vec![1.0; n], &window).unwrap();

        // Sum of a symmetric Hann window is (N - 1) / 2.
        let expected = (n - 1) as f32 / 2.0 / n as f32;
        assert!((frame.magnitudes()[0] - expected).abs() < 1e-3);
        assert_eq!(frame.peak_bin(), Some(0));
    }

    #[test]
    fn silence_maps_to_decibel_floor() {
        let n = 64;
        let window = Window::hann(n).unwrap();
        let mut fft = SpectralTransform::new(n).unwrap();
        let frame = fft.transform(&vec![0.0; n], &window).unwrap();

        assert!(frame.magnitudes().iter().all(|&m| m == 0.0));
        assert!(frame.decibels().all(|db| db == DECIBEL_FLOOR));
        assert!((magnitude_to_db(1.0)).abs() < 1e-6);
    }

    #[test]
    fn rejects_mismatched_lengths() {
        let window = Window::hann(128).unwrap();
        let mut fft = SpectralTransform::new(128).unwrap();
        assert_eq!(fft.size(), 128);

        let err = fft.transform(&[0.0; 100], &window).unwrap_err();
        assert!(matches!(err, AudioVizError::InvalidInput(_)));

        let short_window = Window::hann(64).unwrap();
        assert!(fft.transform(&[0.0; 128], &short_window).is_err());
    }
}
