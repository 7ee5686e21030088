use serde::{Deserialize, Serialize};

use super::transform::SpectrumFrame;
use crate::config::{BandLayout, FrequencyRange};

/// Overall energy plus the three band levels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BandEnergies {
    pub energy: f32,
    pub bass: f32,
    pub mid: f32,
    pub treble: f32,
}

impl BandEnergies {
    pub fn with_energy(mut self, energy: f32) -> Self {
        self.energy = energy;
        self
    }

    /// Applies `f` to every scalar.
    pub fn map(self, mut f: impl FnMut(f32) -> f32) -> Self {
        Self {
            energy: f(self.energy),
            bass: f(self.bass),
            mid: f(self.mid),
            treble: f(self.treble),
        }
    }
}

/// Inclusive bin span of one band. `None` when the band lies entirely above
/// Nyquist for the current sample rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinRange {
    pub low: usize,
    pub high: usize,
}

impl BinRange {
    fn resolve(range: FrequencyRange, sample_rate: u32, transform_size: usize) -> Option<Self> {
        let bins = transform_size / 2 + 1;
        let last = bins.checked_sub(1)?;
        let low = frequency_to_bin(range.low_hz, sample_rate, transform_size);
        let high = frequency_to_bin(range.high_hz, sample_rate, transform_size).min(last);

        if low > last || high < low {
            None
        } else {
            Some(Self { low, high })
        }
    }
}

/// `round(f · N / sampleRate)`, saturating at zero for negative input.
pub fn frequency_to_bin(frequency: f32, sample_rate: u32, transform_size: usize) -> usize {
    if sample_rate == 0 {
        return 0;
    }
    let bin = (frequency * transform_size as f32 / sample_rate as f32).round();
    if bin.is_finite() && bin > 0.0 {
        bin as usize
    } else {
        0
    }
}

/// Averages spectrum magnitude over the configured bass/mid/treble ranges.
#[derive(Debug, Clone)]
pub struct BandExtractor {
    layout: BandLayout,
    sample_rate: u32,
    transform_size: usize,
    bass: Option<BinRange>,
    mid: Option<BinRange>,
    treble: Option<BinRange>,
}

impl BandExtractor {
    pub fn new(layout: BandLayout, sample_rate: u32, transform_size: usize) -> Self {
        let mut extractor = Self {
            layout,
            sample_rate,
            transform_size,
            bass: None,
            mid: None,
            treble: None,
        };
        extractor.retune(sample_rate, transform_size);
        extractor
    }

    /// Recomputes the bin mapping. Required whenever the sample rate or the
    /// transform size changes.
    pub fn retune(&mut self, sample_rate: u32, transform_size: usize) {
        self.sample_rate = sample_rate;
        self.transform_size = transform_size;
        self.bass = BinRange::resolve(self.layout.bass, sample_rate, transform_size);
        self.mid = BinRange::resolve(self.layout.mid, sample_rate, transform_size);
        self.treble = BinRange::resolve(self.layout.treble, sample_rate, transform_size);
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn ranges(&self) -> [Option<BinRange>; 3] {
        [self.bass, self.mid, self.treble]
    }

    /// Band averages of `frame`. The `energy` field is left at zero for the
    /// caller to fill from the time domain.
    pub fn extract(&self, frame: &SpectrumFrame) -> BandEnergies {
        let magnitudes = frame.magnitudes();
        BandEnergies {
            energy: 0.0,
            bass: band_average(magnitudes, self.bass),
            mid: band_average(magnitudes, self.mid),
            treble: band_average(magnitudes, self.treble),
        }
    }
}

fn band_average(magnitudes: &[f32], range: Option<BinRange>) -> f32 {
    let Some(range) = range else {
        return 0.0;
    };
    // A frame shorter than the tuned geometry contributes only what it has.
    let Some(bins) = magnitudes.get(range.low..=range.high.min(magnitudes.len().saturating_sub(1)))
    else {
        return 0.0;
    };
    if bins.is_empty() {
        return 0.0;
    }
    let sum: f32 = bins.iter().sum();
    let average = sum / bins.len().max(1) as f32;
    if average.is_finite() {
        average.max(0.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{transform::SpectralTransform, window::Window};

    #[test]
    fn maps_default_bands_at_cd_rate() {
        let extractor = BandExtractor::new(BandLayout::default(), 44_100, 1024);
        let [bass, mid, treble] = extractor.ranges();

        assert_eq!(bass, Some(BinRange { low: 0, high: 6 }));
        assert_eq!(mid, Some(BinRange { low: 6, high: 93 }));
        assert_eq!(treble, Some(BinRange { low: 93, high: 464 }));
    }

    #[test]
    fn band_above_nyquist_is_silent() {
        let extractor = BandExtractor::new(BandLayout::default(), 4_000, 64);
        let [_, _, treble] = extractor.ranges();
        assert_eq!(treble, None);

        let frame = SpectrumFrame::zeroed(64);
        assert_eq!(extractor.extract(&frame).treble, 0.0);
    }

    #[test]
    fn retune_follows_sample_rate() {
        let mut extractor = BandExtractor::new(BandLayout::default(), 44_100, 1024);
        extractor.retune(22_050, 1024);
        let [bass, _, _] = extractor.ranges();
        assert_eq!(bass, Some(BinRange { low: 1, high: 12 }));
        assert_eq!(extractor.sample_rate(), 22_050);
    }

    #[test]
    fn mid_tone_dominates_mid_band() {
        let n = 1024;
        let sample_rate = 44_100;
        let block: Vec<f32> = (0..n)
            .map(|i| (2.0 * std::f32::consts::PI * 1000.0 * i as f32 / sample_rate as f32).sin())
            .collect();

        let window = Window::hann(n).unwrap();
        let mut fft = SpectralTransform::new(n).unwrap();
        let frame = fft.transform(&block, &window).unwrap();

        let bands = BandExtractor::new(BandLayout::default(), sample_rate, n).extract(frame);
        assert!(bands.mid > bands.bass);
        assert!(bands.mid > bands.treble);
        assert!(bands.bass >= 0.0 && bands.treble >= 0.0);
    }

    #[test]
    fn frequency_to_bin_rounds_and_saturates() {
        assert_eq!(frequency_to_bin(1000.0, 44_100, 1024), 23);
        assert_eq!(frequency_to_bin(-10.0, 44_100, 1024), 0);
        assert_eq!(frequency_to_bin(100.0, 0, 1024), 0);
    }
}
