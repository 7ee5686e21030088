use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{AudioVizError, Result};

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub analysis: AnalysisConfig,
    /// Name of the visualiser selected on startup.
    pub visualiser: String,
    /// Display frame rate the host drives `update` at.
    pub fps: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            analysis: AnalysisConfig::default(),
            visualiser: "spectrum".to_string(),
            fps: 60,
        }
    }
}

impl AppConfig {
    pub fn live_defaults() -> Self {
        Self::default()
    }

    /// Parses a configuration document. Missing fields fall back to defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        if self.fps == 0 {
            return Err(AudioVizError::config("fps must be greater than zero"));
        }
        self.analysis.validate()
    }
}

/// Smallest accepted transform size.
pub const MIN_TRANSFORM_SIZE: usize = 8;
/// Largest accepted transform size.
pub const MAX_TRANSFORM_SIZE: usize = 65_536;

/// Parameters of the analysis pipeline. Fixed for the lifetime of an
/// initialised pipeline; change them by re-initialising.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Sample rate of the mono stream entering the pipeline, in Hz.
    pub sample_rate: u32,
    /// FFT length. Must be a power of two.
    pub transform_size: usize,
    /// New samples consumed between two transforms.
    pub hop_size: usize,
    pub bands: BandLayout,
    pub smoothing: SmoothingConfig,
    pub dynamics: DynamicsConfig,
    /// Number of past frames retained for transient detection.
    pub history_capacity: usize,
    /// Multiplier applied to the positive energy delta before log scaling.
    pub transient_gain: f32,
    /// Per-frame multiplicative fade applied while no samples arrive.
    pub silence_decay: f32,
    /// Same as `silence_decay`, for the transient indicator.
    pub transient_decay: f32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            transform_size: 1024,
            hop_size: 512,
            bands: BandLayout::default(),
            smoothing: SmoothingConfig::default(),
            dynamics: DynamicsConfig::default(),
            history_capacity: 60,
            transient_gain: 5.0,
            silence_decay: 0.95,
            transient_decay: 0.9,
        }
    }
}

impl AnalysisConfig {
    /// Default configuration for the given sample rate and frame size, with
    /// a half-frame hop.
    pub fn new(sample_rate: u32, transform_size: usize) -> Self {
        Self {
            sample_rate,
            transform_size,
            hop_size: (transform_size / 2).max(1),
            ..Self::default()
        }
    }

    /// Returns a descriptive [`AudioVizError::InvalidConfig`] for the first
    /// setting out of range.
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(AudioVizError::config("sample rate must be greater than zero"));
        }
        if !(MIN_TRANSFORM_SIZE..=MAX_TRANSFORM_SIZE).contains(&self.transform_size)
            || !self.transform_size.is_power_of_two()
        {
            return Err(AudioVizError::config(format!(
                "transform size must be a power of two in {MIN_TRANSFORM_SIZE}..={MAX_TRANSFORM_SIZE}, got {}",
                self.transform_size
            )));
        }
        if self.hop_size == 0 || self.hop_size > self.transform_size {
            return Err(AudioVizError::config(format!(
                "hop size must be in 1..={}, got {}",
                self.transform_size, self.hop_size
            )));
        }
        if self.history_capacity == 0 {
            return Err(AudioVizError::config("history capacity must be at least one frame"));
        }
        if !(self.transient_gain.is_finite() && self.transient_gain >= 0.0) {
            return Err(AudioVizError::config("transient gain must be finite and non-negative"));
        }
        for (name, factor) in [
            ("silence decay", self.silence_decay),
            ("transient decay", self.transient_decay),
        ] {
            if !(0.0..=1.0).contains(&factor) {
                return Err(AudioVizError::config(format!(
                    "{name} must lie in [0, 1], got {factor}"
                )));
            }
        }

        self.bands.validate()?;
        self.smoothing.validate()?;
        self.dynamics.validate()
    }

    /// Duration of one hop, in seconds.
    pub fn hop_period(&self) -> f32 {
        self.hop_size as f32 / self.sample_rate.max(1) as f32
    }
}

/// Frequency range in Hz, inclusive at both ends.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrequencyRange {
    pub low_hz: f32,
    pub high_hz: f32,
}

impl FrequencyRange {
    pub const fn new(low_hz: f32, high_hz: f32) -> Self {
        Self { low_hz, high_hz }
    }

    fn validate(&self, name: &str) -> Result<()> {
        let finite = self.low_hz.is_finite() && self.high_hz.is_finite();
        if !finite || self.low_hz < 0.0 || self.low_hz > self.high_hz {
            return Err(AudioVizError::config(format!(
                "{name} band must satisfy 0 <= low <= high, got {}..{} Hz",
                self.low_hz, self.high_hz
            )));
        }
        Ok(())
    }
}

/// Boundaries of the bass, mid and treble bands.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BandLayout {
    pub bass: FrequencyRange,
    pub mid: FrequencyRange,
    pub treble: FrequencyRange,
}

impl Default for BandLayout {
    fn default() -> Self {
        Self {
            bass: FrequencyRange::new(20.0, 250.0),
            mid: FrequencyRange::new(250.0, 4000.0),
            treble: FrequencyRange::new(4000.0, 20_000.0),
        }
    }
}

impl BandLayout {
    fn validate(&self) -> Result<()> {
        self.bass.validate("bass")?;
        self.mid.validate("mid")?;
        self.treble.validate("treble")
    }
}

/// Attack/release time constants in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    pub attack_ms: f32,
    pub release_ms: f32,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            attack_ms: 1.0,
            release_ms: 200.0,
        }
    }
}

impl SmoothingConfig {
    fn validate(&self) -> Result<()> {
        for (name, value) in [("attack", self.attack_ms), ("release", self.release_ms)] {
            if !(value.is_finite() && value > 0.0) {
                return Err(AudioVizError::config(format!(
                    "{name} time constant must be positive, got {value} ms"
                )));
            }
        }
        Ok(())
    }
}

/// Soft-knee compression and output gain settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DynamicsConfig {
    pub threshold: f32,
    /// Slope above the threshold, in (0, 1].
    pub ratio: f32,
    pub energy_sensitivity: f32,
    pub band_sensitivity: f32,
}

impl Default for DynamicsConfig {
    fn default() -> Self {
        Self {
            threshold: 0.3,
            ratio: 0.6,
            energy_sensitivity: 1.0,
            band_sensitivity: 1.0,
        }
    }
}

impl DynamicsConfig {
    fn validate(&self) -> Result<()> {
        if !(self.threshold.is_finite() && self.threshold >= 0.0) {
            return Err(AudioVizError::config("compression threshold must be non-negative"));
        }
        if !(self.ratio > 0.0 && self.ratio <= 1.0) {
            return Err(AudioVizError::config(format!(
                "compression ratio must lie in (0, 1], got {}",
                self.ratio
            )));
        }
        for (name, value) in [
            ("energy sensitivity", self.energy_sensitivity),
            ("band sensitivity", self.band_sensitivity),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(AudioVizError::config(format!("{name} must be non-negative")));
            }
        }
        Ok(())
    }
}
