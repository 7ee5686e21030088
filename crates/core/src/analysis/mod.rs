//! Streaming spectral analysis.
//!
//! Samples flow through [`FrameAccumulator`] into [`SpectralTransform`], the
//! resulting spectrum is reduced to band levels by [`BandExtractor`], shaped
//! by [`DynamicsProcessor`] and finally smoothed by [`TemporalSmoother`] into
//! the [`AnalysisSnapshot`] owned by [`AnalysisPipeline`].

pub mod accumulator;
pub mod bands;
pub mod dynamics;
pub mod smoothing;
pub mod transform;
pub mod window;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use accumulator::FrameAccumulator;
pub use bands::{BandEnergies, BandExtractor, BinRange};
pub use dynamics::{compress, log_scale, DynamicsProcessor};
pub use smoothing::{FrameLevels, HistoryBuffer, TemporalSmoother};
pub use transform::{SpectralTransform, SpectrumFrame};
pub use window::Window;

use crate::{config::AnalysisConfig, AudioVizError, Result};

/// Update cycles between two debug level reports.
const LEVEL_REPORT_INTERVAL: u64 = 500;
/// Energy below which a decaying snapshot drops its waveform.
const WAVEFORM_CLEAR_LEVEL: f32 = 0.01;

/// Externally visible analysis result.
///
/// Scalars are in `[0, 1]`. `spectrum` holds one processed, smoothed level
/// per bin (`transform_size / 2 + 1` entries) and `waveform` the samples of
/// the most recently analysed frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSnapshot {
    pub waveform: Vec<f32>,
    pub spectrum: Vec<f32>,
    pub energy: f32,
    pub bass: f32,
    pub mid: f32,
    pub treble: f32,
    pub transient: f32,
}

impl AnalysisSnapshot {
    /// Zeroed snapshot with buffers sized for `transform_size`.
    pub fn zeroed(transform_size: usize) -> Self {
        Self {
            waveform: vec![0.0; transform_size],
            spectrum: vec![0.0; transform_size / 2 + 1],
            ..Default::default()
        }
    }

    /// Returns the four scalar levels.
    pub fn levels(&self) -> BandEnergies {
        BandEnergies {
            energy: self.energy,
            bass: self.bass,
            mid: self.mid,
            treble: self.treble,
        }
    }

    fn set_levels(&mut self, levels: BandEnergies) {
        self.energy = levels.energy;
        self.bass = levels.bass;
        self.mid = levels.mid;
        self.treble = levels.treble;
    }

    /// Copies `other` into `self`, reusing existing allocations.
    pub fn copy_from(&mut self, other: &Self) {
        self.waveform.clone_from(&other.waveform);
        self.spectrum.clone_from(&other.spectrum);
        self.energy = other.energy;
        self.bass = other.bass;
        self.mid = other.mid;
        self.treble = other.treble;
        self.transient = other.transient;
    }

    /// True when every value is finite and every level lies in `[0, 1]`.
    pub fn is_well_formed(&self) -> bool {
        let unit = |v: f32| (0.0..=1.0).contains(&v);
        self.waveform.iter().all(|v| v.is_finite())
            && self.spectrum.iter().copied().all(unit)
            && [self.energy, self.bass, self.mid, self.treble, self.transient]
                .into_iter()
                .all(unit)
    }
}

/// Lifecycle of an [`AnalysisPipeline`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Uninitialized,
    Ready,
}

/// Owns every analysis buffer and the single long-lived snapshot.
///
/// The snapshot is rewritten in place by each [`update`](Self::update);
/// references handed out by `update` or [`snapshot`](Self::snapshot) borrow
/// the pipeline and therefore cannot outlive the next update call. Copy out
/// (e.g. with [`AnalysisSnapshot::copy_from`]) whatever must persist.
#[derive(Default)]
pub struct AnalysisPipeline {
    core: Option<PipelineCore>,
    frame_count: u64,
}

struct PipelineCore {
    config: AnalysisConfig,
    window: Window,
    transform: SpectralTransform,
    accumulator: FrameAccumulator,
    bands: BandExtractor,
    dynamics: DynamicsProcessor,
    smoother: TemporalSmoother,
    history: HistoryBuffer<FrameLevels>,
    snapshot: AnalysisSnapshot,
    raw: BandEnergies,
    mono: Vec<f32>,
}

impl AnalysisPipeline {
    /// Creates an uninitialised pipeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether buffers are allocated.
    pub fn state(&self) -> PipelineState {
        if self.core.is_some() {
            PipelineState::Ready
        } else {
            PipelineState::Uninitialized
        }
    }

    /// Returns the active configuration, including any capture retune.
    pub fn config(&self) -> Option<&AnalysisConfig> {
        self.core.as_ref().map(|core| &core.config)
    }

    /// Validates `config`, allocates all buffers, builds the window and
    /// resets history. On error nothing changes.
    pub fn initialize(&mut self, config: AnalysisConfig) -> Result<()> {
        config.validate()?;
        let core = PipelineCore::new(config)?;

        tracing::info!(
            sample_rate = core.config.sample_rate,
            transform_size = core.config.transform_size,
            hop_size = core.config.hop_size,
            "analysis pipeline initialised"
        );

        self.core = Some(core);
        self.frame_count = 0;
        Ok(())
    }

    /// Releases every buffer and returns to [`PipelineState::Uninitialized`].
    pub fn shutdown(&mut self) {
        if self.core.take().is_some() {
            tracing::info!(frames = self.frame_count, "analysis pipeline shut down");
        }
    }

    /// Runs one update cycle over mono `samples`.
    ///
    /// An empty slice means no audio arrived this cycle: levels fade toward
    /// zero instead of freezing. Samples that do not complete a hop are
    /// buffered and leave the snapshot untouched.
    pub fn update(&mut self, samples: &[f32]) -> Result<&AnalysisSnapshot> {
        let core = self.core.as_mut().ok_or(AudioVizError::NotInitialized)?;
        core.process(samples)?;
        self.frame_count += 1;

        if self.frame_count % LEVEL_REPORT_INTERVAL == 0 {
            let snapshot = &core.snapshot;
            tracing::debug!(
                frame = self.frame_count,
                raw_energy = core.raw.energy,
                energy = snapshot.energy,
                bass = snapshot.bass,
                mid = snapshot.mid,
                treble = snapshot.treble,
                transient = snapshot.transient,
                "analysis levels"
            );
        }

        Ok(&core.snapshot)
    }

    /// Downmixes interleaved `samples` with `channels` channels to mono and
    /// runs [`update`](Self::update). A trailing partial frame is ignored.
    pub fn update_interleaved(
        &mut self,
        samples: &[f32],
        channels: usize,
    ) -> Result<&AnalysisSnapshot> {
        if channels == 0 {
            return Err(AudioVizError::InvalidInput("channel count must be non-zero"));
        }
        if channels == 1 {
            return self.update(samples);
        }

        let core = self.core.as_mut().ok_or(AudioVizError::NotInitialized)?;
        let mut mono = std::mem::take(&mut core.mono);
        downmix_into(samples, channels, &mut mono);
        let result = self.update(&mono).map(|_| ());

        if let Some(core) = self.core.as_mut() {
            core.mono = mono;
        }
        result?;
        self.snapshot()
    }

    /// Retunes the band mapping and smoothing period for a new input rate
    /// without discarding history.
    pub fn set_sample_rate(&mut self, sample_rate: u32) -> Result<()> {
        let core = self.core.as_mut().ok_or(AudioVizError::NotInitialized)?;
        if sample_rate == 0 {
            return Err(AudioVizError::config("sample rate must be greater than zero"));
        }
        if sample_rate == core.config.sample_rate {
            return Ok(());
        }

        tracing::info!(
            from = core.config.sample_rate,
            to = sample_rate,
            "retuning analysis for new sample rate"
        );
        core.config.sample_rate = sample_rate;
        core.bands.retune(sample_rate, core.config.transform_size);
        core.smoother.set_period(core.config.hop_period());
        Ok(())
    }

    /// Latest snapshot. Valid until the next update.
    pub fn snapshot(&self) -> Result<&AnalysisSnapshot> {
        self.core
            .as_ref()
            .map(|core| &core.snapshot)
            .ok_or(AudioVizError::NotInitialized)
    }

    /// Returns the unprocessed bass band average of the latest spectrum,
    /// faded by the same factor as the snapshot while input is absent.
    pub fn low_frequency_magnitude(&self) -> f32 {
        self.core.as_ref().map_or(0.0, |core| core.raw.bass)
    }

    /// Returns the unprocessed mid band average. See
    /// [`low_frequency_magnitude`](Self::low_frequency_magnitude).
    pub fn mid_frequency_magnitude(&self) -> f32 {
        self.core.as_ref().map_or(0.0, |core| core.raw.mid)
    }

    /// Returns the unprocessed treble band average. See
    /// [`low_frequency_magnitude`](Self::low_frequency_magnitude).
    pub fn high_frequency_magnitude(&self) -> f32 {
        self.core.as_ref().map_or(0.0, |core| core.raw.treble)
    }

    /// Returns the linear spectrum of the most recent transform.
    pub fn spectrum_frame(&self) -> Option<&SpectrumFrame> {
        self.core.as_ref().map(|core| core.transform.frame())
    }

    /// Returns how many frames the history currently holds.
    pub fn history_len(&self) -> usize {
        self.core.as_ref().map_or(0, |core| core.history.len())
    }

    /// Returns the history bound, 0 when uninitialised.
    pub fn history_capacity(&self) -> usize {
        self.core.as_ref().map_or(0, |core| core.history.capacity())
    }

    /// Update cycles since the last initialisation.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}

impl PipelineCore {
    fn new(config: AnalysisConfig) -> Result<Self> {
        let size = config.transform_size;
        Ok(Self {
            window: Window::hann(size)?,
            transform: SpectralTransform::new(size)?,
            accumulator: FrameAccumulator::new(size, config.hop_size)?,
            bands: BandExtractor::new(config.bands, config.sample_rate, size),
            dynamics: DynamicsProcessor::new(&config.dynamics),
            smoother: TemporalSmoother::new(&config.smoothing, config.hop_period()),
            history: HistoryBuffer::new(config.history_capacity),
            snapshot: AnalysisSnapshot::zeroed(size),
            raw: BandEnergies::default(),
            mono: Vec::with_capacity(size),
            config,
        })
    }

    fn process(&mut self, samples: &[f32]) -> Result<()> {
        if samples.is_empty() {
            self.decay();
        } else {
            self.analyse(samples)?;
        }

        self.history.push(FrameLevels {
            levels: self.snapshot.levels(),
            transient: self.snapshot.transient,
        });
        Ok(())
    }

    fn analyse(&mut self, samples: &[f32]) -> Result<()> {
        let transform = &mut self.transform;
        let window = &self.window;
        let waveform = &mut self.snapshot.waveform;
        let emitted = self.accumulator.push(samples, |frame| {
            waveform.copy_from_slice(frame);
            transform.transform(frame, window).map(|_| ())
        })?;

        if emitted == 0 {
            return Ok(());
        }

        let dynamics = self.config.dynamics;
        let frame = self.transform.frame();
        self.raw = self.bands.extract(frame).with_energy(rms(&self.snapshot.waveform));

        let target = BandEnergies {
            energy: self.dynamics.process(self.raw.energy, dynamics.energy_sensitivity),
            ..self
                .raw
                .map(|value| self.dynamics.process(value, dynamics.band_sensitivity))
        };

        self.smoother
            .set_period(emitted as f32 * self.config.hop_period());
        let levels = self.smoother.step_levels(self.snapshot.levels(), target);

        for (value, &magnitude) in self.snapshot.spectrum.iter_mut().zip(frame.magnitudes()) {
            let goal = self.dynamics.process(magnitude, dynamics.band_sensitivity);
            *value = self.smoother.step(*value, goal).clamp(0.0, 1.0);
        }

        self.snapshot.transient = smoothing::transient_strength(
            levels.energy,
            self.history.latest(),
            self.config.transient_gain,
        );
        self.snapshot.set_levels(levels.map(|value| value.clamp(0.0, 1.0)));
        Ok(())
    }

    fn decay(&mut self) {
        let factor = self.config.silence_decay;
        let levels = self.snapshot.levels().map(|value| value * factor);
        self.snapshot.set_levels(levels);
        self.snapshot.transient *= self.config.transient_decay;
        for value in &mut self.snapshot.spectrum {
            *value *= factor;
        }
        self.raw = self.raw.map(|value| value * factor);
        if self.snapshot.energy < WAVEFORM_CLEAR_LEVEL {
            self.snapshot.waveform.fill(0.0);
        }
    }
}

fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f32 = samples.iter().map(|sample| sample * sample).sum();
    (sum / samples.len() as f32).sqrt()
}

/// Averages each interleaved frame of `channels` samples into `out`.
pub fn downmix_into(samples: &[f32], channels: usize, out: &mut Vec<f32>) {
    out.clear();
    if channels == 0 {
        return;
    }
    let scale = 1.0 / channels as f32;
    out.extend(
        samples
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() * scale),
    );
}

impl fmt::Debug for AnalysisPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisPipeline")
            .field("state", &self.state())
            .field("config", &self.config())
            .field("frame_count", &self.frame_count)
            .field("history", &self.history_len())
            .finish()
    }
}
