use std::{
    f32::consts::TAU,
    sync::{Arc, Mutex, MutexGuard, TryLockError},
};

use crate::{
    config::AnalysisConfig, AnalysisPipeline, AnalysisSnapshot, AudioVizError, Result,
};

/// Publishes skipped between two contention warnings.
const SKIP_WARN_INTERVAL: u64 = 100;

/// One block delivered by a capture backend. Samples are interleaved when
/// `channels > 1`.
#[derive(Debug, Clone, Copy)]
pub struct CaptureBlock<'a> {
    pub samples: &'a [f32],
    pub channels: u16,
    pub sample_rate: u32,
}

/// Anything that can hand the engine audio, e.g. a device callback queue or
/// a decoder. `None` means no audio is available this cycle.
pub trait CaptureSource {
    fn next_block(&mut self) -> Option<CaptureBlock<'_>>;
}

/// Deterministic stand-in for a capture device: a 100 Hz bass tone, a 1 kHz
/// mid tone, a 5 kHz treble tone and a component sweeping 500-1000 Hz, as
/// interleaved stereo.
#[derive(Debug, Clone)]
pub struct TestSignal {
    sample_rate: u32,
    block_frames: usize,
    phases: [f32; 4],
    sweep: f32,
    silent: bool,
    buffer: Vec<f32>,
}

impl TestSignal {
    pub const CHANNELS: u16 = 2;

    const TONES: [(f32, f32); 3] = [(100.0, 0.8), (1000.0, 0.6), (5000.0, 0.4)];
    const SWEEP_AMPLITUDE: f32 = 0.5;
    const OUTPUT_GAIN: f32 = 0.4;

    pub fn new(sample_rate: u32, block_frames: usize) -> Self {
        Self {
            sample_rate: sample_rate.max(1),
            block_frames: block_frames.max(1),
            phases: [0.0; 4],
            sweep: 0.0,
            silent: false,
            buffer: Vec::with_capacity(block_frames.max(1) * Self::CHANNELS as usize),
        }
    }

    /// While silent the source reports no data at all.
    pub fn set_silent(&mut self, silent: bool) {
        self.silent = silent;
    }

    pub fn is_silent(&self) -> bool {
        self.silent
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn render_block(&mut self) {
        let rate = self.sample_rate as f32;
        let sweep_hz = 500.0 + 500.0 * (self.sweep * 0.1).sin();
        self.sweep += 0.2;

        self.buffer.clear();
        for _ in 0..self.block_frames {
            let mut sample = 0.0;
            for (phase, &(hz, amplitude)) in self.phases.iter_mut().zip(&Self::TONES) {
                sample += amplitude * phase.sin();
                *phase = (*phase + TAU * hz / rate) % TAU;
            }
            let sweep_phase = &mut self.phases[3];
            sample += Self::SWEEP_AMPLITUDE * sweep_phase.sin();
            *sweep_phase = (*sweep_phase + TAU * sweep_hz / rate) % TAU;

            let sample = sample * Self::OUTPUT_GAIN;
            for _ in 0..Self::CHANNELS {
                self.buffer.push(sample);
            }
        }
    }
}

impl CaptureSource for TestSignal {
    fn next_block(&mut self) -> Option<CaptureBlock<'_>> {
        if self.silent {
            return None;
        }
        self.render_block();
        Some(CaptureBlock {
            samples: &self.buffer,
            channels: Self::CHANNELS,
            sample_rate: self.sample_rate,
        })
    }
}

/// Producer side of the analysis: owns the pipeline and republishes its
/// snapshot to readers after every update.
///
/// The pipeline itself never crosses threads. Readers only ever see copies
/// made under a lock that guards nothing but the copy.
#[derive(Debug)]
pub struct AudioEngine {
    pipeline: AnalysisPipeline,
    shared: Arc<Mutex<AnalysisSnapshot>>,
    skipped_publishes: u64,
}

impl AudioEngine {
    /// Creates an engine with an initialised pipeline.
    pub fn new(config: AnalysisConfig) -> Result<Self> {
        let size = config.transform_size;
        let mut pipeline = AnalysisPipeline::new();
        pipeline.initialize(config)?;

        Ok(Self {
            pipeline,
            shared: Arc::new(Mutex::new(AnalysisSnapshot::zeroed(size))),
            skipped_publishes: 0,
        })
    }

    pub fn pipeline(&self) -> &AnalysisPipeline {
        &self.pipeline
    }

    /// Returns a handle render threads use to read the latest snapshot.
    pub fn reader(&self) -> SnapshotReader {
        SnapshotReader::new(self.shared.clone())
    }

    /// Number of publishes dropped because a reader held the lock.
    pub fn skipped_publishes(&self) -> u64 {
        self.skipped_publishes
    }

    /// Feeds mono samples. An empty slice counts as absent audio.
    pub fn push_samples(&mut self, samples: &[f32]) -> Result<()> {
        self.pipeline.update(samples)?;
        self.publish()
    }

    /// Feeds one capture cycle. `None` is treated as silence.
    pub fn push_capture(&mut self, block: Option<CaptureBlock<'_>>) -> Result<()> {
        match block {
            None => {
                self.pipeline.update(&[])?;
            }
            Some(block) => {
                self.pipeline.set_sample_rate(block.sample_rate)?;
                self.pipeline
                    .update_interleaved(block.samples, usize::from(block.channels))?;
            }
        }
        self.publish()
    }

    /// Pulls one block from `source` and runs an update cycle with it.
    pub fn pump<S>(&mut self, source: &mut S) -> Result<()>
    where
        S: CaptureSource + ?Sized,
    {
        let block = source.next_block();
        self.push_capture(block)
    }

    /// Shuts the pipeline down. Further pushes fail until a new engine is
    /// created; readers keep the last published snapshot.
    pub fn shutdown(&mut self) {
        self.pipeline.shutdown();
    }

    fn publish(&mut self) -> Result<()> {
        let snapshot = self.pipeline.snapshot()?;
        match self.shared.try_lock() {
            Ok(mut slot) => {
                slot.copy_from(snapshot);
                Ok(())
            }
            Err(TryLockError::WouldBlock) => {
                self.skipped_publishes += 1;
                if self.skipped_publishes % SKIP_WARN_INTERVAL == 1 {
                    tracing::warn!(
                        skipped = self.skipped_publishes,
                        "snapshot reader busy, publish skipped"
                    );
                }
                Ok(())
            }
            Err(TryLockError::Poisoned(_)) => {
                Err(AudioVizError::msg("analysis snapshot has been poisoned"))
            }
        }
    }
}

/// Shared, thread-safe view over the snapshots published by [`AudioEngine`].
#[derive(Clone)]
pub struct SnapshotReader {
    shared: Arc<Mutex<AnalysisSnapshot>>,
}

impl SnapshotReader {
    pub(crate) fn new(shared: Arc<Mutex<AnalysisSnapshot>>) -> Self {
        Self { shared }
    }

    /// Copy of the most recently published snapshot.
    pub fn latest(&self) -> Result<AnalysisSnapshot> {
        Ok(self.lock()?.clone())
    }

    /// Copies the latest snapshot into `out` without reallocating it.
    pub fn read_into(&self, out: &mut AnalysisSnapshot) -> Result<()> {
        let guard = self.lock()?;
        out.copy_from(&guard);
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, AnalysisSnapshot>> {
        self.shared
            .lock()
            .map_err(|_| AudioVizError::msg("analysis snapshot has been poisoned"))
    }
}

impl std::fmt::Debug for SnapshotReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotReader").finish()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    fn engine(sample_rate: u32, frame_size: usize) -> AudioEngine {
        AudioEngine::new(AnalysisConfig::new(sample_rate, frame_size)).unwrap()
    }

    #[test]
    fn publishes_levels_to_reader() {
        let mut audio = engine(44_100, 512);
        let reader = audio.reader();

        audio
            .push_samples(&[0.7_f32; 1024])
            .expect("pushing samples should succeed");

        let snapshot = reader.latest().unwrap();
        assert!(snapshot.energy > 0.0);
        assert_eq!(snapshot.spectrum.len(), 257);
    }

    #[test]
    fn test_signal_drives_all_bands() {
        let mut audio = engine(44_100, 1024);
        let mut signal = TestSignal::new(44_100, 735);

        for _ in 0..20 {
            audio.pump(&mut signal).unwrap();
        }

        let snapshot = audio.reader().latest().unwrap();
        assert!(snapshot.is_well_formed());
        assert!(snapshot.bass > 0.0 && snapshot.mid > 0.0 && snapshot.treble > 0.0);
        assert!(snapshot.energy > 0.05);
    }

    #[test]
    fn silent_source_fades_levels() {
        let mut audio = engine(44_100, 1024);
        let mut signal = TestSignal::new(44_100, 1024);
        for _ in 0..5 {
            audio.pump(&mut signal).unwrap();
        }
        let loud = audio.reader().latest().unwrap().energy;

        signal.set_silent(true);
        assert!(signal.next_block().is_none());
        audio.pump(&mut signal).unwrap();

        let faded = audio.reader().latest().unwrap().energy;
        assert!(faded < loud);
        assert!(faded > 0.0);
    }

    #[test]
    fn capture_rate_change_retunes_pipeline() {
        let mut audio = engine(44_100, 1024);
        let mut signal = TestSignal::new(48_000, 512);

        audio.pump(&mut signal).unwrap();
        assert_eq!(audio.pipeline().config().unwrap().sample_rate, 48_000);
    }

    #[test]
    fn read_into_reuses_caller_buffer() {
        let mut audio = engine(44_100, 256);
        audio.push_samples(&[0.3; 256]).unwrap();

        let reader = audio.reader();
        let mut local = AnalysisSnapshot::zeroed(256);
        reader.read_into(&mut local).unwrap();
        assert_eq!(local, reader.latest().unwrap());
    }

    #[test]
    fn contended_publish_is_skipped_not_blocked() {
        let mut audio = engine(44_100, 256);
        let reader = audio.reader();

        let guard = reader.shared.lock().unwrap();
        audio.push_samples(&[0.5; 256]).unwrap();
        assert_eq!(audio.skipped_publishes(), 1);
        drop(guard);

        audio.push_samples(&[0.5; 256]).unwrap();
        assert!(reader.latest().unwrap().energy > 0.0);
    }

    #[test]
    fn producer_and_reader_on_separate_threads() {
        let mut audio = engine(44_100, 1024);
        let reader = audio.reader();

        let producer = thread::spawn(move || {
            let mut signal = TestSignal::new(44_100, 512);
            for _ in 0..50 {
                audio.pump(&mut signal)?;
            }
            Ok::<_, AudioVizError>(audio)
        });

        let mut local = AnalysisSnapshot::default();
        for _ in 0..50 {
            reader.read_into(&mut local).unwrap();
            assert!(local.is_well_formed());
        }

        let audio = producer.join().unwrap().unwrap();
        let final_snapshot = reader.latest().unwrap();
        assert!(final_snapshot.energy > 0.0 || audio.skipped_publishes() > 0);
    }

    #[test]
    fn shutdown_rejects_further_pushes() {
        let mut audio = engine(44_100, 256);
        audio.shutdown();
        assert!(matches!(
            audio.push_samples(&[0.0; 16]),
            Err(AudioVizError::NotInitialized)
        ));
    }
}
