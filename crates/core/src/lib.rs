//! Core library for the Audio Visualiser application.
//!
//! The crate turns a continuous stream of audio samples into a compact,
//! smoothed [`AnalysisSnapshot`] once per display frame. Capture backends
//! feed an [`AudioEngine`] through the [`CaptureSource`] boundary; render code
//! reads snapshots through a [`SnapshotReader`] and hands them to the active
//! [`Visualiser`].

pub mod analysis;
pub mod audio;
pub mod config;
pub mod error;
pub mod render;

pub use analysis::{
    AnalysisPipeline, AnalysisSnapshot, BandEnergies, PipelineState, SpectrumFrame, Window,
};
pub use audio::{AudioEngine, CaptureBlock, CaptureSource, SnapshotReader, TestSignal};
pub use config::{AnalysisConfig, AppConfig, BandLayout, DynamicsConfig, SmoothingConfig};
pub use error::{AudioVizError, Result};
pub use render::{DrawCommand, Visualiser, VisualiserRegistry};
