use serde::{Deserialize, Serialize};

use crate::{AnalysisSnapshot, AudioVizError, Result};

/// Linear RGBA colour.
pub type Rgba = [f32; 4];

/// Backend-agnostic drawing primitive. Coordinates are normalised to the
/// unit square with the origin at the bottom left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum DrawCommand {
    Bar {
        x: f32,
        width: f32,
        height: f32,
        color: Rgba,
    },
    Line {
        from: [f32; 2],
        to: [f32; 2],
        thickness: f32,
        color: Rgba,
    },
    Circle {
        center: [f32; 2],
        radius: f32,
        color: Rgba,
    },
}

/// A visualisation variant: consumes a snapshot, produces drawing calls.
pub trait Visualiser {
    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    /// Appends this frame's drawing calls to `out`.
    fn render(&mut self, snapshot: &AnalysisSnapshot, out: &mut Vec<DrawCommand>);
}

/// Classic bar spectrum.
#[derive(Debug, Clone)]
pub struct SpectrumBars {
    bars: usize,
}

impl SpectrumBars {
    pub fn new(bars: usize) -> Self {
        Self { bars: bars.max(1) }
    }
}

impl Default for SpectrumBars {
    fn default() -> Self {
        Self::new(64)
    }
}

impl Visualiser for SpectrumBars {
    fn name(&self) -> &str {
        "spectrum"
    }

    fn description(&self) -> &str {
        "Classic spectrum analyser with bars"
    }

    fn render(&mut self, snapshot: &AnalysisSnapshot, out: &mut Vec<DrawCommand>) {
        let width = 1.0 / self.bars as f32;
        for index in 0..self.bars {
            let level = bucket_average(&snapshot.spectrum, index, self.bars);
            out.push(DrawCommand::Bar {
                x: index as f32 * width,
                width: width * 0.8,
                height: level,
                color: hue(index as f32 / self.bars as f32, 0.4 + 0.6 * snapshot.energy),
            });
        }
    }
}

/// Oscilloscope trace of the analysed waveform.
#[derive(Debug, Clone)]
pub struct Oscilloscope {
    points: usize,
}

impl Oscilloscope {
    pub fn new(points: usize) -> Self {
        Self { points: points.max(2) }
    }
}

impl Default for Oscilloscope {
    fn default() -> Self {
        Self::new(256)
    }
}

impl Visualiser for Oscilloscope {
    fn name(&self) -> &str {
        "oscilloscope"
    }

    fn description(&self) -> &str {
        "Oscilloscope-style waveform display"
    }

    fn render(&mut self, snapshot: &AnalysisSnapshot, out: &mut Vec<DrawCommand>) {
        let waveform = &snapshot.waveform;
        if waveform.is_empty() {
            return;
        }

        let point = |i: usize| {
            let index = i * (waveform.len() - 1) / (self.points - 1);
            let y = 0.5 + 0.5 * waveform[index].clamp(-1.0, 1.0);
            [i as f32 / (self.points - 1) as f32, y]
        };
        let color = hue(0.45, 0.5 + 0.5 * snapshot.energy);
        let thickness = 1.0 + 3.0 * snapshot.transient;

        for i in 1..self.points {
            out.push(DrawCommand::Line {
                from: point(i - 1),
                to: point(i),
                thickness,
                color,
            });
        }
    }
}

/// Radial spectrum around a ring that pulses with the bass.
#[derive(Debug, Clone)]
pub struct CircularSpectrum {
    spokes: usize,
}

impl CircularSpectrum {
    pub fn new(spokes: usize) -> Self {
        Self {
            spokes: spokes.max(3),
        }
    }
}

impl Default for CircularSpectrum {
    fn default() -> Self {
        Self::new(96)
    }
}

impl Visualiser for CircularSpectrum {
    fn name(&self) -> &str {
        "circular"
    }

    fn description(&self) -> &str {
        "Circular frequency spectrum with reactive rings"
    }

    fn render(&mut self, snapshot: &AnalysisSnapshot, out: &mut Vec<DrawCommand>) {
        let center = [0.5, 0.5];
        let radius = 0.15 + 0.1 * snapshot.bass;

        out.push(DrawCommand::Circle {
            center,
            radius,
            color: hue(0.6, 0.3 + 0.7 * snapshot.transient),
        });

        for index in 0..self.spokes {
            let level = bucket_average(&snapshot.spectrum, index, self.spokes);
            let angle = std::f32::consts::TAU * index as f32 / self.spokes as f32;
            let (sin, cos) = angle.sin_cos();
            let outer = radius + 0.3 * level;
            out.push(DrawCommand::Line {
                from: [center[0] + radius * cos, center[1] + radius * sin],
                to: [center[0] + outer * cos, center[1] + outer * sin],
                thickness: 2.0,
                color: hue(index as f32 / self.spokes as f32, 0.5 + 0.5 * snapshot.mid),
            });
        }
    }
}

/// One meter per scalar level.
#[derive(Debug, Clone, Default)]
pub struct LevelMeters;

impl Visualiser for LevelMeters {
    fn name(&self) -> &str {
        "meters"
    }

    fn description(&self) -> &str {
        "Energy, bass, mid, treble and transient meters"
    }

    fn render(&mut self, snapshot: &AnalysisSnapshot, out: &mut Vec<DrawCommand>) {
        let levels = [
            snapshot.energy,
            snapshot.bass,
            snapshot.mid,
            snapshot.treble,
            snapshot.transient,
        ];
        let width = 1.0 / levels.len() as f32;
        for (index, level) in levels.into_iter().enumerate() {
            out.push(DrawCommand::Bar {
                x: index as f32 * width,
                width: width * 0.6,
                height: level,
                color: hue(index as f32 / levels.len() as f32, 1.0),
            });
        }
    }
}

/// Registry of visualiser variants with one active at a time.
pub struct VisualiserRegistry {
    variants: Vec<Box<dyn Visualiser + Send>>,
    active: usize,
    commands: Vec<DrawCommand>,
}

impl VisualiserRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self {
            variants: Vec::new(),
            active: 0,
            commands: Vec::new(),
        }
    }

    /// Registry holding every built-in variant, `spectrum` active.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(SpectrumBars::default()));
        registry.register(Box::new(Oscilloscope::default()));
        registry.register(Box::new(CircularSpectrum::default()));
        registry.register(Box::new(LevelMeters));
        registry
    }

    /// Adds a variant. A variant with an already registered name replaces
    /// the previous one.
    pub fn register(&mut self, visualiser: Box<dyn Visualiser + Send>) {
        match self
            .variants
            .iter()
            .position(|existing| existing.name() == visualiser.name())
        {
            Some(index) => self.variants[index] = visualiser,
            None => self.variants.push(visualiser),
        }
    }

    /// Returns registered names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.variants.iter().map(|variant| variant.name())
    }

    /// `(name, description)` for every registered variant.
    pub fn descriptions(&self) -> impl Iterator<Item = (&str, &str)> {
        self.variants
            .iter()
            .map(|variant| (variant.name(), variant.description()))
    }

    /// Makes `name` the active variant. Unknown names leave the selection
    /// unchanged and return an error.
    pub fn select(&mut self, name: &str) -> Result<()> {
        let index = self
            .variants
            .iter()
            .position(|variant| variant.name() == name)
            .ok_or_else(|| AudioVizError::msg(format!("unknown visualiser `{name}`")))?;
        self.active = index;
        tracing::info!(visualiser = name, "visualiser selected");
        Ok(())
    }

    /// Returns the name of the active variant.
    pub fn active_name(&self) -> Option<&str> {
        self.variants.get(self.active).map(|variant| variant.name())
    }

    /// Renders the active variant. The returned list is reused across
    /// frames and valid until the next call.
    pub fn render(&mut self, snapshot: &AnalysisSnapshot) -> &[DrawCommand] {
        self.commands.clear();
        if let Some(variant) = self.variants.get_mut(self.active) {
            variant.render(snapshot, &mut self.commands);
        }
        &self.commands
    }
}

impl Default for VisualiserRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl std::fmt::Debug for VisualiserRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisualiserRegistry")
            .field("variants", &self.names().collect::<Vec<_>>())
            .field("active", &self.active_name())
            .finish()
    }
}

/// Mean of the `index`-th of `buckets` equal slices of `values`.
fn bucket_average(values: &[f32], index: usize, buckets: usize) -> f32 {
    if values.is_empty() || buckets == 0 {
        return 0.0;
    }
    let start = index * values.len() / buckets;
    let end = ((index + 1) * values.len() / buckets).max(start + 1).min(values.len());
    let slice = &values[start.min(values.len() - 1)..end];
    slice.iter().sum::<f32>() / slice.len().max(1) as f32
}

/// Cheap hue wheel, `t` in [0, 1).
fn hue(t: f32, brightness: f32) -> Rgba {
    let channel = |offset: f32| {
        let phase = std::f32::consts::TAU * (t + offset);
        (0.5 + 0.5 * phase.cos()) * brightness.clamp(0.0, 1.0)
    };
    [channel(0.0), channel(2.0 / 3.0), channel(1.0 / 3.0), 1.0]
}
