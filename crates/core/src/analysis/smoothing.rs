use std::collections::{vec_deque, VecDeque};

use super::{bands::BandEnergies, dynamics::log_scale};
use crate::config::SmoothingConfig;

/// `exp(-Δt / τ)` with `Δt` in seconds and `τ` in milliseconds.
pub fn smoothing_coefficient(period_secs: f32, time_constant_ms: f32) -> f32 {
    let tau = time_constant_ms / 1000.0;
    if !(tau > 0.0) || !(period_secs >= 0.0) {
        return 0.0;
    }
    (-period_secs / tau).exp().clamp(0.0, 1.0)
}

/// Asymmetric exponential moving average: the attack coefficient applies
/// while the input rises above the smoothed value, the release coefficient
/// while it falls below.
#[derive(Debug, Clone, PartialEq)]
pub struct TemporalSmoother {
    attack_ms: f32,
    release_ms: f32,
    period: f32,
    attack: f32,
    release: f32,
}

impl TemporalSmoother {
    /// Returns a smoother stepping every `period_secs` seconds.
    pub fn new(config: &SmoothingConfig, period_secs: f32) -> Self {
        let mut smoother = Self {
            attack_ms: config.attack_ms,
            release_ms: config.release_ms,
            period: f32::NAN,
            attack: 0.0,
            release: 0.0,
        };
        smoother.set_period(period_secs);
        smoother
    }

    /// Updates the time step between two smoothing steps. Coefficients are
    /// only recomputed when the period actually changes.
    pub fn set_period(&mut self, period_secs: f32) {
        if self.period == period_secs {
            return;
        }
        self.period = period_secs;
        self.attack = smoothing_coefficient(period_secs, self.attack_ms);
        self.release = smoothing_coefficient(period_secs, self.release_ms);
    }

    pub fn period(&self) -> f32 {
        self.period
    }

    /// `(attack, release)` coefficients for the current period.
    pub fn coefficients(&self) -> (f32, f32) {
        (self.attack, self.release)
    }

    /// Returns `current` moved one step toward `target`.
    pub fn step(&self, current: f32, target: f32) -> f32 {
        let coeff = if target > current {
            self.attack
        } else {
            self.release
        };
        let next = coeff * current + (1.0 - coeff) * target;
        if next.is_finite() {
            next
        } else {
            target
        }
    }

    /// Returns [`step`](Self::step) applied to each of the four levels.
    pub fn step_levels(&self, current: BandEnergies, target: BandEnergies) -> BandEnergies {
        BandEnergies {
            energy: self.step(current.energy, target.energy),
            bass: self.step(current.bass, target.bass),
            mid: self.step(current.mid, target.mid),
            treble: self.step(current.treble, target.treble),
        }
    }
}

/// Scalar subset of a snapshot kept for cross-frame comparisons.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameLevels {
    pub levels: BandEnergies,
    pub transient: f32,
}

/// Bounded FIFO of recent frames. Allocates once; appending at capacity
/// evicts the oldest entry.
#[derive(Debug, Clone)]
pub struct HistoryBuffer<T> {
    entries: VecDeque<T>,
    capacity: usize,
}

impl<T> HistoryBuffer<T> {
    /// Returns an empty buffer holding at most `capacity` entries (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends `entry`, dropping the oldest one when full.
    pub fn push(&mut self, entry: T) {
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// Most recently appended entry.
    pub fn latest(&self) -> Option<&T> {
        self.entries.back()
    }

    /// Returns how many entries are stored.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest to newest.
    pub fn iter(&self) -> vec_deque::Iter<'_, T> {
        self.entries.iter()
    }
}

/// Positive energy jump against the previous frame, log scaled and clamped.
/// Zero when there is no previous frame.
pub fn transient_strength(current_energy: f32, previous: Option<&FrameLevels>, gain: f32) -> f32 {
    let Some(previous) = previous else {
        return 0.0;
    };
    let delta = (current_energy - previous.levels.energy).max(0.0);
    let strength = log_scale(delta * gain);
    if strength.is_finite() {
        strength.clamp(0.0, 1.0)
    } else {
        0.0
    }
}
