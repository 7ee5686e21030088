use std::{f32::consts::PI, ops::Deref};

use crate::{AudioVizError, Result};

/// Precomputed Hann taper. Immutable once built; build a new one when the
/// transform size changes.
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    weights: Vec<f32>,
}

impl Window {
    /// Builds a symmetric Hann window, `w[i] = 0.5 * (1 - cos(2πi / (N - 1)))`.
    ///
    /// Lengths below two have no defined taper and are rejected.
    pub fn hann(len: usize) -> Result<Self> {
        if len <= 1 {
            return Err(AudioVizError::InvalidInput(
                "hann window requires at least two points",
            ));
        }

        let denominator = (len - 1) as f32;
        let weights = (0..len)
            .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / denominator).cos()))
            .collect();

        Ok(Self { weights })
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}

impl Deref for Window {
    type Target = [f32];

    fn deref(&self) -> &[f32] {
        &self.weights
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hann_tapers_to_zero_at_edges() {
        for exp in 3..=12 {
            let n = 1usize << exp;
            let window = Window::hann(n).unwrap();
            assert_eq!(window.len(), n);
            assert!(window[0].abs() < 1e-6);
            assert!(window[n - 1].abs() < 1e-6);
            // (N-1)/2 lands half a sample off centre for even N.
            let half_step = PI / (n - 1) as f32;
            let tolerance = half_step * half_step / 4.0 + 1e-5;
            assert!((window[(n - 1) / 2] - 1.0).abs() <= tolerance, "n = {n}");
        }
    }

    #[test]
    fn hann_is_symmetric() {
        let window = Window::hann(64).unwrap();
        for i in 0..32 {
            assert!((window[i] - window[63 - i]).abs() < 1e-5);
        }
    }

    #[test]
    fn rejects_degenerate_lengths() {
        assert!(Window::hann(0).is_err());
        assert!(Window::hann(1).is_err());
        assert!(Window::hann(2).is_ok());
    }
}
