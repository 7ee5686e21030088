use crate::config::DynamicsConfig;

/// Floor applied before the logarithm so silence stays finite.
pub const LOG_FLOOR: f32 = 1e-4;

/// `log2(max(value, LOG_FLOOR) + 1)`. Expands detail at low amplitudes.
pub fn log_scale(value: f32) -> f32 {
    let value = if value.is_nan() { LOG_FLOOR } else { value.max(LOG_FLOOR) };
    (value + 1.0).log2()
}

/// Soft-knee compression: identity up to `threshold`, slope `ratio` above it.
pub fn compress(value: f32, threshold: f32, ratio: f32) -> f32 {
    if value <= threshold {
        value
    } else {
        threshold + (value - threshold) * ratio
    }
}

/// Log scale, compression, sensitivity gain and a final clamp to `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DynamicsProcessor {
    threshold: f32,
    ratio: f32,
}

impl DynamicsProcessor {
    pub fn new(config: &DynamicsConfig) -> Self {
        Self {
            threshold: config.threshold,
            ratio: config.ratio,
        }
    }

    pub fn process(&self, raw: f32, sensitivity: f32) -> f32 {
        let shaped = compress(log_scale(raw), self.threshold, self.ratio) * sensitivity;
        if shaped.is_finite() {
            shaped.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_scale_is_finite_at_zero_and_one_at_unity() {
        assert!(log_scale(0.0) > 0.0);
        assert!(log_scale(0.0) < 2e-4);
        assert!(log_scale(-3.0) == log_scale(0.0));
        assert!(log_scale(f32::NAN).is_finite());
        assert!((log_scale(1.0) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn compression_is_monotonic() {
        let values: Vec<f32> = (0..200).map(|i| i as f32 * 0.01).collect();
        for pair in values.windows(2) {
            assert!(compress(pair[0], 0.3, 0.6) <= compress(pair[1], 0.3, 0.6));
        }
    }

    #[test]
    fn compression_only_reduces_above_threshold() {
        assert_eq!(compress(0.2, 0.3, 0.5), 0.2);
        assert_eq!(compress(0.3, 0.3, 0.5), 0.3);
        assert!((compress(0.7, 0.3, 0.5) - 0.5).abs() < 1e-6);
        assert_eq!(compress(0.9, 0.3, 1.0), 0.9);
    }

    #[test]
    fn processor_clamps_to_unit_range() {
        let dynamics = DynamicsProcessor::new(&DynamicsConfig::default());
        assert!((dynamics.process(1.0, 1.0) - 0.72).abs() < 1e-5);
        assert_eq!(dynamics.process(1000.0, 10.0), 1.0);
        assert_eq!(dynamics.process(f32::INFINITY, 1.0), 0.0);
        assert!(dynamics.process(0.0, 1.0) < 1e-3);
        assert_eq!(dynamics.process(0.5, 0.0), 0.0);
    }

    #[test]
    fn processor_is_monotonic() {
        let dynamics = DynamicsProcessor::new(&DynamicsConfig::default());
        let mut previous = 0.0;
        for i in 0..500 {
            let value = dynamics.process(i as f32 * 0.01, 1.0);
            assert!(value >= previous);
            previous = value;
        }
    }
}
