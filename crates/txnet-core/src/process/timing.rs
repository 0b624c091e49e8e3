//! Timing and detection processes.

use crate::error::{Result, SimError, ensure_non_negative, ensure_positive};

use super::{DetectionContext, DetectionProcess, ProcessRng, SourceTimeProcess, TimePropagation};

/// Root infection times drawn uniformly from `[min_time, max_time]`.
#[derive(Debug, Clone)]
pub struct UniformSourceTime {
    min_time: f64,
    max_time: f64,
    rng: ProcessRng,
}

impl UniformSourceTime {
    /// # Errors
    ///
    /// Returns [`SimError::InvalidParameter`] if the bounds or their distance
    /// are not finite, or `max_time < min_time`.
    pub fn new(min_time: f64, max_time: f64, seed: u64) -> Result<Self> {
        if !(max_time - min_time).is_finite() || max_time < min_time {
            return Err(SimError::InvalidParameter {
                name: "max_time",
                value: max_time,
                reason: "must be finite and not below min_time",
            });
        }
        Ok(Self {
            min_time,
            max_time,
            rng: ProcessRng::new(seed),
        })
    }
}

impl SourceTimeProcess for UniformSourceTime {
    fn name(&self) -> &'static str {
        "uniform_source_time"
    }

    fn sample(&mut self) -> Result<f64> {
        self.rng.uniform(self.min_time, self.max_time)
    }
}

/// Transmission uniformly distributed over the parent's infectious window.
///
/// The delay after the parent's infection is drawn from
/// `[min_delay, parent_duration]`; when the parent is detected before
/// `min_delay` elapses the delay collapses to `parent_duration`.
#[derive(Debug, Clone)]
pub struct UniformTransmissionTime {
    min_delay: f64,
    rng: ProcessRng,
}

impl UniformTransmissionTime {
    /// # Errors
    ///
    /// Returns [`SimError::InvalidParameter`] for a negative delay.
    pub fn new(min_delay: f64, seed: u64) -> Result<Self> {
        ensure_non_negative("min_delay", min_delay)?;
        Ok(Self {
            min_delay,
            rng: ProcessRng::new(seed),
        })
    }
}

impl TimePropagation for UniformTransmissionTime {
    fn name(&self) -> &'static str {
        "uniform_transmission_time"
    }

    fn sample(&mut self, parent_time: f64, parent_duration: f64) -> Result<f64> {
        let window = parent_duration.max(0.0);
        let low = self.min_delay.min(window);
        Ok(parent_time + self.rng.uniform(low, window)?)
    }
}

/// Passive detection: durations drawn from `Gamma(shape, scale)`.
#[derive(Debug, Clone)]
pub struct GammaDetection {
    shape: f64,
    scale: f64,
    rng: ProcessRng,
}

impl GammaDetection {
    /// # Errors
    ///
    /// Returns [`SimError::InvalidParameter`] unless shape and scale are
    /// positive and the mean duration `shape * scale` is finite.
    pub fn new(shape: f64, scale: f64, seed: u64) -> Result<Self> {
        ensure_positive("shape", shape)?;
        ensure_positive("scale", scale)?;
        ensure_positive("mean_duration", shape * scale)?;
        Ok(Self {
            shape,
            scale,
            rng: ProcessRng::new(seed),
        })
    }
}

impl DetectionProcess for GammaDetection {
    fn name(&self) -> &'static str {
        "gamma_detection"
    }

    fn sample(&mut self, _context: &DetectionContext<'_>) -> Result<f64> {
        // Gamma draws can underflow to zero for tiny shapes.
        Ok(self.rng.gamma(self.shape, self.scale)?.max(f64::MIN_POSITIVE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CTX: DetectionContext<'static> = DetectionContext {
        node: "n",
        infection_time: 0.0,
    };

    #[test]
    fn source_time_in_bounds() {
        let mut p = UniformSourceTime::new(0.0, 1000.0, 25).expect("valid");
        for _ in 0..200 {
            let t = p.sample().expect("sample");
            assert!((0.0..=1000.0).contains(&t));
        }
    }

    #[test]
    fn source_time_rejects_inverted_bounds() {
        assert!(UniformSourceTime::new(10.0, 1.0, 0).is_err());
    }

    #[test]
    fn source_time_rejects_range_wider_than_f64() {
        assert!(UniformSourceTime::new(-1e308, 1e308, 0).is_err());
        assert!(UniformSourceTime::new(0.0, f64::INFINITY, 0).is_err());
    }

    #[test]
    fn unbounded_parent_window_is_an_error() {
        let mut p = UniformTransmissionTime::new(9.0, 25).expect("valid");
        assert!(matches!(
            p.sample(0.0, f64::INFINITY),
            Err(SimError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn transmission_stays_in_parent_window() {
        let mut p = UniformTransmissionTime::new(9.0, 25).expect("valid");
        for _ in 0..200 {
            let t = p.sample(100.0, 40.0).expect("sample");
            assert!((109.0..=140.0).contains(&t), "t = {t}");
        }
    }

    #[test]
    fn short_window_clamps_to_detection() {
        let mut p = UniformTransmissionTime::new(9.0, 25).expect("valid");
        let t = p.sample(5.0, 2.0).expect("sample");
        assert!((t - 7.0).abs() < 1e-12);
    }

    #[test]
    fn detection_is_positive_and_seeded() {
        let mut a = GammaDetection::new(9.0, 10.0, 25).expect("valid");
        let mut b = GammaDetection::new(9.0, 10.0, 25).expect("valid");
        for _ in 0..50 {
            let x = a.sample(&CTX).expect("sample");
            assert!(x > 0.0);
            assert_eq!(x.to_bits(), b.sample(&CTX).expect("sample").to_bits());
        }
    }

    #[test]
    fn detection_rejects_zero_shape() {
        assert!(GammaDetection::new(0.0, 1.0, 0).is_err());
    }

    #[test]
    fn detection_rejects_overflowing_mean() {
        assert!(matches!(
            GammaDetection::new(9.0, 1e308, 0),
            Err(SimError::InvalidParameter { name: "mean_duration", .. })
        ));
    }
}
