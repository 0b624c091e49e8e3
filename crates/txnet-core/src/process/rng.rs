use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Gamma, Poisson};

use crate::error::{Result, SimError};

/// Largest count a single Poisson draw may return.
pub const MAX_POISSON_COUNT: u32 = 1 << 24;

/// Seeded random stream owned by exactly one process.
///
/// ChaCha8 output is stable across platforms and crate releases, so a seed
/// plus a fixed call order reproduces a run bit for bit.
#[derive(Debug, Clone)]
pub struct ProcessRng {
    seed: u64,
    inner: ChaCha8Rng,
}

impl ProcessRng {
    /// Create a new stream from a seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            inner: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Seed this stream was created from.
    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// Uniform draw from the closed interval `[low, high]`.
    ///
    /// Returns `low` when the interval is degenerate.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidParameter`] if either bound or the width
    /// of the interval is not finite.
    pub fn uniform(&mut self, low: f64, high: f64) -> Result<f64> {
        if !low.is_finite() {
            return Err(SimError::InvalidParameter {
                name: "low",
                value: low,
                reason: "uniform bound must be finite",
            });
        }
        if !(high - low).is_finite() {
            return Err(SimError::InvalidParameter {
                name: "high",
                value: high,
                reason: "uniform interval must have a finite width",
            });
        }
        if high <= low {
            return Ok(low);
        }
        Ok(self.inner.gen_range(low..=high))
    }

    /// Bernoulli trial with success probability `p`.
    pub fn bernoulli(&mut self, p: f64) -> bool {
        if p <= 0.0 {
            return false;
        }
        if p >= 1.0 {
            return true;
        }
        self.inner.gen_bool(p)
    }

    /// Uniform index in `[0, len)`, or `None` for an empty range.
    pub fn index(&mut self, len: usize) -> Option<usize> {
        (len > 0).then(|| self.inner.gen_range(0..len))
    }

    /// Poisson count with mean `lambda`; zero mean always yields zero.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidParameter`] for negative or non-finite
    /// means, or when the drawn count exceeds [`MAX_POISSON_COUNT`].
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::float_cmp
    )]
    pub fn poisson(&mut self, lambda: f64) -> Result<usize> {
        if lambda == 0.0 {
            return Ok(0);
        }
        let dist = Poisson::new(lambda).map_err(|_| SimError::InvalidParameter {
            name: "lambda",
            value: lambda,
            reason: "must be finite and non-negative",
        })?;
        let draw = dist.sample(&mut self.inner).round();
        if !(0.0..=f64::from(MAX_POISSON_COUNT)).contains(&draw) {
            return Err(SimError::InvalidParameter {
                name: "lambda",
                value: lambda,
                reason: "mean too large: Poisson count does not fit a strain or offspring count",
            });
        }
        // In range and integral after the check above.
        usize::try_from(draw as u64).map_err(|_| SimError::InvalidParameter {
            name: "lambda",
            value: lambda,
            reason: "Poisson count does not fit usize",
        })
    }

    /// `1 + Poisson(lambda)`, the count used for strains, gametocytes and
    /// oocysts.
    ///
    /// # Errors
    ///
    /// Same as [`ProcessRng::poisson`].
    pub fn one_plus_poisson(&mut self, lambda: f64) -> Result<usize> {
        self.poisson(lambda)?
            .checked_add(1)
            .ok_or(SimError::InvalidParameter {
                name: "lambda",
                value: lambda,
                reason: "Poisson count overflows",
            })
    }

    /// Gamma draw with the given shape and scale.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidParameter`] unless both are positive, or
    /// if the draw overflows to infinity.
    pub fn gamma(&mut self, shape: f64, scale: f64) -> Result<f64> {
        let dist = Gamma::new(shape, scale).map_err(|_| SimError::InvalidParameter {
            name: "shape/scale",
            value: shape,
            reason: "gamma shape and scale must be positive",
        })?;
        let draw = dist.sample(&mut self.inner);
        if !draw.is_finite() {
            return Err(SimError::InvalidParameter {
                name: "scale",
                value: scale,
                reason: "gamma draw is not finite",
            });
        }
        Ok(draw)
    }
}

impl RngCore for ProcessRng {
    fn next_u32(&mut self) -> u32 {
        self.inner.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.inner.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.inner.fill_bytes(dest);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> std::result::Result<(), rand::Error> {
        self.inner.try_fill_bytes(dest)
    }
}
