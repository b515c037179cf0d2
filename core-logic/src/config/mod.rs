use crate::error::ConfigError;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Inclusive `[min, max]` range used for randomized pauses and amounts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UniformRange {
    pub min: f64,
    pub max: f64,
}

impl UniformRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn validate(&self, field: &str) -> Result<(), ConfigError> {
        if !self.min.is_finite() || !self.max.is_finite() || self.min < 0.0 {
            return Err(ConfigError::InvalidValue {
                field: field.to_string(),
                reason: format!("range [{}, {}] must be finite and non-negative", self.min, self.max),
            });
        }
        if self.min > self.max {
            return Err(ConfigError::InvalidValue {
                field: field.to_string(),
                reason: format!("min {} is greater than max {}", self.min, self.max),
            });
        }
        Ok(())
    }

    /// Uniform sample in `[min, max]`.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        if self.max <= self.min {
            return self.min;
        }
        rng.gen_range(self.min..=self.max)
    }

    pub fn sample_secs<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        saturating_secs(self.sample(rng))
    }

    pub fn sample_minutes<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        saturating_secs(self.sample(rng) * 60.0)
    }
}

/// `Duration::from_secs_f64` without the panic: negatives and NaN clamp to
/// zero, anything past `Duration::MAX` saturates.
pub fn saturating_secs(secs: f64) -> Duration {
    if secs.is_nan() || secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}
