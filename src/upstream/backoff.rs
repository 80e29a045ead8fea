//! Retry delay policy: exponential backoff with jitter.

use std::time::Duration;

/// Delay policy for retrying transient upstream failures.
///
/// `delay(n) = min(base * 2^(n-1), max)`, plus a random jitter of up to
/// `jitter_fraction` of that value. The result never exceeds `max`.
#[derive(Debug, Clone, PartialEq)]
pub struct Backoff {
  base: Duration,
  max: Duration,
  jitter_fraction: f64,
}

impl Default for Backoff {
  fn default() -> Self {
    Self::new(Duration::from_millis(500), Duration::from_secs(6), 0.2)
  }
}

impl Backoff {
  /// `jitter_fraction` is clamped to `[0, 1]`.
  pub fn new(base: Duration, max: Duration, jitter_fraction: f64) -> Self {
    let jitter_fraction = if jitter_fraction.is_finite() {
      jitter_fraction.clamp(0.0, 1.0)
    } else {
      0.0
    };
    Self {
      base,
      max: max.max(base),
      jitter_fraction,
    }
  }

  /// Delay before retrying after failed attempt number `attempt` (1-based)
  pub fn delay(&self, attempt: u32) -> Duration {
    self.delay_with(attempt, &mut fastrand::Rng::new())
  }

  /// Same as `delay`, drawing jitter from the given source
  pub fn delay_with(&self, attempt: u32, rng: &mut fastrand::Rng) -> Duration {
    let exponent = attempt.saturating_sub(1).min(31);
    let computed = self.base.saturating_mul(1u32 << exponent).min(self.max);
    let jitter = computed.mul_f64(rng.f64() * self.jitter_fraction);
    computed.saturating_add(jitter).min(self.max)
  }
}
