//! Reconnect backoff policy.
//!
//! Exponential delay with a cap and symmetric jitter:
//! `min(max, base * 2^attempt) * (1 + (random * 2 - 1) * jitter)`.

use std::time::Duration;

use anilibria_settings::ReconnectSettings;

/// Delay in milliseconds before reconnect attempt `attempt` (0-based).
///
/// `random` must be in `[0.0, 1.0)`.
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn backoff_delay_ms(
    attempt: u32,
    base_delay_ms: u64,
    max_delay_ms: u64,
    jitter_factor: f64,
    random: f64,
) -> u64 {
    let exponential = base_delay_ms.saturating_mul(1u64 << attempt.min(31));
    let capped = exponential.min(max_delay_ms);

    // Maps random [0,1) to [-jitter, +jitter]
    let jitter = 1.0 + (random * 2.0 - 1.0) * jitter_factor;
    ((capped as f64) * jitter).round().max(0.0) as u64
}

/// Reconnect policy of the supervisor.
#[derive(Clone, Debug, PartialEq)]
pub struct ReconnectPolicy {
    /// Consecutive failures tolerated. `None` retries forever.
    pub max_retries: Option<u32>,
    /// Base delay in milliseconds.
    pub base_delay_ms: u64,
    /// Cap on a single delay in milliseconds.
    pub max_delay_ms: u64,
    /// Jitter factor, 0.0–1.0.
    pub jitter_factor: f64,
    /// Session uptime in milliseconds that resets the failure count.
    pub stable_after_ms: u64,
}

impl ReconnectPolicy {
    /// Whether `failures` consecutive failures exhaust the policy.
    pub fn exhausted(&self, failures: u32) -> bool {
        self.max_retries.is_some_and(|max| failures >= max)
    }

    /// Whether a session that stayed up for `uptime` ends the failure streak.
    pub fn is_stable(&self, uptime: Duration) -> bool {
        uptime >= Duration::from_millis(self.stable_after_ms)
    }

    /// Delay before the reconnect following `failures` consecutive failures.
    ///
    /// Zero failures (a healthy session just ended) reconnects immediately.
    pub fn delay(&self, failures: u32) -> Duration {
        if failures == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(backoff_delay_ms(
            failures - 1,
            self.base_delay_ms,
            self.max_delay_ms,
            self.jitter_factor,
            rand::random::<f64>(),
        ))
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::from(&ReconnectSettings::default())
    }
}

impl From<&ReconnectSettings> for ReconnectPolicy {
    fn from(settings: &ReconnectSettings) -> Self {
        Self {
            max_retries: (settings.max_retries > 0).then_some(settings.max_retries),
            base_delay_ms: settings.base_delay_ms,
            max_delay_ms: settings.max_delay_ms,
            jitter_factor: settings.jitter_factor,
            stable_after_ms: settings.stable_after_ms,
        }
    }
}
