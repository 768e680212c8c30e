//! Reconnect backoff for a session whose transport has closed.
//!
//! On transport close the owning component reconnects after a jittered
//! exponential backoff, starting at `reconnect_initial_backoff_ms` and
//! doubling up to a `reconnect_max_backoff_ms` ceiling.

use std::time::Duration;

use rand::Rng;

use crate::config::PlayerConfig;

/// Computes the sequence of backoff delays a reconnect loop steps through:
/// doubling from `initial` up to `max`, each jittered by up to ±20% to
/// avoid a thundering herd of reconnecting clients all retrying in lockstep.
pub struct BackoffSchedule {
    initial_ms: u64,
    max_ms: u64,
    attempt: u32,
}

impl BackoffSchedule {
    #[must_use]
    pub fn new(config: &PlayerConfig) -> Self {
        Self {
            initial_ms: config.reconnect_initial_backoff_ms,
            max_ms: config.reconnect_max_backoff_ms,
            attempt: 0,
        }
    }

    /// Resets the schedule to its first delay, typically called once a
    /// reconnect attempt succeeds.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Returns the next delay and advances the schedule.
    pub fn next_delay(&mut self) -> Duration {
        let unjittered = self
            .initial_ms
            .saturating_mul(1u64 << self.attempt.min(32))
            .min(self.max_ms);
        self.attempt = self.attempt.saturating_add(1);

        let jitter_span = unjittered / 5; // +/-20%
        let jittered = if jitter_span == 0 {
            unjittered
        } else {
            let offset = rand::thread_rng().gen_range(0..=2 * jitter_span);
            (unjittered + jitter_span).saturating_sub(offset)
        };
        Duration::from_millis(jittered.max(1))
    }
}

/// Runs `attempt_connect` in a loop, sleeping a jittered exponential
/// backoff delay between failures, until it succeeds.
pub async fn with_reconnect<F, Fut, T, E>(config: &PlayerConfig, component: &str, mut attempt_connect: F) -> T
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut schedule = BackoffSchedule::new(config);
    loop {
        match attempt_connect().await {
            Ok(value) => return value,
            Err(err) => {
                let delay = schedule.next_delay();
                log::warn!("{component} reconnect failed: {err}; retrying in {delay:?}");
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_double_up_to_the_ceiling() {
        let config = PlayerConfig {
            reconnect_initial_backoff_ms: 2_000,
            reconnect_max_backoff_ms: 16_000,
            ..PlayerConfig::default()
        };
        let mut schedule = BackoffSchedule::new(&config);

        let bounds = [(1_600, 2_400), (3_200, 4_800), (6_400, 9_600), (12_800, 19_200)];
        for (lo, hi) in bounds {
            let delay = schedule.next_delay().as_millis() as u64;
            assert!(delay >= lo && delay <= hi, "delay {delay} out of [{lo}, {hi}]");
        }
    }

    #[test]
    fn delay_never_exceeds_ceiling_plus_jitter() {
        let config = PlayerConfig {
            reconnect_initial_backoff_ms: 2_000,
            reconnect_max_backoff_ms: 16_000,
            ..PlayerConfig::default()
        };
        let mut schedule = BackoffSchedule::new(&config);
        for _ in 0..20 {
            let delay = schedule.next_delay().as_millis() as u64;
            assert!(delay <= 16_000 * 6 / 5);
        }
    }

    #[test]
    fn reset_returns_to_the_initial_delay() {
        let config = PlayerConfig {
            reconnect_initial_backoff_ms: 2_000,
            reconnect_max_backoff_ms: 16_000,
            ..PlayerConfig::default()
        };
        let mut schedule = BackoffSchedule::new(&config);
        schedule.next_delay();
        schedule.next_delay();
        schedule.reset();
        let delay = schedule.next_delay().as_millis() as u64;
        assert!(delay >= 1_600 && delay <= 2_400);
    }

    #[tokio::test(start_paused = true)]
    async fn with_reconnect_retries_until_success() {
        let config = PlayerConfig::default();
        let mut attempts = 0;
        let result: Result<u32, &str> = Ok(42);
        let value = with_reconnect(&config, "test", || {
            attempts += 1;
            let attempts_now = attempts;
            async move {
                if attempts_now < 3 {
                    Err::<u32, &str>("not yet")
                } else {
                    result
                }
            }
        })
        .await;
        assert_eq!(value, 42);
        assert_eq!(attempts, 3);
    }
}
