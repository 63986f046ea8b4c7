//! Deadline-bounded exponential backoff.
//!
//! A transport that retries inside a batch must not keep going after the
//! batch itself has timed out, so every [`Backoff`] carries the deadline of
//! the operation it serves and stops offering retries once the next sleep
//! would cross it.

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: f64,
    /// Total time budget for the attempts and the sleeps between them.
    pub deadline: Option<Duration>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(5),
            multiplier: 2.0,
            deadline: None,
        }
    }
}

impl RetryConfig {
    /// Never retry.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Bound every retry schedule by `deadline`.
    pub fn within(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Start the schedule for one operation; the deadline runs from now.
    pub fn start(&self) -> Backoff<'_> {
        Backoff {
            config: &self.config,
            started: Instant::now(),
            retries: 0,
        }
    }
}

/// Retry schedule of one operation.
#[derive(Debug)]
pub struct Backoff<'a> {
    config: &'a RetryConfig,
    started: Instant,
    retries: u32,
}

impl Backoff<'_> {
    /// Sleep before the next attempt, or `None` when the operation should
    /// give up.
    pub fn next_delay(&mut self) -> Option<Duration> {
        self.delay_after(self.started.elapsed())
    }

    /// Retries handed out so far.
    pub fn retries(&self) -> u32 {
        self.retries
    }

    fn delay_after(&mut self, elapsed: Duration) -> Option<Duration> {
        if self.retries >= self.config.max_retries {
            return None;
        }
        let grown = self.config.initial_backoff.as_secs_f64()
            * self.config.multiplier.powi(self.retries as i32);
        let delay = Duration::from_secs_f64(grown.min(self.config.max_backoff.as_secs_f64()));
        if let Some(deadline) = self.config.deadline {
            // Leave room for the attempt itself, not just the sleep.
            if elapsed + delay >= deadline {
                return None;
            }
        }
        self.retries += 1;
        Some(delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(350),
            multiplier: 2.0,
            deadline: None,
        }
    }

    #[test]
    fn grows_then_caps() {
        let policy = RetryPolicy::new(config(4));
        let mut backoff = policy.start();
        let delays: Vec<_> = std::iter::from_fn(|| backoff.delay_after(Duration::ZERO))
            .map(|d| d.as_millis())
            .collect();
        assert_eq!(delays, [100, 200, 350, 350]);
    }

    #[test]
    fn deadline_cuts_the_schedule_short() {
        let policy = RetryPolicy::new(config(5).within(Duration::from_millis(500)));
        let mut backoff = policy.start();
        assert_eq!(backoff.delay_after(Duration::from_millis(10)), Some(Duration::from_millis(100)));
        // 450ms spent, a 200ms sleep would overrun the budget
        assert_eq!(backoff.delay_after(Duration::from_millis(450)), None);
        assert_eq!(backoff.retries(), 1);
    }

    #[test]
    fn each_operation_gets_a_fresh_schedule() {
        let policy = RetryPolicy::new(config(1));
        let mut first = policy.start();
        assert!(first.next_delay().is_some());
        assert!(first.next_delay().is_none());
        assert!(policy.start().next_delay().is_some());
    }

    #[test]
    fn none_never_retries() {
        let policy = RetryPolicy::new(RetryConfig::none());
        assert!(policy.start().next_delay().is_none());
    }
}
