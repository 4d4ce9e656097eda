use std::time::Duration;

use crate::config::model::{BackoffKind, ReadinessConfig};

/// How often, and for how long, a readiness probe is retried.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
    pub backoff: Backoff,
    /// Hard cap on the whole wait, on top of the attempt budget.
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    Fixed,
    Exponential { max_delay: Duration },
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 30,
            delay: Duration::from_secs(2),
            backoff: Backoff::Fixed,
            timeout: None,
        }
    }
}

impl RetryPolicy {
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
            backoff: Backoff::Fixed,
            timeout: None,
        }
    }

    /// Attempts actually made; a zero budget still probes once.
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Upper bound on time spent sleeping between attempts.
    pub fn worst_case_wait(&self) -> Duration {
        let gaps = self.attempts() - 1;
        let sleeping = match self.backoff {
            Backoff::Fixed => self.delay * gaps,
            Backoff::Exponential { max_delay } => {
                let mut total = Duration::ZERO;
                let mut step = self.delay;
                for _ in 0..gaps {
                    total += step.min(max_delay);
                    step = step.saturating_mul(2);
                }
                total
            }
        };
        match self.timeout {
            Some(cap) => sleeping.min(cap),
            None => sleeping,
        }
    }
}

impl From<&ReadinessConfig> for RetryPolicy {
    fn from(cfg: &ReadinessConfig) -> Self {
        let backoff = match cfg.backoff {
            BackoffKind::Fixed => Backoff::Fixed,
            BackoffKind::Exponential => Backoff::Exponential {
                max_delay: cfg.max_delay,
            },
        };
        Self {
            max_attempts: cfg.max_attempts,
            delay: cfg.delay,
            backoff,
            timeout: cfg.timeout,
        }
    }
}
