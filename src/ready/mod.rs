pub mod policy;
pub mod probe;

use std::cell::Cell;
use std::future::Future;
use std::time::Duration;

use backon::{BackoffBuilder, ConstantBuilder, ExponentialBuilder, Retryable};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::StackError;
use crate::ui::status;

pub use policy::{Backoff, RetryPolicy};

/// Something that can say whether a dependency accepts traffic yet.
pub trait ReadinessProbe {
    /// Name used in progress lines and errors.
    fn target(&self) -> &str;

    /// One check. `Ok` means ready.
    fn check(&self) -> impl Future<Output = anyhow::Result<()>>;
}

/// Outcome of a successful wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Readiness {
    pub attempts: u32,
    pub elapsed: Duration,
}

/// Poll `probe` under `policy` until it reports ready, the attempt budget is
/// spent, the policy timeout fires, or `cancel` is triggered.
pub async fn wait_until_ready<P: ReadinessProbe>(
    probe: &P,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
) -> Result<Readiness, StackError> {
    let started = Instant::now();
    let attempts = Cell::new(0u32);
    let total = policy.attempts();
    let retries = (total - 1) as usize;

    let poll = async {
        match policy.backoff {
            Backoff::Fixed => {
                let builder = ConstantBuilder::default()
                    .with_delay(policy.delay)
                    .with_max_times(retries);
                retry_with(builder, probe, &attempts, total).await
            }
            Backoff::Exponential { max_delay } => {
                let builder = ExponentialBuilder::default()
                    .with_min_delay(policy.delay)
                    .with_max_delay(max_delay)
                    .with_max_times(retries);
                retry_with(builder, probe, &attempts, total).await
            }
        }
    };

    let bounded = async {
        match policy.timeout {
            Some(cap) => tokio::time::timeout(cap, poll)
                .await
                .unwrap_or_else(|_| Err(anyhow::anyhow!("timed out after {:?}", cap))),
            None => poll.await,
        }
    };

    let outcome = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            return Err(StackError::Cancelled(probe.target().to_string()));
        }
        outcome = bounded => outcome,
    };

    let elapsed = started.elapsed();
    match outcome {
        Ok(()) => {
            tracing::debug!(
                target_name = %probe.target(),
                attempts = attempts.get(),
                ?elapsed,
                "ready"
            );
            Ok(Readiness {
                attempts: attempts.get(),
                elapsed,
            })
        }
        Err(e) => {
            status::progress(&format!(
                "{}: attempt {}/{} failed: {}",
                probe.target(),
                attempts.get(),
                total,
                e
            ));
            Err(StackError::ReadinessTimeout {
                target: probe.target().to_string(),
                attempts: attempts.get(),
                elapsed,
            })
        }
    }
}

async fn retry_with<B, P>(
    builder: B,
    probe: &P,
    attempts: &Cell<u32>,
    total: u32,
) -> anyhow::Result<()>
where
    B: BackoffBuilder,
    P: ReadinessProbe,
{
    (move || async move {
        attempts.set(attempts.get() + 1);
        probe.check().await
    })
    .retry(builder)
    .notify(|err: &anyhow::Error, dur: Duration| {
        status::progress(&format!(
            "{}: attempt {}/{} not ready, retrying in {:?}",
            probe.target(),
            attempts.get(),
            total,
            dur
        ));
        tracing::debug!(target_name = %probe.target(), "ready check failed: {:#}", err);
    })
    .await
}
