use std::future::Future;
use std::time::Duration;

use derive_new::new;
use tokio::time::{sleep, timeout, timeout_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{SequencerError, SequencerResult};
use crate::provider::{ChainError, ChainResult};

/// How often and for how long to poll
#[derive(Debug, Clone, Copy, PartialEq, Eq, new)]
pub struct PollConfig {
    pub interval: Duration,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome<T> {
    Ready(T),
    TimedOut(Duration),
    Cancelled,
}

/// Bound a single RPC round trip.
pub(crate) async fn with_timeout<T, Fut>(limit: Duration, fut: Fut) -> ChainResult<T>
where
    Fut: Future<Output = ChainResult<T>>,
{
    match timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(ChainError::Timeout(limit)),
    }
}

/// Race `fut` against `cancel`. Cancellation wins ties.
pub(crate) async fn cancellable<T, Fut>(
    cancel: &CancellationToken,
    action: &str,
    fut: Fut,
) -> SequencerResult<T>
where
    Fut: Future<Output = SequencerResult<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(SequencerError::Cancelled(action.to_owned())),
        result = fut => result,
    }
}

/// Child of `parent` which cancels itself once `deadline` has elapsed.
///
/// Must be called from within a Tokio runtime.
pub fn deadline_token(parent: &CancellationToken, deadline: Duration) -> CancellationToken {
    let child = parent.child_token();
    let expiring = child.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = expiring.cancelled() => {}
            _ = sleep(deadline) => {
                debug!(?deadline, "deadline elapsed, cancelling");
                expiring.cancel();
            }
        }
    });
    child
}

/// Call `f` every `config.interval` until it yields a value, the total
/// `config.timeout` elapses or `cancel` fires.
///
/// Errors returned by `f` are logged and retried, they never end the loop on
/// their own.
pub(crate) async fn poll_until_ready<T, F, Fut>(
    config: PollConfig,
    cancel: &CancellationToken,
    action: &str,
    mut f: F,
) -> PollOutcome<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ChainResult<Option<T>>>,
{
    let started = Instant::now();
    let deadline = started + config.timeout;
    let mut attempt: u32 = 0;

    loop {
        attempt = attempt.saturating_add(1);
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return PollOutcome::Cancelled,
            result = timeout_at(deadline, f()) => result,
        };

        match result {
            Ok(Ok(Some(value))) => return PollOutcome::Ready(value),
            Ok(Ok(None)) => debug!(action, attempt, "not ready yet"),
            Ok(Err(err)) => warn!(?err, action, attempt, "error while polling, retrying"),
            Err(_) => return PollOutcome::TimedOut(started.elapsed()),
        }

        let now = Instant::now();
        if now >= deadline {
            return PollOutcome::TimedOut(started.elapsed());
        }
        let pause = config.interval.min(deadline - now);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return PollOutcome::Cancelled,
            _ = sleep(pause) => {}
        }
    }
}
