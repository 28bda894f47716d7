//! Cooperative cancellation for signing sessions.
//!
//! Every suspension point of a session goes through [`abortable`] or [`sleep`],
//! so cancelling the session token surfaces as an [`Aborted`] error at the next
//! await instead of a silently dropped future.

use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("operation aborted")]
pub struct Aborted;

/// Runs `future` until it completes or `token` is cancelled, whichever comes
/// first. If both are ready, cancellation wins.
pub async fn abortable<F>(token: &CancellationToken, future: F) -> Result<F::Output, Aborted>
where
    F: Future,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(Aborted),
        output = future => Ok(output),
    }
}

/// Sleeps for `duration` unless `token` is cancelled first.
pub async fn sleep(token: &CancellationToken, duration: Duration) -> Result<(), Aborted> {
    abortable(token, tokio::time::sleep(duration)).await
}
