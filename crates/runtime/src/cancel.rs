//! Cancellation-aware waiting.
//!
//! Every sleep and every blocking capability call made by a worker goes
//! through these helpers so a stop signal interrupts it promptly.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::RuntimeError;

/// Sleeps for `duration` unless `token` is cancelled first.
pub async fn pause(token: &CancellationToken, duration: Duration) -> Result<(), RuntimeError> {
	if duration.is_zero() {
		return if token.is_cancelled() { Err(RuntimeError::Cancelled) } else { Ok(()) };
	}

	tokio::select! {
		biased;
		_ = token.cancelled() => Err(RuntimeError::Cancelled),
		_ = tokio::time::sleep(duration) => Ok(()),
	}
}

/// Drives `fut` to completion unless `token` is cancelled first, in which case
/// the future is dropped (abandoning the call) and `Cancelled` is returned.
pub async fn guarded<T, E, F>(token: &CancellationToken, fut: F) -> Result<T, E>
where
	F: Future<Output = Result<T, E>>,
	E: From<RuntimeError>,
{
	tokio::select! {
		biased;
		_ = token.cancelled() => Err(E::from(RuntimeError::Cancelled)),
		result = fut => result,
	}
}
