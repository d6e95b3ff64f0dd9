//! Small polling and lookup helpers over a [`UiSession`].

use std::time::Duration;

use fleet_protocol::{ElementHandle, Selector};
use fleet_runtime::{CancellationToken, UiSession, guarded, pause};
use tokio::time::Instant;
use tracing::debug;

use crate::error::Result;

/// Polls for `selector` until it appears or `timeout` elapses.
pub async fn wait_for(
	ui: &dyn UiSession,
	selector: &Selector,
	timeout: Duration,
	poll: Duration,
	token: &CancellationToken,
) -> Result<Option<ElementHandle>> {
	let start = Instant::now();
	loop {
		if let Some(element) = guarded(token, ui.find(selector)).await?.found() {
			return Ok(Some(element));
		}
		if start.elapsed() >= timeout {
			debug!(target = "fleet.traversal", %selector, ?timeout, "element did not appear");
			return Ok(None);
		}
		pause(token, poll).await?;
	}
}

/// First selector in `selectors` that matches anything.
pub async fn first_of(ui: &dyn UiSession, selectors: &[Selector], token: &CancellationToken) -> Result<Option<ElementHandle>> {
	for selector in selectors {
		if let Some(element) = guarded(token, ui.find(selector)).await?.found() {
			return Ok(Some(element));
		}
	}
	Ok(None)
}

/// Trimmed text of the first match, or `None` when absent or blank.
pub async fn read_text(ui: &dyn UiSession, selector: &Selector, token: &CancellationToken) -> Result<Option<String>> {
	let Some(element) = guarded(token, ui.find(selector)).await?.found() else {
		return Ok(None);
	};
	let text = guarded(token, ui.text(&element)).await?;
	let text = text.trim();
	Ok((!text.is_empty()).then(|| text.to_string()))
}

/// Turns a failed optional step into `None`. Cancellation still propagates.
pub fn tolerate<T>(result: Result<T>, step: &str) -> Result<Option<T>> {
	match result {
		Ok(value) => Ok(Some(value)),
		Err(err) if err.is_cancelled() => Err(err),
		Err(err) => {
			debug!(target = "fleet.traversal", step, error = %err, "step failed");
			Ok(None)
		}
	}
}
