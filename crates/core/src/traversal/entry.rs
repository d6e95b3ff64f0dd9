//! Navigation from the app's home screen to the first item of the own-content feed.

use fleet_runtime::{CancellationToken, UiSession, guarded, pause};
use tracing::info;

use crate::config::{EntrySelectors, Timings, ms};
use crate::error::{FleetError, Result};
use crate::ui::{first_of, wait_for};

pub async fn enter_feed(ui: &dyn UiSession, selectors: &EntrySelectors, timings: &Timings, token: &CancellationToken) -> Result<()> {
	let wait = ms(timings.element_wait_ms);
	let poll = ms(timings.poll_ms);

	let mut tab = None;
	for selector in &selectors.profile_tab {
		tab = wait_for(ui, selector, wait, poll, token).await?;
		if tab.is_some() {
			break;
		}
	}
	let tab = tab.ok_or_else(|| FleetError::Locator("profile tab".into()))?;
	guarded(token, ui.click(&tab)).await?;
	pause(token, ms(timings.profile_settle_ms)).await?;

	let item = first_of(ui, &selectors.first_item, token)
		.await?
		.ok_or_else(|| FleetError::Locator("first profile item".into()))?;
	guarded(token, ui.click(&item)).await?;
	pause(token, ms(timings.render_settle_ms)).await?;
	info!(target = "fleet.traversal", "entered own-content feed");
	Ok(())
}
