//! Actions applied to feed items that fall below the threshold.

use async_trait::async_trait;
use fleet_protocol::{ElementHandle, Gesture, Point};
use fleet_runtime::{CancellationToken, UiSession, guarded, pause};
use tracing::{debug, info, warn};

use crate::config::{DeleteSelectors, Timings, ms};
use crate::error::Result;
use crate::ui::{tolerate, wait_for};

/// Something done to the current item.
///
/// `Ok(false)` means every strategy missed its element; `Err` is a fault.
#[async_trait]
pub trait ItemAction: Send + Sync {
	fn name(&self) -> &str;

	async fn apply(&self, ui: &dyn UiSession, token: &CancellationToken) -> Result<bool>;
}

/// Deletes the current item through its overflow menu.
pub struct DeleteAction {
	selectors: DeleteSelectors,
	timings: Timings,
}

impl DeleteAction {
	pub fn new(selectors: DeleteSelectors, timings: Timings) -> Self {
		Self { selectors, timings }
	}

	async fn open_menu(&self, ui: &dyn UiSession, token: &CancellationToken) -> Result<bool> {
		let rounds = self.selectors.menu_rounds.max(1);
		for round in 1..=rounds {
			if let Some(button) = self.menu_button(ui, token).await? {
				guarded(token, ui.click(&button)).await?;
				pause(token, ms(self.timings.menu_settle_ms)).await?;
				debug!(target = "fleet.traversal", round, "menu opened");
				return Ok(true);
			}
			if round < rounds {
				pause(token, ms(self.timings.menu_retry_ms)).await?;
			}
		}
		Ok(false)
	}

	/// The dedicated menu button, else the icon inside the menu frame.
	async fn menu_button(&self, ui: &dyn UiSession, token: &CancellationToken) -> Result<Option<ElementHandle>> {
		let direct = guarded(token, ui.find(&self.selectors.menu_button)).await;
		if let Some(button) = tolerate(direct.map_err(Into::into), "menu button")?.and_then(|lookup| lookup.found()) {
			return Ok(Some(button));
		}

		let frame = guarded(token, ui.find(&self.selectors.menu_frame)).await;
		let Some(frame) = tolerate(frame.map_err(Into::into), "menu frame")?.and_then(|lookup| lookup.found()) else {
			return Ok(None);
		};
		let child = guarded(token, ui.find_within(&frame, &self.selectors.menu_frame_child)).await;
		Ok(tolerate(child.map_err(Into::into), "menu frame child")?.and_then(|lookup| lookup.found()))
	}

	/// Scrolls the share row leftwards until the delete button shows.
	async fn reveal_delete(&self, ui: &dyn UiSession, row: &ElementHandle, token: &CancellationToken) -> Result<()> {
		let rect = guarded(token, ui.rect(row)).await?;
		let y = rect.y + rect.height / 2;
		let scroll = |inset: i32| Gesture::swipe(Point::new(rect.x + rect.width - inset, y), Point::new(rect.x + inset, y), self.timings.scroll_ms);

		for attempt in 1..=self.selectors.max_scrolls {
			if self.delete_visible(ui, token).await? {
				debug!(target = "fleet.traversal", attempt, "delete button visible");
				return Ok(());
			}
			guarded(token, ui.perform(&scroll(50))).await?;
			pause(token, ms(self.timings.scroll_settle_ms)).await?;
		}

		if !self.delete_visible(ui, token).await? {
			guarded(token, ui.perform(&scroll(20))).await?;
			pause(token, ms(self.timings.scroll_settle_ms)).await?;
		}
		Ok(())
	}

	async fn delete_visible(&self, ui: &dyn UiSession, token: &CancellationToken) -> Result<bool> {
		let Some(button) = guarded(token, ui.find(&self.selectors.delete_button)).await?.found() else {
			return Ok(false);
		};
		Ok(guarded(token, ui.is_displayed(&button)).await?)
	}
}

#[async_trait]
impl ItemAction for DeleteAction {
	fn name(&self) -> &str {
		"delete"
	}

	async fn apply(&self, ui: &dyn UiSession, token: &CancellationToken) -> Result<bool> {
		let wait = ms(self.timings.element_wait_ms);
		let poll = ms(self.timings.poll_ms);

		if !self.open_menu(ui, token).await? {
			warn!(target = "fleet.traversal", "menu button not found");
			return Ok(false);
		}

		let Some(row) = wait_for(ui, &self.selectors.share_row, wait, poll, token).await? else {
			warn!(target = "fleet.traversal", "share row not found");
			return Ok(false);
		};
		self.reveal_delete(ui, &row, token).await?;

		let Some(delete) = wait_for(ui, &self.selectors.delete_button, wait, poll, token).await? else {
			warn!(target = "fleet.traversal", "delete button not found");
			return Ok(false);
		};
		guarded(token, ui.click(&delete)).await?;
		pause(token, ms(self.timings.confirm_settle_ms)).await?;

		let Some(confirm) = wait_for(ui, &self.selectors.confirm_button, wait, poll, token).await? else {
			warn!(target = "fleet.traversal", "confirm button not found");
			return Ok(false);
		};
		guarded(token, ui.click(&confirm)).await?;
		info!(target = "fleet.traversal", "item deleted");
		Ok(true)
	}
}
