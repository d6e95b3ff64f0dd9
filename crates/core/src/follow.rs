//! Follows a list of profiles from one device.

use std::sync::Arc;

use fleet_protocol::{FollowReport, Gesture};
use fleet_runtime::{CancellationToken, UiSession, guarded, pause};
use tracing::{info, warn};

use crate::config::{FleetConfig, FollowSelectors, Timings, ms};
use crate::error::{FleetError, Result};
use crate::ui::read_text;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowOutcome {
	Followed,
	AlreadyFollowing,
	/// No follow button on the profile page.
	Missing,
	/// The button still offered to follow after refreshing.
	Unconfirmed,
}

pub struct FollowWorkflow {
	targets: Arc<Vec<String>>,
	selectors: FollowSelectors,
	timings: Timings,
}

impl FollowWorkflow {
	pub fn new(config: &FleetConfig, targets: Vec<String>) -> Self {
		Self {
			targets: Arc::new(targets),
			selectors: config.selectors.follow.clone(),
			timings: config.timings,
		}
	}

	pub fn targets(&self) -> &[String] {
		&self.targets
	}

	/// Visits every target in order. Per-target failures are counted, not propagated.
	pub async fn run(&self, ui: &dyn UiSession, token: &CancellationToken) -> Result<FollowReport> {
		let mut report = FollowReport::default();
		for (index, target) in self.targets.iter().enumerate() {
			if index > 0 && pause(token, ms(self.timings.follow_delay_ms)).await.is_err() {
				report.cancelled = true;
				break;
			}
			report.attempted += 1;

			match self.follow_one(ui, target, token).await {
				Ok(FollowOutcome::Followed) => report.followed += 1,
				Ok(FollowOutcome::AlreadyFollowing) => report.already_following += 1,
				Ok(FollowOutcome::Missing) => report.missing += 1,
				Ok(FollowOutcome::Unconfirmed) => report.unconfirmed += 1,
				Err(FleetError::Cancelled) => {
					report.cancelled = true;
					break;
				}
				Err(err) => {
					warn!(target = "fleet.follow", profile = %target, error = %err, "follow failed");
					report.failed += 1;
				}
			}
		}
		info!(
			target = "fleet.follow",
			attempted = report.attempted,
			followed = report.followed,
			failed = report.failed,
			"follow run finished"
		);
		Ok(report)
	}

	pub async fn follow_one(&self, ui: &dyn UiSession, target: &str, token: &CancellationToken) -> Result<FollowOutcome> {
		let url = self.selectors.profile_url.replace("{id}", target);
		guarded(token, ui.navigate(&url)).await?;
		pause(token, ms(self.timings.follow_delay_ms)).await?;

		let Some(button) = guarded(token, ui.find(&self.selectors.follow_button)).await?.found() else {
			info!(target = "fleet.follow", profile = %target, "no follow button");
			return Ok(FollowOutcome::Missing);
		};
		let label = guarded(token, ui.text(&button)).await?;
		if label.trim() != self.selectors.follow_label {
			info!(target = "fleet.follow", profile = %target, label = label.trim(), "already following");
			return Ok(FollowOutcome::AlreadyFollowing);
		}

		guarded(token, ui.click(&button)).await?;
		pause(token, ms(self.timings.follow_delay_ms)).await?;

		let size = guarded(token, ui.window_size()).await?;
		guarded(token, ui.perform(&Gesture::swipe_down(size, self.timings.refresh_swipe_ms))).await?;
		pause(token, ms(self.timings.follow_delay_ms)).await?;

		let after = read_text(ui, &self.selectors.follow_button, token).await?;
		if after.as_deref() == Some(self.selectors.follow_label.as_str()) {
			warn!(target = "fleet.follow", profile = %target, "follow not confirmed");
			return Ok(FollowOutcome::Unconfirmed);
		}
		info!(target = "fleet.follow", profile = %target, "followed");
		Ok(FollowOutcome::Followed)
	}
}
