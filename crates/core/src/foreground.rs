//! Keeps the target application in front of the user.

use std::fmt;
use std::sync::Arc;

use fleet_protocol::{DeviceId, TargetApp};
use fleet_runtime::{CancellationToken, DeviceBridge, guarded, pause};
use tracing::{debug, info, warn};

use crate::config::{Timings, ms};
use crate::error::Result;

const LAUNCHER_INTENT: &str = "-a android.intent.action.MAIN -c android.intent.category.LAUNCHER";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForegroundState {
	/// The target owns input focus.
	Frontmost,
	/// Running, but another window has focus.
	Background,
	/// Not running at all.
	Absent,
}

impl fmt::Display for ForegroundState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			ForegroundState::Frontmost => "frontmost",
			ForegroundState::Background => "background",
			ForegroundState::Absent => "absent",
		})
	}
}

pub struct ForegroundControl<'a> {
	bridge: Arc<dyn DeviceBridge>,
	device: &'a DeviceId,
	target: &'a TargetApp,
	timings: &'a Timings,
	token: &'a CancellationToken,
}

impl<'a> ForegroundControl<'a> {
	pub fn new(
		bridge: Arc<dyn DeviceBridge>,
		device: &'a DeviceId,
		target: &'a TargetApp,
		timings: &'a Timings,
		token: &'a CancellationToken,
	) -> Self {
		Self {
			bridge,
			device,
			target,
			timings,
			token,
		}
	}

	/// Classifies the target from the window focus, then the activity stack, then the process table.
	pub async fn state(&self) -> Result<ForegroundState> {
		let package = self.target.package.as_str();
		let windows = self.shell("dumpsys window windows").await?;
		if windows.is_some_and(|dump| focused_package_is(&dump, &["mCurrentFocus", "mFocusedApp"], package)) {
			return Ok(ForegroundState::Frontmost);
		}

		let activities = self.shell("dumpsys activity activities").await?;
		if activities.is_some_and(|dump| focused_package_is(&dump, &["mFocusedActivity", "mResumedActivity", "topResumedActivity"], package)) {
			return Ok(ForegroundState::Frontmost);
		}

		let pid = self.shell(&format!("pidof {}", self.target.package)).await?;
		if pid.is_some_and(|pid| !pid.trim().is_empty()) {
			Ok(ForegroundState::Background)
		} else {
			Ok(ForegroundState::Absent)
		}
	}

	/// Brings the target to the front, launching it when it is not running.
	///
	/// Launch problems are logged; the returned state tells the caller how far it got.
	pub async fn reconcile(&self) -> Result<ForegroundState> {
		let state = self.state().await?;
		debug!(target = "fleet.foreground", device = %self.device, %state, "foreground state");
		match state {
			ForegroundState::Frontmost => Ok(state),
			ForegroundState::Background => self.bring_to_front().await,
			ForegroundState::Absent => self.launch().await,
		}
	}

	/// Moves a running target to the front.
	pub async fn bring_to_front(&self) -> Result<ForegroundState> {
		info!(target = "fleet.foreground", device = %self.device, package = %self.target.package, "bringing app to front");
		let main = self.target.main_component();
		self.shell(&format!("am start -n {main}")).await?;
		pause(self.token, ms(self.timings.front_settle_ms)).await?;

		let state = self.state().await?;
		if state == ForegroundState::Frontmost {
			return Ok(state);
		}

		debug!(target = "fleet.foreground", device = %self.device, "retrying with launcher intent");
		self.shell(&format!("am start {LAUNCHER_INTENT} -n {main}")).await?;
		pause(self.token, ms(self.timings.front_settle_ms)).await?;
		self.state().await
	}

	/// Starts the target from scratch.
	pub async fn launch(&self) -> Result<ForegroundState> {
		info!(target = "fleet.foreground", device = %self.device, package = %self.target.package, "launching app");
		self.shell(&format!("am start -n {}", self.target.main_component())).await?;
		pause(self.token, ms(self.timings.launch_settle_ms)).await?;

		let state = self.state().await?;
		if state == ForegroundState::Frontmost {
			return Ok(state);
		}

		debug!(target = "fleet.foreground", device = %self.device, "falling back to launch activity");
		self.shell(&format!("am start -n {}", self.target.launch_component())).await?;
		pause(self.token, ms(self.timings.launch_fallback_settle_ms)).await?;
		let state = self.state().await?;
		if state != ForegroundState::Frontmost {
			warn!(target = "fleet.foreground", device = %self.device, %state, "app did not reach the front");
		}
		Ok(state)
	}

	async fn shell(&self, command: &str) -> Result<Option<String>> {
		match guarded(self.token, self.bridge.shell(self.device, command)).await {
			Ok(output) => Ok(Some(output)),
			Err(err) if err.is_cancelled() => Err(err.into()),
			Err(err) => {
				debug!(target = "fleet.foreground", device = %self.device, command, error = %err, "shell command failed");
				Ok(None)
			}
		}
	}
}

/// True when any line starting with one of `keys` names `package` as the focused component.
pub fn focused_package_is(dump: &str, keys: &[&str], package: &str) -> bool {
	dump.lines()
		.map(str::trim)
		.filter(|line| keys.iter().any(|key| line.starts_with(key)))
		.any(|line| {
			line.split(|c: char| c.is_whitespace() || c == '{' || c == '}')
				.filter_map(|token| token.split('/').next())
				.any(|name| name == package)
		})
}
