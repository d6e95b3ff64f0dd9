//! Device readiness probes run before any session is negotiated.

use std::sync::Arc;

use fleet_protocol::{DeviceId, TargetApp};
use fleet_runtime::{CancellationToken, DeviceBridge, guarded};
use tracing::{debug, warn};

use crate::error::Result;

/// Outcome of one probe group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Check {
	Passed,
	Failed(String),
}

impl Check {
	pub fn passed(&self) -> bool {
		matches!(self, Check::Passed)
	}
}

pub struct DeviceValidator<'a> {
	bridge: Arc<dyn DeviceBridge>,
	device: &'a DeviceId,
	token: &'a CancellationToken,
}

impl<'a> DeviceValidator<'a> {
	pub fn new(bridge: Arc<dyn DeviceBridge>, device: &'a DeviceId, token: &'a CancellationToken) -> Self {
		Self { bridge, device, token }
	}

	/// The device answers shell commands, has finished booting, and reports a serial.
	pub async fn validate(&self) -> Result<Check> {
		let Some(echo) = self.probe("echo test").await? else {
			return Ok(Check::Failed("device shell unreachable".into()));
		};
		if echo.trim() != "test" {
			return Ok(Check::Failed(format!("shell echo returned {:?}", echo.trim())));
		}

		match self.probe("getprop sys.boot_completed").await? {
			Some(value) if value.trim() == "1" => {}
			Some(value) => return Ok(Check::Failed(format!("boot not completed (sys.boot_completed={:?})", value.trim()))),
			None => return Ok(Check::Failed("boot state unreadable".into())),
		}

		match self.probe("getprop ro.boot.serialno").await? {
			Some(serial) if !serial.trim().is_empty() => Ok(Check::Passed),
			_ => Ok(Check::Failed("serial number unreadable".into())),
		}
	}

	/// Debug access is enabled, the display is on, and the target app is installed.
	pub async fn check_requirements(&self, target: &TargetApp) -> Result<Check> {
		match self.probe("settings get global adb_enabled").await? {
			Some(value) if value.trim() == "1" => {}
			_ => return Ok(Check::Failed("USB debugging disabled".into())),
		}

		match self.probe("dumpsys power").await? {
			Some(dump) if display_is_on(&dump) => {}
			Some(_) => return Ok(Check::Failed("display is off".into())),
			None => return Ok(Check::Failed("display power state unreadable".into())),
		}

		let listing = self.probe(&format!("pm list packages {}", target.package)).await?;
		if listing.as_deref().is_some_and(|listing| has_package(listing, &target.package)) {
			Ok(Check::Passed)
		} else {
			Ok(Check::Failed(format!("{} is not installed", target.package)))
		}
	}

	/// Runs one shell probe; any failure other than cancellation reads as `None`.
	async fn probe(&self, command: &str) -> Result<Option<String>> {
		match guarded(self.token, self.bridge.shell(self.device, command)).await {
			Ok(output) => Ok(Some(output)),
			Err(err) if err.is_cancelled() => Err(err.into()),
			Err(err) => {
				warn!(target = "fleet.session", device = %self.device, command, error = %err, "probe failed");
				Ok(None)
			}
		}
	}
}

/// True unless the power dump reports the display as off.
pub fn display_is_on(dump: &str) -> bool {
	let Some(line) = dump.lines().find(|line| line.contains("Display Power")) else {
		debug!(target = "fleet.session", "no display power line; assuming on");
		return true;
	};
	!line.to_ascii_uppercase().contains("OFF")
}

/// True when a `pm list packages` listing contains exactly `package`.
pub fn has_package(listing: &str, package: &str) -> bool {
	listing
		.lines()
		.filter_map(|line| line.trim().strip_prefix("package:"))
		.any(|name| name == package)
}
