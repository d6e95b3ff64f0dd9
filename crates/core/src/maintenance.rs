//! Host and device maintenance actions used during negotiation.

use std::sync::Arc;

use fleet_protocol::{DeviceId, Transport};
use fleet_runtime::{CancellationToken, DeviceBridge, guarded, pause};
use tracing::{debug, info, warn};

use crate::config::{Timings, UsbReset, ms};
use crate::error::Result;

/// Name of the on-device automation server process.
const AUTOMATION_SERVER: &str = "uiautomator";

/// Result of a stale-server cleanup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cleanup {
	/// No automation server was running.
	Idle,
	/// A stale server was found and a kill was sent.
	Killed,
	/// The device could not be asked for its process list.
	Unreachable(String),
}

pub struct Maintenance<'a> {
	bridge: Arc<dyn DeviceBridge>,
	device: &'a DeviceId,
	timings: &'a Timings,
	token: &'a CancellationToken,
}

impl<'a> Maintenance<'a> {
	pub fn new(bridge: Arc<dyn DeviceBridge>, device: &'a DeviceId, timings: &'a Timings, token: &'a CancellationToken) -> Self {
		Self {
			bridge,
			device,
			timings,
			token,
		}
	}

	/// Kills a stale automation server on the device.
	///
	/// A failed kill is logged and tolerated; only cancellation is an error.
	pub async fn kill_automation_server(&self) -> Result<Cleanup> {
		let listing = match guarded(self.token, self.bridge.shell(self.device, "ps -A")).await {
			Ok(listing) => listing,
			Err(err) if err.is_cancelled() => return Err(err.into()),
			Err(err) => {
				debug!(target = "fleet.negotiate", device = %self.device, error = %err, "process listing failed");
				return Ok(Cleanup::Unreachable(err.to_string()));
			}
		};

		if !listing.lines().any(|line| line.contains(AUTOMATION_SERVER)) {
			return Ok(Cleanup::Idle);
		}

		info!(target = "fleet.negotiate", device = %self.device, "killing stale automation server");
		let command = format!("pkill -f {AUTOMATION_SERVER}");
		match guarded(self.token, self.bridge.shell(self.device, &command)).await {
			Ok(_) => {}
			Err(err) if err.is_cancelled() => return Err(err.into()),
			Err(err) => warn!(target = "fleet.negotiate", device = %self.device, error = %err, "kill failed"),
		}
		pause(self.token, ms(self.timings.cleanup_settle_ms)).await?;
		Ok(Cleanup::Killed)
	}

	/// Resets the transport link to the device.
	///
	/// Network devices are disconnected and reconnected. USB devices either
	/// restart the host bridge server or are reattached through TCP mode,
	/// depending on `mode`.
	pub async fn reset_connection(&self, mode: UsbReset) -> Result<()> {
		let id = self.device.as_str();
		let steps: Vec<Vec<&str>> = match (self.device.transport(), mode) {
			(Transport::Network, _) => vec![vec!["disconnect", id], vec!["connect", id]],
			(Transport::Usb, UsbReset::RestartServer) => vec![vec!["kill-server"], vec!["start-server"]],
			(Transport::Usb, UsbReset::Reattach) => vec![vec!["-s", id, "usb"], vec!["-s", id, "tcpip", "5555"], vec!["-s", id, "usb"]],
		};
		info!(target = "fleet.negotiate", device = %self.device, transport = %self.device.transport(), "resetting connection");

		let last = steps.len() - 1;
		for (index, args) in steps.iter().enumerate() {
			match guarded(self.token, self.bridge.host(args)).await {
				Ok(_) => {}
				Err(err) if err.is_cancelled() => return Err(err.into()),
				Err(err) => warn!(target = "fleet.negotiate", device = %self.device, step = %args.join(" "), error = %err, "reset step failed"),
			}
			let settle = if index == last { self.timings.reconnect_settle_ms } else { self.timings.disconnect_settle_ms };
			pause(self.token, ms(settle)).await?;
		}
		Ok(())
	}
}
