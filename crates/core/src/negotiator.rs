//! Session negotiation: bounded retries with attempt-indexed remediation.

use std::fmt::Write as _;

use fleet_protocol::{ConnectFailureReason, DeviceId, SessionOptions, Transport};
use fleet_runtime::{CancellationToken, UiSession, guarded, pause};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{ConnectionFailure, FleetError, Result};
use crate::foreground::{ForegroundControl, ForegroundState};
use crate::maintenance::Maintenance;
use crate::session::DeviceServices;

/// Corrective action taken between two session-open attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Remediation {
	/// Kill any stale on-device automation server.
	CleanupAutomationServer,
	/// Reset the transport link.
	ResetConnection,
	/// Move the session to a freshly drawn port.
	RedrawPort,
}

struct RemediationRule {
	/// Failed attempt after which the action runs.
	after_attempt: u32,
	action: Remediation,
	usb_only: bool,
}

const REMEDIATION_TABLE: &[RemediationRule] = &[
	RemediationRule {
		after_attempt: 2,
		action: Remediation::CleanupAutomationServer,
		usb_only: false,
	},
	RemediationRule {
		after_attempt: 3,
		action: Remediation::ResetConnection,
		usb_only: true,
	},
	RemediationRule {
		after_attempt: 4,
		action: Remediation::RedrawPort,
		usb_only: false,
	},
];

/// Remediation scheduled after `attempt` failed on a device using `transport`.
pub fn remediation_for(attempt: u32, transport: Transport) -> Option<Remediation> {
	REMEDIATION_TABLE
		.iter()
		.find(|rule| rule.after_attempt == attempt && (!rule.usb_only || transport == Transport::Usb))
		.map(|rule| rule.action)
}

/// One failed session-open attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptRecord {
	pub attempt: u32,
	pub system_port: u16,
	pub error: String,
	/// Wait before the next attempt; `None` on the final one.
	pub backoff_ms: Option<u64>,
	pub remediation: Option<Remediation>,
}

pub struct Negotiated {
	pub ui: Box<dyn UiSession>,
	pub system_port: u16,
	pub attempts: Vec<AttemptRecord>,
}

pub struct Negotiator<'a> {
	services: &'a DeviceServices,
	device: &'a DeviceId,
	token: &'a CancellationToken,
}

impl<'a> Negotiator<'a> {
	pub fn new(services: &'a DeviceServices, device: &'a DeviceId, token: &'a CancellationToken) -> Self {
		Self { services, device, token }
	}

	/// Opens a session on `system_port`, retrying per the configured policy.
	///
	/// `foreground_pending` re-runs foreground reconciliation after each failure
	/// until the target is confirmed in front.
	pub async fn negotiate(&self, system_port: u16, mut foreground_pending: bool) -> Result<Negotiated> {
		let config = &self.services.config;
		let transport = self.device.transport();
		let max_attempts = config.negotiation.max_attempts(transport);
		let mut options = SessionOptions::optimized(self.device, system_port, self.services.ports.base(), &config.target);
		let mut attempts: Vec<AttemptRecord> = Vec::new();

		for attempt in 1..=max_attempts {
			info!(
				target = "fleet.negotiate",
				device = %self.device,
				attempt,
				max_attempts,
				port = options.system_port,
				"opening session"
			);

			let err = match guarded(self.token, self.services.opener.open(&options)).await {
				Ok(ui) => {
					info!(target = "fleet.negotiate", device = %self.device, attempt, session = ui.id(), "session opened");
					return Ok(Negotiated {
						ui,
						system_port: options.system_port,
						attempts,
					});
				}
				Err(err) if err.is_cancelled() => return Err(FleetError::Cancelled),
				Err(err) => err,
			};
			warn!(target = "fleet.negotiate", device = %self.device, attempt, error = %err, "session open failed");

			let mut record = AttemptRecord {
				attempt,
				system_port: options.system_port,
				error: err.to_string(),
				backoff_ms: None,
				remediation: None,
			};
			if attempt == max_attempts {
				attempts.push(record);
				break;
			}

			let backoff = config.negotiation.backoff(attempt);
			record.backoff_ms = Some(backoff.as_millis() as u64);
			record.remediation = remediation_for(attempt, transport);
			let remediation = record.remediation;
			attempts.push(record);

			debug!(target = "fleet.negotiate", device = %self.device, backoff_ms = backoff.as_millis() as u64, "backing off");
			pause(self.token, backoff).await?;

			if let Some(action) = remediation {
				self.remediate(action, &mut options).await?;
			}
			if foreground_pending {
				let state = self.foreground().reconcile().await?;
				foreground_pending = state != ForegroundState::Frontmost;
			}
		}

		let last_error = attempts.last().map(|record| record.error.clone());
		let mut failure = ConnectionFailure::new(
			self.device,
			ConnectFailureReason::NegotiationExhausted,
			format!("no session after {max_attempts} attempts"),
		);
		failure.diagnostic = Some(diagnostic_report(self.device, &attempts));
		failure.last_error = last_error;
		failure.attempts = attempts;
		Err(failure.into())
	}

	async fn remediate(&self, action: Remediation, options: &mut SessionOptions) -> Result<()> {
		info!(target = "fleet.negotiate", device = %self.device, ?action, "remediating");
		let config = &self.services.config;
		let maintenance = Maintenance::new(self.services.bridge.clone(), self.device, &config.timings, self.token);
		match action {
			Remediation::CleanupAutomationServer => {
				maintenance.kill_automation_server().await?;
			}
			Remediation::ResetConnection => maintenance.reset_connection(config.usb_reset).await?,
			Remediation::RedrawPort => {
				let port = self.services.ports.port_for(&format!("{}_retry", self.device))?;
				self.services.release_port(port, self.token).await?;
				info!(target = "fleet.negotiate", device = %self.device, old = options.system_port, new = port, "moved to fresh port");
				options.set_system_port(port);
			}
		}
		Ok(())
	}

	fn foreground(&self) -> ForegroundControl<'_> {
		let config = &self.services.config;
		ForegroundControl::new(self.services.bridge.clone(), self.device, &config.target, &config.timings, self.token)
	}
}

/// Human-oriented summary of a failed negotiation with transport-specific hints.
pub fn diagnostic_report(device: &DeviceId, attempts: &[AttemptRecord]) -> String {
	let transport = device.transport();
	let mut report = String::new();
	let _ = writeln!(report, "Could not open a session on {device} ({transport}) after {} attempts.", attempts.len());
	for record in attempts {
		let _ = writeln!(report, "  attempt {} on port {}: {}", record.attempt, record.system_port, record.error);
	}

	let _ = writeln!(report, "Probable causes:");
	let hints: &[&str] = match transport {
		Transport::Usb => &[
			"loose or charge-only cable, or a flaky hub port",
			"USB debugging authorization was revoked on the device",
			"another host process holds the debug bridge",
			"the on-device automation server is wedged; reboot the device",
		],
		Transport::Network => &[
			"device and host are on different networks or the address changed",
			"wireless debugging was turned off or the pairing expired",
			"a firewall blocks the debug port",
			"the on-device automation server is wedged; reconnect and retry",
		],
	};
	for hint in hints {
		let _ = writeln!(report, "  - {hint}");
	}
	report
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn remediation_table_by_transport() {
		assert_eq!(remediation_for(1, Transport::Usb), None);
		assert_eq!(remediation_for(2, Transport::Usb), Some(Remediation::CleanupAutomationServer));
		assert_eq!(remediation_for(2, Transport::Network), Some(Remediation::CleanupAutomationServer));
		assert_eq!(remediation_for(3, Transport::Usb), Some(Remediation::ResetConnection));
		assert_eq!(remediation_for(3, Transport::Network), None);
		assert_eq!(remediation_for(4, Transport::Network), Some(Remediation::RedrawPort));
		assert_eq!(remediation_for(5, Transport::Usb), None);
	}

	#[test]
	fn diagnostic_report_differs_by_transport() {
		let record = AttemptRecord {
			attempt: 1,
			system_port: 8201,
			error: "socket hang up".into(),
			backoff_ms: None,
			remediation: None,
		};
		let usb = diagnostic_report(&DeviceId::new("R58M"), std::slice::from_ref(&record));
		let net = diagnostic_report(&DeviceId::new("10.0.0.5:5555"), &[record]);
		assert!(usb.contains("cable"));
		assert!(!net.contains("cable"));
		assert!(net.contains("firewall"));
		assert!(usb.contains("attempt 1 on port 8201: socket hang up"));
	}
}
