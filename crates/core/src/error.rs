//! Error types for fleet orchestration.

use fleet_protocol::{ConnectFailureReason, DeviceId};
use fleet_runtime::RuntimeError;
use thiserror::Error;

use crate::negotiator::AttemptRecord;

/// A device could not be brought to a live session.
///
/// Fatal for that device only; sibling workers are unaffected.
#[derive(Debug, Clone, Error)]
#[error("{reason} on {device}: {detail}")]
pub struct ConnectionFailure {
	pub device: DeviceId,
	pub reason: ConnectFailureReason,
	pub detail: String,
	/// Last underlying error when negotiation was attempted.
	pub last_error: Option<String>,
	/// Human-oriented probable causes and remedies.
	pub diagnostic: Option<String>,
	pub attempts: Vec<AttemptRecord>,
}

impl ConnectionFailure {
	pub fn new(device: &DeviceId, reason: ConnectFailureReason, detail: impl Into<String>) -> Self {
		Self {
			device: device.clone(),
			reason,
			detail: detail.into(),
			last_error: None,
			diagnostic: None,
			attempts: Vec::new(),
		}
	}
}

#[derive(Debug, Error)]
pub enum FleetError {
	#[error(transparent)]
	Connection(#[from] ConnectionFailure),

	#[error(transparent)]
	Runtime(RuntimeError),

	#[error("element not found: {0}")]
	Locator(String),

	#[error("session for {0} is closed")]
	SessionClosed(DeviceId),

	#[error("configuration error: {0}")]
	Config(String),

	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),

	#[error("operation cancelled")]
	Cancelled,
}

impl FleetError {
	pub fn is_cancelled(&self) -> bool {
		matches!(self, FleetError::Cancelled)
	}
}

impl From<RuntimeError> for FleetError {
	fn from(err: RuntimeError) -> Self {
		match err {
			RuntimeError::Cancelled => FleetError::Cancelled,
			other => FleetError::Runtime(other),
		}
	}
}

pub type Result<T> = std::result::Result<T, FleetError>;

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn runtime_cancellation_maps_to_cancelled() {
		assert!(FleetError::from(RuntimeError::Cancelled).is_cancelled());
		let other = FleetError::from(RuntimeError::Protocol("bad".into()));
		assert!(matches!(other, FleetError::Runtime(_)));
	}

	#[test]
	fn connection_failure_display_names_reason_and_device() {
		let failure = ConnectionFailure::new(&DeviceId::new("R58M"), ConnectFailureReason::DeviceInvalid, "boot not completed");
		assert_eq!(failure.to_string(), "device invalid on R58M: boot not completed");
	}
}
