//! Per-device outcomes reported back to the fleet caller.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::device::DeviceId;

/// Why a device could not be brought to a live session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectFailureReason {
	/// Unreachable, not booted, or property readback failed.
	DeviceInvalid,
	/// Debug access disabled, display off, or target app missing.
	RequirementsUnmet,
	/// Transport still unstable after a connection-level reset.
	UsbUnstable,
	/// Session could not be opened within the retry budget.
	NegotiationExhausted,
}

impl fmt::Display for ConnectFailureReason {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let text = match self {
			ConnectFailureReason::DeviceInvalid => "device invalid",
			ConnectFailureReason::RequirementsUnmet => "requirements unmet",
			ConnectFailureReason::UsbUnstable => "USB unstable",
			ConnectFailureReason::NegotiationExhausted => "negotiation exhausted",
		};
		f.write_str(text)
	}
}

/// Terminal state of one traversal run. None of these are errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
	/// The maximum number of processed items was reached.
	ItemBudgetExhausted,
	/// Too many consecutive item-level errors.
	ErrorBudgetExhausted,
	/// The feed stopped yielding new items.
	FeedExhausted,
	/// An explicit advance failed while recovering from an item error.
	AdvanceFailed,
	/// The run was stopped by cancellation.
	Cancelled,
}

impl fmt::Display for StopReason {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let text = match self {
			StopReason::ItemBudgetExhausted => "item budget exhausted",
			StopReason::ErrorBudgetExhausted => "error budget exhausted",
			StopReason::FeedExhausted => "feed exhausted",
			StopReason::AdvanceFailed => "advance failed",
			StopReason::Cancelled => "cancelled",
		};
		f.write_str(text)
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraversalReport {
	/// Distinct items inspected.
	pub processed: u32,
	/// Items the configured action was applied to.
	pub acted_on: u32,
	/// Item-level errors recovered during the run.
	pub errors: u32,
	pub stop_reason: StopReason,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowReport {
	pub attempted: u32,
	pub followed: u32,
	pub already_following: u32,
	pub missing: u32,
	pub unconfirmed: u32,
	pub failed: u32,
	pub cancelled: bool,
}

/// Final state of one device worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeviceStatus<T> {
	Completed { report: T },
	ConnectFailed { reason: ConnectFailureReason, detail: String },
	Failed { detail: String },
	TimedOut,
	Cancelled,
}

impl<T> DeviceStatus<T> {
	pub fn is_completed(&self) -> bool {
		matches!(self, DeviceStatus::Completed { .. })
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceOutcome<T> {
	pub device: DeviceId,
	#[serde(flatten)]
	pub status: DeviceStatus<T>,
}
