//! Fleet configuration.
//!
//! Loaded from a camelCase JSON file; every field has a default so a partial
//! file (or none at all) yields a working configuration.

use std::fs;
use std::path::Path;
use std::time::Duration;

use fleet_protocol::{Selector, TargetApp, Transport};
use serde::{Deserialize, Serialize};

use crate::error::{FleetError, Result};

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:4723";
pub const DEFAULT_PORT_BASE: u16 = 8200;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct FleetConfig {
	/// Remote-control server base URL.
	pub server: String,
	/// Debug-bridge executable.
	pub adb: String,
	pub target: TargetApp,
	pub ports: PortConfig,
	pub negotiation: RetryPolicy,
	pub usb_reset: UsbReset,
	pub timings: Timings,
	pub traversal: TraversalBudget,
	pub unreadable_metric: UnreadableMetric,
	pub selectors: SelectorSet,
	/// Whole-run deadline in seconds.
	pub deadline_secs: u64,
	/// Time workers get to wind down after the deadline or a stop request.
	pub grace_secs: u64,
}

impl Default for FleetConfig {
	fn default() -> Self {
		Self {
			server: DEFAULT_SERVER_URL.to_string(),
			adb: "adb".to_string(),
			target: TargetApp::default(),
			ports: PortConfig::default(),
			negotiation: RetryPolicy::default(),
			usb_reset: UsbReset::default(),
			timings: Timings::default(),
			traversal: TraversalBudget::default(),
			unreadable_metric: UnreadableMetric::default(),
			selectors: SelectorSet::default(),
			deadline_secs: 30 * 60,
			grace_secs: 20,
		}
	}
}

impl FleetConfig {
	/// Reads `path`, falling back to defaults for anything it omits.
	pub fn load(path: &Path) -> Result<Self> {
		let content = fs::read_to_string(path)?;
		let config: FleetConfig = serde_json::from_str(&content)?;
		config.validate()?;
		Ok(config)
	}

	pub fn validate(&self) -> Result<()> {
		if self.negotiation.usb_attempts == 0 || self.negotiation.network_attempts == 0 {
			return Err(FleetError::Config("negotiation attempts must be at least 1".into()));
		}
		if self.traversal.max_errors == 0 || self.traversal.repeat_tolerance == 0 {
			return Err(FleetError::Config("traversal maxErrors and repeatTolerance must be at least 1".into()));
		}
		if self.target.package.trim().is_empty() {
			return Err(FleetError::Config("target package is empty".into()));
		}
		Ok(())
	}

	pub fn deadline(&self) -> Duration {
		Duration::from_secs(self.deadline_secs)
	}

	pub fn grace(&self) -> Duration {
		Duration::from_secs(self.grace_secs)
	}
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct PortConfig {
	pub base: u16,
}

impl Default for PortConfig {
	fn default() -> Self {
		Self { base: DEFAULT_PORT_BASE }
	}
}

/// Session-open retry budget and backoff schedule.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct RetryPolicy {
	pub usb_attempts: u32,
	pub network_attempts: u32,
	pub backoff_base_ms: u64,
	pub backoff_step_ms: u64,
}

impl Default for RetryPolicy {
	fn default() -> Self {
		Self {
			usb_attempts: 6,
			network_attempts: 4,
			backoff_base_ms: 3_000,
			backoff_step_ms: 2_000,
		}
	}
}

impl RetryPolicy {
	pub fn max_attempts(&self, transport: Transport) -> u32 {
		match transport {
			Transport::Usb => self.usb_attempts,
			Transport::Network => self.network_attempts,
		}
	}

	/// Wait before the attempt following the `failed`-th failure.
	pub fn backoff(&self, failed: u32) -> Duration {
		Duration::from_millis(self.backoff_base_ms.saturating_add(self.backoff_step_ms.saturating_mul(failed as u64)))
	}
}

/// How a USB connection is reset during negotiation.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum UsbReset {
	/// Restart the host-side debug-bridge server.
	#[default]
	RestartServer,
	/// Switch the device to TCP mode and back, leaving other devices' server alone.
	Reattach,
}

/// Settle delays, all in milliseconds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct Timings {
	pub cleanup_settle_ms: u64,
	pub disconnect_settle_ms: u64,
	pub reconnect_settle_ms: u64,
	pub front_settle_ms: u64,
	pub launch_settle_ms: u64,
	pub launch_fallback_settle_ms: u64,
	pub post_connect_settle_ms: u64,
	pub render_settle_ms: u64,
	pub swipe_ms: u64,
	pub swipe_settle_ms: u64,
	pub action_settle_ms: u64,
	pub menu_settle_ms: u64,
	pub menu_retry_ms: u64,
	pub scroll_ms: u64,
	pub scroll_settle_ms: u64,
	pub confirm_settle_ms: u64,
	pub profile_settle_ms: u64,
	pub element_wait_ms: u64,
	pub poll_ms: u64,
	pub follow_delay_ms: u64,
	pub refresh_swipe_ms: u64,
}

impl Default for Timings {
	fn default() -> Self {
		Self {
			cleanup_settle_ms: 1_000,
			disconnect_settle_ms: 2_000,
			reconnect_settle_ms: 3_000,
			front_settle_ms: 2_000,
			launch_settle_ms: 5_000,
			launch_fallback_settle_ms: 3_000,
			post_connect_settle_ms: 2_000,
			render_settle_ms: 2_000,
			swipe_ms: 600,
			swipe_settle_ms: 1_500,
			action_settle_ms: 3_000,
			menu_settle_ms: 2_000,
			menu_retry_ms: 2_000,
			scroll_ms: 800,
			scroll_settle_ms: 1_500,
			confirm_settle_ms: 2_000,
			profile_settle_ms: 3_000,
			element_wait_ms: 15_000,
			poll_ms: 250,
			follow_delay_ms: 2_000,
			refresh_swipe_ms: 500,
		}
	}
}

/// Converts a millisecond setting into a [`Duration`].
pub fn ms(value: u64) -> Duration {
	Duration::from_millis(value)
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct TraversalBudget {
	/// Consecutive item errors tolerated before the run stops.
	pub max_errors: u32,
	/// Distinct items processed before the run stops.
	pub max_items: u32,
	/// Consecutive repeated fingerprints tolerated before the feed counts as exhausted.
	pub repeat_tolerance: u32,
}

impl Default for TraversalBudget {
	fn default() -> Self {
		Self {
			max_errors: 3,
			max_items: 50,
			repeat_tolerance: 3,
		}
	}
}

/// What to do with an item whose metric text yields no clean number.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum UnreadableMetric {
	/// Count an item error and move on without acting.
	#[default]
	Skip,
	/// Use the best-effort value extracted from the text.
	Fallback,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct SelectorSet {
	pub feed: FeedSelectors,
	pub entry: EntrySelectors,
	pub delete: DeleteSelectors,
	pub follow: FollowSelectors,
}

/// Locators for the identity signals of the current feed item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct FeedSelectors {
	pub metric: Selector,
	pub author: Selector,
	pub description: Selector,
}

impl Default for FeedSelectors {
	fn default() -> Self {
		Self {
			metric: Selector::xpath("//android.widget.TextView[@resource-id='com.ss.android.ugc.trill:id/vb2']"),
			author: Selector::id("com.ss.android.ugc.trill:id/title"),
			description: Selector::id("com.ss.android.ugc.trill:id/desc"),
		}
	}
}

/// Locators used to reach the first item of the own-content feed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct EntrySelectors {
	pub profile_tab: Vec<Selector>,
	pub first_item: Vec<Selector>,
}

impl Default for EntrySelectors {
	fn default() -> Self {
		Self {
			profile_tab: vec![
				Selector::accessibility_id("Hồ sơ"),
				Selector::xpath("//*[@content-desc='Hồ sơ' or @content-desc='Profile']"),
			],
			first_item: vec![
				Selector::xpath("(//*[@resource-id='com.ss.android.ugc.trill:id/cover'])[1]"),
				Selector::xpath("(//android.view.ViewGroup[contains(@resource-id, 'item')])[1]"),
			],
		}
	}
}

/// Locators for the multi-step delete flow.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct DeleteSelectors {
	pub menu_button: Selector,
	pub menu_frame: Selector,
	pub menu_frame_child: Selector,
	pub share_row: Selector,
	pub delete_button: Selector,
	pub confirm_button: Selector,
	/// Horizontal scrolls of the share row before the delete button must be visible.
	pub max_scrolls: u32,
	/// Rounds of menu-opening attempts.
	pub menu_rounds: u32,
}

impl Default for DeleteSelectors {
	fn default() -> Self {
		Self {
			menu_button: Selector::id("com.ss.android.ugc.trill:id/q3a"),
			menu_frame: Selector::id("com.ss.android.ugc.trill:id/t7r"),
			menu_frame_child: Selector::xpath(".//android.widget.ImageView"),
			share_row: Selector::id("com.ss.android.ugc.trill:id/v3"),
			delete_button: Selector::xpath("//android.widget.Button[@content-desc='Xóa']"),
			confirm_button: Selector::xpath("//android.view.ViewGroup[@resource-id='com.ss.android.ugc.trill:id/e1t']"),
			max_scrolls: 8,
			menu_rounds: 3,
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct FollowSelectors {
	/// Profile URL template; `{id}` is replaced by the target identifier.
	pub profile_url: String,
	pub follow_button: Selector,
	/// Button label shown while the profile is not yet followed.
	pub follow_label: String,
}

impl Default for FollowSelectors {
	fn default() -> Self {
		Self {
			profile_url: "https://www.tiktok.com/@{id}".to_string(),
			follow_button: Selector::xpath("//android.widget.TextView[@resource-id='com.ss.android.ugc.trill:id/dq0']"),
			follow_label: "Follow".to_string(),
		}
	}
}
