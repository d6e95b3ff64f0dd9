//! In-memory doubles for the bridge, session opener, and UI session.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use fleet::config::SelectorSet;
use fleet::{DeviceServices, FleetConfig};
use fleet_protocol::{DeviceId, ElementHandle, Gesture, Lookup, Rect, Selector, SessionOptions, WindowSize};
use fleet_runtime::{DeviceBridge, Result, RuntimeError, SessionOpener, UiSession};

pub const PACKAGE: &str = "com.ss.android.ugc.trill";

fn failure(command: &str) -> RuntimeError {
	RuntimeError::CommandFailed {
		command: command.to_string(),
		status: "1".to_string(),
		stderr: "error: device offline".to_string(),
	}
}

const LAUNCHER_WINDOW: &str = "  mCurrentFocus=Window{1a u0 com.android.launcher3/com.android.launcher3.Launcher}\n";
const LAUNCHER_ACTIVITY: &str = "  mResumedActivity: ActivityRecord{2b u0 com.android.launcher3/.Launcher t1}\n";

/// Where the target app stands, as reported by one foreground probe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Focus {
	#[default]
	Front,
	Background,
	Absent,
}

/// Scripted debug bridge. Healthy devices pass every probe.
#[derive(Default)]
pub struct FakeBridge {
	pub devices: Vec<DeviceId>,
	/// Devices whose every shell probe fails.
	pub unreachable: HashSet<DeviceId>,
	/// Devices without the target package installed.
	pub missing_package: HashSet<DeviceId>,
	/// The process listing fails on every device.
	pub process_listing_fails: bool,
	/// Every shell probe fails once a host-level reset has run.
	pub offline_after_reset: bool,
	/// Focus reported by successive window dumps; the app is in front once this runs dry.
	pub focus_script: Mutex<VecDeque<Focus>>,
	focus: Mutex<Focus>,
	pub shell_calls: Mutex<Vec<(DeviceId, String)>>,
	pub host_calls: Mutex<Vec<Vec<String>>>,
}

impl FakeBridge {
	pub fn with_devices(ids: &[&str]) -> Self {
		Self {
			devices: ids.iter().map(|id| DeviceId::new(*id)).collect(),
			..Default::default()
		}
	}

	pub fn with_focus(self, states: &[Focus]) -> Self {
		self.focus_script.lock().unwrap().extend(states.iter().copied());
		self
	}

	pub fn shell_count(&self, device: &str, prefix: &str) -> usize {
		self.shell_calls
			.lock()
			.unwrap()
			.iter()
			.filter(|(id, command)| id.as_str() == device && command.starts_with(prefix))
			.count()
	}

	pub fn host_commands(&self) -> Vec<String> {
		self.host_calls.lock().unwrap().iter().map(|args| args.join(" ")).collect()
	}
}

#[async_trait]
impl DeviceBridge for FakeBridge {
	async fn devices(&self) -> Result<Vec<DeviceId>> {
		Ok(self.devices.clone())
	}

	async fn shell(&self, device: &DeviceId, command: &str) -> Result<String> {
		self.shell_calls.lock().unwrap().push((device.clone(), command.to_string()));
		let reset_done = !self.host_calls.lock().unwrap().is_empty();
		if self.unreachable.contains(device) || (self.offline_after_reset && reset_done) {
			return Err(failure(command));
		}

		let output = match command {
			"echo test" => "test\n".to_string(),
			"getprop sys.boot_completed" => "1\n".to_string(),
			"getprop ro.boot.serialno" => format!("{device}\n"),
			"settings get global adb_enabled" => "1\n".to_string(),
			"dumpsys power" => "mWakefulness=Awake\nDisplay Power: state=ON\n".to_string(),
			"dumpsys window windows" => {
				let focus = self.focus_script.lock().unwrap().pop_front().unwrap_or_default();
				*self.focus.lock().unwrap() = focus;
				match focus {
					Focus::Front => format!("  mCurrentFocus=Window{{a1 u0 {PACKAGE}/com.ss.android.ugc.aweme.main.MainActivity}}\n"),
					_ => LAUNCHER_WINDOW.to_string(),
				}
			}
			"dumpsys activity activities" => LAUNCHER_ACTIVITY.to_string(),
			_ if command.starts_with("pidof") => match *self.focus.lock().unwrap() {
				Focus::Background => "4242\n".to_string(),
				_ => String::new(),
			},
			"ps -A" if self.process_listing_fails => return Err(failure(command)),
			"ps -A" => "USER PID PPID NAME\nshell 4242 1 uiautomator\n".to_string(),
			_ if command.starts_with("pm list packages") => {
				if self.missing_package.contains(device) {
					String::new()
				} else {
					format!("package:{PACKAGE}\n")
				}
			}
			_ => String::new(),
		};
		Ok(output)
	}

	async fn host(&self, args: &[&str]) -> Result<String> {
		self.host_calls.lock().unwrap().push(args.iter().map(|arg| arg.to_string()).collect());
		Ok(String::new())
	}

	async fn release_port(&self, _port: u16) -> Result<Option<String>> {
		Ok(None)
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedItem {
	pub metric: String,
	pub author: String,
}

pub fn item(metric: &str, author: &str) -> FeedItem {
	FeedItem {
		metric: metric.to_string(),
		author: author.to_string(),
	}
}

/// Where the overflow menu button can be found.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MenuLayout {
	#[default]
	Direct,
	/// Only as an icon inside the menu frame.
	InFrame,
	Missing,
}

/// Deviations from a well-behaved feed session.
#[derive(Debug, Clone, Default)]
pub struct FeedBehavior {
	pub menu: MenuLayout,
	/// Every touch gesture is rejected.
	pub gestures_fail: bool,
	/// Package reported in front instead of the target.
	pub foreground_package: Option<String>,
	pub quit_delay: Duration,
}

/// Opens [`FakeFeed`] sessions over a fixed item list.
pub struct FakeOpener {
	pub items: Vec<FeedItem>,
	pub behavior: FeedBehavior,
	/// Remaining failures per device before an open succeeds.
	pub failures: Mutex<HashMap<DeviceId, usize>>,
	/// Every open for these devices fails.
	pub always_fail: HashSet<DeviceId>,
	/// Opens never complete.
	pub hang: bool,
	pub opens: Mutex<Vec<SessionOptions>>,
	pub quits: Arc<AtomicUsize>,
}

impl FakeOpener {
	pub fn new(items: Vec<FeedItem>) -> Self {
		Self {
			items,
			behavior: FeedBehavior::default(),
			failures: Mutex::new(HashMap::new()),
			always_fail: HashSet::new(),
			hang: false,
			opens: Mutex::new(Vec::new()),
			quits: Arc::new(AtomicUsize::new(0)),
		}
	}

	pub fn fail_first(self, device: &str, times: usize) -> Self {
		self.failures.lock().unwrap().insert(DeviceId::new(device), times);
		self
	}

	pub fn open_count(&self, device: &str) -> usize {
		self.opens.lock().unwrap().iter().filter(|options| options.udid.as_str() == device).count()
	}

	pub fn ports_for(&self, device: &str) -> Vec<u16> {
		self.opens
			.lock()
			.unwrap()
			.iter()
			.filter(|options| options.udid.as_str() == device)
			.map(|options| options.system_port)
			.collect()
	}

	pub fn quit_count(&self) -> usize {
		self.quits.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl SessionOpener for FakeOpener {
	async fn open(&self, options: &SessionOptions) -> Result<Box<dyn UiSession>> {
		self.opens.lock().unwrap().push(options.clone());
		if self.hang {
			std::future::pending::<()>().await;
		}
		if self.always_fail.contains(&options.udid) {
			return Err(RuntimeError::Protocol("could not start instrumentation".into()));
		}
		{
			let mut failures = self.failures.lock().unwrap();
			if let Some(remaining) = failures.get_mut(&options.udid).filter(|remaining| **remaining > 0) {
				*remaining -= 1;
				return Err(RuntimeError::Protocol("socket hang up".into()));
			}
		}
		Ok(Box::new(FakeFeed::new(self.items.clone(), self.quits.clone()).with_behavior(self.behavior.clone())))
	}
}

#[derive(Debug, Default)]
struct FeedState {
	items: Vec<FeedItem>,
	cursor: usize,
	deleted: Vec<FeedItem>,
	gestures: Vec<Gesture>,
}

/// A vertically paged feed. Upward swipes advance until the last item;
/// confirming a delete removes the current item.
pub struct FakeFeed {
	selectors: SelectorSet,
	behavior: FeedBehavior,
	state: Mutex<FeedState>,
	quits: Arc<AtomicUsize>,
}

impl FakeFeed {
	pub fn new(items: Vec<FeedItem>, quits: Arc<AtomicUsize>) -> Self {
		Self {
			selectors: SelectorSet::default(),
			behavior: FeedBehavior::default(),
			state: Mutex::new(FeedState {
				items,
				..Default::default()
			}),
			quits,
		}
	}

	pub fn standalone(items: Vec<FeedItem>) -> Self {
		Self::new(items, Arc::new(AtomicUsize::new(0)))
	}

	pub fn with_behavior(mut self, behavior: FeedBehavior) -> Self {
		self.behavior = behavior;
		self
	}

	pub fn deleted_authors(&self) -> Vec<String> {
		self.state.lock().unwrap().deleted.iter().map(|item| item.author.clone()).collect()
	}

	pub fn remaining(&self) -> usize {
		self.state.lock().unwrap().items.len()
	}

	fn current(&self) -> Option<FeedItem> {
		let state = self.state.lock().unwrap();
		state.items.get(state.cursor).cloned()
	}

	fn element_for(&self, selector: &Selector) -> Option<&'static str> {
		let feed = &self.selectors.feed;
		let delete = &self.selectors.delete;
		let entry = &self.selectors.entry;
		if *selector == feed.metric || *selector == feed.author {
			let current = self.current()?;
			let text = if *selector == feed.metric { &current.metric } else { &current.author };
			return (!text.is_empty()).then_some(if *selector == feed.metric { "metric" } else { "author" });
		}
		if entry.profile_tab.contains(selector) {
			return Some("profile-tab");
		}
		if entry.first_item.contains(selector) {
			return Some("cover");
		}
		match self.behavior.menu {
			MenuLayout::Direct if *selector == delete.menu_button => return Some("menu"),
			MenuLayout::InFrame if *selector == delete.menu_frame => return Some("menu-frame"),
			_ => {}
		}
		let fixed = [
			(&delete.share_row, "share-row"),
			(&delete.delete_button, "delete"),
			(&delete.confirm_button, "confirm"),
		];
		fixed.iter().find(|(candidate, _)| *candidate == selector).map(|(_, name)| *name)
	}
}

#[async_trait]
impl UiSession for FakeFeed {
	fn id(&self) -> &str {
		"fake-session"
	}

	async fn find(&self, selector: &Selector) -> Result<Lookup> {
		Ok(match self.element_for(selector) {
			Some(name) => Lookup::Found(ElementHandle(name.to_string())),
			None => Lookup::NotFound,
		})
	}

	async fn find_within(&self, parent: &ElementHandle, selector: &Selector) -> Result<Lookup> {
		if parent.0 == "menu-frame" && *selector == self.selectors.delete.menu_frame_child {
			return Ok(Lookup::Found(ElementHandle("menu".to_string())));
		}
		Ok(Lookup::NotFound)
	}

	async fn text(&self, element: &ElementHandle) -> Result<String> {
		let current = self.current().ok_or_else(|| RuntimeError::Protocol("stale element".into()))?;
		match element.0.as_str() {
			"metric" => Ok(current.metric),
			"author" => Ok(current.author),
			other => Ok(other.to_string()),
		}
	}

	async fn click(&self, element: &ElementHandle) -> Result<()> {
		if element.0 == "confirm" {
			let mut state = self.state.lock().unwrap();
			let cursor = state.cursor;
			if cursor < state.items.len() {
				let removed = state.items.remove(cursor);
				state.deleted.push(removed);
				state.cursor = cursor.min(state.items.len().saturating_sub(1));
			}
		}
		Ok(())
	}

	async fn is_displayed(&self, _element: &ElementHandle) -> Result<bool> {
		Ok(true)
	}

	async fn rect(&self, _element: &ElementHandle) -> Result<Rect> {
		Ok(Rect {
			x: 0,
			y: 1800,
			width: 1080,
			height: 200,
		})
	}

	async fn perform(&self, gesture: &Gesture) -> Result<()> {
		if self.behavior.gestures_fail {
			return Err(RuntimeError::Protocol("touch injection rejected".into()));
		}
		let mut state = self.state.lock().unwrap();
		state.gestures.push(*gesture);
		if gesture.is_upward() && !gesture.is_horizontal() && state.cursor + 1 < state.items.len() {
			state.cursor += 1;
		}
		Ok(())
	}

	async fn window_size(&self) -> Result<WindowSize> {
		Ok(WindowSize { width: 1080, height: 2400 })
	}

	async fn current_package(&self) -> Result<String> {
		Ok(self.behavior.foreground_package.clone().unwrap_or_else(|| PACKAGE.to_string()))
	}

	async fn navigate(&self, _url: &str) -> Result<()> {
		Ok(())
	}

	async fn quit(&self) -> Result<()> {
		if !self.behavior.quit_delay.is_zero() {
			tokio::time::sleep(self.behavior.quit_delay).await;
		}
		self.quits.fetch_add(1, Ordering::SeqCst);
		Ok(())
	}
}

pub fn services(bridge: Arc<FakeBridge>, opener: Arc<FakeOpener>, config: FleetConfig) -> DeviceServices {
	DeviceServices::new(bridge, opener, config)
}

/// Distinct items `a0..a{n}` with the given metric.
pub fn distinct_items(count: usize, metric: &str) -> Vec<FeedItem> {
	(0..count).map(|i| item(metric, &format!("a{i}"))).collect()
}
