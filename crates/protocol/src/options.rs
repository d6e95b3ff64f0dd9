//! Remote-control session options and their capability rendering.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::device::{DeviceId, Transport};

/// Base of the webview devtools port range, offset by the system port.
const WEBVIEW_DEVTOOLS_BASE: u16 = 9222;

/// The application under automation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetApp {
	/// Package name that must own input focus.
	pub package: String,
	/// Activity used when a session is opened and as the launch fallback.
	pub launch_activity: String,
	/// Activity used to bring an already running app to the front.
	pub main_activity: String,
}

impl TargetApp {
	/// `package/activity` component string for the main activity.
	pub fn main_component(&self) -> String {
		format!("{}/{}", self.package, self.main_activity)
	}

	/// `package/activity` component string for the launch activity.
	pub fn launch_component(&self) -> String {
		format!("{}/{}", self.package, self.launch_activity)
	}
}

impl Default for TargetApp {
	fn default() -> Self {
		Self {
			package: "com.ss.android.ugc.trill".to_string(),
			launch_activity: "com.ss.android.ugc.trill.splash.SplashActivity".to_string(),
			main_activity: "com.ss.android.ugc.aweme.main.MainActivity".to_string(),
		}
	}
}

/// Transport-dependent timeouts applied while the device and server warm up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportTimeouts {
	pub device_ready_ms: u64,
	pub adb_exec_ms: u64,
	pub install_ms: u64,
}

impl TransportTimeouts {
	/// USB links stall more often and get the longer set.
	pub const USB: Self = Self {
		device_ready_ms: 90_000,
		adb_exec_ms: 90_000,
		install_ms: 90_000,
	};

	pub const NETWORK: Self = Self {
		device_ready_ms: 60_000,
		adb_exec_ms: 60_000,
		install_ms: 60_000,
	};

	pub fn for_transport(transport: Transport) -> Self {
		match transport {
			Transport::Usb => Self::USB,
			Transport::Network => Self::NETWORK,
		}
	}
}

/// Options for opening a remote-control session against one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionOptions {
	pub udid: DeviceId,
	pub transport: Transport,
	pub app_package: String,
	pub app_activity: String,
	pub system_port: u16,
	pub port_base: u16,
	pub no_reset: bool,
	pub auto_grant_permissions: bool,
	pub new_command_timeout_secs: u64,
	pub server_launch_timeout_secs: u64,
	pub server_install_timeout_secs: u64,
	pub timeouts: TransportTimeouts,
	pub wait_for_selector_timeout_ms: u64,
	pub wait_for_launch_timeout_ms: u64,
}

impl SessionOptions {
	/// Builds the tuned option set for `device`, classifying its transport by identity shape.
	pub fn optimized(device: &DeviceId, system_port: u16, port_base: u16, target: &TargetApp) -> Self {
		let transport = device.transport();
		Self {
			udid: device.clone(),
			transport,
			app_package: target.package.clone(),
			app_activity: target.launch_activity.clone(),
			system_port,
			port_base,
			no_reset: true,
			auto_grant_permissions: true,
			new_command_timeout_secs: 120,
			server_launch_timeout_secs: 90,
			server_install_timeout_secs: 90,
			timeouts: TransportTimeouts::for_transport(transport),
			wait_for_selector_timeout_ms: 15_000,
			wait_for_launch_timeout_ms: 90_000,
		}
	}

	/// Moves the session to another system port; derived socket and devtools ports follow.
	pub fn set_system_port(&mut self, port: u16) {
		self.system_port = port;
	}

	/// Abstract socket name the on-device server binds for this port.
	pub fn device_socket(&self) -> String {
		format!("fleet_automation_{}", self.system_port)
	}

	pub fn webview_devtools_port(&self) -> u16 {
		WEBVIEW_DEVTOOLS_BASE.saturating_add(self.system_port.saturating_sub(self.port_base))
	}

	/// Renders the options as Appium-prefixed W3C capabilities.
	pub fn to_capabilities(&self) -> Value {
		let mut caps = Map::new();
		let mut put = |key: &str, value: Value| {
			caps.insert(key.to_string(), value);
		};

		put("platformName", json!("Android"));
		put("appium:automationName", json!("UiAutomator2"));
		put("appium:deviceName", json!("Android Device"));
		put("appium:udid", json!(self.udid));
		put("appium:appPackage", json!(self.app_package));
		put("appium:appActivity", json!(self.app_activity));
		put("appium:systemPort", json!(self.system_port));
		put("appium:noReset", json!(self.no_reset));
		put("appium:fullReset", json!(false));
		put("appium:autoGrantPermissions", json!(self.auto_grant_permissions));
		put("appium:skipDeviceInitialization", json!(false));
		put("appium:skipServerInstallation", json!(false));
		put("appium:newCommandTimeout", json!(self.new_command_timeout_secs));
		put("appium:uiautomator2ServerLaunchTimeout", json!(self.server_launch_timeout_secs * 1000));
		put("appium:uiautomator2ServerInstallTimeout", json!(self.server_install_timeout_secs * 1000));
		put("appium:androidDeviceReadyTimeout", json!(self.timeouts.device_ready_ms));
		put("appium:adbExecTimeout", json!(self.timeouts.adb_exec_ms));
		put("appium:androidInstallTimeout", json!(self.timeouts.install_ms));
		put("appium:disableWindowAnimation", json!(true));
		put("appium:waitForIdleTimeout", json!(0));
		put("appium:androidDeviceSocket", json!(self.device_socket()));
		put("appium:ensureWebviewsHavePages", json!(true));
		put("appium:webviewDevtoolsPort", json!(self.webview_devtools_port()));
		put("appium:dontStopAppOnReset", json!(true));
		put("appium:waitForSelectorTimeout", json!(self.wait_for_selector_timeout_ms));
		put("appium:waitForLaunchTimeout", json!(self.wait_for_launch_timeout_ms));
		put("appium:networkConnectionEnabled", json!(true));
		put("appium:allowTestPackages", json!(true));
		put("appium:enforceAppiumPrefix", json!(true));

		Value::Object(caps)
	}
}
