//! Device bridge: enumeration, device-shell probes, and host-level link control.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fleet_protocol::DeviceId;
use tracing::{debug, warn};

use crate::error::{Result, RuntimeError};
use crate::process;
use crate::shell::{CommandRunner, ProcessRunner, render_command};

/// Host-side access to attached devices.
///
/// Implementations are shared by every device worker and must tolerate
/// concurrent calls for different devices.
#[async_trait]
pub trait DeviceBridge: Send + Sync {
	/// Lists identities of devices currently attached and authorized.
	async fn devices(&self) -> Result<Vec<DeviceId>>;

	/// Runs `command` in the device shell and returns its stdout.
	async fn shell(&self, device: &DeviceId, command: &str) -> Result<String>;

	/// Runs a host-level bridge command (`connect`, `kill-server`, ...).
	async fn host(&self, args: &[&str]) -> Result<String>;

	/// Frees a local port so a session can bind it.
	async fn release_port(&self, port: u16) -> Result<Option<String>> {
		process::release_port(port).await
	}
}

/// [`DeviceBridge`] backed by the `adb` executable.
#[derive(Clone)]
pub struct AdbBridge {
	runner: Arc<dyn CommandRunner>,
	program: String,
	timeout: Duration,
}

impl AdbBridge {
	pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
		Self::with_runner(Arc::new(ProcessRunner), program, timeout)
	}

	pub fn with_runner(runner: Arc<dyn CommandRunner>, program: impl Into<String>, timeout: Duration) -> Self {
		Self {
			runner,
			program: program.into(),
			timeout,
		}
	}

	async fn exec(&self, args: Vec<String>) -> Result<String> {
		let output = self.runner.run(&self.program, &args, self.timeout).await?;
		if !output.success {
			return Err(RuntimeError::CommandFailed {
				command: render_command(&self.program, &args),
				status: output.code.map_or_else(|| "signal".to_string(), |code| code.to_string()),
				stderr: output.stderr.trim().to_string(),
			});
		}
		Ok(output.stdout)
	}
}

impl Default for AdbBridge {
	fn default() -> Self {
		Self::new("adb", Duration::from_secs(15))
	}
}

#[async_trait]
impl DeviceBridge for AdbBridge {
	async fn devices(&self) -> Result<Vec<DeviceId>> {
		let stdout = self.exec(vec!["devices".to_string()]).await?;
		let devices = parse_devices(&stdout);
		if devices.is_empty() {
			warn!(target = "fleet.adb", "no attached devices found");
		} else {
			debug!(target = "fleet.adb", count = devices.len(), "enumerated devices");
		}
		Ok(devices)
	}

	async fn shell(&self, device: &DeviceId, command: &str) -> Result<String> {
		self.exec(vec!["-s".to_string(), device.to_string(), "shell".to_string(), command.to_string()])
			.await
	}

	async fn host(&self, args: &[&str]) -> Result<String> {
		self.exec(args.iter().map(|arg| arg.to_string()).collect()).await
	}
}

/// Parses `adb devices` output into ready device identities.
///
/// Devices in any state other than `device` (offline, unauthorized,
/// recovery) are skipped, as are the header and daemon chatter lines.
pub fn parse_devices(output: &str) -> Vec<DeviceId> {
	output
		.lines()
		.map(str::trim)
		.filter(|line| !line.is_empty() && !line.starts_with("List of devices") && !line.starts_with('*'))
		.filter_map(|line| {
			let mut parts = line.split_whitespace();
			let id = parts.next()?;
			(parts.next()? == "device").then(|| DeviceId::new(id))
		})
		.collect()
}
