//! Device session lifecycle: gated connect, idempotent close.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use fleet_protocol::{ConnectFailureReason, DeviceId, Transport};
use fleet_runtime::{CancellationToken, DeviceBridge, SessionOpener, UiSession, guarded, pause};
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::{FleetConfig, ms};
use crate::error::{ConnectionFailure, FleetError, Result};
use crate::foreground::{ForegroundControl, ForegroundState};
use crate::maintenance::{Cleanup, Maintenance};
use crate::negotiator::{AttemptRecord, Negotiator};
use crate::ports::PortAllocator;
use crate::validator::{Check, DeviceValidator};

/// Shared capabilities every device worker draws on.
#[derive(Clone)]
pub struct DeviceServices {
	pub bridge: Arc<dyn DeviceBridge>,
	pub opener: Arc<dyn SessionOpener>,
	pub ports: Arc<PortAllocator>,
	pub config: Arc<FleetConfig>,
	pub teardowns: Teardowns,
}

impl DeviceServices {
	pub fn new(bridge: Arc<dyn DeviceBridge>, opener: Arc<dyn SessionOpener>, config: FleetConfig) -> Self {
		Self {
			bridge,
			opener,
			ports: Arc::new(PortAllocator::new(config.ports.base)),
			config: Arc::new(config),
			teardowns: Teardowns::default(),
		}
	}

	/// Best-effort release of a local port; only cancellation is an error.
	pub async fn release_port(&self, port: u16, token: &CancellationToken) -> Result<()> {
		match guarded(token, self.bridge.release_port(port)).await {
			Ok(Some(owner)) => info!(target = "fleet.session", port, owner = %owner, "released port"),
			Ok(None) => {}
			Err(err) if err.is_cancelled() => return Err(err.into()),
			Err(err) => warn!(target = "fleet.session", port, error = %err, "port release failed"),
		}
		Ok(())
	}
}

/// Session quits running on their own tasks.
///
/// A quit outlives the worker that started it; owners drain the set before
/// shutting down so aborted workers still release their remote sessions.
#[derive(Clone, Default)]
pub struct Teardowns {
	pending: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl Teardowns {
	fn track(&self, task: JoinHandle<()>) {
		let mut pending = self.pending.lock();
		pending.retain(|task| !task.is_finished());
		pending.push(task);
	}

	/// Quits not yet finished.
	pub fn pending(&self) -> usize {
		self.pending.lock().iter().filter(|task| !task.is_finished()).count()
	}

	/// Waits up to `within` for every tracked quit. Returns how many were abandoned.
	pub async fn drain(&self, within: Duration) -> usize {
		let tasks = std::mem::take(&mut *self.pending.lock());
		let until = Instant::now() + within;
		let mut abandoned = 0;
		for task in tasks {
			let abort = task.abort_handle();
			if tokio::time::timeout_at(until, task).await.is_err() {
				abort.abort();
				abandoned += 1;
			}
		}
		abandoned
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
	Unconnected,
	Validating,
	Negotiating,
	Connected,
	Closed,
}

impl fmt::Display for SessionState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			SessionState::Unconnected => "unconnected",
			SessionState::Validating => "validating",
			SessionState::Negotiating => "negotiating",
			SessionState::Connected => "connected",
			SessionState::Closed => "closed",
		})
	}
}

/// A live remote-control session bound to one device.
///
/// Dropping an open session schedules its teardown on the current runtime.
pub struct Session {
	device: DeviceId,
	system_port: u16,
	ui: Option<Box<dyn UiSession>>,
	attempts: Vec<AttemptRecord>,
	teardowns: Teardowns,
}

impl Session {
	pub fn device(&self) -> &DeviceId {
		&self.device
	}

	pub fn system_port(&self) -> u16 {
		self.system_port
	}

	/// Failed attempts that preceded the successful open.
	pub fn attempts(&self) -> &[AttemptRecord] {
		&self.attempts
	}

	pub fn state(&self) -> SessionState {
		if self.ui.is_some() { SessionState::Connected } else { SessionState::Closed }
	}

	pub fn ui(&self) -> Result<&dyn UiSession> {
		self.ui.as_deref().ok_or_else(|| FleetError::SessionClosed(self.device.clone()))
	}

	/// Releases the remote session. Safe to call repeatedly; teardown errors are logged.
	///
	/// The quit runs on its own tracked task, so it completes even if the caller is aborted.
	pub async fn close(&mut self) {
		let Some(ui) = self.ui.take() else {
			return;
		};
		let device = self.device.clone();
		let (done, finished) = oneshot::channel();
		self.teardowns.track(tokio::spawn(async move {
			match ui.quit().await {
				Ok(()) => info!(target = "fleet.session", device = %device, "session closed"),
				Err(err) => warn!(target = "fleet.session", device = %device, error = %err, "session teardown failed"),
			}
			let _ = done.send(());
		}));
		let _ = finished.await;
	}
}

impl Drop for Session {
	fn drop(&mut self) {
		let Some(ui) = self.ui.take() else {
			return;
		};
		let device = self.device.clone();
		match tokio::runtime::Handle::try_current() {
			Ok(handle) => {
				self.teardowns.track(handle.spawn(async move {
					if let Err(err) = ui.quit().await {
						debug!(target = "fleet.session", device = %device, error = %err, "teardown after drop failed");
					}
				}));
			}
			Err(_) => warn!(target = "fleet.session", device = %device, "session dropped outside a runtime; not torn down"),
		}
	}
}

/// Drives one device from identity to live [`Session`].
pub struct DeviceSessionManager {
	device: DeviceId,
	services: DeviceServices,
	state: SessionState,
}

impl DeviceSessionManager {
	pub fn new(device: DeviceId, services: DeviceServices) -> Self {
		Self {
			device,
			services,
			state: SessionState::Unconnected,
		}
	}

	pub fn device(&self) -> &DeviceId {
		&self.device
	}

	pub fn state(&self) -> SessionState {
		self.state
	}

	/// Runs every readiness gate and opens a session.
	///
	/// Each gate aborts the call on failure and leaves the manager `Closed`.
	pub async fn connect(&mut self, token: &CancellationToken) -> Result<Session> {
		self.state = SessionState::Unconnected;
		let result = self.run_gates(token).await;
		self.state = if result.is_ok() { SessionState::Connected } else { SessionState::Closed };
		if let Err(err) = &result {
			warn!(target = "fleet.session", device = %self.device, error = %err, "connect aborted");
		}
		result
	}

	async fn run_gates(&mut self, token: &CancellationToken) -> Result<Session> {
		let device = self.device.clone();
		let services = self.services.clone();
		let config = services.config.clone();
		let validator = DeviceValidator::new(services.bridge.clone(), &device, token);

		info!(target = "fleet.session", device = %device, transport = %device.transport(), "connecting");
		if let Check::Failed(detail) = validator.validate().await? {
			return Err(ConnectionFailure::new(&device, ConnectFailureReason::DeviceInvalid, detail).into());
		}
		self.state = SessionState::Validating;

		if let Check::Failed(detail) = validator.check_requirements(&config.target).await? {
			return Err(ConnectionFailure::new(&device, ConnectFailureReason::RequirementsUnmet, detail).into());
		}
		self.state = SessionState::Negotiating;

		let foreground = ForegroundControl::new(services.bridge.clone(), &device, &config.target, &config.timings, token);
		let foreground_pending = foreground.reconcile().await? != ForegroundState::Frontmost;
		if foreground_pending {
			warn!(target = "fleet.session", device = %device, "app not confirmed in front; continuing");
		}

		let port = services.ports.port_for(device.as_str())?;
		services.release_port(port, token).await?;

		if device.transport() == Transport::Usb {
			let maintenance = Maintenance::new(services.bridge.clone(), &device, &config.timings, token);
			if let Cleanup::Unreachable(err) = maintenance.kill_automation_server().await? {
				warn!(target = "fleet.session", device = %device, error = %err, "pre-check failed; resetting connection");
				maintenance.reset_connection(config.usb_reset).await?;
				if let Check::Failed(detail) = validator.validate().await? {
					let mut failure = ConnectionFailure::new(&device, ConnectFailureReason::UsbUnstable, detail);
					failure.last_error = Some(err);
					return Err(failure.into());
				}
			}
		}

		let negotiated = Negotiator::new(&services, &device, token).negotiate(port, foreground_pending).await?;
		let session = Session {
			device: device.clone(),
			system_port: negotiated.system_port,
			ui: Some(negotiated.ui),
			attempts: negotiated.attempts,
			teardowns: services.teardowns.clone(),
		};

		let current = match guarded(token, session.ui()?.current_package()).await {
			Ok(package) => Some(package),
			Err(err) if err.is_cancelled() => return Err(FleetError::Cancelled),
			Err(err) => {
				debug!(target = "fleet.session", device = %device, error = %err, "current package unreadable");
				None
			}
		};
		if current.as_deref() != Some(config.target.package.as_str()) {
			info!(target = "fleet.session", device = %device, current = ?current, "target not in front after connect");
			foreground.bring_to_front().await?;
			pause(token, ms(config.timings.post_connect_settle_ms)).await?;
		}

		info!(target = "fleet.session", device = %device, port = session.system_port, "connected");
		Ok(session)
	}
}
