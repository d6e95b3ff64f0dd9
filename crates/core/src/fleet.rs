//! Fleet runner: one worker per device, a shared deadline, and a stop signal.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use fleet_protocol::{DeviceId, DeviceOutcome, DeviceStatus, FollowReport, StopReason, TraversalReport};
use fleet_runtime::{CancellationToken, guarded};
use serde::Serialize;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::error::{FleetError, Result};
use crate::follow::FollowWorkflow;
use crate::session::{DeviceServices, DeviceSessionManager, Session};
use crate::traversal::TraversalEngine;

/// Work performed on each connected device.
#[async_trait]
pub trait DeviceWorkflow: Send + Sync + 'static {
	type Report: Send + 'static;

	async fn run(&self, session: &Session, token: &CancellationToken) -> Result<Self::Report>;

	/// True when `report` describes a run cut short by its token rather than a finished one.
	fn interrupted(&self, _report: &Self::Report) -> bool {
		false
	}
}

/// Traverses each device's own-content feed, acting on items below `threshold`.
pub struct SweepWorkflow {
	engine: TraversalEngine,
	threshold: u64,
}

impl SweepWorkflow {
	pub fn new(engine: TraversalEngine, threshold: u64) -> Self {
		Self { engine, threshold }
	}
}

#[async_trait]
impl DeviceWorkflow for SweepWorkflow {
	type Report = TraversalReport;

	async fn run(&self, session: &Session, token: &CancellationToken) -> Result<TraversalReport> {
		self.engine.run(session.ui()?, self.threshold, token).await
	}

	fn interrupted(&self, report: &TraversalReport) -> bool {
		report.stop_reason == StopReason::Cancelled
	}
}

#[async_trait]
impl DeviceWorkflow for FollowWorkflow {
	type Report = FollowReport;

	async fn run(&self, session: &Session, token: &CancellationToken) -> Result<FollowReport> {
		FollowWorkflow::run(self, session.ui()?, token).await
	}

	fn interrupted(&self, report: &FollowReport) -> bool {
		report.cancelled
	}
}

/// Outcomes of one fleet run, in device enumeration order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FleetReport<T> {
	pub outcomes: Vec<DeviceOutcome<T>>,
	pub timed_out: bool,
	pub cancelled: bool,
}

impl<T> FleetReport<T> {
	pub fn completed(&self) -> usize {
		self.outcomes.iter().filter(|outcome| outcome.status.is_completed()).count()
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interruption {
	Deadline,
	Stop,
}

pub struct Fleet {
	services: DeviceServices,
}

impl Fleet {
	pub fn new(services: DeviceServices) -> Self {
		Self { services }
	}

	pub fn services(&self) -> &DeviceServices {
		&self.services
	}

	/// Devices currently attached and ready.
	pub async fn enumerate(&self, token: &CancellationToken) -> Result<Vec<DeviceId>> {
		Ok(guarded(token, self.services.bridge.devices()).await?)
	}

	/// Runs `workflow` on every device in parallel and reports one outcome per device.
	///
	/// After the configured deadline or when `stop` fires, workers are cancelled
	/// and given the grace period to tear down; stragglers are then aborted.
	/// Session quits still in flight get one more grace period before this returns.
	pub async fn run<W: DeviceWorkflow>(&self, devices: Vec<DeviceId>, workflow: Arc<W>, stop: &CancellationToken) -> FleetReport<W::Report> {
		let config = self.services.config.clone();
		let run_token = stop.child_token();
		let mut remaining: BTreeSet<DeviceId> = BTreeSet::new();
		let mut set = JoinSet::new();

		info!(target = "fleet.run", devices = devices.len(), deadline_secs = config.deadline_secs, "fleet run started");
		for device in &devices {
			if !remaining.insert(device.clone()) {
				warn!(target = "fleet.run", device = %device, "duplicate device skipped");
				continue;
			}
			set.spawn(drive_device(device.clone(), self.services.clone(), workflow.clone(), run_token.child_token()));
		}

		let deadline = Instant::now() + config.deadline();
		let mut outcomes = Vec::with_capacity(devices.len());
		let mut interruption: Option<Interruption> = None;
		let mut grace_until: Option<Instant> = None;
		let mut aborted = false;

		loop {
			let grace = tokio::time::sleep_until(grace_until.unwrap_or(deadline));
			tokio::select! {
				joined = set.join_next() => match joined {
					None => break,
					Some(Ok(mut outcome)) => {
						if interruption == Some(Interruption::Deadline) && matches!(outcome.status, DeviceStatus::Cancelled) {
							outcome.status = DeviceStatus::TimedOut;
						}
						remaining.remove(&outcome.device);
						outcomes.push(outcome);
					}
					Some(Err(err)) if err.is_panic() => error!(target = "fleet.run", error = %err, "device worker panicked"),
					Some(Err(_)) => {}
				},
				_ = tokio::time::sleep_until(deadline), if interruption.is_none() => {
					warn!(target = "fleet.run", "deadline reached; cancelling workers");
					interruption = Some(Interruption::Deadline);
					run_token.cancel();
					grace_until = Some(Instant::now() + config.grace());
				}
				_ = stop.cancelled(), if interruption.is_none() => {
					warn!(target = "fleet.run", "stop requested; cancelling workers");
					interruption = Some(Interruption::Stop);
					grace_until = Some(Instant::now() + config.grace());
				}
				_ = grace, if grace_until.is_some() && !aborted => {
					warn!(target = "fleet.run", pending = remaining.len(), "grace period over; abandoning workers");
					aborted = true;
					set.abort_all();
				}
			}
		}

		let abandoned = self.services.teardowns.drain(config.grace()).await;
		if abandoned > 0 {
			warn!(target = "fleet.run", abandoned, "session teardowns did not finish");
		}

		if interruption.is_none() && stop.is_cancelled() {
			interruption = Some(Interruption::Stop);
		}
		for device in remaining {
			let status = match interruption {
				Some(Interruption::Stop) => DeviceStatus::Cancelled,
				_ => DeviceStatus::TimedOut,
			};
			outcomes.push(DeviceOutcome { device, status });
		}
		outcomes.sort_by_key(|outcome| devices.iter().position(|device| *device == outcome.device));

		let report = FleetReport {
			outcomes,
			timed_out: interruption == Some(Interruption::Deadline),
			cancelled: interruption == Some(Interruption::Stop),
		};
		info!(target = "fleet.run", completed = report.completed(), total = report.outcomes.len(), "fleet run finished");
		report
	}
}

async fn drive_device<W: DeviceWorkflow>(device: DeviceId, services: DeviceServices, workflow: Arc<W>, token: CancellationToken) -> DeviceOutcome<W::Report> {
	let mut manager = DeviceSessionManager::new(device.clone(), services);
	let status = match manager.connect(&token).await {
		Err(FleetError::Connection(failure)) => {
			if let Some(diagnostic) = &failure.diagnostic {
				warn!(target = "fleet.run", device = %device, "{diagnostic}");
			}
			DeviceStatus::ConnectFailed {
				reason: failure.reason,
				detail: failure.detail,
			}
		}
		Err(FleetError::Cancelled) => DeviceStatus::Cancelled,
		Err(err) => DeviceStatus::Failed { detail: err.to_string() },
		Ok(mut session) => {
			let result = workflow.run(&session, &token).await;
			session.close().await;
			match result {
				Ok(report) if workflow.interrupted(&report) => {
					info!(target = "fleet.run", device = %device, "workflow interrupted; partial report dropped");
					DeviceStatus::Cancelled
				}
				Ok(report) => DeviceStatus::Completed { report },
				Err(FleetError::Cancelled) => DeviceStatus::Cancelled,
				Err(err) => {
					warn!(target = "fleet.run", device = %device, error = %err, "workflow failed");
					DeviceStatus::Failed { detail: err.to_string() }
				}
			}
		}
	};
	DeviceOutcome { device, status }
}
