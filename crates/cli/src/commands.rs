//! Command dispatch.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use fleet::config::UnreadableMetric;
use fleet::{DeleteAction, DeviceWorkflow, Fleet, FleetConfig, FollowWorkflow, Session, SweepWorkflow, TraversalEngine, load_targets};
use fleet_protocol::{DeviceId, FollowReport, TraversalReport};
use fleet_runtime::{AdbBridge, CancellationToken, WebDriverOpener};
use serde::Serialize;
use tracing::info;

use crate::cli::{Cli, Commands};
use crate::render::{self, OutputFormat};

/// Bridge probe timeout for single shell commands.
const PROBE_TIMEOUT: Duration = Duration::from_secs(15);

/// Runs the parsed command. Returns whether every device completed.
pub async fn dispatch(cli: Cli, stop: CancellationToken) -> Result<bool> {
	let mut config = load_config(&cli)?;
	let format = cli.format;

	match cli.command {
		Commands::Devices => {
			let fleet = build_fleet(config)?;
			let devices = fleet.enumerate(&stop).await?;
			println!("{}", render::devices(&devices, format)?);
			Ok(true)
		}
		Commands::Check { devices } => {
			let fleet = build_fleet(config)?;
			let devices = select_devices(&fleet, devices, &stop).await?;
			let report = fleet.run(devices, Arc::new(CheckWorkflow), &stop).await;
			print_report(&report, format, |check: &CheckReport| {
				format!("port {} after {} failed attempts", check.system_port, check.failed_attempts)
			})?;
			Ok(report.completed() == report.outcomes.len())
		}
		Commands::Sweep {
			threshold,
			devices,
			max_items,
			max_errors,
			fallback_metric,
		} => {
			if let Some(max_items) = max_items {
				config.traversal.max_items = max_items;
			}
			if let Some(max_errors) = max_errors {
				config.traversal.max_errors = max_errors;
			}
			if fallback_metric {
				config.unreadable_metric = UnreadableMetric::Fallback;
			}
			config.validate()?;

			let action = Arc::new(DeleteAction::new(config.selectors.delete.clone(), config.timings));
			let workflow = Arc::new(SweepWorkflow::new(TraversalEngine::new(&config, action), threshold));
			let fleet = build_fleet(config)?;
			let devices = select_devices(&fleet, devices, &stop).await?;
			info!(target = "fleet", threshold, devices = devices.len(), "starting sweep");

			let report = fleet.run(devices, workflow, &stop).await;
			print_report(&report, format, sweep_summary)?;
			Ok(report.completed() == report.outcomes.len())
		}
		Commands::Follow {
			targets,
			devices,
			delay_ms,
		} => {
			if let Some(delay_ms) = delay_ms {
				config.timings.follow_delay_ms = delay_ms;
			}
			let targets = load_targets(&targets).with_context(|| format!("reading targets from {}", targets.display()))?;
			if targets.is_empty() {
				bail!("target list is empty");
			}

			let workflow = Arc::new(FollowWorkflow::new(&config, targets));
			let fleet = build_fleet(config)?;
			let devices = select_devices(&fleet, devices, &stop).await?;
			info!(target = "fleet", targets = workflow.targets().len(), devices = devices.len(), "starting follow run");

			let report = fleet.run(devices, workflow, &stop).await;
			print_report(&report, format, follow_summary)?;
			Ok(report.completed() == report.outcomes.len())
		}
	}
}

fn load_config(cli: &Cli) -> Result<FleetConfig> {
	let mut config = match &cli.config {
		Some(path) => FleetConfig::load(path).with_context(|| format!("loading config from {}", path.display()))?,
		None => FleetConfig::default(),
	};
	if let Some(server) = &cli.server {
		config.server = server.clone();
	}
	if let Some(deadline) = cli.deadline {
		config.deadline_secs = deadline;
	}
	Ok(config)
}

fn build_fleet(config: FleetConfig) -> Result<Fleet> {
	let bridge = Arc::new(AdbBridge::new(config.adb.clone(), PROBE_TIMEOUT));
	let opener = Arc::new(WebDriverOpener::new(config.server.clone())?);
	Ok(Fleet::new(fleet::DeviceServices::new(bridge, opener, config)))
}

/// Explicit device arguments, or every attached device.
async fn select_devices(fleet: &Fleet, requested: Vec<String>, stop: &CancellationToken) -> Result<Vec<DeviceId>> {
	let devices = if requested.is_empty() {
		fleet.enumerate(stop).await?
	} else {
		requested.into_iter().map(DeviceId::from).collect()
	};
	if devices.is_empty() {
		bail!("no devices attached");
	}
	Ok(devices)
}

fn print_report<T: Serialize>(report: &fleet::FleetReport<T>, format: OutputFormat, summary: impl Fn(&T) -> String) -> Result<()> {
	println!("{}", render::fleet(report, format, summary)?);
	Ok(())
}

fn sweep_summary(report: &TraversalReport) -> String {
	format!(
		"processed {}, deleted {}, errors {} ({})",
		report.processed, report.acted_on, report.errors, report.stop_reason
	)
}

fn follow_summary(report: &FollowReport) -> String {
	let mut text = format!(
		"followed {}/{}, already {}, missing {}, unconfirmed {}, failed {}",
		report.followed, report.attempted, report.already_following, report.missing, report.unconfirmed, report.failed
	);
	if report.cancelled {
		text.push_str(" (cancelled)");
	}
	text
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckReport {
	system_port: u16,
	failed_attempts: usize,
}

/// Connects and immediately closes; the fleet runner handles teardown.
struct CheckWorkflow;

#[async_trait]
impl DeviceWorkflow for CheckWorkflow {
	type Report = CheckReport;

	async fn run(&self, session: &Session, _token: &CancellationToken) -> fleet::Result<CheckReport> {
		Ok(CheckReport {
			system_port: session.system_port(),
			failed_attempts: session.attempts().len(),
		})
	}
}
