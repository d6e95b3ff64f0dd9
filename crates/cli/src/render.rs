//! Result rendering for the terminal.

use std::fmt;

use clap::ValueEnum;
use colored::Colorize;
use fleet::FleetReport;
use fleet_protocol::{DeviceId, DeviceOutcome, DeviceStatus};
use serde::Serialize;

/// Output format for CLI results.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
	/// Human-readable text
	#[default]
	Text,
	/// JSON output
	Json,
}

impl fmt::Display for OutputFormat {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			OutputFormat::Text => write!(f, "text"),
			OutputFormat::Json => write!(f, "json"),
		}
	}
}

pub fn devices(devices: &[DeviceId], format: OutputFormat) -> serde_json::Result<String> {
	match format {
		OutputFormat::Json => serde_json::to_string_pretty(devices),
		OutputFormat::Text if devices.is_empty() => Ok("no devices attached".dimmed().to_string()),
		OutputFormat::Text => Ok(devices
			.iter()
			.map(|device| format!("{}  {}", device.as_str().bold(), device.transport().to_string().dimmed()))
			.collect::<Vec<_>>()
			.join("\n")),
	}
}

/// Renders one line per device plus a summary, or the whole report as JSON.
pub fn fleet<T, F>(report: &FleetReport<T>, format: OutputFormat, summary: F) -> serde_json::Result<String>
where
	T: Serialize,
	F: Fn(&T) -> String,
{
	if format == OutputFormat::Json {
		return serde_json::to_string_pretty(report);
	}

	let width = report.outcomes.iter().map(|outcome| outcome.device.as_str().len()).max().unwrap_or(0);
	let mut lines: Vec<String> = report.outcomes.iter().map(|outcome| outcome_line(outcome, width, &summary)).collect();

	let mut footer = format!("{}/{} devices completed", report.completed(), report.outcomes.len());
	if report.timed_out {
		footer.push_str(", deadline reached");
	}
	if report.cancelled {
		footer.push_str(", stopped by request");
	}
	lines.push(footer.bold().to_string());
	Ok(lines.join("\n"))
}

fn outcome_line<T>(outcome: &DeviceOutcome<T>, width: usize, summary: &impl Fn(&T) -> String) -> String {
	let device = format!("{:width$}", outcome.device.as_str());
	let (status, detail) = match &outcome.status {
		DeviceStatus::Completed { report } => ("ok".green(), summary(report)),
		DeviceStatus::ConnectFailed { reason, detail } => ("connect failed".red(), format!("{reason}: {detail}")),
		DeviceStatus::Failed { detail } => ("failed".red(), detail.clone()),
		DeviceStatus::TimedOut => ("timed out".yellow(), String::new()),
		DeviceStatus::Cancelled => ("cancelled".yellow(), String::new()),
	};
	format!("{}  {}  {}", device.bold(), status, detail).trim_end().to_string()
}
