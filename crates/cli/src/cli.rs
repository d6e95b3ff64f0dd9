use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::render::OutputFormat;
use crate::styles::cli_styles;

#[derive(Parser, Debug)]
#[command(name = "fleet")]
#[command(about = "Drive a fleet of Android devices: connect, sweep feeds, follow profiles")]
#[command(version)]
#[command(styles = cli_styles())]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Configuration file (JSON); defaults apply to anything it omits
	#[arg(short, long, global = true, value_name = "FILE", env = "FLEET_CONFIG")]
	pub config: Option<PathBuf>,

	/// Automation server base URL
	#[arg(long, global = true, value_name = "URL")]
	pub server: Option<String>,

	/// Whole-run deadline in seconds
	#[arg(long, global = true, value_name = "SECS")]
	pub deadline: Option<u64>,

	/// Output format
	#[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Text)]
	pub format: OutputFormat,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// List attached devices that are ready for automation
	#[command(alias = "ls")]
	Devices,

	/// Connect to each device and close again, reporting failures
	Check {
		/// Devices to check (defaults to all attached)
		#[arg(short, long = "device", value_name = "ID")]
		devices: Vec<String>,
	},

	/// Walk each device's own feed and delete items below a threshold
	Sweep {
		/// Items whose metric is below this value are deleted
		#[arg(short, long)]
		threshold: u64,

		/// Devices to sweep (defaults to all attached)
		#[arg(short, long = "device", value_name = "ID")]
		devices: Vec<String>,

		/// Stop after this many distinct items
		#[arg(long)]
		max_items: Option<u32>,

		/// Stop after this many consecutive item errors
		#[arg(long)]
		max_errors: Option<u32>,

		/// Act on best-effort values when the metric text is unreadable
		#[arg(long)]
		fallback_metric: bool,
	},

	/// Follow every profile listed in a file from each device
	Follow {
		/// File with one profile identifier per line
		#[arg(short, long, value_name = "FILE")]
		targets: PathBuf,

		/// Devices to use (defaults to all attached)
		#[arg(short, long = "device", value_name = "ID")]
		devices: Vec<String>,

		/// Delay between profile steps in milliseconds
		#[arg(long, value_name = "MS")]
		delay_ms: Option<u64>,
	},
}

#[cfg(test)]
mod tests {
	use clap::CommandFactory;

	use super::*;

	#[test]
	fn command_definition_is_consistent() {
		Cli::command().debug_assert();
	}

	#[test]
	fn sweep_arguments_parse() {
		let cli = Cli::try_parse_from(["fleet", "-vv", "--format", "json", "sweep", "-t", "500", "-d", "R58M", "-d", "10.0.0.2:5555", "--max-items", "20"]).unwrap();
		assert_eq!(cli.verbose, 2);
		assert_eq!(cli.format, OutputFormat::Json);
		match cli.command {
			Commands::Sweep {
				threshold,
				devices,
				max_items,
				fallback_metric,
				..
			} => {
				assert_eq!(threshold, 500);
				assert_eq!(devices, vec!["R58M", "10.0.0.2:5555"]);
				assert_eq!(max_items, Some(20));
				assert!(!fallback_metric);
			}
			other => panic!("unexpected command {other:?}"),
		}
	}

	#[test]
	fn follow_requires_targets() {
		assert!(Cli::try_parse_from(["fleet", "follow"]).is_err());
	}
}
