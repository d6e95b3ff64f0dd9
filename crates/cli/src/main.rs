mod cli;
mod commands;
mod logging;
mod render;
mod styles;

use clap::Parser;
use fleet_runtime::CancellationToken;
use tracing::{error, warn};

use crate::cli::Cli;

#[tokio::main]
async fn main() {
	let cli = Cli::parse();
	logging::init_logging(cli.verbose);

	let stop = CancellationToken::new();
	let signal = stop.clone();
	tokio::spawn(async move {
		if tokio::signal::ctrl_c().await.is_ok() {
			warn!(target = "fleet", "interrupt received; stopping workers");
			signal.cancel();
		}
	});

	match commands::dispatch(cli, stop).await {
		Ok(true) => {}
		Ok(false) => std::process::exit(2),
		Err(err) => {
			error!(target = "fleet", error = %err, "command failed");
			std::process::exit(1);
		}
	}
}
