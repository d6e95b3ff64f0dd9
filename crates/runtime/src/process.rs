//! Local port helpers used before a session claims its system port.

use std::time::Duration;

use tokio::process::Command;
use tracing::debug;

use crate::error::{Result, RuntimeError};

const PORT_TOOL_TIMEOUT: Duration = Duration::from_secs(10);

/// Returns `true` when `port` can be bound on localhost.
pub fn port_available(port: u16) -> bool {
	std::net::TcpListener::bind(("127.0.0.1", port)).is_ok()
}

/// Terminates whatever listens on local `port`.
///
/// Returns `Ok(None)` when the port is already free, and the terminated PIDs
/// otherwise.
pub async fn release_port(port: u16) -> Result<Option<String>> {
	if port_available(port) {
		return Ok(None);
	}

	#[cfg(unix)]
	{
		let stdout = tool_output("lsof", &["-ti".to_string(), format!(":{}", port)]).await?;
		let pids: Vec<&str> = stdout.lines().map(str::trim).filter(|pid| !pid.is_empty()).collect();
		if pids.is_empty() {
			return Err(RuntimeError::Protocol(format!("No process found on port {}", port)));
		}

		let mut killed = Vec::new();
		for pid in &pids {
			debug!(target = "fleet.process", pid = %pid, port, "terminating port holder");
			match Command::new("kill").args(["-TERM", *pid]).status().await {
				Ok(status) if status.success() => killed.push(*pid),
				Ok(_) => debug!(target = "fleet.process", pid = %pid, "kill -TERM returned non-zero"),
				Err(e) => debug!(target = "fleet.process", pid = %pid, error = %e, "kill failed"),
			}
		}

		if killed.is_empty() {
			return Err(RuntimeError::Protocol(format!("Failed to kill process on port {}", port)));
		}

		Ok(Some(killed.join(", ")))
	}

	#[cfg(windows)]
	{
		let stdout = tool_output("netstat", &["-ano".to_string()]).await?;
		let pids = netstat_listeners(&stdout, port);
		let mut killed = Vec::new();
		for pid in &pids {
			let status = Command::new("taskkill").args(["/PID", pid.as_str(), "/F"]).status().await;
			if status.map(|s| s.success()).unwrap_or(false) {
				killed.push(pid.clone());
			}
		}

		if killed.is_empty() {
			return Err(RuntimeError::Protocol(format!("Could not find or kill process on port {}", port)));
		}

		Ok(Some(killed.join(", ")))
	}

	#[cfg(not(any(unix, windows)))]
	{
		Err(RuntimeError::Protocol(format!("Port release unsupported on this platform (port {})", port)))
	}
}

#[cfg(any(unix, windows))]
async fn tool_output(program: &str, args: &[String]) -> Result<String> {
	let future = Command::new(program).args(args).kill_on_drop(true).output();
	let output = tokio::time::timeout(PORT_TOOL_TIMEOUT, future)
		.await
		.map_err(|_| RuntimeError::Timeout {
			command: crate::shell::render_command(program, args),
			after: PORT_TOOL_TIMEOUT,
		})?
		.map_err(|source| RuntimeError::Spawn {
			program: program.to_string(),
			source,
		})?;
	Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[cfg(any(test, windows))]
fn netstat_listeners(output: &str, port: u16) -> Vec<String> {
	let needle = format!(":{}", port);
	let mut pids: Vec<String> = output
		.lines()
		.filter(|line| line.contains("LISTENING"))
		.filter(|line| line.split_whitespace().nth(1).is_some_and(|local| local.ends_with(&needle)))
		.filter_map(|line| line.split_whitespace().last().map(str::to_string))
		.collect();
	pids.dedup();
	pids
}
