//! Host process execution with bounded runtime.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::trace;

use crate::error::{Result, RuntimeError};

/// Captured result of one finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
	pub success: bool,
	pub code: Option<i32>,
	pub stdout: String,
	pub stderr: String,
}

impl CommandOutput {
	/// First non-empty stdout line, trimmed.
	pub fn first_line(&self) -> Option<&str> {
		self.stdout.lines().map(str::trim).find(|line| !line.is_empty())
	}
}

/// Executes host programs. Implementations must be safe to share across workers.
#[async_trait]
pub trait CommandRunner: Send + Sync {
	async fn run(&self, program: &str, args: &[String], timeout: Duration) -> Result<CommandOutput>;
}

/// [`CommandRunner`] backed by real child processes.
///
/// Children are killed when their future is dropped, so a timed-out or
/// cancelled probe never outlives its caller.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
	async fn run(&self, program: &str, args: &[String], timeout: Duration) -> Result<CommandOutput> {
		let command_line = render_command(program, args);
		trace!(target = "fleet.process", command = %command_line, "spawning");

		let mut cmd = Command::new(program);
		cmd.args(args)
			.stdin(Stdio::null())
			.stdout(Stdio::piped())
			.stderr(Stdio::piped())
			.kill_on_drop(true);

		let child = cmd.spawn().map_err(|source| RuntimeError::Spawn {
			program: program.to_string(),
			source,
		})?;

		let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
			Ok(result) => result.map_err(|source| RuntimeError::Spawn {
				program: program.to_string(),
				source,
			})?,
			Err(_) => {
				return Err(RuntimeError::Timeout {
					command: command_line,
					after: timeout,
				});
			}
		};

		Ok(CommandOutput {
			success: output.status.success(),
			code: output.status.code(),
			stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
			stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
		})
	}
}

pub(crate) fn render_command(program: &str, args: &[String]) -> String {
	std::iter::once(program).chain(args.iter().map(String::as_str)).collect::<Vec<_>>().join(" ")
}
