//! Error types for the runtime layer.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
	#[error("failed to spawn `{program}`: {source}")]
	Spawn {
		program: String,
		#[source]
		source: std::io::Error,
	},

	#[error("`{command}` timed out after {after:?}")]
	Timeout { command: String, after: Duration },

	#[error("`{command}` exited with {status}: {stderr}")]
	CommandFailed { command: String, status: String, stderr: String },

	#[error("automation server returned {status} ({error}): {message}")]
	WebDriver { status: u16, error: String, message: String },

	#[error("HTTP request failed: {0}")]
	Http(#[from] reqwest::Error),

	#[error("protocol error: {0}")]
	Protocol(String),

	#[error("operation cancelled")]
	Cancelled,
}

impl RuntimeError {
	pub fn is_cancelled(&self) -> bool {
		matches!(self, RuntimeError::Cancelled)
	}
}

pub type Result<T> = std::result::Result<T, RuntimeError>;
