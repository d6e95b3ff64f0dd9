//! Item identity from on-screen signals.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use fleet_runtime::{CancellationToken, UiSession};
use tracing::trace;

use crate::config::FeedSelectors;
use crate::error::Result;
use crate::ui::read_text;

/// Characters of the description folded into a fingerprint.
const DESCRIPTION_PREFIX: usize = 20;
const EPHEMERAL_PREFIX: &str = "~";

static EPHEMERAL_SEQ: AtomicU64 = AtomicU64::new(0);

/// Stable identity of a feed item, or a never-repeating token when no signal is readable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
	/// Composes the readable signals; `None` when every one is missing.
	pub fn from_signals(metric: Option<&str>, author: Option<&str>, description: Option<&str>) -> Option<Self> {
		let mut parts = Vec::with_capacity(3);
		if let Some(metric) = metric {
			parts.push(format!("m={metric}"));
		}
		if let Some(author) = author {
			parts.push(format!("a={author}"));
		}
		if let Some(description) = description {
			let prefix: String = description.chars().take(DESCRIPTION_PREFIX).collect();
			parts.push(format!("d={prefix}"));
		}
		(!parts.is_empty()).then(|| Self(parts.join("|")))
	}

	/// A token unique for the life of the process.
	pub fn ephemeral() -> Self {
		let nanos = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_nanos()).unwrap_or_default();
		let seq = EPHEMERAL_SEQ.fetch_add(1, Ordering::Relaxed);
		Self(format!("{EPHEMERAL_PREFIX}{nanos}.{seq}"))
	}

	/// True when no signal was readable. Such fingerprints never equal one another.
	pub fn is_ephemeral(&self) -> bool {
		self.0.starts_with(EPHEMERAL_PREFIX)
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for Fingerprint {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// What was read from the current item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
	pub fingerprint: Fingerprint,
	pub metric_text: Option<String>,
}

/// Reads identity signals off the screen.
pub struct Fingerprinter<'a> {
	selectors: &'a FeedSelectors,
}

impl<'a> Fingerprinter<'a> {
	pub fn new(selectors: &'a FeedSelectors) -> Self {
		Self { selectors }
	}

	pub async fn capture(&self, ui: &dyn UiSession, token: &CancellationToken) -> Result<Snapshot> {
		let metric = read_text(ui, &self.selectors.metric, token).await?;
		let author = read_text(ui, &self.selectors.author, token).await?;
		let description = read_text(ui, &self.selectors.description, token).await?;

		let fingerprint = Fingerprint::from_signals(metric.as_deref(), author.as_deref(), description.as_deref())
			.unwrap_or_else(Fingerprint::ephemeral);
		trace!(target = "fleet.traversal", %fingerprint, "captured");
		Ok(Snapshot {
			fingerprint,
			metric_text: metric,
		})
	}
}
