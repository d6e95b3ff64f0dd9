//! The bounded traversal loop.

use std::sync::Arc;

use fleet_protocol::{Gesture, StopReason, TraversalReport};
use fleet_runtime::{CancellationToken, UiSession, guarded, pause};
use tracing::{debug, info, warn};

use super::actions::ItemAction;
use super::entry::enter_feed;
use super::fingerprint::{Fingerprinter, Snapshot};
use super::guard::{LoopGuard, Verdict};
use super::metric::{Metric, parse_metric};
use crate::config::{EntrySelectors, FeedSelectors, FleetConfig, Timings, TraversalBudget, UnreadableMetric, ms};
use crate::error::{FleetError, Result};

/// Per-run mutable state. Owned by one worker.
#[derive(Debug)]
struct TraversalState {
	guard: LoopGuard,
	processed: u32,
	acted_on: u32,
	consecutive_errors: u32,
	errors: u32,
	/// Snapshot captured right after the last advance, reused by the next iteration.
	carried: Option<Snapshot>,
}

impl TraversalState {
	fn new(budget: &TraversalBudget) -> Self {
		Self {
			guard: LoopGuard::new(budget.repeat_tolerance),
			processed: 0,
			acted_on: 0,
			consecutive_errors: 0,
			errors: 0,
			carried: None,
		}
	}

	fn record_error(&mut self) {
		self.consecutive_errors += 1;
		self.errors += 1;
	}

	fn report(&self, stop_reason: StopReason) -> TraversalReport {
		TraversalReport {
			processed: self.processed,
			acted_on: self.acted_on,
			errors: self.errors,
			stop_reason,
		}
	}
}

/// What the loop does after one iteration.
enum Flow {
	Continue,
	/// Item-level problem: count an error and advance explicitly.
	Recover(String),
	Stop(StopReason),
}

pub struct TraversalEngine {
	feed: FeedSelectors,
	entry: Option<EntrySelectors>,
	timings: Timings,
	budget: TraversalBudget,
	unreadable: UnreadableMetric,
	action: Arc<dyn ItemAction>,
}

impl TraversalEngine {
	pub fn new(config: &FleetConfig, action: Arc<dyn ItemAction>) -> Self {
		Self {
			feed: config.selectors.feed.clone(),
			entry: Some(config.selectors.entry.clone()),
			timings: config.timings,
			budget: config.traversal,
			unreadable: config.unreadable_metric,
			action,
		}
	}

	/// Starts on whatever item is on screen instead of navigating to the own-content feed.
	pub fn without_entry(mut self) -> Self {
		self.entry = None;
		self
	}

	pub fn with_budget(mut self, budget: TraversalBudget) -> Self {
		self.budget = budget;
		self
	}

	/// Walks the feed, applying the action to items whose metric is below `threshold`.
	///
	/// Always returns a report for item-level problems; `Err` only when the feed
	/// could not be entered.
	pub async fn run(&self, ui: &dyn UiSession, threshold: u64, token: &CancellationToken) -> Result<TraversalReport> {
		let mut state = TraversalState::new(&self.budget);

		if let Some(entry) = &self.entry {
			match enter_feed(ui, entry, &self.timings, token).await {
				Ok(()) => {}
				Err(FleetError::Cancelled) => return Ok(state.report(StopReason::Cancelled)),
				Err(err) => return Err(err),
			}
		}

		info!(target = "fleet.traversal", threshold, action = self.action.name(), "traversal started");
		let stop_reason = loop {
			if state.processed >= self.budget.max_items {
				break StopReason::ItemBudgetExhausted;
			}
			if state.consecutive_errors >= self.budget.max_errors {
				break StopReason::ErrorBudgetExhausted;
			}

			let problem = match self.step(ui, threshold, &mut state, token).await {
				Ok(Flow::Continue) => continue,
				Ok(Flow::Stop(reason)) => break reason,
				Ok(Flow::Recover(problem)) => problem,
				Err(FleetError::Cancelled) => break StopReason::Cancelled,
				Err(err) => err.to_string(),
			};

			state.record_error();
			state.carried = None;
			warn!(
				target = "fleet.traversal",
				error = %problem,
				consecutive = state.consecutive_errors,
				"item error; advancing"
			);
			match self.advance(ui, token).await {
				Ok(()) => {}
				Err(FleetError::Cancelled) => break StopReason::Cancelled,
				Err(err) => {
					warn!(target = "fleet.traversal", error = %err, "advance failed");
					break StopReason::AdvanceFailed;
				}
			}
		};

		let report = state.report(stop_reason);
		info!(
			target = "fleet.traversal",
			processed = report.processed,
			acted_on = report.acted_on,
			errors = report.errors,
			stop = %report.stop_reason,
			"traversal finished"
		);
		Ok(report)
	}

	async fn step(&self, ui: &dyn UiSession, threshold: u64, state: &mut TraversalState, token: &CancellationToken) -> Result<Flow> {
		let fingerprinter = Fingerprinter::new(&self.feed);
		let snapshot = match state.carried.take() {
			Some(snapshot) => snapshot,
			None => {
				pause(token, ms(self.timings.render_settle_ms)).await?;
				fingerprinter.capture(ui, token).await?
			}
		};

		match state.guard.observe(&snapshot.fingerprint) {
			Verdict::Fresh => {}
			Verdict::Repeat(count) => {
				debug!(target = "fleet.traversal", fingerprint = %snapshot.fingerprint, count, "repeat; advancing");
				self.advance(ui, token).await?;
				return Ok(Flow::Continue);
			}
			Verdict::Exhausted => {
				info!(target = "fleet.traversal", fingerprint = %snapshot.fingerprint, "feed stopped yielding new items");
				return Ok(Flow::Stop(StopReason::FeedExhausted));
			}
		}
		state.processed += 1;

		let metric = snapshot.metric_text.as_deref().map(parse_metric);
		let value = match (metric, self.unreadable) {
			(Some(Metric::Exact(value)), _) => value,
			(Some(Metric::Degraded(value)), UnreadableMetric::Fallback) => {
				debug!(target = "fleet.traversal", text = ?snapshot.metric_text, value, "using degraded metric");
				value
			}
			(Some(Metric::Degraded(_)), UnreadableMetric::Skip) => {
				return Ok(Flow::Recover(format!("unreadable metric {:?}", snapshot.metric_text)));
			}
			(None, _) => return Ok(Flow::Recover("metric element not found".into())),
		};

		if value < threshold {
			debug!(target = "fleet.traversal", fingerprint = %snapshot.fingerprint, value, threshold, "below threshold");
			if !self.action.apply(ui, token).await? {
				return Ok(Flow::Recover(format!("{} action found no usable element", self.action.name())));
			}
			state.acted_on += 1;
			state.consecutive_errors = 0;
			pause(token, ms(self.timings.action_settle_ms)).await?;

			let next = Fingerprinter::new(&self.feed).capture(ui, token).await?;
			if next.fingerprint.is_ephemeral() {
				info!(target = "fleet.traversal", "no content left after action");
				return Ok(Flow::Stop(StopReason::FeedExhausted));
			}
			state.carried = Some(next);
			return Ok(Flow::Continue);
		}

		self.advance(ui, token).await?;
		let next = fingerprinter.capture(ui, token).await?;
		if next.fingerprint == snapshot.fingerprint {
			info!(target = "fleet.traversal", fingerprint = %snapshot.fingerprint, "advance did not change item");
			return Ok(Flow::Stop(StopReason::FeedExhausted));
		}
		state.consecutive_errors = 0;
		state.carried = Some(next);
		Ok(Flow::Continue)
	}

	/// Swipes to the next item and waits for it to settle.
	async fn advance(&self, ui: &dyn UiSession, token: &CancellationToken) -> Result<()> {
		let size = guarded(token, ui.window_size()).await?;
		guarded(token, ui.perform(&Gesture::swipe_up(size, self.timings.swipe_ms))).await?;
		pause(token, ms(self.timings.swipe_settle_ms)).await?;
		Ok(())
	}
}
