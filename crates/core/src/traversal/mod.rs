//! Sequential content traversal.
//!
//! Walks a vertically paged feed one item at a time, identifies each item by a
//! fingerprint of its visible signals, and applies an action to items whose
//! metric falls below a threshold. Stops on budget exhaustion or when the feed
//! stops yielding new items.

mod actions;
mod engine;
mod entry;
mod fingerprint;
mod guard;
mod metric;

pub use actions::{DeleteAction, ItemAction};
pub use engine::TraversalEngine;
pub use entry::enter_feed;
pub use fingerprint::{Fingerprint, Fingerprinter, Snapshot};
pub use guard::{LoopGuard, Verdict};
pub use metric::{Metric, parse_metric};
