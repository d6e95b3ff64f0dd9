//! Repeat detection over the sequence of visited fingerprints.

use std::collections::HashSet;

use super::fingerprint::Fingerprint;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
	/// Not seen before.
	Fresh,
	/// Seen before; carries the consecutive repeat count.
	Repeat(u32),
	/// Consecutive repeats reached the tolerance.
	Exhausted,
}

#[derive(Debug)]
pub struct LoopGuard {
	seen: HashSet<Fingerprint>,
	last: Option<Fingerprint>,
	repeats: u32,
	tolerance: u32,
}

impl LoopGuard {
	pub fn new(tolerance: u32) -> Self {
		Self {
			seen: HashSet::new(),
			last: None,
			repeats: 0,
			tolerance: tolerance.max(1),
		}
	}

	pub fn observe(&mut self, fingerprint: &Fingerprint) -> Verdict {
		let repeated = self.last.as_ref() == Some(fingerprint) || self.seen.contains(fingerprint);
		self.last = Some(fingerprint.clone());

		if !repeated {
			self.seen.insert(fingerprint.clone());
			self.repeats = 0;
			return Verdict::Fresh;
		}

		self.repeats += 1;
		if self.repeats >= self.tolerance { Verdict::Exhausted } else { Verdict::Repeat(self.repeats) }
	}

	/// Distinct fingerprints observed.
	pub fn distinct(&self) -> usize {
		self.seen.len()
	}

	pub fn last(&self) -> Option<&Fingerprint> {
		self.last.as_ref()
	}
}
