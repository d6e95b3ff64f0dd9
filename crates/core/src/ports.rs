//! Process-wide system port assignment.
//!
//! Every session key gets a unique port drawn from a monotonic counter. The
//! same key always maps to the same port, so re-entrant callers for one device
//! never collide with themselves.

use std::collections::HashMap;

use parking_lot::Mutex;
use tracing::debug;

use crate::error::{FleetError, Result};

#[derive(Debug)]
struct PortTable {
	/// `None` once `u16::MAX` has been handed out.
	next: Option<u16>,
	assigned: HashMap<String, u16>,
}

/// Hands out system ports counting up from a fixed base. Shared across all device workers.
#[derive(Debug)]
pub struct PortAllocator {
	base: u16,
	table: Mutex<PortTable>,
}

impl PortAllocator {
	pub fn new(base: u16) -> Self {
		Self {
			base,
			table: Mutex::new(PortTable {
				next: Some(base),
				assigned: HashMap::new(),
			}),
		}
	}

	pub fn base(&self) -> u16 {
		self.base
	}

	/// Returns the port for `key`, assigning the next free one on first sight.
	pub fn port_for(&self, key: &str) -> Result<u16> {
		let mut table = self.table.lock();
		if let Some(port) = table.assigned.get(key) {
			return Ok(*port);
		}

		let port = table
			.next
			.ok_or_else(|| FleetError::Config(format!("system port range from {} exhausted", self.base)))?;
		table.next = port.checked_add(1);
		table.assigned.insert(key.to_string(), port);
		debug!(target = "fleet.session", key, port, "assigned system port");
		Ok(port)
	}

	/// Snapshot of every assignment made so far.
	pub fn assigned(&self) -> HashMap<String, u16> {
		self.table.lock().assigned.clone()
	}
}
