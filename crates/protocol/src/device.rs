//! Device identity and transport classification.

use std::fmt;

use serde::{Deserialize, Serialize};

/// How a device is attached to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
	/// Attached over USB; identified by a bare serial.
	Usb,
	/// Attached over TCP/IP; identified by `host:port`.
	Network,
}

impl fmt::Display for Transport {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Transport::Usb => f.write_str("USB"),
			Transport::Network => f.write_str("network"),
		}
	}
}

/// Opaque identifier of one controllable device, as reported by enumeration.
///
/// Identities are immutable once enumerated. Network-attached devices use the
/// `host:port` form; anything without a colon is treated as USB-attached.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
	pub fn new(id: impl Into<String>) -> Self {
		Self(id.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}

	/// Classifies the transport from the identity shape.
	pub fn transport(&self) -> Transport {
		if self.0.contains(':') { Transport::Network } else { Transport::Usb }
	}

	pub fn is_usb(&self) -> bool {
		self.transport() == Transport::Usb
	}
}

impl fmt::Display for DeviceId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for DeviceId {
	fn from(value: &str) -> Self {
		Self::new(value)
	}
}

impl From<String> for DeviceId {
	fn from(value: String) -> Self {
		Self(value)
	}
}

impl AsRef<str> for DeviceId {
	fn as_ref(&self) -> &str {
		&self.0
	}
}
