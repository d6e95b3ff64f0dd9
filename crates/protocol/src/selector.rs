//! Element selectors understood by the automation server.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Location strategy, mirroring the W3C/Appium `using` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Strategy {
	XPath,
	Id,
	AccessibilityId,
	UiAutomator,
}

impl Strategy {
	/// Wire value for the `using` field of a find-element request.
	pub fn as_wire(&self) -> &'static str {
		match self {
			Strategy::XPath => "xpath",
			Strategy::Id => "id",
			Strategy::AccessibilityId => "accessibility id",
			Strategy::UiAutomator => "-android uiautomator",
		}
	}
}

/// A single element query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Selector {
	pub strategy: Strategy,
	pub value: String,
}

impl Selector {
	pub fn xpath(value: impl Into<String>) -> Self {
		Self {
			strategy: Strategy::XPath,
			value: value.into(),
		}
	}

	pub fn id(value: impl Into<String>) -> Self {
		Self {
			strategy: Strategy::Id,
			value: value.into(),
		}
	}

	pub fn accessibility_id(value: impl Into<String>) -> Self {
		Self {
			strategy: Strategy::AccessibilityId,
			value: value.into(),
		}
	}
}

impl fmt::Display for Selector {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}={}", self.strategy.as_wire(), self.value)
	}
}

/// Server-side reference to a located element.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementHandle(pub String);

/// Result of an element query. Absence is an expected outcome, not a fault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
	Found(ElementHandle),
	NotFound,
}

impl Lookup {
	pub fn found(self) -> Option<ElementHandle> {
		match self {
			Lookup::Found(handle) => Some(handle),
			Lookup::NotFound => None,
		}
	}

	pub fn is_found(&self) -> bool {
		matches!(self, Lookup::Found(_))
	}
}
