//! Screen geometry and touch gestures.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
	pub x: i32,
	pub y: i32,
}

impl Point {
	pub const fn new(x: i32, y: i32) -> Self {
		Self { x, y }
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSize {
	pub width: i32,
	pub height: i32,
}

/// Element bounds as reported by the automation server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
	pub x: i32,
	pub y: i32,
	pub width: i32,
	pub height: i32,
}

/// A single-finger touch: press at `from`, move to `to` over `duration_ms`, release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Gesture {
	pub from: Point,
	pub to: Point,
	pub duration_ms: u64,
}

impl Gesture {
	pub const fn swipe(from: Point, to: Point, duration_ms: u64) -> Self {
		Self { from, to, duration_ms }
	}

	/// Vertical swipe from 80% to 20% of the screen height, centered horizontally.
	pub fn swipe_up(size: WindowSize, duration_ms: u64) -> Self {
		let x = size.width / 2;
		Self::swipe(Point::new(x, size.height * 8 / 10), Point::new(x, size.height * 2 / 10), duration_ms)
	}

	/// Vertical swipe from 30% to 70% of the screen height, used to refresh.
	pub fn swipe_down(size: WindowSize, duration_ms: u64) -> Self {
		let x = size.width / 2;
		Self::swipe(Point::new(x, size.height * 3 / 10), Point::new(x, size.height * 7 / 10), duration_ms)
	}

	/// Returns `true` when the finger travels upward (content scrolls forward).
	pub fn is_upward(&self) -> bool {
		self.to.y < self.from.y
	}

	/// Returns `true` when the finger travels mostly horizontally.
	pub fn is_horizontal(&self) -> bool {
		(self.to.x - self.from.x).abs() > (self.to.y - self.from.y).abs()
	}
}
