//! UI automation capability contract.
//!
//! The automation server is treated as an opaque capability: open a session,
//! find elements, read text, click, perform gestures, read geometry.

use async_trait::async_trait;
use fleet_protocol::{ElementHandle, Gesture, Lookup, Rect, Selector, SessionOptions, WindowSize};

use crate::error::Result;

/// Opens remote-control sessions against devices.
#[async_trait]
pub trait SessionOpener: Send + Sync {
	async fn open(&self, options: &SessionOptions) -> Result<Box<dyn UiSession>>;
}

/// A live remote-control session bound to one device.
///
/// Element absence is reported as [`Lookup::NotFound`]; `Err` is reserved for
/// transport and protocol faults.
#[async_trait]
pub trait UiSession: Send + Sync {
	/// Server-assigned session identifier.
	fn id(&self) -> &str;

	async fn find(&self, selector: &Selector) -> Result<Lookup>;

	/// Finds `selector` scoped to the subtree rooted at `parent`.
	async fn find_within(&self, parent: &ElementHandle, selector: &Selector) -> Result<Lookup>;

	async fn text(&self, element: &ElementHandle) -> Result<String>;

	async fn click(&self, element: &ElementHandle) -> Result<()>;

	async fn is_displayed(&self, element: &ElementHandle) -> Result<bool>;

	async fn rect(&self, element: &ElementHandle) -> Result<Rect>;

	async fn perform(&self, gesture: &Gesture) -> Result<()>;

	async fn window_size(&self) -> Result<WindowSize>;

	/// Package that currently owns the foreground.
	async fn current_package(&self) -> Result<String>;

	/// Opens `url` through the device's view intent.
	async fn navigate(&self, url: &str) -> Result<()>;

	/// Ends the remote session.
	async fn quit(&self) -> Result<()>;
}
