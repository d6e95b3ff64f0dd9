//! Capability layer between fleet orchestration and the outside world.
//!
//! Everything here either executes a host process (the device bridge, local
//! port release) or talks to the automation server. The orchestration layer
//! only sees the [`DeviceBridge`], [`SessionOpener`] and [`UiSession`] traits,
//! so tests can substitute in-memory doubles.

pub mod automation;
pub mod bridge;
pub mod cancel;
pub mod error;
pub mod process;
pub mod shell;
pub mod webdriver;

pub use automation::{SessionOpener, UiSession};
pub use bridge::{AdbBridge, DeviceBridge, parse_devices};
pub use cancel::{guarded, pause};
pub use error::{Result, RuntimeError};
pub use shell::{CommandOutput, CommandRunner, ProcessRunner};
pub use tokio_util::sync::CancellationToken;
pub use webdriver::{WebDriverOpener, WebDriverSession};
