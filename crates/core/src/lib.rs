//! Device fleet orchestration.
//!
//! Connects to every attached device through a gated, retrying session
//! negotiation and runs a workflow on each one in parallel: a sequential
//! traversal of the device's own content feed, or a follow run over a target
//! list. Device-level failures stay local to their worker and are reported per
//! device.

pub mod config;
pub mod error;
pub mod fleet;
pub mod follow;
pub mod foreground;
pub mod maintenance;
pub mod negotiator;
pub mod ports;
pub mod session;
pub mod targets;
pub mod traversal;
pub mod ui;
pub mod validator;

pub use config::{FleetConfig, RetryPolicy, Timings, TraversalBudget, UnreadableMetric, UsbReset};
pub use error::{ConnectionFailure, FleetError, Result};
pub use fleet::{DeviceWorkflow, Fleet, FleetReport, SweepWorkflow};
pub use follow::{FollowOutcome, FollowWorkflow};
pub use foreground::{ForegroundControl, ForegroundState};
pub use negotiator::{AttemptRecord, Remediation, remediation_for};
pub use ports::PortAllocator;
pub use session::{DeviceServices, DeviceSessionManager, Session, SessionState, Teardowns};
pub use targets::{load_targets, parse_targets};
pub use traversal::{DeleteAction, ItemAction, TraversalEngine};
pub use validator::{Check, DeviceValidator};
