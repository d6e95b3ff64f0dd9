//! Data types shared across the device fleet.
//!
//! This crate contains the serde-serializable shapes exchanged between the
//! runtime layer (device bridge, automation-server client) and the
//! orchestration layer (session management, feed traversal).
//!
//! # Design Philosophy
//!
//! Types in this crate are:
//! * Pure data: No behavior beyond classification, rendering, and serialization
//! * Transport-agnostic: No process execution or I/O
//! * Stable: Changes only when an outcome or option shape changes
//!
//! Higher-level orchestration is built on top of these types in `fleet-rs`.

pub mod device;
pub mod gesture;
pub mod options;
pub mod report;
pub mod selector;

pub use device::*;
pub use gesture::*;
pub use options::*;
pub use report::*;
pub use selector::*;
