//! Controller subsystem for gamepad input handling
//!
//! 1. [`event_collector`] - gilrs polling into a running input snapshot
//! 2. [`controller_handle`] - settings validation and lifecycle
//!
//! # Architecture
//!
//! ```text
//! Gamepad ──► Collector ──► InputSnapshot (every poll_interval_ms)
//! ```

pub mod controller_handle;
pub mod event_collector;

pub use controller_handle::{ControllerError, ControllerHandle};
