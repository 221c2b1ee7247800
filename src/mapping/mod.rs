//! Controller remapping.
//!
//! A [`Layout`] describes what every button, axis and gyro slot does. The
//! [`LayoutManager`] evaluates the active layout once per input snapshot in
//! two passes: shift layers are resolved first, then buttons, axes and gyro
//! are mapped under the resulting mask. Buttons and axes end up in an
//! [`OutputSnapshot`]; keyboard and mouse actions produce [`EmitterRequest`]s
//! instead.

pub mod action;
pub mod axis;
pub mod dispatcher;
pub mod emitter;
pub mod engine;
pub mod error;
pub mod gyro;
pub mod layout;
pub mod manager;
pub mod output;
pub mod press;
pub mod shift;
pub mod snapshot;
pub mod state;
pub mod types;

pub use action::{Action, ActionKind};
pub use emitter::{ChannelEmitter, Emitter, EmitterRequest, NullEmitter};
pub use engine::{MappingEngine, MappingEngineHandle, MappingEngineState};
pub use error::MappingError;
pub use layout::Layout;
pub use manager::LayoutManager;
pub use snapshot::{GyroState, InputSnapshot, OutputSnapshot};
pub use state::ActionState;
pub use types::{AxisComponent, AxisSlot, ButtonId, Rotation, ShiftSlot};
