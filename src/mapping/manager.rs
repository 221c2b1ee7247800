//! Owner of the active layout and the per-tick mapping pipeline.
//!
//! One [`LayoutManager`] is created by the composition root and shared by
//! handle between the input loop and whatever applies configuration changes.
//! A single lock covers the whole of [`LayoutManager::map`] and every layout
//! switch, so a tick never observes a half-swapped layout.
//!
//! ```text
//! InputSnapshot ──► ShiftResolver ──► Dispatcher ──► AxisComposer ──► commit ──► GyroBlender
//!                       (mask)            │               │                          │
//!                                         └───────► EmitterRequests ◄────────────────┘
//!                                                         │
//!                                                      Emitter
//! ```

use crate::config::Settings;
use crate::mapping::axis::AxisComposer;
use crate::mapping::dispatcher::Dispatcher;
use crate::mapping::emitter::Emitter;
use crate::mapping::gyro::GyroBlender;
use crate::mapping::layout::Layout;
use crate::mapping::output::OutputStateBuilder;
use crate::mapping::shift::ShiftResolver;
use crate::mapping::snapshot::{InputSnapshot, OutputSnapshot};
use crate::mapping::types::{AxisSlot, ButtonId, Rotation, ShiftSlot};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, trace, warn};

/// Layouts known to the manager and which of them is active.
#[derive(Debug)]
struct Layouts {
    profile: Option<Layout>,
    desktop: Layout,
    /// Passthrough used while no profile is applied
    fallback: Layout,
    desktop_mode: bool,
}

impl Layouts {
    fn active_mut(&mut self) -> &mut Layout {
        if self.desktop_mode {
            return &mut self.desktop;
        }
        match self.profile.as_mut() {
            Some(profile) => profile,
            None => &mut self.fallback,
        }
    }

    fn active(&self) -> &Layout {
        if self.desktop_mode {
            return &self.desktop;
        }
        self.profile.as_ref().unwrap_or(&self.fallback)
    }
}

struct MapperState {
    layouts: Layouts,
    orientation: Rotation,
    builder: OutputStateBuilder,
    emitter: Box<dyn Emitter>,
}

impl MapperState {
    /// Runs one tick and leaves the result in the builder.
    fn tick(&mut self, input: &InputSnapshot, touch_buttons: &HashMap<AxisSlot, ButtonId>) {
        let MapperState {
            layouts,
            builder,
            emitter,
            ..
        } = self;
        let layout = layouts.active_mut();

        let mask = ShiftResolver::resolve(input, &mut layout.button_layout);
        trace!("Tick on {} with shift mask {:#06b}", layout.name, mask.0);

        let mut frame = builder.begin_tick(input);
        Dispatcher::dispatch(input, &mut layout.button_layout, mask, &mut frame);
        AxisComposer::compose(input, &mut layout.axis_layout, mask, touch_buttons, &mut frame);
        frame.commit_axes();
        GyroBlender::blend(input, &mut layout.gyro_layout, mask, touch_buttons, &mut frame);

        emitter.flush();
        for request in builder.drain_requests() {
            emitter.emit(request);
        }
    }

    /// Applies `change` to the layouts, resetting the outgoing active layout
    /// and orienting the incoming one.
    fn switch_layout(&mut self, change: impl FnOnce(&mut Layouts)) {
        let outgoing = self.layouts.active().name.clone();
        for request in self.layouts.active_mut().reset() {
            self.emitter.emit(request);
        }

        change(&mut self.layouts);

        let orientation = self.orientation;
        let incoming = self.layouts.active_mut();
        incoming.apply_orientation(orientation);
        info!("Active layout: {} -> {}", outgoing, incoming.name);
    }
}

/// Explicit context object holding every layout and the mapping state.
pub struct LayoutManager {
    state: Mutex<MapperState>,
    touch_buttons: HashMap<AxisSlot, ButtonId>,
    shift_layers: BTreeMap<String, ShiftSlot>,
}

impl LayoutManager {
    pub fn new(settings: &Settings, emitter: Box<dyn Emitter>) -> Self {
        let mut layouts = Layouts {
            profile: None,
            desktop: Layout::desktop(),
            fallback: Layout::gamepad(),
            desktop_mode: settings.engine.desktop_mode,
        };
        layouts.active_mut().apply_orientation(Rotation::Deg0);
        info!("Layout manager starting with {}", layouts.active().name);

        Self {
            state: Mutex::new(MapperState {
                layouts,
                orientation: Rotation::Deg0,
                builder: OutputStateBuilder::new(),
                emitter,
            }),
            touch_buttons: settings.touch_buttons.clone(),
            shift_layers: settings.shift_layers.clone(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MapperState> {
        self.state.lock().unwrap_or_else(|poisoned| {
            warn!("Layout lock poisoned, recovering state");
            poisoned.into_inner()
        })
    }

    /// Maps one input snapshot and returns a copy of the output.
    pub fn map(&self, input: &InputSnapshot) -> OutputSnapshot {
        let mut state = self.lock();
        state.tick(input, &self.touch_buttons);
        state.builder.output().clone()
    }

    /// Like [`map`](Self::map) but reuses the caller's buffer.
    pub fn map_into(&self, input: &InputSnapshot, output: &mut OutputSnapshot) {
        let mut state = self.lock();
        state.tick(input, &self.touch_buttons);
        output.clone_from(state.builder.output());
    }

    /// Replaces the profile layout.
    pub fn swap_layout(&self, layout: Layout) {
        debug!("Swapping in profile layout {}", layout.name);
        self.lock()
            .switch_layout(|layouts| layouts.profile = Some(layout));
    }

    /// Drops the profile layout; the passthrough layout takes over.
    pub fn discard_profile(&self) {
        self.lock().switch_layout(|layouts| layouts.profile = None);
    }

    pub fn set_desktop_mode(&self, enabled: bool) {
        let mut state = self.lock();
        if state.layouts.desktop_mode == enabled {
            return;
        }
        info!("Desktop mode {}", if enabled { "enabled" } else { "disabled" });
        state.switch_layout(|layouts| layouts.desktop_mode = enabled);
    }

    pub fn orientation_changed(&self, rotation: Rotation) {
        let mut state = self.lock();
        if state.orientation == rotation {
            return;
        }
        info!("Orientation changed: {} -> {}", state.orientation, rotation);
        state.orientation = rotation;
        state.layouts.active_mut().apply_orientation(rotation);
    }

    pub fn active_layout_name(&self) -> String {
        self.lock().layouts.active().name.clone()
    }

    pub fn is_desktop_mode(&self) -> bool {
        self.lock().layouts.desktop_mode
    }

    /// Bit of a named shift layer.
    pub fn shift_layer(&self, name: &str) -> Option<ShiftSlot> {
        self.shift_layers.get(name).copied()
    }
}
