//! Mapping actions: a closed set of kinds sharing common gating fields and a
//! per-instance [`ActionState`].
//!
//! Kind-specific behaviour lives on the payload structs; the shift resolver,
//! dispatcher, axis composer and gyro blender match on [`ActionKind`]
//! exhaustively to decide which of them applies.

use crate::mapping::emitter::{EmitterRequest, MouseButton};
use crate::mapping::gyro::GyroConfig;
use crate::mapping::output::TickFrame;
use crate::mapping::press::{PressConfig, PressTracker, PressType};
use crate::mapping::state::ActionState;
use crate::mapping::types::{AxisSlot, ButtonId, Rotation, ShiftSlot, Vector2, AXIS_MAX};
use egui::{Key, Modifiers};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use tracing::trace;

/// Pointer speed in pixels per tick at full deflection and sensitivity 1.
pub const MOUSE_SPEED: f32 = 20.0;
/// Scroll speed in steps per tick at full deflection and sensitivity 1.
pub const SCROLL_SPEED: f32 = 0.5;

/// Directions of an axis that count as "pressed" for digital actions, or the
/// direction a button-driven joystick deflects towards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionDirection {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
}

impl MotionDirection {
    pub const UP: MotionDirection = MotionDirection {
        up: true,
        down: false,
        left: false,
        right: false,
    };
    pub const DOWN: MotionDirection = MotionDirection {
        up: false,
        down: true,
        left: false,
        right: false,
    };
    pub const LEFT: MotionDirection = MotionDirection {
        up: false,
        down: false,
        left: true,
        right: false,
    };
    pub const RIGHT: MotionDirection = MotionDirection {
        up: false,
        down: false,
        left: false,
        right: true,
    };

    /// Whether `v` exceeds `threshold` in any selected direction. Trigger
    /// values live on x, so `right` selects a pulled trigger.
    pub fn engaged(&self, v: Vector2, threshold: i32) -> bool {
        (self.up && v.y > threshold)
            || (self.down && v.y < -threshold)
            || (self.right && v.x > threshold)
            || (self.left && v.x < -threshold)
    }

    /// Full deflection towards the selected directions.
    pub fn deflection(&self) -> Vector2 {
        let mut v = Vector2::ZERO;
        if self.right {
            v.x += AXIS_MAX;
        }
        if self.left {
            v.x -= AXIS_MAX;
        }
        if self.up {
            v.y += AXIS_MAX;
        }
        if self.down {
            v.y -= AXIS_MAX;
        }
        v
    }
}

/// Turns an analog axis into a digital press.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionTrigger {
    pub direction: MotionDirection,
    pub threshold: i32,
}

impl Default for MotionTrigger {
    fn default() -> Self {
        Self {
            direction: MotionDirection::default(),
            threshold: AXIS_MAX / 2,
        }
    }
}

impl MotionTrigger {
    pub fn new(direction: MotionDirection, threshold: i32) -> Self {
        Self {
            direction,
            threshold,
        }
    }

    /// Half-deflection trigger towards `direction`.
    pub fn default_for(direction: MotionDirection) -> Self {
        Self {
            direction,
            ..Default::default()
        }
    }

    pub fn engaged(&self, v: Vector2) -> bool {
        self.direction.engaged(v, self.threshold)
    }
}

/// Radial (sticks) or linear (triggers) response curve. All values are
/// percentages; the default is the identity.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AxisCurve {
    pub inner_deadzone: f32,
    pub outer_deadzone: f32,
    pub anti_deadzone: f32,
    pub improve_circularity: bool,
}

impl AxisCurve {
    pub fn is_identity(&self) -> bool {
        self.inner_deadzone <= 0.0
            && self.outer_deadzone <= 0.0
            && self.anti_deadzone <= 0.0
            && !self.improve_circularity
    }

    /// Remaps a normalised magnitude, `None` inside the inner deadzone.
    fn remap(&self, magnitude: f32) -> Option<f32> {
        let inner = (self.inner_deadzone / 100.0).clamp(0.0, 1.0);
        let outer = 1.0 - (self.outer_deadzone / 100.0).clamp(0.0, 1.0);
        if magnitude <= inner {
            return None;
        }
        let span = (outer - inner).max(f32::EPSILON);
        let mut scaled = (magnitude - inner) / span;
        if outer < 1.0 || self.improve_circularity {
            scaled = scaled.min(1.0);
        }
        let anti = (self.anti_deadzone / 100.0).clamp(0.0, 1.0);
        Some(anti + (1.0 - anti) * scaled)
    }

    pub fn apply_radial(&self, v: Vector2) -> Vector2 {
        if self.is_identity() || v.is_zero() {
            return v;
        }
        let magnitude = v.length() / AXIS_MAX as f32;
        match self.remap(magnitude) {
            Some(scaled) => {
                let factor = scaled / magnitude;
                Vector2::new(
                    (v.x as f32 * factor).round() as i32,
                    (v.y as f32 * factor).round() as i32,
                )
            }
            None => Vector2::ZERO,
        }
    }

    pub fn apply_linear(&self, value: i32) -> i32 {
        if self.is_identity() || value == 0 {
            return value;
        }
        let magnitude = value.unsigned_abs() as f32 / AXIS_MAX as f32;
        match self.remap(magnitude) {
            Some(scaled) => (scaled * AXIS_MAX as f32).round() as i32 * value.signum(),
            None => 0,
        }
    }
}

/// Presses a virtual controller button.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ButtonAction {
    pub target: ButtonId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyboardAction {
    pub key: Key,
    #[serde(default)]
    pub modifiers: Modifiers,
    #[serde(skip)]
    pub(crate) emitted: bool,
}

impl KeyboardAction {
    pub fn new(key: Key, modifiers: Modifiers) -> Self {
        Self {
            key,
            modifiers,
            emitted: false,
        }
    }

    /// Emits key down/up on edges of `value`.
    pub fn update(&mut self, value: bool, frame: &mut TickFrame<'_>) {
        if value != self.emitted {
            self.emitted = value;
            frame.request(EmitterRequest::Key {
                key: self.key,
                modifiers: self.modifiers,
                pressed: value,
            });
        }
    }

    pub fn release(&mut self) -> Option<EmitterRequest> {
        if !self.emitted {
            return None;
        }
        self.emitted = false;
        Some(EmitterRequest::Key {
            key: self.key,
            modifiers: self.modifiers,
            pressed: false,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MouseActionType {
    LeftButton,
    RightButton,
    MiddleButton,
    ScrollUp,
    ScrollDown,
    Move,
    Scroll,
}

impl MouseActionType {
    fn button(self) -> Option<MouseButton> {
        match self {
            MouseActionType::LeftButton => Some(MouseButton::Left),
            MouseActionType::RightButton => Some(MouseButton::Right),
            MouseActionType::MiddleButton => Some(MouseButton::Middle),
            _ => None,
        }
    }

    /// Move and Scroll consume vectors; everything else is a click.
    pub fn is_analog(self) -> bool {
        matches!(self, MouseActionType::Move | MouseActionType::Scroll)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MouseAction {
    pub action_type: MouseActionType,
    #[serde(default = "default_gain")]
    pub sensitivity: f32,
    /// Response exponent; 1 is linear.
    #[serde(default = "default_gain")]
    pub acceleration: f32,
    #[serde(default)]
    pub invert_y: bool,
    #[serde(default)]
    pub curve: AxisCurve,
    #[serde(default)]
    pub gyro: GyroConfig,
    #[serde(skip)]
    pub(crate) emitted: bool,
    #[serde(skip)]
    pub(crate) remainder: (f32, f32),
}

fn default_gain() -> f32 {
    1.0
}

impl MouseAction {
    pub fn new(action_type: MouseActionType) -> Self {
        Self {
            action_type,
            sensitivity: 1.0,
            acceleration: 1.0,
            invert_y: false,
            curve: AxisCurve::default(),
            gyro: GyroConfig::default(),
            emitted: false,
            remainder: (0.0, 0.0),
        }
    }

    /// Handles a digital value: clicks on edges, one scroll step per rising edge.
    pub fn update_digital(&mut self, value: bool, frame: &mut TickFrame<'_>) {
        let rising = value && !self.emitted;
        let changed = value != self.emitted;
        self.emitted = value;

        if let Some(button) = self.action_type.button() {
            if changed {
                frame.request(EmitterRequest::MouseButton {
                    button,
                    pressed: value,
                });
            }
            return;
        }
        match self.action_type {
            MouseActionType::ScrollUp if rising => {
                frame.request(EmitterRequest::Scroll { dx: 0, dy: 1 })
            }
            MouseActionType::ScrollDown if rising => {
                frame.request(EmitterRequest::Scroll { dx: 0, dy: -1 })
            }
            _ => {}
        }
    }

    /// Emits pointer or scroll motion proportional to `v`, carrying sub-unit
    /// remainders to the next tick. Returns true if the vector was non-zero.
    pub fn update_motion(&mut self, v: Vector2, frame: &mut TickFrame<'_>) -> bool {
        let v = self.curve.apply_radial(v);
        if v.is_zero() {
            self.remainder = (0.0, 0.0);
            return false;
        }

        let magnitude = (v.length() / AXIS_MAX as f32).min(1.0);
        let exponent = (self.acceleration - 1.0).max(0.0);
        let gain = self.sensitivity * magnitude.powf(exponent);
        let speed = match self.action_type {
            MouseActionType::Scroll => SCROLL_SPEED,
            _ => MOUSE_SPEED,
        };

        let mut dx = v.x as f32 / AXIS_MAX as f32 * speed * gain;
        // stick up is positive, screen up is negative
        let mut dy = -(v.y as f32) / AXIS_MAX as f32 * speed * gain;
        if self.invert_y {
            dy = -dy;
        }
        if !dx.is_finite() || !dy.is_finite() {
            return false;
        }

        dx += self.remainder.0;
        dy += self.remainder.1;
        let (ix, iy) = (dx.trunc(), dy.trunc());
        self.remainder = (dx - ix, dy - iy);

        let (ix, iy) = (ix as i32, iy as i32);
        if ix != 0 || iy != 0 {
            let request = match self.action_type {
                // scroll wheels count up as positive
                MouseActionType::Scroll => EmitterRequest::Scroll {
                    dx: ix,
                    dy: iy.saturating_neg(),
                },
                _ => EmitterRequest::MouseMove { dx: ix, dy: iy },
            };
            frame.request(request);
        }
        true
    }

    pub fn release(&mut self) -> Option<EmitterRequest> {
        self.remainder = (0.0, 0.0);
        if !self.emitted {
            return None;
        }
        self.emitted = false;
        self.action_type
            .button()
            .map(|button| EmitterRequest::MouseButton {
                button,
                pressed: false,
            })
    }
}

/// Writes a stick vector to `target`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoystickAction {
    pub target: AxisSlot,
    #[serde(default)]
    pub curve: AxisCurve,
    #[serde(default)]
    pub invert_x: bool,
    #[serde(default)]
    pub invert_y: bool,
    /// Deflection applied while a button mapped to this action is engaged.
    #[serde(default)]
    pub direction: MotionDirection,
    #[serde(default)]
    pub gyro: GyroConfig,
}

impl JoystickAction {
    pub fn new(target: AxisSlot) -> Self {
        Self {
            target,
            curve: AxisCurve::default(),
            invert_x: false,
            invert_y: false,
            direction: MotionDirection::default(),
            gyro: GyroConfig::default(),
        }
    }

    /// Delta contributed to the target for the input vector `v`.
    pub fn transform(&self, v: Vector2, rotation: Rotation) -> Vector2 {
        let mut out = self.curve.apply_radial(v);
        if self.invert_x {
            out.x = -out.x;
        }
        if self.invert_y {
            out.y = -out.y;
        }
        rotation.apply(out)
    }
}

/// Writes a single trigger value to `target`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerAction {
    pub target: AxisSlot,
    #[serde(default)]
    pub curve: AxisCurve,
}

impl TriggerAction {
    pub fn new(target: AxisSlot) -> Self {
        Self {
            target,
            curve: AxisCurve::default(),
        }
    }

    pub fn transform(&self, value: i32) -> i32 {
        self.curve.apply_linear(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ActionKind {
    Shift,
    Button(ButtonAction),
    Keyboard(KeyboardAction),
    Mouse(MouseAction),
    Joystick(JoystickAction),
    Trigger(TriggerAction),
}

impl ActionKind {
    pub fn name(&self) -> &'static str {
        match self {
            ActionKind::Shift => "Shift",
            ActionKind::Button(_) => "Button",
            ActionKind::Keyboard(_) => "Keyboard",
            ActionKind::Mouse(_) => "Mouse",
            ActionKind::Joystick(_) => "Joystick",
            ActionKind::Trigger(_) => "Trigger",
        }
    }
}

/// One mapping rule. Owned by exactly one layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    pub kind: ActionKind,
    /// Layer this action fires on; for Shift actions, the layer it activates.
    #[serde(default)]
    pub shift_slot: ShiftSlot,
    #[serde(default)]
    pub interruptable: bool,
    #[serde(default)]
    pub auto_rotate: bool,
    #[serde(default)]
    pub press: PressConfig,
    /// Digital activation when mapped to an axis.
    #[serde(default)]
    pub motion: Option<MotionTrigger>,
    #[serde(skip)]
    pub state: ActionState,
    #[serde(skip)]
    pub(crate) tracker: PressTracker,
    #[serde(skip)]
    pub(crate) rotation: Rotation,
}

impl Action {
    pub fn new(kind: ActionKind) -> Self {
        Self {
            kind,
            shift_slot: ShiftSlot::NONE,
            interruptable: false,
            auto_rotate: false,
            press: PressConfig::default(),
            motion: None,
            state: ActionState::default(),
            tracker: PressTracker::default(),
            rotation: Rotation::default(),
        }
    }

    /// Shift action activating `slot` while its button is held.
    pub fn shift(slot: ShiftSlot) -> Self {
        Self {
            shift_slot: slot,
            ..Self::new(ActionKind::Shift)
        }
    }

    pub fn button(target: ButtonId) -> Self {
        Self::new(ActionKind::Button(ButtonAction { target }))
    }

    pub fn keyboard(key: Key, modifiers: Modifiers) -> Self {
        Self::new(ActionKind::Keyboard(KeyboardAction::new(key, modifiers)))
    }

    pub fn mouse(action_type: MouseActionType) -> Self {
        Self::new(ActionKind::Mouse(MouseAction::new(action_type)))
    }

    pub fn joystick(target: AxisSlot) -> Self {
        Self::new(ActionKind::Joystick(JoystickAction::new(target)))
    }

    pub fn trigger(target: AxisSlot) -> Self {
        Self::new(ActionKind::Trigger(TriggerAction::new(target)))
    }

    pub fn on_shift(mut self, slot: ShiftSlot) -> Self {
        self.shift_slot = slot;
        self
    }

    pub fn interruptable(mut self, interruptable: bool) -> Self {
        self.interruptable = interruptable;
        self
    }

    pub fn auto_rotate(mut self, auto_rotate: bool) -> Self {
        self.auto_rotate = auto_rotate;
        self
    }

    pub fn press_type(mut self, press_type: PressType) -> Self {
        self.press.press_type = press_type;
        self
    }

    pub fn with_press(mut self, press: PressConfig) -> Self {
        self.press = press;
        self
    }

    pub fn with_motion(mut self, motion: MotionTrigger) -> Self {
        self.motion = Some(motion);
        self
    }

    pub fn is_shift(&self) -> bool {
        matches!(self.kind, ActionKind::Shift)
    }

    /// Stores the display rotation; ignored unless `auto_rotate` is set.
    pub fn set_orientation(&mut self, rotation: Rotation) {
        self.rotation = if self.auto_rotate {
            rotation
        } else {
            Rotation::Deg0
        };
    }

    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    /// Shift evaluation: the layer is active while the button is held.
    pub fn execute_shift(&mut self, pressed: bool) -> bool {
        self.state = if pressed {
            ActionState::Running
        } else {
            ActionState::Stopped
        };
        pressed
    }

    /// Runs the press logic for a digital input and applies the kind's effect.
    pub fn execute_digital(&mut self, pressed: bool, frame: &mut TickFrame<'_>) {
        let value = self
            .tracker
            .evaluate(&self.press, &mut self.state, pressed, frame.now());
        trace!(
            "{} action: pressed={} value={} state={}",
            self.kind.name(),
            pressed,
            value,
            self.state
        );

        let rotation = self.rotation;
        match &mut self.kind {
            ActionKind::Shift => {}
            ActionKind::Button(button) => frame.press_button(button.target, value),
            ActionKind::Keyboard(keyboard) => keyboard.update(value, frame),
            ActionKind::Mouse(mouse) => mouse.update_digital(value, frame),
            ActionKind::Joystick(joystick) => {
                if value {
                    frame.add_vector(joystick.target, rotation.apply(joystick.direction.deflection()));
                }
            }
            ActionKind::Trigger(trigger) => {
                if value {
                    frame.add_vector(trigger.target, Vector2::new(AXIS_MAX, 0));
                }
            }
        }
    }

    /// Releases held keyboard/mouse outputs without touching `state`.
    pub fn release_outputs(&mut self) -> Option<EmitterRequest> {
        match &mut self.kind {
            ActionKind::Keyboard(keyboard) => keyboard.release(),
            ActionKind::Mouse(mouse) => mouse.release(),
            _ => None,
        }
    }

    /// Releases held outputs and forgets press history, leaving the action
    /// as if it had never been pressed.
    pub fn reset(&mut self) -> Option<EmitterRequest> {
        self.tracker.reset();
        self.state = ActionState::Stopped;
        self.release_outputs()
    }
}

impl Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (slot {:#06b}, {})",
            self.kind.name(),
            self.shift_slot.0,
            self.state
        )
    }
}
