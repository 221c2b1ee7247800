//! Gyro to stick/pointer mapping.
//!
//! Gyro output is blended with whatever the axis pass already wrote to the
//! destination stick: the further the physical stick is deflected, the less
//! the gyro contributes.

use crate::mapping::action::{Action, ActionKind};
use crate::mapping::output::TickFrame;
use crate::mapping::snapshot::InputSnapshot;
use crate::mapping::state::ActionState;
use crate::mapping::types::{AxisSlot, ButtonId, ShiftSlot, Vec3, Vector2, AXIS_MAX};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::trace;

/// Angular rate that maps to full deflection at sensitivity 1.
pub const GYRO_FULL_SCALE_DPS: f32 = 250.0;

/// Which rotation drives the horizontal output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum GyroAxis {
    #[default]
    Yaw,
    Roll,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GyroConfig {
    pub horizontal: GyroAxis,
    pub sensitivity: f32,
    pub invert_x: bool,
    pub invert_y: bool,
    /// Blend weight at a centred stick; reaches zero at full deflection when 1.
    pub gyro_weight: f32,
}

impl Default for GyroConfig {
    fn default() -> Self {
        Self {
            horizontal: GyroAxis::Yaw,
            sensitivity: 1.0,
            invert_x: false,
            invert_y: false,
            gyro_weight: 1.0,
        }
    }
}

impl GyroConfig {
    /// Converts angular rates into a stick-space vector.
    pub fn to_vector(&self, gyroscope: Vec3) -> Vector2 {
        let g = gyroscope.sanitized();
        let horizontal = match self.horizontal {
            GyroAxis::Yaw => g.y,
            GyroAxis::Roll => g.z,
        };
        let scale = AXIS_MAX as f32 / GYRO_FULL_SCALE_DPS * self.sensitivity;
        // turning left is a positive rate but a negative stick
        let mut x = -horizontal * scale;
        let mut y = g.x * scale;
        if self.invert_x {
            x = -x;
        }
        if self.invert_y {
            y = -y;
        }
        if !x.is_finite() || !y.is_finite() {
            return Vector2::ZERO;
        }
        Vector2::new(x.round() as i32, y.round() as i32).clamped()
    }
}

/// Blends `candidate` into `existing` using the stick deflection weighting.
pub fn blend_vectors(existing: Vector2, candidate: Vector2, gyro_weight: f32) -> Vector2 {
    let joystick_length = (existing.length() / AXIS_MAX as f32).clamp(0.0, 1.0);
    let weight = (gyro_weight - joystick_length).max(0.0);
    if !weight.is_finite() {
        return existing.clamped();
    }
    let scaled = Vector2::new(
        (candidate.x as f32 * weight).round() as i32,
        (candidate.y as f32 * weight).round() as i32,
    );
    (existing + scaled).clamped()
}

/// Third pass: gyro mappings.
pub struct GyroBlender;

impl GyroBlender {
    pub fn blend(
        input: &InputSnapshot,
        gyro_layout: &mut BTreeMap<AxisSlot, Action>,
        shift_mask: ShiftSlot,
        touch_buttons: &HashMap<AxisSlot, ButtonId>,
        frame: &mut TickFrame<'_>,
    ) {
        for (slot, action) in gyro_layout.iter_mut() {
            if !action.shift_slot.is_open_under(shift_mask) {
                if let Some(request) = action.release_outputs() {
                    frame.request(request);
                }
                continue;
            }

            let touched = touch_buttons
                .get(slot)
                .map(|button| input.is_pressed(*button))
                .unwrap_or(true);
            let rotation = action.rotation();

            match &mut action.kind {
                ActionKind::Joystick(joystick) => {
                    if !touched {
                        action.state = ActionState::Stopped;
                        continue;
                    }
                    let candidate = rotation.apply(joystick.gyro.to_vector(input.gyro.gyroscope));
                    let existing = frame.output_vector(joystick.target);
                    let blended = blend_vectors(existing, candidate, joystick.gyro.gyro_weight);
                    trace!(
                        "Gyro {} -> {}: existing={:?} candidate={:?} blended={:?}",
                        slot,
                        joystick.target,
                        existing,
                        candidate,
                        blended
                    );
                    frame.write_vector(joystick.target, blended);
                    frame.consume_gyro();
                    action.state = ActionState::Running;
                }
                ActionKind::Mouse(mouse) if mouse.action_type.is_analog() => {
                    if !touched {
                        mouse.remainder = (0.0, 0.0);
                        action.state = ActionState::Stopped;
                        continue;
                    }
                    let candidate = rotation.apply(mouse.gyro.to_vector(input.gyro.gyroscope));
                    mouse.update_motion(candidate, frame);
                    frame.consume_gyro();
                    action.state = ActionState::Running;
                }
                ActionKind::Shift
                | ActionKind::Button(_)
                | ActionKind::Keyboard(_)
                | ActionKind::Mouse(_)
                | ActionKind::Trigger(_) => {
                    // digital actions on the gyro fire on motion past their threshold
                    let candidate = GyroConfig::default().to_vector(input.gyro.gyroscope);
                    let pressed = action
                        .motion
                        .map(|motion| touched && motion.engaged(candidate))
                        .unwrap_or(false);
                    action.execute_digital(pressed, frame);
                }
            }
        }
    }
}
