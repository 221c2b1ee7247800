//! Axis pass: sticks, triggers and pads.
//!
//! Joystick and trigger actions add their delta to the destination slot's
//! accumulator. Nothing is clamped here; the caller commits the accumulator
//! once every contribution of the tick is in.

use crate::mapping::action::{Action, ActionKind};
use crate::mapping::output::TickFrame;
use crate::mapping::snapshot::InputSnapshot;
use crate::mapping::state::ActionState;
use crate::mapping::types::{AxisSlot, ButtonId, ShiftSlot, Vector2};
use std::collections::{BTreeMap, HashMap};
use tracing::trace;

pub struct AxisComposer;

impl AxisComposer {
    pub fn compose(
        input: &InputSnapshot,
        axis_layout: &mut BTreeMap<AxisSlot, Action>,
        shift_mask: ShiftSlot,
        touch_buttons: &HashMap<AxisSlot, ButtonId>,
        frame: &mut TickFrame<'_>,
    ) {
        for (slot, action) in axis_layout.iter_mut() {
            if !action.shift_slot.is_open_under(shift_mask) {
                if let Some(request) = action.release_outputs() {
                    frame.request(request);
                }
                continue;
            }

            let v = input.vector(*slot);
            let touched = touch_buttons
                .get(slot)
                .map(|button| input.is_pressed(*button))
                .unwrap_or(true);
            let rotation = action.rotation();

            match &mut action.kind {
                ActionKind::Joystick(joystick) => {
                    let delta = joystick.transform(v, rotation);
                    trace!("{} -> {}: {:?}", slot, joystick.target, delta);
                    frame.add_vector(joystick.target, delta);
                    action.state = running_if(!delta.is_zero());
                }
                ActionKind::Trigger(trigger) => {
                    let value = trigger.transform(v.x);
                    trace!("{} -> {}: {}", slot, trigger.target, value);
                    frame.add_vector(trigger.target, Vector2::new(value, 0));
                    action.state = running_if(value != 0);
                }
                ActionKind::Mouse(mouse) if mouse.action_type.is_analog() => {
                    if !touched {
                        mouse.remainder = (0.0, 0.0);
                        action.state = ActionState::Stopped;
                        continue;
                    }
                    let moved = mouse.update_motion(rotation.apply(v), frame);
                    action.state = running_if(moved);
                }
                ActionKind::Shift
                | ActionKind::Button(_)
                | ActionKind::Keyboard(_)
                | ActionKind::Mouse(_) => {
                    let v = rotation.apply(v);
                    let pressed = action
                        .motion
                        .map(|motion| touched && motion.engaged(v))
                        .unwrap_or(false);
                    action.execute_digital(pressed, frame);
                }
            }
        }
    }
}

fn running_if(active: bool) -> ActionState {
    if active {
        ActionState::Running
    } else {
        ActionState::Stopped
    }
}
