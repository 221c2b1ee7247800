//! First pass: which shift layers are held this tick.

use crate::mapping::action::Action;
use crate::mapping::snapshot::InputSnapshot;
use crate::mapping::types::{ButtonId, ShiftSlot};
use std::collections::BTreeMap;
use tracing::trace;

pub struct ShiftResolver;

impl ShiftResolver {
    /// ORs together the slots of every Shift action on a pressed button.
    ///
    /// Shift actions on released buttons are reset to `Stopped` so their
    /// state reflects the current tick.
    pub fn resolve(
        input: &InputSnapshot,
        button_layout: &mut BTreeMap<ButtonId, Vec<Action>>,
    ) -> ShiftSlot {
        let mut mask = ShiftSlot::NONE;

        for (button, actions) in button_layout.iter_mut() {
            let pressed = input.is_pressed(*button);
            for action in actions.iter_mut().filter(|action| action.is_shift()) {
                if action.execute_shift(pressed) {
                    trace!("Shift {:#06b} held via {}", action.shift_slot.0, button);
                    mask |= action.shift_slot;
                }
            }
        }

        mask
    }
}
