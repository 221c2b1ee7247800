//! Action state machine and the interruption rules shared by every action kind.
//!
//! ```text
//!            press                threshold
//! Stopped ──────────► Running ───────────────► Succeed
//!    ▲                  │  │                      │
//!    │     release      │  │ early release        │ release
//!    ├──────────────────┘  ▼                      │
//!    │                  Aborted ──(next sibling)──┼──► Forced ──► Running
//!    └────────────────────────────────────────────┘
//!
//! any sibling Running ──► Suspended ──(release)──► Stopped
//! ```

use crate::mapping::action::Action;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use tracing::trace;

/// Execution state of a single action. Persists across ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ActionState {
    Running,
    Suspended,
    #[default]
    Stopped,
    Aborted,
    Forced,
    Succeed,
}

impl Display for ActionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Applies the interruption rule for the action at `index`, which has just
/// executed, to its siblings on the same button.
///
/// Only siblings sharing the executed action's shift slot are touched, and the
/// rule runs once; states changed here are not re-examined in this pass.
pub fn apply_transition(actions: &mut [Action], index: usize) {
    let Some(current) = actions.get(index) else {
        return;
    };
    let state = current.state;
    let slot = current.shift_slot;

    let target = match state {
        ActionState::Running => ActionState::Suspended,
        ActionState::Stopped | ActionState::Aborted => ActionState::Stopped,
        _ => return,
    };

    for (i, sibling) in actions.iter_mut().enumerate() {
        if i == index || sibling.shift_slot != slot || !sibling.interruptable {
            continue;
        }
        if sibling.state == ActionState::Succeed || sibling.state == target {
            continue;
        }
        trace!(
            "Sibling {} of {:?}: {} -> {}",
            i,
            state,
            sibling.state,
            target
        );
        sibling.state = target;
    }

    if state == ActionState::Aborted {
        let next = actions
            .iter_mut()
            .enumerate()
            .skip(index + 1)
            .find(|(_, sibling)| sibling.shift_slot == slot && sibling.interruptable);

        if let Some((i, sibling)) = next {
            if sibling.state != ActionState::Succeed {
                trace!("Cascading abort of action {} into action {}", index, i);
                sibling.state = ActionState::Forced;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::action::Action;
    use crate::mapping::types::{ButtonId, ShiftSlot};

    fn sequence(n: usize) -> Vec<Action> {
        (0..n)
            .map(|_| Action::button(ButtonId::A).interruptable(true))
            .collect()
    }

    #[test]
    fn test_running_suspends_siblings() {
        let mut actions = sequence(3);
        actions[1].state = ActionState::Running;
        apply_transition(&mut actions, 1);

        assert_eq!(actions[0].state, ActionState::Suspended);
        assert_eq!(actions[1].state, ActionState::Running);
        assert_eq!(actions[2].state, ActionState::Suspended);
    }

    #[test]
    fn test_abort_cascades_to_next_sibling_only() {
        let mut actions = sequence(3);
        actions[0].state = ActionState::Aborted;
        apply_transition(&mut actions, 0);

        assert_eq!(actions[0].state, ActionState::Aborted);
        assert_eq!(actions[1].state, ActionState::Forced);
        assert_eq!(actions[2].state, ActionState::Stopped);
    }

    #[test]
    fn test_succeed_is_never_interrupted() {
        let mut actions = sequence(2);
        actions[1].state = ActionState::Succeed;
        actions[0].state = ActionState::Running;
        apply_transition(&mut actions, 0);
        assert_eq!(actions[1].state, ActionState::Succeed);

        actions[0].state = ActionState::Aborted;
        apply_transition(&mut actions, 0);
        assert_eq!(actions[1].state, ActionState::Succeed);
    }

    #[test]
    fn test_other_slots_and_uninterruptable_are_untouched() {
        let mut actions = vec![
            Action::button(ButtonId::A).interruptable(true),
            Action::button(ButtonId::B)
                .interruptable(true)
                .on_shift(ShiftSlot::A),
            Action::button(ButtonId::X).interruptable(false),
        ];
        actions[0].state = ActionState::Running;
        apply_transition(&mut actions, 0);

        assert_eq!(actions[1].state, ActionState::Stopped);
        assert_eq!(actions[2].state, ActionState::Stopped);

        actions[2].state = ActionState::Running;
        actions[0].state = ActionState::Aborted;
        apply_transition(&mut actions, 0);
        assert_eq!(actions[2].state, ActionState::Running);
    }

    #[test]
    fn test_cascade_skips_other_slots() {
        let mut actions = vec![
            Action::button(ButtonId::A).interruptable(true),
            Action::button(ButtonId::B)
                .interruptable(true)
                .on_shift(ShiftSlot::B),
            Action::button(ButtonId::X).interruptable(true),
        ];
        actions[0].state = ActionState::Aborted;
        apply_transition(&mut actions, 0);

        assert_eq!(actions[1].state, ActionState::Stopped);
        assert_eq!(actions[2].state, ActionState::Forced);
    }
}
