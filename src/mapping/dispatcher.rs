//! Second pass: digital actions mapped to buttons.

use crate::mapping::action::Action;
use crate::mapping::output::TickFrame;
use crate::mapping::snapshot::InputSnapshot;
use crate::mapping::state::apply_transition;
use crate::mapping::types::{ButtonId, ShiftSlot};
use std::collections::BTreeMap;
use tracing::trace;

pub struct Dispatcher;

impl Dispatcher {
    /// Executes every non-shift action of every mapped button, pressed or
    /// released, and applies the sibling interruption rule after each one.
    pub fn dispatch(
        input: &InputSnapshot,
        button_layout: &mut BTreeMap<ButtonId, Vec<Action>>,
        shift_mask: ShiftSlot,
        frame: &mut TickFrame<'_>,
    ) {
        for (button, actions) in button_layout.iter_mut() {
            let pressed = input.is_pressed(*button);

            for index in 0..actions.len() {
                let action = &mut actions[index];
                if action.is_shift() {
                    continue;
                }
                if !action.shift_slot.is_open_under(shift_mask) {
                    if let Some(request) = action.release_outputs() {
                        trace!("Releasing gated action {} on {}", index, button);
                        frame.request(request);
                    }
                    continue;
                }

                action.execute_digital(pressed, frame);
                apply_transition(actions, index);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::emitter::EmitterRequest;
    use crate::mapping::output::OutputStateBuilder;
    use crate::mapping::press::PressType;
    use crate::mapping::shift::ShiftResolver;
    use crate::mapping::snapshot::OutputSnapshot;
    use crate::mapping::state::ActionState;
    use chrono::{DateTime, Duration, Local};
    use egui::{Key, Modifiers};

    fn run(
        input: &InputSnapshot,
        layout: &mut BTreeMap<ButtonId, Vec<Action>>,
        builder: &mut OutputStateBuilder,
    ) -> OutputSnapshot {
        let mask = ShiftResolver::resolve(input, layout);
        let mut frame = builder.begin_tick(input);
        Dispatcher::dispatch(input, layout, mask, &mut frame);
        frame.commit_axes();
        builder.output().clone()
    }

    fn tick(start: DateTime<Local>, ms: i64) -> InputSnapshot {
        InputSnapshot::at(start + Duration::milliseconds(ms))
    }

    #[test]
    fn test_many_to_one_aggregation() {
        let mut layout = BTreeMap::new();
        layout.insert(ButtonId::A, vec![Action::button(ButtonId::X)]);
        layout.insert(ButtonId::B, vec![Action::button(ButtonId::X)]);
        let mut builder = OutputStateBuilder::new();

        for (a, b) in [(false, false), (true, false), (false, true), (true, true)] {
            let input = InputSnapshot::default()
                .with_button(ButtonId::A, a)
                .with_button(ButtonId::B, b);
            let output = run(&input, &mut layout, &mut builder);
            assert_eq!(output.is_pressed(ButtonId::X), a || b);
        }
    }

    #[test]
    fn test_unmapped_button_has_no_effect() {
        let mut layout = BTreeMap::new();
        layout.insert(ButtonId::A, vec![Action::button(ButtonId::A)]);
        let mut builder = OutputStateBuilder::new();

        let released = run(&InputSnapshot::default(), &mut layout, &mut builder);
        let pressed = run(
            &InputSnapshot::default().with_button(ButtonId::Y, true),
            &mut layout,
            &mut builder,
        );
        assert_eq!(released, pressed);
        assert_eq!(pressed.button(ButtonId::Y), None);
    }

    #[test]
    fn test_shift_gating() {
        let mut layout = BTreeMap::new();
        layout.insert(ButtonId::L4, vec![Action::shift(ShiftSlot::A)]);
        layout.insert(
            ButtonId::A,
            vec![Action::button(ButtonId::Y).on_shift(ShiftSlot::A)],
        );
        let mut builder = OutputStateBuilder::new();

        let unshifted = InputSnapshot::default().with_button(ButtonId::A, true);
        let output = run(&unshifted, &mut layout, &mut builder);
        assert!(!output.is_pressed(ButtonId::Y));
        assert_eq!(layout[&ButtonId::A][0].state, ActionState::Stopped);

        let shifted = unshifted.clone().with_button(ButtonId::L4, true);
        let output = run(&shifted, &mut layout, &mut builder);
        assert!(output.is_pressed(ButtonId::Y));
        assert_eq!(layout[&ButtonId::A][0].state, ActionState::Running);
    }

    #[test]
    fn test_gated_out_action_releases_key_but_keeps_state() {
        let mut layout = BTreeMap::new();
        layout.insert(ButtonId::L4, vec![Action::shift(ShiftSlot::A)]);
        layout.insert(
            ButtonId::A,
            vec![Action::keyboard(Key::Space, Modifiers::NONE).on_shift(ShiftSlot::A)],
        );
        let mut builder = OutputStateBuilder::new();

        let held = InputSnapshot::default()
            .with_button(ButtonId::A, true)
            .with_button(ButtonId::L4, true);
        run(&held, &mut layout, &mut builder);
        builder.drain_requests().for_each(drop);

        let shift_released = InputSnapshot::default().with_button(ButtonId::A, true);
        run(&shift_released, &mut layout, &mut builder);
        let requests: Vec<_> = builder.drain_requests().collect();

        assert_eq!(
            requests,
            vec![EmitterRequest::Key {
                key: Key::Space,
                modifiers: Modifiers::NONE,
                pressed: false
            }]
        );
        assert_eq!(layout[&ButtonId::A][0].state, ActionState::Running);
    }

    #[test]
    fn test_running_suspends_interruptable_sibling() {
        let mut layout = BTreeMap::new();
        layout.insert(
            ButtonId::A,
            vec![
                Action::button(ButtonId::X),
                Action::button(ButtonId::Y)
                    .interruptable(true)
                    .press_type(PressType::Long),
            ],
        );
        let mut builder = OutputStateBuilder::new();
        let input = InputSnapshot::default().with_button(ButtonId::A, true);

        let output = run(&input, &mut layout, &mut builder);
        assert!(output.is_pressed(ButtonId::X));
        assert_eq!(layout[&ButtonId::A][1].state, ActionState::Suspended);
    }

    #[test]
    fn test_tap_cascades_from_aborted_hold() {
        let mut layout = BTreeMap::new();
        layout.insert(
            ButtonId::A,
            vec![
                Action::button(ButtonId::X)
                    .interruptable(true)
                    .press_type(PressType::Long),
                Action::button(ButtonId::Y).interruptable(true),
            ],
        );
        let mut builder = OutputStateBuilder::new();
        let start = Local::now();

        let output = run(
            &tick(start, 0).with_button(ButtonId::A, true),
            &mut layout,
            &mut builder,
        );
        assert!(!output.is_pressed(ButtonId::X));
        assert!(!output.is_pressed(ButtonId::Y));
        assert_eq!(layout[&ButtonId::A][1].state, ActionState::Suspended);

        // released before the hold threshold: the tap fires for one tick
        let output = run(&tick(start, 100), &mut layout, &mut builder);
        assert!(!output.is_pressed(ButtonId::X));
        assert!(output.is_pressed(ButtonId::Y));

        let output = run(&tick(start, 110), &mut layout, &mut builder);
        assert!(!output.is_pressed(ButtonId::Y));
        assert_eq!(layout[&ButtonId::A][0].state, ActionState::Stopped);
        assert_eq!(layout[&ButtonId::A][1].state, ActionState::Stopped);
    }

    #[test]
    fn test_hold_past_threshold_skips_tap() {
        let mut layout = BTreeMap::new();
        layout.insert(
            ButtonId::A,
            vec![
                Action::button(ButtonId::X)
                    .interruptable(true)
                    .press_type(PressType::Long),
                Action::button(ButtonId::Y).interruptable(true),
            ],
        );
        let mut builder = OutputStateBuilder::new();
        let start = Local::now();

        run(
            &tick(start, 0).with_button(ButtonId::A, true),
            &mut layout,
            &mut builder,
        );
        let output = run(
            &tick(start, 500).with_button(ButtonId::A, true),
            &mut layout,
            &mut builder,
        );
        assert!(output.is_pressed(ButtonId::X));
        assert!(!output.is_pressed(ButtonId::Y));
        assert_eq!(layout[&ButtonId::A][0].state, ActionState::Succeed);

        for ms in [510, 520] {
            let output = run(&tick(start, ms), &mut layout, &mut builder);
            assert!(!output.is_pressed(ButtonId::X));
            assert!(!output.is_pressed(ButtonId::Y));
        }
    }

    #[test]
    fn test_stateless_layout_is_idempotent() {
        let mut layout = BTreeMap::new();
        layout.insert(ButtonId::A, vec![Action::button(ButtonId::B)]);
        layout.insert(ButtonId::X, vec![Action::button(ButtonId::Y)]);
        let mut builder = OutputStateBuilder::new();
        let input = InputSnapshot::default()
            .with_button(ButtonId::A, true)
            .with_button(ButtonId::X, false);

        let first = run(&input, &mut layout, &mut builder);
        let second = run(&input, &mut layout, &mut builder);
        assert_eq!(first, second);
    }
}
