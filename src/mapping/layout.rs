//! Layout: the three mapping tables of one profile.

use crate::mapping::action::{
    Action, ActionKind, AxisCurve, MotionDirection, MotionTrigger, MouseAction, MouseActionType,
};
use crate::mapping::emitter::EmitterRequest;
use crate::mapping::types::{AxisSlot, ButtonId, Rotation};
use egui::{Key, Modifiers};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Deadzone applied to sticks driving the pointer in the desktop layout.
const DESKTOP_STICK_DEADZONE: f32 = 10.0;

/// Button, axis and gyro mapping tables.
///
/// Maps are ordered by their keys, which gives both passes the fixed
/// enumeration order. Within a button, action order is priority and cascade
/// order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Layout {
    pub name: String,
    #[serde(default)]
    pub button_layout: BTreeMap<ButtonId, Vec<Action>>,
    #[serde(default)]
    pub axis_layout: BTreeMap<AxisSlot, Action>,
    #[serde(default)]
    pub gyro_layout: BTreeMap<AxisSlot, Action>,
}

impl Layout {
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Every button and stick/trigger passed straight through.
    pub fn gamepad() -> Self {
        let mut layout = Self::empty("Gamepad");
        for button in ButtonId::ALL {
            layout.map_button(button, Action::button(button));
        }
        layout
            .map_axis(AxisSlot::LeftStick, Action::joystick(AxisSlot::LeftStick))
            .map_axis(AxisSlot::RightStick, Action::joystick(AxisSlot::RightStick))
            .map_axis(AxisSlot::LeftTrigger, Action::trigger(AxisSlot::LeftTrigger))
            .map_axis(AxisSlot::RightTrigger, Action::trigger(AxisSlot::RightTrigger));
        layout
    }

    /// Mouse and keyboard control for the desktop.
    ///
    /// Every mouse button has a single source, since each action emits its
    /// own press and release.
    pub fn desktop() -> Self {
        let mut layout = Self::empty("Desktop");
        let stick_curve = AxisCurve {
            inner_deadzone: DESKTOP_STICK_DEADZONE,
            ..Default::default()
        };

        layout
            .map_button(ButtonId::A, Action::mouse(MouseActionType::LeftButton))
            .map_button(ButtonId::B, Action::mouse(MouseActionType::RightButton))
            .map_button(ButtonId::X, Action::keyboard(Key::Escape, Modifiers::NONE))
            .map_button(ButtonId::Y, Action::keyboard(Key::Enter, Modifiers::NONE))
            .map_button(ButtonId::DPadUp, Action::keyboard(Key::ArrowUp, Modifiers::NONE))
            .map_button(ButtonId::DPadDown, Action::keyboard(Key::ArrowDown, Modifiers::NONE))
            .map_button(ButtonId::DPadLeft, Action::keyboard(Key::ArrowLeft, Modifiers::NONE))
            .map_button(ButtonId::DPadRight, Action::keyboard(Key::ArrowRight, Modifiers::NONE))
            .map_button(ButtonId::LeftBumper, Action::keyboard(Key::Tab, Modifiers::SHIFT))
            .map_button(ButtonId::RightBumper, Action::keyboard(Key::Tab, Modifiers::NONE))
            .map_button(ButtonId::RightStickClick, Action::mouse(MouseActionType::MiddleButton))
            .map_button(ButtonId::LeftPadClick, Action::keyboard(Key::Backspace, Modifiers::NONE))
            .map_button(ButtonId::RightPadClick, Action::keyboard(Key::Space, Modifiers::NONE));

        let stick_mouse = |action_type| {
            let mut mouse = MouseAction::new(action_type);
            mouse.curve = stick_curve;
            Action::new(ActionKind::Mouse(mouse)).auto_rotate(true)
        };

        layout
            .map_axis(AxisSlot::RightStick, stick_mouse(MouseActionType::Move))
            .map_axis(AxisSlot::LeftStick, stick_mouse(MouseActionType::Scroll))
            .map_axis(
                AxisSlot::RightPad,
                Action::mouse(MouseActionType::Move).auto_rotate(true),
            )
            .map_axis(
                AxisSlot::LeftPad,
                Action::mouse(MouseActionType::Scroll).auto_rotate(true),
            )
            .map_axis(
                AxisSlot::RightTrigger,
                Action::mouse(MouseActionType::ScrollDown)
                    .with_motion(MotionTrigger::default_for(MotionDirection::RIGHT)),
            )
            .map_axis(
                AxisSlot::LeftTrigger,
                Action::mouse(MouseActionType::ScrollUp)
                    .with_motion(MotionTrigger::default_for(MotionDirection::RIGHT)),
            );
        layout
    }

    /// Appends `action` to the button's sequence.
    pub fn map_button(&mut self, button: ButtonId, action: Action) -> &mut Self {
        self.button_layout.entry(button).or_default().push(action);
        self
    }

    pub fn map_axis(&mut self, slot: AxisSlot, action: Action) -> &mut Self {
        self.axis_layout.insert(slot, action);
        self
    }

    pub fn map_gyro(&mut self, slot: AxisSlot, action: Action) -> &mut Self {
        self.gyro_layout.insert(slot, action);
        self
    }

    pub fn actions_mut(&mut self) -> impl Iterator<Item = &mut Action> {
        self.button_layout
            .values_mut()
            .flat_map(|actions| actions.iter_mut())
            .chain(self.axis_layout.values_mut())
            .chain(self.gyro_layout.values_mut())
    }

    /// Pushes the display rotation into every `auto_rotate` action.
    pub fn apply_orientation(&mut self, rotation: Rotation) {
        debug!("Applying orientation {} to layout {}", rotation, self.name);
        for action in self.actions_mut() {
            action.set_orientation(rotation);
        }
    }

    /// Releases every key and mouse button this layout currently holds and
    /// clears toggle latches, long-press timers and turbo phases.
    pub fn reset(&mut self) -> Vec<EmitterRequest> {
        self.actions_mut()
            .filter_map(|action| action.reset())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_gamepad_template_covers_every_button() {
        let layout = Layout::gamepad();
        for button in ButtonId::ALL {
            let actions = &layout.button_layout[&button];
            assert_eq!(actions.len(), 1);
            assert!(matches!(&actions[0].kind, ActionKind::Button(b) if b.target == button));
        }
        assert!(layout.gyro_layout.is_empty());
    }

    #[test]
    fn test_map_button_keeps_order() {
        let mut layout = Layout::empty("order");
        layout
            .map_button(ButtonId::A, Action::button(ButtonId::B))
            .map_button(ButtonId::A, Action::button(ButtonId::X));
        let targets: Vec<_> = layout.button_layout[&ButtonId::A]
            .iter()
            .map(|a| match &a.kind {
                ActionKind::Button(b) => b.target,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(targets, vec![ButtonId::B, ButtonId::X]);
    }

    #[test]
    fn test_desktop_mouse_buttons_have_one_source() {
        let mut layout = Layout::desktop();
        let mut sources: HashMap<MouseActionType, usize> = HashMap::new();
        for action in layout.actions_mut() {
            if let ActionKind::Mouse(mouse) = &action.kind {
                if matches!(
                    mouse.action_type,
                    MouseActionType::LeftButton
                        | MouseActionType::RightButton
                        | MouseActionType::MiddleButton
                ) {
                    *sources.entry(mouse.action_type).or_default() += 1;
                }
            }
        }
        assert_eq!(sources.len(), 3);
        assert!(sources.values().all(|count| *count == 1));
    }

    #[test]
    fn test_orientation_only_reaches_auto_rotate_actions() {
        let mut layout = Layout::desktop();
        layout.map_axis(AxisSlot::LeftTrigger, Action::trigger(AxisSlot::LeftTrigger));
        layout.apply_orientation(Rotation::Deg90);

        assert_eq!(layout.axis_layout[&AxisSlot::RightStick].rotation(), Rotation::Deg90);
        assert_eq!(layout.axis_layout[&AxisSlot::LeftTrigger].rotation(), Rotation::Deg0);
    }
}
