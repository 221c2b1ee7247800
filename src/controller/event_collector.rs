use crate::config::ControllerSettings;
use crate::mapping::types::{AxisComponent, ButtonId, AXIS_MAX};
use crate::mapping::InputSnapshot;
use chrono::Local;
use gilrs::{Axis, Button, Event, EventType, GamepadId, Gilrs};
use statum::{machine, state};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, error, info, trace, warn};

// Collector errors
#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    #[error("Failed to initialize collector: {0}")]
    InitializationError(String),

    #[error("Failed to send snapshot: {0}")]
    SnapshotSendError(String),
}

// Define collector states using statum's state macro
#[state]
#[derive(Debug, Clone)]
pub enum CollectionState {
    Initializing,
    Collecting,
}

/// Polls gilrs and keeps a running [`InputSnapshot`] of the active gamepad.
#[machine]
pub struct EventCollector<S: CollectionState> {
    gilrs: Gilrs,

    active_gamepad: Option<GamepadId>,

    settings: ControllerSettings,

    // Published every poll interval
    snapshot_sender: mpsc::Sender<InputSnapshot>,

    snapshot: InputSnapshot,

    published: u64,
}

impl EventCollector<Initializing> {
    pub fn create(
        settings: ControllerSettings,
        snapshot_sender: mpsc::Sender<InputSnapshot>,
    ) -> Result<Self, CollectorError> {
        debug!("Creating Event Collector with settings: {:?}", settings);

        info!("Initializing gilrs controller interface");
        let gilrs = match Gilrs::new() {
            Ok(g) => {
                info!("Successfully initialized gilrs");
                g
            }
            Err(e) => {
                error!("Failed to initialize gilrs: {}", e);
                return Err(CollectorError::InitializationError(e.to_string()));
            }
        };

        Ok(Self::new(
            gilrs,
            None,
            settings,
            snapshot_sender,
            InputSnapshot::default(),
            0, // published
        ))
    }

    /// Picks the gamepad to follow and transitions to Collecting.
    pub fn initialize(mut self) -> EventCollector<Collecting> {
        let gamepads: Vec<(GamepadId, String)> = self
            .gilrs
            .gamepads()
            .map(|(id, gamepad)| (id, gamepad.name().to_string()))
            .collect();

        if gamepads.is_empty() {
            warn!("No gamepad connected, waiting for one");
        } else {
            info!("Found {} gamepads:", gamepads.len());
            for (idx, (id, name)) in gamepads.iter().enumerate() {
                info!("  [{}] ID: {}, Name: {}", idx, id, name);
            }

            let index = self
                .settings
                .gamepad_index
                .filter(|index| *index < gamepads.len())
                .unwrap_or(0);
            let (id, name) = &gamepads[index];
            self.active_gamepad = Some(*id);
            info!("Selected gamepad: {} ({})", name, id);
        }

        info!("Event Collector initialized, transitioning to Collecting state");
        self.transition()
    }
}

impl EventCollector<Collecting> {
    /// Folds every pending gilrs event into the running snapshot.
    pub fn drain_events(&mut self) {
        while let Some(Event { id, event, .. }) = self.gilrs.next_event() {
            match self.active_gamepad {
                Some(active_id) if active_id != id => {
                    trace!("Skipping event from non-active gamepad: {:?}", id);
                    continue;
                }
                None if !matches!(event, EventType::Disconnected) => {
                    info!("Adopting gamepad {}", id);
                    self.active_gamepad = Some(id);
                }
                _ => {}
            }
            self.apply_event(event);
        }
    }

    fn apply_event(&mut self, event: EventType) {
        let deadzone = self.settings.stick_deadzone;
        match event {
            EventType::ButtonPressed(button, _) => apply_button(&mut self.snapshot, button, true),
            EventType::ButtonReleased(button, _) => {
                apply_button(&mut self.snapshot, button, false)
            }
            EventType::ButtonChanged(button, value, _) => {
                apply_button_value(&mut self.snapshot, button, value)
            }
            EventType::AxisChanged(axis, value, _) => {
                apply_axis(&mut self.snapshot, axis, value, deadzone)
            }
            EventType::Disconnected => {
                warn!("Active gamepad disconnected, releasing all inputs");
                self.active_gamepad = None;
                self.snapshot = InputSnapshot::default();
            }
            EventType::Connected => info!("Gamepad connected"),
            _ => trace!("Unhandled event type: {:?}", event),
        }
    }

    /// Sends the current snapshot. A full channel skips this publication.
    pub fn publish(&mut self) -> Result<(), CollectorError> {
        self.snapshot.timestamp = Local::now();
        match self.snapshot_sender.try_send(self.snapshot.clone()) {
            Ok(()) => {
                self.published += 1;
                Ok(())
            }
            Err(TrySendError::Full(_)) => {
                debug!("Snapshot channel full, skipping");
                Ok(())
            }
            Err(TrySendError::Closed(_)) => Err(CollectorError::SnapshotSendError(
                "snapshot channel closed".to_string(),
            )),
        }
    }

    /// Polls until `stop` is set or the receiver goes away.
    pub fn run_collection_loop(&mut self, stop: &AtomicBool) -> Result<(), CollectorError> {
        info!("Starting Event Collector loop");
        let interval = Duration::from_millis(self.settings.poll_interval_ms.max(1));

        while !stop.load(Ordering::Relaxed) {
            self.drain_events();
            self.publish()?;
            std::thread::sleep(interval);
        }

        info!(
            "Event Collector stopped after {} snapshots",
            self.published
        );
        Ok(())
    }
}

/// Spawns the collector on a blocking thread.
pub struct CollectorHandle {
    stop: Arc<AtomicBool>,
    task_handle: tokio::task::JoinHandle<Result<(), CollectorError>>,
}

impl CollectorHandle {
    pub fn spawn(settings: ControllerSettings, snapshot_sender: mpsc::Sender<InputSnapshot>) -> Self {
        info!("Spawning Event Collector with settings: {:?}", settings);
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);

        // gilrs is created on the polling thread and never leaves it
        let task_handle = tokio::task::spawn_blocking(move || {
            let mut collector = EventCollector::create(settings, snapshot_sender)?.initialize();
            let result = collector.run_collection_loop(&stop_flag);
            if let Err(e) = &result {
                error!("Collector task terminated with error: {}", e);
            }
            result
        });

        Self { stop, task_handle }
    }

    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    /// Stops the loop and waits for the polling thread.
    pub async fn join(self) -> Result<(), CollectorError> {
        self.stop();
        match self.task_handle.await {
            Ok(result) => result,
            Err(e) => Err(CollectorError::InitializationError(format!(
                "collector task failed: {}",
                e
            ))),
        }
    }
}

fn map_button(button: Button) -> Option<ButtonId> {
    match button {
        Button::South => Some(ButtonId::A),
        Button::East => Some(ButtonId::B),
        Button::West => Some(ButtonId::X),
        Button::North => Some(ButtonId::Y),
        Button::LeftTrigger => Some(ButtonId::LeftBumper),
        Button::RightTrigger => Some(ButtonId::RightBumper),
        Button::LeftThumb => Some(ButtonId::LeftStickClick),
        Button::RightThumb => Some(ButtonId::RightStickClick),
        Button::DPadUp => Some(ButtonId::DPadUp),
        Button::DPadDown => Some(ButtonId::DPadDown),
        Button::DPadLeft => Some(ButtonId::DPadLeft),
        Button::DPadRight => Some(ButtonId::DPadRight),
        Button::Select => Some(ButtonId::Back),
        Button::Start => Some(ButtonId::Start),
        Button::Mode => Some(ButtonId::Guide),
        Button::C => Some(ButtonId::Oem1),
        Button::Z => Some(ButtonId::Oem2),
        _ => None,
    }
}

/// Analog triggers reported as buttons
fn map_trigger(button: Button) -> Option<AxisComponent> {
    match button {
        Button::LeftTrigger2 => Some(AxisComponent::LeftTrigger),
        Button::RightTrigger2 => Some(AxisComponent::RightTrigger),
        _ => None,
    }
}

fn map_axis(axis: Axis) -> Option<AxisComponent> {
    match axis {
        Axis::LeftStickX => Some(AxisComponent::LeftStickX),
        Axis::LeftStickY => Some(AxisComponent::LeftStickY),
        Axis::RightStickX => Some(AxisComponent::RightStickX),
        Axis::RightStickY => Some(AxisComponent::RightStickY),
        Axis::LeftZ => Some(AxisComponent::LeftTrigger),
        Axis::RightZ => Some(AxisComponent::RightTrigger),
        _ => None,
    }
}

fn apply_button(snapshot: &mut InputSnapshot, button: Button, pressed: bool) {
    match map_button(button) {
        Some(id) => {
            debug!("Button {} {}", id, if pressed { "pressed" } else { "released" });
            snapshot.buttons.insert(id, pressed);
        }
        None => trace!("Ignoring unmapped button: {:?}", button),
    }
}

fn apply_button_value(snapshot: &mut InputSnapshot, button: Button, value: f32) {
    if let Some(component) = map_trigger(button) {
        snapshot.axes.insert(component, to_raw(value));
    }
}

fn apply_axis(snapshot: &mut InputSnapshot, axis: Axis, value: f32, deadzone: f32) {
    match map_axis(axis) {
        Some(component) => {
            let value = match component {
                AxisComponent::LeftTrigger | AxisComponent::RightTrigger => value,
                _ => apply_deadzone(value, deadzone),
            };
            snapshot.axes.insert(component, to_raw(value));
        }
        None => trace!("Ignoring unsupported axis: {:?}", axis),
    }
}

// Converts a gilrs value in [-1, 1] to raw stick units
fn to_raw(value: f32) -> i16 {
    if !value.is_finite() {
        return 0;
    }
    (value.clamp(-1.0, 1.0) * AXIS_MAX as f32).round() as i16
}

// Helper function to apply deadzone to analog stick values
fn apply_deadzone(value: f32, deadzone: f32) -> f32 {
    if deadzone <= 0.0 {
        return value;
    }
    if deadzone >= 1.0 || value.abs() < deadzone {
        0.0
    } else {
        // Rescale the value to the range outside the deadzone
        value.signum() * (value.abs() - deadzone) / (1.0 - deadzone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_face_buttons_follow_positions() {
        assert_eq!(map_button(Button::South), Some(ButtonId::A));
        assert_eq!(map_button(Button::North), Some(ButtonId::Y));
        assert_eq!(map_button(Button::LeftTrigger2), None);
        assert_eq!(map_trigger(Button::LeftTrigger2), Some(AxisComponent::LeftTrigger));
    }

    #[test]
    fn test_to_raw_saturates() {
        assert_eq!(to_raw(1.0), i16::MAX);
        assert_eq!(to_raw(-1.0), -i16::MAX);
        assert_eq!(to_raw(2.5), i16::MAX);
        assert_eq!(to_raw(0.0), 0);
        assert_eq!(to_raw(f32::NAN), 0);
    }

    #[test]
    fn test_deadzone_rescales() {
        assert_eq!(apply_deadzone(0.04, 0.05), 0.0);
        assert_eq!(apply_deadzone(1.0, 0.05), 1.0);
        assert_eq!(apply_deadzone(-1.0, 0.05), -1.0);
        assert_eq!(apply_deadzone(0.3, 0.0), 0.3);
    }

    #[test]
    fn test_events_update_snapshot() {
        let mut snapshot = InputSnapshot::default();
        apply_button(&mut snapshot, Button::East, true);
        apply_axis(&mut snapshot, Axis::LeftStickY, 1.0, 0.1);
        apply_axis(&mut snapshot, Axis::RightZ, 0.05, 0.1);
        apply_button_value(&mut snapshot, Button::LeftTrigger2, 0.5);

        assert!(snapshot.is_pressed(ButtonId::B));
        assert_eq!(snapshot.axis(AxisComponent::LeftStickY), i16::MAX);
        // triggers skip the stick deadzone
        assert_eq!(snapshot.axis(AxisComponent::RightTrigger), 1638);
        assert_eq!(snapshot.axis(AxisComponent::LeftTrigger), 16384);

        apply_button(&mut snapshot, Button::East, false);
        assert!(!snapshot.is_pressed(ButtonId::B));
    }
}
