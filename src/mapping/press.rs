//! Press-type, toggle and turbo handling for digital actions.

use crate::mapping::state::ActionState;
use chrono::{DateTime, Duration, Local};
use serde::{Deserialize, Serialize};

pub const DEFAULT_LONG_PRESS_MS: u32 = 450;
pub const DEFAULT_TURBO_DELAY_MS: u32 = 90;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PressType {
    /// Engaged for as long as the input is held.
    #[default]
    Short,
    /// Engaged once the input has been held for `long_press_ms`.
    Long,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PressConfig {
    pub press_type: PressType,
    pub long_press_ms: u32,
    pub toggle: bool,
    pub turbo: bool,
    pub turbo_delay_ms: u32,
}

impl Default for PressConfig {
    fn default() -> Self {
        Self {
            press_type: PressType::Short,
            long_press_ms: DEFAULT_LONG_PRESS_MS,
            toggle: false,
            turbo: false,
            turbo_delay_ms: DEFAULT_TURBO_DELAY_MS,
        }
    }
}

/// Cross-tick memory of a digital action.
#[derive(Debug, Clone, Default)]
pub struct PressTracker {
    press_started: Option<DateTime<Local>>,
    previous_engaged: bool,
    latched: bool,
    turbo_anchor: Option<DateTime<Local>>,
}

impl PressTracker {
    /// Evaluates one tick of input, updating `state`, and returns the action's
    /// output value.
    pub fn evaluate(
        &mut self,
        config: &PressConfig,
        state: &mut ActionState,
        pressed: bool,
        now: DateTime<Local>,
    ) -> bool {
        let engaged = self.engaged(config, state, pressed, now);
        let value = self.apply_toggle(config, engaged);
        self.apply_turbo(config, value, now)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn engaged(
        &mut self,
        config: &PressConfig,
        state: &mut ActionState,
        pressed: bool,
        now: DateTime<Local>,
    ) -> bool {
        match *state {
            ActionState::Forced => {
                *state = ActionState::Running;
                self.press_started = None;
                return true;
            }
            ActionState::Suspended => {
                if !pressed {
                    *state = ActionState::Stopped;
                    self.press_started = None;
                }
                return false;
            }
            _ => {}
        }

        match config.press_type {
            PressType::Short => {
                *state = if pressed {
                    ActionState::Running
                } else {
                    ActionState::Stopped
                };
                pressed
            }
            PressType::Long => {
                if pressed {
                    let started = *self.press_started.get_or_insert(now);
                    if now - started >= Duration::milliseconds(config.long_press_ms as i64) {
                        *state = ActionState::Succeed;
                        true
                    } else {
                        *state = ActionState::Running;
                        false
                    }
                } else {
                    let was_held = self.press_started.take().is_some();
                    *state = if was_held && *state == ActionState::Running {
                        ActionState::Aborted
                    } else {
                        ActionState::Stopped
                    };
                    false
                }
            }
        }
    }

    fn apply_toggle(&mut self, config: &PressConfig, engaged: bool) -> bool {
        let rising = engaged && !self.previous_engaged;
        self.previous_engaged = engaged;
        if !config.toggle {
            return engaged;
        }
        if rising {
            self.latched = !self.latched;
        }
        self.latched
    }

    fn apply_turbo(&mut self, config: &PressConfig, value: bool, now: DateTime<Local>) -> bool {
        if !config.turbo || !value {
            self.turbo_anchor = None;
            return value;
        }
        let anchor = *self.turbo_anchor.get_or_insert(now);
        let delay = config.turbo_delay_ms.max(1) as i64;
        let periods = (now - anchor).num_milliseconds() / delay;
        periods % 2 == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(start: DateTime<Local>, ms: i64) -> DateTime<Local> {
        start + Duration::milliseconds(ms)
    }

    #[test]
    fn test_short_press_follows_input() {
        let config = PressConfig::default();
        let mut tracker = PressTracker::default();
        let mut state = ActionState::Stopped;
        let now = Local::now();

        assert!(tracker.evaluate(&config, &mut state, true, now));
        assert_eq!(state, ActionState::Running);
        assert!(!tracker.evaluate(&config, &mut state, false, now));
        assert_eq!(state, ActionState::Stopped);
    }

    #[test]
    fn test_long_press_succeeds_after_threshold() {
        let config = PressConfig {
            press_type: PressType::Long,
            ..Default::default()
        };
        let mut tracker = PressTracker::default();
        let mut state = ActionState::Stopped;
        let start = Local::now();

        assert!(!tracker.evaluate(&config, &mut state, true, start));
        assert_eq!(state, ActionState::Running);
        assert!(!tracker.evaluate(&config, &mut state, true, at(start, 449)));
        assert!(tracker.evaluate(&config, &mut state, true, at(start, 450)));
        assert_eq!(state, ActionState::Succeed);
        assert!(!tracker.evaluate(&config, &mut state, false, at(start, 500)));
        assert_eq!(state, ActionState::Stopped);
    }

    #[test]
    fn test_long_press_released_early_aborts() {
        let config = PressConfig {
            press_type: PressType::Long,
            ..Default::default()
        };
        let mut tracker = PressTracker::default();
        let mut state = ActionState::Stopped;
        let start = Local::now();

        tracker.evaluate(&config, &mut state, true, start);
        assert!(!tracker.evaluate(&config, &mut state, false, at(start, 100)));
        assert_eq!(state, ActionState::Aborted);
        tracker.evaluate(&config, &mut state, false, at(start, 120));
        assert_eq!(state, ActionState::Stopped);
    }

    #[test]
    fn test_forced_fires_once_without_input() {
        let config = PressConfig::default();
        let mut tracker = PressTracker::default();
        let mut state = ActionState::Forced;
        let now = Local::now();

        assert!(tracker.evaluate(&config, &mut state, false, now));
        assert_eq!(state, ActionState::Running);
        assert!(!tracker.evaluate(&config, &mut state, false, now));
        assert_eq!(state, ActionState::Stopped);
    }

    #[test]
    fn test_suspended_stays_silent_until_release() {
        let config = PressConfig::default();
        let mut tracker = PressTracker::default();
        let mut state = ActionState::Suspended;
        let now = Local::now();

        assert!(!tracker.evaluate(&config, &mut state, true, now));
        assert_eq!(state, ActionState::Suspended);
        assert!(!tracker.evaluate(&config, &mut state, false, now));
        assert_eq!(state, ActionState::Stopped);
    }

    #[test]
    fn test_toggle_latches_on_rising_edges() {
        let config = PressConfig {
            toggle: true,
            ..Default::default()
        };
        let mut tracker = PressTracker::default();
        let mut state = ActionState::Stopped;
        let now = Local::now();

        assert!(tracker.evaluate(&config, &mut state, true, now));
        assert!(tracker.evaluate(&config, &mut state, true, now));
        assert!(tracker.evaluate(&config, &mut state, false, now));
        assert!(!tracker.evaluate(&config, &mut state, true, now));
        assert!(!tracker.evaluate(&config, &mut state, false, now));
    }

    #[test]
    fn test_turbo_alternates_per_delay() {
        let config = PressConfig {
            turbo: true,
            turbo_delay_ms: 100,
            ..Default::default()
        };
        let mut tracker = PressTracker::default();
        let mut state = ActionState::Stopped;
        let start = Local::now();

        assert!(tracker.evaluate(&config, &mut state, true, start));
        assert!(tracker.evaluate(&config, &mut state, true, at(start, 99)));
        assert!(!tracker.evaluate(&config, &mut state, true, at(start, 100)));
        assert!(tracker.evaluate(&config, &mut state, true, at(start, 200)));
        assert!(!tracker.evaluate(&config, &mut state, false, at(start, 250)));
    }
}
