//! Per-tick input and output state.

use crate::mapping::types::{AxisComponent, AxisSlot, ButtonId, Vec3, Vector2};
use chrono::{DateTime, Local};
use std::collections::HashMap;

/// Accelerometer and gyroscope readings of one tick.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GyroState {
    pub accelerometer: Vec3,
    pub gyroscope: Vec3,
}

/// Read-only controller state delivered once per tick by the input source.
#[derive(Debug, Clone)]
pub struct InputSnapshot {
    pub buttons: HashMap<ButtonId, bool>,
    pub axes: HashMap<AxisComponent, i16>,
    pub gyro: GyroState,
    /// Sampling time, used by hold/turbo timing.
    pub timestamp: DateTime<Local>,
}

impl Default for InputSnapshot {
    fn default() -> Self {
        Self::at(Local::now())
    }
}

impl InputSnapshot {
    /// Empty snapshot sampled at `timestamp`.
    pub fn at(timestamp: DateTime<Local>) -> Self {
        Self {
            buttons: HashMap::new(),
            axes: HashMap::new(),
            gyro: GyroState::default(),
            timestamp,
        }
    }

    pub fn with_button(mut self, button: ButtonId, pressed: bool) -> Self {
        self.buttons.insert(button, pressed);
        self
    }

    pub fn with_axis(mut self, component: AxisComponent, value: i16) -> Self {
        self.axes.insert(component, value);
        self
    }

    pub fn with_gyroscope(mut self, gyroscope: Vec3) -> Self {
        self.gyro.gyroscope = gyroscope;
        self
    }

    pub fn is_pressed(&self, button: ButtonId) -> bool {
        self.buttons.get(&button).copied().unwrap_or(false)
    }

    pub fn axis(&self, component: AxisComponent) -> i16 {
        self.axes.get(&component).copied().unwrap_or(0)
    }

    /// Reads the slot's components as a vector; missing components read as 0.
    pub fn vector(&self, slot: AxisSlot) -> Vector2 {
        let components = slot.components();
        let read = |idx: usize| {
            components
                .get(idx)
                .map(|c| self.axis(*c) as i32)
                .unwrap_or(0)
        };
        Vector2::new(read(0), read(1))
    }
}

/// Result of one mapping tick.
///
/// Only values written during the tick are present. The manager hands out
/// copies; the buffer itself is cleared at the start of every tick and must
/// not be retained across ticks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutputSnapshot {
    pub buttons: HashMap<ButtonId, bool>,
    pub axes: HashMap<AxisComponent, i16>,
    pub gyro: GyroState,
}

impl OutputSnapshot {
    pub fn button(&self, button: ButtonId) -> Option<bool> {
        self.buttons.get(&button).copied()
    }

    pub fn is_pressed(&self, button: ButtonId) -> bool {
        self.button(button).unwrap_or(false)
    }

    pub fn axis(&self, component: AxisComponent) -> Option<i16> {
        self.axes.get(&component).copied()
    }

    /// Current output vector of `slot`; unwritten components read as 0.
    pub fn vector(&self, slot: AxisSlot) -> Vector2 {
        let components = slot.components();
        let read = |idx: usize| {
            components
                .get(idx)
                .and_then(|c| self.axis(*c))
                .map(i32::from)
                .unwrap_or(0)
        };
        Vector2::new(read(0), read(1))
    }

    /// Empties the maps without releasing their storage.
    pub fn clear(&mut self) {
        self.buttons.clear();
        self.axes.clear();
        self.gyro = GyroState::default();
    }
}
