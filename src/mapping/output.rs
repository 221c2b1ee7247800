//! Reusable per-tick output buffer.
//!
//! Axis contributions are summed into a wide accumulator and clamped once in
//! [`TickFrame::commit_axes`], so two partial deflections that together exceed
//! the range saturate exactly once.

use crate::mapping::emitter::EmitterRequest;
use crate::mapping::snapshot::{GyroState, InputSnapshot, OutputSnapshot};
use crate::mapping::types::{clamp_axis, AxisComponent, AxisSlot, ButtonId, Vector2};
use chrono::{DateTime, Local};
use std::collections::HashMap;

/// Owns the output snapshot plus the scratch state of a tick.
#[derive(Debug, Default)]
pub struct OutputStateBuilder {
    output: OutputSnapshot,
    accumulator: HashMap<AxisComponent, i32>,
    requests: Vec<EmitterRequest>,
}

impl OutputStateBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears everything left over from the previous tick and copies the gyro
    /// pass-through values from `input`.
    pub fn begin_tick(&mut self, input: &InputSnapshot) -> TickFrame<'_> {
        self.output.clear();
        self.accumulator.clear();
        self.requests.clear();
        self.output.gyro = GyroState {
            accelerometer: input.gyro.accelerometer.sanitized(),
            gyroscope: input.gyro.gyroscope.sanitized(),
        };

        TickFrame {
            now: input.timestamp,
            output: &mut self.output,
            accumulator: &mut self.accumulator,
            requests: &mut self.requests,
        }
    }

    /// Result of the last completed tick.
    pub fn output(&self) -> &OutputSnapshot {
        &self.output
    }

    /// Side-effect requests produced by the last tick.
    pub fn drain_requests(&mut self) -> std::vec::Drain<'_, EmitterRequest> {
        self.requests.drain(..)
    }
}

/// Mutable view of the output for the duration of one tick.
pub struct TickFrame<'a> {
    now: DateTime<Local>,
    output: &'a mut OutputSnapshot,
    accumulator: &'a mut HashMap<AxisComponent, i32>,
    requests: &'a mut Vec<EmitterRequest>,
}

impl<'a> TickFrame<'a> {
    pub fn now(&self) -> DateTime<Local> {
        self.now
    }

    /// ORs `value` into the destination button.
    pub fn press_button(&mut self, button: ButtonId, value: bool) {
        let entry = self.output.buttons.entry(button).or_insert(false);
        *entry |= value;
    }

    /// Adds `delta` to the accumulated value of `slot`. Components the slot
    /// does not have are ignored.
    pub fn add_vector(&mut self, slot: AxisSlot, delta: Vector2) {
        let components = slot.components();
        if let Some(x) = components.first() {
            let entry = self.accumulator.entry(*x).or_insert(0);
            *entry = entry.saturating_add(delta.x);
        }
        if let Some(y) = components.get(1) {
            let entry = self.accumulator.entry(*y).or_insert(0);
            *entry = entry.saturating_add(delta.y);
        }
    }

    /// Clamps every accumulated component into the output map.
    pub fn commit_axes(&mut self) {
        for (component, value) in self.accumulator.drain() {
            self.output.axes.insert(component, clamp_axis(value) as i16);
        }
    }

    /// Output vector already written for `slot` this tick.
    pub fn output_vector(&self, slot: AxisSlot) -> Vector2 {
        self.output.vector(slot)
    }

    /// Overwrites the output of `slot` with `value`, clamped.
    pub fn write_vector(&mut self, slot: AxisSlot, value: Vector2) {
        let value = value.clamped();
        let components = slot.components();
        if let Some(x) = components.first() {
            self.output.axes.insert(*x, value.x as i16);
        }
        if let Some(y) = components.get(1) {
            self.output.axes.insert(*y, value.y as i16);
        }
    }

    /// Marks the gyro as consumed by a mapping so it is not passed through.
    pub fn consume_gyro(&mut self) {
        self.output.gyro = GyroState::default();
    }

    pub fn request(&mut self, request: EmitterRequest) {
        self.requests.push(request);
    }
}
