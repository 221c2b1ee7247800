//! Identifiers and small value types shared by every stage of the mapping pass.
//!
//! The declaration order of [`ButtonId`] and [`AxisSlot`] is the iteration order
//! of both mapping passes, so new variants must be appended with care.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::ops::{Add, AddAssign, BitOr, BitOrAssign};

/// Largest magnitude of a single output axis component.
pub const AXIS_MAX: i32 = i16::MAX as i32;
/// Smallest value of a single output axis component.
pub const AXIS_MIN: i32 = i16::MIN as i32;

/// Physical and virtual buttons of a handheld controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ButtonId {
    A,
    B,
    X,
    Y,
    LeftBumper,
    RightBumper,
    LeftStickClick,
    RightStickClick,
    DPadUp,
    DPadDown,
    DPadLeft,
    DPadRight,
    Back,
    Start,
    Guide,
    Oem1,
    Oem2,
    L4,
    R4,
    L5,
    R5,
    LeftPadTouch,
    LeftPadClick,
    LeftPadClickUp,
    LeftPadClickDown,
    LeftPadClickLeft,
    LeftPadClickRight,
    RightPadTouch,
    RightPadClick,
    RightPadClickUp,
    RightPadClickDown,
    RightPadClickLeft,
    RightPadClickRight,
}

impl ButtonId {
    /// Every button, in the fixed evaluation order.
    pub const ALL: [ButtonId; 33] = [
        ButtonId::A,
        ButtonId::B,
        ButtonId::X,
        ButtonId::Y,
        ButtonId::LeftBumper,
        ButtonId::RightBumper,
        ButtonId::LeftStickClick,
        ButtonId::RightStickClick,
        ButtonId::DPadUp,
        ButtonId::DPadDown,
        ButtonId::DPadLeft,
        ButtonId::DPadRight,
        ButtonId::Back,
        ButtonId::Start,
        ButtonId::Guide,
        ButtonId::Oem1,
        ButtonId::Oem2,
        ButtonId::L4,
        ButtonId::R4,
        ButtonId::L5,
        ButtonId::R5,
        ButtonId::LeftPadTouch,
        ButtonId::LeftPadClick,
        ButtonId::LeftPadClickUp,
        ButtonId::LeftPadClickDown,
        ButtonId::LeftPadClickLeft,
        ButtonId::LeftPadClickRight,
        ButtonId::RightPadTouch,
        ButtonId::RightPadClick,
        ButtonId::RightPadClickUp,
        ButtonId::RightPadClickDown,
        ButtonId::RightPadClickLeft,
        ButtonId::RightPadClickRight,
    ];
}

impl Display for ButtonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// One physical axis as reported by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AxisComponent {
    LeftStickX,
    LeftStickY,
    RightStickX,
    RightStickY,
    LeftTrigger,
    RightTrigger,
    LeftPadX,
    LeftPadY,
    RightPadX,
    RightPadY,
}

/// Logical axis group. Sticks and pads are two-dimensional, triggers have a
/// single component and the gyro reads the motion vectors instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AxisSlot {
    LeftStick,
    RightStick,
    LeftTrigger,
    RightTrigger,
    LeftPad,
    RightPad,
    Gyro,
}

impl AxisSlot {
    pub const ALL: [AxisSlot; 7] = [
        AxisSlot::LeftStick,
        AxisSlot::RightStick,
        AxisSlot::LeftTrigger,
        AxisSlot::RightTrigger,
        AxisSlot::LeftPad,
        AxisSlot::RightPad,
        AxisSlot::Gyro,
    ];

    /// Static slot to component table: `[x]` or `[x, y]`, empty for the gyro.
    pub const fn components(self) -> &'static [AxisComponent] {
        match self {
            AxisSlot::LeftStick => &[AxisComponent::LeftStickX, AxisComponent::LeftStickY],
            AxisSlot::RightStick => &[AxisComponent::RightStickX, AxisComponent::RightStickY],
            AxisSlot::LeftTrigger => &[AxisComponent::LeftTrigger],
            AxisSlot::RightTrigger => &[AxisComponent::RightTrigger],
            AxisSlot::LeftPad => &[AxisComponent::LeftPadX, AxisComponent::LeftPadY],
            AxisSlot::RightPad => &[AxisComponent::RightPadX, AxisComponent::RightPadY],
            AxisSlot::Gyro => &[],
        }
    }
}

impl Display for AxisSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Bitset of shift layers. `NONE` gates nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShiftSlot(pub u8);

impl ShiftSlot {
    pub const NONE: ShiftSlot = ShiftSlot(0);
    pub const A: ShiftSlot = ShiftSlot(1);
    pub const B: ShiftSlot = ShiftSlot(1 << 1);
    pub const C: ShiftSlot = ShiftSlot(1 << 2);
    pub const D: ShiftSlot = ShiftSlot(1 << 3);

    pub const fn is_none(self) -> bool {
        self.0 == 0
    }

    /// True if every bit of `other` is set in `self`.
    pub const fn contains(self, other: ShiftSlot) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether an action living on `self` may fire under the active `mask`.
    pub const fn is_open_under(self, mask: ShiftSlot) -> bool {
        self.is_none() || mask.contains(self)
    }
}

impl BitOr for ShiftSlot {
    type Output = ShiftSlot;

    fn bitor(self, rhs: ShiftSlot) -> ShiftSlot {
        ShiftSlot(self.0 | rhs.0)
    }
}

impl BitOrAssign for ShiftSlot {
    fn bitor_assign(&mut self, rhs: ShiftSlot) {
        self.0 |= rhs.0;
    }
}

/// Two-dimensional stick-space vector. Components are kept wide so that
/// several contributions can be summed before the final clamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Vector2 {
    pub x: i32,
    pub y: i32,
}

impl Vector2 {
    pub const ZERO: Vector2 = Vector2 { x: 0, y: 0 };

    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn is_zero(&self) -> bool {
        self.x == 0 && self.y == 0
    }

    /// Euclidean length in raw axis units.
    pub fn length(&self) -> f32 {
        (self.x as f32).hypot(self.y as f32)
    }

    pub fn clamped(self) -> Self {
        Self {
            x: clamp_axis(self.x),
            y: clamp_axis(self.y),
        }
    }
}

impl Add for Vector2 {
    type Output = Vector2;

    fn add(self, rhs: Vector2) -> Vector2 {
        Vector2::new(self.x.saturating_add(rhs.x), self.y.saturating_add(rhs.y))
    }
}

impl AddAssign for Vector2 {
    fn add_assign(&mut self, rhs: Vector2) {
        *self = *self + rhs;
    }
}

/// Clamps a wide accumulator value into the i16 output range.
pub fn clamp_axis(value: i32) -> i32 {
    value.clamp(AXIS_MIN, AXIS_MAX)
}

/// Motion sensor vector (accelerometer in g, gyroscope in deg/s).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Replaces non-finite components with zero.
    pub fn sanitized(self) -> Self {
        let fix = |v: f32| if v.is_finite() { v } else { 0.0 };
        Self::new(fix(self.x), fix(self.y), fix(self.z))
    }
}

/// Display rotation applied to `auto_rotate` actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    /// Rotates `v` counter-clockwise by this rotation.
    pub fn apply(self, v: Vector2) -> Vector2 {
        match self {
            Rotation::Deg0 => v,
            Rotation::Deg90 => Vector2::new(-v.y, v.x),
            Rotation::Deg180 => Vector2::new(-v.x, -v.y),
            Rotation::Deg270 => Vector2::new(v.y, -v.x),
        }
    }
}

impl Display for Rotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rotation::Deg0 => write!(f, "0°"),
            Rotation::Deg90 => write!(f, "90°"),
            Rotation::Deg180 => write!(f, "180°"),
            Rotation::Deg270 => write!(f, "270°"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_button_order_matches_declaration() {
        let mut sorted = ButtonId::ALL;
        sorted.sort();
        assert_eq!(sorted, ButtonId::ALL);
    }

    #[test]
    fn test_shift_slot_gating() {
        let mask = ShiftSlot::A | ShiftSlot::C;
        assert!(ShiftSlot::NONE.is_open_under(ShiftSlot::NONE));
        assert!(ShiftSlot::A.is_open_under(mask));
        assert!(!ShiftSlot::B.is_open_under(mask));
        assert!((ShiftSlot::A | ShiftSlot::C).is_open_under(mask));
        assert!(!(ShiftSlot::A | ShiftSlot::B).is_open_under(mask));
    }

    #[test]
    fn test_components_table() {
        assert_eq!(AxisSlot::LeftStick.components().len(), 2);
        assert_eq!(
            AxisSlot::RightTrigger.components(),
            &[AxisComponent::RightTrigger]
        );
        assert!(AxisSlot::Gyro.components().is_empty());
    }

    #[test]
    fn test_rotation_handles_axis_minimum() {
        let v = Vector2::new(AXIS_MIN, 0);
        assert_eq!(Rotation::Deg180.apply(v).clamped(), Vector2::new(AXIS_MAX, 0));
        assert_eq!(Rotation::Deg90.apply(Vector2::new(1, 2)), Vector2::new(-2, 1));
    }

    #[test]
    fn test_sanitized_drops_nan() {
        let v = Vec3::new(f32::NAN, 1.0, f32::INFINITY).sanitized();
        assert_eq!(v, Vec3::new(0.0, 1.0, 0.0));
    }
}
