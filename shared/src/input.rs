//! Controller button bitmasks.
//!
//! The worker consumes one `u8` per controller with the standard pad layout:
//! bit0=A, bit1=B, bit2=Select, bit3=Start, bit4=Up, bit5=Down, bit6=Left,
//! bit7=Right.

use serde::{Deserialize, Serialize};

/// Number of controllers the worker accepts input for
pub const CONTROLLER_COUNT: usize = 2;

bitflags::bitflags! {
    /// Buttons held on a single controller
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ControllerButtons: u8 {
        const A = 0b0000_0001;
        const B = 0b0000_0010;
        const SELECT = 0b0000_0100;
        const START = 0b0000_1000;
        const UP = 0b0001_0000;
        const DOWN = 0b0010_0000;
        const LEFT = 0b0100_0000;
        const RIGHT = 0b1000_0000;
    }
}

impl ControllerButtons {
    /// Buttons released when `self` is pressed.
    ///
    /// Opposing D-pad directions cancel each other, favoring the most
    /// recent press.
    pub fn suppresses(self) -> ControllerButtons {
        let mut suppressed = ControllerButtons::empty();
        if self.contains(ControllerButtons::UP) {
            suppressed |= ControllerButtons::DOWN;
        }
        if self.contains(ControllerButtons::DOWN) {
            suppressed |= ControllerButtons::UP;
        }
        if self.contains(ControllerButtons::LEFT) {
            suppressed |= ControllerButtons::RIGHT;
        }
        if self.contains(ControllerButtons::RIGHT) {
            suppressed |= ControllerButtons::LEFT;
        }
        suppressed
    }
}

impl Serialize for ControllerButtons {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.bits().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ControllerButtons {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let bits = u8::deserialize(deserializer)?;
        Ok(ControllerButtons::from_bits_truncate(bits))
    }
}

/// Held-button state for one controller, fed by key up/down events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControllerState {
    held: ControllerButtons,
}

impl ControllerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Press a button, releasing any opposing D-pad direction
    pub fn press(&mut self, button: ControllerButtons) {
        self.held |= button;
        self.held &= !button.suppresses();
    }

    pub fn release(&mut self, button: ControllerButtons) {
        self.held &= !button;
    }

    pub fn clear(&mut self) {
        self.held = ControllerButtons::empty();
    }

    pub fn buttons(&self) -> ControllerButtons {
        self.held
    }

    /// Raw bitmask sent to the worker
    pub fn bits(&self) -> u8 {
        self.held.bits()
    }
}
