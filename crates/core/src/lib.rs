//! Core emulator primitives and traits shared by the scripting bridge and
//! the frontends.

pub mod logging;

pub mod types {
    /// Native width of one screen in pixels.
    pub const SCREEN_WIDTH: usize = 256;
    /// Native height of one screen in pixels.
    pub const SCREEN_HEIGHT: usize = 192;
    /// Pixels in one screen buffer.
    pub const SCREEN_PIXELS: usize = SCREEN_WIDTH * SCREEN_HEIGHT;

    /// White in the 15-bit BGR format the screens use.
    pub const BGR555_WHITE: u16 = 0x7FFF;
}

use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Invalid arguments at the memory access boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArgumentError {
    #[error("Invalid target processor : supported values are arm7 and arm9")]
    InvalidProcessor(String),
    #[error("Invalid data length : supported values are 1, 2, and 4")]
    InvalidWidth(i64),
}

/// One of the two CPU cores of the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Processor {
    Arm7,
    Arm9,
}

impl Processor {
    pub fn name(self) -> &'static str {
        match self {
            Processor::Arm7 => "arm7",
            Processor::Arm9 => "arm9",
        }
    }
}

impl FromStr for Processor {
    type Err = ArgumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "arm7" => Ok(Processor::Arm7),
            "arm9" => Ok(Processor::Arm9),
            other => Err(ArgumentError::InvalidProcessor(other.to_string())),
        }
    }
}

impl fmt::Display for Processor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Width of a single guest memory access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessWidth {
    Byte,
    Half,
    Word,
}

impl AccessWidth {
    pub fn bytes(self) -> u32 {
        match self {
            AccessWidth::Byte => 1,
            AccessWidth::Half => 2,
            AccessWidth::Word => 4,
        }
    }

    /// Mask keeping only the bits a value of this width can carry.
    pub fn mask(self) -> u32 {
        match self {
            AccessWidth::Byte => 0xFF,
            AccessWidth::Half => 0xFFFF,
            AccessWidth::Word => 0xFFFF_FFFF,
        }
    }

    /// Clear the low address bits the bus ignores for this width.
    pub fn align(self, addr: u32) -> u32 {
        addr & !(self.bytes() - 1)
    }
}

impl TryFrom<i64> for AccessWidth {
    type Error = ArgumentError;

    fn try_from(len: i64) -> Result<Self, Self::Error> {
        match len {
            1 => Ok(AccessWidth::Byte),
            2 => Ok(AccessWidth::Half),
            4 => Ok(AccessWidth::Word),
            other => Err(ArgumentError::InvalidWidth(other)),
        }
    }
}

/// Keypad slots, numbered the way the keyboard config and scripts index them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Button {
    A = 0,
    B = 1,
    Select = 2,
    Start = 3,
    Right = 4,
    Left = 5,
    Up = 6,
    Down = 7,
    R = 8,
    L = 9,
    X = 10,
    Y = 11,
    Debug = 12,
    Boost = 13,
    Lid = 14,
}

impl Button {
    pub const ALL: [Button; 15] = [
        Button::A,
        Button::B,
        Button::Select,
        Button::Start,
        Button::Right,
        Button::Left,
        Button::Up,
        Button::Down,
        Button::R,
        Button::L,
        Button::X,
        Button::Y,
        Button::Debug,
        Button::Boost,
        Button::Lid,
    ];

    pub fn bit(self) -> u16 {
        1 << (self as u8)
    }
}

/// Pressed-button bit set; bit `n` is slot `n` of [`Button`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Keypad(pub u16);

impl Keypad {
    pub fn is_pressed(self, button: Button) -> bool {
        self.0 & button.bit() != 0
    }

    pub fn set(&mut self, button: Button, pressed: bool) {
        if pressed {
            self.0 |= button.bit();
        } else {
            self.0 &= !button.bit();
        }
    }

    /// Build a keypad from 16 per-slot flags.
    pub fn from_flags(flags: &[bool; 16]) -> Self {
        let bits = flags
            .iter()
            .enumerate()
            .filter(|(_, &pressed)| pressed)
            .fold(0u16, |acc, (i, _)| acc | (1 << i));
        Keypad(bits)
    }
}

/// The emulated machine as the bridge sees it.
///
/// Everything behind this trait (CPU cores, rasterizer, audio) belongs to the
/// implementing crate; the bridge only loads, steps, pokes and presents.
pub trait System {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Reset to initial power-on state, unloading any cartridge.
    fn reset(&mut self);

    /// Load a cartridge image and boot it.
    fn load_rom(&mut self, rom: &[u8]) -> Result<(), Self::Error>;

    /// Emulate one video frame.
    fn step_frame(&mut self) -> Result<(), Self::Error>;

    /// Emulate the next frame without rendering it.
    fn skip_next_frame(&mut self);

    /// Top and bottom screens, 15-bit BGR, `SCREEN_PIXELS` each.
    fn screens(&self) -> [&[u16]; 2];

    fn set_keypad(&mut self, keys: Keypad);

    /// Press the touch panel at native screen coordinates.
    fn set_touch(&mut self, x: u16, y: u16);

    fn release_touch(&mut self);

    /// Read guest memory as seen by `proc`.
    fn read(&mut self, proc: Processor, addr: u32, width: AccessWidth) -> u32;

    /// Write guest memory from outside the emulated program.
    ///
    /// Returns true when the write may have modified code, i.e. the core must
    /// flush whatever it caches about translated code before running again.
    fn write_external(&mut self, proc: Processor, addr: u32, value: u32, width: AccessWidth)
        -> bool;

    /// Drop cached translated code.
    fn flush_code_cache(&mut self);

    /// Return a JSON-serializable save state.
    /// Save states do not include ROM data.
    fn save_state(&self) -> Value;

    /// Load a JSON save state.
    fn load_state(&mut self, v: &Value) -> Result<(), serde_json::Error>;

    fn supports_save_states(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn processor_parsing_is_exact() {
        assert_eq!("arm7".parse::<Processor>(), Ok(Processor::Arm7));
        assert_eq!("arm9".parse::<Processor>(), Ok(Processor::Arm9));
        assert!(matches!(
            "ARM9".parse::<Processor>(),
            Err(ArgumentError::InvalidProcessor(_))
        ));
        assert!("arm11".parse::<Processor>().is_err());
        assert!("".parse::<Processor>().is_err());
    }

    #[test]
    fn access_width_accepts_only_1_2_4() {
        assert_eq!(AccessWidth::try_from(1), Ok(AccessWidth::Byte));
        assert_eq!(AccessWidth::try_from(2), Ok(AccessWidth::Half));
        assert_eq!(AccessWidth::try_from(4), Ok(AccessWidth::Word));
        for bad in [0, 3, 8, -1, i64::MAX] {
            assert_eq!(AccessWidth::try_from(bad), Err(ArgumentError::InvalidWidth(bad)));
        }
    }

    #[test]
    fn access_width_mask_and_align() {
        assert_eq!(AccessWidth::Byte.mask(), 0xFF);
        assert_eq!(AccessWidth::Half.mask(), 0xFFFF);
        assert_eq!(AccessWidth::Word.mask(), u32::MAX);
        assert_eq!(AccessWidth::Byte.align(0x0200_0003), 0x0200_0003);
        assert_eq!(AccessWidth::Half.align(0x0200_0003), 0x0200_0002);
        assert_eq!(AccessWidth::Word.align(0x0200_0003), 0x0200_0000);
    }

    #[test]
    fn error_messages_are_exact() {
        assert_eq!(
            ArgumentError::InvalidWidth(3).to_string(),
            "Invalid data length : supported values are 1, 2, and 4"
        );
        assert_eq!(
            ArgumentError::InvalidProcessor("x".into()).to_string(),
            "Invalid target processor : supported values are arm7 and arm9"
        );
    }

    #[test]
    fn keypad_from_flags() {
        let mut flags = [false; 16];
        flags[Button::A as usize] = true;
        flags[Button::Lid as usize] = true;
        let keys = Keypad::from_flags(&flags);
        assert!(keys.is_pressed(Button::A));
        assert!(keys.is_pressed(Button::Lid));
        assert!(!keys.is_pressed(Button::B));
        assert_eq!(keys.0, 0b0100_0000_0000_0001);
    }

    #[test]
    fn keypad_set_and_clear() {
        let mut keys = Keypad::default();
        keys.set(Button::Start, true);
        keys.set(Button::Up, true);
        keys.set(Button::Start, false);
        assert!(!keys.is_pressed(Button::Start));
        assert!(keys.is_pressed(Button::Up));
    }
}
