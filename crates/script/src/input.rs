//! Input state fed to the machine once per cycle
//!
//! Two sources exist: the window (keyboard, controllers, mouse on the touch
//! screen) accumulated in [`ControlState`], and the scripted
//! [`InputSnapshot`], which is applied once and then cleared.

use crate::ScriptError;
use emu_core::types::{SCREEN_HEIGHT, SCREEN_WIDTH};
use emu_core::{Keypad, System};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Number of key flags in a snapshot.
pub const KEY_COUNT: usize = 16;

/// An integer or a boolean; scripts send either.
#[derive(Deserialize)]
#[serde(untagged)]
enum Flag {
    Int(i32),
    Bool(bool),
}

impl Flag {
    fn value(self) -> i32 {
        match self {
            Flag::Int(v) => v,
            Flag::Bool(b) => b as i32,
        }
    }
}

/// Accept `0`/`1`/`2` as well as `true`/`false` for pointer flags.
fn int_or_bool<'de, D>(deserializer: D) -> Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    Flag::deserialize(deserializer).map(Flag::value)
}

/// At least 16 flags, each an integer or a boolean; extra entries are ignored.
fn key_flags<'de, D>(deserializer: D) -> Result<[bool; KEY_COUNT], D::Error>
where
    D: Deserializer<'de>,
{
    let flags = Vec::<Flag>::deserialize(deserializer)?;
    if flags.len() < KEY_COUNT {
        return Err(D::Error::invalid_length(flags.len(), &"at least 16 key flags"));
    }
    let mut keys = [false; KEY_COUNT];
    for (key, flag) in keys.iter_mut().zip(flags) {
        *key = flag.value() != 0;
    }
    Ok(keys)
}

/// Touch pointer. `down` becomes 2 once the press has been latched; a
/// non-zero `click` releases the touch on the next cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pointer {
    pub x: i64,
    pub y: i64,
    #[serde(deserialize_with = "int_or_bool")]
    pub click: i32,
    #[serde(deserialize_with = "int_or_bool")]
    pub down: i32,
}

impl Pointer {
    /// Forward the pointer to the touch panel.
    pub fn latch<S: System>(&mut self, system: &mut S) {
        if self.down != 0 {
            let x = self.x.clamp(0, SCREEN_WIDTH as i64 - 1) as u16;
            let y = self.y.clamp(0, SCREEN_HEIGHT as i64 - 1) as u16;
            system.set_touch(x, y);
            self.down = 2;
        }
        if self.click != 0 {
            system.release_touch();
            self.click = 0;
        }
    }
}

/// Input injected by a script, as exchanged with `get_input`/`set_input`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSnapshot {
    #[serde(flatten)]
    pub pointer: Pointer,
    #[serde(deserialize_with = "key_flags")]
    pub keys: [bool; KEY_COUNT],
}

impl InputSnapshot {
    /// Parse a script dictionary: `x`, `y`, `click`, `down` and `keys`, of
    /// which the first 16 are used.
    pub fn from_value(value: &Value) -> Result<Self, ScriptError> {
        serde_json::from_value(value.clone()).map_err(|e| ScriptError::Input(e.to_string()))
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    pub fn keypad(&self) -> Keypad {
        Keypad::from_flags(&self.keys)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Input gathered from the window between cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlState {
    pub pointer: Pointer,
    pub keypad: Keypad,
    /// The window asked to close.
    pub quit: bool,
    pub focused: bool,
    /// Run unthrottled.
    pub boost: bool,
    /// Block in the event pump while the window is unfocused.
    pub auto_pause: bool,
}

impl ControlState {
    pub fn new(auto_pause: bool) -> Self {
        Self {
            pointer: Pointer::default(),
            keypad: Keypad::default(),
            quit: false,
            focused: true,
            boost: false,
            auto_pause,
        }
    }

    /// True when the event pump should block for the next event.
    pub fn paused(&self) -> bool {
        self.auto_pause && !self.focused && !self.quit
    }
}

impl Default for ControlState {
    fn default() -> Self {
        Self::new(false)
    }
}
