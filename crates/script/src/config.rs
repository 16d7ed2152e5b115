//! Run configuration shared by the CLI, the protocol server and scripts.

use crate::timing::DEFAULT_FPS;
use crate::ScriptError;
use serde::{Deserialize, Serialize};

/// Save types accepted for the cartridge backup chip.
pub const SAVE_TYPE_COUNT: i64 = 7;
/// Firmware languages accepted.
pub const FIRMWARE_LANGUAGE_COUNT: i64 = 6;
/// Largest window scale factor.
pub const MAX_SCALE: u32 = 16;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Frames emulated without rendering after each presented one.
    pub frameskip: i64,
    pub scale: u32,
    /// Screens side by side instead of stacked.
    pub horizontal: bool,
    /// Limiter target; 0 runs unthrottled.
    pub fps_limit: u32,
    pub disable_limiter: bool,
    pub auto_pause: bool,
    /// Save-state slot restored right after the ROM is loaded.
    pub load_slot: Option<u8>,
    pub save_type: i64,
    /// `None` keeps the firmware default.
    pub firmware_language: Option<i64>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            frameskip: 0,
            scale: 1,
            horizontal: false,
            fps_limit: DEFAULT_FPS,
            disable_limiter: false,
            auto_pause: false,
            load_slot: None,
            save_type: 0,
            firmware_language: None,
        }
    }
}

impl RunConfig {
    pub fn validate(&self) -> Result<(), ScriptError> {
        if !(0..SAVE_TYPE_COUNT).contains(&self.save_type) {
            return Err(ScriptError::Config(
                "Accepted savetypes are from 0 to 6.".to_string(),
            ));
        }
        if let Some(lang) = self.firmware_language {
            if !(0..FIRMWARE_LANGUAGE_COUNT).contains(&lang) {
                return Err(ScriptError::Config(
                    "Firmware language must be set to a value from 0 to 5.".to_string(),
                ));
            }
        }
        if self.frameskip < 0 {
            return Err(ScriptError::Config("Frameskip must be >= 0.".to_string()));
        }
        if !(1..=MAX_SCALE).contains(&self.scale) {
            return Err(ScriptError::Config(format!(
                "Scale must be from 1 to {}.",
                MAX_SCALE
            )));
        }
        Ok(())
    }

    /// Frameskip as a loop count; negative values count as zero.
    pub fn frameskip(&self) -> u32 {
        self.frameskip.clamp(0, u32::MAX as i64) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = RunConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.fps_limit, 60);
        assert_eq!(cfg.scale, 1);
    }

    #[test]
    fn validation_messages() {
        let msg = |cfg: RunConfig| cfg.validate().unwrap_err().to_string();
        assert!(msg(RunConfig { save_type: 7, ..Default::default() })
            .contains("Accepted savetypes are from 0 to 6."));
        assert!(msg(RunConfig { firmware_language: Some(6), ..Default::default() })
            .contains("Firmware language must be set to a value from 0 to 5."));
        assert!(msg(RunConfig { frameskip: -1, ..Default::default() })
            .contains("Frameskip must be >= 0."));
        assert!(msg(RunConfig { scale: 0, ..Default::default() })
            .contains("Scale must be from 1 to 16."));
        assert!(msg(RunConfig { scale: 20_000_000, ..Default::default() })
            .contains("Scale must be from 1 to 16."));
        assert!(RunConfig { scale: MAX_SCALE, ..Default::default() }.validate().is_ok());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let cfg: RunConfig = serde_json::from_str(r#"{"frameskip": 2, "horizontal": true}"#).unwrap();
        assert_eq!(cfg.frameskip(), 2);
        assert!(cfg.horizontal);
        assert_eq!(cfg.fps_limit, 60);
        assert_eq!(cfg.load_slot, None);
    }
}
