use emu_core::Button;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Keyboard binding per keypad slot, as SDL key names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyMapping {
    pub a: String,
    pub b: String,
    pub select: String,
    pub start: String,
    pub right: String,
    pub left: String,
    pub up: String,
    pub down: String,
    pub r: String,
    pub l: String,
    pub x: String,
    pub y: String,
    pub debug: String,
    pub boost: String,
    pub lid: String,
}

impl Default for KeyMapping {
    fn default() -> Self {
        Self {
            a: "X".to_string(),
            b: "Z".to_string(),
            select: "Right Shift".to_string(),
            start: "Return".to_string(),
            right: "Right".to_string(),
            left: "Left".to_string(),
            up: "Up".to_string(),
            down: "Down".to_string(),
            r: "W".to_string(),
            l: "Q".to_string(),
            x: "S".to_string(),
            y: "A".to_string(),
            debug: "P".to_string(),
            boost: "O".to_string(),
            lid: "Backspace".to_string(),
        }
    }
}

impl KeyMapping {
    /// Key name bound to each button, in keypad slot order.
    pub fn bindings(&self) -> [(Button, &str); 15] {
        [
            (Button::A, self.a.as_str()),
            (Button::B, self.b.as_str()),
            (Button::Select, self.select.as_str()),
            (Button::Start, self.start.as_str()),
            (Button::Right, self.right.as_str()),
            (Button::Left, self.left.as_str()),
            (Button::Up, self.up.as_str()),
            (Button::Down, self.down.as_str()),
            (Button::R, self.r.as_str()),
            (Button::L, self.l.as_str()),
            (Button::X, self.x.as_str()),
            (Button::Y, self.y.as_str()),
            (Button::Debug, self.debug.as_str()),
            (Button::Boost, self.boost.as_str()),
            (Button::Lid, self.lid.as_str()),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub keyboard: KeyMapping,
    pub scale: u32,
    pub horizontal: bool,
    /// Directory for save-state slots; `saves/` beside the executable if unset.
    pub saves_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            keyboard: KeyMapping::default(),
            scale: 1,
            horizontal: false,
            saves_dir: None,
        }
    }
}

impl Settings {
    /// Get the config file path relative to the executable
    pub fn config_path() -> PathBuf {
        let mut path = std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("."));
        path.push("config.json");
        path
    }

    /// Load settings from config.json, falling back to defaults on error
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(settings) => settings,
                Err(e) => {
                    log::warn!(
                        "Failed to parse {}: {}. Using defaults.",
                        path.display(),
                        e
                    );
                    Self::default()
                }
            },
            // Missing file: defaults
            Err(_) => Self::default(),
        }
    }

    #[cfg(test)]
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("hemu_ds_settings_{}_{}.json", name, std::process::id()))
    }

    #[test]
    fn default_bindings_follow_slot_order() {
        let keys = KeyMapping::default();
        let bindings = keys.bindings();
        assert_eq!(bindings[0], (Button::A, "X"));
        assert_eq!(bindings[2], (Button::Select, "Right Shift"));
        assert_eq!(bindings[14], (Button::Lid, "Backspace"));
        for (i, (button, _)) in bindings.iter().enumerate() {
            assert_eq!(*button as usize, i);
        }
    }

    #[test]
    fn save_and_load() {
        let path = temp_path("roundtrip");
        let mut settings = Settings {
            scale: 3,
            horizontal: true,
            ..Default::default()
        };
        settings.keyboard.start = "Space".to_string();
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(&path);
        assert_eq!(loaded, settings);
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let path = temp_path("partial");
        fs::write(&path, r#"{"scale": 2, "keyboard": {"a": "K"}}"#).unwrap();
        let loaded = Settings::load_from(&path);
        assert_eq!(loaded.scale, 2);
        assert_eq!(loaded.keyboard.a, "K");
        assert_eq!(loaded.keyboard.b, "Z");
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn broken_or_missing_file_falls_back() {
        let path = temp_path("broken");
        fs::write(&path, "not json").unwrap();
        assert_eq!(Settings::load_from(&path), Settings::default());
        fs::remove_file(&path).unwrap();
        assert_eq!(Settings::load_from(&path), Settings::default());
    }
}
