//! Save-state slots on disk
//!
//! Each ROM gets `<dir>/<sha256>/states.json` holding up to
//! [`MAX_SAVE_SLOTS`] base64-encoded machine states.

use crate::ScriptError;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Maximum number of save slots per game
pub const MAX_SAVE_SLOTS: u8 = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveSlot {
    pub data: String,
    pub timestamp: u64,
    #[serde(default)]
    pub rom_hash: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GameSaves {
    pub slots: BTreeMap<u8, SaveSlot>,
}

fn check_slot(slot: u8) -> Result<(), ScriptError> {
    if !(1..=MAX_SAVE_SLOTS).contains(&slot) {
        return Err(ScriptError::State(format!(
            "Slot must be between 1 and {}",
            MAX_SAVE_SLOTS
        )));
    }
    Ok(())
}

impl GameSaves {
    /// SHA-256 of the ROM image, lowercase hex
    pub fn rom_hash(rom_data: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(rom_data);
        format!("{:x}", hasher.finalize())
    }

    /// `saves/` beside the executable
    pub fn default_dir() -> PathBuf {
        let mut path = std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("."));
        path.push("saves");
        path
    }

    pub fn game_save_path(dir: &Path, rom_hash: &str) -> PathBuf {
        dir.join(rom_hash).join("states.json")
    }

    /// Load saves for a game; unreadable files yield no saves.
    pub fn load(dir: &Path, rom_hash: &str) -> Self {
        let path = Self::game_save_path(dir, rom_hash);
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(saves) => saves,
                Err(e) => {
                    log::warn!(
                        "Failed to parse save file {}: {}. Using empty saves.",
                        path.display(),
                        e
                    );
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self, dir: &Path, rom_hash: &str) -> Result<(), ScriptError> {
        let path = Self::game_save_path(dir, rom_hash);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(&path, contents)?;
        Ok(())
    }

    /// Store `data` in `slot` and write the file.
    pub fn save_slot(
        &mut self,
        dir: &Path,
        slot: u8,
        data: &[u8],
        rom_hash: &str,
    ) -> Result<(), ScriptError> {
        check_slot(slot)?;

        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        self.slots.insert(
            slot,
            SaveSlot {
                data: BASE64.encode(data),
                timestamp,
                rom_hash: Some(rom_hash.to_string()),
            },
        );
        self.save(dir, rom_hash)
    }

    /// Fetch the payload of `slot`, refusing states made with another ROM.
    pub fn load_slot(&self, slot: u8, current_rom_hash: &str) -> Result<Vec<u8>, ScriptError> {
        check_slot(slot)?;

        let save_slot = self
            .slots
            .get(&slot)
            .ok_or_else(|| ScriptError::State(format!("No save data in slot {}", slot)))?;

        if let Some(saved_hash) = &save_slot.rom_hash {
            if saved_hash != current_rom_hash {
                return Err(ScriptError::State(
                    "ROM hash mismatch: save state was created with a different ROM".to_string(),
                ));
            }
        }

        BASE64
            .decode(&save_slot.data)
            .map_err(|e| ScriptError::State(format!("corrupt slot {}: {}", slot, e)))
    }

    pub fn has_slot(&self, slot: u8) -> bool {
        self.slots.contains_key(&slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("hemu_ds_saves_{}_{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn rom_hash_is_stable_hex() {
        let hash = GameSaves::rom_hash(b"test rom data");
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, GameSaves::rom_hash(b"test rom data"));
        assert_ne!(hash, GameSaves::rom_hash(b"other rom"));
    }

    #[test]
    fn save_and_reload_slot() {
        let dir = test_dir("roundtrip");
        let mut saves = GameSaves::default();
        let data = b"\x00\x01\x02\xFF\xFE\xFD";
        saves.save_slot(&dir, 2, data, "hash_a").unwrap();

        let loaded = GameSaves::load(&dir, "hash_a");
        assert!(loaded.has_slot(2));
        assert!(!loaded.has_slot(1));
        assert_eq!(loaded.load_slot(2, "hash_a").unwrap(), data);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn slot_bounds_and_empty_slots() {
        let saves = GameSaves::default();
        assert!(saves.load_slot(0, "h").is_err());
        assert!(saves.load_slot(6, "h").is_err());
        let err = saves.load_slot(3, "h").unwrap_err();
        assert!(err.to_string().contains("No save data in slot 3"));
        assert_eq!(err.kind(), "state_error");
    }

    #[test]
    fn rejects_state_from_other_rom() {
        let dir = test_dir("mismatch");
        let mut saves = GameSaves::default();
        saves.save_slot(&dir, 1, b"state", "original").unwrap();
        let err = saves.load_slot(1, "different").unwrap_err();
        assert!(err.to_string().contains("ROM hash mismatch"));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn corrupt_file_loads_empty() {
        let dir = test_dir("corrupt");
        let path = GameSaves::game_save_path(&dir, "h");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{not json").unwrap();
        assert!(GameSaves::load(&dir, "h").slots.is_empty());
        fs::remove_dir_all(&dir).unwrap();
    }
}
