//! GBA cartridge in slot 2
//!
//! Both processors see the cartridge ROM at 0x08000000-0x09FFFFFF and its
//! battery-backed SRAM, 8 bits wide, at 0x0A000000-0x0A00FFFF. The SRAM is
//! persisted next to the ROM image with a `.sav` extension.

use crate::system::NdsError;
use std::path::{Path, PathBuf};

/// Largest ROM the slot can address.
pub const GBA_ROM_MAX: usize = 32 * 1024 * 1024;
pub const GBA_SRAM_SIZE: usize = 64 * 1024;

pub struct GbaCartridge {
    rom: Vec<u8>,
    sram: Vec<u8>,
    sram_dirty: bool,
}

impl GbaCartridge {
    pub fn new(rom: Vec<u8>) -> Result<Self, NdsError> {
        if rom.is_empty() || rom.len() > GBA_ROM_MAX {
            return Err(NdsError::BadGbaRom(rom.len()));
        }
        Ok(Self {
            rom,
            sram: vec![0xFF; GBA_SRAM_SIZE],
            sram_dirty: false,
        })
    }

    /// Preload SRAM from a `.sav` image; a short image leaves the rest erased.
    pub fn with_sram(mut self, data: &[u8]) -> Self {
        let len = data.len().min(GBA_SRAM_SIZE);
        self.sram[..len].copy_from_slice(&data[..len]);
        self
    }

    /// SRAM file for a ROM image: the extension is replaced by `.sav`.
    pub fn save_path(rom_path: &Path) -> PathBuf {
        rom_path.with_extension("sav")
    }

    pub fn rom_len(&self) -> usize {
        self.rom.len()
    }

    pub fn sram(&self) -> &[u8] {
        &self.sram
    }

    /// SRAM was written since the cartridge was inserted.
    pub fn sram_dirty(&self) -> bool {
        self.sram_dirty
    }

    /// Past the end of the image the slot reads open bus.
    pub(crate) fn read_rom(&self, offset: usize) -> u8 {
        self.rom.get(offset).copied().unwrap_or(0xFF)
    }

    pub(crate) fn read_sram(&self, offset: usize) -> u8 {
        self.sram[offset & (GBA_SRAM_SIZE - 1)]
    }

    pub(crate) fn write_sram(&mut self, offset: usize, value: u8) -> bool {
        let cell = &mut self.sram[offset & (GBA_SRAM_SIZE - 1)];
        let changed = std::mem::replace(cell, value) != value;
        self.sram_dirty |= changed;
        changed
    }
}
