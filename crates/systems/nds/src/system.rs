//! Machine implementation of [`emu_core::System`]

use crate::bus::{Bus, BusSnapshot};
use crate::cartridge::{Cartridge, FirmwareLanguage, SaveType, HEADER_SIZE};
use crate::slot2::GbaCartridge;
use crate::video::Video;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use emu_core::logging::{log, LogCategory, LogLevel};
use emu_core::types::{SCREEN_HEIGHT, SCREEN_WIDTH};
use emu_core::{AccessWidth, Keypad, Processor, System};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Where the boot process leaves a copy of the cartridge header.
const HEADER_COPY_ADDR: u32 = 0x027F_FE00;
/// Firmware user settings as copied to main RAM by the boot process.
const USER_SETTINGS_ADDR: u32 = 0x027F_FC80;
/// Language field inside the user settings (bits 0-2).
const USER_LANGUAGE_OFFSET: u32 = 0x64;

const STATE_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum NdsError {
    #[error("ROM image too small: {0} bytes (header alone is 512)")]
    RomTooSmall(usize),
    #[error("{proc} binary at offset {offset:#X} (size {size:#X}) extends past the end of the ROM")]
    BinaryOutOfRom {
        proc: Processor,
        offset: u32,
        size: u32,
    },
    #[error("{proc} binary cannot be loaded at {addr:#010X} (size {size:#X})")]
    BadLoadAddress {
        proc: Processor,
        addr: u32,
        size: u32,
    },
    #[error("No cartridge loaded")]
    NoCartridge,
    #[error("GBA ROM image must be 1 byte to 32 MiB, found {0} bytes")]
    BadGbaRom(usize),
}

/// Settings applied when a cartridge is loaded.
#[derive(Debug, Clone, Copy, Default)]
pub struct NdsConfig {
    pub save_type: SaveType,
    /// `None` keeps the firmware default.
    pub firmware_language: Option<FirmwareLanguage>,
}

#[derive(Serialize, Deserialize)]
struct MachineState {
    version: u32,
    frame: u64,
    keys: u16,
    touch: Option<(u16, u16)>,
    backup: Option<String>,
    bus: BusSnapshot,
}

pub struct NdsSystem {
    config: NdsConfig,
    bus: Bus,
    video: Video,
    cartridge: Option<Cartridge>,
    backup: Option<Vec<u8>>,
    frame: u64,
    skip_render: bool,
    touch: Option<(u16, u16)>,
    code_cache_flushes: u64,
}

impl NdsSystem {
    pub fn new(config: NdsConfig) -> Self {
        Self {
            config,
            bus: Bus::new(),
            video: Video::new(),
            cartridge: None,
            backup: None,
            frame: 0,
            skip_render: false,
            touch: None,
            code_cache_flushes: 0,
        }
    }

    pub fn config(&self) -> NdsConfig {
        self.config
    }

    pub fn cartridge(&self) -> Option<&Cartridge> {
        self.cartridge.as_ref()
    }

    /// Frames emulated since the cartridge was loaded.
    pub fn frame_count(&self) -> u64 {
        self.frame
    }

    /// Current touch panel contact, if any.
    pub fn touch_position(&self) -> Option<(u16, u16)> {
        self.touch
    }

    pub fn keypad(&self) -> Keypad {
        self.bus.keys()
    }

    pub fn backup(&self) -> Option<&[u8]> {
        self.backup.as_deref()
    }

    pub fn code_cache_flushes(&self) -> u64 {
        self.code_cache_flushes
    }

    /// Put a cartridge in slot 2. It survives resets and ROM loads.
    pub fn insert_gba_cartridge(&mut self, cart: GbaCartridge) {
        log(LogCategory::Cartridge, LogLevel::Info, || {
            format!("slot 2: GBA cartridge ({} bytes)", cart.rom_len())
        });
        self.bus.insert_gba(cart);
    }

    pub fn gba_cartridge(&self) -> Option<&GbaCartridge> {
        self.bus.gba()
    }

    fn boot(&mut self, cart: &Cartridge) {
        self.bus
            .load_block(Processor::Arm9, HEADER_COPY_ADDR, &cart.header_bytes()[..HEADER_SIZE]);

        for proc in [Processor::Arm9, Processor::Arm7] {
            let bin = cart.header.binary(proc);
            self.bus.load_block(proc, bin.ram_address, cart.binary(proc));
            log(LogCategory::Cartridge, LogLevel::Debug, || {
                format!(
                    "{} binary: {:#X} bytes at {:#010X}, entry {:#010X}",
                    proc, bin.size, bin.ram_address, bin.entry
                )
            });
        }

        if let Some(lang) = self.config.firmware_language {
            let addr = USER_SETTINGS_ADDR + USER_LANGUAGE_OFFSET;
            let old = self.bus.read(Processor::Arm9, addr, AccessWidth::Half);
            let value = (old & !0x7) | lang.index() as u32;
            self.bus.write(Processor::Arm9, addr, value, AccessWidth::Half);
        }
    }
}

impl Default for NdsSystem {
    fn default() -> Self {
        Self::new(NdsConfig::default())
    }
}

impl System for NdsSystem {
    type Error = NdsError;

    fn reset(&mut self) {
        self.bus.reset();
        self.video.reset();
        self.cartridge = None;
        self.backup = None;
        self.frame = 0;
        self.skip_render = false;
        self.touch = None;
    }

    fn load_rom(&mut self, rom: &[u8]) -> Result<(), Self::Error> {
        let cart = Cartridge::from_bytes(rom)?;
        if !cart.header_crc_ok() {
            log(LogCategory::Cartridge, LogLevel::Warn, || {
                format!("header checksum mismatch for '{}'", cart.header.title)
            });
        }
        log(LogCategory::Cartridge, LogLevel::Info, || {
            format!(
                "loaded '{}' [{}] maker {} ({} bytes, {} KiB chip), save type {}",
                cart.header.title,
                cart.header.game_code,
                cart.header.maker_code,
                cart.len(),
                cart.header.chip_size() / 1024,
                self.config.save_type.name()
            )
        });

        self.reset();
        self.boot(&cart);
        self.backup = self
            .config
            .save_type
            .backup_size()
            .map(|size| vec![0xFF; size]);
        self.cartridge = Some(cart);
        Ok(())
    }

    fn step_frame(&mut self) -> Result<(), Self::Error> {
        if self.cartridge.is_none() {
            return Err(NdsError::NoCartridge);
        }
        self.frame += 1;
        if std::mem::take(&mut self.skip_render) {
            return Ok(());
        }
        self.video.render(&self.bus);
        Ok(())
    }

    fn skip_next_frame(&mut self) {
        self.skip_render = true;
    }

    fn screens(&self) -> [&[u16]; 2] {
        self.video.screens()
    }

    fn set_keypad(&mut self, keys: Keypad) {
        self.bus.set_keys(keys);
    }

    fn set_touch(&mut self, x: u16, y: u16) {
        let x = x.min(SCREEN_WIDTH as u16 - 1);
        let y = y.min(SCREEN_HEIGHT as u16 - 1);
        self.touch = Some((x, y));
        self.bus.set_pen_down(true);
    }

    fn release_touch(&mut self) {
        self.touch = None;
        self.bus.set_pen_down(false);
    }

    fn read(&mut self, proc: Processor, addr: u32, width: AccessWidth) -> u32 {
        self.bus.read(proc, addr, width)
    }

    fn write_external(
        &mut self,
        proc: Processor,
        addr: u32,
        value: u32,
        width: AccessWidth,
    ) -> bool {
        self.bus.write(proc, addr, value & width.mask(), width)
    }

    fn flush_code_cache(&mut self) {
        self.code_cache_flushes += 1;
    }

    fn save_state(&self) -> Value {
        let state = MachineState {
            version: STATE_VERSION,
            frame: self.frame,
            keys: self.bus.keys().0,
            touch: self.touch,
            backup: self.backup.as_ref().map(|b| BASE64.encode(b)),
            bus: self.bus.snapshot(),
        };
        serde_json::to_value(state).unwrap_or(Value::Null)
    }

    fn load_state(&mut self, v: &Value) -> Result<(), serde_json::Error> {
        use serde::de::Error as _;

        let state: MachineState = serde_json::from_value(v.clone())?;
        if state.version != STATE_VERSION {
            return Err(serde_json::Error::custom(format!(
                "unsupported state version {}",
                state.version
            )));
        }
        let backup = state
            .backup
            .map(|b| BASE64.decode(b))
            .transpose()
            .map_err(serde_json::Error::custom)?;
        self.bus.restore(&state.bus).map_err(serde_json::Error::custom)?;

        self.frame = state.frame;
        self.bus.set_keys(Keypad(state.keys));
        match state.touch {
            Some((x, y)) => self.set_touch(x, y),
            None => self.release_touch(),
        }
        if backup.is_some() {
            self.backup = backup;
        }
        self.video.render(&self.bus);
        Ok(())
    }

    fn supports_save_states(&self) -> bool {
        true
    }
}
