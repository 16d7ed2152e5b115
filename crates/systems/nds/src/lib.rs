//! Dual-screen handheld machine model
//!
//! A bus-level model of the console: both processors' memory maps, the
//! cartridge loader, keypad/touch registers and the display modes that need
//! no rendering engine. There are no CPU cores; the machine is driven
//! entirely from outside (scripts, the frontend), which makes it the
//! reference [`emu_core::System`] for the scripting bridge.
//!
//! # Architecture
//!
//! - **CPUs**: ARM946E-S (ARM9) and ARM7TDMI (ARM7), address maps only
//! - **Main RAM**: 4 MiB shared
//! - **WRAM**: 32 KiB shared (split by WRAMCNT) + 64 KiB ARM7
//! - **TCM**: 32 KiB ITCM, 16 KiB DTCM (ARM9)
//! - **Screens**: 2x 256x192, BGR555
//! - **Slot 2**: optional GBA cartridge (ROM + 64 KiB SRAM)

mod bus;
mod cartridge;
mod slot2;
mod system;
mod video;

pub use bus::{DTCM_BASE, MAIN_RAM_SIZE, VRAM_LCDC_BASE};
pub use cartridge::{crc16, BinaryDescriptor, Cartridge, FirmwareLanguage, Header, SaveType};
pub use slot2::{GbaCartridge, GBA_ROM_MAX, GBA_SRAM_SIZE};
pub use system::{NdsConfig, NdsError, NdsSystem};
pub use video::Engine;
