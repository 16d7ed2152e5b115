//! Memory bus for both processors
//!
//! Each CPU sees its own address map. Regions are decoded to a backing buffer
//! and an offset; wider accesses are force-aligned and assembled little endian
//! from byte accesses so that computed registers (KEYINPUT, EXTKEYIN, WRAMCNT)
//! behave the same at every width.
//!
//! # ARM9 map
//!
//! ```text
//! 0x00000000-0x01FFFFFF  ITCM (32 KiB, mirrored)
//! 0x02000000-0x02FFFFFF  Main RAM (4 MiB, mirrored)
//! 0x027E0000-0x027E3FFF  DTCM (16 KiB, shadows main RAM)
//! 0x03000000-0x03FFFFFF  Shared WRAM, per WRAMCNT
//! 0x04000000-0x04001FFF  I/O
//! 0x05000000-0x05FFFFFF  Palette (2 KiB, mirrored)
//! 0x06800000-0x068A3FFF  VRAM in LCDC mode (656 KiB)
//! 0x07000000-0x07FFFFFF  OAM (2 KiB, mirrored)
//! 0x08000000-0x09FFFFFF  GBA slot ROM (open bus when empty)
//! 0x0A000000-0x0AFFFFFF  GBA slot SRAM (64 KiB, mirrored)
//! ```
//!
//! # ARM7 map
//!
//! ```text
//! 0x02000000-0x02FFFFFF  Main RAM
//! 0x03000000-0x037FFFFF  Shared WRAM per WRAMCNT (ARM7 WRAM mirror when none)
//! 0x03800000-0x03FFFFFF  ARM7 WRAM (64 KiB, mirrored)
//! 0x04000000-0x04001FFF  I/O
//! 0x08000000-0x0AFFFFFF  GBA slot, as for the ARM9
//! ```

use crate::slot2::GbaCartridge;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use emu_core::{AccessWidth, Button, Keypad, Processor};
use serde::{Deserialize, Serialize};

pub const MAIN_RAM_SIZE: usize = 4 * 1024 * 1024;
pub const ITCM_SIZE: usize = 32 * 1024;
pub const DTCM_SIZE: usize = 16 * 1024;
pub const DTCM_BASE: u32 = 0x027E_0000;
pub const SHARED_WRAM_SIZE: usize = 32 * 1024;
pub const ARM7_WRAM_SIZE: usize = 64 * 1024;
pub const PALETTE_SIZE: usize = 2 * 1024;
pub const VRAM_LCDC_BASE: u32 = 0x0680_0000;
pub const VRAM_LCDC_SIZE: usize = 656 * 1024;
pub const OAM_SIZE: usize = 2 * 1024;
const IO_SIZE: usize = 0x2000;
/// ROM addresses decoded in slot 2 (two 16 MiB banks).
const GBA_ROM_WINDOW: usize = 0x0200_0000;

pub const REG_DISPCNT_A: u32 = 0x000;
pub const REG_DISPCNT_B: u32 = 0x1000;
pub const REG_KEYINPUT: u32 = 0x130;
pub const REG_EXTKEYIN: u32 = 0x136;
pub const REG_WRAMSTAT: u32 = 0x241;
pub const REG_WRAMCNT: u32 = 0x247;
pub const REG_POWCNT1: u32 = 0x304;

/// WRAMCNT after boot: all shared WRAM belongs to the ARM7.
const WRAMCNT_BOOT: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Region {
    Itcm(usize),
    Dtcm(usize),
    Main(usize),
    Shared(usize),
    Arm7Wram(usize),
    Io(usize),
    Palette(usize),
    Vram(usize),
    Oam(usize),
    GbaRom(usize),
    GbaSram(usize),
    Unmapped,
}

impl Region {
    /// Memory the CPUs can fetch instructions from.
    fn is_executable(self) -> bool {
        matches!(
            self,
            Region::Itcm(_) | Region::Main(_) | Region::Shared(_) | Region::Arm7Wram(_)
        )
    }
}

pub struct Bus {
    main_ram: Vec<u8>,
    itcm: Vec<u8>,
    dtcm: Vec<u8>,
    shared_wram: Vec<u8>,
    arm7_wram: Vec<u8>,
    palette: Vec<u8>,
    vram: Vec<u8>,
    oam: Vec<u8>,
    io9: Vec<u8>,
    io7: Vec<u8>,
    wramcnt: u8,
    keys: Keypad,
    pen_down: bool,
    gba: Option<GbaCartridge>,
}

impl Bus {
    pub fn new() -> Self {
        Self {
            main_ram: vec![0; MAIN_RAM_SIZE],
            itcm: vec![0; ITCM_SIZE],
            dtcm: vec![0; DTCM_SIZE],
            shared_wram: vec![0; SHARED_WRAM_SIZE],
            arm7_wram: vec![0; ARM7_WRAM_SIZE],
            palette: vec![0; PALETTE_SIZE],
            vram: vec![0; VRAM_LCDC_SIZE],
            oam: vec![0; OAM_SIZE],
            io9: vec![0; IO_SIZE],
            io7: vec![0; IO_SIZE],
            wramcnt: WRAMCNT_BOOT,
            keys: Keypad::default(),
            pen_down: false,
            gba: None,
        }
    }

    /// Clear memory and registers. A slot-2 cartridge stays inserted.
    pub fn reset(&mut self) {
        let gba = self.gba.take();
        *self = Self::new();
        self.gba = gba;
    }

    pub fn insert_gba(&mut self, cart: GbaCartridge) -> Option<GbaCartridge> {
        self.gba.replace(cart)
    }

    pub fn gba(&self) -> Option<&GbaCartridge> {
        self.gba.as_ref()
    }

    fn locate_slot2(addr: u32) -> Region {
        match addr >> 24 {
            0x08 | 0x09 => Region::GbaRom(addr as usize & (GBA_ROM_WINDOW - 1)),
            _ => Region::GbaSram(addr as usize & 0xFFFF),
        }
    }

    fn locate(&self, proc: Processor, addr: u32) -> Region {
        match proc {
            Processor::Arm9 => self.locate_arm9(addr),
            Processor::Arm7 => self.locate_arm7(addr),
        }
    }

    fn locate_arm9(&self, addr: u32) -> Region {
        if (DTCM_BASE..DTCM_BASE + DTCM_SIZE as u32).contains(&addr) {
            return Region::Dtcm((addr - DTCM_BASE) as usize);
        }
        match addr >> 24 {
            0x00 | 0x01 => Region::Itcm(addr as usize & (ITCM_SIZE - 1)),
            0x02 => Region::Main(addr as usize & (MAIN_RAM_SIZE - 1)),
            0x03 => match self.wramcnt {
                0 => Region::Shared(addr as usize & (SHARED_WRAM_SIZE - 1)),
                1 => Region::Shared(0x4000 + (addr as usize & 0x3FFF)),
                2 => Region::Shared(addr as usize & 0x3FFF),
                _ => Region::Unmapped,
            },
            0x04 => Self::locate_io(addr),
            0x05 => Region::Palette(addr as usize & (PALETTE_SIZE - 1)),
            0x06 if (VRAM_LCDC_BASE..VRAM_LCDC_BASE + VRAM_LCDC_SIZE as u32).contains(&addr) => {
                Region::Vram((addr - VRAM_LCDC_BASE) as usize)
            }
            0x07 => Region::Oam(addr as usize & (OAM_SIZE - 1)),
            0x08..=0x0A => Self::locate_slot2(addr),
            _ => Region::Unmapped,
        }
    }

    fn locate_arm7(&self, addr: u32) -> Region {
        match addr >> 24 {
            0x02 => Region::Main(addr as usize & (MAIN_RAM_SIZE - 1)),
            0x03 if addr >= 0x0380_0000 => Region::Arm7Wram(addr as usize & (ARM7_WRAM_SIZE - 1)),
            0x03 => match self.wramcnt {
                0 => Region::Arm7Wram(addr as usize & (ARM7_WRAM_SIZE - 1)),
                1 => Region::Shared(addr as usize & 0x3FFF),
                2 => Region::Shared(0x4000 + (addr as usize & 0x3FFF)),
                _ => Region::Shared(addr as usize & (SHARED_WRAM_SIZE - 1)),
            },
            0x04 => Self::locate_io(addr),
            0x08..=0x0A => Self::locate_slot2(addr),
            _ => Region::Unmapped,
        }
    }

    fn locate_io(addr: u32) -> Region {
        let offset = (addr & 0x00FF_FFFF) as usize;
        if offset < IO_SIZE {
            Region::Io(offset)
        } else {
            Region::Unmapped
        }
    }

    fn backing(&self, region: Region) -> Option<(&[u8], usize)> {
        match region {
            Region::Itcm(o) => Some((&self.itcm[..], o)),
            Region::Dtcm(o) => Some((&self.dtcm[..], o)),
            Region::Main(o) => Some((&self.main_ram[..], o)),
            Region::Shared(o) => Some((&self.shared_wram[..], o)),
            Region::Arm7Wram(o) => Some((&self.arm7_wram[..], o)),
            Region::Palette(o) => Some((&self.palette[..], o)),
            Region::Vram(o) => Some((&self.vram[..], o)),
            Region::Oam(o) => Some((&self.oam[..], o)),
            Region::Io(_) | Region::GbaRom(_) | Region::GbaSram(_) | Region::Unmapped => None,
        }
    }

    fn backing_mut(&mut self, region: Region) -> Option<(&mut [u8], usize)> {
        match region {
            Region::Itcm(o) => Some((&mut self.itcm[..], o)),
            Region::Dtcm(o) => Some((&mut self.dtcm[..], o)),
            Region::Main(o) => Some((&mut self.main_ram[..], o)),
            Region::Shared(o) => Some((&mut self.shared_wram[..], o)),
            Region::Arm7Wram(o) => Some((&mut self.arm7_wram[..], o)),
            Region::Palette(o) => Some((&mut self.palette[..], o)),
            Region::Vram(o) => Some((&mut self.vram[..], o)),
            Region::Oam(o) => Some((&mut self.oam[..], o)),
            Region::Io(_) | Region::GbaRom(_) | Region::GbaSram(_) | Region::Unmapped => None,
        }
    }

    fn keyinput(&self) -> u16 {
        !self.keys.0 & 0x03FF
    }

    fn extkeyin(&self) -> u16 {
        let mut value: u16 = 0x007F;
        if self.keys.is_pressed(Button::X) {
            value &= !0x01;
        }
        if self.keys.is_pressed(Button::Y) {
            value &= !0x02;
        }
        if self.keys.is_pressed(Button::Debug) {
            value &= !0x08;
        }
        if self.pen_down {
            value &= !0x40;
        }
        if self.keys.is_pressed(Button::Lid) {
            value |= 0x80;
        }
        value
    }

    fn read_io8(&self, proc: Processor, offset: usize) -> u8 {
        let reg = offset as u32;
        match (proc, reg) {
            (_, r) if r & !1 == REG_KEYINPUT => (self.keyinput() >> ((r & 1) * 8)) as u8,
            (Processor::Arm7, r) if r & !1 == REG_EXTKEYIN => {
                (self.extkeyin() >> ((r & 1) * 8)) as u8
            }
            (Processor::Arm9, REG_WRAMCNT) | (Processor::Arm7, REG_WRAMSTAT) => self.wramcnt,
            (Processor::Arm9, _) => self.io9[offset],
            (Processor::Arm7, _) => self.io7[offset],
        }
    }

    /// Returns whether the stored register value changed.
    fn write_io8(&mut self, proc: Processor, offset: usize, value: u8) -> bool {
        let reg = offset as u32;
        match (proc, reg) {
            (_, r) if r & !1 == REG_KEYINPUT => false,
            (Processor::Arm7, r) if r & !1 == REG_EXTKEYIN => false,
            (Processor::Arm7, REG_WRAMSTAT) => false,
            (Processor::Arm9, REG_WRAMCNT) => {
                let old = self.wramcnt;
                self.wramcnt = value & 3;
                old != self.wramcnt
            }
            (Processor::Arm9, _) => std::mem::replace(&mut self.io9[offset], value) != value,
            (Processor::Arm7, _) => std::mem::replace(&mut self.io7[offset], value) != value,
        }
    }

    pub fn read8(&self, proc: Processor, addr: u32) -> u8 {
        let region = self.locate(proc, addr);
        match region {
            Region::Io(offset) => self.read_io8(proc, offset),
            Region::GbaRom(offset) => self.gba.as_ref().map_or(0xFF, |c| c.read_rom(offset)),
            Region::GbaSram(offset) => self.gba.as_ref().map_or(0, |c| c.read_sram(offset)),
            _ => self
                .backing(region)
                .map(|(mem, offset)| mem[offset])
                .unwrap_or(0),
        }
    }

    /// Store one byte. Returns `(changed, executable)` for the target.
    pub fn write8(&mut self, proc: Processor, addr: u32, value: u8) -> (bool, bool) {
        let region = self.locate(proc, addr);
        let changed = match region {
            Region::Io(offset) => self.write_io8(proc, offset, value),
            Region::GbaSram(offset) => self
                .gba
                .as_mut()
                .map_or(false, |c| c.write_sram(offset, value)),
            _ => match self.backing_mut(region) {
                Some((mem, offset)) => std::mem::replace(&mut mem[offset], value) != value,
                None => false,
            },
        };
        (changed, region.is_executable())
    }

    pub fn read(&self, proc: Processor, addr: u32, width: AccessWidth) -> u32 {
        let base = width.align(addr);
        (0..width.bytes()).fold(0u32, |acc, i| {
            acc | (self.read8(proc, base.wrapping_add(i)) as u32) << (8 * i)
        })
    }

    /// Write `value` at `addr`; returns true when executable memory changed.
    pub fn write(&mut self, proc: Processor, addr: u32, value: u32, width: AccessWidth) -> bool {
        let base = width.align(addr);
        let mut code_modified = false;
        for i in 0..width.bytes() {
            let byte = (value >> (8 * i)) as u8;
            let (changed, executable) = self.write8(proc, base.wrapping_add(i), byte);
            code_modified |= changed && executable;
        }
        code_modified
    }

    /// Copy a block into memory as seen by `proc`.
    pub fn load_block(&mut self, proc: Processor, addr: u32, data: &[u8]) {
        for (i, &byte) in data.iter().enumerate() {
            self.write8(proc, addr.wrapping_add(i as u32), byte);
        }
    }

    pub fn set_keys(&mut self, keys: Keypad) {
        self.keys = keys;
    }

    pub fn keys(&self) -> Keypad {
        self.keys
    }

    pub fn set_pen_down(&mut self, down: bool) {
        self.pen_down = down;
    }

    #[cfg(test)]
    pub fn wramcnt(&self) -> u8 {
        self.wramcnt
    }

    /// 32-bit ARM9 I/O register, for the display logic.
    pub fn io9_u32(&self, reg: u32) -> u32 {
        self.read(Processor::Arm9, 0x0400_0000 | reg, AccessWidth::Word)
    }

    pub fn palette(&self) -> &[u8] {
        &self.palette
    }

    pub fn vram(&self) -> &[u8] {
        &self.vram
    }

    pub fn snapshot(&self) -> BusSnapshot {
        BusSnapshot {
            main_ram: BASE64.encode(&self.main_ram),
            itcm: BASE64.encode(&self.itcm),
            dtcm: BASE64.encode(&self.dtcm),
            shared_wram: BASE64.encode(&self.shared_wram),
            arm7_wram: BASE64.encode(&self.arm7_wram),
            palette: BASE64.encode(&self.palette),
            vram: BASE64.encode(&self.vram),
            oam: BASE64.encode(&self.oam),
            io9: BASE64.encode(&self.io9),
            io7: BASE64.encode(&self.io7),
            wramcnt: self.wramcnt,
        }
    }

    /// Restore from a snapshot; nothing changes if any image is malformed.
    pub fn restore(&mut self, snap: &BusSnapshot) -> Result<(), String> {
        fn decode(name: &str, data: &str, size: usize) -> Result<Vec<u8>, String> {
            let bytes = BASE64
                .decode(data)
                .map_err(|e| format!("{}: {}", name, e))?;
            if bytes.len() != size {
                return Err(format!(
                    "{}: expected {} bytes, found {}",
                    name,
                    size,
                    bytes.len()
                ));
            }
            Ok(bytes)
        }

        let restored = Bus {
            main_ram: decode("main_ram", &snap.main_ram, MAIN_RAM_SIZE)?,
            itcm: decode("itcm", &snap.itcm, ITCM_SIZE)?,
            dtcm: decode("dtcm", &snap.dtcm, DTCM_SIZE)?,
            shared_wram: decode("shared_wram", &snap.shared_wram, SHARED_WRAM_SIZE)?,
            arm7_wram: decode("arm7_wram", &snap.arm7_wram, ARM7_WRAM_SIZE)?,
            palette: decode("palette", &snap.palette, PALETTE_SIZE)?,
            vram: decode("vram", &snap.vram, VRAM_LCDC_SIZE)?,
            oam: decode("oam", &snap.oam, OAM_SIZE)?,
            io9: decode("io9", &snap.io9, IO_SIZE)?,
            io7: decode("io7", &snap.io7, IO_SIZE)?,
            wramcnt: snap.wramcnt & 3,
            keys: self.keys,
            pen_down: self.pen_down,
            gba: self.gba.take(),
        };
        *self = restored;
        Ok(())
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new()
    }
}

/// Memory images and bus registers, base64 encoded for JSON states.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusSnapshot {
    pub main_ram: String,
    pub itcm: String,
    pub dtcm: String,
    pub shared_wram: String,
    pub arm7_wram: String,
    pub palette: String,
    pub vram: String,
    pub oam: String,
    pub io9: String,
    pub io7: String,
    pub wramcnt: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    const A7: Processor = Processor::Arm7;
    const A9: Processor = Processor::Arm9;

    #[test]
    fn main_ram_is_shared_and_mirrored() {
        let mut bus = Bus::new();
        bus.write(A9, 0x0200_0010, 0xDEAD_BEEF, AccessWidth::Word);
        assert_eq!(bus.read(A7, 0x0200_0010, AccessWidth::Word), 0xDEAD_BEEF);
        assert_eq!(bus.read(A7, 0x0240_0010, AccessWidth::Word), 0xDEAD_BEEF);
        assert_eq!(bus.read(A9, 0x0200_0010, AccessWidth::Byte), 0xEF);
        assert_eq!(bus.read(A9, 0x0200_0012, AccessWidth::Half), 0xDEAD);
    }

    #[test]
    fn wide_accesses_are_force_aligned() {
        let mut bus = Bus::new();
        bus.write(A9, 0x0200_0000, 0x4433_2211, AccessWidth::Word);
        assert_eq!(bus.read(A9, 0x0200_0003, AccessWidth::Word), 0x4433_2211);
        assert_eq!(bus.read(A9, 0x0200_0001, AccessWidth::Half), 0x2211);
        bus.write(A9, 0x0200_0003, 0xAABB, AccessWidth::Half);
        assert_eq!(bus.read(A9, 0x0200_0000, AccessWidth::Word), 0x4433_AABB);
    }

    #[test]
    fn dtcm_shadows_main_ram_for_arm9_only() {
        let mut bus = Bus::new();
        bus.write(A9, DTCM_BASE, 0x1234_5678, AccessWidth::Word);
        assert_eq!(bus.read(A9, DTCM_BASE, AccessWidth::Word), 0x1234_5678);
        assert_eq!(bus.read(A7, DTCM_BASE, AccessWidth::Word), 0);
    }

    #[test]
    fn itcm_is_arm9_only() {
        let mut bus = Bus::new();
        bus.write(A9, 0x0000_0100, 0xE1A0_0000, AccessWidth::Word);
        assert_eq!(bus.read(A9, 0x0100_8100, AccessWidth::Word), 0xE1A0_0000);
        assert_eq!(bus.read(A7, 0x0000_0100, AccessWidth::Word), 0);
        assert!(!bus.write(A7, 0x0000_0100, 1, AccessWidth::Word));
    }

    #[test]
    fn shared_wram_follows_wramcnt() {
        let mut bus = Bus::new();
        // Boot: ARM7 owns everything, ARM9 sees nothing
        assert_eq!(bus.wramcnt(), 3);
        bus.write(A7, 0x0300_0000, 0x11, AccessWidth::Byte);
        bus.write(A7, 0x0300_4000, 0x22, AccessWidth::Byte);
        assert_eq!(bus.read(A9, 0x0300_0000, AccessWidth::Byte), 0);

        // Mode 0: ARM9 owns everything, ARM7 falls back to its own WRAM
        bus.write(A9, 0x0400_0247, 0, AccessWidth::Byte);
        assert_eq!(bus.read(A9, 0x0300_0000, AccessWidth::Byte), 0x11);
        assert_eq!(bus.read(A9, 0x0300_4000, AccessWidth::Byte), 0x22);
        bus.write(A7, 0x0380_0000, 0x33, AccessWidth::Byte);
        assert_eq!(bus.read(A7, 0x0300_0000, AccessWidth::Byte), 0x33);

        // Mode 1: ARM9 second half, ARM7 first half
        bus.write(A9, 0x0400_0247, 1, AccessWidth::Byte);
        assert_eq!(bus.read(A9, 0x0300_0000, AccessWidth::Byte), 0x22);
        assert_eq!(bus.read(A7, 0x0300_0000, AccessWidth::Byte), 0x11);

        // Mode 2: swapped
        bus.write(A9, 0x0400_0247, 2, AccessWidth::Byte);
        assert_eq!(bus.read(A9, 0x0300_0000, AccessWidth::Byte), 0x11);
        assert_eq!(bus.read(A7, 0x0300_0000, AccessWidth::Byte), 0x22);
        assert_eq!(bus.read(A7, 0x0400_0241, AccessWidth::Byte), 2);
    }

    #[test]
    fn arm7_cannot_write_wramcnt() {
        let mut bus = Bus::new();
        bus.write(A7, 0x0400_0241, 0, AccessWidth::Byte);
        assert_eq!(bus.wramcnt(), 3);
    }

    #[test]
    fn keyinput_is_active_low() {
        let mut bus = Bus::new();
        assert_eq!(bus.read(A9, 0x0400_0130, AccessWidth::Half), 0x03FF);
        let mut keys = Keypad::default();
        keys.set(Button::A, true);
        keys.set(Button::Down, true);
        bus.set_keys(keys);
        assert_eq!(bus.read(A9, 0x0400_0130, AccessWidth::Half), 0x03FF & !0x81);
        assert_eq!(bus.read(A7, 0x0400_0130, AccessWidth::Half), 0x03FF & !0x81);
        // Read-only
        bus.write(A9, 0x0400_0130, 0, AccessWidth::Half);
        assert_eq!(bus.read(A9, 0x0400_0130, AccessWidth::Half), 0x03FF & !0x81);
    }

    #[test]
    fn extkeyin_reports_xy_pen_and_lid() {
        let mut bus = Bus::new();
        assert_eq!(bus.read(A7, 0x0400_0136, AccessWidth::Half), 0x007F);
        let mut keys = Keypad::default();
        keys.set(Button::X, true);
        keys.set(Button::Lid, true);
        bus.set_keys(keys);
        bus.set_pen_down(true);
        assert_eq!(bus.read(A7, 0x0400_0136, AccessWidth::Half), 0x00BE);
    }

    #[test]
    fn gba_slot_reads_open_bus() {
        let bus = Bus::new();
        assert_eq!(bus.read(A9, 0x0800_0000, AccessWidth::Word), 0xFFFF_FFFF);
        assert_eq!(bus.read(A7, 0x0900_0000, AccessWidth::Byte), 0xFF);
        assert_eq!(bus.read(A9, 0x0A00_0000, AccessWidth::Byte), 0);
    }

    #[test]
    fn gba_cartridge_maps_rom_and_sram() {
        let mut bus = Bus::new();
        let cart = GbaCartridge::new(vec![0x11, 0x22, 0x33, 0x44]).unwrap();
        assert!(bus.insert_gba(cart).is_none());

        assert_eq!(bus.read(A9, 0x0800_0000, AccessWidth::Word), 0x4433_2211);
        assert_eq!(bus.read(A7, 0x0800_0002, AccessWidth::Half), 0x4433);
        assert_eq!(bus.read(A9, 0x0800_0004, AccessWidth::Byte), 0xFF);
        // ROM is read-only and never code
        assert!(!bus.write(A9, 0x0800_0000, 0, AccessWidth::Word));
        assert_eq!(bus.read(A9, 0x0800_0000, AccessWidth::Byte), 0x11);

        assert_eq!(bus.read(A9, 0x0A00_0010, AccessWidth::Byte), 0xFF);
        assert!(!bus.write(A7, 0x0A00_0010, 0x5A, AccessWidth::Byte));
        assert_eq!(bus.read(A9, 0x0A01_0010, AccessWidth::Byte), 0x5A);
        assert!(bus.gba().unwrap().sram_dirty());

        // Reset clears memory but keeps the cartridge
        bus.reset();
        assert_eq!(bus.read(A9, 0x0800_0001, AccessWidth::Byte), 0x22);
        assert_eq!(bus.gba().unwrap().sram()[0x10], 0x5A);
    }

    #[test]
    fn write_reports_code_modification() {
        let mut bus = Bus::new();
        assert!(bus.write(A9, 0x0200_0000, 1, AccessWidth::Word));
        // Same value again: nothing changed
        assert!(!bus.write(A9, 0x0200_0000, 1, AccessWidth::Word));
        // Palette is not executable
        assert!(!bus.write(A9, 0x0500_0000, 0x7FFF, AccessWidth::Half));
        assert_eq!(bus.read(A9, 0x0500_0800, AccessWidth::Half), 0x7FFF);
    }

    #[test]
    fn snapshot_restore_keeps_memory() {
        let mut bus = Bus::new();
        bus.write(A9, 0x0200_1234, 0xCAFE_F00D, AccessWidth::Word);
        bus.write(A9, 0x0400_0247, 1, AccessWidth::Byte);
        let snap = bus.snapshot();

        let mut other = Bus::new();
        other.restore(&snap).unwrap();
        assert_eq!(other.read(A7, 0x0200_1234, AccessWidth::Word), 0xCAFE_F00D);
        assert_eq!(other.wramcnt(), 1);
    }

    #[test]
    fn restore_rejects_wrong_sizes() {
        let mut bus = Bus::new();
        bus.write(A9, 0x0200_0000, 7, AccessWidth::Byte);
        let mut snap = bus.snapshot();
        snap.oam = BASE64.encode([0u8; 4]);
        let err = bus.restore(&snap).unwrap_err();
        assert!(err.contains("oam"));
        assert_eq!(bus.read(A9, 0x0200_0000, AccessWidth::Byte), 7);
    }
}
