//! Cartridge image parsing
//!
//! Only the parts of the header the loader needs are decoded: identification
//! strings, the ARM9/ARM7 binary descriptors, and the header checksum.
//!
//! ```text
//! 0x000  Game title (12 bytes, ASCII, NUL padded)
//! 0x00C  Game code (4 bytes)
//! 0x010  Maker code (2 bytes)
//! 0x012  Unit code
//! 0x014  Device capacity (128 KiB << n)
//! 0x020  ARM9 rom offset / entry / ram address / size
//! 0x030  ARM7 rom offset / entry / ram address / size
//! 0x15E  Header CRC16 over 0x000..0x15E
//! ```

use crate::NdsError;
use emu_core::Processor;

/// Size of the header area at the start of every image.
pub const HEADER_SIZE: usize = 0x200;
/// Bytes covered by the header checksum.
const HEADER_CRC_SPAN: usize = 0x15E;

/// Where the ARM9 binary may be loaded: main RAM minus the system area at the top.
const ARM9_LOAD_RANGE: (u32, u32) = (0x0200_0000, 0x023B_FE00);
/// ARM7 binaries may go to main RAM or to the WRAM window below ARM7 WRAM.
const ARM7_LOAD_RANGES: [(u32, u32); 2] = [(0x0200_0000, 0x023B_FE00), (0x037F_8000, 0x0381_0000)];

/// CRC-16 as used by the header and the BIOS (reflected 0x8005, init 0xFFFF).
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &byte in data {
        crc ^= byte as u16;
        for _ in 0..8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ 0xA001;
            } else {
                crc >>= 1;
            }
        }
    }
    crc
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

fn ascii_field(bytes: &[u8]) -> String {
    bytes
        .iter()
        .take_while(|&&b| b != 0)
        .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '?' })
        .collect()
}

/// Location of one CPU's boot binary inside the image and in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinaryDescriptor {
    pub rom_offset: u32,
    pub entry: u32,
    pub ram_address: u32,
    pub size: u32,
}

impl BinaryDescriptor {
    fn parse(bytes: &[u8], offset: usize) -> Self {
        Self {
            rom_offset: read_u32(bytes, offset),
            entry: read_u32(bytes, offset + 4),
            ram_address: read_u32(bytes, offset + 8),
            size: read_u32(bytes, offset + 12),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub title: String,
    pub game_code: String,
    pub maker_code: String,
    pub unit_code: u8,
    pub capacity: u8,
    pub arm9: BinaryDescriptor,
    pub arm7: BinaryDescriptor,
    pub header_crc: u16,
}

impl Header {
    pub fn parse(rom: &[u8]) -> Result<Self, NdsError> {
        if rom.len() < HEADER_SIZE {
            return Err(NdsError::RomTooSmall(rom.len()));
        }
        Ok(Self {
            title: ascii_field(&rom[0x000..0x00C]),
            game_code: ascii_field(&rom[0x00C..0x010]),
            maker_code: ascii_field(&rom[0x010..0x012]),
            unit_code: rom[0x012],
            capacity: rom[0x014],
            arm9: BinaryDescriptor::parse(rom, 0x020),
            arm7: BinaryDescriptor::parse(rom, 0x030),
            header_crc: u16::from_le_bytes([rom[HEADER_CRC_SPAN], rom[HEADER_CRC_SPAN + 1]]),
        })
    }

    pub fn binary(&self, proc: Processor) -> &BinaryDescriptor {
        match proc {
            Processor::Arm9 => &self.arm9,
            Processor::Arm7 => &self.arm7,
        }
    }

    /// Nominal chip size in bytes.
    pub fn chip_size(&self) -> u64 {
        (128 * 1024u64) << self.capacity.min(16)
    }
}

/// A parsed cartridge image.
#[derive(Debug, Clone)]
pub struct Cartridge {
    pub header: Header,
    rom: Vec<u8>,
    crc_ok: bool,
}

impl Cartridge {
    pub fn from_bytes(rom: &[u8]) -> Result<Self, NdsError> {
        let header = Header::parse(rom)?;
        let crc_ok = crc16(&rom[..HEADER_CRC_SPAN]) == header.header_crc;

        for proc in [Processor::Arm9, Processor::Arm7] {
            let bin = header.binary(proc);
            let end = bin.rom_offset as u64 + bin.size as u64;
            if end > rom.len() as u64 {
                return Err(NdsError::BinaryOutOfRom {
                    proc,
                    offset: bin.rom_offset,
                    size: bin.size,
                });
            }
            let ranges: &[(u32, u32)] = match proc {
                Processor::Arm9 => std::slice::from_ref(&ARM9_LOAD_RANGE),
                Processor::Arm7 => &ARM7_LOAD_RANGES,
            };
            let fits = ranges.iter().any(|&(start, limit)| {
                bin.ram_address >= start && bin.ram_address as u64 + bin.size as u64 <= limit as u64
            });
            if !fits {
                return Err(NdsError::BadLoadAddress {
                    proc,
                    addr: bin.ram_address,
                    size: bin.size,
                });
            }
        }

        Ok(Self {
            header,
            rom: rom.to_vec(),
            crc_ok,
        })
    }

    pub fn header_bytes(&self) -> &[u8] {
        &self.rom[..HEADER_SIZE]
    }

    /// The boot binary for `proc`; bounds were checked at parse time.
    pub fn binary(&self, proc: Processor) -> &[u8] {
        let bin = self.header.binary(proc);
        let start = bin.rom_offset as usize;
        &self.rom[start..start + bin.size as usize]
    }

    pub fn header_crc_ok(&self) -> bool {
        self.crc_ok
    }

    pub fn len(&self) -> usize {
        self.rom.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rom.is_empty()
    }
}

/// Backup memory type, numbered as on the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SaveType {
    #[default]
    Autodetect,
    Eeprom4k,
    Eeprom64k,
    Eeprom512k,
    Fram256k,
    Flash2m,
    Flash4m,
}

impl SaveType {
    pub const NAMES: [&'static str; 7] = [
        "Autodetect",
        "EEPROM 4kbit",
        "EEPROM 64kbit",
        "EEPROM 512kbit",
        "FRAM 256kbit",
        "FLASH 2mbit",
        "FLASH 4mbit",
    ];

    pub fn from_index(index: i64) -> Option<Self> {
        match index {
            0 => Some(SaveType::Autodetect),
            1 => Some(SaveType::Eeprom4k),
            2 => Some(SaveType::Eeprom64k),
            3 => Some(SaveType::Eeprom512k),
            4 => Some(SaveType::Fram256k),
            5 => Some(SaveType::Flash2m),
            6 => Some(SaveType::Flash4m),
            _ => None,
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        Self::NAMES[self.index()]
    }

    /// Backup size in bytes; `None` until the game reveals it.
    pub fn backup_size(self) -> Option<usize> {
        match self {
            SaveType::Autodetect => None,
            SaveType::Eeprom4k => Some(512),
            SaveType::Eeprom64k => Some(8 * 1024),
            SaveType::Eeprom512k => Some(64 * 1024),
            SaveType::Fram256k => Some(32 * 1024),
            SaveType::Flash2m => Some(256 * 1024),
            SaveType::Flash4m => Some(512 * 1024),
        }
    }
}

/// Firmware user-settings language, numbered as on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirmwareLanguage {
    Japanese,
    English,
    French,
    German,
    Italian,
    Spanish,
}

impl FirmwareLanguage {
    pub fn from_index(index: i64) -> Option<Self> {
        match index {
            0 => Some(FirmwareLanguage::Japanese),
            1 => Some(FirmwareLanguage::English),
            2 => Some(FirmwareLanguage::French),
            3 => Some(FirmwareLanguage::German),
            4 => Some(FirmwareLanguage::Italian),
            5 => Some(FirmwareLanguage::Spanish),
            _ => None,
        }
    }

    pub fn index(self) -> u8 {
        self as u8
    }
}
