//! Screen composition
//!
//! Only the display modes that need no 2D engine are produced: display off
//! (white), and engine A's VRAM display mode which scans a 256x192 BGR555
//! bitmap out of VRAM bank A. Graphics mode shows the engine's backdrop
//! colour, which is what an engine with no layers enabled outputs.

use crate::bus::{Bus, REG_DISPCNT_A, REG_DISPCNT_B, REG_POWCNT1};
use emu_core::types::{BGR555_WHITE, SCREEN_PIXELS};

const DISPLAY_MODE_OFF: u32 = 0;
const DISPLAY_MODE_VRAM: u32 = 2;
const POWCNT1_SWAP: u32 = 1 << 15;

/// Which engine drives a screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Engine {
    A,
    B,
}

impl Engine {
    fn dispcnt_reg(self) -> u32 {
        match self {
            Engine::A => REG_DISPCNT_A,
            Engine::B => REG_DISPCNT_B,
        }
    }

    fn palette_base(self) -> usize {
        match self {
            Engine::A => 0x000,
            Engine::B => 0x400,
        }
    }
}

pub struct Video {
    top: Vec<u16>,
    bottom: Vec<u16>,
}

impl Video {
    pub fn new() -> Self {
        Self {
            top: vec![BGR555_WHITE; SCREEN_PIXELS],
            bottom: vec![BGR555_WHITE; SCREEN_PIXELS],
        }
    }

    pub fn reset(&mut self) {
        self.top.fill(BGR555_WHITE);
        self.bottom.fill(BGR555_WHITE);
    }

    /// Engines driving the top and bottom screens.
    pub fn layout(bus: &Bus) -> (Engine, Engine) {
        if bus.io9_u32(REG_POWCNT1) & POWCNT1_SWAP != 0 {
            (Engine::A, Engine::B)
        } else {
            (Engine::B, Engine::A)
        }
    }

    pub fn render(&mut self, bus: &Bus) {
        let (top, bottom) = Self::layout(bus);
        Self::render_engine(bus, top, &mut self.top);
        Self::render_engine(bus, bottom, &mut self.bottom);
    }

    fn render_engine(bus: &Bus, engine: Engine, out: &mut [u16]) {
        let mode = (bus.io9_u32(engine.dispcnt_reg()) >> 16) & 3;
        match (engine, mode) {
            (_, DISPLAY_MODE_OFF) => out.fill(BGR555_WHITE),
            (Engine::A, DISPLAY_MODE_VRAM) => {
                // Bank A is the first 128 KiB of the LCDC window
                for (pixel, bytes) in out.iter_mut().zip(bus.vram().chunks_exact(2)) {
                    *pixel = u16::from_le_bytes([bytes[0], bytes[1]]) & 0x7FFF;
                }
            }
            _ => {
                let base = engine.palette_base();
                let palette = bus.palette();
                let backdrop = u16::from_le_bytes([palette[base], palette[base + 1]]) & 0x7FFF;
                out.fill(backdrop);
            }
        }
    }

    pub fn screens(&self) -> [&[u16]; 2] {
        [&self.top, &self.bottom]
    }
}

impl Default for Video {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emu_core::{AccessWidth, Processor};

    const A9: Processor = Processor::Arm9;

    #[test]
    fn display_off_is_white() {
        let bus = Bus::new();
        let mut video = Video::new();
        video.render(&bus);
        assert!(video.screens()[0].iter().all(|&p| p == BGR555_WHITE));
        assert!(video.screens()[1].iter().all(|&p| p == BGR555_WHITE));
    }

    #[test]
    fn vram_display_mode_scans_bank_a() {
        let mut bus = Bus::new();
        // Engine A in VRAM display mode, routed to the top screen
        bus.write(A9, 0x0400_0000, 2 << 16, AccessWidth::Word);
        bus.write(A9, 0x0400_0304, 1 << 15, AccessWidth::Word);
        bus.write(A9, 0x0680_0000, 0x001F, AccessWidth::Half);
        bus.write(A9, 0x0680_0002, 0xFC00, AccessWidth::Half);

        let mut video = Video::new();
        video.render(&bus);
        let [top, bottom] = video.screens();
        assert_eq!(top[0], 0x001F);
        assert_eq!(top[1], 0x7C00);
        assert_eq!(top[2], 0);
        assert_eq!(bottom[0], BGR555_WHITE);
    }

    #[test]
    fn engines_swap_with_powcnt1() {
        let mut bus = Bus::new();
        assert_eq!(Video::layout(&bus), (Engine::B, Engine::A));
        bus.write(A9, 0x0400_0304, 1 << 15, AccessWidth::Word);
        assert_eq!(Video::layout(&bus), (Engine::A, Engine::B));
    }

    #[test]
    fn graphics_mode_shows_backdrop() {
        let mut bus = Bus::new();
        bus.write(A9, 0x0400_1000, 1 << 16, AccessWidth::Word);
        bus.write(A9, 0x0500_0400, 0x03E0, AccessWidth::Half);

        let mut video = Video::new();
        video.render(&bus);
        // Engine B drives the top screen without the swap bit
        assert!(video.screens()[0].iter().all(|&p| p == 0x03E0));
    }
}
