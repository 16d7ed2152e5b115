//! Window geometry: where each screen is drawn and how mouse positions map
//! onto the touch screen.

use emu_core::types::{SCREEN_HEIGHT, SCREEN_WIDTH};
use emu_script::config::MAX_SCALE;

const W: i32 = SCREEN_WIDTH as i32;
const H: i32 = SCREEN_HEIGHT as i32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenLayout {
    pub scale: u32,
    /// Screens side by side instead of stacked.
    pub horizontal: bool,
}

impl ScreenLayout {
    pub fn new(scale: u32, horizontal: bool) -> Self {
        Self {
            scale: scale.clamp(1, MAX_SCALE),
            horizontal,
        }
    }

    /// Window size in pixels.
    pub fn window_size(&self) -> (u32, u32) {
        let h = self.horizontal as u32;
        (
            SCREEN_WIDTH as u32 * (1 + h) * self.scale,
            SCREEN_HEIGHT as u32 * (2 - h) * self.scale,
        )
    }

    /// Destination rectangles `(x, y, w, h)` of the top and bottom screens.
    pub fn screen_rects(&self) -> [(i32, i32, u32, u32); 2] {
        let s = self.scale as i32;
        let (w, h) = (W * s, H * s);
        let bottom = if self.horizontal { (w, 0) } else { (0, h) };
        [
            (0, 0, w as u32, h as u32),
            (bottom.0, bottom.1, w as u32, h as u32),
        ]
    }

    /// Native touch coordinates for a window position, unclamped.
    fn native(&self, x: i32, y: i32) -> (i32, i32) {
        let s = self.scale as i32;
        let (x, y) = (x / s, y / s);
        if self.horizontal {
            (x - W, y)
        } else {
            (x, y - H)
        }
    }

    /// Touch coordinates when the position lies on the bottom screen.
    pub fn touch_at(&self, x: i32, y: i32) -> Option<(i64, i64)> {
        let (tx, ty) = self.native(x, y);
        if (0..W).contains(&tx) && (0..H).contains(&ty) {
            Some((tx as i64, ty as i64))
        } else {
            None
        }
    }

    /// Touch coordinates for a drag, clamped to the bottom screen.
    pub fn touch_clamped(&self, x: i32, y: i32) -> (i64, i64) {
        let (tx, ty) = self.native(x, y);
        (tx.clamp(0, W - 1) as i64, ty.clamp(0, H - 1) as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_sizes() {
        assert_eq!(ScreenLayout::new(1, false).window_size(), (256, 384));
        assert_eq!(ScreenLayout::new(2, false).window_size(), (512, 768));
        assert_eq!(ScreenLayout::new(3, true).window_size(), (1536, 576));
    }

    #[test]
    fn oversized_scale_is_clamped() {
        let layout = ScreenLayout::new(20_000_000, true);
        assert_eq!(layout.scale, MAX_SCALE);
        assert_eq!(layout.window_size(), (8192, 3072));
        assert_eq!(ScreenLayout::new(0, false).scale, 1);
    }

    #[test]
    fn bottom_screen_placement() {
        let rects = ScreenLayout::new(2, false).screen_rects();
        assert_eq!(rects[0], (0, 0, 512, 384));
        assert_eq!(rects[1], (0, 384, 512, 384));
        let rects = ScreenLayout::new(1, true).screen_rects();
        assert_eq!(rects[1], (256, 0, 256, 192));
    }

    #[test]
    fn clicks_map_only_on_bottom_screen() {
        let layout = ScreenLayout::new(2, false);
        assert_eq!(layout.touch_at(20, 100), None);
        assert_eq!(layout.touch_at(20, 384), Some((10, 0)));
        assert_eq!(layout.touch_at(511, 767), Some((255, 191)));

        let layout = ScreenLayout::new(1, true);
        assert_eq!(layout.touch_at(100, 10), None);
        assert_eq!(layout.touch_at(300, 10), Some((44, 10)));
    }

    #[test]
    fn drags_are_clamped() {
        let layout = ScreenLayout::new(1, false);
        assert_eq!(layout.touch_clamped(-5, 100), (0, 0));
        assert_eq!(layout.touch_clamped(400, 500), (255, 191));
        assert_eq!(layout.touch_clamped(30, 200), (30, 8));
    }
}
