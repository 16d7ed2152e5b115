//! Window backend abstraction
//!
//! A backend owns the event pump, the presentation surface and the clock.
//! The SDL frontend provides the real window; [`Headless`] runs without one.

use crate::input::ControlState;
use std::error::Error;
use std::time::{Duration, Instant};

pub trait WindowBackend {
    /// Drain pending window events into `ctrl`.
    ///
    /// When `ctrl.paused()` the backend should block until the next event
    /// instead of returning immediately.
    fn poll_input(&mut self, ctrl: &mut ControlState);

    /// Present the top and bottom screens (BGR555).
    fn present(&mut self, screens: [&[u16]; 2]) -> Result<(), Box<dyn Error>>;

    fn set_title(&mut self, title: &str);

    /// Milliseconds since the backend was created.
    fn ticks_ms(&self) -> u64;

    fn delay_ms(&mut self, ms: u32);

    /// Release the window and any input devices.
    fn close(&mut self) {}

    /// Whether the backend can request quit by itself (window closed,
    /// frame budget spent). Running until quit needs this.
    fn can_quit(&self) -> bool {
        true
    }

    /// Get the backend name (for debugging)
    fn name(&self) -> &str;
}

/// Runs without a window.
///
/// Time is either the wall clock or a virtual clock advanced only by
/// `delay_ms`, which keeps runs deterministic. An optional frame budget
/// requests quit from the first poll of the cycle that presents the last
/// frame, so exactly that many frames are presented.
pub struct Headless {
    start: Instant,
    virtual_now: Option<u64>,
    frame_budget: Option<u64>,
    frames_presented: u64,
    /// No poll since the last present yet.
    new_cycle: bool,
    title: String,
    last_screens: Option<[Vec<u16>; 2]>,
    keep_screens: bool,
}

impl Headless {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            virtual_now: None,
            frame_budget: None,
            frames_presented: 0,
            new_cycle: true,
            title: String::new(),
            last_screens: None,
            keep_screens: false,
        }
    }

    /// Use a virtual clock starting at zero.
    pub fn with_virtual_clock(mut self) -> Self {
        self.virtual_now = Some(0);
        self
    }

    /// Stop after `frames` presented frames.
    pub fn with_frame_budget(mut self, frames: u64) -> Self {
        self.frame_budget = Some(frames);
        self
    }

    /// Keep a copy of the last presented screens.
    pub fn keep_screens(mut self) -> Self {
        self.keep_screens = true;
        self
    }

    /// Advance the virtual clock without sleeping.
    #[cfg(test)]
    pub fn advance(&mut self, ms: u64) {
        if let Some(now) = self.virtual_now.as_mut() {
            *now += ms;
        }
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn last_screens(&self) -> Option<&[Vec<u16>; 2]> {
        self.last_screens.as_ref()
    }
}

impl Default for Headless {
    fn default() -> Self {
        Self::new()
    }
}

impl WindowBackend for Headless {
    fn poll_input(&mut self, ctrl: &mut ControlState) {
        if !std::mem::take(&mut self.new_cycle) {
            return;
        }
        if let Some(budget) = self.frame_budget {
            if self.frames_presented + 1 >= budget {
                ctrl.quit = true;
            }
        }
    }

    fn present(&mut self, screens: [&[u16]; 2]) -> Result<(), Box<dyn Error>> {
        self.frames_presented += 1;
        self.new_cycle = true;
        if self.keep_screens {
            self.last_screens = Some([screens[0].to_vec(), screens[1].to_vec()]);
        }
        Ok(())
    }

    fn set_title(&mut self, title: &str) {
        self.title = title.to_string();
    }

    fn ticks_ms(&self) -> u64 {
        match self.virtual_now {
            Some(now) => now,
            None => self.start.elapsed().as_millis() as u64,
        }
    }

    fn delay_ms(&mut self, ms: u32) {
        match self.virtual_now.as_mut() {
            Some(now) => *now += ms as u64,
            None => std::thread::sleep(Duration::from_millis(ms as u64)),
        }
    }

    fn can_quit(&self) -> bool {
        self.frame_budget.is_some()
    }

    fn name(&self) -> &str {
        "headless"
    }
}
