//! Frame pacing and FPS measurement
//!
//! Both work on millisecond ticks supplied by the window backend, so they can
//! be driven by a virtual clock in tests.

/// Default limiter target.
pub const DEFAULT_FPS: u32 = 60;

/// Frames averaged for each title update.
pub const FRAMES_PER_SAMPLE: u32 = 60;

/// Falling further behind than this restarts the schedule.
const MAX_LAG_MS: i64 = -500;
/// Being further ahead than this (e.g. after an fps change) restarts it too.
const MAX_LEAD_MS: i64 = 100;

/// Paces emulation against wall time.
///
/// The schedule is `tick0 + counter * 1000 / fps`; frames are counted even
/// while the limiter is bypassed so that re-enabling it does not cause a burst.
#[derive(Debug, Clone)]
pub struct FrameLimiter {
    fps: u32,
    tick0: u64,
    counter: u64,
}

impl FrameLimiter {
    pub fn new(fps: u32) -> Self {
        Self {
            fps,
            tick0: 0,
            counter: 0,
        }
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    /// Change the target. 0 disables pacing.
    pub fn set_fps(&mut self, fps: u32) {
        self.fps = fps;
    }

    pub fn counter(&self) -> u64 {
        self.counter
    }

    /// Milliseconds to sleep before the next frame, given the current time.
    ///
    /// Restarts the schedule at `now` when it has drifted outside the
    /// tolerated window.
    pub fn delay(&mut self, now: u64) -> u32 {
        if self.fps == 0 {
            return 0;
        }
        let due = self.tick0 as i64 + (self.counter * 1000 / self.fps as u64) as i64;
        let delay = due - now as i64;
        if !(MAX_LAG_MS..=MAX_LEAD_MS).contains(&delay) {
            self.tick0 = now;
            self.counter = 0;
            0
        } else {
            delay.max(0) as u32
        }
    }

    /// Account for the presented frame and the `frameskip` skipped ones.
    pub fn advance(&mut self, frameskip: u32) {
        self.counter += 1 + frameskip as u64;
    }
}

impl Default for FrameLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_FPS)
    }
}

/// Averages presented frames over [`FRAMES_PER_SAMPLE`] cycles.
#[derive(Debug, Clone, Default)]
pub struct FpsCounter {
    frames: u32,
    elapsed: u64,
    previous: u64,
}

impl FpsCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a frame at `now`; yields the average rate once per sample.
    pub fn tick(&mut self, now: u64) -> Option<f32> {
        self.frames += 1;
        self.elapsed += now.saturating_sub(self.previous);
        self.previous = now;

        if self.frames < FRAMES_PER_SAMPLE {
            return None;
        }
        let fps = FRAMES_PER_SAMPLE as f32 * 1000.0 / self.elapsed.max(1) as f32;
        self.frames = 0;
        self.elapsed = 0;
        Some(fps)
    }

    pub fn title(fps: f32) -> String {
        format!("hemu-ds {:.2}", fps)
    }
}
