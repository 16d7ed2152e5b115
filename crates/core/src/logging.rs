//! Category-gated logging for the emulator and the scripting bridge.
//!
//! Scripts can poke guest memory thousands of times per frame, so tracing is
//! off by default and enabled per category. Messages that pass the category
//! gate and the per-category rate limiter are handed to the `log` facade with
//! the category name as target; the frontend decides where they end up
//! (`env_logger` in `hemu-ds`).
//!
//! # Usage
//!
//! ```rust
//! use emu_core::logging::{log, LogCategory, LogLevel};
//!
//! // The closure only runs when the category is enabled.
//! log(LogCategory::Memory, LogLevel::Trace, || {
//!     format!("arm9 read32 {:08X}", 0x0200_0000)
//! });
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Log level for controlling verbosity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    Off = 0,
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
    Trace = 5,
}

impl LogLevel {
    /// Parse log level from string (case-insensitive)
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "off" | "0" => Some(LogLevel::Off),
            "error" | "1" => Some(LogLevel::Error),
            "warn" | "warning" | "2" => Some(LogLevel::Warn),
            "info" | "3" => Some(LogLevel::Info),
            "debug" | "4" => Some(LogLevel::Debug),
            "trace" | "5" => Some(LogLevel::Trace),
            _ => None,
        }
    }

    fn from_u8(val: u8) -> Self {
        match val {
            1 => LogLevel::Error,
            2 => LogLevel::Warn,
            3 => LogLevel::Info,
            4 => LogLevel::Debug,
            5 => LogLevel::Trace,
            _ => LogLevel::Off,
        }
    }

    fn to_facade(self) -> Option<log::Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(log::Level::Error),
            LogLevel::Warn => Some(log::Level::Warn),
            LogLevel::Info => Some(log::Level::Info),
            LogLevel::Debug => Some(log::Level::Debug),
            LogLevel::Trace => Some(log::Level::Trace),
        }
    }
}

/// Log category for the different parts of the bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogCategory {
    /// Scripting API calls and protocol traffic
    Script,
    /// Guest memory reads and writes
    Memory,
    /// Keypad and touch injection
    Input,
    /// Screen composition and presentation
    Video,
    /// Frame limiter and FPS measurement
    Timing,
    /// ROM header parsing and loading
    Cartridge,
    /// Save states
    State,
}

const CATEGORY_COUNT: usize = 7;

impl LogCategory {
    pub const ALL: [LogCategory; CATEGORY_COUNT] = [
        LogCategory::Script,
        LogCategory::Memory,
        LogCategory::Input,
        LogCategory::Video,
        LogCategory::Timing,
        LogCategory::Cartridge,
        LogCategory::State,
    ];

    fn index(self) -> usize {
        match self {
            LogCategory::Script => 0,
            LogCategory::Memory => 1,
            LogCategory::Input => 2,
            LogCategory::Video => 3,
            LogCategory::Timing => 4,
            LogCategory::Cartridge => 5,
            LogCategory::State => 6,
        }
    }

    /// Target string handed to the `log` facade.
    pub fn target(self) -> &'static str {
        match self {
            LogCategory::Script => "hemu::script",
            LogCategory::Memory => "hemu::memory",
            LogCategory::Input => "hemu::input",
            LogCategory::Video => "hemu::video",
            LogCategory::Timing => "hemu::timing",
            LogCategory::Cartridge => "hemu::cartridge",
            LogCategory::State => "hemu::state",
        }
    }

    /// Parse a category name as given on the command line.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "script" => Some(LogCategory::Script),
            "memory" | "mem" => Some(LogCategory::Memory),
            "input" => Some(LogCategory::Input),
            "video" => Some(LogCategory::Video),
            "timing" => Some(LogCategory::Timing),
            "cartridge" | "cart" => Some(LogCategory::Cartridge),
            "state" => Some(LogCategory::State),
            _ => None,
        }
    }
}

/// Sliding one-second window of emitted messages per category.
struct RateLimiter {
    max_per_second: AtomicUsize,
    windows: Mutex<[VecDeque<Instant>; CATEGORY_COUNT]>,
    dropped: Mutex<[usize; CATEGORY_COUNT]>,
}

impl RateLimiter {
    fn new(max_per_second: usize) -> Self {
        Self {
            max_per_second: AtomicUsize::new(max_per_second),
            windows: Mutex::new(Default::default()),
            dropped: Mutex::new([0; CATEGORY_COUNT]),
        }
    }

    /// Returns whether the message may be emitted and, when it may, how many
    /// messages were dropped since the last emitted one.
    fn admit(&self, category: LogCategory, now: Instant) -> (bool, usize) {
        let idx = category.index();
        let max = self.max_per_second.load(Ordering::Relaxed);
        let (Ok(mut windows), Ok(mut dropped)) = (self.windows.lock(), self.dropped.lock()) else {
            return (true, 0);
        };

        let window = &mut windows[idx];
        while let Some(&front) = window.front() {
            if now.duration_since(front) > Duration::from_secs(1) {
                window.pop_front();
            } else {
                break;
            }
        }

        if window.len() < max {
            window.push_back(now);
            (true, std::mem::take(&mut dropped[idx]))
        } else {
            dropped[idx] += 1;
            (false, 0)
        }
    }
}

/// Global logging configuration
pub struct LogConfig {
    global_level: AtomicU8,
    levels: [AtomicU8; CATEGORY_COUNT],
    limiter: RateLimiter,
}

impl LogConfig {
    /// Logging off everywhere, 120 messages per second per category.
    fn new() -> Self {
        Self {
            global_level: AtomicU8::new(LogLevel::Off as u8),
            levels: Default::default(),
            limiter: RateLimiter::new(120),
        }
    }

    /// Get the global singleton instance
    pub fn global() -> &'static Self {
        use std::sync::OnceLock;
        static INSTANCE: OnceLock<LogConfig> = OnceLock::new();
        INSTANCE.get_or_init(LogConfig::new)
    }

    pub fn set_global_level(&self, level: LogLevel) {
        self.global_level.store(level as u8, Ordering::Relaxed);
    }

    pub fn global_level(&self) -> LogLevel {
        LogLevel::from_u8(self.global_level.load(Ordering::Relaxed))
    }

    pub fn set_level(&self, category: LogCategory, level: LogLevel) {
        self.levels[category.index()].store(level as u8, Ordering::Relaxed);
    }

    pub fn level(&self, category: LogCategory) -> LogLevel {
        LogLevel::from_u8(self.levels[category.index()].load(Ordering::Relaxed))
    }

    /// A category with its own level uses it; otherwise the global level applies.
    pub fn should_log(&self, category: LogCategory, level: LogLevel) -> bool {
        if level == LogLevel::Off {
            return false;
        }
        match self.level(category) {
            LogLevel::Off => level <= self.global_level(),
            category_level => level <= category_level,
        }
    }

    pub fn reset(&self) {
        self.set_global_level(LogLevel::Off);
        for category in LogCategory::ALL {
            self.set_level(category, LogLevel::Off);
        }
    }

    pub fn set_rate_limit(&self, max_per_second: usize) {
        self.limiter
            .max_per_second
            .store(max_per_second, Ordering::Relaxed);
    }

    pub fn rate_limit(&self) -> usize {
        self.limiter.max_per_second.load(Ordering::Relaxed)
    }

    /// Apply a `category=level` or bare `level` directive.
    pub fn apply_directive(&self, directive: &str) -> Result<(), String> {
        match directive.split_once('=') {
            Some((cat, lvl)) => {
                let category = LogCategory::from_name(cat.trim())
                    .ok_or_else(|| format!("unknown log category '{}'", cat.trim()))?;
                let level = LogLevel::from_str(lvl.trim())
                    .ok_or_else(|| format!("unknown log level '{}'", lvl.trim()))?;
                self.set_level(category, level);
            }
            None => {
                let level = LogLevel::from_str(directive.trim())
                    .ok_or_else(|| format!("unknown log level '{}'", directive.trim()))?;
                self.set_global_level(level);
            }
        }
        Ok(())
    }
}

/// Log a message with the specified category and level.
///
/// The closure is only evaluated when the category is enabled at `level` and
/// the category is under its rate limit.
pub fn log<F>(category: LogCategory, level: LogLevel, message_fn: F)
where
    F: FnOnce() -> String,
{
    let config = LogConfig::global();
    if !config.should_log(category, level) {
        return;
    }
    let Some(facade_level) = level.to_facade() else {
        return;
    };

    let (allowed, dropped) = config.limiter.admit(category, Instant::now());
    if !allowed {
        return;
    }
    if dropped > 0 {
        log::warn!(target: category.target(), "rate limit exceeded, {} message(s) dropped", dropped);
    }
    log::log!(target: category.target(), facade_level, "{}", message_fn());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_parsing() {
        assert_eq!(LogLevel::from_str("off"), Some(LogLevel::Off));
        assert_eq!(LogLevel::from_str("WARN"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::from_str("5"), Some(LogLevel::Trace));
        assert_eq!(LogLevel::from_str("loud"), None);
    }

    #[test]
    fn test_category_names() {
        assert_eq!(LogCategory::from_name("mem"), Some(LogCategory::Memory));
        assert_eq!(LogCategory::from_name("Script"), Some(LogCategory::Script));
        assert_eq!(LogCategory::from_name("gpu"), None);
        for category in LogCategory::ALL {
            assert!(category.target().starts_with("hemu::"));
        }
    }

    #[test]
    fn test_category_level_overrides_global() {
        let config = LogConfig::new();
        config.set_global_level(LogLevel::Warn);
        assert!(config.should_log(LogCategory::Memory, LogLevel::Warn));
        assert!(!config.should_log(LogCategory::Memory, LogLevel::Debug));

        config.set_level(LogCategory::Memory, LogLevel::Trace);
        assert!(config.should_log(LogCategory::Memory, LogLevel::Trace));
        assert!(!config.should_log(LogCategory::Input, LogLevel::Debug));
        assert!(!config.should_log(LogCategory::Memory, LogLevel::Off));
    }

    #[test]
    fn test_reset() {
        let config = LogConfig::new();
        config.set_global_level(LogLevel::Info);
        config.set_level(LogCategory::Video, LogLevel::Debug);
        config.reset();
        assert_eq!(config.global_level(), LogLevel::Off);
        assert_eq!(config.level(LogCategory::Video), LogLevel::Off);
    }

    #[test]
    fn test_apply_directive() {
        let config = LogConfig::new();
        config.apply_directive("memory=trace").unwrap();
        config.apply_directive("info").unwrap();
        assert_eq!(config.level(LogCategory::Memory), LogLevel::Trace);
        assert_eq!(config.global_level(), LogLevel::Info);
        assert!(config.apply_directive("gpu=trace").is_err());
        assert!(config.apply_directive("memory=very").is_err());
    }

    #[test]
    fn test_rate_limiter_blocks_over_limit() {
        let limiter = RateLimiter::new(3);
        let now = Instant::now();
        for _ in 0..3 {
            assert!(limiter.admit(LogCategory::Memory, now).0);
        }
        assert!(!limiter.admit(LogCategory::Memory, now).0);
        assert!(!limiter.admit(LogCategory::Memory, now).0);
        // Other categories have their own window
        assert!(limiter.admit(LogCategory::Input, now).0);

        // After the window slides, the dropped count is reported once
        let later = now + Duration::from_millis(1100);
        assert_eq!(limiter.admit(LogCategory::Memory, later), (true, 2));
        assert_eq!(limiter.admit(LogCategory::Memory, later), (true, 0));
    }
}
