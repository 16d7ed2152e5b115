//! The scripting session
//!
//! A [`Session`] owns one machine and one window backend and exposes the
//! operations a script drives it with: run a ROM, step cycles, inject input,
//! peek and poke guest memory, save and restore state slots.
//!
//! A *cycle* is one presented frame followed by `frameskip` frames emulated
//! without rendering, then frame pacing and the FPS title update.

use crate::backend::WindowBackend;
use crate::config::RunConfig;
use crate::input::{ControlState, InputSnapshot};
use crate::save_state::GameSaves;
use crate::timing::{FpsCounter, FrameLimiter};
use crate::ScriptError;
use emu_core::logging::{log, LogCategory, LogLevel};
use emu_core::{AccessWidth, Processor, System};
use std::path::{Path, PathBuf};

pub struct Session<S: System, B: WindowBackend> {
    system: S,
    backend: B,
    config: RunConfig,
    ctrl: ControlState,
    scripted_input: bool,
    input: InputSnapshot,
    limiter: FrameLimiter,
    fps: FpsCounter,
    prepared: bool,
    /// An external write may have modified code; flush before the next step.
    pending_flush: bool,
    rom_hash: Option<String>,
    saves_dir: PathBuf,
    cycles: u64,
}

impl<S: System, B: WindowBackend> Session<S, B> {
    pub fn new(system: S, backend: B, config: RunConfig) -> Result<Self, ScriptError> {
        config.validate()?;
        Ok(Self {
            system,
            backend,
            limiter: FrameLimiter::new(config.fps_limit),
            ctrl: ControlState::new(config.auto_pause),
            config,
            scripted_input: false,
            input: InputSnapshot::default(),
            fps: FpsCounter::new(),
            prepared: false,
            pending_flush: false,
            rom_hash: None,
            saves_dir: GameSaves::default_dir(),
            cycles: 0,
        })
    }

    /// Store save-state slots under `dir` instead of beside the executable.
    pub fn with_saves_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.saves_dir = dir.into();
        self
    }

    pub fn system(&self) -> &S {
        &self.system
    }

    pub fn system_mut(&mut self) -> &mut S {
        &mut self.system
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn is_prepared(&self) -> bool {
        self.prepared
    }

    pub fn quit_requested(&self) -> bool {
        self.ctrl.quit
    }

    /// Ask the pump to stop, as closing the window would.
    pub fn request_quit(&mut self) {
        self.ctrl.quit = true;
    }

    pub fn scripted_input(&self) -> bool {
        self.scripted_input
    }

    pub fn pending_flush(&self) -> bool {
        self.pending_flush
    }

    /// Cycles executed since the session was created.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn fps_limit(&self) -> u32 {
        self.limiter.fps()
    }

    /// Load `rom_path` and, unless `frame_by_frame`, pump cycles until quit
    /// is requested, then tear down.
    ///
    /// Fails without loading anything when the backend could never request
    /// quit, since the pump would not return.
    pub fn run(&mut self, rom_path: &Path, frame_by_frame: bool) -> Result<(), ScriptError> {
        if !frame_by_frame && !self.backend.can_quit() {
            return Err(ScriptError::Config(format!(
                "the {} backend never requests quit; run frame by frame or set a frame budget",
                self.backend.name()
            )));
        }
        self.prepare(rom_path)?;
        if !frame_by_frame {
            while !self.ctrl.quit {
                self.execute_cycle()?;
            }
            self.teardown();
        }
        Ok(())
    }

    fn prepare(&mut self, rom_path: &Path) -> Result<(), ScriptError> {
        let rom = std::fs::read(rom_path).map_err(|e| ScriptError::RomLoad {
            path: rom_path.to_path_buf(),
            reason: e.to_string(),
        })?;
        self.system.load_rom(&rom).map_err(|e| ScriptError::RomLoad {
            path: rom_path.to_path_buf(),
            reason: e.to_string(),
        })?;
        log(LogCategory::Script, LogLevel::Info, || {
            format!("loaded {} ({} bytes)", rom_path.display(), rom.len())
        });

        self.rom_hash = Some(GameSaves::rom_hash(&rom));
        self.ctrl = ControlState::new(self.config.auto_pause);
        self.limiter = FrameLimiter::new(self.limiter.fps());
        self.fps = FpsCounter::new();
        self.prepared = true;

        if let Some(slot) = self.config.load_slot {
            if let Err(e) = self.load_state(slot) {
                log(LogCategory::State, LogLevel::Warn, || {
                    format!("could not restore slot {}: {}", slot, e)
                });
            }
        }
        Ok(())
    }

    /// Run `steps` cycles.
    ///
    /// A pending code-cache flush is performed first, even when nothing is
    /// loaded. Does nothing before `run`; once quit was requested the session
    /// is torn down instead.
    pub fn step(&mut self, steps: i64) -> Result<(), ScriptError> {
        if self.pending_flush {
            log(LogCategory::Memory, LogLevel::Info, || {
                "code cache flushed after external write".to_string()
            });
            self.system.flush_code_cache();
            self.pending_flush = false;
        }
        if !self.prepared {
            return Ok(());
        }
        if self.ctrl.quit {
            self.teardown();
            return Ok(());
        }
        for _ in 0..steps.max(0) {
            self.execute_cycle()?;
            if self.ctrl.quit {
                break;
            }
        }
        Ok(())
    }

    /// `true` replaces the window event pump with the scripted snapshot.
    pub fn set_input_mode(&mut self, scripted: bool) {
        self.scripted_input = scripted;
    }

    /// Limiter target; 0 runs unthrottled.
    pub fn set_fps_limit(&mut self, fps: u32) {
        self.limiter.set_fps(fps);
    }

    pub fn get_input(&self) -> InputSnapshot {
        self.input
    }

    pub fn set_input(&mut self, input: InputSnapshot) -> InputSnapshot {
        self.input = input;
        self.get_input()
    }

    /// Validate the processor first, then the width.
    fn access(proc: &str, length: i64) -> Result<(Processor, AccessWidth), ScriptError> {
        let parsed = proc
            .parse::<Processor>()
            .and_then(|p| AccessWidth::try_from(length).map(|width| (p, width)));
        parsed.map_err(|e| {
            log(LogCategory::Memory, LogLevel::Debug, || {
                format!("rejected access: proc {:?}, length {}", proc, length)
            });
            e.into()
        })
    }

    pub fn read_memory(&mut self, addr: u32, length: i64, proc: &str) -> Result<u32, ScriptError> {
        let (proc, width) = Self::access(proc, length)?;
        let value = self.system.read(proc, addr, width);
        log(LogCategory::Memory, LogLevel::Trace, || {
            format!("{} read{} {:#010X} = {:#X}", proc, width.bytes() * 8, addr, value)
        });
        Ok(value)
    }

    /// Write `data`, truncated to `byte_count` bytes.
    pub fn write_memory(
        &mut self,
        addr: u32,
        data: u32,
        byte_count: i64,
        proc: &str,
    ) -> Result<bool, ScriptError> {
        let (proc, width) = Self::access(proc, byte_count)?;
        let data = data & width.mask();
        let touched_code = self.system.write_external(proc, addr, data, width);
        log(LogCategory::Memory, LogLevel::Trace, || {
            format!("{} write{} {:#010X} <- {:#X}", proc, width.bytes() * 8, addr, data)
        });
        self.pending_flush |= touched_code;
        Ok(true)
    }

    fn current_rom_hash(&self) -> Result<&str, ScriptError> {
        if !self.system.supports_save_states() {
            return Err(ScriptError::State(
                "save states are not supported by this machine".to_string(),
            ));
        }
        match (self.prepared, self.rom_hash.as_deref()) {
            (true, Some(hash)) => Ok(hash),
            _ => Err(ScriptError::State("no ROM is running".to_string())),
        }
    }

    /// Save the machine to `slot` (1-5).
    pub fn save_state(&mut self, slot: u8) -> Result<(), ScriptError> {
        let hash = self.current_rom_hash()?.to_string();
        let data = serde_json::to_vec(&self.system.save_state())?;
        let mut saves = GameSaves::load(&self.saves_dir, &hash);
        saves.save_slot(&self.saves_dir, slot, &data, &hash)?;
        log(LogCategory::State, LogLevel::Info, || format!("saved slot {}", slot));
        Ok(())
    }

    /// Restore the machine from `slot` (1-5).
    pub fn load_state(&mut self, slot: u8) -> Result<(), ScriptError> {
        let hash = self.current_rom_hash()?.to_string();
        let data = GameSaves::load(&self.saves_dir, &hash).load_slot(slot, &hash)?;
        let state: serde_json::Value = serde_json::from_slice(&data)
            .map_err(|e| ScriptError::State(format!("slot {}: {}", slot, e)))?;
        self.system
            .load_state(&state)
            .map_err(|e| ScriptError::State(format!("slot {}: {}", slot, e)))?;
        log(LogCategory::State, LogLevel::Info, || format!("loaded slot {}", slot));
        Ok(())
    }

    /// Close the window and mark the session unprepared. Guest memory stays
    /// readable. Safe to call more than once.
    pub fn teardown(&mut self) {
        if !self.prepared {
            return;
        }
        self.backend.close();
        self.prepared = false;
        log(LogCategory::Script, LogLevel::Info, || {
            format!("session torn down after {} cycles", self.cycles)
        });
    }

    fn execute_cycle(&mut self) -> Result<(), ScriptError> {
        self.emulate_frame()?;
        self.backend
            .present(self.system.screens())
            .map_err(|e| ScriptError::Backend(e.to_string()))?;

        let frameskip = self.config.frameskip();
        for _ in 0..frameskip {
            self.system.skip_next_frame();
            self.emulate_frame()?;
        }

        let now = self.backend.ticks_ms();
        if !self.config.disable_limiter && !self.ctrl.boost {
            let delay = self.limiter.delay(now);
            if delay > 0 {
                self.backend.delay_ms(delay);
            }
        }
        self.limiter.advance(frameskip);

        if let Some(fps) = self.fps.tick(now) {
            self.backend.set_title(&FpsCounter::title(fps));
            log(LogCategory::Timing, LogLevel::Debug, || format!("{:.2} fps", fps));
        }
        self.cycles += 1;
        Ok(())
    }

    /// Feed input, then emulate one frame.
    fn emulate_frame(&mut self) -> Result<(), ScriptError> {
        if self.scripted_input {
            self.input.pointer.latch(&mut self.system);
            self.system.set_keypad(self.input.keypad());
            self.input.reset();
        } else {
            self.backend.poll_input(&mut self.ctrl);
            self.ctrl.pointer.latch(&mut self.system);
            self.system.set_keypad(self.ctrl.keypad);
        }
        self.system
            .step_frame()
            .map_err(|e| ScriptError::Emulation(e.to_string()))
    }
}

impl<S: System, B: WindowBackend> Drop for Session<S, B> {
    fn drop(&mut self) {
        self.teardown();
    }
}
