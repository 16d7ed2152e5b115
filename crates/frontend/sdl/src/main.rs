mod layout;
mod sdl_backend;
mod settings;

use anyhow::{anyhow, bail, Context, Result};
use clap::{ArgGroup, Parser};
use emu_core::logging::{LogConfig, LogLevel};
use emu_nds::{FirmwareLanguage, GbaCartridge, NdsConfig, NdsSystem, SaveType};
use emu_script::protocol::serve;
use emu_script::{GameSaves, Headless, RunConfig, ScriptError, Session, WindowBackend};
use layout::ScreenLayout;
use sdl_backend::SdlBackend;
use settings::Settings;
use std::fs;
use std::io::{self, BufReader};
use std::net::TcpListener;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "hemu-ds", version, about = "Scriptable dual-screen handheld emulator")]
#[command(group(ArgGroup::new("serve").args(["script", "listen"])))]
struct Args {
    /// ROM image to load
    rom: Option<PathBuf>,

    /// Frames emulated without rendering after each presented one
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    frameskip: i64,

    /// Window scale factor (default from config.json)
    #[arg(long)]
    scale: Option<u32>,

    /// Place the screens side by side
    #[arg(long)]
    horizontal: bool,

    /// Frame limiter target, 0 for unlimited
    #[arg(long, default_value_t = 60)]
    fps: u32,

    #[arg(long)]
    disable_limiter: bool,

    /// Pause emulation while the window is unfocused
    #[arg(long)]
    auto_pause: bool,

    /// Restore this save-state slot (1-5) after loading the ROM
    #[arg(long)]
    load_slot: Option<u8>,

    /// Save to this slot (1-5) when the run ends
    #[arg(long)]
    save_slot: Option<u8>,

    /// 0 = Autodetect, 1 = EEPROM 4kbit, 2 = EEPROM 64kbit, 3 = EEPROM 512kbit,
    /// 4 = FRAM 256kbit, 5 = FLASH 2mbit, 6 = FLASH 4mbit
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    save_type: i64,

    /// 0 = Japanese, 1 = English, 2 = French, 3 = German, 4 = Italian, 5 = Spanish
    #[arg(long, allow_negative_numbers = true)]
    fwlang: Option<i64>,

    /// GBA cartridge for slot 2; SRAM is kept in the matching .sav file
    #[arg(long, value_name = "PATH")]
    gba_rom: Option<PathBuf>,

    /// With --script/--listen: load the ROM and wait for step requests
    #[arg(long, requires = "serve")]
    frame_by_frame: bool,

    /// Serve the JSON-lines protocol on stdin/stdout
    #[arg(long)]
    script: bool,

    /// Serve the JSON-lines protocol to one TCP client
    #[arg(long, value_name = "ADDR")]
    listen: Option<String>,

    /// Run without a window
    #[arg(long)]
    headless: bool,

    /// Run this many cycles instead of until the window closes
    #[arg(long)]
    frames: Option<u64>,

    /// Emulator log levels: LEVEL or CATEGORY=LEVEL (repeatable)
    #[arg(long = "log", value_name = "CAT=LEVEL")]
    log: Vec<String>,
}

impl Args {
    fn serving(&self) -> bool {
        self.script || self.listen.is_some()
    }
}

fn init_logging(directives: &[String]) -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .filter_module("hemu", log::LevelFilter::Trace)
        .init();

    let config = LogConfig::global();
    config.set_global_level(LogLevel::Warn);
    for directive in directives {
        config
            .apply_directive(directive)
            .map_err(|e| anyhow!("--log {}: {}", directive, e))?;
    }
    Ok(())
}

fn run_config(args: &Args, settings: &Settings) -> RunConfig {
    RunConfig {
        frameskip: args.frameskip,
        scale: args.scale.unwrap_or(settings.scale),
        horizontal: args.horizontal || settings.horizontal,
        fps_limit: args.fps,
        disable_limiter: args.disable_limiter,
        auto_pause: args.auto_pause,
        load_slot: args.load_slot,
        save_type: args.save_type,
        firmware_language: args.fwlang,
    }
}

fn machine(config: &RunConfig) -> NdsSystem {
    NdsSystem::new(NdsConfig {
        save_type: SaveType::from_index(config.save_type).unwrap_or_default(),
        firmware_language: config.firmware_language.and_then(FirmwareLanguage::from_index),
    })
}

/// Put the slot-2 cartridge in, with its SRAM when a .sav file exists. A
/// missing ROM leaves the slot empty.
fn insert_gba_rom(system: &mut NdsSystem, path: &Path) -> Result<()> {
    let rom = match fs::read(path) {
        Ok(rom) => rom,
        Err(e) => {
            log::warn!("GBA ROM {} not loaded: {}", path.display(), e);
            return Ok(());
        }
    };
    let mut cart = GbaCartridge::new(rom).with_context(|| format!("GBA ROM {}", path.display()))?;
    let sav = GbaCartridge::save_path(path);
    if let Ok(sram) = fs::read(&sav) {
        log::info!("Loaded GBA SRAM from {}", sav.display());
        cart = cart.with_sram(&sram);
    }
    system.insert_gba_cartridge(cart);
    Ok(())
}

/// Write slot-2 SRAM back to the .sav file if the game changed it.
fn save_gba_sram(system: &NdsSystem, path: &Path) -> Result<()> {
    if let Some(cart) = system.gba_cartridge().filter(|c| c.sram_dirty()) {
        let sav = GbaCartridge::save_path(path);
        fs::write(&sav, cart.sram()).with_context(|| format!("writing {}", sav.display()))?;
        log::info!("Saved GBA SRAM to {}", sav.display());
    }
    Ok(())
}

/// Without a window, `--frames` is the only way a run can end.
fn headless_backend(args: &Args) -> Headless {
    match args.frames {
        Some(frames) => Headless::new().with_frame_budget(frames),
        None => Headless::new(),
    }
}

fn check_args(args: &Args) -> Result<()> {
    if !args.serving() && args.rom.is_none() {
        bail!("Need to specify file to load.");
    }
    if args.headless && args.rom.is_some() && !args.frame_by_frame && args.frames.is_none() {
        bail!("--headless needs --frames, or --frame-by-frame with --script/--listen");
    }
    Ok(())
}

/// Run the ROM until quit, or for `frames` cycles when given.
fn pump<B: WindowBackend>(
    session: &mut Session<NdsSystem, B>,
    rom: &Path,
    frames: Option<u64>,
) -> Result<(), ScriptError> {
    match frames {
        Some(frames) => {
            session.run(rom, true)?;
            session.step(frames.min(i64::MAX as u64) as i64)
        }
        None => session.run(rom, false),
    }
}

fn drive<B: WindowBackend>(
    args: &Args,
    config: RunConfig,
    system: NdsSystem,
    backend: B,
    saves_dir: PathBuf,
) -> Result<()> {
    log::info!("Using {} backend", backend.name());
    let mut session = Session::new(system, backend, config)?.with_saves_dir(saves_dir);

    if args.serving() {
        if let Some(rom) = &args.rom {
            if args.frame_by_frame {
                session.run(rom, true)?;
            } else {
                pump(&mut session, rom, args.frames)?;
            }
        }
        if args.script {
            serve(&mut session, io::stdin().lock(), io::stdout().lock())?;
        } else if let Some(addr) = &args.listen {
            let listener =
                TcpListener::bind(addr).with_context(|| format!("binding {}", addr))?;
            log::info!("Waiting for a script client on {}", listener.local_addr()?);
            let (stream, peer) = listener.accept()?;
            log::info!("Script client connected from {}", peer);
            let reader = BufReader::new(stream.try_clone()?);
            serve(&mut session, reader, stream)?;
        }
    } else {
        let rom = args
            .rom
            .as_ref()
            .ok_or_else(|| anyhow!("Need to specify file to load."))?;
        pump(&mut session, rom, args.frames)?;
        log::info!("Ran {} cycles", session.cycles());
    }

    if let Some(slot) = args.save_slot {
        if session.is_prepared() {
            session.save_state(slot)?;
        } else {
            log::warn!("Session ended before slot {} could be saved", slot);
        }
    }
    session.teardown();
    if let Some(path) = &args.gba_rom {
        save_gba_sram(session.system(), path)?;
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log)?;

    let settings = Settings::load();
    let config = run_config(&args, &settings);
    config.validate()?;
    check_args(&args)?;

    let saves_dir = settings
        .saves_dir
        .clone()
        .unwrap_or_else(GameSaves::default_dir);

    let mut system = machine(&config);
    if let Some(path) = &args.gba_rom {
        insert_gba_rom(&mut system, path)?;
    }

    if args.headless {
        drive(&args, config, system, headless_backend(&args), saves_dir)
    } else {
        let layout = ScreenLayout::new(config.scale, config.horizontal);
        let backend = SdlBackend::new(layout, &settings.keyboard)
            .map_err(|e| anyhow!("SDL initialisation failed: {}", e))?;
        drive(&args, config, system, backend, saves_dir)
    }
}
