//! SDL2 window backend
//!
//! Two 256x192 BGR555 screens drawn side by side or stacked, keyboard and
//! game controller input mapped to the keypad, and the mouse driving the
//! touch screen.

use crate::layout::ScreenLayout;
use crate::settings::KeyMapping;
use emu_core::types::{SCREEN_HEIGHT, SCREEN_WIDTH};
use emu_core::Button;
use emu_script::{ControlState, WindowBackend};
use sdl2::controller::{Button as PadButton, GameController};
use sdl2::event::{Event, WindowEvent};
use sdl2::keyboard::Keycode;
use sdl2::mouse::MouseButton;
use sdl2::pixels::PixelFormatEnum;
use sdl2::rect::Rect;
use sdl2::render::Canvas;
use sdl2::video::Window;
use sdl2::{EventPump, GameControllerSubsystem, Sdl, VideoSubsystem};
use std::collections::HashMap;
use std::error::Error;
use std::time::{Duration, Instant};

/// Pad buttons by position: the pad's bottom face button is B, as on the
/// handheld.
fn pad_button(button: PadButton) -> Option<Button> {
    match button {
        PadButton::A => Some(Button::B),
        PadButton::B => Some(Button::A),
        PadButton::X => Some(Button::Y),
        PadButton::Y => Some(Button::X),
        PadButton::Back => Some(Button::Select),
        PadButton::Start => Some(Button::Start),
        PadButton::DPadUp => Some(Button::Up),
        PadButton::DPadDown => Some(Button::Down),
        PadButton::DPadLeft => Some(Button::Left),
        PadButton::DPadRight => Some(Button::Right),
        PadButton::LeftShoulder => Some(Button::L),
        PadButton::RightShoulder => Some(Button::R),
        _ => None,
    }
}

/// Resolve configured key names; unknown names are reported and skipped.
fn build_keymap(mapping: &KeyMapping) -> HashMap<Keycode, Button> {
    let mut keymap = HashMap::new();
    for (button, name) in mapping.bindings() {
        match Keycode::from_name(name) {
            Some(key) => {
                keymap.insert(key, button);
            }
            None => log::warn!("Unknown key '{}' for {:?}, leaving it unbound", name, button),
        }
    }
    keymap
}

pub struct SdlBackend {
    _sdl_context: Sdl,
    _video_subsystem: VideoSubsystem,
    game_controller_subsystem: GameControllerSubsystem,
    /// `None` once closed.
    canvas: Option<Canvas<Window>>,
    event_pump: EventPump,
    layout: ScreenLayout,
    keymap: HashMap<Keycode, Button>,
    game_controllers: HashMap<u32, GameController>,
    /// Left button went down on the touch screen and is still held.
    mouse_down: bool,
    start: Instant,
}

impl SdlBackend {
    pub fn new(layout: ScreenLayout, keys: &KeyMapping) -> Result<Self, Box<dyn Error>> {
        let sdl_context = sdl2::init()?;
        let video_subsystem = sdl_context.video()?;
        let game_controller_subsystem = sdl_context.game_controller()?;

        let (width, height) = layout.window_size();
        let window = video_subsystem
            .window("hemu-ds", width, height)
            .position_centered()
            .build()?;
        let canvas = window.into_canvas().accelerated().build()?;
        let event_pump = sdl_context.event_pump()?;

        let mut game_controllers = HashMap::new();
        for id in 0..game_controller_subsystem.num_joysticks()? {
            if !game_controller_subsystem.is_game_controller(id) {
                continue;
            }
            match game_controller_subsystem.open(id) {
                Ok(controller) => {
                    log::info!("Opened game controller {}: {}", id, controller.name());
                    game_controllers.insert(controller.instance_id(), controller);
                }
                Err(e) => log::warn!("Failed to open game controller {}: {}", id, e),
            }
        }

        Ok(Self {
            _sdl_context: sdl_context,
            _video_subsystem: video_subsystem,
            game_controller_subsystem,
            canvas: Some(canvas),
            event_pump,
            layout,
            keymap: build_keymap(keys),
            game_controllers,
            mouse_down: false,
            start: Instant::now(),
        })
    }

    fn handle_event(&mut self, event: Event, ctrl: &mut ControlState) {
        match event {
            Event::Quit { .. }
            | Event::KeyDown {
                keycode: Some(Keycode::Escape),
                ..
            } => {
                ctrl.quit = true;
            }
            Event::KeyDown {
                keycode: Some(key),
                repeat,
                ..
            } => match self.keymap.get(&key) {
                Some(Button::Boost) if !repeat => {
                    ctrl.boost = !ctrl.boost;
                    log::info!("Boost {}", if ctrl.boost { "on" } else { "off" });
                }
                Some(Button::Boost) => {}
                Some(&button) => ctrl.keypad.set(button, true),
                None => {}
            },
            Event::KeyUp {
                keycode: Some(key), ..
            } => match self.keymap.get(&key) {
                Some(Button::Boost) | None => {}
                Some(&button) => ctrl.keypad.set(button, false),
            },
            Event::ControllerDeviceAdded { which, .. } => {
                match self.game_controller_subsystem.open(which) {
                    Ok(controller) => {
                        log::info!("Game controller added: {}", controller.name());
                        self.game_controllers
                            .insert(controller.instance_id(), controller);
                    }
                    Err(e) => log::warn!("Failed to open game controller {}: {}", which, e),
                }
            }
            Event::ControllerDeviceRemoved { which, .. } => {
                log::info!("Game controller removed (instance ID: {})", which);
                self.game_controllers.remove(&which);
            }
            Event::ControllerButtonDown { button, .. } => {
                if let Some(button) = pad_button(button) {
                    ctrl.keypad.set(button, true);
                }
            }
            Event::ControllerButtonUp { button, .. } => {
                if let Some(button) = pad_button(button) {
                    ctrl.keypad.set(button, false);
                }
            }
            Event::MouseButtonDown {
                mouse_btn: MouseButton::Left,
                x,
                y,
                ..
            } => {
                if let Some((tx, ty)) = self.layout.touch_at(x, y) {
                    ctrl.pointer.x = tx;
                    ctrl.pointer.y = ty;
                    ctrl.pointer.down = 1;
                    self.mouse_down = true;
                }
            }
            Event::MouseMotion { x, y, .. } if self.mouse_down => {
                let (tx, ty) = self.layout.touch_clamped(x, y);
                ctrl.pointer.x = tx;
                ctrl.pointer.y = ty;
            }
            Event::MouseButtonUp {
                mouse_btn: MouseButton::Left,
                ..
            } if self.mouse_down => {
                ctrl.pointer.down = 0;
                ctrl.pointer.click = 1;
                self.mouse_down = false;
            }
            Event::Window {
                win_event: WindowEvent::FocusGained,
                ..
            } => ctrl.focused = true,
            Event::Window {
                win_event: WindowEvent::FocusLost,
                ..
            } => ctrl.focused = false,
            _ => {}
        }
    }
}

impl WindowBackend for SdlBackend {
    fn poll_input(&mut self, ctrl: &mut ControlState) {
        while !ctrl.quit {
            let event = match self.event_pump.poll_event() {
                Some(event) => event,
                // Unfocused with auto-pause: sleep until something happens
                None if ctrl.paused() => self.event_pump.wait_event(),
                None => break,
            };
            self.handle_event(event, ctrl);
        }
    }

    fn present(&mut self, screens: [&[u16]; 2]) -> Result<(), Box<dyn Error>> {
        let Some(canvas) = self.canvas.as_mut() else {
            return Ok(());
        };
        let texture_creator = canvas.texture_creator();
        canvas.clear();
        for (pixels, (x, y, w, h)) in screens.into_iter().zip(self.layout.screen_rects()) {
            let mut texture = texture_creator.create_texture_streaming(
                PixelFormatEnum::BGR555,
                SCREEN_WIDTH as u32,
                SCREEN_HEIGHT as u32,
            )?;
            texture.update(None, bytemuck::cast_slice::<u16, u8>(pixels), SCREEN_WIDTH * 2)?;
            canvas.copy(&texture, None, Rect::new(x, y, w, h))?;
        }
        canvas.present();
        Ok(())
    }

    fn set_title(&mut self, title: &str) {
        if let Some(canvas) = self.canvas.as_mut() {
            if let Err(e) = canvas.window_mut().set_title(title) {
                log::warn!("Failed to set window title: {}", e);
            }
        }
    }

    fn ticks_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    fn delay_ms(&mut self, ms: u32) {
        std::thread::sleep(Duration::from_millis(ms as u64));
    }

    fn close(&mut self) {
        self.game_controllers.clear();
        self.canvas = None;
    }

    fn name(&self) -> &str {
        "sdl2"
    }
}
