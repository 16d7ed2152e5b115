//! Scripting bridge
//!
//! Drives an [`emu_core::System`] from a script: load and run a ROM, step a
//! number of cycles, inject pad and touch input, read and write guest memory
//! per processor, and keep save-state slots. [`protocol`] exposes the same
//! operations as newline-delimited JSON so any language can drive a session
//! over a pipe or socket.
//!
//! Everything is single-threaded: `step(n)` runs `n` cycles and returns.

pub mod backend;
pub mod config;
mod error;
pub mod input;
pub mod protocol;
pub mod save_state;
pub mod session;
pub mod timing;

pub use backend::{Headless, WindowBackend};
pub use config::RunConfig;
pub use error::ScriptError;
pub use input::{ControlState, InputSnapshot, Pointer};
pub use save_state::GameSaves;
pub use session::Session;
