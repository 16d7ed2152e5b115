use emu_core::ArgumentError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced to scripts and to the frontend.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error(transparent)]
    Argument(#[from] ArgumentError),
    #[error("error while loading {}: {reason}", .path.display())]
    RomLoad { path: PathBuf, reason: String },
    #[error("invalid input: {0}")]
    Input(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("save state: {0}")]
    State(String),
    #[error("emulation failed: {0}")]
    Emulation(String),
    #[error("window backend: {0}")]
    Backend(String),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ScriptError {
    /// Stable error kind reported to remote scripts.
    pub fn kind(&self) -> &'static str {
        match self {
            ScriptError::Argument(ArgumentError::InvalidProcessor(_)) => "invalid_argument",
            ScriptError::Argument(ArgumentError::InvalidWidth(_)) => "range_error",
            ScriptError::RomLoad { .. } => "rom_load",
            ScriptError::Input(_) | ScriptError::Config(_) | ScriptError::Json(_) => "bad_request",
            ScriptError::State(_) => "state_error",
            ScriptError::Emulation(_) | ScriptError::Backend(_) | ScriptError::Io(_) => {
                "runtime_error"
            }
        }
    }

    /// Errors after which the process must not keep serving.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ScriptError::RomLoad { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argument_errors_map_to_kinds() {
        let e: ScriptError = ArgumentError::InvalidProcessor("arm11".into()).into();
        assert_eq!(e.kind(), "invalid_argument");
        assert!(!e.is_fatal());
        let e: ScriptError = ArgumentError::InvalidWidth(3).into();
        assert_eq!(e.kind(), "range_error");
    }

    #[test]
    fn rom_load_is_fatal() {
        let e = ScriptError::RomLoad {
            path: PathBuf::from("/nope.nds"),
            reason: "missing".into(),
        };
        assert!(e.is_fatal());
        assert_eq!(e.to_string(), "error while loading /nope.nds: missing");
    }
}
