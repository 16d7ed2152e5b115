//! Newline-delimited JSON control protocol
//!
//! Each request line is an object tagged by `cmd`:
//!
//! ```text
//! {"cmd":"run","rom_path":"game.nds","frame_by_frame":true}
//! {"cmd":"step","steps":10}
//! {"cmd":"read_memory","addr":33554432,"length":4,"proc":"arm9"}
//! {"cmd":"shutdown"}
//! ```
//!
//! and gets exactly one response line, either `{"ok":true,"result":...}` or
//! `{"ok":false,"error":{"kind":...,"message":...}}`.

use crate::backend::WindowBackend;
use crate::input::InputSnapshot;
use crate::session::Session;
use crate::timing::DEFAULT_FPS;
use crate::ScriptError;
use emu_core::logging::{log, LogCategory, LogLevel};
use emu_core::System;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::io::{BufRead, Write};
use std::path::PathBuf;

fn default_steps() -> i64 {
    1
}

fn default_fps() -> u32 {
    DEFAULT_FPS
}

fn default_proc() -> String {
    "arm7".to_string()
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Request {
    Run {
        rom_path: PathBuf,
        #[serde(default)]
        frame_by_frame: bool,
    },
    Step {
        #[serde(default = "default_steps")]
        steps: i64,
    },
    SetInputMode {
        #[serde(default, alias = "input")]
        enabled: bool,
    },
    SetFpsLimit {
        #[serde(default = "default_fps")]
        fps: u32,
    },
    GetInput,
    SetInput {
        input: Value,
    },
    ReadMemory {
        addr: u32,
        length: i64,
        #[serde(default = "default_proc")]
        proc: String,
    },
    WriteMemory {
        addr: u32,
        data: u32,
        byte_count: i64,
        #[serde(default = "default_proc")]
        proc: String,
    },
    SaveState {
        slot: u8,
    },
    LoadState {
        slot: u8,
    },
    Status,
    Shutdown,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub kind: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Response {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl Response {
    pub fn success(result: Value) -> Self {
        Self {
            ok: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(err: &ScriptError) -> Self {
        Self {
            ok: false,
            result: None,
            error: Some(ErrorBody {
                kind: err.kind(),
                message: err.to_string(),
            }),
        }
    }
}

/// Apply one request to the session.
pub fn dispatch<S: System, B: WindowBackend>(
    session: &mut Session<S, B>,
    request: Request,
) -> Result<Value, ScriptError> {
    match request {
        Request::Run {
            rom_path,
            frame_by_frame,
        } => session.run(&rom_path, frame_by_frame).map(|_| Value::Null),
        Request::Step { steps } => session.step(steps).map(|_| Value::Null),
        Request::SetInputMode { enabled } => {
            session.set_input_mode(enabled);
            Ok(Value::Null)
        }
        Request::SetFpsLimit { fps } => {
            session.set_fps_limit(fps);
            Ok(Value::Null)
        }
        Request::GetInput => Ok(session.get_input().to_value()),
        Request::SetInput { input } => {
            let snapshot = InputSnapshot::from_value(&input)?;
            Ok(session.set_input(snapshot).to_value())
        }
        Request::ReadMemory { addr, length, proc } => {
            session.read_memory(addr, length, &proc).map(Value::from)
        }
        Request::WriteMemory {
            addr,
            data,
            byte_count,
            proc,
        } => session
            .write_memory(addr, data, byte_count, &proc)
            .map(Value::from),
        Request::SaveState { slot } => session.save_state(slot).map(|_| Value::Null),
        Request::LoadState { slot } => session.load_state(slot).map(|_| Value::Null),
        Request::Status => Ok(json!({
            "prepared": session.is_prepared(),
            "quit": session.quit_requested(),
            "cycles": session.cycles(),
            "fps_limit": session.fps_limit(),
            "scripted_input": session.scripted_input(),
        })),
        Request::Shutdown => {
            session.teardown();
            Ok(Value::Null)
        }
    }
}

fn write_response<W: Write>(writer: &mut W, response: &Response) -> Result<(), ScriptError> {
    serde_json::to_writer(&mut *writer, response)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

/// Serve requests from `reader` until `shutdown`, end of input, or a fatal
/// error. A fatal error is answered, then returned.
pub fn serve<S, B, R, W>(
    session: &mut Session<S, B>,
    reader: R,
    mut writer: W,
) -> Result<(), ScriptError>
where
    S: System,
    B: WindowBackend,
    R: BufRead,
    W: Write,
{
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let request = match serde_json::from_str::<Request>(line) {
            Ok(request) => request,
            Err(e) => {
                log(LogCategory::Script, LogLevel::Warn, || {
                    format!("rejected request: {}", e)
                });
                write_response(&mut writer, &Response::failure(&ScriptError::Json(e)))?;
                continue;
            }
        };
        log(LogCategory::Script, LogLevel::Debug, || format!("{:?}", request));

        let shutdown = request == Request::Shutdown;
        match dispatch(session, request) {
            Ok(result) => write_response(&mut writer, &Response::success(result))?,
            Err(e) => {
                write_response(&mut writer, &Response::failure(&e))?;
                if e.is_fatal() {
                    return Err(e);
                }
            }
        }
        if shutdown {
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_defaults() {
        let req: Request = serde_json::from_str(r#"{"cmd":"step"}"#).unwrap();
        assert_eq!(req, Request::Step { steps: 1 });
        let req: Request = serde_json::from_str(r#"{"cmd":"set_fps_limit"}"#).unwrap();
        assert_eq!(req, Request::SetFpsLimit { fps: 60 });
        let req: Request = serde_json::from_str(r#"{"cmd":"set_input_mode"}"#).unwrap();
        assert_eq!(req, Request::SetInputMode { enabled: false });
        let req: Request =
            serde_json::from_str(r#"{"cmd":"set_input_mode","input":true}"#).unwrap();
        assert_eq!(req, Request::SetInputMode { enabled: true });
        let req: Request =
            serde_json::from_str(r#"{"cmd":"read_memory","addr":16,"length":2}"#).unwrap();
        assert_eq!(
            req,
            Request::ReadMemory {
                addr: 16,
                length: 2,
                proc: "arm7".into()
            }
        );
        let req: Request = serde_json::from_str(r#"{"cmd":"run","rom_path":"a.nds"}"#).unwrap();
        assert_eq!(
            req,
            Request::Run {
                rom_path: PathBuf::from("a.nds"),
                frame_by_frame: false
            }
        );
    }

    #[test]
    fn unknown_commands_fail_to_parse() {
        assert!(serde_json::from_str::<Request>(r#"{"cmd":"explode"}"#).is_err());
        assert!(serde_json::from_str::<Request>(r#"{"steps":1}"#).is_err());
    }

    #[test]
    fn response_shapes() {
        let ok = serde_json::to_value(Response::success(json!(5))).unwrap();
        assert_eq!(ok, json!({"ok": true, "result": 5}));

        let err = ScriptError::Argument(emu_core::ArgumentError::InvalidWidth(3));
        let failed = serde_json::to_value(Response::failure(&err)).unwrap();
        assert_eq!(failed["ok"], json!(false));
        assert_eq!(failed["error"]["kind"], json!("range_error"));
        assert!(failed.get("result").is_none());
    }
}
