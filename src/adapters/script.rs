//! Line based command scripts driving a [`MarkerController`].
//!
//! ```text
//! # comment
//! place 48.00199 7.81989 Freiburg Hbf
//! click 48.00223 7.82006
//! drag 2
//! move 2 48.0021 7.8200
//! release 2 48.0022 7.8201
//! label 1 Freiburg Hauptbahnhof
//! hover 1
//! leave 1
//! remove 2
//! wait
//! status
//! ```

use crate::core::controller::MarkerController;
use crate::domain::model::{Position, Slot};
use crate::domain::ports::MarkerRenderer;
use crate::utils::error::{ClientError, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Place { position: Position, label: String },
    Click(Position),
    Remove(Slot),
    Drag(Slot),
    Move { slot: Slot, position: Position },
    Release { slot: Slot, position: Position },
    Label { slot: Slot, label: String },
    Hover(Slot),
    Leave(Slot),
    Wait,
    Status,
}

/// Parses one line; blank lines and `#` comments yield `None`.
pub fn parse_line(line_no: usize, line: &str) -> Result<Option<Command>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let err = |message: String| ClientError::Command {
        line: line_no,
        message,
    };

    let (keyword, rest) = match line.split_once(char::is_whitespace) {
        Some((keyword, rest)) => (keyword, rest.trim()),
        None => (line, ""),
    };
    let mut args = rest.split_whitespace();

    let slot = |args: &mut std::str::SplitWhitespace<'_>| -> Result<Slot> {
        let raw = args
            .next()
            .ok_or_else(|| err(format!("'{}' needs a slot (1 or 2)", keyword)))?;
        raw.parse::<u8>()
            .ok()
            .and_then(Slot::from_number)
            .ok_or_else(|| err(format!("invalid slot '{}', expected 1 or 2", raw)))
    };

    let position = |args: &mut std::str::SplitWhitespace<'_>| -> Result<Position> {
        let mut coordinate = |name: &str| -> Result<f64> {
            let raw = args
                .next()
                .ok_or_else(|| err(format!("'{}' needs a {}", keyword, name)))?;
            raw.parse::<f64>()
                .map_err(|_| err(format!("invalid {} '{}'", name, raw)))
        };
        let latitude = coordinate("latitude")?;
        let longitude = coordinate("longitude")?;
        Ok(Position::new(latitude, longitude))
    };

    let rest_text = |args: std::str::SplitWhitespace<'_>| args.collect::<Vec<_>>().join(" ");

    let command = match keyword.to_ascii_lowercase().as_str() {
        "place" => {
            let position = position(&mut args)?;
            Command::Place {
                position,
                label: rest_text(args),
            }
        }
        "click" => Command::Click(position(&mut args)?),
        "remove" | "close" => Command::Remove(slot(&mut args)?),
        "drag" => Command::Drag(slot(&mut args)?),
        "move" => {
            let slot = slot(&mut args)?;
            Command::Move {
                slot,
                position: position(&mut args)?,
            }
        }
        "release" => {
            let slot = slot(&mut args)?;
            Command::Release {
                slot,
                position: position(&mut args)?,
            }
        }
        "label" => {
            let slot = slot(&mut args)?;
            // 標籤保留原始空白，送出請求時才修剪
            let label = rest
                .split_once(char::is_whitespace)
                .map(|(_, label)| label.to_string())
                .unwrap_or_default();
            Command::Label { slot, label }
        }
        "hover" => Command::Hover(slot(&mut args)?),
        "leave" => Command::Leave(slot(&mut args)?),
        "wait" => Command::Wait,
        "status" => Command::Status,
        other => return Err(err(format!("unknown command '{}'", other))),
    };

    Ok(Some(command))
}

pub fn parse_script(script: &str) -> Result<Vec<Command>> {
    let mut commands = Vec::new();
    for (i, line) in script.lines().enumerate() {
        if let Some(command) = parse_line(i + 1, line)? {
            commands.push(command);
        }
    }
    Ok(commands)
}

impl Command {
    /// Runs the command; `status` returns the state snapshot to print.
    pub async fn run<R: MarkerRenderer>(
        self,
        controller: &mut MarkerController<R>,
    ) -> Result<Option<serde_json::Value>> {
        match self {
            Command::Place { position, label } => {
                if controller.place_marker(position, label)?.is_none() {
                    tracing::info!("Both stations are placed, remove one first");
                }
            }
            Command::Click(position) => {
                if controller.click(position)?.is_none() {
                    tracing::info!("Both stations are placed, remove one first");
                }
            }
            Command::Remove(slot) => controller.remove_marker(slot)?,
            Command::Drag(slot) => controller.begin_drag(slot)?,
            Command::Move { slot, position } => controller.drag_to(slot, position)?,
            Command::Release { slot, position } => controller.end_drag(slot, position)?,
            Command::Label { slot, label } => controller.edit_label(slot, label)?,
            Command::Hover(slot) => controller.pointer_enter_label(slot)?,
            Command::Leave(slot) => controller.pointer_leave_label(slot)?,
            Command::Wait => controller.settle().await,
            Command::Status => return Ok(Some(controller.snapshot()?)),
        }
        Ok(None)
    }
}
