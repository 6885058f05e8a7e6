//! Turn recorder for writing episode events to JSONL.
//!
//! Every engine turn becomes one line, scripted turns from a composite
//! action included, so a recording shows exactly what the engine received.

use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::episode::EpisodeEvent;

/// A timestamped record in the JSONL file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnRecord {
    /// Unix timestamp in milliseconds.
    pub ts: u64,

    /// Record type (`_meta.reset`, `engine.turn`, `_meta.end`).
    pub event: String,

    pub data: serde_json::Value,
}

impl TurnRecord {
    /// Creates a record stamped with the current time.
    pub fn new(event: impl Into<String>, data: impl Serialize) -> Self {
        let ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;

        Self {
            ts,
            event: event.into(),
            data: serde_json::to_value(data).unwrap_or(serde_json::Value::Null),
        }
    }

    /// Creates the record for an episode event.
    pub fn from_event(event: &EpisodeEvent<'_>) -> Self {
        match event {
            EpisodeEvent::Reset { task, level } => Self::new(
                "_meta.reset",
                serde_json::json!({
                    "task": task,
                    "level": level.label(),
                }),
            ),
            EpisodeEvent::Turn {
                step,
                command,
                scripted,
                transition,
            } => Self::new(
                "engine.turn",
                serde_json::json!({
                    "step": step,
                    "command": command.to_string(),
                    "key": command.key(),
                    "scripted": scripted,
                    "message": transition.observation.message_text(),
                    "done": transition.done,
                }),
            ),
            EpisodeEvent::End { step, end } => Self::new(
                "_meta.end",
                serde_json::json!({
                    "steps": step,
                    "reason": end.as_str(),
                }),
            ),
        }
    }
}

/// Writes episode events as JSON lines.
///
/// Meant to be attached with [`Episode::add_observer`](crate::Episode::add_observer)
/// behind an `Arc`. Write errors are dropped so a full disk never stops an
/// episode; call [`TurnRecorder::flush`] to surface them.
pub struct TurnRecorder<W> {
    writer: Mutex<W>,
}

impl<W: Write> TurnRecorder<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Records one episode event.
    pub fn record(&self, event: &EpisodeEvent<'_>) {
        self.write_record(&TurnRecord::from_event(event));
    }

    fn write_record(&self, record: &TurnRecord) {
        if let Ok(mut writer) = self.writer.lock()
            && let Ok(json) = serde_json::to_string(record)
        {
            let _ = writeln!(writer, "{}", json);
        }
    }

    /// Flushes the writer.
    pub fn flush(&self) -> io::Result<()> {
        match self.writer.lock() {
            Ok(mut writer) => writer.flush(),
            Err(_) => Err(io::Error::other("recorder lock poisoned")),
        }
    }

    /// Returns the writer.
    pub fn into_inner(self) -> W {
        match self.writer.into_inner() {
            Ok(writer) => writer,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
