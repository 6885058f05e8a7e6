//! Observations returned by the engine.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;

/// Indices into the engine's internal flag channel.
pub mod internal {
    /// The engine is waiting for a single-character answer.
    pub const IN_YN_FUNCTION: usize = 1;
    /// The engine is waiting for a line of text.
    pub const IN_GETLIN: usize = 2;
    /// The engine is showing `--More--` and waiting for space.
    pub const XWAITFORSPACE: usize = 3;
    /// The agent stands on a staircase down.
    pub const STAIRS_DOWN: usize = 4;
}

/// One step's observation.
///
/// `message` and `internal` are the channels task code reads. Everything else
/// the engine exposes (glyphs, stats, inventory) travels opaquely in
/// `channels`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Raw message bytes, NUL padded.
    #[serde(default)]
    pub message: Vec<u8>,

    /// Engine-internal flags.
    #[serde(default)]
    pub internal: Vec<i32>,

    /// Pass-through channels keyed by name.
    #[serde(default)]
    pub channels: BTreeMap<String, serde_json::Value>,
}

impl Observation {
    /// Creates an observation carrying only a message.
    pub fn with_message(message: impl Into<Vec<u8>>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    /// Sets an internal flag, growing the flag vector as needed.
    pub fn flag(mut self, index: usize, value: bool) -> Self {
        if self.internal.len() <= index {
            self.internal.resize(index + 1, 0);
        }
        self.internal[index] = i32::from(value);
        self
    }

    /// Adds a pass-through channel.
    pub fn channel(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.channels.insert(name.into(), value);
        self
    }

    /// Decodes the message channel, stopping at the first NUL byte.
    pub fn message_text(&self) -> Cow<'_, str> {
        let end = self
            .message
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.message.len());
        String::from_utf8_lossy(&self.message[..end])
    }

    /// Returns true if the internal flag at `index` is non-zero.
    ///
    /// Indices past the end of the vector read as false.
    pub fn is_set(&self, index: usize) -> bool {
        self.internal.get(index).is_some_and(|&value| value != 0)
    }

    /// Returns a pass-through channel by name.
    pub fn get_channel(&self, name: &str) -> Option<&serde_json::Value> {
        self.channels.get(name)
    }
}

/// The result of one primitive engine turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    /// Observation after the turn.
    pub observation: Observation,
    /// Whether the engine ended the game (death, quit, ...).
    pub done: bool,
}

impl Transition {
    /// Creates a transition that keeps the game running.
    pub fn running(observation: Observation) -> Self {
        Self {
            observation,
            done: false,
        }
    }

    /// Creates a transition that ends the game.
    pub fn terminal(observation: Observation) -> Self {
        Self {
            observation,
            done: true,
        }
    }
}
