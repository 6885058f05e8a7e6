//! The simulation engine boundary.

use minihack_proto::{Command, CompassDirection, Observation, Result, Transition};
use serde::{Deserialize, Serialize};

use crate::config::TaskConfig;
use crate::level::LevelSpec;

/// The level an episode starts on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelSource {
    /// A level program built in-process.
    Inline(LevelSpec),
    /// A level file shipped with the engine, by file name.
    Bundled(String),
}

impl LevelSource {
    /// Returns a short label for logs.
    pub fn label(&self) -> String {
        match self {
            LevelSource::Inline(level) => format!("inline {}x{}", level.x(), level.y()),
            LevelSource::Bundled(name) => name.clone(),
        }
    }
}

impl From<LevelSpec> for LevelSource {
    fn from(level: LevelSpec) -> Self {
        LevelSource::Inline(level)
    }
}

/// A turn-based engine an episode runs against.
///
/// Besides launching and stepping, the engine answers four questions about
/// an observation's screen. They are free-text searches over what the engine
/// renders, so they belong to the engine side rather than to task code.
pub trait Engine {
    /// Launches a fresh game on `level` with `config`.
    fn reset(&mut self, level: &LevelSource, config: &TaskConfig) -> Result<Observation>;

    /// Executes one primitive command.
    fn step(&mut self, command: Command) -> Result<Transition>;

    /// Returns the inventory letter of the first item whose description
    /// mentions `item`.
    fn inventory_letter(&self, observation: &Observation, item: &str) -> Option<char>;

    /// Returns the direction of an adjacent tile described as `feature`.
    fn direction_of(&self, observation: &Observation, feature: &str) -> Option<CompassDirection>;

    /// Returns true if the tile in `direction` is described as `feature`.
    fn feature_at(
        &self,
        observation: &Observation,
        direction: CompassDirection,
        feature: &str,
    ) -> bool;

    /// Returns true if the agent stands on a tile described as `feature`.
    fn standing_on(&self, observation: &Observation, feature: &str) -> bool;
}
