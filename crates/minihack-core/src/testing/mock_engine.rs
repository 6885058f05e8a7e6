//! Scripted engine for deterministic tests.

use minihack_proto::{Command, CompassDirection, Error, Observation, Result, Transition};
use serde_json::Value;
use std::collections::VecDeque;

use crate::config::TaskConfig;
use crate::engine::{Engine, LevelSource};

/// One recorded engine launch.
#[derive(Debug, Clone)]
pub struct Launch {
    pub level: LevelSource,
    pub config: TaskConfig,
}

/// Engine that replays scripted transitions.
///
/// Once the script runs out every step returns an empty, running
/// observation. Screen queries read the observation's `inventory`,
/// `adjacent` and `underfoot` channels when present and fall back to the
/// fixed answers set with the builder methods.
#[derive(Debug, Clone, Default)]
pub struct MockEngine {
    responses: VecDeque<Transition>,
    reset_observation: Observation,
    inventory: Vec<(char, String)>,
    adjacent: Vec<(CompassDirection, String)>,
    underfoot: Vec<String>,
    fail_on: Option<Command>,
    commands: Vec<Command>,
    launches: Vec<Launch>,
}

impl MockEngine {
    /// Creates an engine with scripted transitions.
    pub fn new(responses: Vec<Transition>) -> Self {
        Self {
            responses: responses.into(),
            ..Self::default()
        }
    }

    pub fn with_reset_observation(mut self, observation: Observation) -> Self {
        self.reset_observation = observation;
        self
    }

    pub fn with_inventory(mut self, letter: char, description: impl Into<String>) -> Self {
        self.inventory.push((letter, description.into()));
        self
    }

    pub fn with_adjacent(
        mut self,
        direction: CompassDirection,
        feature: impl Into<String>,
    ) -> Self {
        self.adjacent.push((direction, feature.into()));
        self
    }

    /// Reports the agent as standing on `feature`.
    pub fn on_feature(mut self, feature: impl Into<String>) -> Self {
        self.underfoot.push(feature.into());
        self
    }

    /// Makes `command` fail with an engine error.
    pub fn fail_on(mut self, command: Command) -> Self {
        self.fail_on = Some(command);
        self
    }

    /// Returns the number of steps taken.
    pub fn step_count(&self) -> usize {
        self.commands.len()
    }

    /// Returns every command received, in order.
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Returns every launch, in order.
    pub fn launches(&self) -> &[Launch] {
        &self.launches
    }
}

impl Engine for MockEngine {
    fn reset(&mut self, level: &LevelSource, config: &TaskConfig) -> Result<Observation> {
        self.launches.push(Launch {
            level: level.clone(),
            config: config.clone(),
        });
        Ok(self.reset_observation.clone())
    }

    fn step(&mut self, command: Command) -> Result<Transition> {
        if self.fail_on == Some(command) {
            return Err(Error::engine(format!("scripted failure on '{}'", command)));
        }
        self.commands.push(command);
        Ok(self.responses.pop_front().unwrap_or_default())
    }

    fn inventory_letter(&self, observation: &Observation, item: &str) -> Option<char> {
        if let Some(entries) = observation.get_channel("inventory").and_then(Value::as_object) {
            return entries
                .iter()
                .find(|(_, description)| description.as_str().is_some_and(|d| d.contains(item)))
                .and_then(|(letter, _)| letter.chars().next());
        }
        self.inventory
            .iter()
            .find(|(_, description)| description.contains(item))
            .map(|(letter, _)| *letter)
    }

    fn direction_of(&self, observation: &Observation, feature: &str) -> Option<CompassDirection> {
        if let Some(tiles) = observation.get_channel("adjacent").and_then(Value::as_object) {
            return CompassDirection::ALL.into_iter().find(|direction| {
                tiles
                    .get(direction.as_str())
                    .and_then(Value::as_str)
                    .is_some_and(|tile| tile.contains(feature))
            });
        }
        self.adjacent
            .iter()
            .find(|(_, tile)| tile.contains(feature))
            .map(|(direction, _)| *direction)
    }

    fn feature_at(
        &self,
        observation: &Observation,
        direction: CompassDirection,
        feature: &str,
    ) -> bool {
        if let Some(tiles) = observation.get_channel("adjacent").and_then(Value::as_object) {
            return tiles
                .get(direction.as_str())
                .and_then(Value::as_str)
                .is_some_and(|tile| tile.contains(feature));
        }
        self.adjacent
            .iter()
            .any(|(at, tile)| *at == direction && tile.contains(feature))
    }

    fn standing_on(&self, observation: &Observation, feature: &str) -> bool {
        if let Some(tile) = observation.get_channel("underfoot").and_then(Value::as_str) {
            return tile.contains(feature);
        }
        self.underfoot.iter().any(|tile| tile.contains(feature))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_replays_then_idles() {
        let mut engine = MockEngine::new(vec![Transition::terminal(Observation::with_message(
            "You die...",
        ))]);

        assert!(engine.step(Command::Search).unwrap().done);
        let idle = engine.step(Command::Search).unwrap();
        assert!(!idle.done);
        assert_eq!(idle.observation.message_text(), "");
        assert_eq!(engine.step_count(), 2);
    }

    #[test]
    fn test_channels_take_precedence() {
        let engine = MockEngine::new(vec![])
            .with_inventory('a', "a skeleton key")
            .on_feature("floor");
        let obs = Observation::default()
            .channel("inventory", json!({"g": "an uncursed skeleton key"}))
            .channel("adjacent", json!({"south_west": "closed door"}))
            .channel("underfoot", json!("altar"));

        assert_eq!(engine.inventory_letter(&obs, "key"), Some('g'));
        assert_eq!(
            engine.direction_of(&obs, "closed door"),
            Some(CompassDirection::SouthWest)
        );
        assert!(engine.feature_at(&obs, CompassDirection::SouthWest, "door"));
        assert!(!engine.feature_at(&obs, CompassDirection::West, "door"));
        assert!(engine.standing_on(&obs, "altar"));

        let plain = Observation::default();
        assert_eq!(engine.inventory_letter(&plain, "key"), Some('a'));
        assert!(!engine.standing_on(&plain, "altar"));
    }

    #[test]
    fn test_scripted_failure() {
        let mut engine = MockEngine::new(vec![]).fail_on(Command::Kick);
        assert!(engine.step(Command::Kick).is_err());
        assert_eq!(engine.step_count(), 0);
    }
}
