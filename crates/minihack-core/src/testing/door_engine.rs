//! A small simulation of one locked door, for composite action tests.

use minihack_proto::{Command, CompassDirection, Observation, Result, Transition, internal};

use crate::config::TaskConfig;
use crate::engine::{Engine, LevelSource};

const KEY_DESCRIPTION: &str = "a skeleton key";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Normal,
    ChoosingItem,
    ChoosingDirection,
    ConfirmUnlock,
    More,
}

/// Engine with a single locked door next to the agent.
///
/// It follows the engine's real prompt flow for applying a key: item
/// selection, direction, the "Unlock it?" question and a `--More--` after
/// success. Walking into the unlocked door reports it as stuck for a
/// configurable number of attempts before it opens.
#[derive(Debug, Clone)]
pub struct DoorEngine {
    direction: CompassDirection,
    key: Option<char>,
    stuck: u32,
    stuck_remaining: u32,
    locked: bool,
    open: bool,
    mode: Mode,
    turns: usize,
}

impl DoorEngine {
    /// Creates a locked door in `direction` and no key.
    pub fn new(direction: CompassDirection) -> Self {
        Self {
            direction,
            key: None,
            stuck: 0,
            stuck_remaining: 0,
            locked: true,
            open: false,
            mode: Mode::Normal,
            turns: 0,
        }
    }

    /// Gives the agent a key in inventory slot `letter`.
    pub fn with_key(mut self, letter: char) -> Self {
        self.key = Some(letter);
        self
    }

    /// Makes the unlocked door stick for `attempts` walks.
    pub fn stuck_for(mut self, attempts: u32) -> Self {
        self.stuck = attempts;
        self.stuck_remaining = attempts;
        self
    }

    pub fn door_open(&self) -> bool {
        self.open
    }

    pub fn door_locked(&self) -> bool {
        self.locked
    }

    /// Returns the number of turns taken since the last reset.
    pub fn turns(&self) -> usize {
        self.turns
    }

    fn walk(&mut self, direction: CompassDirection) -> Observation {
        if direction != self.direction || self.open {
            return Observation::default();
        }
        if self.locked {
            return Observation::with_message("This door is locked.");
        }
        if self.stuck_remaining > 0 {
            self.stuck_remaining -= 1;
            return Observation::with_message("The door is stuck.");
        }
        self.open = true;
        Observation::with_message("The door opens.")
    }
}

impl Engine for DoorEngine {
    fn reset(&mut self, _level: &LevelSource, _config: &TaskConfig) -> Result<Observation> {
        self.stuck_remaining = self.stuck;
        self.locked = true;
        self.open = false;
        self.mode = Mode::Normal;
        self.turns = 0;
        Ok(Observation::default())
    }

    fn step(&mut self, command: Command) -> Result<Transition> {
        self.turns += 1;
        let (mode, observation) = match (self.mode, command) {
            (Mode::Normal, Command::Apply) if self.key.is_some() => (
                Mode::ChoosingItem,
                Observation::with_message("What do you want to use or apply? [a-z or ?*]")
                    .flag(internal::IN_YN_FUNCTION, true),
            ),
            (Mode::Normal, Command::Apply) => (
                Mode::Normal,
                Observation::with_message("You don't have anything to use or apply."),
            ),
            (Mode::Normal, Command::Move(direction)) => (Mode::Normal, self.walk(direction)),
            (Mode::Normal, _) => (Mode::Normal, Observation::default()),

            (Mode::ChoosingItem, Command::Letter(letter)) if Some(letter) == self.key => (
                Mode::ChoosingDirection,
                Observation::with_message("In what direction?")
                    .flag(internal::IN_YN_FUNCTION, true),
            ),
            (Mode::ChoosingItem, _) => (Mode::Normal, Observation::with_message("Never mind.")),

            (Mode::ChoosingDirection, Command::Move(direction))
                if direction == self.direction && self.locked =>
            {
                (
                    Mode::ConfirmUnlock,
                    Observation::with_message("Unlock it? [yn] (n)")
                        .flag(internal::IN_YN_FUNCTION, true),
                )
            }
            (Mode::ChoosingDirection, _) => (
                Mode::Normal,
                Observation::with_message("You see no door there."),
            ),

            (Mode::ConfirmUnlock, Command::Yes) => {
                self.locked = false;
                (
                    Mode::More,
                    Observation::with_message("You succeed in unlocking the door.--More--")
                        .flag(internal::XWAITFORSPACE, true),
                )
            }
            (Mode::ConfirmUnlock, _) => (Mode::Normal, Observation::default()),

            (Mode::More, Command::Space) => (Mode::Normal, Observation::default()),
            (Mode::More, _) => (
                Mode::More,
                Observation::with_message("--More--").flag(internal::XWAITFORSPACE, true),
            ),
        };
        self.mode = mode;
        Ok(Transition::running(observation))
    }

    fn inventory_letter(&self, _observation: &Observation, item: &str) -> Option<char> {
        self.key.filter(|_| KEY_DESCRIPTION.contains(item))
    }

    fn direction_of(&self, _observation: &Observation, feature: &str) -> Option<CompassDirection> {
        (!self.open && feature.contains("door")).then_some(self.direction)
    }

    fn feature_at(
        &self,
        _observation: &Observation,
        direction: CompassDirection,
        feature: &str,
    ) -> bool {
        direction == self.direction && !self.open && feature.contains("door")
    }

    fn standing_on(&self, _observation: &Observation, _feature: &str) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_walking_into_locked_door() {
        let mut engine = DoorEngine::new(CompassDirection::East).with_key('f');
        let transition = engine.step(Command::Move(CompassDirection::East)).unwrap();
        assert_eq!(transition.observation.message_text(), "This door is locked.");
        assert!(!engine.door_open());
    }

    #[test]
    fn test_manual_unlock_flow() {
        let mut engine = DoorEngine::new(CompassDirection::South).with_key('f');
        let south = Command::Move(CompassDirection::South);

        engine.step(Command::Apply).unwrap();
        engine.step(Command::Letter('f')).unwrap();
        let question = engine.step(south).unwrap();
        assert_eq!(question.observation.message_text(), "Unlock it? [yn] (n)");

        let more = engine.step(Command::Yes).unwrap();
        assert!(more.observation.is_set(internal::XWAITFORSPACE));
        assert!(!engine.door_locked());

        engine.step(Command::Space).unwrap();
        engine.step(south).unwrap();
        assert!(engine.door_open());
        assert_eq!(engine.turns(), 6);
    }

    #[test]
    fn test_wrong_letter_aborts() {
        let mut engine = DoorEngine::new(CompassDirection::South).with_key('f');
        engine.step(Command::Apply).unwrap();
        let transition = engine.step(Command::Letter('q')).unwrap();
        assert_eq!(transition.observation.message_text(), "Never mind.");
        assert!(engine.door_locked());
    }
}
