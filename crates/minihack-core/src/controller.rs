//! Composite actions.
//!
//! A composite action intercepts one externally chosen command. It either
//! lets the command through (possibly updating episode state on the way) or
//! expands it into a scripted run of primitive engine turns whose final
//! observation stands in for the original command's result.
//!
//! Unlocking a door with a key is the expanding case:
//!
//! 1. `apply`
//! 2. the key's inventory letter
//! 3. the direction of the closed door
//! 4. `y` to "Unlock it?"
//! 5. clear the known follow-up prompts
//! 6. walk into the door, clearing prompts, until it is no longer closed
//!
//! Step 6 is bounded by `max_attempts`. If the door is still closed after
//! that, the last observation is returned with
//! [`MacroOutcome::BudgetExhausted`].

use minihack_proto::{Command, CompassDirection, Error, Observation, Transition, internal};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::engine::Engine;
use crate::macro_state::MacroState;

/// Prompts the engine raises in direct response to a scripted action.
///
/// None of them is a meaningful choice for the agent, so they are answered
/// automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnownPrompt {
    /// `--More--`.
    MoreScreen,
    /// The engine wants a line of text.
    TextEntry,
    /// The engine wants a single-character answer.
    YesNo,
}

impl KnownPrompt {
    /// Returns the prompt pending in `observation`, if any.
    pub fn detect(observation: &Observation) -> Option<Self> {
        if observation.is_set(internal::XWAITFORSPACE) {
            Some(KnownPrompt::MoreScreen)
        } else if observation.is_set(internal::IN_GETLIN) {
            Some(KnownPrompt::TextEntry)
        } else if observation.is_set(internal::IN_YN_FUNCTION) {
            Some(KnownPrompt::YesNo)
        } else {
            None
        }
    }

    /// The command that dismisses the prompt.
    pub fn answer(self) -> Command {
        match self {
            KnownPrompt::MoreScreen => Command::Space,
            KnownPrompt::TextEntry | KnownPrompt::YesNo => Command::Escape,
        }
    }
}

/// Settings for the unlock-door expansion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnlockDoor {
    /// The command that triggers the expansion.
    pub trigger: Command,
    /// Inventory item used to unlock.
    pub key_item: String,
    /// Screen description of the obstacle.
    pub obstacle: String,
    /// Walks into the door before giving up.
    pub max_attempts: u32,
    /// Known prompts cleared after each scripted command before moving on.
    pub prompt_budget: u32,
}

impl Default for UnlockDoor {
    fn default() -> Self {
        Self {
            trigger: Command::Apply,
            key_item: "key".to_string(),
            obstacle: "closed door".to_string(),
            max_attempts: 32,
            prompt_budget: 16,
        }
    }
}

/// A task's composite action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CompositeAction {
    /// Track "pray on `feature`, then confirm" in [`MacroState`].
    PrayerConfirmation { feature: String },
    /// Unlock and open an adjacent door with a key.
    UnlockDoor(UnlockDoor),
}

impl CompositeAction {
    /// Praying on an altar.
    pub fn pray_on_altar() -> Self {
        CompositeAction::PrayerConfirmation {
            feature: "altar".to_string(),
        }
    }

    /// Unlocking a door with the default settings.
    pub fn unlock_door() -> Self {
        CompositeAction::UnlockDoor(UnlockDoor::default())
    }
}

/// How a step's composite action went.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MacroOutcome {
    /// The command went to the engine unchanged.
    #[default]
    NotApplicable,
    /// The expansion ran to its postcondition.
    Completed { turns: u32 },
    /// The door was still closed after the last allowed attempt.
    BudgetExhausted { turns: u32 },
    /// The engine ended the game mid-expansion.
    Interrupted { turns: u32 },
}

impl MacroOutcome {
    /// Engine turns spent by the expansion.
    pub fn turns(self) -> u32 {
        match self {
            MacroOutcome::NotApplicable => 0,
            MacroOutcome::Completed { turns }
            | MacroOutcome::BudgetExhausted { turns }
            | MacroOutcome::Interrupted { turns } => turns,
        }
    }
}

/// One primitive engine turn.
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub command: Command,
    pub transition: Transition,
}

/// What the controller did with a command.
#[derive(Debug, Clone, PartialEq)]
pub enum Interception {
    /// Send the command to the engine unchanged.
    Forward,
    /// The command was replaced by these turns.
    Expanded { turns: Vec<Turn>, outcome: MacroOutcome },
}

/// An engine failure in the middle of an expansion.
///
/// `turns` holds the scripted turns that completed before the failing one.
#[derive(Debug, thiserror::Error)]
#[error("engine failed after {} scripted turns: {source}", .turns.len())]
pub struct ScriptError {
    pub turns: Vec<Turn>,
    pub source: Error,
}

/// Applies a task's [`CompositeAction`] to each chosen command.
#[derive(Debug, Clone)]
pub struct CompositeActionController {
    action: CompositeAction,
}

impl CompositeActionController {
    pub fn new(action: CompositeAction) -> Self {
        Self { action }
    }

    pub fn action(&self) -> &CompositeAction {
        &self.action
    }

    /// Returns the macro state that follows `command` taken from `last`.
    ///
    /// Nothing is stored here. The caller commits the result once the
    /// command's engine turns have gone through.
    pub fn next_state(
        &self,
        engine: &dyn Engine,
        command: Command,
        last: &Observation,
        state: MacroState,
    ) -> MacroState {
        match &self.action {
            CompositeAction::PrayerConfirmation { feature } => {
                let on_feature = command == Command::Pray && engine.standing_on(last, feature);
                let next = state.after_prayer_step(command, on_feature);
                if next != state {
                    debug!(from = ?state, to = ?next, command = %command, "Prayer state changed");
                }
                next
            }
            CompositeAction::UnlockDoor(_) => state,
        }
    }

    /// Intercepts `command`.
    ///
    /// `last` is the observation the agent chose `command` from. Missing
    /// preconditions are not errors: the command is forwarded unchanged.
    pub fn intercept(
        &self,
        engine: &mut dyn Engine,
        command: Command,
        last: &Observation,
    ) -> Result<Interception, ScriptError> {
        let CompositeAction::UnlockDoor(spec) = &self.action else {
            return Ok(Interception::Forward);
        };
        if command != spec.trigger {
            return Ok(Interception::Forward);
        }
        let Some(letter) = engine.inventory_letter(last, &spec.key_item) else {
            debug!(item = %spec.key_item, "No key in inventory, forwarding");
            return Ok(Interception::Forward);
        };
        let Some(direction) = engine.direction_of(last, &spec.obstacle) else {
            debug!(obstacle = %spec.obstacle, "No adjacent obstacle, forwarding");
            return Ok(Interception::Forward);
        };

        let mut script = Script::new(engine);
        match unlock_door(spec, &mut script, letter, direction) {
            Ok(outcome) => Ok(script.finish(outcome)),
            Err(source) => Err(ScriptError {
                turns: script.turns,
                source,
            }),
        }
    }
}

fn unlock_door(
    spec: &UnlockDoor,
    script: &mut Script<'_>,
    letter: char,
    direction: CompassDirection,
) -> Result<MacroOutcome, Error> {
    let opening = [
        Command::Apply,
        Command::Letter(letter),
        Command::Move(direction),
        Command::Yes,
    ];
    for command in opening {
        if script.send(command)?.done {
            return Ok(MacroOutcome::Interrupted { turns: script.turn_count() });
        }
    }
    if script.clear_prompts(spec.prompt_budget)? {
        return Ok(MacroOutcome::Interrupted { turns: script.turn_count() });
    }

    for attempt in 1..=spec.max_attempts {
        if script.send(Command::Move(direction))?.done
            || script.clear_prompts(spec.prompt_budget)?
        {
            return Ok(MacroOutcome::Interrupted { turns: script.turn_count() });
        }
        if !script.obstacle_remains(&spec.obstacle, direction) {
            info!(
                direction = %direction,
                attempts = attempt,
                turns = script.turns.len(),
                "Door unlocked and opened"
            );
            return Ok(MacroOutcome::Completed { turns: script.turn_count() });
        }
    }

    warn!(
        direction = %direction,
        max_attempts = spec.max_attempts,
        turns = script.turns.len(),
        "Door still closed after the last allowed attempt"
    );
    Ok(MacroOutcome::BudgetExhausted { turns: script.turn_count() })
}

/// Issues scripted turns and keeps them in order.
struct Script<'a> {
    engine: &'a mut dyn Engine,
    turns: Vec<Turn>,
}

impl<'a> Script<'a> {
    fn new(engine: &'a mut dyn Engine) -> Self {
        Self {
            engine,
            turns: Vec::new(),
        }
    }

    fn send(&mut self, command: Command) -> Result<&Transition, Error> {
        let transition = self.engine.step(command)?;
        debug!(command = %command, done = transition.done, "Scripted turn");
        self.turns.push(Turn {
            command,
            transition,
        });
        Ok(&self.turns[self.turns.len() - 1].transition)
    }

    fn last(&self) -> Option<&Transition> {
        self.turns.last().map(|turn| &turn.transition)
    }

    fn turn_count(&self) -> u32 {
        self.turns.len() as u32
    }

    /// Answers known prompts. Returns true if the game ended.
    fn clear_prompts(&mut self, budget: u32) -> Result<bool, Error> {
        for _ in 0..budget {
            let Some(last) = self.last() else {
                return Ok(false);
            };
            if last.done {
                return Ok(true);
            }
            let Some(prompt) = KnownPrompt::detect(&last.observation) else {
                return Ok(false);
            };
            debug!(prompt = ?prompt, "Clearing known prompt");
            self.send(prompt.answer())?;
        }
        Ok(self.last().is_some_and(|last| last.done))
    }

    /// Checks the target tile only; other closed doors nearby do not count.
    fn obstacle_remains(&self, obstacle: &str, direction: CompassDirection) -> bool {
        self.last().is_some_and(|last| {
            self.engine
                .feature_at(&last.observation, direction, obstacle)
        })
    }

    fn finish(self, outcome: MacroOutcome) -> Interception {
        Interception::Expanded {
            turns: self.turns,
            outcome,
        }
    }
}
