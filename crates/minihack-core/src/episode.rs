//! Episode driver.
//!
//! Runs one task against an engine: launches it on reset, passes each chosen
//! action through the task's composite action, and classifies the result.

use minihack_proto::{Command, Observation, Transition};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::controller::{CompositeActionController, Interception, MacroOutcome, ScriptError, Turn};
use crate::engine::{Engine, LevelSource};
use crate::goal::{StepStatus, TerminationOracle};
use crate::macro_state::MacroState;
use crate::task_registry::Task;

/// Why an episode ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EpisodeEnd {
    /// The task's goal was reached.
    Success,
    /// The engine ended the game (death, quitting).
    EngineTerminated,
    /// The step budget ran out.
    StepLimit,
}

impl EpisodeEnd {
    /// Returns the reason string used in recordings.
    pub fn as_str(self) -> &'static str {
        match self {
            EpisodeEnd::Success => "success",
            EpisodeEnd::EngineTerminated => "engine_terminated",
            EpisodeEnd::StepLimit => "step_limit",
        }
    }
}

/// Per-step details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepInfo {
    /// Step number (1-indexed).
    pub step: u32,
    /// The command the agent chose.
    pub command: Command,
    /// What the composite action did.
    pub macro_outcome: MacroOutcome,
    /// Composite-action state after the step.
    pub macro_state: MacroState,
    /// Engine turns the step took.
    pub engine_turns: u32,
}

/// The result of one externally visible step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepResult {
    pub observation: Observation,
    pub status: StepStatus,
    pub done: bool,
    pub end: Option<EpisodeEnd>,
    pub info: StepInfo,
}

/// Episode-scoped state, rebuilt on every reset.
#[derive(Debug, Clone)]
pub struct EpisodeState {
    /// Steps taken so far.
    pub steps: u32,
    /// Engine turns issued so far, scripted ones included.
    pub engine_turns: u64,
    /// Composite-action progress.
    pub macro_state: MacroState,
    /// The observation the next action is chosen from.
    pub last_observation: Observation,
    /// Set once the episode has ended.
    pub end: Option<EpisodeEnd>,
}

impl EpisodeState {
    fn new(observation: Observation) -> Self {
        Self {
            steps: 0,
            engine_turns: 0,
            macro_state: MacroState::Idle,
            last_observation: observation,
            end: None,
        }
    }
}

/// Something that happened during an episode, as seen by observers.
#[derive(Debug, Clone, Copy)]
pub enum EpisodeEvent<'a> {
    Reset {
        task: &'a str,
        level: &'a LevelSource,
    },
    Turn {
        step: u32,
        command: Command,
        scripted: bool,
        transition: &'a Transition,
    },
    End {
        step: u32,
        end: EpisodeEnd,
    },
}

/// Episode errors.
#[derive(Debug, thiserror::Error)]
pub enum EpisodeError {
    #[error(transparent)]
    Engine(#[from] minihack_proto::Error),

    #[error("episode has not been reset")]
    NotStarted,

    #[error("episode is over; reset before stepping")]
    EpisodeOver,

    #[error("action index {index} out of range ({available} actions)")]
    InvalidAction { index: usize, available: usize },

    #[error("command '{0}' is not in the task's action set")]
    ActionNotAllowed(Command),
}

type Observer = Box<dyn FnMut(&EpisodeEvent<'_>) + Send + 'static>;

/// Drives episodes of one task.
pub struct Episode<E> {
    engine: E,
    task: Task,
    oracle: TerminationOracle,
    controller: Option<CompositeActionController>,
    state: Option<EpisodeState>,
    observers: Vec<Observer>,
}

impl<E: Engine> Episode<E> {
    /// Creates a driver. Call [`Episode::reset`] before stepping.
    pub fn new(engine: E, task: Task) -> Self {
        let oracle = TerminationOracle::new(task.goal.clone());
        let controller = task.composite.clone().map(CompositeActionController::new);
        Self {
            engine,
            task,
            oracle,
            controller,
            state: None,
            observers: Vec::new(),
        }
    }

    /// Adds an observer that receives every episode event.
    pub fn add_observer<F>(&mut self, observer: F)
    where
        F: FnMut(&EpisodeEvent<'_>) + Send + 'static,
    {
        self.observers.push(Box::new(observer));
    }

    pub fn task(&self) -> &Task {
        &self.task
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn into_engine(self) -> E {
        self.engine
    }

    /// Returns the current episode's state, if one has started.
    pub fn state(&self) -> Option<&EpisodeState> {
        self.state.as_ref()
    }

    /// Launches a new episode and returns its first observation.
    pub fn reset(&mut self) -> Result<Observation, EpisodeError> {
        let observation = self.engine.reset(&self.task.level, &self.task.config)?;
        self.state = Some(EpisodeState::new(observation.clone()));

        info!(
            task = %self.task.id,
            level = %self.task.level.label(),
            max_steps = self.task.config.max_episode_steps,
            "Episode reset"
        );
        notify(
            &mut self.observers,
            &EpisodeEvent::Reset {
                task: &self.task.id,
                level: &self.task.level,
            },
        );
        Ok(observation)
    }

    /// Takes the action at `index` in the task's action set.
    pub fn step(&mut self, index: usize) -> Result<StepResult, EpisodeError> {
        let command = *self
            .task
            .config
            .actions
            .get(index)
            .ok_or(EpisodeError::InvalidAction {
                index,
                available: self.task.config.actions.len(),
            })?;
        self.step_command(command)
    }

    /// Takes `command`, which must be in the task's action set.
    pub fn step_command(&mut self, command: Command) -> Result<StepResult, EpisodeError> {
        if self.task.config.action_index(command).is_none() {
            return Err(EpisodeError::ActionNotAllowed(command));
        }
        let state = self.state.as_mut().ok_or(EpisodeError::NotStarted)?;
        if state.end.is_some() {
            return Err(EpisodeError::EpisodeOver);
        }
        let step = state.steps + 1;

        let (next_state, interception) = match &self.controller {
            Some(controller) => {
                let last = &state.last_observation;
                let next = controller.next_state(&self.engine, command, last, state.macro_state);
                match controller.intercept(&mut self.engine, command, last) {
                    Ok(interception) => (next, interception),
                    Err(ScriptError { turns, source }) => {
                        notify_scripted(&mut self.observers, step, &turns);
                        state.engine_turns += turns.len() as u64;
                        if let Some(turn) = turns.into_iter().last() {
                            state.last_observation = turn.transition.observation;
                        }
                        return Err(EpisodeError::Engine(source));
                    }
                }
            }
            None => (state.macro_state, Interception::Forward),
        };

        let (transition, macro_outcome, engine_turns) = match interception {
            Interception::Expanded { turns, outcome } if !turns.is_empty() => {
                notify_scripted(&mut self.observers, step, &turns);
                let count = turns.len() as u32;
                let last = turns
                    .into_iter()
                    .last()
                    .map(|turn| turn.transition)
                    .unwrap_or_default();
                (last, outcome, count)
            }
            _ => {
                let transition = self.engine.step(command)?;
                notify(
                    &mut self.observers,
                    &EpisodeEvent::Turn {
                        step,
                        command,
                        scripted: false,
                        transition: &transition,
                    },
                );
                (transition, MacroOutcome::NotApplicable, 1)
            }
        };

        state.macro_state = next_state;
        state.steps = step;
        state.engine_turns += u64::from(engine_turns);

        let status = self.oracle.evaluate(&transition.observation, state.macro_state);
        let end = if transition.done {
            Some(EpisodeEnd::EngineTerminated)
        } else if status.is_success() {
            Some(EpisodeEnd::Success)
        } else if step >= self.task.config.max_episode_steps {
            Some(EpisodeEnd::StepLimit)
        } else {
            None
        };

        debug!(
            step,
            command = %command,
            engine_turns,
            status = ?status,
            macro_state = ?state.macro_state,
            "Step complete"
        );

        state.last_observation = transition.observation.clone();
        state.end = end;
        let macro_state = state.macro_state;

        if let Some(end) = end {
            info!(task = %self.task.id, steps = step, end = end.as_str(), "Episode ended");
            notify(&mut self.observers, &EpisodeEvent::End { step, end });
        }

        Ok(StepResult {
            observation: transition.observation,
            status,
            done: end.is_some(),
            end,
            info: StepInfo {
                step,
                command,
                macro_outcome,
                macro_state,
                engine_turns,
            },
        })
    }
}

fn notify(observers: &mut [Observer], event: &EpisodeEvent<'_>) {
    for observer in observers.iter_mut() {
        observer(event);
    }
}

fn notify_scripted(observers: &mut [Observer], step: u32, turns: &[Turn]) {
    for turn in turns {
        notify(
            observers,
            &EpisodeEvent::Turn {
                step,
                command: turn.command,
                scripted: true,
                transition: &turn.transition,
            },
        );
    }
}
