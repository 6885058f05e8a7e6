//! Test scenario definitions and execution.
//!
//! A scenario names a task, scripts what the engine returns, lists the
//! commands an agent takes, and states the expected result:
//!
//! ```yaml
//! name: eat_apple
//! task: eat
//! responses:
//!   - message: "There is an apple here; eat it? [ynq] (n)"
//!     flags: [1]
//!   - message: "Core dumped."
//! actions: [eat, north_west]
//! expected:
//!   status: success
//!   end: success
//!   steps: 2
//! ```

use minihack_proto::{Command, Observation, Transition};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

use super::mock_engine::MockEngine;
use crate::config::{ConfigError, TaskOverrides};
use crate::controller::MacroOutcome;
use crate::episode::{Episode, EpisodeEnd, EpisodeError, StepResult};
use crate::goal::StepStatus;
use crate::task_registry::TaskRegistry;

/// An observation written out in scenario files.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScriptedObservation {
    pub message: String,
    /// Internal flag indices that are set.
    pub flags: Vec<usize>,
    pub channels: BTreeMap<String, serde_json::Value>,
}

impl From<&ScriptedObservation> for Observation {
    fn from(scripted: &ScriptedObservation) -> Self {
        let mut observation = Observation::with_message(scripted.message.as_bytes());
        for &index in &scripted.flags {
            observation = observation.flag(index, true);
        }
        for (name, value) in &scripted.channels {
            observation = observation.channel(name.clone(), value.clone());
        }
        observation
    }
}

/// One scripted engine turn.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ScriptedTransition {
    #[serde(flatten)]
    pub observation: ScriptedObservation,
    #[serde(default)]
    pub done: bool,
}

impl From<&ScriptedTransition> for Transition {
    fn from(scripted: &ScriptedTransition) -> Self {
        Transition {
            observation: (&scripted.observation).into(),
            done: scripted.done,
        }
    }
}

/// What a scenario must end with.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Expectation {
    /// Status of the last step.
    pub status: StepStatus,
    #[serde(default)]
    pub end: Option<EpisodeEnd>,
    /// Agent steps taken.
    #[serde(default)]
    pub steps: Option<usize>,
    /// Engine turns issued.
    #[serde(default)]
    pub engine_turns: Option<usize>,
    /// The first composite action outcome.
    #[serde(default)]
    pub macro_outcome: Option<MacroOutcome>,
}

/// A test scenario definition.
#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub task: String,
    #[serde(default)]
    pub overrides: TaskOverrides,
    #[serde(default)]
    pub reset: ScriptedObservation,
    #[serde(default)]
    pub responses: Vec<ScriptedTransition>,
    pub actions: Vec<Command>,
    pub expected: Expectation,
}

impl Scenario {
    /// Creates a scenario that expects the episode to keep running.
    pub fn new(name: impl Into<String>, task: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            task: task.into(),
            overrides: TaskOverrides::new(),
            reset: ScriptedObservation::default(),
            responses: Vec::new(),
            actions: Vec::new(),
            expected: Expectation {
                status: StepStatus::Running,
                end: None,
                steps: None,
                engine_turns: None,
                macro_outcome: None,
            },
        }
    }

    /// Loads a scenario from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&content)?)
    }

    pub fn with_actions(mut self, actions: Vec<Command>) -> Self {
        self.actions = actions;
        self
    }

    pub fn with_responses(mut self, responses: Vec<ScriptedTransition>) -> Self {
        self.responses = responses;
        self
    }

    pub fn expecting(mut self, expected: Expectation) -> Self {
        self.expected = expected;
        self
    }

    /// Compares a trace against the expectation. Returns every mismatch.
    pub fn verify(&self, trace: &ExecutionTrace) -> Vec<String> {
        let mut mismatches = Vec::new();
        let expected = &self.expected;

        if trace.final_status() != Some(expected.status) {
            mismatches.push(format!(
                "status: expected {:?}, got {:?}",
                expected.status,
                trace.final_status()
            ));
        }
        if trace.end() != expected.end {
            mismatches.push(format!(
                "end: expected {:?}, got {:?}",
                expected.end,
                trace.end()
            ));
        }
        if let Some(steps) = expected.steps
            && steps != trace.steps.len()
        {
            mismatches.push(format!("steps: expected {}, got {}", steps, trace.steps.len()));
        }
        if let Some(turns) = expected.engine_turns
            && turns != trace.commands.len()
        {
            mismatches.push(format!(
                "engine turns: expected {}, got {}",
                turns,
                trace.commands.len()
            ));
        }
        if let Some(outcome) = expected.macro_outcome
            && trace.macro_outcome() != Some(outcome)
        {
            mismatches.push(format!(
                "macro outcome: expected {:?}, got {:?}",
                outcome,
                trace.macro_outcome()
            ));
        }
        mismatches
    }
}

/// Scenario errors.
#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Episode(#[from] EpisodeError),
}

/// Executes scenarios against a [`MockEngine`].
pub struct ScenarioRunner {
    registry: TaskRegistry,
}

impl ScenarioRunner {
    pub fn new(registry: TaskRegistry) -> Self {
        Self { registry }
    }

    /// Runs a scenario until its actions run out or the episode ends.
    pub fn run(&self, scenario: &Scenario) -> Result<ExecutionTrace, ScenarioError> {
        let task = self.registry.build(&scenario.task, &scenario.overrides)?;
        let engine = MockEngine::new(scenario.responses.iter().map(Transition::from).collect())
            .with_reset_observation((&scenario.reset).into());

        let mut episode = Episode::new(engine, task);
        episode.reset()?;

        let mut steps = Vec::new();
        for &command in &scenario.actions {
            let result = episode.step_command(command)?;
            let done = result.done;
            steps.push(result);
            if done {
                break;
            }
        }

        Ok(ExecutionTrace {
            steps,
            commands: episode.into_engine().commands().to_vec(),
        })
    }
}

impl Default for ScenarioRunner {
    fn default() -> Self {
        Self::new(TaskRegistry::builtin())
    }
}

/// Trace of a scenario execution.
#[derive(Debug)]
pub struct ExecutionTrace {
    pub steps: Vec<StepResult>,
    /// Every command the engine received.
    pub commands: Vec<Command>,
}

impl ExecutionTrace {
    pub fn final_status(&self) -> Option<StepStatus> {
        self.steps.last().map(|step| step.status)
    }

    pub fn end(&self) -> Option<EpisodeEnd> {
        self.steps.last().and_then(|step| step.end)
    }

    /// Returns the first outcome of a composite expansion.
    pub fn macro_outcome(&self) -> Option<MacroOutcome> {
        self.steps
            .iter()
            .map(|step| step.info.macro_outcome)
            .find(|outcome| *outcome != MacroOutcome::NotApplicable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use minihack_proto::{CompassDirection, internal};

    #[test]
    fn test_scenario_creation() {
        let scenario = Scenario::new("walk", "empty")
            .with_actions(vec![Command::Move(CompassDirection::East)]);
        assert_eq!(scenario.name, "walk");
        assert_eq!(scenario.actions.len(), 1);
    }

    #[test]
    fn test_scripted_observation_conversion() {
        let scripted = ScriptedObservation {
            message: "Unlock it? [yn] (n)".to_string(),
            flags: vec![internal::IN_YN_FUNCTION],
            channels: BTreeMap::new(),
        };
        let observation = Observation::from(&scripted);
        assert_eq!(observation.message_text(), "Unlock it? [yn] (n)");
        assert!(observation.is_set(internal::IN_YN_FUNCTION));
    }

    #[test]
    fn test_runner_reaches_stairs() {
        let scenario = Scenario::new("stairs", "empty")
            .with_actions(vec![Command::Move(CompassDirection::South); 3])
            .with_responses(vec![
                ScriptedTransition::default(),
                ScriptedTransition {
                    observation: ScriptedObservation {
                        flags: vec![internal::STAIRS_DOWN],
                        ..ScriptedObservation::default()
                    },
                    done: false,
                },
            ])
            .expecting(Expectation {
                status: StepStatus::Success,
                end: Some(EpisodeEnd::Success),
                steps: Some(2),
                engine_turns: Some(2),
                macro_outcome: None,
            });

        let trace = ScenarioRunner::default().run(&scenario).unwrap();
        assert!(scenario.verify(&trace).is_empty(), "{:?}", scenario.verify(&trace));
    }

    #[test]
    fn test_verify_reports_mismatches() {
        let scenario = Scenario::new("short", "empty")
            .with_actions(vec![Command::Move(CompassDirection::North)])
            .expecting(Expectation {
                status: StepStatus::Success,
                end: None,
                steps: Some(5),
                engine_turns: None,
                macro_outcome: None,
            });

        let trace = ScenarioRunner::default().run(&scenario).unwrap();
        let mismatches = scenario.verify(&trace);
        assert_eq!(mismatches.len(), 2);
        assert!(mismatches[0].starts_with("status"));
        assert!(mismatches[1].starts_with("steps"));
    }
}
