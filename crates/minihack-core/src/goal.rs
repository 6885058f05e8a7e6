//! Task goals and the per-step termination oracle.

use minihack_proto::{Observation, internal};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::LazyLock;

use crate::macro_state::MacroState;

const COMESTIBLES: &[&str] = &[
    "orange",
    "meatball",
    "meat ring",
    "meat stick",
    "kelp frond",
    "eucalyptus leaf",
    "clove of garlic",
    "sprig of wolfsbane",
    "carrot",
    "egg",
    "banana",
    "melon",
    "candy bar",
    "lump of royal jelly",
];

/// Item name to the messages the engine prints when it is eaten.
static EDIBLE_GOALS: LazyLock<HashMap<&'static str, Vec<String>>> = LazyLock::new(|| {
    let mut goals: HashMap<&'static str, Vec<String>> = COMESTIBLES
        .iter()
        .map(|&item| (item, vec![format!("This {} is delicious", item)]))
        .collect();
    goals.insert(
        "apple",
        vec![
            "Delicious!  Must be a Macintosh!".to_string(),
            "Core dumped.".to_string(),
        ],
    );
    goals.insert("pear", vec!["Core dumped.".to_string()]);
    goals
});

/// Returns the success messages for eating `item`.
pub fn edible_goal(item: &str) -> Option<&'static [String]> {
    EDIBLE_GOALS.get(item).map(Vec::as_slice)
}

/// Returns every item with known eating messages, sorted.
pub fn edible_items() -> Vec<&'static str> {
    let mut items: Vec<&'static str> = EDIBLE_GOALS.keys().copied().collect();
    items.sort_unstable();
    items
}

/// Outcome of evaluating one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Running,
    Success,
}

impl StepStatus {
    /// Returns true for [`StepStatus::Success`].
    pub fn is_success(self) -> bool {
        self == StepStatus::Success
    }
}

/// What counts as success for a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GoalSpec {
    /// Any of these substrings appears in the step's message.
    MessageMatch { messages: Vec<String> },
    /// The internal flag at `index` is set.
    InternalFlag { index: usize },
    /// The composite action reached [`MacroState::Confirmed`].
    MacroConfirmed,
}

impl GoalSpec {
    /// Reaching the staircase down.
    pub fn stairs() -> Self {
        GoalSpec::InternalFlag {
            index: internal::STAIRS_DOWN,
        }
    }

    /// Matching any of `messages`.
    pub fn messages<S: Into<String>>(messages: impl IntoIterator<Item = S>) -> Self {
        GoalSpec::MessageMatch {
            messages: messages.into_iter().map(Into::into).collect(),
        }
    }

    /// Eating `item`, if the item has known eating messages.
    pub fn eat(item: &str) -> Option<Self> {
        edible_goal(item).map(|messages| GoalSpec::messages(messages.iter().cloned()))
    }
}

/// Classifies each step's observation against a task's goal.
///
/// The oracle only reports running or success. Death and running out of
/// steps are the episode driver's business.
#[derive(Debug, Clone)]
pub struct TerminationOracle {
    goal: GoalSpec,
}

impl TerminationOracle {
    pub fn new(goal: GoalSpec) -> Self {
        Self { goal }
    }

    pub fn goal(&self) -> &GoalSpec {
        &self.goal
    }

    /// Evaluates one step.
    pub fn evaluate(&self, observation: &Observation, macro_state: MacroState) -> StepStatus {
        let success = match &self.goal {
            GoalSpec::MessageMatch { messages } => {
                let text = observation.message_text();
                messages.iter().any(|goal| text.contains(goal.as_str()))
            }
            GoalSpec::InternalFlag { index } => observation.is_set(*index),
            GoalSpec::MacroConfirmed => macro_state == MacroState::Confirmed,
        };

        if success {
            StepStatus::Success
        } else {
            StepStatus::Running
        }
    }
}
