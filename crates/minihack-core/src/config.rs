//! Task configuration and its composition.
//!
//! A task's launch configuration is layered: engine-wide defaults, then the
//! task family's defaults, then the task's own settings, then whatever the
//! caller overrides. Each layer replaces the fields it names. The family's
//! policy options (no pet, no autopickup, and for mazes no random monster
//! generation) are appended after the merge so no override silently drops
//! them; a caller has to opt out explicitly with `keep_policy_defaults`.

use minihack_proto::Command;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::debug;

use crate::level::LevelError;

/// The engine's standard option list.
pub const ENGINE_OPTIONS: &[&str] = &[
    "color",
    "showexp",
    "autopickup",
    "pickup_types:$?!/",
    "pickup_burden:unencumbered",
    "nobones",
    "nolegacy",
    "nocmdassist",
    "disclose:+i +a +v +g +c +o",
    "runmode:teleport",
    "mention_walls",
    "nosparkle",
    "showscore",
];

/// The engine's standard observation channels.
pub const ENGINE_OBSERVATION_KEYS: &[&str] =
    &["glyphs", "chars", "colors", "specials", "blstats", "message"];

/// A value assigned to an engine option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    /// Boolean option switched on (`name`).
    Enabled,
    /// Boolean option switched off (`!name`).
    Disabled,
    /// Compound option (`name:value`).
    Value(String),
}

/// Engine options keyed by name.
///
/// Parsed from and rendered back to the engine's option strings. Because
/// options are keyed by name, `!autopickup` replaces `autopickup` rather than
/// sitting beside it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct OptionSet {
    options: BTreeMap<String, OptionValue>,
}

impl OptionSet {
    /// Creates an empty option set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Splits an option string into its name and value.
    pub fn parse(option: &str) -> (String, OptionValue) {
        let option = option.trim();
        if let Some(name) = option.strip_prefix('!') {
            return (name.to_string(), OptionValue::Disabled);
        }
        match option.split_once(':') {
            Some((name, value)) => (name.to_string(), OptionValue::Value(value.to_string())),
            None => (option.to_string(), OptionValue::Enabled),
        }
    }

    /// Inserts an option string, replacing any option with the same name.
    pub fn insert(&mut self, option: &str) {
        let (name, value) = Self::parse(option);
        self.options.insert(name, value);
    }

    /// Returns the value of an option by name.
    pub fn get(&self, name: &str) -> Option<&OptionValue> {
        self.options.get(name)
    }

    /// Returns true if the option string is set exactly as given.
    pub fn contains(&self, option: &str) -> bool {
        let (name, value) = Self::parse(option);
        self.options.get(&name) == Some(&value)
    }

    /// Returns the number of options.
    pub fn len(&self) -> usize {
        self.options.len()
    }

    /// Returns true if no options are set.
    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    /// Renders the options as engine option strings.
    pub fn to_strings(&self) -> Vec<String> {
        self.options
            .iter()
            .map(|(name, value)| match value {
                OptionValue::Enabled => name.clone(),
                OptionValue::Disabled => format!("!{}", name),
                OptionValue::Value(v) => format!("{}:{}", name, v),
            })
            .collect()
    }
}

impl<S: AsRef<str>> FromIterator<S> for OptionSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = Self::new();
        for option in iter {
            set.insert(option.as_ref());
        }
        set
    }
}

impl From<Vec<String>> for OptionSet {
    fn from(options: Vec<String>) -> Self {
        options.into_iter().collect()
    }
}

impl From<OptionSet> for Vec<String> {
    fn from(set: OptionSet) -> Self {
        set.to_strings()
    }
}

/// The kind of task, which decides the policy options appended to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskFamily {
    /// Single-skill tasks (eat, pray, open a door).
    #[default]
    Skill,
    /// Navigation tasks that end on the staircase down.
    Maze,
}

impl TaskFamily {
    /// Options appended to every task of this family.
    ///
    /// `nudist` stands in for switching off random monster generation,
    /// which the engine has no direct option for.
    pub fn policy_options(self) -> &'static [&'static str] {
        match self {
            TaskFamily::Skill => &["pettype:none", "!autopickup"],
            TaskFamily::Maze => &["pettype:none", "!autopickup", "nudist"],
        }
    }

    /// The family's defaults, applied over the engine defaults.
    pub fn defaults(self) -> TaskOverrides {
        match self {
            TaskFamily::Skill => TaskOverrides::new()
                .character("cav-hum-new-mal")
                .max_episode_steps(100),
            TaskFamily::Maze => TaskOverrides::new()
                .actions(Command::moves().collect())
                .observation_keys(["glyphs"])
                .allow_all_yn_questions(false)
                .max_episode_steps(100),
        }
    }

    /// Returns the family name used in task files.
    pub fn as_str(self) -> &'static str {
        match self {
            TaskFamily::Skill => "skill",
            TaskFamily::Maze => "maze",
        }
    }
}

impl fmt::Display for TaskFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The configuration an engine is launched with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskConfig {
    /// Engine options.
    pub options: OptionSet,

    /// Allowed primitive actions; an agent's action index points into this list.
    pub actions: Vec<Command>,

    /// Observation channels exposed to the agent.
    pub observation_keys: BTreeSet<String>,

    /// Character role-race-alignment-gender string.
    pub character: String,

    /// Step budget for one episode.
    pub max_episode_steps: u32,

    /// Whether the agent answers every yes/no question itself.
    pub allow_all_yn_questions: bool,

    /// Whether the engine runs in wizard (debug) mode.
    pub wizard: bool,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self::engine_defaults()
    }
}

impl TaskConfig {
    /// Engine-wide defaults shared by every task.
    pub fn engine_defaults() -> Self {
        Self {
            options: ENGINE_OPTIONS.iter().collect(),
            actions: full_action_set(),
            observation_keys: ENGINE_OBSERVATION_KEYS
                .iter()
                .map(|k| (*k).to_string())
                .collect(),
            character: "mon-hum-neu-mal".to_string(),
            max_episode_steps: 5000,
            allow_all_yn_questions: true,
            wizard: false,
        }
    }

    /// Merges `overrides` over `base` and appends the family's policy options.
    pub fn compose(base: &TaskConfig, overrides: &TaskOverrides, family: TaskFamily) -> TaskConfig {
        let mut options = match &overrides.options {
            Some(options) => options.iter().collect(),
            None => base.options.clone(),
        };

        let keep_policy = overrides.keep_policy_defaults.unwrap_or(true);
        if keep_policy {
            for option in family.policy_options() {
                options.insert(option);
            }
        }

        let actions = match &overrides.actions {
            Some(actions) => dedup_actions(actions),
            None => base.actions.clone(),
        };

        let observation_keys = match &overrides.observation_keys {
            Some(keys) => keys.iter().cloned().collect(),
            None => base.observation_keys.clone(),
        };

        let config = TaskConfig {
            options,
            actions,
            observation_keys,
            character: overrides
                .character
                .clone()
                .unwrap_or_else(|| base.character.clone()),
            max_episode_steps: overrides
                .max_episode_steps
                .unwrap_or(base.max_episode_steps),
            allow_all_yn_questions: overrides
                .allow_all_yn_questions
                .unwrap_or(base.allow_all_yn_questions),
            wizard: overrides.wizard.unwrap_or(base.wizard),
        };

        debug!(
            family = %family,
            options = config.options.len(),
            actions = config.actions.len(),
            character = %config.character,
            max_episode_steps = config.max_episode_steps,
            policy_defaults = keep_policy,
            "Composed task configuration"
        );
        config
    }

    /// Composes engine defaults, family defaults and `overrides`.
    pub fn for_family(family: TaskFamily, overrides: &TaskOverrides) -> TaskConfig {
        let layered = family.defaults().merge(overrides);
        Self::compose(&Self::engine_defaults(), &layered, family)
    }

    /// Returns the options as engine option strings.
    pub fn option_strings(&self) -> Vec<String> {
        self.options.to_strings()
    }

    /// Returns the action index of a command, if it is allowed.
    pub fn action_index(&self, command: Command) -> Option<usize> {
        self.actions.iter().position(|&c| c == command)
    }

    /// Checks the configuration can launch an episode.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.actions.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "actions".to_string(),
                message: "at least one action is required".to_string(),
            });
        }
        if self.max_episode_steps == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_episode_steps".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if self.character.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "character".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

/// The engine's full primitive action set.
pub fn full_action_set() -> Vec<Command> {
    Command::moves()
        .chain([
            Command::Apply,
            Command::Eat,
            Command::Kick,
            Command::Open,
            Command::Pickup,
            Command::Pray,
            Command::Search,
            Command::Escape,
            Command::Enter,
        ])
        .collect()
}

/// Moves plus picking up and applying items.
pub fn apply_action_set() -> Vec<Command> {
    Command::moves()
        .chain([Command::Pickup, Command::Apply])
        .collect()
}

/// Moves plus opening, kicking and searching.
pub fn navigate_action_set() -> Vec<Command> {
    Command::moves()
        .chain([Command::Open, Command::Kick, Command::Search])
        .collect()
}

fn dedup_actions(actions: &[Command]) -> Vec<Command> {
    let mut seen = Vec::with_capacity(actions.len());
    for &action in actions {
        if !seen.contains(&action) {
            seen.push(action);
        }
    }
    seen
}

/// A partial task configuration.
///
/// Only fields that are `Some` replace the layer below.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskOverrides {
    pub options: Option<Vec<String>>,
    pub actions: Option<Vec<Command>>,
    pub observation_keys: Option<Vec<String>>,
    pub character: Option<String>,
    pub max_episode_steps: Option<u32>,
    pub allow_all_yn_questions: Option<bool>,
    pub wizard: Option<bool>,
    /// `Some(false)` drops the family's policy options.
    pub keep_policy_defaults: Option<bool>,
}

impl TaskOverrides {
    /// Creates an empty override set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Layers `over` on top of `self`; fields set in `over` win.
    pub fn merge(&self, over: &TaskOverrides) -> TaskOverrides {
        TaskOverrides {
            options: over.options.clone().or_else(|| self.options.clone()),
            actions: over.actions.clone().or_else(|| self.actions.clone()),
            observation_keys: over
                .observation_keys
                .clone()
                .or_else(|| self.observation_keys.clone()),
            character: over.character.clone().or_else(|| self.character.clone()),
            max_episode_steps: over.max_episode_steps.or(self.max_episode_steps),
            allow_all_yn_questions: over.allow_all_yn_questions.or(self.allow_all_yn_questions),
            wizard: over.wizard.or(self.wizard),
            keep_policy_defaults: over.keep_policy_defaults.or(self.keep_policy_defaults),
        }
    }

    pub fn options<S: Into<String>>(mut self, options: impl IntoIterator<Item = S>) -> Self {
        self.options = Some(options.into_iter().map(Into::into).collect());
        self
    }

    pub fn actions(mut self, actions: Vec<Command>) -> Self {
        self.actions = Some(actions);
        self
    }

    pub fn observation_keys<S: Into<String>>(mut self, keys: impl IntoIterator<Item = S>) -> Self {
        self.observation_keys = Some(keys.into_iter().map(Into::into).collect());
        self
    }

    pub fn character(mut self, character: impl Into<String>) -> Self {
        self.character = Some(character.into());
        self
    }

    pub fn max_episode_steps(mut self, steps: u32) -> Self {
        self.max_episode_steps = Some(steps);
        self
    }

    pub fn allow_all_yn_questions(mut self, allow: bool) -> Self {
        self.allow_all_yn_questions = Some(allow);
        self
    }

    pub fn wizard(mut self, wizard: bool) -> Self {
        self.wizard = Some(wizard);
        self
    }

    pub fn without_policy_defaults(mut self) -> Self {
        self.keep_policy_defaults = Some(false);
        self
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("level error: {0}")]
    Level(#[from] LevelError),

    #[error("unknown task '{0}'")]
    UnknownTask(String),

    #[error("task '{0}' is already registered")]
    DuplicateTask(String),

    #[error("invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use minihack_proto::CompassDirection;

    #[test]
    fn test_engine_defaults() {
        let config = TaskConfig::engine_defaults();
        assert!(config.options.contains("autopickup"));
        assert!(config.options.contains("pickup_types:$?!/"));
        assert_eq!(config.character, "mon-hum-neu-mal");
        assert_eq!(config.max_episode_steps, 5000);
        assert!(config.observation_keys.contains("message"));
        assert!(config.actions.contains(&Command::Pray));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_option_parsing() {
        assert_eq!(
            OptionSet::parse("pettype:none"),
            ("pettype".to_string(), OptionValue::Value("none".to_string()))
        );
        assert_eq!(
            OptionSet::parse("!autopickup"),
            ("autopickup".to_string(), OptionValue::Disabled)
        );
        assert_eq!(
            OptionSet::parse("nudist"),
            ("nudist".to_string(), OptionValue::Enabled)
        );
    }

    #[test]
    fn test_disabling_replaces_enabled_option() {
        let mut options: OptionSet = ["color", "autopickup"].into_iter().collect();
        options.insert("!autopickup");
        assert_eq!(options.len(), 2);
        assert!(options.contains("!autopickup"));
        assert!(!options.contains("autopickup"));
        assert_eq!(options.to_strings(), vec!["!autopickup", "color"]);
    }

    #[test]
    fn test_skill_family_appends_policy_options() {
        let config = TaskConfig::for_family(TaskFamily::Skill, &TaskOverrides::new());
        assert!(config.options.contains("pettype:none"));
        assert!(config.options.contains("!autopickup"));
        assert!(!config.options.contains("nudist"));
        assert_eq!(config.character, "cav-hum-new-mal");
        assert_eq!(config.max_episode_steps, 100);
        assert_eq!(config.actions, full_action_set());
    }

    #[test]
    fn test_maze_family_defaults() {
        let config = TaskConfig::for_family(TaskFamily::Maze, &TaskOverrides::new());
        assert!(config.options.contains("pettype:none"));
        assert!(config.options.contains("!autopickup"));
        assert!(config.options.contains("nudist"));
        assert_eq!(config.actions, Command::moves().collect::<Vec<_>>());
        assert_eq!(
            config.observation_keys.iter().collect::<Vec<_>>(),
            vec!["glyphs"]
        );
        assert!(!config.allow_all_yn_questions);
        assert_eq!(config.character, "mon-hum-neu-mal");
    }

    #[test]
    fn test_caller_options_cannot_drop_policy_defaults() {
        let overrides = TaskOverrides::new().options(["autopickup", "pettype:kitten", "color"]);
        let config = TaskConfig::for_family(TaskFamily::Maze, &overrides);

        assert!(config.options.contains("pettype:none"));
        assert!(config.options.contains("!autopickup"));
        assert!(config.options.contains("nudist"));
        assert!(config.options.contains("color"));
        assert!(!config.options.contains("showexp"), "caller options replace the base list");
    }

    #[test]
    fn test_explicit_opt_out_keeps_caller_options() {
        let overrides = TaskOverrides::new()
            .options(["autopickup", "pettype:kitten"])
            .without_policy_defaults();
        let config = TaskConfig::for_family(TaskFamily::Skill, &overrides);

        assert!(config.options.contains("autopickup"));
        assert!(config.options.contains("pettype:kitten"));
        assert_eq!(config.options.len(), 2);
    }

    #[test]
    fn test_scalar_overrides_fall_back() {
        let overrides = TaskOverrides::new().max_episode_steps(7);
        let config = TaskConfig::for_family(TaskFamily::Skill, &overrides);
        assert_eq!(config.max_episode_steps, 7);
        assert_eq!(config.character, "cav-hum-new-mal");

        let overrides = TaskOverrides::new().character("rog-hum-cha-mal");
        let config = TaskConfig::for_family(TaskFamily::Skill, &overrides);
        assert_eq!(config.character, "rog-hum-cha-mal");
        assert_eq!(config.max_episode_steps, 100);
    }

    #[test]
    fn test_override_layers_later_wins() {
        let task = TaskOverrides::new().max_episode_steps(1000).wizard(false);
        let caller = TaskOverrides::new().max_episode_steps(20);
        let merged = task.merge(&caller);
        assert_eq!(merged.max_episode_steps, Some(20));
        assert_eq!(merged.wizard, Some(false));
    }

    #[test]
    fn test_actions_deduplicated_in_order() {
        let north = Command::Move(CompassDirection::North);
        let overrides = TaskOverrides::new().actions(vec![north, Command::Apply, north]);
        let config = TaskConfig::for_family(TaskFamily::Skill, &overrides);
        assert_eq!(config.actions, vec![north, Command::Apply]);
        assert_eq!(config.action_index(Command::Apply), Some(1));
        assert_eq!(config.action_index(Command::Pray), None);
    }

    #[test]
    fn test_overrides_from_yaml() {
        let yaml = r#"
options: ["color", "autopickup"]
actions: [north, south, apply]
max_episode_steps: 42
"#;
        let overrides: TaskOverrides = serde_yaml::from_str(yaml).unwrap();
        let config = TaskConfig::for_family(TaskFamily::Skill, &overrides);

        assert_eq!(config.max_episode_steps, 42);
        assert_eq!(config.actions.len(), 3);
        assert!(config.options.contains("!autopickup"));
        assert!(config.options.contains("color"));
    }

    #[test]
    fn test_config_round_trips_through_yaml() {
        let config = TaskConfig::for_family(TaskFamily::Maze, &TaskOverrides::new());
        let yaml = serde_yaml::to_string(&config).unwrap();
        assert!(yaml.contains("pettype:none"));
        let parsed: TaskConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_validate_rejects_empty_actions() {
        let overrides = TaskOverrides::new().actions(vec![]);
        let config = TaskConfig::for_family(TaskFamily::Skill, &overrides);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field, .. }) if field == "actions"
        ));
    }
}
