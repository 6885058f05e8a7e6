//! # minihack-core
//!
//! Task layer for MiniHack-style dungeon-crawl environments.
//!
//! This crate provides:
//! - A builder for the level description programs the engine loads
//! - Layered task configuration with policy defaults
//! - Per-step goal evaluation against the engine's observations
//! - Composite actions that expand one agent command into scripted turns
//! - The episode driver and task registry tying them together
//! - JSONL recording of every engine turn

mod config;
mod controller;
mod engine;
mod episode;
mod goal;
mod level;
mod macro_state;
mod recorder;
mod task_registry;
pub mod testing;

pub use config::{
    ConfigError, ENGINE_OBSERVATION_KEYS, ENGINE_OPTIONS, OptionSet, OptionValue, TaskConfig,
    TaskFamily, TaskOverrides, apply_action_set, full_action_set, navigate_action_set,
};
pub use controller::{
    CompositeAction, CompositeActionController, Interception, KnownPrompt, MacroOutcome,
    ScriptError, Turn, UnlockDoor,
};
pub use engine::{Engine, LevelSource};
pub use episode::{
    Episode, EpisodeEnd, EpisodeError, EpisodeEvent, EpisodeState, StepInfo, StepResult,
};
pub use goal::{GoalSpec, StepStatus, TerminationOracle, edible_goal, edible_items};
pub use level::{
    DEFAULT_LEVEL_SIZE, DEFAULT_OBJECT_SYMBOL, LevelBuilder, LevelError, LevelSpec, Location,
};
pub use macro_state::MacroState;
pub use recorder::{TurnRecord, TurnRecorder};
pub use task_registry::{
    LevelDefinition, ObjectPlacement, Task, TaskFile, TaskRegistry, TaskSpec,
};
