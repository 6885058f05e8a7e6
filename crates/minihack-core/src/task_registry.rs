//! Task registry.
//!
//! Every task is data: a family, a level definition, a goal, an optional
//! composite action and the task's own configuration overrides. The registry
//! holds the builtin tasks and any tasks loaded from YAML task files.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

use crate::config::{
    ConfigError, ENGINE_OBSERVATION_KEYS, TaskConfig, TaskFamily, TaskOverrides,
    apply_action_set, full_action_set, navigate_action_set,
};
use crate::controller::CompositeAction;
use crate::engine::LevelSource;
use crate::goal::{GoalSpec, edible_goal};
use crate::level::{DEFAULT_LEVEL_SIZE, DEFAULT_OBJECT_SYMBOL, LevelBuilder, LevelError, Location};

/// An object placed on a generated or mapped level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectPlacement {
    pub name: String,
    #[serde(default = "default_symbol")]
    pub symbol: String,
    #[serde(default)]
    pub loc: Location,
}

impl ObjectPlacement {
    /// A comestible at a random location.
    pub fn comestible(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            symbol: DEFAULT_OBJECT_SYMBOL.to_string(),
            loc: Location::Random,
        }
    }
}

fn default_symbol() -> String {
    DEFAULT_OBJECT_SYMBOL.to_string()
}

fn default_size() -> usize {
    DEFAULT_LEVEL_SIZE
}

fn default_lit() -> bool {
    true
}

/// How a task's level is produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LevelDefinition {
    /// An empty room with optional objects and altar.
    Generated {
        #[serde(default = "default_size")]
        width: usize,
        #[serde(default = "default_size")]
        height: usize,
        #[serde(default = "default_lit")]
        lit: bool,
        #[serde(default)]
        objects: Vec<ObjectPlacement>,
        #[serde(default)]
        altar: Option<Location>,
    },
    /// A caller-supplied map grid.
    Map {
        grid: String,
        #[serde(default)]
        objects: Vec<ObjectPlacement>,
        #[serde(default)]
        altar: Option<Location>,
    },
    /// A level file shipped with the engine.
    Bundled { file: String },
}

impl LevelDefinition {
    /// A lit `size` x `size` room.
    pub fn room(size: usize) -> Self {
        LevelDefinition::Generated {
            width: size,
            height: size,
            lit: true,
            objects: Vec::new(),
            altar: None,
        }
    }

    pub fn bundled(file: impl Into<String>) -> Self {
        LevelDefinition::Bundled { file: file.into() }
    }

    /// Adds an object. Ignored for bundled levels.
    pub fn with_object(mut self, object: ObjectPlacement) -> Self {
        if let LevelDefinition::Generated { objects, .. } | LevelDefinition::Map { objects, .. } =
            &mut self
        {
            objects.push(object);
        }
        self
    }

    /// Sets the altar. Ignored for bundled levels.
    pub fn with_altar(mut self, loc: Location) -> Self {
        if let LevelDefinition::Generated { altar, .. } | LevelDefinition::Map { altar, .. } =
            &mut self
        {
            *altar = Some(loc);
        }
        self
    }

    /// Builds the level, validating every placement.
    pub fn build(&self) -> Result<LevelSource, LevelError> {
        let (mut builder, objects, altar) = match self {
            LevelDefinition::Bundled { file } => return Ok(LevelSource::Bundled(file.clone())),
            LevelDefinition::Generated {
                width,
                height,
                lit,
                objects,
                altar,
            } => (LevelBuilder::empty(*width, *height, *lit), objects, altar),
            LevelDefinition::Map {
                grid,
                objects,
                altar,
            } => (LevelBuilder::from_map(grid), objects, altar),
        };

        for object in objects {
            builder.add_object(&object.name, &object.symbol, object.loc.clone())?;
        }
        if let Some(loc) = altar {
            builder.add_altar(loc.clone())?;
        }
        Ok(LevelSource::Inline(builder.build()))
    }
}

/// A registered task definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSpec {
    /// Unique task id (e.g. `eat`, `key-door`).
    pub id: String,

    #[serde(default)]
    pub family: TaskFamily,

    pub level: LevelDefinition,

    pub goal: GoalSpec,

    #[serde(default)]
    pub composite: Option<CompositeAction>,

    /// The task's own configuration layer.
    #[serde(default)]
    pub overrides: TaskOverrides,
}

impl TaskSpec {
    pub fn new(
        id: impl Into<String>,
        family: TaskFamily,
        level: LevelDefinition,
        goal: GoalSpec,
    ) -> Self {
        Self {
            id: id.into(),
            family,
            level,
            goal,
            composite: None,
            overrides: TaskOverrides::new(),
        }
    }

    pub fn with_composite(mut self, composite: CompositeAction) -> Self {
        self.composite = Some(composite);
        self
    }

    /// Layers `overrides` over the task's own settings.
    pub fn with_overrides(mut self, overrides: TaskOverrides) -> Self {
        self.overrides = self.overrides.merge(&overrides);
        self
    }

    /// Builds a launchable task, layering `caller` over the task's settings.
    ///
    /// Level and configuration errors surface here, before any engine is
    /// launched.
    pub fn build(&self, caller: &TaskOverrides) -> Result<Task, ConfigError> {
        let level = self.level.build()?;
        let config = TaskConfig::for_family(self.family, &self.overrides.merge(caller));
        config.validate()?;

        debug!(task = %self.id, family = %self.family, level = %level.label(), "Built task");
        Ok(Task {
            id: self.id.clone(),
            family: self.family,
            level,
            config,
            goal: self.goal.clone(),
            composite: self.composite.clone(),
        })
    }
}

/// A task ready to launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: String,
    pub family: TaskFamily,
    pub level: LevelSource,
    pub config: TaskConfig,
    pub goal: GoalSpec,
    pub composite: Option<CompositeAction>,
}

/// A YAML file of task definitions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskFile {
    #[serde(default)]
    pub tasks: Vec<TaskSpec>,
}

impl TaskFile {
    /// Loads task definitions from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        content.parse()
    }
}

impl std::str::FromStr for TaskFile {
    type Err = ConfigError;

    fn from_str(content: &str) -> Result<Self, Self::Err> {
        Ok(serde_yaml::from_str(content)?)
    }
}

/// Tasks by id.
#[derive(Debug, Clone, Default)]
pub struct TaskRegistry {
    tasks: BTreeMap<String, TaskSpec>,
}

impl TaskRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the builtin tasks.
    pub fn builtin() -> Self {
        let mut tasks = BTreeMap::new();
        for spec in builtin_tasks() {
            tasks.insert(spec.id.clone(), spec);
        }
        Self { tasks }
    }

    /// Builds an eat task for `item`, if the item has known eating messages.
    pub fn eat_task(item: &str) -> Option<TaskSpec> {
        let goal = GoalSpec::messages(edible_goal(item)?.iter().cloned());
        let id = if item == "apple" {
            "eat".to_string()
        } else {
            format!("eat-{}", item.replace(' ', "-"))
        };
        Some(TaskSpec::new(
            id,
            TaskFamily::Skill,
            LevelDefinition::room(5).with_object(ObjectPlacement::comestible(item)),
            goal,
        ))
    }

    /// Registers a task. Ids must be unique.
    pub fn register(&mut self, spec: TaskSpec) -> Result<(), ConfigError> {
        if self.tasks.contains_key(&spec.id) {
            return Err(ConfigError::DuplicateTask(spec.id));
        }
        debug!(task = %spec.id, "Registered task");
        self.tasks.insert(spec.id.clone(), spec);
        Ok(())
    }

    /// Registers every task in `file`.
    ///
    /// Nothing is registered if any id collides.
    pub fn merge(&mut self, file: TaskFile) -> Result<(), ConfigError> {
        let mut seen = std::collections::BTreeSet::new();
        for spec in &file.tasks {
            if self.tasks.contains_key(&spec.id) || !seen.insert(spec.id.as_str()) {
                return Err(ConfigError::DuplicateTask(spec.id.clone()));
            }
        }
        let count = file.tasks.len();
        for spec in file.tasks {
            self.tasks.insert(spec.id.clone(), spec);
        }
        info!(count, total = self.tasks.len(), "Merged task file");
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&TaskSpec> {
        self.tasks.get(id)
    }

    /// Builds the task `id` with the caller's overrides.
    pub fn build(&self, id: &str, caller: &TaskOverrides) -> Result<Task, ConfigError> {
        self.get(id)
            .ok_or_else(|| ConfigError::UnknownTask(id.to_string()))?
            .build(caller)
    }

    /// Returns every task id, sorted.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.tasks.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

fn maze(id: &str, file: &str, steps: u32) -> TaskSpec {
    TaskSpec::new(
        id,
        TaskFamily::Maze,
        LevelDefinition::bundled(file),
        GoalSpec::stairs(),
    )
    .with_overrides(TaskOverrides::new().max_episode_steps(steps))
}

fn builtin_tasks() -> Vec<TaskSpec> {
    let mut tasks = Vec::new();
    tasks.extend(TaskRegistry::eat_task("apple"));
    tasks.extend([
        TaskSpec::new(
            "pray",
            TaskFamily::Skill,
            LevelDefinition::room(5).with_altar(Location::Random),
            GoalSpec::MacroConfirmed,
        )
        .with_composite(CompositeAction::pray_on_altar()),
        TaskSpec::new(
            "closed-door",
            TaskFamily::Skill,
            LevelDefinition::bundled("closed_door.des"),
            GoalSpec::stairs(),
        ),
        TaskSpec::new(
            "locked-door",
            TaskFamily::Skill,
            LevelDefinition::bundled("locked_door.des"),
            GoalSpec::stairs(),
        ),
        maze("empty", "empty.des", 50),
        maze("four-rooms", "four_rooms.des", 100),
        maze("corridor", "corridor.des", 1000)
            .with_overrides(TaskOverrides::new().actions(navigate_action_set())),
        maze("mazewalk", "mazewalk.des", 1000).with_overrides(
            TaskOverrides::new()
                .actions(full_action_set())
                .observation_keys(ENGINE_OBSERVATION_KEYS.iter().copied())
                .allow_all_yn_questions(true),
        ),
        maze("lava-crossing", "lava_crossing.des", 200)
            .with_overrides(TaskOverrides::new().wizard(false)),
        maze("simple-crossing", "simple_crossing.des", 200),
        maze("key-door", "key_and_door.des", 200)
            .with_overrides(
                TaskOverrides::new()
                    .actions(apply_action_set())
                    .character("rog-hum-cha-mal"),
            )
            .with_composite(CompositeAction::unlock_door()),
    ]);
    tasks
}
