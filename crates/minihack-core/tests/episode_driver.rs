//! Episode tests against the simulated door engine and task files on disk.

use minihack_core::testing::{DoorEngine, MockEngine};
use minihack_core::{
    Engine, Episode, EpisodeEnd, MacroOutcome, StepStatus, TaskFile, TaskOverrides, TaskRegistry,
    TurnRecord, TurnRecorder,
};
use minihack_proto::{Command, CompassDirection, Observation, Transition};
use std::io::Write;
use std::sync::Arc;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[test]
fn test_key_door_episode_with_door_engine() {
    init_tracing();
    let task = TaskRegistry::builtin()
        .build("key-door", &TaskOverrides::new())
        .unwrap();
    let engine = DoorEngine::new(CompassDirection::East)
        .with_key('f')
        .stuck_for(2);
    let mut episode = Episode::new(engine, task);
    episode.reset().unwrap();

    let result = episode.step_command(Command::Apply).unwrap();
    assert!(matches!(
        result.info.macro_outcome,
        MacroOutcome::Completed { turns: 8 }
    ));
    assert_eq!(result.info.engine_turns, 8);
    assert_eq!(result.observation.message_text(), "The door opens.");
    assert!(!result.done);
    assert!(episode.engine().door_open());

    // The door is open now, so applying again goes straight to the engine.
    let again = episode.step_command(Command::Apply).unwrap();
    assert_eq!(again.info.macro_outcome, MacroOutcome::NotApplicable);
    assert_eq!(again.info.engine_turns, 1);
}

#[test]
fn test_door_engine_reset_restores_lock() {
    let task = TaskRegistry::builtin()
        .build("key-door", &TaskOverrides::new())
        .unwrap();
    let mut episode = Episode::new(DoorEngine::new(CompassDirection::North).with_key('a'), task);

    episode.reset().unwrap();
    episode.step_command(Command::Apply).unwrap();
    assert!(episode.engine().door_open());

    episode.reset().unwrap();
    assert!(!episode.engine().door_open());
    assert_eq!(episode.engine().turns(), 0);
}

#[test]
fn test_recorder_captures_scripted_turns() {
    init_tracing();
    let task = TaskRegistry::builtin()
        .build("key-door", &TaskOverrides::new())
        .unwrap();
    let mut episode = Episode::new(DoorEngine::new(CompassDirection::West).with_key('k'), task);

    let recorder = Arc::new(TurnRecorder::new(Vec::new()));
    let sink = Arc::clone(&recorder);
    episode.add_observer(move |event| sink.record(event));

    episode.reset().unwrap();
    episode.step_command(Command::Apply).unwrap();
    drop(episode);

    let recorder = Arc::try_unwrap(recorder).ok().unwrap();
    let output = String::from_utf8(recorder.into_inner()).unwrap();
    let records: Vec<TurnRecord> = output
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();

    assert_eq!(records[0].event, "_meta.reset");
    let commands: Vec<&str> = records[1..]
        .iter()
        .map(|record| record.data["command"].as_str().unwrap())
        .collect();
    assert_eq!(commands, vec!["apply", "letter:k", "west", "yes", "space", "west"]);
    assert!(records[1..].iter().all(|record| record.data["scripted"] == true));
}

#[test]
fn test_task_file_from_disk() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
tasks:
  - id: banana-room
    level:
      kind: generated
      width: 4
      height: 3
      objects:
        - name: banana
    goal:
      kind: message_match
      messages: ["This banana is delicious"]
    overrides:
      character: "val-dwa-law-fem"
"#
    )
    .unwrap();

    let mut registry = TaskRegistry::builtin();
    registry.merge(TaskFile::from_file(file.path()).unwrap()).unwrap();
    let task = registry
        .build("banana-room", &TaskOverrides::new())
        .unwrap();
    assert_eq!(task.config.character, "val-dwa-law-fem");

    let engine = MockEngine::new(vec![Transition::running(Observation::with_message(
        "This banana is delicious!",
    ))]);
    let mut episode = Episode::new(engine, task);
    episode.reset().unwrap();
    let result = episode.step_command(Command::Eat).unwrap();
    assert_eq!(result.status, StepStatus::Success);
    assert_eq!(result.end, Some(EpisodeEnd::Success));
}

#[test]
fn test_task_file_with_bad_symbol_fails_before_launch() {
    let yaml = r#"
tasks:
  - id: bad
    level:
      kind: generated
      objects:
        - name: apple
          symbol: "''"
    goal:
      kind: internal_flag
      index: 4
"#;
    let mut registry = TaskRegistry::new();
    registry.merge(yaml.parse().unwrap()).unwrap();
    assert!(registry.build("bad", &TaskOverrides::new()).is_err());
}

#[test]
fn test_engine_errors_propagate() {
    let task = TaskRegistry::builtin()
        .build("eat", &TaskOverrides::new())
        .unwrap();
    let mut episode = Episode::new(MockEngine::new(vec![]).fail_on(Command::Eat), task);
    episode.reset().unwrap();
    let err = episode.step_command(Command::Eat).unwrap_err();
    assert!(err.to_string().contains("scripted failure"));

    let level = episode.task().level.clone();
    let config = episode.task().config.clone();
    assert!(episode.engine_mut().reset(&level, &config).is_ok());
}
