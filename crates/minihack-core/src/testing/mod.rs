//! Testing utilities for deterministic episode tests.

pub mod door_engine;
pub mod mock_engine;
pub mod scenario;

pub use door_engine::DoorEngine;
pub use mock_engine::{Launch, MockEngine};
pub use scenario::{
    ExecutionTrace, Expectation, Scenario, ScenarioError, ScenarioRunner, ScriptedObservation,
    ScriptedTransition,
};
