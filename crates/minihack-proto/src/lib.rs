//! # minihack-proto
//!
//! Shared types, error definitions and engine vocabulary for MiniHack tasks.
//!
//! This crate provides the foundational abstractions used across the MiniHack
//! crates, including:
//! - Primitive engine commands and compass directions with their keycodes
//! - Observations and transitions returned by the engine
//! - Indices into the engine's internal flag channel
//! - Common error types

mod command;
mod error;
mod observation;

pub use command::{Command, CompassDirection};
pub use error::{Error, Result};
pub use observation::{Observation, Transition, internal};
