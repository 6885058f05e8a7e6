//! Primitive engine commands.
//!
//! Every command maps to the single keycode the engine reads for it. Commands
//! serialize as short lowercase names (`north`, `apply`, `letter:f`) so task
//! files can list action sets by name.

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const ESC: u8 = 0x1b;

/// The eight compass directions an agent can move or aim in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompassDirection {
    North,
    East,
    South,
    West,
    NorthEast,
    SouthEast,
    SouthWest,
    NorthWest,
}

impl CompassDirection {
    /// All directions, cardinal first.
    pub const ALL: [CompassDirection; 8] = [
        CompassDirection::North,
        CompassDirection::East,
        CompassDirection::South,
        CompassDirection::West,
        CompassDirection::NorthEast,
        CompassDirection::SouthEast,
        CompassDirection::SouthWest,
        CompassDirection::NorthWest,
    ];

    /// Returns the vi-key the engine reads for this direction.
    pub fn key(self) -> u8 {
        match self {
            CompassDirection::North => b'k',
            CompassDirection::East => b'l',
            CompassDirection::South => b'j',
            CompassDirection::West => b'h',
            CompassDirection::NorthEast => b'u',
            CompassDirection::SouthEast => b'n',
            CompassDirection::SouthWest => b'b',
            CompassDirection::NorthWest => b'y',
        }
    }

    /// Returns the direction name used in task files.
    pub fn as_str(self) -> &'static str {
        match self {
            CompassDirection::North => "north",
            CompassDirection::East => "east",
            CompassDirection::South => "south",
            CompassDirection::West => "west",
            CompassDirection::NorthEast => "north_east",
            CompassDirection::SouthEast => "south_east",
            CompassDirection::SouthWest => "south_west",
            CompassDirection::NorthWest => "north_west",
        }
    }
}

impl fmt::Display for CompassDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single atomic instruction understood by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Command {
    /// Move (or aim) one tile in a direction.
    Move(CompassDirection),
    /// Apply or use an inventory item.
    Apply,
    /// Pray to the agent's god.
    Pray,
    /// Pick up items on the current tile.
    Pickup,
    /// Open a door.
    Open,
    /// Kick in a direction.
    Kick,
    /// Search adjacent tiles.
    Search,
    /// Eat something.
    Eat,
    /// Answer `y` to a question.
    Yes,
    /// Answer `n` to a question.
    No,
    /// Dismiss a prompt or menu.
    Escape,
    /// Acknowledge a `--More--` screen.
    Space,
    /// Confirm a menu selection.
    Enter,
    /// Select an inventory slot by its letter.
    Letter(char),
}

impl Command {
    /// The command that confirms a prayer.
    ///
    /// The engine reads `y` for both north-west and "yes", so agents with a
    /// move-style action space answer "Are you sure you want to pray?" with
    /// this direction.
    pub const CONFIRM_DIRECTION: Command = Command::Move(CompassDirection::NorthWest);

    /// Returns the keycode sent to the engine.
    pub fn key(self) -> u8 {
        match self {
            Command::Move(direction) => direction.key(),
            Command::Apply => b'a',
            Command::Pray => 0x80 | b'p',
            Command::Pickup => b',',
            Command::Open => b'o',
            Command::Kick => 0x04,
            Command::Search => b's',
            Command::Eat => b'e',
            Command::Yes => b'y',
            Command::No => b'n',
            Command::Escape => ESC,
            Command::Space => b' ',
            Command::Enter => b'\r',
            Command::Letter(letter) if letter.is_ascii() => letter as u8,
            Command::Letter(_) => ESC,
        }
    }

    /// Returns the eight move commands.
    pub fn moves() -> impl Iterator<Item = Command> {
        CompassDirection::ALL.into_iter().map(Command::Move)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Move(direction) => f.write_str(direction.as_str()),
            Command::Apply => f.write_str("apply"),
            Command::Pray => f.write_str("pray"),
            Command::Pickup => f.write_str("pickup"),
            Command::Open => f.write_str("open"),
            Command::Kick => f.write_str("kick"),
            Command::Search => f.write_str("search"),
            Command::Eat => f.write_str("eat"),
            Command::Yes => f.write_str("yes"),
            Command::No => f.write_str("no"),
            Command::Escape => f.write_str("escape"),
            Command::Space => f.write_str("space"),
            Command::Enter => f.write_str("enter"),
            Command::Letter(letter) => write!(f, "letter:{}", letter),
        }
    }
}

impl FromStr for Command {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(direction) = CompassDirection::ALL
            .into_iter()
            .find(|d| d.as_str() == s)
        {
            return Ok(Command::Move(direction));
        }

        let command = match s {
            "apply" => Command::Apply,
            "pray" => Command::Pray,
            "pickup" => Command::Pickup,
            "open" => Command::Open,
            "kick" => Command::Kick,
            "search" => Command::Search,
            "eat" => Command::Eat,
            "yes" => Command::Yes,
            "no" => Command::No,
            "escape" => Command::Escape,
            "space" => Command::Space,
            "enter" => Command::Enter,
            other => {
                let letter = other
                    .strip_prefix("letter:")
                    .and_then(|rest| {
                        let mut chars = rest.chars();
                        match (chars.next(), chars.next()) {
                            (Some(c), None) if c.is_ascii_alphabetic() => Some(c),
                            _ => None,
                        }
                    })
                    .ok_or_else(|| Error::UnknownCommand(other.to_string()))?;
                Command::Letter(letter)
            }
        };
        Ok(command)
    }
}

impl TryFrom<String> for Command {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Command> for String {
    fn from(command: Command) -> Self {
        command.to_string()
    }
}
