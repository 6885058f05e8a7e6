//! Episode-scoped state for two-step actions.

use minihack_proto::Command;
use serde::{Deserialize, Serialize};

/// Progress through a two-step action such as praying on an altar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MacroState {
    #[default]
    Idle,
    /// The first step happened on the previous turn.
    PendingConfirm,
    /// The sequence completed. Sticky until the next reset.
    Confirmed,
}

impl MacroState {
    /// Advances the prayer sequence by one chosen command.
    ///
    /// `Pray` while standing on the altar arms the sequence; the confirm
    /// direction immediately afterwards completes it. Anything else disarms
    /// it.
    pub fn after_prayer_step(self, command: Command, on_altar: bool) -> MacroState {
        match self {
            MacroState::Confirmed => MacroState::Confirmed,
            _ if command == Command::Pray && on_altar => MacroState::PendingConfirm,
            MacroState::PendingConfirm if command == Command::CONFIRM_DIRECTION => {
                MacroState::Confirmed
            }
            _ => MacroState::Idle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use minihack_proto::CompassDirection;

    fn run(steps: &[(Command, bool)]) -> MacroState {
        steps
            .iter()
            .fold(MacroState::Idle, |state, &(command, on_altar)| {
                state.after_prayer_step(command, on_altar)
            })
    }

    #[test]
    fn test_pray_then_confirm() {
        let state = run(&[(Command::Pray, true), (Command::CONFIRM_DIRECTION, false)]);
        assert_eq!(state, MacroState::Confirmed);
    }

    #[test]
    fn test_unrelated_action_resets() {
        let state = run(&[
            (Command::Pray, true),
            (Command::Move(CompassDirection::South), false),
            (Command::CONFIRM_DIRECTION, false),
        ]);
        assert_eq!(state, MacroState::Idle);
    }

    #[test]
    fn test_pray_off_altar_does_not_arm() {
        let state = run(&[(Command::Pray, false), (Command::CONFIRM_DIRECTION, false)]);
        assert_eq!(state, MacroState::Idle);
    }

    #[test]
    fn test_confirm_without_pray_stays_idle() {
        assert_eq!(
            MacroState::Idle.after_prayer_step(Command::CONFIRM_DIRECTION, true),
            MacroState::Idle
        );
    }

    #[test]
    fn test_repeated_pray_keeps_pending() {
        let state = run(&[(Command::Pray, true), (Command::Pray, true)]);
        assert_eq!(state, MacroState::PendingConfirm);
    }

    #[test]
    fn test_confirmed_is_sticky() {
        let state = run(&[
            (Command::Pray, true),
            (Command::CONFIRM_DIRECTION, false),
            (Command::Move(CompassDirection::East), false),
            (Command::Search, false),
        ]);
        assert_eq!(state, MacroState::Confirmed);
    }
}
