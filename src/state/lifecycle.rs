use thiserror::Error;

use crate::dao::models::GameStatus;

/// Events that move a game through its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameEvent {
    /// Host kicks the game off.
    Start,
    /// Every participant has an attendance record.
    AllAttended,
    /// Host or admin calls the game off.
    Cancel,
}

/// Error returned when an event cannot be applied from the current status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while {from:?}")]
pub struct InvalidTransition {
    /// Status the game was in when the event was received.
    pub from: GameStatus,
    /// The rejected event.
    pub event: GameEvent,
}

/// Compute the status reached by applying `event` to a game in `from`.
pub fn next_status(from: GameStatus, event: GameEvent) -> Result<GameStatus, InvalidTransition> {
    let next = match (from, event) {
        (GameStatus::Upcoming, GameEvent::Start) => GameStatus::Ongoing,
        (GameStatus::Ongoing, GameEvent::AllAttended) => GameStatus::Completed,
        (GameStatus::Upcoming | GameStatus::Ongoing, GameEvent::Cancel) => GameStatus::Cancelled,
        (from, event) => return Err(InvalidTransition { from, event }),
    };
    Ok(next)
}
