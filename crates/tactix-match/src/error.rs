//! Error types for the match layer.
//!
//! The `Display` text of every variant except [`MatchError::Storage`] and
//! [`MatchError::UnknownState`] is shown to players as-is.

use tactix_protocol::{Mark, MatchId, PlayerId};

/// Errors that can occur during match operations.
#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    /// The cell index is outside `0..9`.
    #[error("invalid cell {0}: must be between 0 and 8")]
    InvalidCell(i64),

    /// The cell already holds a mark.
    #[error("cell {0} is occupied")]
    CellOccupied(usize),

    /// The mover's mark is not the one whose turn it is.
    #[error("not your turn: waiting for {0}")]
    NotYourTurn(Mark),

    /// The match is still waiting for a second player.
    #[error("game {0} has not started yet")]
    NotStarted(MatchId),

    /// The match already has a winner or ended in a tie.
    #[error("game {0} is already finished")]
    AlreadyFinished(MatchId),

    /// Both seats are taken.
    #[error("game {0} is full")]
    MatchFull(MatchId),

    /// The bot was asked to move on a full board.
    #[error("no available moves")]
    NoAvailableMoves,

    /// A bot match without a bot seat.
    #[error("bot is not seated in game {0}")]
    BotNotSeated(MatchId),

    #[error("player {0} not found")]
    PlayerNotFound(PlayerId),

    #[error("game {0} not found")]
    MatchNotFound(MatchId),

    /// The player has no current match.
    #[error("player {0} is not in a game")]
    NotSeated(PlayerId),

    /// The player is seated in a different match.
    #[error("player {0} is already in game {1}")]
    AlreadySeated(PlayerId, MatchId),

    /// A rematch was asked for before the player finished any match.
    #[error("No last opponent found")]
    NoLastOpponent,

    /// Stored state contradicts itself.
    #[error("unknown state: {0}")]
    UnknownState(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Failures reported by a storage backend. Never retried.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage backend failure: {0}")]
    Backend(String),
}
