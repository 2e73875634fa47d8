//! Game rules: result detection and move application.

use tactix_protocol::{Board, Mark, MatchStatus, Outcome};

use crate::{Match, MatchError};

/// The eight winning lines: rows, columns, diagonals.
pub const WIN_LINES: [[usize; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

/// Returns the winner, a tie on a full board without a line, or `None`
/// while play continues.
pub fn determine_result(board: &Board) -> Option<Outcome> {
    for [a, b, c] in WIN_LINES {
        if let Some(mark) = board.get(a) {
            if board.get(b) == Some(mark) && board.get(c) == Some(mark) {
                return Some(Outcome::Win(mark));
            }
        }
    }
    board.is_full().then_some(Outcome::Tie)
}

/// What an accepted move did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// Play goes on; `next` is to move.
    Continue { next: Mark },
    /// The move ended the match.
    Finished(Outcome),
}

impl Match {
    /// Fails unless moves are currently accepted.
    pub fn ensure_playable(&self) -> Result<(), MatchError> {
        match self.status {
            MatchStatus::Ongoing => Ok(()),
            MatchStatus::Waiting => Err(MatchError::NotStarted(self.id.clone())),
            MatchStatus::Finished => Err(MatchError::AlreadyFinished(self.id.clone())),
        }
    }

    /// Places `mark` on `cell` and advances the match.
    ///
    /// Checks run in order: match state, cell range, occupancy, turn. A
    /// rejected move leaves the match untouched, so replaying a move into
    /// an occupied cell always reports [`MatchError::CellOccupied`].
    pub fn apply_move(&mut self, mark: Mark, cell: usize) -> Result<MoveOutcome, MatchError> {
        self.ensure_playable()?;
        if cell >= Board::CELLS {
            return Err(MatchError::InvalidCell(cell as i64));
        }
        if !self.board.is_free(cell) {
            return Err(MatchError::CellOccupied(cell));
        }
        match self.turn {
            Some(turn) if turn == mark => {}
            Some(turn) => return Err(MatchError::NotYourTurn(turn)),
            None => {
                return Err(MatchError::UnknownState(format!(
                    "game {} is ongoing without a turn",
                    self.id
                )));
            }
        }

        self.board.place(cell, mark);
        match determine_result(&self.board) {
            Some(outcome) => {
                self.finish(outcome);
                Ok(MoveOutcome::Finished(outcome))
            }
            None => {
                let next = mark.opponent();
                self.turn = Some(next);
                Ok(MoveOutcome::Continue { next })
            }
        }
    }

    fn finish(&mut self, outcome: Outcome) {
        self.winner = Some(outcome);
        self.status = MatchStatus::Finished;
        self.turn = None;
    }
}
