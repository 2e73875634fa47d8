//! Move selection for the server-side bot.
//!
//! | difficulty   | strategy                                          |
//! |--------------|---------------------------------------------------|
//! | `easy`       | any free cell, uniformly at random                |
//! | `hard`       | win if possible, else block, else random          |
//! | `invincible` | win, block, centre, a free corner, else random    |
//!
//! `invincible` is a heuristic, not a full game-tree search.
//!
//! Randomness comes from the caller so tests can use a seeded generator.

use rand::Rng;
use rand::seq::IndexedRandom;
use tactix_protocol::{Board, Difficulty, Mark};

use crate::MatchError;
use crate::machine::WIN_LINES;

const CENTRE: usize = 4;
const CORNERS: [usize; 4] = [0, 2, 6, 8];

/// Picks the bot's next cell.
///
/// # Errors
/// [`MatchError::NoAvailableMoves`] on a full board.
pub fn choose_move<R>(
    board: &Board,
    mark: Mark,
    difficulty: Difficulty,
    rng: &mut R,
) -> Result<usize, MatchError>
where
    R: Rng + ?Sized,
{
    if board.is_full() {
        return Err(MatchError::NoAvailableMoves);
    }
    let planned = match difficulty {
        Difficulty::Easy => None,
        Difficulty::Hard => {
            winning_cell(board, mark).or_else(|| winning_cell(board, mark.opponent()))
        }
        Difficulty::Invincible => winning_cell(board, mark)
            .or_else(|| winning_cell(board, mark.opponent()))
            .or_else(|| board.is_free(CENTRE).then_some(CENTRE))
            .or_else(|| free_corner(board, rng)),
    };
    match planned {
        Some(cell) => Ok(cell),
        None => random_cell(board, rng),
    }
}

/// A free cell that would complete a line for `mark`.
pub fn winning_cell(board: &Board, mark: Mark) -> Option<usize> {
    WIN_LINES.iter().find_map(|line| {
        let owned = line.iter().filter(|&&i| board.get(i) == Some(mark)).count();
        let free: Vec<usize> = line.iter().copied().filter(|&i| board.is_free(i)).collect();
        (owned == 2 && free.len() == 1).then(|| free[0])
    })
}

fn free_corner<R: Rng + ?Sized>(board: &Board, rng: &mut R) -> Option<usize> {
    let free: Vec<usize> = CORNERS.into_iter().filter(|&i| board.is_free(i)).collect();
    free.choose(rng).copied()
}

fn random_cell<R: Rng + ?Sized>(board: &Board, rng: &mut R) -> Result<usize, MatchError> {
    let free: Vec<usize> = board.free_cells().collect();
    free.choose(rng).copied().ok_or(MatchError::NoAvailableMoves)
}
