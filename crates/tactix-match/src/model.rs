//! Player and match records as they are stored.

use tactix_protocol::{
    Board, Difficulty, GameView, Mark, MatchId, MatchKind, MatchStatus, Outcome, PlayerId,
    PlayerView, StatusView,
};

use crate::MatchError;

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

/// A human or bot participant.
///
/// `mark` and `match_id` are set together while the player is seated and
/// cleared together when the match ends. `last_opponent` survives that
/// clear so the pair can ask for a rematch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub id: PlayerId,
    pub mark: Option<Mark>,
    pub match_id: Option<MatchId>,
    pub last_opponent: Option<PlayerId>,
}

impl Player {
    pub fn new(id: PlayerId) -> Self {
        Self {
            id,
            mark: None,
            match_id: None,
            last_opponent: None,
        }
    }

    /// The bot that sits in `match_id` with `mark`.
    pub fn bot(match_id: &MatchId, mark: Mark) -> Self {
        let mut bot = Self::new(PlayerId::bot_for(match_id));
        bot.seat(match_id, mark);
        bot
    }

    pub fn is_bot(&self) -> bool {
        self.id.is_bot()
    }

    pub fn is_seated(&self) -> bool {
        self.match_id.is_some()
    }

    pub(crate) fn seat(&mut self, match_id: &MatchId, mark: Mark) {
        self.match_id = Some(match_id.clone());
        self.mark = Some(mark);
    }

    pub(crate) fn unseat(&mut self) {
        self.match_id = None;
        self.mark = None;
    }

    /// What the player is shown about themselves.
    pub fn view(&self) -> PlayerView {
        PlayerView {
            id: self.id.clone(),
            mark: self.mark,
            game_id: self.match_id.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Match
// ---------------------------------------------------------------------------

/// One seat at the board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seat {
    pub player_id: PlayerId,
    pub mark: Mark,
}

/// A single game of tic-tac-toe.
///
/// Invariants kept by the methods here and in [`crate::machine`]:
/// at most two seats; `turn` is `None` exactly when `status` is
/// `Finished`; `winner` is only set on a finished match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    pub id: MatchId,
    pub board: Board,
    pub winner: Option<Outcome>,
    pub status: MatchStatus,
    pub turn: Option<Mark>,
    pub seats: Vec<Seat>,
    pub kind: MatchKind,
    /// Only set for [`MatchKind::WithBot`].
    pub difficulty: Option<Difficulty>,
}

impl Match {
    pub const MAX_SEATS: usize = 2;

    /// An empty board waiting for players, `X` to move.
    pub fn new(id: MatchId, kind: MatchKind, difficulty: Option<Difficulty>) -> Self {
        let difficulty = match kind {
            MatchKind::WithBot => Some(difficulty.unwrap_or_default()),
            MatchKind::Public | MatchKind::Private => None,
        };
        Self {
            id,
            board: Board::new(),
            winner: None,
            status: MatchStatus::Waiting,
            turn: Some(Mark::X),
            seats: Vec::with_capacity(Self::MAX_SEATS),
            kind,
            difficulty,
        }
    }

    pub fn is_full(&self) -> bool {
        self.seats.len() >= Self::MAX_SEATS
    }

    pub fn seat_of(&self, player_id: &PlayerId) -> Option<&Seat> {
        self.seats.iter().find(|s| &s.player_id == player_id)
    }

    pub fn mark_of(&self, player_id: &PlayerId) -> Option<Mark> {
        self.seat_of(player_id).map(|s| s.mark)
    }

    /// The other seated player, if any.
    pub fn opponent_of(&self, player_id: &PlayerId) -> Option<&PlayerId> {
        if self.seat_of(player_id).is_none() {
            return None;
        }
        self.seats
            .iter()
            .map(|s| &s.player_id)
            .find(|id| *id != player_id)
    }

    pub fn bot_seat(&self) -> Option<&Seat> {
        self.seats.iter().find(|s| s.player_id.is_bot())
    }

    /// Seated players that are not bots.
    pub fn human_ids(&self) -> impl Iterator<Item = &PlayerId> {
        self.seats
            .iter()
            .map(|s| &s.player_id)
            .filter(|id| !id.is_bot())
    }

    /// Takes a seat. Filling the second seat starts the match.
    pub fn add_seat(&mut self, player_id: PlayerId, mark: Mark) -> Result<(), MatchError> {
        if self.is_full() {
            return Err(MatchError::MatchFull(self.id.clone()));
        }
        if self.seats.iter().any(|s| s.mark == mark) {
            return Err(MatchError::UnknownState(format!(
                "mark {mark} already taken in game {}",
                self.id
            )));
        }
        self.seats.push(Seat { player_id, mark });
        if self.is_full() && self.status.can_transition_to(MatchStatus::Ongoing) {
            self.status = MatchStatus::Ongoing;
        }
        Ok(())
    }

    /// Client view with the lifecycle status.
    pub fn view(&self) -> GameView {
        self.view_as(self.status.into())
    }

    /// Client view with an explicit status, used for early endings.
    pub fn view_as(&self, status: StatusView) -> GameView {
        GameView {
            id: self.id.clone(),
            board: self.board,
            winner: self.winner,
            status,
            turn: self.turn,
            kind: self.kind,
        }
    }
}
