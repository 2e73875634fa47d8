//! Match orchestration: players, matchmaking, turns, teardown, rematches.
//!
//! Every read-modify-write of a match runs under that match's lock.
//! Operations that decide a player's seat take the player's lock first,
//! then the match lock, never the other way round.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tactix_protocol::{Difficulty, Mark, MatchId, MatchKind, MatchStatus, PlayerId};
use tokio::sync::Mutex;

use crate::bot;
use crate::locks::KeyedLocks;
use crate::machine::MoveOutcome;
use crate::store::Store;
use crate::{Match, MatchError, Player};

/// How many times matchmaking re-reads the queue after losing a race for
/// an open match before it opens a fresh one.
const MAX_QUEUE_ATTEMPTS: usize = 8;

/// Result of a successfully applied human turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Play continues. In bot matches the bot has already replied.
    Updated(Match),
    /// The match ended and has been torn down.
    Finished(Match),
}

impl TurnOutcome {
    pub fn game(&self) -> &Match {
        match self {
            Self::Updated(m) | Self::Finished(m) => m,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Finished(_))
    }
}

/// Owns the rules that span players and matches.
pub struct Orchestrator<S> {
    store: S,
    rng: Mutex<StdRng>,
    match_locks: KeyedLocks<MatchId>,
    player_locks: KeyedLocks<PlayerId>,
}

impl<S: Store> Orchestrator<S> {
    /// Orchestrator with an OS-seeded generator.
    pub fn new(store: S) -> Self {
        Self::with_rng(store, StdRng::from_os_rng())
    }

    /// Orchestrator with a caller-supplied generator, for reproducible ids,
    /// side draws and bot moves.
    pub fn with_rng(store: S, rng: StdRng) -> Self {
        Self {
            store,
            rng: Mutex::new(rng),
            match_locks: KeyedLocks::new(),
            player_locks: KeyedLocks::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    // -----------------------------------------------------------------------
    // Players
    // -----------------------------------------------------------------------

    /// Loads `id`, or creates a player with a fresh identity when no id is
    /// given.
    ///
    /// # Errors
    /// [`MatchError::PlayerNotFound`] for an id the store does not know.
    pub async fn get_or_create_player(&self, id: Option<&PlayerId>) -> Result<Player, MatchError> {
        if let Some(id) = id {
            return self.player(id).await;
        }
        let id = {
            let mut rng = self.rng.lock().await;
            PlayerId::new(format!("{:032x}", rng.random::<u128>()))
        };
        let player = Player::new(id);
        self.store.save_player(&player).await?;
        tracing::info!(player_id = %player.id, "player created");
        Ok(player)
    }

    pub async fn player(&self, id: &PlayerId) -> Result<Player, MatchError> {
        self.store
            .get_player(id)
            .await?
            .ok_or_else(|| MatchError::PlayerNotFound(id.clone()))
    }

    /// The match the player currently sits in.
    ///
    /// A player record pointing at a match that no longer seats them is
    /// cleared on the way.
    pub async fn match_for_player(&self, id: &PlayerId) -> Result<Option<Match>, MatchError> {
        let _player_guard = self.player_locks.lock(id).await;
        let mut player = self.player(id).await?;
        self.current_match(&mut player).await
    }

    // -----------------------------------------------------------------------
    // Matchmaking
    // -----------------------------------------------------------------------

    /// The player's current match, or a new one of `kind`.
    ///
    /// A new public or private match seats the requester as `X` and waits.
    /// A bot match draws sides at random and is ongoing at once; when the
    /// bot drew `X` it has already opened.
    pub async fn get_or_create_match(
        &self,
        id: &PlayerId,
        kind: MatchKind,
        difficulty: Option<Difficulty>,
    ) -> Result<Match, MatchError> {
        let _player_guard = self.player_locks.lock(id).await;
        let mut player = self.player(id).await?;
        if let Some(current) = self.current_match(&mut player).await? {
            return Ok(current);
        }
        match kind {
            MatchKind::WithBot => self.open_bot_match(&mut player, difficulty).await,
            MatchKind::Public | MatchKind::Private => self.open_match(&mut player, kind).await,
        }
    }

    /// Joins the most recently created open public match as its second
    /// player, or opens a new public match when the queue is empty.
    pub async fn create_or_join_public_match(&self, id: &PlayerId) -> Result<Match, MatchError> {
        let _player_guard = self.player_locks.lock(id).await;
        let mut player = self.player(id).await?;
        if let Some(current) = self.current_match(&mut player).await? {
            return Ok(current);
        }

        for _ in 0..MAX_QUEUE_ATTEMPTS {
            let Some(candidate) = self.store.latest_open_public().await? else {
                break;
            };
            let _match_guard = self.match_locks.lock(&candidate.id).await;
            // Re-read under the lock; another player may have taken the seat.
            let Some(mut m) = self.store.get_match(&candidate.id).await? else {
                continue;
            };
            if m.kind != MatchKind::Public || !m.status.is_joinable() || m.is_full() {
                continue;
            }
            if m.seat_of(&player.id).is_none() {
                let mark = free_mark(&m).ok_or_else(|| MatchError::MatchFull(m.id.clone()))?;
                m.add_seat(player.id.clone(), mark)?;
                self.store.save_match(&m).await?;
            }
            self.seat_player(&mut player, &m).await?;
            tracing::info!(player_id = %player.id, match_id = %m.id, "joined public game");
            return Ok(m);
        }

        self.open_match(&mut player, MatchKind::Public).await
    }

    /// Joins `match_id` (case-insensitive) as its second player.
    ///
    /// Joining a match the player already sits in returns it unchanged.
    ///
    /// # Errors
    /// [`MatchError::AlreadySeated`] when the player sits elsewhere,
    /// [`MatchError::MatchFull`] when both seats are taken.
    pub async fn join_match_by_id(
        &self,
        match_id: &MatchId,
        id: &PlayerId,
    ) -> Result<Match, MatchError> {
        let match_id = MatchId::normalized(match_id.as_str());
        let _player_guard = self.player_locks.lock(id).await;
        let mut player = self.player(id).await?;
        if let Some(current) = self.current_match(&mut player).await? {
            if current.id == match_id {
                return Ok(current);
            }
            return Err(MatchError::AlreadySeated(player.id, current.id));
        }

        let _match_guard = self.match_locks.lock(&match_id).await;
        let mut m = self
            .store
            .get_match(&match_id)
            .await?
            .ok_or_else(|| MatchError::MatchNotFound(match_id.clone()))?;
        if m.seat_of(&player.id).is_none() {
            if m.is_full() {
                return Err(MatchError::MatchFull(m.id));
            }
            if m.status == MatchStatus::Finished {
                return Err(MatchError::AlreadyFinished(m.id));
            }
            let mark = free_mark(&m).ok_or_else(|| MatchError::MatchFull(m.id.clone()))?;
            m.add_seat(player.id.clone(), mark)?;
            self.store.save_match(&m).await?;
        }
        self.seat_player(&mut player, &m).await?;
        tracing::info!(player_id = %player.id, match_id = %m.id, "joined game");
        Ok(m)
    }

    // -----------------------------------------------------------------------
    // Turns
    // -----------------------------------------------------------------------

    /// Applies the player's move to their current match.
    ///
    /// In a bot match the bot answers within the same call. A finished
    /// match is torn down before this returns.
    pub async fn apply_turn(&self, id: &PlayerId, cell: i64) -> Result<TurnOutcome, MatchError> {
        let player = self.player(id).await?;
        let match_id = player
            .match_id
            .clone()
            .ok_or_else(|| MatchError::NotSeated(player.id.clone()))?;

        let _match_guard = self.match_locks.lock(&match_id).await;
        let mut m = self
            .store
            .get_match(&match_id)
            .await?
            .ok_or_else(|| MatchError::MatchNotFound(match_id.clone()))?;
        let mark = m
            .mark_of(&player.id)
            .ok_or_else(|| MatchError::NotSeated(player.id.clone()))?;

        if let Err(e) = m.ensure_playable() {
            if matches!(e, MatchError::AlreadyFinished(_)) {
                self.end_match_locked(&m).await?;
            }
            return Err(e);
        }
        let cell = usize::try_from(cell).map_err(|_| MatchError::InvalidCell(cell))?;

        let mut outcome = m.apply_move(mark, cell)?;
        if let MoveOutcome::Continue { next } = outcome {
            if m.kind == MatchKind::WithBot {
                outcome = self.bot_reply(&mut m, next).await?;
            }
        }

        match outcome {
            MoveOutcome::Finished(result) => {
                self.end_match_locked(&m).await?;
                tracing::info!(match_id = %m.id, %result, "game finished");
                Ok(TurnOutcome::Finished(m))
            }
            MoveOutcome::Continue { .. } => {
                self.store.save_match(&m).await?;
                Ok(TurnOutcome::Updated(m))
            }
        }
    }

    // -----------------------------------------------------------------------
    // Teardown
    // -----------------------------------------------------------------------

    /// Ends `match_id` whatever its state and returns its last snapshot.
    pub async fn end_match(&self, match_id: &MatchId) -> Result<Match, MatchError> {
        let _match_guard = self.match_locks.lock(match_id).await;
        let m = self
            .store
            .get_match(match_id)
            .await?
            .ok_or_else(|| MatchError::MatchNotFound(match_id.clone()))?;
        self.end_match_locked(&m).await?;
        tracing::info!(%match_id, status = ?m.status, "game ended");
        Ok(m)
    }

    /// Ends the player's current match.
    pub async fn leave_match(&self, id: &PlayerId) -> Result<Match, MatchError> {
        let player = self.player(id).await?;
        let match_id = player
            .match_id
            .clone()
            .ok_or_else(|| MatchError::NotSeated(player.id.clone()))?;
        match self.end_match(&match_id).await {
            Err(MatchError::MatchNotFound(_)) => {
                self.match_for_player(id).await?;
                Err(MatchError::NotSeated(player.id))
            }
            other => other,
        }
    }

    /// Records opponents, frees the seated players, deletes the match and
    /// its bot.
    ///
    /// Callers hold the match lock.
    async fn end_match_locked(&self, m: &Match) -> Result<(), MatchError> {
        let paired = m.seats.len() == Match::MAX_SEATS;
        for seat in &m.seats {
            if seat.player_id.is_bot() {
                self.store.delete_player(&seat.player_id).await?;
                continue;
            }
            let Some(mut player) = self.store.get_player(&seat.player_id).await? else {
                tracing::warn!(player_id = %seat.player_id, match_id = %m.id, "seated player missing");
                continue;
            };
            if paired {
                player.last_opponent = m.opponent_of(&seat.player_id).cloned();
            }
            if player.match_id.as_ref() == Some(&m.id) {
                player.unseat();
            }
            self.store.save_player(&player).await?;
        }
        self.store.delete_match(&m.id).await?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Rematch
    // -----------------------------------------------------------------------

    /// Opens the rematch both players agreed to.
    ///
    /// Against a bot this is a fresh easy bot match for the requester.
    /// Otherwise a private match starts at once with the requester as `X`.
    pub async fn create_rematch(
        &self,
        id: &PlayerId,
        opponent: &PlayerId,
    ) -> Result<Match, MatchError> {
        if opponent.is_bot() {
            return self
                .get_or_create_match(id, MatchKind::WithBot, Some(Difficulty::Easy))
                .await;
        }

        let (first, second) = if id <= opponent {
            (id, opponent)
        } else {
            (opponent, id)
        };
        let _first_guard = self.player_locks.lock(first).await;
        let _second_guard = self.player_locks.lock(second).await;

        let mut requester = self.player(id).await?;
        let mut other = self.player(opponent).await?;
        for p in [&mut requester, &mut other] {
            if let Some(current) = self.current_match(p).await? {
                return Err(MatchError::AlreadySeated(p.id.clone(), current.id));
            }
        }

        let match_id = self.new_match_id().await?;
        let mut m = Match::new(match_id, MatchKind::Private, None);
        m.add_seat(requester.id.clone(), Mark::X)?;
        m.add_seat(other.id.clone(), Mark::O)?;
        self.store.save_match(&m).await?;
        self.seat_player(&mut requester, &m).await?;
        self.seat_player(&mut other, &m).await?;
        tracing::info!(match_id = %m.id, x = %requester.id, o = %other.id, "rematch started");
        Ok(m)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Callers hold the player lock.
    async fn current_match(&self, player: &mut Player) -> Result<Option<Match>, MatchError> {
        let Some(match_id) = player.match_id.clone() else {
            return Ok(None);
        };
        if let Some(m) = self.store.get_match(&match_id).await? {
            if m.seat_of(&player.id).is_some() {
                return Ok(Some(m));
            }
        }
        tracing::debug!(player_id = %player.id, %match_id, "clearing stale game reference");
        player.unseat();
        self.store.save_player(player).await?;
        Ok(None)
    }

    async fn seat_player(&self, player: &mut Player, m: &Match) -> Result<(), MatchError> {
        let mark = m
            .mark_of(&player.id)
            .ok_or_else(|| MatchError::NotSeated(player.id.clone()))?;
        player.seat(&m.id, mark);
        self.store.save_player(player).await?;
        Ok(())
    }

    async fn open_match(&self, player: &mut Player, kind: MatchKind) -> Result<Match, MatchError> {
        let match_id = self.new_match_id().await?;
        let mut m = Match::new(match_id, kind, None);
        m.add_seat(player.id.clone(), Mark::X)?;
        self.store.save_match(&m).await?;
        self.seat_player(player, &m).await?;
        tracing::info!(player_id = %player.id, match_id = %m.id, %kind, "game created");
        Ok(m)
    }

    async fn open_bot_match(
        &self,
        player: &mut Player,
        difficulty: Option<Difficulty>,
    ) -> Result<Match, MatchError> {
        let match_id = self.new_match_id().await?;
        let human_mark = if self.rng.lock().await.random_bool(0.5) {
            Mark::X
        } else {
            Mark::O
        };

        let mut m = Match::new(match_id, MatchKind::WithBot, difficulty);
        let bot = Player::bot(&m.id, human_mark.opponent());
        let _match_guard = self.match_locks.lock(&m.id).await;
        m.add_seat(player.id.clone(), human_mark)?;
        m.add_seat(bot.id.clone(), human_mark.opponent())?;
        if m.turn == Some(human_mark.opponent()) {
            // The bot cannot finish a match in one opening move.
            self.bot_reply(&mut m, human_mark.opponent()).await?;
        }

        self.store.save_player(&bot).await?;
        self.store.save_match(&m).await?;
        self.seat_player(player, &m).await?;
        tracing::info!(
            player_id = %player.id,
            match_id = %m.id,
            difficulty = ?m.difficulty,
            human = %human_mark,
            "bot game created"
        );
        Ok(m)
    }

    /// Plays the bot's move when it is the bot's turn.
    async fn bot_reply(&self, m: &mut Match, next: Mark) -> Result<MoveOutcome, MatchError> {
        let bot_mark = m
            .bot_seat()
            .map(|s| s.mark)
            .ok_or_else(|| MatchError::BotNotSeated(m.id.clone()))?;
        if bot_mark != next {
            return Ok(MoveOutcome::Continue { next });
        }
        let difficulty = m.difficulty.unwrap_or_default();
        let cell = {
            let mut rng = self.rng.lock().await;
            bot::choose_move(&m.board, bot_mark, difficulty, &mut *rng)?
        };
        tracing::debug!(match_id = %m.id, cell, ?difficulty, "bot moved");
        m.apply_move(bot_mark, cell)
    }

    async fn new_match_id(&self) -> Result<MatchId, MatchError> {
        loop {
            let candidate: String = {
                let mut rng = self.rng.lock().await;
                (0..MatchId::LEN)
                    .map(|_| char::from(MatchId::ALPHABET[rng.random_range(0..MatchId::ALPHABET.len())]))
                    .collect()
            };
            let id = MatchId::new(candidate);
            if self.store.get_match(&id).await?.is_none() {
                return Ok(id);
            }
        }
    }
}

/// The mark a newcomer takes: `X` at an empty board, the opposite of the
/// seated player otherwise.
fn free_mark(m: &Match) -> Option<Mark> {
    match m.seats.as_slice() {
        [] => Some(Mark::X),
        [seat] => Some(seat.mark.opponent()),
        _ => None,
    }
}
