//! Storage interfaces for players and matches, plus an in-memory backend.
//!
//! Backends are narrow CRUD surfaces. The orchestrator owns every rule;
//! a backend only has to answer "which open public match was created
//! last".

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use tactix_protocol::{MatchId, MatchKind, MatchStatus, PlayerId};
use tokio::sync::RwLock;

use crate::{Match, Player, StorageError};

/// Persistence for [`Player`] records.
pub trait PlayerStore: Send + Sync + 'static {
    fn get_player(
        &self,
        id: &PlayerId,
    ) -> impl Future<Output = Result<Option<Player>, StorageError>> + Send;

    /// Inserts or replaces the record with `player.id`.
    fn save_player(&self, player: &Player) -> impl Future<Output = Result<(), StorageError>> + Send;

    fn delete_player(&self, id: &PlayerId)
    -> impl Future<Output = Result<(), StorageError>> + Send;
}

/// Persistence for [`Match`] records.
pub trait MatchStore: Send + Sync + 'static {
    fn get_match(
        &self,
        id: &MatchId,
    ) -> impl Future<Output = Result<Option<Match>, StorageError>> + Send;

    /// Inserts or replaces the record with `m.id`.
    fn save_match(&self, m: &Match) -> impl Future<Output = Result<(), StorageError>> + Send;

    fn delete_match(&self, id: &MatchId) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// The most recently created public match still waiting for a second
    /// player.
    fn latest_open_public(&self)
    -> impl Future<Output = Result<Option<Match>, StorageError>> + Send;
}

/// Everything the orchestrator needs from a backend.
pub trait Store: PlayerStore + MatchStore {}

impl<T: PlayerStore + MatchStore> Store for T {}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// Process-local backend. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    players: RwLock<HashMap<PlayerId, Player>>,
    /// Each match carries its insertion sequence number.
    matches: RwLock<HashMap<MatchId, (u64, Match)>>,
    next_seq: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn player_count(&self) -> usize {
        self.players.read().await.len()
    }

    pub async fn match_count(&self) -> usize {
        self.matches.read().await.len()
    }
}

impl PlayerStore for MemoryStore {
    async fn get_player(&self, id: &PlayerId) -> Result<Option<Player>, StorageError> {
        Ok(self.players.read().await.get(id).cloned())
    }

    async fn save_player(&self, player: &Player) -> Result<(), StorageError> {
        self.players
            .write()
            .await
            .insert(player.id.clone(), player.clone());
        Ok(())
    }

    async fn delete_player(&self, id: &PlayerId) -> Result<(), StorageError> {
        self.players.write().await.remove(id);
        Ok(())
    }
}

impl MatchStore for MemoryStore {
    async fn get_match(&self, id: &MatchId) -> Result<Option<Match>, StorageError> {
        Ok(self.matches.read().await.get(id).map(|(_, m)| m.clone()))
    }

    async fn save_match(&self, m: &Match) -> Result<(), StorageError> {
        let mut matches = self.matches.write().await;
        match matches.get_mut(&m.id) {
            Some((_, stored)) => *stored = m.clone(),
            None => {
                let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
                matches.insert(m.id.clone(), (seq, m.clone()));
            }
        }
        Ok(())
    }

    async fn delete_match(&self, id: &MatchId) -> Result<(), StorageError> {
        self.matches.write().await.remove(id);
        Ok(())
    }

    async fn latest_open_public(&self) -> Result<Option<Match>, StorageError> {
        Ok(self
            .matches
            .read()
            .await
            .values()
            .filter(|(_, m)| {
                m.kind == MatchKind::Public && m.status == MatchStatus::Waiting && !m.is_full()
            })
            .max_by_key(|(seq, _)| *seq)
            .map(|(_, m)| m.clone()))
    }
}

#[cfg(test)]
mod tests {
    use tactix_protocol::Mark;

    use super::*;

    fn public_match(id: &str, host: &str) -> Match {
        let mut m = Match::new(MatchId::new(id), MatchKind::Public, None);
        m.add_seat(PlayerId::new(host), Mark::X).unwrap();
        m
    }

    #[tokio::test]
    async fn test_save_and_get_player() {
        let store = MemoryStore::new();
        let player = Player::new(PlayerId::new("p"));
        store.save_player(&player).await.unwrap();
        assert_eq!(store.get_player(&player.id).await.unwrap(), Some(player));
        assert_eq!(store.get_player(&PlayerId::new("q")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete_match_removes_record() {
        let store = MemoryStore::new();
        let m = public_match("M1", "a");
        store.save_match(&m).await.unwrap();
        store.delete_match(&m.id).await.unwrap();
        assert_eq!(store.get_match(&m.id).await.unwrap(), None);
        assert_eq!(store.match_count().await, 0);
    }

    #[tokio::test]
    async fn test_latest_open_public_picks_most_recent_waiting() {
        let store = MemoryStore::new();
        store.save_match(&public_match("M1", "a")).await.unwrap();
        store.save_match(&public_match("M2", "b")).await.unwrap();

        let mut private = Match::new(MatchId::new("M3"), MatchKind::Private, None);
        private.add_seat(PlayerId::new("c"), Mark::X).unwrap();
        store.save_match(&private).await.unwrap();

        let open = store.latest_open_public().await.unwrap().unwrap();
        assert_eq!(open.id, MatchId::new("M2"));
    }

    #[tokio::test]
    async fn test_latest_open_public_skips_full_matches() {
        let store = MemoryStore::new();
        store.save_match(&public_match("M1", "a")).await.unwrap();
        let mut full = public_match("M2", "b");
        full.add_seat(PlayerId::new("c"), Mark::O).unwrap();
        store.save_match(&full).await.unwrap();

        let open = store.latest_open_public().await.unwrap().unwrap();
        assert_eq!(open.id, MatchId::new("M1"));
    }

    #[tokio::test]
    async fn test_resave_keeps_creation_order() {
        let store = MemoryStore::new();
        let first = public_match("M1", "a");
        store.save_match(&first).await.unwrap();
        store.save_match(&public_match("M2", "b")).await.unwrap();
        store.save_match(&first).await.unwrap();

        let open = store.latest_open_public().await.unwrap().unwrap();
        assert_eq!(open.id, MatchId::new("M2"));
    }

    #[tokio::test]
    async fn test_latest_open_public_empty_store_is_none() {
        assert!(MemoryStore::new().latest_open_public().await.unwrap().is_none());
    }
}
