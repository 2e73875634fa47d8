//! Pending rematch offers between former opponents.
//!
//! A rematch needs both players to say "yes". The first "yes" parks an
//! offer under the pair's key; the other player's "yes" before the offer
//! expires consumes it. Every decision happens under one lock, and only the
//! caller that removes the offer is told [`RematchDecision::Confirmed`], so
//! at most one new match is created per pair no matter how the two answers
//! race.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use tactix_protocol::PlayerId;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Order-independent key for a pair of players.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RematchKey(PlayerId, PlayerId);

impl RematchKey {
    pub fn new(a: &PlayerId, b: &PlayerId) -> Self {
        if a <= b {
            Self(a.clone(), b.clone())
        } else {
            Self(b.clone(), a.clone())
        }
    }
}

impl fmt::Display for RematchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.0, self.1)
    }
}

#[derive(Debug, Clone)]
struct PendingRematch {
    requested_by: PlayerId,
    expires_at: Instant,
}

/// Result of a "yes".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RematchDecision {
    /// No live offer existed; one now waits for the opponent.
    Requested,
    /// This player already has a live offer out; nothing changed.
    AlreadyRequested,
    /// The opponent had asked first. The offer is consumed and the caller
    /// must create the match.
    Confirmed,
}

/// Rematch offers keyed by [`RematchKey`].
#[derive(Debug)]
pub struct RematchBook {
    pending: Mutex<HashMap<RematchKey, PendingRematch>>,
    ttl: Duration,
}

impl RematchBook {
    pub fn new(ttl: Duration) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Records `player`'s "yes" to a rematch against `opponent`.
    pub async fn accept(&self, player: &PlayerId, opponent: &PlayerId) -> RematchDecision {
        let key = RematchKey::new(player, opponent);
        let now = Instant::now();
        let mut pending = self.pending.lock().await;

        match pending.get(&key) {
            Some(offer) if offer.expires_at > now => {
                if &offer.requested_by == player {
                    return RematchDecision::AlreadyRequested;
                }
                pending.remove(&key);
                tracing::info!(%key, "rematch confirmed");
                RematchDecision::Confirmed
            }
            _ => {
                pending.insert(
                    key.clone(),
                    PendingRematch {
                        requested_by: player.clone(),
                        expires_at: now + self.ttl,
                    },
                );
                tracing::info!(%key, requested_by = %player, "rematch requested");
                RematchDecision::Requested
            }
        }
    }

    /// Records a "no". Returns `true` if a pending offer was withdrawn.
    pub async fn decline(&self, player: &PlayerId, opponent: &PlayerId) -> bool {
        let key = RematchKey::new(player, opponent);
        let removed = self.pending.lock().await.remove(&key).is_some();
        tracing::info!(%key, declined_by = %player, removed, "rematch declined");
        removed
    }

    /// Drops offers whose TTL has passed. Returns how many were dropped.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut pending = self.pending.lock().await;
        let before = pending.len();
        pending.retain(|_, offer| offer.expires_at > now);
        before - pending.len()
    }

    /// Is there a live offer between `a` and `b`?
    pub async fn is_pending(&self, a: &PlayerId, b: &PlayerId) -> bool {
        let key = RematchKey::new(a, b);
        self.pending
            .lock()
            .await
            .get(&key)
            .is_some_and(|offer| offer.expires_at > Instant::now())
    }

    pub async fn len(&self) -> usize {
        self.pending.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn pid(id: &str) -> PlayerId {
        PlayerId::new(id)
    }

    fn book() -> RematchBook {
        RematchBook::new(Duration::from_secs(30))
    }

    // =====================================================================
    // RematchKey
    // =====================================================================

    #[test]
    fn test_rematch_key_is_order_independent() {
        assert_eq!(
            RematchKey::new(&pid("b"), &pid("a")),
            RematchKey::new(&pid("a"), &pid("b"))
        );
        assert_eq!(RematchKey::new(&pid("b"), &pid("a")).to_string(), "a|b");
    }

    // =====================================================================
    // accept()
    // =====================================================================

    #[tokio::test]
    async fn test_accept_first_yes_is_requested() {
        let b = book();
        assert_eq!(b.accept(&pid("a"), &pid("b")).await, RematchDecision::Requested);
        assert!(b.is_pending(&pid("b"), &pid("a")).await);
    }

    #[tokio::test]
    async fn test_accept_second_yes_from_opponent_confirms_and_consumes() {
        let b = book();
        b.accept(&pid("a"), &pid("b")).await;
        assert_eq!(b.accept(&pid("b"), &pid("a")).await, RematchDecision::Confirmed);
        assert_eq!(b.len().await, 0);
    }

    #[tokio::test]
    async fn test_accept_repeated_yes_from_same_player_does_not_confirm() {
        let b = book();
        b.accept(&pid("a"), &pid("b")).await;
        assert_eq!(
            b.accept(&pid("a"), &pid("b")).await,
            RematchDecision::AlreadyRequested
        );
        assert!(b.is_pending(&pid("a"), &pid("b")).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_accept_after_ttl_starts_a_fresh_offer() {
        let b = book();
        b.accept(&pid("a"), &pid("b")).await;
        tokio::time::advance(Duration::from_secs(31)).await;

        assert_eq!(b.accept(&pid("b"), &pid("a")).await, RematchDecision::Requested);
        // The fresh offer belongs to "b" now, so "a" confirms it.
        assert_eq!(b.accept(&pid("a"), &pid("b")).await, RematchDecision::Confirmed);
    }

    #[tokio::test]
    async fn test_accept_concurrent_yes_confirms_exactly_once() {
        for round in 0..50 {
            let b = Arc::new(book());
            let (p, q) = (pid(&format!("p{round}")), pid(&format!("q{round}")));

            let t1 = {
                let (b, p, q) = (Arc::clone(&b), p.clone(), q.clone());
                tokio::spawn(async move { b.accept(&p, &q).await })
            };
            let t2 = {
                let (b, p, q) = (Arc::clone(&b), p.clone(), q.clone());
                tokio::spawn(async move { b.accept(&q, &p).await })
            };
            let results = [t1.await.unwrap(), t2.await.unwrap()];

            let confirmed = results
                .iter()
                .filter(|d| **d == RematchDecision::Confirmed)
                .count();
            assert_eq!(confirmed, 1, "round {round}: {results:?}");
            assert!(results.contains(&RematchDecision::Requested));
        }
    }

    // =====================================================================
    // decline() / purge_expired()
    // =====================================================================

    #[tokio::test]
    async fn test_decline_withdraws_pending_offer() {
        let b = book();
        b.accept(&pid("a"), &pid("b")).await;
        assert!(b.decline(&pid("b"), &pid("a")).await);
        assert_eq!(b.accept(&pid("b"), &pid("a")).await, RematchDecision::Requested);
    }

    #[tokio::test]
    async fn test_decline_without_offer_returns_false() {
        assert!(!book().decline(&pid("a"), &pid("b")).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired_drops_only_stale_offers() {
        let b = book();
        b.accept(&pid("a"), &pid("b")).await;
        tokio::time::advance(Duration::from_secs(20)).await;
        b.accept(&pid("c"), &pid("d")).await;
        tokio::time::advance(Duration::from_secs(15)).await;

        assert_eq!(b.purge_expired().await, 1);
        assert!(b.is_pending(&pid("c"), &pid("d")).await);
        assert!(!b.is_pending(&pid("a"), &pid("b")).await);
    }
}
