//! Tracks players whose connection dropped while they may still be seated.
//!
//! ```text
//!   connection ends ──► mark_disconnected() ──► [Disconnected since T]
//!                                                   │          │
//!                          any message from the id  │          │ T + timeout passes
//!                                                   ▼          ▼
//!                                      mark_reconnected()   take_expired()
//! ```
//!
//! Entries leave the table exactly once: either the player comes back or
//! the monitor takes them. [`DisconnectTracker::take_expired`] removes the
//! entries it returns under the table lock, so two monitor passes can never
//! both see the same expiry.

use std::collections::HashMap;
use std::time::Duration;

use tactix_protocol::PlayerId;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Player id → instant the disconnect was detected.
#[derive(Debug)]
pub struct DisconnectTracker {
    since: Mutex<HashMap<PlayerId, Instant>>,
    timeout: Duration,
}

impl DisconnectTracker {
    pub fn new(timeout: Duration) -> Self {
        Self {
            since: Mutex::new(HashMap::new()),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Starts the timeout for `player_id`. A player already in the table
    /// keeps their original instant.
    pub async fn mark_disconnected(&self, player_id: PlayerId) {
        let mut since = self.since.lock().await;
        if !since.contains_key(&player_id) {
            tracing::info!(%player_id, timeout = ?self.timeout, "player disconnected, forfeit timer started");
            since.insert(player_id, Instant::now());
        }
    }

    /// Clears `player_id` from the table. Returns `true` if they were in it.
    pub async fn mark_reconnected(&self, player_id: &PlayerId) -> bool {
        let removed = self.since.lock().await.remove(player_id).is_some();
        if removed {
            tracing::info!(%player_id, "player reconnected before forfeit");
        }
        removed
    }

    /// Removes and returns every player disconnected for at least the
    /// timeout.
    pub async fn take_expired(&self) -> Vec<PlayerId> {
        self.take_expired_at(Instant::now()).await
    }

    /// [`take_expired`](Self::take_expired) against an explicit clock.
    pub async fn take_expired_at(&self, now: Instant) -> Vec<PlayerId> {
        let mut expired = Vec::new();
        self.since.lock().await.retain(|player_id, since| {
            if now.saturating_duration_since(*since) >= self.timeout {
                expired.push(player_id.clone());
                false
            } else {
                true
            }
        });
        expired
    }

    pub async fn contains(&self, player_id: &PlayerId) -> bool {
        self.since.lock().await.contains_key(player_id)
    }

    pub async fn len(&self) -> usize {
        self.since.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.since.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    //! Time is paused in these tests, so `tokio::time::advance` moves the
    //! clock deterministically instead of sleeping.

    use super::*;

    fn pid(id: &str) -> PlayerId {
        PlayerId::new(id)
    }

    fn tracker() -> DisconnectTracker {
        DisconnectTracker::new(Duration::from_secs(10))
    }

    #[tokio::test(start_paused = true)]
    async fn test_take_expired_before_timeout_returns_nothing() {
        let t = tracker();
        t.mark_disconnected(pid("alice")).await;
        tokio::time::advance(Duration::from_secs(9)).await;

        assert!(t.take_expired().await.is_empty());
        assert!(t.contains(&pid("alice")).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_take_expired_after_timeout_removes_entry_once() {
        let t = tracker();
        t.mark_disconnected(pid("alice")).await;
        tokio::time::advance(Duration::from_secs(10)).await;

        assert_eq!(t.take_expired().await, vec![pid("alice")]);
        assert!(t.take_expired().await.is_empty());
        assert!(t.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mark_reconnected_cancels_forfeit() {
        let t = tracker();
        t.mark_disconnected(pid("alice")).await;
        tokio::time::advance(Duration::from_secs(5)).await;

        assert!(t.mark_reconnected(&pid("alice")).await);
        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(t.take_expired().await.is_empty());
    }

    #[tokio::test]
    async fn test_mark_reconnected_unknown_player_returns_false() {
        assert!(!tracker().mark_reconnected(&pid("nobody")).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mark_disconnected_twice_keeps_first_instant() {
        let t = tracker();
        t.mark_disconnected(pid("alice")).await;
        tokio::time::advance(Duration::from_secs(6)).await;
        t.mark_disconnected(pid("alice")).await;
        tokio::time::advance(Duration::from_secs(4)).await;

        assert_eq!(t.take_expired().await, vec![pid("alice")]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_take_expired_only_returns_stale_entries() {
        let t = tracker();
        t.mark_disconnected(pid("early")).await;
        tokio::time::advance(Duration::from_secs(8)).await;
        t.mark_disconnected(pid("late")).await;
        tokio::time::advance(Duration::from_secs(2)).await;

        assert_eq!(t.take_expired().await, vec![pid("early")]);
        assert_eq!(t.len().await, 1);
    }

    #[tokio::test]
    async fn test_zero_timeout_expires_immediately() {
        let t = DisconnectTracker::new(Duration::ZERO);
        t.mark_disconnected(pid("alice")).await;
        assert_eq!(t.take_expired().await, vec![pid("alice")]);
    }
}
