//! Disconnect monitor: forfeits matches of players who stayed away too
//! long, and drops expired rematch offers.

use std::sync::Arc;

use tactix_match::Store;
use tactix_protocol::{Action, PlayerId, ResponsePayload, StatusView};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::server::ServerState;

/// Sweeps every `monitor_interval` until `shutdown` fires.
pub(crate) async fn run<S: Store>(state: Arc<ServerState<S>>, shutdown: CancellationToken) {
    let mut ticker = tokio::time::interval(state.config.session.monitor_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tracing::debug!(
        interval = ?state.config.session.monitor_interval,
        timeout = ?state.disconnects.timeout(),
        "disconnect monitor started"
    );

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => sweep(&state).await,
        }
    }
    tracing::debug!("disconnect monitor stopped");
}

/// One pass. Expired entries are taken out of the table under its lock;
/// the forfeits run after it is released, once per entry.
pub(crate) async fn sweep<S: Store>(state: &ServerState<S>) {
    for player_id in state.disconnects.take_expired().await {
        forfeit(state, &player_id).await;
    }
    let purged = state.rematches.purge_expired().await;
    if purged > 0 {
        tracing::debug!(purged, "expired rematch offers dropped");
    }
}

/// Ends the absent player's match and tells the others they won by default.
async fn forfeit<S: Store>(state: &ServerState<S>, player_id: &PlayerId) {
    let m = match state.orchestrator.match_for_player(player_id).await {
        Ok(Some(m)) => m,
        Ok(None) => {
            tracing::debug!(%player_id, "disconnect expired with no game to forfeit");
            return;
        }
        Err(e) => {
            tracing::warn!(%player_id, error = %e, "failed to look up game for forfeit");
            return;
        }
    };

    let m = match state.orchestrator.end_match(&m.id).await {
        Ok(m) => m,
        Err(e) => {
            tracing::warn!(%player_id, match_id = %m.id, error = %e, "failed to forfeit game");
            return;
        }
    };
    tracing::info!(%player_id, match_id = %m.id, "game forfeited after disconnect");

    let game = m.view_as(StatusView::OpponentOut);
    for other in m.human_ids().filter(|id| *id != player_id) {
        let payload = ResponsePayload::default().with_game(game.clone());
        state.deliver(other, Action::Leave, payload).await;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tactix_match::{MatchStore, MemoryStore};
    use tactix_protocol::{Codec, MatchKind, Response};
    use tactix_session::SessionHandle;
    use tactix_transport::ConnectionId;
    use tokio::sync::mpsc;

    use super::*;
    use crate::ServerConfig;

    fn state() -> ServerState<MemoryStore> {
        let mut config = ServerConfig {
            rng_seed: Some(9),
            ..ServerConfig::default()
        };
        config.session.disconnect_timeout = Duration::from_secs(10);
        ServerState::new(MemoryStore::new(), config)
    }

    async fn connect(
        state: &ServerState<MemoryStore>,
        player_id: &PlayerId,
        conn: u64,
    ) -> mpsc::UnboundedReceiver<Vec<u8>> {
        let (tx, rx) = mpsc::unbounded_channel();
        state
            .identify(&SessionHandle::new(ConnectionId::new(conn), tx), player_id)
            .await;
        rx
    }

    // =====================================================================
    // sweep()
    // =====================================================================

    #[tokio::test(start_paused = true)]
    async fn test_sweep_forfeits_once_and_notifies_opponent() {
        let state = state();
        let host = state.orchestrator.get_or_create_player(None).await.unwrap().id;
        let guest = state.orchestrator.get_or_create_player(None).await.unwrap().id;
        let m = state
            .orchestrator
            .get_or_create_match(&host, MatchKind::Private, None)
            .await
            .unwrap();
        state.orchestrator.join_match_by_id(&m.id, &guest).await.unwrap();
        let mut guest_rx = connect(&state, &guest, 2).await;

        state.disconnects.mark_disconnected(host.clone()).await;
        tokio::time::advance(Duration::from_secs(11)).await;

        sweep(&state).await;
        sweep(&state).await;

        let bytes = guest_rx.try_recv().unwrap();
        let response: Response = state.codec.decode(&bytes).unwrap();
        assert_eq!(response.action, "game:leave");
        let game = response.payload.game.unwrap();
        assert_eq!(game.status, StatusView::OpponentOut);
        assert!(response.payload.player.is_none());
        assert!(guest_rx.try_recv().is_err(), "forfeit must be sent once");

        assert!(state.orchestrator.store().get_match(&m.id).await.unwrap().is_none());
        assert!(!state.disconnects.contains(&host).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_before_timeout_keeps_match() {
        let state = state();
        let host = state.orchestrator.get_or_create_player(None).await.unwrap().id;
        let m = state
            .orchestrator
            .get_or_create_match(&host, MatchKind::Private, None)
            .await
            .unwrap();

        state.disconnects.mark_disconnected(host.clone()).await;
        tokio::time::advance(Duration::from_secs(5)).await;
        sweep(&state).await;

        assert!(state.orchestrator.store().get_match(&m.id).await.unwrap().is_some());
        assert!(state.disconnects.contains(&host).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_before_timeout_cancels_forfeit() {
        let state = state();
        let host = state.orchestrator.get_or_create_player(None).await.unwrap().id;
        let m = state
            .orchestrator
            .get_or_create_match(&host, MatchKind::Private, None)
            .await
            .unwrap();

        state.disconnects.mark_disconnected(host.clone()).await;
        tokio::time::advance(Duration::from_secs(5)).await;
        let _rx = connect(&state, &host, 3).await;
        tokio::time::advance(Duration::from_secs(10)).await;
        sweep(&state).await;

        assert!(state.orchestrator.store().get_match(&m.id).await.unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_unseated_player_is_quiet() {
        let state = state();
        let loner = state.orchestrator.get_or_create_player(None).await.unwrap().id;
        state.disconnects.mark_disconnected(loner.clone()).await;
        tokio::time::advance(Duration::from_secs(30)).await;

        sweep(&state).await;
        assert!(state.disconnects.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_on_cancel() {
        let state = Arc::new(state());
        let token = CancellationToken::new();
        let task = tokio::spawn(run(Arc::clone(&state), token.clone()));

        tokio::time::advance(Duration::from_secs(2)).await;
        token.cancel();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("monitor should stop")
            .unwrap();
    }
}
