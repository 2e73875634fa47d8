//! Action routing and the game handlers.
//!
//! Every request gets an answer on its own action name. Rejections carry
//! a human-readable `error` and leave the connection open.

use tactix_match::{Match, Store, TurnOutcome};
use tactix_protocol::{
    Action, Codec, Envelope, MatchKind, MatchStatus, PlayerId, PlayerView, ProtocolError,
    RequestPayload, ResponsePayload, StatusView,
};
use tactix_session::SessionHandle;

use crate::TactixError;
use crate::rematch;
use crate::server::ServerState;

/// Decodes one inbound message and runs its handler.
pub(crate) async fn dispatch<S: Store>(state: &ServerState<S>, session: &SessionHandle, data: &[u8]) {
    let conn_id = session.connection_id();
    let envelope: Envelope = match state.codec.decode(data) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::debug!(%conn_id, error = %e, "failed to decode envelope");
            return;
        }
    };

    let action: Action = match envelope.action.parse() {
        Ok(action) => action,
        Err(e) => {
            let e = TactixError::from(e);
            tracing::debug!(%conn_id, action = %envelope.action, "unknown action");
            send_raw_error(state, session, &envelope.action, &e);
            return;
        }
    };

    let result = match decode_request(state, envelope.payload) {
        Ok(request) => handle(state, session, action, request).await,
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        tracing::debug!(%conn_id, %action, error = %e, "request rejected");
        if let Err(e) = state.reply(session, action, ResponsePayload::error(e.client_message())) {
            tracing::debug!(%conn_id, %action, error = %e, "failed to send error response");
        }
    }
}

fn decode_request<S>(
    state: &ServerState<S>,
    payload: serde_json::Value,
) -> Result<RequestPayload, TactixError> {
    if payload.is_null() {
        return Ok(RequestPayload::default());
    }
    Ok(state.codec.decode_value(payload)?)
}

async fn handle<S: Store>(
    state: &ServerState<S>,
    session: &SessionHandle,
    action: Action,
    request: RequestPayload,
) -> Result<(), TactixError> {
    match action {
        Action::Connect => connect(state, session, &request).await,
        Action::NewGame => new_game(state, session, &request).await,
        Action::JoinGame => join_game(state, session, &request).await,
        Action::Turn => turn(state, session, &request).await,
        Action::Leave => leave(state, session, &request).await,
        Action::Rematch => rematch::answer(state, session, &request).await,
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Identifies the connection, creating a player when no id is given.
async fn connect<S: Store>(
    state: &ServerState<S>,
    session: &SessionHandle,
    request: &RequestPayload,
) -> Result<(), TactixError> {
    let player_ref = request
        .player
        .as_ref()
        .ok_or(ProtocolError::MissingField("Player"))?;
    let requested = player_ref.id.as_ref().filter(|id| !id.is_empty());

    let player = state.orchestrator.get_or_create_player(requested).await?;
    state.identify(session, &player.id).await;

    let game = state.orchestrator.match_for_player(&player.id).await?;
    // Re-read: looking up the match may have cleared a stale seat.
    let player = state.orchestrator.player(&player.id).await?;

    let mut payload = ResponsePayload::default().with_player(player.view());
    if let Some(game) = game {
        payload = payload.with_game(game.view());
    }
    tracing::info!(player_id = %player.id, created = requested.is_none(), "player connected");
    state.reply(session, Action::Connect, payload)
}

async fn new_game<S: Store>(
    state: &ServerState<S>,
    session: &SessionHandle,
    request: &RequestPayload,
) -> Result<(), TactixError> {
    let player_id = identified(state, session, request).await?;
    let game = request
        .game
        .as_ref()
        .ok_or(ProtocolError::MissingField("Game"))?;
    let kind = game.kind.ok_or(ProtocolError::MissingField("Game type"))?;

    let m = match kind {
        MatchKind::Public => state.orchestrator.create_or_join_public_match(player_id).await?,
        MatchKind::Private | MatchKind::WithBot => {
            state
                .orchestrator
                .get_or_create_match(player_id, kind, game.difficulty)
                .await?
        }
    };
    tracing::info!(%player_id, match_id = %m.id, %kind, "game:new");
    broadcast_game(state, Action::NewGame, &m, None).await;
    Ok(())
}

async fn join_game<S: Store>(
    state: &ServerState<S>,
    session: &SessionHandle,
    request: &RequestPayload,
) -> Result<(), TactixError> {
    let player_id = identified(state, session, request).await?;
    let game = request
        .game
        .as_ref()
        .ok_or(ProtocolError::MissingField("Game"))?;

    let m = match (game.match_id(), game.kind) {
        (Some(match_id), _) => state.orchestrator.join_match_by_id(&match_id, player_id).await?,
        (None, Some(MatchKind::Public)) => {
            state.orchestrator.create_or_join_public_match(player_id).await?
        }
        (None, _) => return Err(ProtocolError::MissingField("Game id").into()),
    };
    tracing::info!(%player_id, match_id = %m.id, "game:join");
    broadcast_game(state, Action::JoinGame, &m, None).await;
    Ok(())
}

async fn turn<S: Store>(
    state: &ServerState<S>,
    session: &SessionHandle,
    request: &RequestPayload,
) -> Result<(), TactixError> {
    let player_id = identified(state, session, request).await?;
    let cell = request.cell.ok_or(ProtocolError::MissingField("Cell"))?;
    let outcome = state.orchestrator.apply_turn(player_id, cell).await?;
    if let TurnOutcome::Finished(m) = &outcome {
        tracing::info!(match_id = %m.id, winner = ?m.winner, "game over");
    }
    broadcast_game(state, Action::Turn, outcome.game(), None).await;
    Ok(())
}

async fn leave<S: Store>(
    state: &ServerState<S>,
    session: &SessionHandle,
    request: &RequestPayload,
) -> Result<(), TactixError> {
    let player_id = identified(state, session, request).await?;
    let m = state.orchestrator.leave_match(player_id).await?;
    tracing::info!(%player_id, match_id = %m.id, "player left game");
    broadcast_game(state, Action::Leave, &m, Some(StatusView::Leave)).await;
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// The request's player id, bound to the connection it arrived on.
pub(crate) async fn identified<'a, S: Store>(
    state: &ServerState<S>,
    session: &SessionHandle,
    request: &'a RequestPayload,
) -> Result<&'a PlayerId, TactixError> {
    let player_id = request
        .player_id()
        .ok_or(ProtocolError::MissingField("Player"))?;
    state.identify(session, player_id).await;
    Ok(player_id)
}

/// Sends every seated human their own view of `m`.
///
/// `status` replaces the lifecycle status for early endings. A match that
/// is over no longer appears as the player's current game.
pub(crate) async fn broadcast_game<S: Store>(
    state: &ServerState<S>,
    action: Action,
    m: &Match,
    status: Option<StatusView>,
) {
    let ended = status.is_some() || m.status == MatchStatus::Finished;
    let game = match status {
        Some(status) => m.view_as(status),
        None => m.view(),
    };
    for seat in m.seats.iter().filter(|s| !s.player_id.is_bot()) {
        let player = PlayerView {
            id: seat.player_id.clone(),
            mark: Some(seat.mark),
            game_id: (!ended).then(|| m.id.clone()),
        };
        let payload = ResponsePayload::default()
            .with_player(player)
            .with_game(game.clone());
        state.deliver(&seat.player_id, action, payload).await;
    }
}

/// Error reply for an envelope whose action did not parse, echoing the
/// client's action name.
fn send_raw_error<S>(state: &ServerState<S>, session: &SessionHandle, action: &str, e: &TactixError) {
    let response = tactix_protocol::Response {
        action: action.to_owned(),
        payload: ResponsePayload::error(e.client_message()),
    };
    let sent = state
        .codec
        .encode(&response)
        .map_err(TactixError::from)
        .and_then(|bytes| Ok(session.send(bytes)?));
    if let Err(e) = sent {
        tracing::debug!(conn_id = %session.connection_id(), error = %e, "failed to send error response");
    }
}
