//! Rematch coordinator: the two-phase "yes"/"yes" handshake between the
//! players of a finished match.
//!
//! The [`RematchBook`](tactix_session::RematchBook) decides under its own
//! lock who consumed an offer; only that caller creates the match, after
//! the lock is released.

use tactix_match::{MatchError, Store};
use tactix_protocol::{Action, PlayerId, RematchAnswer, RequestPayload, ResponsePayload};
use tactix_session::{RematchDecision, SessionHandle};

use crate::TactixError;
use crate::dispatch::{broadcast_game, identified};
use crate::server::ServerState;

pub(crate) const WAITING_MESSAGE: &str = "Rematch request created, waiting for opponent to confirm";
pub(crate) const DECLINED_MESSAGE: &str = "Rematch request was declined";

/// Handles `game:rematch`.
pub(crate) async fn answer<S: Store>(
    state: &ServerState<S>,
    session: &SessionHandle,
    request: &RequestPayload,
) -> Result<(), TactixError> {
    let player_id = identified(state, session, request).await?;
    let answer: RematchAnswer = request.answer.as_deref().unwrap_or_default().parse()?;

    let player = state.orchestrator.player(player_id).await?;
    let opponent = player.last_opponent.ok_or(MatchError::NoLastOpponent)?;
    if !opponent.is_bot() {
        state.orchestrator.player(&opponent).await?;
    }

    match answer {
        RematchAnswer::Yes => accept(state, session, player_id, &opponent).await,
        RematchAnswer::No => {
            decline(state, player_id, &opponent).await;
            Ok(())
        }
    }
}

async fn accept<S: Store>(
    state: &ServerState<S>,
    session: &SessionHandle,
    player_id: &PlayerId,
    opponent: &PlayerId,
) -> Result<(), TactixError> {
    // A bot always agrees.
    if !opponent.is_bot() {
        match state.rematches.accept(player_id, opponent).await {
            RematchDecision::Requested | RematchDecision::AlreadyRequested => {
                return state.reply(session, Action::Rematch, ResponsePayload::message(WAITING_MESSAGE));
            }
            RematchDecision::Confirmed => {}
        }
    }

    let m = match state.orchestrator.create_rematch(player_id, opponent).await {
        Ok(m) => m,
        Err(e) => {
            let e = TactixError::from(e);
            // The opponent is still waiting on their own "yes".
            if !opponent.is_bot() {
                state
                    .deliver(opponent, Action::Rematch, ResponsePayload::error(e.client_message()))
                    .await;
            }
            return Err(e);
        }
    };
    tracing::info!(%player_id, %opponent, match_id = %m.id, "rematch created");
    broadcast_game(state, Action::Rematch, &m, None).await;
    Ok(())
}

async fn decline<S: Store>(state: &ServerState<S>, player_id: &PlayerId, opponent: &PlayerId) {
    let withdrawn = state.rematches.decline(player_id, opponent).await;
    tracing::debug!(%player_id, %opponent, withdrawn, "rematch declined");
    for id in [player_id, opponent] {
        if id.is_bot() {
            continue;
        }
        state
            .deliver(id, Action::Rematch, ResponsePayload::message(DECLINED_MESSAGE))
            .await;
    }
}
