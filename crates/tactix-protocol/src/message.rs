//! Envelope, actions, and the request/response payloads.
//!
//! Every text frame carries one JSON envelope:
//!
//! ```json
//! { "action": "game:turn", "payload": { "player": { "id": "..." }, "cell": 4 } }
//! ```
//!
//! Responses reuse the request's action name and carry any of `player`,
//! `game`, `error` and `message`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;
use crate::types::{Board, Difficulty, Mark, MatchId, MatchKind, MatchStatus, Outcome, PlayerId};

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

/// The client-invokable operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Connect,
    NewGame,
    JoinGame,
    Turn,
    Leave,
    Rematch,
}

impl Action {
    pub const ALL: [Action; 6] = [
        Self::Connect,
        Self::NewGame,
        Self::JoinGame,
        Self::Turn,
        Self::Leave,
        Self::Rematch,
    ];

    /// The name used in the envelope's `action` field.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::NewGame => "game:new",
            Self::JoinGame => "game:join",
            Self::Turn => "game:turn",
            Self::Leave => "game:leave",
            Self::Rematch => "game:rematch",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| ProtocolError::UnknownAction(s.to_owned()))
    }
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// Inbound wrapper. The payload is kept loose until the action is known.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub action: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// Outbound wrapper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub action: String,
    pub payload: ResponsePayload,
}

impl Response {
    pub fn new(action: Action, payload: ResponsePayload) -> Self {
        Self {
            action: action.as_str().to_owned(),
            payload,
        }
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Union of every field any action reads. Handlers check for the ones
/// they need.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player: Option<PlayerRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game: Option<GameRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cell: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
}

impl RequestPayload {
    /// The caller's player id, treating `""` as absent.
    pub fn player_id(&self) -> Option<&PlayerId> {
        self.player
            .as_ref()
            .and_then(|p| p.id.as_ref())
            .filter(|id| !id.is_empty())
    }
}

/// Client reference to a player. Clients may echo back a full player
/// object; only `id` is read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<PlayerId>,
}

/// Client reference to a match, or the shape of a match to create.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(
        rename = "type",
        default,
        with = "crate::types::empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub kind: Option<MatchKind>,
    #[serde(
        default,
        with = "crate::types::empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub difficulty: Option<Difficulty>,
}

impl GameRef {
    /// The requested match id, normalized, treating `""` as absent.
    pub fn match_id(&self) -> Option<MatchId> {
        self.id
            .as_deref()
            .map(MatchId::normalized)
            .filter(|id| !id.is_empty())
    }
}

/// Answer to a rematch offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RematchAnswer {
    Yes,
    No,
}

impl FromStr for RematchAnswer {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "yes" => Ok(Self::Yes),
            "no" => Ok(Self::No),
            other => Err(ProtocolError::InvalidValue {
                field: "answer",
                value: other.to_owned(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// What a response carries. Absent fields are omitted from the JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponsePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player: Option<PlayerView>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game: Option<GameView>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ResponsePayload {
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            error: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn message(text: impl Into<String>) -> Self {
        Self {
            message: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn with_player(mut self, player: PlayerView) -> Self {
        self.player = Some(player);
        self
    }

    pub fn with_game(mut self, game: GameView) -> Self {
        self.game = Some(game);
        self
    }
}

/// A player as clients see it. The last-opponent link is server-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerView {
    pub id: PlayerId,
    #[serde(
        default,
        with = "crate::types::empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub mark: Option<Mark>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_id: Option<MatchId>,
}

/// A match as clients see it: no seat list, no bot difficulty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameView {
    pub id: MatchId,
    pub board: Board,
    #[serde(default, with = "crate::types::empty_as_none")]
    pub winner: Option<Outcome>,
    pub status: StatusView,
    #[serde(default, with = "crate::types::empty_as_none")]
    pub turn: Option<Mark>,
    #[serde(rename = "type")]
    pub kind: MatchKind,
}

/// The `status` clients see. Besides the lifecycle states, a match that
/// ended early is reported as `leave` (someone left) or `opponent_out`
/// (someone timed out after disconnecting).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusView {
    Waiting,
    Ongoing,
    Finished,
    Leave,
    OpponentOut,
}

impl From<MatchStatus> for StatusView {
    fn from(status: MatchStatus) -> Self {
        match status {
            MatchStatus::Waiting => Self::Waiting,
            MatchStatus::Ongoing => Self::Ongoing,
            MatchStatus::Finished => Self::Finished,
        }
    }
}
