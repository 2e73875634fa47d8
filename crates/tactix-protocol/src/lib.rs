//! Wire protocol for Tactix.
//!
//! This crate defines the language clients and the server speak:
//!
//! - **Vocabulary** ([`PlayerId`], [`MatchId`], [`Mark`], [`Board`],
//!   [`MatchStatus`], ...) shared with the match engine.
//! - **Messages** ([`Envelope`], [`Action`], [`RequestPayload`],
//!   [`Response`]) that travel inside WebSocket text frames.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]).
//!
//! ```text
//! Transport (frames) → Protocol (Envelope) → Dispatcher (Action)
//! ```

mod codec;
mod error;
mod message;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use message::{
    Action, Envelope, GameRef, GameView, PlayerRef, PlayerView, RematchAnswer, RequestPayload,
    Response, ResponsePayload, StatusView,
};
pub use types::{
    BOT_ID_PREFIX, Board, Difficulty, Mark, MatchId, MatchKind, MatchStatus, Outcome, PlayerId,
};
