//! # Tactix
//!
//! Realtime multiplayer tic-tac-toe over WebSocket.
//!
//! Clients open a WebSocket, send `{ "action": ..., "payload": ... }`
//! envelopes and receive responses on the same action name. The server
//! keeps every rule: matchmaking, turn order, the bot opponent, forfeits
//! after a disconnect, and rematches.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tactix::TactixServer;
//!
//! # async fn run() -> Result<(), tactix::TactixError> {
//! let server = TactixServer::builder()
//!     .bind("0.0.0.0:8080")
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod dispatch;
mod error;
mod handler;
mod monitor;
mod rematch;
mod server;

pub use config::ServerConfig;
pub use error::TactixError;
pub use server::{TactixServer, TactixServerBuilder};

pub mod prelude {
    pub use crate::{ServerConfig, TactixError, TactixServer, TactixServerBuilder};
    pub use tactix_match::{MatchStore, MemoryStore, PlayerStore, Store};
    pub use tactix_protocol::{Action, Difficulty, Mark, MatchId, MatchKind, PlayerId};
    pub use tactix_session::SessionConfig;
    pub use tactix_transport::WebSocketConfig;
}
