//! Match layer for Tactix.
//!
//! - [`Match`] and [`Player`] records with their invariants
//! - the move rules in [`machine`]
//! - the bot in [`bot`]
//! - storage traits and [`MemoryStore`]
//! - [`Orchestrator`], which strings them together under per-match locks
//!
//! ```text
//! Server (above)   ← dispatcher, monitor, rematch coordinator
//!     ↕
//! Match (this crate)
//!     ↕
//! Protocol (below)  ← ids, board, marks
//! ```

pub mod bot;
mod error;
mod locks;
pub mod machine;
mod model;
mod orchestrator;
mod store;

pub use error::{MatchError, StorageError};
pub use locks::{KeyedGuard, KeyedLocks};
pub use machine::{MoveOutcome, WIN_LINES, determine_result};
pub use model::{Match, Player, Seat};
pub use orchestrator::{Orchestrator, TurnOutcome};
pub use store::{MatchStore, MemoryStore, PlayerStore, Store};
