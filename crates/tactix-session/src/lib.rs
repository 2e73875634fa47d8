//! Session bookkeeping for Tactix.
//!
//! Three small tables, each behind its own lock:
//!
//! 1. **Connection registry** ([`ConnectionRegistry`]): player id → live
//!    connection, read on every broadcast.
//! 2. **Disconnect tracker** ([`DisconnectTracker`]): players whose
//!    connection dropped, with the instant it happened.
//! 3. **Rematch book** ([`RematchBook`]): pending two-phase rematch offers.
//!
//! None of them touch storage; callers do storage work after releasing
//! the lock.
//!
//! ```text
//! Server (above)   ← dispatcher, monitor, rematch coordinator
//!     ↕
//! Session (this crate)
//!     ↕
//! Protocol / Transport (below)  ← PlayerId, ConnectionId
//! ```

mod config;
mod disconnect;
mod error;
mod registry;
mod rematch;

pub use config::SessionConfig;
pub use disconnect::DisconnectTracker;
pub use error::SessionError;
pub use registry::{ConnectionRegistry, SessionHandle};
pub use rematch::{RematchBook, RematchDecision, RematchKey};
