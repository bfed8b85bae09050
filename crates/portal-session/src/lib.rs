//! Player session management for Portal.
//!
//! This crate tracks every player connected to the proxy and decides what
//! happens to them when the server they should be on is not reachable:
//!
//! 1. **Sessions**: who is connected and where they are ([`Session`],
//!    [`SessionState`], [`SessionStore`])
//! 2. **Transfers**: the seam to the player-facing proxy that actually
//!    moves a player between backends ([`Transferer`])
//! 3. **Hibernation**: parking sessions that have nowhere to go and
//!    moving them as soon as a server registers ([`HibernationCoordinator`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Socket server / routing (above)  ← triggers hibernation and drains
//!     ↕
//! Session layer (this crate)       ← owns session state transitions
//!     ↕
//! Registry + protocol (below)      ← ServerEntry, PlayerId
//! ```

mod error;
mod hibernation;
mod session;
mod store;
mod transfer;

pub use error::{SessionError, TransferError};
pub use hibernation::{DrainReport, HibernationCoordinator, DEFAULT_MAX_CONCURRENT_TRANSFERS};
pub use session::{Session, SessionState};
pub use store::SessionStore;
pub use transfer::Transferer;
