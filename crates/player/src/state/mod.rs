//! Client-side session state
//!
//! `session_state` holds the snapshot and its merge rules; `session_store`
//! wraps it in a shared handle that follows the event bus.

pub mod session_state;
pub mod session_store;

pub use session_state::{
    ConnectionStatus, Reduction, SessionSnapshot, TranscriptEntry, TranscriptKind, TurnSlot,
};
pub use session_store::{RefetchRequests, SessionStore};
