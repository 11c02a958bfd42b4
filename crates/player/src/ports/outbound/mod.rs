//! Outbound ports - Interfaces for external services
//!
//! These ports define the contracts that infrastructure adapters implement,
//! so the session service can talk to the REST API and consume session
//! traffic without depending on concrete implementations.

pub mod player_events;
pub mod session_api_port;

pub use player_events::{EventKind, PlayerEvent};
pub use session_api_port::{ApiError, SessionApi};

#[cfg(test)]
pub use session_api_port::MockSessionApi;
