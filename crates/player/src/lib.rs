//! Tavern Player: live synchronization client for tabletop sessions.
//!
//! Layers, leaves first:
//! - `infrastructure`: session channel (connect, reconnect, send), frame
//!   decoding, event bus, REST client
//! - `state`: the session snapshot and the rules that fold events into it
//! - `application`: keeps the snapshot in step with the REST API
//! - `ports`: event types and the REST port the other layers share

pub mod application;
pub mod config;
pub mod infrastructure;
pub mod ports;
pub mod state;

pub use application::services::SessionSync;
pub use config::ClientConfig;
pub use infrastructure::messaging::{observer, ConnectionState, EventBus, ObserverError};
pub use infrastructure::websocket::{ReconnectPolicy, SessionClient, SessionTarget};
pub use infrastructure::HttpSessionApi;
pub use ports::outbound::{ApiError, EventKind, PlayerEvent, SessionApi};
pub use state::{SessionSnapshot, SessionStore};
