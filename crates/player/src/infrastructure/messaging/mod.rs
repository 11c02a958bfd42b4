//! Event dispatch and connection state.
//!
//! - `EventBus`: fan decoded session events out to observers
//! - `ConnectionState`: lifecycle of the live channel, readable from any task

pub mod connection;
pub mod event_bus;

pub use connection::{set_connection_state, ConnectionState, ConnectionStateObserver};
pub use event_bus::{observer, EventBus, EventObserver, Observer, ObserverError};
