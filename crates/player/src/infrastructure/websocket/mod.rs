//! Live session channel
//!
//! - `client`: connection manager (connect, disconnect, send, reconnect)
//! - `transport`: socket seam, tokio-tungstenite in production
//! - `message_builder`: outbound message construction

mod client;
mod core;
mod message_builder;
mod shared;
pub mod transport;

pub use client::SessionClient;
pub use self::core::{delay_millis, BackoffState, ReconnectPolicy};
pub use message_builder::{ClientMessageBuilder, OutboundMessage};
pub use shared::{redact_token, session_endpoint, SessionTarget};
pub use transport::{Connector, TransportError, TungsteniteConnector};
