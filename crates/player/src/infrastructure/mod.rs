pub mod http_client;
pub mod message_translator;
pub mod messaging;
pub mod websocket;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use http_client::HttpSessionApi;
pub use messaging::{ConnectionState, EventBus};
pub use websocket::{ReconnectPolicy, SessionClient, SessionTarget};
