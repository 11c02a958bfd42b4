//! Connection lifecycle state.
//!
//! The session client stores the state in an `AtomicU8` so that it can be read
//! from any task without taking the client's lock.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// State of the live session channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Never connected, or explicitly disconnected
    Idle,
    /// Handshake in flight (first attempt or a reconnect)
    Connecting,
    /// Channel is up; sends are accepted
    Open,
    /// Channel dropped; a reconnect may be pending
    Closed,
}

impl ConnectionState {
    /// Convert to u8 for atomic storage.
    pub fn to_u8(self) -> u8 {
        match self {
            ConnectionState::Idle => 0,
            ConnectionState::Connecting => 1,
            ConnectionState::Open => 2,
            ConnectionState::Closed => 3,
        }
    }

    /// Convert from u8 (atomic storage).
    pub fn from_u8(v: u8) -> Self {
        match v {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Open,
            3 => ConnectionState::Closed,
            _ => ConnectionState::Idle,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Closed => "closed",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only view of a client's connection state.
///
/// Cheap to clone; every clone sees the same underlying state.
#[derive(Clone)]
pub struct ConnectionStateObserver {
    state: Arc<AtomicU8>,
}

impl ConnectionStateObserver {
    pub fn new(state: Arc<AtomicU8>) -> Self {
        Self { state }
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }
}

/// Store `new_state`, returning the state it replaced.
pub fn set_connection_state(state_ref: &AtomicU8, new_state: ConnectionState) -> ConnectionState {
    ConnectionState::from_u8(state_ref.swap(new_state.to_u8(), Ordering::SeqCst))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_state_roundtrip() {
        let states = [
            ConnectionState::Idle,
            ConnectionState::Connecting,
            ConnectionState::Open,
            ConnectionState::Closed,
        ];

        for state in states {
            assert_eq!(ConnectionState::from_u8(state.to_u8()), state);
        }
        assert_eq!(ConnectionState::from_u8(200), ConnectionState::Idle);
    }

    #[test]
    fn test_observer_reads_state() {
        let state = Arc::new(AtomicU8::new(ConnectionState::Idle.to_u8()));
        let observer = ConnectionStateObserver::new(Arc::clone(&state));

        assert_eq!(observer.state(), ConnectionState::Idle);
        assert!(!observer.is_open());

        let previous = set_connection_state(&state, ConnectionState::Open);

        assert_eq!(previous, ConnectionState::Idle);
        assert!(observer.is_open());
    }
}
