//! Test doubles for the transport and shared fixtures.

pub mod fixtures;
pub mod mock_connector;

pub use mock_connector::{MockConnector, MockServer, OpenOutcome};
