//! Tavern Protocol - wire types for the live session channel and the session REST API
//!
//! This crate contains the types exchanged between the session server and the player client:
//! - Envelopes for the persistent connection (outbound `ClientEnvelope`, inbound `ServerEnvelope`)
//! - The closed vocabulary of server message types
//! - Outbound message bodies and inbound payload shapes
//! - REST DTOs for the session snapshot
//!
//! # Design Principles
//!
//! 1. **Minimal dependencies** - Only serde, serde_json and chrono
//! 2. **No business logic** - Pure data types and serialization
//! 3. **Forward compatible** - Unknown inbound types and fields never fail envelope parsing

pub mod messages;
pub mod types;

pub use messages::{
    AiResponseData, CharacterUpdateData, ChatData, ClientEnvelope, ClientMessageType,
    DiceResultData, DiceResultValue, DiceRollData, PlayerActionData, PresenceData,
    ServerEnvelope, ServerMessageType, SessionUpdateData, TurnUpdateData,
};
pub use types::{SessionData, SessionPlayer, TurnEntry};
