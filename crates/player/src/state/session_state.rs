//! Session snapshot and the merge rules that fold events into it
//!
//! The server is authoritative. The reducer only reflects what arrives: the
//! transcript is append-only, roster and turn order are replaced wholesale, and
//! membership changes are answered with a full re-fetch rather than patched
//! locally.

use serde_json::{Map, Value};
use tavern_protocol::{SessionData, SessionPlayer, SessionUpdateData, TurnEntry};
use uuid::Uuid;

use crate::ports::outbound::player_events::{AiResponse, ChatMessage, DiceRoll, PlayerEvent};

/// User id and display name attached to AI narration in the transcript.
pub const NARRATOR_USER_ID: &str = "ai-dm";
pub const NARRATOR_USERNAME: &str = "AI Dungeon Master";

/// Connection indicator shown next to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    /// Connection lost, attempting to reconnect
    Reconnecting,
    /// Reconnect attempts exhausted; the user has to retry
    Failed,
}

impl ConnectionStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionStatus::Connected)
    }

    pub fn display_text(&self) -> &'static str {
        match self {
            ConnectionStatus::Connected => "Connected",
            ConnectionStatus::Connecting => "Connecting...",
            ConnectionStatus::Reconnecting => "Reconnecting...",
            ConnectionStatus::Disconnected => "Disconnected",
            ConnectionStatus::Failed => "Connection Failed",
        }
    }
}

/// Top-level session attributes. `session_update` merges into these.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionAttributes {
    pub id: String,
    pub campaign_id: String,
    pub campaign_name: String,
    pub status: String,
    pub current_scene: String,
    /// Private DM notes for the scene
    pub scene_notes: Option<String>,
    pub dm_id: String,
    pub dm_username: String,
    /// Attributes the client does not model, kept as sent
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscriptKind {
    InCharacter,
    OutOfCharacter,
    Roll,
    Narrator,
}

/// One line of the session transcript.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptEntry {
    pub kind: TranscriptKind,
    pub user_id: String,
    pub username: String,
    pub character_id: Option<String>,
    pub message: String,
    pub timestamp: String,
}

impl TranscriptEntry {
    /// The transcript entry an event produces, if any.
    pub fn from_event(event: &PlayerEvent) -> Option<Self> {
        match event {
            PlayerEvent::ChatMessage(chat) => Some(Self::chat(chat)),
            PlayerEvent::DiceRoll(roll) => Some(Self::roll(roll)),
            PlayerEvent::AiResponse(ai) => Some(Self::narration(ai)),
            _ => None,
        }
    }

    fn chat(chat: &ChatMessage) -> Self {
        Self {
            kind: if chat.in_character {
                TranscriptKind::InCharacter
            } else {
                TranscriptKind::OutOfCharacter
            },
            user_id: chat.user_id.clone(),
            username: chat.username.clone(),
            character_id: chat.character_id.clone(),
            message: chat.message.clone(),
            timestamp: chat.timestamp.clone(),
        }
    }

    fn roll(roll: &DiceRoll) -> Self {
        Self {
            kind: TranscriptKind::Roll,
            user_id: roll.user_id.clone().unwrap_or_default(),
            username: roll.username.clone().unwrap_or_default(),
            character_id: roll.character_id.clone(),
            message: dice_summary(roll),
            timestamp: roll.timestamp.clone(),
        }
    }

    fn narration(ai: &AiResponse) -> Self {
        Self {
            kind: TranscriptKind::Narrator,
            user_id: NARRATOR_USER_ID.to_string(),
            username: NARRATOR_USERNAME.to_string(),
            character_id: None,
            message: ai.message.clone(),
            timestamp: ai.timestamp.clone(),
        }
    }

    /// Single-line rendering for a plain-text log.
    pub fn display_line(&self) -> String {
        match self.kind {
            TranscriptKind::InCharacter => format!("[IC] {}: {}", self.username, self.message),
            TranscriptKind::OutOfCharacter => format!("[OOC] {}: {}", self.username, self.message),
            TranscriptKind::Roll => format!("[ROLL] {}", self.message),
            TranscriptKind::Narrator => format!("[{}] {}", self.username, self.message),
        }
    }
}

/// `"<actor> rolled <dice>: <result>"`, plus `" (a, b, ...)"` with a breakdown.
pub fn dice_summary(roll: &DiceRoll) -> String {
    let mut line = format!("{} rolled {}: {}", roll.actor(), roll.dice, roll.result);
    if let Some(breakdown) = roll.breakdown.as_deref().filter(|b| !b.is_empty()) {
        let values: Vec<String> = breakdown.iter().map(i64::to_string).collect();
        line.push_str(&format!(" ({})", values.join(", ")));
    }
    line
}

#[derive(Debug, Clone, PartialEq)]
pub struct AiHistoryEntry {
    pub id: Uuid,
    pub message: String,
    pub context: Option<Value>,
    pub created_at: String,
}

/// A participant in display order.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnSlot {
    pub entry: TurnEntry,
    pub is_active: bool,
}

/// What applying an event did to the snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduction {
    Applied,
    Unchanged,
    /// The roster may be stale; fetch the session again
    RefetchRequested,
}

/// Client-side view of a live session.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionSnapshot {
    pub session: SessionAttributes,
    pub players: Vec<SessionPlayer>,
    pub turn_order: Vec<TurnEntry>,
    pub current_turn: Option<String>,
    pub transcript: Vec<TranscriptEntry>,
    pub dice_history: Vec<DiceRoll>,
    pub ai_responses: Vec<AiHistoryEntry>,
    pub connection_status: ConnectionStatus,
}

impl SessionSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one event into the snapshot.
    pub fn apply(&mut self, event: &PlayerEvent) -> Reduction {
        match event {
            PlayerEvent::Connected => self.set_status(ConnectionStatus::Connected),
            PlayerEvent::Disconnected { will_reconnect } => self.set_status(if *will_reconnect {
                ConnectionStatus::Reconnecting
            } else {
                ConnectionStatus::Disconnected
            }),
            PlayerEvent::Error { .. } => self.set_status(ConnectionStatus::Reconnecting),
            PlayerEvent::ReconnectExhausted { .. } => self.set_status(ConnectionStatus::Failed),

            PlayerEvent::PlayerJoined(_) | PlayerEvent::PlayerLeft(_) => {
                Reduction::RefetchRequested
            }

            PlayerEvent::ChatMessage(chat) => {
                self.transcript.push(TranscriptEntry::chat(chat));
                Reduction::Applied
            }

            PlayerEvent::DiceRoll(roll) => {
                self.transcript.push(TranscriptEntry::roll(roll));
                self.dice_history.push(roll.clone());
                Reduction::Applied
            }

            PlayerEvent::AiResponse(ai) => {
                self.ai_responses.push(AiHistoryEntry {
                    id: Uuid::new_v4(),
                    message: ai.message.clone(),
                    context: ai.context.clone(),
                    created_at: ai.timestamp.clone(),
                });
                self.transcript.push(TranscriptEntry::narration(ai));
                Reduction::Applied
            }

            PlayerEvent::SessionUpdate(update) => {
                self.merge_session_update(update);
                Reduction::Applied
            }

            PlayerEvent::TurnUpdate(turn) => {
                self.current_turn = turn.current_turn.clone();
                if let Some(order) = &turn.turn_order {
                    self.turn_order = order.clone();
                }
                Reduction::Applied
            }

            // Character sheets listen for these directly; roster entries only
            // change through a re-fetch.
            PlayerEvent::CharacterUpdate(_) => Reduction::Unchanged,
        }
    }

    /// Replace everything the server owns with an authoritative copy.
    ///
    /// Transcript and histories are kept. Unmodelled attributes from earlier
    /// `session_update`s survive since the REST payload does not carry them.
    pub fn apply_session(&mut self, data: SessionData) {
        let extra = std::mem::take(&mut self.session.extra);
        self.session = SessionAttributes {
            id: data.id,
            campaign_id: data.campaign_id,
            campaign_name: data.campaign_name,
            status: data.status,
            current_scene: data.current_scene,
            scene_notes: data.scene_notes,
            dm_id: data.dm_id,
            dm_username: data.dm_username,
            extra,
        };
        self.players = data.players;
        self.turn_order = data.turn_order;
        self.current_turn = data.current_turn;
    }

    /// Turn order by descending initiative, ties in received order.
    pub fn display_turn_order(&self) -> Vec<TurnSlot> {
        let mut order = self.turn_order.clone();
        order.sort_by(|a, b| b.initiative.cmp(&a.initiative));
        order
            .into_iter()
            .map(|entry| TurnSlot {
                is_active: self.current_turn.as_deref() == Some(entry.character_id.as_str()),
                entry,
            })
            .collect()
    }

    pub fn active_participant(&self) -> Option<&TurnEntry> {
        let current = self.current_turn.as_deref()?;
        self.turn_order.iter().find(|e| e.character_id == current)
    }

    fn set_status(&mut self, status: ConnectionStatus) -> Reduction {
        if self.connection_status == status {
            return Reduction::Unchanged;
        }
        self.connection_status = status;
        Reduction::Applied
    }

    fn merge_session_update(&mut self, update: &SessionUpdateData) {
        let session = &mut self.session;
        if let Some(status) = &update.status {
            session.status = status.clone();
        }
        if let Some(scene) = &update.current_scene {
            session.current_scene = scene.clone();
        }
        if let Some(notes) = &update.scene_notes {
            session.scene_notes = Some(notes.clone());
        }
        if let Some(current_turn) = &update.current_turn {
            self.current_turn = Some(current_turn.clone());
        }
        if let Some(order) = &update.turn_order {
            self.turn_order = order.clone();
        }
        if let Some(players) = &update.players {
            self.players = players.clone();
        }

        for (key, value) in &update.extra {
            let named = match key.as_str() {
                "id" => Some(&mut session.id),
                "campaign_id" => Some(&mut session.campaign_id),
                "campaign_name" => Some(&mut session.campaign_name),
                "dm_id" => Some(&mut session.dm_id),
                "dm_username" => Some(&mut session.dm_username),
                _ => None,
            };
            match (named, value.as_str()) {
                (Some(field), Some(text)) => *field = text.to_string(),
                _ => {
                    session.extra.insert(key.clone(), value.clone());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::message_translator::decode_frame;
    use crate::infrastructure::testing::fixtures::{
        chat_frame, dice_frame, server_frame, session_data, turn_entry,
    };
    use crate::ports::outbound::player_events::{PlayerPresence, TurnUpdate};
    use serde_json::json;

    fn apply_frames(snapshot: &mut SessionSnapshot, frames: &[String]) {
        for frame in frames {
            if let Ok(event) = decode_frame(frame) {
                snapshot.apply(&event);
            }
        }
    }

    #[test]
    fn transcript_counts_chat_dice_and_ai_frames() {
        let frames = vec![
            chat_frame("hello", false),
            server_frame("player_joined", json!({"user_id": "u2", "username": "bob"})),
            dice_frame("1d20", &[11], 11),
            server_frame("turn_update", json!({"current_turn": "A"})),
            server_frame("ai_response", json!({"message": "Thunder rolls."})),
            server_frame("session_update", json!({"status": "paused"})),
            chat_frame("I attack", true),
            server_frame("unknown_future_event", json!({})),
            server_frame(
                "character_update",
                json!({"character_id": "A", "field": "hp", "value": 3}),
            ),
            "garbage".to_string(),
            dice_frame("2d6", &[3, 4], 7),
        ];
        let expected = 5;

        let mut snapshot = SessionSnapshot::new();
        apply_frames(&mut snapshot, &frames);

        assert_eq!(snapshot.transcript.len(), expected);
        assert_eq!(snapshot.dice_history.len(), 2);
        assert_eq!(snapshot.ai_responses.len(), 1);

        let kinds: Vec<TranscriptKind> = snapshot.transcript.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TranscriptKind::OutOfCharacter,
                TranscriptKind::Roll,
                TranscriptKind::Narrator,
                TranscriptKind::InCharacter,
                TranscriptKind::Roll,
            ]
        );
    }

    #[test]
    fn turn_update_without_order_keeps_previous_order() {
        let mut snapshot = SessionSnapshot::new();
        snapshot.apply_session(session_data("s1"));
        let before = serde_json::to_string(&snapshot.turn_order).unwrap();

        let reduction = snapshot.apply(&PlayerEvent::TurnUpdate(TurnUpdate {
            current_turn: Some("B".into()),
            turn_order: None,
        }));

        assert_eq!(reduction, Reduction::Applied);
        assert_eq!(snapshot.current_turn.as_deref(), Some("B"));
        assert_eq!(serde_json::to_string(&snapshot.turn_order).unwrap(), before);
    }

    #[test]
    fn turn_update_with_order_replaces_it() {
        let mut snapshot = SessionSnapshot::new();
        snapshot.apply_session(session_data("s1"));

        snapshot.apply(&PlayerEvent::TurnUpdate(TurnUpdate {
            current_turn: None,
            turn_order: Some(vec![turn_entry("C", "Cato", 9)]),
        }));

        assert_eq!(snapshot.current_turn, None);
        assert_eq!(snapshot.turn_order, vec![turn_entry("C", "Cato", 9)]);
    }

    #[test]
    fn display_order_sorts_by_initiative_and_marks_active() {
        let mut snapshot = SessionSnapshot::new();
        snapshot.turn_order = vec![turn_entry("A", "Aria", 15), turn_entry("B", "Bram", 20)];

        snapshot.apply(&PlayerEvent::TurnUpdate(TurnUpdate {
            current_turn: Some("B".into()),
            turn_order: None,
        }));

        let display = snapshot.display_turn_order();
        let rendered: Vec<(&str, i32, bool)> = display
            .iter()
            .map(|s| (s.entry.character_id.as_str(), s.entry.initiative, s.is_active))
            .collect();
        assert_eq!(rendered, vec![("B", 20, true), ("A", 15, false)]);
        assert_eq!(
            snapshot.active_participant().map(|e| e.character_name.as_str()),
            Some("Bram")
        );
    }

    #[test]
    fn display_order_is_stable_for_ties() {
        let mut snapshot = SessionSnapshot::new();
        snapshot.turn_order = vec![
            turn_entry("X", "Xan", 10),
            turn_entry("Y", "Yuri", 12),
            turn_entry("Z", "Zora", 10),
        ];
        let ids: Vec<String> = snapshot
            .display_turn_order()
            .into_iter()
            .map(|s| s.entry.character_id)
            .collect();
        assert_eq!(ids, vec!["Y", "X", "Z"]);
    }

    #[test]
    fn session_update_is_a_shallow_merge() {
        let mut snapshot = SessionSnapshot::new();
        snapshot.apply_session(session_data("s1"));
        let players = snapshot.players.clone();

        let update: SessionUpdateData = serde_json::from_value(json!({
            "current_scene": "The Crypt",
            "campaign_name": "Curse of Strahd",
            "round": 2
        }))
        .unwrap();
        snapshot.apply(&PlayerEvent::SessionUpdate(update));

        assert_eq!(snapshot.session.current_scene, "The Crypt");
        assert_eq!(snapshot.session.campaign_name, "Curse of Strahd");
        assert_eq!(snapshot.session.status, "active");
        assert_eq!(
            snapshot.session.scene_notes.as_deref(),
            Some("Four goblins hide in the brush")
        );
        assert_eq!(snapshot.session.extra.get("round"), Some(&json!(2)));
        assert_eq!(snapshot.players, players);
        assert_eq!(snapshot.current_turn.as_deref(), Some("A"));
    }

    #[test]
    fn membership_changes_request_refetch() {
        let mut snapshot = SessionSnapshot::new();
        snapshot.apply_session(session_data("s1"));
        let before = snapshot.clone();

        let reduction = snapshot.apply(&PlayerEvent::PlayerJoined(PlayerPresence {
            user_id: Some("u2".into()),
            ..Default::default()
        }));

        assert_eq!(reduction, Reduction::RefetchRequested);
        assert_eq!(snapshot, before);
    }

    #[test]
    fn character_update_leaves_snapshot_alone() {
        let mut snapshot = SessionSnapshot::new();
        snapshot.apply_session(session_data("s1"));
        let before = snapshot.clone();

        let event = decode_frame(&server_frame(
            "character_update",
            json!({"character_id": "A", "field": "hit_points", "value": 1}),
        ))
        .unwrap();

        assert_eq!(snapshot.apply(&event), Reduction::Unchanged);
        assert_eq!(snapshot, before);
    }

    #[test]
    fn dice_entry_text() {
        let roll = match decode_frame(&dice_frame("2d6+1", &[3, 5], 9)).unwrap() {
            PlayerEvent::DiceRoll(roll) => roll,
            other => panic!("unexpected event {other:?}"),
        };
        assert_eq!(dice_summary(&roll), "Aria rolled 2d6+1: 9 (3, 5)");

        let bare = DiceRoll {
            breakdown: None,
            character_name: None,
            username: Some("alice".into()),
            ..roll
        };
        assert_eq!(dice_summary(&bare), "alice rolled 2d6+1: 9");
        assert_eq!(
            TranscriptEntry::roll(&bare).display_line(),
            "[ROLL] alice rolled 2d6+1: 9"
        );
    }

    #[test]
    fn ai_response_goes_to_history_and_transcript() {
        let mut snapshot = SessionSnapshot::new();
        snapshot.apply_session(session_data("s1"));
        let scene = snapshot.session.clone();

        snapshot.apply(&PlayerEvent::AiResponse(AiResponse {
            message: "A cold wind blows.".into(),
            context: None,
            timestamp: "t".into(),
        }));

        let entry = &snapshot.transcript[0];
        assert_eq!(entry.kind, TranscriptKind::Narrator);
        assert_eq!(entry.user_id, NARRATOR_USER_ID);
        assert_eq!(entry.display_line(), "[AI Dungeon Master] A cold wind blows.");
        assert_eq!(snapshot.ai_responses[0].message, "A cold wind blows.");
        assert_eq!(snapshot.session, scene);
    }

    #[test]
    fn lifecycle_events_drive_status() {
        let mut snapshot = SessionSnapshot::new();
        assert_eq!(snapshot.connection_status, ConnectionStatus::Disconnected);

        snapshot.apply(&PlayerEvent::Connected);
        assert!(snapshot.connection_status.is_connected());

        snapshot.apply(&PlayerEvent::Disconnected {
            will_reconnect: true,
        });
        assert_eq!(snapshot.connection_status, ConnectionStatus::Reconnecting);

        snapshot.apply(&PlayerEvent::ReconnectExhausted { attempts: 5 });
        assert_eq!(snapshot.connection_status.display_text(), "Connection Failed");
    }

    #[test]
    fn refetch_replaces_roster_but_keeps_transcript() {
        let mut snapshot = SessionSnapshot::new();
        snapshot.apply_session(session_data("s1"));
        apply_frames(&mut snapshot, &[chat_frame("hi", false)]);

        let mut fresh = session_data("s1");
        fresh.players.push(crate::infrastructure::testing::fixtures::player("u2", "B"));
        snapshot.apply_session(fresh);

        assert_eq!(snapshot.players.len(), 2);
        assert_eq!(snapshot.transcript.len(), 1);
    }
}
