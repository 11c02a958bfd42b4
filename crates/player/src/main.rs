//! Tavern Player - headless session console.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tavern_player::config::{session_target_from_lookup, ClientConfig};
use tavern_player::state::TranscriptEntry;
use tavern_player::{
    observer, EventBus, EventKind, HttpSessionApi, PlayerEvent, SessionApi, SessionClient,
    SessionStore, SessionSync,
};

#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Roll {
        dice: &'a str,
        purpose: Option<&'a str>,
    },
    InCharacter(&'a str),
    Action {
        action_type: &'a str,
        action: &'a str,
    },
    Turn,
    Quit,
    Chat(&'a str),
    Usage(&'static str),
}

impl Command<'_> {
    /// Whether the command goes out over the session channel.
    fn sends(&self) -> bool {
        matches!(
            self,
            Command::Chat(_)
                | Command::InCharacter(_)
                | Command::Roll { .. }
                | Command::Action { .. }
        )
    }
}

fn parse_command(line: &str) -> Option<Command<'_>> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    if !line.starts_with('/') {
        return Some(Command::Chat(line));
    }

    let (name, rest) = line.split_once(' ').unwrap_or((line, ""));
    let rest = rest.trim();
    let command = match name {
        "/roll" => match rest.split_once(' ') {
            Some((dice, purpose)) => Command::Roll {
                dice,
                purpose: Some(purpose.trim()).filter(|p| !p.is_empty()),
            },
            None if !rest.is_empty() => Command::Roll {
                dice: rest,
                purpose: None,
            },
            None => Command::Usage("/roll <dice> [purpose]"),
        },
        "/ic" if !rest.is_empty() => Command::InCharacter(rest),
        "/ic" => Command::Usage("/ic <text>"),
        "/action" => match rest.split_once(' ') {
            Some((action_type, action)) if !action.trim().is_empty() => Command::Action {
                action_type,
                action: action.trim(),
            },
            _ => Command::Usage("/action <type> <text>"),
        },
        "/turn" => Command::Turn,
        "/quit" => Command::Quit,
        _ => Command::Usage("/roll, /ic, /action, /turn, /quit"),
    };
    Some(command)
}

fn print_event(event: &PlayerEvent) {
    if let Some(entry) = TranscriptEntry::from_event(event) {
        println!("{}", entry.display_line());
        return;
    }
    match event {
        PlayerEvent::Connected => println!("* Connected"),
        PlayerEvent::Disconnected { will_reconnect: true } => {
            println!("* Connection lost, reconnecting...")
        }
        PlayerEvent::Disconnected { will_reconnect: false } => println!("* Disconnected"),
        PlayerEvent::Error { message } => println!("* Connection error: {message}"),
        PlayerEvent::ReconnectExhausted { attempts } => {
            println!("* Gave up after {attempts} reconnect attempts")
        }
        _ => {}
    }
}

fn print_turn_order(store: &SessionStore) {
    let order = store.display_turn_order();
    if order.is_empty() {
        println!("* No turn order yet");
        return;
    }
    for slot in order {
        let marker = if slot.is_active { ">" } else { " " };
        println!(
            "{marker} {:>3}  {}",
            slot.entry.initiative, slot.entry.character_name
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tavern_player=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("Starting Tavern Player");

    let config = ClientConfig::from_env().context("Failed to load configuration")?;
    let target = session_target_from_lookup(|key| std::env::var(key).ok())?;
    let character_id = target.character_id.clone();

    let bus = EventBus::new();
    let (store, requests) = SessionStore::new();
    store.attach(&bus);

    let printer = observer(|event| {
        print_event(event);
        Ok(())
    });
    let printed: Vec<EventKind> = EventKind::ALL
        .iter()
        .copied()
        .filter(|kind| !kind.is_server_event())
        .chain([
            EventKind::ChatMessage,
            EventKind::DiceRoll,
            EventKind::AiResponse,
        ])
        .collect();
    bus.subscribe_all(&printed, &printer);

    let api: Arc<dyn SessionApi> = Arc::new(HttpSessionApi::new(
        &config.api_url,
        target.token.clone(),
        config.http_timeout,
    ));
    let sync = SessionSync::start(target.session_id.clone(), store.clone(), requests, api);
    sync.load().await.context("Failed to load session")?;

    let snapshot = store.snapshot();
    println!(
        "* {} / {} ({})",
        snapshot.session.campaign_name, snapshot.session.current_scene, snapshot.session.status
    );

    let client = SessionClient::new(config.ws_url.clone(), config.reconnect, bus.clone());
    client
        .connect(target)
        .context("Failed to open session connection")?;
    let link = client.state_observer();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let Some(command) = parse_command(&line) else {
            continue;
        };
        if command.sends() && !link.is_open() {
            println!("* Not connected, message not sent");
            continue;
        }
        match command {
            Command::Chat(text) => {
                client.send_chat_message(text, character_id.as_deref(), false);
            }
            Command::InCharacter(text) => {
                client.send_chat_message(text, character_id.as_deref(), true);
            }
            Command::Roll { dice, purpose } => match character_id.as_deref() {
                Some(character_id) => {
                    client.roll_dice(dice, character_id, purpose);
                }
                None => println!("* Set TAVERN_CHARACTER_ID to roll dice"),
            },
            Command::Action {
                action_type,
                action,
            } => match character_id.as_deref() {
                Some(character_id) => {
                    client.send_action(character_id, action, action_type, None);
                }
                None => println!("* Set TAVERN_CHARACTER_ID to take actions"),
            },
            Command::Turn => print_turn_order(&store),
            Command::Quit => break,
            Command::Usage(usage) => println!("* Usage: {usage}"),
        }
    }

    client.disconnect();
    store.detach(&bus);
    tracing::info!("Tavern Player stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_chat() {
        assert_eq!(parse_command("  hello all "), Some(Command::Chat("hello all")));
        assert_eq!(parse_command("   "), None);
    }

    #[test]
    fn roll_with_and_without_purpose() {
        assert_eq!(
            parse_command("/roll 1d20+5 Stealth check"),
            Some(Command::Roll {
                dice: "1d20+5",
                purpose: Some("Stealth check")
            })
        );
        assert_eq!(
            parse_command("/roll 2d6"),
            Some(Command::Roll {
                dice: "2d6",
                purpose: None
            })
        );
        assert!(matches!(parse_command("/roll"), Some(Command::Usage(_))));
    }

    #[test]
    fn action_needs_type_and_text() {
        assert_eq!(
            parse_command("/action attack swing at the goblin"),
            Some(Command::Action {
                action_type: "attack",
                action: "swing at the goblin"
            })
        );
        assert!(matches!(parse_command("/action attack"), Some(Command::Usage(_))));
    }

    #[test]
    fn other_commands() {
        assert_eq!(parse_command("/turn"), Some(Command::Turn));
        assert_eq!(parse_command("/quit"), Some(Command::Quit));
        assert_eq!(parse_command("/ic I bow"), Some(Command::InCharacter("I bow")));
        assert!(matches!(parse_command("/dance"), Some(Command::Usage(_))));
    }

    #[test]
    fn only_channel_commands_send() {
        assert!(Command::Chat("hi").sends());
        assert!(Command::InCharacter("I bow").sends());
        assert!(!Command::Turn.sends());
        assert!(!Command::Quit.sends());
        assert!(!Command::Usage("/ic <text>").sends());
    }
}
