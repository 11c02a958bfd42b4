//! Session client: the live channel for one tabletop session.
//!
//! A single driver task per `connect()` owns the socket. It reads frames,
//! writes queued outbound text and, when the channel drops, sleeps out the
//! backoff and reopens it. Every `connect()`/`disconnect()` bumps an epoch and
//! cancels the previous driver, so a stale driver can never touch state that
//! belongs to a newer connection.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use url::Url;

use tavern_protocol::ClientEnvelope;

use crate::infrastructure::message_translator::{decode_frame, CodecError};
use crate::infrastructure::messaging::{
    set_connection_state, ConnectionState, ConnectionStateObserver, EventBus,
};
use crate::infrastructure::websocket::core::{delay_millis, BackoffState, ReconnectPolicy};
use crate::infrastructure::websocket::message_builder::{ClientMessageBuilder, OutboundMessage};
use crate::infrastructure::websocket::shared::{
    redact_token, session_endpoint, SessionTarget, CLOSE_TIMEOUT_MS,
};
use crate::infrastructure::websocket::transport::{
    Connector, FrameSink, TransportError, TungsteniteConnector,
};
use crate::ports::outbound::PlayerEvent;

/// How one open connection ended.
enum SessionEnd {
    /// `disconnect()` or a newer `connect()` took over
    Superseded,
    /// The peer closed the stream
    Closed,
    Failed(TransportError),
}

struct Shared {
    target: Option<SessionTarget>,
    backoff: BackoffState,
    outbound: Option<mpsc::UnboundedSender<String>>,
    cancel: Option<CancellationToken>,
    epoch: u64,
}

struct Inner {
    base_url: Url,
    connector: Arc<dyn Connector>,
    event_bus: EventBus,
    state: Arc<AtomicU8>,
    shared: Mutex<Shared>,
}

/// Connection manager for the live session channel.
///
/// Cloning is cheap; clones control the same connection.
#[derive(Clone)]
pub struct SessionClient {
    inner: Arc<Inner>,
}

impl SessionClient {
    /// Client backed by tokio-tungstenite.
    pub fn new(base_url: Url, policy: ReconnectPolicy, event_bus: EventBus) -> Self {
        Self::with_connector(
            base_url,
            policy,
            event_bus,
            Arc::new(TungsteniteConnector),
        )
    }

    pub fn with_connector(
        base_url: Url,
        policy: ReconnectPolicy,
        event_bus: EventBus,
        connector: Arc<dyn Connector>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                base_url,
                connector,
                event_bus,
                state: Arc::new(AtomicU8::new(ConnectionState::Idle.to_u8())),
                shared: Mutex::new(Shared {
                    target: None,
                    backoff: BackoffState::new(policy),
                    outbound: None,
                    cancel: None,
                    epoch: 0,
                }),
            }),
        }
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.inner.event_bus
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.state()
    }

    pub fn state_observer(&self) -> ConnectionStateObserver {
        ConnectionStateObserver::new(Arc::clone(&self.inner.state))
    }

    /// Reconnect attempts made since the last successful open.
    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.lock().backoff.attempts()
    }

    /// Delay used for the most recent reconnect attempt (the base delay when none).
    pub fn current_backoff(&self) -> Duration {
        self.inner.lock().backoff.delay()
    }

    pub fn session_id(&self) -> Option<String> {
        self.inner
            .lock()
            .target
            .as_ref()
            .map(|t| t.session_id.clone())
    }

    /// Open the channel for `target`.
    ///
    /// A no-op while the channel is open. Otherwise any in-flight handshake or
    /// pending reconnect is abandoned and a fresh attempt starts with the
    /// attempt counter reset. Must be called from within a tokio runtime.
    pub fn connect(&self, target: SessionTarget) -> Result<(), TransportError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| TransportError::Connect(format!("no async runtime: {e}")))?;
        let url = session_endpoint(&self.inner.base_url, &target)?;

        let (epoch, cancel) = {
            let mut shared = self.inner.lock();
            if self.inner.state() == ConnectionState::Open {
                tracing::debug!(session_id = %target.session_id, "Already connected, ignoring connect");
                return Ok(());
            }
            if let Some(previous) = shared.cancel.take() {
                previous.cancel();
            }
            shared.epoch += 1;
            shared.backoff.reset();
            shared.outbound = None;
            shared.target = Some(target);

            let cancel = CancellationToken::new();
            shared.cancel = Some(cancel.clone());
            set_connection_state(&self.inner.state, ConnectionState::Connecting);
            (shared.epoch, cancel)
        };

        runtime.spawn(Arc::clone(&self.inner).drive(url, epoch, cancel));
        Ok(())
    }

    /// Close the channel and forget the session. Safe to call at any time.
    ///
    /// Cancels any pending reconnect. Publishes `Disconnected` (without
    /// reconnect) only if the channel was open.
    pub fn disconnect(&self) {
        let previous = {
            let mut shared = self.inner.lock();
            if let Some(cancel) = shared.cancel.take() {
                cancel.cancel();
            }
            shared.epoch += 1;
            shared.target = None;
            shared.outbound = None;
            shared.backoff.reset();
            set_connection_state(&self.inner.state, ConnectionState::Idle)
        };

        if previous != ConnectionState::Idle {
            tracing::info!(from = %previous, "Disconnected from session");
        }
        if previous == ConnectionState::Open {
            self.inner.event_bus.publish(&PlayerEvent::Disconnected {
                will_reconnect: false,
            });
        }
    }

    /// Send an envelope. Best effort: returns false (and logs) when the channel
    /// is not open. Never blocks or queues for later.
    pub fn send(&self, message_type: &str, data: Value) -> bool {
        let outbound = {
            let shared = self.inner.lock();
            match self.inner.state() {
                ConnectionState::Open => shared.outbound.clone(),
                _ => None,
            }
        };
        let Some(outbound) = outbound else {
            tracing::warn!(
                message_type,
                state = %self.state(),
                "Not connected, dropping outbound message"
            );
            return false;
        };

        let envelope = ClientEnvelope::new(message_type, data);
        let text = match serde_json::to_string(&envelope) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(message_type, error = %e, "Failed to serialize outbound message");
                return false;
            }
        };

        if outbound.send(text).is_err() {
            tracing::warn!(message_type, "Connection closed before message was queued");
            return false;
        }
        tracing::debug!(message_type, "Queued outbound message");
        true
    }

    pub fn send_message(&self, message: OutboundMessage) -> bool {
        let message_type = message.message_type();
        match message.to_data() {
            Ok(data) => self.send(message_type.as_str(), data),
            Err(e) => {
                tracing::error!(message_type = message_type.as_str(), error = %e, "Failed to encode message");
                false
            }
        }
    }

    pub fn send_chat_message(
        &self,
        content: &str,
        character_id: Option<&str>,
        in_character: bool,
    ) -> bool {
        self.send_message(ClientMessageBuilder::chat(
            content,
            character_id,
            in_character,
        ))
    }

    pub fn roll_dice(&self, dice: &str, character_id: &str, purpose: Option<&str>) -> bool {
        self.send_message(ClientMessageBuilder::roll_dice(dice, character_id, purpose))
    }

    pub fn update_character(
        &self,
        character_id: &str,
        field: &str,
        value: Value,
        old_value: Option<Value>,
    ) -> bool {
        self.send_message(ClientMessageBuilder::update_character(
            character_id,
            field,
            value,
            old_value,
        ))
    }

    pub fn send_action(
        &self,
        character_id: &str,
        action: &str,
        action_type: &str,
        target: Option<&str>,
    ) -> bool {
        self.send_message(ClientMessageBuilder::player_action(
            character_id,
            action,
            action_type,
            target,
        ))
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Connection loop for one `connect()` call.
    async fn drive(self: Arc<Self>, url: Url, epoch: u64, cancel: CancellationToken) {
        let endpoint = redact_token(&url);

        loop {
            tracing::info!(url = %endpoint, "Connecting to session");

            let end = self.run_connection(&url, epoch, &cancel).await;
            let Some(delay) = self.mark_closed(epoch, end) else {
                return;
            };

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::debug!("Pending reconnect cancelled");
                    return;
                }
                _ = tokio::time::sleep(delay) => {}
            }

            if !self.begin_attempt(epoch) {
                return;
            }
        }
    }

    async fn run_connection(
        &self,
        url: &Url,
        epoch: u64,
        cancel: &CancellationToken,
    ) -> SessionEnd {
        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => return SessionEnd::Superseded,
            opened = self.connector.open(url) => opened,
        };
        let (mut sink, mut stream) = match opened {
            Ok(pair) => pair,
            Err(e) => return SessionEnd::Failed(e),
        };

        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        if !self.mark_open(epoch, tx) {
            close_sink(&mut sink).await;
            return SessionEnd::Superseded;
        }

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    close_sink(&mut sink).await;
                    return SessionEnd::Superseded;
                }
                frame = stream.next() => match frame {
                    Some(Ok(text)) => self.handle_frame(&text),
                    Some(Err(e)) => return SessionEnd::Failed(e),
                    None => return SessionEnd::Closed,
                },
                Some(text) = rx.recv() => {
                    if let Err(e) = sink.send(text).await {
                        return SessionEnd::Failed(e);
                    }
                }
            }
        }
    }

    /// Decode and dispatch one inbound frame. Bad frames never end the session.
    fn handle_frame(&self, text: &str) {
        match decode_frame(text) {
            Ok(event) => {
                tracing::debug!(event = %event.kind(), "Dispatching session event");
                self.event_bus.publish(&event);
            }
            Err(CodecError::UnrecognizedType(message_type)) => {
                tracing::warn!(%message_type, "Dropping unrecognized message type");
            }
            Err(e) => {
                tracing::warn!(error = %e, "Dropping malformed frame");
            }
        }
    }

    fn mark_open(&self, epoch: u64, outbound: mpsc::UnboundedSender<String>) -> bool {
        let session_id = {
            let mut shared = self.lock();
            if shared.epoch != epoch {
                return false;
            }
            shared.outbound = Some(outbound);
            shared.backoff.reset();
            set_connection_state(&self.state, ConnectionState::Open);
            shared
                .target
                .as_ref()
                .map(|t| t.session_id.clone())
                .unwrap_or_default()
        };

        tracing::info!(%session_id, "Connected to session");
        self.event_bus.publish(&PlayerEvent::Connected);
        true
    }

    /// Record the end of a connection and schedule the next attempt.
    ///
    /// Returns the delay before reconnecting, or `None` when the driver should
    /// stop (superseded, or out of attempts).
    fn mark_closed(&self, epoch: u64, end: SessionEnd) -> Option<Duration> {
        if matches!(end, SessionEnd::Superseded) {
            return None;
        }

        let (delay, attempts, max_attempts) = {
            let mut shared = self.lock();
            if shared.epoch != epoch {
                return None;
            }
            shared.outbound = None;
            set_connection_state(&self.state, ConnectionState::Closed);
            let delay = shared.backoff.next_delay_and_advance();
            (
                delay,
                shared.backoff.attempts(),
                shared.backoff.max_attempts(),
            )
        };

        match end {
            SessionEnd::Failed(e) => {
                tracing::error!(error = %e, "Session connection failed");
                self.event_bus.publish(&PlayerEvent::Error {
                    message: e.to_string(),
                });
            }
            _ => tracing::info!("Session connection closed"),
        }

        self.event_bus.publish(&PlayerEvent::Disconnected {
            will_reconnect: delay.is_some(),
        });

        match delay {
            Some(delay) => {
                tracing::info!(
                    attempt = attempts,
                    max_attempts,
                    delay_ms = delay_millis(delay),
                    "Scheduling reconnect"
                );
                Some(delay)
            }
            None => {
                tracing::error!(attempts, "Max reconnection attempts reached, giving up");
                self.event_bus
                    .publish(&PlayerEvent::ReconnectExhausted { attempts });
                None
            }
        }
    }

    fn begin_attempt(&self, epoch: u64) -> bool {
        let shared = self.lock();
        if shared.epoch != epoch {
            return false;
        }
        set_connection_state(&self.state, ConnectionState::Connecting);
        true
    }
}

async fn close_sink(sink: &mut FrameSink) {
    let timeout = Duration::from_millis(CLOSE_TIMEOUT_MS);
    match tokio::time::timeout(timeout, sink.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::debug!(error = %e, "Error closing session connection"),
        Err(_) => tracing::debug!("Timed out closing session connection"),
    }
}
