//! In-memory [`Connector`] for driving the session client without a network.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use futures_channel::mpsc;
use futures_util::{sink, StreamExt};
use tokio::time::Instant;
use url::Url;

use crate::infrastructure::websocket::transport::{
    Connector, FrameSink, FrameStream, TransportError,
};

/// What a single `open` call does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenOutcome {
    /// Handshake succeeds; a [`MockServer`] is created for the connection
    Accept,
    /// Handshake fails with `TransportError::Connect`
    Refuse,
    /// Handshake never completes
    Hang,
}

/// Server side of one accepted connection.
#[derive(Clone)]
pub struct MockServer {
    inbound: mpsc::UnboundedSender<Result<String, TransportError>>,
    sent: Arc<Mutex<Vec<String>>>,
}

impl MockServer {
    /// Deliver a text frame to the client. Returns false once closed.
    pub fn push_text(&self, text: impl Into<String>) -> bool {
        self.inbound.unbounded_send(Ok(text.into())).is_ok()
    }

    /// Fail the connection with a socket error.
    pub fn fail(&self, message: &str) -> bool {
        self.inbound
            .unbounded_send(Err(TransportError::Socket(message.to_string())))
            .is_ok()
    }

    /// Close the connection from the server side.
    pub fn close(&self) {
        self.inbound.close_channel();
    }

    /// Frames the client has written to this connection.
    pub fn sent(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Scripted connector. Outcomes queued with [`MockConnector::push`] are used
/// first; after that every open gets the fallback outcome.
pub struct MockConnector {
    fallback: OpenOutcome,
    script: Mutex<VecDeque<OpenOutcome>>,
    opened: Mutex<Vec<(Url, Instant)>>,
    servers: Mutex<Vec<MockServer>>,
}

impl MockConnector {
    pub fn new(fallback: OpenOutcome) -> Self {
        Self {
            fallback,
            script: Mutex::new(VecDeque::new()),
            opened: Mutex::new(Vec::new()),
            servers: Mutex::new(Vec::new()),
        }
    }

    pub fn accepting() -> Arc<Self> {
        Arc::new(Self::new(OpenOutcome::Accept))
    }

    pub fn refusing() -> Arc<Self> {
        Arc::new(Self::new(OpenOutcome::Refuse))
    }

    /// Queue the outcome of the next unscripted open.
    pub fn push(&self, outcome: OpenOutcome) -> &Self {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(outcome);
        self
    }

    pub fn open_count(&self) -> usize {
        self.opened
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn opened_urls(&self) -> Vec<Url> {
        self.opened
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(url, _)| url.clone())
            .collect()
    }

    /// Instants at which each open was attempted.
    pub fn open_times(&self) -> Vec<Instant> {
        self.opened
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, at)| *at)
            .collect()
    }

    /// Server handle of the most recently accepted connection.
    pub fn last_server(&self) -> Option<MockServer> {
        self.servers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }

    pub fn accepted_count(&self) -> usize {
        self.servers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn next_outcome(&self) -> OpenOutcome {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or(self.fallback)
    }

    fn accept(&self) -> (FrameSink, FrameStream) {
        let (inbound, inbound_rx) = mpsc::unbounded();
        let sent = Arc::new(Mutex::new(Vec::new()));

        let recorder = Arc::clone(&sent);
        let sink = sink::unfold((), move |(), text: String| {
            let recorder = Arc::clone(&recorder);
            async move {
                recorder
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(text);
                Ok::<_, TransportError>(())
            }
        });

        self.servers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(MockServer { inbound, sent });

        (Box::pin(sink), inbound_rx.boxed())
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn open(&self, url: &Url) -> Result<(FrameSink, FrameStream), TransportError> {
        self.opened
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((url.clone(), Instant::now()));

        match self.next_outcome() {
            OpenOutcome::Accept => Ok(self.accept()),
            OpenOutcome::Refuse => Err(TransportError::Connect("connection refused".to_string())),
            OpenOutcome::Hang => std::future::pending().await,
        }
    }
}
