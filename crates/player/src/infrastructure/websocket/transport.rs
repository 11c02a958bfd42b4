//! Socket seam for the session client.
//!
//! The client never touches a socket directly. It asks a [`Connector`] for a
//! framed text sink/stream pair, which lets tests substitute an in-memory peer.

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::future;
use futures_util::stream::BoxStream;
use futures_util::{Sink, SinkExt, StreamExt};
use thiserror::Error;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use url::Url;

/// Outbound text frames.
pub type FrameSink = Pin<Box<dyn Sink<String, Error = TransportError> + Send>>;

/// Inbound text frames. Ends when the peer closes.
pub type FrameStream = BoxStream<'static, Result<String, TransportError>>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("Connection failed: {0}")]
    Connect(String),
    #[error("Socket error: {0}")]
    Socket(String),
}

/// Opens framed connections.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn open(&self, url: &Url) -> Result<(FrameSink, FrameStream), TransportError>;
}

/// Production connector over tokio-tungstenite.
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteConnector;

#[async_trait]
impl Connector for TungsteniteConnector {
    async fn open(&self, url: &Url) -> Result<(FrameSink, FrameStream), TransportError> {
        let (ws_stream, _response) = connect_async(url.as_str())
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        let (write, read) = ws_stream.split();

        let sink = write
            .sink_map_err(|e| TransportError::Socket(e.to_string()))
            .with(|text: String| future::ready(Ok::<_, TransportError>(Message::Text(text))));

        let stream = read
            .filter_map(|frame| {
                future::ready(match frame {
                    Ok(Message::Text(text)) => Some(Ok(text)),
                    Ok(Message::Binary(bytes)) => {
                        tracing::debug!(len = bytes.len(), "Ignoring binary frame");
                        None
                    }
                    Ok(Message::Close(frame)) => {
                        tracing::info!(?frame, "Server closed connection");
                        None
                    }
                    Ok(_) => None,
                    Err(e) => Some(Err(TransportError::Socket(e.to_string()))),
                })
            })
            .boxed();

        Ok((Box::pin(sink), stream))
    }
}
