//! # stream::transport
//!
//! The [`Transport`] seam between the connection state machine and the
//! network. A transport opens a [`TransportSession`]: a channel of
//! [`TransportEvent`]s plus a shutdown signal. The production implementation
//! ([`WsTransport`]) drives a `tokio-tungstenite` client on its own task.
//!
//! A session reports exactly one terminal event (`Closed` or `Error`) and
//! then goes quiet. Dropping the session closes the socket.

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::FeedError;

const SESSION_CHANNEL_SIZE: usize = 256;

#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Opened,
    Frame(String),
    Closed { reason: Option<String> },
    Error(String),
}

pub struct TransportSession {
    id:       Uuid,
    events:   mpsc::Receiver<TransportEvent>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl TransportSession {
    pub fn new(
        id:       Uuid,
        events:   mpsc::Receiver<TransportEvent>,
        shutdown: oneshot::Sender<()>,
    ) -> Self {
        Self {
            id,
            events,
            shutdown: Some(shutdown),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// `None` once the transport side has gone away.
    pub async fn next_event(&mut self) -> Option<TransportEvent> {
        self.events.recv().await
    }

    pub fn close(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

pub trait Transport: Send + Sync + 'static {
    fn open(&mut self, url: &str) -> TransportSession;
}

// ─── WebSocket ────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Clone, Copy)]
pub struct WsTransport;

impl Transport for WsTransport {
    fn open(&mut self, url: &str) -> TransportSession {
        let id = Uuid::new_v4();
        let (event_tx, event_rx) = mpsc::channel(SESSION_CHANNEL_SIZE);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(run_session(id, url.to_string(), event_tx, shutdown_rx));
        TransportSession::new(id, event_rx, shutdown_tx)
    }
}

async fn run_session(
    session_id:   Uuid,
    url:          String,
    events:       mpsc::Sender<TransportEvent>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let connected = tokio::select! {
        _ = &mut shutdown => {
            debug!(%session_id, "Session cancelled before connect completed");
            return;
        }
        result = connect_async(url.as_str()) => result.map_err(FeedError::from),
    };

    let mut socket = match connected {
        Ok((socket, _response)) => socket,
        Err(e) => {
            let _ = events.send(TransportEvent::Error(e.to_string())).await;
            return;
        }
    };

    info!(%session_id, "🔌 WebSocket handshake complete");
    if events.send(TransportEvent::Opened).await.is_err() {
        let _ = socket.close(None).await;
        return;
    }

    loop {
        tokio::select! {
            // Fires on an explicit close and when the session is dropped.
            _ = &mut shutdown => {
                debug!(%session_id, "Closing WebSocket on request");
                let _ = socket.close(None).await;
                return;
            }

            frame = socket.next() => {
                let event = match frame {
                    Some(Ok(Message::Text(text))) => TransportEvent::Frame(text),
                    Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes) {
                        Ok(text) => TransportEvent::Frame(text),
                        Err(_) => {
                            warn!(%session_id, "Ignoring non UTF-8 binary frame");
                            continue;
                        }
                    },
                    Some(Ok(Message::Ping(payload))) => {
                        let _ = socket.send(Message::Pong(payload)).await;
                        continue;
                    }
                    Some(Ok(Message::Close(frame))) => TransportEvent::Closed {
                        reason: frame.map(|f| f.reason.to_string()),
                    },
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => TransportEvent::Error(FeedError::from(e).to_string()),
                    None => TransportEvent::Closed { reason: None },
                };

                let terminal = matches!(event, TransportEvent::Closed { .. } | TransportEvent::Error(_));
                if events.send(event).await.is_err() || terminal {
                    return;
                }
            }
        }
    }
}

// ─── Test double ──────────────────────────────────────────────────────────────
