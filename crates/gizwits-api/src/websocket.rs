//! One relay websocket, driven by a background task.
//!
//! [`SocketHandle::connect`] spawns a task that opens the socket, writes
//! every [`OutboundMessage`] queued on the handle, and reports what happens
//! as [`SocketEvent`]s. The task never reconnects; session recovery lives
//! one layer up, where login and subscription state is known.
//!
//! # Example
//!
//! ```rust,ignore
//! use gizwits_api::{OutboundMessage, SocketEvent, SocketHandle};
//! use tokio_util::sync::CancellationToken;
//!
//! let url = url::Url::parse("wss://m2m.gizwits.com:8880/ws/app/v1")?;
//! let (socket, mut events) = SocketHandle::connect(url, CancellationToken::new());
//!
//! while let Some(event) = events.recv().await {
//!     if matches!(event, SocketEvent::Opened) {
//!         socket.send(OutboundMessage::Ping);
//!     }
//! }
//! ```

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{self, protocol::frame::coding::CloseCode};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;
use crate::message::{InboundMessage, OutboundMessage};

// ── SocketEvent ──────────────────────────────────────────────────────

/// Lifecycle and traffic notifications from a socket task.
#[derive(Debug, Clone, PartialEq)]
pub enum SocketEvent {
    /// The handshake completed; messages can now flow.
    Opened,
    /// A parsed text frame from the relay.
    Message(InboundMessage),
    /// Connect, read, or write failure. Always followed by [`SocketEvent::Closed`].
    Error(String),
    /// The socket is gone. Terminal: no further events follow.
    Closed { code: Option<u16>, reason: String },
}

// ── SocketHandle ─────────────────────────────────────────────────────

/// Write side of a socket task plus its shutdown switch.
#[derive(Debug, Clone)]
pub struct SocketHandle {
    outbound: mpsc::UnboundedSender<OutboundMessage>,
    cancel: CancellationToken,
}

impl SocketHandle {
    /// Spawn a socket task for `url`.
    ///
    /// Returns immediately; the connection attempt runs in the background
    /// and its outcome arrives on the returned receiver.
    pub fn connect(
        url: Url,
        cancel: CancellationToken,
    ) -> (Self, mpsc::UnboundedReceiver<SocketEvent>) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            run_socket(url, outbound_rx, event_tx, task_cancel).await;
        });

        (Self::from_parts(outbound_tx, cancel), event_rx)
    }

    /// Wrap an existing outbound queue. Used by in-memory connectors.
    pub fn from_parts(
        outbound: mpsc::UnboundedSender<OutboundMessage>,
        cancel: CancellationToken,
    ) -> Self {
        Self { outbound, cancel }
    }

    /// Queue a message for writing. `false` once the task has exited.
    pub fn send(&self, message: OutboundMessage) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        self.outbound.send(message).is_ok()
    }

    /// Ask the task to send a close frame and exit.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled() || self.outbound.is_closed()
    }
}

// ── Socket task ──────────────────────────────────────────────────────

async fn run_socket(
    url: Url,
    outbound_rx: mpsc::UnboundedReceiver<OutboundMessage>,
    event_tx: mpsc::UnboundedSender<SocketEvent>,
    cancel: CancellationToken,
) {
    let closed = match connect_and_pump(&url, outbound_rx, &event_tx, &cancel).await {
        Ok(closed) => closed,
        Err(e) => {
            tracing::warn!(url = %url, error = %e, "relay socket failed");
            let reason = e.to_string();
            let _ = event_tx.send(SocketEvent::Error(reason.clone()));
            SocketEvent::Closed { code: None, reason }
        }
    };
    // Receiver may already be gone if the owning channel moved on.
    let _ = event_tx.send(closed);
    tracing::debug!(url = %url, "relay socket task exiting");
}

/// Open the socket and shuttle frames until either side closes it.
///
/// Returns the terminal [`SocketEvent::Closed`] for orderly shutdowns.
async fn connect_and_pump(
    url: &Url,
    mut outbound_rx: mpsc::UnboundedReceiver<OutboundMessage>,
    event_tx: &mpsc::UnboundedSender<SocketEvent>,
    cancel: &CancellationToken,
) -> Result<SocketEvent, Error> {
    tracing::info!(url = %url, "connecting relay socket");

    let connected = tokio::select! {
        biased;
        () = cancel.cancelled() => {
            return Ok(closed_by_client());
        }
        result = tokio_tungstenite::connect_async(url.as_str()) => result,
    };
    let (ws_stream, _response) = connected.map_err(|e| Error::WebSocketConnect(e.to_string()))?;

    tracing::info!(url = %url, "relay socket open");
    let _ = event_tx.send(SocketEvent::Opened);

    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                let _ = write.send(tungstenite::Message::Close(None)).await;
                return Ok(closed_by_client());
            }
            queued = outbound_rx.recv() => {
                let Some(message) = queued else {
                    let _ = write.send(tungstenite::Message::Close(None)).await;
                    return Ok(closed_by_client());
                };
                let json = message.to_json()?;
                tracing::debug!(cmd = message.cmd(), "relay socket send");
                write
                    .send(tungstenite::Message::text(json))
                    .await
                    .map_err(|e| Error::WebSocketConnect(e.to_string()))?;
            }
            frame = read.next() => {
                match frame {
                    Some(Ok(tungstenite::Message::Text(text))) => {
                        match InboundMessage::parse(text.as_str()) {
                            Ok(message) => {
                                tracing::debug!(?message, "relay socket receive");
                                let _ = event_tx.send(SocketEvent::Message(message));
                            }
                            Err(e) => {
                                tracing::debug!(error = %e, "dropping unparseable relay frame");
                            }
                        }
                    }
                    Some(Ok(tungstenite::Message::Close(frame))) => {
                        let (code, reason) = frame.map_or((None, String::new()), |cf| {
                            (Some(u16::from(cf.code)), cf.reason.as_str().to_owned())
                        });
                        tracing::info!(?code, %reason, "relay socket closed by server");
                        return Ok(SocketEvent::Closed { code, reason });
                    }
                    Some(Err(e)) => {
                        return Err(Error::WebSocketConnect(e.to_string()));
                    }
                    None => {
                        tracing::info!("relay socket stream ended");
                        return Ok(SocketEvent::Closed {
                            code: None,
                            reason: "stream ended".into(),
                        });
                    }
                    // Binary, Ping, Pong, Frame
                    Some(Ok(_)) => {}
                }
            }
        }
    }
}

fn closed_by_client() -> SocketEvent {
    SocketEvent::Closed {
        code: Some(u16::from(CloseCode::Normal)),
        reason: "closed by client".into(),
    }
}

// ── Tests ────────────────────────────────────────────────────────────
