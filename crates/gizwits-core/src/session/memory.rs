// ── In-memory sockets ──
//
// Test double for `Connector`: every socket is handed to the caller, who
// plays the relay. Built only for tests and the `test-util` feature.

use gizwits_api::{InboundMessage, OutboundMessage, SocketEvent, SocketHandle};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::Connector;

/// Connector whose sockets are driven by the caller instead of a relay.
///
/// Every `open` yields a [`MemorySocket`] on the receiver returned by
/// [`MemoryConnector::new`]. Nothing happens on the socket until the
/// caller calls [`MemorySocket::accept`].
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    sockets: mpsc::UnboundedSender<MemorySocket>,
}

impl MemoryConnector {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<MemorySocket>) {
        let (sockets, rx) = mpsc::unbounded_channel();
        (Self { sockets }, rx)
    }
}

impl Connector for MemoryConnector {
    fn open(
        &self,
        url: &Url,
        cancel: CancellationToken,
    ) -> (SocketHandle, mpsc::UnboundedReceiver<SocketEvent>) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let socket = MemorySocket {
            url: url.clone(),
            outbound: outbound_rx,
            events: event_tx,
            cancel: cancel.clone(),
        };
        if self.sockets.send(socket).is_err() {
            tracing::debug!(url = %url, "memory socket dropped: nobody is accepting");
        }
        (SocketHandle::from_parts(outbound_tx, cancel), event_rx)
    }
}

/// Relay side of an in-memory socket.
#[derive(Debug)]
pub struct MemorySocket {
    pub url: Url,
    outbound: mpsc::UnboundedReceiver<OutboundMessage>,
    events: mpsc::UnboundedSender<SocketEvent>,
    cancel: CancellationToken,
}

impl MemorySocket {
    /// Complete the handshake.
    pub fn accept(&self) {
        let _ = self.events.send(SocketEvent::Opened);
    }

    /// Deliver a relay message to the client.
    pub fn reply(&self, message: InboundMessage) {
        let _ = self.events.send(SocketEvent::Message(message));
    }

    /// Report a socket error followed by a close.
    pub fn fail(&self, reason: &str) {
        let _ = self.events.send(SocketEvent::Error(reason.to_owned()));
        let _ = self.events.send(SocketEvent::Closed {
            code: None,
            reason: reason.to_owned(),
        });
    }

    /// Close from the relay side.
    pub fn close(&self, code: u16, reason: &str) {
        let _ = self.events.send(SocketEvent::Closed {
            code: Some(code),
            reason: reason.to_owned(),
        });
    }

    /// Next message the client wrote, waiting for it if necessary.
    pub async fn recv(&mut self) -> Option<OutboundMessage> {
        self.outbound.recv().await
    }

    /// Next message the client wrote, if one is already queued.
    pub fn try_recv(&mut self) -> Option<OutboundMessage> {
        self.outbound.try_recv().ok()
    }

    /// `true` once the client closed this socket.
    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
