// ── Socket factories ──
//
// Channels never dial sockets themselves; they ask a `Connector`. The
// production connector spawns a real websocket task.

use gizwits_api::{SocketEvent, SocketHandle};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Opens relay sockets for channels.
pub trait Connector: Send + Sync {
    /// Start connecting to `url`. Cancelling `cancel` closes the socket.
    fn open(
        &self,
        url: &Url,
        cancel: CancellationToken,
    ) -> (SocketHandle, mpsc::UnboundedReceiver<SocketEvent>);
}

/// Real websocket connector.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

impl Connector for WsConnector {
    fn open(
        &self,
        url: &Url,
        cancel: CancellationToken,
    ) -> (SocketHandle, mpsc::UnboundedReceiver<SocketEvent>) {
        SocketHandle::connect(url.clone(), cancel)
    }
}
