// gizwits-api: Async Rust client for the Gizwits device relay
//
// Wire layer only: JSON envelopes exchanged over the relay websocket,
// the binary sub-device frame codec carried inside raw-data envelopes,
// the socket task, and the HTTP directory service. No session state.

pub mod directory;
pub mod endpoint;
pub mod error;
pub mod frame;
pub mod message;
pub mod transport;
pub mod websocket;

pub use directory::{BindRequest, BindResponse, BindingDevice, DirectoryClient, UserSession};
pub use endpoint::Endpoint;
pub use error::Error;
pub use frame::FrameError;
pub use message::{ChannelKind, DidRef, InboundMessage, OutboundMessage, ReadRequest, WriteRequest};
pub use transport::TransportConfig;
pub use websocket::{SocketEvent, SocketHandle};
