//! Session management and device facade for the Gizwits device relay.
//!
//! This crate sits between `gizwits-api` (wire types, socket task, frame
//! codec, directory HTTP client) and applications:
//!
//! - **[`Gateway`]** - the public operation surface. [`init()`](Gateway::init)
//!   creates the user session and loads the bound devices; `connect`,
//!   `read`, `write` and the sub-device operations then resolve a did to
//!   its relay channels.
//!
//! - **[`SessionRegistry`]** - one [`Channel`](session) per
//!   (relay endpoint, [`ChannelKind`]) pair, each running the
//!   connect → login → subscribe → ready handshake with heartbeat and
//!   bounded login retries.
//!
//! - **[`SubDeviceDirectory`]** - per-parent sub-device snapshots rebuilt
//!   from full-list frames and patched by status frames.
//!
//! - **[`GatewayEvent`]** - everything learned asynchronously, delivered on
//!   a broadcast channel ([`Gateway::events`]).

pub mod config;
pub mod directory;
mod dispatch;
pub mod error;
pub mod event;
pub mod gateway;
pub mod model;
pub mod sequence;
pub mod session;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{DEFAULT_API_HOST, GatewayConfig};
pub use directory::SubDeviceDirectory;
pub use error::{CoreError, ErrorKind};
pub use event::GatewayEvent;
pub use gateway::Gateway;
pub use model::{BindInfo, BoundDevice, DeviceType, SubDevice, SubDeviceCandidate};
pub use sequence::SequenceCounter;
pub use session::{
    ChannelKey, ChannelObserver, ChannelStatus, Connector, SessionRegistry, SessionSettings,
    WsConnector,
};
#[cfg(any(test, feature = "test-util"))]
pub use session::{MemoryConnector, MemorySocket};

pub use gizwits_api::{ChannelKind, Endpoint};
