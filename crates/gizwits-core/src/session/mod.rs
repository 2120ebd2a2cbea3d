// ── Relay sessions ──
//
// One `Channel` per (endpoint, channel kind). The registry creates them
// lazily; each channel owns its socket task, heartbeat and login retries,
// and reports upward through a `ChannelObserver`.

mod channel;
mod connector;
#[cfg(any(test, feature = "test-util"))]
mod memory;
mod registry;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use gizwits_api::InboundMessage;
use secrecy::SecretString;
use tokio_util::sync::CancellationToken;

use crate::config::GatewayConfig;
use crate::error::CoreError;

pub use channel::{ChannelKey, ChannelState, ChannelStatus, LoginStep};
pub use connector::{Connector, WsConnector};
#[cfg(any(test, feature = "test-util"))]
pub use memory::{MemoryConnector, MemorySocket};
pub use registry::SessionRegistry;

// ── Settings ─────────────────────────────────────────────────────────

/// Timing knobs shared by every channel of a registry.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub heartbeat_interval: Duration,
    pub keepalive: Duration,
    pub retry_wait: Duration,
    pub retry_send_delay: Duration,
    pub max_login_retries: u32,
}

impl From<&GatewayConfig> for SessionSettings {
    fn from(config: &GatewayConfig) -> Self {
        Self {
            heartbeat_interval: config.heartbeat_interval,
            keepalive: config.keepalive,
            retry_wait: config.retry_wait,
            retry_send_delay: config.retry_send_delay,
            max_login_retries: config.max_login_retries,
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(55),
            keepalive: Duration::from_secs(180),
            retry_wait: Duration::from_secs(5),
            retry_send_delay: Duration::from_secs(2),
            max_login_retries: 3,
        }
    }
}

/// Identity presented in every `login_req`.
#[derive(Clone)]
pub struct LoginCredentials {
    pub app_id: String,
    pub uid: String,
    pub token: SecretString,
}

impl fmt::Debug for LoginCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginCredentials")
            .field("app_id", &self.app_id)
            .field("uid", &self.uid)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

// ── Observer ─────────────────────────────────────────────────────────

/// Receives what channels learn from the relay.
///
/// Called from channel driver tasks; implementations must not block.
pub trait ChannelObserver: Send + Sync {
    /// The relay accepted a subscription for `did`.
    fn on_subscribed(&self, key: &ChannelKey, did: &str);

    /// The relay refused a subscription; `did` is no longer tracked.
    fn on_subscribe_failed(&self, key: &ChannelKey, did: &str);

    /// Device traffic: online status, attribute notifications, raw data.
    fn on_message(&self, key: &ChannelKey, message: InboundMessage);

    /// Transport or protocol failure on the channel.
    fn on_failure(&self, key: &ChannelKey, error: CoreError);
}

/// State shared by a registry and all of its channels.
pub(crate) struct SessionContext {
    pub(crate) settings: SessionSettings,
    pub(crate) credentials: ArcSwapOption<LoginCredentials>,
    pub(crate) connector: Arc<dyn Connector>,
    pub(crate) observer: Arc<dyn ChannelObserver>,
    pub(crate) cancel: CancellationToken,
}
