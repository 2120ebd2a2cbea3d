// ── Session registry ──
//
// Maps (endpoint, channel kind) to a live `Channel`, creating channels on
// first use. Send failures against a dead socket trigger a rate-limited
// reconnect of both channel kinds for the device.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use dashmap::DashMap;
use gizwits_api::{ChannelKind, Endpoint, OutboundMessage};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::channel::Channel;
use super::{
    ChannelKey, ChannelObserver, ChannelStatus, Connector, LoginCredentials, SessionContext,
    SessionSettings,
};
use crate::error::CoreError;

/// Owner of every channel of one gateway.
pub struct SessionRegistry {
    ctx: Arc<SessionContext>,
    channels: DashMap<ChannelKey, Arc<Channel>>,
}

impl SessionRegistry {
    pub fn new(
        settings: SessionSettings,
        connector: Arc<dyn Connector>,
        observer: Arc<dyn ChannelObserver>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            ctx: Arc::new(SessionContext {
                settings,
                credentials: ArcSwapOption::empty(),
                connector,
                observer,
                cancel,
            }),
            channels: DashMap::new(),
        }
    }

    /// Credentials used by every subsequent login.
    pub fn set_credentials(&self, credentials: LoginCredentials) {
        self.ctx.credentials.store(Some(Arc::new(credentials)));
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.ctx.settings
    }

    /// Ensure a channel for `(endpoint, kind)` exists and serves `did`.
    ///
    /// Opens the socket when it is down, re-subscribes when it is already
    /// logged in, and only records the did while a handshake is running.
    pub fn connect(&self, endpoint: &Endpoint, kind: ChannelKind, did: &str) -> Result<(), CoreError> {
        let channel = self.get_or_create(endpoint, kind)?;
        channel.connect(did);
        Ok(())
    }

    /// Send on the channel serving `did`.
    ///
    /// `Ok(false)` means the socket was not open; a reconnect of both
    /// channel kinds is started unless one ran within the cooldown.
    pub fn send(
        &self,
        endpoint: &Endpoint,
        kind: ChannelKind,
        did: &str,
        message: OutboundMessage,
    ) -> Result<bool, CoreError> {
        let key = ChannelKey::new(endpoint.clone(), kind);
        let channel = self
            .channel(&key)
            .ok_or_else(|| CoreError::ChannelNotFound {
                did: did.to_owned(),
                kind: kind.to_string(),
            })?;

        if channel.send(message) {
            return Ok(true);
        }

        if channel.claim_reconnect(self.ctx.settings.retry_wait) {
            info!(%key, did, "send failed, reconnecting both channels");
            for kind in ChannelKind::ALL {
                if let Err(e) = self.connect(endpoint, kind, did) {
                    warn!(%key, did, error = %e, "reconnect failed");
                }
            }
            channel.schedule_login(self.ctx.settings.retry_send_delay);
        } else {
            debug!(%key, did, "send failed, reconnect already under way");
        }
        Ok(false)
    }

    /// Current status of a channel, `None` if it was never created.
    pub fn status(&self, endpoint: &Endpoint, kind: ChannelKind) -> Option<ChannelStatus> {
        self.channel(&ChannelKey::new(endpoint.clone(), kind))
            .map(|c| c.status())
    }

    /// Whether the channel for `(endpoint, kind)` tracks `did`.
    pub fn is_tracking(&self, endpoint: &Endpoint, kind: ChannelKind, did: &str) -> bool {
        self.channel(&ChannelKey::new(endpoint.clone(), kind))
            .is_some_and(|c| c.is_tracking(did))
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Close every channel and forget them.
    pub fn shutdown(&self) {
        for entry in &self.channels {
            entry.value().close();
        }
        self.channels.clear();
        debug!("session registry cleared");
    }

    fn channel(&self, key: &ChannelKey) -> Option<Arc<Channel>> {
        self.channels.get(key).map(|c| Arc::clone(c.value()))
    }

    fn get_or_create(&self, endpoint: &Endpoint, kind: ChannelKind) -> Result<Arc<Channel>, CoreError> {
        let key = ChannelKey::new(endpoint.clone(), kind);
        if let Some(channel) = self.channel(&key) {
            return Ok(channel);
        }
        let url = endpoint.ws_url().map_err(|e| CoreError::Config {
            message: format!("invalid relay endpoint {endpoint}: {e}"),
        })?;
        let channel = self
            .channels
            .entry(key.clone())
            .or_insert_with(|| Channel::new(key, url, Arc::clone(&self.ctx)));
        Ok(Arc::clone(channel.value()))
    }
}
