// ── Inbound dispatch ──
//
// `GatewayState` is the observer every channel reports to. It owns the
// bound-device set, the sub-device directory and the event sender, and
// turns relay traffic into `GatewayEvent`s. It never holds the registry.

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use gizwits_api::frame::{LEN_DID, Report, parse_frame};
use gizwits_api::{ChannelKind, InboundMessage};
use indexmap::IndexMap;
use tokio::sync::broadcast;
use tracing::{debug, info, trace, warn};

use crate::directory::SubDeviceDirectory;
use crate::error::CoreError;
use crate::event::GatewayEvent;
use crate::model::{BoundDevice, SubDevice};
use crate::session::{ChannelKey, ChannelObserver};

const EVENT_CHANNEL_SIZE: usize = 256;

/// `None` until initialization succeeds.
type DeviceSet = Option<IndexMap<String, BoundDevice>>;

pub(crate) struct GatewayState {
    devices: RwLock<DeviceSet>,
    directory: SubDeviceDirectory,
    events: broadcast::Sender<GatewayEvent>,
}

impl GatewayState {
    pub(crate) fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        Self {
            devices: RwLock::new(None),
            directory: SubDeviceDirectory::new(),
            events,
        }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.events.subscribe()
    }

    pub(crate) fn emit(&self, event: GatewayEvent) {
        // No receivers is fine: nobody is listening yet.
        let _ = self.events.send(event);
    }

    /// Publish `err` as an error event.
    pub(crate) fn report(&self, err: &CoreError) {
        self.emit(GatewayEvent::error(err));
    }

    pub(crate) fn directory(&self) -> &SubDeviceDirectory {
        &self.directory
    }

    // ── Bound devices ────────────────────────────────────────────────

    fn read(&self) -> RwLockReadGuard<'_, DeviceSet> {
        self.devices.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, DeviceSet> {
        self.devices.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn is_initialized(&self) -> bool {
        self.read().is_some()
    }

    /// Forget every bound device and sub-device snapshot; operations fail
    /// until the next init.
    pub(crate) fn reset_devices(&self) {
        *self.write() = None;
        self.directory.clear();
    }

    /// Install a fresh bound-device set. Later duplicates of a did win.
    pub(crate) fn install_devices(&self, devices: Vec<BoundDevice>) -> Vec<BoundDevice> {
        let set: IndexMap<String, BoundDevice> =
            devices.into_iter().map(|d| (d.did.clone(), d)).collect();
        let snapshot = set.values().cloned().collect();
        *self.write() = Some(set);
        snapshot
    }

    /// Insert or replace one device. Returns the full list afterwards.
    pub(crate) fn insert_device(&self, device: BoundDevice) -> Result<Vec<BoundDevice>, CoreError> {
        let mut guard = self.write();
        let set = guard.as_mut().ok_or_else(CoreError::not_initialized)?;
        set.insert(device.did.clone(), device);
        Ok(set.values().cloned().collect())
    }

    /// Resolve a bound device, checking initialization first.
    pub(crate) fn device(&self, did: &str) -> Result<BoundDevice, CoreError> {
        let guard = self.read();
        let set = guard.as_ref().ok_or_else(CoreError::not_initialized)?;
        set.get(did).cloned().ok_or_else(|| CoreError::DeviceNotFound {
            did: did.to_owned(),
        })
    }

    pub(crate) fn devices(&self) -> Option<Vec<BoundDevice>> {
        self.read().as_ref().map(|set| set.values().cloned().collect())
    }

    fn is_bound(&self, did: &str) -> bool {
        self.read().as_ref().is_some_and(|set| set.contains_key(did))
    }

    fn set_online(&self, did: &str, online: bool) -> bool {
        let mut guard = self.write();
        match guard.as_mut().and_then(|set| set.get_mut(did)) {
            Some(device) => {
                device.is_online = online;
                true
            }
            None => false,
        }
    }

    // ── Raw data ─────────────────────────────────────────────────────

    /// Route a raw payload from the custom channel.
    ///
    /// Sub-device management frames update the directory; anything else,
    /// including frames that fail to parse, is forwarded untouched.
    fn on_raw(&self, did: &str, raw: Vec<u8>) {
        let report = match parse_frame(&raw).and_then(|frame| Report::decode(&frame)) {
            Ok(report) => report,
            Err(e) => {
                debug!(did, error = %e, "raw payload is not a sub-device frame");
                self.emit(GatewayEvent::RawReceived {
                    did: did.to_owned(),
                    raw,
                });
                return;
            }
        };

        match report {
            Report::SubDeviceStatus { sub_did, online } => {
                if !self.directory.set_online(did, sub_did, online) {
                    debug!(did, sub_did, "status for unknown sub-device ignored");
                    return;
                }
                if let Some(sub_devices) = self.directory.snapshot(did) {
                    self.emit(GatewayEvent::SubDevicesUpdated {
                        did: did.to_owned(),
                        sub_devices,
                    });
                }
            }
            Report::SubDeviceList { records } => {
                let sub_devices = self
                    .directory
                    .replace(did, records.into_iter().map(SubDevice::from).collect());
                info!(did, count = sub_devices.len(), "sub-device list replaced");
                self.emit(GatewayEvent::SubDevicesUpdated {
                    did: did.to_owned(),
                    sub_devices,
                });
            }
            Report::AddAck { status } => log_ack(did, "add", status),
            Report::DeleteAck { status } => log_ack(did, "delete", status),
            Report::Other { action } => {
                trace!(did, action, "forwarding raw frame");
                self.emit(GatewayEvent::RawReceived {
                    did: did.to_owned(),
                    raw,
                });
            }
        }
    }
}

fn log_ack(did: &str, op: &str, status: u8) {
    if status == 0 {
        info!(did, op, "sub-device request acknowledged");
    } else {
        warn!(did, op, status, "sub-device request rejected");
    }
}

/// The relay may suffix raw-data dids (`<did>/<suffix>`); keep the device part.
fn parent_did(did: &str) -> &str {
    did.get(..LEN_DID).unwrap_or(did)
}

// ── ChannelObserver ──────────────────────────────────────────────────

impl ChannelObserver for GatewayState {
    fn on_subscribed(&self, key: &ChannelKey, did: &str) {
        if key.kind == ChannelKind::Custom {
            self.emit(GatewayEvent::Connected { did: did.to_owned() });
        }
    }

    fn on_subscribe_failed(&self, key: &ChannelKey, did: &str) {
        self.report(&CoreError::Transport {
            message: format!("{key}: subscribe failed for {did}"),
        });
    }

    fn on_message(&self, key: &ChannelKey, message: InboundMessage) {
        match message {
            InboundMessage::Raw { did, raw } => {
                let did = parent_did(&did);
                if !self.is_bound(did) {
                    debug!(%key, did, "raw data for unbound device ignored");
                    return;
                }
                if key.kind == ChannelKind::Custom {
                    self.on_raw(did, raw);
                } else {
                    self.emit(GatewayEvent::RawReceived {
                        did: did.to_owned(),
                        raw,
                    });
                }
            }
            InboundMessage::OnlineStatus { did, online } => {
                if key.kind != ChannelKind::Custom {
                    trace!(%key, did, "online status ignored on attrs channel");
                    return;
                }
                if self.set_online(&did, online) {
                    self.emit(GatewayEvent::OnlineStatusChanged { did, online });
                } else {
                    debug!(%key, did, "online status for unbound device ignored");
                }
            }
            InboundMessage::Notification { did, attrs } => {
                if self.is_bound(&did) {
                    self.emit(GatewayEvent::AttrsReceived { did, attrs });
                } else {
                    debug!(%key, did, "attributes for unbound device ignored");
                }
            }
            InboundMessage::Pong
            | InboundMessage::LoginResult { .. }
            | InboundMessage::SubscribeResult { .. }
            | InboundMessage::InvalidMessage { .. }
            | InboundMessage::Unrecognized { .. } => {
                trace!(%key, "session message reached dispatch, ignored");
            }
        }
    }

    fn on_failure(&self, key: &ChannelKey, error: CoreError) {
        warn!(%key, error = %error, "channel failure");
        self.report(&error);
    }
}
