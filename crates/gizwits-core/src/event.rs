// ── Gateway events ──
//
// Everything the gateway learns asynchronously is published as a
// `GatewayEvent` on one broadcast channel.

use serde::Serialize;

use crate::error::{CoreError, ErrorKind};
use crate::model::{BoundDevice, SubDevice};

/// Notification published by a [`Gateway`](crate::Gateway).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GatewayEvent {
    /// The bound-device set was (re)built.
    Initialized { devices: Vec<BoundDevice> },
    /// A device's subscription on its raw-data socket succeeded.
    Connected { did: String },
    OnlineStatusChanged { did: String, online: bool },
    AttrsReceived { did: String, attrs: serde_json::Value },
    /// Raw bytes that are not sub-device management traffic.
    RawReceived { did: String, raw: Vec<u8> },
    /// Current sub-device snapshot of a center-control device.
    SubDevicesUpdated { did: String, sub_devices: Vec<SubDevice> },
    Error { kind: ErrorKind, message: String },
}

impl GatewayEvent {
    pub(crate) fn error(err: &CoreError) -> Self {
        Self::Error {
            kind: err.kind(),
            message: err.to_string(),
        }
    }

    /// Device the event concerns, if any.
    pub fn did(&self) -> Option<&str> {
        match self {
            Self::Connected { did }
            | Self::OnlineStatusChanged { did, .. }
            | Self::AttrsReceived { did, .. }
            | Self::RawReceived { did, .. }
            | Self::SubDevicesUpdated { did, .. } => Some(did),
            Self::Initialized { .. } | Self::Error { .. } => None,
        }
    }
}
