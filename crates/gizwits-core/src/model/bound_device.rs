use std::fmt;

use gizwits_api::{BindResponse, BindingDevice, Endpoint};
use serde::{Deserialize, Serialize};

/// Role of a bound device.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DeviceType {
    #[default]
    Normal,
    /// Gateway device that manages sub-devices.
    CenterControl,
    /// Managed through a center-control parent.
    SubDevice,
    /// Any type string this client does not know.
    Other(String),
}

impl DeviceType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Normal => "normal",
            Self::CenterControl => "center_control",
            Self::SubDevice => "sub_dev",
            Self::Other(s) => s,
        }
    }
}

impl From<&str> for DeviceType {
    fn from(s: &str) -> Self {
        match s {
            "" | "normal" => Self::Normal,
            "center_control" => Self::CenterControl,
            "sub_dev" => Self::SubDevice,
            other => Self::Other(other.to_owned()),
        }
    }
}

impl From<String> for DeviceType {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<DeviceType> for String {
    fn from(t: DeviceType) -> Self {
        t.as_str().to_owned()
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A device bound to the current user.
///
/// Identity fields never change after creation; `is_online`, `alias` and
/// `remark` follow relay notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundDevice {
    pub did: String,
    pub mac: String,
    pub device_type: DeviceType,
    pub product_key: String,
    pub is_online: bool,
    pub alias: String,
    pub remark: String,
    pub host: String,
    pub ws_port: Option<u16>,
    pub wss_port: Option<u16>,
}

impl BoundDevice {
    /// Relay endpoint from the transport hints; `wss` wins when both ports exist.
    pub fn endpoint(&self) -> Option<Endpoint> {
        Endpoint::from_hints(&self.host, self.ws_port, self.wss_port)
    }

    /// Record for a sub-device that was just bound through an integrator.
    ///
    /// Bind responses carry no transport hints; the parent's are inherited
    /// when known so the device stays reachable.
    pub fn from_bind(resp: &BindResponse, did: String, parent: Option<&BoundDevice>) -> Self {
        Self {
            did,
            mac: resp.mac.clone(),
            device_type: DeviceType::SubDevice,
            product_key: resp.product_key.clone(),
            is_online: resp.is_online(),
            alias: String::new(),
            remark: String::new(),
            host: parent.map(|p| p.host.clone()).unwrap_or_default(),
            ws_port: parent.and_then(|p| p.ws_port),
            wss_port: parent.and_then(|p| p.wss_port),
        }
    }
}

impl From<BindingDevice> for BoundDevice {
    fn from(d: BindingDevice) -> Self {
        Self {
            device_type: DeviceType::from(d.device_type.as_str()),
            did: d.did,
            mac: d.mac,
            product_key: d.product_key,
            is_online: d.is_online,
            alias: d.dev_alias,
            remark: d.remark,
            host: d.host,
            ws_port: d.ws_port,
            wss_port: d.wss_port,
        }
    }
}

/// Device details posted to an integrator binding endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindInfo {
    pub mac: String,
    pub product_key: String,
    /// Bound center-control device whose relay the new device shares.
    #[serde(default)]
    pub parent: Option<String>,
}
