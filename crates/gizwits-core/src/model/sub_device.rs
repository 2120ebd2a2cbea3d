use gizwits_api::frame::SubDeviceRecord;
use serde::{Deserialize, Serialize};

/// A device managed through a center-control parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubDevice {
    /// Numeric handle used on the wire.
    pub sub_did: u32,
    /// Cloud identifier.
    pub did: String,
    pub mac: String,
    pub product_key: String,
    pub is_online: bool,
}

impl From<SubDeviceRecord> for SubDevice {
    fn from(r: SubDeviceRecord) -> Self {
        Self {
            sub_did: r.sub_did,
            did: r.did,
            mac: r.mac,
            product_key: r.product_key,
            is_online: r.online,
        }
    }
}

/// One entry of an add-sub-devices request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubDeviceCandidate {
    /// Entries without a MAC are skipped when encoding.
    pub mac: Option<String>,
}

impl SubDeviceCandidate {
    pub fn with_mac(mac: impl Into<String>) -> Self {
        Self {
            mac: Some(mac.into()),
        }
    }
}
