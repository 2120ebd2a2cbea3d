//! JSON envelopes exchanged with the relay.
//!
//! Every websocket text frame has the shape `{ "cmd": "...", "data": {...} }`.
//! Outbound messages serialize straight from [`OutboundMessage`]; inbound
//! text is parsed in two steps (envelope first, then the `cmd`-specific
//! body) so unknown commands surface as [`InboundMessage::Unrecognized`]
//! instead of a parse failure.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// `s2c_invalid_msg` code meaning the server dropped our session.
pub const SESSION_EXPIRED_CODE: i64 = 1009;

// ── ChannelKind ──────────────────────────────────────────────────────

/// Which P0 payload flavour a socket carries, sent as `p0_type` at login.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
pub enum ChannelKind {
    /// Structured data-point attributes.
    #[serde(rename = "attrs_v4")]
    #[strum(serialize = "attrs_v4")]
    AttrsV4,
    /// Raw passthrough bytes, including sub-device frames.
    #[serde(rename = "custom")]
    #[strum(serialize = "custom")]
    Custom,
}

impl ChannelKind {
    pub const ALL: [Self; 2] = [Self::AttrsV4, Self::Custom];
}

// ── Outbound ─────────────────────────────────────────────────────────

/// `{ "did": ... }` list entry used by subscribe request and response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DidRef {
    pub did: String,
}

#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct LoginRequest {
    pub appid: String,
    pub uid: String,
    pub token: String,
    pub p0_type: ChannelKind,
    pub heartbeat_interval: u64,
    pub auto_subscribe: bool,
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("appid", &self.appid)
            .field("uid", &self.uid)
            .field("token", &"[REDACTED]")
            .field("p0_type", &self.p0_type)
            .field("heartbeat_interval", &self.heartbeat_interval)
            .field("auto_subscribe", &self.auto_subscribe)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReadRequest {
    pub did: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub names: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WriteRequest {
    pub did: String,
    pub attrs: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawRequest {
    pub did: String,
    pub raw: Vec<u8>,
}

/// A message the client sends to the relay.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "cmd", content = "data")]
pub enum OutboundMessage {
    #[serde(rename = "login_req")]
    Login(LoginRequest),
    #[serde(rename = "subscribe_req")]
    Subscribe(Vec<DidRef>),
    #[serde(rename = "ping")]
    Ping,
    #[serde(rename = "c2s_read")]
    Read(ReadRequest),
    #[serde(rename = "c2s_write")]
    Write(WriteRequest),
    #[serde(rename = "c2s_raw")]
    Raw(RawRequest),
}

impl OutboundMessage {
    pub fn subscribe<I, S>(dids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Subscribe(dids.into_iter().map(|d| DidRef { did: d.into() }).collect())
    }

    pub fn raw(did: impl Into<String>, raw: Vec<u8>) -> Self {
        Self::Raw(RawRequest {
            did: did.into(),
            raw,
        })
    }

    /// Wire name of this message.
    pub fn cmd(&self) -> &'static str {
        match self {
            Self::Login(_) => "login_req",
            Self::Subscribe(_) => "subscribe_req",
            Self::Ping => "ping",
            Self::Read(_) => "c2s_read",
            Self::Write(_) => "c2s_write",
            Self::Raw(_) => "c2s_raw",
        }
    }

    pub fn to_json(&self) -> Result<String, Error> {
        serde_json::to_string(self).map_err(|e| Error::Deserialization {
            message: format!("failed to serialize {}: {e}", self.cmd()),
            body: String::new(),
        })
    }
}

// ── Inbound ──────────────────────────────────────────────────────────

/// A message the relay sends to the client.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    Pong,
    LoginResult {
        success: bool,
    },
    SubscribeResult {
        success: Vec<String>,
        failed: Vec<String>,
    },
    OnlineStatus {
        did: String,
        online: bool,
    },
    Raw {
        did: String,
        raw: Vec<u8>,
    },
    Notification {
        did: String,
        attrs: serde_json::Value,
    },
    InvalidMessage {
        error_code: i64,
        msg: String,
    },
    /// A `cmd` this client does not know.
    Unrecognized {
        cmd: String,
    },
}

#[derive(Debug, Deserialize)]
struct Envelope {
    cmd: String,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct LoginResBody {
    success: bool,
}

#[derive(Debug, Deserialize)]
struct SubscribeResBody {
    #[serde(default)]
    success: Vec<DidRef>,
    #[serde(default)]
    failed: Vec<DidRef>,
}

#[derive(Debug, Deserialize)]
struct OnlineStatusBody {
    did: String,
    online: bool,
}

#[derive(Debug, Deserialize)]
struct RawBody {
    did: String,
    raw: Vec<u8>,
}

#[derive(Debug, Deserialize)]
struct NotiBody {
    did: String,
    #[serde(default)]
    attrs: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct InvalidMsgBody {
    error_code: i64,
    #[serde(default)]
    msg: String,
}

impl InboundMessage {
    /// Parse one websocket text frame.
    pub fn parse(text: &str) -> Result<Self, Error> {
        let envelope: Envelope = serde_json::from_str(text).map_err(|e| Error::Deserialization {
            message: format!("invalid envelope: {e}"),
            body: text.to_owned(),
        })?;

        let Envelope { cmd, data } = envelope;
        let message = match cmd.as_str() {
            "pong" => Self::Pong,
            "login_res" => {
                let body: LoginResBody = decode_body(&cmd, &data)?;
                Self::LoginResult {
                    success: body.success,
                }
            }
            "subscribe_res" => {
                let body: SubscribeResBody = decode_body(&cmd, &data)?;
                Self::SubscribeResult {
                    success: body.success.into_iter().map(|d| d.did).collect(),
                    failed: body.failed.into_iter().map(|d| d.did).collect(),
                }
            }
            "s2c_online_status" => {
                let body: OnlineStatusBody = decode_body(&cmd, &data)?;
                Self::OnlineStatus {
                    did: body.did,
                    online: body.online,
                }
            }
            "s2c_raw" => {
                let body: RawBody = decode_body(&cmd, &data)?;
                Self::Raw {
                    did: body.did,
                    raw: body.raw,
                }
            }
            "s2c_noti" => {
                let body: NotiBody = decode_body(&cmd, &data)?;
                Self::Notification {
                    did: body.did,
                    attrs: body.attrs,
                }
            }
            "s2c_invalid_msg" => {
                let body: InvalidMsgBody = decode_body(&cmd, &data)?;
                Self::InvalidMessage {
                    error_code: body.error_code,
                    msg: body.msg,
                }
            }
            _ => Self::Unrecognized { cmd },
        };
        Ok(message)
    }

    /// `true` for an invalid-message notification signalling session expiry.
    pub fn is_session_expired(&self) -> bool {
        matches!(
            self,
            Self::InvalidMessage {
                error_code: SESSION_EXPIRED_CODE,
                ..
            }
        )
    }
}

fn decode_body<T: DeserializeOwned>(cmd: &str, data: &serde_json::Value) -> Result<T, Error> {
    T::deserialize(data).map_err(|e| Error::Deserialization {
        message: format!("invalid {cmd} body: {e}"),
        body: data.to_string(),
    })
}
