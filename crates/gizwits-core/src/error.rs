// ── Core error types ──
//
// User-facing errors from gizwits-core. Consumers never see HTTP status
// codes or serde failures directly; the `From<gizwits_api::Error>` impl
// folds wire-layer errors into gateway-level variants.

use gizwits_api::FrameError;
use thiserror::Error;

/// Coarse classification carried by error events.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, strum::Display, strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    Precondition,
    NotFound,
    Transport,
    Protocol,
    SendFailure,
    Validation,
    Api,
    Config,
}

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Precondition ─────────────────────────────────────────────────
    #[error("{step} has not completed")]
    NotInitialized { step: String },

    // ── Lookup ───────────────────────────────────────────────────────
    #[error("Device not found: {did}")]
    DeviceNotFound { did: String },

    #[error("No {kind} channel for device {did}")]
    ChannelNotFound { did: String, kind: String },

    // ── Session ──────────────────────────────────────────────────────
    #[error("Transport error: {message}")]
    Transport { message: String },

    #[error("Protocol error: {message}")]
    Protocol { message: String },

    #[error("Socket for {did} ({kind}) is not open")]
    SendFailed { did: String, kind: String },

    // ── Input ────────────────────────────────────────────────────────
    #[error("Validation failed: {message}")]
    Validation { message: String },

    // ── Directory service ────────────────────────────────────────────
    #[error("Directory service error: {message}")]
    Api {
        message: String,
        /// HTTP status code, when the service answered at all.
        status: Option<u16>,
    },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotInitialized { .. } => ErrorKind::Precondition,
            Self::DeviceNotFound { .. } | Self::ChannelNotFound { .. } => ErrorKind::NotFound,
            Self::Transport { .. } => ErrorKind::Transport,
            Self::Protocol { .. } => ErrorKind::Protocol,
            Self::SendFailed { .. } => ErrorKind::SendFailure,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Api { .. } => ErrorKind::Api,
            Self::Config { .. } => ErrorKind::Config,
        }
    }

    pub(crate) fn not_initialized() -> Self {
        Self::NotInitialized {
            step: "gateway initialization".into(),
        }
    }
}

// ── Conversion from wire-layer errors ────────────────────────────────

impl From<gizwits_api::Error> for CoreError {
    fn from(err: gizwits_api::Error) -> Self {
        match err {
            gizwits_api::Error::Authentication { status, message } => CoreError::Api {
                message: format!("authentication failed: {message}"),
                status: Some(status),
            },
            gizwits_api::Error::Transport(ref e) => CoreError::Api {
                message: e.to_string(),
                status: e.status().map(|s| s.as_u16()),
            },
            gizwits_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            gizwits_api::Error::Tls(message) => CoreError::Config { message },
            gizwits_api::Error::Api { status, message } => CoreError::Api {
                message,
                status: Some(status),
            },
            gizwits_api::Error::WebSocketConnect(message) => CoreError::Transport { message },
            gizwits_api::Error::Deserialization { message, .. } => CoreError::Protocol { message },
            gizwits_api::Error::Frame(e) => e.into(),
        }
    }
}

impl From<FrameError> for CoreError {
    fn from(err: FrameError) -> Self {
        CoreError::Validation {
            message: err.to_string(),
        }
    }
}
