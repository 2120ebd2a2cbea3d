use thiserror::Error;

use crate::frame::FrameError;

/// Top-level error type for the `gizwits-api` crate.
///
/// Covers every failure mode across the wire surfaces:
/// directory-service HTTP, relay websocket, and the binary frame codec.
/// `gizwits-core` maps these into gateway-level diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// The directory service rejected the application id or user token.
    #[error("Authentication failed (HTTP {status}): {message}")]
    Authentication { status: u16, message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS or client builder error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Directory service ───────────────────────────────────────────
    /// Non-success response from the directory service.
    #[error("Directory service error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    // ── WebSocket ───────────────────────────────────────────────────
    /// WebSocket connection failed.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    /// Binary sub-device frame could not be encoded or decoded.
    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),
}
