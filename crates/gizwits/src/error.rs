//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use gizwits_config::ConfigError;
use gizwits_core::{ChannelKind, CoreError};

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────

    #[error("Relay connection failed: {message}")]
    #[diagnostic(
        code(gizwits::connection_failed),
        help("Check network access to the relay. Run with -vv to see socket activity.")
    )]
    ConnectionFailed { message: String },

    #[error("The {kind} socket for {did} is not open")]
    #[diagnostic(
        code(gizwits::send_failed),
        help("A reconnect was scheduled; retry the command in a few seconds.")
    )]
    SendFailed { did: String, kind: String },

    #[error("Timed out after {seconds}s waiting for {what}")]
    #[diagnostic(
        code(gizwits::timeout),
        help("Increase the wait with --wait or check that the device is online.")
    )]
    Timeout { what: String, seconds: u64 },

    // ── Authentication ───────────────────────────────────────────────

    #[error("The directory service rejected the credentials")]
    #[diagnostic(
        code(gizwits::auth_failed),
        help(
            "Verify the app id and open id of profile '{profile}'.\n\
             Run: gizwits config set-open-id --profile {profile}"
        )
    )]
    AuthFailed { profile: String },

    #[error("No open id configured for profile '{profile}'")]
    #[diagnostic(
        code(gizwits::no_credentials),
        help(
            "Store one with: gizwits config set-open-id\n\
             Or set the GIZWITS_OPEN_ID environment variable."
        )
    )]
    NoCredentials { profile: String },

    // ── Resources ────────────────────────────────────────────────────

    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(gizwits::not_found),
        help("Run: gizwits {list_command} to see available {resource_type}s")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    // ── Relay / directory ────────────────────────────────────────────

    #[error("Directory service error{}: {message}", .status.map(|s| format!(" ({s})")).unwrap_or_default())]
    #[diagnostic(code(gizwits::api_error))]
    ApiError { message: String, status: Option<u16> },

    #[error("Relay protocol error: {message}")]
    #[diagnostic(code(gizwits::protocol_error))]
    Protocol { message: String },

    #[error("{message}")]
    #[diagnostic(code(gizwits::not_ready))]
    NotReady { message: String },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(gizwits::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(gizwits::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: gizwits config init --app-id <APP_ID>"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No application configured")]
    #[diagnostic(
        code(gizwits::no_config),
        help(
            "Create a profile with: gizwits config init --app-id <APP_ID>\n\
             Or pass --app-id and --open-id. Expected config at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(gizwits::config))]
    Config(Box<ConfigError>),

    // ── IO / Serialization ────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON payload: {0}")]
    #[diagnostic(code(gizwits::json), help("Check the JSON text and try again."))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::SendFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }

    pub fn send_failed(did: &str, kind: ChannelKind) -> Self {
        Self::SendFailed {
            did: did.into(),
            kind: kind.to_string(),
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NotInitialized { step } => CliError::NotReady {
                message: format!("{step} has not completed"),
            },

            CoreError::DeviceNotFound { did } => CliError::NotFound {
                resource_type: "device".into(),
                identifier: did,
                list_command: "devices".into(),
            },

            CoreError::ChannelNotFound { did, kind } => CliError::NotReady {
                message: format!("no {kind} channel for {did}"),
            },

            CoreError::Transport { message } => CliError::ConnectionFailed { message },

            CoreError::Protocol { message } => CliError::Protocol { message },

            CoreError::SendFailed { did, kind } => CliError::SendFailed { did, kind },

            CoreError::Validation { message } => CliError::Validation {
                field: "input".into(),
                reason: message,
            },

            CoreError::Api {
                status: Some(401 | 403),
                ..
            } => CliError::AuthFailed {
                profile: "current".into(),
            },

            CoreError::Api { message, status } => CliError::ApiError { message, status },

            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoCredentials { profile } => CliError::NoCredentials { profile },
            ConfigError::UnknownProfile { profile } => CliError::ProfileNotFound {
                name: profile,
                available: "(see: gizwits config profiles)".into(),
            },
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            other => CliError::Config(Box::new(other)),
        }
    }
}
