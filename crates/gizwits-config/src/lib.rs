//! Shared configuration for Gizwits gateway tools.
//!
//! TOML profiles, open-id resolution (env + keyring + plaintext), and
//! translation to `gizwits_core::GatewayConfig`. The CLI layers its flag
//! overrides on top of what this crate resolves.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use gizwits_core::{DEFAULT_API_HOST, GatewayConfig};

const KEYRING_SERVICE: &str = "gizwits";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no open id configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("profile '{profile}' not found")]
    UnknownProfile { profile: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named application profiles.
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    #[serde(default = "default_lang")]
    pub lang: String,

    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            lang: default_lang(),
            timeout: default_timeout(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_lang() -> String {
    "en".into()
}
fn default_timeout() -> u64 {
    30
}

/// A named application profile.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Profile {
    /// Gizwits application id.
    pub app_id: String,

    /// Directory service host, optionally with `:port`.
    #[serde(default = "default_api_host")]
    pub api_host: String,

    /// End-user open id (plaintext, prefer keyring or env var).
    pub open_id: Option<String>,

    /// Environment variable name containing the open id.
    pub open_id_env: Option<String>,

    /// Override the default language.
    pub lang: Option<String>,

    /// `false` talks plain HTTP to the directory service.
    pub use_tls: Option<bool>,

    /// Bound-device page size.
    pub page_limit: Option<u32>,

    /// Heartbeat period in seconds.
    pub heartbeat_interval: Option<u64>,

    /// Login backoff unit in seconds.
    pub retry_wait: Option<u64>,

    /// Override the HTTP timeout (seconds).
    pub timeout: Option<u64>,
}

fn default_api_host() -> String {
    DEFAULT_API_HOST.into()
}

impl Config {
    /// Name of the profile to use when none is given explicitly.
    pub fn default_profile_name(&self) -> &str {
        self.default_profile.as_deref().unwrap_or("default")
    }

    pub fn profile(&self, name: &str) -> Result<&Profile, ConfigError> {
        self.profiles
            .get(name)
            .ok_or_else(|| ConfigError::UnknownProfile {
                profile: name.into(),
            })
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "gizwits", "gizwits").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("gizwits");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` + environment. A missing file yields the defaults.
///
/// Environment keys use `__` for nesting, e.g.
/// `GIZWITS_PROFILES__DEFAULT__APP_ID`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("GIZWITS_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if loading fails.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

fn keyring_entry(profile_name: &str) -> Result<keyring::Entry, keyring::Error> {
    keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/open-id"))
}

/// Resolve the open id: profile's env var, then keyring, then plaintext.
pub fn resolve_open_id(profile: &Profile, profile_name: &str) -> Result<SecretString, ConfigError> {
    // 1. Profile's open_id_env → env var lookup
    if let Some(ref env_name) = profile.open_id_env {
        if let Ok(val) = std::env::var(env_name) {
            return Ok(SecretString::from(val));
        }
    }

    // 2. System keyring
    if let Ok(entry) = keyring_entry(profile_name) {
        if let Ok(secret) = entry.get_password() {
            return Ok(SecretString::from(secret));
        }
    }

    // 3. Plaintext in config
    if let Some(ref open_id) = profile.open_id {
        return Ok(SecretString::from(open_id.clone()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

/// Store the open id for `profile_name` in the system keyring.
pub fn store_open_id(profile_name: &str, open_id: &str) -> Result<(), ConfigError> {
    keyring_entry(profile_name)?.set_password(open_id)?;
    Ok(())
}

// ── Translation ─────────────────────────────────────────────────────

/// Build a `GatewayConfig` from a profile and the global defaults.
pub fn profile_to_gateway_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<GatewayConfig, ConfigError> {
    let open_id = resolve_open_id(profile, profile_name)?;
    gateway_config_with_open_id(profile, profile_name, defaults, open_id)
}

/// Like [`profile_to_gateway_config`] with an already-resolved open id.
pub fn gateway_config_with_open_id(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
    open_id: SecretString,
) -> Result<GatewayConfig, ConfigError> {
    if profile.app_id.trim().is_empty() {
        return Err(ConfigError::Validation {
            field: "app_id".into(),
            reason: format!("profile '{profile_name}' has no app_id"),
        });
    }
    if profile.api_host.trim().is_empty() {
        return Err(ConfigError::Validation {
            field: "api_host".into(),
            reason: "must not be empty".into(),
        });
    }

    let mut config = GatewayConfig::new(profile.app_id.clone(), open_id);
    config.api_host.clone_from(&profile.api_host);
    config.lang = profile.lang.clone().unwrap_or_else(|| defaults.lang.clone());
    config.timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));
    if let Some(use_tls) = profile.use_tls {
        config.use_tls = use_tls;
    }
    if let Some(limit) = profile.page_limit {
        config.page_limit = limit;
    }
    if let Some(secs) = profile.heartbeat_interval {
        config.heartbeat_interval = Duration::from_secs(secs);
    }
    if let Some(secs) = profile.retry_wait {
        config.retry_wait = Duration::from_secs(secs);
    }

    config.validate().map_err(|e| ConfigError::Validation {
        field: "profile".into(),
        reason: e.to_string(),
    })?;
    Ok(config)
}
