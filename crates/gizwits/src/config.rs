//! CLI configuration: thin wrapper around `gizwits_config` shared types.
//!
//! Re-exports the shared types and adds CLI-specific resolution that
//! respects `GlobalOpts` flag overrides (--app-id, --open-id, etc.).

use std::time::Duration;

use secrecy::SecretString;

use gizwits_core::GatewayConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

// ── Re-exports from shared crate ────────────────────────────────────

pub use gizwits_config::{Config, Profile, config_path, load_config_or_default, save_config};

// ── CLI-specific helpers ────────────────────────────────────────────

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .unwrap_or_else(|| config.default_profile_name().to_owned())
}

/// Build a `GatewayConfig` from the config file, profile, and CLI overrides.
///
/// Without a matching profile the gateway is built from flags alone, which
/// then must carry both the app id and the open id.
pub fn build_gateway_config(global: &GlobalOpts) -> Result<GatewayConfig, CliError> {
    let cfg = load_config_or_default();
    let profile_name = active_profile_name(global, &cfg);

    let mut config = if let Some(profile) = cfg.profiles.get(&profile_name) {
        resolve_profile(profile, &profile_name, global, &cfg)?
    } else {
        let app_id = global.app_id.clone().ok_or_else(|| CliError::NoConfig {
            path: config_path().display().to_string(),
        })?;
        let open_id = global
            .open_id
            .clone()
            .ok_or_else(|| CliError::NoCredentials {
                profile: profile_name.clone(),
            })?;
        let mut config = GatewayConfig::new(app_id, SecretString::from(open_id));
        config.lang.clone_from(&cfg.defaults.lang);
        config.timeout = Duration::from_secs(cfg.defaults.timeout);
        config
    };

    if let Some(ref host) = global.api_host {
        config.api_host.clone_from(host);
    }
    if let Some(secs) = global.timeout {
        config.timeout = Duration::from_secs(secs);
    }
    config.validate()?;
    Ok(config)
}

/// Translate a `Profile` + global flags into a `GatewayConfig`.
///
/// CLI flag overrides take priority over profile values.
fn resolve_profile(
    profile: &Profile,
    profile_name: &str,
    global: &GlobalOpts,
    cfg: &Config,
) -> Result<GatewayConfig, CliError> {
    let mut profile = profile.clone();
    if let Some(ref app_id) = global.app_id {
        profile.app_id.clone_from(app_id);
    }
    let open_id = match global.open_id {
        Some(ref open_id) => SecretString::from(open_id.clone()),
        None => gizwits_config::resolve_open_id(&profile, profile_name)?,
    };
    Ok(gizwits_config::gateway_config_with_open_id(
        &profile,
        profile_name,
        &cfg.defaults,
        open_id,
    )?)
}
