//! Config subcommand handlers.

use std::io::BufRead;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Config, Profile};
use crate::error::CliError;
use crate::output;

fn profile_not_found(cfg: &Config, name: String) -> CliError {
    let available: Vec<_> = cfg.profiles.keys().cloned().collect();
    CliError::ProfileNotFound {
        name,
        available: if available.is_empty() {
            "(none)".into()
        } else {
            available.join(", ")
        },
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str, expected: &str) -> Result<T, CliError> {
    value.parse().map_err(|_| CliError::Validation {
        field: key.into(),
        reason: format!("must be {expected}"),
    })
}

/// Apply `key = value` to a profile.
fn set_profile_value(profile: &mut Profile, key: &str, value: String) -> Result<(), CliError> {
    match key {
        "app_id" | "app-id" => profile.app_id = value,
        "api_host" | "api-host" => profile.api_host = value,
        "open_id" | "open-id" => profile.open_id = Some(value),
        "open_id_env" | "open-id-env" => profile.open_id_env = Some(value),
        "lang" => profile.lang = Some(value),
        "use_tls" | "use-tls" => {
            profile.use_tls = Some(parse_value(key, &value, "'true' or 'false'")?);
        }
        "page_limit" | "page-limit" => {
            profile.page_limit = Some(parse_value(key, &value, "a positive number")?);
        }
        "heartbeat_interval" | "heartbeat-interval" => {
            profile.heartbeat_interval = Some(parse_value(key, &value, "a number (seconds)")?);
        }
        "retry_wait" | "retry-wait" => {
            profile.retry_wait = Some(parse_value(key, &value, "a number (seconds)")?);
        }
        "timeout" => {
            profile.timeout = Some(parse_value(key, &value, "a number (seconds)")?);
        }
        other => {
            return Err(CliError::Validation {
                field: other.into(),
                reason: format!(
                    "unknown config key '{other}'. Valid keys: app_id, api_host, open_id, \
                     open_id_env, lang, use_tls, page_limit, heartbeat_interval, retry_wait, timeout"
                ),
            });
        }
    }
    Ok(())
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Init {
            name,
            app_id,
            api_host,
            open_id_env,
        } => {
            let mut cfg = config::load_config_or_default();
            let profile = cfg.profiles.entry(name.clone()).or_default();
            profile.app_id = app_id;
            if let Some(host) = api_host {
                profile.api_host = host;
            } else if profile.api_host.is_empty() {
                profile.api_host = gizwits_core::DEFAULT_API_HOST.into();
            }
            profile.open_id_env = open_id_env;
            if cfg.profiles.len() == 1 {
                cfg.default_profile = Some(name.clone());
            }
            config::save_config(&cfg)?;

            eprintln!("✓ Profile '{name}' written to {}", config::config_path().display());
            eprintln!("  Store the open id with: gizwits config set-open-id --profile {name}");
            Ok(())
        }

        ConfigCommand::Show => {
            let cfg = config::load_config_or_default();
            let out = output::render_single(
                &global.output,
                &cfg,
                |c| format!("{c:#?}"),
                |c| c.default_profile_name().to_owned(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Set { key, value } => {
            let mut cfg = config::load_config_or_default();
            let profile_name = config::active_profile_name(global, &cfg);
            let profile = cfg.profiles.get_mut(&profile_name).ok_or_else(|| {
                CliError::ProfileNotFound {
                    name: profile_name.clone(),
                    available: "(see: gizwits config profiles)".into(),
                }
            })?;
            set_profile_value(profile, &key, value)?;
            config::save_config(&cfg)?;
            eprintln!("✓ Set {key} on profile '{profile_name}'");
            Ok(())
        }

        ConfigCommand::Profiles => {
            let cfg = config::load_config_or_default();
            let default = cfg.default_profile_name();
            if cfg.profiles.is_empty() {
                eprintln!("No profiles configured. Run: gizwits config init --app-id <APP_ID>");
            } else {
                for name in cfg.profiles.keys() {
                    let marker = if name == default { " *" } else { "" };
                    println!("{name}{marker}");
                }
            }
            Ok(())
        }

        ConfigCommand::Use { name } => {
            let mut cfg = config::load_config_or_default();
            if !cfg.profiles.contains_key(&name) {
                return Err(profile_not_found(&cfg, name));
            }
            cfg.default_profile = Some(name.clone());
            config::save_config(&cfg)?;
            eprintln!("✓ Default profile set to '{name}'");
            Ok(())
        }

        ConfigCommand::SetOpenId { profile } => {
            let cfg = config::load_config_or_default();
            let profile_name = profile.unwrap_or_else(|| config::active_profile_name(global, &cfg));
            if !cfg.profiles.contains_key(&profile_name) {
                return Err(profile_not_found(&cfg, profile_name));
            }

            eprintln!("Open id for '{profile_name}' (read from stdin):");
            let mut line = String::new();
            std::io::stdin().lock().read_line(&mut line)?;
            let open_id = line.trim();
            if open_id.is_empty() {
                return Err(CliError::Validation {
                    field: "open_id".into(),
                    reason: "value cannot be empty".into(),
                });
            }

            gizwits_config::store_open_id(&profile_name, open_id)?;
            eprintln!("✓ Open id stored in system keyring for profile '{profile_name}'");
            Ok(())
        }

        ConfigCommand::Path => {
            println!("{}", config::config_path().display());
            Ok(())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn set_profile_value_parses_typed_keys() {
        let mut profile = Profile::default();
        set_profile_value(&mut profile, "use-tls", "false".into()).unwrap();
        set_profile_value(&mut profile, "page_limit", "50".into()).unwrap();
        set_profile_value(&mut profile, "app_id", "app-9".into()).unwrap();

        assert_eq!(profile.use_tls, Some(false));
        assert_eq!(profile.page_limit, Some(50));
        assert_eq!(profile.app_id, "app-9");
    }

    #[test]
    fn set_profile_value_rejects_bad_input() {
        let mut profile = Profile::default();
        assert!(matches!(
            set_profile_value(&mut profile, "timeout", "soon".into()),
            Err(CliError::Validation { .. })
        ));
        assert!(matches!(
            set_profile_value(&mut profile, "colour", "red".into()),
            Err(CliError::Validation { .. })
        ));
    }
}
