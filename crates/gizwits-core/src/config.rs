// ── Runtime gateway configuration ──
//
// Describes which application and user the gateway acts for and how its
// sessions are paced. Never touches disk: gizwits-config or the embedding
// application builds a `GatewayConfig` and hands it in.

use std::time::Duration;

use gizwits_api::transport::TransportConfig;
use secrecy::SecretString;
use url::Url;

use crate::error::CoreError;

pub const DEFAULT_API_HOST: &str = "api.gizwits.com";

/// Configuration for one [`Gateway`](crate::Gateway).
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Directory service host, optionally with `:port`.
    pub api_host: String,
    /// Application id sent as `X-Gizwits-Application-Id` and in every login.
    pub app_id: String,
    /// End-user identity exchanged for a user token (`phone_id` on the wire).
    pub open_id: SecretString,
    /// Language tag sent when creating the user session.
    pub lang: String,
    /// Page size for the bound-device listing.
    pub page_limit: u32,
    /// Period of the `ping` heartbeat on a logged-in socket.
    pub heartbeat_interval: Duration,
    /// Server-side keepalive hint sent as `heartbeat_interval` at login.
    pub keepalive: Duration,
    /// Login backoff unit, also the cooldown between send-failure reconnects.
    pub retry_wait: Duration,
    /// Delay before the deferred login after a send-failure reconnect.
    pub retry_send_delay: Duration,
    /// Rejected logins tolerated before a socket is abandoned.
    pub max_login_retries: u32,
    /// HTTP request timeout.
    pub timeout: Duration,
    /// `https` for the directory service when set, `http` otherwise.
    pub use_tls: bool,
}

impl GatewayConfig {
    pub fn new(app_id: impl Into<String>, open_id: SecretString) -> Self {
        Self {
            api_host: DEFAULT_API_HOST.into(),
            app_id: app_id.into(),
            open_id,
            lang: "en".into(),
            page_limit: 20,
            heartbeat_interval: Duration::from_secs(55),
            keepalive: Duration::from_secs(180),
            retry_wait: Duration::from_secs(5),
            retry_send_delay: Duration::from_secs(2),
            max_login_retries: 3,
            timeout: Duration::from_secs(30),
            use_tls: true,
        }
    }

    /// Base URL of the directory service.
    pub fn directory_url(&self) -> Result<Url, CoreError> {
        let scheme = if self.use_tls { "https" } else { "http" };
        let raw = format!("{scheme}://{}", self.api_host.trim_end_matches('/'));
        Url::parse(&raw).map_err(|e| CoreError::Config {
            message: format!("invalid api host {:?}: {e}", self.api_host),
        })
    }

    pub(crate) fn transport(&self) -> TransportConfig {
        TransportConfig {
            timeout: self.timeout,
        }
    }

    /// Reject settings that would make sessions misbehave.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.app_id.trim().is_empty() {
            return Err(CoreError::Config {
                message: "app_id must not be empty".into(),
            });
        }
        if self.page_limit == 0 {
            return Err(CoreError::Config {
                message: "page_limit must be at least 1".into(),
            });
        }
        if self.heartbeat_interval.is_zero() {
            return Err(CoreError::Config {
                message: "heartbeat_interval must be non-zero".into(),
            });
        }
        self.directory_url().map(|_| ())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn config() -> GatewayConfig {
        GatewayConfig::new("app", SecretString::from("open".to_string()))
    }

    #[test]
    fn defaults_match_relay_expectations() {
        let c = config();
        assert_eq!(c.page_limit, 20);
        assert_eq!(c.keepalive, Duration::from_secs(180));
        assert_eq!(c.retry_wait, Duration::from_secs(5));
        assert_eq!(c.max_login_retries, 3);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn directory_url_follows_tls_flag() {
        let mut c = config();
        assert_eq!(c.directory_url().unwrap().as_str(), "https://api.gizwits.com/");
        c.use_tls = false;
        c.api_host = "127.0.0.1:8080".into();
        assert_eq!(c.directory_url().unwrap().as_str(), "http://127.0.0.1:8080/");
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut c = config();
        c.app_id = " ".into();
        assert!(matches!(c.validate(), Err(CoreError::Config { .. })));

        let mut c = config();
        c.page_limit = 0;
        assert!(c.validate().is_err());

        let mut c = config();
        c.api_host = "bad host/".into();
        assert!(c.validate().is_err());
    }
}
