// ── Relay endpoint ──
//
// A device's relay socket is addressed by host + port, and the scheme is
// picked from which port hint the directory service handed out.

use std::fmt;

use url::Url;

/// Path of the application websocket on every relay host.
pub const WS_APP_PATH: &str = "/ws/app/v1";

/// Transport endpoint of a relay host.
///
/// Two devices served by the same relay share an endpoint, and therefore
/// share a socket per channel kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub secure: bool,
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    /// Pick the endpoint from directory port hints.
    ///
    /// A secure port wins whenever present. Returns `None` when neither
    /// hint is available.
    pub fn from_hints(host: &str, ws_port: Option<u16>, wss_port: Option<u16>) -> Option<Self> {
        if host.is_empty() {
            return None;
        }
        let (secure, port) = match (wss_port, ws_port) {
            (Some(port), _) => (true, port),
            (None, Some(port)) => (false, port),
            (None, None) => return None,
        };
        Some(Self {
            secure,
            host: host.to_owned(),
            port,
        })
    }

    pub fn scheme(&self) -> &'static str {
        if self.secure { "wss" } else { "ws" }
    }

    /// Full websocket URL: `<scheme>://<host>:<port>/ws/app/v1`.
    pub fn ws_url(&self) -> Result<Url, url::ParseError> {
        Url::parse(&format!("{self}{WS_APP_PATH}"))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.scheme(), self.host, self.port)
    }
}
