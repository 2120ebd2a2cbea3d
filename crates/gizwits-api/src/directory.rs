// Directory service HTTP client
//
// Exchanges the application id and open id for a user session, lists the
// devices bound to that user, and posts sub-device binding requests to an
// integrator-supplied URL. Every response body is plain JSON; failures map
// onto `Error::Authentication` / `Error::Api` / `Error::Deserialization`.

use std::fmt;

use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::endpoint::Endpoint;
use crate::error::Error;
use crate::transport::TransportConfig;

const APP_ID_HEADER: &str = "X-Gizwits-Application-Id";
const USER_TOKEN_HEADER: &str = "X-Gizwits-User-token";
const BODY_PREVIEW_CHARS: usize = 200;

// ── Wire types ───────────────────────────────────────────────────────

/// Credentials returned by `POST /app/users`.
#[derive(Clone)]
pub struct UserSession {
    pub uid: String,
    pub token: SecretString,
}

impl fmt::Debug for UserSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserSession")
            .field("uid", &self.uid)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

#[derive(Deserialize)]
struct CreateUserResponse {
    uid: String,
    token: String,
}

impl From<CreateUserResponse> for UserSession {
    fn from(resp: CreateUserResponse) -> Self {
        Self {
            uid: resp.uid,
            token: SecretString::from(resp.token),
        }
    }
}

#[derive(Debug, Serialize)]
struct CreateUserRequest<'a> {
    phone_id: &'a str,
    lang: &'a str,
}

/// One entry of `GET /app/bindings`.
///
/// The service omits fields freely, so everything defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BindingDevice {
    pub did: String,
    pub mac: String,
    pub product_key: String,
    pub is_online: bool,
    pub dev_alias: String,
    pub remark: String,
    /// `"normal"`, `"center_control"`, `"sub_dev"`, ...
    #[serde(rename = "type")]
    pub device_type: String,
    pub host: String,
    pub ws_port: Option<u16>,
    pub wss_port: Option<u16>,
}

impl BindingDevice {
    /// Relay endpoint advertised for this device, if any.
    pub fn endpoint(&self) -> Option<Endpoint> {
        Endpoint::from_hints(&self.host, self.ws_port, self.wss_port)
    }
}

#[derive(Debug, Deserialize)]
struct BindingsPage {
    #[serde(default)]
    devices: Vec<BindingDevice>,
}

/// Body posted to an integrator binding endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BindRequest {
    #[serde(rename = "wechat_openId")]
    pub wechat_open_id: String,
    pub mac: String,
    pub product_key: String,
}

/// Reply from an integrator binding endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BindResponse {
    pub did: Option<String>,
    pub mac: String,
    pub product_key: String,
    #[serde(rename = "netStatus")]
    pub net_status: Option<String>,
}

impl BindResponse {
    pub fn is_online(&self) -> bool {
        self.net_status.as_deref() == Some("online")
    }
}

// ── DirectoryClient ──────────────────────────────────────────────────

/// HTTP client for the Gizwits directory service.
pub struct DirectoryClient {
    http: reqwest::Client,
    base_url: Url,
    app_id: String,
}

impl DirectoryClient {
    /// Create a client for `base_url` (e.g. `https://api.gizwits.com`).
    pub fn new(base_url: Url, app_id: String, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, base_url, app_id))
    }

    /// Create a client around a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url, app_id: String) -> Self {
        Self {
            http,
            base_url,
            app_id,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    fn url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(path)?)
    }

    // ── Endpoints ────────────────────────────────────────────────────

    /// `POST /app/users`: obtain `uid` and `token` for an open id.
    pub async fn create_user(&self, open_id: &SecretString, lang: &str) -> Result<UserSession, Error> {
        let url = self.url("/app/users")?;
        debug!("POST {}", url);

        let body = CreateUserRequest {
            phone_id: open_id.expose_secret(),
            lang,
        };
        let resp = self
            .http
            .post(url)
            .header(APP_ID_HEADER, &self.app_id)
            .json(&body)
            .send()
            .await?;

        let created: CreateUserResponse = parse_json(resp).await?;
        Ok(created.into())
    }

    /// `GET /app/bindings`: one page of bound devices.
    pub async fn list_bindings(
        &self,
        token: &SecretString,
        limit: u32,
        skip: u32,
    ) -> Result<Vec<BindingDevice>, Error> {
        let mut url = self.url("/app/bindings")?;
        url.query_pairs_mut()
            .append_pair("show_disabled", "0")
            .append_pair("limit", &limit.to_string())
            .append_pair("skip", &skip.to_string());
        debug!("GET {}", url);

        let resp = self
            .http
            .get(url)
            .header(APP_ID_HEADER, &self.app_id)
            .header(USER_TOKEN_HEADER, token.expose_secret())
            .send()
            .await?;

        let page: BindingsPage = parse_json(resp).await?;
        Ok(page.devices)
    }

    /// Page through `GET /app/bindings` until a short page comes back.
    pub async fn all_bindings(
        &self,
        token: &SecretString,
        limit: u32,
    ) -> Result<Vec<BindingDevice>, Error> {
        let limit = limit.max(1);
        let mut devices = Vec::new();
        let mut skip = 0u32;
        loop {
            let page = self.list_bindings(token, limit, skip).await?;
            let full = u32::try_from(page.len()).is_ok_and(|n| n == limit);
            devices.extend(page);
            if !full {
                break;
            }
            skip = skip.saturating_add(limit);
        }
        debug!(count = devices.len(), "fetched bound devices");
        Ok(devices)
    }

    /// POST a binding request to an integrator-supplied URL.
    pub async fn bind_device(&self, url: Url, request: &BindRequest) -> Result<BindResponse, Error> {
        debug!("POST {}", url);
        let resp = self.http.post(url).json(request).send().await?;
        parse_json(resp).await
    }
}

// ── Response handling ────────────────────────────────────────────────

async fn parse_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
    let status = resp.status();

    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        let body = resp.text().await.unwrap_or_default();
        return Err(Error::Authentication {
            status: status.as_u16(),
            message: preview(&body),
        });
    }

    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(Error::Api {
            status: status.as_u16(),
            message: preview(&body),
        });
    }

    let body = resp.text().await?;
    serde_json::from_str(&body).map_err(|e| Error::Deserialization {
        message: format!("{e} (body preview: {:?})", preview(&body)),
        body,
    })
}

fn preview(body: &str) -> String {
    body.chars().take(BODY_PREVIEW_CHARS).collect()
}
