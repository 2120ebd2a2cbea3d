// ── Gateway facade ──
//
// Public operation surface. Resolves a did to its bound device, resolves
// the channel through the session registry, and either encodes a
// sub-device frame or passes attribute/raw JSON straight through.
// Everything learned asynchronously arrives as a `GatewayEvent`.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use gizwits_api::frame::Request;
use gizwits_api::{
    BindRequest, ChannelKind, DirectoryClient, Endpoint, OutboundMessage, ReadRequest,
    UserSession, WriteRequest,
};
use secrecy::ExposeSecret;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::GatewayConfig;
use crate::dispatch::GatewayState;
use crate::error::CoreError;
use crate::event::GatewayEvent;
use crate::model::{BindInfo, BoundDevice, SubDevice, SubDeviceCandidate};
use crate::sequence::SequenceCounter;
use crate::session::{
    ChannelObserver, ChannelStatus, Connector, LoginCredentials, SessionRegistry,
    SessionSettings, WsConnector,
};

// ── Gateway ──────────────────────────────────────────────────────────

/// Client for a fleet of devices behind the Gizwits relay.
///
/// Cheaply cloneable via `Arc<GatewayInner>`. Call [`init()`](Self::init)
/// before anything else; every device operation fails with
/// [`CoreError::NotInitialized`] until it succeeds.
#[derive(Clone)]
pub struct Gateway {
    inner: Arc<GatewayInner>,
}

struct GatewayInner {
    config: GatewayConfig,
    directory: DirectoryClient,
    state: Arc<GatewayState>,
    registry: SessionRegistry,
    session: ArcSwapOption<UserSession>,
    sequence: SequenceCounter,
    cancel: CancellationToken,
}

impl Gateway {
    /// Create a gateway that dials real relay sockets. Does not touch the
    /// network until [`init()`](Self::init).
    pub fn new(config: GatewayConfig) -> Result<Self, CoreError> {
        Self::with_connector(config, Arc::new(WsConnector))
    }

    /// Create a gateway whose relay sockets come from `connector`.
    pub fn with_connector(
        config: GatewayConfig,
        connector: Arc<dyn Connector>,
    ) -> Result<Self, CoreError> {
        config.validate()?;
        let directory =
            DirectoryClient::new(config.directory_url()?, config.app_id.clone(), &config.transport())?;

        let state = Arc::new(GatewayState::new());
        let cancel = CancellationToken::new();
        let observer: Arc<dyn ChannelObserver> = state.clone();
        let registry = SessionRegistry::new(
            SessionSettings::from(&config),
            connector,
            observer,
            cancel.child_token(),
        );

        Ok(Self {
            inner: Arc::new(GatewayInner {
                config,
                directory,
                state,
                registry,
                session: ArcSwapOption::empty(),
                sequence: SequenceCounter::default(),
                cancel,
            }),
        })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.inner.config
    }

    // ── Initialization ───────────────────────────────────────────────

    /// Create the user session and load the bound-device set.
    ///
    /// Emits [`GatewayEvent::Initialized`] on success. On failure an error
    /// event is emitted too, and the gateway stays uninitialized.
    pub async fn init(&self) -> Result<Vec<BoundDevice>, CoreError> {
        match self.load_devices().await {
            Ok(devices) => {
                info!(count = devices.len(), "gateway initialized");
                self.inner.state.emit(GatewayEvent::Initialized {
                    devices: devices.clone(),
                });
                Ok(devices)
            }
            Err(e) => {
                warn!(error = %e, "gateway initialization failed");
                self.inner.state.report(&e);
                Err(e)
            }
        }
    }

    async fn load_devices(&self) -> Result<Vec<BoundDevice>, CoreError> {
        let inner = &self.inner;
        inner.state.reset_devices();

        let session = inner
            .directory
            .create_user(&inner.config.open_id, &inner.config.lang)
            .await?;
        debug!(uid = %session.uid, "user session created");
        inner.registry.set_credentials(LoginCredentials {
            app_id: inner.config.app_id.clone(),
            uid: session.uid.clone(),
            token: session.token.clone(),
        });

        let bindings = inner
            .directory
            .all_bindings(&session.token, inner.config.page_limit)
            .await?;
        inner.session.store(Some(Arc::new(session)));

        Ok(inner
            .state
            .install_devices(bindings.into_iter().map(BoundDevice::from).collect()))
    }

    // ── Sessions ─────────────────────────────────────────────────────

    /// Open (or reuse) both channels for `did`.
    ///
    /// Returns once the sockets are requested; [`GatewayEvent::Connected`]
    /// follows when the custom-channel subscription succeeds.
    pub fn connect(&self, did: &str) -> Result<(), CoreError> {
        let endpoint = self.endpoint(did)?;
        for kind in ChannelKind::ALL {
            self.inner.registry.connect(&endpoint, kind, did)?;
        }
        Ok(())
    }

    /// Ask the device for attribute values; `None` reads them all.
    ///
    /// `Ok(false)` means the attrs socket was not open and a reconnect was
    /// started in the background.
    pub fn read(&self, did: &str, names: Option<Vec<String>>) -> Result<bool, CoreError> {
        let endpoint = self.endpoint(did)?;
        let message = OutboundMessage::Read(ReadRequest {
            did: did.to_owned(),
            names,
        });
        self.inner
            .registry
            .send(&endpoint, ChannelKind::AttrsV4, did, message)
    }

    /// Write attributes (attrs channel), raw bytes (custom channel), or both.
    ///
    /// Both sends are attempted independently; the first hard error is
    /// returned after both ran. `Ok(false)` means at least one socket was
    /// not open.
    pub fn write(
        &self,
        did: &str,
        attrs: Option<serde_json::Value>,
        raw: Option<Vec<u8>>,
    ) -> Result<bool, CoreError> {
        let endpoint = self.endpoint(did)?;
        if attrs.is_none() && raw.is_none() {
            return Err(CoreError::Validation {
                message: "write needs attributes, raw data, or both".into(),
            });
        }

        let mut sent = true;
        let mut first_error = None;
        let mut record = |result: Result<bool, CoreError>| match result {
            Ok(ok) => sent &= ok,
            Err(e) => {
                first_error.get_or_insert(e);
            }
        };

        if let Some(attrs) = attrs {
            let message = OutboundMessage::Write(WriteRequest {
                did: did.to_owned(),
                attrs,
            });
            record(
                self.inner
                    .registry
                    .send(&endpoint, ChannelKind::AttrsV4, did, message),
            );
        }
        if let Some(raw) = raw {
            record(self.inner.registry.send(
                &endpoint,
                ChannelKind::Custom,
                did,
                OutboundMessage::raw(did, raw),
            ));
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(sent),
        }
    }

    /// Raw write on the custom channel.
    #[deprecated(note = "use `Gateway::write(did, None, Some(raw))`")]
    pub fn send(&self, did: &str, raw: Vec<u8>) -> Result<bool, CoreError> {
        self.write(did, None, Some(raw))
    }

    // ── Sub-devices ──────────────────────────────────────────────────

    /// Request the full sub-device list of a center-control device.
    pub fn list_sub_devices(&self, did: &str) -> Result<bool, CoreError> {
        self.send_frame(did, &Request::GetSubDeviceList)
    }

    /// Start adding sub-devices. An empty list requests an unfiltered add;
    /// candidates without a MAC (or with an empty one) are skipped.
    ///
    /// A non-empty list in which no candidate has a MAC is rejected rather
    /// than widened into an unfiltered add.
    pub fn add_sub_devices(
        &self,
        did: &str,
        candidates: &[SubDeviceCandidate],
    ) -> Result<bool, CoreError> {
        let endpoint = self.endpoint(did)?;
        let macs: Vec<String> = candidates
            .iter()
            .filter_map(|c| c.mac.as_deref().filter(|m| !m.is_empty()))
            .map(str::to_owned)
            .collect();
        if macs.is_empty() && !candidates.is_empty() {
            return Err(CoreError::Validation {
                message: "no sub-device candidate has a MAC".into(),
            });
        }
        self.send_encoded(did, &endpoint, &Request::AddSubDevices { macs })
    }

    /// Delete sub-devices by cloud did, one frame per known target.
    ///
    /// Requires a sub-device list reported for `did`. Targets not in that
    /// list are skipped. Returns how many frames the socket accepted.
    pub fn delete_sub_devices(&self, did: &str, targets: &[String]) -> Result<usize, CoreError> {
        let endpoint = self.endpoint(did)?;
        if targets.is_empty() {
            return Err(CoreError::Validation {
                message: "no sub-devices to delete".into(),
            });
        }
        let directory = self.inner.state.directory();
        if !directory.contains(did) {
            return Err(CoreError::NotInitialized {
                step: format!("sub-device listing for {did}"),
            });
        }

        let mut accepted = 0;
        for target in targets {
            let Some(sub) = directory.find(did, target) else {
                debug!(did, target, "delete target not in sub-device list, skipped");
                continue;
            };
            let request = Request::DeleteSubDevice {
                sub_did: sub.sub_did,
            };
            if self.send_encoded(did, &endpoint, &request)? {
                accepted += 1;
            }
        }
        Ok(accepted)
    }

    fn send_frame(&self, did: &str, request: &Request) -> Result<bool, CoreError> {
        let endpoint = self.endpoint(did)?;
        self.send_encoded(did, &endpoint, request)
    }

    fn send_encoded(
        &self,
        did: &str,
        endpoint: &Endpoint,
        request: &Request,
    ) -> Result<bool, CoreError> {
        let sequence = self.inner.sequence.next();
        let raw = request.encode(sequence)?;
        debug!(did, action = request.action().code(), sequence, "sub-device request");
        self.inner.registry.send(
            endpoint,
            ChannelKind::Custom,
            did,
            OutboundMessage::raw(did, raw),
        )
    }

    // ── Binding ──────────────────────────────────────────────────────

    /// Bind a sub-device through an integrator endpoint.
    ///
    /// On success the device joins the bound set and
    /// [`GatewayEvent::Initialized`] is re-emitted with the full list.
    /// `Ok(None)` means the endpoint answered without a did.
    pub async fn bind_device(
        &self,
        url: Url,
        info: BindInfo,
    ) -> Result<Option<BoundDevice>, CoreError> {
        let inner = &self.inner;
        if !inner.state.is_initialized() {
            return Err(CoreError::not_initialized());
        }
        let parent = info
            .parent
            .as_deref()
            .map(|p| inner.state.device(p))
            .transpose()?;

        let request = BindRequest {
            wechat_open_id: inner.config.open_id.expose_secret().to_owned(),
            mac: info.mac,
            product_key: info.product_key,
        };
        let response = match inner.directory.bind_device(url, &request).await {
            Ok(response) => response,
            Err(e) => {
                let e = CoreError::from(e);
                warn!(error = %e, "bind request failed");
                inner.state.report(&e);
                return Err(e);
            }
        };

        let Some(did) = response.did.clone().filter(|d| !d.is_empty()) else {
            warn!(mac = %request.mac, "bind response carried no did, ignored");
            return Ok(None);
        };
        let device = BoundDevice::from_bind(&response, did, parent.as_ref());
        info!(did = %device.did, "device bound");
        let devices = inner.state.insert_device(device.clone())?;
        inner.state.emit(GatewayEvent::Initialized { devices });
        Ok(Some(device))
    }

    // ── Observation ──────────────────────────────────────────────────

    /// Subscribe to gateway events.
    pub fn events(&self) -> broadcast::Receiver<GatewayEvent> {
        self.inner.state.subscribe()
    }

    /// Gateway events as a `Stream`.
    pub fn event_stream(&self) -> BroadcastStream<GatewayEvent> {
        BroadcastStream::new(self.events())
    }

    /// Bound devices, `None` before initialization.
    pub fn bound_devices(&self) -> Option<Vec<BoundDevice>> {
        self.inner.state.devices()
    }

    /// Current sub-device snapshot of a center-control device.
    pub fn sub_devices(&self, did: &str) -> Option<Vec<SubDevice>> {
        self.inner.state.directory().snapshot(did)
    }

    /// Handshake status of one of the device's channels.
    ///
    /// `Ok(None)` when the channel was never opened.
    pub fn channel_status(
        &self,
        did: &str,
        kind: ChannelKind,
    ) -> Result<Option<ChannelStatus>, CoreError> {
        let endpoint = self.endpoint(did)?;
        Ok(self.inner.registry.status(&endpoint, kind))
    }

    /// `true` after a successful [`init()`](Self::init).
    pub fn is_initialized(&self) -> bool {
        self.inner.session.load().is_some() && self.inner.state.is_initialized()
    }

    /// Close every socket and cancel pending timers. The gateway cannot
    /// open sockets afterwards.
    pub fn shutdown(&self) {
        info!("gateway shutting down");
        self.inner.registry.shutdown();
        self.inner.cancel.cancel();
    }

    /// Relay endpoint of a bound device.
    fn endpoint(&self, did: &str) -> Result<Endpoint, CoreError> {
        self.inner
            .state
            .device(did)?
            .endpoint()
            .ok_or_else(|| CoreError::Validation {
                message: format!("device {did} has no relay host or port"),
            })
    }
}
