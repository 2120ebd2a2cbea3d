// ── Channel: one relay socket per (endpoint, kind) ──
//
// `ChannelState` is the pure handshake state machine. `Channel` wraps it
// with a socket, a driver task, the heartbeat and the login-retry timer.
// Every socket open starts a new generation; work scheduled for an older
// generation is dropped when it fires.

use std::fmt;
use std::future::pending;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use gizwits_api::message::{LoginRequest, SESSION_EXPIRED_CODE};
use gizwits_api::{ChannelKind, Endpoint, InboundMessage, OutboundMessage, SocketEvent, SocketHandle};
use indexmap::IndexSet;
use secrecy::ExposeSecret;
use tokio::sync::mpsc;
use tokio::time::{Instant, Interval, MissedTickBehavior, Sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};
use url::Url;

use super::{SessionContext, SessionSettings};
use crate::error::CoreError;

// ── ChannelKey ───────────────────────────────────────────────────────

/// Identity of a channel. Devices on the same relay share one per kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelKey {
    pub endpoint: Endpoint,
    pub kind: ChannelKind,
}

impl ChannelKey {
    pub fn new(endpoint: Endpoint, kind: ChannelKind) -> Self {
        Self { endpoint, kind }
    }
}

impl fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}+{}", self.endpoint, self.kind)
    }
}

// ── ChannelStatus ────────────────────────────────────────────────────

/// Handshake progress, in the only order it may advance.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, strum::Display,
)]
pub enum ChannelStatus {
    #[default]
    Disconnected,
    Connecting,
    AwaitingLogin,
    AwaitingSubscribe,
    Ready,
}

impl ChannelStatus {
    fn successor(self) -> Option<Self> {
        match self {
            Self::Disconnected => Some(Self::Connecting),
            Self::Connecting => Some(Self::AwaitingLogin),
            Self::AwaitingLogin => Some(Self::AwaitingSubscribe),
            Self::AwaitingSubscribe => Some(Self::Ready),
            Self::Ready => None,
        }
    }

    /// The socket is open and accepts writes.
    pub fn is_open(self) -> bool {
        self >= Self::AwaitingLogin
    }
}

// ── ChannelState ─────────────────────────────────────────────────────

/// What to do after a login response or a session-expired notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginStep {
    /// Logged in: subscribe every tracked did and start the heartbeat.
    Subscribe,
    /// Send another `login_req` after `delay`.
    Retry { attempt: u32, delay: Duration },
    /// Too many rejections: close the socket.
    GiveUp { attempts: u32 },
}

/// Pure handshake state of one channel.
#[derive(Debug, Default)]
pub struct ChannelState {
    status: ChannelStatus,
    subscribed: IndexSet<String>,
    login_failures: u32,
    last_reconnect: Option<Instant>,
    generation: u64,
}

impl ChannelState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> ChannelStatus {
        self.status
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn login_failures(&self) -> u32 {
        self.login_failures
    }

    /// Tracked dids in insertion order.
    pub fn dids(&self) -> Vec<String> {
        self.subscribed.iter().cloned().collect()
    }

    pub fn is_tracking(&self, did: &str) -> bool {
        self.subscribed.contains(did)
    }

    /// Track `did`. Returns `false` if it was already tracked.
    pub fn add_did(&mut self, did: &str) -> bool {
        self.subscribed.insert(did.to_owned())
    }

    /// Stop tracking `did`. Returns `false` if it was not tracked.
    pub fn remove_did(&mut self, did: &str) -> bool {
        self.subscribed.shift_remove(did)
    }

    /// Move one step forward. Any other transition is refused.
    pub fn advance(&mut self, to: ChannelStatus) -> bool {
        if self.status.successor() == Some(to) {
            self.status = to;
            true
        } else {
            false
        }
    }

    /// Fall back to `Disconnected`.
    pub fn reset(&mut self) {
        self.status = ChannelStatus::Disconnected;
    }

    /// Start a new socket generation. `None` unless currently disconnected.
    pub fn begin_connect(&mut self) -> Option<u64> {
        if !self.advance(ChannelStatus::Connecting) {
            return None;
        }
        self.generation += 1;
        self.login_failures = 0;
        Some(self.generation)
    }

    pub fn on_login_result(&mut self, success: bool, settings: &SessionSettings) -> LoginStep {
        if success {
            self.login_failures = 0;
            self.advance(ChannelStatus::AwaitingSubscribe);
            return LoginStep::Subscribe;
        }
        self.record_login_failure(settings.max_login_retries, settings.retry_wait)
    }

    /// The relay dropped our session: log in again at once.
    pub fn on_session_expired(&mut self, settings: &SessionSettings) -> LoginStep {
        self.record_login_failure(settings.max_login_retries, Duration::ZERO)
    }

    fn record_login_failure(&mut self, max: u32, unit: Duration) -> LoginStep {
        self.login_failures = self.login_failures.saturating_add(1);
        if self.login_failures > max {
            LoginStep::GiveUp {
                attempts: self.login_failures,
            }
        } else {
            LoginStep::Retry {
                attempt: self.login_failures,
                delay: unit * self.login_failures,
            }
        }
    }

    /// Claim a reconnect slot if `cooldown` has passed since the last one.
    pub fn claim_reconnect(&mut self, now: Instant, cooldown: Duration) -> bool {
        if let Some(last) = self.last_reconnect {
            if now.saturating_duration_since(last) <= cooldown {
                return false;
            }
        }
        self.last_reconnect = Some(now);
        true
    }
}

// ── Channel runtime ──────────────────────────────────────────────────

struct Link {
    socket: SocketHandle,
    cancel: CancellationToken,
    generation: u64,
}

enum Next {
    Continue,
    StartHeartbeat,
    RetryLogin(Duration),
    Stop,
}

pub(crate) struct Channel {
    key: ChannelKey,
    url: Url,
    ctx: Arc<SessionContext>,
    state: Mutex<ChannelState>,
    link: Mutex<Option<Link>>,
}

impl Channel {
    pub(crate) fn new(key: ChannelKey, url: Url, ctx: Arc<SessionContext>) -> Arc<Self> {
        Arc::new(Self {
            key,
            url,
            ctx,
            state: Mutex::new(ChannelState::new()),
            link: Mutex::new(None),
        })
    }

    fn state(&self) -> MutexGuard<'_, ChannelState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn link(&self) -> MutexGuard<'_, Option<Link>> {
        self.link.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn status(&self) -> ChannelStatus {
        self.state().status()
    }

    pub(crate) fn is_tracking(&self, did: &str) -> bool {
        self.state().is_tracking(did)
    }

    // ── Operations ───────────────────────────────────────────────────

    /// Track `did` and bring the socket far enough to serve it.
    pub(crate) fn connect(self: &Arc<Self>, did: &str) {
        let status = {
            let mut state = self.state();
            state.add_did(did);
            state.status()
        };
        match status {
            ChannelStatus::Disconnected => self.open(),
            ChannelStatus::AwaitingSubscribe | ChannelStatus::Ready => {
                self.subscribe();
            }
            ChannelStatus::Connecting | ChannelStatus::AwaitingLogin => {
                debug!(key = %self.key, did, "did recorded, subscribe follows login");
            }
        }
    }

    /// Write to the socket if it is open.
    pub(crate) fn send(&self, message: OutboundMessage) -> bool {
        let status = self.status();
        if !status.is_open() {
            warn!(key = %self.key, cmd = message.cmd(), %status, "send on closed socket");
            return false;
        }
        self.write(message)
    }

    pub(crate) fn claim_reconnect(&self, cooldown: Duration) -> bool {
        self.state().claim_reconnect(Instant::now(), cooldown)
    }

    /// Send a login after `delay` unless the socket generation moved on.
    pub(crate) fn schedule_login(self: &Arc<Self>, delay: Duration) {
        let generation = self.state().generation();
        let this = Arc::clone(self);
        let cancel = self.ctx.cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {}
                () = tokio::time::sleep(delay) => this.deferred_login(generation),
            }
        });
    }

    /// Close the socket and forget the handshake. Tracked dids are kept.
    pub(crate) fn close(&self) {
        self.state().reset();
        if let Some(link) = self.link().take() {
            link.cancel.cancel();
        }
    }

    // ── Socket lifecycle ─────────────────────────────────────────────

    fn open(self: &Arc<Self>) {
        let Some(generation) = self.state().begin_connect() else {
            return;
        };
        let cancel = self.ctx.cancel.child_token();
        let (socket, events) = self.ctx.connector.open(&self.url, cancel.clone());
        let previous = self.link().replace(Link {
            socket,
            cancel: cancel.clone(),
            generation,
        });
        if let Some(old) = previous {
            old.cancel.cancel();
        }

        info!(key = %self.key, url = %self.url, generation, "opening relay socket");
        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.drive(generation, events, cancel).await;
        });
    }

    async fn drive(
        self: Arc<Self>,
        generation: u64,
        mut events: mpsc::UnboundedReceiver<SocketEvent>,
        cancel: CancellationToken,
    ) {
        let mut heartbeat: Option<Interval> = None;
        let mut login_retry: Option<Pin<Box<Sleep>>> = None;

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                event = events.recv() => {
                    let Some(event) = event else {
                        self.on_closed(generation, None, "socket task ended");
                        break;
                    };
                    match self.on_socket_event(generation, event) {
                        Next::Continue => {}
                        Next::StartHeartbeat => {
                            heartbeat = Some(start_heartbeat(self.ctx.settings.heartbeat_interval));
                        }
                        Next::RetryLogin(delay) => {
                            login_retry = Some(Box::pin(tokio::time::sleep(delay)));
                        }
                        Next::Stop => break,
                    }
                }
                () = tick(&mut heartbeat) => {
                    trace!(key = %self.key, "heartbeat");
                    self.write(OutboundMessage::Ping);
                }
                () = expire(&mut login_retry) => {
                    login_retry = None;
                    self.login();
                }
            }
        }

        debug!(key = %self.key, generation, "channel driver exiting");
    }

    fn on_socket_event(&self, generation: u64, event: SocketEvent) -> Next {
        match event {
            SocketEvent::Opened => {
                let advanced = {
                    let mut state = self.state();
                    state.generation() == generation && state.advance(ChannelStatus::AwaitingLogin)
                };
                if !advanced {
                    return Next::Stop;
                }
                info!(key = %self.key, "relay socket open, logging in");
                self.login();
                Next::Continue
            }
            SocketEvent::Message(message) => self.on_message(generation, message),
            SocketEvent::Error(reason) => {
                warn!(key = %self.key, %reason, "relay socket error");
                self.ctx
                    .observer
                    .on_failure(&self.key, CoreError::Transport { message: reason });
                Next::Continue
            }
            SocketEvent::Closed { code, reason } => {
                self.on_closed(generation, code, &reason);
                Next::Stop
            }
        }
    }

    fn on_message(&self, generation: u64, message: InboundMessage) -> Next {
        match message {
            InboundMessage::Pong => {
                trace!(key = %self.key, "pong");
                Next::Continue
            }
            InboundMessage::LoginResult { success } => {
                let step = self.state().on_login_result(success, &self.ctx.settings);
                self.on_login_step(generation, step)
            }
            InboundMessage::SubscribeResult { success, failed } => {
                for did in &failed {
                    self.state().remove_did(did);
                    warn!(key = %self.key, did, "subscribe refused");
                    self.ctx.observer.on_subscribe_failed(&self.key, did);
                }
                for did in &success {
                    debug!(key = %self.key, did, "subscribed");
                    self.ctx.observer.on_subscribed(&self.key, did);
                }
                Next::Continue
            }
            InboundMessage::InvalidMessage { error_code, msg } => {
                if error_code == SESSION_EXPIRED_CODE {
                    warn!(key = %self.key, "relay session expired, logging in again");
                    let step = self.state().on_session_expired(&self.ctx.settings);
                    return self.on_login_step(generation, step);
                }
                self.ctx.observer.on_failure(
                    &self.key,
                    CoreError::Protocol {
                        message: format!("ErrorCode {error_code}: {msg}"),
                    },
                );
                Next::Continue
            }
            InboundMessage::Unrecognized { cmd } => {
                debug!(key = %self.key, cmd, "ignoring unrecognized relay command");
                Next::Continue
            }
            message @ (InboundMessage::OnlineStatus { .. }
            | InboundMessage::Raw { .. }
            | InboundMessage::Notification { .. }) => {
                self.ctx.observer.on_message(&self.key, message);
                Next::Continue
            }
        }
    }

    fn on_login_step(&self, generation: u64, step: LoginStep) -> Next {
        match step {
            LoginStep::Subscribe => {
                info!(key = %self.key, "logged in");
                self.subscribe();
                Next::StartHeartbeat
            }
            LoginStep::Retry { attempt, delay } => {
                warn!(key = %self.key, attempt, ?delay, "login rejected, retrying");
                self.ctx.observer.on_failure(
                    &self.key,
                    CoreError::Protocol {
                        message: format!("login rejected (attempt {attempt})"),
                    },
                );
                Next::RetryLogin(delay)
            }
            LoginStep::GiveUp { attempts } => {
                error!(key = %self.key, attempts, "login retries exhausted, closing socket");
                self.abandon(generation);
                self.ctx.observer.on_failure(
                    &self.key,
                    CoreError::Transport {
                        message: format!("{}: login failed {attempts} times, socket closed", self.key),
                    },
                );
                Next::Stop
            }
        }
    }

    fn on_closed(&self, generation: u64, code: Option<u16>, reason: &str) {
        if !self.abandon(generation) {
            return;
        }
        info!(key = %self.key, ?code, reason, "relay socket closed");
        let message = match code {
            Some(code) => format!("{}: socket closed (code {code}): {reason}", self.key),
            None => format!("{}: socket closed: {reason}", self.key),
        };
        self.ctx
            .observer
            .on_failure(&self.key, CoreError::Transport { message });
    }

    /// Tear down `generation` if it is still current.
    fn abandon(&self, generation: u64) -> bool {
        {
            let mut state = self.state();
            if state.generation() != generation {
                return false;
            }
            state.reset();
        }
        let mut link = self.link();
        if link.as_ref().is_some_and(|l| l.generation == generation) {
            if let Some(old) = link.take() {
                old.cancel.cancel();
            }
        }
        true
    }

    // ── Writes ───────────────────────────────────────────────────────

    fn write(&self, message: OutboundMessage) -> bool {
        let link = self.link();
        let Some(link) = link.as_ref() else {
            return false;
        };
        debug!(key = %self.key, cmd = message.cmd(), "relay send");
        link.socket.send(message)
    }

    fn login(&self) -> bool {
        let Some(credentials) = self.ctx.credentials.load_full() else {
            self.ctx
                .observer
                .on_failure(&self.key, CoreError::not_initialized());
            return false;
        };
        self.write(OutboundMessage::Login(LoginRequest {
            appid: credentials.app_id.clone(),
            uid: credentials.uid.clone(),
            token: credentials.token.expose_secret().to_owned(),
            p0_type: self.key.kind,
            heartbeat_interval: self.ctx.settings.keepalive.as_secs(),
            auto_subscribe: false,
        }))
    }

    fn subscribe(&self) -> bool {
        let dids = self.state().dids();
        if dids.is_empty() {
            return true;
        }
        let sent = self.write(OutboundMessage::subscribe(dids));
        if sent {
            self.state().advance(ChannelStatus::Ready);
        }
        sent
    }

    fn deferred_login(&self, generation: u64) {
        let current = {
            let state = self.state();
            state.generation() == generation && state.status() == ChannelStatus::AwaitingLogin
        };
        if current {
            debug!(key = %self.key, generation, "deferred login");
            self.login();
        } else {
            trace!(key = %self.key, generation, "deferred login no longer needed");
        }
    }
}

fn start_heartbeat(period: Duration) -> Interval {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

async fn tick(heartbeat: &mut Option<Interval>) {
    match heartbeat {
        Some(interval) => {
            interval.tick().await;
        }
        None => pending().await,
    }
}

async fn expire(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(sleep) => sleep.as_mut().await,
        None => pending().await,
    }
}
