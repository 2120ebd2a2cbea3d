//! Shared helpers for command handlers.

use std::time::Duration;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::{Instant, sleep, timeout_at};

use gizwits_core::{BoundDevice, ChannelKind, ChannelStatus, Gateway, GatewayEvent};

use crate::cli::GlobalOpts;
use crate::error::CliError;

const READY_POLL: Duration = Duration::from_millis(100);

/// Initialize the gateway, returning the bound devices.
pub async fn init(gateway: &Gateway) -> Result<Vec<BoundDevice>, CliError> {
    Ok(gateway.init().await?)
}

pub fn wait_duration(global: &GlobalOpts) -> Duration {
    Duration::from_secs(global.wait)
}

/// Connect `did` and wait until every channel in `kinds` is ready.
pub async fn connect_ready(
    gateway: &Gateway,
    did: &str,
    kinds: &[ChannelKind],
    global: &GlobalOpts,
) -> Result<(), CliError> {
    gateway.connect(did)?;
    let deadline = Instant::now() + wait_duration(global);
    for &kind in kinds {
        while gateway.channel_status(did, kind)? != Some(ChannelStatus::Ready) {
            if Instant::now() >= deadline {
                return Err(CliError::Timeout {
                    what: format!("the {kind} channel of {did}"),
                    seconds: global.wait,
                });
            }
            sleep(READY_POLL).await;
        }
    }
    Ok(())
}

/// Wait for the first event matching `pred`, failing after `--wait`.
pub async fn wait_for_event<T>(
    events: &mut broadcast::Receiver<GatewayEvent>,
    what: &str,
    global: &GlobalOpts,
    mut pred: impl FnMut(GatewayEvent) -> Option<T>,
) -> Result<T, CliError> {
    let deadline = Instant::now() + wait_duration(global);
    loop {
        let event = match timeout_at(deadline, events.recv()).await {
            Ok(Ok(event)) => event,
            Ok(Err(RecvError::Lagged(skipped))) => {
                tracing::warn!(skipped, "event receiver lagged");
                continue;
            }
            Ok(Err(RecvError::Closed)) => {
                return Err(CliError::NotReady {
                    message: "gateway event channel closed".into(),
                });
            }
            Err(_) => {
                return Err(CliError::Timeout {
                    what: what.into(),
                    seconds: global.wait,
                });
            }
        };
        if let GatewayEvent::Error { ref kind, ref message } = event {
            tracing::warn!(%kind, %message, "gateway reported an error");
        }
        if let Some(found) = pred(event) {
            return Ok(found);
        }
    }
}

/// Parse a hex string (whitespace and `0x` prefix allowed) into bytes.
pub fn parse_hex(input: &str) -> Result<Vec<u8>, CliError> {
    let cleaned: String = input
        .trim()
        .trim_start_matches("0x")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    let invalid = |reason: String| CliError::Validation {
        field: "raw".into(),
        reason,
    };
    if cleaned.is_empty() {
        return Err(invalid("no bytes given".into()));
    }
    if cleaned.len() % 2 != 0 {
        return Err(invalid("odd number of hex digits".into()));
    }
    (0..cleaned.len())
        .step_by(2)
        .map(|i| {
            let pair = cleaned.get(i..i + 2).unwrap_or_default();
            u8::from_str_radix(pair, 16).map_err(|_| invalid(format!("'{pair}' is not hex")))
        })
        .collect()
}

pub fn format_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
