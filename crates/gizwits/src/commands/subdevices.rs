//! Sub-device command handlers.

use tabled::Tabled;
use tokio::sync::broadcast;

use gizwits_core::{ChannelKind, Gateway, GatewayEvent, SubDevice, SubDeviceCandidate};

use crate::cli::{GlobalOpts, SubdevicesArgs, SubdevicesCommand};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Tabled)]
struct SubDeviceRow {
    #[tabled(rename = "Sub ID")]
    sub_did: u32,
    #[tabled(rename = "DID")]
    did: String,
    #[tabled(rename = "MAC")]
    mac: String,
    #[tabled(rename = "Product")]
    product_key: String,
    #[tabled(rename = "Online")]
    online: String,
}

impl From<&SubDevice> for SubDeviceRow {
    fn from(s: &SubDevice) -> Self {
        Self {
            sub_did: s.sub_did,
            did: s.did.clone(),
            mac: s.mac.clone(),
            product_key: s.product_key.clone(),
            online: if s.is_online { "yes" } else { "no" }.into(),
        }
    }
}

pub async fn handle(
    gateway: &Gateway,
    args: SubdevicesArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let mut events = gateway.events();
    util::init(gateway).await?;

    match args.command {
        SubdevicesCommand::List { did } => {
            let subs = fetch_list(gateway, &mut events, &did, global).await?;
            let out = output::render_list(&global.output, &subs, |s| SubDeviceRow::from(s), |s| {
                s.did.clone()
            });
            output::print_output(&out, global.quiet);
            Ok(())
        }

        SubdevicesCommand::Add { did, macs } => {
            util::connect_ready(gateway, &did, &[ChannelKind::Custom], global).await?;
            let candidates: Vec<SubDeviceCandidate> =
                macs.into_iter().map(SubDeviceCandidate::with_mac).collect();
            if !gateway.add_sub_devices(&did, &candidates)? {
                return Err(CliError::send_failed(&did, ChannelKind::Custom));
            }
            if !global.quiet {
                eprintln!("✓ Add request sent to {did}");
            }
            Ok(())
        }

        SubdevicesCommand::Delete { did, targets } => {
            // Deletion resolves targets against a fresh listing.
            let subs = fetch_list(gateway, &mut events, &did, global).await?;
            if let Some(missing) = targets.iter().find(|t| !subs.iter().any(|s| &s.did == *t)) {
                tracing::warn!(did = %did, target = %missing, "sub-device not in listing, skipped");
            }
            let sent = gateway.delete_sub_devices(&did, &targets)?;
            if !global.quiet {
                eprintln!("✓ {sent} delete request(s) sent to {did}");
            }
            Ok(())
        }
    }
}

/// Request the sub-device list of `did` and wait for the snapshot.
async fn fetch_list(
    gateway: &Gateway,
    events: &mut broadcast::Receiver<GatewayEvent>,
    did: &str,
    global: &GlobalOpts,
) -> Result<Vec<SubDevice>, CliError> {
    util::connect_ready(gateway, did, &[ChannelKind::Custom], global).await?;
    if !gateway.list_sub_devices(did)? {
        return Err(CliError::send_failed(did, ChannelKind::Custom));
    }
    util::wait_for_event(events, "the sub-device list", global, |event| match event {
        GatewayEvent::SubDevicesUpdated {
            did: parent,
            sub_devices,
        } if parent == did => Some(sub_devices),
        _ => None,
    })
    .await
}
