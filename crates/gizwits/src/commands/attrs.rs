//! Attribute read and write handlers.

use std::path::Path;

use serde_json::Value;

use gizwits_core::{ChannelKind, Gateway, GatewayEvent};

use crate::cli::{GlobalOpts, ReadArgs, WriteArgs};
use crate::error::CliError;
use crate::output;

use super::util;

pub async fn read(gateway: &Gateway, args: ReadArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let mut events = gateway.events();
    util::init(gateway).await?;
    util::connect_ready(gateway, &args.did, &[ChannelKind::AttrsV4], global).await?;

    let names = (!args.attrs.is_empty()).then_some(args.attrs);
    if !gateway.read(&args.did, names)? {
        return Err(CliError::send_failed(&args.did, ChannelKind::AttrsV4));
    }

    let did = args.did;
    let attrs = util::wait_for_event(&mut events, "attribute report", global, |event| {
        match event {
            GatewayEvent::AttrsReceived { did: from, attrs } if from == did => Some(attrs),
            _ => None,
        }
    })
    .await?;

    let out = output::render_single(
        &global.output,
        &attrs,
        |a| output::render_json(a, false),
        Value::to_string,
    );
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn write(gateway: &Gateway, args: WriteArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let attrs = match (args.attrs, args.from_file) {
        (Some(text), _) => Some(parse_attrs(&text)?),
        (None, Some(path)) => Some(read_attrs_file(&path)?),
        (None, None) => None,
    };
    let raw = args.raw.as_deref().map(util::parse_hex).transpose()?;

    util::init(gateway).await?;
    let mut kinds = Vec::with_capacity(2);
    if attrs.is_some() {
        kinds.push(ChannelKind::AttrsV4);
    }
    if raw.is_some() {
        kinds.push(ChannelKind::Custom);
    }
    util::connect_ready(gateway, &args.did, &kinds, global).await?;

    if !gateway.write(&args.did, attrs, raw)? {
        return Err(CliError::SendFailed {
            did: args.did,
            kind: kinds
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("/"),
        });
    }
    if !global.quiet {
        eprintln!("✓ Write sent to {}", args.did);
    }
    Ok(())
}

fn parse_attrs(text: &str) -> Result<Value, CliError> {
    let value: Value = serde_json::from_str(text)?;
    if !value.is_object() {
        return Err(CliError::Validation {
            field: "attrs".into(),
            reason: "expected a JSON object".into(),
        });
    }
    Ok(value)
}

fn read_attrs_file(path: &Path) -> Result<Value, CliError> {
    let contents = std::fs::read_to_string(path)?;
    parse_attrs(&contents)
}
