//! Live event streaming.

use std::collections::HashSet;

use chrono::Local;
use owo_colors::OwoColorize;
use tokio::sync::broadcast::error::RecvError;

use gizwits_core::{Gateway, GatewayEvent};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output;

use super::util;

pub async fn handle(gateway: &Gateway, args: WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let mut events = gateway.events();
    let devices = util::init(gateway).await?;

    let dids: Vec<String> = if args.dids.is_empty() {
        devices.into_iter().map(|d| d.did).collect()
    } else {
        args.dids
    };
    for did in &dids {
        gateway.connect(did)?;
    }
    let watched: HashSet<String> = dids.into_iter().collect();
    let color = output::should_color(&global.color);
    let mut seen = 0usize;

    loop {
        let event = tokio::select! {
            biased;
            _ = tokio::signal::ctrl_c() => break,
            received = events.recv() => match received {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event receiver lagged");
                    continue;
                }
                Err(RecvError::Closed) => break,
            },
        };
        if event.did().is_some_and(|did| !watched.contains(did)) {
            continue;
        }
        output::print_output(&render_event(&event, &global.output, color), global.quiet);

        seen += 1;
        if args.count.is_some_and(|n| seen >= n) {
            break;
        }
    }
    Ok(())
}

fn render_event(event: &GatewayEvent, format: &OutputFormat, color: bool) -> String {
    match format {
        OutputFormat::Table | OutputFormat::Plain => render_line(event, color),
        OutputFormat::Json | OutputFormat::JsonCompact => output::render_json(event, true),
        OutputFormat::Yaml => format!(
            "---\n{}",
            serde_yaml::to_string(event).unwrap_or_default()
        ),
    }
}

fn render_line(event: &GatewayEvent, color: bool) -> String {
    let (label, detail) = describe(event);
    let time = Local::now().format("%H:%M:%S%.3f").to_string();
    let did = event.did().unwrap_or("-");
    if !color {
        return format!("{time} {label:<12} {did} {detail}");
    }
    let label = format!("{label:<12}");
    let label = match event {
        GatewayEvent::Error { .. } => label.red().to_string(),
        GatewayEvent::Connected { .. } | GatewayEvent::Initialized { .. } => {
            label.green().to_string()
        }
        _ => label.cyan().to_string(),
    };
    format!("{} {label} {} {detail}", time.dimmed(), did.bold())
}

fn describe(event: &GatewayEvent) -> (&'static str, String) {
    match event {
        GatewayEvent::Initialized { devices } => ("initialized", format!("{} devices", devices.len())),
        GatewayEvent::Connected { .. } => ("connected", String::new()),
        GatewayEvent::OnlineStatusChanged { online, .. } => (
            "online",
            if *online { "online" } else { "offline" }.into(),
        ),
        GatewayEvent::AttrsReceived { attrs, .. } => ("attrs", attrs.to_string()),
        GatewayEvent::RawReceived { raw, .. } => ("raw", util::format_hex(raw)),
        GatewayEvent::SubDevicesUpdated { sub_devices, .. } => {
            ("subdevices", format!("{} sub-devices", sub_devices.len()))
        }
        GatewayEvent::Error { kind, message } => ("error", format!("[{kind}] {message}")),
    }
}
