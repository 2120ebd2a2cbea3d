//! Device binding.

use url::Url;

use gizwits_core::{BindInfo, Gateway};

use crate::cli::{BindArgs, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::devices;
use super::util;

pub async fn handle(gateway: &Gateway, args: BindArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let url: Url = args.url.parse().map_err(|_| CliError::Validation {
        field: "url".into(),
        reason: format!("invalid URL: {}", args.url),
    })?;
    util::init(gateway).await?;

    let info = BindInfo {
        mac: args.mac,
        product_key: args.product_key,
        parent: args.parent,
    };
    let Some(device) = gateway.bind_device(url, info).await? else {
        eprintln!("Binding endpoint answered without a device id; nothing was bound");
        return Ok(());
    };

    let out = output::render_single(&global.output, &device, devices::detail, |d| {
        d.did.clone()
    });
    output::print_output(&out, global.quiet);
    Ok(())
}
