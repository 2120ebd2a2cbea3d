//! Bound-device listing.

use tabled::Tabled;

use gizwits_core::{BoundDevice, Gateway};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
pub(crate) struct DeviceRow {
    #[tabled(rename = "DID")]
    did: String,
    #[tabled(rename = "Type")]
    dtype: String,
    #[tabled(rename = "MAC")]
    mac: String,
    #[tabled(rename = "Product")]
    product_key: String,
    #[tabled(rename = "Online")]
    online: String,
    #[tabled(rename = "Alias")]
    alias: String,
    #[tabled(rename = "Relay")]
    relay: String,
}

impl From<&BoundDevice> for DeviceRow {
    fn from(d: &BoundDevice) -> Self {
        Self {
            did: d.did.clone(),
            dtype: d.device_type.as_str().to_owned(),
            mac: d.mac.clone(),
            product_key: d.product_key.clone(),
            online: if d.is_online { "yes" } else { "no" }.into(),
            alias: d.alias.clone(),
            relay: d
                .endpoint()
                .map_or_else(|| "-".into(), |e| e.to_string()),
        }
    }
}

pub(crate) fn detail(d: &BoundDevice) -> String {
    [
        format!("DID:      {}", d.did),
        format!("Type:     {}", d.device_type.as_str()),
        format!("MAC:      {}", d.mac),
        format!("Product:  {}", d.product_key),
        format!("Online:   {}", d.is_online),
        format!(
            "Relay:    {}",
            d.endpoint().map_or_else(|| "-".into(), |e| e.to_string())
        ),
    ]
    .join("\n")
}

pub async fn handle(gateway: &Gateway, global: &GlobalOpts) -> Result<(), CliError> {
    let devices = util::init(gateway).await?;
    let out = output::render_list(&global.output, &devices, |d| DeviceRow::from(d), |d| {
        d.did.clone()
    });
    output::print_output(&out, global.quiet);
    Ok(())
}
