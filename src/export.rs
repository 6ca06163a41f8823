use crate::device::DeviceInfo;
use anyhow::{Context, Result};

/// CSV dump of the inventory, header row in table column order.
pub fn devices_to_csv(devices: &[DeviceInfo]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for device in devices {
        writer
            .serialize(device)
            .context("Failed to encode device row")?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|err| anyhow::anyhow!("Failed to flush CSV writer: {}", err))?;
    String::from_utf8(bytes).context("CSV output was not valid UTF-8")
}

pub fn devices_to_json(devices: &[DeviceInfo]) -> Result<String> {
    serde_json::to_string_pretty(devices).context("Failed to encode devices as JSON")
}
