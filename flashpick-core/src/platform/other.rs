use crate::device::Device;
use anyhow::Result;
use log::warn;

/// Device scanning is only implemented for Linux; elsewhere the catalog
/// has to be supplied by the caller.
pub fn scan_devices() -> Result<Vec<Device>> {
    warn!("Device scanning is not supported on this platform");
    Ok(Vec::new())
}
