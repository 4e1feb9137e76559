use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Opaque, stable handle identifying a device across catalog snapshots.
///
/// On Linux this is the device node (e.g. `/dev/sdb`), but nothing in the
/// engine relies on that; identities are only ever compared for equality.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        DeviceId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for DeviceId {
    fn from(id: &str) -> Self {
        DeviceId(id.to_string())
    }
}

impl From<String> for DeviceId {
    fn from(id: String) -> Self {
        DeviceId(id)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

/// A mounted filesystem living on a device.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountPoint {
    pub path: PathBuf,
}

impl MountPoint {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        MountPoint { path: path.into() }
    }
}

/// Represents a storage device as published by the device catalog.
///
/// Devices are immutable per catalog snapshot; the selection engine never
/// modifies one, it only swaps the whole snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    #[serde(alias = "device")]
    pub id: DeviceId,
    /// Human-readable name (e.g. the vendor/model string).
    #[serde(default, alias = "description")]
    pub name: String,
    /// Capacity in bytes.
    pub size: u64,
    #[serde(default, rename = "isReadOnly", alias = "writeProtected")]
    pub write_protected: bool,
    #[serde(default)]
    pub mountpoints: Vec<MountPoint>,
    #[serde(default, rename = "isSystem")]
    pub is_system: bool,
}

impl Device {
    pub fn new(id: impl Into<DeviceId>, name: impl Into<String>, size: u64) -> Self {
        Device {
            id: id.into(),
            name: name.into(),
            size,
            write_protected: false,
            mountpoints: Vec::new(),
            is_system: false,
        }
    }

    pub fn write_protected(mut self, write_protected: bool) -> Self {
        self.write_protected = write_protected;
        self
    }

    pub fn system(mut self, is_system: bool) -> Self {
        self.is_system = is_system;
        self
    }

    pub fn with_mountpoint(mut self, path: impl Into<PathBuf>) -> Self {
        self.mountpoints.push(MountPoint::new(path));
        self
    }

    /// The capacity in gigabytes (GB, base 10) as shown to users.
    pub fn size_gb(&self) -> f64 {
        self.size as f64 / 1e9
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mount_info = if self.mountpoints.is_empty() {
            "[Not mounted]".to_string()
        } else {
            let paths: Vec<String> = self
                .mountpoints
                .iter()
                .map(|m| m.path.display().to_string())
                .collect();
            format!("[Mounted at {}]", paths.join(", "))
        };

        write!(
            f,
            "{:<15} {:<25} {:>6.1} GB {}",
            self.id, self.name, self.size_gb(), mount_info
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_catalog_entry() {
        let json = r#"{
            "device": "/dev/sdb",
            "description": "SanDisk Ultra",
            "size": 32000000000,
            "isReadOnly": true,
            "mountpoints": [{ "path": "/media/user/boot" }]
        }"#;
        let device: Device = serde_json::from_str(json).unwrap();
        assert_eq!(device.id, DeviceId::from("/dev/sdb"));
        assert_eq!(device.name, "SanDisk Ultra");
        assert!(device.write_protected);
        assert!(!device.is_system);
        assert_eq!(device.mountpoints.len(), 1);
    }

    #[test]
    fn display_lists_mountpoints() {
        let device = Device::new("/dev/sdc", "Card", 8_000_000_000).with_mountpoint("/mnt/a");
        let row = device.to_string();
        assert!(row.contains("/dev/sdc"));
        assert!(row.contains("8.0 GB"));
        assert!(row.contains("[Mounted at /mnt/a]"));
        assert!(Device::new("x", "", 0).to_string().contains("[Not mounted]"));
    }
}
