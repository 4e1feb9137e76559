use crate::device::{Device, DeviceId, MountPoint};
use anyhow::Result;
use log::{debug, warn};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Helper to read a specific file from the /sys/block filesystem.
fn read_sys_file(device_name: &str, file: &str) -> io::Result<String> {
    let path = PathBuf::from("/sys/block").join(device_name).join(file);
    fs::read_to_string(path).map(|s| s.trim().to_string())
}

/// Maps a partition's kernel name to its parent disk (`sda1` -> `sda`,
/// `mmcblk0p2` -> `mmcblk0`, `nvme0n1p3` -> `nvme0n1`).
pub(crate) fn parent_device_name(name: &str) -> &str {
    if name.starts_with("mmcblk") || name.starts_with("nvme") {
        if let Some(index) = name.rfind('p') {
            let (disk, part) = name.split_at(index);
            if part.len() > 1 && part[1..].chars().all(|c| c.is_ascii_digit()) {
                return disk;
            }
        }
        return name;
    }
    name.trim_end_matches(|c: char| c.is_ascii_digit())
}

/// `/sys/block/*/size` counts 512-byte sectors regardless of the
/// device's logical block size.
fn sectors_to_bytes(sectors: u64) -> Option<u64> {
    sectors.checked_mul(512)
}

fn kernel_name(disk_name: &std::ffi::OsStr) -> String {
    let name = disk_name.to_string_lossy();
    name.strip_prefix("/dev/").unwrap_or(name.as_ref()).to_string()
}

/// Scans `/sys/block` and returns every block device as a catalog snapshot.
///
/// - Loop, RAM and zram devices are skipped.
/// - Devices reporting a size of zero (empty card readers) are skipped.
/// - The device holding `/`, and any non-removable device, is flagged as a
///   system device.
/// - Mount points of all partitions are attached to their parent disk.
pub fn scan_devices() -> Result<Vec<Device>> {
    let disks = sysinfo::Disks::new_with_refreshed_list();

    let system_disk = disks
        .iter()
        .find(|disk| disk.mount_point() == Path::new("/"))
        .map(|disk| parent_device_name(&kernel_name(disk.name())).to_string());
    if system_disk.is_none() {
        warn!("Could not determine the system drive");
    }

    let mut devices = Vec::new();
    for entry in fs::read_dir("/sys/block")?.filter_map(|e| e.ok()) {
        let device_name = entry.file_name().to_string_lossy().to_string();

        if ["loop", "ram", "zram"].iter().any(|p| device_name.starts_with(p)) {
            continue;
        }

        let size_sectors = read_sys_file(&device_name, "size")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(0);
        if size_sectors == 0 {
            continue;
        }
        let Some(size) = sectors_to_bytes(size_sectors) else {
            warn!("Skipping {device_name}: size of {size_sectors} sectors overflows");
            continue;
        };

        let removable = read_sys_file(&device_name, "removable")
            .map(|s| s == "1")
            .unwrap_or(false);
        let read_only = read_sys_file(&device_name, "ro")
            .map(|s| s == "1")
            .unwrap_or(false);
        let model = read_sys_file(&device_name, "device/model").unwrap_or_default();

        let mountpoints = disks
            .iter()
            .filter(|disk| parent_device_name(&kernel_name(disk.name())) == device_name)
            .map(|disk| MountPoint::new(disk.mount_point()))
            .collect();

        let is_system = !removable || system_disk.as_deref() == Some(device_name.as_str());

        devices.push(Device {
            id: DeviceId::new(format!("/dev/{device_name}")),
            name: if model.is_empty() { device_name.clone() } else { model },
            size,
            write_protected: read_only,
            mountpoints,
            is_system,
        });
    }

    debug!("Scanned {} block devices", devices.len());
    Ok(devices)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_names_map_to_parent() {
        assert_eq!(parent_device_name("sda1"), "sda");
        assert_eq!(parent_device_name("sdb"), "sdb");
        assert_eq!(parent_device_name("mmcblk0p2"), "mmcblk0");
        assert_eq!(parent_device_name("mmcblk0"), "mmcblk0");
        assert_eq!(parent_device_name("nvme0n1p3"), "nvme0n1");
        assert_eq!(parent_device_name("nvme0n1"), "nvme0n1");
    }

    #[test]
    fn sector_counts_convert_without_overflow() {
        assert_eq!(sectors_to_bytes(2), Some(1024));
        assert_eq!(sectors_to_bytes(62_333_952), Some(31_914_983_424));
        assert_eq!(sectors_to_bytes(u64::MAX), None);
        assert_eq!(sectors_to_bytes(u64::MAX / 512 + 1), None);
    }
}
