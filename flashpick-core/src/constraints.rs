//! Pure compatibility checks between a device and an image.
//!
//! These back the selection engine's own validation and give front-ends a
//! single place to derive warnings from.
use crate::device::Device;
use crate::image::Image;
use std::fmt;
use std::path::Path;

/// Devices above this capacity get a "are you sure?" warning.
pub const LARGE_DRIVE_SIZE: u64 = 128_000_000_000;

pub fn is_drive_locked(device: &Device) -> bool {
    device.write_protected
}

pub fn is_system_drive(device: &Device) -> bool {
    device.is_system
}

/// True if the image file lives on a filesystem mounted from `device`.
///
/// Paths are compared component-wise, so `/mnt/usb` is an ancestor of
/// `/mnt/usb/os.img` but not of `/mnt/usb2/os.img`.
pub fn is_source_drive(device: &Device, image: &Image) -> bool {
    let image_path = Path::new(&image.path);
    device
        .mountpoints
        .iter()
        .any(|mount| !mount.path.as_os_str().is_empty() && image_path.starts_with(&mount.path))
}

pub fn is_drive_large_enough(device: &Device, image: &Image) -> bool {
    device.size >= image.size
}

pub fn is_drive_size_recommended(device: &Device, image: &Image) -> bool {
    device.size >= image.recommended_drive_size.unwrap_or(0)
}

pub fn is_drive_large(device: &Device) -> bool {
    device.size > LARGE_DRIVE_SIZE
}

/// Whether `device` can be flashed with `image` at all.
pub fn is_drive_valid(device: &Device, image: Option<&Image>) -> bool {
    if is_drive_locked(device) {
        return false;
    }
    match image {
        Some(image) => is_drive_large_enough(device, image) && !is_source_drive(device, image),
        None => true,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriveStatus {
    Locked,
    Source,
    TooSmall,
    System,
    SizeNotRecommended,
    Large,
}

impl DriveStatus {
    /// Errors make a device unselectable; everything else is a warning.
    pub fn is_error(self) -> bool {
        matches!(self, DriveStatus::Locked | DriveStatus::Source | DriveStatus::TooSmall)
    }
}

impl fmt::Display for DriveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            DriveStatus::Locked => "Locked",
            DriveStatus::Source => "Source drive",
            DriveStatus::TooSmall => "Too small",
            DriveStatus::System => "System drive",
            DriveStatus::SizeNotRecommended => "Not recommended",
            DriveStatus::Large => "Large drive",
        };
        f.write_str(message)
    }
}

/// Every status that applies to `device`, errors first.
pub fn drive_statuses(device: &Device, image: Option<&Image>) -> Vec<DriveStatus> {
    let mut statuses = Vec::new();

    if is_drive_locked(device) {
        statuses.push(DriveStatus::Locked);
    }
    if let Some(image) = image {
        if is_source_drive(device, image) {
            statuses.push(DriveStatus::Source);
        }
        if !is_drive_large_enough(device, image) {
            statuses.push(DriveStatus::TooSmall);
        } else if !is_drive_size_recommended(device, image) {
            statuses.push(DriveStatus::SizeNotRecommended);
        }
    }
    if is_system_drive(device) {
        statuses.push(DriveStatus::System);
    }
    if is_drive_large(device) {
        statuses.push(DriveStatus::Large);
    }

    statuses.sort_by_key(|s| !s.is_error());
    statuses
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_drive_matches_whole_components() {
        let device = Device::new("/dev/sdb", "USB", 8_000_000_000).with_mountpoint("/mnt/usb");
        assert!(is_source_drive(&device, &Image::new("/mnt/usb/os.img", 1)));
        assert!(is_source_drive(&device, &Image::new("/mnt/usb/nested/os.img", 1)));
        assert!(!is_source_drive(&device, &Image::new("/mnt/usb2/os.img", 1)));
        assert!(!is_source_drive(&device, &Image::new("https://example.com/os.img", 1)));
    }

    #[test]
    fn unmounted_drive_is_never_source() {
        let device = Device::new("/dev/sdb", "USB", 8_000_000_000);
        assert!(!is_source_drive(&device, &Image::new("/mnt/usb/os.img", 1)));
    }

    #[test]
    fn size_checks() {
        let device = Device::new("/dev/sdb", "USB", 1000);
        assert!(is_drive_large_enough(&device, &Image::new("a.img", 1000)));
        assert!(!is_drive_large_enough(&device, &Image::new("a.img", 1001)));
        let image = Image::new("a.img", 10).with_recommended_drive_size(2000);
        assert!(!is_drive_size_recommended(&device, &image));
        assert!(is_drive_size_recommended(&device, &Image::new("a.img", 10)));
    }

    #[test]
    fn validity_requires_unlocked_and_fitting() {
        let device = Device::new("/dev/sdb", "USB", 1000);
        assert!(is_drive_valid(&device, None));
        assert!(!is_drive_valid(&device.clone().write_protected(true), None));
        assert!(!is_drive_valid(&device, Some(&Image::new("a.img", 2000))));
    }

    #[test]
    fn statuses_put_errors_first() {
        let device = Device::new("/dev/sda", "Disk", 256_000_000_000)
            .system(true)
            .write_protected(true);
        let statuses = drive_statuses(&device, None);
        assert_eq!(
            statuses,
            vec![DriveStatus::Locked, DriveStatus::System, DriveStatus::Large]
        );
        assert!(statuses[0].is_error());
        assert!(!statuses[1].is_error());
    }

    #[test]
    fn too_small_supersedes_not_recommended() {
        let device = Device::new("/dev/sdb", "USB", 1000);
        let image = Image::new("a.img", 2000).with_recommended_drive_size(4000);
        assert_eq!(drive_statuses(&device, Some(&image)), vec![DriveStatus::TooSmall]);
    }
}
