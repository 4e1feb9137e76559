//! The selection engine: which device, which image or OS, and whether the
//! pairing is still safe.
//!
//! [`Selection`] is an owned store. Every mutation goes through one of its
//! methods, which revalidates synchronously before returning, so callers
//! always observe a consistent state. The selected device is kept as an
//! identity and resolved against the live catalog on every read, and the
//! effective image is recomputed by [`effective_image`] on every read, so
//! neither can go stale.
use crate::constraints;
use crate::device::{Device, DeviceId};
use crate::error::{Error, Result};
use crate::image::Image;
use crate::os::{OsSelection, OsVariant};
use log::{debug, info};
use serde_json::Value;

/// Options for [`Selection::clear`].
#[derive(Debug, Default, Clone, Copy)]
pub struct ClearOptions {
    /// Keep the image/OS selection and only drop the device.
    pub preserve_image: bool,
}

/// The image actually used for size, URL and checksum purposes.
///
/// A selected OS takes precedence over a plain image; its variant is chosen
/// for `device`'s capacity (see [`OsSelection::variant_for`]).
pub fn effective_image(
    image: Option<&Image>,
    os: Option<&OsSelection>,
    device: Option<&Device>,
) -> Option<Image> {
    match os {
        Some(os) => os
            .variant_for(device.map(|d| d.size))
            .map(|variant| os.image_for(variant)),
        None => image.cloned(),
    }
}

// A selected device must fit the image, meet its recommended size and not
// hold the image file itself.
fn accepts_image(device: &Device, image: &Image) -> bool {
    constraints::is_drive_large_enough(device, image)
        && constraints::is_drive_size_recommended(device, image)
        && !constraints::is_source_drive(device, image)
}

#[derive(Debug, Default, Clone)]
pub struct Selection {
    catalog: Vec<Device>,
    device: Option<DeviceId>,
    image: Option<Image>,
    os: Option<OsSelection>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an engine seeded with an initial catalog snapshot.
    pub fn with_catalog(catalog: Vec<Device>) -> Self {
        Selection {
            catalog,
            ..Self::default()
        }
    }

    pub fn catalog(&self) -> &[Device] {
        &self.catalog
    }

    fn find_device(&self, id: &DeviceId) -> Option<&Device> {
        self.catalog.iter().find(|d| &d.id == id)
    }

    /// Swaps in a new catalog snapshot.
    ///
    /// The selected device stays selected only if its identity is still
    /// present and its new descriptor can still take the effective image;
    /// reads then see the new descriptor.
    pub fn replace_catalog(&mut self, catalog: Vec<Device>) {
        debug!("Replacing device catalog ({} devices)", catalog.len());
        self.catalog = catalog;

        let Some(device) = self.drive() else {
            if let Some(id) = self.device.take() {
                info!("Selected device {} disappeared from the catalog", id);
            }
            return;
        };

        let still_valid = !device.write_protected
            && self.image().is_none_or(|image| accepts_image(device, &image));
        if !still_valid {
            if let Some(id) = self.device.take() {
                info!("Deselecting device {}: no longer compatible after refresh", id);
            }
        }
    }

    /// The OS variant that would be used for `id`, if an OS is selected.
    pub fn recommended_image(&self, id: &DeviceId) -> Option<&OsVariant> {
        let os = self.os.as_ref()?;
        let device = self.find_device(id)?;
        os.variant_for(Some(device.size))
    }

    pub fn set_device(&mut self, id: &DeviceId) -> Result<()> {
        if id.is_empty() {
            return Err(Error::invalid("device", "empty device identity"));
        }

        let device = self
            .find_device(id)
            .ok_or_else(|| Error::NotFound(id.clone()))?;

        if device.write_protected {
            return Err(Error::WriteProtected(id.clone()));
        }

        if let Some(image) = effective_image(self.image.as_ref(), self.os.as_ref(), Some(device)) {
            if !constraints::is_drive_large_enough(device, &image) {
                return Err(Error::InsufficientCapacity {
                    device: id.clone(),
                    device_size: device.size,
                    image_size: image.size,
                });
            }
        }

        debug!("Selected device {}", id);
        self.device = Some(id.clone());
        Ok(())
    }

    pub fn remove_device(&mut self) {
        if let Some(id) = self.device.take() {
            debug!("Deselected device {}", id);
        }
    }

    /// Deselects `id` if it is the current device, selects it otherwise.
    pub fn toggle_device(&mut self, id: &DeviceId) -> Result<()> {
        if self.is_current_drive(id) {
            self.remove_device();
            Ok(())
        } else {
            self.set_device(id)
        }
    }

    /// Selects a plain image, superseding any selected OS.
    ///
    /// If the current device can no longer take the image (too small, below
    /// the image's recommended size, or holding the image file itself), the
    /// device is silently deselected.
    pub fn set_image(&mut self, image: Image) -> Result<()> {
        image.validate()?;

        debug!("Selected image {} ({} bytes)", image.path, image.size);
        self.os = None;

        let incompatible = self
            .drive()
            .is_some_and(|device| !accepts_image(device, &image));
        if incompatible {
            if let Some(id) = self.device.take() {
                info!("Deselecting device {}: not compatible with {}", id, image.path);
            }
        }

        self.image = Some(image);
        Ok(())
    }

    /// Validates a loosely typed descriptor and selects it.
    pub fn set_image_value(&mut self, descriptor: &Value) -> Result<()> {
        let image = Image::from_value(descriptor)?;
        self.set_image(image)
    }

    /// Clears the plain image and any OS the effective image derives from.
    pub fn remove_image(&mut self) {
        debug!("Deselected image");
        self.image = None;
        self.os = None;
    }

    pub fn set_os(&mut self, os: OsSelection) {
        debug!("Selected OS {} {} ({} variants)", os.name, os.version, os.images.len());
        self.os = Some(os);
    }

    pub fn remove_os(&mut self) {
        debug!("Deselected OS");
        self.os = None;
    }

    pub fn drive(&self) -> Option<&Device> {
        self.device.as_ref().and_then(|id| self.find_device(id))
    }

    pub fn has_drive(&self) -> bool {
        self.drive().is_some()
    }

    pub fn image(&self) -> Option<Image> {
        effective_image(self.image.as_ref(), self.os.as_ref(), self.drive())
    }

    pub fn has_image(&self) -> bool {
        self.image().is_some()
    }

    pub fn os(&self) -> Option<&OsSelection> {
        self.os.as_ref()
    }

    pub fn has_os(&self) -> bool {
        self.os.is_some()
    }

    pub fn image_path(&self) -> Option<String> {
        self.image().map(|i| i.path)
    }

    pub fn image_size(&self) -> Option<u64> {
        self.image().map(|i| i.size)
    }

    pub fn image_url(&self) -> Option<String> {
        self.image().and_then(|i| i.url)
    }

    pub fn image_name(&self) -> Option<String> {
        self.image().and_then(|i| i.name)
    }

    pub fn image_logo(&self) -> Option<String> {
        self.image().and_then(|i| i.logo)
    }

    pub fn image_support_url(&self) -> Option<String> {
        self.image().and_then(|i| i.support_url)
    }

    pub fn image_recommended_drive_size(&self) -> Option<u64> {
        self.image().and_then(|i| i.recommended_drive_size)
    }

    /// The OS variant with the smallest recommended drive size, whatever
    /// device is selected.
    pub fn os_smallest_image(&self) -> Option<&OsVariant> {
        self.os.as_ref().and_then(|os| os.smallest_variant())
    }

    pub fn os_minimum_size(&self) -> Option<u64> {
        self.os_smallest_image().map(|v| v.recommended_drive_size)
    }

    pub fn is_current_drive(&self, id: &DeviceId) -> bool {
        !id.is_empty() && self.device.as_ref() == Some(id)
    }

    /// Drops the device and, unless `preserve_image` is set, the image and OS.
    pub fn clear(&mut self, options: ClearOptions) {
        debug!("Clearing selection (preserve_image: {})", options.preserve_image);
        self.device = None;
        if !options.preserve_image {
            self.image = None;
            self.os = None;
        }
    }
}
