//! OS selections and the size-variant mapping that turns them into images.
//!
//! An OS ships in several size variants, each declaring the device capacity
//! it expects. Which variant is used depends on the device the user picked,
//! so the resulting [`Image`] is always derived, never stored.
use crate::image::Image;
use serde::{Deserialize, Serialize};

/// One downloadable size variant of an OS.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OsVariant {
    pub url: String,
    pub recommended_drive_size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl OsVariant {
    pub fn new(url: impl Into<String>, recommended_drive_size: u64) -> Self {
        OsVariant {
            url: url.into(),
            recommended_drive_size,
            checksum: None,
            checksum_type: None,
            name: None,
        }
    }

    pub fn with_checksum(mut self, checksum: impl Into<String>, kind: impl Into<String>) -> Self {
        self.checksum = Some(checksum.into());
        self.checksum_type = Some(kind.into());
        self
    }
}

/// A named OS with an ordered list of size variants.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OsSelection {
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub support_url: Option<String>,
    pub images: Vec<OsVariant>,
}

impl OsSelection {
    /// The variant with the smallest recommended drive size. Ties go to the
    /// variant listed first.
    pub fn smallest_variant(&self) -> Option<&OsVariant> {
        smallest(&self.images)
    }

    /// Picks the variant for a device of `device_size` bytes: the largest
    /// variant that still fits, or the smallest one if none fits (or no
    /// device is known).
    pub fn variant_for(&self, device_size: Option<u64>) -> Option<&OsVariant> {
        let fitting = device_size.and_then(|size| {
            self.images
                .iter()
                .filter(|v| v.recommended_drive_size <= size)
                .fold(None, |best: Option<&OsVariant>, v| match best {
                    Some(b) if b.recommended_drive_size >= v.recommended_drive_size => Some(b),
                    _ => Some(v),
                })
        });
        fitting.or_else(|| self.smallest_variant())
    }

    /// Maps a variant into the image shape used for size, URL and checksum
    /// purposes.
    pub fn image_for(&self, variant: &OsVariant) -> Image {
        Image {
            path: variant.url.clone(),
            size: variant.recommended_drive_size,
            url: Some(variant.url.clone()),
            name: Some(self.name.clone()),
            logo: self.logo.clone(),
            support_url: self.support_url.clone(),
            recommended_drive_size: Some(variant.recommended_drive_size),
            checksum: None,
            checksum_type: None,
            download_checksum: variant.checksum.clone(),
            download_checksum_type: variant.checksum_type.clone(),
        }
    }
}

fn smallest(variants: &[OsVariant]) -> Option<&OsVariant> {
    variants.iter().fold(None, |best: Option<&OsVariant>, v| match best {
        Some(b) if b.recommended_drive_size <= v.recommended_drive_size => Some(b),
        _ => Some(v),
    })
}
