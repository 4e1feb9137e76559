//! Source image descriptors and their boundary validation.
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A source image, either chosen directly by the user or derived from an
/// OS variant (see [`crate::os`]).
///
/// `path` and `size` are mandatory; everything else is optional.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    pub path: String,
    /// Size in bytes.
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub support_url: Option<String>,
    /// Minimum capacity the image expects its target device to have.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommended_drive_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_checksum: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_checksum_type: Option<String>,
}

impl Image {
    pub fn new(path: impl Into<String>, size: u64) -> Self {
        Image {
            path: path.into(),
            size,
            ..Default::default()
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_logo(mut self, logo: impl Into<String>) -> Self {
        self.logo = Some(logo.into());
        self
    }

    pub fn with_support_url(mut self, url: impl Into<String>) -> Self {
        self.support_url = Some(url.into());
        self
    }

    pub fn with_recommended_drive_size(mut self, size: u64) -> Self {
        self.recommended_drive_size = Some(size);
        self
    }

    pub fn with_checksum(mut self, checksum: impl Into<String>, kind: impl Into<String>) -> Self {
        self.checksum = Some(checksum.into());
        self.checksum_type = Some(kind.into());
        self
    }

    /// Checks the invariants a typed `Image` can still violate.
    pub fn validate(&self) -> Result<()> {
        if self.path.is_empty() {
            return Err(Error::invalid("path", "missing image path"));
        }
        Ok(())
    }

    /// Builds an image from a loosely typed descriptor, such as one handed
    /// over by a UI layer or read from a manifest.
    ///
    /// Each missing or mistyped field is reported as a distinct
    /// [`Error::InvalidArgument`] naming that field.
    pub fn from_value(value: &Value) -> Result<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| Error::invalid("image", "descriptor must be an object"))?;

        let path = match object.get("path") {
            None | Some(Value::Null) => return Err(Error::invalid("path", "missing image path")),
            Some(Value::String(path)) => path.clone(),
            Some(other) => {
                return Err(Error::invalid("path", format!("expected a string, got {other}")));
            }
        };

        let size = match object.get("size") {
            None | Some(Value::Null) => return Err(Error::invalid("size", "missing image size")),
            Some(Value::Number(n)) => n
                .as_u64()
                .ok_or_else(|| Error::invalid("size", format!("not a byte count: {n}")))?,
            Some(other) => {
                return Err(Error::invalid("size", format!("expected a number, got {other}")));
            }
        };

        let image = Image {
            path,
            size,
            url: optional_string(object, "url")?,
            name: optional_string(object, "name")?,
            logo: optional_string(object, "logo")?,
            support_url: optional_string(object, "supportUrl")?,
            recommended_drive_size: optional_u64(object, "recommendedDriveSize")?,
            checksum: optional_string(object, "checksum")?,
            checksum_type: optional_string(object, "checksumType")?,
            download_checksum: optional_string(object, "downloadChecksum")?,
            download_checksum_type: optional_string(object, "downloadChecksumType")?,
        };
        image.validate()?;
        Ok(image)
    }
}

fn optional_string(object: &Map<String, Value>, field: &'static str) -> Result<Option<String>> {
    match object.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(Error::invalid(field, format!("expected a string, got {other}"))),
    }
}

fn optional_u64(object: &Map<String, Value>, field: &'static str) -> Result<Option<u64>> {
    match object.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .map(Some)
            .ok_or_else(|| Error::invalid(field, format!("not a byte count: {n}"))),
        Some(other) => Err(Error::invalid(field, format!("expected a number, got {other}"))),
    }
}
