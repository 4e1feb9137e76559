//! The core, UI-agnostic library for the `flashpick` utility.
//!
//! `flashpick-core` is designed to be used as a library by any front-end, whether
//! it's a command-line interface (like `flashpick`) or a graphical user interface.
//! It owns the two pieces of logic a flasher front-end should not reimplement:
//! deciding whether a device/image pairing is safe, and turning a raw byte
//! counter into a steady percentage, speed and ETA.
//!
//! The library is structured into several key modules:
//! - [`device`], [`image`] and [`os`]: the descriptors being selected.
//! - [`selection`]: the [`Selection`] engine, which validates every change and
//!   drops a device selection as soon as it stops being compatible.
//! - [`constraints`]: the pure device/image checks behind that validation.
//! - [`progress`]: the [`Estimator`] and its background [`progress::Ticker`].
//! - [`platform`]: produces device catalog snapshots from the running system.
//!
//! ## Example: Choosing a Device for an Image
//!
//! ```rust,no_run
//! use flashpick_core::{platform, Image, Selection};
//! use anyhow::Result;
//!
//! fn main() -> Result<()> {
//!     let mut selection = Selection::with_catalog(platform::scan_devices()?);
//!     selection.set_image(Image::new("/home/user/os.img", 4_000_000_000))?;
//!
//!     let candidate = selection.catalog().first().map(|d| d.id.clone());
//!     if let Some(id) = candidate {
//!         match selection.set_device(&id) {
//!             Ok(()) => println!("Selected {}", id),
//!             Err(e) => println!("Cannot use {}: {}", id, e),
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod constraints;
pub mod device;
mod error;
pub mod image;
pub mod os;
pub mod platform;
pub mod progress;
pub mod selection;

pub use device::{Device, DeviceId, MountPoint};
pub use error::{Error, ErrorKind, Result};
pub use image::Image;
pub use os::{OsSelection, OsVariant};
pub use progress::{Estimator, EstimatorOptions, EstimatorState, ProgressSnapshot};
pub use selection::{ClearOptions, Selection};
