//! Device catalog sources.
//!
//! The selection engine only consumes catalog snapshots; this module is one
//! way of producing them. Each submodule exposes the same `scan_devices`
//! function so callers never touch platform details.

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "linux")]
pub use self::linux::*;

#[cfg(not(target_os = "linux"))]
mod other;
#[cfg(not(target_os = "linux"))]
pub use self::other::*;
