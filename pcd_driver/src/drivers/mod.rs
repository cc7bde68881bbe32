//! Device operation variants and simulated peripherals.
//!
//! - [`pcdev`] - `FileOperations` implementations, one per discovery form
//! - [`simulation`] - Software GPIO controller for development and testing
//!
//! # Adding New Variants
//!
//! 1. Implement `FileOperations` from `pcd_common::pcd::ops`
//! 2. Add a `DeviceKind` value and map it in [`create_ops`]

pub mod pcdev;
pub mod simulation;

use pcd_common::pcd::ops::FileOperations;
use pcd_common::pcd::types::DeviceKind;

/// Create the operation table for `kind`.
pub fn create_ops(kind: DeviceKind) -> Box<dyn FileOperations> {
    match kind {
        DeviceKind::Static => Box::new(pcdev::StaticDeviceOps),
        DeviceKind::Platform => Box::new(pcdev::PlatformDeviceOps),
        DeviceKind::DeviceTree => Box::new(pcdev::DeviceTreeDeviceOps),
        DeviceKind::Sysfs => Box::new(pcdev::SysfsDeviceOps),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_ops_matches_kind() {
        for kind in [
            DeviceKind::Static,
            DeviceKind::Platform,
            DeviceKind::DeviceTree,
            DeviceKind::Sysfs,
        ] {
            assert_eq!(create_ops(kind).kind(), kind);
        }
    }
}
