//! Operation tables of the pseudo device variants.
//!
//! The byte-stream variants share the bounded defaults of
//! `FileOperations`. `SysfsDeviceOps` backs GPIO lines: it exposes only
//! attributes and refuses byte-stream opens.

use pcd_common::pcd::error::PcdError;
use pcd_common::pcd::ops::{Attribute, FileOperations, GPIO_ATTRIBUTES};
use pcd_common::pcd::types::{AccessMode, DeviceKind, Permission};

/// Device from the compiled-in static table.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticDeviceOps;

impl FileOperations for StaticDeviceOps {
    fn kind(&self) -> DeviceKind {
        DeviceKind::Static
    }
}

/// Device bound through a platform bus match.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlatformDeviceOps;

impl FileOperations for PlatformDeviceOps {
    fn kind(&self) -> DeviceKind {
        DeviceKind::Platform
    }
}

/// Device bound through a device-tree node.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeviceTreeDeviceOps;

impl FileOperations for DeviceTreeDeviceOps {
    fn kind(&self) -> DeviceKind {
        DeviceKind::DeviceTree
    }
}

/// Attribute-only GPIO line device.
#[derive(Debug, Clone, Copy, Default)]
pub struct SysfsDeviceOps;

impl FileOperations for SysfsDeviceOps {
    fn kind(&self) -> DeviceKind {
        DeviceKind::Sysfs
    }

    fn open(&self, _permission: Permission, _mode: AccessMode) -> Result<(), PcdError> {
        Err(PcdError::PermissionDenied)
    }

    fn attributes(&self) -> &'static [Attribute] {
        GPIO_ATTRIBUTES
    }
}
