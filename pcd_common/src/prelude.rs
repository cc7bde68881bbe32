//! Prelude module for common re-exports.
//!
//! `use pcd_common::prelude::*;` brings in the device model types, the
//! error taxonomy and the driver traits.
//!
//! # Usage
//!
//! ```rust
//! use pcd_common::prelude::*;
//! ```

// ─── Logging ────────────────────────────────────────────────────────
pub use crate::config::LogLevel;

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, SharedConfig};
pub use crate::pcd::config::{
    DeviceConfiguration, DeviceNode, DriverData, PcdConfig, PlatformDevice, PropertyValue,
    StaticTableKind,
};

// ─── Device Model ───────────────────────────────────────────────────
pub use crate::pcd::consts::{DEVICE_ID_LIMIT, MAX_DEVICES};
pub use crate::pcd::error::{ErrorClass, PcdError};
pub use crate::pcd::types::{
    AccessMode, ChannelId, DeviceId, DeviceKind, Direction, Permission, Whence,
};

// ─── Driver Traits ──────────────────────────────────────────────────
pub use crate::pcd::gpio::{GpioController, GpioLine};
pub use crate::pcd::ops::{Attribute, FileOperations};
pub use crate::pcd::permission::{check as check_permission, Access};
