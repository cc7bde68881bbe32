//! Error taxonomy for device operations.
//!
//! `PcdError` is returned by probe, open, read, write, seek and attribute
//! access. [`PcdError::errno`] maps each variant to the negative status a
//! discovery bus or byte-stream caller receives.

use thiserror::Error;

/// Broad category of a [`PcdError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Bad or incomplete device configuration.
    Config,
    /// Buffer or slot allocation failed.
    Allocation,
    /// Access refused by permission or device state.
    Access,
    /// Offset or length outside the device capacity.
    Bounds,
    /// Lock wait cancelled.
    Concurrency,
    /// Unknown device, channel or attribute.
    NotFound,
    /// Failure reported by the external GPIO capability.
    Gpio,
}

/// Error types for pseudo character device operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PcdError {
    /// A required device-tree property is absent.
    #[error("Missing property: {0}")]
    MissingProperty(String),

    /// Raw permission value is not one of RDONLY, WRONLY, RDWR.
    #[error("Invalid permission value: {0:#x}")]
    InvalidPermission(u32),

    /// A device-tree property has the wrong type.
    #[error("Invalid property: {0}")]
    InvalidProperty(String),

    /// Malformed configuration or attribute input.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Device buffer could not be allocated.
    #[error("Cannot allocate {0} bytes for device buffer")]
    OutOfMemory(u32),

    /// All device slots are in use.
    #[error("No free device slot (max {0})")]
    OutOfSlots(usize),

    /// Access mode not allowed by the device permission.
    #[error("Permission denied")]
    PermissionDenied,

    /// Device state prevents the operation.
    #[error("Device or resource busy")]
    Busy,

    /// Seek target outside `[0, capacity]`.
    #[error("Offset out of range")]
    OutOfRange,

    /// Write at end of device.
    #[error("No space left on the device")]
    NoSpace,

    /// Lock wait interrupted by a signal.
    #[error("Interrupted while waiting for device lock")]
    Interrupted,

    /// Unknown device, channel or attribute.
    #[error("Not found: {0}")]
    NotFound(String),

    /// GPIO capability failure.
    #[error("GPIO error: {0}")]
    Gpio(String),
}

impl PcdError {
    /// `NotFound` for a device id.
    pub fn no_device(id: impl std::fmt::Display) -> Self {
        Self::NotFound(format!("device {id}"))
    }

    /// Category of this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::MissingProperty(_)
            | Self::InvalidPermission(_)
            | Self::InvalidProperty(_)
            | Self::InvalidArgument(_) => ErrorClass::Config,
            Self::OutOfMemory(_) | Self::OutOfSlots(_) => ErrorClass::Allocation,
            Self::PermissionDenied | Self::Busy => ErrorClass::Access,
            Self::OutOfRange | Self::NoSpace => ErrorClass::Bounds,
            Self::Interrupted => ErrorClass::Concurrency,
            Self::NotFound(_) => ErrorClass::NotFound,
            Self::Gpio(_) => ErrorClass::Gpio,
        }
    }

    /// Negative errno-style status for this error.
    pub fn errno(&self) -> i32 {
        let code = match self {
            Self::MissingProperty(_)
            | Self::InvalidPermission(_)
            | Self::InvalidProperty(_)
            | Self::InvalidArgument(_)
            | Self::OutOfRange => libc::EINVAL,
            Self::OutOfMemory(_) | Self::NoSpace => libc::ENOMEM,
            Self::OutOfSlots(_) => libc::ENOSPC,
            Self::PermissionDenied => libc::EPERM,
            Self::Busy => libc::EBUSY,
            Self::Interrupted => libc::EINTR,
            Self::NotFound(_) => libc::ENODEV,
            Self::Gpio(_) => libc::EIO,
        };
        -code
    }
}
