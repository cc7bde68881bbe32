//! Device operation trait and attribute catalogue.
//!
//! This module defines:
//! - `FileOperations` trait - Open/read/write/seek interface of a device variant
//! - `Attribute` enum - Named attribute endpoints and their access bits
//!
//! The default method bodies implement the bounded pseudo-device semantics;
//! variants override only what differs.

use crate::pcd::error::PcdError;
use crate::pcd::permission;
use crate::pcd::types::{AccessMode, DeviceKind, Permission, Whence};

/// Named attribute endpoint of a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    /// Device capacity, writable (resizes the buffer).
    MaxSize,
    /// Device serial number.
    SerialNum,
    /// GPIO line label.
    Label,
    /// GPIO line direction (`in` / `out`).
    Direction,
    /// GPIO line value (`0` / `1`).
    Value,
}

/// Attributes of a pseudo character device.
pub const PCDEV_ATTRIBUTES: &[Attribute] = &[Attribute::MaxSize, Attribute::SerialNum];

/// Attributes of a GPIO line device.
pub const GPIO_ATTRIBUTES: &[Attribute] =
    &[Attribute::Label, Attribute::Direction, Attribute::Value];

impl Attribute {
    /// Endpoint name.
    pub fn name(self) -> &'static str {
        match self {
            Self::MaxSize => "max_size",
            Self::SerialNum => "serial_num",
            Self::Label => "label",
            Self::Direction => "direction",
            Self::Value => "value",
        }
    }

    /// Look up an attribute by endpoint name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "max_size" => Some(Self::MaxSize),
            "serial_num" => Some(Self::SerialNum),
            "label" => Some(Self::Label),
            "direction" => Some(Self::Direction),
            "value" => Some(Self::Value),
            _ => None,
        }
    }

    /// Whether the endpoint accepts writes.
    pub fn is_writable(self) -> bool {
        matches!(self, Self::MaxSize | Self::Direction | Self::Value)
    }

    /// sysfs-style mode bits (`0644` writable, `0444` read-only).
    pub fn mode(self) -> u32 {
        if self.is_writable() { 0o644 } else { 0o444 }
    }
}

/// Operations of a device variant.
///
/// The device core resolves a descriptor, takes its lock, and calls into the
/// variant with the descriptor buffer. Capacity is always `buffer.len()`.
pub trait FileOperations: Send + Sync {
    /// Variant implemented by this table.
    fn kind(&self) -> DeviceKind;

    /// Validate an open request.
    fn open(&self, permission: Permission, mode: AccessMode) -> Result<(), PcdError> {
        permission::check(permission, mode).into_result()
    }

    /// Copy bytes from `buffer[offset..]` into `out`.
    ///
    /// Returns the number of bytes copied, `0` at end of device.
    fn read(&self, buffer: &[u8], offset: u32, out: &mut [u8]) -> Result<usize, PcdError> {
        let start = (offset as usize).min(buffer.len());
        let effective = out.len().min(buffer.len() - start);
        out[..effective].copy_from_slice(&buffer[start..start + effective]);
        Ok(effective)
    }

    /// Copy `data` into `buffer[offset..]`.
    ///
    /// # Errors
    /// `PcdError::NoSpace` if no byte fits; nothing is written then.
    fn write(&self, buffer: &mut [u8], offset: u32, data: &[u8]) -> Result<usize, PcdError> {
        let start = (offset as usize).min(buffer.len());
        let effective = data.len().min(buffer.len() - start);
        if effective == 0 {
            return Err(PcdError::NoSpace);
        }
        buffer[start..start + effective].copy_from_slice(&data[..effective]);
        Ok(effective)
    }

    /// Compute the offset a seek lands on.
    ///
    /// # Errors
    /// `PcdError::OutOfRange` if the target is outside `[0, capacity]`.
    fn llseek(
        &self,
        capacity: u32,
        offset: u32,
        whence: Whence,
        delta: i64,
    ) -> Result<u32, PcdError> {
        let base: i64 = match whence {
            Whence::Set => 0,
            Whence::Cur => i64::from(offset),
            Whence::End => i64::from(capacity),
        };
        let target = base.checked_add(delta).ok_or(PcdError::OutOfRange)?;
        if target < 0 || target > i64::from(capacity) {
            return Err(PcdError::OutOfRange);
        }
        Ok(target as u32)
    }

    /// Attribute endpoints exposed by this variant.
    fn attributes(&self) -> &'static [Attribute] {
        PCDEV_ATTRIBUTES
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Plain;

    impl FileOperations for Plain {
        fn kind(&self) -> DeviceKind {
            DeviceKind::Static
        }
    }

    #[test]
    fn read_clamps_to_capacity() {
        let buffer: Vec<u8> = (0..16).collect();
        let mut out = [0u8; 10];
        assert_eq!(Plain.read(&buffer, 10, &mut out), Ok(6));
        assert_eq!(&out[..6], &[10, 11, 12, 13, 14, 15]);
        assert_eq!(Plain.read(&buffer, 16, &mut out), Ok(0));
    }

    #[test]
    fn write_at_end_is_no_space() {
        let mut buffer = vec![0u8; 4];
        assert_eq!(Plain.write(&mut buffer, 2, &[1, 2, 3]), Ok(2));
        assert_eq!(buffer, vec![0, 0, 1, 2]);
        assert_eq!(Plain.write(&mut buffer, 4, &[9]), Err(PcdError::NoSpace));
        assert_eq!(buffer, vec![0, 0, 1, 2]);
    }

    #[test]
    fn seek_cur_assigns_target_once() {
        assert_eq!(Plain.llseek(100, 10, Whence::Cur, 5), Ok(15));
        assert_eq!(Plain.llseek(100, 10, Whence::Cur, -10), Ok(0));
        assert_eq!(Plain.llseek(100, 10, Whence::Cur, -11), Err(PcdError::OutOfRange));
    }

    #[test]
    fn seek_bounds() {
        assert_eq!(Plain.llseek(100, 0, Whence::Set, 100), Ok(100));
        assert_eq!(Plain.llseek(100, 0, Whence::Set, 101), Err(PcdError::OutOfRange));
        assert_eq!(Plain.llseek(100, 0, Whence::End, -1), Ok(99));
        assert_eq!(Plain.llseek(100, 0, Whence::End, 1), Err(PcdError::OutOfRange));
        assert_eq!(
            Plain.llseek(100, 50, Whence::Cur, i64::MAX),
            Err(PcdError::OutOfRange)
        );
    }

    #[test]
    fn attribute_modes() {
        assert_eq!(Attribute::MaxSize.mode(), 0o644);
        assert_eq!(Attribute::SerialNum.mode(), 0o444);
        assert_eq!(Attribute::from_name("value"), Some(Attribute::Value));
        assert_eq!(Attribute::from_name("bogus"), None);
        assert_eq!(Plain.attributes(), PCDEV_ATTRIBUTES);
    }
}
