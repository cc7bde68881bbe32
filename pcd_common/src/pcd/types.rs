//! Core device types.
//!
//! Identifiers, permission and access-mode encodings, seek origins and the
//! GPIO direction used across the PCD workspace.

use crate::pcd::consts::{RDONLY, RDWR, SEEK_CUR, SEEK_END, SEEK_SET, WRONLY};
use crate::pcd::error::PcdError;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Registry-assigned device identifier (the device minor number).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(pub u32);

impl DeviceId {
    /// Slot index in the registry arena.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of one open channel, unique per descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(pub u64);

bitflags! {
    /// Access mode requested at open time.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AccessMode: u8 {
        /// Channel may read.
        const READ = 0b01;
        /// Channel may write.
        const WRITE = 0b10;
    }
}

impl AccessMode {
    /// Read-only open (`O_RDONLY`).
    pub const RDONLY: Self = Self::READ;
    /// Write-only open (`O_WRONLY`).
    pub const WRONLY: Self = Self::WRITE;
    /// Read/write open (`O_RDWR`).
    pub const RDWR: Self = Self::READ.union(Self::WRITE);
}

/// Declared access direction of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "PermissionRepr", into = "String")]
pub enum Permission {
    /// Device may only be opened for reading.
    ReadOnly,
    /// Device may only be opened for writing.
    WriteOnly,
    /// Device may be opened in any mode.
    ReadWrite,
}

impl Permission {
    /// Decode a raw permission value (`RDONLY`, `WRONLY`, `RDWR`).
    pub fn from_raw(raw: u32) -> Result<Self, PcdError> {
        match raw {
            RDONLY => Ok(Self::ReadOnly),
            WRONLY => Ok(Self::WriteOnly),
            RDWR => Ok(Self::ReadWrite),
            other => Err(PcdError::InvalidPermission(other)),
        }
    }

    /// Raw encoding of this permission.
    pub fn raw(self) -> u32 {
        match self {
            Self::ReadOnly => RDONLY,
            Self::WriteOnly => WRONLY,
            Self::ReadWrite => RDWR,
        }
    }

    /// Canonical textual name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ReadOnly => "read_only",
            Self::WriteOnly => "write_only",
            Self::ReadWrite => "read_write",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = PcdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read_only" | "ro" | "RDONLY" => Ok(Self::ReadOnly),
            "write_only" | "wo" | "WRONLY" => Ok(Self::WriteOnly),
            "read_write" | "rw" | "RDWR" => Ok(Self::ReadWrite),
            other => Err(PcdError::InvalidArgument(format!(
                "unknown permission '{other}'"
            ))),
        }
    }
}

impl From<Permission> for String {
    fn from(perm: Permission) -> Self {
        perm.as_str().to_string()
    }
}

/// Accepted TOML forms of a permission: raw integer or name.
#[derive(Deserialize)]
#[serde(untagged)]
enum PermissionRepr {
    Raw(u32),
    Name(String),
}

impl TryFrom<PermissionRepr> for Permission {
    type Error = PcdError;

    fn try_from(repr: PermissionRepr) -> Result<Self, Self::Error> {
        match repr {
            PermissionRepr::Raw(raw) => Self::from_raw(raw),
            PermissionRepr::Name(name) => name.parse(),
        }
    }
}

/// Origin of a seek.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    /// From the start of the device.
    Set,
    /// From the current channel offset.
    Cur,
    /// From the device capacity.
    End,
}

impl Whence {
    /// Decode a raw `SEEK_*` value.
    pub fn from_raw(raw: i32) -> Result<Self, PcdError> {
        match raw {
            SEEK_SET => Ok(Self::Set),
            SEEK_CUR => Ok(Self::Cur),
            SEEK_END => Ok(Self::End),
            _ => Err(PcdError::OutOfRange),
        }
    }
}

/// Operation variant a descriptor was registered with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    /// Compiled-in static table entry.
    Static,
    /// Platform bus match.
    Platform,
    /// Device-tree node match.
    DeviceTree,
    /// Attribute-only (GPIO sysfs) device.
    Sysfs,
}

impl DeviceKind {
    /// Short name used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Static => "static",
            Self::Platform => "platform",
            Self::DeviceTree => "device_tree",
            Self::Sysfs => "sysfs",
        }
    }
}

/// GPIO line direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Line is an input.
    #[default]
    In,
    /// Line is an output.
    Out,
}

impl Direction {
    /// Attribute text for this direction.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::In => "in",
            Self::Out => "out",
        }
    }
}

impl FromStr for Direction {
    type Err = PcdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in" => Ok(Self::In),
            "out" => Ok(Self::Out),
            other => Err(PcdError::InvalidArgument(format!(
                "direction must be 'in' or 'out', got '{other}'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_raw_roundtrip_values() {
        assert_eq!(Permission::from_raw(0x01), Ok(Permission::ReadOnly));
        assert_eq!(Permission::from_raw(0x10), Ok(Permission::WriteOnly));
        assert_eq!(Permission::from_raw(0x11), Ok(Permission::ReadWrite));
        assert_eq!(
            Permission::from_raw(0x02),
            Err(PcdError::InvalidPermission(0x02))
        );
        for perm in [Permission::ReadOnly, Permission::WriteOnly, Permission::ReadWrite] {
            assert_eq!(Permission::from_raw(perm.raw()), Ok(perm));
        }
    }

    #[test]
    fn test_permission_toml_forms() {
        #[derive(Debug, Deserialize)]
        struct Wrapper {
            perm: Permission,
        }

        let w: Wrapper = toml::from_str("perm = \"RDONLY\"").unwrap();
        assert_eq!(w.perm, Permission::ReadOnly);
        let w: Wrapper = toml::from_str("perm = \"write_only\"").unwrap();
        assert_eq!(w.perm, Permission::WriteOnly);
        let w: Wrapper = toml::from_str("perm = 0x11").unwrap();
        assert_eq!(w.perm, Permission::ReadWrite);
        assert!(toml::from_str::<Wrapper>("perm = 7").is_err());
    }

    #[test]
    fn test_access_mode_aliases() {
        assert!(AccessMode::RDWR.contains(AccessMode::READ));
        assert!(AccessMode::RDWR.contains(AccessMode::WRITE));
        assert!(!AccessMode::RDONLY.contains(AccessMode::WRITE));
        assert!(AccessMode::empty().is_empty());
    }

    #[test]
    fn test_whence_from_raw() {
        assert_eq!(Whence::from_raw(0), Ok(Whence::Set));
        assert_eq!(Whence::from_raw(1), Ok(Whence::Cur));
        assert_eq!(Whence::from_raw(2), Ok(Whence::End));
        assert_eq!(Whence::from_raw(3), Err(PcdError::OutOfRange));
    }

    #[test]
    fn test_direction_parse() {
        assert_eq!("out".parse::<Direction>(), Ok(Direction::Out));
        assert_eq!(Direction::In.as_str(), "in");
        assert!("high".parse::<Direction>().is_err());
    }
}
