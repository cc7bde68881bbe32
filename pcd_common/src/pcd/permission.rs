//! Permission guard.
//!
//! Decides whether a device with a declared [`Permission`] may be opened in a
//! requested [`AccessMode`]. Pure function, no side effects.

use crate::pcd::error::PcdError;
use crate::pcd::types::{AccessMode, Permission};

/// Outcome of a permission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Open may proceed.
    Allowed,
    /// Open must be refused.
    Denied,
}

impl Access {
    /// `Ok(())` when allowed, `PcdError::PermissionDenied` otherwise.
    pub fn into_result(self) -> Result<(), PcdError> {
        match self {
            Self::Allowed => Ok(()),
            Self::Denied => Err(PcdError::PermissionDenied),
        }
    }
}

/// Check `mode` against the declared `permission`.
///
/// - `ReadWrite` allows every mode.
/// - `ReadOnly` allows a mode that reads and does not write.
/// - `WriteOnly` allows a mode that writes and does not read.
pub fn check(permission: Permission, mode: AccessMode) -> Access {
    let reads = mode.contains(AccessMode::READ);
    let writes = mode.contains(AccessMode::WRITE);

    let allowed = match permission {
        Permission::ReadWrite => true,
        Permission::ReadOnly => reads && !writes,
        Permission::WriteOnly => writes && !reads,
    };

    if allowed { Access::Allowed } else { Access::Denied }
}
