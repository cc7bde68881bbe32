//! External GPIO capability.
//!
//! The device core never drives pins itself. GPIO-flavoured descriptors hold
//! a [`GpioLine`] obtained from a [`GpioController`] and forward the
//! `direction` and `value` attributes to it.

use crate::pcd::error::PcdError;
use crate::pcd::types::Direction;

/// One requested GPIO line.
///
/// Dropping the line releases it back to its controller.
pub trait GpioLine: Send {
    /// Current direction of the line.
    fn direction(&self) -> Direction;

    /// Configure the line direction.
    ///
    /// Switching to output drives the line low.
    fn set_direction(&mut self, direction: Direction) -> Result<(), PcdError>;

    /// Read the logical line value.
    fn value(&self) -> Result<bool, PcdError>;

    /// Drive the logical line value.
    ///
    /// # Errors
    /// Implementations may reject the write if the line is an input.
    fn set_value(&mut self, value: bool) -> Result<(), PcdError>;
}

/// Source of GPIO lines, consulted by the device-tree probe.
pub trait GpioController: Send {
    /// Controller name used in logs.
    fn name(&self) -> &'static str;

    /// Request line `line` on behalf of `label`.
    ///
    /// # Errors
    /// `PcdError::Gpio` if the line does not exist or is already requested.
    fn request(&mut self, line: u32, label: &str) -> Result<Box<dyn GpioLine>, PcdError>;
}
