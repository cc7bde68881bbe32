//! Simulation module.
//!
//! Software GPIO controller used when no hardware backend is available.

mod gpio;

pub use gpio::{SimulatedGpioController, SimulatedGpioLine};

use pcd_common::pcd::gpio::GpioController;

/// Factory function to create a simulated controller with `lines` lines.
pub fn create_controller(lines: u32) -> Box<dyn GpioController> {
    Box::new(SimulatedGpioController::new(lines))
}
