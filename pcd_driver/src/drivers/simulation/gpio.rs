//! Simulated GPIO bank.
//!
//! The `SimulatedGpioController` keeps every line's request owner,
//! direction and level in memory. Handles are cheap clones sharing one bank,
//! so tests can keep a handle after boxing the controller into a probe.

use pcd_common::pcd::error::PcdError;
use pcd_common::pcd::gpio::{GpioController, GpioLine};
use pcd_common::pcd::types::Direction;
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;
use tracing::{debug, trace};

/// State of one simulated line.
#[derive(Debug, Clone, Default)]
struct LineState {
    /// Label of the current requester
    owner: Option<String>,
    /// Configured direction
    direction: Direction,
    /// Logical level
    level: bool,
}

type Bank = Arc<Mutex<Vec<LineState>>>;

fn lock_bank(bank: &Bank) -> MutexGuard<'_, Vec<LineState>> {
    bank.lock()
}

/// In-memory GPIO controller.
#[derive(Debug, Clone)]
pub struct SimulatedGpioController {
    bank: Bank,
}

impl SimulatedGpioController {
    /// Create a controller with `lines` input lines, all low.
    pub fn new(lines: u32) -> Self {
        debug!("Simulated GPIO controller with {} lines", lines);
        Self {
            bank: Arc::new(Mutex::new(vec![LineState::default(); lines as usize])),
        }
    }

    /// Number of lines.
    pub fn line_count(&self) -> u32 {
        lock_bank(&self.bank).len() as u32
    }

    /// Whether `line` is currently requested.
    pub fn is_requested(&self, line: u32) -> bool {
        lock_bank(&self.bank)
            .get(line as usize)
            .is_some_and(|l| l.owner.is_some())
    }

    /// Logical level of `line`.
    pub fn level(&self, line: u32) -> Option<bool> {
        lock_bank(&self.bank).get(line as usize).map(|l| l.level)
    }

    /// Drive an input line from the outside world.
    ///
    /// Output lines keep their driven level.
    pub fn set_input_level(&self, line: u32, level: bool) {
        if let Some(state) = lock_bank(&self.bank).get_mut(line as usize) {
            if state.direction == Direction::In {
                state.level = level;
            }
        }
    }
}

impl GpioController for SimulatedGpioController {
    fn name(&self) -> &'static str {
        "simulation"
    }

    fn request(&mut self, line: u32, label: &str) -> Result<Box<dyn GpioLine>, PcdError> {
        let mut bank = lock_bank(&self.bank);
        let count = bank.len();
        let state = bank
            .get_mut(line as usize)
            .ok_or_else(|| PcdError::Gpio(format!("line {line} out of range ({count} lines)")))?;

        if let Some(owner) = &state.owner {
            return Err(PcdError::Gpio(format!("line {line} already requested by '{owner}'")));
        }

        state.owner = Some(label.to_string());
        debug!("GPIO line {} requested by '{}'", line, label);

        Ok(Box::new(SimulatedGpioLine {
            line,
            bank: Arc::clone(&self.bank),
        }))
    }
}

/// Handle to one requested simulated line.
#[derive(Debug)]
pub struct SimulatedGpioLine {
    line: u32,
    bank: Bank,
}

impl SimulatedGpioLine {
    fn with_state<R>(&self, f: impl FnOnce(&mut LineState) -> R) -> R {
        let mut bank = lock_bank(&self.bank);
        f(&mut bank[self.line as usize])
    }
}

impl GpioLine for SimulatedGpioLine {
    fn direction(&self) -> Direction {
        self.with_state(|s| s.direction)
    }

    fn set_direction(&mut self, direction: Direction) -> Result<(), PcdError> {
        self.with_state(|s| {
            s.direction = direction;
            if direction == Direction::Out {
                s.level = false;
            }
        });
        trace!("GPIO line {} direction {}", self.line, direction.as_str());
        Ok(())
    }

    fn value(&self) -> Result<bool, PcdError> {
        Ok(self.with_state(|s| s.level))
    }

    fn set_value(&mut self, value: bool) -> Result<(), PcdError> {
        self.with_state(|s| {
            if s.direction == Direction::In {
                return Err(PcdError::Gpio(format!("line {} is an input", self.line)));
            }
            s.level = value;
            Ok(())
        })
    }
}

impl Drop for SimulatedGpioLine {
    fn drop(&mut self) {
        self.with_state(|s| {
            s.owner = None;
            s.direction = Direction::In;
        });
        debug!("GPIO line {} released", self.line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_and_release() {
        let mut controller = SimulatedGpioController::new(4);
        let line = controller.request(2, "gpio2").unwrap();
        assert!(controller.is_requested(2));
        assert!(controller.request(2, "other").is_err());

        drop(line);
        assert!(!controller.is_requested(2));
        assert!(controller.request(2, "other").is_ok());
    }

    #[test]
    fn out_of_range_line() {
        let mut controller = SimulatedGpioController::new(4);
        assert_eq!(controller.line_count(), 4);
        assert!(matches!(controller.request(4, "x"), Err(PcdError::Gpio(_))));
        assert!(controller.request(3, "x").is_ok());
    }

    #[test]
    fn output_drives_level_input_follows_outside() {
        let mut controller = SimulatedGpioController::new(1);
        let mut line = controller.request(0, "led").unwrap();

        assert_eq!(line.direction(), Direction::In);
        assert!(line.set_value(true).is_err());
        controller.set_input_level(0, true);
        assert_eq!(line.value(), Ok(true));

        line.set_direction(Direction::Out).unwrap();
        assert_eq!(line.value(), Ok(false));
        line.set_value(true).unwrap();
        assert_eq!(controller.level(0), Some(true));

        controller.set_input_level(0, false);
        assert_eq!(controller.level(0), Some(true));
    }
}
