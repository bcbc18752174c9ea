//! The global world clock.
//!
//! The clock is the single source of the world manager's tick numbers:
//! a monotonic counter advanced once per global tick. Each world layer
//! actor additionally runs its own local interval timer with its own
//! counter -- the two streams are independent and carry distinct
//! [`TickSource`] tags (see the layer actor module for the local side).
//!
//! All counter math uses checked arithmetic; the counter never silently
//! wraps.

use thicket_types::{TickData, TickSource};

/// Errors that can occur during clock operations.
#[derive(Debug, thiserror::Error)]
pub enum ClockError {
    /// Tick counter would overflow.
    #[error("tick counter overflow: cannot advance beyond u64::MAX")]
    TickOverflow,
}

/// Monotonic global tick counter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorldClock {
    /// Current tick number (0 before the first advance).
    tick: u64,
}

impl WorldClock {
    /// Create a clock at tick 0.
    pub const fn new() -> Self {
        Self { tick: 0 }
    }

    /// Restore a clock at an explicit tick (state restoration, tests).
    pub const fn at(tick: u64) -> Self {
        Self { tick }
    }

    /// Advance the clock by one tick. Returns the new tick number.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::TickOverflow`] if the counter would exceed
    /// `u64::MAX`.
    pub fn advance(&mut self) -> Result<u64, ClockError> {
        self.tick = self.tick.checked_add(1).ok_or(ClockError::TickOverflow)?;
        Ok(self.tick)
    }

    /// Return the current tick number.
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Build the tick event for the current tick, stamped with the
    /// current wall-clock time and [`TickSource::WorldManager`].
    pub fn tick_data(&self) -> TickData {
        TickData::now(self.tick, TickSource::WorldManager)
    }
}
