//! # scheduler
//!
//! Decides when the fluid advances. The LB time step `tau` is a multiple of the MD time step, so
//! the fluid runs one tick every few MD steps.

/// Relative slack on the tick condition, absorbs the round-off of summed MD steps
const TICK_TOLERANCE: f64 = 1.0e-10;

#[derive(Clone, Copy, Debug, Default)]
pub struct UpdateScheduler {
    /// Time accumulated since the last tick
    pub fluidstep: f64,
}

impl UpdateScheduler {
    pub fn new() -> UpdateScheduler {
        UpdateScheduler { fluidstep: 0.0 }
    }

    /// Accumulate one MD step. Returns `true` if an LB tick is due, at most once per call.
    pub fn advance(&mut self, dt_md: f64, tau: f64) -> bool {
        self.fluidstep += dt_md;
        if self.fluidstep >= tau * (1.0 - TICK_TOLERANCE) {
            self.fluidstep = 0.0;
            true
        } else {
            false
        }
    }

    pub fn reset(&mut self) {
        self.fluidstep = 0.0;
    }
}
