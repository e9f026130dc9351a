//! Steady-hold countdown for the current pose.
//!
//! A pose only counts once it has been held continuously valid for a fixed
//! duration. The timer is a plain state machine advanced by the engine's
//! periodic tick so it stays deterministic under test: elapsed time grows by
//! exactly one tick interval per valid tick, and any invalid tick resets it
//! to zero with no grace period — a momentary pose break restarts the hold
//! from scratch.

use std::time::Duration;

/// Result of advancing the timer by one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HoldTick {
    /// Fraction of the required hold completed, in `[0.0, 1.0]`.
    pub progress: f32,
    /// True exactly once, on the tick that reaches the full duration.
    pub completed: bool,
}

/// Cancellable countdown that accumulates only while the frame stays valid.
///
/// One instance is owned per controller and driven by a single periodic tick
/// source, so two countdowns can never run concurrently for the same pose.
#[derive(Debug, Clone)]
pub struct HoldTimer {
    duration: Duration,
    elapsed: Duration,
}

impl HoldTimer {
    pub fn new(duration: Duration) -> Self {
        debug_assert!(!duration.is_zero(), "hold duration must be positive");
        Self {
            duration,
            elapsed: Duration::ZERO,
        }
    }

    /// Advance by one tick of `dt` with the current frame validity.
    ///
    /// An invalid tick resets elapsed time to zero. The completing tick
    /// reports `completed` and resets internal state, so completion fires
    /// exactly once per uninterrupted hold.
    pub fn tick(&mut self, dt: Duration, is_valid: bool) -> HoldTick {
        if !is_valid {
            self.elapsed = Duration::ZERO;
            return HoldTick {
                progress: 0.0,
                completed: false,
            };
        }

        self.elapsed += dt;
        if self.elapsed >= self.duration {
            self.elapsed = Duration::ZERO;
            return HoldTick {
                progress: 1.0,
                completed: true,
            };
        }

        HoldTick {
            progress: self.progress(),
            completed: false,
        }
    }

    /// Drop any accumulated hold. Used when a frame invalidates between
    /// ticks and when the target pose changes.
    pub fn reset(&mut self) {
        self.elapsed = Duration::ZERO;
    }

    /// Current progress fraction in `[0.0, 1.0]`.
    pub fn progress(&self) -> f32 {
        (self.elapsed.as_secs_f32() / self.duration.as_secs_f32()).min(1.0)
    }

    pub fn is_running(&self) -> bool {
        !self.elapsed.is_zero()
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }
}
