//! Fixed-timestep driver for the mixer tick.
//!
//! Frame deltas are accumulated and turned into a whole number of fixed
//! mixer updates, so voice fades and delays advance by the same step on
//! every run.

/// Maximum fixed updates per frame, to avoid a spiral of death.
const MAX_UPDATES_PER_FRAME: u32 = 10;

/// Largest frame delta accepted (seconds).
const MAX_FRAME_DT: f32 = 0.25;

/// Fixed timestep accumulator.
#[derive(Debug, Clone)]
pub struct FixedStep {
    /// Fixed update delta in seconds
    fixed_dt: f32,
    /// Unconsumed frame time
    accumulator: f32,
    /// Updates performed so far
    total_updates: u64,
}

impl Default for FixedStep {
    fn default() -> Self {
        Self::new(60)
    }
}

impl FixedStep {
    /// Create an accumulator ticking at `rate` Hz.
    #[must_use]
    pub fn new(rate: u32) -> Self {
        Self {
            fixed_dt: 1.0 / rate.max(1) as f32,
            accumulator: 0.0,
            total_updates: 0,
        }
    }

    /// The fixed update delta in seconds.
    #[must_use]
    pub fn fixed_dt(&self) -> f32 {
        self.fixed_dt
    }

    /// Updates performed since creation or the last reset.
    #[must_use]
    pub fn total_updates(&self) -> u64 {
        self.total_updates
    }

    /// Accumulate a frame delta.
    /// Returns the number of fixed updates that should be performed.
    pub fn accumulate(&mut self, dt: f32) -> u32 {
        let dt = if dt.is_finite() {
            dt.clamp(0.0, MAX_FRAME_DT)
        } else {
            0.0
        };
        self.accumulator += dt;

        let mut count = 0;
        while self.accumulator >= self.fixed_dt && count < MAX_UPDATES_PER_FRAME {
            self.accumulator -= self.fixed_dt;
            count += 1;
        }

        // Still behind after the cap: drop the backlog
        if self.accumulator > self.fixed_dt * 2.0 {
            self.accumulator = 0.0;
        }

        self.total_updates += u64::from(count);
        count
    }

    /// Fraction of a fixed step left in the accumulator (0.0-1.0).
    #[must_use]
    pub fn remainder(&self) -> f32 {
        (self.accumulator / self.fixed_dt).clamp(0.0, 1.0)
    }

    /// Reset accumulated time.
    pub fn reset(&mut self) {
        self.accumulator = 0.0;
        self.total_updates = 0;
    }
}
