//! Linear gain ramp used for fade-in and fade-out.

/// Direction the ramp is being driven in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeDirection {
    /// Towards full level (fade-in).
    Rise,
    /// Towards silence (fade-out).
    Fall,
}

/// Outcome of one [`FadeRamp::advance`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RampStep {
    /// Nothing to recompute; the ratio is unchanged.
    Idle,
    /// The ratio was recomputed. `settled` is set once the target is reached.
    Moved {
        /// Whether the ramp reached its target on this step.
        settled: bool,
    },
}

fn finite_or_zero(duration: f32) -> f32 {
    if duration.is_finite() {
        duration
    } else {
        0.0
    }
}

/// Time-based linear ramp of a gain ratio.
///
/// A rising ramp goes from 0.0 to 1.0 over `duration` seconds. A falling ramp
/// starts from whatever level the rising ramp had reached and goes to 0.0
/// over the full `duration`. A non-positive duration snaps to the target.
/// Once settled the ramp stays idle until re-armed or [`touch`](Self::touch)ed.
#[derive(Debug, Clone)]
pub struct FadeRamp {
    duration: f32,
    elapsed: f32,
    scale: f32,
    ratio: f32,
    pending: bool,
}

impl Default for FadeRamp {
    fn default() -> Self {
        Self::new()
    }
}

impl FadeRamp {
    /// A settled ramp at full level.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            duration: 0.0,
            elapsed: 0.0,
            scale: 1.0,
            ratio: 1.0,
            pending: false,
        }
    }

    /// Arm a fade-in from silence.
    pub fn arm_rise(&mut self, duration: f32) {
        self.duration = finite_or_zero(duration);
        self.elapsed = 0.0;
        self.scale = 1.0;
        self.ratio = 0.0;
        self.pending = true;
    }

    /// Arm a fade-out from the current level.
    pub fn arm_fall(&mut self, duration: f32) {
        self.duration = finite_or_zero(duration);
        self.elapsed = self.duration.max(0.0);
        self.scale = self.ratio;
        self.pending = true;
    }

    /// Request one recomputation without moving the ramp, e.g. after the
    /// base volume changed.
    pub fn touch(&mut self) {
        self.pending = true;
    }

    /// Advance the ramp by `dt` seconds.
    pub fn advance(&mut self, dt: f32, direction: FadeDirection) -> RampStep {
        if !self.pending {
            return RampStep::Idle;
        }

        let rate = if self.duration <= 0.0 {
            match direction {
                FadeDirection::Rise => 1.0,
                FadeDirection::Fall => 0.0,
            }
        } else {
            let signed = match direction {
                FadeDirection::Rise => dt,
                FadeDirection::Fall => -dt,
            };
            ((self.elapsed + signed) / self.duration).clamp(0.0, 1.0)
        };

        self.elapsed = self.duration.max(0.0) * rate;
        self.ratio = self.scale * rate;

        let settled = match direction {
            FadeDirection::Rise => rate >= 1.0,
            FadeDirection::Fall => rate <= 0.0,
        };
        if settled {
            self.pending = false;
        }

        RampStep::Moved { settled }
    }

    /// Current gain ratio (0.0-1.0).
    #[must_use]
    pub const fn ratio(&self) -> f32 {
        self.ratio
    }

    /// Whether a recomputation is outstanding.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        self.pending
    }
}
