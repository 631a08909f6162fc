// ABOUTME: Physiologically-plausible heart-rate simulation
// ABOUTME: Motion-driven smoothing toward an activity target, time-driven random walk fallback
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use rand::Rng;

use crate::constants::simulation::{
    BASELINE_BPM, MOTION_GAIN, MOTION_MAX_BPM, MOTION_MIN_BPM, RESTING_MAX_BPM, RESTING_MIN_BPM,
    SMOOTHING, TICK_PERTURBATION_BPM,
};

/// Running heart-rate simulator
///
/// Maintains a single smoothed value across both driving modes so the
/// simulated series stays continuous when motion input comes and goes.
#[derive(Debug)]
pub struct HeartRateSimulator {
    current: f64,
}

impl Default for HeartRateSimulator {
    fn default() -> Self {
        Self::new()
    }
}

impl HeartRateSimulator {
    /// Start from the resting baseline
    #[must_use]
    pub const fn new() -> Self {
        Self {
            current: BASELINE_BPM,
        }
    }

    /// Advance using an acceleration-magnitude sample (in g)
    ///
    /// The distance from 1 g scales an activity target above baseline;
    /// the running value is exponentially smoothed toward it and clamped
    /// to [60, 180] BPM.
    pub fn motion_sample(&mut self, magnitude_g: f64) -> u32 {
        let movement_delta = (magnitude_g - 1.0).abs() * MOTION_GAIN;
        let target = BASELINE_BPM + movement_delta;
        self.current = SMOOTHING * self.current + (1.0 - SMOOTHING) * target;
        self.current = self.current.clamp(MOTION_MIN_BPM, MOTION_MAX_BPM);
        self.current.round() as u32
    }

    /// Advance without motion input
    ///
    /// Applies a small bounded random perturbation and clamps to the
    /// resting range [60, 100] BPM.
    pub fn tick(&mut self) -> u32 {
        let perturbation =
            rand::thread_rng().gen_range(-TICK_PERTURBATION_BPM..=TICK_PERTURBATION_BPM);
        self.current = (self.current + perturbation).clamp(RESTING_MIN_BPM, RESTING_MAX_BPM);
        self.current.round() as u32
    }

    /// The current smoothed value, for inspection
    #[must_use]
    pub const fn current(&self) -> f64 {
        self.current
    }
}
