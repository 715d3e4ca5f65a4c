//! Per-tick timing resources and counters.

use bevy_ecs::prelude::*;

/// Resource containing the delta time for the current tick.
#[derive(Resource, Debug, Clone, Copy, Default)]
pub struct DeltaTime(pub f32);

/// Simulation clock: tick counter plus elapsed simulated seconds.
/// Time is kept in `f64` so attack cooldowns stay exact over long games.
#[derive(Resource, Debug, Clone, Copy, Default)]
pub struct SimClock {
    pub tick: u64,
    pub elapsed: f64,
}

impl SimClock {
    /// Advance to the next tick.
    pub fn advance(&mut self, dt: f32) {
        self.tick = self.tick.wrapping_add(1);
        self.elapsed += dt as f64;
    }
}

/// Counters filled in by the tick stages, reset at the start of each tick.
#[derive(Resource, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickStats {
    pub planned: u32,
    pub avoiding: u32,
    pub overlaps_resolved: u32,
    pub newly_resolved: u32,
    pub hits: u32,
    pub target_switches: u32,
    pub groups_discarded: u32,
}
