//! Public API for the simulation.
//!
//! This module provides the main interface for a game client (renderer, UI,
//! input handling) to interact with the simulation.
//!
//! ## Fixed Timestep
//!
//! The simulation uses a fixed timestep internally (default 60 Hz). When `step(dt)` is called,
//! the simulation accumulates time and runs fixed updates as needed. This ensures deterministic
//! behavior regardless of frame rate. `tick()` runs exactly one fixed update.
//!
//! ## Tick Order
//!
//! Spatial index, combat, steering, motion, bookkeeping. The order is fixed;
//! each stage reads what the previous one wrote.

use crate::components::{GroupId, Owner, SidePreference, Unit, UnitConfig, UnitId, UnitStore};
use crate::config::SimConfig;
use crate::error::{Result, SimError};
use crate::orders::{apply_attack, apply_attack_move, apply_hold, apply_move, apply_stop, plan_formation};
use crate::spatial::{spatial_index_system, SpatialIndex};
use crate::systems::*;
use crate::world::Snapshot;
use bevy_ecs::prelude::*;
use glam::Vec2;
use tracing::{debug, trace};

/// Read-only view of one unit for rendering and UI.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitView {
    pub id: UnitId,
    pub owner: Owner,
    pub position: Vec2,
    pub orientation: f32,
    pub health: i32,
    pub max_health: i32,
    pub resolved: bool,
    pub attacking: bool,
    pub holding: bool,
    pub side_preference: SidePreference,
    pub target: Option<UnitId>,
}

/// The main simulation world container.
///
/// Holds the ECS world and schedule, providing a clean API for:
/// - Initializing the simulation
/// - Stepping the simulation forward
/// - Extracting state snapshots
/// - Issuing orders
pub struct SimWorld {
    world: World,
    schedule: Schedule,
    /// Accumulated time for fixed timestep.
    time_accumulator: f32,
}

impl SimWorld {
    /// Create a new empty simulation world with the default configuration.
    pub fn new() -> Self {
        Self::build(SimConfig::default())
    }

    /// Create a new simulation world with custom configuration.
    pub fn with_config(config: SimConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: SimConfig) -> Self {
        let mut world = World::new();

        world.insert_resource(DeltaTime(config.fixed_timestep));
        world.insert_resource(SimClock::default());
        world.insert_resource(TickStats::default());
        world.insert_resource(SpatialIndex::new(config.grid));
        world.insert_resource(UnitStore::new());
        world.insert_resource(MoveGroups::new());
        world.insert_resource(config);

        let mut schedule = Schedule::default();
        schedule.add_systems(
            (
                spatial_index_system,
                combat_system,
                steering_system,
                motion_system,
                bookkeeping_system,
            )
                .chain(),
        );

        Self {
            world,
            schedule,
            time_accumulator: 0.0,
        }
    }

    /// Step the simulation forward by `dt` seconds of frame time.
    /// Returns the number of fixed updates that ran.
    pub fn step(&mut self, dt: f32) -> u32 {
        let fixed_dt = self.config().fixed_timestep;
        self.time_accumulator += dt;

        let mut ran = 0;
        while self.time_accumulator >= fixed_dt {
            self.tick();
            self.time_accumulator -= fixed_dt;
            ran += 1;
        }
        ran
    }

    /// Run a single fixed timestep update.
    pub fn tick(&mut self) {
        let dt = self.config().fixed_timestep;
        self.world.resource_mut::<DeltaTime>().0 = dt;
        *self.world.resource_mut::<TickStats>() = TickStats::default();
        self.world.resource_mut::<SimClock>().advance(dt);

        self.schedule.run(&mut self.world);

        let tick = self.current_tick();
        let stats = *self.world.resource::<TickStats>();
        trace!(tick, ?stats, "tick complete");
    }

    // ========================================================================
    // UNITS
    // ========================================================================

    /// Create a unit. It starts at rest, with no target.
    pub fn create_unit(&mut self, config: UnitConfig) -> Result<UnitId> {
        config.validate(self.config().grid.cell_size)?;
        let id = self.world.resource_mut::<UnitStore>().spawn(&config);
        debug!(unit = id.0, owner = config.owner.name(), x = config.position.x, y = config.position.y, "unit created");
        Ok(id)
    }

    /// Spawn `count` copies of `template` in a square block around `center`.
    pub fn spawn_block(&mut self, template: &UnitConfig, center: Vec2, count: usize, spacing: f32) -> Result<Vec<UnitId>> {
        let cols = (count as f32).sqrt().ceil().max(1.0) as usize;
        let rows = count.div_ceil(cols);
        let origin = center - Vec2::new(cols as f32 - 1.0, rows as f32 - 1.0) * spacing * 0.5;

        (0..count)
            .map(|i| {
                let offset = Vec2::new((i % cols) as f32, (i / cols) as f32) * spacing;
                self.create_unit(UnitConfig {
                    position: origin + offset,
                    ..template.clone()
                })
            })
            .collect()
    }

    /// Drop every unit whose health reached zero. Surviving targets are
    /// remapped, targets on removed units cleared.
    pub fn remove_dead_units(&mut self) -> Vec<UnitId> {
        let (removed, _) = self.world.resource_mut::<UnitStore>().remove_dead();
        if !removed.is_empty() {
            self.world.resource_mut::<MoveGroups>().remove_units(&removed);
            debug!(count = removed.len(), "dead units removed");
        }
        removed
    }

    // ========================================================================
    // ORDERS
    // ========================================================================

    /// Move a selection to `destination`, keeping its formation unless the
    /// destination lies inside it.
    pub fn issue_move_order(&mut self, ids: &[UnitId], destination: Vec2) -> Result<GroupId> {
        self.issue_group_order(ids, destination, apply_move)
    }

    /// As a move, but engage any enemy met on the way.
    pub fn issue_attack_move_order(&mut self, ids: &[UnitId], destination: Vec2) -> Result<GroupId> {
        self.issue_group_order(ids, destination, apply_attack_move)
    }

    fn issue_group_order(
        &mut self,
        ids: &[UnitId],
        destination: Vec2,
        apply: fn(&mut Unit, Vec2, GroupId),
    ) -> Result<GroupId> {
        let members = dedup(ids);
        let indices = self.world.resource::<UnitStore>().indices_of(&members)?;

        let units = self.world.resource::<UnitStore>().as_slice();
        let discs: Vec<(Vec2, f32)> = indices.iter().map(|&i| (units[i].position, units[i].radius)).collect();
        let (placement, goals) = plan_formation(&discs, destination);

        let group = self.world.resource_mut::<MoveGroups>().create(members);
        let mut store = self.world.resource_mut::<UnitStore>();
        let units = store.as_mut_slice();
        for (&i, goal) in indices.iter().zip(goals) {
            apply(&mut units[i], goal, group);
        }

        debug!(group = group.0, units = indices.len(), ?placement, x = destination.x, y = destination.y, "group order issued");
        Ok(group)
    }

    /// Chase and fight `target`. Attackers on the target's own side are skipped.
    pub fn issue_attack_order(&mut self, ids: &[UnitId], target: UnitId) -> Result<()> {
        let mut store = self.world.resource_mut::<UnitStore>();
        let target_index = store.index_of(target).ok_or(SimError::UnknownUnit(target))?;
        let indices = store.indices_of(ids)?;

        let units = store.as_mut_slice();
        let (target_owner, target_position) = (units[target_index].owner, units[target_index].position);
        for i in indices {
            if i == target_index || !units[i].owner.is_hostile_to(target_owner) {
                trace!(unit = units[i].id.0, target = target.0, "attack order on friendly skipped");
                continue;
            }
            apply_attack(&mut units[i], target_index, target_position);
        }
        debug!(target = target.0, "attack order issued");
        Ok(())
    }

    /// Toggle hold position. Holding units stop where they stand.
    pub fn set_hold_position(&mut self, ids: &[UnitId], hold: bool) -> Result<()> {
        self.for_each_unit(ids, |unit| apply_hold(unit, hold))?;
        debug!(units = ids.len(), hold, "hold position set");
        Ok(())
    }

    /// Halt in place and drop any target.
    pub fn issue_stop_order(&mut self, ids: &[UnitId]) -> Result<()> {
        self.for_each_unit(ids, apply_stop)?;
        debug!(units = ids.len(), "stop order issued");
        Ok(())
    }

    fn for_each_unit(&mut self, ids: &[UnitId], mut f: impl FnMut(&mut Unit)) -> Result<()> {
        let mut store = self.world.resource_mut::<UnitStore>();
        let indices = store.indices_of(ids)?;
        let units = store.as_mut_slice();
        for i in indices {
            f(&mut units[i]);
        }
        Ok(())
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    pub fn unit(&self, id: UnitId) -> Option<UnitView> {
        let store = self.world.resource::<UnitStore>();
        let unit = store.get(id)?;
        Some(UnitView {
            id,
            owner: unit.owner,
            position: unit.position,
            orientation: unit.orientation,
            health: unit.health,
            max_health: unit.max_health,
            resolved: unit.resolved,
            attacking: unit.attacking,
            holding: unit.holding_position,
            side_preference: unit.side_preference,
            target: unit.target.and_then(|t| store.as_slice().get(t)).map(|t| t.id),
        })
    }

    pub fn is_resolved(&self, id: UnitId) -> Option<bool> {
        self.world.resource::<UnitStore>().get(id).map(|u| u.resolved)
    }

    /// All units, in array order.
    pub fn units(&self) -> &[Unit] {
        self.world.resource::<UnitStore>().as_slice()
    }

    pub fn unit_count(&self) -> usize {
        self.world.resource::<UnitStore>().len()
    }

    pub fn group_count(&self) -> usize {
        self.world.resource::<MoveGroups>().len()
    }

    pub fn group_members(&self, group: GroupId) -> Option<&[UnitId]> {
        self.world.resource::<MoveGroups>().get(group).map(MoveGroup::members)
    }

    /// Get the current tick number.
    pub fn current_tick(&self) -> u64 {
        self.world.resource::<SimClock>().tick
    }

    /// Get the elapsed simulation time in seconds.
    pub fn current_time(&self) -> f64 {
        self.world.resource::<SimClock>().elapsed
    }

    /// Counters from the last tick.
    pub fn last_tick_stats(&self) -> TickStats {
        *self.world.resource::<TickStats>()
    }

    pub fn config(&self) -> &SimConfig {
        self.world.resource::<SimConfig>()
    }

    /// Get the spatial index (for debugging/visualization).
    pub fn spatial_index(&self) -> &SpatialIndex {
        self.world.resource::<SpatialIndex>()
    }

    /// Get a snapshot of the current simulation state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::from_world(&self.world)
    }

    /// Get the snapshot as a JSON string.
    pub fn snapshot_json(&self) -> Result<String> {
        Ok(self.snapshot().to_json()?)
    }

    /// Get direct access to the ECS world (for advanced usage).
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Get mutable access to the ECS world (for advanced usage).
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }
}

impl Default for SimWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Drop repeated ids, keeping first occurrences in order.
fn dedup(ids: &[UnitId]) -> Vec<UnitId> {
    let mut out = Vec::with_capacity(ids.len());
    for &id in ids {
        if !out.contains(&id) {
            out.push(id);
        }
    }
    out
}
