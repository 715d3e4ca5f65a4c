//! Unit data for the skirmish simulation.
//!
//! Units live in one flat, densely packed array (`UnitStore`). Every tick
//! stage works on `&mut [Unit]` by index; indices are stable for the
//! duration of a tick and only change when dead units are purged.

use crate::error::{Result, SimError};
use bevy_ecs::prelude::*;
use glam::Vec2;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// IDENTITY
// ============================================================================

/// Stable handle for a unit, independent of its array index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitId(pub u32);

/// Identifier of a cooperative move group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupId(pub u32);

/// Owning side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Owner {
    #[default]
    Blue,
    Red,
}

impl Owner {
    pub fn is_hostile_to(self, other: Owner) -> bool {
        self != other
    }

    pub fn name(self) -> &'static str {
        match self {
            Owner::Blue => "Blue",
            Owner::Red => "Red",
        }
    }
}

/// Sticky avoidance side. Reset to `Neutral` whenever a new goal is set or
/// nothing blocks the unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SidePreference {
    Left,
    #[default]
    Neutral,
    Right,
}

impl SidePreference {
    /// -1 for left, +1 for right, 0 when uncommitted.
    #[inline]
    pub fn sign(self) -> f32 {
        match self {
            SidePreference::Left => -1.0,
            SidePreference::Neutral => 0.0,
            SidePreference::Right => 1.0,
        }
    }

    #[inline]
    pub fn from_sign(sign: f32) -> Self {
        if sign < 0.0 {
            SidePreference::Left
        } else if sign > 0.0 {
            SidePreference::Right
        } else {
            SidePreference::Neutral
        }
    }

    #[inline]
    pub fn is_committed(self) -> bool {
        self != SidePreference::Neutral
    }

    #[inline]
    pub fn flipped(self) -> Self {
        match self {
            SidePreference::Left => SidePreference::Right,
            SidePreference::Neutral => SidePreference::Neutral,
            SidePreference::Right => SidePreference::Left,
        }
    }
}

// ============================================================================
// UNIT
// ============================================================================

/// Creation parameters for a unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UnitConfig {
    pub owner: Owner,
    pub position: Vec2,
    pub radius: f32,
    /// Units per second.
    pub max_speed: f32,
    /// Units per second squared.
    pub acceleration: f32,
    /// Look-ahead in seconds used to size the avoidance neighbourhood.
    pub time_horizon: f32,
    pub mass: f32,
    pub holding_position: bool,
    pub attack_radius: f32,
    /// Cooldown between hits in seconds.
    pub attack_speed: f32,
    pub damage: i32,
    pub max_health: i32,
}

impl Default for UnitConfig {
    fn default() -> Self {
        Self {
            owner: Owner::Blue,
            position: Vec2::ZERO,
            radius: 0.5,
            max_speed: 3.0,
            acceleration: 12.0,
            time_horizon: 1.0,
            mass: 1.0,
            holding_position: false,
            attack_radius: 1.5,
            attack_speed: 1.0,
            damage: 10,
            max_health: 100,
        }
    }
}

impl UnitConfig {
    /// Reject configurations the tick pipeline cannot handle.
    /// `cell_size` is the broad-phase cell size: a one-ring query must
    /// always cover two touching units.
    pub fn validate(&self, cell_size: f32) -> Result<()> {
        let fail = |reason: String| Err(SimError::InvalidUnit { reason });
        if !self.position.is_finite() {
            return fail(format!("position must be finite, got {}", self.position));
        }
        if !(self.radius > 0.0) {
            return fail(format!("radius must be positive, got {}", self.radius));
        }
        if self.radius * 2.0 > cell_size {
            return fail(format!(
                "diameter {} exceeds broad-phase cell size {}",
                self.radius * 2.0,
                cell_size
            ));
        }
        if !(self.mass > 0.0) {
            return fail(format!("mass must be positive, got {}", self.mass));
        }
        if self.max_speed < 0.0 || self.acceleration < 0.0 || self.time_horizon < 0.0 {
            return fail("speed, acceleration and time horizon must not be negative".into());
        }
        if self.attack_radius < 0.0 || self.attack_speed < 0.0 {
            return fail("attack radius and attack speed must not be negative".into());
        }
        if self.max_health <= 0 {
            return fail(format!("max_health must be positive, got {}", self.max_health));
        }
        Ok(())
    }
}

/// A mobile agent. Plain data; all behaviour lives in the systems.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Unit {
    pub id: UnitId,
    pub owner: Owner,
    pub radius: f32,

    // Motion config
    pub max_speed: f32,
    pub acceleration: f32,
    pub time_horizon: f32,
    pub mass: f32,

    // Motion state
    pub position: Vec2,
    /// Position at the start of the last substep.
    pub old_position: Vec2,
    pub velocity: Vec2,
    /// Current goal.
    pub target_position: Vec2,
    /// Where the current pursuit started; used for overshoot detection.
    pub move_start_position: Vec2,
    /// Where the unit last came to rest.
    pub stop_position: Vec2,
    /// Facing angle in radians.
    pub orientation: f32,
    /// Steering output for the current tick.
    pub preferred_dir: Vec2,

    // Resolution flags
    pub resolved: bool,
    pub holding_position: bool,
    pub side_preference: SidePreference,
    pub current_group: Option<GroupId>,

    // Combat state
    /// Array index of the current target.
    pub target: Option<usize>,
    pub attacking: bool,
    pub attack_radius: f32,
    pub attack_speed: f32,
    pub damage: i32,
    pub max_health: i32,
    pub health: i32,
    pub last_attack_time: f64,
    /// Pending attack-move destination.
    pub attack_move: Option<Vec2>,
    /// True once there is no engagement sweep left to pursue.
    pub attack_move_resolved: bool,
}

impl Unit {
    pub fn new(id: UnitId, config: &UnitConfig) -> Self {
        Self {
            id,
            owner: config.owner,
            radius: config.radius,
            max_speed: config.max_speed,
            acceleration: config.acceleration,
            time_horizon: config.time_horizon,
            mass: config.mass,
            position: config.position,
            old_position: config.position,
            velocity: Vec2::ZERO,
            target_position: config.position,
            move_start_position: config.position,
            stop_position: config.position,
            orientation: 0.0,
            preferred_dir: Vec2::ZERO,
            resolved: true,
            holding_position: config.holding_position,
            side_preference: SidePreference::Neutral,
            current_group: None,
            target: None,
            attacking: false,
            attack_radius: config.attack_radius,
            attack_speed: config.attack_speed,
            damage: config.damage,
            max_health: config.max_health,
            health: config.max_health,
            last_attack_time: f64::NEG_INFINITY,
            attack_move: None,
            attack_move_resolved: false,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.health > 0
    }

    /// Start pursuing a new goal from the current position.
    pub fn set_goal(&mut self, goal: Vec2) {
        self.target_position = goal;
        self.move_start_position = self.position;
        self.resolved = false;
        self.side_preference = SidePreference::Neutral;
    }

    /// Come to rest where the unit stands.
    pub fn come_to_rest(&mut self) {
        self.resolved = true;
        self.velocity = Vec2::ZERO;
        self.stop_position = self.position;
        self.side_preference = SidePreference::Neutral;
    }

    /// Radius of the neighbourhood this unit could reach within its planning horizon.
    pub fn reach(&self) -> f32 {
        self.radius + self.max_speed * self.time_horizon
    }
}

// ============================================================================
// STORE
// ============================================================================

/// Flat unit array plus the id → index map.
#[derive(Resource, Debug, Default)]
pub struct UnitStore {
    units: Vec<Unit>,
    index_of: HashMap<UnitId, usize>,
    next_id: u32,
}

impl UnitStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a unit built from `config` and return its handle.
    pub fn spawn(&mut self, config: &UnitConfig) -> UnitId {
        let id = UnitId(self.next_id);
        self.next_id += 1;
        self.index_of.insert(id, self.units.len());
        self.units.push(Unit::new(id, config));
        id
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn index_of(&self, id: UnitId) -> Option<usize> {
        self.index_of.get(&id).copied()
    }

    pub fn get(&self, id: UnitId) -> Option<&Unit> {
        self.index_of(id).map(|i| &self.units[i])
    }

    pub fn get_mut(&mut self, id: UnitId) -> Option<&mut Unit> {
        match self.index_of(id) {
            Some(i) => Some(&mut self.units[i]),
            None => None,
        }
    }

    /// Resolve a list of handles, failing on the first unknown one.
    pub fn indices_of(&self, ids: &[UnitId]) -> Result<Vec<usize>> {
        ids.iter()
            .map(|&id| self.index_of(id).ok_or(SimError::UnknownUnit(id)))
            .collect()
    }

    pub fn as_slice(&self) -> &[Unit] {
        &self.units
    }

    pub fn as_mut_slice(&mut self) -> &mut [Unit] {
        &mut self.units
    }

    pub fn iter(&self) -> impl Iterator<Item = &Unit> {
        self.units.iter()
    }

    /// Drop dead units and compact the array.
    ///
    /// Surviving targets are remapped to the new indices; targets that
    /// pointed at a removed unit are cleared. Returns the removed handles
    /// and the old → new index mapping (`None` for removed slots).
    pub fn remove_dead(&mut self) -> (Vec<UnitId>, Vec<Option<usize>>) {
        let mut remap = Vec::with_capacity(self.units.len());
        let mut removed = Vec::new();
        let mut next = 0;
        for unit in &self.units {
            if unit.is_alive() {
                remap.push(Some(next));
                next += 1;
            } else {
                remap.push(None);
                removed.push(unit.id);
            }
        }
        if removed.is_empty() {
            return (removed, remap);
        }

        self.units.retain(|u| u.is_alive());
        for unit in &mut self.units {
            if let Some(t) = unit.target {
                unit.target = remap.get(t).copied().flatten();
                if unit.target.is_none() {
                    unit.attacking = false;
                }
            }
        }
        self.index_of = self
            .units
            .iter()
            .enumerate()
            .map(|(i, u)| (u.id, i))
            .collect();
        (removed, remap)
    }
}
