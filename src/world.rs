//! Snapshot types.
//!
//! The `Snapshot` struct provides a serializable, fully settled view of the
//! simulation after a tick, for rendering and UI.

use crate::components::{Owner, Unit, UnitStore};
use crate::systems::bookkeeping::MoveGroups;
use crate::systems::clock::SimClock;
use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

/// Snapshot of a single unit's state for serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitSnapshot {
    pub id: u32,
    pub owner: Owner,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub orientation: f32,
    pub health: i32,
    pub max_health: i32,
    pub resolved: bool,
    pub attacking: bool,
    pub holding: bool,
}

impl From<&Unit> for UnitSnapshot {
    fn from(unit: &Unit) -> Self {
        Self {
            id: unit.id.0,
            owner: unit.owner,
            x: unit.position.x,
            y: unit.position.y,
            vx: unit.velocity.x,
            vy: unit.velocity.y,
            orientation: unit.orientation,
            health: unit.health,
            max_health: unit.max_health,
            resolved: unit.resolved,
            attacking: unit.attacking,
            holding: unit.holding_position,
        }
    }
}

/// Complete simulation state snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Current simulation tick.
    pub tick: u64,
    /// Elapsed simulation time in seconds.
    pub time: f64,
    /// All unit states, in array order.
    pub units: Vec<UnitSnapshot>,
    /// Number of live move groups.
    pub group_count: usize,
}

impl Snapshot {
    /// Create a snapshot from the ECS world.
    pub fn from_world(world: &World) -> Self {
        let clock = world.get_resource::<SimClock>().copied().unwrap_or_default();
        let units = world
            .get_resource::<UnitStore>()
            .map(|store| store.iter().map(UnitSnapshot::from).collect())
            .unwrap_or_default();
        let group_count = world.get_resource::<MoveGroups>().map_or(0, MoveGroups::len);

        Self {
            tick: clock.tick,
            time: clock.elapsed,
            units,
            group_count,
        }
    }

    /// Serialize snapshot to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize snapshot to pretty JSON string.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::UnitConfig;
    use glam::Vec2;

    #[test]
    fn test_snapshot_from_world() {
        let mut world = World::new();
        let mut store = UnitStore::new();
        store.spawn(&UnitConfig {
            owner: Owner::Red,
            position: Vec2::new(3.0, -2.0),
            ..Default::default()
        });
        world.insert_resource(store);
        world.insert_resource(SimClock { tick: 5, elapsed: 0.25 });

        let snapshot = Snapshot::from_world(&world);
        assert_eq!(snapshot.tick, 5);
        assert_eq!(snapshot.units.len(), 1);
        assert_eq!(snapshot.units[0].owner, Owner::Red);
        assert_eq!(snapshot.units[0].x, 3.0);
        assert!(snapshot.units[0].resolved);
        // No group resource yet.
        assert_eq!(snapshot.group_count, 0);
    }

    #[test]
    fn test_snapshot_json_fields() {
        let mut world = World::new();
        let mut store = UnitStore::new();
        store.spawn(&UnitConfig {
            position: Vec2::new(1.5, 4.0),
            max_health: 80,
            ..Default::default()
        });
        world.insert_resource(store);
        world.insert_resource(SimClock { tick: 12, elapsed: 0.2 });
        world.insert_resource(MoveGroups::new());

        let json = Snapshot::from_world(&world).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["tick"], 12);
        assert_eq!(value["group_count"], 0);
        let unit = &value["units"][0];
        assert_eq!(unit["owner"], "Blue");
        assert_eq!(unit["x"], 1.5);
        assert_eq!(unit["max_health"], 80);
        assert_eq!(unit["holding"], false);

        // Pretty output carries the same data.
        let pretty: Snapshot = serde_json::from_str(&Snapshot::from_world(&world).to_json_pretty().unwrap()).unwrap();
        assert_eq!(pretty.units[0].y, 4.0);
    }
}
