//! Move-group bookkeeping.
//!
//! A group is created per move order. Members that come to rest leave the
//! group's pending set; once nothing is pending the group is discarded and
//! its members are released (`current_group = None`). Units that were given
//! another order, started chasing a target or died drop out of membership
//! as soon as their `current_group` no longer points at the group.

use crate::components::{GroupId, UnitId, UnitStore};
use crate::systems::clock::TickStats;
use bevy_ecs::prelude::*;
use std::collections::BTreeMap;
use tracing::debug;

/// Units ordered together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MoveGroup {
    members: Vec<UnitId>,
    /// Members still on their way.
    pending: Vec<UnitId>,
}

impl MoveGroup {
    pub fn members(&self) -> &[UnitId] {
        &self.members
    }

    pub fn pending(&self) -> &[UnitId] {
        &self.pending
    }

    pub fn is_resolved(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Live move groups, keyed by id in creation order.
#[derive(Resource, Debug, Default)]
pub struct MoveGroups {
    groups: BTreeMap<GroupId, MoveGroup>,
    next_id: u32,
}

impl MoveGroups {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new group. The caller points each member's
    /// `current_group` at the returned id.
    pub fn create(&mut self, members: Vec<UnitId>) -> GroupId {
        let id = GroupId(self.next_id);
        self.next_id += 1;
        let pending = members.clone();
        self.groups.insert(id, MoveGroup { members, pending });
        id
    }

    pub fn get(&self, id: GroupId) -> Option<&MoveGroup> {
        self.groups.get(&id)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (GroupId, &MoveGroup)> {
        self.groups.iter().map(|(id, group)| (*id, group))
    }

    /// Forget removed units.
    pub fn remove_units(&mut self, removed: &[UnitId]) {
        for group in self.groups.values_mut() {
            group.members.retain(|id| !removed.contains(id));
            group.pending.retain(|id| !removed.contains(id));
        }
    }
}

/// System wrapper around [`update_groups`].
pub fn bookkeeping_system(
    mut groups: ResMut<MoveGroups>,
    mut units: ResMut<UnitStore>,
    mut stats: ResMut<TickStats>,
) {
    stats.groups_discarded += update_groups(&mut groups, &mut units);
}

/// Prune memberships, drop resolved members from the pending sets and
/// discard finished groups. Returns the number of groups discarded.
pub fn update_groups(groups: &mut MoveGroups, units: &mut UnitStore) -> u32 {
    let mut finished = Vec::new();
    for (&gid, group) in groups.groups.iter_mut() {
        group
            .members
            .retain(|&id| units.get(id).is_some_and(|u| u.current_group == Some(gid)));
        let members = &group.members;
        group.pending.retain(|&id| {
            members.contains(&id) && units.get(id).is_some_and(|u| !u.resolved && u.is_alive())
        });
        if group.pending.is_empty() {
            finished.push(gid);
        }
    }

    for gid in &finished {
        let Some(group) = groups.groups.remove(gid) else {
            continue;
        };
        for id in group.members {
            if let Some(unit) = units.get_mut(id) {
                if unit.current_group == Some(*gid) {
                    unit.current_group = None;
                }
            }
        }
        debug!(group = gid.0, "move group resolved");
    }
    finished.len() as u32
}
