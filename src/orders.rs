//! Orders - formation placement and per-unit order state.
//!
//! A move order keeps the selection's shape: each unit keeps its offset from
//! the centre of the selection's bounding box, translated to the destination
//! ("outer" placement). When the destination lies inside that box the units
//! all converge on the clicked point instead ("inner" placement). The box is
//! oriented along the travel axis, from the selection centre to the
//! destination, and padded by each unit's radius.

use crate::components::{GroupId, Unit};
use crate::math::safe_normalize;
use glam::Vec2;

/// How goals were assigned for a move order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Destination inside the selection: everyone goes to the same point.
    Inner,
    /// Destination outside: relative offsets are preserved.
    Outer,
}

/// Box around a selection, aligned with the travel direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientedBounds {
    pub center: Vec2,
    /// Unit vector along the travel direction.
    pub axis: Vec2,
    /// Half extents along `axis` and its left-hand normal.
    pub half_extents: Vec2,
}

impl OrientedBounds {
    /// Bounds of discs `(position, radius)` oriented toward `destination`.
    /// Returns `None` for an empty selection.
    pub fn around(discs: &[(Vec2, f32)], destination: Vec2) -> Option<Self> {
        if discs.is_empty() {
            return None;
        }
        let centroid = discs.iter().map(|(p, _)| *p).sum::<Vec2>() / discs.len() as f32;
        let axis = safe_normalize(destination - centroid);
        let axis = if axis == Vec2::ZERO { Vec2::X } else { axis };
        let normal = axis.perp();

        let mut lo = Vec2::splat(f32::INFINITY);
        let mut hi = Vec2::splat(f32::NEG_INFINITY);
        for &(p, r) in discs {
            let rel = p - centroid;
            let local = Vec2::new(rel.dot(axis), rel.dot(normal));
            lo = lo.min(local - Vec2::splat(r));
            hi = hi.max(local + Vec2::splat(r));
        }
        let mid = (lo + hi) * 0.5;
        Some(Self {
            center: centroid + axis * mid.x + normal * mid.y,
            axis,
            half_extents: (hi - lo) * 0.5,
        })
    }

    /// Point in box-local coordinates (along axis, along normal).
    pub fn to_local(&self, point: Vec2) -> Vec2 {
        let rel = point - self.center;
        Vec2::new(rel.dot(self.axis), rel.dot(self.axis.perp()))
    }

    pub fn contains(&self, point: Vec2) -> bool {
        let local = self.to_local(point).abs();
        local.x <= self.half_extents.x && local.y <= self.half_extents.y
    }
}

/// Goal for each disc, in input order.
pub fn plan_formation(discs: &[(Vec2, f32)], destination: Vec2) -> (Placement, Vec<Vec2>) {
    let Some(bounds) = OrientedBounds::around(discs, destination) else {
        return (Placement::Outer, Vec::new());
    };
    if bounds.contains(destination) {
        (Placement::Inner, vec![destination; discs.len()])
    } else {
        let goals = discs
            .iter()
            .map(|(p, _)| destination + (*p - bounds.center))
            .collect();
        (Placement::Outer, goals)
    }
}

// ============================================================================
// ORDER STATE
// ============================================================================

/// Plain move: drop any fight, walk to `goal` as part of `group`.
pub fn apply_move(unit: &mut Unit, goal: Vec2, group: GroupId) {
    unit.velocity = Vec2::ZERO;
    unit.target = None;
    unit.attacking = false;
    unit.holding_position = false;
    unit.attack_move = None;
    unit.attack_move_resolved = true;
    unit.current_group = Some(group);
    unit.set_goal(goal);
}

/// Move that engages whatever it meets and resumes afterwards.
pub fn apply_attack_move(unit: &mut Unit, goal: Vec2, group: GroupId) {
    apply_move(unit, goal, group);
    unit.attack_move = Some(goal);
    unit.attack_move_resolved = false;
}

/// Chase and fight one unit. `target` is its array index.
pub fn apply_attack(unit: &mut Unit, target: usize, target_position: Vec2) {
    unit.target = Some(target);
    unit.attacking = false;
    unit.holding_position = false;
    unit.attack_move = None;
    unit.attack_move_resolved = true;
    unit.current_group = None;
    unit.set_goal(target_position);
}

pub fn apply_hold(unit: &mut Unit, hold: bool) {
    unit.holding_position = hold;
    if hold {
        unit.attack_move = None;
        unit.attack_move_resolved = true;
        unit.target_position = unit.position;
        unit.come_to_rest();
    }
}

/// Halt in place and forget the current fight.
pub fn apply_stop(unit: &mut Unit) {
    unit.target = None;
    unit.attacking = false;
    unit.attack_move = None;
    unit.attack_move_resolved = true;
    unit.target_position = unit.position;
    unit.come_to_rest();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{SidePreference, UnitConfig, UnitId};

    fn line(n: usize) -> Vec<(Vec2, f32)> {
        (0..n).map(|i| (Vec2::new(0.0, i as f32 * 1.5), 0.5)).collect()
    }

    #[test]
    fn test_far_destination_keeps_offsets() {
        let discs = line(3);
        let (placement, goals) = plan_formation(&discs, Vec2::new(20.0, 1.5));
        assert_eq!(placement, Placement::Outer);
        assert_eq!(goals.len(), 3);
        let spacing = goals[1] - goals[0];
        assert!((spacing - Vec2::new(0.0, 1.5)).length() < 1e-4);
        // The middle unit sits on the box centre.
        assert!((goals[1] - Vec2::new(20.0, 1.5)).length() < 1e-4);
    }

    #[test]
    fn test_destination_inside_selection_converges() {
        let discs = line(3);
        let (placement, goals) = plan_formation(&discs, Vec2::new(0.2, 2.8));
        assert_eq!(placement, Placement::Inner);
        assert!(goals.iter().all(|g| *g == Vec2::new(0.2, 2.8)));
    }

    #[test]
    fn test_bounds_follow_travel_axis() {
        let bounds = OrientedBounds::around(&line(3), Vec2::new(10.0, 1.5)).unwrap();
        assert!((bounds.axis - Vec2::X).length() < 1e-5);
        assert!((bounds.half_extents - Vec2::new(0.5, 2.0)).length() < 1e-5);
        assert!(OrientedBounds::around(&[], Vec2::ZERO).is_none());
    }

    #[test]
    fn test_move_clears_combat_state() {
        let mut unit = Unit::new(UnitId(0), &UnitConfig::default());
        unit.target = Some(4);
        unit.attacking = true;
        unit.holding_position = true;
        unit.side_preference = SidePreference::Left;
        unit.velocity = Vec2::X;

        apply_move(&mut unit, Vec2::new(5.0, 5.0), GroupId(2));
        assert!(unit.target.is_none());
        assert!(!unit.attacking && !unit.holding_position && !unit.resolved);
        assert!(unit.attack_move_resolved);
        assert_eq!(unit.velocity, Vec2::ZERO);
        assert_eq!(unit.side_preference, SidePreference::Neutral);
        assert_eq!(unit.current_group, Some(GroupId(2)));
        assert_eq!(unit.move_start_position, unit.position);
    }

    #[test]
    fn test_attack_move_leaves_sweep_open() {
        let mut unit = Unit::new(UnitId(0), &UnitConfig::default());
        apply_attack_move(&mut unit, Vec2::new(9.0, 0.0), GroupId(0));
        assert_eq!(unit.attack_move, Some(Vec2::new(9.0, 0.0)));
        assert!(!unit.attack_move_resolved);
    }

    #[test]
    fn test_hold_and_stop_come_to_rest() {
        let mut unit = Unit::new(UnitId(0), &UnitConfig::default());
        apply_attack_move(&mut unit, Vec2::new(9.0, 0.0), GroupId(0));
        apply_hold(&mut unit, true);
        assert!(unit.resolved && unit.holding_position);
        assert!(unit.attack_move.is_none());

        apply_attack(&mut unit, 3, Vec2::new(4.0, 0.0));
        assert!(!unit.holding_position && !unit.resolved);
        apply_stop(&mut unit);
        assert!(unit.resolved);
        assert!(unit.target.is_none());
        assert_eq!(unit.target_position, unit.position);
    }
}
