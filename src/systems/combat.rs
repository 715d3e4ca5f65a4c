//! Combat system - target acquisition, engagement and damage.
//!
//! Runs once per tick, after the spatial index is rebuilt and before any
//! steering or integration. Units are processed in index order and every
//! mutation is applied in place, so a hit landed by unit `i` is already
//! visible when unit `i + 1` is evaluated.
//!
//! Per unit:
//! 1. Drop a target that no longer exists, died or is not hostile.
//! 2. Retarget (holding and idle units only consider enemies already in
//!    range; hunting units take the nearest enemy in their neighbourhood).
//! 3. Update the engagement state (`Attacking` iff the target is in range).
//! 4. Sync the goal to the target, or fall back to the attack-move path.
//! 5. Land a hit when the cooldown has elapsed.

use crate::components::{Unit, UnitStore};
use crate::math::heading;
use crate::spatial::SpatialIndex;
use crate::systems::clock::{SimClock, TickStats};
use bevy_ecs::prelude::*;
use tracing::trace;

/// System wrapper around [`resolve_combat`].
pub fn combat_system(
    clock: Res<SimClock>,
    index: Res<SpatialIndex>,
    mut units: ResMut<UnitStore>,
    mut stats: ResMut<TickStats>,
) {
    resolve_combat(units.as_mut_slice(), &index, clock.elapsed, &mut stats);
}

/// Evaluate combat for every unit at simulated time `now`.
pub fn resolve_combat(units: &mut [Unit], index: &SpatialIndex, now: f64, stats: &mut TickStats) {
    for i in 0..units.len() {
        if !units[i].is_alive() {
            units[i].attacking = false;
            continue;
        }

        let lost_target = drop_invalid_target(units, i);

        if units[i].holding_position {
            retarget_holding(units, index, i, stats);
        } else {
            retarget_mobile(units, index, i, stats);
        }

        update_engagement(units, i, now);
        sync_goal(units, i, lost_target);

        if let Some(t) = units[i].target {
            let unit = &units[i];
            if unit.attacking && now > unit.last_attack_time + unit.attack_speed as f64 {
                let damage = unit.damage;
                units[i].last_attack_time = now;
                units[t].health = units[t].health.saturating_sub(damage);
                stats.hits += 1;
                trace!(attacker = i, target = t, damage, health = units[t].health, "hit");
            }
        }
    }
}

/// Whether `t` is something unit `i` may keep fighting.
#[inline]
fn target_is_valid(units: &[Unit], i: usize, t: usize) -> bool {
    t != i
        && t < units.len()
        && units[t].is_alive()
        && units[i].owner.is_hostile_to(units[t].owner)
}

/// Clear a dangling or dead target. Returns true if one was dropped.
fn drop_invalid_target(units: &mut [Unit], i: usize) -> bool {
    match units[i].target {
        Some(t) if !target_is_valid(units, i, t) => {
            trace!(unit = i, target = t, "target lost");
            units[i].target = None;
            units[i].attacking = false;
            true
        }
        _ => false,
    }
}

/// Candidate enemies for unit `i`: its engagement neighbourhood, widened to
/// the motion neighbourhood for units that are allowed to chase.
fn engagement_candidates(units: &[Unit], index: &SpatialIndex, i: usize) -> Vec<usize> {
    let unit = &units[i];
    let mut rings = index.rings_for_radius(unit.radius + unit.attack_radius + index.grid().cell_size);
    if !unit.holding_position {
        rings = rings.max(index.ring_count(unit));
    }
    index.query_rings(unit.position, rings, Some(i))
}

/// Nearest hostile, living candidate, optionally restricted to attack range.
/// Returns the index and the squared distance.
fn nearest_hostile(
    units: &[Unit],
    i: usize,
    candidates: &[usize],
    within_attack_range: bool,
) -> Option<(usize, f32)> {
    let unit = &units[i];
    let mut best: Option<(usize, f32)> = None;
    for &j in candidates {
        if !target_is_valid(units, i, j) {
            continue;
        }
        let other = &units[j];
        let dist_sq = unit.position.distance_squared(other.position);
        if within_attack_range {
            let reach = other.radius + unit.radius + unit.attack_radius;
            if dist_sq > reach * reach {
                continue;
            }
        }
        if best.map_or(true, |(_, d)| dist_sq < d) {
            best = Some((j, dist_sq));
        }
    }
    best
}

/// Squared distance from unit `i` to its current target, if any.
fn current_target_dist_sq(units: &[Unit], i: usize) -> Option<f32> {
    units[i]
        .target
        .map(|t| units[i].position.distance_squared(units[t].position))
}

fn retarget_holding(units: &mut [Unit], index: &SpatialIndex, i: usize, stats: &mut TickStats) {
    let candidates = engagement_candidates(units, index, i);
    let Some((best, best_dist_sq)) = nearest_hostile(units, i, &candidates, true) else {
        return;
    };
    let replace = match current_target_dist_sq(units, i) {
        Some(current) => best_dist_sq < current,
        None => true,
    };
    if replace && units[i].target != Some(best) {
        trace!(unit = i, target = best, "holding unit retargets");
        units[i].target = Some(best);
        stats.target_switches += 1;
    }
}

fn retarget_mobile(units: &mut [Unit], index: &SpatialIndex, i: usize, stats: &mut TickStats) {
    let unit = &units[i];
    let sweep_over = unit.target.is_none() && unit.attack_move_resolved;
    // Swinging, or walking a plain move.
    if unit.attacking || (sweep_over && !unit.resolved) {
        return;
    }
    // At rest with nothing to hunt: only answer enemies already in reach.
    let idle = sweep_over && unit.resolved;

    let candidates = engagement_candidates(units, index, i);
    let Some((best, best_dist_sq)) = nearest_hostile(units, i, &candidates, idle) else {
        return;
    };
    let switch = match current_target_dist_sq(units, i) {
        Some(current) => best_dist_sq < current,
        None => true,
    };
    if switch && units[i].target != Some(best) {
        trace!(unit = i, target = best, "retarget");
        let goal = units[best].position;
        let unit = &mut units[i];
        unit.target = Some(best);
        unit.current_group = None;
        unit.set_goal(goal);
        stats.target_switches += 1;
    }
}

/// `NotAttacking <-> Attacking` transitions.
fn update_engagement(units: &mut [Unit], i: usize, now: f64) {
    let Some(t) = units[i].target else {
        units[i].attacking = false;
        return;
    };
    let target_pos = units[t].position;
    let target_radius = units[t].radius;

    let unit = &mut units[i];
    let reach = unit.attack_radius + unit.radius + target_radius;
    let in_range = unit.position.distance_squared(target_pos) <= reach * reach;

    if in_range && !unit.attacking {
        unit.attacking = true;
        // The first hit lands one full cooldown after contact.
        unit.last_attack_time = now;
        if !unit.holding_position {
            unit.come_to_rest();
        }
    } else if !in_range && unit.attacking {
        unit.attacking = false;
    }

    if unit.attacking {
        let to_target = target_pos - unit.position;
        if to_target.length_squared() > 0.0 {
            unit.orientation = heading(to_target);
        }
    }
}

/// Point the goal at the live target, or fall back once it is gone.
fn sync_goal(units: &mut [Unit], i: usize, lost_target: bool) {
    if let Some(t) = units[i].target {
        let target_pos = units[t].position;
        let unit = &mut units[i];
        if !unit.attacking && !unit.holding_position {
            unit.target_position = target_pos;
            unit.move_start_position = unit.position;
            unit.resolved = false;
        }
        return;
    }

    let unit = &mut units[i];
    if !unit.attack_move_resolved {
        if let Some(destination) = unit.attack_move {
            if lost_target || unit.target_position != destination {
                unit.set_goal(destination);
            }
        }
    } else if lost_target && !unit.holding_position {
        let reach = unit.attack_radius + unit.radius;
        if unit.position.distance_squared(unit.target_position) <= reach * reach {
            unit.target_position = unit.position;
            unit.come_to_rest();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Owner, UnitConfig, UnitId};
    use crate::config::GridConfig;
    use glam::Vec2;

    fn unit(id: u32, owner: Owner, x: f32, y: f32) -> Unit {
        Unit::new(
            UnitId(id),
            &UnitConfig {
                owner,
                position: Vec2::new(x, y),
                attack_radius: 2.0,
                attack_speed: 1.0,
                damage: 10,
                max_health: 100,
                ..Default::default()
            },
        )
    }

    fn index_for(units: &[Unit]) -> SpatialIndex {
        let mut index = SpatialIndex::new(GridConfig::default());
        index.rebuild(units);
        index
    }

    #[test]
    fn test_units_in_range_engage_and_trade_hits() {
        let mut units = vec![unit(0, Owner::Blue, 0.0, 0.0), unit(1, Owner::Red, 2.0, 0.0)];
        let index = index_for(&units);
        let mut stats = TickStats::default();

        resolve_combat(&mut units, &index, 0.0, &mut stats);
        assert_eq!(units[0].target, Some(1));
        assert_eq!(units[1].target, Some(0));
        assert!(units[0].attacking && units[1].attacking);
        // Cooldown starts at contact.
        assert_eq!(stats.hits, 0);

        resolve_combat(&mut units, &index, 1.01, &mut stats);
        assert_eq!(stats.hits, 2);
        assert_eq!(units[0].health, 90);
        assert_eq!(units[1].health, 90);

        // Not yet cooled down again.
        resolve_combat(&mut units, &index, 1.5, &mut stats);
        assert_eq!(stats.hits, 2);
    }

    #[test]
    fn test_mobile_unit_chases_out_of_range_enemy() {
        let mut units = vec![unit(0, Owner::Blue, 0.0, 0.0), unit(1, Owner::Red, 6.0, 0.0)];
        units[1].holding_position = true;
        let index = index_for(&units);
        let mut stats = TickStats::default();

        resolve_combat(&mut units, &index, 0.0, &mut stats);
        assert_eq!(units[0].target, Some(1));
        assert!(!units[0].attacking);
        assert!(!units[0].resolved);
        assert_eq!(units[0].target_position, Vec2::new(6.0, 0.0));
        // Holding unit ignores enemies beyond its reach.
        assert!(units[1].target.is_none());
    }

    #[test]
    fn test_holding_unit_only_switches_to_strictly_nearer() {
        let mut units = vec![
            unit(0, Owner::Blue, 0.0, 0.0),
            unit(1, Owner::Red, 2.0, 0.0),
            unit(2, Owner::Red, -2.0, 0.0),
        ];
        units[0].holding_position = true;
        units[0].target = Some(1);
        let index = index_for(&units);
        let mut stats = TickStats::default();

        resolve_combat(&mut units, &index, 0.0, &mut stats);
        // Equal distance: keep the current target.
        assert_eq!(units[0].target, Some(1));
        assert!(units[0].resolved);
    }

    #[test]
    fn test_dangling_target_is_dropped() {
        let mut units = vec![unit(0, Owner::Blue, 0.0, 0.0)];
        units[0].target = Some(5);
        units[0].attacking = true;
        units[0].attack_move_resolved = true;
        let index = index_for(&units);

        resolve_combat(&mut units, &index, 0.0, &mut TickStats::default());
        assert!(units[0].target.is_none());
        assert!(!units[0].attacking);
    }

    #[test]
    fn test_attack_move_resumes_after_kill() {
        let mut units = vec![unit(0, Owner::Blue, 0.0, 0.0), unit(1, Owner::Red, 2.0, 0.0)];
        units[0].attack_move = Some(Vec2::new(20.0, 0.0));
        units[0].target = Some(1);
        units[0].attacking = true;
        units[0].resolved = true;
        units[1].health = 0;
        let index = index_for(&units);

        resolve_combat(&mut units, &index, 0.0, &mut TickStats::default());
        assert!(units[0].target.is_none());
        assert!(!units[0].resolved);
        assert_eq!(units[0].target_position, Vec2::new(20.0, 0.0));
    }

    #[test]
    fn test_plain_move_ignores_enemies() {
        let mut units = vec![unit(0, Owner::Blue, 0.0, 0.0), unit(1, Owner::Red, 3.5, 0.0)];
        units[0].attack_move_resolved = true;
        units[0].set_goal(Vec2::new(10.0, 0.0));
        units[1].attack_move_resolved = true;
        let index = index_for(&units);

        resolve_combat(&mut units, &index, 0.0, &mut TickStats::default());
        assert!(units[0].target.is_none());
        assert!(units[1].target.is_none());
    }

    #[test]
    fn test_lost_target_in_reach_snaps_to_rest() {
        let mut units = vec![unit(0, Owner::Blue, 0.0, 0.0), unit(1, Owner::Red, 3.0, 0.0)];
        units[0].attack_move_resolved = true;
        units[0].target = Some(1);
        units[0].set_goal(Vec2::new(1.5, 0.0));
        units[1].health = 0;
        let index = index_for(&units);

        resolve_combat(&mut units, &index, 0.0, &mut TickStats::default());
        assert!(units[0].resolved);
        assert_eq!(units[0].target_position, units[0].position);
    }

    #[test]
    fn test_idle_unit_answers_enemies_in_reach_only() {
        let mut units = vec![
            unit(0, Owner::Blue, 0.0, 0.0),
            unit(1, Owner::Red, 2.5, 0.0),
            unit(2, Owner::Red, -3.5, 0.0),
        ];
        // Blue finished a plain move; reds are busy elsewhere.
        units[0].attack_move_resolved = true;
        units[1].target = Some(0);
        units[1].attack_move_resolved = true;
        units[2].holding_position = true;
        let index = index_for(&units);

        resolve_combat(&mut units, &index, 0.0, &mut TickStats::default());
        assert_eq!(units[0].target, Some(1));
        assert!(units[0].attacking);
        assert!(units[0].resolved);
        assert_eq!(units[0].position, Vec2::ZERO);
    }

    #[test]
    fn test_idle_unit_does_not_chase() {
        let mut units = vec![unit(0, Owner::Blue, 0.0, 0.0), unit(1, Owner::Red, 3.5, 0.0)];
        units[0].attack_move_resolved = true;
        units[1].holding_position = true;
        let index = index_for(&units);

        resolve_combat(&mut units, &index, 0.0, &mut TickStats::default());
        assert!(units[0].target.is_none());
        assert!(units[0].resolved);
    }
}
