//! Steering system - local avoidance and flocking.
//!
//! Plans one `preferred_dir` per unresolved, non-attacking unit per tick,
//! before any integration. Planning runs in two phases:
//! - **gather**: read-only over the unit array and the spatial index. Picks
//!   the obstacle to steer around (or the flocking direction). Data-parallel
//!   when the `parallel` feature is on.
//! - **apply**: sequential, in index order. Side preferences are reconciled
//!   here against the *live* side of the obstacle, so a unit processed later
//!   in the same tick already sees what an earlier one committed to.
//!
//! ## Side preference
//! `Neutral -> Left | Right` when an obstacle first constrains the unit,
//! kept while the unit stays constrained, forced to the obstacle's side when
//! a moving obstacle has committed to the other one, and back to `Neutral`
//! as soon as nothing blocks the unit.

use crate::components::{SidePreference, Unit, UnitStore};
use crate::config::{SimConfig, SteeringConfig};
use crate::math::{angle_between, cross, pair_separation_axis, rotate, rotate_side, safe_normalize, EPSILON};
use crate::spatial::SpatialIndex;
use crate::systems::clock::TickStats;
use bevy_ecs::prelude::*;
use glam::Vec2;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Outcome of the gather phase for one unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SteeringPlan {
    /// Steer around a moving unit. `velocity_side` is the tie-break computed
    /// from the obstacle's heading; the final side is settled on apply.
    AvoidMoving {
        neighbor: usize,
        to_neighbor: Vec2,
        velocity_side: SidePreference,
    },
    /// Steer toward a point beside a stationary unit.
    AvoidStationary { side: SidePreference, direction: Vec2 },
    /// Nothing in the way.
    Flock { direction: Vec2 },
}

/// System wrapper around [`plan_steering`].
pub fn steering_system(
    config: Res<SimConfig>,
    index: Res<SpatialIndex>,
    mut units: ResMut<UnitStore>,
    mut stats: ResMut<TickStats>,
) {
    plan_steering(units.as_mut_slice(), &index, &config.steering, &mut stats);
}

/// Plan preferred directions for every unit that needs one.
pub fn plan_steering(
    units: &mut [Unit],
    index: &SpatialIndex,
    config: &SteeringConfig,
    stats: &mut TickStats,
) {
    let plans = gather_plans(units, index, config);

    for (i, plan) in plans.into_iter().enumerate() {
        let Some(plan) = plan else {
            units[i].preferred_dir = Vec2::ZERO;
            continue;
        };
        stats.planned += 1;
        match plan {
            SteeringPlan::AvoidMoving {
                neighbor,
                to_neighbor,
                velocity_side,
            } => {
                let side = reconcile_side(
                    units[i].side_preference,
                    units[neighbor].side_preference,
                    velocity_side,
                );
                let unit = &mut units[i];
                unit.side_preference = side;
                unit.preferred_dir = rotate_side(to_neighbor, side.sign());
                stats.avoiding += 1;
            }
            SteeringPlan::AvoidStationary { side, direction } => {
                let unit = &mut units[i];
                unit.side_preference = side;
                unit.preferred_dir = direction;
                stats.avoiding += 1;
            }
            SteeringPlan::Flock { direction } => {
                let unit = &mut units[i];
                unit.side_preference = SidePreference::Neutral;
                unit.preferred_dir = direction;
            }
        }
    }
}

/// Read-only planning pass over the whole array.
pub fn gather_plans(units: &[Unit], index: &SpatialIndex, config: &SteeringConfig) -> Vec<Option<SteeringPlan>> {
    #[cfg(feature = "parallel")]
    let plans = (0..units.len())
        .into_par_iter()
        .map(|i| plan_unit(units, index, config, i))
        .collect();

    #[cfg(not(feature = "parallel"))]
    let plans = (0..units.len())
        .map(|i| plan_unit(units, index, config, i))
        .collect();

    plans
}

/// Settle the side against a moving obstacle.
///
/// A committed side is kept; an uncommitted unit takes the velocity
/// tie-break. Either way, if the obstacle has already committed to the
/// other side we follow it, so two units avoiding each other always end
/// up agreeing.
pub fn reconcile_side(own: SidePreference, theirs: SidePreference, velocity_side: SidePreference) -> SidePreference {
    let mine = if own.is_committed() { own } else { velocity_side };
    if theirs.is_committed() && theirs != mine {
        theirs
    } else {
        mine
    }
}

// ============================================================================
// GATHER
// ============================================================================

fn plan_unit(units: &[Unit], index: &SpatialIndex, config: &SteeringConfig, i: usize) -> Option<SteeringPlan> {
    let unit = &units[i];
    if unit.resolved || unit.attacking || !unit.is_alive() {
        return None;
    }

    let desired = safe_normalize(unit.target_position - unit.position);
    let neighbors = index.neighbors(i);
    let candidates: Vec<usize> = neighbors
        .iter()
        .copied()
        .filter(|&j| is_obstacle(units, config, i, j, desired))
        .collect();

    // Nearest first; on equal distance a moving obstacle wins.
    let chosen = candidates
        .iter()
        .copied()
        .map(|j| (j, unit.position.distance_squared(units[j].position), units[j].resolved))
        .min_by(|a, b| a.1.total_cmp(&b.1).then(a.2.cmp(&b.2)));

    let Some((j, _, stationary)) = chosen else {
        return Some(SteeringPlan::Flock {
            direction: flocking_direction(units, config, i, desired, neighbors),
        });
    };

    let other = &units[j];
    let to_neighbor = safe_normalize(other.position - unit.position);
    let to_neighbor = if to_neighbor == Vec2::ZERO {
        pair_separation_axis(i, j)
    } else {
        to_neighbor
    };

    if !stationary {
        return Some(SteeringPlan::AvoidMoving {
            neighbor: j,
            to_neighbor,
            velocity_side: choose_sign_velocity(unit, other),
        });
    }

    let mut side = if unit.side_preference.is_committed() {
        unit.side_preference
    } else {
        choose_sign(unit, other, config.side_probe_degrees.to_radians())
    };
    let mut point = detour_point(unit, other, to_neighbor, side);
    if unit.side_preference.is_committed()
        && corridor_blocked(units, i, neighbors, &candidates, point)
    {
        side = side.flipped();
        point = detour_point(unit, other, to_neighbor, side);
    }

    Some(SteeringPlan::AvoidStationary {
        side,
        direction: safe_normalize(point - unit.position),
    })
}

/// Whether neighbour `j` is something unit `i` has to steer around.
fn is_obstacle(units: &[Unit], config: &SteeringConfig, i: usize, j: usize, desired: Vec2) -> bool {
    let unit = &units[i];
    let other = &units[j];
    if !other.is_alive() {
        return false;
    }
    let offset = other.position - unit.position;
    let moving = !other.resolved;

    if moving {
        let range = config.moving_neighbor_radius + unit.radius + other.radius;
        if offset.length_squared() > range * range {
            return false;
        }
    } else if config.stationary_lane_filter {
        // Stationary units have no range cap; only those whose disc reaches
        // the travel line can block.
        let lateral = cross(desired, offset).abs();
        if lateral >= unit.radius + other.radius {
            return false;
        }
    }

    // Only in the way if the goal lies beyond it.
    if (unit.target_position - other.position).dot(offset) <= 0.0 {
        return false;
    }

    if unit.owner == other.owner {
        if unit.current_group.is_some() && unit.current_group == other.current_group {
            return false;
        }
        let heading_same_way = other.velocity.length_squared() > EPSILON * EPSILON
            && angle_between(other.velocity, desired) <= config.same_direction_degrees.to_radians();
        if heading_same_way {
            return false;
        }
    } else if unit.target == Some(j) {
        return false;
    }
    true
}

/// Tie-break against a moving obstacle from which side of us it is heading.
fn choose_sign_velocity(unit: &Unit, other: &Unit) -> SidePreference {
    let c = cross(other.position - unit.position, other.preferred_dir);
    if c < -EPSILON {
        SidePreference::Left
    } else {
        SidePreference::Right
    }
}

/// Probe a fixed rotation either way around a stationary obstacle and take
/// the side that ends up closer to the goal. Ties go right.
fn choose_sign(unit: &Unit, other: &Unit, probe_angle: f32) -> SidePreference {
    let offset = other.position - unit.position;
    let left = unit.position + rotate(offset, probe_angle);
    let right = unit.position + rotate(offset, -probe_angle);
    if left.distance_squared(unit.target_position) < right.distance_squared(unit.target_position) {
        SidePreference::Left
    } else {
        SidePreference::Right
    }
}

fn detour_point(unit: &Unit, other: &Unit, to_neighbor: Vec2, side: SidePreference) -> Vec2 {
    other.position + rotate_side(to_neighbor, side.sign()) * (other.radius + 2.0 * unit.radius)
}

/// A resolved, holding unit that is not itself an accepted obstacle sits in
/// the lane between us and `point`.
fn corridor_blocked(units: &[Unit], i: usize, neighbors: &[usize], candidates: &[usize], point: Vec2) -> bool {
    let unit = &units[i];
    let lane = point - unit.position;
    let length = lane.length();
    let heading = safe_normalize(lane);
    if heading == Vec2::ZERO {
        return false;
    }
    neighbors.iter().any(|&k| {
        let other = &units[k];
        if !(other.resolved && other.holding_position) || candidates.contains(&k) {
            return false;
        }
        let rel = other.position - unit.position;
        let ahead = rel.dot(heading);
        ahead > 0.0
            && ahead < length + other.radius
            && cross(heading, rel).abs() < unit.radius + other.radius
    })
}

/// Goal direction blended with group alignment and separation.
fn flocking_direction(units: &[Unit], config: &SteeringConfig, i: usize, desired: Vec2, neighbors: &[usize]) -> Vec2 {
    let unit = &units[i];
    let mut sum = desired;
    for &j in neighbors {
        let other = &units[j];
        let same_group = unit.current_group.is_some() && unit.current_group == other.current_group;
        if same_group && !other.resolved {
            sum += other.preferred_dir;
        }

        let away = unit.position - other.position;
        let dist = away.length();
        let push = if dist <= EPSILON {
            pair_separation_axis(i, j)
        } else {
            away / dist
        };

        let contact = unit.radius + other.radius + config.contact_slop;
        if dist < contact {
            sum += push;
        }

        let crowd = unit.radius + other.radius + config.crowd_margin;
        if !other.resolved && !same_group && dist < crowd {
            sum += push * config.crowd_weight * (1.0 - dist / crowd);
        }
    }
    safe_normalize(sum)
}
