//! Motion system - substep integration, penalty solver and stop detection.
//!
//! Each tick is split into `substeps` equal substeps. Per substep:
//! 1. velocities (acceleration along `preferred_dir`, passive push, or zero)
//! 2. positions, with `old_position` recorded first
//! 3. straight-line overshoot snap onto the goal
//! 4. pairwise overlap correction, applied in place
//!
//! The solver runs after the snap, so a unit snapped onto an occupied goal
//! is pushed back out within the same substep.
//!
//! After the last substep every moving unit is checked for arrival.
//! Neighbour lists come from the index built at the start of the tick and
//! are not re-queried between substeps.

use crate::components::{Unit, UnitStore};
use crate::config::{MotionConfig, SimConfig};
use crate::math::{angle_between, cross, heading, pair_separation_axis, rotate_side, safe_normalize, smoothstep, EPSILON};
use crate::spatial::SpatialIndex;
use crate::systems::clock::{DeltaTime, TickStats};
use bevy_ecs::prelude::*;
use glam::Vec2;
use std::f32::consts::FRAC_PI_2;
use tracing::trace;

/// System that integrates unit motion for one tick.
pub fn motion_system(
    config: Res<SimConfig>,
    dt: Res<DeltaTime>,
    index: Res<SpatialIndex>,
    mut units: ResMut<UnitStore>,
    mut stats: ResMut<TickStats>,
) {
    integrate(
        units.as_mut_slice(),
        &index,
        &config.motion,
        dt.0,
        config.substeps,
        &mut stats,
    );
}

/// Advance all units by `dt` seconds in `substeps` substeps, then run the
/// arrival check.
pub fn integrate(
    units: &mut [Unit],
    index: &SpatialIndex,
    config: &MotionConfig,
    dt: f32,
    substeps: u32,
    stats: &mut TickStats,
) {
    let substeps = substeps.max(1);
    let sub_dt = dt / substeps as f32;
    let mut velocities = Vec::with_capacity(units.len());

    for _ in 0..substeps {
        velocities.clear();
        {
            let current: &[Unit] = units;
            velocities.extend((0..current.len()).map(|i| next_velocity(current, index, config, i, sub_dt)));
        }

        for (unit, velocity) in units.iter_mut().zip(&velocities) {
            unit.velocity = *velocity;
            unit.old_position = unit.position;
            unit.position += unit.velocity * sub_dt;
            if !unit.resolved {
                snap_overshoot(unit, config);
            }
        }

        stats.overlaps_resolved += resolve_overlaps(units, index, config);

        for unit in units.iter_mut() {
            if unit.velocity.length_squared() > EPSILON * EPSILON {
                unit.orientation = heading(unit.velocity);
            }
        }
    }

    stats.newly_resolved += check_stop(units, index, config);
}

// ============================================================================
// VELOCITY
// ============================================================================

fn next_velocity(units: &[Unit], index: &SpatialIndex, config: &MotionConfig, i: usize, sub_dt: f32) -> Vec2 {
    let unit = &units[i];
    if !unit.is_alive() || unit.holding_position {
        return Vec2::ZERO;
    }
    if unit.resolved {
        return push_velocity(units, index, config, i);
    }
    (unit.velocity + unit.preferred_dir * unit.acceleration * sub_dt).clamp_length_max(unit.max_speed)
}

/// Velocity a resting unit picks up from neighbours walking into it.
///
/// A moving pusher is deflected sideways: its velocity is rotated a quarter
/// turn toward the side we sit on and blended in, more strongly the further
/// off its heading we are. A resting pusher just shoves us straight away.
fn push_velocity(units: &[Unit], index: &SpatialIndex, config: &MotionConfig, i: usize) -> Vec2 {
    let unit = &units[i];
    let mut sum = Vec2::ZERO;
    let mut count = 0u32;

    for &j in index.neighbors(i) {
        let other = &units[j];
        if !other.is_alive() {
            continue;
        }
        let rel = unit.position - other.position;
        let gap = rel.length() - unit.radius - other.radius - config.push_margin;
        if gap >= config.push_epsilon || rel.dot(other.velocity) <= 0.0 {
            continue;
        }

        let contribution = if other.resolved {
            safe_normalize(rel) * unit.max_speed
        } else {
            let side = if cross(other.velocity, rel) > 0.0 { -1.0 } else { 1.0 };
            let rotated = rotate_side(other.velocity, side);
            let blend = smoothstep(0.0, FRAC_PI_2, angle_between(other.velocity, rel)).max(config.min_push_blend);
            other.velocity.lerp(rotated, blend)
        };
        sum += contribution;
        count += 1;
    }

    if count == 0 {
        Vec2::ZERO
    } else {
        sum / count as f32
    }
}

// ============================================================================
// POSITION CORRECTION
// ============================================================================

/// Snap onto the goal when this substep carried the unit over it along a
/// straight line.
fn snap_overshoot(unit: &mut Unit, config: &MotionConfig) {
    let traveled = unit.position - unit.old_position;
    let travel_sq = traveled.length_squared();
    if travel_sq <= 0.0 {
        return;
    }
    let to_target = unit.target_position - unit.old_position;
    if to_target.length_squared() > travel_sq {
        return;
    }
    let on_target = to_target.length_squared() <= EPSILON * EPSILON;
    let straight = to_target.dot(traveled) > 0.0
        && cross(safe_normalize(to_target), safe_normalize(traveled)).abs() < config.overshoot_cross_tolerance;
    if on_target || straight {
        unit.position = unit.target_position;
    }
}

/// Penalty solver: in-place passes over every neighbour pair until the
/// deepest remaining penetration is below `overlap_tolerance`, at most
/// `overlap_iterations` times. Returns the number of pair corrections made.
pub fn resolve_overlaps(units: &mut [Unit], index: &SpatialIndex, config: &MotionConfig) -> u32 {
    let mut corrected = 0;
    for _ in 0..config.overlap_iterations.max(1) {
        let (count, deepest) = overlap_pass(units, index);
        corrected += count;
        if deepest <= config.overlap_tolerance {
            break;
        }
    }
    corrected
}

/// A pair is handled from its lower index, or from the higher index when
/// the lower one does not list it (neighbour lists are asymmetric).
fn overlap_pass(units: &mut [Unit], index: &SpatialIndex) -> (u32, f32) {
    let mut count = 0;
    let mut deepest = 0.0f32;
    for a in 0..units.len() {
        for &b in index.neighbors(a) {
            if b < a && index.are_neighbors(b, a) {
                continue;
            }
            let slop = separate_pair(units, a, b);
            if slop > 0.0 {
                count += 1;
                deepest = deepest.max(slop);
            }
        }
    }
    (count, deepest)
}

/// Push one pair apart. Returns the penetration depth that was removed.
fn separate_pair(units: &mut [Unit], a: usize, b: usize) -> f32 {
    let (ua, ub) = (&units[a], &units[b]);
    if !ua.is_alive() || !ub.is_alive() {
        return 0.0;
    }
    let min_dist = ua.radius + ub.radius;
    let delta = ua.position - ub.position;
    let dist_sq = delta.length_squared();
    if dist_sq >= min_dist * min_dist {
        return 0.0;
    }

    let dist = dist_sq.sqrt();
    let normal = if dist > EPSILON {
        delta / dist
    } else {
        let axis = pair_separation_axis(a.min(b), a.max(b));
        if a < b {
            axis
        } else {
            -axis
        }
    };
    let slop = min_dist - dist;

    let (weight_a, weight_b) = match (ua.holding_position, ub.holding_position) {
        (true, false) => (0.0, 1.0),
        (false, true) => (1.0, 0.0),
        _ => {
            let (inv_a, inv_b) = (1.0 / ua.mass, 1.0 / ub.mass);
            let total = inv_a + inv_b;
            (inv_a / total, inv_b / total)
        }
    };

    units[a].position += normal * slop * weight_a;
    units[b].position -= normal * slop * weight_b;
    slop
}

// ============================================================================
// ARRIVAL
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum StopReason {
    Arrived,
    Overshot,
    Crowded,
}

/// Resolve units that arrived, overshot, or ran into others sharing their
/// destination. Returns how many came to rest.
fn check_stop(units: &mut [Unit], index: &SpatialIndex, config: &MotionConfig) -> u32 {
    let mut stopped = 0;
    for i in 0..units.len() {
        let unit = &units[i];
        if unit.resolved || !unit.is_alive() {
            continue;
        }
        let Some(reason) = stop_reason(units, index, config, i) else {
            continue;
        };

        let unit = &mut units[i];
        trace!(unit = unit.id.0, ?reason, "stopped");
        unit.come_to_rest();
        if unit.target.is_none() {
            unit.attack_move_resolved = true;
            unit.attack_move = None;
        }
        stopped += 1;
    }
    stopped
}

fn stop_reason(units: &[Unit], index: &SpatialIndex, config: &MotionConfig, i: usize) -> Option<StopReason> {
    let unit = &units[i];
    let to_target = unit.target_position - unit.position;
    if to_target.length_squared() < config.arrive_distance_sq {
        return Some(StopReason::Arrived);
    }
    if (unit.target_position - unit.move_start_position).dot(to_target) < 0.0 {
        return Some(StopReason::Overshot);
    }

    let near_goal = to_target.length() <= config.stop_zone_radius;
    let facing = safe_normalize(unit.velocity);
    let crowded = index.neighbors(i).iter().any(|&j| {
        let other = &units[j];
        if !other.is_alive() {
            return false;
        }
        let contact = unit.radius + other.radius + config.stop_contact_margin;
        let offset = other.position - unit.position;
        if offset.length_squared() > contact * contact
            || other.target_position.distance(unit.target_position) > config.stop_target_radius
        {
            return false;
        }
        if other.resolved {
            other.position.distance(other.target_position) <= config.stop_zone_radius
                && facing.dot(safe_normalize(offset)) >= config.stop_heading_dot
        } else {
            near_goal && unit.velocity.dot(other.velocity) < 0.0
        }
    });
    crowded.then_some(StopReason::Crowded)
}
