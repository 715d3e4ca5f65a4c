//! Simulation configuration.
//!
//! Everything here is validated once, when the config is loaded or the
//! world is built. The tick pipeline assumes a valid config.

use crate::error::{Result, SimError};
use bevy_ecs::prelude::*;
use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Uniform grid definition for the broad phase.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridConfig {
    /// World-space position of the corner of cell (0, 0).
    pub origin: Vec2,
    /// Side length of a cell in world units.
    pub cell_size: f32,
    pub rows: u32,
    pub columns: u32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            origin: Vec2::new(-256.0, -256.0),
            cell_size: 2.0,
            rows: 256,
            columns: 256,
        }
    }
}

/// Tuning for the steering planner.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SteeringConfig {
    /// Extra range (beyond both radii) in which a moving neighbour is an obstacle.
    pub moving_neighbor_radius: f32,
    /// Same-owner units heading within this angle of us are never obstacles.
    pub same_direction_degrees: f32,
    /// Fixed rotation used to probe left/right around a stationary obstacle.
    pub side_probe_degrees: f32,
    /// Contact separation kicks in below `r_a + r_b + contact_slop`.
    pub contact_slop: f32,
    /// Crowd separation against other moving groups within `r_a + r_b + crowd_margin`.
    pub crowd_margin: f32,
    pub crowd_weight: f32,
    /// Ignore stationary neighbours whose disc does not reach the straight
    /// line to the goal. When off, stationary neighbours face only the
    /// half-plane test.
    pub stationary_lane_filter: bool,
}

impl Default for SteeringConfig {
    fn default() -> Self {
        Self {
            moving_neighbor_radius: 2.0,
            same_direction_degrees: 30.0,
            side_probe_degrees: 45.0,
            contact_slop: 0.01,
            crowd_margin: 4.0,
            crowd_weight: 0.5,
            stationary_lane_filter: true,
        }
    }
}

/// Tuning for integration, the penalty solver and stop detection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// Gap (beyond both radii) at which a closing neighbour starts pushing.
    pub push_margin: f32,
    pub push_epsilon: f32,
    /// Lower bound of the rotation blend for a deflected push.
    pub min_push_blend: f32,
    /// Squared distance to target under which a unit has arrived.
    pub arrive_distance_sq: f32,
    /// Contact margin for the neighbour-based stop heuristic.
    pub stop_contact_margin: f32,
    /// Neighbours whose goal lies within this distance of ours share a destination.
    pub stop_target_radius: f32,
    /// Distance from a goal that counts as "in the stop zone".
    pub stop_zone_radius: f32,
    /// Minimum heading dot product toward a stopped neighbour to give up.
    pub stop_heading_dot: f32,
    /// Sine tolerance for the straight-line overshoot snap.
    pub overshoot_cross_tolerance: f32,
    /// Upper bound on penalty passes per substep.
    pub overlap_iterations: u32,
    /// Penetration below which a pass counts as settled.
    pub overlap_tolerance: f32,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            push_margin: 0.1,
            push_epsilon: 1e-3,
            min_push_blend: 0.4,
            arrive_distance_sq: 0.001,
            stop_contact_margin: 0.05,
            stop_target_radius: 1.25,
            stop_zone_radius: 2.0,
            stop_heading_dot: 0.5,
            overshoot_cross_tolerance: 0.05,
            overlap_iterations: 24,
            overlap_tolerance: 1e-5,
        }
    }
}

/// Top-level simulation configuration.
#[derive(Resource, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Fixed timestep in seconds (e.g., 1/60 for 60 Hz).
    pub fixed_timestep: f32,
    /// Integration substeps per tick.
    pub substeps: u32,
    pub grid: GridConfig,
    pub steering: SteeringConfig,
    pub motion: MotionConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            fixed_timestep: 1.0 / 60.0,
            substeps: 4,
            grid: GridConfig::default(),
            steering: SteeringConfig::default(),
            motion: MotionConfig::default(),
        }
    }
}

impl SimConfig {
    /// Parse and validate a JSON config. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: SimConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.fixed_timestep > 0.0) {
            return Err(SimError::InvalidConfig(format!(
                "fixed_timestep must be positive, got {}",
                self.fixed_timestep
            )));
        }
        if self.substeps == 0 {
            return Err(SimError::InvalidConfig("substeps must be at least 1".into()));
        }
        if !(self.grid.cell_size > 0.0) {
            return Err(SimError::InvalidConfig(format!(
                "cell_size must be positive, got {}",
                self.grid.cell_size
            )));
        }
        if self.grid.rows == 0 || self.grid.columns == 0 {
            return Err(SimError::InvalidConfig(format!(
                "grid must have at least one cell, got {}x{}",
                self.grid.rows, self.grid.columns
            )));
        }
        if self.motion.overlap_iterations == 0 {
            return Err(SimError::InvalidConfig("overlap_iterations must be at least 1".into()));
        }
        if self.steering.moving_neighbor_radius < 0.0 {
            return Err(SimError::InvalidConfig(
                "moving_neighbor_radius must not be negative".into(),
            ));
        }
        Ok(())
    }

    /// Length of one integration substep for the configured timestep.
    pub fn substep_dt(&self, dt: f32) -> f32 {
        dt / self.substeps.max(1) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(SimConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_substeps_rejected() {
        let config = SimConfig {
            substeps: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(SimError::InvalidConfig(_))));
    }

    #[test]
    fn test_zero_overlap_iterations_rejected() {
        let mut config = SimConfig::default();
        config.motion.overlap_iterations = 0;
        assert!(matches!(config.validate(), Err(SimError::InvalidConfig(_))));
    }

    #[test]
    fn test_zero_cell_size_rejected() {
        let mut config = SimConfig::default();
        config.grid.cell_size = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = SimConfig::from_json_str(r#"{ "substeps": 8 }"#).unwrap();
        assert_eq!(config.substeps, 8);
        assert_eq!(config.grid, GridConfig::default());
    }

    #[test]
    fn test_bad_json_is_parse_error() {
        let err = SimConfig::from_json_str("{ substeps: ").unwrap_err();
        assert!(matches!(err, SimError::Parse(_)));
    }
}
