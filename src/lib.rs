//! Skirmish - Simulation Core
//!
//! Deterministic, fixed-timestep unit movement and combat resolution for a
//! top-down real-time strategy game. Uses `bevy_ecs` resources and a chained
//! schedule for the tick pipeline.

pub mod api;
pub mod components;
pub mod config;
pub mod error;
pub mod math;
pub mod orders;
pub mod spatial;
pub mod systems;
pub mod world;

pub use api::{SimWorld, UnitView};
pub use components::*;
pub use config::{GridConfig, MotionConfig, SimConfig, SteeringConfig};
pub use error::{Result, SimError};
pub use orders::Placement;
pub use spatial::SpatialIndex;
pub use systems::*;
pub use world::{Snapshot, UnitSnapshot};
