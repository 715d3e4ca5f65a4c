//! ECS systems for the skirmish simulation.
//!
//! Each tick stage is a bevy_ecs system over the shared resources, backed by
//! a plain function over `&mut [Unit]` that tests and benches call directly.
//!
//! ## Tick Order
//!
//! The stages are chained; nothing here runs in parallel at the schedule
//! level because every stage mutates the unit array:
//!
//! 1. `spatial_index_system` - rebuilds the grid and neighbour lists
//! 2. `combat_system` - retargeting, engagement, damage
//! 3. `steering_system` - one preferred direction per moving unit
//! 4. `motion_system` - substep integration, overlap solver, arrival
//! 5. `bookkeeping_system` - move-group pruning
//!
//! Data parallelism lives inside stages 1 and 3 behind the `parallel` feature.

pub mod bookkeeping;
pub mod clock;
pub mod combat;
pub mod motion;
pub mod steering;

pub use bookkeeping::*;
pub use clock::*;
pub use combat::*;
pub use motion::*;
pub use steering::*;
