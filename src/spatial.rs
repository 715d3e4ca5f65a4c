//! Broad-phase spatial partitioning.
//!
//! A bounded uniform grid maps each cell (`row * columns + col`) to the
//! indices of the units inside it. The index is rebuilt once per tick and
//! is read-only for every later stage, which also caches each unit's
//! neighbour list here.

use crate::components::{Unit, UnitStore};
use crate::config::{GridConfig, SimConfig};
use bevy_ecs::prelude::*;
use glam::Vec2;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Grid-based spatial index over the unit array.
#[derive(Resource, Debug)]
pub struct SpatialIndex {
    grid: GridConfig,
    inv_cell_size: f32,
    /// Unit indices per cell, flat by hash key.
    cells: Vec<Vec<usize>>,
    /// Cell hash of every unit, by unit index.
    unit_cells: Vec<usize>,
    /// Sorted neighbour indices of every unit, excluding itself.
    neighbors: Vec<Vec<usize>>,
}

impl Default for SpatialIndex {
    fn default() -> Self {
        Self::new(GridConfig::default())
    }
}

impl SpatialIndex {
    pub fn new(grid: GridConfig) -> Self {
        let cell_count = grid.rows as usize * grid.columns as usize;
        Self {
            grid,
            inv_cell_size: 1.0 / grid.cell_size,
            cells: vec![Vec::new(); cell_count],
            unit_cells: Vec::new(),
            neighbors: Vec::new(),
        }
    }

    pub fn grid(&self) -> &GridConfig {
        &self.grid
    }

    /// Convert world coordinates to a (row, col) cell, clamped into the grid.
    #[inline]
    pub fn world_to_cell(&self, pos: Vec2) -> (u32, u32) {
        let local = (pos - self.grid.origin) * self.inv_cell_size;
        // NaN saturates to 0 in `as` casts; that is an in-bounds cell.
        let col = (local.x.floor() as i64).clamp(0, self.grid.columns as i64 - 1);
        let row = (local.y.floor() as i64).clamp(0, self.grid.rows as i64 - 1);
        (row as u32, col as u32)
    }

    /// Flat hash key of a cell.
    #[inline]
    pub fn cell_hash(&self, row: u32, col: u32) -> usize {
        row as usize * self.grid.columns as usize + col as usize
    }

    /// Number of rings a unit queries: one when at rest, otherwise enough
    /// to cover everything reachable within its planning horizon.
    #[inline]
    pub fn ring_count(&self, unit: &Unit) -> u32 {
        if unit.resolved {
            1
        } else {
            ((unit.reach() * self.inv_cell_size).ceil() as u32).max(1)
        }
    }

    /// Ring count covering a plain world-space radius.
    #[inline]
    pub fn rings_for_radius(&self, radius: f32) -> u32 {
        ((radius.max(0.0) * self.inv_cell_size).ceil() as u32).max(1)
    }

    /// Rebuild cells and neighbour lists from the current positions.
    pub fn rebuild(&mut self, units: &[Unit]) {
        for cell in &mut self.cells {
            cell.clear();
        }
        self.unit_cells.clear();
        for (idx, unit) in units.iter().enumerate() {
            let (row, col) = self.world_to_cell(unit.position);
            let hash = self.cell_hash(row, col);
            self.cells[hash].push(idx);
            self.unit_cells.push(hash);
        }

        #[cfg(feature = "parallel")]
        let neighbors: Vec<Vec<usize>> = (0..units.len())
            .into_par_iter()
            .map(|idx| self.query_rings(units[idx].position, self.ring_count(&units[idx]), Some(idx)))
            .collect();

        #[cfg(not(feature = "parallel"))]
        let neighbors: Vec<Vec<usize>> = (0..units.len())
            .map(|idx| self.query_rings(units[idx].position, self.ring_count(&units[idx]), Some(idx)))
            .collect();

        self.neighbors = neighbors;
    }

    /// All unit indices in the cells within `rings` of the cell holding
    /// `pos`, sorted, optionally excluding one index. Cells outside the
    /// grid are skipped.
    pub fn query_rings(&self, pos: Vec2, rings: u32, exclude: Option<usize>) -> Vec<usize> {
        let (row, col) = self.world_to_cell(pos);
        let rings = rings as i64;
        let row_lo = (row as i64 - rings).max(0) as u32;
        let row_hi = (row as i64 + rings).min(self.grid.rows as i64 - 1) as u32;
        let col_lo = (col as i64 - rings).max(0) as u32;
        let col_hi = (col as i64 + rings).min(self.grid.columns as i64 - 1) as u32;

        let mut result = Vec::new();
        for r in row_lo..=row_hi {
            for c in col_lo..=col_hi {
                for &idx in &self.cells[self.cell_hash(r, c)] {
                    if Some(idx) != exclude {
                        result.push(idx);
                    }
                }
            }
        }
        // Cells are disjoint, so sorting alone yields a deduplicated list.
        result.sort_unstable();
        result
    }

    /// Cached neighbour list of a unit (empty for unknown indices).
    #[inline]
    pub fn neighbors(&self, idx: usize) -> &[usize] {
        self.neighbors.get(idx).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether `other` appears in the neighbour list of `idx`.
    #[inline]
    pub fn are_neighbors(&self, idx: usize, other: usize) -> bool {
        self.neighbors(idx).binary_search(&other).is_ok()
    }

    /// Cell hash a unit was binned into during the last rebuild.
    pub fn cell_of_unit(&self, idx: usize) -> Option<usize> {
        self.unit_cells.get(idx).copied()
    }

    /// Number of units in a cell.
    pub fn cell_count(&self, hash: usize) -> usize {
        self.cells.get(hash).map(|c| c.len()).unwrap_or(0)
    }

    /// Number of units indexed by the last rebuild.
    pub fn total_count(&self) -> usize {
        self.unit_cells.len()
    }
}

/// System that rebuilds the spatial index each tick.
pub fn spatial_index_system(
    config: Res<SimConfig>,
    units: Res<UnitStore>,
    mut index: ResMut<SpatialIndex>,
) {
    if index.grid != config.grid {
        *index = SpatialIndex::new(config.grid);
    }
    index.rebuild(units.as_slice());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{UnitConfig, UnitId};

    fn grid() -> GridConfig {
        GridConfig {
            origin: Vec2::new(-20.0, -20.0),
            cell_size: 2.0,
            rows: 20,
            columns: 20,
        }
    }

    fn idle_unit(id: u32, x: f32, y: f32) -> Unit {
        Unit::new(
            UnitId(id),
            &UnitConfig {
                position: Vec2::new(x, y),
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_world_to_cell_and_hash() {
        let index = SpatialIndex::new(grid());
        assert_eq!(index.world_to_cell(Vec2::new(-20.0, -20.0)), (0, 0));
        assert_eq!(index.world_to_cell(Vec2::new(-17.5, -19.0)), (0, 1));
        assert_eq!(index.world_to_cell(Vec2::new(1.0, 3.0)), (11, 10));
        assert_eq!(index.cell_hash(11, 10), 11 * 20 + 10);
    }

    #[test]
    fn test_out_of_bounds_positions_are_clamped() {
        let index = SpatialIndex::new(grid());
        assert_eq!(index.world_to_cell(Vec2::new(-1000.0, 1000.0)), (19, 0));
        assert_eq!(index.world_to_cell(Vec2::new(f32::NAN, 5.0)).1, 0);

        let mut index = SpatialIndex::new(grid());
        let units = vec![idle_unit(0, 500.0, 500.0), idle_unit(1, 19.0, 19.0)];
        index.rebuild(&units);
        assert_eq!(index.cell_of_unit(0), index.cell_of_unit(1));
        assert_eq!(index.neighbors(0), &[1]);
    }

    #[test]
    fn test_resolved_units_query_one_ring() {
        let mut index = SpatialIndex::new(grid());
        let units = vec![
            idle_unit(0, 0.5, 0.5),
            idle_unit(1, 2.5, 0.5), // adjacent cell
            idle_unit(2, 6.5, 0.5), // three cells away
        ];
        index.rebuild(&units);
        assert_eq!(index.neighbors(0), &[1]);
        assert_eq!(index.neighbors(1), &[0]);
        assert!(index.neighbors(2).is_empty());
    }

    #[test]
    fn test_moving_units_query_their_reach() {
        let mut index = SpatialIndex::new(grid());
        let mut mover = idle_unit(0, 0.5, 0.5);
        mover.resolved = false;
        mover.max_speed = 4.0;
        mover.time_horizon = 1.0;
        // reach = 0.5 + 4.0 = 4.5 -> 3 rings of 2.0
        assert_eq!(index.ring_count(&mover), 3);

        let units = vec![mover, idle_unit(1, 6.5, 0.5), idle_unit(2, 8.5, 0.5)];
        index.rebuild(&units);
        assert_eq!(index.neighbors(0), &[1]);
        // Asymmetric: the idle unit only looks one ring out.
        assert!(!index.are_neighbors(1, 0));
    }

    #[test]
    fn test_query_excludes_self_and_is_sorted() {
        let mut index = SpatialIndex::new(grid());
        let units: Vec<Unit> = (0..6).map(|i| idle_unit(i, (i % 2) as f32, (i / 2) as f32)).collect();
        index.rebuild(&units);
        let nbrs = index.neighbors(3);
        assert!(!nbrs.contains(&3));
        assert!(nbrs.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(nbrs.len(), 5);
        assert_eq!(index.total_count(), 6);
    }

    #[test]
    fn test_system_rebuilds_from_store() {
        let mut world = World::new();
        world.insert_resource(SimConfig::default());
        world.insert_resource(SpatialIndex::default());
        let mut store = UnitStore::new();
        store.spawn(&UnitConfig::default());
        store.spawn(&UnitConfig {
            position: Vec2::new(1.0, 0.0),
            ..Default::default()
        });
        world.insert_resource(store);

        let mut schedule = Schedule::default();
        schedule.add_systems(spatial_index_system);
        schedule.run(&mut world);

        let index = world.resource::<SpatialIndex>();
        assert_eq!(index.total_count(), 2);
        assert_eq!(index.neighbors(0), &[1]);
    }
}
