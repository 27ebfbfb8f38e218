//! A fixed-extent uniform grid over agent positions, rebuilt from scratch every tick
//! and used for local density/neighbour queries between agents.
//!
//! A static grid causes agents sitting near a cell boundary to flicker between
//! neighbour-query results frame to frame; a slowly-varying low-discrepancy offset
//! drawn from the Halton(2,3) sequence smooths this without the cost of a dynamic or
//! hierarchical structure. The offset is applied identically to insert and query
//! coordinates so both stay consistent within a tick.
//!

use bevy::prelude::*;

/// Length of a square agent-grid cell side
pub const AGENT_CELL_SIZE: f32 = 8.0;
/// Number of cells along each axis of the agent grid
pub const AGENT_GRID_DIMENSION: usize = 128;
/// Upper bound on agents stored per cell; insertions beyond this are silently dropped
/// to keep memory bounded with no dynamic growth
pub const AGENT_CELL_CAPACITY: usize = 15;

/// World length covered by the grid along each axis, centred on the origin
const GRID_EXTENT: f32 = AGENT_CELL_SIZE * AGENT_GRID_DIMENSION as f32;

/// Per-frame rebuilt uniform hash grid of agent indices. Owned exclusively by the
/// navigation plugin; no external mutation
#[derive(Component, Clone)]
pub struct AgentSpatialGrid {
	/// Number of live entries per cell, row-major
	counts: Vec<u8>,
	/// Fixed-capacity agent index slots per cell, row-major
	slots: Vec<u32>,
	/// Frame counter indexing the Halton sequence; part of replayed state for
	/// cross-run reproducibility
	frame: u32,
	/// Jitter offset of the current frame, applied to all insert/query coordinates
	jitter: Vec2,
}

impl Default for AgentSpatialGrid {
	fn default() -> Self {
		AgentSpatialGrid {
			counts: vec![0; AGENT_GRID_DIMENSION * AGENT_GRID_DIMENSION],
			slots: vec![0; AGENT_GRID_DIMENSION * AGENT_GRID_DIMENSION * AGENT_CELL_CAPACITY],
			frame: 0,
			jitter: Vec2::ZERO,
		}
	}
}

impl AgentSpatialGrid {
	/// Frame counter indexing the Halton jitter sequence
	pub fn get_frame(&self) -> u32 {
		self.frame
	}
	/// Restore the frame counter, for deterministic replay
	pub fn set_frame(&mut self, frame: u32) {
		self.frame = frame;
	}
	/// Jitter offset of the current frame; each component never exceeds half a cell
	pub fn get_jitter(&self) -> Vec2 {
		self.jitter
	}
	/// Clear every cell, draw the next frame's jitter and insert every agent's jittered
	/// position into its cell. Agents outside the fixed world extent and agents landing
	/// in a full cell are dropped
	pub fn clear_and_reindex(&mut self, agents: impl Iterator<Item = (u32, Vec2)>) {
		self.frame = self.frame.wrapping_add(1);
		self.jitter = Vec2::new(
			(halton(self.frame, 2) - 0.5) * AGENT_CELL_SIZE,
			(halton(self.frame, 3) - 0.5) * AGENT_CELL_SIZE,
		);
		self.counts.fill(0);
		for (agent, position) in agents {
			let cell = self.get_cell_index(position);
			if cell < 0 {
				continue;
			}
			let cell = cell as usize;
			let count = self.counts[cell] as usize;
			if count >= AGENT_CELL_CAPACITY {
				continue;
			}
			self.slots[cell * AGENT_CELL_CAPACITY + count] = agent;
			self.counts[cell] = (count + 1) as u8;
		}
	}
	/// The cell index of a point after applying the current frame's jitter, `-1` if the
	/// point lies outside the fixed world extent
	pub fn get_cell_index(&self, point: Vec2) -> i32 {
		let local = point + self.jitter + Vec2::splat(GRID_EXTENT * 0.5);
		if local.x < 0.0 || local.y < 0.0 {
			return -1;
		}
		let column = (local.x / AGENT_CELL_SIZE) as usize;
		let row = (local.y / AGENT_CELL_SIZE) as usize;
		if column >= AGENT_GRID_DIMENSION || row >= AGENT_GRID_DIMENSION {
			return -1;
		}
		(row * AGENT_GRID_DIMENSION + column) as i32
	}
	/// The agent indices stored in a cell returned by
	/// [AgentSpatialGrid::get_cell_index]
	pub fn get_cell_agents(&self, cell: i32) -> &[u32] {
		if cell < 0 || cell as usize >= self.counts.len() {
			return &[];
		}
		let cell = cell as usize;
		let count = self.counts[cell] as usize;
		&self.slots[cell * AGENT_CELL_CAPACITY..cell * AGENT_CELL_CAPACITY + count]
	}
	/// All agent indices in the 3x3 block of cells around a point, the local density
	/// query primitive offered to callers
	pub fn agents_around(&self, point: Vec2) -> Vec<u32> {
		let mut found = Vec::new();
		for row in -1..=1 {
			for column in -1..=1 {
				let offset = Vec2::new(column as f32, row as f32) * AGENT_CELL_SIZE;
				let cell = self.get_cell_index(point + offset);
				found.extend_from_slice(self.get_cell_agents(cell));
			}
		}
		found
	}
}

/// The `index`th member of the Halton low-discrepancy sequence for a prime `base`,
/// in `[0, 1)`
pub fn halton(index: u32, base: u32) -> f32 {
	let mut result = 0.0;
	let mut fraction = 1.0;
	let mut remaining = index;
	while remaining > 0 {
		fraction /= base as f32;
		result += fraction * (remaining % base) as f32;
		remaining /= base;
	}
	result
}

// #[rustfmt::skip]
#[cfg(test)]
mod tests {
	use super::*;
	#[test]
	fn halton_base_two_prefix() {
		assert_eq!(0.5, halton(1, 2));
		assert_eq!(0.25, halton(2, 2));
		assert_eq!(0.75, halton(3, 2));
		assert_eq!(0.125, halton(4, 2));
	}
	#[test]
	fn halton_stays_in_unit_interval() {
		for index in 0..10_000 {
			let result = halton(index, 2);
			assert!((0.0..1.0).contains(&result));
			let result = halton(index, 3);
			assert!((0.0..1.0).contains(&result));
		}
	}
	#[test]
	fn jitter_never_exceeds_half_a_cell() {
		let mut grid = AgentSpatialGrid::default();
		for _ in 0..1_000 {
			grid.clear_and_reindex(std::iter::empty());
			let jitter = grid.get_jitter();
			assert!(jitter.x.abs() <= AGENT_CELL_SIZE * 0.5);
			assert!(jitter.y.abs() <= AGENT_CELL_SIZE * 0.5);
		}
	}
	#[test]
	fn reindex_places_agents_in_cells() {
		let mut grid = AgentSpatialGrid::default();
		let positions = vec![(0u32, Vec2::new(0.0, 0.0)), (1u32, Vec2::new(1.0, 1.0))];
		grid.clear_and_reindex(positions.into_iter());
		let cell = grid.get_cell_index(Vec2::new(0.0, 0.0));
		assert!(cell >= 0);
		let result = grid.agents_around(Vec2::new(0.0, 0.0));
		assert!(result.contains(&0));
		assert!(result.contains(&1));
	}
	#[test]
	fn out_of_extent_point_has_no_cell() {
		let grid = AgentSpatialGrid::default();
		let result = grid.get_cell_index(Vec2::new(GRID_EXTENT, GRID_EXTENT));
		assert_eq!(-1, result);
	}
	#[test]
	fn full_cell_drops_insertions() {
		let mut grid = AgentSpatialGrid::default();
		let crowd: Vec<(u32, Vec2)> = (0..AGENT_CELL_CAPACITY as u32 + 5)
			.map(|agent| (agent, Vec2::new(0.1, 0.1)))
			.collect();
		grid.clear_and_reindex(crowd.into_iter());
		let cell = grid.get_cell_index(Vec2::new(0.1, 0.1));
		let result = grid.get_cell_agents(cell);
		assert_eq!(AGENT_CELL_CAPACITY, result.len());
	}
	#[test]
	fn reindex_clears_previous_frame() {
		let mut grid = AgentSpatialGrid::default();
		grid.clear_and_reindex(vec![(0u32, Vec2::ZERO)].into_iter());
		grid.clear_and_reindex(std::iter::empty());
		let result = grid.agents_around(Vec2::ZERO);
		assert!(result.is_empty());
	}
}
