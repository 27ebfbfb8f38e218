//! The component bundle of a loaded level: the navmesh, its triangle index, the agent
//! grid, the pathfinding collaborator and the destination-sampling RNG
//!

use crate::prelude::*;
use bevy::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Seedable random source used for destination sampling; part of replayed state for
/// cross-run reproducibility
#[derive(Component)]
pub struct NavigationRng(StdRng);

impl Default for NavigationRng {
	fn default() -> Self {
		NavigationRng(StdRng::seed_from_u64(0))
	}
}

impl NavigationRng {
	/// Create a new instance of [NavigationRng] from a seed
	pub fn new(seed: u64) -> Self {
		NavigationRng(StdRng::seed_from_u64(seed))
	}
	/// Get mutable access to the generator
	pub fn get_mut(&mut self) -> &mut StdRng {
		&mut self.0
	}
}

/// Everything one loaded level needs for navigation, spawned as a single entity the
/// per-tick systems query
#[derive(Bundle)]
pub struct NavigationBundle {
	/// The walkable triangulation
	navmesh: Navmesh,
	/// Point-location and random-sampling index over the triangulation
	triangle_index: TriangleSpatialIndex,
	/// Per-tick rebuilt uniform grid of agent positions
	agent_grid: AgentSpatialGrid,
	/// Corridor and corner pathfinding collaborator
	pathing: PathingProvider,
	/// Seeded random source for destination sampling
	rng: NavigationRng,
}

impl NavigationBundle {
	/// Create a new instance of [NavigationBundle] around a loaded [Navmesh], building
	/// the triangle index from it
	pub fn new(navmesh: Navmesh, seed: u64) -> Self {
		let triangle_index = TriangleSpatialIndex::new(&navmesh);
		NavigationBundle {
			navmesh,
			triangle_index,
			agent_grid: AgentSpatialGrid::default(),
			pathing: PathingProvider::default(),
			rng: NavigationRng::new(seed),
		}
	}
	/// Create a new instance of [NavigationBundle] where the [Navmesh] is derived from
	/// disk
	#[cfg(feature = "ron")]
	pub fn new_from_disk(path: &str, seed: u64) -> Self {
		let navmesh = Navmesh::from_file(path.to_string());
		NavigationBundle::new(navmesh, seed)
	}
	/// Create a new instance of [NavigationBundle] with a host-supplied pathfinding
	/// collaborator in place of the bundled one
	pub fn with_pathing(navmesh: Navmesh, seed: u64, pathing: PathingProvider) -> Self {
		let mut bundle = NavigationBundle::new(navmesh, seed);
		bundle.pathing = pathing;
		bundle
	}
}
