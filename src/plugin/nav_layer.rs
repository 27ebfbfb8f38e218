//! The per-tick navigation systems: point-location, state machine advancement, agent
//! grid rebuild and stuck scoring.
//!
//! Each pass is a single sweep over all agents. Cross-agent reads only happen through
//! the read-only [TriangleSpatialIndex] and the rebuilt-then-frozen [AgentSpatialGrid],
//! so agents never contend over each other's navigation fields within a tick.
//!

use crate::prelude::*;
use bevy::prelude::*;

/// Resolve every agent's containing triangle via point-location, starting from its
/// last known triangle, and refresh the last known on-mesh placement for agents still
/// on the mesh
#[cfg(not(tarpaulin_include))]
pub fn locate_agents(
	nav_q: Query<(&Navmesh, &TriangleSpatialIndex)>,
	mut agent_q: Query<&mut Agent>,
) {
	for (navmesh, index) in &nav_q {
		for mut agent in &mut agent_q {
			agent.current_triangle =
				index.is_point_in_navmesh(navmesh, agent.position, agent.current_triangle);
			if agent.current_triangle != -1 {
				agent.last_valid_position = agent.position;
				agent.last_valid_triangle = agent.current_triangle;
			}
		}
	}
}

/// Advance every agent's navigation state machine by one tick and record its position
/// for next tick's demarcation-line test
#[cfg(not(tarpaulin_include))]
pub fn steer_agents(
	mut nav_q: Query<(
		&Navmesh,
		&TriangleSpatialIndex,
		&PathingProvider,
		&mut NavigationRng,
	)>,
	mut agent_q: Query<&mut Agent>,
) {
	for (navmesh, index, pathing, mut rng) in &mut nav_q {
		for mut agent in &mut agent_q {
			advance_agent(&mut agent, navmesh, index, pathing.get(), rng.get_mut());
			agent.last_position = agent.position;
		}
	}
}

/// Clear the agent grid and reinsert every agent under a fresh Halton jitter
#[cfg(not(tarpaulin_include))]
pub fn reindex_agent_grid(
	mut grid_q: Query<&mut AgentSpatialGrid>,
	agent_q: Query<(Entity, &Agent)>,
) {
	for mut grid in &mut grid_q {
		grid.clear_and_reindex(
			agent_q
				.iter()
				.map(|(entity, agent)| (entity.index(), agent.position)),
		);
	}
}

/// Run the stuck/frustration scorer once per agent over the tick's elapsed time
#[cfg(not(tarpaulin_include))]
pub fn score_agents(time: Res<Time>, mut agent_q: Query<&mut Agent>) {
	let delta = time.delta_secs();
	for mut agent in &mut agent_q {
		update_stuck_rating(&mut agent, delta);
	}
}
