//! Defines the Bevy [Plugin] for navmesh steering
//!

use crate::prelude::*;
use bevy::prelude::*;

pub mod nav_layer;

/// Phases of a navigation tick: point-location first, then the state machine, then the
/// rebuild/scoring passes that read the settled navigation fields
#[derive(SystemSet, Debug, Hash, PartialEq, Eq, Clone)]
pub enum OrderingSet {
	/// Resolve every agent's containing triangle
	Locate,
	/// Advance every agent's navigation state machine
	Steer,
	/// Rebuild the agent grid and run the stuck scorer
	Maintain,
}

/// Plugin wiring the per-tick navigation passes into an [App]
pub struct NavSteeringPlugin;

impl Plugin for NavSteeringPlugin {
	#[cfg(not(tarpaulin_include))]
	fn build(&self, app: &mut App) {
		app.register_type::<AgentState>()
			.register_type::<AgentParameters>()
			.register_type::<Agent>()
			.configure_sets(
				Update,
				(
					OrderingSet::Locate,
					OrderingSet::Steer,
					OrderingSet::Maintain,
				)
					.chain(),
			)
			.add_systems(
				Update,
				(
					nav_layer::locate_agents.in_set(OrderingSet::Locate),
					nav_layer::steer_agents.in_set(OrderingSet::Steer),
					(nav_layer::reindex_agent_grid, nav_layer::score_agents)
						.in_set(OrderingSet::Maintain),
				),
			);
	}
}
