//! The per-agent navigation state machine: seeking a destination while Standing,
//! following a corridor while Traveling, and recovering from falling off-mesh while
//! Escaping.
//!
//! One call to [advance_agent] advances one agent by one simulation tick. The agent's
//! `current_triangle` is expected to have been resolved beforehand by point-location
//! against the [TriangleSpatialIndex]. All failures here are non-fatal: they are logged
//! and the simulation continues advancing every other agent regardless.
//!

use bevy::prelude::*;
use rand::Rng;

use crate::prelude::*;

/// Squared distance/speed below which an unarrived agent with a single corner is
/// considered wedged for the stuck diagnostic log
const STALL_EPSILON_SQ: f32 = 1e-4;

/// Advance one agent by one tick: consult its current triangle and state, perform
/// corridor/corner updates as needed and refresh its steering target and look direction
pub fn advance_agent(
	agent: &mut Agent,
	navmesh: &Navmesh,
	index: &TriangleSpatialIndex,
	pathing: &(dyn CorridorSearch + Send + Sync),
	rng: &mut impl Rng,
) {
	match agent.state {
		AgentState::Standing => update_standing(agent, navmesh, index, pathing, rng),
		AgentState::Traveling => update_traveling(agent, navmesh, pathing),
		AgentState::Escaping => update_escaping(agent, navmesh, pathing),
	}
	// face the steering target once transitions have settled
	if agent.state != AgentState::Standing
		&& agent.position.distance_squared(agent.next_corner) > LOOK_EPSILON_SQ
	{
		agent.look = (agent.next_corner - agent.position).normalize();
	}
}

/// While Standing and on the mesh, sample a destination triangle and request a corridor
/// towards its centroid. On success the agent begins Traveling; on corridor or corner
/// failure it remains Standing and retries next tick
fn update_standing(
	agent: &mut Agent,
	navmesh: &Navmesh,
	index: &TriangleSpatialIndex,
	pathing: &(dyn CorridorSearch + Send + Sync),
	rng: &mut impl Rng,
) {
	if agent.current_triangle == -1 {
		return;
	}
	let destination = index.random_triangle(navmesh, rng);
	if destination < 0 {
		return;
	}
	begin_travel(agent, navmesh, pathing, destination);
}

/// Target the centroid of `destination` and request a corridor plus corners for it.
/// Returns whether the agent transitioned to Traveling
pub fn begin_travel(
	agent: &mut Agent,
	navmesh: &Navmesh,
	pathing: &(dyn CorridorSearch + Send + Sync),
	destination: i32,
) -> bool {
	agent.end_target = navmesh.get_centroid(destination as usize);
	agent.end_target_triangle = destination;
	if request_path(
		agent,
		navmesh,
		pathing,
		agent.position,
		agent.current_triangle,
	) {
		agent.path_frustration = 0.0;
		agent.state = AgentState::Traveling;
		true
	} else {
		false
	}
}

/// Ask the pathfinder for a corridor from `from`/`from_triangle` to the agent's
/// destination and extract fresh corners for it, copying the results into the agent on
/// success. Corridor and corner failures are logged and leave the agent untouched
fn request_path(
	agent: &mut Agent,
	navmesh: &Navmesh,
	pathing: &(dyn CorridorSearch + Send + Sync),
	from: Vec2,
	from_triangle: i32,
) -> bool {
	let Some(corridor) = pathing.find_corridor(
		navmesh,
		from,
		from_triangle,
		agent.end_target,
		agent.end_target_triangle,
	) else {
		error!(
			"No corridor from triangle {} to destination triangle {}",
			from_triangle, agent.end_target_triangle
		);
		return false;
	};
	if corridor.is_empty() {
		error!(
			"Empty corridor from triangle {} to destination triangle {}",
			from_triangle, agent.end_target_triangle
		);
		return false;
	}
	let corners = pathing.next_corners(navmesh, &corridor, from, agent.end_target, CORNER_OFFSET);
	if corners.num_valid == 0 {
		error!(
			"Corner resolution failed over a corridor of {} triangles",
			corridor.len()
		);
		return false;
	}
	agent.corridor = corridor;
	apply_corners(agent, corners);
	true
}

/// Copy a corner query result into the agent's steering fields
fn apply_corners(agent: &mut Agent, corners: CornerResult) {
	agent.num_valid_corners = corners.num_valid;
	agent.next_corner = corners.corner;
	agent.next_corner_triangle = corners.corner_triangle;
	agent.next_corner2 = corners.corner2;
	agent.next_corner2_triangle = corners.corner2_triangle;
}

/// One Traveling tick: escape when off-mesh, reconcile the corridor against the current
/// triangle (frustration-driven re-path recovery), advance corners and detect arrival
fn update_traveling(
	agent: &mut Agent,
	navmesh: &Navmesh,
	pathing: &(dyn CorridorSearch + Send + Sync),
) {
	// fell off the walkable surface; remember the corner being steered at and head back
	// to the last known on-mesh placement
	if agent.current_triangle == -1 {
		agent.pre_escape_corner = agent.next_corner;
		agent.pre_escape_corner_triangle = agent.next_corner_triangle;
		agent.next_corner = agent.last_valid_position;
		agent.next_corner_triangle = agent.last_valid_triangle;
		agent.num_valid_corners = 1;
		agent.state = AgentState::Escaping;
		return;
	}
	reconcile_corridor(agent, navmesh, pathing);
	advance_corners(agent, navmesh, pathing);
	// arrival: one corner left means it is the destination itself
	if agent.num_valid_corners == 1
		&& agent.position.distance_squared(agent.end_target) < agent.params.arrival_threshold_sq
	{
		agent.state = AgentState::Standing;
		agent.corridor.clear();
		agent.num_valid_corners = 0;
		return;
	}
	if agent.num_valid_corners == 1
		&& agent.position.distance_squared(agent.next_corner) < STALL_EPSILON_SQ
		&& agent.velocity.length_squared() < STALL_EPSILON_SQ
	{
		// diagnostic only, recovery is driven by the frustration counter
		warn!(
			"Agent wedged on its final corner short of arrival at {:?}",
			agent.end_target
		);
	}
}

/// Check whether the current triangle appears within the leading window of the
/// corridor. Present: reset frustration and truncate consumed progress. Absent: grow
/// frustration, and past the threshold attempt one re-path, falling back to a raycast
/// shortcut straight at the destination
fn reconcile_corridor(
	agent: &mut Agent,
	navmesh: &Navmesh,
	pathing: &(dyn CorridorSearch + Send + Sync),
) {
	let window = agent.corridor.len().min(CORRIDOR_MATCH_WINDOW);
	let found = agent.corridor[..window]
		.iter()
		.position(|t| *t == agent.current_triangle);
	match found {
		Some(index) => {
			agent.path_frustration = 0.0;
			// truncation only ever removes a prefix, never reorders
			if index > 0 {
				agent.corridor.drain(..index);
			}
		}
		None => {
			agent.path_frustration += 1.0;
			if agent.path_frustration > agent.params.max_frustration {
				// one active recovery attempt per threshold crossing
				agent.path_frustration = 0.0;
				if request_path(agent, navmesh, pathing, agent.position, agent.current_triangle) {
					return;
				}
				let shortcut = navmesh.raycast(agent.position, agent.end_target, agent.current_triangle);
				if !shortcut.hit {
					agent.next_corner = agent.end_target;
					agent.next_corner_triangle = agent.end_target_triangle;
					agent.num_valid_corners = 1;
				} else {
					error!(
						"Re-path and raycast shortcut both failed from triangle {} to {:?}",
						agent.current_triangle, agent.end_target
					);
				}
			}
		}
	}
}

/// Refresh the corner pair when the agent has closed within [CORNER_OFFSET] of its
/// corner or its movement segment crossed the demarcation line between the two corners
fn advance_corners(
	agent: &mut Agent,
	navmesh: &Navmesh,
	pathing: &(dyn CorridorSearch + Send + Sync),
) {
	if agent.num_valid_corners == 0 {
		return;
	}
	let distance_sq = agent.position.distance_squared(agent.next_corner);
	let mut crossed = false;
	if agent.num_valid_corners == 2 {
		// strict sign-change test so exact alignment counts as crossed
		let direction = agent.next_corner - agent.next_corner2;
		let side_now = direction.perp_dot(agent.position - agent.next_corner2);
		let side_before = direction.perp_dot(agent.last_position - agent.next_corner2);
		crossed = side_now * side_before <= 0.0;
	}
	if distance_sq < CORNER_OFFSET * CORNER_OFFSET || crossed {
		let corners = pathing.next_corners(
			navmesh,
			&agent.corridor,
			agent.position,
			agent.end_target,
			CORNER_OFFSET,
		);
		if corners.num_valid == 0 {
			// steering target left unchanged, the agent stalls until the next
			// successful corridor query
			error!(
				"Corner refresh failed over a corridor of {} triangles",
				agent.corridor.len()
			);
			return;
		}
		apply_corners(agent, corners);
	}
}

/// One Escaping tick: once back on the mesh, try to resume the corner saved when the
/// agent fell off; blocked or absent, re-path to the destination
fn update_escaping(
	agent: &mut Agent,
	navmesh: &Navmesh,
	pathing: &(dyn CorridorSearch + Send + Sync),
) {
	if agent.current_triangle == -1 {
		return;
	}
	agent.state = AgentState::Traveling;
	if agent.pre_escape_corner_triangle != -1 {
		let sight = navmesh.raycast(agent.position, agent.pre_escape_corner, agent.current_triangle);
		if !sight.hit {
			agent.next_corner = agent.pre_escape_corner;
			agent.next_corner_triangle = agent.pre_escape_corner_triangle;
			agent.num_valid_corners = agent.num_valid_corners.max(1);
			agent.pre_escape_corner_triangle = -1;
			return;
		}
		agent.pre_escape_corner_triangle = -1;
	}
	if !request_path(agent, navmesh, pathing, agent.position, agent.current_triangle) {
		error!(
			"Destination {:?} no longer reachable after escaping at triangle {}",
			agent.end_target, agent.current_triangle
		);
	}
}
