//! Per-agent navigation and physics state.
//!
//! Agent records are created by a spawner external to this crate with an initial
//! position, parameters and a `current_triangle` resolved via point-location, and are
//! destroyed/recycled by the same external owner - this crate only mutates fields,
//! never allocates or frees agent records.
//!
//! Every positional field is an independent [Vec2] value; "set field A to field B" is
//! always a value copy, never a shared reference, which keeps the aliasing bugs of
//! mutable shared position handles impossible by construction.
//!

use bevy::prelude::*;

/// Where an agent sits in the navigation state machine
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Reflect)]
pub enum AgentState {
	/// No active route; the agent will seek a fresh destination when on the mesh
	#[default]
	Standing,
	/// Following a corridor of triangles towards `end_target`
	Traveling,
	/// Fell off the walkable surface; steering back to the last known on-mesh placement
	Escaping,
}

/// Tunable movement and navigation parameters handed over by the spawner
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[derive(Clone, Copy, Debug, Reflect)]
pub struct AgentParameters {
	/// Top walking speed in world units per second
	pub max_speed: f32,
	/// Acceleration towards the steering target
	pub accel: f32,
	/// Velocity damping applied by the host's integrator
	pub resistance: f32,
	/// Scales how much credit per unit of progress the stuck scorer grants
	pub intelligence: f32,
	/// Squared distance to `end_target` below which the agent has arrived
	pub arrival_threshold_sq: f32,
	/// Speed the host should slow to when closing on the destination
	pub arrival_desired_speed: f32,
	/// Consecutive corridor-mismatch ticks tolerated before an active re-path attempt
	pub max_frustration: f32,
}

impl Default for AgentParameters {
	fn default() -> Self {
		AgentParameters {
			max_speed: 1.4,
			accel: 4.0,
			resistance: 0.2,
			intelligence: 1.0,
			arrival_threshold_sq: 0.04,
			arrival_desired_speed: 0.3,
			max_frustration: 3.0,
		}
	}
}

/// One simulated entity's navigation, statistics and parameter fields. Fields are
/// public: renderers and telemetry read them, spawners initialise them, and bulk
/// transfer boundaries may serialise them in struct-of-arrays form for throughput
#[derive(Component, Clone, Reflect)]
pub struct Agent {
	/// Current world position, advanced by the host's integrator
	pub position: Vec2,
	/// Position at the previous tick, used for the demarcation-line crossing test
	pub last_position: Vec2,
	/// Current velocity, advanced by the host's integrator
	pub velocity: Vec2,
	/// Normalised facing direction towards the steering target
	pub look: Vec2,
	/// Ordered triangle path from the current position towards the destination,
	/// truncated from the front as progress is made
	pub corridor: Vec<i32>,
	/// Triangle currently containing the agent, `-1` if off-mesh
	pub current_triangle: i32,
	/// Active steering corner
	pub next_corner: Vec2,
	/// Triangle owning `next_corner`
	pub next_corner_triangle: i32,
	/// Look-ahead corner after `next_corner`
	pub next_corner2: Vec2,
	/// Triangle owning `next_corner2`
	pub next_corner2_triangle: i32,
	/// How many of the corner fields are valid: `0`, `1` or `2`
	pub num_valid_corners: u8,
	/// Steering corner saved at the moment the agent left the mesh
	pub pre_escape_corner: Vec2,
	/// Triangle owning `pre_escape_corner`, `-1` when no corner is saved
	pub pre_escape_corner_triangle: i32,
	/// Most recent known on-mesh position
	pub last_valid_position: Vec2,
	/// Most recent known on-mesh triangle
	pub last_valid_triangle: i32,
	/// Destination position
	pub end_target: Vec2,
	/// Destination triangle
	pub end_target_triangle: i32,
	/// Consecutive-tick counter of corridor mismatches
	pub path_frustration: f32,
	/// Navigation state machine position
	pub state: AgentState,
	/// Decaying estimate of path-following health, maintained by the stuck scorer
	pub stuck_rating: f32,
	/// Visibility score maintained by external perception systems; carried, not written,
	/// by this crate
	pub sight_rating: f32,
	/// Distance to `next_corner` at the previous scorer sample
	pub last_distance_to_next_corner: f32,
	/// Triangle of `next_corner` at the previous scorer sample
	pub last_next_corner_triangle: i32,
	/// Shortest corridor length seen since the destination last changed
	pub min_corridor_length: usize,
	/// Destination at the previous scorer sample, for change detection
	pub last_end_target: Vec2,
	/// Movement and navigation tunables
	pub params: AgentParameters,
}

impl Agent {
	/// Create a new instance of [Agent] at a spawner-chosen position whose containing
	/// triangle has already been resolved via point-location (`-1` if off-mesh)
	pub fn new(position: Vec2, current_triangle: i32, params: AgentParameters) -> Self {
		Agent {
			position,
			last_position: position,
			velocity: Vec2::ZERO,
			look: Vec2::X,
			corridor: Vec::new(),
			current_triangle,
			next_corner: position,
			next_corner_triangle: -1,
			next_corner2: position,
			next_corner2_triangle: -1,
			num_valid_corners: 0,
			pre_escape_corner: position,
			pre_escape_corner_triangle: -1,
			last_valid_position: position,
			last_valid_triangle: current_triangle,
			end_target: position,
			end_target_triangle: -1,
			path_frustration: 0.0,
			state: AgentState::Standing,
			stuck_rating: 0.0,
			sight_rating: 0.0,
			last_distance_to_next_corner: f32::INFINITY,
			last_next_corner_triangle: -1,
			min_corridor_length: 0,
			last_end_target: position,
			params,
		}
	}
}

// #[rustfmt::skip]
#[cfg(test)]
mod tests {
	use super::*;
	#[test]
	fn new_agent_is_standing() {
		let agent = Agent::new(Vec2::new(3.0, 4.0), 7, AgentParameters::default());
		assert_eq!(AgentState::Standing, agent.state);
		assert_eq!(7, agent.current_triangle);
		assert_eq!(7, agent.last_valid_triangle);
		assert_eq!(0, agent.num_valid_corners);
	}
	#[test]
	fn positional_fields_are_value_copies() {
		let mut agent = Agent::new(Vec2::ZERO, 0, AgentParameters::default());
		agent.next_corner = agent.end_target;
		agent.end_target.x = 9.0;
		assert_eq!(0.0, agent.next_corner.x);
	}
}
