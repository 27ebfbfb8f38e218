//! A decaying per-agent scalar estimating path-following health.
//!
//! The rating passively grows every tick an agent holds a steering corner, faster for
//! slow or stalled agents, and is paid down by measurable progress: closing distance to
//! the corner and consuming corridor entries. Exponential decay keeps old trouble from
//! lingering forever. The rating is read-only output to the caller; nothing in this
//! crate acts on a high rating beyond exposing the value.
//!

use crate::prelude::*;

/// Base rate at which the rating accumulates per second while a corner is held
const PASSIVE_RATE: f32 = 1.0;
/// Passive accumulation multiplier for an agent moving at full speed
const FAST_MULTIPLIER: f32 = 0.2;
/// Passive accumulation multiplier for a stalled agent
const SLOW_MULTIPLIER: f32 = 1.0;
/// Credit granted per unit of distance-closing rate towards the corner
const PROGRESS_CREDIT: f32 = 0.5;
/// Credit granted per corridor entry consumed by forward progress
const CORRIDOR_CREDIT: f32 = 0.25;
/// Exponential decay rate of the rating per second
const DECAY_RATE: f32 = 0.1;

/// Run the stuck/frustration scorer for one agent over one tick of `delta` seconds.
/// Skipped entirely when no time has elapsed
pub fn update_stuck_rating(agent: &mut Agent, delta: f32) {
	if delta <= 0.0 {
		return;
	}
	// a fresh destination invalidates every baseline
	if agent.end_target != agent.last_end_target {
		agent.stuck_rating = 0.0;
		agent.min_corridor_length = agent.corridor.len();
		agent.last_distance_to_next_corner = f32::INFINITY;
		agent.last_next_corner_triangle = -1;
		agent.last_end_target = agent.end_target;
		return;
	}
	if agent.num_valid_corners > 0 {
		let speed_fraction = if agent.params.max_speed > f32::EPSILON {
			(agent.velocity.length() / agent.params.max_speed).clamp(0.0, 1.0)
		} else {
			0.0
		};
		// cubic ease between the stalled and full-speed multipliers
		let ease = speed_fraction * speed_fraction * (3.0 - 2.0 * speed_fraction);
		let multiplier = SLOW_MULTIPLIER + (FAST_MULTIPLIER - SLOW_MULTIPLIER) * ease;
		agent.stuck_rating += PASSIVE_RATE * multiplier * delta;
		// reaching a new corner resets the distance baseline
		if agent.last_next_corner_triangle != agent.next_corner_triangle {
			agent.last_next_corner_triangle = agent.next_corner_triangle;
			agent.last_distance_to_next_corner = f32::INFINITY;
		}
		let distance = agent.position.distance(agent.next_corner);
		if distance < agent.last_distance_to_next_corner {
			if agent.last_distance_to_next_corner.is_finite() {
				let closing_rate = (agent.last_distance_to_next_corner - distance) / delta;
				let weight = (agent.params.intelligence * agent.params.max_speed).max(f32::EPSILON);
				agent.stuck_rating -= PROGRESS_CREDIT * closing_rate / weight;
			}
			agent.last_distance_to_next_corner = distance;
		}
	}
	// forward progress consumed corridor entries
	if agent.corridor.len() < agent.min_corridor_length {
		let shrink = agent.min_corridor_length - agent.corridor.len();
		agent.stuck_rating -= CORRIDOR_CREDIT * shrink as f32;
		agent.min_corridor_length = agent.corridor.len();
	}
	agent.stuck_rating *= (-DECAY_RATE * delta).exp();
	agent.stuck_rating = agent.stuck_rating.max(0.0);
}
