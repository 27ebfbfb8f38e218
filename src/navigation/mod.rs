//! Navigation over a triangulated walkable surface for a crowd of independent agents.
//!
//! Every simulation tick the plugin answers, for each agent: "which way do I walk next,
//! and what do I do when I fall off the walkable surface or my planned route becomes
//! invalid?"
//!
//! Definitions:
//!
//! * Navmesh - an immutable triangulation: vertex positions, triangle vertex indices and
//!   triangle-triangle adjacency (one neighbour per edge, `-1` for a boundary edge)
//! * Corridor - an ordered sequence of edge-adjacent triangles connecting a start and end
//!   location, truncated from the front as an agent makes progress along it
//! * Corner - a steering point pulled out of a corridor by the funnel algorithm, offset
//!   inward from the corridor's shared edges so agents don't clip geometry
//! * Demarcation line - the line through the two upcoming corners; an agent crossing it
//!   has effectively passed its corner and needs a fresh pair
//! * Frustration - a per-agent counter of consecutive ticks where the agent's actual
//!   triangle diverges from its planned corridor, driving re-path recovery
//!
//! The walkable triangulation is consumed, not produced, here - building it belongs to an
//! external loader.
//!

pub mod agent;
pub mod agent_grid;
pub mod navmesh;
pub mod pathing;
pub mod steering;
pub mod stuck;
pub mod triangle_index;

/// Distance that steering corners are pulled inward from corridor edges so that agents
/// cutting a corner do not clip the geometry on the far side of the edge
pub const CORNER_OFFSET: f32 = 0.5;
/// How many leading entries of a corridor are searched when checking whether an agent's
/// current triangle still lies on its planned route
pub const CORRIDOR_MATCH_WINDOW: usize = 5;
/// Bounded attempts used by rejection sampling when picking a random triangle
pub const RANDOM_SAMPLE_ATTEMPTS: usize = 10;
/// Squared distance below which a steering target is considered to be on top of the
/// agent and no look direction is derived from it
pub const LOOK_EPSILON_SQ: f32 = 0.01;
