//! The corridor and corner contracts consumed by the navigation state machine, plus a
//! reference collaborator implementing them.
//!
//! A corridor is an ordered list of triangle indices connecting a start and end
//! triangle, every consecutive pair adjacent through a shared edge. Corners are the
//! funnel-extracted steering points of a corridor, pulled inward from the corridor's
//! shared edges by an offset so agents cutting a corner do not clip geometry.
//!
//! Hosts with their own pathfinder (width-penalty cost models, hierarchical search)
//! implement [CorridorSearch] and drop it into [PathingProvider]; the bundled
//! [PortalPathing] is a breadth-first search over triangle adjacency with a
//! string-pulling funnel, enough to run the crate stand-alone.
//!

use std::collections::VecDeque;

use bevy::prelude::*;

use crate::prelude::*;

/// Squared distance below which two funnel points are treated as coincident
const FUNNEL_EPSILON_SQ: f32 = 1e-10;

/// Up to two upcoming steering corners extracted from a corridor.
///
/// * `num_valid == 0` - no steering target was resolvable; callers must treat this as
///   an error when the corridor was non-empty
/// * `num_valid == 1` - the only remaining corner is the destination point itself
/// * `num_valid == 2` - a look-ahead corner plus the one after it, enabling smooth
///   cutting of corners without re-querying every tick
#[derive(Clone, Copy, Debug, Default)]
pub struct CornerResult {
	/// How many of the corner fields are valid: `0`, `1` or `2`
	pub num_valid: u8,
	/// First upcoming steering corner
	pub corner: Vec2,
	/// Triangle owning `corner`
	pub corner_triangle: i32,
	/// The corner after `corner`
	pub corner2: Vec2,
	/// Triangle owning `corner2`
	pub corner2_triangle: i32,
}

impl CornerResult {
	/// A [CornerResult] carrying no valid corners
	pub fn none() -> Self {
		CornerResult::default()
	}
}

/// The pathfinding primitive consumed by the navigation state machine: corridor
/// retrieval and funnel corner extraction over a [Navmesh]
pub trait CorridorSearch {
	/// Find an ordered triangle-index sequence from `start_triangle` to `end_triangle`
	/// inclusive, every consecutive pair adjacent through a shared edge, or `None` if no
	/// path exists. Callers treat `None` as a hard pathfinding failure handled by their
	/// own recovery policy; implementations never retry internally
	fn find_corridor(
		&self,
		navmesh: &Navmesh,
		start: Vec2,
		start_triangle: i32,
		end: Vec2,
		end_triangle: i32,
	) -> Option<Vec<i32>>;
	/// Extract up to two upcoming steering corners from `corridor`, pulled inward from
	/// the corridor's shared edges by `corner_offset`
	fn next_corners(
		&self,
		navmesh: &Navmesh,
		corridor: &[i32],
		position: Vec2,
		goal: Vec2,
		corner_offset: f32,
	) -> CornerResult;
}

/// The pathfinding collaborator attached to a navigation bundle entity. Boxed so hosts
/// can substitute their own [CorridorSearch]
#[derive(Component)]
pub struct PathingProvider(Box<dyn CorridorSearch + Send + Sync>);

impl Default for PathingProvider {
	fn default() -> Self {
		PathingProvider(Box::new(PortalPathing))
	}
}

impl PathingProvider {
	/// Create a new instance of [PathingProvider] around a host-supplied search
	pub fn new(search: Box<dyn CorridorSearch + Send + Sync>) -> Self {
		PathingProvider(search)
	}
	/// Get the wrapped search
	pub fn get(&self) -> &(dyn CorridorSearch + Send + Sync) {
		self.0.as_ref()
	}
}

/// Reference [CorridorSearch]: breadth-first search over triangle adjacency and a
/// detour-style string-pulling funnel over the corridor's portal edges
pub struct PortalPathing;

/// A shared edge between two consecutive corridor triangles, oriented from the
/// traveller's perspective, plus the triangle entered through it
#[derive(Clone, Copy)]
struct Portal {
	/// Edge endpoint on the traveller's left
	left: Vec2,
	/// Edge endpoint on the traveller's right
	right: Vec2,
	/// Triangle entered through this portal
	triangle: i32,
}

/// A funnel corner before offsetting: its position, owning triangle and, for corners
/// born from a portal endpoint, which portal and side it came from
struct FunnelCorner {
	/// Corner position
	position: Vec2,
	/// Triangle owning the corner
	triangle: i32,
	/// `(portal index, took left endpoint)` for portal corners, `None` for the goal
	source: Option<(usize, bool)>,
}

impl CorridorSearch for PortalPathing {
	fn find_corridor(
		&self,
		navmesh: &Navmesh,
		_start: Vec2,
		start_triangle: i32,
		_end: Vec2,
		end_triangle: i32,
	) -> Option<Vec<i32>> {
		let count = navmesh.triangle_count();
		if start_triangle < 0
			|| end_triangle < 0
			|| start_triangle as usize >= count
			|| end_triangle as usize >= count
		{
			return None;
		}
		if start_triangle == end_triangle {
			return Some(vec![start_triangle]);
		}
		// unweighted breadth-first search over the adjacency buffer
		let mut parent: Vec<i32> = vec![-1; count];
		let mut visited = vec![false; count];
		let mut queue = VecDeque::new();
		visited[start_triangle as usize] = true;
		queue.push_back(start_triangle);
		while let Some(triangle) = queue.pop_front() {
			for edge in 0..3 {
				let neighbour = navmesh.get_neighbour(triangle as usize, edge);
				if neighbour >= 0 && !visited[neighbour as usize] {
					visited[neighbour as usize] = true;
					parent[neighbour as usize] = triangle;
					if neighbour == end_triangle {
						let mut corridor = vec![end_triangle];
						let mut walk = end_triangle;
						while parent[walk as usize] >= 0 {
							walk = parent[walk as usize];
							corridor.push(walk);
						}
						corridor.reverse();
						return Some(corridor);
					}
					queue.push_back(neighbour);
				}
			}
		}
		None
	}

	fn next_corners(
		&self,
		navmesh: &Navmesh,
		corridor: &[i32],
		position: Vec2,
		goal: Vec2,
		corner_offset: f32,
	) -> CornerResult {
		if corridor.is_empty() {
			return CornerResult::none();
		}
		let last_triangle = *corridor.last().unwrap();
		if corridor.len() == 1 {
			return CornerResult {
				num_valid: 1,
				corner: goal,
				corner_triangle: last_triangle,
				corner2: goal,
				corner2_triangle: last_triangle,
			};
		}
		let Some(portals) = build_portals(navmesh, corridor, position, goal) else {
			return CornerResult::none();
		};
		let corners = run_funnel(&portals, position, goal, last_triangle);
		let Some(first) = corners.first() else {
			return CornerResult::none();
		};
		// the only remaining corner being the destination means arrival steering
		if first.source.is_none() || first.position.distance_squared(goal) < FUNNEL_EPSILON_SQ {
			return CornerResult {
				num_valid: 1,
				corner: goal,
				corner_triangle: last_triangle,
				corner2: goal,
				corner2_triangle: last_triangle,
			};
		}
		let second = &corners[1];
		CornerResult {
			num_valid: 2,
			corner: offset_corner(first, &portals, corner_offset),
			corner_triangle: first.triangle,
			corner2: offset_corner(second, &portals, corner_offset),
			corner2_triangle: second.triangle,
		}
	}
}

/// Twice the signed area of triangle `a, b, c`; positive when `c` lies left of `a -> b`
fn tri_area2(a: Vec2, b: Vec2, c: Vec2) -> f32 {
	(b - a).perp_dot(c - a)
}

/// Build the oriented portal list of a corridor: the shared edge between every
/// consecutive triangle pair ordered `(left, right)` from the traveller's perspective,
/// terminated by a degenerate `(goal, goal)` portal. `None` if a pair shares no edge -
/// a broken corridor the caller must treat as a corner-resolution failure
fn build_portals(
	navmesh: &Navmesh,
	corridor: &[i32],
	position: Vec2,
	goal: Vec2,
) -> Option<Vec<Portal>> {
	let mut portals = Vec::with_capacity(corridor.len());
	let mut reference = position;
	for pair in corridor.windows(2) {
		let (from, to) = (pair[0], pair[1]);
		if from < 0 || from as usize >= navmesh.triangle_count() {
			return None;
		}
		let mut shared: Option<(Vec2, Vec2)> = None;
		let verts = navmesh.triangle_vertices(from as usize);
		for edge in 0..3 {
			if navmesh.get_neighbour(from as usize, edge) == to {
				shared = Some((verts[(edge + 1) % 3], verts[(edge + 2) % 3]));
				break;
			}
		}
		let (p, q) = shared?;
		let mid = (p + q) / 2.0;
		let mut direction = mid - reference;
		if direction.length_squared() < FUNNEL_EPSILON_SQ {
			direction = goal - position;
		}
		let side = Vec2::new(-direction.y, direction.x);
		let (left, right) = if (p - mid).dot(side) >= (q - mid).dot(side) {
			(p, q)
		} else {
			(q, p)
		};
		portals.push(Portal {
			left,
			right,
			triangle: to,
		});
		reference = mid;
	}
	let last_triangle = *corridor.last().unwrap();
	portals.push(Portal {
		left: goal,
		right: goal,
		triangle: last_triangle,
	});
	Some(portals)
}

/// String-pulling pass over the portal list starting from `position`, collecting up to
/// two corners. If the funnel reaches the end of the portals with fewer than two, the
/// goal itself is appended as the final corner
fn run_funnel(portals: &[Portal], position: Vec2, goal: Vec2, goal_triangle: i32) -> Vec<FunnelCorner> {
	let mut corners: Vec<FunnelCorner> = Vec::new();
	let mut apex = position;
	let mut left = position;
	let mut right = position;
	let mut left_index = 0usize;
	let mut right_index = 0usize;
	let mut i = 0usize;
	// funnel invariant: the left boundary is counter-clockwise of the right boundary
	// about the apex, the open region lying between them
	while i < portals.len() && corners.len() < 2 {
		let portal = portals[i];
		// tighten the right side of the funnel
		if tri_area2(apex, right, portal.right) >= 0.0 {
			if apex.distance_squared(right) < FUNNEL_EPSILON_SQ
				|| apex.distance_squared(left) < FUNNEL_EPSILON_SQ
				|| tri_area2(apex, left, portal.right) < 0.0
			{
				right = portal.right;
				right_index = i;
			} else {
				// right swept over the left boundary, the left endpoint is a corner
				corners.push(FunnelCorner {
					position: left,
					triangle: portals[left_index].triangle,
					source: Some((left_index, true)),
				});
				apex = left;
				left = apex;
				right = apex;
				right_index = left_index;
				i = left_index + 1;
				continue;
			}
		}
		// tighten the left side of the funnel
		if tri_area2(apex, left, portal.left) <= 0.0 {
			if apex.distance_squared(left) < FUNNEL_EPSILON_SQ
				|| apex.distance_squared(right) < FUNNEL_EPSILON_SQ
				|| tri_area2(apex, right, portal.left) > 0.0
			{
				left = portal.left;
				left_index = i;
			} else {
				corners.push(FunnelCorner {
					position: right,
					triangle: portals[right_index].triangle,
					source: Some((right_index, false)),
				});
				apex = right;
				left = apex;
				right = apex;
				left_index = right_index;
				i = right_index + 1;
				continue;
			}
		}
		i += 1;
	}
	if corners.len() < 2 {
		corners.push(FunnelCorner {
			position: goal,
			triangle: goal_triangle,
			source: None,
		});
	}
	corners
}

/// Pull a portal corner inward along its edge towards the opposite endpoint, capped at
/// half the edge length. Goal corners are returned untouched
fn offset_corner(corner: &FunnelCorner, portals: &[Portal], corner_offset: f32) -> Vec2 {
	let Some((portal_index, took_left)) = corner.source else {
		return corner.position;
	};
	let portal = portals[portal_index];
	let other = if took_left { portal.right } else { portal.left };
	let edge = other - corner.position;
	let length = edge.length();
	if length < f32::EPSILON {
		return corner.position;
	}
	corner.position + edge / length * corner_offset.min(length * 0.5)
}

// #[rustfmt::skip]
#[cfg(test)]
mod tests {
	use super::*;
	/// A strip of four triangles over a `3x1` quad row: quads `(0..1)`, `(1..2)`,
	/// `(2..3)` each split along a diagonal
	fn strip_mesh() -> Navmesh {
		let vertices = vec![
			Vec2::new(0.0, 0.0),
			Vec2::new(1.0, 0.0),
			Vec2::new(2.0, 0.0),
			Vec2::new(3.0, 0.0),
			Vec2::new(0.0, 1.0),
			Vec2::new(1.0, 1.0),
			Vec2::new(2.0, 1.0),
			Vec2::new(3.0, 1.0),
		];
		let triangles = vec![0, 1, 5, 0, 5, 4, 1, 2, 6, 1, 6, 5, 2, 3, 7, 2, 7, 6];
		Navmesh::new(vertices, triangles)
	}
	#[test]
	fn corridor_on_same_triangle() {
		let mesh = strip_mesh();
		let search = PortalPathing;
		let result = search
			.find_corridor(&mesh, Vec2::new(0.5, 0.25), 0, Vec2::new(0.6, 0.3), 0)
			.unwrap();
		assert_eq!(vec![0], result);
	}
	#[test]
	fn corridor_crosses_the_strip() {
		let mesh = strip_mesh();
		let search = PortalPathing;
		let start = mesh.get_centroid(0);
		let end = mesh.get_centroid(4);
		let result = search.find_corridor(&mesh, start, 0, end, 4).unwrap();
		assert_eq!(0, result[0]);
		assert_eq!(4, *result.last().unwrap());
		assert!(mesh.is_corridor_connected(&result));
	}
	#[test]
	fn corridor_to_invalid_triangle_is_none() {
		let mesh = strip_mesh();
		let search = PortalPathing;
		let result = search.find_corridor(&mesh, Vec2::ZERO, 0, Vec2::ZERO, -1);
		assert!(result.is_none());
	}
	#[test]
	fn corners_on_empty_corridor_are_invalid() {
		let mesh = strip_mesh();
		let search = PortalPathing;
		let result = search.next_corners(&mesh, &[], Vec2::ZERO, Vec2::ONE, 0.1);
		assert_eq!(0, result.num_valid);
	}
	#[test]
	fn single_triangle_corridor_steers_at_goal() {
		let mesh = strip_mesh();
		let search = PortalPathing;
		let goal = Vec2::new(0.5, 0.25);
		let result = search.next_corners(&mesh, &[0], Vec2::new(0.2, 0.1), goal, 0.1);
		assert_eq!(1, result.num_valid);
		assert_eq!(goal, result.corner);
		assert_eq!(0, result.corner_triangle);
	}
	#[test]
	fn straight_shot_corridor_steers_at_goal() {
		let mesh = strip_mesh();
		let search = PortalPathing;
		// straight line along the strip's middle, no bends so the destination is the corner
		let position = Vec2::new(0.25, 0.5);
		let goal = Vec2::new(2.75, 0.5);
		let corridor = vec![0, 3, 2, 5, 4];
		let search_corridor = PortalPathing
			.find_corridor(&mesh, position, 0, goal, 4)
			.unwrap();
		assert_eq!(corridor, search_corridor);
		let result = search.next_corners(&mesh, &corridor, position, goal, 0.0);
		assert_eq!(1, result.num_valid);
		assert_eq!(goal, result.corner);
	}
	#[test]
	fn bend_around_corner_vertex() {
		// L of three unit squares: (0..1,0..1), (1..2,0..1), (1..2,1..2); a route from
		// the first square into the top square must pivot around the vertex at (1,1)
		let vertices = vec![
			Vec2::new(0.0, 0.0),
			Vec2::new(1.0, 0.0),
			Vec2::new(2.0, 0.0),
			Vec2::new(0.0, 1.0),
			Vec2::new(1.0, 1.0),
			Vec2::new(2.0, 1.0),
			Vec2::new(1.0, 2.0),
			Vec2::new(2.0, 2.0),
		];
		let triangles = vec![0, 1, 4, 0, 4, 3, 1, 2, 5, 1, 5, 4, 4, 5, 7, 4, 7, 6];
		let mesh = Navmesh::new(vertices, triangles);
		let search = PortalPathing;
		let position = Vec2::new(0.3, 0.5);
		let goal = Vec2::new(1.5, 1.7);
		let corridor = search.find_corridor(&mesh, position, 1, goal, 5).unwrap();
		assert!(mesh.is_corridor_connected(&corridor));
		let result = search.next_corners(&mesh, &corridor, position, goal, 0.0);
		assert_eq!(2, result.num_valid);
		let pivot = Vec2::new(1.0, 1.0);
		assert!(result.corner.distance(pivot) < 1e-5);
		assert!(result.corner2.distance(goal) < 1e-5);
	}
	#[test]
	fn broken_corridor_is_invalid() {
		let mesh = strip_mesh();
		let search = PortalPathing;
		let result = search.next_corners(&mesh, &[0, 5], Vec2::new(0.25, 0.5), Vec2::ONE, 0.1);
		assert_eq!(0, result.num_valid);
	}
	#[test]
	fn offset_never_passes_edge_midpoint() {
		let corner = FunnelCorner {
			position: Vec2::new(0.0, 0.0),
			triangle: 0,
			source: Some((0, true)),
		};
		let portals = vec![Portal {
			left: Vec2::new(0.0, 0.0),
			right: Vec2::new(0.0, 1.0),
			triangle: 0,
		}];
		let result = offset_corner(&corner, &portals, 10.0);
		let actual = Vec2::new(0.0, 0.5);
		assert!(result.distance(actual) < 1e-6);
	}
}
