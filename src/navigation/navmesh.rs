//! The navigation mesh data model: vertex positions, triangle vertex indices,
//! per-edge triangle adjacency, triangle centroids and the mesh bounding box.
//!
//! A [Navmesh] is immutable once loaded. It can be built from raw vertex/triangle
//! buffers (adjacency computed here) or received fully pre-built from an external
//! loader via [Navmesh::from_buffers]. Adjacency follows the convention that
//! `neighbours[t * 3 + e]` is the triangle sharing the edge *opposite* vertex `e`
//! of triangle `t`, or `-1` for a boundary edge, and the relation is symmetric.
//!

use std::collections::HashMap;

use bevy::prelude::*;

/// Tolerance used by the edge-inclusive point-in-triangle test
const CONTAINMENT_EPSILON: f32 = 1e-6;

/// Axis-aligned bounding box of the walkable surface
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Bbox {
	/// Smallest `(x, y)` corner
	pub min: Vec2,
	/// Largest `(x, y)` corner
	pub max: Vec2,
}

impl Bbox {
	/// Create a new instance of [Bbox]
	pub fn new(min: Vec2, max: Vec2) -> Self {
		Bbox { min, max }
	}
	/// Is the point inside the box (edge inclusive)
	pub fn contains(&self, point: Vec2) -> bool {
		point.x >= self.min.x && point.x <= self.max.x && point.y >= self.min.y && point.y <= self.max.y
	}
	/// Length along `x` and `y`
	pub fn size(&self) -> Vec2 {
		self.max - self.min
	}
}

/// Result of walking a ray across the mesh, see [Navmesh::raycast]. Consumers of
/// escape/frustration recovery only inspect [RaycastResult::hit]
#[derive(Clone, Copy, Debug)]
pub struct RaycastResult {
	/// Whether the ray reached a boundary edge before reaching its end point
	pub hit: bool,
	/// Where the walk stopped: the end point if unobstructed, otherwise the boundary crossing
	pub position: Vec2,
	/// Triangle the walk stopped in (`-1` if the start triangle was unresolvable)
	pub triangle: i32,
}

/// Plain buffers describing a navmesh on disk or across a loader boundary. The
/// `neighbours` buffer may be left empty in which case adjacency is computed on build
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[derive(Clone, Debug, Default)]
pub struct NavmeshBuffers {
	/// Flattened `x, y` pairs of vertex positions
	pub vertices: Vec<f32>,
	/// Vertex index triples, three per triangle
	pub triangles: Vec<i32>,
	/// Per-edge adjacent triangle index or `-1`, three per triangle; may be empty
	pub neighbours: Vec<i32>,
}

/// An immutable triangulated walkable surface with explicit triangle adjacency
#[derive(Component, Clone, Default)]
pub struct Navmesh {
	/// Vertex positions
	vertices: Vec<Vec2>,
	/// Vertex index triples, three entries per triangle
	triangles: Vec<i32>,
	/// Per-edge adjacent triangle index or `-1`, `neighbours[t * 3 + e]` being the
	/// triangle across the edge opposite vertex `e` of triangle `t`
	neighbours: Vec<i32>,
	/// Centre of each triangle
	centroids: Vec<Vec2>,
	/// Bounding box over all vertices
	bbox: Bbox,
}

impl Navmesh {
	/// Create a new instance of [Navmesh] from vertices and triangle vertex triples,
	/// computing adjacency, centroids and the bounding box. Panics if `triangles` is not
	/// a multiple of three or indexes out of range - malformed triangulations are a
	/// loader defect, not a runtime condition
	pub fn new(vertices: Vec<Vec2>, triangles: Vec<i32>) -> Self {
		if triangles.len() % 3 != 0 {
			panic!(
				"Triangle buffer of {} entries is not a series of vertex triples",
				triangles.len()
			);
		}
		for index in triangles.iter() {
			if *index < 0 || *index as usize >= vertices.len() {
				panic!("Triangle vertex index {} is out of range", index);
			}
		}
		let neighbours = compute_adjacency(&triangles);
		let centroids = compute_centroids(&vertices, &triangles);
		let bbox = compute_bbox(&vertices);
		Navmesh {
			vertices,
			triangles,
			neighbours,
			centroids,
			bbox,
		}
	}
	/// Create a new instance of [Navmesh] from loader-supplied buffers. Pre-built
	/// adjacency is trusted as-is; an empty `neighbours` buffer is computed here
	pub fn from_buffers(buffers: NavmeshBuffers) -> Self {
		let vertices: Vec<Vec2> = buffers
			.vertices
			.chunks_exact(2)
			.map(|xy| Vec2::new(xy[0], xy[1]))
			.collect();
		if buffers.neighbours.is_empty() {
			Navmesh::new(vertices, buffers.triangles)
		} else {
			if buffers.neighbours.len() != buffers.triangles.len() {
				panic!(
					"Adjacency buffer of {} entries does not match {} triangle entries",
					buffers.neighbours.len(),
					buffers.triangles.len()
				);
			}
			let centroids = compute_centroids(&vertices, &buffers.triangles);
			let bbox = compute_bbox(&vertices);
			Navmesh {
				vertices,
				triangles: buffers.triangles,
				neighbours: buffers.neighbours,
				centroids,
				bbox,
			}
		}
	}
	/// From a `ron` file generate the [Navmesh]
	#[cfg(feature = "ron")]
	pub fn from_file(path: String) -> Self {
		let file = std::fs::File::open(path).expect("Failed opening Navmesh file");
		let buffers: NavmeshBuffers = match ron::de::from_reader(file) {
			Ok(buffers) => buffers,
			Err(e) => panic!("Failed deserializing NavmeshBuffers: {}", e),
		};
		Navmesh::from_buffers(buffers)
	}
	/// Serialise the mesh buffers to a `ron` file
	#[cfg(feature = "ron")]
	pub fn to_file(&self, path: String) {
		let mut vertices = Vec::with_capacity(self.vertices.len() * 2);
		for v in self.vertices.iter() {
			vertices.push(v.x);
			vertices.push(v.y);
		}
		let buffers = NavmeshBuffers {
			vertices,
			triangles: self.triangles.clone(),
			neighbours: self.neighbours.clone(),
		};
		let mut file = std::fs::File::create(path).expect("Failed creating Navmesh file");
		ron::ser::to_writer(&mut file, &buffers).expect("Failed serialising NavmeshBuffers");
	}
	/// Number of triangles in the mesh
	pub fn triangle_count(&self) -> usize {
		self.triangles.len() / 3
	}
	/// Get the vertex positions
	pub fn get_vertices(&self) -> &[Vec2] {
		&self.vertices
	}
	/// Get the triangle vertex triples
	pub fn get_triangles(&self) -> &[i32] {
		&self.triangles
	}
	/// Get the adjacency buffer
	pub fn get_neighbours(&self) -> &[i32] {
		&self.neighbours
	}
	/// Get the bounding box over all vertices
	pub fn get_bbox(&self) -> Bbox {
		self.bbox
	}
	/// Centre of triangle `triangle`
	pub fn get_centroid(&self, triangle: usize) -> Vec2 {
		self.centroids[triangle]
	}
	/// The three corner positions of triangle `triangle`
	pub fn triangle_vertices(&self, triangle: usize) -> [Vec2; 3] {
		[
			self.vertices[self.triangles[triangle * 3] as usize],
			self.vertices[self.triangles[triangle * 3 + 1] as usize],
			self.vertices[self.triangles[triangle * 3 + 2] as usize],
		]
	}
	/// The triangle across the edge opposite vertex `edge` of triangle `triangle`, `-1`
	/// for a boundary edge
	pub fn get_neighbour(&self, triangle: usize, edge: usize) -> i32 {
		self.neighbours[triangle * 3 + edge]
	}
	/// Edge-inclusive point-in-triangle test. Points exactly on a shared edge are
	/// contained by both triangles of that edge
	pub fn contains_point(&self, triangle: usize, point: Vec2) -> bool {
		let [a, b, c] = self.triangle_vertices(triangle);
		let d1 = (b - a).perp_dot(point - a);
		let d2 = (c - b).perp_dot(point - b);
		let d3 = (a - c).perp_dot(point - c);
		let has_negative =
			d1 < -CONTAINMENT_EPSILON || d2 < -CONTAINMENT_EPSILON || d3 < -CONTAINMENT_EPSILON;
		let has_positive =
			d1 > CONTAINMENT_EPSILON || d2 > CONTAINMENT_EPSILON || d3 > CONTAINMENT_EPSILON;
		!(has_negative && has_positive)
	}
	/// Are every consecutive pair of triangle indices in `corridor` adjacent per the
	/// adjacency buffer. Used by tests and by hosts integrating third-party pathfinders
	pub fn is_corridor_connected(&self, corridor: &[i32]) -> bool {
		for pair in corridor.windows(2) {
			let (a, b) = (pair[0], pair[1]);
			if a < 0 || b < 0 || a as usize >= self.triangle_count() || b as usize >= self.triangle_count()
			{
				return false;
			}
			let mut adjacent = false;
			for edge in 0..3 {
				if self.get_neighbour(a as usize, edge) == b {
					adjacent = true;
					break;
				}
			}
			if !adjacent {
				return false;
			}
		}
		true
	}
	/// Walk a straight segment from `from` (inside `start_triangle`) towards `to` across
	/// shared edges. The walk stops either at `to` (`hit == false`) or at the first
	/// boundary edge in the way (`hit == true`)
	pub fn raycast(&self, from: Vec2, to: Vec2, start_triangle: i32) -> RaycastResult {
		if start_triangle < 0 || start_triangle as usize >= self.triangle_count() {
			return RaycastResult {
				hit: true,
				position: from,
				triangle: -1,
			};
		}
		let mut triangle = start_triangle as usize;
		let mut entry_parameter = 0.0;
		// walk is bounded by the triangle count, a straight segment cannot revisit a triangle
		for _ in 0..self.triangle_count() {
			if self.contains_point(triangle, to) {
				return RaycastResult {
					hit: false,
					position: to,
					triangle: triangle as i32,
				};
			}
			let verts = self.triangle_vertices(triangle);
			let mut exit: Option<(f32, usize)> = None;
			for edge in 0..3 {
				let a = verts[(edge + 1) % 3];
				let b = verts[(edge + 2) % 3];
				if let Some(t) = segment_crossing_parameter(from, to, a, b) {
					if t > entry_parameter + CONTAINMENT_EPSILON {
						match exit {
							Some((best, _)) if best <= t => {}
							_ => exit = Some((t, edge)),
						}
					}
				}
			}
			let Some((t, edge)) = exit else {
				// numerically wedged against a corner, treat as obstructed
				return RaycastResult {
					hit: true,
					position: from.lerp(to, entry_parameter),
					triangle: triangle as i32,
				};
			};
			let neighbour = self.get_neighbour(triangle, edge);
			if neighbour < 0 {
				return RaycastResult {
					hit: true,
					position: from.lerp(to, t),
					triangle: triangle as i32,
				};
			}
			triangle = neighbour as usize;
			entry_parameter = t;
		}
		RaycastResult {
			hit: true,
			position: from.lerp(to, entry_parameter),
			triangle: triangle as i32,
		}
	}
}

/// Find the crossing parameter `t` along `from -> to` where the segment crosses `a -> b`,
/// or `None` if the segments do not intersect (parallel segments included)
fn segment_crossing_parameter(from: Vec2, to: Vec2, a: Vec2, b: Vec2) -> Option<f32> {
	let ray = to - from;
	let edge = b - a;
	let denominator = ray.perp_dot(edge);
	if denominator.abs() < CONTAINMENT_EPSILON {
		return None;
	}
	let offset = a - from;
	let t = offset.perp_dot(edge) / denominator;
	let u = offset.perp_dot(ray) / denominator;
	if (-CONTAINMENT_EPSILON..=1.0 + CONTAINMENT_EPSILON).contains(&t)
		&& (-CONTAINMENT_EPSILON..=1.0 + CONTAINMENT_EPSILON).contains(&u)
	{
		Some(t)
	} else {
		None
	}
}

/// From vertex triples produce the per-edge adjacency buffer. The edge opposite vertex
/// `e` of a triangle runs between its vertices `(e + 1) % 3` and `(e + 2) % 3`; two
/// triangles listing the same undirected vertex pair share that edge
fn compute_adjacency(triangles: &[i32]) -> Vec<i32> {
	let mut neighbours = vec![-1; triangles.len()];
	let mut edges: HashMap<(i32, i32), (usize, usize)> = HashMap::new();
	for triangle in 0..triangles.len() / 3 {
		for edge in 0..3 {
			let p = triangles[triangle * 3 + (edge + 1) % 3];
			let q = triangles[triangle * 3 + (edge + 2) % 3];
			let key = if p < q { (p, q) } else { (q, p) };
			if let Some((other_triangle, other_edge)) = edges.remove(&key) {
				neighbours[triangle * 3 + edge] = other_triangle as i32;
				neighbours[other_triangle * 3 + other_edge] = triangle as i32;
			} else {
				edges.insert(key, (triangle, edge));
			}
		}
	}
	neighbours
}

/// Average the corner positions of every triangle
fn compute_centroids(vertices: &[Vec2], triangles: &[i32]) -> Vec<Vec2> {
	triangles
		.chunks_exact(3)
		.map(|t| {
			(vertices[t[0] as usize] + vertices[t[1] as usize] + vertices[t[2] as usize]) / 3.0
		})
		.collect()
}

/// Bounding box over all vertex positions
fn compute_bbox(vertices: &[Vec2]) -> Bbox {
	let mut bbox = Bbox::new(Vec2::splat(f32::MAX), Vec2::splat(f32::MIN));
	for v in vertices.iter() {
		bbox.min = bbox.min.min(*v);
		bbox.max = bbox.max.max(*v);
	}
	if vertices.is_empty() {
		bbox = Bbox::default();
	}
	bbox
}

// #[rustfmt::skip]
#[cfg(test)]
mod tests {
	use super::*;
	/// A unit square split along the diagonal `(0,0) -> (2,2)` into triangles `0` and `1`
	fn two_triangle_mesh() -> Navmesh {
		let vertices = vec![
			Vec2::new(0.0, 0.0),
			Vec2::new(2.0, 0.0),
			Vec2::new(2.0, 2.0),
			Vec2::new(0.0, 2.0),
		];
		let triangles = vec![0, 1, 2, 0, 2, 3];
		Navmesh::new(vertices, triangles)
	}
	#[test]
	fn adjacency_is_symmetric() {
		let mesh = two_triangle_mesh();
		for triangle in 0..mesh.triangle_count() {
			for edge in 0..3 {
				let neighbour = mesh.get_neighbour(triangle, edge);
				if neighbour >= 0 {
					let mut reciprocal = false;
					for other_edge in 0..3 {
						if mesh.get_neighbour(neighbour as usize, other_edge) == triangle as i32 {
							reciprocal = true;
						}
					}
					assert!(reciprocal);
				}
			}
		}
	}
	#[test]
	fn shared_edge_found() {
		let mesh = two_triangle_mesh();
		let mut pairs = 0;
		for edge in 0..3 {
			if mesh.get_neighbour(0, edge) == 1 {
				pairs += 1;
			}
		}
		assert_eq!(1, pairs);
	}
	#[test]
	fn centroid_of_first_triangle() {
		let mesh = two_triangle_mesh();
		let result = mesh.get_centroid(0);
		let actual = Vec2::new(4.0 / 3.0, 2.0 / 3.0);
		assert!(result.distance(actual) < 1e-5);
	}
	#[test]
	fn contains_interior_point() {
		let mesh = two_triangle_mesh();
		assert!(mesh.contains_point(0, Vec2::new(1.5, 0.5)));
		assert!(!mesh.contains_point(0, Vec2::new(0.5, 1.5)));
	}
	#[test]
	fn shared_edge_contained_by_both() {
		let mesh = two_triangle_mesh();
		let on_edge = Vec2::new(1.0, 1.0);
		assert!(mesh.contains_point(0, on_edge));
		assert!(mesh.contains_point(1, on_edge));
	}
	#[test]
	fn bbox_spans_vertices() {
		let mesh = two_triangle_mesh();
		let result = mesh.get_bbox();
		assert_eq!(Vec2::new(0.0, 0.0), result.min);
		assert_eq!(Vec2::new(2.0, 2.0), result.max);
	}
	#[test]
	fn bbox_containment_is_edge_inclusive() {
		let mesh = two_triangle_mesh();
		let bbox = mesh.get_bbox();
		assert!(bbox.contains(Vec2::new(2.0, 2.0)));
		assert!(bbox.contains(Vec2::new(0.0, 1.0)));
		assert!(!bbox.contains(Vec2::new(2.1, 1.0)));
	}
	#[test]
	fn corridor_connectivity() {
		let mesh = two_triangle_mesh();
		assert!(mesh.is_corridor_connected(&[0, 1]));
		assert!(mesh.is_corridor_connected(&[0]));
		assert!(!mesh.is_corridor_connected(&[0, 0]));
		assert!(!mesh.is_corridor_connected(&[0, 7]));
	}
	#[test]
	fn raycast_across_shared_edge_is_clear() {
		let mesh = two_triangle_mesh();
		let result = mesh.raycast(Vec2::new(1.5, 0.5), Vec2::new(0.5, 1.5), 0);
		assert!(!result.hit);
		assert_eq!(1, result.triangle);
	}
	#[test]
	fn raycast_leaving_the_mesh_hits_boundary() {
		let mesh = two_triangle_mesh();
		let result = mesh.raycast(Vec2::new(1.5, 0.5), Vec2::new(5.0, 0.5), 0);
		assert!(result.hit);
		assert!((result.position.x - 2.0).abs() < 1e-4);
	}
	#[test]
	fn raycast_without_start_triangle_is_obstructed() {
		let mesh = two_triangle_mesh();
		let result = mesh.raycast(Vec2::new(1.5, 0.5), Vec2::new(0.5, 1.5), -1);
		assert!(result.hit);
	}
	#[test]
	fn buffers_round_trip_adjacency() {
		let mesh = two_triangle_mesh();
		let buffers = NavmeshBuffers {
			vertices: vec![0.0, 0.0, 2.0, 0.0, 2.0, 2.0, 0.0, 2.0],
			triangles: vec![0, 1, 2, 0, 2, 3],
			neighbours: mesh.get_neighbours().to_vec(),
		};
		let rebuilt = Navmesh::from_buffers(buffers);
		assert_eq!(mesh.get_vertices(), rebuilt.get_vertices());
		assert_eq!(mesh.get_neighbours(), rebuilt.get_neighbours());
		assert_eq!(mesh.get_bbox(), rebuilt.get_bbox());
	}
}
