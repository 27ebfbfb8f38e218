//! A uniform grid over the navmesh bounding box mapping a world point to the small set
//! of triangles whose bounding box overlaps the containing cell.
//!
//! The index supports point-location (walking from a last-known triangle via neighbour
//! hops before falling back to the grid) and uniform random triangle sampling
//! (rejection sampling by point containment, with a fallback to direct triangle-index
//! sampling). Built once per loaded mesh and read-only during simulation.
//!

use bevy::prelude::*;
use rand::Rng;

use crate::prelude::*;

/// Used as the `query` result when a point lies outside the indexed bounding box
const NO_TRIANGLES: &[u32] = &[];

/// Grid index over navmesh triangles for point-location and random sampling. Immutable
/// once built; takes the [Navmesh] as an explicit constructor argument rather than any
/// ambient lookup
#[derive(Component, Clone, Default)]
pub struct TriangleSpatialIndex {
	/// World position of the grid's minimum corner
	origin: Vec2,
	/// Length of a square cell side
	cell_size: f32,
	/// Number of cells along `x`
	columns: usize,
	/// Number of cells along `y`
	rows: usize,
	/// Per-cell list of triangles whose bounding box overlaps the cell, row-major
	cells: Vec<Vec<u32>>,
}

impl TriangleSpatialIndex {
	/// Create a new instance of [TriangleSpatialIndex] covering the mesh bounding box.
	/// Cell size is derived so cells hold a handful of triangles each; degenerate
	/// bounding boxes and zero/NaN cell sizes are guarded by clamping the grid to at
	/// least `1x1` cells
	pub fn new(navmesh: &Navmesh) -> Self {
		let bbox = navmesh.get_bbox();
		let size = bbox.size();
		let triangle_count = navmesh.triangle_count().max(1);
		let mut cell_size = (size.x * size.y / triangle_count as f32).sqrt();
		if !cell_size.is_finite() || cell_size <= 0.0 {
			cell_size = size.x.max(size.y).max(1.0);
		}
		let columns = ((size.x / cell_size).ceil() as usize).max(1);
		let rows = ((size.y / cell_size).ceil() as usize).max(1);
		let mut cells = vec![Vec::new(); columns * rows];
		for triangle in 0..navmesh.triangle_count() {
			let verts = navmesh.triangle_vertices(triangle);
			let min = verts[0].min(verts[1]).min(verts[2]);
			let max = verts[0].max(verts[1]).max(verts[2]);
			let c0 = (((min.x - bbox.min.x) / cell_size).floor() as isize).clamp(0, columns as isize - 1);
			let c1 = (((max.x - bbox.min.x) / cell_size).floor() as isize).clamp(0, columns as isize - 1);
			let r0 = (((min.y - bbox.min.y) / cell_size).floor() as isize).clamp(0, rows as isize - 1);
			let r1 = (((max.y - bbox.min.y) / cell_size).floor() as isize).clamp(0, rows as isize - 1);
			for row in r0..=r1 {
				for column in c0..=c1 {
					cells[row as usize * columns + column as usize].push(triangle as u32);
				}
			}
		}
		TriangleSpatialIndex {
			origin: bbox.min,
			cell_size,
			columns,
			rows,
			cells,
		}
	}
	/// Create a new instance of [TriangleSpatialIndex] from pre-built grid buffers
	/// supplied by an external loader
	pub fn from_buffers(
		origin: Vec2,
		cell_size: f32,
		columns: usize,
		rows: usize,
		cells: Vec<Vec<u32>>,
	) -> Self {
		if columns == 0 || rows == 0 || cells.len() != columns * rows {
			panic!(
				"Grid of {} cells does not match dimensions {}x{}",
				cells.len(),
				columns,
				rows
			);
		}
		if !cell_size.is_finite() || cell_size <= 0.0 {
			panic!("Cell size {} is not a positive finite number", cell_size);
		}
		TriangleSpatialIndex {
			origin,
			cell_size,
			columns,
			rows,
			cells,
		}
	}
	/// Number of cells along `x`
	pub fn get_columns(&self) -> usize {
		self.columns
	}
	/// Number of cells along `y`
	pub fn get_rows(&self) -> usize {
		self.rows
	}
	/// Length of a square cell side
	pub fn get_cell_size(&self) -> f32 {
		self.cell_size
	}
	/// The `(column, row)` cell containing a point, or `None` outside the grid
	fn cell_of(&self, point: Vec2) -> Option<(usize, usize)> {
		let local = point - self.origin;
		if local.x < 0.0 || local.y < 0.0 {
			return None;
		}
		let column = (local.x / self.cell_size).floor() as usize;
		let row = (local.y / self.cell_size).floor() as usize;
		if column >= self.columns || row >= self.rows {
			return None;
		}
		Some((column, row))
	}
	/// Triangles whose bounding box overlaps the cell containing `(x, y)`, empty if the
	/// point lies outside the indexed bounding box
	pub fn query(&self, x: f32, y: f32) -> &[u32] {
		match self.cell_of(Vec2::new(x, y)) {
			Some((column, row)) => &self.cells[row * self.columns + column],
			None => NO_TRIANGLES,
		}
	}
	/// Locate the triangle containing `point`. Points outside the mesh bounding box miss
	/// immediately; otherwise tests `last_triangle` first (cheap point-in-triangle test),
	/// then its up-to-3 neighbours, then falls back to the grid and exhaustive containment
	/// testing of the candidates. Returns `-1` if no triangle contains the point - a
	/// valid, expected outcome the caller must check, never an error
	pub fn is_point_in_navmesh(&self, navmesh: &Navmesh, point: Vec2, last_triangle: i32) -> i32 {
		if !navmesh.get_bbox().contains(point) {
			return -1;
		}
		if last_triangle >= 0 && (last_triangle as usize) < navmesh.triangle_count() {
			let last = last_triangle as usize;
			if navmesh.contains_point(last, point) {
				return last_triangle;
			}
			for edge in 0..3 {
				let neighbour = navmesh.get_neighbour(last, edge);
				if neighbour >= 0 && navmesh.contains_point(neighbour as usize, point) {
					return neighbour;
				}
			}
		}
		for triangle in self.query(point.x, point.y) {
			if navmesh.contains_point(*triangle as usize, point) {
				return *triangle as i32;
			}
		}
		-1
	}
	/// Pick a uniformly random triangle by sampling points inside the bounding box and
	/// testing containment, bounded to [RANDOM_SAMPLE_ATTEMPTS] attempts. On exhaustion
	/// falls back to a uniform random triangle index, which may be a degenerate or
	/// non-walkable triangle - callers must tolerate this
	pub fn random_triangle(&self, navmesh: &Navmesh, rng: &mut impl Rng) -> i32 {
		if navmesh.triangle_count() == 0 {
			return -1;
		}
		let bbox = navmesh.get_bbox();
		for _ in 0..RANDOM_SAMPLE_ATTEMPTS {
			let point = sample_rect(bbox.min, bbox.max, rng);
			for triangle in self.query(point.x, point.y) {
				if navmesh.contains_point(*triangle as usize, point) {
					return *triangle as i32;
				}
			}
		}
		rng.random_range(0..navmesh.triangle_count()) as i32
	}
	/// Pick a random triangle near `center`, restricted to the sub-rectangle of cells
	/// within `radius_in_cells` of the cell containing it. Rejection sampling first,
	/// then a fallback enumerating the triangles overlapping the sub-rectangle's cells,
	/// and if that set is empty delegate to [TriangleSpatialIndex::random_triangle]
	pub fn random_triangle_in_area(
		&self,
		navmesh: &Navmesh,
		center: Vec2,
		radius_in_cells: usize,
		rng: &mut impl Rng,
	) -> i32 {
		if navmesh.triangle_count() == 0 {
			return -1;
		}
		let local = ((center - self.origin) / self.cell_size).floor();
		let column = (local.x as isize).clamp(0, self.columns as isize - 1) as usize;
		let row = (local.y as isize).clamp(0, self.rows as isize - 1) as usize;
		let radius = radius_in_cells as isize;
		let c0 = (column as isize - radius).max(0) as usize;
		let c1 = (column as isize + radius).min(self.columns as isize - 1) as usize;
		let r0 = (row as isize - radius).max(0) as usize;
		let r1 = (row as isize + radius).min(self.rows as isize - 1) as usize;
		let rect_min = self.origin + Vec2::new(c0 as f32, r0 as f32) * self.cell_size;
		let rect_max = self.origin + Vec2::new((c1 + 1) as f32, (r1 + 1) as f32) * self.cell_size;
		for _ in 0..RANDOM_SAMPLE_ATTEMPTS {
			let point = sample_rect(rect_min, rect_max, rng);
			for triangle in self.query(point.x, point.y) {
				if navmesh.contains_point(*triangle as usize, point) {
					return *triangle as i32;
				}
			}
		}
		let mut candidates: Vec<u32> = Vec::new();
		for row in r0..=r1 {
			for column in c0..=c1 {
				candidates.extend_from_slice(&self.cells[row * self.columns + column]);
			}
		}
		candidates.sort_unstable();
		candidates.dedup();
		if candidates.is_empty() {
			self.random_triangle(navmesh, rng)
		} else {
			candidates[rng.random_range(0..candidates.len())] as i32
		}
	}
}

/// Sample a uniform random point inside a rectangle
fn sample_rect(min: Vec2, max: Vec2, rng: &mut impl Rng) -> Vec2 {
	Vec2::new(
		min.x + (max.x - min.x) * rng.random_range(0.0..1.0f32),
		min.y + (max.y - min.y) * rng.random_range(0.0..1.0f32),
	)
}

// #[rustfmt::skip]
#[cfg(test)]
mod tests {
	use super::*;
	use rand::rngs::StdRng;
	use rand::SeedableRng;
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
	fn query_outside_bbox_is_empty() {
		let mesh = two_triangle_mesh();
		let index = TriangleSpatialIndex::new(&mesh);
		let result = index.query(-5.0, -5.0);
		assert!(result.is_empty());
	}
	#[test]
	fn query_inside_bbox_has_candidates() {
		let mesh = two_triangle_mesh();
		let index = TriangleSpatialIndex::new(&mesh);
		let result = index.query(1.5, 0.5);
		assert!(result.contains(&0));
	}
	#[test]
	fn point_location_without_hint() {
		let mesh = two_triangle_mesh();
		let index = TriangleSpatialIndex::new(&mesh);
		let point = Vec2::new(1.5, 0.5);
		let result = index.is_point_in_navmesh(&mesh, point, -1);
		assert!(result >= 0);
		assert!(mesh.contains_point(result as usize, point));
	}
	#[test]
	fn point_location_hint_fast_path() {
		let mesh = two_triangle_mesh();
		let index = TriangleSpatialIndex::new(&mesh);
		let result = index.is_point_in_navmesh(&mesh, Vec2::new(1.5, 0.5), 0);
		assert_eq!(0, result);
	}
	#[test]
	fn point_location_hint_neighbour_hop() {
		let mesh = two_triangle_mesh();
		let index = TriangleSpatialIndex::new(&mesh);
		// point lives in triangle 1, hint with its neighbour triangle 0
		let result = index.is_point_in_navmesh(&mesh, Vec2::new(0.5, 1.5), 0);
		assert_eq!(1, result);
	}
	#[test]
	fn point_location_miss_is_negative_one() {
		let mesh = two_triangle_mesh();
		let index = TriangleSpatialIndex::new(&mesh);
		let result = index.is_point_in_navmesh(&mesh, Vec2::new(50.0, 50.0), 0);
		assert_eq!(-1, result);
	}
	#[test]
	fn random_triangle_is_in_range() {
		let mesh = two_triangle_mesh();
		let index = TriangleSpatialIndex::new(&mesh);
		let mut rng = StdRng::seed_from_u64(7);
		for _ in 0..50 {
			let result = index.random_triangle(&mesh, &mut rng);
			assert!(result == 0 || result == 1);
		}
	}
	#[test]
	fn random_triangle_in_area_is_in_range() {
		let mesh = two_triangle_mesh();
		let index = TriangleSpatialIndex::new(&mesh);
		let mut rng = StdRng::seed_from_u64(7);
		for _ in 0..50 {
			let result = index.random_triangle_in_area(&mesh, Vec2::new(1.0, 1.0), 1, &mut rng);
			assert!(result == 0 || result == 1);
		}
	}
	#[test]
	fn degenerate_bbox_clamps_to_one_cell() {
		let vertices = vec![
			Vec2::new(1.0, 1.0),
			Vec2::new(1.0, 1.0),
			Vec2::new(1.0, 1.0),
		];
		let mesh = Navmesh::new(vertices, vec![0, 1, 2]);
		let index = TriangleSpatialIndex::new(&mesh);
		assert_eq!(1, index.get_columns());
		assert_eq!(1, index.get_rows());
	}
}
