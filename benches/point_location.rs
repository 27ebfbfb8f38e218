//! Measure resolving the containing triangle of scattered points with no useful
//! last-known triangle, forcing the grid fallback path
//!
//! Mesh is a 64x64 grid of quads split into triangles
//!

use bevy::prelude::*;
use bevy_navmesh_steering_plugin::prelude::*;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

/// Build a square grid mesh of `dimension * dimension` quads, each split into two
/// triangles, with unit-length cells
fn grid_mesh(dimension: usize) -> Navmesh {
	let mut vertices = Vec::new();
	for row in 0..=dimension {
		for column in 0..=dimension {
			vertices.push(Vec2::new(column as f32, row as f32));
		}
	}
	let mut triangles = Vec::new();
	for row in 0..dimension {
		for column in 0..dimension {
			let v00 = (row * (dimension + 1) + column) as i32;
			let v10 = v00 + 1;
			let v01 = v00 + dimension as i32 + 1;
			let v11 = v01 + 1;
			triangles.extend_from_slice(&[v00, v10, v11]);
			triangles.extend_from_slice(&[v00, v11, v01]);
		}
	}
	Navmesh::new(vertices, triangles)
}

/// Locate a spread of sample points across the whole mesh
fn locate(navmesh: &Navmesh, index: &TriangleSpatialIndex) {
	for row in 0..64 {
		for column in 0..64 {
			let point = Vec2::new(column as f32 + 0.3, row as f32 + 0.3);
			let result = index.is_point_in_navmesh(navmesh, point, -1);
			black_box(result);
		}
	}
}

pub fn criterion_benchmark(c: &mut Criterion) {
	let mut group = c.benchmark_group("algorithm_use");
	group.significance_level(0.05).sample_size(100);
	let navmesh = grid_mesh(64);
	let index = TriangleSpatialIndex::new(&navmesh);
	group.bench_function("point_location", |b| {
		b.iter(|| locate(black_box(&navmesh), black_box(&index)))
	});
	group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
