//! Measure rebuilding the agent grid from scratch with a large crowd
//!
//! 10,000 agents scattered deterministically over the grid extent
//!

use bevy::prelude::*;
use bevy_navmesh_steering_plugin::prelude::*;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Scatter a crowd of agent positions over most of the grid extent
fn scatter(count: u32) -> Vec<(u32, Vec2)> {
	let mut rng = StdRng::seed_from_u64(7);
	let half = AGENT_CELL_SIZE * AGENT_GRID_DIMENSION as f32 * 0.45;
	(0..count)
		.map(|agent| {
			let position = Vec2::new(rng.random_range(-half..half), rng.random_range(-half..half));
			(agent, position)
		})
		.collect()
}

pub fn criterion_benchmark(c: &mut Criterion) {
	let mut group = c.benchmark_group("algorithm_use");
	group.significance_level(0.05).sample_size(100);
	let crowd = scatter(10_000);
	let mut grid = AgentSpatialGrid::default();
	group.bench_function("reindex_agents", |b| {
		b.iter(|| grid.clear_and_reindex(black_box(crowd.iter().copied())))
	});
	group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
