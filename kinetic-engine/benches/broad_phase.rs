// Copyright 2025 John Brosnihan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//! Broad-phase benchmarks: spatial hash against the BVH

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use kinetic_engine::math::{Aabb, Vec3};
use kinetic_engine::physics::broad_phase::{Bvh, SpatialHash};

/// Boxes scattered on a jittered grid, roughly 10% overlapping a neighbour
fn scattered(count: usize) -> Vec<(usize, Aabb)> {
    let side = (count as f32).cbrt().ceil() as usize;
    (0..count)
        .map(|i| {
            let (x, y, z) = (i % side, (i / side) % side, i / (side * side));
            let jitter = ((i * 7919) % 13) as f32 * 0.05;
            let center = Vec3::new(x as f32 * 2.1 + jitter, y as f32 * 2.1, z as f32 * 2.1 - jitter);
            (i, Aabb::new(center - Vec3::ONE, center + Vec3::ONE))
        })
        .collect()
}

fn bench_broad_phase(c: &mut Criterion) {
    let mut group = c.benchmark_group("broad_phase");

    for count in [100, 1000, 5000].iter() {
        group.throughput(Throughput::Elements(*count as u64));
        let entries = scattered(*count);

        group.bench_with_input(BenchmarkId::new("SpatialHash", count), &entries, |b, entries| {
            let mut hash = SpatialHash::new(5.0);
            let mut pairs = Vec::new();
            b.iter(|| {
                hash.update(entries);
                pairs.clear();
                hash.detect_pairs(&mut pairs);
                black_box(pairs.len());
            });
        });

        group.bench_with_input(BenchmarkId::new("Bvh", count), &entries, |b, entries| {
            let mut bvh = Bvh::new();
            let mut pairs = Vec::new();
            b.iter(|| {
                bvh.update(entries);
                pairs.clear();
                bvh.detect_pairs(&mut pairs);
                black_box(pairs.len());
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_broad_phase);
criterion_main!(benches);
