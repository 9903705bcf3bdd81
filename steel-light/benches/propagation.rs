#![allow(missing_docs)]
//! Benchmarks for light propagation.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::{hint::black_box, sync::Arc};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use steel_light::{ChunkLightState, ChunkSource, LightChunk, LightConfig, LightManager, WorldBounds};
use steel_utils::{BlockPos, ChunkPos};

const MIN_SECTION: i32 = 0;
const MAX_SECTION: i32 = 7;
/// Everything below this y is stone.
const GROUND_Y: i32 = 64;

/// Flat terrain with a few torches on the surface.
struct FlatChunk {
    light: ChunkLightState,
}

impl LightChunk for FlatChunk {
    fn opacity(&self, _x: usize, y: i32, _z: usize) -> u8 {
        if y < GROUND_Y { 15 } else { 0 }
    }

    fn emission(&self, x: usize, y: i32, z: usize) -> u8 {
        if y == GROUND_Y && x % 5 == 0 && z % 5 == 0 {
            14
        } else {
            0
        }
    }

    fn is_section_empty(&self, section_y: i32) -> bool {
        section_y > GROUND_Y >> 4
    }

    fn light(&self) -> &ChunkLightState {
        &self.light
    }
}

struct FlatWorld {
    chunks: RwLock<FxHashMap<ChunkPos, Arc<FlatChunk>>>,
}

impl FlatWorld {
    fn new(radius: i32) -> Self {
        let bounds = WorldBounds::new(MIN_SECTION, MAX_SECTION);
        let mut chunks = FxHashMap::default();
        for x in -radius..=radius {
            for z in -radius..=radius {
                let pos = ChunkPos::new(x, z);
                let light = ChunkLightState::new(bounds, true);
                chunks.insert(pos, Arc::new(FlatChunk { light }));
            }
        }
        Self {
            chunks: RwLock::new(chunks),
        }
    }

    fn positions(&self) -> Vec<ChunkPos> {
        self.chunks.read().keys().copied().collect()
    }
}

impl ChunkSource for FlatWorld {
    fn chunk(&self, chunk_x: i32, chunk_z: i32) -> Option<Arc<dyn LightChunk>> {
        self.chunks
            .read()
            .get(&ChunkPos::new(chunk_x, chunk_z))
            .map(|chunk| Arc::clone(chunk) as Arc<dyn LightChunk>)
    }
}

fn manager(world: &Arc<FlatWorld>) -> LightManager {
    let config = LightConfig {
        min_section: MIN_SECTION,
        max_section: MAX_SECTION,
        ..LightConfig::default()
    };
    let source: Arc<dyn ChunkSource> = world.clone();
    match LightManager::new(config, source) {
        Ok(manager) => manager,
        Err(err) => panic!("invalid bench config: {err}"),
    }
}

fn bench_light_chunks(c: &mut Criterion) {
    let mut group = c.benchmark_group("light_chunks");
    group.sample_size(10);

    for radius in [0, 2] {
        group.bench_with_input(BenchmarkId::new("radius", radius), &radius, |b, &radius| {
            b.iter(|| {
                let world = Arc::new(FlatWorld::new(radius));
                let manager = manager(&world);
                for pos in world.positions() {
                    black_box(manager.light_chunk(pos, false));
                }
            });
        });
    }

    group.finish();
}

fn bench_block_changes(c: &mut Criterion) {
    let world = Arc::new(FlatWorld::new(1));
    let manager = manager(&world);
    for pos in world.positions() {
        let _ = manager.light_chunk(pos, false);
    }

    // Changes that leave the terrain as it is still run the full update path
    c.bench_function("block_change_flush", |b| {
        b.iter(|| {
            for x in 0..16 {
                let _ = manager.block_change(BlockPos::new(x, GROUND_Y, x));
            }
            black_box(manager.schedule_updates());
        });
    });

    c.bench_function("relight_3x3", |b| {
        b.iter(|| black_box(manager.relight(world.positions(), |_| {}, |_| {})));
    });
}

criterion_group!(benches, bench_light_chunks, bench_block_changes);
criterion_main!(benches);
