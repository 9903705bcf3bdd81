//! Block light engine.

use steel_utils::SectionPos;

use super::{
    base::{LightEngine, LightPropagator},
    queue_entry::QueueEntry,
};
use crate::{chunk::LightType, config::WorldBounds};

/// Propagates light emitted by blocks.
pub struct BlockLightEngine {
    base: LightEngine,
}

impl BlockLightEngine {
    /// Creates a new block light engine.
    #[must_use]
    pub fn new(bounds: WorldBounds, queue_capacity: usize) -> Self {
        Self {
            base: LightEngine::new(LightType::Block, bounds, queue_capacity),
        }
    }
}

impl LightPropagator for BlockLightEngine {
    fn create(bounds: WorldBounds, queue_capacity: usize) -> Self {
        Self::new(bounds, queue_capacity)
    }

    fn engine(&mut self) -> &mut LightEngine {
        &mut self.base
    }

    fn seed_sources(&mut self, empty_sections: &[bool]) {
        let engine = &mut self.base;
        let bounds = engine.bounds();
        let center = engine.cache().center();

        // Empty sections hold no emitters
        for (index, _) in empty_sections.iter().enumerate().filter(|(_, empty)| !**empty) {
            let section_y = bounds.min_section + index as i32;
            let origin = SectionPos::new(center.x(), section_y, center.z()).origin();
            for y in 0..16 {
                for z in 0..16 {
                    for x in 0..16 {
                        let pos = origin.offset(x, y, z);
                        let emission = engine.cache().emission(pos);
                        if emission == 0 {
                            continue;
                        }
                        engine.cache_mut().set(pos, emission);
                        engine.enqueue_increase(pos, QueueEntry::increase_all_directions(emission));
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rustc_hash::FxHashSet;
    use steel_utils::{BlockPos, ChunkPos};

    use super::*;
    use crate::{
        chunk::LightChunk,
        light_engine::empty_sections_for_chunk,
        test_support::{OPAQUE, TestWorld},
    };

    fn light(world: &TestWorld, engine: &mut BlockLightEngine, x: i32, z: i32) {
        let chunk = world.get(x, z);
        assert!(chunk.is_some(), "chunk [{x}, {z}] not loaded");
        if let Some(chunk) = chunk {
            let empty = empty_sections_for_chunk(chunk.as_ref(), world.bounds());
            assert!(engine.light(world, ChunkPos::new(x, z), &empty));
            chunk.light().set_lit(true);
        }
    }

    fn changed(positions: &[BlockPos]) -> FxHashSet<BlockPos> {
        positions.iter().copied().collect()
    }

    #[test]
    fn test_emitter_floods_diamond() {
        let bounds = WorldBounds::new(0, 1);
        let world = TestWorld::new(bounds, false);
        let chunk = world.add_chunk(0, 0);
        world.set_block(BlockPos::new(8, 16, 8), 0, 14);

        let mut engine = BlockLightEngine::new(bounds, 64);
        light(&world, &mut engine, 0, 0);

        assert_eq!(chunk.block_light(BlockPos::new(8, 16, 8)), 14);
        assert_eq!(chunk.block_light(BlockPos::new(8, 17, 8)), 13);
        assert_eq!(chunk.block_light(BlockPos::new(9, 15, 8)), 12);
        assert_eq!(chunk.block_light(BlockPos::new(8, 16, 15)), 7);
        assert_eq!(chunk.block_light(BlockPos::new(0, 16, 0)), 0);
    }

    #[test]
    fn test_isolated_chunk_edges_only_see_local_emitters() {
        let bounds = WorldBounds::new(0, 0);
        let world = TestWorld::new(bounds, false);
        let chunk = world.add_chunk(0, 0);
        // Unloaded west neighbor would have held this emitter
        world.set_block(BlockPos::new(1, 8, 8), 0, 4);

        let mut engine = BlockLightEngine::new(bounds, 64);
        light(&world, &mut engine, 0, 0);

        assert_eq!(chunk.block_light(BlockPos::new(0, 8, 8)), 3);
        assert_eq!(chunk.block_light(BlockPos::new(15, 8, 8)), 0);
        assert_eq!(chunk.block_light(BlockPos::new(0, 8, 0)), 0);
    }

    #[test]
    fn test_removing_emitter_darkens() {
        let bounds = WorldBounds::new(0, 0);
        let world = TestWorld::new(bounds, false);
        let chunk = world.add_chunk(0, 0);
        let torch = BlockPos::new(4, 4, 4);
        let lamp = BlockPos::new(12, 4, 4);
        world.set_block(torch, 0, 14);
        world.set_block(lamp, 0, 6);

        let mut engine = BlockLightEngine::new(bounds, 64);
        light(&world, &mut engine, 0, 0);
        assert_eq!(chunk.block_light(BlockPos::new(8, 4, 4)), 10);

        world.set_block(torch, 0, 0);
        assert!(engine.blocks_changed_in_chunk(&world, ChunkPos::new(0, 0), &changed(&[torch]), None));

        assert_eq!(chunk.block_light(torch), 0);
        assert_eq!(chunk.block_light(BlockPos::new(8, 4, 4)), 2);
        assert_eq!(chunk.block_light(lamp), 6);
    }

    #[test]
    fn test_wall_blocks_light() {
        let bounds = WorldBounds::new(0, 0);
        let world = TestWorld::new(bounds, false);
        let chunk = world.add_chunk(0, 0);
        for y in 0..16 {
            for z in 0..16 {
                world.set_block(BlockPos::new(8, y, z), OPAQUE, 0);
            }
        }
        world.set_block(BlockPos::new(6, 8, 8), 0, 15);

        let mut engine = BlockLightEngine::new(bounds, 64);
        light(&world, &mut engine, 0, 0);
        assert_eq!(chunk.block_light(BlockPos::new(7, 8, 8)), 14);
        assert_eq!(chunk.block_light(BlockPos::new(8, 8, 8)), 0);
        assert_eq!(chunk.block_light(BlockPos::new(9, 8, 8)), 0);

        // Knock a hole in the wall
        let hole = BlockPos::new(8, 8, 8);
        world.set_block(hole, 0, 0);
        assert!(engine.blocks_changed_in_chunk(&world, ChunkPos::new(0, 0), &changed(&[hole]), None));
        assert_eq!(chunk.block_light(hole), 13);
        assert_eq!(chunk.block_light(BlockPos::new(9, 8, 8)), 12);
    }

    #[test]
    fn test_blocks_changed_is_idempotent() {
        let bounds = WorldBounds::new(0, 0);
        let world = TestWorld::new(bounds, false);
        let chunk = world.add_chunk(0, 0);
        let pos = BlockPos::new(3, 3, 3);
        world.set_block(pos, 0, 11);

        let mut engine = BlockLightEngine::new(bounds, 64);
        light(&world, &mut engine, 0, 0);
        assert!(engine.blocks_changed_in_chunk(&world, ChunkPos::new(0, 0), &changed(&[pos]), None));
        let first = chunk.block_snapshot();
        assert!(engine.blocks_changed_in_chunk(&world, ChunkPos::new(0, 0), &changed(&[pos]), None));
        assert_eq!(chunk.block_snapshot(), first);
    }

    #[test]
    fn test_unlit_chunk_ignores_changes() {
        let bounds = WorldBounds::new(0, 0);
        let world = TestWorld::new(bounds, false);
        let chunk = world.add_chunk(0, 0);
        let pos = BlockPos::new(3, 3, 3);
        world.set_block(pos, 0, 11);

        let mut engine = BlockLightEngine::new(bounds, 64);
        assert!(!engine.blocks_changed_in_chunk(&world, ChunkPos::new(0, 0), &changed(&[pos]), None));
        assert_eq!(chunk.block_light(pos), 0);
    }

    #[test]
    fn test_check_edges_after_neighbor_loads() {
        let bounds = WorldBounds::new(0, 0);
        let world = TestWorld::new(bounds, false);
        world.add_chunk(0, 0);
        world.set_block(BlockPos::new(0, 8, 8), 0, 10);

        let mut engine = BlockLightEngine::new(bounds, 64);
        light(&world, &mut engine, 0, 0);

        // The west neighbor appears already lit, without having seen the emitter
        let west = world.add_chunk(-1, 0);
        west.light().set_lit(true);
        assert_eq!(west.block_light(BlockPos::new(-1, 8, 8)), 0);

        let sections: FxHashSet<i16> = [0].into_iter().collect();
        assert!(engine.check_chunk_edges(&world, ChunkPos::new(0, 0), Some(&sections)));
        assert_eq!(west.block_light(BlockPos::new(-1, 8, 8)), 9);
        assert_eq!(west.block_light(BlockPos::new(-4, 8, 8)), 6);
    }

    #[test]
    fn test_check_edges_clears_unjustified_light() {
        let bounds = WorldBounds::new(0, 0);
        let world = TestWorld::new(bounds, false);
        let east = world.add_chunk(0, 0);
        east.light().set_lit(true);
        let west = world.add_chunk(-1, 0);
        west.light().set_lit(true);
        // Stale light saved with the west chunk, its emitter is gone
        west.write_block_light(BlockPos::new(-1, 8, 8), 12);

        let mut engine = BlockLightEngine::new(bounds, 64);
        assert!(engine.check_chunk_edges(&world, ChunkPos::new(0, 0), None));
        assert_eq!(west.block_light(BlockPos::new(-1, 8, 8)), 0);
        assert_eq!(east.block_light(BlockPos::new(0, 8, 8)), 0);
    }

    #[test]
    fn test_force_handle_empty_section_changes() {
        let bounds = WorldBounds::new(0, 1);
        let world = TestWorld::new(bounds, false);
        let chunk = world.add_chunk(0, 0);
        let mut engine = BlockLightEngine::new(bounds, 64);
        light(&world, &mut engine, 0, 0);
        assert!(chunk.light().block_emptiness_map().is_empty(1));

        world.set_block(BlockPos::new(2, 20, 2), 0, 8);
        let empty = empty_sections_for_chunk(chunk.as_ref(), bounds);
        assert!(engine.force_handle_empty_section_changes(&world, ChunkPos::new(0, 0), &empty));

        assert!(!chunk.light().block_emptiness_map().is_empty(1));
        assert_eq!(chunk.block_light(BlockPos::new(2, 20, 2)), 8);
        assert_eq!(chunk.block_light(BlockPos::new(2, 15, 2)), 3);
    }

    #[test]
    fn test_relight_chunks_reports_progress() {
        let bounds = WorldBounds::new(0, 0);
        let world = TestWorld::new(bounds, false);
        world.add_chunk(0, 0);
        world.add_chunk(1, 0);

        let mut engine = BlockLightEngine::new(bounds, 64);
        let mut seen = Vec::new();
        let mut total = None;
        engine.relight_chunks(
            &world,
            &[ChunkPos::new(0, 0), ChunkPos::new(1, 0), ChunkPos::new(5, 5)],
            &mut |pos| seen.push(pos),
            &mut |count| total = Some(count),
        );
        assert_eq!(seen, vec![ChunkPos::new(0, 0), ChunkPos::new(1, 0)]);
        assert_eq!(total, Some(2));
    }
}
