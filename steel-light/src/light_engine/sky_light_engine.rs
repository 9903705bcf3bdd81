//! Sky light engine with empty section propagation optimization.

use steel_utils::BlockPos;

use super::{
    base::{LightEngine, LightPropagator, edge_voxels},
    direction::Direction,
    queue_entry::QueueEntry,
};
use crate::{chunk::LightType, config::WorldBounds, nibble::MAX_LIGHT_LEVEL};

/// Sky light engine with optimizations for vertical light propagation.
///
/// Sections above a column's highest non-empty section are filled with full
/// sky light in one operation instead of voxel by voxel. Flooding starts at
/// the bottom of that filled stack.
pub struct SkyLightEngine {
    base: LightEngine,
}

impl SkyLightEngine {
    /// Creates a new sky light engine.
    #[must_use]
    pub fn new(bounds: WorldBounds, queue_capacity: usize) -> Self {
        Self {
            base: LightEngine::new(LightType::Sky, bounds, queue_capacity),
        }
    }
}

impl LightPropagator for SkyLightEngine {
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

        let top = empty_sections
            .iter()
            .rposition(|empty| !empty)
            .map(|index| bounds.min_section + index as i32);
        let first_filled = top.map_or(bounds.min_section, |top| top + 1);

        // Fast path: everything above the highest non-empty section is open sky
        for section_y in first_filled..=bounds.max_section {
            engine
                .cache_mut()
                .fill_section(center, section_y, MAX_LIGHT_LEVEL);
        }

        if top.is_some() {
            // Light falls into the non-empty sections from the bottom of the
            // filled stack, or from the virtual section above the world
            let y = first_filled << 4;
            for z in 0..16 {
                for x in 0..16 {
                    let pos = BlockPos::new(center.min_block_x() + x, y, center.min_block_z() + z);
                    engine.enqueue_increase(
                        pos,
                        QueueEntry::increase_only_one_direction(MAX_LIGHT_LEVEL, Direction::Down),
                    );
                }
            }
        }

        let min_filled_y = first_filled << 4;
        let sides: Vec<(BlockPos, Direction)> = edge_voxels(center, bounds, None)
            .filter(|(pos, dir)| {
                pos.0.y >= min_filled_y && engine.cache().contains_chunk(dir.relative(*pos).chunk_pos())
            })
            .collect();
        for (pos, dir) in sides {
            engine.enqueue_increase(
                pos,
                QueueEntry::increase_only_one_direction(MAX_LIGHT_LEVEL, dir),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use steel_utils::ChunkPos;

    use super::*;
    use crate::{
        chunk::LightChunk,
        light_engine::empty_sections_for_chunk,
        test_support::{OPAQUE, TestWorld},
    };

    fn light(world: &TestWorld, engine: &mut SkyLightEngine, x: i32, z: i32) -> bool {
        let Some(chunk) = world.get(x, z) else {
            return false;
        };
        let empty = empty_sections_for_chunk(chunk.as_ref(), world.bounds());
        let lit = engine.light(world, ChunkPos::new(x, z), &empty);
        chunk.light().set_lit(lit);
        lit
    }

    #[test]
    fn test_all_air_chunk() {
        let bounds = WorldBounds::new(0, 2);
        let world = TestWorld::new(bounds, true);
        let chunk = world.add_chunk(0, 0);
        let mut engine = SkyLightEngine::new(bounds, 64);

        assert!(light(&world, &mut engine, 0, 0));

        for y in [0, 15, 16, 47] {
            assert_eq!(chunk.sky_light(BlockPos::new(7, y, 3)), 15, "y = {y}");
        }
    }

    #[test]
    fn test_roof_shades_column_below() {
        let bounds = WorldBounds::new(0, 1);
        let world = TestWorld::new(bounds, true);
        let chunk = world.add_chunk(0, 0);
        // A 3x3 roof at y = 20
        for x in 4..7 {
            for z in 4..7 {
                world.set_block(BlockPos::new(x, 20, z), OPAQUE, 0);
            }
        }
        let mut engine = SkyLightEngine::new(bounds, 64);
        assert!(light(&world, &mut engine, 0, 0));

        assert_eq!(chunk.sky_light(BlockPos::new(5, 21, 5)), 15);
        assert_eq!(chunk.sky_light(BlockPos::new(5, 20, 5)), 0);
        // Two steps in from the open column next to the roof
        assert_eq!(chunk.sky_light(BlockPos::new(5, 19, 5)), 13);
        assert_eq!(chunk.sky_light(BlockPos::new(4, 19, 5)), 14);
        assert_eq!(chunk.sky_light(BlockPos::new(3, 19, 5)), 15);
        assert_eq!(chunk.sky_light(BlockPos::new(5, 0, 5)), 13);
    }

    #[test]
    fn test_missing_neighbor_is_opaque() {
        let bounds = WorldBounds::new(0, 0);
        let world = TestWorld::new(bounds, true);
        let chunk = world.add_chunk(0, 0);
        // Cover the whole chunk, leaving the rest of the section in the dark
        for x in 0..16 {
            for z in 0..16 {
                world.set_block(BlockPos::new(x, 15, z), OPAQUE, 0);
            }
        }
        let mut engine = SkyLightEngine::new(bounds, 64);
        assert!(light(&world, &mut engine, 0, 0));

        assert_eq!(chunk.sky_light(BlockPos::new(0, 10, 0)), 0);
        assert_eq!(chunk.sky_light(BlockPos::new(8, 14, 8)), 0);
    }

    #[test]
    fn test_light_leaks_into_lit_neighbor() {
        let bounds = WorldBounds::new(0, 0);
        let world = TestWorld::new(bounds, true);
        let west = world.add_chunk(-1, 0);
        let east = world.add_chunk(0, 0);
        // Roof over the west chunk only
        for x in -16..0 {
            for z in 0..16 {
                world.set_block(BlockPos::new(x, 15, z), OPAQUE, 0);
            }
        }
        let mut engine = SkyLightEngine::new(bounds, 64);
        assert!(light(&world, &mut engine, -1, 0));
        assert_eq!(west.sky_light(BlockPos::new(-1, 10, 8)), 0);

        assert!(light(&world, &mut engine, 0, 0));
        assert_eq!(east.sky_light(BlockPos::new(0, 10, 8)), 15);
        assert_eq!(west.sky_light(BlockPos::new(-1, 10, 8)), 14);
        assert_eq!(west.sky_light(BlockPos::new(-5, 10, 8)), 10);
        assert_eq!(west.sky_light(BlockPos::new(-16, 10, 8)), 0);
    }
}
