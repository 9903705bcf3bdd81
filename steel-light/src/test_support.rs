//! In-memory chunks for tests.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use steel_utils::{BlockPos, ChunkPos};

use crate::{
    chunk::{ChunkLightState, ChunkSource, LightChunk},
    config::WorldBounds,
    nibble::{NibbleArray, SwmrNibbleArray},
};

/// Opacity of a block no light passes through.
pub(crate) const OPAQUE: u8 = 15;

/// A chunk storing only the blocks that differ from air.
pub(crate) struct TestChunk {
    pos: ChunkPos,
    bounds: WorldBounds,
    /// (opacity, emission) by world position.
    blocks: RwLock<FxHashMap<BlockPos, (u8, u8)>>,
    light: ChunkLightState,
    fail_reads: AtomicBool,
}

impl TestChunk {
    fn new(pos: ChunkPos, bounds: WorldBounds, has_sky_light: bool) -> Self {
        Self {
            pos,
            bounds,
            blocks: RwLock::new(FxHashMap::default()),
            light: ChunkLightState::new(bounds, has_sky_light),
            fail_reads: AtomicBool::new(false),
        }
    }

    fn world_pos(&self, x: usize, y: i32, z: usize) -> BlockPos {
        BlockPos::new(
            self.pos.min_block_x() + x as i32,
            y,
            self.pos.min_block_z() + z as i32,
        )
    }

    fn block(&self, x: usize, y: i32, z: usize) -> (u8, u8) {
        assert!(
            !self.fail_reads.load(Ordering::Relaxed),
            "block read failed in chunk {}",
            self.pos
        );
        self.blocks
            .read()
            .get(&self.world_pos(x, y, z))
            .copied()
            .unwrap_or((0, 0))
    }

    /// Makes every following opacity or emission read panic.
    pub(crate) fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::Relaxed);
    }

    fn read(nibbles: &[SwmrNibbleArray], bounds: WorldBounds, pos: BlockPos) -> u8 {
        let (x, y, z) = pos.section_relative();
        bounds
            .light_section_index(pos.0.y >> 4)
            .map_or(0, |index| nibbles[index].get_visible(x, y, z))
    }

    /// Published sky light at a world position in this chunk.
    pub(crate) fn sky_light(&self, pos: BlockPos) -> u8 {
        self.light
            .sky_nibbles()
            .map_or(0, |nibbles| Self::read(nibbles, self.bounds, pos))
    }

    /// Published block light at a world position in this chunk.
    pub(crate) fn block_light(&self, pos: BlockPos) -> u8 {
        Self::read(self.light.block_nibbles(), self.bounds, pos)
    }

    /// Published block light arrays, indexed by light section.
    pub(crate) fn block_snapshot(&self) -> Vec<NibbleArray> {
        self.light
            .block_nibbles()
            .iter()
            .map(|nibble| NibbleArray::clone(&nibble.visible()))
            .collect()
    }

    /// Every published light value of the real sections, sky then block.
    pub(crate) fn light_values(&self) -> Vec<u8> {
        let mut values = Vec::new();
        for y in self.bounds.min_block_y()..=self.bounds.max_block_y() {
            for z in 0..16 {
                for x in 0..16 {
                    let pos = self.world_pos(x, y, z);
                    values.push(self.sky_light(pos));
                    values.push(self.block_light(pos));
                }
            }
        }
        values
    }

    /// Overwrites one published block light value, as if loaded from disk.
    pub(crate) fn write_block_light(&self, pos: BlockPos, level: u8) {
        let Some(index) = self.bounds.light_section_index(pos.0.y >> 4) else {
            return;
        };
        let slot = &self.light.block_nibbles()[index];
        let mut data = NibbleArray::clone(&slot.visible());
        let (x, y, z) = pos.section_relative();
        data.set(x, y, z, level);
        slot.replace(data);
    }
}

impl LightChunk for TestChunk {
    fn opacity(&self, x: usize, y: i32, z: usize) -> u8 {
        self.block(x, y, z).0
    }

    fn emission(&self, x: usize, y: i32, z: usize) -> u8 {
        self.block(x, y, z).1
    }

    fn is_section_empty(&self, section_y: i32) -> bool {
        !self
            .blocks
            .read()
            .keys()
            .any(|pos| pos.0.y >> 4 == section_y)
    }

    fn light(&self) -> &ChunkLightState {
        &self.light
    }
}

/// A map of test chunks.
pub(crate) struct TestWorld {
    bounds: WorldBounds,
    has_sky_light: bool,
    chunks: RwLock<FxHashMap<ChunkPos, Arc<TestChunk>>>,
}

impl TestWorld {
    pub(crate) fn new(bounds: WorldBounds, has_sky_light: bool) -> Self {
        Self {
            bounds,
            has_sky_light,
            chunks: RwLock::new(FxHashMap::default()),
        }
    }

    pub(crate) fn bounds(&self) -> WorldBounds {
        self.bounds
    }

    /// Loads an all-air, unlit chunk, replacing any chunk already there.
    pub(crate) fn add_chunk(&self, x: i32, z: i32) -> Arc<TestChunk> {
        let pos = ChunkPos::new(x, z);
        let chunk = Arc::new(TestChunk::new(pos, self.bounds, self.has_sky_light));
        self.chunks.write().insert(pos, Arc::clone(&chunk));
        chunk
    }

    pub(crate) fn remove_chunk(&self, x: i32, z: i32) {
        self.chunks.write().remove(&ChunkPos::new(x, z));
    }

    pub(crate) fn get(&self, x: i32, z: i32) -> Option<Arc<TestChunk>> {
        self.chunks.read().get(&ChunkPos::new(x, z)).cloned()
    }

    /// Places a block. Air is opacity 0 and emission 0.
    ///
    /// Returns whether the emptiness of the block's section changed.
    pub(crate) fn set_block(&self, pos: BlockPos, opacity: u8, emission: u8) -> bool {
        let chunk_pos = pos.chunk_pos();
        let Some(chunk) = self.get(chunk_pos.x(), chunk_pos.z()) else {
            return false;
        };
        let section_y = pos.0.y >> 4;
        let was_empty = chunk.is_section_empty(section_y);
        {
            let mut blocks = chunk.blocks.write();
            if opacity == 0 && emission == 0 {
                blocks.remove(&pos);
            } else {
                blocks.insert(pos, (opacity, emission));
            }
        }
        was_empty != chunk.is_section_empty(section_y)
    }
}

impl ChunkSource for TestWorld {
    fn chunk(&self, chunk_x: i32, chunk_z: i32) -> Option<Arc<dyn LightChunk>> {
        self.get(chunk_x, chunk_z)
            .map(|chunk| chunk as Arc<dyn LightChunk>)
    }
}
