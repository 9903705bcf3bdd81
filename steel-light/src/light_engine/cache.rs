//! Chunk neighborhood cache used during one propagation pass.
//!
//! A pass touches the center chunk and everything light can reach from it, so
//! the cache holds a 5x5 grid of chunks around the center. Each cached chunk's
//! nibble arrays of the pass's light type are checked out for the whole pass
//! and handed back on [`NeighborhoodCache::commit`].

use std::{mem, sync::Arc};

use steel_utils::{BlockPos, ChunkPos};

use crate::{
    chunk::{ChunkSource, LightChunk, LightType},
    config::WorldBounds,
    nibble::NibbleArray,
};

/// How many chunks the cache reaches out from the center on each axis.
const RADIUS: i32 = 2;

/// Width of the cached grid.
const WIDTH: usize = (RADIUS as usize) * 2 + 1;

/// A chunk taking part in the current pass.
struct CachedChunk {
    chunk: Arc<dyn LightChunk>,
    /// Checked out arrays, indexed by light section.
    sections: Box<[NibbleArray]>,
    /// Which arrays were written during the pass.
    dirty: Box<[bool]>,
}

/// Chunks and checked out light data around a pass's center chunk.
///
/// Positions outside the grid, in chunks that are not loaded, or in neighbors
/// that are not lit yet read as inaccessible. Propagation treats them as opaque.
pub struct NeighborhoodCache {
    light_type: LightType,
    bounds: WorldBounds,
    center: ChunkPos,
    chunks: [Option<CachedChunk>; WIDTH * WIDTH],
}

impl NeighborhoodCache {
    /// Creates an empty cache for one light type.
    #[must_use]
    pub fn new(light_type: LightType, bounds: WorldBounds) -> Self {
        Self {
            light_type,
            bounds,
            center: ChunkPos::new(0, 0),
            chunks: std::array::from_fn(|_| None),
        }
    }

    /// Loads the neighborhood of `center` and checks out its light data.
    ///
    /// Neighbors only take part once they are lit. The center does too unless
    /// `include_unlit_center` is set. Returns whether the center is cached.
    pub fn setup(
        &mut self,
        source: &dyn ChunkSource,
        center: ChunkPos,
        include_unlit_center: bool,
    ) -> bool {
        debug_assert!(self.is_clear(), "cache set up twice without teardown");
        self.center = center;

        for dz in -RADIUS..=RADIUS {
            for dx in -RADIUS..=RADIUS {
                let pos = center.offset(dx, dz);
                let Some(chunk) = source.chunk(pos.x(), pos.z()) else {
                    continue;
                };
                let is_center = dx == 0 && dz == 0;
                if !chunk.light().is_lit() && !(is_center && include_unlit_center) {
                    continue;
                }
                let Some(slots) = chunk.light().nibbles(self.light_type) else {
                    continue;
                };

                let sections: Box<[NibbleArray]> = slots.iter().map(|slot| slot.checkout()).collect();
                let dirty = vec![false; sections.len()].into_boxed_slice();
                if let Some(index) = self.grid_index(pos.x(), pos.z()) {
                    self.chunks[index] = Some(CachedChunk {
                        chunk,
                        sections,
                        dirty,
                    });
                }
            }
        }

        self.chunks[Self::CENTER_INDEX].is_some()
    }

    const CENTER_INDEX: usize = (WIDTH * WIDTH) / 2;

    fn is_clear(&self) -> bool {
        self.chunks.iter().all(Option::is_none)
    }

    #[inline]
    fn grid_index(&self, chunk_x: i32, chunk_z: i32) -> Option<usize> {
        let dx = chunk_x - self.center.x() + RADIUS;
        let dz = chunk_z - self.center.z() + RADIUS;
        if !(0..WIDTH as i32).contains(&dx) || !(0..WIDTH as i32).contains(&dz) {
            return None;
        }
        Some(dz as usize * WIDTH + dx as usize)
    }

    #[inline]
    fn cached(&self, pos: BlockPos) -> Option<&CachedChunk> {
        self.grid_index(pos.0.x >> 4, pos.0.z >> 4)
            .and_then(|index| self.chunks[index].as_ref())
    }

    #[inline]
    fn cached_mut(&mut self, pos: BlockPos) -> Option<&mut CachedChunk> {
        self.grid_index(pos.0.x >> 4, pos.0.z >> 4)
            .and_then(|index| self.chunks[index].as_mut())
    }

    /// The center chunk of the current pass.
    #[must_use]
    pub fn center(&self) -> ChunkPos {
        self.center
    }

    /// The center chunk if it is cached.
    #[must_use]
    pub fn center_chunk(&self) -> Option<&Arc<dyn LightChunk>> {
        self.chunks[Self::CENTER_INDEX].as_ref().map(|cached| &cached.chunk)
    }

    /// Whether the chunk takes part in the pass.
    #[must_use]
    pub fn contains_chunk(&self, pos: ChunkPos) -> bool {
        self.grid_index(pos.x(), pos.z())
            .is_some_and(|index| self.chunks[index].is_some())
    }

    /// Reads a light level. `None` for inaccessible positions.
    ///
    /// Virtual sections are readable.
    #[must_use]
    #[inline]
    pub fn get(&self, pos: BlockPos) -> Option<u8> {
        let index = self.bounds.light_section_index(pos.0.y >> 4)?;
        let cached = self.cached(pos)?;
        let (x, y, z) = pos.section_relative();
        Some(cached.sections[index].get(x, y, z))
    }

    /// Whether the position lies in a real section of a cached chunk.
    #[must_use]
    #[inline]
    pub fn is_writable(&self, pos: BlockPos) -> bool {
        self.bounds.contains_block_y(pos.0.y) && self.cached(pos).is_some()
    }

    /// Writes a light level. Returns `false` without writing for positions that
    /// are not writable.
    #[inline]
    pub fn set(&mut self, pos: BlockPos, level: u8) -> bool {
        let Some(index) = self.bounds.light_section_index(pos.0.y >> 4) else {
            return false;
        };
        if !self.bounds.contains_block_y(pos.0.y) {
            return false;
        }
        let Some(cached) = self.cached_mut(pos) else {
            return false;
        };
        let (x, y, z) = pos.section_relative();
        let section = &mut cached.sections[index];
        if section.get(x, y, z) != level {
            section.set(x, y, z, level);
            cached.dirty[index] = true;
        }
        true
    }

    /// Sets every voxel of one real section of a cached chunk.
    pub fn fill_section(&mut self, chunk: ChunkPos, section_y: i32, level: u8) {
        if self.bounds.section_index(section_y).is_none() {
            return;
        }
        let Some(index) = self.bounds.light_section_index(section_y) else {
            return;
        };
        let Some(grid) = self.grid_index(chunk.x(), chunk.z()) else {
            return;
        };
        if let Some(cached) = self.chunks[grid].as_mut() {
            let section = &mut cached.sections[index];
            if section.uniform_value() != Some(level) {
                section.fill(level);
                cached.dirty[index] = true;
            }
        }
    }

    /// Opacity of a voxel. Inaccessible chunks are opaque, positions above or
    /// below the world are not.
    #[must_use]
    #[inline]
    pub fn opacity(&self, pos: BlockPos) -> u8 {
        let Some(cached) = self.cached(pos) else {
            return 15;
        };
        if !self.bounds.contains_block_y(pos.0.y) {
            return 0;
        }
        let (x, _, z) = pos.section_relative();
        cached.chunk.opacity(x, pos.0.y, z).min(15)
    }

    /// Emission of a voxel, 0 for inaccessible positions.
    #[must_use]
    #[inline]
    pub fn emission(&self, pos: BlockPos) -> u8 {
        match self.cached(pos) {
            Some(cached) if self.bounds.contains_block_y(pos.0.y) => {
                let (x, _, z) = pos.section_relative();
                cached.chunk.emission(x, pos.0.y, z).min(15)
            }
            _ => 0,
        }
    }

    /// Hands every checked out array back, publishing the ones that changed.
    ///
    /// Returns how many arrays were published.
    pub fn commit(&mut self) -> usize {
        let mut published = 0;
        for slot in &mut self.chunks {
            let Some(mut cached) = slot.take() else {
                continue;
            };
            let Some(nibbles) = cached.chunk.light().nibbles(self.light_type) else {
                continue;
            };
            for ((nibble, data), dirty) in nibbles
                .iter()
                .zip(cached.sections.iter_mut())
                .zip(cached.dirty.iter())
            {
                nibble.commit(mem::take(data), *dirty);
                published += usize::from(*dirty);
            }
        }
        published
    }

    /// Drops every checked out array, restoring the last published state.
    pub fn discard(&mut self) {
        for slot in &mut self.chunks {
            let Some(cached) = slot.take() else {
                continue;
            };
            if let Some(nibbles) = cached.chunk.light().nibbles(self.light_type) {
                for nibble in nibbles {
                    nibble.discard();
                }
            }
        }
    }
}
