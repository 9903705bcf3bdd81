//! Base light engine for flood-fill light propagation.
//!
//! Both light types share the same two-phase algorithm:
//! 1. Process all decrease operations first (remove old light and re-seed
//!    the neighbors that are lit independently of the removed light)
//! 2. Process all increase operations second (add new light)
//!
//! Running decreases to completion before any increase keeps the result
//! independent of the order entries were queued in.

use std::time::Instant;

use rustc_hash::FxHashSet;
use steel_utils::{BlockPos, ChunkPos, SectionPos};

use super::{
    cache::NeighborhoodCache, direction::Direction, empty_sections_for_chunk,
    light_queue::LightQueue, queue_entry::QueueEntry,
};
use crate::{
    chunk::{ChunkSource, LightType},
    config::WorldBounds,
    nibble::MAX_LIGHT_LEVEL,
};

/// Light propagation state shared by the sky and block engines.
///
/// This structure owns two FIFO queues and the neighborhood cache of the
/// current pass. It is not thread-safe; the engine pool hands each instance to
/// one pass at a time.
pub struct LightEngine {
    light_type: LightType,
    bounds: WorldBounds,
    /// Queue for light increase operations.
    increase_queue: LightQueue,
    /// Queue for light decrease operations.
    decrease_queue: LightQueue,
    cache: NeighborhoodCache,
}

impl LightEngine {
    /// Creates an engine with queues of the given initial capacity.
    #[must_use]
    pub fn new(light_type: LightType, bounds: WorldBounds, queue_capacity: usize) -> Self {
        Self {
            light_type,
            bounds,
            increase_queue: LightQueue::with_capacity(queue_capacity),
            decrease_queue: LightQueue::with_capacity(queue_capacity),
            cache: NeighborhoodCache::new(light_type, bounds),
        }
    }

    /// The light type this engine computes.
    #[must_use]
    pub fn light_type(&self) -> LightType {
        self.light_type
    }

    /// The world bounds this engine works in.
    #[must_use]
    pub fn bounds(&self) -> WorldBounds {
        self.bounds
    }

    /// Enqueues a light increase at the given position.
    pub fn enqueue_increase(&mut self, pos: BlockPos, entry: QueueEntry) {
        self.increase_queue.enqueue(pos, entry);
    }

    /// Enqueues a light decrease at the given position.
    pub fn enqueue_decrease(&mut self, pos: BlockPos, entry: QueueEntry) {
        self.decrease_queue.enqueue(pos, entry);
    }

    /// Checks if there are any pending light updates.
    #[must_use]
    pub fn has_work(&self) -> bool {
        !self.increase_queue.is_empty() || !self.decrease_queue.is_empty()
    }

    /// The cache of the running pass.
    #[must_use]
    pub fn cache(&self) -> &NeighborhoodCache {
        &self.cache
    }

    /// Mutable access to the cache of the running pass.
    pub fn cache_mut(&mut self) -> &mut NeighborhoodCache {
        &mut self.cache
    }

    /// Starts a pass around `center`. Returns `false` if the center cannot be
    /// lit, in which case the pass is already torn down.
    pub fn setup(
        &mut self,
        source: &dyn ChunkSource,
        center: ChunkPos,
        include_unlit_center: bool,
    ) -> bool {
        self.increase_queue.clear();
        self.decrease_queue.clear();
        if self.cache.setup(source, center, include_unlit_center) {
            return true;
        }
        self.cache.discard();
        false
    }

    /// Finishes a pass, publishing everything it changed.
    pub fn teardown(&mut self) {
        debug_assert!(!self.has_work(), "pass torn down with queued work");
        let published = self.cache.commit();
        log::trace!(
            "{:?} light pass around {} published {published} sections",
            self.light_type,
            self.cache.center()
        );
    }

    /// Abandons a pass that did not finish, restoring the last published data.
    pub fn abort_pass(&mut self) {
        self.increase_queue.clear();
        self.decrease_queue.clear();
        self.cache.discard();
    }

    /// Light a voxel produces on its own: emission for block light, nothing
    /// for sky light.
    #[must_use]
    #[inline]
    pub fn source_level(&self, pos: BlockPos) -> u8 {
        match self.light_type {
            LightType::Sky => 0,
            LightType::Block => self.cache.emission(pos),
        }
    }

    /// Light arriving at `to` from a neighbor at `level`, moving in `dir`.
    ///
    /// Every step costs at least one level. Full sky light falling straight
    /// down through a transparent voxel is the only exception.
    #[must_use]
    #[inline]
    pub fn attenuate(&self, level: u8, to: BlockPos, dir: Direction) -> u8 {
        let opacity = self.cache.opacity(to);
        if opacity >= MAX_LIGHT_LEVEL {
            return 0;
        }
        if self.light_type == LightType::Sky
            && dir == Direction::Down
            && level == MAX_LIGHT_LEVEL
            && opacity == 0
        {
            return MAX_LIGHT_LEVEL;
        }
        level.saturating_sub(opacity.max(1))
    }

    /// Runs all queued light updates until both queues are empty.
    pub fn run_light_updates(&mut self) {
        let start = Instant::now();
        let decreases = self.propagate_decreases();
        let increases = self.propagate_increases();
        log::trace!(
            "{:?} light around {}: {decreases} decreases, {increases} increases in {:?}",
            self.light_type,
            self.cache.center(),
            start.elapsed()
        );
    }

    /// Processes all light decrease operations. Returns how many were handled.
    ///
    /// Each entry carries the level its position held before it was darkened.
    /// A neighbor brighter than that level could have provided is lit by
    /// something else and is re-seeded as an increase instead.
    fn propagate_decreases(&mut self) -> usize {
        let mut handled = 0;
        while let Some((pos, entry)) = self.decrease_queue.dequeue() {
            handled += 1;
            let level = entry.level();

            for dir in Direction::ALL {
                if !entry.should_propagate(dir) {
                    continue;
                }
                let neighbor = dir.relative(pos);
                let Some(current) = self.cache.get(neighbor) else {
                    continue;
                };
                if current == 0 {
                    continue;
                }

                if !self.cache.is_writable(neighbor) {
                    // Virtual sections keep their light and shine back in
                    self.increase_queue.enqueue(
                        neighbor,
                        QueueEntry::increase_only_one_direction(current, dir.opposite()),
                    );
                    continue;
                }

                let expected = self.attenuate(level, neighbor, dir);
                if current > expected {
                    self.increase_queue
                        .enqueue(neighbor, QueueEntry::increase_all_directions(current));
                    continue;
                }

                let source = self.source_level(neighbor);
                self.cache.set(neighbor, source);
                if source > 0 {
                    self.increase_queue
                        .enqueue(neighbor, QueueEntry::increase_all_directions(source));
                }
                self.decrease_queue.enqueue(
                    neighbor,
                    QueueEntry::decrease_skip_one_direction(current, dir.opposite()),
                );
            }
        }
        handled
    }

    /// Processes all light increase operations. Returns how many were handled.
    fn propagate_increases(&mut self) -> usize {
        let mut handled = 0;
        while let Some((pos, entry)) = self.increase_queue.dequeue() {
            let level = entry.level();
            // Stale: a later write replaced the level this entry was queued with
            if self.cache.get(pos) != Some(level) {
                continue;
            }
            handled += 1;

            for dir in Direction::ALL {
                if !entry.should_propagate(dir) {
                    continue;
                }
                let neighbor = dir.relative(pos);
                if !self.cache.is_writable(neighbor) {
                    continue;
                }
                let Some(current) = self.cache.get(neighbor) else {
                    continue;
                };
                let target = self.attenuate(level, neighbor, dir);
                if target <= current {
                    continue;
                }

                self.cache.set(neighbor, target);
                if target > 1 {
                    self.increase_queue.enqueue(
                        neighbor,
                        QueueEntry::increase_skip_one_direction(target, dir.opposite()),
                    );
                }
            }
        }
        handled
    }

    /// Sets a changed voxel to its own source level and queues the work that
    /// brings its surroundings back in line.
    pub fn handle_changed_position(&mut self, pos: BlockPos) {
        let Some(old) = self.cache.get(pos) else {
            return;
        };
        if !self.cache.is_writable(pos) {
            return;
        }

        let source = self.source_level(pos);
        self.cache.set(pos, source);
        if old > source {
            self.decrease_queue
                .enqueue(pos, QueueEntry::decrease_all_directions(old));
        }
        if source > 0 {
            self.increase_queue
                .enqueue(pos, QueueEntry::increase_all_directions(source));
        }

        if self.cache.opacity(pos) < MAX_LIGHT_LEVEL {
            // Let lit neighbors flow back in
            for dir in Direction::ALL {
                let neighbor = dir.relative(pos);
                match self.cache.get(neighbor) {
                    Some(level) if level > 0 => self.increase_queue.enqueue(
                        neighbor,
                        QueueEntry::increase_only_one_direction(level, dir.opposite()),
                    ),
                    _ => {}
                }
            }
        }
    }

    /// Queues decreases of the center's current edge values into neighbors,
    /// so light they derived from the center is re-derived.
    pub fn enqueue_edge_decreases(&mut self) {
        let center = self.cache.center();
        for (pos, dir) in edge_voxels(center, self.bounds, None) {
            if !self.cache.contains_chunk(dir.relative(pos).chunk_pos()) {
                continue;
            }
            if let Some(level) = self.cache.get(pos).filter(|level| *level > 0) {
                self.decrease_queue
                    .enqueue(pos, QueueEntry::decrease_only_one_direction(level, dir));
            }
        }
    }

    /// Queues increases from neighbor voxels bordering the center, pointing in.
    pub fn enqueue_neighbor_edge_increases(&mut self) {
        let center = self.cache.center();
        for (pos, dir) in edge_voxels(center, self.bounds, None) {
            let outside = dir.relative(pos);
            if let Some(level) = self.cache.get(outside).filter(|level| *level > 0) {
                self.increase_queue.enqueue(
                    outside,
                    QueueEntry::increase_only_one_direction(level, dir.opposite()),
                );
            }
        }
    }

    /// Resets the light of every real section of the center to zero.
    pub fn reset_center(&mut self) {
        let center = self.cache.center();
        for section_y in self.bounds.min_section..=self.bounds.max_section {
            self.cache.fill_section(center, section_y, 0);
        }
    }

    /// Whether a voxel's level can be explained by its own source or by one of
    /// its neighbors.
    fn is_justified(&self, pos: BlockPos, level: u8) -> bool {
        if level <= self.source_level(pos) {
            return true;
        }
        Direction::ALL.iter().any(|&dir| {
            let from = dir.opposite().relative(pos);
            self.cache
                .get(from)
                .is_some_and(|neighbor| self.attenuate(neighbor, pos, dir) >= level)
        })
    }

    /// Re-checks the voxel pairs on the center's chunk borders.
    ///
    /// Voxels holding light neither side can justify any more are darkened,
    /// then light is pushed across every border pair in both directions.
    pub fn check_edges(&mut self, sections: Option<&FxHashSet<i16>>) {
        let center = self.cache.center();
        let edges: Vec<(BlockPos, Direction)> = edge_voxels(center, self.bounds, sections)
            .filter(|(pos, dir)| self.cache.contains_chunk(dir.relative(*pos).chunk_pos()))
            .collect();

        for &(inside, dir) in &edges {
            let outside = dir.relative(inside);
            for pos in [inside, outside] {
                let Some(level) = self.cache.get(pos) else {
                    continue;
                };
                if level == 0 || self.is_justified(pos, level) {
                    continue;
                }
                let source = self.source_level(pos);
                self.cache.set(pos, source);
                self.decrease_queue
                    .enqueue(pos, QueueEntry::decrease_all_directions(level));
                if source > 0 {
                    self.increase_queue
                        .enqueue(pos, QueueEntry::increase_all_directions(source));
                }
            }
        }

        for &(inside, dir) in &edges {
            let outside = dir.relative(inside);
            if let Some(level) = self.cache.get(inside).filter(|level| *level > 0) {
                self.increase_queue
                    .enqueue(inside, QueueEntry::increase_only_one_direction(level, dir));
            }
            if let Some(level) = self.cache.get(outside).filter(|level| *level > 0) {
                self.increase_queue.enqueue(
                    outside,
                    QueueEntry::increase_only_one_direction(level, dir.opposite()),
                );
            }
        }
    }
}

/// Voxels of a chunk touching its horizontal borders, paired with the
/// direction leading out of the chunk. Limited to `sections` when given.
pub(crate) fn edge_voxels(
    chunk: ChunkPos,
    bounds: WorldBounds,
    sections: Option<&FxHashSet<i16>>,
) -> impl Iterator<Item = (BlockPos, Direction)> + '_ {
    let min_x = chunk.min_block_x();
    let min_z = chunk.min_block_z();
    (bounds.min_section..=bounds.max_section)
        .filter(move |section_y| {
            sections.is_none_or(|set| i16::try_from(*section_y).is_ok_and(|y| set.contains(&y)))
        })
        .flat_map(move |section_y| (section_y << 4)..(section_y << 4) + 16)
        .flat_map(move |y| {
            (0..16).flat_map(move |i| {
                [
                    (BlockPos::new(min_x + i, y, min_z), Direction::North),
                    (BlockPos::new(min_x + i, y, min_z + 15), Direction::South),
                    (BlockPos::new(min_x, y, min_z + i), Direction::West),
                    (BlockPos::new(min_x + 15, y, min_z + i), Direction::East),
                ]
            })
        })
}

/// Operations every propagation engine provides.
///
/// Implementors only decide how a freshly reset chunk seeds its own light;
/// everything else is shared.
pub trait LightPropagator: Send {
    /// Creates an engine for the given world bounds.
    fn create(bounds: WorldBounds, queue_capacity: usize) -> Self
    where
        Self: Sized;

    /// The shared propagation state.
    fn engine(&mut self) -> &mut LightEngine;

    /// Seeds the light a chunk produces by itself after its center sections
    /// were reset. `empty_sections` is indexed from the lowest real section.
    fn seed_sources(&mut self, empty_sections: &[bool]);

    /// Fully (re)computes a chunk's light.
    ///
    /// Works on unlit chunks too. Returns `false` if the chunk is not loaded.
    fn light(&mut self, source: &dyn ChunkSource, chunk: ChunkPos, empty_sections: &[bool]) -> bool {
        let engine = self.engine();
        if !engine.setup(source, chunk, true) {
            return false;
        }
        if let Some(map) = engine
            .cache()
            .center_chunk()
            .and_then(|center| center.light().emptiness_map(engine.light_type()))
        {
            map.replace(empty_sections);
        }

        engine.enqueue_edge_decreases();
        engine.reset_center();
        self.seed_sources(empty_sections);

        let engine = self.engine();
        engine.enqueue_neighbor_edge_increases();
        engine.run_light_updates();
        engine.teardown();
        true
    }

    /// Incrementally updates light after voxels of a lit chunk changed.
    ///
    /// `section_changes` holds new emptiness values indexed from the lowest
    /// real section; every voxel of a changed section counts as changed.
    fn blocks_changed_in_chunk(
        &mut self,
        source: &dyn ChunkSource,
        chunk: ChunkPos,
        positions: &FxHashSet<BlockPos>,
        section_changes: Option<&[Option<bool>]>,
    ) -> bool {
        let engine = self.engine();
        if !engine.setup(source, chunk, false) {
            return false;
        }
        let bounds = engine.bounds();

        if let Some(changes) = section_changes {
            if let Some(map) = engine
                .cache()
                .center_chunk()
                .and_then(|center| center.light().emptiness_map(engine.light_type()))
            {
                for (index, change) in changes.iter().enumerate() {
                    if let Some(empty) = change {
                        map.set(bounds.min_section + index as i32, *empty);
                    }
                }
            }

            for (index, change) in changes.iter().enumerate() {
                if change.is_none() {
                    continue;
                }
                let origin =
                    SectionPos::new(chunk.x(), bounds.min_section + index as i32, chunk.z()).origin();
                for y in 0..16 {
                    for z in 0..16 {
                        for x in 0..16 {
                            engine.handle_changed_position(origin.offset(x, y, z));
                        }
                    }
                }
            }
        }

        for &pos in positions {
            if pos.chunk_pos() == chunk {
                engine.handle_changed_position(pos);
            }
        }

        engine.run_light_updates();
        engine.teardown();
        true
    }

    /// Re-propagates light across the borders of a lit chunk, optionally only
    /// for the given sections.
    fn check_chunk_edges(
        &mut self,
        source: &dyn ChunkSource,
        chunk: ChunkPos,
        sections: Option<&FxHashSet<i16>>,
    ) -> bool {
        let engine = self.engine();
        if !engine.setup(source, chunk, false) {
            return false;
        }
        engine.check_edges(sections);
        engine.run_light_updates();
        engine.teardown();
        true
    }

    /// Brings a lit chunk's stored emptiness map in line with `empty_sections`
    /// without relighting it from scratch.
    fn force_handle_empty_section_changes(
        &mut self,
        source: &dyn ChunkSource,
        chunk: ChunkPos,
        empty_sections: &[bool],
    ) -> bool {
        let light_type = self.engine().light_type();
        let Some(loaded) = source.chunk(chunk.x(), chunk.z()) else {
            return false;
        };
        let Some(map) = loaded.light().emptiness_map(light_type) else {
            return false;
        };

        let stored = map.snapshot();
        let changes: Box<[Option<bool>]> = stored
            .iter()
            .zip(empty_sections)
            .map(|(old, new)| (old != new).then_some(*new))
            .collect();
        if changes.iter().all(Option::is_none) {
            return true;
        }
        self.blocks_changed_in_chunk(source, chunk, &FxHashSet::default(), Some(&changes))
    }

    /// Fully relights each chunk in turn.
    ///
    /// `progress` is called after every chunk that was lit, `completion` once
    /// at the end with the number of chunks lit.
    fn relight_chunks(
        &mut self,
        source: &dyn ChunkSource,
        chunks: &[ChunkPos],
        progress: &mut dyn FnMut(ChunkPos),
        completion: &mut dyn FnMut(usize),
    ) {
        let bounds = self.engine().bounds();
        let mut lit = 0;
        for &pos in chunks {
            let Some(loaded) = source.chunk(pos.x(), pos.z()) else {
                continue;
            };
            let empty_sections = empty_sections_for_chunk(loaded.as_ref(), bounds);
            if self.light(source, pos, &empty_sections) {
                lit += 1;
                progress(pos);
            }
        }
        completion(lit);
    }
}
