//! Light manager with a batched change queue.
//!
//! Callers submit changes from any thread. Changes are merged per chunk in the
//! [`ChangeQueue`] and applied by the flush loop, which only one thread runs at
//! a time:
//! 1. Deferred chunk lighting tasks of the batch run first
//! 2. Changed voxels and sections are propagated, sky light before block light
//! 3. Requested edge checks run last, then the batch's signal resolves

use std::{
    mem,
    sync::{
        Arc, Weak,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use steel_utils::{BlockPos, ChunkPos, SectionPos};

use crate::{
    change_queue::ChangeQueue,
    chunk::{ChunkSource, LightType},
    completion::{BatchOutcome, CompletionSignal},
    config::{ConfigError, LightConfig, WorldBounds},
    light_engine::{BlockLightEngine, LightPropagator, SkyLightEngine, empty_sections_for_chunk},
    nibble::{MAX_LIGHT_LEVEL, NibbleArray},
    pool::EnginePool,
};

/// Public entry point for computing and reading light.
///
/// Cheap to clone; clones share the same queue and engines.
#[derive(Clone)]
pub struct LightManager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    config: LightConfig,
    bounds: WorldBounds,
    source: Arc<dyn ChunkSource>,
    /// `None` for worlds without sky light.
    sky_pool: Option<EnginePool<SkyLightEngine>>,
    block_pool: EnginePool<BlockLightEngine>,
    queue: ChangeQueue,
    flushing: AtomicBool,
}

/// Releases the flush gate when the flush ends, including by unwinding.
struct FlushGate<'a>(&'a AtomicBool);

impl Drop for FlushGate<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl LightManager {
    /// Creates a manager lighting the chunks `source` provides.
    pub fn new(config: LightConfig, source: Arc<dyn ChunkSource>) -> Result<Self, ConfigError> {
        config.validate()?;
        let bounds = config.world_bounds();
        let sky_pool = config
            .has_sky_light
            .then(|| EnginePool::new(bounds, config.queue_capacity));
        let block_pool = EnginePool::new(bounds, config.queue_capacity);

        log::debug!(
            "Light manager for sections {}..={} (sky light: {})",
            bounds.min_section,
            bounds.max_section,
            config.has_sky_light
        );

        Ok(Self {
            inner: Arc::new(ManagerInner {
                config,
                bounds,
                source,
                sky_pool,
                block_pool,
                queue: ChangeQueue::new(bounds),
                flushing: AtomicBool::new(false),
            }),
        })
    }

    /// The configuration the manager was built with.
    #[must_use]
    pub fn config(&self) -> &LightConfig {
        &self.inner.config
    }

    /// Vertical bounds of the world.
    #[must_use]
    pub fn bounds(&self) -> WorldBounds {
        self.inner.bounds
    }

    /// Whether sky light is computed.
    #[must_use]
    pub fn has_sky_light(&self) -> bool {
        self.inner.sky_pool.is_some()
    }

    /// Lowest light section, one below the world.
    #[must_use]
    pub fn min_light_section(&self) -> i32 {
        self.inner.bounds.min_light_section()
    }

    /// Highest light section, one above the world.
    #[must_use]
    pub fn max_light_section(&self) -> i32 {
        self.inner.bounds.max_light_section()
    }

    /// Number of light sections per chunk.
    #[must_use]
    pub fn light_section_count(&self) -> usize {
        self.inner.bounds.light_section_count()
    }

    /// Published sky light of one light section of a lit chunk.
    #[must_use]
    pub fn sky_data(&self, section: SectionPos) -> Option<Arc<NibbleArray>> {
        let chunk_pos = section.chunk_pos();
        let chunk = self.inner.source.chunk(chunk_pos.x(), chunk_pos.z())?;
        if !chunk.light().is_lit() {
            return None;
        }
        let index = self.inner.bounds.light_section_index(section.y())?;
        let nibbles = chunk.light().sky_nibbles()?;
        Some(nibbles[index].visible())
    }

    /// Published block light of one light section.
    #[must_use]
    pub fn block_data(&self, section: SectionPos) -> Option<Arc<NibbleArray>> {
        let chunk_pos = section.chunk_pos();
        let chunk = self.inner.source.chunk(chunk_pos.x(), chunk_pos.z())?;
        let index = self.inner.bounds.light_section_index(section.y())?;
        Some(chunk.light().block_nibbles()[index].visible())
    }

    /// Published sky light at a voxel.
    ///
    /// Unloaded chunks and everything above the world see the open sky. In a
    /// world without sky light the value is always 0.
    #[must_use]
    pub fn sky_light_value(&self, pos: BlockPos) -> u8 {
        if !self.has_sky_light() {
            return 0;
        }
        let bounds = self.inner.bounds;
        let chunk_pos = pos.chunk_pos();
        let Some(chunk) = self.inner.source.chunk(chunk_pos.x(), chunk_pos.z()) else {
            return MAX_LIGHT_LEVEL;
        };

        let (x, mut y, z) = pos.section_relative();
        let mut section_y = pos.0.y >> 4;
        if section_y > bounds.max_light_section() {
            return MAX_LIGHT_LEVEL;
        }
        if section_y < bounds.min_light_section() {
            section_y = bounds.min_light_section();
            y = 0;
        }

        let light = chunk.light();
        if light.is_lit()
            && let Some(map) = light.sky_emptiness_map()
            && map
                .highest_non_empty()
                .is_none_or(|highest| section_y > highest)
        {
            // Nothing above blocks the sky
            return MAX_LIGHT_LEVEL;
        }

        let Some(nibbles) = light.sky_nibbles() else {
            return MAX_LIGHT_LEVEL;
        };
        bounds
            .light_section_index(section_y)
            .map_or(MAX_LIGHT_LEVEL, |index| nibbles[index].get_visible(x, y, z))
    }

    /// Published block light at a voxel. 0 outside the light range or in
    /// unloaded chunks.
    #[must_use]
    pub fn block_light_value(&self, pos: BlockPos) -> u8 {
        let Some(index) = self.inner.bounds.light_section_index(pos.0.y >> 4) else {
            return 0;
        };
        let chunk_pos = pos.chunk_pos();
        let Some(chunk) = self.inner.source.chunk(chunk_pos.x(), chunk_pos.z()) else {
            return 0;
        };
        let (x, y, z) = pos.section_relative();
        chunk.light().block_nibbles()[index].get_visible(x, y, z)
    }

    /// Whether any batch is waiting for a flush.
    #[must_use]
    pub fn has_updates(&self) -> bool {
        !self.inner.queue.is_empty()
    }

    /// Number of chunks with a pending batch.
    #[must_use]
    pub fn pending_batches(&self) -> usize {
        self.inner.queue.len()
    }

    /// Queues a changed voxel. Returns `None` for positions above or below the
    /// world, which have nothing to update.
    pub fn block_change(&self, pos: BlockPos) -> Option<CompletionSignal> {
        if !self.inner.bounds.contains_block_y(pos.0.y) {
            return None;
        }
        Some(self.inner.queue.queue_block_change(pos))
    }

    /// Queues a change of a section's emptiness.
    pub fn section_change(&self, section: SectionPos, now_empty: bool) -> CompletionSignal {
        self.inner.queue.queue_section_change(section, now_empty)
    }

    /// Lights a chunk that was just loaded and starts a flush.
    ///
    /// A chunk without light data (`is_lit == false`) is lit from scratch. A
    /// chunk whose light was loaded along with it only has its emptiness
    /// changes and borders brought up to date.
    pub fn light_chunk(&self, chunk: ChunkPos, is_lit: bool) -> CompletionSignal {
        let weak = Arc::downgrade(&self.inner);
        let signal = self.inner.queue.queue_chunk_lighting(
            chunk,
            Box::new(move || {
                if let Some(inner) = Weak::upgrade(&weak) {
                    inner.light_chunk_now(chunk, is_lit);
                }
            }),
        );
        self.schedule_updates();
        signal
    }

    /// Requests edge checks of the given sections of a chunk for one light type.
    pub fn queue_edge_checks(
        &self,
        chunk: ChunkPos,
        sections: impl IntoIterator<Item = i32>,
        light_type: LightType,
    ) -> CompletionSignal {
        let sections = sections
            .into_iter()
            .filter(|section_y| self.inner.bounds.section_index(*section_y).is_some())
            .filter_map(|section_y| i16::try_from(section_y).ok());
        self.inner.queue.queue_edge_checks(chunk, sections, light_type)
    }

    /// Drops a chunk's pending batch because the chunk unloaded.
    ///
    /// The batch's signal resolves as [`BatchOutcome::Abandoned`].
    pub fn remove_chunk(&self, chunk: ChunkPos) -> bool {
        self.inner.queue.remove_chunk(chunk)
    }

    /// Relights loaded, lit chunks from scratch and starts a flush.
    ///
    /// Chunks that are not loaded or not lit yet are dropped. Each remaining
    /// chunk is relit as part of its own batch, so unloading one target only
    /// cancels that chunk. `progress` is called for each relit chunk and `done`
    /// with the number actually relit once every target was relit or
    /// abandoned. Returns the number of chunks queued for relighting.
    pub fn relight<P, D>(
        &self,
        chunks: impl IntoIterator<Item = ChunkPos>,
        progress: P,
        done: D,
    ) -> usize
    where
        P: FnMut(ChunkPos) + Send + 'static,
        D: FnOnce(usize) + Send + 'static,
    {
        let mut seen = FxHashSet::default();
        let targets: Vec<ChunkPos> = chunks
            .into_iter()
            .filter(|pos| seen.insert(*pos))
            .filter(|pos| {
                self.inner
                    .source
                    .chunk(pos.x(), pos.z())
                    .is_some_and(|chunk| chunk.light().is_lit())
            })
            .collect();

        let count = targets.len();
        if count == 0 {
            done(0);
            return 0;
        }

        let job = Arc::new(Mutex::new(RelightJob {
            progress,
            done: Some(done),
            remaining: count,
            relit: 0,
        }));
        for pos in targets {
            let ticket = RelightTicket {
                job: Arc::clone(&job),
            };
            let weak = Arc::downgrade(&self.inner);
            let _ = self.inner.queue.queue_chunk_lighting(
                pos,
                Box::new(move || {
                    if let Some(inner) = Weak::upgrade(&weak)
                        && inner.relight_now(pos)
                    {
                        ticket.relit(pos);
                    }
                }),
            );
        }
        log::debug!("Queued relight of {count} chunks");
        self.schedule_updates();
        count
    }

    /// Runs the flush loop unless another thread is already running it.
    ///
    /// Returns whether this call flushed. Work queued while another flush runs
    /// is picked up by that flush if its chunk has not been drained yet.
    pub fn schedule_updates(&self) -> bool {
        self.inner.schedule_updates()
    }
}

impl ManagerInner {
    fn schedule_updates(&self) -> bool {
        if self.queue.is_empty() {
            return false;
        }
        if self
            .flushing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        let _gate = FlushGate(&self.flushing);

        let start = Instant::now();
        let mut sky = self.sky_pool.as_ref().map(EnginePool::acquire);
        let mut block = self.block_pool.acquire();
        let mut batches = 0usize;
        while self.propagate_changes(sky.as_deref_mut(), &mut block) {
            batches += 1;
        }

        let elapsed = start.elapsed();
        log::debug!("Light flush applied {batches} batches in {elapsed:?}");
        if elapsed > Duration::from_millis(self.config.slow_flush_warn_ms) {
            log::warn!("Slow light flush: {batches} batches took {elapsed:?}");
        }
        true
    }

    /// Applies the oldest batch. Returns `false` once the queue is empty.
    fn propagate_changes(
        &self,
        mut sky: Option<&mut SkyLightEngine>,
        block: &mut BlockLightEngine,
    ) -> bool {
        let Some(mut tasks) = self.queue.remove_first_task() else {
            return false;
        };
        let source = self.source.as_ref();
        let chunk = tasks.chunk;

        for task in mem::take(&mut tasks.light_tasks) {
            task();
        }

        if tasks.has_block_changes() {
            let sections = tasks.changed_sections.as_deref();
            if let Some(sky) = sky.as_deref_mut() {
                sky.blocks_changed_in_chunk(source, chunk, &tasks.changed_positions, sections);
            }
            block.blocks_changed_in_chunk(source, chunk, &tasks.changed_positions, sections);
        }

        if let (Some(sky), Some(edges)) = (sky, tasks.queued_edge_checks_sky.as_ref()) {
            sky.check_chunk_edges(source, chunk, Some(edges));
        }
        if let Some(edges) = tasks.queued_edge_checks_block.as_ref() {
            block.check_chunk_edges(source, chunk, Some(edges));
        }

        tasks.complete(BatchOutcome::Applied);
        true
    }

    fn light_chunk_now(&self, pos: ChunkPos, is_lit: bool) {
        let Some(chunk) = self.source.chunk(pos.x(), pos.z()) else {
            return;
        };
        let source = self.source.as_ref();
        let empty_sections = empty_sections_for_chunk(chunk.as_ref(), self.bounds);

        if is_lit {
            chunk.light().set_lit(true);
            if let Some(pool) = &self.sky_pool {
                let mut sky = pool.acquire();
                sky.force_handle_empty_section_changes(source, pos, &empty_sections);
                sky.check_chunk_edges(source, pos, None);
            }
            let mut block = self.block_pool.acquire();
            block.force_handle_empty_section_changes(source, pos, &empty_sections);
            block.check_chunk_edges(source, pos, None);
        } else {
            chunk.light().set_lit(false);
            if let Some(pool) = &self.sky_pool {
                pool.acquire().light(source, pos, &empty_sections);
            }
            self.block_pool.acquire().light(source, pos, &empty_sections);
            chunk.light().set_lit(true);
        }
    }

    /// Relights one chunk with both engines. Returns whether it was relit.
    fn relight_now(&self, pos: ChunkPos) -> bool {
        if !self
            .source
            .chunk(pos.x(), pos.z())
            .is_some_and(|chunk| chunk.light().is_lit())
        {
            return false;
        }

        let source = self.source.as_ref();
        if let Some(pool) = &self.sky_pool {
            pool.acquire()
                .relight_chunks(source, &[pos], &mut |_| {}, &mut |_| {});
        }
        let mut relit = 0;
        self.block_pool
            .acquire()
            .relight_chunks(source, &[pos], &mut |_| {}, &mut |count| relit = count);
        relit > 0
    }
}

/// Shared state of one [`LightManager::relight`] call.
struct RelightJob<P, D> {
    progress: P,
    done: Option<D>,
    remaining: usize,
    relit: usize,
}

/// One target chunk's share of a relight.
///
/// Dropped once the chunk's lighting task ran or its batch was abandoned. The
/// last ticket dropped reports the final count.
struct RelightTicket<P: FnMut(ChunkPos), D: FnOnce(usize)> {
    job: Arc<Mutex<RelightJob<P, D>>>,
}

impl<P: FnMut(ChunkPos), D: FnOnce(usize)> RelightTicket<P, D> {
    fn relit(&self, pos: ChunkPos) {
        let mut job = self.job.lock();
        job.relit += 1;
        (job.progress)(pos);
    }
}

impl<P: FnMut(ChunkPos), D: FnOnce(usize)> Drop for RelightTicket<P, D> {
    fn drop(&mut self) {
        let finished = {
            let mut job = self.job.lock();
            job.remaining -= 1;
            if job.remaining == 0 {
                job.done.take().map(|done| (done, job.relit))
            } else {
                None
            }
        };
        if let Some((done, relit)) = finished {
            log::debug!("Relight finished with {relit} chunks relit");
            done(relit);
        }
    }
}
