//! Per-chunk aggregation of pending light changes.
//!
//! Requests for the same chunk merge into one [`ChunkTasks`] batch until the
//! flush loop takes it. Batches leave the queue in the order their chunk was
//! first touched.

use std::collections::VecDeque;

use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use steel_utils::{BlockPos, ChunkPos, SectionPos};

use crate::{
    chunk::LightType,
    completion::{BatchOutcome, Completer, CompletionSignal, completion_pair},
    config::WorldBounds,
};

/// A deferred action run at the start of its chunk's batch.
pub type LightTask = Box<dyn FnOnce() + Send>;

/// Everything pending for one chunk.
pub struct ChunkTasks {
    /// The chunk the batch belongs to.
    pub chunk: ChunkPos,
    /// Voxels whose opacity or emission changed.
    pub changed_positions: FxHashSet<BlockPos>,
    /// New emptiness per real section, indexed from the lowest section.
    pub changed_sections: Option<Box<[Option<bool>]>>,
    /// Deferred chunk lighting actions.
    pub light_tasks: Vec<LightTask>,
    /// Sections whose sky light needs an edge check.
    pub queued_edge_checks_sky: Option<FxHashSet<i16>>,
    /// Sections whose block light needs an edge check.
    pub queued_edge_checks_block: Option<FxHashSet<i16>>,
    completer: Completer,
    signal: CompletionSignal,
}

impl ChunkTasks {
    fn new(chunk: ChunkPos) -> Self {
        let (completer, signal) = completion_pair();
        Self {
            chunk,
            changed_positions: FxHashSet::default(),
            changed_sections: None,
            light_tasks: Vec::new(),
            queued_edge_checks_sky: None,
            queued_edge_checks_block: None,
            completer,
            signal,
        }
    }

    /// Whether the batch changes any voxels or sections.
    #[must_use]
    pub fn has_block_changes(&self) -> bool {
        !self.changed_positions.is_empty() || self.changed_sections.is_some()
    }

    /// Resolves the batch's completion signal.
    pub fn complete(self, outcome: BatchOutcome) {
        self.completer.complete(outcome);
    }
}

#[derive(Default)]
struct QueueState {
    /// Batches with the sequence number they were created under.
    tasks: FxHashMap<ChunkPos, (u64, ChunkTasks)>,
    /// First-touch order. Entries whose sequence no longer matches are stale.
    order: VecDeque<(u64, ChunkPos)>,
    next_seq: u64,
}

impl QueueState {
    fn entry(&mut self, chunk: ChunkPos) -> &mut ChunkTasks {
        let Self {
            tasks,
            order,
            next_seq,
        } = self;
        &mut tasks
            .entry(chunk)
            .or_insert_with(|| {
                let seq = *next_seq;
                *next_seq += 1;
                order.push_back((seq, chunk));
                (seq, ChunkTasks::new(chunk))
            })
            .1
    }

    /// Drops stale `order` entries once they outnumber the live batches.
    fn prune_order(&mut self) {
        if self.tasks.is_empty() {
            self.order.clear();
        } else if self.order.len() > self.tasks.len() * 2 {
            let tasks = &self.tasks;
            self.order
                .retain(|(seq, chunk)| tasks.get(chunk).is_some_and(|(current, _)| current == seq));
        }
    }
}

/// Thread-safe queue of pending batches keyed by chunk.
pub struct ChangeQueue {
    bounds: WorldBounds,
    state: Mutex<QueueState>,
}

impl ChangeQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new(bounds: WorldBounds) -> Self {
        Self {
            bounds,
            state: Mutex::new(QueueState::default()),
        }
    }

    /// Whether no batch is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.lock().tasks.is_empty()
    }

    /// Number of pending batches.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().tasks.len()
    }

    /// Records a changed voxel.
    pub fn queue_block_change(&self, pos: BlockPos) -> CompletionSignal {
        let mut state = self.state.lock();
        let tasks = state.entry(pos.chunk_pos());
        tasks.changed_positions.insert(pos);
        tasks.signal.clone()
    }

    /// Records a section's new emptiness. Sections outside the world are ignored
    /// but still join the chunk's batch.
    pub fn queue_section_change(&self, pos: SectionPos, now_empty: bool) -> CompletionSignal {
        let section_count = self.bounds.section_count();
        let index = self.bounds.section_index(pos.y());
        let mut state = self.state.lock();
        let tasks = state.entry(pos.chunk_pos());
        if let Some(index) = index {
            let changes = tasks
                .changed_sections
                .get_or_insert_with(|| vec![None; section_count].into_boxed_slice());
            changes[index] = Some(now_empty);
        }
        tasks.signal.clone()
    }

    /// Queues a deferred action for a chunk.
    pub fn queue_chunk_lighting(&self, chunk: ChunkPos, task: LightTask) -> CompletionSignal {
        let mut state = self.state.lock();
        let tasks = state.entry(chunk);
        tasks.light_tasks.push(task);
        tasks.signal.clone()
    }

    /// Requests edge checks for some sections of a chunk.
    pub fn queue_edge_checks(
        &self,
        chunk: ChunkPos,
        sections: impl IntoIterator<Item = i16>,
        light_type: LightType,
    ) -> CompletionSignal {
        let mut state = self.state.lock();
        let tasks = state.entry(chunk);
        let set = match light_type {
            LightType::Sky => &mut tasks.queued_edge_checks_sky,
            LightType::Block => &mut tasks.queued_edge_checks_block,
        };
        set.get_or_insert_with(FxHashSet::default).extend(sections);
        tasks.signal.clone()
    }

    /// Drops a chunk's pending batch, resolving it as abandoned.
    ///
    /// Returns whether a batch was pending.
    pub fn remove_chunk(&self, chunk: ChunkPos) -> bool {
        let removed = {
            let mut state = self.state.lock();
            let removed = state.tasks.remove(&chunk);
            if removed.is_some() {
                state.prune_order();
            }
            removed
        };
        // Resolve outside the lock, awaiting code may queue more work
        match removed {
            Some((_, tasks)) => {
                log::debug!("Abandoned light batch for unloaded chunk {chunk}");
                tasks.complete(BatchOutcome::Abandoned);
                true
            }
            None => false,
        }
    }

    /// Takes the batch whose chunk was touched first.
    pub fn remove_first_task(&self) -> Option<ChunkTasks> {
        let mut state = self.state.lock();
        while let Some((seq, chunk)) = state.order.pop_front() {
            if state.tasks.get(&chunk).is_some_and(|(current, _)| *current == seq) {
                return state.tasks.remove(&chunk).map(|(_, tasks)| tasks);
            }
        }
        None
    }
}
