//! FIFO queue for light propagation entries.
//!
//! Uses a simple ring buffer so a propagation engine can keep its allocation
//! between passes.

use steel_utils::BlockPos;

use super::queue_entry::QueueEntry;

const EMPTY_SLOT: (BlockPos, QueueEntry) = (BlockPos::new(0, 0, 0), QueueEntry::EMPTY);

/// A FIFO queue for light propagation using a ring buffer.
///
/// Stores pairs of (`BlockPos`, `QueueEntry`) for processing light changes.
/// The capacity is always a power of two so wrapping is a mask.
#[derive(Debug)]
pub struct LightQueue {
    buffer: Box<[(BlockPos, QueueEntry)]>,
    mask: usize,
    head: usize,
    size: usize,
}

impl LightQueue {
    /// Creates a new light queue with at least the given capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(16).next_power_of_two();
        Self {
            buffer: vec![EMPTY_SLOT; capacity].into_boxed_slice(),
            mask: capacity - 1,
            head: 0,
            size: 0,
        }
    }

    /// Enqueues a position and queue entry for processing.
    #[inline]
    pub fn enqueue(&mut self, pos: BlockPos, entry: QueueEntry) {
        if self.size == self.buffer.len() {
            self.grow();
        }

        let tail = (self.head + self.size) & self.mask;
        self.buffer[tail] = (pos, entry);
        self.size += 1;
    }

    /// Dequeues the next position and queue entry.
    ///
    /// Returns `None` if the queue is empty.
    #[inline]
    pub fn dequeue(&mut self) -> Option<(BlockPos, QueueEntry)> {
        if self.size == 0 {
            return None;
        }

        let item = self.buffer[self.head];
        self.head = (self.head + 1) & self.mask;
        self.size -= 1;

        Some(item)
    }

    /// Checks if the queue is empty.
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Returns the number of entries in the queue.
    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.size
    }

    /// Returns the number of entries the queue holds before growing.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Clears all entries, keeping the allocation.
    #[inline]
    pub fn clear(&mut self) {
        self.head = 0;
        self.size = 0;
    }

    /// Doubles the buffer, unrolling the ring to the front.
    fn grow(&mut self) {
        let new_capacity = self.buffer.len() * 2;
        let mut new_buffer = vec![EMPTY_SLOT; new_capacity].into_boxed_slice();

        for (slot, offset) in new_buffer.iter_mut().zip(0..self.size) {
            *slot = self.buffer[(self.head + offset) & self.mask];
        }

        self.buffer = new_buffer;
        self.mask = new_capacity - 1;
        self.head = 0;
    }
}
