//! Flood-fill light propagation for sky and block light.

mod base;
mod block_light_engine;
mod cache;
pub mod direction;
pub mod light_queue;
pub mod queue_entry;
mod sky_light_engine;

// Re-export main types for convenience
pub use base::{LightEngine, LightPropagator};
pub use block_light_engine::BlockLightEngine;
pub use cache::NeighborhoodCache;
pub use direction::Direction;
pub use light_queue::LightQueue;
pub use queue_entry::QueueEntry;
pub use sky_light_engine::SkyLightEngine;

use crate::{chunk::LightChunk, config::WorldBounds};

/// Emptiness of every real section of a chunk, indexed from the lowest section.
#[must_use]
pub fn empty_sections_for_chunk(chunk: &dyn LightChunk, bounds: WorldBounds) -> Box<[bool]> {
    (bounds.min_section..=bounds.max_section)
        .map(|section_y| chunk.is_section_empty(section_y))
        .collect()
}
