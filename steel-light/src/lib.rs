//! # Steel Light
//!
//! Incremental sky and block light for chunked voxel worlds.
//!
//! Chunks plug in through [`chunk::LightChunk`] and [`chunk::ChunkSource`].
//! The [`LightManager`] collects changes from any thread, merges them per
//! chunk and propagates them on one flushing thread at a time, publishing
//! finished sections for lock-free readers.
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    clippy::unwrap_used
)]
#![allow(
    clippy::single_call_fn,
    clippy::multiple_inherent_impl,
    clippy::shadow_unrelated,
    clippy::missing_errors_doc,
    clippy::struct_excessive_bools,
    clippy::needless_pass_by_value
)]

pub mod change_queue;
pub mod chunk;
pub mod completion;
pub mod config;
pub mod light_engine;
pub mod manager;
pub mod nibble;
pub mod pool;

#[cfg(test)]
mod test_support;

pub use chunk::{ChunkLightState, ChunkSource, LightChunk, LightType};
pub use completion::{BatchOutcome, CompletionSignal};
pub use config::{ConfigError, LightConfig, WorldBounds};
pub use manager::LightManager;
pub use nibble::NibbleArray;
