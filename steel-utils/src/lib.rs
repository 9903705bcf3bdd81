//! Shared utilities for the Steel lighting workspace.
//!
//! Holds the coordinate wrapper types every crate agrees on and the logging
//! bootstrap used by binaries, benchmarks and tests.

pub mod logger;
pub mod math;
pub mod types;

pub use types::{BlockPos, ChunkPos, SectionPos};
