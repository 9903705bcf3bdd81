//! Packed propagation queue entries.
//!
//! An entry is the level a voxel held (or now holds) plus the set of
//! directions the update still has to travel, packed into 16 bits:
//!
//! ```text
//!  15 ........ 10  9 ........... 4  3 ..... 0
//! |    unused    | direction set  |  level   |
//! ```

use super::direction::Direction;

const LEVEL_BITS: u32 = 4;
const LEVEL_MASK: u16 = (1 << LEVEL_BITS) - 1;
const ALL_DIRECTIONS: u8 = 0b11_1111;

/// A light level and the directions it propagates in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueEntry(u16);

impl QueueEntry {
    /// Level 0 travelling nowhere. Fills unused ring buffer slots.
    pub const EMPTY: Self = Self(0);

    #[inline]
    const fn pack(level: u8, directions: u8) -> Self {
        debug_assert!(level <= 15, "light level out of range");
        Self(((directions as u16) << LEVEL_BITS) | (level as u16 & LEVEL_MASK))
    }

    /// The carried light level, 0 to 15.
    #[must_use]
    #[inline]
    pub const fn level(self) -> u8 {
        (self.0 & LEVEL_MASK) as u8
    }

    /// Whether the update continues in `dir`.
    #[must_use]
    #[inline]
    pub const fn should_propagate(self, dir: Direction) -> bool {
        ((self.0 >> LEVEL_BITS) as u8 & dir.flag()) != 0
    }

    /// A decrease spreading everywhere.
    #[must_use]
    pub const fn decrease_all_directions(level: u8) -> Self {
        Self::pack(level, ALL_DIRECTIONS)
    }

    /// A decrease spreading everywhere except back toward where it came from.
    #[must_use]
    pub const fn decrease_skip_one_direction(level: u8, skip: Direction) -> Self {
        Self::pack(level, ALL_DIRECTIONS & !skip.flag())
    }

    /// A decrease crossing a single face.
    #[must_use]
    pub const fn decrease_only_one_direction(level: u8, dir: Direction) -> Self {
        Self::pack(level, dir.flag())
    }

    /// An increase spreading everywhere, as from a light source.
    #[must_use]
    pub const fn increase_all_directions(level: u8) -> Self {
        Self::pack(level, ALL_DIRECTIONS)
    }

    /// An increase spreading everywhere except back toward where it came from.
    #[must_use]
    pub const fn increase_skip_one_direction(level: u8, skip: Direction) -> Self {
        Self::pack(level, ALL_DIRECTIONS & !skip.flag())
    }

    /// An increase crossing a single face.
    #[must_use]
    pub const fn increase_only_one_direction(level: u8, dir: Direction) -> Self {
        Self::pack(level, dir.flag())
    }
}
