// Wrapper types making it harder to accidentaly use the wrong underlying type.

use std::fmt::{self, Display};

use crate::math::{vector2::Vector2, vector3::Vector3};

/// Number of bits to shift a block coordinate by to get its chunk or section coordinate.
pub const SECTION_SHIFT: i32 = 4;

/// Mask to get the coordinate of a block relative to its section.
pub const SECTION_MASK: i32 = 15;

// A chunk position. `0.y` holds the z coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkPos(pub Vector2<i32>);

impl ChunkPos {
    /// Creates a chunk position from chunk coordinates.
    #[must_use]
    pub const fn new(x: i32, z: i32) -> Self {
        Self(Vector2::new(x, z))
    }

    /// The chunk x coordinate.
    #[must_use]
    pub const fn x(self) -> i32 {
        self.0.x
    }

    /// The chunk z coordinate.
    #[must_use]
    pub const fn z(self) -> i32 {
        self.0.y
    }

    /// Returns the chunk offset by `dx`/`dz` chunks.
    #[must_use]
    pub const fn offset(self, dx: i32, dz: i32) -> Self {
        Self::new(self.0.x + dx, self.0.y + dz)
    }

    /// The lowest block x coordinate inside this chunk.
    #[must_use]
    pub const fn min_block_x(self) -> i32 {
        self.0.x << SECTION_SHIFT
    }

    /// The lowest block z coordinate inside this chunk.
    #[must_use]
    pub const fn min_block_z(self) -> i32 {
        self.0.y << SECTION_SHIFT
    }
}

impl Display for ChunkPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.0.x, self.0.y)
    }
}

// A block position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockPos(pub Vector3<i32>);

impl BlockPos {
    /// Creates a block position.
    #[must_use]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self(Vector3::new(x, y, z))
    }

    /// The chunk this block lies in.
    #[must_use]
    pub const fn chunk_pos(self) -> ChunkPos {
        ChunkPos::new(self.0.x >> SECTION_SHIFT, self.0.z >> SECTION_SHIFT)
    }

    /// The section this block lies in.
    #[must_use]
    pub const fn section_pos(self) -> SectionPos {
        SectionPos::new(
            self.0.x >> SECTION_SHIFT,
            self.0.y >> SECTION_SHIFT,
            self.0.z >> SECTION_SHIFT,
        )
    }

    /// Returns the position offset by the given amounts.
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(self.0.x + dx, self.0.y + dy, self.0.z + dz)
    }

    /// Coordinates relative to the containing section, each in `0..16`.
    #[must_use]
    pub const fn section_relative(self) -> (usize, usize, usize) {
        (
            (self.0.x & SECTION_MASK) as usize,
            (self.0.y & SECTION_MASK) as usize,
            (self.0.z & SECTION_MASK) as usize,
        )
    }
}

impl Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.0.x, self.0.y, self.0.z)
    }
}

// A section position, in section coordinates on every axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SectionPos(pub Vector3<i32>);

impl SectionPos {
    /// Creates a section position.
    #[must_use]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self(Vector3::new(x, y, z))
    }

    /// The chunk column this section belongs to.
    #[must_use]
    pub const fn chunk_pos(self) -> ChunkPos {
        ChunkPos::new(self.0.x, self.0.z)
    }

    /// The section y index.
    #[must_use]
    pub const fn y(self) -> i32 {
        self.0.y
    }

    /// The block at the lowest corner of this section.
    #[must_use]
    pub const fn origin(self) -> BlockPos {
        BlockPos::new(
            self.0.x << SECTION_SHIFT,
            self.0.y << SECTION_SHIFT,
            self.0.z << SECTION_SHIFT,
        )
    }
}
