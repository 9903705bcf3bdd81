//! The six axis directions light travels in.

use steel_utils::BlockPos;

/// An axis direction.
///
/// Opposite directions sit next to each other, so flipping the lowest bit of
/// the discriminant yields the opposite.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// -Y
    Down = 0,
    /// +Y
    Up = 1,
    /// -Z
    North = 2,
    /// +Z
    South = 3,
    /// -X
    West = 4,
    /// +X
    East = 5,
}

/// Step per direction, indexed by discriminant.
const OFFSETS: [(i32, i32, i32); 6] = [
    (0, -1, 0),
    (0, 1, 0),
    (0, 0, -1),
    (0, 0, 1),
    (-1, 0, 0),
    (1, 0, 0),
];

impl Direction {
    /// Every direction, in discriminant order.
    pub const ALL: [Direction; 6] = [
        Direction::Down,
        Direction::Up,
        Direction::North,
        Direction::South,
        Direction::West,
        Direction::East,
    ];

    /// The direction pointing the other way.
    #[must_use]
    pub const fn opposite(self) -> Self {
        Self::ALL[(self as usize) ^ 1]
    }

    /// The `(dx, dy, dz)` step of one move in this direction.
    #[must_use]
    pub const fn offset(self) -> (i32, i32, i32) {
        OFFSETS[self as usize]
    }

    /// The neighbor of `pos` in this direction.
    #[must_use]
    #[inline]
    pub const fn relative(self, pos: BlockPos) -> BlockPos {
        let (dx, dy, dz) = self.offset();
        pos.offset(dx, dy, dz)
    }

    /// This direction's bit in a 6-bit direction set.
    #[must_use]
    #[inline]
    pub const fn flag(self) -> u8 {
        1 << self as u8
    }
}
