//! Block face directions and horizontal facings.

use std::fmt::{self, Display};

/// One of the six faces of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Negative y.
    Down,
    /// Positive y.
    Up,
    /// Negative z.
    North,
    /// Positive z.
    South,
    /// Negative x.
    West,
    /// Positive x.
    East,
}

impl Direction {
    /// All six directions, in neighbour update order.
    pub const ALL: [Direction; 6] = [
        Direction::West,
        Direction::East,
        Direction::Down,
        Direction::Up,
        Direction::North,
        Direction::South,
    ];

    /// Returns the unit offset of this direction.
    #[must_use]
    pub const fn offset(self) -> (i32, i32, i32) {
        match self {
            Direction::Down => (0, -1, 0),
            Direction::Up => (0, 1, 0),
            Direction::North => (0, 0, -1),
            Direction::South => (0, 0, 1),
            Direction::West => (-1, 0, 0),
            Direction::East => (1, 0, 0),
        }
    }

    /// Returns the opposite direction.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Direction::Down => Direction::Up,
            Direction::Up => Direction::Down,
            Direction::North => Direction::South,
            Direction::South => Direction::North,
            Direction::West => Direction::East,
            Direction::East => Direction::West,
        }
    }
}

/// A horizontal facing, stored on blocks such as chests and furnaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Facing {
    /// Facing negative z.
    #[default]
    North,
    /// Facing positive z.
    South,
    /// Facing negative x.
    West,
    /// Facing positive x.
    East,
}

impl Facing {
    /// All horizontal facings.
    pub const ALL: [Facing; 4] = [Facing::North, Facing::South, Facing::West, Facing::East];

    /// Returns the lowercase name used in block state properties.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Facing::North => "north",
            Facing::South => "south",
            Facing::West => "west",
            Facing::East => "east",
        }
    }

    /// Parses a property value such as `"east"`.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|facing| facing.name() == name)
    }

    /// Converts the legacy numeric facing (2..=5) used by old block metadata.
    #[must_use]
    pub const fn from_legacy(value: i32) -> Option<Self> {
        match value {
            2 => Some(Facing::North),
            3 => Some(Facing::South),
            4 => Some(Facing::West),
            5 => Some(Facing::East),
            _ => None,
        }
    }

    /// Returns the equivalent block face direction.
    #[must_use]
    pub const fn direction(self) -> Direction {
        match self {
            Facing::North => Direction::North,
            Facing::South => Direction::South,
            Facing::West => Direction::West,
            Facing::East => Direction::East,
        }
    }

    /// Returns true if the facing points along the z axis.
    #[must_use]
    pub const fn is_z_axis(self) -> bool {
        matches!(self, Facing::North | Facing::South)
    }
}

impl Display for Facing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
