//! Standard stream selectors

use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::os::fd::RawFd;

use crate::error::{ProcessError, Result};

/// One of the child's standard streams
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Parent writes into the child's standard input
    In = 1,
    /// Parent reads the child's standard output
    Out = 2,
    /// Parent reads the child's standard error
    Err = 4,
}

impl Direction {
    /// All directions in descriptor order
    pub const ALL: [Direction; 3] = [Direction::In, Direction::Out, Direction::Err];

    /// Flag value of this direction
    pub const fn bits(self) -> u32 {
        self as u32
    }

    /// Descriptor the pipe is mapped onto inside the child
    pub const fn child_fd(self) -> RawFd {
        match self {
            Direction::In => 0,
            Direction::Out => 1,
            Direction::Err => 2,
        }
    }

    pub(crate) const fn index(self) -> usize {
        self.child_fd() as usize
    }
}

impl TryFrom<u32> for Direction {
    type Error = ProcessError;

    fn try_from(bits: u32) -> Result<Self> {
        match bits {
            1 => Ok(Direction::In),
            2 => Ok(Direction::Out),
            4 => Ok(Direction::Err),
            _ => Err(ProcessError::IllegalDirection { bits }),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::In => "stdin",
            Direction::Out => "stdout",
            Direction::Err => "stderr",
        })
    }
}

/// Set of directions to connect to pipes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Directions(u32);

impl Directions {
    pub const NONE: Directions = Directions(0);
    pub const IN: Directions = Directions(1);
    pub const OUT: Directions = Directions(2);
    pub const ERR: Directions = Directions(4);
    pub const ALL: Directions = Directions(7);

    /// Build a set from raw flags, rejecting unknown bits
    pub fn from_bits(bits: u32) -> Result<Self> {
        if bits & !Self::ALL.0 != 0 {
            return Err(ProcessError::IllegalDirection { bits });
        }
        Ok(Directions(bits))
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, direction: Direction) -> bool {
        self.0 & direction.bits() != 0
    }

    /// Directions in the set, in descriptor order
    pub fn iter(self) -> impl Iterator<Item = Direction> {
        Direction::ALL.into_iter().filter(move |d| self.contains(*d))
    }
}

impl From<Direction> for Directions {
    fn from(direction: Direction) -> Self {
        Directions(direction.bits())
    }
}

impl BitOr for Directions {
    type Output = Directions;

    fn bitor(self, rhs: Directions) -> Directions {
        Directions(self.0 | rhs.0)
    }
}

impl BitOr<Direction> for Directions {
    type Output = Directions;

    fn bitor(self, rhs: Direction) -> Directions {
        Directions(self.0 | rhs.bits())
    }
}

impl BitOr for Direction {
    type Output = Directions;

    fn bitor(self, rhs: Direction) -> Directions {
        Directions(self.bits() | rhs.bits())
    }
}

impl BitOrAssign for Directions {
    fn bitor_assign(&mut self, rhs: Directions) {
        self.0 |= rhs.0;
    }
}
