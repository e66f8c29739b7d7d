//! Hex geometry: axial coordinates, the six neighbour directions, and the
//! flat-plane centers used for continuous movement.
//!
//! Layout is pointy-top with a center-to-center spacing of 1.0, so every
//! spatial neighbour sits exactly one unit away.

use std::fmt;

const SQRT3_2: f32 = 0.866_025_4;

// ── Axial coordinate ──

/// Axial hex coordinate. Unique key of a tile for the lifetime of a level.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct Axial {
    pub q: i32,
    pub r: i32,
}

impl Axial {
    pub const fn new(q: i32, r: i32) -> Self {
        Axial { q, r }
    }

    /// Convert an "odd-r" offset position (odd rows shifted right by half a
    /// cell) into axial coordinates. Level layouts are written this way.
    pub fn from_offset(col: i32, row: i32) -> Self {
        Axial { q: col - (row - (row & 1)) / 2, r: row }
    }

    pub fn neighbor(self, dir: HexDir) -> Axial {
        let (dq, dr) = dir.offset();
        Axial { q: self.q + dq, r: self.r + dr }
    }

    /// Hex step distance between two coordinates.
    pub fn distance(self, other: Axial) -> i32 {
        let dq = self.q - other.q;
        let dr = self.r - other.r;
        (dq.abs() + dr.abs() + (dq + dr).abs()) / 2
    }

    /// Direction from `self` to `other` when the two are spatial neighbours.
    pub fn direction_to(self, other: Axial) -> Option<HexDir> {
        HexDir::ALL.into_iter().find(|&d| self.neighbor(d) == other)
    }

    /// Center of the tile on the horizontal plane.
    pub fn center(self) -> Point {
        Point {
            x: self.q as f32 + self.r as f32 * 0.5,
            y: self.r as f32 * SQRT3_2,
        }
    }
}

impl fmt::Display for Axial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.q, self.r)
    }
}

// ── Directions ──

/// The six hex directions, indexed 0..6 counter-clockwise from east.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum HexDir {
    East,
    NorthEast,
    NorthWest,
    West,
    SouthWest,
    SouthEast,
}

impl HexDir {
    pub const ALL: [HexDir; 6] = [
        HexDir::East,
        HexDir::NorthEast,
        HexDir::NorthWest,
        HexDir::West,
        HexDir::SouthWest,
        HexDir::SouthEast,
    ];

    pub fn index(self) -> usize {
        match self {
            HexDir::East => 0,
            HexDir::NorthEast => 1,
            HexDir::NorthWest => 2,
            HexDir::West => 3,
            HexDir::SouthWest => 4,
            HexDir::SouthEast => 5,
        }
    }

    pub fn offset(self) -> (i32, i32) {
        match self {
            HexDir::East => (1, 0),
            HexDir::NorthEast => (1, -1),
            HexDir::NorthWest => (0, -1),
            HexDir::West => (-1, 0),
            HexDir::SouthWest => (-1, 1),
            HexDir::SouthEast => (0, 1),
        }
    }

    pub fn opposite(self) -> HexDir {
        HexDir::ALL[(self.index() + 3) % 6]
    }
}

// ── Plane point ──

/// Continuous position on the horizontal plane.
#[derive(Clone, Copy, PartialEq, Debug, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn distance(self, other: Point) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Move toward `target` by at most `step`, landing exactly on it when
    /// the remaining distance is shorter.
    pub fn toward(self, target: Point, step: f32) -> Point {
        let dist = self.distance(target);
        if dist <= step || dist == 0.0 {
            return target;
        }
        let t = step / dist;
        Point {
            x: self.x + (target.x - self.x) * t,
            y: self.y + (target.y - self.y) * t,
        }
    }
}
