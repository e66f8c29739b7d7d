//! Terrain tiles: a height, six spatial neighbour slots, and an optional
//! in-flight height transition.
//!
//! Heights change only through `begin_move` / `settle`. Neighbour slots are
//! purely spatial; whether a slot is walkable is decided by the graph from
//! settled heights.

use std::fmt;
use std::time::Duration;

use super::error::MoveError;
use super::hex::{Axial, HexDir};

/// Shared height tolerance. Two tiles are level (walkable between) when their
/// height gap is strictly below it; a moving tile drags a neighbour along when
/// the post-move gap in the direction of travel exceeds it.
pub const LEVEL_TOLERANCE: i32 = 1;

/// Largest height magnitude a layout may use.
pub const HEIGHT_LIMIT: i32 = 1_000_000;

/// Are two settled heights level with each other?
pub fn is_level(a: i32, b: i32) -> bool {
    a.abs_diff(b) < LEVEL_TOLERANCE.unsigned_abs()
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum MoveDir {
    Up,
    Down,
}

impl MoveDir {
    /// Height change applied by one move.
    pub fn step(self) -> i32 {
        match self {
            MoveDir::Up => 1,
            MoveDir::Down => -1,
        }
    }
}

impl fmt::Display for MoveDir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MoveDir::Up => f.write_str("raise"),
            MoveDir::Down => f.write_str("lower"),
        }
    }
}

/// Tiles the traveler holds and which therefore never move: the tile it
/// stands on and its destination.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Pins {
    pub current: Axial,
    pub target: Axial,
}

impl Pins {
    pub fn holds(&self, pos: Axial) -> bool {
        pos == self.current || pos == self.target
    }
}

// ── Transition handle ──

/// An in-flight height change. Presentation code reads `visual_height` to
/// animate; only `settle` commits the end height.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct Transition {
    pub dir: MoveDir,
    pub from: i32,
    pub to: i32,
    pub duration: Duration,
    pub elapsed: Duration,
}

impl Transition {
    /// Fraction complete in 0.0..=1.0.
    pub fn progress(&self) -> f32 {
        if self.duration.is_zero() {
            return 1.0;
        }
        (self.elapsed.as_secs_f32() / self.duration.as_secs_f32()).min(1.0)
    }

    pub fn visual_height(&self) -> f32 {
        self.from as f32 + (self.to - self.from) as f32 * self.progress()
    }

    pub fn is_done(&self) -> bool {
        self.elapsed >= self.duration
    }

    /// Advance the clock. Returns true once the transition has completed.
    fn tick(&mut self, dt: Duration) -> bool {
        self.elapsed = (self.elapsed + dt).min(self.duration);
        self.is_done()
    }
}

// ── Tile ──

#[derive(Clone, Debug)]
pub struct Tile {
    position: Axial,
    height: i32,
    neighbors: [Option<Axial>; 6],
    motion: Option<Transition>,
}

impl Tile {
    pub fn new(position: Axial, height: i32) -> Self {
        Tile {
            position,
            height,
            neighbors: [None; 6],
            motion: None,
        }
    }

    pub fn position(&self) -> Axial {
        self.position
    }

    /// Last settled height. Never an intermediate value.
    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn neighbors(&self) -> &[Option<Axial>; 6] {
        &self.neighbors
    }

    pub fn neighbor(&self, dir: HexDir) -> Option<Axial> {
        self.neighbors[dir.index()]
    }

    pub fn is_moving(&self) -> bool {
        self.motion.is_some()
    }

    pub fn transition(&self) -> Option<&Transition> {
        self.motion.as_ref()
    }

    /// Height to draw this frame.
    pub fn visual_height(&self) -> f32 {
        match &self.motion {
            Some(t) => t.visual_height(),
            None => self.height as f32,
        }
    }

    /// Start moving toward `target_height`. Rejected when already moving or
    /// when the traveler holds this tile.
    pub fn begin_move(
        &mut self,
        dir: MoveDir,
        target_height: i32,
        duration: Duration,
        pins: &Pins,
    ) -> Result<Transition, MoveError> {
        if self.is_moving() {
            return Err(MoveError::AlreadyMoving(self.position));
        }
        if pins.holds(self.position) {
            return Err(MoveError::Pinned(self.position));
        }
        let transition = Transition {
            dir,
            from: self.height,
            to: target_height,
            duration,
            elapsed: Duration::ZERO,
        };
        self.motion = Some(transition);
        Ok(transition)
    }

    /// Advance the in-flight transition. Returns true when it has completed
    /// and the tile is ready to settle.
    pub(crate) fn tick_motion(&mut self, dt: Duration) -> bool {
        match &mut self.motion {
            Some(t) => t.tick(dt),
            None => false,
        }
    }

    /// Commit the transition's end height and refresh the neighbour slots.
    /// Returns the new height.
    pub fn settle(&mut self, slots: [Option<Axial>; 6]) -> Result<i32, MoveError> {
        let transition = self
            .motion
            .take()
            .ok_or(MoveError::NotMoving(self.position))?;
        self.height = transition.to;
        self.neighbors = slots;
        Ok(self.height)
    }

    pub(crate) fn set_neighbors(&mut self, slots: [Option<Axial>; 6]) {
        self.neighbors = slots;
    }
}
