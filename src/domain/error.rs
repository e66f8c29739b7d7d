//! Error kinds for tile moves and graph lookups.
//!
//! Rejected moves are normal gameplay (no state changes); graph errors point
//! at a caller or layout bug.

use thiserror::Error;

use super::hex::Axial;
use super::tile::MoveDir;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("no tile registered at {0}")]
    NotFound(Axial),
    #[error("tile {0} is registered twice")]
    Duplicate(Axial),
    #[error("tile {0} is still moving")]
    StillMoving(Axial),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum MoveError {
    #[error("tile {0} is already moving")]
    AlreadyMoving(Axial),
    #[error("tile {0} is not moving")]
    NotMoving(Axial),
    #[error("tile {0} is held by the traveler")]
    Pinned(Axial),
    #[error("no {0} power left")]
    NoPower(MoveDir),
    #[error("tile {0} cannot go any further")]
    HeightLimit(Axial),
    #[error("a cascade is still settling")]
    CascadeInFlight,
    #[error("the level is over")]
    LevelOver,
    #[error(transparent)]
    Graph(#[from] GraphError),
}
