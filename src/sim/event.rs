/// Events emitted during a simulation step.
/// The presentation layer consumes these for animation/sound.

use crate::domain::hex::Axial;
use crate::domain::tile::MoveDir;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LevelEvent {
    /// A tile began moving. `cascaded` is false for the tile the player picked.
    TileMoveStarted { position: Axial, dir: MoveDir, cascaded: bool },
    TileSettled { position: Axial, height: i32 },
    GraphChanged { revision: u64 },
    /// The traveler replanned after `revision`; `waypoints` is 0 when stranded.
    PathUpdated { revision: u64, waypoints: usize },
    WaypointReached { position: Axial },
    LevelWon,
    LevelLost,
}
