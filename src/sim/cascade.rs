//! MoveCoordinator: turns one player move into a cascade of tile moves and
//! tells the graph exactly once when the whole cascade has settled.
//!
//! ## Phases
//!   Idle → Cascading → Settling → Idle
//!
//! ## Cascade closure
//! Breadth-first growth from the player's tile. A spatial neighbour of a
//! member joins when the member's post-move height would leave it more than
//! `LEVEL_TOLERANCE` behind in the direction of travel, it is not already
//! moving, and the traveler does not hold it. Each tile joins at most once.
//!
//! ## Barrier
//! `open` counts members still in flight. Only the settle that brings it to
//! zero moves the coordinator to Settling and fires `notify_changed`.

use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use log::{debug, warn};

use crate::domain::error::{GraphError, MoveError};
use crate::domain::graph::TerrainGraph;
use crate::domain::hex::Axial;
use crate::domain::tile::{MoveDir, Pins, LEVEL_TOLERANCE};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Phase {
    Idle,
    Cascading,
    Settling,
}

/// Remaining player power. Only player moves spend it, never cascade followers.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct MoveBudget {
    pub raise: u32,
    pub lower: u32,
}

impl MoveBudget {
    pub fn new(raise: u32, lower: u32) -> Self {
        MoveBudget { raise, lower }
    }

    pub fn remaining(&self, dir: MoveDir) -> u32 {
        match dir {
            MoveDir::Up => self.raise,
            MoveDir::Down => self.lower,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.raise == 0 && self.lower == 0
    }

    fn spend(&mut self, dir: MoveDir) {
        match dir {
            MoveDir::Up => self.raise = self.raise.saturating_sub(1),
            MoveDir::Down => self.lower = self.lower.saturating_sub(1),
        }
    }
}

/// What happened during one `advance`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Progress {
    /// Tiles that settled this call, with their new height.
    pub settled: Vec<(Axial, i32)>,
    /// Graph revision fired when the cascade completed.
    pub revision: Option<u64>,
}

#[derive(Debug)]
pub struct MoveCoordinator {
    phase: Phase,
    members: Vec<Axial>,
    open: usize,
    tile_duration: Duration,
}

impl MoveCoordinator {
    pub fn new(tile_duration: Duration) -> Self {
        MoveCoordinator {
            phase: Phase::Idle,
            members: vec![],
            open: 0,
            tile_duration,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_idle(&self) -> bool {
        self.phase == Phase::Idle
    }

    /// Tiles of the current (or last) cascade, player tile first.
    pub fn members(&self) -> &[Axial] {
        &self.members
    }

    pub fn open_count(&self) -> usize {
        self.open
    }

    /// Validate a player move and start its cascade. On rejection nothing
    /// changes: no budget spent, no tile set in motion.
    pub fn request_move(
        &mut self,
        graph: &mut TerrainGraph,
        budget: &mut MoveBudget,
        pins: &Pins,
        origin: Axial,
        dir: MoveDir,
    ) -> Result<&[Axial], MoveError> {
        if self.phase != Phase::Idle {
            return Err(MoveError::CascadeInFlight);
        }
        let tile = graph.find_tile(origin)?;
        if pins.holds(origin) {
            return Err(MoveError::Pinned(origin));
        }
        if tile.is_moving() {
            return Err(MoveError::AlreadyMoving(origin));
        }
        if budget.remaining(dir) == 0 {
            return Err(MoveError::NoPower(dir));
        }

        let members = cascade_closure(graph, pins, origin, dir);
        let mut targets = Vec::with_capacity(members.len());
        for &pos in &members {
            let height = graph.find_tile(pos)?.height();
            let target = height.checked_add(dir.step()).ok_or(MoveError::HeightLimit(pos))?;
            targets.push((pos, target));
        }

        budget.spend(dir);
        for (pos, target) in targets {
            graph.find_tile_mut(pos)?.begin_move(dir, target, self.tile_duration, pins)?;
        }
        debug!("{dir} at {origin}: cascade of {} tiles {:?}", members.len(), members);

        self.open = members.len();
        self.members = members;
        self.phase = Phase::Cascading;
        Ok(&self.members)
    }

    /// Advance every in-flight member by `dt` and settle those that finish.
    /// Also retries a notification left pending in Settling.
    pub fn advance(&mut self, graph: &mut TerrainGraph, dt: Duration) -> Result<Progress, GraphError> {
        let mut progress = Progress::default();
        match self.phase {
            Phase::Idle => return Ok(progress),
            Phase::Settling => {
                progress.revision = Some(self.finish(graph)?);
                return Ok(progress);
            }
            Phase::Cascading => {}
        }

        let mut finished = vec![];
        for &pos in &self.members {
            let tile = graph.find_tile_mut(pos)?;
            if tile.is_moving() && tile.tick_motion(dt) {
                finished.push(pos);
            }
        }

        for pos in finished {
            match self.report_settled(graph, pos) {
                Ok((height, revision)) => {
                    progress.settled.push((pos, height));
                    if revision.is_some() {
                        progress.revision = revision;
                    }
                }
                Err(MoveError::Graph(e)) => return Err(e),
                Err(e) => warn!("settle at {pos} skipped: {e}"),
            }
        }
        Ok(progress)
    }

    /// A member's transition completed. Settles the tile and, when it was the
    /// last one in flight, fires the graph change. Returns the new height and
    /// the revision if the cascade completed.
    ///
    /// Public so an external animation driver can report completion itself
    /// instead of using `advance`.
    pub fn report_settled(
        &mut self,
        graph: &mut TerrainGraph,
        pos: Axial,
    ) -> Result<(i32, Option<u64>), MoveError> {
        if self.phase != Phase::Cascading || !self.members.contains(&pos) {
            return Err(MoveError::NotMoving(pos));
        }
        let slots = graph.spatial_slots(pos);
        let height = graph.find_tile_mut(pos)?.settle(slots)?;
        self.open = self.open.saturating_sub(1);
        debug!("{pos} settled at height {height}, {} still moving", self.open);

        if self.open > 0 {
            return Ok((height, None));
        }
        self.phase = Phase::Settling;
        let revision = self.finish(graph)?;
        Ok((height, Some(revision)))
    }

    fn finish(&mut self, graph: &mut TerrainGraph) -> Result<u64, GraphError> {
        let revision = graph.notify_changed(self.members.clone())?;
        self.phase = Phase::Idle;
        Ok(revision)
    }
}

/// Does a member moving to `mover_target` drag a neighbour at
/// `neighbor_height` along with it?
pub fn forces_neighbor(dir: MoveDir, mover_target: i32, neighbor_height: i32) -> bool {
    let (target, neighbor) = (i64::from(mover_target), i64::from(neighbor_height));
    let gap = match dir {
        MoveDir::Up => target - neighbor,
        MoveDir::Down => neighbor - target,
    };
    gap > i64::from(LEVEL_TOLERANCE)
}

/// Every tile that must move when `origin` moves in `dir`, origin first, in
/// breadth-first order. Reads settled heights only.
pub fn cascade_closure(graph: &TerrainGraph, pins: &Pins, origin: Axial, dir: MoveDir) -> Vec<Axial> {
    let mut members = vec![origin];
    let mut joined: HashSet<Axial> = HashSet::from([origin]);
    let mut queue: VecDeque<Axial> = VecDeque::from([origin]);

    while let Some(pos) = queue.pop_front() {
        let Ok(tile) = graph.find_tile(pos) else { continue };
        // Out of range: request_move rejects the whole cascade.
        let Some(target) = tile.height().checked_add(dir.step()) else { continue };
        for &n in tile.neighbors().iter().flatten() {
            if joined.contains(&n) || pins.holds(n) {
                continue;
            }
            let Ok(neighbor) = graph.find_tile(n) else { continue };
            if neighbor.is_moving() || !forces_neighbor(dir, target, neighbor.height()) {
                continue;
            }
            joined.insert(n);
            members.push(n);
            queue.push_back(n);
        }
    }

    members
}
