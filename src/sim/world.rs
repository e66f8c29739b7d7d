/// Level: the complete state of one running puzzle.
///
/// ## Ownership
///
/// The level owns every collaborator and lends them to each other:
///   - `graph`       : tiles and the walkable-edge relation
///   - `coordinator` : the one cascade allowed in flight
///   - `agent`       : the traveler, subscribed to `graph` changes
///   - `budget`      : remaining raise/lower power
///
/// Player moves enter through `request_move`; time enters through
/// `sim::step::step`. Both are single-threaded and run to completion.
///
/// ## Outcome
///
/// `Playing` until the traveler stands on its goal (`Won`) or, with no
/// power left and the terrain settled, the grace period passes without a
/// route to the goal (`Lost`). Both are final.

use std::time::Duration;

use log::warn;

use crate::config::TimingConfig;
use crate::domain::error::MoveError;
use crate::domain::graph::TerrainGraph;
use crate::domain::hex::Axial;
use crate::domain::path::is_reachable;
use crate::domain::tile::MoveDir;
use super::agent::Agent;
use super::cascade::{MoveBudget, MoveCoordinator};
use super::event::LevelEvent;
use super::level::{LevelDef, LevelError};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Outcome {
    Playing,
    Won,
    Lost,
}

#[derive(Debug)]
pub struct Level {
    pub name: String,
    pub(crate) graph: TerrainGraph,
    pub(crate) coordinator: MoveCoordinator,
    pub(crate) agent: Agent,
    pub(crate) budget: MoveBudget,
    pub(crate) outcome: Outcome,
    pub(crate) tick: u64,

    // ── Lose check ──
    pub(crate) exhausted_for: Duration,
    pub(crate) fail_check_delay: Duration,
    pub(crate) fail_checked: bool,

    /// Events raised by `request_move`, handed out by the next step.
    pub(crate) pending: Vec<LevelEvent>,
}

impl Level {
    /// Build the graph, place the traveler and plan its first route.
    pub fn load(def: &LevelDef, timing: &TimingConfig) -> Result<Self, LevelError> {
        let mut graph = TerrainGraph::from_heights(def.tiles.iter().copied())?;
        let agent = Agent::spawn(
            &mut graph,
            def.start,
            def.goal,
            timing.agent_speed,
            timing.arrival_radius,
        )?;

        Ok(Level {
            name: def.name.clone(),
            graph,
            coordinator: MoveCoordinator::new(timing.tile_duration()),
            agent,
            budget: MoveBudget::new(def.raise, def.lower),
            outcome: Outcome::Playing,
            tick: 0,
            exhausted_for: Duration::ZERO,
            fail_check_delay: timing.fail_check_delay(),
            fail_checked: false,
            pending: vec![],
        })
    }

    // ── Queries ──

    pub fn graph(&self) -> &TerrainGraph {
        &self.graph
    }

    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    pub fn coordinator(&self) -> &MoveCoordinator {
        &self.coordinator
    }

    pub fn budget(&self) -> MoveBudget {
        self.budget
    }

    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Could the player pick this tile right now? Used for hover highlighting.
    pub fn is_movable(&self, pos: Axial) -> bool {
        match self.graph.find_tile(pos) {
            Ok(tile) => !tile.is_moving() && !self.agent.pins().holds(pos),
            Err(_) => false,
        }
    }

    /// Is there a walkable route from the traveler's tile to its goal?
    pub fn is_goal_reachable(&self) -> bool {
        is_reachable(&self.graph, self.agent.current_tile(), self.agent.target_tile())
    }

    // ── Player input ──

    /// Raise or lower the tile at `pos`. Returns the cascade members, picked
    /// tile first. A rejected move changes nothing.
    pub fn request_move(&mut self, pos: Axial, dir: MoveDir) -> Result<Vec<Axial>, MoveError> {
        if self.outcome != Outcome::Playing {
            return Err(MoveError::LevelOver);
        }
        let pins = self.agent.pins();
        let members = match self.coordinator.request_move(
            &mut self.graph,
            &mut self.budget,
            &pins,
            pos,
            dir,
        ) {
            Ok(members) => members.to_vec(),
            Err(e) => {
                warn!("{dir} at {pos} rejected: {e}");
                return Err(e);
            }
        };

        for (i, &position) in members.iter().enumerate() {
            self.pending.push(LevelEvent::TileMoveStarted {
                position,
                dir,
                cascaded: i > 0,
            });
        }
        Ok(members)
    }
}
