//! The traveler: walks tile to tile along the shortest walkable route to its
//! goal, replanning from scratch every time the terrain settles.
//!
//! `path` holds the waypoints still ahead. Its head is the tile being walked
//! to; reaching the head pops it and makes it the current tile. A fresh plan
//! starts with the current tile itself, so a traveler caught mid-step walks
//! back to the center of the tile it stands on before heading out again.
//! It never steps onto a tile that is mid-move: it waits on its own tile
//! until the cascade settles and the route is replanned.

use std::collections::VecDeque;
use std::sync::mpsc::Receiver;
use std::time::Duration;

use log::debug;

use crate::domain::error::GraphError;
use crate::domain::graph::{GraphChange, TerrainGraph};
use crate::domain::hex::{Axial, Point};
use crate::domain::path::find_path;
use crate::domain::tile::Pins;

/// Result of one `advance`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AgentStep {
    /// Still between waypoints.
    Walking,
    /// Next waypoint is mid-move; waiting on the current tile.
    Holding,
    /// Reached a waypoint that is not the goal.
    Reached(Axial),
    /// Standing on the goal with nothing left to walk.
    Arrived,
    /// No route: waiting for the terrain to change.
    Stranded,
}

#[derive(Debug)]
pub struct Agent {
    position: Point,
    current: Axial,
    target: Axial,
    path: VecDeque<Axial>,
    changes: Receiver<GraphChange>,
    speed: f32,
    arrival_radius: f32,
}

impl Agent {
    /// Place the traveler on `start`, subscribe to terrain changes and plan
    /// the first route.
    pub fn spawn(
        graph: &mut TerrainGraph,
        start: Axial,
        target: Axial,
        speed: f32,
        arrival_radius: f32,
    ) -> Result<Self, GraphError> {
        graph.find_tile(start)?;
        graph.find_tile(target)?;
        let mut agent = Agent {
            position: start.center(),
            current: start,
            target,
            path: VecDeque::new(),
            changes: graph.subscribe(),
            speed,
            arrival_radius,
        };
        agent.replan(graph);
        Ok(agent)
    }

    pub fn position(&self) -> Point {
        self.position
    }

    pub fn current_tile(&self) -> Axial {
        self.current
    }

    pub fn target_tile(&self) -> Axial {
        self.target
    }

    /// Waypoints still ahead, head first.
    pub fn active_path(&self) -> &VecDeque<Axial> {
        &self.path
    }

    pub fn pins(&self) -> Pins {
        Pins { current: self.current, target: self.target }
    }

    pub fn has_arrived(&self) -> bool {
        self.path.is_empty() && self.current == self.target
    }

    /// Handle pending terrain notifications, replanning once per
    /// notification. Returns the latest revision seen.
    pub fn sync(&mut self, graph: &TerrainGraph) -> Option<u64> {
        let pending: Vec<GraphChange> = self.changes.try_iter().collect();
        let mut latest = None;
        for change in pending {
            self.replan(graph);
            debug!(
                "revision {}: traveler at {} has {} waypoints",
                change.revision,
                self.current,
                self.path.len()
            );
            latest = Some(change.revision);
        }
        latest
    }

    /// Replace the route wholesale with a fresh shortest path.
    pub fn replan(&mut self, graph: &TerrainGraph) {
        self.path = find_path(graph, self.current, self.target).into();
    }

    /// Walk toward the head of the route for `dt`.
    pub fn advance(&mut self, graph: &TerrainGraph, dt: Duration) -> AgentStep {
        let reach = self.speed * dt.as_secs_f32();
        let Some(&head) = self.path.front() else {
            if self.current == self.target {
                return AgentStep::Arrived;
            }
            // Hold on the current tile until a route appears.
            self.position = self.position.toward(self.current.center(), reach);
            return AgentStep::Stranded;
        };

        if head != self.current && graph.find_tile(head).map_or(true, |t| t.is_moving()) {
            self.position = self.position.toward(self.current.center(), reach);
            return AgentStep::Holding;
        }

        let goal = head.center();
        self.position = self.position.toward(goal, reach);
        if self.position.distance(goal) > self.arrival_radius {
            return AgentStep::Walking;
        }

        self.position = goal;
        self.current = head;
        self.path.pop_front();
        if self.has_arrived() {
            AgentStep::Arrived
        } else {
            AgentStep::Reached(head)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::tile::MoveDir;

    fn row(heights: &[i32]) -> TerrainGraph {
        TerrainGraph::from_heights(
            heights.iter().enumerate().map(|(q, h)| (Axial::new(q as i32, 0), *h)),
        )
        .unwrap()
    }

    fn walk(agent: &mut Agent, g: &TerrainGraph, ticks: usize) -> Vec<AgentStep> {
        (0..ticks).map(|_| agent.advance(g, Duration::from_millis(100))).collect()
    }

    #[test]
    fn spawn_plans_initial_route() {
        let mut g = row(&[0, 0, 0]);
        let agent = Agent::spawn(&mut g, Axial::new(0, 0), Axial::new(2, 0), 2.0, 0.1).unwrap();
        let path: Vec<_> = agent.active_path().iter().copied().collect();
        assert_eq!(path, vec![Axial::new(0, 0), Axial::new(1, 0), Axial::new(2, 0)]);
    }

    #[test]
    fn spawn_requires_registered_tiles() {
        let mut g = row(&[0, 0]);
        let err = Agent::spawn(&mut g, Axial::new(0, 0), Axial::new(5, 0), 2.0, 0.1).unwrap_err();
        assert_eq!(err, GraphError::NotFound(Axial::new(5, 0)));
    }

    #[test]
    fn walks_to_goal_and_arrives() {
        let mut g = row(&[0, 0, 0]);
        let mut agent = Agent::spawn(&mut g, Axial::new(0, 0), Axial::new(2, 0), 2.0, 0.1).unwrap();
        // Start tile is reached immediately.
        assert_eq!(agent.advance(&g, Duration::ZERO), AgentStep::Reached(Axial::new(0, 0)));
        let steps = walk(&mut agent, &g, 20);
        assert!(steps.contains(&AgentStep::Reached(Axial::new(1, 0))));
        assert_eq!(steps.last(), Some(&AgentStep::Arrived));
        assert!(agent.has_arrived());
        assert_eq!(agent.position(), Axial::new(2, 0).center());
    }

    #[test]
    fn blocked_route_strands() {
        let mut g = row(&[0, 1, 0]);
        let mut agent = Agent::spawn(&mut g, Axial::new(0, 0), Axial::new(2, 0), 2.0, 0.1).unwrap();
        assert!(agent.active_path().is_empty());
        assert_eq!(agent.advance(&g, Duration::from_millis(100)), AgentStep::Stranded);
        assert_eq!(agent.current_tile(), Axial::new(0, 0));
    }

    #[test]
    fn replans_on_each_notification() {
        let mut g = row(&[0, 1, 0]);
        let mut agent = Agent::spawn(&mut g, Axial::new(0, 0), Axial::new(2, 0), 2.0, 0.1).unwrap();
        assert_eq!(agent.sync(&g), None);

        // Lower the blocking tile by hand and announce the new configuration.
        let mid = Axial::new(1, 0);
        let slots = g.spatial_slots(mid);
        let tile = g.find_tile_mut(mid).unwrap();
        tile.begin_move(MoveDir::Down, 0, Duration::ZERO, &agent.pins()).unwrap();
        tile.settle(slots).unwrap();
        g.notify_changed(vec![mid]).unwrap();

        assert_eq!(agent.sync(&g), Some(1));
        assert_eq!(agent.active_path().len(), 3);
        assert_eq!(agent.sync(&g), None);
    }

    #[test]
    fn mid_step_replan_returns_to_current_tile() {
        let mut g = row(&[0, 0, 0]);
        let mut agent = Agent::spawn(&mut g, Axial::new(0, 0), Axial::new(2, 0), 1.0, 0.1).unwrap();
        agent.advance(&g, Duration::ZERO);
        agent.advance(&g, Duration::from_millis(400));
        assert_eq!(agent.current_tile(), Axial::new(0, 0));
        assert!(agent.position().x > 0.3);

        agent.replan(&g);
        assert_eq!(agent.active_path().front(), Some(&Axial::new(0, 0)));
        // Walks back to the start tile before continuing.
        assert_eq!(agent.advance(&g, Duration::from_millis(400)), AgentStep::Reached(Axial::new(0, 0)));
    }

    #[test]
    fn waits_for_a_moving_tile_ahead() {
        let mut g = row(&[0, 0, 0]);
        let mut agent = Agent::spawn(&mut g, Axial::new(0, 0), Axial::new(2, 0), 1.0, 0.1).unwrap();
        agent.advance(&g, Duration::ZERO);
        agent.advance(&g, Duration::from_millis(300));
        let pins = agent.pins();
        g.find_tile_mut(Axial::new(1, 0))
            .unwrap()
            .begin_move(MoveDir::Up, 1, Duration::from_secs(2), &pins)
            .unwrap();

        // Backs off toward its own tile and stays there.
        assert_eq!(agent.advance(&g, Duration::from_millis(100)), AgentStep::Holding);
        assert!(agent.position().x < 0.3);
        assert!(walk(&mut agent, &g, 10).iter().all(|s| *s == AgentStep::Holding));
        assert_eq!(agent.current_tile(), Axial::new(0, 0));
        assert_eq!(agent.position(), Axial::new(0, 0).center());
    }

    #[test]
    fn pins_track_current_tile() {
        let mut g = row(&[0, 0, 0]);
        let mut agent = Agent::spawn(&mut g, Axial::new(0, 0), Axial::new(2, 0), 2.0, 0.1).unwrap();
        walk(&mut agent, &g, 7);
        assert_eq!(agent.current_tile(), Axial::new(1, 0));
        assert!(agent.pins().holds(Axial::new(1, 0)));
        assert!(agent.pins().holds(Axial::new(2, 0)));
        assert!(!agent.pins().holds(Axial::new(0, 0)));
    }
}
