//! TerrainGraph: the level's tile registry plus the derived walkable-edge
//! relation.
//!
//! ## Adjacency
//!
//! Two tiles are graph-adjacent iff they fill each other's spatial slot AND
//! their settled heights are level (`tile::is_level`). The relation is rebuilt
//! wholesale, never patched, and only from settled heights.
//!
//! ## Change notification
//!
//! `subscribe()` hands out a receiver. `notify_changed()` fires one
//! `GraphChange` per call to every live subscriber, and refuses to fire while
//! any tile is mid-move. The cascade coordinator calls it exactly once per
//! settled cascade.

use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender};

use log::debug;

use super::error::GraphError;
use super::hex::{Axial, HexDir};
use super::tile::{self, Tile};

/// Delivered to subscribers after a cascade settles.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GraphChange {
    /// Monotonic count of settled configurations, starting at 1.
    pub revision: u64,
    /// Tiles whose height changed in the cascade.
    pub moved: Vec<Axial>,
}

#[derive(Debug, Default)]
pub struct TerrainGraph {
    tiles: HashMap<Axial, Tile>,
    edges: HashMap<Axial, [bool; 6]>,
    revision: u64,
    subscribers: Vec<Sender<GraphChange>>,
}

impl TerrainGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from `(position, height)` pairs: registers every tile,
    /// fills neighbour slots, computes adjacency.
    pub fn from_heights<I>(tiles: I) -> Result<Self, GraphError>
    where
        I: IntoIterator<Item = (Axial, i32)>,
    {
        let mut graph = TerrainGraph::new();
        for (pos, height) in tiles {
            graph.insert(Tile::new(pos, height))?;
        }
        graph.refresh_slots();
        graph.recompute_adjacency();
        Ok(graph)
    }

    /// Register a tile at level load. Slots and adjacency are not refreshed;
    /// call `refresh_slots` and `recompute_adjacency` once loading is done.
    pub fn insert(&mut self, tile: Tile) -> Result<(), GraphError> {
        let pos = tile.position();
        if self.tiles.contains_key(&pos) {
            return Err(GraphError::Duplicate(pos));
        }
        self.tiles.insert(pos, tile);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn contains(&self, pos: Axial) -> bool {
        self.tiles.contains_key(&pos)
    }

    pub fn tiles(&self) -> impl Iterator<Item = &Tile> {
        self.tiles.values()
    }

    pub fn find_tile(&self, pos: Axial) -> Result<&Tile, GraphError> {
        self.tiles.get(&pos).ok_or(GraphError::NotFound(pos))
    }

    pub(crate) fn find_tile_mut(&mut self, pos: Axial) -> Result<&mut Tile, GraphError> {
        self.tiles.get_mut(&pos).ok_or(GraphError::NotFound(pos))
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    // ── Spatial slots ──

    /// Which spatial slots around `pos` hold a tile. Tiles sit on the hex
    /// lattice, so a center lies in direction d within the horizontal
    /// tolerance exactly when the lattice neighbour in d is registered.
    pub fn spatial_slots(&self, pos: Axial) -> [Option<Axial>; 6] {
        let mut slots = [None; 6];
        for dir in HexDir::ALL {
            let n = pos.neighbor(dir);
            if self.tiles.contains_key(&n) {
                slots[dir.index()] = Some(n);
            }
        }
        slots
    }

    pub fn refresh_slots(&mut self) {
        let positions: Vec<Axial> = self.tiles.keys().copied().collect();
        for pos in positions {
            let slots = self.spatial_slots(pos);
            if let Some(tile) = self.tiles.get_mut(&pos) {
                tile.set_neighbors(slots);
            }
        }
    }

    // ── Adjacency ──

    /// Rebuild the walkable-edge relation from settled heights.
    pub fn recompute_adjacency(&mut self) {
        let mut edges = HashMap::with_capacity(self.tiles.len());
        for tile in self.tiles.values() {
            let mut walkable = [false; 6];
            for (i, slot) in tile.neighbors().iter().enumerate() {
                if let Some(other) = slot.and_then(|p| self.tiles.get(&p)) {
                    walkable[i] = tile::is_level(tile.height(), other.height());
                }
            }
            edges.insert(tile.position(), walkable);
        }
        self.edges = edges;
        debug!("adjacency rebuilt for {} tiles", self.tiles.len());
    }

    /// Walkable edge between `pos` and its neighbour in `dir`?
    pub fn is_traversable(&self, pos: Axial, dir: HexDir) -> bool {
        self.edges.get(&pos).is_some_and(|e| e[dir.index()])
    }

    pub fn adjacent(&self, a: Axial, b: Axial) -> bool {
        a.direction_to(b).is_some_and(|dir| self.is_traversable(a, dir))
    }

    /// Neighbours reachable in one step from `pos`, in direction order.
    pub fn walkable_neighbors(&self, pos: Axial) -> impl Iterator<Item = Axial> + '_ {
        HexDir::ALL
            .into_iter()
            .filter(move |&dir| self.is_traversable(pos, dir))
            .map(move |dir| pos.neighbor(dir))
    }

    /// Snapshot of the edge relation, sorted by position. Used to compare
    /// configurations.
    pub fn edge_snapshot(&self) -> Vec<(Axial, [bool; 6])> {
        let mut edges: Vec<_> = self.edges.iter().map(|(p, e)| (*p, *e)).collect();
        edges.sort_by_key(|(p, _)| *p);
        edges
    }

    // ── Motion ──

    pub fn moving_tile(&self) -> Option<Axial> {
        self.tiles.values().find(|t| t.is_moving()).map(|t| t.position())
    }

    pub fn any_moving(&self) -> bool {
        self.moving_tile().is_some()
    }

    // ── Notification ──

    pub fn subscribe(&mut self) -> Receiver<GraphChange> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    /// Recompute adjacency and fire the change event. Fails, without
    /// touching anything, if a tile is still moving.
    pub fn notify_changed(&mut self, moved: Vec<Axial>) -> Result<u64, GraphError> {
        if let Some(pos) = self.moving_tile() {
            return Err(GraphError::StillMoving(pos));
        }
        self.recompute_adjacency();
        self.revision += 1;
        let change = GraphChange { revision: self.revision, moved };
        // Dropped receivers unsubscribe themselves.
        self.subscribers.retain(|tx| tx.send(change.clone()).is_ok());
        debug!(
            "graph revision {} sent to {} subscribers",
            self.revision,
            self.subscribers.len()
        );
        Ok(self.revision)
    }
}
