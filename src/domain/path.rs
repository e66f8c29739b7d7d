//! Shortest walkable route between two tiles.
//!
//! Plain breadth-first search over the graph's walkable edges; every step
//! costs the same. Pure: reads the current edge relation, mutates nothing.

use std::collections::{HashMap, VecDeque};

use super::graph::TerrainGraph;
use super::hex::Axial;

/// Shortest route from `from` to `to`, both ends included.
///
/// `[from]` when the two are equal, empty when `to` cannot be reached or
/// either end is not a registered tile. Ties between equal-length routes are
/// broken by direction order.
pub fn find_path(graph: &TerrainGraph, from: Axial, to: Axial) -> Vec<Axial> {
    if !graph.contains(from) || !graph.contains(to) {
        return vec![];
    }
    if from == to {
        return vec![from];
    }

    let mut came_from: HashMap<Axial, Axial> = HashMap::with_capacity(graph.len());
    let mut queue: VecDeque<Axial> = VecDeque::with_capacity(graph.len());
    came_from.insert(from, from);
    queue.push_back(from);

    while let Some(cur) = queue.pop_front() {
        for next in graph.walkable_neighbors(cur) {
            if came_from.contains_key(&next) {
                continue;
            }
            came_from.insert(next, cur);
            if next == to {
                return unwind(&came_from, from, to);
            }
            queue.push_back(next);
        }
    }

    vec![]
}

/// Is there any walkable route between the two tiles?
pub fn is_reachable(graph: &TerrainGraph, from: Axial, to: Axial) -> bool {
    !find_path(graph, from, to).is_empty()
}

fn unwind(came_from: &HashMap<Axial, Axial>, from: Axial, to: Axial) -> Vec<Axial> {
    let mut path = vec![to];
    let mut cur = to;
    while cur != from {
        match came_from.get(&cur) {
            Some(&prev) => {
                path.push(prev);
                cur = prev;
            }
            None => return vec![],
        }
    }
    path.reverse();
    path
}
