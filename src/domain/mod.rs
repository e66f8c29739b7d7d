//! Pure terrain rules: geometry, tiles, the graph and route search.

pub mod error;
pub mod graph;
pub mod hex;
pub mod path;
pub mod tile;
