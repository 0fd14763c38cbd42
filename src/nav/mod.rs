//! Navigation stack: quadtree leaves -> nav graph -> A* paths
//!
//! `graph` turns the classified leaves of a `QuadTree` into a directed
//! adjacency graph, `astar` searches it, and `transition` stitches the
//! per-layer graphs together across layer-change markers.

pub mod astar;
pub mod graph;
pub mod transition;

pub use astar::{PathFinder, SearchSpace};
pub use graph::{NavGraph, NavNode, NodeId};
pub use transition::{GlobalNodeId, LayerSpace, TransitionDir, TransitionRecord};
