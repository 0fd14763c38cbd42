//! Adjacency graph over classified quadtree leaves
//!
//! Leaves are discovered by sampling the domain at half the minimum leaf
//! size, so no leaf can fall between two sample points. Linking is a flat
//! O(N²) pass over the node list; leaf counts after merging are small
//! enough that this has never shown up in profiles.

use std::collections::HashMap;

use glam::DVec2;

use super::astar::SearchSpace;
use crate::quadtree::QuadTree;
use crate::terrain::GroundClass;

/// Index of a node in its `NavGraph`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub usize);

/// One navigable quadtree leaf plus its outgoing edges.
///
/// `neighbors` stays within the node's own graph; `exits` are directed
/// cross-layer edges as `(target layer, node in that layer's graph)`.
#[derive(Debug, Clone)]
pub struct NavNode {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
    pub class: GroundClass,
    pub neighbors: Vec<NodeId>,
    pub exits: Vec<(usize, NodeId)>,
}

impl NavNode {
    /// Leaf center in pixel coordinates.
    pub fn center(&self) -> DVec2 {
        DVec2::new(
            self.x as f64 + self.width as f64 / 2.0,
            self.y as f64 + self.height as f64 / 2.0,
        )
    }
}

/// Directed graph of classified leaves, arena-indexed by `NodeId`.
pub struct NavGraph {
    nodes: Vec<NavNode>,
    by_leaf: HashMap<(i64, i64), NodeId>,
}

impl NavGraph {
    /// Builds the graph for one layer: sample every leaf, dedupe by leaf
    /// origin, then link same-passability leaves sharing an edge segment.
    pub fn from_quadtree(tree: &QuadTree) -> Self {
        let mut graph = NavGraph {
            nodes: Vec::new(),
            by_leaf: HashMap::new(),
        };
        let step = tree.min_leaf().max(1);
        let mut x = step / 2;
        while x < tree.width() {
            let mut y = step / 2;
            while y < tree.height() {
                if let Some(leaf) = tree.get_leaf(x, y) {
                    if let Some(class) = leaf.class {
                        graph.by_leaf.entry((leaf.x, leaf.y)).or_insert_with(|| {
                            let id = NodeId(graph.nodes.len());
                            graph.nodes.push(NavNode {
                                x: leaf.x,
                                y: leaf.y,
                                width: leaf.width,
                                height: leaf.height,
                                class,
                                neighbors: Vec::new(),
                                exits: Vec::new(),
                            });
                            id
                        });
                    }
                }
                y += step;
            }
            x += step;
        }
        graph.link_edge_neighbors();
        graph
    }

    fn link_edge_neighbors(&mut self) {
        for i in 0..self.nodes.len() {
            let neighbors = (0..self.nodes.len())
                .filter(|&j| i != j && Self::edge_adjacent(&self.nodes[i], &self.nodes[j]))
                .map(NodeId)
                .collect();
            self.nodes[i].neighbors = neighbors;
        }
    }

    /// Same passability and rectangles abutting along an edge segment.
    /// Drivable ground links to drivable ground whatever its surface;
    /// wall leaves only to wall leaves, so routes never cross a wall.
    /// Corner contact alone does not count: the shared interval check is
    /// half-open on both sides.
    fn edge_adjacent(node: &NavNode, other: &NavNode) -> bool {
        if node.class.impassable() != other.class.impassable() {
            return false;
        }
        let x_overlap = (other.x >= node.x && other.x < node.x + node.width)
            || (node.x >= other.x && node.x < other.x + other.width);
        let y_overlap = (other.y >= node.y && other.y < node.y + node.height)
            || (node.y >= other.y && node.y < other.y + other.height);
        if (other.y + other.height == node.y || other.y == node.y + node.height) && x_overlap {
            return true;
        }
        (other.x + other.width == node.x || other.x == node.x + node.width) && y_overlap
    }

    /// Adds a single directed edge. Callers wanting a two-way connection
    /// add the reverse themselves.
    pub fn link(&mut self, from: NodeId, to: NodeId) {
        self.nodes[from.0].neighbors.push(to);
    }

    /// Adds a directed cross-layer edge; deliberately one-way, the
    /// matching marker on the other layer adds its own.
    pub fn link_exit(&mut self, from: NodeId, target_layer: usize, to: NodeId) {
        self.nodes[from.0].exits.push((target_layer, to));
    }

    /// Node owning the leaf under `(x, y)` in `tree`.
    pub fn node_at(&self, tree: &QuadTree, x: i64, y: i64) -> Option<NodeId> {
        let leaf = tree.get_leaf(x, y)?;
        self.by_leaf.get(&(leaf.x, leaf.y)).copied()
    }

    pub fn node(&self, id: NodeId) -> &NavNode {
        &self.nodes[id.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl SearchSpace for NavGraph {
    type NodeId = NodeId;

    fn neighbors(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node.0].neighbors
    }

    fn cost(&self, from: NodeId, to: NodeId) -> f64 {
        self.nodes[from.0].center().distance(self.nodes[to.0].center())
    }

    fn heuristic(&self, node: NodeId, goal: NodeId) -> f64 {
        self.nodes[node.0].center().distance(self.nodes[goal.0].center())
    }
}
