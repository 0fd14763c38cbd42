//! Cross-layer transition discovery and replay
//!
//! Transition markers are single pixels in the layer rasters; resolving
//! every one against the quadtrees of both layers is the expensive part
//! of level loading, so the resolved set is persisted as a flat record
//! list and replayed on later loads.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::astar::SearchSpace;
use super::graph::{NavGraph, NavNode, NodeId};
use crate::PersistError;
use crate::quadtree::QuadTree;
use crate::terrain::{GroundClass, GroundSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransitionDir {
    Up,
    Down,
}

/// One discovered layer-change marker: a pixel on `layer` whose nav node
/// gets a directed edge into the layer above (`Up`) or below (`Down`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub layer: usize,
    pub x: i64,
    pub y: i64,
    pub dir: TransitionDir,
}

/// Scans every layer raster for transition markers, links the nav graphs
/// and returns one record per created link. Markers sharing a source node
/// collapse into a single link.
pub fn discover(
    sources: &[&dyn GroundSource],
    trees: &[QuadTree],
    graphs: &mut [NavGraph],
) -> Vec<TransitionRecord> {
    let mut records = Vec::new();
    let mut seen = HashSet::new();
    for layer in 0..trees.len() {
        let tree = &trees[layer];
        for y in 0..tree.height() {
            for x in 0..tree.width() {
                let dir = match sources[layer].classify(x, y) {
                    GroundClass::TransitionUp => TransitionDir::Up,
                    GroundClass::TransitionDown => TransitionDir::Down,
                    _ => continue,
                };
                let record = TransitionRecord { layer, x, y, dir };
                let Some((src, target, dst)) = resolve(record, trees, graphs) else {
                    continue;
                };
                if !seen.insert((layer, src, dir)) {
                    continue;
                }
                graphs[layer].link_exit(src, target, dst);
                records.push(record);
            }
        }
    }
    records
}

/// Replays persisted records onto freshly built graphs. Records that no
/// longer resolve (regenerated level data) are logged and skipped.
pub fn apply(records: &[TransitionRecord], trees: &[QuadTree], graphs: &mut [NavGraph]) {
    for &record in records {
        match resolve(record, trees, graphs) {
            Some((src, target, dst)) => graphs[record.layer].link_exit(src, target, dst),
            None => log::warn!(
                "transition at ({}, {}) on layer {} no longer resolves",
                record.x,
                record.y,
                record.layer
            ),
        }
    }
}

fn resolve(
    record: TransitionRecord,
    trees: &[QuadTree],
    graphs: &[NavGraph],
) -> Option<(NodeId, usize, NodeId)> {
    let TransitionRecord { layer, x, y, dir } = record;
    let target = match dir {
        TransitionDir::Up => layer + 1,
        TransitionDir::Down => layer.checked_sub(1)?,
    };
    if layer >= trees.len() || target >= trees.len() {
        return None;
    }
    let src = graphs[layer].node_at(&trees[layer], x, y)?;
    let dst = graphs[target].node_at(&trees[target], x, y)?;
    Some((src, target, dst))
}

/// Index of a node in a `LayerSpace`, unique across all layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GlobalNodeId(usize);

/// Search space over every layer graph at once, so a single A* query can
/// route through discovered transitions.
///
/// Adjacency is flattened up front: per-layer neighbors and cross-layer
/// exits land in one list per node, indexed by `GlobalNodeId`.
pub struct LayerSpace<'a> {
    graphs: &'a [NavGraph],
    offsets: Vec<usize>,
    adjacency: Vec<Vec<GlobalNodeId>>,
}

impl<'a> LayerSpace<'a> {
    /// Build after `discover`/`apply` so the exits are in place.
    pub fn new(graphs: &'a [NavGraph]) -> Self {
        let mut offsets = Vec::with_capacity(graphs.len());
        let mut total = 0;
        for graph in graphs {
            offsets.push(total);
            total += graph.len();
        }
        let mut adjacency = Vec::with_capacity(total);
        for (layer, graph) in graphs.iter().enumerate() {
            for i in 0..graph.len() {
                let node = graph.node(NodeId(i));
                let mut out: Vec<GlobalNodeId> = node
                    .neighbors
                    .iter()
                    .map(|n| GlobalNodeId(offsets[layer] + n.0))
                    .collect();
                out.extend(
                    node.exits
                        .iter()
                        .map(|&(target, n)| GlobalNodeId(offsets[target] + n.0)),
                );
                adjacency.push(out);
            }
        }
        Self {
            graphs,
            offsets,
            adjacency,
        }
    }

    pub fn global(&self, layer: usize, node: NodeId) -> GlobalNodeId {
        GlobalNodeId(self.offsets[layer] + node.0)
    }

    /// Inverse of `global`.
    pub fn local(&self, id: GlobalNodeId) -> (usize, NodeId) {
        let layer = self.offsets.partition_point(|&off| off <= id.0) - 1;
        (layer, NodeId(id.0 - self.offsets[layer]))
    }

    fn node(&self, id: GlobalNodeId) -> &NavNode {
        let (layer, node) = self.local(id);
        self.graphs[layer].node(node)
    }
}

impl SearchSpace for LayerSpace<'_> {
    type NodeId = GlobalNodeId;

    fn neighbors(&self, node: GlobalNodeId) -> &[GlobalNodeId] {
        &self.adjacency[node.0]
    }

    fn cost(&self, from: GlobalNodeId, to: GlobalNodeId) -> f64 {
        self.node(from).center().distance(self.node(to).center())
    }

    fn heuristic(&self, node: GlobalNodeId, goal: GlobalNodeId) -> f64 {
        self.node(node).center().distance(self.node(goal).center())
    }
}

pub fn save_records(path: &Path, records: &[TransitionRecord]) -> Result<(), PersistError> {
    let file = File::create(path)?;
    serde_json::to_writer(BufWriter::new(file), records)?;
    Ok(())
}

pub fn load_records(path: &Path) -> Result<Vec<TransitionRecord>, PersistError> {
    let file = File::open(path)?;
    let records = serde_json::from_reader(BufReader::new(file))?;
    Ok(records)
}

/// Loads and replays the persisted transition list, or rediscovers from
/// the rasters when the list is missing or corrupt.
pub fn load_or_discover(
    path: &Path,
    sources: &[&dyn GroundSource],
    trees: &[QuadTree],
    graphs: &mut [NavGraph],
) -> Vec<TransitionRecord> {
    match load_records(path) {
        Ok(records) => {
            log::info!("loaded {} transitions from {}", records.len(), path.display());
            apply(&records, trees, graphs);
            records
        }
        Err(err) => {
            log::warn!(
                "rediscovering transitions, load from {} failed: {err}",
                path.display()
            );
            let records = discover(sources, trees, graphs);
            if let Err(err) = save_records(path, &records) {
                log::warn!("could not persist transitions to {}: {err}", path.display());
            }
            records
        }
    }
}
