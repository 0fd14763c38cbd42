//! A* search over an abstract node space

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::hash::Hash;

/// Graph contract for the pathfinder.
///
/// `cost` is the exact cost of an edge between adjacent nodes;
/// `heuristic` must never overestimate the remaining cost to the goal or
/// returned paths stop being optimal.
pub trait SearchSpace {
    type NodeId: Copy + Eq + Hash;

    fn neighbors(&self, node: Self::NodeId) -> &[Self::NodeId];
    fn cost(&self, from: Self::NodeId, to: Self::NodeId) -> f64;
    fn heuristic(&self, node: Self::NodeId, goal: Self::NodeId) -> f64;
}

/// Open-list entry ordered as a min-heap on f = g + h.
struct OpenEntry<N> {
    f: f64,
    node: N,
}

impl<N> PartialEq for OpenEntry<N> {
    fn eq(&self, other: &Self) -> bool {
        self.f == other.f
    }
}

impl<N> Eq for OpenEntry<N> {}

impl<N> PartialOrd for OpenEntry<N> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<N> Ord for OpenEntry<N> {
    fn cmp(&self, other: &Self) -> Ordering {
        // reversed so BinaryHeap pops the smallest f first
        other.f.total_cmp(&self.f)
    }
}

/// Reusable A* engine.
///
/// Holds its bookkeeping between queries to recycle allocations; every
/// call to `find_path` starts from clean state, so one instance can serve
/// any number of unrelated queries.
pub struct PathFinder<N: Copy + Eq + Hash> {
    g: HashMap<N, f64>,
    predecessor: HashMap<N, N>,
    closed: HashSet<N>,
    open: BinaryHeap<OpenEntry<N>>,
}

impl<N: Copy + Eq + Hash> Default for PathFinder<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N: Copy + Eq + Hash> PathFinder<N> {
    pub fn new() -> Self {
        Self {
            g: HashMap::new(),
            predecessor: HashMap::new(),
            closed: HashSet::new(),
            open: BinaryHeap::new(),
        }
    }

    /// Cheapest path from `start` to `goal`, inclusive on both ends, or
    /// `None` when the goal is unreachable.
    pub fn find_path<S>(&mut self, space: &S, start: N, goal: N) -> Option<Vec<N>>
    where
        S: SearchSpace<NodeId = N>,
    {
        self.g.clear();
        self.predecessor.clear();
        self.closed.clear();
        self.open.clear();

        self.g.insert(start, 0.0);
        self.open.push(OpenEntry {
            f: space.heuristic(start, goal),
            node: start,
        });

        while let Some(entry) = self.open.pop() {
            let current = entry.node;
            if self.closed.contains(&current) {
                // stale entry superseded by a cheaper relaxation
                continue;
            }
            if current == goal {
                return Some(self.reconstruct(start, goal));
            }
            self.closed.insert(current);
            let g_current = self.g[&current];

            for &next in space.neighbors(current) {
                if self.closed.contains(&next) {
                    continue;
                }
                let tentative = g_current + space.cost(current, next);
                if self.g.get(&next).is_some_and(|&known| tentative >= known) {
                    continue;
                }
                self.g.insert(next, tentative);
                self.predecessor.insert(next, current);
                self.open.push(OpenEntry {
                    f: tentative + space.heuristic(next, goal),
                    node: next,
                });
            }
        }
        None
    }

    fn reconstruct(&self, start: N, goal: N) -> Vec<N> {
        let mut path = vec![goal];
        let mut current = goal;
        while current != start {
            current = self.predecessor[&current];
            path.push(current);
        }
        path.reverse();
        path
    }
}
