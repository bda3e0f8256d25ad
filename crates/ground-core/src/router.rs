//! Taxi route computation over the taxiway graph.
//!
//! Two algorithms behind one entry point: exact Dijkstra expansion and
//! A* with an admissible straight-line heuristic (edge weights are
//! straight-line lengths, so the heuristic never overestimates). The
//! router only proposes paths; reservation happens incrementally in the
//! orchestrator as the aircraft proceeds.

use crate::airport::{EdgeId, NodeId, TaxiwayNetwork};
use crate::error::GroundError;
use serde::{Deserialize, Serialize};
use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap, HashSet};

const COST_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteAlgorithm {
    #[default]
    Dijkstra,
    AStar,
}

#[derive(Debug, Clone, Default)]
pub struct RouteConstraints {
    pub algorithm: RouteAlgorithm,
    /// Edges the route must not use (e.g. repeatedly contended segments).
    pub avoid_edges: HashSet<EdgeId>,
    /// Tie-break toward a first edge that is currently unreserved.
    pub prefer_unreserved_first_edge: bool,
}

impl RouteConstraints {
    pub fn with_algorithm(algorithm: RouteAlgorithm) -> Self {
        Self {
            algorithm,
            avoid_edges: HashSet::new(),
            prefer_unreserved_first_edge: true,
        }
    }
}

/// Total-order wrapper so f64 costs can live in the heap.
#[derive(Debug, Clone, Copy)]
struct FloatOrd(f64);

impl PartialEq for FloatOrd {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for FloatOrd {}

impl PartialOrd for FloatOrd {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FloatOrd {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Heap entry. Ordering key is (f score, reserved-first-edge flag, node
/// id): among equal costs an unreserved first edge wins, then the
/// lexicographically first node id, keeping expansion deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OpenNode {
    f_score: FloatOrd,
    first_edge_reserved: bool,
    node: NodeId,
    g_score: FloatOrd,
    first_edge: Option<EdgeId>,
}

impl PartialOrd for OpenNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenNode {
    fn cmp(&self, other: &Self) -> Ordering {
        self.f_score
            .cmp(&other.f_score)
            .then_with(|| self.first_edge_reserved.cmp(&other.first_edge_reserved))
            .then_with(|| self.node.cmp(&other.node))
    }
}

/// Compute a taxi route from `start` to `goal`.
///
/// Returns the ordered node list including both endpoints, or
/// `RouteNotFound` when the goal is unreachable.
pub fn find_route(
    network: &TaxiwayNetwork,
    start: NodeId,
    goal: NodeId,
    constraints: &RouteConstraints,
) -> Result<Vec<NodeId>, GroundError> {
    let not_found = || GroundError::RouteNotFound {
        from: start,
        to: goal,
    };
    let goal_pos = network.node(goal).ok_or_else(not_found)?.position;
    network.node(start).ok_or_else(not_found)?;

    if start == goal {
        return Ok(vec![start]);
    }

    let heuristic = |node: NodeId| -> f64 {
        match constraints.algorithm {
            RouteAlgorithm::Dijkstra => 0.0,
            RouteAlgorithm::AStar => network
                .node(node)
                .map(|n| n.position.distance(goal_pos))
                .unwrap_or(0.0),
        }
    };

    // Best known (g, reserved-first-edge flag) per node, plus back links.
    let mut g_score: HashMap<NodeId, f64> = HashMap::new();
    let mut first_flag: HashMap<NodeId, bool> = HashMap::new();
    let mut came_from: HashMap<NodeId, NodeId> = HashMap::new();
    let mut open: BinaryHeap<Reverse<OpenNode>> = BinaryHeap::new();

    g_score.insert(start, 0.0);
    first_flag.insert(start, false);
    open.push(Reverse(OpenNode {
        f_score: FloatOrd(heuristic(start)),
        first_edge_reserved: false,
        node: start,
        g_score: FloatOrd(0.0),
        first_edge: None,
    }));

    while let Some(Reverse(current)) = open.pop() {
        let current_g = current.g_score.0;
        // Stale heap entry
        match g_score.get(&current.node) {
            Some(&best) if current_g > best + COST_EPSILON => continue,
            _ => {}
        }

        if current.node == goal {
            return Ok(reconstruct(&came_from, start, goal));
        }

        for (neighbor, edge_id, weight) in network.neighbors(current.node) {
            if constraints.avoid_edges.contains(&edge_id) {
                continue;
            }
            let first_edge = current.first_edge.or(Some(edge_id));
            let reserved = if constraints.prefer_unreserved_first_edge {
                first_edge
                    .map(|e| network.edge_reserved_by(e).is_some())
                    .unwrap_or(false)
            } else {
                false
            };
            let tentative = current_g + weight;
            let improves = match g_score.get(&neighbor) {
                None => true,
                Some(&best) if tentative < best - COST_EPSILON => true,
                Some(&best) if (tentative - best).abs() <= COST_EPSILON => {
                    // Equal cost: prefer the unreserved-first-edge path
                    let prior = first_flag.get(&neighbor).copied().unwrap_or(false);
                    prior && !reserved
                }
                Some(_) => false,
            };
            if !improves {
                continue;
            }
            g_score.insert(neighbor, tentative);
            first_flag.insert(neighbor, reserved);
            came_from.insert(neighbor, current.node);
            open.push(Reverse(OpenNode {
                f_score: FloatOrd(tentative + heuristic(neighbor)),
                first_edge_reserved: reserved,
                node: neighbor,
                g_score: FloatOrd(tentative),
                first_edge,
            }));
        }
    }

    Err(not_found())
}

/// Total weight of a node path; `None` when consecutive nodes are not
/// connected in the traversal direction.
pub fn path_weight(network: &TaxiwayNetwork, path: &[NodeId]) -> Option<f64> {
    let mut total = 0.0;
    for pair in path.windows(2) {
        let edge = network.edge_between(pair[0], pair[1])?;
        total += network.edge(edge)?.length_m;
    }
    Some(total)
}

fn reconstruct(came_from: &HashMap<NodeId, NodeId>, start: NodeId, goal: NodeId) -> Vec<NodeId> {
    let mut path = vec![goal];
    let mut current = goal;
    while current != start {
        current = came_from[&current];
        path.push(current);
    }
    path.reverse();
    path
}
