//! Taxiway network and static airport geometry.
//!
//! Nodes and edges live in index-addressed arenas so the cyclic taxiway
//! graph needs no owning references between nodes, and a reservation is
//! a single `Option` toggle on the edge.

use crate::error::GroundError;
use crate::geometry::Vec2;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EdgeId(pub u32);

/// A taxiway intersection or significant point. Immutable after load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub position: Vec2,
    /// Incident edge ids, in insertion order.
    pub edges: Vec<EdgeId>,
}

/// A taxiway segment between two nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub from: NodeId,
    pub to: NodeId,
    pub length_m: f64,
    /// One-way edges are traversable only from `from` to `to`.
    pub one_way: bool,
    /// Exclusive occupancy: at most one aircraft holds an edge.
    pub reserved_by: Option<String>,
}

/// A runway with its static geometry. Loaded once per airport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Runway {
    pub id: String,
    /// Centerline heading in degrees (0 = north, clockwise).
    pub heading_deg: f64,
    pub length_m: f64,
    pub width_m: f64,
    pub threshold: Vec2,
    /// Approach aid (ILS or equivalent) available.
    pub has_ils: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParkingStatus {
    #[default]
    Free,
    Reserved,
    Occupied,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParkingPosition {
    pub id: String,
    pub position: Vec2,
    pub status: ParkingStatus,
    /// Holder when reserved or occupied.
    pub aircraft_id: Option<String>,
}

impl ParkingPosition {
    pub fn new(id: impl Into<String>, position: Vec2) -> Self {
        Self {
            id: id.into(),
            position,
            status: ParkingStatus::Free,
            aircraft_id: None,
        }
    }
}

/// The taxiway graph: owns all nodes and edges, provides adjacency
/// lookup and the edge reservation table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaxiwayNetwork {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
}

impl TaxiwayNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, position: Vec2) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            id,
            position,
            edges: Vec::new(),
        });
        id
    }

    /// Add an edge between two existing nodes. Length is the straight-line
    /// distance between the node positions.
    pub fn add_edge(
        &mut self,
        from: NodeId,
        to: NodeId,
        one_way: bool,
    ) -> Result<EdgeId, GroundError> {
        let from_pos = self
            .node(from)
            .ok_or_else(|| GroundError::InvalidNetwork(format!("unknown node {from:?}")))?
            .position;
        let to_pos = self
            .node(to)
            .ok_or_else(|| GroundError::InvalidNetwork(format!("unknown node {to:?}")))?
            .position;
        if from == to {
            return Err(GroundError::InvalidNetwork(format!(
                "self-loop at {from:?}"
            )));
        }
        let id = EdgeId(self.edges.len() as u32);
        self.edges.push(Edge {
            id,
            from,
            to,
            length_m: from_pos.distance(to_pos),
            one_way,
            reserved_by: None,
        });
        self.nodes[from.0 as usize].edges.push(id);
        self.nodes[to.0 as usize].edges.push(id);
        Ok(id)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0 as usize)
    }

    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(id.0 as usize)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Edge connecting two adjacent nodes in the `from -> to` direction.
    pub fn edge_between(&self, from: NodeId, to: NodeId) -> Option<EdgeId> {
        self.neighbors(from)
            .into_iter()
            .find(|(node, _, _)| *node == to)
            .map(|(_, edge, _)| edge)
    }

    /// Reachable neighbors of a node, ordered by ascending node id for
    /// deterministic expansion. Direction-restricted edges appear only in
    /// the permitted direction's list. Weight is edge length.
    pub fn neighbors(&self, node: NodeId) -> Vec<(NodeId, EdgeId, f64)> {
        let Some(n) = self.node(node) else {
            return Vec::new();
        };
        let mut out: Vec<(NodeId, EdgeId, f64)> = n
            .edges
            .iter()
            .filter_map(|&edge_id| {
                let edge = &self.edges[edge_id.0 as usize];
                if edge.from == node {
                    Some((edge.to, edge_id, edge.length_m))
                } else if edge.to == node && !edge.one_way {
                    Some((edge.from, edge_id, edge.length_m))
                } else {
                    None
                }
            })
            .collect();
        out.sort_by_key(|(node, edge, _)| (*node, *edge));
        out
    }

    /// Reserve an edge for an aircraft. Re-reserving an edge already held
    /// by the same aircraft succeeds.
    pub fn reserve(&mut self, edge: EdgeId, aircraft_id: &str) -> Result<(), GroundError> {
        let edge = self
            .edges
            .get_mut(edge.0 as usize)
            .ok_or_else(|| GroundError::InvalidNetwork(format!("unknown edge {edge:?}")))?;
        match &edge.reserved_by {
            None => {
                edge.reserved_by = Some(aircraft_id.to_string());
                Ok(())
            }
            Some(holder) if holder == aircraft_id => Ok(()),
            Some(_) => Err(GroundError::ResourceUnavailable {
                resource: format!("edge {:?}", edge.id),
            }),
        }
    }

    /// Release an edge held by an aircraft. No-op if the aircraft is not
    /// the holder.
    pub fn release(&mut self, edge: EdgeId, aircraft_id: &str) {
        if let Some(edge) = self.edges.get_mut(edge.0 as usize) {
            if edge.reserved_by.as_deref() == Some(aircraft_id) {
                edge.reserved_by = None;
            }
        }
    }

    /// Release every edge held by an aircraft (exit / disconnect).
    pub fn release_all(&mut self, aircraft_id: &str) {
        for edge in &mut self.edges {
            if edge.reserved_by.as_deref() == Some(aircraft_id) {
                edge.reserved_by = None;
            }
        }
    }

    pub fn edge_reserved_by(&self, edge: EdgeId) -> Option<&str> {
        self.edge(edge).and_then(|e| e.reserved_by.as_deref())
    }

    /// Edges currently reserved by an aircraft.
    pub fn reservations_of(&self, aircraft_id: &str) -> Vec<EdgeId> {
        self.edges
            .iter()
            .filter(|e| e.reserved_by.as_deref() == Some(aircraft_id))
            .map(|e| e.id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_network() -> (TaxiwayNetwork, Vec<NodeId>, Vec<EdgeId>) {
        let mut net = TaxiwayNetwork::new();
        let a = net.add_node(Vec2::new(0.0, 0.0));
        let b = net.add_node(Vec2::new(100.0, 0.0));
        let c = net.add_node(Vec2::new(200.0, 0.0));
        let ab = net.add_edge(a, b, false).unwrap();
        let bc = net.add_edge(b, c, true).unwrap();
        (net, vec![a, b, c], vec![ab, bc])
    }

    #[test]
    fn test_neighbors_respect_direction() {
        let (net, nodes, _) = line_network();
        // b reaches a (two-way) and c (one-way forward)
        let from_b: Vec<NodeId> = net.neighbors(nodes[1]).iter().map(|(n, _, _)| *n).collect();
        assert_eq!(from_b, vec![nodes[0], nodes[2]]);
        // c cannot go back over the one-way edge
        assert!(net.neighbors(nodes[2]).is_empty());
    }

    #[test]
    fn test_edge_weight_is_length() {
        let (net, nodes, _) = line_network();
        let (_, _, weight) = net.neighbors(nodes[0])[0];
        assert!((weight - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_exclusive_reservation() {
        let (mut net, _, edges) = line_network();
        net.reserve(edges[0], "AC1").unwrap();
        // Idempotent for the holder
        net.reserve(edges[0], "AC1").unwrap();
        let err = net.reserve(edges[0], "AC2").unwrap_err();
        assert!(matches!(err, GroundError::ResourceUnavailable { .. }));
        // Release by a non-holder is a no-op
        net.release(edges[0], "AC2");
        assert_eq!(net.edge_reserved_by(edges[0]), Some("AC1"));
        net.release(edges[0], "AC1");
        assert_eq!(net.edge_reserved_by(edges[0]), None);
    }

    #[test]
    fn test_release_all() {
        let (mut net, _, edges) = line_network();
        net.reserve(edges[0], "AC1").unwrap();
        net.reserve(edges[1], "AC1").unwrap();
        assert_eq!(net.reservations_of("AC1").len(), 2);
        net.release_all("AC1");
        assert!(net.reservations_of("AC1").is_empty());
    }

    #[test]
    fn test_add_edge_validates_nodes() {
        let mut net = TaxiwayNetwork::new();
        let a = net.add_node(Vec2::ZERO);
        let err = net.add_edge(a, NodeId(99), false).unwrap_err();
        assert!(matches!(err, GroundError::InvalidNetwork(_)));
    }
}
