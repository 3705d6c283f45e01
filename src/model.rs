//! The in-memory graph schema: positions, ways, nodes, tag dictionaries, and the
//! back-references between them.
//!
//! Node<->Way and Node<->Node relationships form cycles in the original
//! `shared_ptr`-based design (see `object.h`/`object.cpp` in the prior
//! implementation this crate descends from). Rather than reach for `Rc`/`Weak` to
//! recreate that, the graph is arena-style: `Node`s and `Way`s live in `Vec`s owned
//! by the `Graph`, and every cross-reference is a stable integer id. The quadtree
//! and the pathfinder only ever hold ids, never owning handles.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::geometry::{BoundingBox, Position};

/// A short string-to-string tag dictionary, as carried by both `Node`s and `Way`s.
pub type TagMap = HashMap<String, String>;

/// Stable id of a [`Node`] within its owning [`Graph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

/// Stable id of a [`Way`] within its owning [`Graph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WayId(pub u64);

/// Metadata describing the edge from one node to a specific neighbor.
#[derive(Debug, Clone)]
pub struct NeighborInfo {
    pub distance: f64,
    pub tags: Arc<TagMap>,
    /// Whether traversing `owner -> neighbor` follows the owning way's node order.
    /// Consulted only to honor `oneway=yes`.
    pub is_positive_direction: bool,
}

/// A point feature with a geographic position, optional tags, and back-references
/// to the ways it participates in and to its precomputed neighbors.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub position: Position,
    pub tags: TagMap,
    pub ways: Vec<WayId>,
    pub neighbors: HashMap<NodeId, NeighborInfo>,
}

impl Node {
    /// A way is drivable iff it carries a `highway` tag; a node is "on a highway"
    /// iff at least one of its incident ways is drivable.
    pub fn is_on_highway(&self, graph: &Graph) -> bool {
        self.ways
            .iter()
            .filter_map(|id| graph.way(*id))
            .any(Way::is_drivable)
    }
}

/// An ordered polyline of node ids plus tags.
#[derive(Debug, Clone)]
pub struct Way {
    pub id: WayId,
    pub nodes: Vec<NodeId>,
    pub tags: TagMap,
}

impl Way {
    pub fn is_drivable(&self) -> bool {
        self.tags.contains_key("highway")
    }

    /// Bounding box of the way's nodes, recomputed on demand since ways are
    /// immutable once loaded and this is cheap relative to a load.
    pub fn bounding_box(&self, graph: &Graph) -> Option<BoundingBox> {
        let positions: Vec<Position> = self
            .nodes
            .iter()
            .filter_map(|id| graph.node(*id))
            .map(|n| n.position)
            .collect();
        BoundingBox::enclosing(&positions)
    }
}

/// The full road network: every node and way keyed by its stable id.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: HashMap<NodeId, Node>,
    ways: HashMap<WayId, Way>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn way(&self, id: WayId) -> Option<&Way> {
        self.ways.get(&id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn way_count(&self) -> usize {
        self.ways.len()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn ways(&self) -> impl Iterator<Item = &Way> {
        self.ways.values()
    }

    /// Builder-side insertion; used only by the loader while the graph is still
    /// being assembled. Replaces any existing node/way with the same id.
    pub(crate) fn insert_node(&mut self, node: Node) {
        self.nodes.insert(node.id, node);
    }

    pub(crate) fn insert_way(&mut self, way: Way) {
        self.ways.insert(way.id, way);
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    /// Wires `node.ways` back-references and computes every node's neighbor map
    /// from the ways already present in the graph. Must run after every `Way` has
    /// been inserted; idempotent if called once per load.
    pub(crate) fn compute_back_references_and_neighbors(&mut self) {
        let mut incident: HashMap<NodeId, Vec<WayId>> = HashMap::new();
        for way in self.ways.values() {
            for &node_id in &way.nodes {
                let ways = incident.entry(node_id).or_default();
                if !ways.contains(&way.id) {
                    ways.push(way.id);
                }
            }
        }
        for (node_id, way_ids) in incident {
            if let Some(node) = self.nodes.get_mut(&node_id) {
                node.ways = way_ids;
            }
        }

        for way in self.ways.values() {
            if way.nodes.len() < 2 {
                continue;
            }
            let tags = Arc::new(way.tags.clone());
            for i in 0..way.nodes.len() - 1 {
                let a = way.nodes[i];
                let b = way.nodes[i + 1];
                let distance = match (self.nodes.get(&a), self.nodes.get(&b)) {
                    (Some(na), Some(nb)) => crate::geometry::planar_distance(na.position, nb.position),
                    _ => continue,
                };

                insert_neighbor(&mut self.nodes, a, b, distance, tags.clone(), true);
                insert_neighbor(&mut self.nodes, b, a, distance, tags.clone(), false);
            }
        }
    }
}

/// Inserts or upgrades the `from -> to` neighbor entry. Per the duplicate-edge
/// resolution in the spec (prior behavior overwrote unconditionally), the cheaper
/// of the existing and candidate entries is kept rather than always the latest.
fn insert_neighbor(
    nodes: &mut HashMap<NodeId, Node>,
    from: NodeId,
    to: NodeId,
    distance: f64,
    tags: Arc<TagMap>,
    is_positive_direction: bool,
) {
    let Some(node) = nodes.get_mut(&from) else {
        return;
    };
    let candidate = NeighborInfo {
        distance,
        tags,
        is_positive_direction,
    };
    match node.neighbors.get(&to) {
        Some(existing) if existing.distance <= candidate.distance => {}
        _ => {
            node.neighbors.insert(to, candidate);
        }
    }
}
