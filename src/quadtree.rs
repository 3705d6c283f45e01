//! Region quadtree over lat/lon space, used to snap query positions to graph
//! nodes without scanning every node in the graph.
//!
//! The tree stores ids, not owning handles (`IndexedItem::Node`/`IndexedItem::Way`),
//! so it can be built once per `load` and shared freely across concurrent queries.

use crate::geometry::BoundingBox;
use crate::model::{Graph, NodeId, WayId};

/// A tagged reference to whatever the quadtree has indexed at a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexedItem {
    Node(NodeId),
    Way(WayId),
}

/// Four equal quadrants produced by splitting a bounding box at its midpoint:
/// south-west, south-east, north-west, north-east.
struct Children {
    sw: Box<QuadTree>,
    se: Box<QuadTree>,
    nw: Box<QuadTree>,
    ne: Box<QuadTree>,
}

pub struct QuadTree {
    pub bounding_box: BoundingBox,
    capacity: usize,
    items: Vec<IndexedItem>,
    children: Option<Children>,
}

impl QuadTree {
    pub fn new(bounding_box: BoundingBox, capacity: usize) -> Self {
        assert!(capacity > 0, "quadtree capacity must be positive");
        Self {
            bounding_box,
            capacity,
            items: Vec::new(),
            children: None,
        }
    }

    pub fn is_divided(&self) -> bool {
        self.children.is_some()
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Inserts a node or way id, rejecting it if it does not satisfy this cell's
    /// spatial predicate. Returns `false` only for a rejection at the root; an
    /// item accepted by the root is guaranteed a home in some descendant, since
    /// every point (way-bbox-intersection is only slightly subtler) inside a box
    /// lies inside at least one of the four midpoint-split quadrants.
    pub fn insert(&mut self, item: IndexedItem, graph: &Graph) -> bool {
        if !self.accepts(item, graph) {
            return false;
        }
        self.insert_accepted(item, graph);
        true
    }

    fn accepts(&self, item: IndexedItem, graph: &Graph) -> bool {
        match item {
            IndexedItem::Node(id) => match graph.node(id) {
                Some(node) => self.bounding_box.contains(node.position),
                None => false,
            },
            IndexedItem::Way(id) => match graph.way(id).and_then(|w| w.bounding_box(graph)) {
                Some(bbox) => self.bounding_box.intersects(&bbox),
                None => false,
            },
        }
    }

    fn insert_accepted(&mut self, item: IndexedItem, graph: &Graph) {
        if self.items.len() < self.capacity {
            self.items.push(item);
            return;
        }

        if self.children.is_none() {
            self.subdivide();
        }
        let children = self.children.as_mut().expect("just subdivided");
        for child in [
            &mut children.sw,
            &mut children.se,
            &mut children.nw,
            &mut children.ne,
        ] {
            if child.accepts(item, graph) {
                child.insert_accepted(item, graph);
                return;
            }
        }

        // Geometrically unreachable: the four midpoint-split quadrants cover the
        // parent's box, and `contains`/`intersects` are defined consistently with
        // the split. If this fires, the invariant that bounds this module is broken.
        debug_assert!(false, "no child accepted an item the parent accepted");
    }

    fn subdivide(&mut self) {
        let mid = self.bounding_box.midpoint();
        let min = self.bounding_box.min;
        let max = self.bounding_box.max;

        let sw_box = BoundingBox::new(min, mid);
        let se_box = BoundingBox::new(
            crate::geometry::Position::new(min.lat, mid.lon),
            crate::geometry::Position::new(mid.lat, max.lon),
        );
        let nw_box = BoundingBox::new(
            crate::geometry::Position::new(mid.lat, min.lon),
            crate::geometry::Position::new(max.lat, mid.lon),
        );
        let ne_box = BoundingBox::new(mid, max);

        self.children = Some(Children {
            sw: Box::new(QuadTree::new(sw_box, self.capacity)),
            se: Box::new(QuadTree::new(se_box, self.capacity)),
            nw: Box::new(QuadTree::new(nw_box, self.capacity)),
            ne: Box::new(QuadTree::new(ne_box, self.capacity)),
        });
    }

    /// Every indexed node inside `bbox` for which `predicate` holds. Subtrees
    /// whose box does not intersect `bbox` are pruned.
    pub fn find_node(
        &self,
        bbox: &BoundingBox,
        graph: &Graph,
        predicate: &dyn Fn(NodeId, &Graph) -> bool,
    ) -> Vec<NodeId> {
        let mut result = Vec::new();
        self.find_node_into(bbox, graph, predicate, &mut result);
        result
    }

    fn find_node_into(
        &self,
        bbox: &BoundingBox,
        graph: &Graph,
        predicate: &dyn Fn(NodeId, &Graph) -> bool,
        out: &mut Vec<NodeId>,
    ) {
        for item in &self.items {
            if let IndexedItem::Node(id) = item {
                if let Some(node) = graph.node(*id) {
                    if bbox.contains(node.position) && predicate(*id, graph) {
                        out.push(*id);
                    }
                }
            }
        }

        if let Some(children) = &self.children {
            for child in [&children.sw, &children.se, &children.nw, &children.ne] {
                if child.bounding_box.intersects(bbox) {
                    child.find_node_into(bbox, graph, predicate, out);
                }
            }
        }
    }

    /// Every indexed way whose bounding box intersects `bbox` and that satisfies
    /// `predicate`. Symmetric to [`QuadTree::find_node`].
    pub fn find_way(
        &self,
        bbox: &BoundingBox,
        graph: &Graph,
        predicate: &dyn Fn(WayId, &Graph) -> bool,
    ) -> Vec<WayId> {
        let mut result = Vec::new();
        self.find_way_into(bbox, graph, predicate, &mut result);
        result
    }

    fn find_way_into(
        &self,
        bbox: &BoundingBox,
        graph: &Graph,
        predicate: &dyn Fn(WayId, &Graph) -> bool,
        out: &mut Vec<WayId>,
    ) {
        for item in &self.items {
            if let IndexedItem::Way(id) = item {
                if let Some(way_bbox) = graph.way(*id).and_then(|w| w.bounding_box(graph)) {
                    if bbox.intersects(&way_bbox) && predicate(*id, graph) {
                        out.push(*id);
                    }
                }
            }
        }

        if let Some(children) = &self.children {
            for child in [&children.sw, &children.se, &children.nw, &children.ne] {
                if child.bounding_box.intersects(bbox) {
                    child.find_way_into(bbox, graph, predicate, out);
                }
            }
        }
    }
}
