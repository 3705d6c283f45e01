//! Bidirectional best-first search over the road graph: snaps free-form query
//! positions to drivable nodes, then runs two fringes toward each other under a
//! road-class-aware cost model.
//!
//! Grounded in the prior implementation's `LayeredAStarPathfinder`, with three
//! deliberate departures: the termination rule is the canonical bidirectional-A*
//! rule rather than early-exit-on-first-meeting, each fringe's heuristic measures
//! to its own target instead of both measuring to the caller's `end`, and the
//! `preferences` map is actually consulted by the cost model.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use crate::error::CoreError;
use crate::geometry::{planar_distance, BoundingBox, Position};
use crate::model::{Graph, NeighborInfo, NodeId};
use crate::quadtree::{IndexedItem, QuadTree};

/// Half-side, in degrees, of the bbox searched around a query position when
/// snapping to the nearest drivable node.
const SNAP_RADIUS: f64 = 0.005;

/// Encourages major roads; looked up by highway class, overridable per-class via
/// `preferences["class_multiplier.<class>"]`.
fn class_multiplier(class: &str) -> Option<f64> {
    match class {
        "motorway" | "motorway_link" => Some(0.5),
        "trunk" | "trunk_link" => Some(0.8),
        "primary" | "primary_link" => Some(1.0),
        "secondary" | "secondary_link" => Some(3.0),
        "tertiary" | "tertiary_link" => Some(10.0),
        "unclassified" => Some(1000.0),
        "residential" => Some(10000.0),
        _ => None,
    }
}

/// Rank used to penalize dropping to a lesser road class mid-route; unknown
/// classes rank last.
fn highway_priority(class: &str) -> i32 {
    match class {
        "motorway" | "motorway_link" => 1,
        "trunk" | "trunk_link" => 2,
        "primary" | "primary_link" => 3,
        "secondary" | "secondary_link" => 4,
        "tertiary" | "tertiary_link" => 5,
        "unclassified" => 6,
        "residential" => 7,
        _ => 100,
    }
}

fn assumed_speed(class: &str) -> f64 {
    match class {
        "motorway" => 120.0,
        "trunk" => 100.0,
        "primary" => 80.0,
        "secondary" => 60.0,
        "tertiary" => 50.0,
        _ => 30.0,
    }
}

/// Routing preferences, keyed the same way the façade receives them.
pub struct Preferences<'a> {
    avoid_highway: Vec<&'a str>,
    avoid_tolls: bool,
    class_multiplier_overrides: HashMap<&'a str, f64>,
}

impl<'a> Preferences<'a> {
    pub fn parse(map: &'a HashMap<String, String>) -> Self {
        let avoid_highway = map
            .get("avoid_highway")
            .map(|v| v.split(',').map(str::trim).filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();
        let avoid_tolls = map.get("avoid_tolls").map(|v| v == "true").unwrap_or(false);
        let mut class_multiplier_overrides = HashMap::new();
        for (key, value) in map {
            if let Some(class) = key.strip_prefix("class_multiplier.") {
                if let Ok(multiplier) = value.parse::<f64>() {
                    class_multiplier_overrides.insert(class, multiplier);
                }
            }
        }
        Self {
            avoid_highway,
            avoid_tolls,
            class_multiplier_overrides,
        }
    }

    fn forbids(&self, class: &str, neighbor: &NeighborInfo) -> bool {
        if self.avoid_highway.iter().any(|c| *c == class) {
            return true;
        }
        if self.avoid_tolls && neighbor.tags.get("toll").map(String::as_str) == Some("yes") {
            return true;
        }
        false
    }

    fn multiplier_for(&self, class: &str) -> Option<f64> {
        self.class_multiplier_overrides
            .get(class)
            .copied()
            .or_else(|| class_multiplier(class))
    }
}

/// `None` communicates a forbidden edge (oneway violation, or a preference veto)
/// without the sentinel-negative-weight trick the prior implementation used.
fn edge_weight(neighbor: &NeighborInfo, preferences: &Preferences) -> Result<Option<f64>, CoreError> {
    let class = neighbor
        .tags
        .get("highway")
        .ok_or_else(|| CoreError::Invariant("edge_weight called on a non-highway edge".into()))?;

    if neighbor.tags.get("oneway").map(String::as_str) == Some("yes") && !neighbor.is_positive_direction {
        return Ok(None);
    }
    if preferences.forbids(class, neighbor) {
        return Ok(None);
    }

    let speed = match neighbor.tags.get("maxspeed").and_then(|v| v.parse::<f64>().ok()) {
        Some(maxspeed) => 0.9 * maxspeed,
        None => assumed_speed(class),
    };
    let mut cost = neighbor.distance / speed;
    if let Some(multiplier) = preferences.multiplier_for(class) {
        cost *= multiplier;
    }
    Ok(Some(cost))
}

#[derive(Clone)]
struct SearchNode {
    f_score: f64,
    g_score: f64,
    came_from: Option<NodeId>,
    current_highway: Option<String>,
}

impl SearchNode {
    fn seed(target: Position, position: Position) -> Self {
        Self {
            f_score: planar_distance(position, target),
            g_score: 0.0,
            came_from: None,
            current_highway: None,
        }
    }
}

/// Entry in a fringe's open set; ordered for a min-heap on `f_score` since
/// [`BinaryHeap`] is a max-heap by default.
struct OpenEntry {
    f_score: f64,
    node: NodeId,
}

impl PartialEq for OpenEntry {
    fn eq(&self, other: &Self) -> bool {
        self.f_score == other.f_score
    }
}
impl Eq for OpenEntry {}
impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .f_score
            .partial_cmp(&self.f_score)
            .unwrap_or(Ordering::Equal)
    }
}

struct Fringe {
    open: BinaryHeap<OpenEntry>,
    closed: std::collections::HashSet<NodeId>,
    nodes: HashMap<NodeId, SearchNode>,
    target: Position,
}

impl Fringe {
    fn seeded(root: NodeId, root_position: Position, target: Position) -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(root, SearchNode::seed(target, root_position));
        let mut open = BinaryHeap::new();
        open.push(OpenEntry {
            f_score: planar_distance(root_position, target),
            node: root,
        });
        Self {
            open,
            closed: std::collections::HashSet::new(),
            nodes,
            target,
        }
    }

    fn g(&self, id: NodeId) -> f64 {
        self.nodes.get(&id).map(|n| n.g_score).unwrap_or(f64::INFINITY)
    }

    fn min_open_f(&self) -> f64 {
        self.open.peek().map(|e| e.f_score).unwrap_or(f64::INFINITY)
    }
}

/// Finds the drivable node nearest `position` within [`SNAP_RADIUS`].
fn find_closest_node_on_highway(position: Position, graph: &Graph, index: &QuadTree) -> Option<NodeId> {
    let bbox = BoundingBox::from_center(position, SNAP_RADIUS);
    let predicate = |id: NodeId, graph: &Graph| graph.node(id).map(|n| n.is_on_highway(graph)).unwrap_or(false);
    let candidates = index.find_node(&bbox, graph, &predicate);
    candidates
        .into_iter()
        .min_by(|a, b| {
            let da = planar_distance(graph.node(*a).unwrap().position, position);
            let db = planar_distance(graph.node(*b).unwrap().position, position);
            da.partial_cmp(&db).unwrap_or(Ordering::Equal)
        })
}

fn expand(fringe: &mut Fringe, u: NodeId, graph: &Graph, preferences: &Preferences) -> Result<(), CoreError> {
    let current_highway = fringe.nodes.get(&u).and_then(|n| n.current_highway.clone());
    let current_priority = current_highway
        .as_deref()
        .map(highway_priority)
        .unwrap_or(100);
    let u_g = fringe.g(u);
    let target = fringe.target;

    let Some(node) = graph.node(u) else {
        return Ok(());
    };

    for (&v, neighbor) in &node.neighbors {
        if fringe.closed.contains(&v) {
            continue;
        }
        let Some(class) = neighbor.tags.get("highway") else {
            continue;
        };
        let Some(mut weight) = edge_weight(neighbor, preferences)? else {
            continue;
        };

        let target_priority = highway_priority(class);
        if current_priority < target_priority {
            weight *= 3.0;
        } else {
            weight *= 0.5;
        }

        let tentative = u_g + weight;
        if tentative < fringe.g(v) {
            let v_position = graph.node(v).map(|n| n.position).ok_or_else(|| {
                CoreError::Invariant(format!("neighbor {:?} missing from graph", v))
            })?;
            let f_score = tentative + planar_distance(v_position, target);
            fringe.nodes.insert(
                v,
                SearchNode {
                    f_score,
                    g_score: tentative,
                    came_from: Some(u),
                    current_highway: Some(class.clone()),
                },
            );
            fringe.open.push(OpenEntry { f_score, node: v });
        }
    }
    Ok(())
}

fn reconstruct_path(
    meeting: NodeId,
    start_fringe: &Fringe,
    goal_fringe: &Fringe,
    graph: &Graph,
) -> Vec<Position> {
    let mut forward = Vec::new();
    let mut current = Some(meeting);
    while let Some(id) = current {
        forward.push(graph.node(id).expect("search node must exist in graph").position);
        current = start_fringe.nodes.get(&id).and_then(|n| n.came_from);
    }
    forward.reverse();

    let mut backward = Vec::new();
    let mut current = goal_fringe.nodes.get(&meeting).and_then(|n| n.came_from);
    while let Some(id) = current {
        backward.push(graph.node(id).expect("search node must exist in graph").position);
        current = goal_fringe.nodes.get(&id).and_then(|n| n.came_from);
    }

    forward.extend(backward);
    forward
}

/// Runs the bidirectional search between `start` and `goal`, honoring `preferences`.
///
/// Returns `Ok(Vec::new())` when no route exists (an empty but successful result,
/// not an error); returns `Err(CoreError::NoSnap)` when either endpoint has no
/// drivable node within the snap radius.
pub fn find_path(
    start: Position,
    goal: Position,
    preferences: &HashMap<String, String>,
    graph: &Graph,
    index: &QuadTree,
) -> Result<Vec<Position>, CoreError> {
    let preferences = Preferences::parse(preferences);

    let start_node = find_closest_node_on_highway(start, graph, index).ok_or(CoreError::NoSnap)?;
    let goal_node = find_closest_node_on_highway(goal, graph, index).ok_or(CoreError::NoSnap)?;

    let start_position = graph.node(start_node).expect("snapped node must exist").position;
    let goal_position = graph.node(goal_node).expect("snapped node must exist").position;

    let mut forward = Fringe::seeded(start_node, start_position, goal_position);
    let mut reverse = Fringe::seeded(goal_node, goal_position, start_position);

    let mut best_cost = f64::INFINITY;
    let mut best_meeting: Option<NodeId> = None;

    loop {
        if forward.open.is_empty() || reverse.open.is_empty() {
            break;
        }
        if best_meeting.is_some() && forward.min_open_f().min(reverse.min_open_f()) >= best_cost {
            break;
        }

        if let Some(entry) = forward.open.pop() {
            let u = entry.node;
            if !forward.closed.insert(u) {
                continue;
            }
            if reverse.closed.contains(&u) {
                let candidate = forward.g(u) + reverse.g(u);
                if candidate < best_cost {
                    best_cost = candidate;
                    best_meeting = Some(u);
                }
            }
            expand(&mut forward, u, graph, &preferences)?;
        }

        if let Some(entry) = reverse.open.pop() {
            let u = entry.node;
            if !reverse.closed.insert(u) {
                continue;
            }
            if forward.closed.contains(&u) {
                let candidate = reverse.g(u) + forward.g(u);
                if candidate < best_cost {
                    best_cost = candidate;
                    best_meeting = Some(u);
                }
            }
            expand(&mut reverse, u, graph, &preferences)?;
        }
    }

    match best_meeting {
        Some(meeting) => Ok(reconstruct_path(meeting, &forward, &reverse, graph)),
        None => Ok(Vec::new()),
    }
}
