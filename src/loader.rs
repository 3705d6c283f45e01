//! OSM XML ingestion: turns a `<osm>` document into the in-memory [`Graph`] schema
//! plus a populated [`QuadTree`]. Partial parses are never published — any error
//! here aborts the whole load and the previously-loaded state (if any) is kept.

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{CoreError, ParseError};
use crate::geometry::{BoundingBox, Position};
use crate::model::{Graph, Node, NodeId, TagMap, Way, WayId};
use crate::quadtree::{IndexedItem, QuadTree};

/// Capacity per quadtree cell before it subdivides. Chosen to match the original
/// implementation's default (`Document`'s constructor uses 10).
const QUADTREE_CAPACITY: usize = 10;

pub struct LoadedDocument {
    pub graph: Graph,
    pub index: QuadTree,
    pub bounds: BoundingBox,
}

/// Parses the OSM XML file at `path` and builds the graph and spatial index.
/// A missing or unreadable file surfaces as `CoreError::Io`; anything wrong with
/// the document itself surfaces as `CoreError::Parse`.
pub fn load_osm_xml(path: impl AsRef<Path>) -> Result<LoadedDocument, CoreError> {
    let file = File::open(path)?;
    Ok(load_osm_xml_reader(BufReader::new(file))?)
}

/// Parses OSM XML from any reader; exposed separately so tests can drive the
/// loader against an in-memory string without touching the filesystem.
pub fn load_osm_xml_reader(reader: impl std::io::BufRead) -> Result<LoadedDocument, ParseError> {
    let mut xml = Reader::from_reader(reader);
    xml.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut graph = Graph::new();
    let mut declared_bounds: Option<BoundingBox> = None;
    let mut seen_root = false;

    let mut current_node: Option<PartialNode> = None;
    let mut current_way: Option<PartialWay> = None;

    loop {
        match xml.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Start(e) => {
                handle_start(
                    &e,
                    &mut graph,
                    &mut declared_bounds,
                    &mut seen_root,
                    &mut current_node,
                    &mut current_way,
                )?;
            }
            Event::Empty(e) => {
                let name = e.name().as_ref().to_vec();
                handle_start(
                    &e,
                    &mut graph,
                    &mut declared_bounds,
                    &mut seen_root,
                    &mut current_node,
                    &mut current_way,
                )?;
                // A self-closing `<node/>` or `<way/>` never gets a matching
                // `Event::End`, so it must be closed out immediately.
                close_element(&name, &mut graph, &mut current_node, &mut current_way);
            }
            Event::End(e) => {
                close_element(e.name().as_ref(), &mut graph, &mut current_node, &mut current_way);
            }
            _ => {}
        }
        buf.clear();
    }

    if !seen_root {
        return Err(ParseError::MissingRoot);
    }

    graph.compute_back_references_and_neighbors();

    let bounds = declared_bounds.unwrap_or_else(|| {
        let positions: Vec<Position> = graph.nodes().map(|n| n.position).collect();
        BoundingBox::enclosing(&positions).unwrap_or_else(|| BoundingBox::new(Position::new(0.0, 0.0), Position::new(0.0, 0.0)))
    });

    let mut index = QuadTree::new(bounds, QUADTREE_CAPACITY);
    let node_ids: Vec<NodeId> = graph.nodes().map(|n| n.id).collect();
    for id in node_ids {
        index.insert(IndexedItem::Node(id), &graph);
    }

    Ok(LoadedDocument { graph, index, bounds })
}

struct PartialNode {
    id: NodeId,
    position: Position,
    tags: TagMap,
}

struct PartialWay {
    id: WayId,
    node_refs: Vec<NodeId>,
    tags: TagMap,
}

fn handle_start(
    e: &BytesStart,
    graph: &mut Graph,
    declared_bounds: &mut Option<BoundingBox>,
    seen_root: &mut bool,
    current_node: &mut Option<PartialNode>,
    current_way: &mut Option<PartialWay>,
) -> Result<(), ParseError> {
    match e.name().as_ref() {
        b"osm" => {
            *seen_root = true;
        }
        b"bounds" => {
            let minlat = required_f64(e, b"minlat")?;
            let maxlat = required_f64(e, b"maxlat")?;
            let minlon = required_f64(e, b"minlon")?;
            let maxlon = required_f64(e, b"maxlon")?;
            *declared_bounds = Some(BoundingBox::new(
                Position::new(minlat, minlon),
                Position::new(maxlat, maxlon),
            ));
        }
        b"node" => {
            let id = required_id(e, b"id")?;
            let lat = required_f64(e, b"lat")?;
            let lon = required_f64(e, b"lon")?;
            *current_node = Some(PartialNode {
                id: NodeId(id),
                position: Position::new(lat, lon),
                tags: TagMap::new(),
            });
        }
        b"way" => {
            let id = required_id(e, b"id")?;
            *current_way = Some(PartialWay {
                id: WayId(id),
                node_refs: Vec::new(),
                tags: TagMap::new(),
            });
        }
        b"nd" => {
            let reference = required_i64(e, b"ref")?;
            let Some(way) = current_way.as_mut() else {
                return Ok(());
            };
            if reference < 0 || graph.node(NodeId(reference as u64)).is_none() {
                return Err(ParseError::UnknownNodeRef(reference));
            }
            way.node_refs.push(NodeId(reference as u64));
        }
        b"tag" => {
            let key = required_attr(e, b"k").ok_or(ParseError::MissingTagAttribute("k"))?;
            let value = required_attr(e, b"v").ok_or(ParseError::MissingTagAttribute("v"))?;
            if let Some(node) = current_node.as_mut() {
                node.tags.insert(key, value);
            } else if let Some(way) = current_way.as_mut() {
                way.tags.insert(key, value);
            }
        }
        _ => {}
    }
    Ok(())
}

fn close_element(
    name: &[u8],
    graph: &mut Graph,
    current_node: &mut Option<PartialNode>,
    current_way: &mut Option<PartialWay>,
) {
    match name {
        b"node" => {
            if let Some(node) = current_node.take() {
                graph.insert_node(Node {
                    id: node.id,
                    position: node.position,
                    tags: node.tags,
                    ways: Vec::new(),
                    neighbors: HashMap::new(),
                });
            }
        }
        b"way" => {
            if let Some(way) = current_way.take() {
                graph.insert_way(Way {
                    id: way.id,
                    nodes: way.node_refs,
                    tags: way.tags,
                });
            }
        }
        _ => {}
    }
}

fn required_attr(e: &BytesStart, name: &[u8]) -> Option<String> {
    e.try_get_attribute(name)
        .ok()
        .flatten()
        .and_then(|a| a.unescape_value().ok())
        .map(|v| v.into_owned())
}

fn required_f64(e: &BytesStart, name: &'static [u8]) -> Result<f64, ParseError> {
    let text = required_attr(e, name).ok_or(ParseError::InvalidCoordinate)?;
    text.parse::<f64>().map_err(|_| ParseError::InvalidCoordinate)
}

fn required_i64(e: &BytesStart, name: &'static [u8]) -> Result<i64, ParseError> {
    let text = required_attr(e, name).ok_or(ParseError::InvalidNodeId)?;
    text.parse::<i64>().map_err(|_| ParseError::InvalidNodeId)
}

fn required_id(e: &BytesStart, name: &'static [u8]) -> Result<u64, ParseError> {
    let id = required_i64(e, name)?;
    if id < 0 {
        return Err(ParseError::InvalidNodeId);
    }
    Ok(id as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn self_closing_node_is_not_dropped() {
        let xml = b"<osm><node id=\"1\" lat=\"1.0\" lon=\"2.0\"/></osm>" as &[u8];
        let doc = load_osm_xml_reader(xml).unwrap();
        assert_eq!(doc.graph.node_count(), 1);
        assert_eq!(doc.graph.node(NodeId(1)).unwrap().position, Position::new(1.0, 2.0));
    }

    #[test]
    fn tags_attach_to_the_currently_open_node_or_way() {
        let xml = br#"<osm>
            <node id="1" lat="0.0" lon="0.0"><tag k="amenity" v="cafe"/></node>
            <node id="2" lat="0.0" lon="1.0"/>
            <way id="10">
                <nd ref="1"/>
                <nd ref="2"/>
                <tag k="highway" v="primary"/>
            </way>
        </osm>"# as &[u8];
        let doc = load_osm_xml_reader(xml).unwrap();
        assert_eq!(doc.graph.node(NodeId(1)).unwrap().tags.get("amenity").map(String::as_str), Some("cafe"));
        assert_eq!(doc.graph.way(WayId(10)).unwrap().tags.get("highway").map(String::as_str), Some("primary"));
    }

    #[test]
    fn missing_root_element_is_an_error() {
        let xml = b"<not-osm></not-osm>" as &[u8];
        assert!(matches!(load_osm_xml_reader(xml), Err(ParseError::MissingRoot)));
    }

    #[test]
    fn way_referencing_an_unknown_node_is_an_error() {
        let xml = br#"<osm><way id="1"><nd ref="999"/></way></osm>"# as &[u8];
        assert!(matches!(load_osm_xml_reader(xml), Err(ParseError::UnknownNodeRef(999))));
    }

    #[test]
    fn declared_bounds_are_used_when_present() {
        let xml = br#"<osm>
            <bounds minlat="-1.0" maxlat="1.0" minlon="-2.0" maxlon="2.0"/>
            <node id="1" lat="0.0" lon="0.0"/>
        </osm>"# as &[u8];
        let doc = load_osm_xml_reader(xml).unwrap();
        assert_eq!(doc.bounds, BoundingBox::new(Position::new(-1.0, -2.0), Position::new(1.0, 2.0)));
    }

    #[test]
    fn bounds_fall_back_to_enclosing_node_positions_when_absent() {
        let xml = br#"<osm>
            <node id="1" lat="0.0" lon="0.0"/>
            <node id="2" lat="5.0" lon="5.0"/>
        </osm>"# as &[u8];
        let doc = load_osm_xml_reader(xml).unwrap();
        assert_eq!(doc.bounds, BoundingBox::new(Position::new(0.0, 0.0), Position::new(5.0, 5.0)));
    }
}
