use std::collections::HashMap;

use foliage_router::{CoreError, Position, RoutingEngine};

const STRAIGHT_LINE: &str = r#"<?xml version="1.0"?>
<osm version="0.6">
  <bounds minlat="0.0" maxlat="0.0" minlon="0.0" maxlon="4.0"/>
  <node id="1" lat="0.0" lon="0.0"/>
  <node id="2" lat="0.0" lon="1.0"/>
  <node id="3" lat="0.0" lon="2.0"/>
  <node id="4" lat="0.0" lon="3.0"/>
  <node id="5" lat="0.0" lon="4.0"/>
  <way id="10">
    <nd ref="1"/>
    <nd ref="2"/>
    <nd ref="3"/>
    <nd ref="4"/>
    <nd ref="5"/>
    <tag k="highway" v="primary"/>
    <tag k="maxspeed" v="10"/>
  </way>
</osm>"#;

const ONEWAY_PAIR: &str = r#"<osm version="0.6">
  <node id="1" lat="0.0" lon="0.0"/>
  <node id="2" lat="0.0" lon="1.0"/>
  <way id="20">
    <nd ref="1"/>
    <nd ref="2"/>
    <tag k="highway" v="residential"/>
    <tag k="oneway" v="yes"/>
  </way>
</osm>"#;

const LONE_NODE: &str = r#"<osm version="0.6">
  <node id="1" lat="50.0" lon="50.0">
    <tag k="dummy" v="unused"/>
  </node>
  <node id="2" lat="50.0" lon="50.0001">
    <tag k="dummy" v="unused"/>
  </node>
  <way id="30">
    <nd ref="1"/>
    <nd ref="2"/>
    <tag k="highway" v="residential"/>
  </way>
</osm>"#;

fn load_fixture(xml: &str) -> (RoutingEngine, tempfile::NamedTempFile) {
    use std::io::Write;
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(xml.as_bytes()).unwrap();
    let engine = RoutingEngine::new();
    engine.load(file.path()).unwrap();
    (engine, file)
}

// Scenario D: straight-line graph query.
#[test]
fn straight_line_query_returns_the_full_chain_in_order() {
    let (engine, _file) = load_fixture(STRAIGHT_LINE);
    let path = engine
        .query(Position::new(0.0, 0.0), Position::new(0.0, 4.0), &HashMap::new())
        .unwrap();

    assert_eq!(path.first(), Some(&Position::new(0.0, 0.0)));
    assert_eq!(path.last(), Some(&Position::new(0.0, 4.0)));
    assert_eq!(path.len(), 5);
    for (a, b) in path.iter().zip(path.iter().skip(1)) {
        assert!(b.lon > a.lon);
    }
}

// Scenario E: oneway rejection in the reverse direction.
#[test]
fn oneway_way_rejects_the_reverse_query() {
    let (engine, _file) = load_fixture(ONEWAY_PAIR);
    let path = engine
        .query(Position::new(0.0, 1.0), Position::new(0.0, 0.0), &HashMap::new())
        .unwrap();
    assert!(path.is_empty());
}

// Scenario F: snap fallback to the nearest drivable node.
#[test]
fn nearby_positions_snap_to_the_same_drivable_node() {
    let (engine, _file) = load_fixture(LONE_NODE);
    let path = engine
        .query(Position::new(50.00001, 50.00001), Position::new(50.00002, 50.00002), &HashMap::new())
        .unwrap();
    assert_eq!(path.len(), 1);
}

#[test]
fn query_without_a_loaded_document_reports_not_loaded() {
    let engine = RoutingEngine::new();
    let result = engine.query(Position::new(0.0, 0.0), Position::new(0.0, 1.0), &HashMap::new());
    assert!(matches!(result, Err(CoreError::NotLoaded)));
}

#[test]
fn malformed_document_reports_a_parse_error() {
    use std::io::Write;
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"<osm><way id=\"1\"><nd ref=\"999\"/></way></osm>").unwrap();

    let engine = RoutingEngine::new();
    let result = engine.load(file.path());
    assert!(matches!(result, Err(CoreError::Parse(_))));
}

#[test]
fn avoid_highway_preference_empties_a_single_class_network() {
    let (engine, _file) = load_fixture(STRAIGHT_LINE);
    let mut preferences = HashMap::new();
    preferences.insert("avoid_highway".to_string(), "primary".to_string());

    let path = engine
        .query(Position::new(0.0, 0.0), Position::new(0.0, 4.0), &preferences)
        .unwrap();
    assert!(path.is_empty());
}
