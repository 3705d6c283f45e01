//! The public façade: `RoutingEngine` owns the currently-loaded graph and
//! quadtree behind an atomically-swapped snapshot, and exposes `load`/`query`.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

use crate::error::CoreError;
use crate::geometry::{BoundingBox, Position};
use crate::loader::load_osm_xml;
use crate::model::Graph;
use crate::pathfinder::find_path;
use crate::quadtree::QuadTree;

/// The `{min, max}` bounds of a freshly loaded document, returned to the caller
/// so it can, for example, validate that a query position falls inside coverage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadedBounds {
    pub min: Position,
    pub max: Position,
}

/// One fully-built, immutable graph + index pair. `load` builds a new one off to
/// the side; `query` only ever reads from an `Arc` clone of whichever snapshot was
/// current when the call started.
struct Snapshot {
    graph: Graph,
    index: QuadTree,
    bounds: BoundingBox,
}

/// Owns the currently-loaded road network and answers route queries against it.
///
/// `load` replaces the snapshot atomically: a query in flight during a `load`
/// either sees the old snapshot in full or the new one in full, never a partial
/// graph. Many `query` calls may run concurrently against a frozen snapshot; none
/// of them mutate it.
pub struct RoutingEngine {
    current: RwLock<Option<Arc<Snapshot>>>,
}

impl RoutingEngine {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(None),
        }
    }

    /// Parses the OSM XML document at `path`, replacing whatever was previously
    /// loaded. The old snapshot (if any) stays valid for queries already in
    /// flight until they finish, since they hold their own `Arc` clone.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<LoadedBounds, CoreError> {
        let path = path.as_ref();
        tracing::info!(path = %path.display(), "loading OSM document");
        let document = load_osm_xml(path)?;
        tracing::info!(
            nodes = document.graph.node_count(),
            ways = document.graph.way_count(),
            "document parsed"
        );

        let bounds = document.bounds;
        let snapshot = Arc::new(Snapshot {
            graph: document.graph,
            index: document.index,
            bounds,
        });

        let mut slot = self
            .current
            .write()
            .map_err(|_| CoreError::Invariant("snapshot lock poisoned".into()))?;
        *slot = Some(snapshot);

        Ok(LoadedBounds {
            min: bounds.min,
            max: bounds.max,
        })
    }

    /// Finds a route between `start` and `goal` under `preferences`. Reads a
    /// single `Arc` clone of the current snapshot and never touches the lock
    /// again for the remainder of the call.
    pub fn query(
        &self,
        start: Position,
        goal: Position,
        preferences: &HashMap<String, String>,
    ) -> Result<Vec<Position>, CoreError> {
        let snapshot = {
            let slot = self
                .current
                .read()
                .map_err(|_| CoreError::Invariant("snapshot lock poisoned".into()))?;
            slot.clone().ok_or(CoreError::NotLoaded)?
        };

        tracing::debug!(?start, ?goal, "running query");
        find_path(start, goal, preferences, &snapshot.graph, &snapshot.index)
    }
}

impl Default for RoutingEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE_XML: &str = r#"<?xml version="1.0"?>
<osm version="0.6">
  <node id="1" lat="0.0" lon="0.0"/>
  <node id="2" lat="0.0" lon="1.0"/>
  <node id="3" lat="0.0" lon="2.0"/>
  <way id="10">
    <nd ref="1"/>
    <nd ref="2"/>
    <nd ref="3"/>
    <tag k="highway" v="primary"/>
    <tag k="maxspeed" v="50"/>
  </way>
</osm>"#;

    fn write_sample() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE_XML.as_bytes()).unwrap();
        file
    }

    #[test]
    fn query_before_load_reports_not_loaded() {
        let engine = RoutingEngine::new();
        let result = engine.query(Position::new(0.0, 0.0), Position::new(0.0, 1.0), &HashMap::new());
        assert!(matches!(result, Err(CoreError::NotLoaded)));
    }

    #[test]
    fn load_then_query_finds_the_chain() {
        let engine = RoutingEngine::new();
        let file = write_sample();
        let bounds = engine.load(file.path()).unwrap();
        assert_eq!(bounds.min, Position::new(0.0, 0.0));
        assert_eq!(bounds.max, Position::new(0.0, 2.0));

        let path = engine
            .query(Position::new(0.0, 0.0), Position::new(0.0, 2.0), &HashMap::new())
            .unwrap();
        assert_eq!(path.first(), Some(&Position::new(0.0, 0.0)));
        assert_eq!(path.last(), Some(&Position::new(0.0, 2.0)));
    }

    #[test]
    fn reload_replaces_the_previous_snapshot() {
        let engine = RoutingEngine::new();
        let first = write_sample();
        engine.load(first.path()).unwrap();

        let mut second = tempfile::NamedTempFile::new().unwrap();
        second
            .write_all(
                br#"<osm version="0.6">
  <node id="5" lat="9.0" lon="9.0"/>
</osm>"#,
            )
            .unwrap();
        let bounds = engine.load(second.path()).unwrap();
        assert_eq!(bounds.min, Position::new(9.0, 9.0));
    }
}
